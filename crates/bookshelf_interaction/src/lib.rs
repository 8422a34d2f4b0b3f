use bookshelf_animation::AnimationService;
use bookshelf_core::{Camera, Transform, Viewport};
use bookshelf_pages::{BookService, BookTarget};
use bookshelf_renderer::OverlayRenderer;
use bookshelf_scene::{Focusable, NodeId, SceneContext};
use glam::{Quat, Vec3};

/// Everything a click may touch, lent by the app for one event.
pub struct InteractionContext<'a> {
    pub scene: &'a mut SceneContext,
    pub animations: &'a mut AnimationService,
    pub overlays: &'a mut OverlayRenderer,
    pub book: &'a mut BookService,
    pub viewport: Viewport,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusState {
    Idle,
    Selected(NodeId),
    Opened(NodeId),
}

struct Selection {
    node: NodeId,
    restore: Transform,
}

/// World pose that puts a focusable object in front of the camera, upright relative
/// to the camera's roll.
pub fn focus_pose(camera: &Camera, focus: &Focusable) -> (Vec3, Quat) {
    let position = camera.position()
        + camera.forward() * focus.distance()
        + focus.offset_position.unwrap_or(Vec3::ZERO);
    let up = Quat::from_rotation_arc(Vec3::Y, camera.transform.rotation * Vec3::Y);
    (position, up * focus.rotation)
}

/// Click driven selection of scene objects.
///
/// A focusable object is pulled in front of the camera on the first click. Clicking it
/// again toggles its open animation and the book pages shown on it. Clicking anything
/// else puts it back where it was.
#[derive(Default)]
pub struct FocusController {
    selected: Option<Selection>,
}

impl FocusController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, scene: &SceneContext) -> FocusState {
        match &self.selected {
            None => FocusState::Idle,
            Some(selection) if is_open(scene, selection.node) => {
                FocusState::Opened(selection.node)
            }
            Some(selection) => FocusState::Selected(selection.node),
        }
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected.as_ref().map(|s| s.node)
    }

    /// Handles a click on `hit` (any node of an object) or on empty space.
    pub fn on_click(&mut self, hit: Option<NodeId>, ctx: &mut InteractionContext<'_>) {
        let object = hit.and_then(|id| ctx.scene.graph.top_level_ancestor(id));

        if let Some(object) = object
            && self.selected() == Some(object)
        {
            toggle(object, ctx);
            return;
        }

        self.reset_selection(ctx);

        if let Some(object) = object {
            self.select(object, ctx.scene);
        }
    }

    /// Closes and puts back the selected object, if any.
    pub fn reset_selection(&mut self, ctx: &mut InteractionContext<'_>) {
        let Some(selection) = self.selected.take() else {
            return;
        };

        if is_open(ctx.scene, selection.node) {
            toggle(selection.node, ctx);
        }
        ctx.book.close(ctx.overlays);

        ctx.scene.graph.set_transform(selection.node, selection.restore);
        log::debug!("Deselected {:?}", selection.node);
    }

    fn select(&mut self, object: NodeId, scene: &mut SceneContext) {
        let Some(focus) = scene.graph.focusable(object) else {
            return;
        };
        let Some(restore) = scene.graph.transform(object) else {
            return;
        };
        let (position, rotation) = focus_pose(&scene.camera, &focus);

        self.selected = Some(Selection {
            node: object,
            restore,
        });
        scene.graph.update_transform(object, |transform| {
            transform.translation = position;
            transform.rotation = rotation;
        });
        log::debug!("Selected {}", scene.graph.name(object).unwrap_or_default());
    }
}

fn is_open(scene: &SceneContext, object: NodeId) -> bool {
    scene
        .graph
        .animation(object)
        .is_some_and(|animation| animation.open)
}

// Plays the open clip forward or backward and shows or hides the pages to match.
// Objects without an animation binding stay as they are.
fn toggle(object: NodeId, ctx: &mut InteractionContext<'_>) {
    let Some(metadata) = ctx.scene.graph.metadata(object) else {
        return;
    };
    let Some(animation) = metadata.animation else {
        return;
    };
    let name = metadata.name;
    let page = metadata.page;
    let surface = metadata.page_surface;
    let opening = !animation.open;
    let mut options = animation.options;
    options.in_reverse = !opening;

    log::info!("Clicked on object: {name}");

    if opening {
        if let Some(page) = page {
            let target = BookTarget {
                root: object,
                page,
                surface,
            };
            if let Err(error) = ctx.book.open(target, ctx.scene, ctx.overlays, ctx.viewport) {
                log::warn!("{error}");
            }
        }
        ctx.animations.play(&name, object, options, None);
    } else {
        ctx.book.close(ctx.overlays);
        let closed = name.clone();
        ctx.animations.play(
            &name,
            object,
            options,
            Some(Box::new(move || log::debug!("{closed} closed"))),
        );
    }

    ctx.scene.graph.set_animation_open(object, opening);
}

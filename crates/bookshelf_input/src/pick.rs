use bookshelf_core::{EventBus, EventReader};
use bookshelf_scene::{NodeId, SceneContext};
use glam::Vec2;

use crate::physical::SurfaceRect;
use crate::raycast::{Hit, intersect_scene};

#[derive(Clone, Debug, PartialEq)]
pub enum PointerEvent {
    /// Everything under the pointer, nearest first.
    Move(Vec<Hit>),
    /// The nearest object under the pointer before the press, if any.
    Click(Option<NodeId>),
}

/// Casts rays from the camera through the pointer and publishes what they hit.
#[derive(Default)]
pub struct PickService {
    rect: Option<SurfaceRect>,
    hits: Vec<Hit>,
    events: EventBus<PointerEvent>,
}

impl PickService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, rect: SurfaceRect) {
        if self.rect.is_some() {
            log::warn!("Pick service already initialized, updating its surface");
        }
        self.rect = Some(rect);
    }

    pub fn set_rect(&mut self, rect: SurfaceRect) {
        self.rect = Some(rect);
    }

    pub fn subscribe(&self) -> EventReader<PointerEvent> {
        self.events.subscribe()
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn on_pointer_move(&mut self, client: Vec2, scene: &SceneContext) {
        let Some(rect) = self.rect else {
            return;
        };
        let ray = scene.camera.ray_from_ndc(rect.to_ndc(client));
        self.hits = intersect_scene(&ray, &scene.graph);
        self.events.emit(PointerEvent::Move(self.hits.clone()));
    }

    /// Clicks resolve against the hits of the last move, then the hits are refreshed.
    pub fn on_pointer_down(&mut self, client: Vec2, scene: &SceneContext) {
        if self.rect.is_none() {
            return;
        }
        let nearest = self.hits.first().map(|hit| hit.node);
        log::debug!("Pointer down on {nearest:?}");
        self.events.emit(PointerEvent::Click(nearest));
        self.on_pointer_move(client, scene);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bookshelf_assets::{Aabb, Handle, MeshData, Vertex};
    use bookshelf_scene::{MeshRef, SceneNode};
    use glam::Vec3;

    use super::*;

    fn quad_mesh() -> Arc<MeshData> {
        let v = |x: f32, y: f32| Vertex {
            position: [x, y, 0.0],
            normal: [0.0, 0.0, 1.0],
        };
        Arc::new(MeshData {
            vertices: vec![v(-1.0, -1.0), v(1.0, -1.0), v(1.0, 1.0), v(-1.0, 1.0)],
            indices: vec![0, 1, 2, 0, 2, 3],
            base_color: [1.0; 4],
            bounds: Aabb {
                min: Vec3::new(-1.0, -1.0, 0.0),
                max: Vec3::new(1.0, 1.0, 0.0),
            },
        })
    }

    fn spawn_quad(scene: &mut SceneContext, name: &str, z: f32) -> NodeId {
        let mut node = SceneNode::new(name);
        node.transform.translation = Vec3::new(0.0, 0.0, z);
        node.mesh = Some(MeshRef {
            handle: Handle::new(),
            data: quad_mesh(),
        });
        let id = scene.graph.spawn(node, None);
        scene.graph.insert(id);
        id
    }

    fn scene_facing_quads() -> (SceneContext, NodeId, NodeId) {
        let mut scene = SceneContext::default();
        scene.camera.transform.translation = Vec3::new(0.0, 0.0, 10.0);
        scene.camera.look_at(Vec3::ZERO);
        let far = spawn_quad(&mut scene, "far", 0.0);
        let near = spawn_quad(&mut scene, "near", 2.0);
        (scene, near, far)
    }

    const CENTER: Vec2 = Vec2::new(400.0, 300.0);

    #[test]
    fn move_lists_hits_nearest_first() {
        let (scene, near, far) = scene_facing_quads();
        let mut picker = PickService::new();
        picker.initialize(SurfaceRect::from_size(800.0, 600.0));
        let mut events = picker.subscribe();

        picker.on_pointer_move(CENTER, &scene);

        let Some(PointerEvent::Move(hits)) = events.try_next() else {
            panic!("expected a move event");
        };
        assert_eq!(hits.iter().map(|h| h.node).collect::<Vec<_>>(), vec![near, far]);
        assert!((hits[0].distance - 8.0).abs() < 1e-3);
    }

    #[test]
    fn click_uses_previous_hits() {
        let (scene, near, _) = scene_facing_quads();
        let mut picker = PickService::new();
        picker.initialize(SurfaceRect::from_size(800.0, 600.0));
        picker.on_pointer_move(CENTER, &scene);
        let mut events = picker.subscribe();

        // Pressing over empty space still clicks what was under the last move
        picker.on_pointer_down(Vec2::new(0.0, 0.0), &scene);

        assert_eq!(events.try_next(), Some(PointerEvent::Click(Some(near))));
        assert_eq!(events.try_next(), Some(PointerEvent::Move(Vec::new())));
        assert!(picker.hits().is_empty());
    }

    #[test]
    fn detached_nodes_are_not_picked() {
        let (mut scene, near, far) = scene_facing_quads();
        let mut detached = SceneNode::new("detached");
        detached.transform.translation = Vec3::new(0.0, 0.0, 5.0);
        detached.mesh = Some(MeshRef {
            handle: Handle::new(),
            data: quad_mesh(),
        });
        scene.graph.spawn(detached, None);
        let mut picker = PickService::new();
        picker.initialize(SurfaceRect::from_size(800.0, 600.0));

        picker.on_pointer_move(CENTER, &scene);
        let nodes: Vec<NodeId> = picker.hits().iter().map(|hit| hit.node).collect();
        assert_eq!(nodes, vec![near, far]);
    }

    #[test]
    fn uninitialized_service_ignores_pointer() {
        let (scene, _, _) = scene_facing_quads();
        let mut picker = PickService::new();
        let mut events = picker.subscribe();
        picker.on_pointer_move(CENTER, &scene);
        picker.on_pointer_down(CENTER, &scene);
        assert!(events.try_next().is_none());
    }
}

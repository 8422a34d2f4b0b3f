use bookshelf_animation::AnimationService;
use bookshelf_core::{Camera, Viewport};
use bookshelf_scene::{SceneContext, SceneGraph};
use thiserror::Error;

pub mod overlay;
pub mod wgpu_backend;

mod global_resources;
mod mesh;
mod programs;
mod texture;

pub use overlay::{OverlayDraw, OverlayElement, OverlayHandle, OverlayPose, OverlayRenderer};
pub use wgpu_backend::WgpuBackend;

/// Highest device pixel ratio the backend renders at.
pub const MAX_PIXEL_RATIO: f32 = 2.0;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("could not create a surface: {0}")]
    Surface(String),
    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),
    #[error("could not open the GPU device: {0}")]
    Device(String),
    #[error("frame could not be presented: {0}")]
    Frame(String),
}

/// Identifies the native surface a backend draws into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Everything a backend needs to draw one frame.
pub struct FrameData<'a> {
    pub graph: &'a SceneGraph,
    pub camera: &'a Camera,
    pub overlays: Vec<OverlayDraw>,
    pub background: [f64; 3],
}

pub trait RenderBackend {
    /// `width` and `height` are logical pixels, the drawing buffer is scaled by `pixel_ratio`.
    fn set_size(&mut self, width: u32, height: u32, pixel_ratio: f32);
    fn render(&mut self, frame: &FrameData<'_>) -> Result<(), RenderError>;
    fn dispose(&mut self);
}

struct ActiveBackend<B> {
    surface: SurfaceId,
    backend: B,
}

/// Owns the backend bound to the current surface and drives the per-frame order:
/// animations, overlay sync, present.
pub struct Renderer<B: RenderBackend> {
    active: Option<ActiveBackend<B>>,
    restart_clock: bool,
    viewport: Viewport,
    pixel_ratio: f32,
    background: [f64; 3],
    pub overlay: OverlayRenderer,
}

impl<B: RenderBackend> Renderer<B> {
    pub fn new(background: [f64; 3]) -> Self {
        Self {
            active: None,
            restart_clock: true,
            viewport: Viewport::new(1.0, 1.0),
            pixel_ratio: 1.0,
            background,
            overlay: OverlayRenderer::new(),
        }
    }

    /// Binds a backend to `surface`. Re-initializing with the same surface keeps the
    /// current backend; a different surface disposes it before `create` runs.
    pub fn initialize<F>(&mut self, surface: SurfaceId, create: F) -> Result<(), RenderError>
    where
        F: FnOnce() -> Result<B, RenderError>,
    {
        if let Some(active) = &self.active {
            if active.surface == surface {
                log::warn!("Renderer already initialized on {surface:?}");
                return Ok(());
            }
        }
        self.dispose_backend();

        let mut backend = create()?;
        backend.set_size(
            self.viewport.width as u32,
            self.viewport.height as u32,
            self.pixel_ratio,
        );
        self.active = Some(ActiveBackend { surface, backend });
        self.restart_clock = true;
        log::info!("Renderer initialized on {surface:?}");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    pub fn backend(&self) -> Option<&B> {
        self.active.as_ref().map(|active| &active.backend)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Advances the scene world's clock and renders a frame with the elapsed time.
    pub fn frame(
        &mut self,
        scene: &mut SceneContext,
        animations: &mut AnimationService,
    ) -> Result<(), RenderError> {
        if std::mem::take(&mut self.restart_clock) {
            scene.graph.reset_clock();
        }
        let delta = scene.graph.advance_clock();
        self.frame_with_delta(delta, scene, animations)
    }

    pub fn frame_with_delta(
        &mut self,
        delta: f32,
        scene: &mut SceneContext,
        animations: &mut AnimationService,
    ) -> Result<(), RenderError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };

        animations.update(delta, &mut scene.graph);
        self.overlay.animate(&scene.camera, self.viewport, &scene.graph);

        let frame = FrameData {
            graph: &scene.graph,
            camera: &scene.camera,
            overlays: self.overlay.draws(),
            background: self.background,
        };
        active.backend.render(&frame)
    }

    /// Recomputes camera aspect, surface size and pixel ratio from the new dimensions.
    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32, camera: &mut Camera) {
        self.viewport = Viewport::new(width as f32, height as f32);
        self.pixel_ratio = device_pixel_ratio.clamp(f32::EPSILON, MAX_PIXEL_RATIO);
        camera.aspect_ratio = self.viewport.aspect_ratio();

        if let Some(active) = self.active.as_mut() {
            active.backend.set_size(width, height, self.pixel_ratio);
        }
    }

    pub fn teardown(&mut self) {
        self.dispose_backend();
        self.overlay.clear();
    }

    fn dispose_backend(&mut self) {
        if let Some(mut active) = self.active.take() {
            log::info!("Disposing renderer on {:?}", active.surface);
            active.backend.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bookshelf_assets::{AnimationClip, AssetScene, Interpolation, Track, TrackValues};
    use bookshelf_scene::{ClipOptions, SceneNode};
    use glam::{Vec2, Vec3};

    use super::*;

    #[derive(Default)]
    struct Journal(Mutex<Vec<String>>);

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeBackend {
        name: &'static str,
        journal: Arc<Journal>,
    }

    impl RenderBackend for FakeBackend {
        fn set_size(&mut self, width: u32, height: u32, pixel_ratio: f32) {
            self.journal
                .push(format!("{} size {width}x{height}@{pixel_ratio}", self.name));
        }

        fn render(&mut self, frame: &FrameData<'_>) -> Result<(), RenderError> {
            self.journal
                .push(format!("{} render {} overlays", self.name, frame.overlays.len()));
            Ok(())
        }

        fn dispose(&mut self) {
            self.journal.push(format!("{} dispose", self.name));
        }
    }

    fn fake(name: &'static str, journal: &Arc<Journal>) -> impl FnOnce() -> Result<FakeBackend, RenderError> {
        let journal = journal.clone();
        move || Ok(FakeBackend { name, journal })
    }

    #[test]
    fn same_surface_is_a_no_op() {
        let journal = Arc::new(Journal::default());
        let mut renderer = Renderer::new([0.0; 3]);
        renderer.initialize(SurfaceId(1), fake("a", &journal)).unwrap();
        renderer.initialize(SurfaceId(1), fake("b", &journal)).unwrap();

        assert_eq!(journal.entries(), vec!["a size 1x1@1"]);
    }

    #[test]
    fn new_surface_disposes_previous_backend_first() {
        let journal = Arc::new(Journal::default());
        let mut renderer = Renderer::new([0.0; 3]);
        renderer.initialize(SurfaceId(1), fake("a", &journal)).unwrap();
        renderer.initialize(SurfaceId(2), fake("b", &journal)).unwrap();

        assert_eq!(
            journal.entries(),
            vec!["a size 1x1@1", "a dispose", "b size 1x1@1"]
        );
    }

    #[test]
    fn resize_clamps_pixel_ratio_and_sets_aspect() {
        let journal = Arc::new(Journal::default());
        let mut renderer = Renderer::new([0.0; 3]);
        let mut camera = Camera::default();
        renderer.initialize(SurfaceId(1), fake("a", &journal)).unwrap();

        renderer.resize(800, 400, 3.0, &mut camera);

        assert_eq!(camera.aspect_ratio, 2.0);
        assert_eq!(renderer.pixel_ratio(), 2.0);
        assert_eq!(journal.entries().last().unwrap(), "a size 800x400@2");
    }

    #[test]
    fn frame_without_backend_does_nothing() {
        let mut renderer: Renderer<FakeBackend> = Renderer::new([0.0; 3]);
        let mut scene = SceneContext::default();
        let mut animations = AnimationService::new();
        assert!(renderer.frame(&mut scene, &mut animations).is_ok());
    }

    #[test]
    fn frame_syncs_overlays_before_render() {
        let journal = Arc::new(Journal::default());
        let mut renderer = Renderer::new([0.0; 3]);
        let mut scene = SceneContext::default();
        let mut animations = AnimationService::new();
        renderer.initialize(SurfaceId(1), fake("a", &journal)).unwrap();
        renderer.resize(800, 600, 1.0, &mut scene.camera);

        let mut node = SceneNode::new("slot");
        node.transform.translation = Vec3::new(0.0, 0.0, -3.0);
        let anchor = scene.graph.spawn(node, None);
        let handle = renderer
            .overlay
            .add_object(OverlayElement::new("page", Vec2::new(10.0, 10.0)), anchor, None);

        renderer.frame_with_delta(0.016, &mut scene, &mut animations).unwrap();

        assert!(renderer.overlay.pose(handle).is_some());
        assert_eq!(journal.entries().last().unwrap(), "a render 1 overlays");
    }

    #[test]
    fn overlay_follows_animated_anchor_in_the_same_frame() {
        let journal = Arc::new(Journal::default());
        let mut renderer = Renderer::new([0.0; 3]);
        let mut scene = SceneContext::default();
        renderer.initialize(SurfaceId(1), fake("a", &journal)).unwrap();
        renderer.resize(800, 600, 1.0, &mut scene.camera);

        let book = scene.graph.spawn(SceneNode::new("book"), None);
        let mut slot = SceneNode::new("Slot");
        slot.transform.translation = Vec3::new(0.0, 0.0, -3.0);
        let anchor = scene.graph.spawn(slot, Some(book));
        scene.graph.insert(book);

        let mut animations = AnimationService::new();
        animations.register_clips(
            "book",
            &AssetScene {
                animations: vec![AnimationClip::new(
                    "open",
                    vec![Track {
                        target: "Slot".into(),
                        interpolation: Interpolation::Linear,
                        times: vec![0.0, 2.0],
                        values: TrackValues::Translation(vec![
                            Vec3::new(0.0, 0.0, -3.0),
                            Vec3::new(2.0, 0.0, -3.0),
                        ]),
                    }],
                )],
                ..Default::default()
            },
        );
        let options = ClipOptions {
            hold_on_last_frame: true,
            in_reverse: false,
        };
        animations.play("book", book, options, None);

        let handle = renderer
            .overlay
            .add_object(OverlayElement::new("page", Vec2::new(10.0, 10.0)), anchor, None);
        renderer.frame_with_delta(1.0, &mut scene, &mut animations).unwrap();

        let pose = renderer.overlay.pose(handle).unwrap();
        assert!(pose.position.abs_diff_eq(Vec3::new(1.0, 0.0, -3.0), 1e-5));
    }

    #[test]
    fn frame_ticks_the_scene_clock() {
        let journal = Arc::new(Journal::default());
        let mut renderer = Renderer::new([0.0; 3]);
        let mut scene = SceneContext::default();
        let mut animations = AnimationService::new();
        renderer.initialize(SurfaceId(1), fake("a", &journal)).unwrap();

        renderer.frame(&mut scene, &mut animations).unwrap();
        renderer.frame(&mut scene, &mut animations).unwrap();

        let renders = journal.entries().iter().filter(|e| e.contains("render")).count();
        assert_eq!(renders, 2);
        assert!(scene.graph.advance_clock() < 1.0);
    }

    #[test]
    fn teardown_disposes_and_clears() {
        let journal = Arc::new(Journal::default());
        let mut renderer = Renderer::new([0.0; 3]);
        renderer.initialize(SurfaceId(1), fake("a", &journal)).unwrap();
        let anchor = SceneGraph::new().spawn(SceneNode::new("gone"), None);
        renderer.overlay.add_object(OverlayElement::default(), anchor, None);

        renderer.teardown();

        assert!(!renderer.is_initialized());
        assert!(renderer.overlay.is_empty());
        assert_eq!(journal.entries().last().unwrap(), "a dispose");
    }
}

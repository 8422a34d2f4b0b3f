use std::sync::Arc;

use bookshelf_animation::AnimationService;
use bookshelf_assets::{AssetLoader, GltfFileSource};
use bookshelf_core::{EventReader, IoTaskPool, config::AppConfig};
use bookshelf_input::{MouseButtonId, PickService, PointerEvent, PointerState, SurfaceRect};
use bookshelf_interaction::{FocusController, InteractionContext};
use bookshelf_pages::{BookService, FileMarkdownSource, Language};
use bookshelf_renderer::{Renderer, SurfaceId, WgpuBackend};
use bookshelf_scene::{
    FileConfigSource, ModelEvent, ModelRegistry, SceneAssembly, SceneContext, SceneEvent,
};
use bookshelf_window::WindowApp;
use glam::Vec2;
use winit::{
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::loading::LoadingBoard;

fn button_id(button: MouseButton) -> MouseButtonId {
    match button {
        MouseButton::Left => MouseButtonId::Left,
        MouseButton::Right => MouseButtonId::Right,
        MouseButton::Middle => MouseButtonId::Middle,
        MouseButton::Back => MouseButtonId::Back,
        MouseButton::Forward => MouseButtonId::Forward,
        MouseButton::Other(id) => MouseButtonId::Other(id),
    }
}

/// Every service of the bookshelf, wired together and driven by the window loop.
pub struct BookshelfApp {
    title: String,
    scene: SceneContext,
    registry: ModelRegistry,
    model_events: EventReader<ModelEvent>,
    assembly: SceneAssembly,
    scene_events: EventReader<SceneEvent>,
    animations: AnimationService,
    renderer: Renderer<WgpuBackend>,
    pick: PickService,
    pointer_events: EventReader<PointerEvent>,
    pointer: PointerState,
    focus: FocusController,
    book: BookService,
    loading: LoadingBoard,
    status: Option<String>,
}

impl BookshelfApp {
    pub fn new(config: &AppConfig, io: IoTaskPool) -> Self {
        let mut scene = SceneContext::default();
        let camera = &mut scene.camera;
        camera.fov = config.camera.fov.to_radians();
        camera.near = config.camera.near;
        camera.far = config.camera.far;
        camera.transform.translation = config.camera.position;
        camera.look_at(config.camera.look_at);

        let root = config.asset_root.clone();
        let manifests = Arc::new(FileConfigSource::new(root.clone()));
        let loader = AssetLoader::new(Arc::new(GltfFileSource::new(root.clone())), io.clone());
        let registry = ModelRegistry::new(loader, manifests.clone(), io.clone());
        let assembly = SceneAssembly::new(manifests, io.clone());

        let language = config.language.parse().unwrap_or_else(|e| {
            log::warn!("{e}, falling back to {}", Language::default());
            Language::default()
        });
        let book = BookService::new(Arc::new(FileMarkdownSource::new(root)), io, language);

        let pick = PickService::new();

        Self {
            title: config.window_title.clone(),
            model_events: registry.subscribe(),
            scene_events: assembly.subscribe(),
            pointer_events: pick.subscribe(),
            scene,
            registry,
            assembly,
            animations: AnimationService::new(),
            renderer: Renderer::new(config.background_rgb()),
            pick,
            pointer: PointerState::default(),
            focus: FocusController::new(),
            book,
            loading: LoadingBoard::new(),
            status: None,
        }
    }

    /// Starts fetching the model manifest and every model in it.
    pub fn start(&self) {
        self.registry.initialize();
    }

    fn resize(&mut self, window: &Window) {
        let scale = window.scale_factor();
        let size: LogicalSize<f32> = window.inner_size().to_logical(scale);
        self.renderer.resize(
            size.width as u32,
            size.height as u32,
            scale as f32,
            &mut self.scene.camera,
        );
        self.pick
            .set_rect(SurfaceRect::from_size(size.width, size.height));
        let viewport = self.renderer.viewport();
        self.book
            .relayout(&self.scene, &mut self.renderer.overlay, viewport);
    }

    fn drain_model_events(&mut self) {
        while let Some(event) = self.model_events.try_next() {
            match event {
                ModelEvent::Progress { name, progress } => self.loading.progress(&name, progress),
                ModelEvent::Loaded(loaded) => {
                    self.animations
                        .register_clips(&loaded.model.name, &loaded.asset);
                    self.assembly.handle_loaded(loaded, &mut self.scene);
                }
                ModelEvent::Error { model, .. } => self.loading.failed(&model.display_name),
                ModelEvent::InitializationFailed(_) => self.loading.fail_initialization(),
            }
        }

        self.assembly.poll(&mut self.scene);
        while let Some(SceneEvent::ModelLoaded { model, .. }) = self.scene_events.try_next() {
            self.loading.in_scene(&model.display_name);
        }
    }

    fn drain_pointer_events(&mut self) {
        let viewport = self.renderer.viewport();
        while let Some(event) = self.pointer_events.try_next() {
            let PointerEvent::Click(hit) = event else {
                continue;
            };
            let mut ctx = InteractionContext {
                scene: &mut self.scene,
                animations: &mut self.animations,
                overlays: &mut self.renderer.overlay,
                book: &mut self.book,
                viewport,
            };
            self.focus.on_click(hit, &mut ctx);
        }
    }

    fn update_title(&mut self, window: &Window) {
        let status = self.loading.status_line();
        if status == self.status {
            return;
        }
        match &status {
            Some(line) => window.set_title(&format!("{} ({line})", self.title)),
            None => window.set_title(&self.title),
        }
        self.status = status;
    }
}

impl WindowApp for BookshelfApp {
    fn resumed(&mut self, window: Arc<Window>) -> Result<(), String> {
        let size = window.inner_size();
        let target = window.clone();
        self.renderer
            .initialize(SurfaceId(u64::from(window.id())), || {
                WgpuBackend::new(target, size.width, size.height)
            })
            .map_err(|e| e.to_string())?;
        let logical: LogicalSize<f32> = size.to_logical(window.scale_factor());
        self.pick
            .initialize(SurfaceRect::from_size(logical.width, logical.height));
        self.resize(&window);
        Ok(())
    }

    fn window_event(&mut self, window: &Window, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => self.resize(window),
            WindowEvent::CursorMoved { position, .. } => {
                let position = position.to_logical::<f32>(window.scale_factor());
                self.pointer.moved_to(Vec2::new(position.x, position.y));
                self.pick.on_pointer_move(self.pointer.position, &self.scene);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = button_id(*button);
                match state {
                    ElementState::Pressed => {
                        self.pointer.press(button);
                        self.pick.on_pointer_down(self.pointer.position, &self.scene);
                        self.drain_pointer_events();
                    }
                    ElementState::Released => self.pointer.release(button),
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::KeyL),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.book.set_language(self.book.language().toggled()),
            _ => {}
        }
    }

    fn redraw(&mut self, window: &Window) {
        self.drain_model_events();
        self.drain_pointer_events();
        let viewport = self.renderer.viewport();
        self.book
            .poll(&self.scene, &mut self.renderer.overlay, viewport);

        if let Err(e) = self.renderer.frame(&mut self.scene, &mut self.animations) {
            log::error!("{e}");
        }
        self.update_title(window);
    }

    fn exiting(&mut self) {
        self.renderer.teardown();
    }
}

use std::sync::Arc;

use thiserror::Error;
use winit::{
    application::ApplicationHandler,
    error::{EventLoopError, OsError},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

#[derive(Error, Debug)]
pub enum WindowError {
    #[error("event loop failed: {0}")]
    EventLoop(#[from] EventLoopError),
    #[error("could not create the window: {0}")]
    Os(#[from] OsError),
    #[error("application failed to start: {0}")]
    Startup(String),
}

/// What the runner drives. All calls happen on the main thread.
pub trait WindowApp {
    /// Called whenever the platform hands out a (new) window surface.
    fn resumed(&mut self, window: Arc<Window>) -> Result<(), String>;

    /// Every window event except redraw and close requests.
    fn window_event(&mut self, window: &Window, event: &WindowEvent);

    /// One frame.
    fn redraw(&mut self, window: &Window);

    /// Called once before the loop exits.
    fn exiting(&mut self) {}
}

// Holds the app while waiting for the OS to hand out a window
struct Runner<A: WindowApp> {
    app: A,
    title: String,
    window: Option<Arc<Window>>,
    failure: Option<WindowError>,
}

impl<A: WindowApp> Runner<A> {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: WindowError) {
        log::error!("{error}");
        self.failure = Some(error);
        event_loop.exit();
    }
}

impl<A: WindowApp> ApplicationHandler for Runner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window = match &self.window {
            Some(window) => window.clone(),
            None => {
                let attributes = Window::default_attributes().with_title(self.title.as_str());
                match event_loop.create_window(attributes) {
                    Ok(window) => {
                        let window = Arc::new(window);
                        self.window = Some(window.clone());
                        window
                    }
                    Err(e) => return self.fail(event_loop, e.into()),
                }
            }
        };

        if let Err(e) = self.app.resumed(window) {
            self.fail(event_loop, WindowError::Startup(e));
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, stopping");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                self.app.redraw(&window);
                window.request_redraw();
            }
            event => self.app.window_event(&window, &event),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.app.exiting();
    }
}

/// Opens a window titled `title` and runs `app` until the window closes.
pub fn run_app<A: WindowApp>(app: A, title: impl Into<String>) -> Result<(), WindowError> {
    let event_loop = EventLoop::new()?;

    // Continuous redraws, animations run every frame
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = Runner {
        app,
        title: title.into(),
        window: None,
        failure: None,
    };
    event_loop.run_app(&mut runner)?;

    match runner.failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

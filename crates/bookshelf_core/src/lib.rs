pub use glam;
pub use tokio;

pub mod camera;
pub mod config;
pub mod events;
pub mod time;
pub mod transform;

pub use camera::{Camera, Ray, Viewport};
pub use events::{EventBus, EventReader};
pub use transform::Transform;

/// Handle to the dedicated I/O runtime.
/// Every asynchronous fetch (assets, manifests, markdown) is spawned through it so
/// the frame loop never blocks.
#[derive(Clone, Debug)]
pub struct IoTaskPool(pub tokio::runtime::Handle);

impl IoTaskPool {
    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.0.spawn(future)
    }
}

/// Builds the multi-threaded runtime that backs [`IoTaskPool`].
/// The runtime must outlive every handle cloned from it.
pub fn build_io_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("bookshelf-io")
        .build()
}

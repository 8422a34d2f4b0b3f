use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bookshelf_core::IoTaskPool;
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;

use crate::AssetLoadError;
use crate::scene::AssetScene;

pub mod gltf_parser;

pub type AssetResult = Result<Arc<AssetScene>, AssetLoadError>;
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Where asset bytes come from. The loader guarantees at most one `load` in flight
/// per path.
#[async_trait]
pub trait AssetSource: Send + Sync + 'static {
    /// Loads and parses `path`, reporting progress as a percentage in `[0, 100]`.
    async fn load(
        &self,
        path: &str,
        progress: &(dyn Fn(f32) + Send + Sync),
    ) -> Result<AssetScene, AssetLoadError>;
}

/// Reads glTF files from disk below `root`.
pub struct GltfFileSource {
    root: PathBuf,
}

const READ_CHUNK: usize = 64 * 1024;

impl GltfFileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl AssetSource for GltfFileSource {
    async fn load(
        &self,
        path: &str,
        progress: &(dyn Fn(f32) + Send + Sync),
    ) -> Result<AssetScene, AssetLoadError> {
        let full_path = self.resolve(path);
        let io_error = |e: std::io::Error| AssetLoadError::Io {
            path: path.to_owned(),
            message: e.to_string(),
        };

        let mut file = tokio::fs::File::open(&full_path).await.map_err(io_error)?;
        let total = file.metadata().await.map_err(io_error)?.len() as usize;

        let mut bytes = Vec::with_capacity(total);
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let read = file.read(&mut chunk).await.map_err(io_error)?;
            if read == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..read]);
            if total > 0 {
                progress((bytes.len() as f32 / total as f32 * 100.0).min(100.0));
            }
        }

        let base_path = full_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("./"));
        let owned_path = path.to_owned();

        // Parsing is CPU bound, keep it off the async workers
        tokio::task::spawn_blocking(move || gltf_parser::parse_gltf(&bytes, &base_path))
            .await
            .map_err(|_| AssetLoadError::Abandoned {
                path: owned_path.clone(),
            })?
            .map_err(|message| AssetLoadError::Parse {
                path: owned_path,
                message,
            })
    }
}

enum LoadState {
    /// Nobody asked yet, or the last attempt failed.
    Idle { progress: Vec<ProgressCallback> },
    Loading {
        waiters: Vec<oneshot::Sender<AssetResult>>,
        progress: Vec<ProgressCallback>,
    },
    Loaded(Arc<AssetScene>),
}

/// Deduplicating asset cache. Cloning is cheap and every clone shares the cache.
#[derive(Clone)]
pub struct AssetLoader {
    entries: Arc<Mutex<HashMap<String, LoadState>>>,
    source: Arc<dyn AssetSource>,
    io: IoTaskPool,
}

impl AssetLoader {
    pub fn new(source: Arc<dyn AssetSource>, io: IoTaskPool) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            source,
            io,
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, LoadState>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached scene without triggering a load.
    pub fn get(&self, path: &str) -> Option<Arc<AssetScene>> {
        match self.entries().get(path) {
            Some(LoadState::Loaded(scene)) => Some(scene.clone()),
            _ => None,
        }
    }

    pub fn is_loading(&self, path: &str) -> bool {
        matches!(self.entries().get(path), Some(LoadState::Loading { .. }))
    }

    /// Registers a progress listener for `path`. Listeners survive failed attempts and
    /// are dropped once the asset is loaded.
    pub fn subscribe_progress(&self, path: &str, callback: ProgressCallback) {
        let mut entries = self.entries();
        match entries
            .entry(path.to_owned())
            .or_insert_with(|| LoadState::Idle {
                progress: Vec::new(),
            }) {
            LoadState::Idle { progress } | LoadState::Loading { progress, .. } => {
                progress.push(callback)
            }
            LoadState::Loaded(_) => {}
        }
    }

    /// Requests the asset at `path`. The first request starts the load; later ones
    /// join it. Waiters are resolved in the order they called `request`.
    pub fn request(&self, path: &str) -> impl Future<Output = AssetResult> + Send + 'static {
        let (sender, receiver) = oneshot::channel();

        let start = {
            let mut entries = self.entries();
            let state = entries
                .entry(path.to_owned())
                .or_insert_with(|| LoadState::Idle {
                    progress: Vec::new(),
                });

            match state {
                LoadState::Loaded(scene) => {
                    let _ = sender.send(Ok(scene.clone()));
                    false
                }
                LoadState::Loading { waiters, .. } => {
                    waiters.push(sender);
                    false
                }
                LoadState::Idle { progress } => {
                    let progress = std::mem::take(progress);
                    *state = LoadState::Loading {
                        waiters: vec![sender],
                        progress,
                    };
                    true
                }
            }
        };

        if start {
            log::info!("Loading asset {path}");
            self.spawn_load(path.to_owned());
        }

        let path = path.to_owned();
        async move {
            receiver
                .await
                .unwrap_or(Err(AssetLoadError::Abandoned { path }))
        }
    }

    fn spawn_load(&self, path: String) {
        let loader = self.clone();
        self.io.spawn(async move {
            let report = |value: f32| loader.report_progress(&path, value);
            let result = loader.source.load(&path, &report).await;
            loader.finish(&path, result);
        });
    }

    fn report_progress(&self, path: &str, value: f32) {
        let callbacks = match self.entries().get(path) {
            Some(LoadState::Loading { progress, .. }) => progress.clone(),
            _ => return,
        };
        log::debug!("Asset {path} progress {value:.1}");
        for callback in callbacks {
            callback(value);
        }
    }

    fn finish(&self, path: &str, result: Result<AssetScene, AssetLoadError>) {
        let (waiters, outcome) = {
            let mut entries = self.entries();
            let previous = entries.remove(path);
            let (waiters, progress) = match previous {
                Some(LoadState::Loading { waiters, progress }) => (waiters, progress),
                _ => (Vec::new(), Vec::new()),
            };

            match result {
                Ok(scene) => {
                    let scene = Arc::new(scene);
                    entries.insert(path.to_owned(), LoadState::Loaded(scene.clone()));
                    (waiters, Ok(scene))
                }
                Err(error) => {
                    // Reset so the next request retries
                    entries.insert(path.to_owned(), LoadState::Idle { progress });
                    (waiters, Err(error))
                }
            }
        };

        match &outcome {
            Ok(_) => log::info!("Asset {path} loaded"),
            Err(error) => log::error!("Error loading asset {path}: {error}"),
        }

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    struct CountingSource {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl AssetSource for CountingSource {
        async fn load(
            &self,
            path: &str,
            progress: &(dyn Fn(f32) + Send + Sync),
        ) -> Result<AssetScene, AssetLoadError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            for step in [25.0, 50.0, 100.0] {
                tokio::time::sleep(Duration::from_millis(5)).await;
                progress(step);
            }
            if self.fail_first && call == 0 {
                return Err(AssetLoadError::Io {
                    path: path.to_owned(),
                    message: "unreachable".into(),
                });
            }
            Ok(AssetScene::default())
        }
    }

    fn loader(fail_first: bool) -> (AssetLoader, Arc<CountingSource>) {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            fail_first,
        });
        let pool = IoTaskPool(tokio::runtime::Handle::current());
        (AssetLoader::new(source.clone(), pool), source)
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_load() {
        let (loader, source) = loader(false);
        let requests: Vec<_> = (0..5).map(|_| loader.request("book.glb")).collect();

        let mut scenes = Vec::new();
        for request in requests {
            scenes.push(request.await.unwrap());
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(scenes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

        // Cached now, no second load
        loader.request("book.glb").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(loader.get("book.glb").is_some());
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter_and_resets() {
        let (loader, source) = loader(true);
        let first = loader.request("bonsai.glb");
        let second = loader.request("bonsai.glb");

        assert!(matches!(first.await, Err(AssetLoadError::Io { .. })));
        assert!(matches!(second.await, Err(AssetLoadError::Io { .. })));
        assert!(!loader.is_loading("bonsai.glb"));

        loader.request("bonsai.glb").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn progress_is_forwarded_to_subscribers() {
        let (loader, _) = loader(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        loader.subscribe_progress(
            "planks.glb",
            Arc::new(move |value| sink.lock().unwrap().push(value)),
        );

        loader.request("planks.glb").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![25.0, 50.0, 100.0]);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let pool = IoTaskPool(tokio::runtime::Handle::current());
        let loader = AssetLoader::new(Arc::new(GltfFileSource::new("/nonexistent")), pool);
        let result = loader.request("models/none.glb").await;
        assert!(matches!(result, Err(AssetLoadError::Io { .. })));
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bookshelf_assets::{AssetLoadError, AssetLoader, AssetScene};
use bookshelf_core::transform::{Transform, rotation_from_degrees};
use bookshelf_core::{EventBus, EventReader, IoTaskPool};
use glam::Vec3;

use crate::ConfigFetchError;
use crate::config::{ConfigSource, ModelConfig};
use crate::metadata::Focusable;

/// A model whose asset finished loading, with its configured pose resolved.
#[derive(Clone, Debug)]
pub struct LoadedModel {
    pub model: Arc<ModelConfig>,
    pub placement: Transform,
    pub focusable: Option<Focusable>,
    pub asset: Arc<AssetScene>,
}

#[derive(Clone, Debug)]
pub enum ModelEvent {
    /// `name` is the display name.
    Progress { name: String, progress: f32 },
    Loaded(LoadedModel),
    Error {
        model: Arc<ModelConfig>,
        error: AssetLoadError,
    },
    InitializationFailed(ConfigFetchError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum RegistryStatus {
    Idle,
    Fetching,
    Ready { models: usize },
    Failed(ConfigFetchError),
}

/// Resolves the configured pose. Absent fields leave the asset's own value.
pub fn placement_for(model: &ModelConfig) -> Transform {
    let mut transform = Transform::default();
    if let Some(location) = model.location {
        transform.translation = Vec3::from_array(location);
    }
    if let Some(rotation) = model.rotation {
        transform.rotation = rotation_from_degrees(rotation);
    }
    if let Some(scale) = model.scale {
        transform.scale = Vec3::splat(scale);
    }
    transform
}

// Clamps reports into [0, 100] and drops regressions and anything after the
// terminal event.
#[derive(Default)]
struct ProgressGate {
    last: f32,
    finished: bool,
}

impl ProgressGate {
    fn admit(&mut self, progress: f32) -> Option<f32> {
        if self.finished || !progress.is_finite() {
            return None;
        }
        let progress = progress.clamp(0.0, 100.0);
        if progress < self.last {
            return None;
        }
        self.last = progress;
        Some(progress)
    }
}

/// Fetches the model list once and drives one asset request per model.
pub struct ModelRegistry {
    loader: AssetLoader,
    config: Arc<dyn ConfigSource>,
    io: IoTaskPool,
    events: Arc<EventBus<ModelEvent>>,
    started: AtomicBool,
    status: Arc<Mutex<RegistryStatus>>,
}

impl ModelRegistry {
    pub fn new(loader: AssetLoader, config: Arc<dyn ConfigSource>, io: IoTaskPool) -> Self {
        Self {
            loader,
            config,
            io,
            events: Arc::new(EventBus::new()),
            started: AtomicBool::new(false),
            status: Arc::new(Mutex::new(RegistryStatus::Idle)),
        }
    }

    pub fn subscribe(&self) -> EventReader<ModelEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> RegistryStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Starts loading every configured model. Only the first call does anything.
    pub fn initialize(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            log::warn!("Model registry already initialized");
            return;
        }
        set_status(&self.status, RegistryStatus::Fetching);

        let loader = self.loader.clone();
        let config = self.config.clone();
        let events = self.events.clone();
        let status = self.status.clone();
        let io = self.io.clone();

        self.io.spawn(async move {
            let models = match config.models().await {
                Ok(models) => models,
                Err(error) => {
                    log::error!("Failed to fetch model configuration: {error}");
                    set_status(&status, RegistryStatus::Failed(error.clone()));
                    events.emit(ModelEvent::InitializationFailed(error));
                    return;
                }
            };

            log::debug!("Loaded model configuration: {} models", models.len());
            set_status(&status, RegistryStatus::Ready { models: models.len() });

            for model in models {
                load_model(&loader, &io, &events, Arc::new(model));
            }
        });
    }
}

fn set_status(status: &Mutex<RegistryStatus>, value: RegistryStatus) {
    *status.lock().unwrap_or_else(PoisonError::into_inner) = value;
}

fn load_model(
    loader: &AssetLoader,
    io: &IoTaskPool,
    events: &Arc<EventBus<ModelEvent>>,
    model: Arc<ModelConfig>,
) {
    let gate = Arc::new(Mutex::new(ProgressGate::default()));

    let progress_events = events.clone();
    let progress_gate = gate.clone();
    let display_name = model.display_name.clone();
    loader.subscribe_progress(
        &model.path,
        Arc::new(move |progress| {
            let admitted = progress_gate
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .admit(progress);
            if let Some(progress) = admitted {
                progress_events.emit(ModelEvent::Progress {
                    name: display_name.clone(),
                    progress,
                });
            }
        }),
    );

    let request = loader.request(&model.path);
    let events = events.clone();
    io.spawn(async move {
        let result = request.await;
        gate.lock().unwrap_or_else(PoisonError::into_inner).finished = true;

        match result {
            Ok(asset) => {
                log::info!("Model loaded: {}", model.display_name);
                events.emit(ModelEvent::Loaded(LoadedModel {
                    placement: placement_for(&model),
                    focusable: model.focusable.as_ref().map(Focusable::from_config),
                    model,
                    asset,
                }));
            }
            Err(error) => {
                log::error!("Failed to load model {}: {error}", model.display_name);
                events.emit(ModelEvent::Error { model, error });
            }
        }
    });
}

use std::sync::Arc;

use bookshelf_core::{EventBus, EventReader, IoTaskPool};
use glam::Vec3;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::config::{ConfigSource, ModelConfig, PageDescriptor, PageTable};
use crate::graph::NodeId;
use crate::metadata::{AnimationBinding, NodeMetadata};
use crate::registry::LoadedModel;
use crate::{ConfigFetchError, SceneContext};

#[derive(Clone, Debug)]
pub enum SceneEvent {
    /// One per inserted object, so one per clone for template models.
    ModelLoaded {
        node: NodeId,
        model: Arc<ModelConfig>,
    },
}

enum PageTableState {
    NotRequested,
    Fetching,
    Ready(PageTable),
    Failed,
}

/// Turns loaded models into scene objects. Runs on the main thread; the page table
/// is fetched on the I/O pool the first time a template model shows up.
pub struct SceneAssembly {
    config: Arc<dyn ConfigSource>,
    io: IoTaskPool,
    pages: PageTableState,
    page_sender: UnboundedSender<Result<PageTable, ConfigFetchError>>,
    page_receiver: UnboundedReceiver<Result<PageTable, ConfigFetchError>>,
    pending_templates: Vec<LoadedModel>,
    events: EventBus<SceneEvent>,
}

impl SceneAssembly {
    pub fn new(config: Arc<dyn ConfigSource>, io: IoTaskPool) -> Self {
        let (page_sender, page_receiver) = unbounded_channel();
        Self {
            config,
            io,
            pages: PageTableState::NotRequested,
            page_sender,
            page_receiver,
            pending_templates: Vec::new(),
            events: EventBus::new(),
        }
    }

    pub fn subscribe(&self) -> EventReader<SceneEvent> {
        self.events.subscribe()
    }

    pub fn pending_templates(&self) -> usize {
        self.pending_templates.len()
    }

    pub fn handle_loaded(&mut self, loaded: LoadedModel, scene: &mut SceneContext) {
        if loaded.model.template.is_none() {
            self.insert_model(&loaded, scene);
            return;
        }

        if let PageTableState::Ready(pages) = &self.pages {
            let pages = pages.get(&loaded.model.name).cloned();
            self.insert_template(&loaded, pages.as_deref(), scene);
            return;
        }

        if matches!(self.pages, PageTableState::Failed) {
            log::warn!(
                "Skipping template model {}: page list unavailable",
                loaded.model.name
            );
            return;
        }

        self.pending_templates.push(loaded);
        if matches!(self.pages, PageTableState::NotRequested) {
            self.fetch_pages();
        }
    }

    /// Drains the page table fetch. Call once per frame.
    pub fn poll(&mut self, scene: &mut SceneContext) {
        while let Ok(result) = self.page_receiver.try_recv() {
            match result {
                Ok(pages) => {
                    log::debug!("Page list loaded for {} models", pages.len());
                    for loaded in std::mem::take(&mut self.pending_templates) {
                        let model_pages = pages.get(&loaded.model.name).cloned();
                        self.insert_template(&loaded, model_pages.as_deref(), scene);
                    }
                    self.pages = PageTableState::Ready(pages);
                }
                Err(error) => {
                    log::error!("Failed to fetch page list: {error}");
                    for loaded in self.pending_templates.drain(..) {
                        log::warn!("Skipping template model {}", loaded.model.name);
                    }
                    self.pages = PageTableState::Failed;
                }
            }
        }
    }

    fn fetch_pages(&mut self) {
        self.pages = PageTableState::Fetching;
        let config = self.config.clone();
        let sender = self.page_sender.clone();
        self.io.spawn(async move {
            let _ = sender.send(config.pages().await);
        });
    }

    fn instantiate(&self, loaded: &LoadedModel, scene: &mut SceneContext) -> NodeId {
        let node = scene.graph.instantiate(&loaded.asset);
        scene.graph.rename(node, loaded.model.name.clone());
        scene.graph.set_transform(node, loaded.placement);
        node
    }

    fn metadata(loaded: &LoadedModel, page: Option<PageDescriptor>) -> NodeMetadata {
        NodeMetadata {
            name: loaded.model.name.clone(),
            focusable: loaded.focusable,
            animation: loaded.model.animation.as_ref().map(AnimationBinding::from),
            page,
            page_surface: loaded.model.page_surface.clone().unwrap_or_default(),
        }
    }

    fn insert_model(&self, loaded: &LoadedModel, scene: &mut SceneContext) {
        let node = self.instantiate(loaded, scene);
        scene.graph.set_metadata(node, Self::metadata(loaded, None));
        scene.graph.insert(node);
        log::debug!("Model {} added to scene", loaded.model.display_name);
        self.events.emit(SceneEvent::ModelLoaded {
            node,
            model: loaded.model.clone(),
        });
    }

    fn insert_template(
        &self,
        loaded: &LoadedModel,
        pages: Option<&[PageDescriptor]>,
        scene: &mut SceneContext,
    ) {
        let pages = match pages {
            Some(pages) if !pages.is_empty() => pages,
            _ => {
                log::warn!("No pages found for template model {}", loaded.model.name);
                return;
            }
        };
        let offset = loaded
            .model
            .template
            .as_ref()
            .map(|template| Vec3::from_array(template.offset))
            .unwrap_or(Vec3::ZERO);

        let base = self.instantiate(loaded, scene);
        for (index, page) in pages.iter().enumerate() {
            let Some(clone) = scene.graph.clone_subtree(base) else {
                continue;
            };
            scene
                .graph
                .update_transform(clone, |t| t.translation += offset * index as f32);
            scene
                .graph
                .set_metadata(clone, Self::metadata(loaded, Some(page.clone())));
            scene.graph.insert(clone);
            log::debug!(
                "Model {} added to scene (template clone {index})",
                loaded.model.display_name
            );
            self.events.emit(SceneEvent::ModelLoaded {
                node: clone,
                model: loaded.model.clone(),
            });
        }
        scene.graph.despawn(base);
    }
}

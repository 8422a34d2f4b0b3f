use bookshelf_core::transform::rotation_from_degrees;
use flecs_ecs::prelude::*;
use glam::{Quat, Vec3};

use crate::config::{
    AnimationConfig, ClipOptions, FocusableConfig, PageDescriptor, PageSurfaceConfig,
};
use crate::graph::{NodeId, SceneGraph};

pub const DEFAULT_FOCUS_DISTANCE: f32 = 1.5;

/// Resolved focus pose parameters.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Focusable {
    pub rotation: Quat,
    pub offset_position: Option<Vec3>,
    pub distance: Option<f32>,
}

impl Focusable {
    pub fn from_config(config: &FocusableConfig) -> Self {
        Self {
            rotation: config
                .rotation
                .map(rotation_from_degrees)
                .unwrap_or(Quat::IDENTITY),
            offset_position: config.offset_position.map(Vec3::from_array),
            distance: config.distance,
        }
    }

    pub fn distance(&self) -> f32 {
        self.distance.unwrap_or(DEFAULT_FOCUS_DISTANCE)
    }
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct AnimationBinding {
    pub state_key: String,
    pub options: ClipOptions,
    /// Open/closed toggle.
    pub open: bool,
}

impl From<&AnimationConfig> for AnimationBinding {
    fn from(config: &AnimationConfig) -> Self {
        Self {
            state_key: config.state.clone(),
            options: config.options,
            open: false,
        }
    }
}

/// Model name of a top-level object, the key used for animation clips and page lists.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct ModelName(pub String);

/// Everything the scene knows about a top-level object, gathered from its components.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetadata {
    pub name: String,
    pub focusable: Option<Focusable>,
    pub animation: Option<AnimationBinding>,
    pub page: Option<PageDescriptor>,
    pub page_surface: PageSurfaceConfig,
}

impl NodeMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            focusable: None,
            animation: None,
            page: None,
            page_surface: PageSurfaceConfig::default(),
        }
    }
}

impl SceneGraph {
    /// Stores `metadata` as components of `id`, replacing what was there.
    pub fn set_metadata(&mut self, id: NodeId, metadata: NodeMetadata) {
        let Some(entity) = self.view(id) else {
            return;
        };
        entity
            .set(ModelName(metadata.name))
            .set(metadata.page_surface);
        match metadata.focusable {
            Some(focusable) => entity.set(focusable),
            None => entity.remove(Focusable::id()),
        };
        match metadata.animation {
            Some(animation) => entity.set(animation),
            None => entity.remove(AnimationBinding::id()),
        };
        match metadata.page {
            Some(page) => entity.set(page),
            None => entity.remove(PageDescriptor::id()),
        };
    }

    /// The metadata of a top-level object, `None` for nodes that carry none.
    pub fn metadata(&self, id: NodeId) -> Option<NodeMetadata> {
        Some(NodeMetadata {
            name: self.model_name(id)?,
            focusable: self.focusable(id),
            animation: self.animation(id),
            page: self.page(id),
            page_surface: self.page_surface(id),
        })
    }

    pub fn model_name(&self, id: NodeId) -> Option<String> {
        self.view(id)?.try_get::<&ModelName>(|name| name.0.clone())
    }

    pub fn focusable(&self, id: NodeId) -> Option<Focusable> {
        self.view(id)?.try_get::<&Focusable>(|focusable| *focusable)
    }

    pub fn animation(&self, id: NodeId) -> Option<AnimationBinding> {
        self.view(id)?.try_get::<&AnimationBinding>(|binding| binding.clone())
    }

    /// Flips the stored open/closed state. Returns false when `id` has no binding.
    pub fn set_animation_open(&mut self, id: NodeId, open: bool) -> bool {
        self.view(id)
            .and_then(|entity| entity.try_get::<&mut AnimationBinding>(|binding| binding.open = open))
            .is_some()
    }

    pub fn page(&self, id: NodeId) -> Option<PageDescriptor> {
        self.view(id)?.try_get::<&PageDescriptor>(|page| page.clone())
    }

    pub fn page_surface(&self, id: NodeId) -> PageSurfaceConfig {
        self.view(id)
            .and_then(|entity| entity.try_get::<&PageSurfaceConfig>(|surface| surface.clone()))
            .unwrap_or_default()
    }
}

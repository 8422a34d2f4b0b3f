use bookshelf_core::Camera;
use thiserror::Error;

pub mod assembly;
pub mod config;
pub mod graph;
pub mod metadata;
pub mod registry;

pub use assembly::{SceneAssembly, SceneEvent};
pub use config::{
    ClipOptions, ConfigSource, FileConfigSource, ModelConfig, PageDescriptor, PageSurfaceConfig,
};
pub use graph::{MeshRef, NodeId, NodeName, SceneGraph, SceneNode};
pub use metadata::{AnimationBinding, Focusable, ModelName, NodeMetadata};
pub use registry::{LoadedModel, ModelEvent, ModelRegistry, RegistryStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigFetchError {
    #[error("configuration {document} unreachable: {message}")]
    Unreachable { document: String, message: String },
    #[error("configuration {document} is invalid: {message}")]
    Invalid { document: String, message: String },
}

/// The live scene: the node world and the camera. Owned by the app and lent to each
/// service.
#[derive(Default)]
pub struct SceneContext {
    pub graph: SceneGraph,
    pub camera: Camera,
}

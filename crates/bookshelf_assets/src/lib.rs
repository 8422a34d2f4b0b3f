use thiserror::Error;

pub mod asset_server;
pub mod assets;
pub mod scene;

pub use asset_server::{AssetLoader, AssetResult, AssetSource, GltfFileSource, ProgressCallback};
pub use assets::{Aabb, Handle, MeshData, Vertex};
pub use scene::{AnimationClip, AssetNode, AssetScene, Interpolation, Track, TrackValues};

/// Cloned out to every waiter of a failed load, hence string payloads.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssetLoadError {
    #[error("failed to read asset {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse asset {path}: {message}")]
    Parse { path: String, message: String },
    #[error("load of asset {path} was abandoned")]
    Abandoned { path: String },
}

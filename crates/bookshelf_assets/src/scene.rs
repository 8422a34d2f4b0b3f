use std::sync::Arc;

use bookshelf_core::transform::Transform;
use glam::{Quat, Vec3};

use crate::assets::{Handle, MeshData};

/// A parsed, immutable scene. Shared between every instance placed in the world.
#[derive(Clone, Debug, Default)]
pub struct AssetScene {
    pub meshes: Vec<(Handle<MeshData>, Arc<MeshData>)>,
    // The Nodes (Entities)
    pub nodes: Vec<AssetNode>,
    /// Indices of the nodes that have no parent in the default scene.
    pub roots: Vec<usize>,
    pub animations: Vec<AnimationClip>,
}

#[derive(Clone, Debug)]
pub struct AssetNode {
    pub name: String,
    pub transform: Transform,
    pub mesh_index: Option<usize>, // Index into the meshes list above
    pub children: Vec<usize>,
}

impl AssetScene {
    pub fn mesh(&self, node: &AssetNode) -> Option<&(Handle<MeshData>, Arc<MeshData>)> {
        node.mesh_index.and_then(|index| self.meshes.get(index))
    }

    pub fn has_animations(&self) -> bool {
        !self.animations.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
}

#[derive(Clone, Debug)]
pub enum TrackValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

impl TrackValues {
    pub fn len(&self) -> usize {
        match self {
            TrackValues::Translation(values) | TrackValues::Scale(values) => values.len(),
            TrackValues::Rotation(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keyframes for one property of one node, bound by node name.
#[derive(Clone, Debug)]
pub struct Track {
    pub target: String,
    pub interpolation: Interpolation,
    pub times: Vec<f32>,
    pub values: TrackValues,
}

#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    /// Seconds, the last keyframe time over all tracks.
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks
            .iter()
            .filter_map(|track| track.times.last().copied())
            .fold(0.0, f32::max);
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }
}

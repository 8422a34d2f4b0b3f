use std::path::Path;
use std::sync::Arc;

use bookshelf_core::transform::Transform;
use glam::{Quat, Vec3};
use gltf::animation::util::ReadOutputs;

use crate::assets::{Aabb, Handle, MeshData, Vertex};
use crate::scene::{AnimationClip, AssetNode, AssetScene, Interpolation, Track, TrackValues};

/// Parses a `.gltf` or `.glb` document already read into memory.
/// External buffers are resolved relative to `base_path`.
pub fn parse_gltf(bytes: &[u8], base_path: &Path) -> Result<AssetScene, String> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes).map_err(|e| e.to_string())?;
    let buffers =
        gltf::import_buffers(&document, Some(base_path), blob).map_err(|e| e.to_string())?;

    // --- MESHES ---
    let mut meshes = Vec::new();
    for mesh in document.meshes() {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        let mut base_color = [1.0; 4];

        // Primitives are merged, their indices rebased onto the shared vertex list
        for (i, primitive) in mesh.primitives().enumerate() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .map(|iter| iter.collect())
                .ok_or("Mesh missing positions")?;

            let normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|iter| iter.collect())
                .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);

            let base = vertices.len() as u32;
            let primitive_indices: Vec<u32> = reader
                .read_indices()
                .map(|read| read.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());

            vertices.extend(
                positions
                    .iter()
                    .zip(normals.iter().chain(std::iter::repeat(&[0.0, 1.0, 0.0])))
                    .map(|(position, normal)| Vertex {
                        position: *position,
                        normal: *normal,
                    }),
            );
            indices.extend(primitive_indices.into_iter().map(|index| index + base));

            if i == 0 {
                base_color = primitive
                    .material()
                    .pbr_metallic_roughness()
                    .base_color_factor();
            }
        }

        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from_array(v.position)))
            .unwrap_or(Aabb {
                min: Vec3::ZERO,
                max: Vec3::ZERO,
            });

        meshes.push((
            Handle::new(),
            Arc::new(MeshData {
                vertices,
                indices,
                base_color,
                bounds,
            }),
        ));
    }

    // --- NODES (The Hierarchy) ---
    let nodes: Vec<AssetNode> = document
        .nodes()
        .map(|node| {
            let (t, r, s) = node.transform().decomposed();
            AssetNode {
                name: node_name(&node),
                transform: Transform {
                    translation: t.into(),
                    rotation: Quat::from_array(r),
                    scale: s.into(),
                },
                mesh_index: node.mesh().map(|m| m.index()),
                children: node.children().map(|c| c.index()).collect(),
            }
        })
        .collect();

    let roots = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().map(|n| n.index()).collect(),
        None => {
            let mut has_parent = vec![false; nodes.len()];
            for node in &nodes {
                for &child in &node.children {
                    has_parent[child] = true;
                }
            }
            (0..nodes.len()).filter(|&i| !has_parent[i]).collect()
        }
    };

    // --- ANIMATIONS ---
    let mut animations = Vec::new();
    for animation in document.animations() {
        let mut tracks = Vec::new();

        for channel in animation.channels() {
            let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(times) = reader.read_inputs().map(|iter| iter.collect::<Vec<f32>>()) else {
                continue;
            };
            let Some(outputs) = reader.read_outputs() else {
                continue;
            };

            let cubic = channel.sampler().interpolation()
                == gltf::animation::Interpolation::CubicSpline;
            let interpolation = match channel.sampler().interpolation() {
                gltf::animation::Interpolation::Step => Interpolation::Step,
                _ => Interpolation::Linear,
            };

            let values = match outputs {
                ReadOutputs::Translations(iter) => {
                    TrackValues::Translation(keyframe_values(iter.map(Vec3::from_array), cubic))
                }
                ReadOutputs::Rotations(iter) => TrackValues::Rotation(keyframe_values(
                    iter.into_f32().map(Quat::from_array),
                    cubic,
                )),
                ReadOutputs::Scales(iter) => {
                    TrackValues::Scale(keyframe_values(iter.map(Vec3::from_array), cubic))
                }
                ReadOutputs::MorphTargetWeights(_) => continue,
            };

            if values.len() != times.len() {
                log::warn!(
                    "Skipping animation channel on {}: {} keys for {} values",
                    node_name(&channel.target().node()),
                    times.len(),
                    values.len()
                );
                continue;
            }

            tracks.push(Track {
                target: node_name(&channel.target().node()),
                interpolation,
                times,
                values,
            });
        }

        let name = animation
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("animation{}", animation.index()));
        animations.push(AnimationClip::new(name, tracks));
    }

    Ok(AssetScene {
        meshes,
        nodes,
        roots,
        animations,
    })
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("node{}", node.index()))
}

// Cubic spline outputs come as (in-tangent, value, out-tangent) triples. Only the
// values are kept and the track is sampled linearly.
fn keyframe_values<T>(values: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.skip(1).step_by(3).collect()
    } else {
        values.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubic_spline_keeps_middle_values() {
        let values = keyframe_values([0, 1, 2, 10, 11, 12].into_iter(), true);
        assert_eq!(values, vec![1, 11]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_gltf(b"not a gltf file", Path::new(".")).is_err());
    }

    #[test]
    fn minimal_document_has_root_node() {
        let json = br#"{
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [ { "nodes": [0] } ],
            "nodes": [
                { "name": "Book", "children": [1], "translation": [1.0, 2.0, 3.0] },
                { "name": "Cover" }
            ]
        }"#;
        let scene = parse_gltf(json, Path::new(".")).unwrap();
        assert_eq!(scene.roots, vec![0]);
        assert_eq!(scene.nodes[0].name, "Book");
        assert_eq!(scene.nodes[0].children, vec![1]);
        assert_eq!(scene.nodes[0].transform.translation, Vec3::new(1.0, 2.0, 3.0));
        assert!(scene.meshes.is_empty());
        assert!(!scene.has_animations());
    }
}

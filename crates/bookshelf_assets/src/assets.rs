use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use glam::{Mat4, Vec3};
use uuid::Uuid;

// It's just a unique number. Efficient to copy.
#[derive(Debug)]
pub struct Handle<T> {
    pub id: Uuid,
    marker: PhantomData<T>,
}

impl<T> Handle<T> {
    pub fn new() -> Self {
        Self::from_id(Uuid::new_v4())
    }

    pub fn from_id(id: Uuid) -> Self {
        Self {
            id,
            marker: PhantomData,
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self::from_id(self.id)
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

// Crucial for using Handle in HashMaps
impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Only the id takes part, the marker is ignored
        self.id.cmp(&other.id)
    }
}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Axis-aligned box in mesh-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Corners moved into another space by `matrix`.
    pub fn transformed_corners(&self, matrix: Mat4) -> [Vec3; 8] {
        self.corners().map(|corner| matrix.transform_point3(corner))
    }
}

/// All primitives of one glTF mesh merged into a single indexed triangle list.
#[derive(Debug, Clone)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub base_color: [f32; 4],
    pub bounds: Aabb,
}

impl MeshData {
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let vertex = |i: u32| {
                self.vertices
                    .get(i as usize)
                    .map(|v| Vec3::from_array(v.position))
            };
            Some([vertex(tri[0])?, vertex(tri[1])?, vertex(tri[2])?])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_equality_ignores_marker() {
        let handle = Handle::<MeshData>::new();
        assert_eq!(handle, handle.clone());
        assert_ne!(handle, Handle::<MeshData>::new());
    }

    #[test]
    fn aabb_encloses_points() {
        let aabb = Aabb::from_points([
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(-2.0, 3.0, 0.5),
            Vec3::ZERO,
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-2.0, -1.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 0.5));
        assert_eq!(aabb.size(), Vec3::new(3.0, 4.0, 0.5));
    }

    #[test]
    fn out_of_range_indices_are_skipped() {
        let mesh = MeshData {
            vertices: vec![
                Vertex { position: [0.0; 3], normal: [0.0, 1.0, 0.0] },
                Vertex { position: [1.0, 0.0, 0.0], normal: [0.0, 1.0, 0.0] },
                Vertex { position: [0.0, 0.0, 1.0], normal: [0.0, 1.0, 0.0] },
            ],
            indices: vec![0, 1, 2, 0, 1, 9],
            base_color: [1.0; 4],
            bounds: Aabb { min: Vec3::ZERO, max: Vec3::ONE },
        };
        assert_eq!(mesh.triangles().count(), 1);
    }
}

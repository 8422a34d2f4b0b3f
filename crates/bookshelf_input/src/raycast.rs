use bookshelf_assets::{Aabb, MeshData};
use bookshelf_core::Ray;
use bookshelf_scene::{NodeId, SceneGraph};
use glam::{Mat4, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    /// The mesh node that was hit, not its top-level object.
    pub node: NodeId,
    /// World-space distance from the ray origin.
    pub distance: f32,
    pub point: Vec3,
}

/// Möller–Trumbore. Returns the ray parameter of the hit.
pub fn ray_intersect_triangle(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let eps = 1.0e-7;
    let edge1 = b - a;
    let edge2 = c - a;
    let pvec = dir.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < eps {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(edge1);
    let v = dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(qvec) * inv_det;
    if t > eps { Some(t) } else { None }
}

/// Slab test. Returns the entry parameter, or the exit one when starting inside.
pub fn ray_aabb_hit_t(origin: Vec3, dir: Vec3, aabb: &Aabb) -> Option<f32> {
    let inv = dir.recip();
    let t1 = (aabb.min - origin) * inv;
    let t2 = (aabb.max - origin) * inv;

    let tmin = t1.min(t2).max_element();
    let tmax = t1.max(t2).min_element();

    if tmax.is_nan() || tmin.is_nan() || tmax < 0.0 || tmin > tmax {
        return None;
    }
    Some(if tmin >= 0.0 { tmin } else { tmax })
}

/// Nearest hit of `ray` (world space) against a mesh placed by `world`.
pub fn intersect_mesh(ray: &Ray, world: Mat4, mesh: &MeshData) -> Option<(f32, Vec3)> {
    let inverse = world.inverse();
    if !inverse.is_finite() {
        return None;
    }
    // Local-space ray keeps the world scale in its direction, so t is not a distance
    let origin = inverse.transform_point3(ray.origin);
    let dir = inverse.transform_vector3(ray.direction);

    ray_aabb_hit_t(origin, dir, &mesh.bounds)?;

    let t = mesh
        .triangles()
        .filter_map(|[a, b, c]| ray_intersect_triangle(origin, dir, a, b, c))
        .min_by(f32::total_cmp)?;

    let point = world.transform_point3(origin + dir * t);
    Some(((point - ray.origin).length(), point))
}

/// Every hit against in-scene meshes, nearest first.
pub fn intersect_scene(ray: &Ray, graph: &SceneGraph) -> Vec<Hit> {
    let mut hits: Vec<Hit> = graph
        .renderables()
        .into_iter()
        .filter_map(|(node, world, mesh)| {
            intersect_mesh(ray, world, &mesh.data).map(|(distance, point)| Hit {
                node,
                distance,
                point,
            })
        })
        .collect();
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_hit_and_miss() {
        let (a, b, c) = (Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let origin = Vec3::new(0.0, 0.0, 5.0);
        assert_eq!(ray_intersect_triangle(origin, -Vec3::Z, a, b, c), Some(5.0));
        assert_eq!(ray_intersect_triangle(origin, Vec3::Z, a, b, c), None);
        assert_eq!(ray_intersect_triangle(Vec3::new(3.0, 0.0, 5.0), -Vec3::Z, a, b, c), None);
    }

    #[test]
    fn aabb_from_outside_and_inside() {
        let aabb = Aabb {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        assert_eq!(ray_aabb_hit_t(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z, &aabb), Some(4.0));
        assert_eq!(ray_aabb_hit_t(Vec3::ZERO, Vec3::X, &aabb), Some(1.0));
        assert_eq!(ray_aabb_hit_t(Vec3::new(0.0, 3.0, 5.0), -Vec3::Z, &aabb), None);
    }
}

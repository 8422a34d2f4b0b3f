use glam::{Mat4, Vec2, Vec3};

use crate::transform::Transform;

/// Size of the drawing surface in logical (CSS) pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height <= 0.0 {
            1.0
        } else {
            self.width / self.height
        }
    }

    /// Maps a pixel position inside the viewport to normalized device coordinates.
    /// Y grows upwards in NDC and downwards in pixels.
    pub fn to_ndc(&self, pixel: Vec2) -> Vec2 {
        Vec2::new(
            (pixel.x / self.width) * 2.0 - 1.0,
            -(pixel.y / self.height) * 2.0 + 1.0,
        )
    }

    pub fn to_pixels(&self, ndc: Vec2) -> Vec2 {
        Vec2::new(
            (ndc.x + 1.0) / 2.0 * self.width,
            (-ndc.y + 1.0) / 2.0 * self.height,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Always normalized.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

#[derive(Clone, Debug)]
pub struct Camera {
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    pub transform: Transform,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: 60.0f32.to_radians(),
            aspect_ratio: 1.0,
            near: 0.1,
            far: 1000.0,
            transform: Transform::default(),
        }
    }
}

impl Camera {
    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    /// World-space viewing direction (-Z of the camera).
    pub fn forward(&self) -> Vec3 {
        self.transform.forward()
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.transform = self.transform.looking_at(target, Vec3::Y);
    }

    /// Computes the "Projection Matrix" (View -> Clip)
    pub fn compute_projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
    }

    pub fn compute_view_matrix(&self) -> Mat4 {
        self.transform.compute_matrix().inverse()
    }

    pub fn compute_view_projection(&self) -> Mat4 {
        self.compute_projection_matrix() * self.compute_view_matrix()
    }

    /// Projects a world position into normalized device coordinates.
    pub fn project(&self, point: Vec3) -> Vec3 {
        self.compute_view_projection().project_point3(point)
    }

    /// Ray leaving the camera through a point given in NDC.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inverse = self.compute_view_projection().inverse();
        let through = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 0.5));
        let origin = self.position();
        Ray::new(origin, through - origin)
    }

    /// On-screen pixel extent of a set of world points.
    pub fn screen_size(&self, points: &[Vec3], viewport: Viewport) -> Vec2 {
        if points.is_empty() {
            return Vec2::ZERO;
        }

        let view_projection = self.compute_view_projection();
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);

        for point in points {
            let ndc = view_projection.project_point3(*point);
            let screen = viewport.to_pixels(ndc.truncate());
            min = min.min(screen);
            max = max.max(screen);
        }

        max - min
    }

    /// World-space height covered by the view frustum at `distance` from the camera.
    pub fn visible_height_at(&self, distance: f32) -> f32 {
        2.0 * (self.fov / 2.0).tan() * distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_at_origin() -> Camera {
        Camera {
            aspect_ratio: 2.0,
            ..Default::default()
        }
    }

    #[test]
    fn center_ray_goes_forward() {
        let camera = camera_at_origin();
        let ray = camera.ray_from_ndc(Vec2::ZERO);
        assert!(ray.direction.abs_diff_eq(-Vec3::Z, 1e-4));
        assert!(ray.origin.abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn projected_point_lies_on_its_ray() {
        let camera = camera_at_origin();
        let point = Vec3::new(0.4, -0.3, -4.0);
        let ndc = camera.project(point);
        let ray = camera.ray_from_ndc(ndc.truncate());
        let distance = (point - ray.origin).length();
        assert!(ray.at(distance).abs_diff_eq(point, 1e-3));
    }

    #[test]
    fn ndc_pixel_conversion_is_symmetric() {
        let viewport = Viewport::new(800.0, 600.0);
        let pixel = Vec2::new(200.0, 150.0);
        let ndc = viewport.to_ndc(pixel);
        assert!(ndc.abs_diff_eq(Vec2::new(-0.5, 0.5), 1e-6));
        assert!(viewport.to_pixels(ndc).abs_diff_eq(pixel, 1e-4));
    }

    #[test]
    fn screen_size_shrinks_with_distance() {
        let camera = camera_at_origin();
        let viewport = Viewport::new(800.0, 400.0);
        let quad = |z: f32| {
            [
                Vec3::new(-0.5, -0.5, z),
                Vec3::new(0.5, -0.5, z),
                Vec3::new(-0.5, 0.5, z),
                Vec3::new(0.5, 0.5, z),
            ]
        };
        let near = camera.screen_size(&quad(-2.0), viewport);
        let far = camera.screen_size(&quad(-4.0), viewport);
        assert!((near.y / far.y - 2.0).abs() < 1e-3);
    }
}

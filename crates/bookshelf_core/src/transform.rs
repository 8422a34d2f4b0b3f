use flecs_ecs::macros::Component;
use glam::{Mat4, Quat, Vec3};

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self {
            translation: Vec3::new(x, y, z),
            ..Default::default()
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Default::default()
        }
    }

    /// Decomposes an affine matrix. Shear is lost.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Rotates the object around the Y axis (Global Up)
    pub fn rotate_y(&mut self, angle_radians: f32) {
        let rotation = Quat::from_rotation_y(angle_radians);
        self.rotation = self.rotation * rotation;
    }

    /// Makes the transform look at a target position.
    /// The local -Z axis ends up pointing at `target`.
    pub fn looking_at(mut self, target: Vec3, up: Vec3) -> Self {
        // look_at_rh builds a view matrix, so invert it to get the object rotation
        let mat = Mat4::look_at_rh(self.translation, target, up);
        self.rotation = Quat::from_mat4(&mat.inverse()).normalize();
        self
    }

    // --- Matrices ---

    /// Creates the Model Matrix (Local -> Parent)
    pub fn compute_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    // --- Directions ---

    /// Returns the "Forward" direction (-Z) relative to current rotation
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Returns the "Right" direction (+X) relative to current rotation
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Returns the "Up" direction (+Y) relative to current rotation
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

/// Converts Euler angles in degrees, applied in XYZ order, to a quaternion.
/// This is the rotation format used by every manifest.
pub fn rotation_from_degrees(degrees: [f32; 3]) -> Quat {
    let [x, y, z] = degrees.map(f32::to_radians);
    Quat::from_rotation_x(x) * Quat::from_rotation_y(y) * Quat::from_rotation_z(z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_round_trip_keeps_pose() {
        let transform = Transform {
            translation: Vec3::new(1.0, -2.0, 3.5),
            rotation: Quat::from_rotation_y(0.7),
            scale: Vec3::splat(2.0),
        };
        let back = Transform::from_matrix(transform.compute_matrix());
        assert!(back.translation.abs_diff_eq(transform.translation, 1e-5));
        assert!(back.rotation.abs_diff_eq(transform.rotation, 1e-5));
        assert!(back.scale.abs_diff_eq(transform.scale, 1e-5));
    }

    #[test]
    fn looking_at_points_forward_at_target() {
        let transform = Transform::from_xyz(0.0, 0.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y);
        assert!(transform.forward().abs_diff_eq(-Vec3::Z, 1e-5));
    }

    #[test]
    fn degrees_rotation_matches_single_axis() {
        let q = rotation_from_degrees([0.0, 90.0, 0.0]);
        assert!(q.abs_diff_eq(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2), 1e-6));
    }
}

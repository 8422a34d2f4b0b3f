use bookshelf_assets::{Interpolation, Track, TrackValues};
use bookshelf_core::transform::Transform;
use glam::{Quat, Vec3};

/// Writes the value of `track` at `time` into `transform`.
pub fn apply_track(track: &Track, time: f32, transform: &mut Transform) {
    let Some((index, factor)) = locate(&track.times, time, track.interpolation) else {
        return;
    };

    match &track.values {
        TrackValues::Translation(values) => {
            transform.translation = sample_vec3(values, index, factor);
        }
        TrackValues::Scale(values) => {
            transform.scale = sample_vec3(values, index, factor);
        }
        TrackValues::Rotation(values) => {
            transform.rotation = sample_quat(values, index, factor);
        }
    }
}

// Returns the keyframe to start from and the blend factor towards the next one.
fn locate(times: &[f32], time: f32, interpolation: Interpolation) -> Option<(usize, f32)> {
    let last = times.len().checked_sub(1)?;
    if time <= times[0] {
        return Some((0, 0.0));
    }
    if time >= times[last] {
        return Some((last, 0.0));
    }

    // First key strictly after `time`, never 0 here
    let next = times.partition_point(|&t| t <= time);
    let index = next - 1;
    let span = times[next] - times[index];
    let factor = match interpolation {
        Interpolation::Step => 0.0,
        Interpolation::Linear if span > 0.0 => (time - times[index]) / span,
        Interpolation::Linear => 0.0,
    };
    Some((index, factor))
}

fn sample_vec3(values: &[Vec3], index: usize, factor: f32) -> Vec3 {
    let a = values[index.min(values.len() - 1)];
    if factor == 0.0 {
        return a;
    }
    let b = values[(index + 1).min(values.len() - 1)];
    a.lerp(b, factor)
}

fn sample_quat(values: &[Quat], index: usize, factor: f32) -> Quat {
    let a = values[index.min(values.len() - 1)];
    if factor == 0.0 {
        return a;
    }
    let b = values[(index + 1).min(values.len() - 1)];
    a.slerp(b, factor).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translation_track(interpolation: Interpolation) -> Track {
        Track {
            target: "cover".into(),
            interpolation,
            times: vec![0.0, 1.0, 3.0],
            values: TrackValues::Translation(vec![
                Vec3::ZERO,
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(2.0, 4.0, 0.0),
            ]),
        }
    }

    #[test]
    fn linear_interpolates_between_keys() {
        let track = translation_track(Interpolation::Linear);
        let mut transform = Transform::default();

        apply_track(&track, 0.5, &mut transform);
        assert!(transform.translation.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));

        apply_track(&track, 2.0, &mut transform);
        assert!(transform.translation.abs_diff_eq(Vec3::new(2.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn times_outside_the_track_clamp() {
        let track = translation_track(Interpolation::Linear);
        let mut transform = Transform::default();

        apply_track(&track, -1.0, &mut transform);
        assert_eq!(transform.translation, Vec3::ZERO);
        apply_track(&track, 10.0, &mut transform);
        assert_eq!(transform.translation, Vec3::new(2.0, 4.0, 0.0));
    }

    #[test]
    fn step_holds_previous_key() {
        let track = translation_track(Interpolation::Step);
        let mut transform = Transform::default();
        apply_track(&track, 0.99, &mut transform);
        assert_eq!(transform.translation, Vec3::ZERO);
    }

    #[test]
    fn rotation_uses_slerp() {
        let track = Track {
            target: "lid".into(),
            interpolation: Interpolation::Linear,
            times: vec![0.0, 1.0],
            values: TrackValues::Rotation(vec![
                Quat::IDENTITY,
                Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            ]),
        };
        let mut transform = Transform::default();
        apply_track(&track, 0.5, &mut transform);
        assert!(transform.rotation.abs_diff_eq(Quat::from_rotation_y(std::f32::consts::FRAC_PI_4), 1e-5));
    }
}

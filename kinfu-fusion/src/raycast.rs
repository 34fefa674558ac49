//! Ray casting the TSDF volume into point/normal maps

use crate::surface::SurfaceMap;
use crate::volume::TsdfVolume;
use kinfu_core::{CameraIntrinsics, FrameSize, Isometry3, NormalPoint3f, Point3f, Vector3f};
use rayon::prelude::*;

/// Render the zero level set seen from `camera_pose` (camera to world).
///
/// Rays march in steps of `trunc_dist * step_factor` and stop at the first
/// positive-to-negative crossing, which is refined by linear interpolation.
/// Points and normals come back in camera coordinates.
pub fn raycast(
    volume: &TsdfVolume,
    camera_pose: &Isometry3<f32>,
    intrinsics: &CameraIntrinsics,
    size: FrameSize,
    step_factor: f32,
) -> SurfaceMap {
    let camera_to_volume = volume.pose().inverse() * camera_pose;
    let volume_to_camera = camera_to_volume.inverse();
    let origin = camera_to_volume * Point3f::origin();

    // keep one voxel away from the border so interpolation never leaves the grid
    let margin = Vector3f::repeat(volume.voxel_size());
    let lower = Point3f::from(margin);
    let upper = Point3f::from(volume.extent() - margin);

    let step = volume.trunc_dist() * step_factor;
    let mut data = vec![None; size.area()];

    data.par_chunks_mut(size.width.max(1) as usize)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, sample) in row.iter_mut().enumerate() {
                let ray = intrinsics.reproject(x as f32, y as f32, 1.0).coords.normalize();
                let direction = camera_to_volume.rotation * ray;

                let Some((t_enter, t_exit)) = intersect_box(&origin, &direction, &lower, &upper) else {
                    continue;
                };

                *sample = march(volume, &origin, &direction, t_enter.max(0.0), t_exit, step).map(|hit| {
                    NormalPoint3f::new(volume_to_camera * hit.position, volume_to_camera.rotation * hit.normal)
                });
            }
        });

    SurfaceMap { size, data }
}

fn march(
    volume: &TsdfVolume,
    origin: &Point3f,
    direction: &Vector3f,
    t_start: f32,
    t_end: f32,
    step: f32,
) -> Option<NormalPoint3f> {
    let trunc = volume.trunc_dist();
    let mut previous: Option<(f32, f32)> = None;
    let mut t = t_start;

    while t < t_end {
        let point = origin + direction * t;
        let mut advance = step;

        match volume.interpolate(&point) {
            Some(f) => {
                if let Some((t_prev, f_prev)) = previous {
                    if f_prev > 0.0 && f <= 0.0 {
                        let t_hit = t_prev + (t - t_prev) * f_prev / (f_prev - f);
                        let hit = origin + direction * t_hit;
                        let normal = volume.gradient(&hit)?;
                        return Some(NormalPoint3f::new(hit, normal));
                    }
                    if f_prev < 0.0 && f > 0.0 {
                        // left the back of a surface
                        return None;
                    }
                }
                previous = Some((t, f));
                // far from any surface: skip ahead by most of a truncation band
                if f >= 1.0 {
                    advance = step.max(0.8 * trunc);
                }
            }
            None => previous = None,
        }

        t += advance;
    }

    None
}

/// Slab test; returns the entry and exit ray parameters
fn intersect_box(origin: &Point3f, direction: &Vector3f, lower: &Point3f, upper: &Point3f) -> Option<(f32, f32)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;

    for axis in 0..3 {
        let inv = 1.0 / direction[axis];
        let t0 = (lower[axis] - origin[axis]) * inv;
        let t1 = (upper[axis] - origin[axis]) * inv;
        t_enter = t_enter.max(t0.min(t1));
        t_exit = t_exit.min(t0.max(t1));
    }

    if t_exit >= t_enter.max(0.0) {
        Some((t_enter, t_exit))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depth::DepthMap;
    use approx::assert_relative_eq;

    fn plane_volume() -> (TsdfVolume, CameraIntrinsics, FrameSize) {
        let size = FrameSize::new(64, 48);
        let intr = CameraIntrinsics::from_focal_length(size.width, size.height, 52.5, 0.0);
        let mut volume = TsdfVolume::new(
            [48, 48, 48],
            0.02,
            0.06,
            64.0,
            Isometry3::translation(-0.48, -0.48, 0.1),
        );
        let depth = DepthMap::new(size, vec![0.6; size.area()]);
        volume.integrate(&depth, &intr, &Isometry3::identity());
        (volume, intr, size)
    }

    #[test]
    fn test_intersect_box_hits_and_misses() {
        let lower = Point3f::new(0.0, 0.0, 0.0);
        let upper = Point3f::new(1.0, 1.0, 1.0);

        let (t0, t1) = intersect_box(&Point3f::new(0.5, 0.5, -1.0), &Vector3f::z(), &lower, &upper).unwrap();
        assert_relative_eq!(t0, 1.0);
        assert_relative_eq!(t1, 2.0);

        assert!(intersect_box(&Point3f::new(2.0, 0.5, -1.0), &Vector3f::z(), &lower, &upper).is_none());
        assert!(intersect_box(&Point3f::new(0.5, 0.5, 2.0), &Vector3f::z(), &lower, &upper).is_none());
    }

    #[test]
    fn test_raycast_recovers_plane_depth() {
        let (volume, intr, size) = plane_volume();
        let surface = raycast(&volume, &Isometry3::identity(), &intr, size, 0.25);

        let center = surface.get(32, 24).expect("center ray should hit the plane");
        assert_relative_eq!(center.position.z, 0.6, epsilon = 0.01);
        assert!(center.normal.z < -0.9);
        assert!(surface.valid_count() > size.area() / 2);
    }

    #[test]
    fn test_raycast_from_shifted_pose_moves_surface() {
        let (volume, intr, size) = plane_volume();
        let pose = Isometry3::translation(0.0, 0.0, 0.1);
        let surface = raycast(&volume, &pose, &intr, size, 0.25);

        let center = surface.get(32, 24).expect("center ray should hit the plane");
        assert_relative_eq!(center.position.z, 0.5, epsilon = 0.01);
    }

    #[test]
    fn test_raycast_of_empty_volume_is_empty() {
        let size = FrameSize::new(16, 12);
        let intr = CameraIntrinsics::from_focal_length(16, 12, 12.0, 0.0);
        let volume = TsdfVolume::new([16, 16, 16], 0.05, 0.15, 64.0, Isometry3::translation(-0.4, -0.4, 0.2));
        let surface = raycast(&volume, &Isometry3::identity(), &intr, size, 0.5);
        assert_eq!(surface.valid_count(), 0);
    }
}

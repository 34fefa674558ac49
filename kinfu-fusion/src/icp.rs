//! Projective point-to-plane ICP between surface map pyramids

use crate::surface::SurfaceMap;
use kinfu_core::{CameraIntrinsics, Isometry3, Vector3, MIN_CORRESPONDENCES};
use nalgebra::{Matrix6, Vector6};
use rayon::prelude::*;

/// Camera tracking by iterative closest point with projective data association
#[derive(Debug, Clone)]
pub struct IcpSolver {
    /// Iterations per pyramid level, finest first
    iterations: Vec<usize>,
    dist_thresh: f32,
    angle_thresh: f32,
}

/// Normal equations accumulated over one pass of correspondences
#[derive(Debug, Clone, Copy)]
struct NormalEquations {
    ata: Matrix6<f64>,
    atb: Vector6<f64>,
    count: usize,
}

impl NormalEquations {
    fn zero() -> Self {
        Self {
            ata: Matrix6::zeros(),
            atb: Vector6::zeros(),
            count: 0,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.ata += other.ata;
        self.atb += other.atb;
        self.count += other.count;
        self
    }
}

impl IcpSolver {
    pub fn new(iterations: Vec<usize>, dist_thresh: f32, angle_thresh: f32) -> Self {
        Self {
            iterations,
            dist_thresh,
            angle_thresh,
        }
    }

    pub fn levels(&self) -> usize {
        self.iterations.len()
    }

    /// Estimate the rigid motion taking `new` camera coordinates into `old`
    /// camera coordinates, working from the coarsest level to the finest.
    ///
    /// `old`, `new` and `intrinsics` are pyramids, finest level first.
    /// Returns `None` when tracking fails.
    pub fn estimate_transform(
        &self,
        old: &[SurfaceMap],
        new: &[SurfaceMap],
        intrinsics: &[CameraIntrinsics],
    ) -> Option<Isometry3<f32>> {
        let levels = self.levels().min(old.len()).min(new.len()).min(intrinsics.len());
        if levels == 0 {
            return None;
        }

        let mut transform = Isometry3::identity();
        for level in (0..levels).rev() {
            for _ in 0..self.iterations[level] {
                let equations = self.accumulate(&old[level], &new[level], &intrinsics[level], &transform);
                if equations.count < MIN_CORRESPONDENCES {
                    log::debug!(
                        "icp: only {} correspondences at level {}",
                        equations.count,
                        level
                    );
                    return None;
                }

                let x = solve(&equations)?;
                let delta = Isometry3::new(
                    Vector3::new(x[3] as f32, x[4] as f32, x[5] as f32),
                    Vector3::new(x[0] as f32, x[1] as f32, x[2] as f32),
                );
                transform = delta * transform;
            }
        }

        Some(transform)
    }

    fn accumulate(
        &self,
        old: &SurfaceMap,
        new: &SurfaceMap,
        intrinsics: &CameraIntrinsics,
        transform: &Isometry3<f32>,
    ) -> NormalEquations {
        let width = new.size.width;
        let old_width = old.size.width as f32;
        let old_height = old.size.height as f32;
        let cos_angle = self.angle_thresh.cos();
        let dist_thresh_sq = self.dist_thresh * self.dist_thresh;

        (0..new.size.height)
            .into_par_iter()
            .map(|y| {
                let mut eq = NormalEquations::zero();
                for x in 0..width {
                    let Some(sample) = new.get(x, y) else {
                        continue;
                    };

                    let p = transform * sample.position;
                    if p.z <= 0.0 {
                        continue;
                    }
                    let uv = intrinsics.project(&p);
                    let (u, v) = (uv.x.round(), uv.y.round());
                    if u < 0.0 || v < 0.0 || u >= old_width || v >= old_height {
                        continue;
                    }
                    let Some(target) = old.get(u as u32, v as u32) else {
                        continue;
                    };

                    let diff = p - target.position;
                    if diff.norm_squared() > dist_thresh_sq {
                        continue;
                    }
                    let n_new = transform.rotation * sample.normal;
                    if n_new.dot(&target.normal) < cos_angle {
                        continue;
                    }

                    let n = target.normal.cast::<f64>();
                    let c = p.coords.cast::<f64>().cross(&n);
                    let residual = n.dot(&diff.cast::<f64>());
                    let row = Vector6::new(c.x, c.y, c.z, n.x, n.y, n.z);

                    eq.ata += row * row.transpose();
                    eq.atb += row * residual;
                    eq.count += 1;
                }
                eq
            })
            .reduce(NormalEquations::zero, NormalEquations::merge)
    }
}

/// Solve `A x = -b` for the twist `(rx, ry, rz, tx, ty, tz)`
fn solve(equations: &NormalEquations) -> Option<Vector6<f64>> {
    let det = equations.ata.determinant();
    if !det.is_finite() || det.abs() < 1e-15 {
        return None;
    }
    let x = equations.ata.cholesky()?.solve(&(-equations.atb));
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kinfu_core::{FrameSize, NormalPoint3f, Point3f, Vector3f};

    /// Points on three orthogonal planes seen from the origin: a corner
    /// constrains all six degrees of freedom.
    fn corner_surface(size: FrameSize, intr: &CameraIntrinsics, camera: &Isometry3<f32>) -> SurfaceMap {
        let world_to_camera = camera.inverse();
        let mut data = vec![None; size.area()];
        let planes = [
            (Vector3f::new(0.0, 0.0, -1.0), 2.0f32), // back wall z = 2
            (Vector3f::new(-1.0, 0.0, 0.0), 0.8),    // right wall x = 0.8
            (Vector3f::new(0.0, -1.0, 0.0), 0.6),    // floor y = 0.6
        ];

        for y in 0..size.height {
            for x in 0..size.width {
                let dir_cam = intr.reproject(x as f32, y as f32, 1.0).coords;
                let origin = camera * Point3f::origin();
                let dir = camera.rotation * dir_cam;

                let mut best: Option<(f32, Vector3f)> = None;
                for (normal, offset) in planes {
                    // plane: -normal . p = offset
                    let denom = -normal.dot(&dir);
                    if denom <= 1e-6 {
                        continue;
                    }
                    let t = (offset + normal.dot(&origin.coords)) / denom;
                    if t > 0.0 && best.map_or(true, |(bt, _)| t < bt) {
                        best = Some((t, normal));
                    }
                }

                if let Some((t, normal)) = best {
                    let world = origin + dir * t;
                    data[(y * size.width + x) as usize] = Some(NormalPoint3f::new(
                        world_to_camera * world,
                        world_to_camera.rotation * normal,
                    ));
                }
            }
        }

        SurfaceMap { size, data }
    }

    fn pyramid(base: SurfaceMap, levels: usize) -> Vec<SurfaceMap> {
        let mut maps = vec![base];
        for _ in 1..levels {
            let next = maps.last().unwrap().downsample();
            maps.push(next);
        }
        maps
    }

    #[test]
    fn test_identity_when_frames_match() {
        let size = FrameSize::new(80, 60);
        let intr = CameraIntrinsics::from_focal_length(80, 60, 70.0, 0.0);
        let intrinsics = vec![intr, intr.scaled(0.5)];
        let map = corner_surface(size, &intr, &Isometry3::identity());
        let old = pyramid(map.clone(), 2);
        let new = pyramid(map, 2);

        let solver = IcpSolver::new(vec![4, 4], 0.1, 30.0f32.to_radians());
        let t = solver.estimate_transform(&old, &new, &intrinsics).unwrap();

        assert!(t.translation.vector.norm() < 1e-3);
        assert!(t.rotation.angle() < 1e-3);
    }

    #[test]
    fn test_recovers_small_translation() {
        let size = FrameSize::new(80, 60);
        let intr = CameraIntrinsics::from_focal_length(80, 60, 70.0, 0.0);
        let intrinsics = vec![intr, intr.scaled(0.5)];
        let moved = Isometry3::translation(0.02, -0.01, 0.03);

        let old = pyramid(corner_surface(size, &intr, &Isometry3::identity()), 2);
        let new = pyramid(corner_surface(size, &intr, &moved), 2);

        let solver = IcpSolver::new(vec![10, 10], 0.1, 30.0f32.to_radians());
        let t = solver.estimate_transform(&old, &new, &intrinsics).unwrap();

        assert_relative_eq!(t.translation.vector.x, 0.02, epsilon = 2e-3);
        assert_relative_eq!(t.translation.vector.y, -0.01, epsilon = 2e-3);
        assert_relative_eq!(t.translation.vector.z, 0.03, epsilon = 2e-3);
    }

    #[test]
    fn test_fails_without_correspondences() {
        let size = FrameSize::new(40, 30);
        let intr = CameraIntrinsics::from_focal_length(40, 30, 35.0, 0.0);
        let old = vec![corner_surface(size, &intr, &Isometry3::identity())];
        let new = vec![SurfaceMap::empty(size)];

        let solver = IcpSolver::new(vec![5], 0.1, 30.0f32.to_radians());
        assert!(solver.estimate_transform(&old, &new, &[intr]).is_none());
    }

    #[test]
    fn test_fails_on_degenerate_plane() {
        // a single plane leaves in-plane motion unconstrained
        let size = FrameSize::new(40, 30);
        let intr = CameraIntrinsics::from_focal_length(40, 30, 35.0, 0.0);
        let data = (0..size.area())
            .map(|i| {
                let (x, y) = ((i as u32 % size.width) as f32, (i as u32 / size.width) as f32);
                Some(NormalPoint3f::new(intr.reproject(x, y, 1.0), -Vector3f::z()))
            })
            .collect();
        let map = SurfaceMap { size, data };

        let solver = IcpSolver::new(vec![3], 0.1, 30.0f32.to_radians());
        assert!(solver.estimate_transform(&[map.clone()], &[map], &[intr]).is_none());
    }
}

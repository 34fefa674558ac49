//! Dense truncated signed distance volume

use crate::depth::DepthMap;
use kinfu_core::{CameraIntrinsics, FusionParams, Isometry3, Point3f, Vector3f};
use rayon::prelude::*;

/// TSDF voxel data
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TsdfVoxel {
    /// Signed distance normalized by the truncation distance, in [-1, 1]
    pub tsdf: f32,
    /// Accumulated observation weight; zero means never observed
    pub weight: f32,
}

impl Default for TsdfVoxel {
    fn default() -> Self {
        Self {
            tsdf: 1.0,
            weight: 0.0,
        }
    }
}

/// A cube of voxels placed in the world by `pose`.
///
/// Voxel `(x, y, z)` has its center at `((x, y, z) + 0.5) * voxel_size` in
/// volume coordinates. Storage is x-major: `(x * dims[1] + y) * dims[2] + z`.
#[derive(Debug, Clone)]
pub struct TsdfVolume {
    dims: [usize; 3],
    voxel_size: f32,
    trunc_dist: f32,
    max_weight: f32,
    pose: Isometry3<f32>,
    voxels: Vec<TsdfVoxel>,
}

impl TsdfVolume {
    /// Create a new TSDF volume with specified parameters
    pub fn new(
        dims: [usize; 3],
        voxel_size: f32,
        trunc_dist: f32,
        max_weight: f32,
        pose: Isometry3<f32>,
    ) -> Self {
        let total_voxels = dims[0] * dims[1] * dims[2];
        Self {
            dims,
            voxel_size,
            trunc_dist,
            max_weight,
            pose,
            voxels: vec![TsdfVoxel::default(); total_voxels],
        }
    }

    pub fn from_params(params: &FusionParams) -> Self {
        Self::new(
            params.volume_dims,
            params.voxel_size,
            params.tsdf_trunc_dist,
            params.tsdf_max_weight,
            params.volume_pose,
        )
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    pub fn trunc_dist(&self) -> f32 {
        self.trunc_dist
    }

    /// Volume to world transform
    pub fn pose(&self) -> &Isometry3<f32> {
        &self.pose
    }

    /// Edge lengths of the volume in meters
    pub fn extent(&self) -> Vector3f {
        Vector3f::new(
            self.dims[0] as f32 * self.voxel_size,
            self.dims[1] as f32 * self.voxel_size,
            self.dims[2] as f32 * self.voxel_size,
        )
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.dims[1] + y) * self.dims[2] + z
    }

    #[inline]
    pub fn voxel(&self, x: usize, y: usize, z: usize) -> TsdfVoxel {
        self.voxels[self.index(x, y, z)]
    }

    /// Center of voxel `(x, y, z)` in volume coordinates
    #[inline]
    pub fn voxel_center(&self, x: usize, y: usize, z: usize) -> Point3f {
        Point3f::new(
            (x as f32 + 0.5) * self.voxel_size,
            (y as f32 + 0.5) * self.voxel_size,
            (z as f32 + 0.5) * self.voxel_size,
        )
    }

    /// Number of voxels that received at least one observation
    pub fn observed_count(&self) -> usize {
        self.voxels.par_iter().filter(|v| v.weight > 0.0).count()
    }

    /// Forget every observation
    pub fn reset(&mut self) {
        self.voxels.par_iter_mut().for_each(|v| *v = TsdfVoxel::default());
    }

    /// Fuse a metric depth map seen from `camera_pose` (camera to world)
    pub fn integrate(&mut self, depth: &DepthMap, intrinsics: &CameraIntrinsics, camera_pose: &Isometry3<f32>) {
        let volume_to_camera = camera_pose.inverse() * self.pose;
        let [_, dim_y, dim_z] = self.dims;
        let voxel_size = self.voxel_size;
        let trunc_dist = self.trunc_dist;
        let max_weight = self.max_weight;
        let width = depth.size.width as f32;
        let height = depth.size.height as f32;

        self.voxels
            .par_chunks_mut(dim_y * dim_z)
            .enumerate()
            .for_each(|(x, slab)| {
                for y in 0..dim_y {
                    for z in 0..dim_z {
                        let center = Point3f::new(
                            (x as f32 + 0.5) * voxel_size,
                            (y as f32 + 0.5) * voxel_size,
                            (z as f32 + 0.5) * voxel_size,
                        );
                        let p = volume_to_camera * center;
                        if p.z <= 0.0 {
                            continue;
                        }

                        let uv = intrinsics.project(&p);
                        let u = uv.x.round();
                        let v = uv.y.round();
                        if u < 0.0 || v < 0.0 || u >= width || v >= height {
                            continue;
                        }

                        let d = depth.get(u as u32, v as u32);
                        if d <= 0.0 {
                            continue;
                        }

                        // distance along the ray, not along the optical axis
                        let xn = p.x / p.z;
                        let yn = p.y / p.z;
                        let sdf = (d - p.z) * (1.0 + xn * xn + yn * yn).sqrt();
                        if sdf < -trunc_dist {
                            continue;
                        }

                        let tsdf = (sdf / trunc_dist).min(1.0);
                        let voxel = &mut slab[y * dim_z + z];
                        let w = voxel.weight;
                        voxel.tsdf = (voxel.tsdf * w + tsdf) / (w + 1.0);
                        voxel.weight = (w + 1.0).min(max_weight);
                    }
                }
            });
    }

    /// Trilinear TSDF value at `point` (volume coordinates, meters).
    ///
    /// `None` outside the interpolation range or when any of the eight
    /// neighbouring voxels was never observed.
    pub fn interpolate(&self, point: &Point3f) -> Option<f32> {
        let gx = point.x / self.voxel_size - 0.5;
        let gy = point.y / self.voxel_size - 0.5;
        let gz = point.z / self.voxel_size - 0.5;

        if gx < 0.0 || gy < 0.0 || gz < 0.0 {
            return None;
        }
        let (ix, iy, iz) = (gx.floor() as usize, gy.floor() as usize, gz.floor() as usize);
        if ix + 1 >= self.dims[0] || iy + 1 >= self.dims[1] || iz + 1 >= self.dims[2] {
            return None;
        }
        let (tx, ty, tz) = (gx - ix as f32, gy - iy as f32, gz - iz as f32);

        let mut corners = [0.0f32; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let v = self.voxel(ix + (i >> 2), iy + ((i >> 1) & 1), iz + (i & 1));
            if v.weight <= 0.0 {
                return None;
            }
            *corner = v.tsdf;
        }

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let c00 = lerp(corners[0], corners[4], tx);
        let c01 = lerp(corners[1], corners[5], tx);
        let c10 = lerp(corners[2], corners[6], tx);
        let c11 = lerp(corners[3], corners[7], tx);
        let c0 = lerp(c00, c10, ty);
        let c1 = lerp(c01, c11, ty);
        Some(lerp(c0, c1, tz))
    }

    /// Unit TSDF gradient at `point`, pointing from inside to outside
    pub fn gradient(&self, point: &Point3f) -> Option<Vector3f> {
        let h = self.voxel_size;
        let mut g = Vector3f::zeros();
        for axis in 0..3 {
            let mut offset = Vector3f::zeros();
            offset[axis] = h;
            let forward = self.interpolate(&(point + offset))?;
            let backward = self.interpolate(&(point - offset))?;
            g[axis] = forward - backward;
        }
        g.try_normalize(1e-8)
    }
}

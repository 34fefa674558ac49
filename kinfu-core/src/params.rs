//! Fusion engine parameters

use crate::error::{Error, Result};
use crate::intrinsics::{CameraIntrinsics, FrameSize};
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Depth units per meter used for devices that report millimeters
pub const MILLIMETER_DEPTH_FACTOR: f32 = 1000.0;

/// Below this many correspondences an ICP pose update is not trusted
pub const MIN_CORRESPONDENCES: usize = 32;

/// Tunable parameters of the volumetric fusion pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionParams {
    /// Expected input frame size
    pub frame_size: FrameSize,
    /// Depth camera intrinsics
    pub intrinsics: CameraIntrinsics,
    /// Raw depth units per meter
    pub depth_factor: f32,

    /// Bilateral filter range sigma (meters)
    pub bilateral_sigma_depth: f32,
    /// Bilateral filter spatial sigma (pixels)
    pub bilateral_sigma_spatial: f32,
    /// Bilateral filter window side (pixels)
    pub bilateral_kernel_size: usize,

    /// Number of voxels along each axis
    pub volume_dims: [usize; 3],
    /// Voxel edge length (meters)
    pub voxel_size: f32,
    /// Pose of the volume's corner in world coordinates
    pub volume_pose: Isometry3<f32>,
    /// TSDF truncation distance (meters)
    pub tsdf_trunc_dist: f32,
    /// Cap on accumulated per-voxel weight
    pub tsdf_max_weight: f32,
    /// Minimal camera movement before a frame is integrated (meters/radians)
    pub tsdf_min_camera_movement: f32,

    /// Ray marching step as a fraction of the truncation distance
    pub raycast_step_factor: f32,
    /// Light position used to shade rendered images (camera space)
    pub light_pose: Point3<f32>,

    /// Max distance between ICP correspondences (meters)
    pub icp_dist_thresh: f32,
    /// Max angle between corresponding normals (radians)
    pub icp_angle_thresh: f32,
    /// ICP iterations per pyramid level, finest level first.
    /// Its length is the number of pyramid levels.
    pub icp_iterations: Vec<usize>,

    /// Depth values beyond this distance are dropped (meters, 0 = keep all)
    pub truncate_threshold: f32,
}

impl FusionParams {
    /// Parameters tuned for quality: a 3 m cube at 256^3 voxels
    pub fn default_params() -> Self {
        let volume_side = 3.0f32;
        let dims = 256usize;
        let voxel_size = volume_side / dims as f32;
        let frame_size = FrameSize::new(640, 480);

        Self {
            frame_size,
            intrinsics: CameraIntrinsics::from_focal_length(frame_size.width, frame_size.height, 525.0, 0.0),
            depth_factor: 5000.0,
            bilateral_sigma_depth: 0.04,
            bilateral_sigma_spatial: 4.5,
            bilateral_kernel_size: 7,
            volume_dims: [dims; 3],
            voxel_size,
            volume_pose: Isometry3::from_parts(
                Translation3::new(-volume_side / 2.0, -volume_side / 2.0, 0.5),
                UnitQuaternion::identity(),
            ),
            tsdf_trunc_dist: 4.0 * voxel_size,
            tsdf_max_weight: 64.0,
            tsdf_min_camera_movement: 0.0,
            raycast_step_factor: 0.25,
            light_pose: Point3::origin(),
            icp_dist_thresh: 0.1,
            icp_angle_thresh: 30.0f32.to_radians(),
            icp_iterations: vec![10, 5, 4],
            truncate_threshold: 0.0,
        }
    }

    /// Parameters tuned for speed: the same cube at 128^3 voxels
    pub fn coarse_params() -> Self {
        let mut params = Self::default_params();
        let dims = 128usize;
        params.volume_dims = [dims; 3];
        params.voxel_size = 3.0 / dims as f32;
        params.tsdf_trunc_dist = 2.0 * params.voxel_size;
        params.raycast_step_factor = 0.75;
        params.icp_iterations = vec![5, 3, 2];
        params
    }

    /// Fit the parameters to a capture device: frame size, derived intrinsics
    /// and millimeter depth units.
    pub fn with_camera(mut self, width: u32, height: u32, focal_x: f32, focal_y: f32) -> Self {
        self.frame_size = FrameSize::new(width, height);
        self.intrinsics = CameraIntrinsics::from_focal_length(width, height, focal_x, focal_y);
        self.depth_factor = MILLIMETER_DEPTH_FACTOR;
        self
    }

    /// Number of image pyramid levels used by tracking
    pub fn pyramid_levels(&self) -> usize {
        self.icp_iterations.len()
    }

    /// Check that the parameters describe a usable pipeline
    pub fn validate(&self) -> Result<()> {
        if self.frame_size.width == 0 || self.frame_size.height == 0 {
            return Err(Error::Config("frame size must be non-zero".into()));
        }
        if !(self.intrinsics.fx > 0.0 && self.intrinsics.fy > 0.0) {
            return Err(Error::Config(format!(
                "focal lengths must be positive, got ({}, {})",
                self.intrinsics.fx, self.intrinsics.fy
            )));
        }
        if !(self.depth_factor > 0.0) {
            return Err(Error::Config("depth factor must be positive".into()));
        }
        if self.volume_dims.iter().any(|&d| d < 2) {
            return Err(Error::Config(format!(
                "volume needs at least 2 voxels per axis, got {:?}",
                self.volume_dims
            )));
        }
        if !(self.voxel_size > 0.0) || !(self.tsdf_trunc_dist > 0.0) {
            return Err(Error::Config("voxel size and truncation distance must be positive".into()));
        }
        if !(self.tsdf_max_weight >= 1.0) {
            return Err(Error::Config("max weight must be at least 1".into()));
        }
        if !(self.raycast_step_factor > 0.0) {
            return Err(Error::Config("raycast step factor must be positive".into()));
        }
        if self.icp_iterations.is_empty() {
            return Err(Error::Config("at least one ICP pyramid level is required".into()));
        }

        let levels = self.icp_iterations.len();
        let mut coarsest = self.frame_size;
        for _ in 1..levels {
            if coarsest.area() < MIN_CORRESPONDENCES {
                break;
            }
            coarsest = coarsest.halved();
        }
        if coarsest.width < 2 || coarsest.height < 2 || coarsest.area() < MIN_CORRESPONDENCES {
            return Err(Error::Config(format!(
                "frame {}x{} is too small for {} pyramid levels: the coarsest level needs at least {} pixels to track",
                self.frame_size.width, self.frame_size.height, levels, MIN_CORRESPONDENCES
            )));
        }

        Ok(())
    }
}

impl Default for FusionParams {
    fn default() -> Self {
        Self::default_params()
    }
}

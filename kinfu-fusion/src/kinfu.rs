//! The KinectFusion pipeline behind the `FusionEngine` trait

use crate::depth::DepthMap;
use crate::extract::extract_surface;
use crate::icp::IcpSolver;
use crate::raycast::raycast;
use crate::render::render_surface;
use crate::surface::SurfaceMap;
use crate::volume::TsdfVolume;
use kinfu_core::{
    CameraIntrinsics, DepthFrame, Error, FusionEngine, FusionParams, Isometry3, NormalPoint3f, PointCloud,
    RenderImage, Result,
};

/// Dense volumetric fusion with frame-to-model tracking
pub struct KinFu {
    params: FusionParams,
    volume: TsdfVolume,
    icp: IcpSolver,
    /// Intrinsics per pyramid level, finest first
    intrinsics: Vec<CameraIntrinsics>,
    pose: Isometry3<f32>,
    frame_counter: usize,
    /// Ray cast of the model from `pose`, as a pyramid
    model: Vec<SurfaceMap>,
}

impl KinFu {
    pub fn new(params: FusionParams) -> Result<Self> {
        params.validate()?;

        let volume = TsdfVolume::from_params(&params);
        let icp = IcpSolver::new(params.icp_iterations.clone(), params.icp_dist_thresh, params.icp_angle_thresh);

        let mut intrinsics = Vec::with_capacity(params.pyramid_levels());
        let mut level = params.intrinsics;
        for _ in 0..params.pyramid_levels() {
            intrinsics.push(level);
            level = level.scaled(0.5);
        }

        log::info!(
            "kinfu: {}x{} frames, {:?} voxels of {:.1} mm, {} pyramid levels",
            params.frame_size.width,
            params.frame_size.height,
            params.volume_dims,
            params.voxel_size * 1000.0,
            params.pyramid_levels()
        );

        Ok(Self {
            params,
            volume,
            icp,
            intrinsics,
            pose: Isometry3::identity(),
            frame_counter: 0,
            model: Vec::new(),
        })
    }

    /// Frames fused since creation or the last reset
    pub fn frame_count(&self) -> usize {
        self.frame_counter
    }

    pub fn volume(&self) -> &TsdfVolume {
        &self.volume
    }

    /// Metric depth for integration plus the filtered point/normal pyramid for tracking
    fn preprocess(&self, frame: &DepthFrame) -> Result<(DepthMap, Vec<SurfaceMap>)> {
        if frame.size() != self.params.frame_size {
            return Err(Error::InvalidData(format!(
                "depth frame is {}x{}, engine expects {}x{}",
                frame.width(),
                frame.height(),
                self.params.frame_size.width,
                self.params.frame_size.height
            )));
        }

        let p = &self.params;
        let depth = DepthMap::from_frame(frame, p.depth_factor, p.truncate_threshold);
        let mut level = depth.bilateral_filter(p.bilateral_kernel_size, p.bilateral_sigma_depth, p.bilateral_sigma_spatial);

        let mut surfaces = Vec::with_capacity(self.intrinsics.len());
        for (i, intr) in self.intrinsics.iter().enumerate() {
            if i > 0 {
                level = level.pyr_down(p.bilateral_sigma_depth);
            }
            surfaces.push(SurfaceMap::from_depth(&level, intr));
        }

        Ok((depth, surfaces))
    }

    fn raycast_model(&mut self) {
        let base = raycast(
            &self.volume,
            &self.pose,
            &self.params.intrinsics,
            self.params.frame_size,
            self.params.raycast_step_factor,
        );

        let mut model = Vec::with_capacity(self.intrinsics.len());
        model.push(base);
        for _ in 1..self.intrinsics.len() {
            let next = model[model.len() - 1].downsample();
            model.push(next);
        }
        self.model = model;
    }
}

impl FusionEngine for KinFu {
    fn update(&mut self, depth: &DepthFrame) -> Result<bool> {
        let (depth_map, surfaces) = self.preprocess(depth)?;

        if self.frame_counter == 0 {
            // the first frame defines the world frame
            self.volume.integrate(&depth_map, &self.params.intrinsics, &self.pose);
        } else {
            let Some(delta) = self.icp.estimate_transform(&self.model, &surfaces, &self.intrinsics) else {
                log::debug!("kinfu: tracking lost at frame {}", self.frame_counter);
                return Ok(false);
            };

            self.pose *= delta;

            let rotation = delta.rotation.angle();
            let translation = delta.translation.vector.norm();
            if (rotation + translation) * 0.5 >= self.params.tsdf_min_camera_movement {
                self.volume.integrate(&depth_map, &self.params.intrinsics, &self.pose);
            }
        }

        self.raycast_model();
        self.frame_counter += 1;
        log::trace!("kinfu: frame {} pose {:?}", self.frame_counter, self.pose.translation.vector);
        Ok(true)
    }

    fn reset(&mut self) {
        self.frame_counter = 0;
        self.pose = Isometry3::identity();
        self.volume.reset();
        self.model.clear();
    }

    fn render(&self) -> RenderImage {
        match self.model.first() {
            Some(surface) => render_surface(surface, &self.params.light_pose),
            None => RenderImage::new(self.params.frame_size.width, self.params.frame_size.height),
        }
    }

    fn render_from(&self, camera_pose: &Isometry3<f32>) -> RenderImage {
        let surface = raycast(
            &self.volume,
            camera_pose,
            &self.params.intrinsics,
            self.params.frame_size,
            self.params.raycast_step_factor,
        );
        render_surface(&surface, &self.params.light_pose)
    }

    fn cloud(&self) -> PointCloud<NormalPoint3f> {
        extract_surface(&self.volume)
    }

    fn pose(&self) -> Isometry3<f32> {
        self.pose
    }

    fn params(&self) -> &FusionParams {
        &self.params
    }
}

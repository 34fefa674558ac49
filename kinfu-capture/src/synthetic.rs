//! Ray-traced depth from a camera sweeping across an analytic room

use crate::scene::Scene;
use kinfu_core::{
    CameraIntrinsics, DepthFrame, DepthSource, DeviceProperties, Error, Isometry3, Point3f, Result, Translation3,
    UnitQuaternion, Vector3f,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Settings of the synthetic sensor and its trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub focal_length: f32,
    /// Depth units per meter in the produced frames
    pub depth_factor: f32,
    /// Stop after this many frames; `None` streams forever
    pub frames: Option<usize>,
    /// Depth noise standard deviation at 1 m, growing with depth squared
    pub noise: f32,
    /// Probability that a frame comes back empty
    pub drop_rate: f32,
    pub seed: u64,
    /// Sideways travel of the camera in meters
    pub amplitude: f32,
    /// Yaw swing of the camera in radians
    pub yaw_amplitude: f32,
    /// Frames per full sweep
    pub period: usize,
    /// Hits beyond this range (meters) read as no depth
    pub max_range: f32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            focal_length: 285.0,
            depth_factor: 1000.0,
            frames: None,
            noise: 0.0,
            drop_rate: 0.0,
            seed: 7,
            amplitude: 0.2,
            yaw_amplitude: 0.1,
            period: 240,
            max_range: 4.0,
        }
    }
}

impl SyntheticConfig {
    /// Resize the sensor, scaling the focal length so the field of view stays the same
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.focal_length *= width as f32 / self.width as f32;
        self.width = width;
        self.height = height;
        self
    }
}

/// Depth source that renders [`Scene::room`] along a smooth sweep
pub struct SyntheticSource {
    config: SyntheticConfig,
    intrinsics: CameraIntrinsics,
    scene: Scene,
    rng: StdRng,
    index: usize,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(Error::DeviceOpen("synthetic sensor has zero-sized frames".to_string()));
        }
        if config.focal_length <= 0.0 || config.depth_factor <= 0.0 {
            return Err(Error::DeviceOpen(format!(
                "synthetic sensor needs positive focal length and depth factor, got {} and {}",
                config.focal_length, config.depth_factor
            )));
        }
        if config.period == 0 {
            return Err(Error::DeviceOpen("synthetic trajectory period must be positive".to_string()));
        }

        log::info!(
            "synthetic source: {}x{} @ f={} px, {} frames",
            config.width,
            config.height,
            config.focal_length,
            config
                .frames
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unlimited".to_string())
        );

        Ok(Self {
            intrinsics: CameraIntrinsics::from_focal_length(config.width, config.height, config.focal_length, 0.0),
            scene: Scene::room(),
            rng: StdRng::seed_from_u64(config.seed),
            index: 0,
            config,
        })
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Camera-to-world pose of frame `index`; frame 0 is the identity
    pub fn pose_at(&self, index: usize) -> Isometry3<f32> {
        let phase = index as f32 * std::f32::consts::TAU / self.config.period as f32;
        let s = phase.sin();
        Isometry3::from_parts(
            Translation3::new(self.config.amplitude * s, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3f::y_axis(), self.config.yaw_amplitude * s),
        )
    }

    /// Render the depth frame seen from `pose`
    pub fn render(&mut self, pose: &Isometry3<f32>) -> DepthFrame {
        let SyntheticConfig {
            width,
            height,
            depth_factor,
            noise,
            max_range,
            ..
        } = self.config;
        let origin = Point3f::from(pose.translation.vector);

        let mut data = Vec::with_capacity(width as usize * height as usize);
        for v in 0..height {
            for u in 0..width {
                // unit z, so the ray parameter is the camera-space depth
                let dir_cam = self.intrinsics.reproject(u as f32, v as f32, 1.0).coords;
                let dir_world = pose.rotation * dir_cam;

                let raw = match self.scene.intersect(&origin, &dir_world) {
                    Some(z) if z <= max_range => {
                        let z = if noise > 0.0 {
                            z + noise * z * z * gaussian(&mut self.rng)
                        } else {
                            z
                        };
                        to_raw(z, depth_factor)
                    }
                    _ => 0,
                };
                data.push(raw);
            }
        }

        DepthFrame::new(width, height, data).unwrap_or_else(|_| DepthFrame::zeros(width, height))
    }
}

fn to_raw(z: f32, depth_factor: f32) -> u16 {
    let raw = (z * depth_factor).round();
    if raw <= 0.0 || raw > u16::MAX as f32 {
        0
    } else {
        raw as u16
    }
}

/// Standard normal sample via Box-Muller
fn gaussian(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

impl DepthSource for SyntheticSource {
    fn properties(&self) -> DeviceProperties {
        DeviceProperties {
            width: self.config.width,
            height: self.config.height,
            focal_length: self.config.focal_length,
            focal_length_y: 0.0,
        }
    }

    fn grab(&mut self) -> Result<Option<DepthFrame>> {
        if self.config.frames.is_some_and(|n| self.index >= n) {
            return Ok(None);
        }

        let index = self.index;
        self.index += 1;

        if self.config.drop_rate > 0.0 && self.rng.gen::<f32>() < self.config.drop_rate {
            log::debug!("synthetic source: dropping frame {}", index);
            return Ok(Some(DepthFrame::empty()));
        }

        let pose = self.pose_at(index);
        Ok(Some(self.render(&pose)))
    }
}

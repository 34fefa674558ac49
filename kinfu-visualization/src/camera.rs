//! Orbit camera for the point cloud window

use kinfu_core::Point3f;
use nalgebra::{Matrix4, Perspective3, Point3, Unit, UnitQuaternion, Vector3};

/// Maps nalgebra's OpenGL clip space (z in [-1, 1]) to wgpu's (z in [0, 1])
#[rustfmt::skip]
pub fn opengl_to_wgpu() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

const MIN_DISTANCE: f32 = 0.05;
/// Keeps the orbit away from the poles where `up` and the view direction align
const MAX_ELEVATION_COS: f32 = 0.99;

/// A perspective camera orbiting a target point
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(
        position: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
        fov: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            target,
            up,
            fov,
            aspect_ratio,
            near,
            far,
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Perspective3::new(self.aspect_ratio, self.fov, self.near, self.far).into_inner()
    }

    /// Combined matrix in wgpu clip space
    pub fn view_projection(&self) -> Matrix4<f32> {
        opengl_to_wgpu() * self.projection_matrix() * self.view_matrix()
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).norm()
    }

    /// Rotate around the target: `horizontal` about `up`, `vertical` about the camera's right axis
    pub fn orbit(&mut self, horizontal: f32, vertical: f32) {
        let Some(up) = Unit::try_new(self.up, 1e-6) else {
            return;
        };
        let mut offset = UnitQuaternion::from_axis_angle(&up, -horizontal) * (self.position - self.target);

        if let Some(right) = Unit::try_new(up.cross(&offset), 1e-6) {
            let pitched = UnitQuaternion::from_axis_angle(&right, vertical) * offset;
            if pitched.normalize().dot(&up.into_inner()).abs() < MAX_ELEVATION_COS {
                offset = pitched;
            }
        }

        self.position = self.target + offset;
    }

    /// Move the camera and target together in the view plane
    pub fn pan(&mut self, horizontal: f32, vertical: f32) {
        let forward = (self.target - self.position).normalize();
        let right = forward.cross(&self.up).normalize();
        let up = right.cross(&forward);
        let scale = self.distance();
        let shift = (right * -horizontal + up * vertical) * scale;
        self.position += shift;
        self.target += shift;
    }

    /// Move toward the target by a fraction of the current distance
    pub fn zoom(&mut self, amount: f32) {
        let offset = self.position - self.target;
        let distance = (offset.norm() * (1.0 - amount)).max(MIN_DISTANCE);
        self.position = self.target + offset.normalize() * distance;
    }

    /// Aim at an axis-aligned box so that all of it is in view.
    ///
    /// The box is seen from the depth camera's side: looking down +z with
    /// +y pointing down, lifted slightly above the box.
    pub fn frame_bounds(&mut self, min: &Point3f, max: &Point3f) {
        let center = nalgebra::center(min, max);
        let radius = ((max - min).norm() * 0.5).max(MIN_DISTANCE);
        let distance = radius / (self.fov * 0.5).sin();

        self.up = -Vector3::y();
        self.target = center;
        self.position = center + Vector3::new(0.0, -0.3, -1.0).normalize() * distance;
        self.near = (distance - radius).max(0.01) * 0.5;
        self.far = (distance + radius) * 2.0;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Point3::origin(),
            Point3::new(0.0, 0.0, 1.0),
            -Vector3::y(),
            std::f32::consts::FRAC_PI_4,
            4.0 / 3.0,
            0.05,
            50.0,
        )
    }
}

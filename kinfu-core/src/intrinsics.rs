//! Pinhole camera intrinsics

use crate::point::Point3f;
use nalgebra::{Matrix3, Point2};
use serde::{Deserialize, Serialize};

/// Image dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of the next pyramid level (integer halving)
    pub fn halved(&self) -> Self {
        Self::new(self.width / 2, self.height / 2)
    }
}

/// Camera intrinsic parameters (focal lengths and principal point, in pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl CameraIntrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Derive intrinsics from what a depth device reports.
    ///
    /// Devices usually report a single focal length; a `focal_y` of zero means
    /// "not reported" and is replaced by `focal_x`. The principal point is put
    /// at the pixel-center of the image: `(width / 2 - 0.5, height / 2 - 0.5)`.
    pub fn from_focal_length(width: u32, height: u32, focal_x: f32, focal_y: f32) -> Self {
        let fx = focal_x;
        let fy = if (focal_y - 0.0).abs() <= f32::EPSILON {
            fx
        } else {
            focal_y
        };

        let cx = width as f32 / 2.0 - 0.5;
        let cy = height as f32 / 2.0 - 0.5;

        Self { fx, fy, cx, cy }
    }

    /// Intrinsics for an image resized by `factor` (0.5 for one pyramid level down)
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            fx: self.fx * factor,
            fy: self.fy * factor,
            cx: (self.cx + 0.5) * factor - 0.5,
            cy: (self.cy + 0.5) * factor - 0.5,
        }
    }

    /// Project a camera-space point to pixel coordinates
    pub fn project(&self, point: &Point3f) -> Point2<f32> {
        Point2::new(
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy,
        )
    }

    /// Back-project pixel `(u, v)` at depth `z` into camera space
    pub fn reproject(&self, u: f32, v: f32, z: f32) -> Point3f {
        Point3f::new((u - self.cx) * z / self.fx, (v - self.cy) * z / self.fy, z)
    }

    /// The 3x3 camera matrix
    pub fn matrix(&self) -> Matrix3<f32> {
        Matrix3::new(
            self.fx, 0.0, self.cx,
            0.0, self.fy, self.cy,
            0.0, 0.0, 1.0,
        )
    }
}

//! Core traits for kinfu-rs
//!
//! The control loop only talks to its collaborators through these traits:
//! a `DepthSource` produces frames, a `FusionEngine` consumes them.

use crate::{error::Result, frame::*, params::FusionParams, point::*, point_cloud::*};
use nalgebra::Isometry3;

/// Properties a depth device reports once it is open
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProperties {
    pub width: u32,
    pub height: u32,
    /// Horizontal focal length in pixels
    pub focal_length: f32,
    /// Vertical focal length in pixels, zero when the device reports only one
    pub focal_length_y: f32,
}

/// A stream of depth frames
pub trait DepthSource {
    /// Frame geometry and focal length of the stream
    fn properties(&self) -> DeviceProperties;

    /// Block until the next frame is available.
    ///
    /// `Ok(None)` means the stream is exhausted. A frame for which the
    /// device had nothing is returned as an empty `DepthFrame`.
    fn grab(&mut self) -> Result<Option<DepthFrame>>;
}

impl<S: DepthSource + ?Sized> DepthSource for Box<S> {
    fn properties(&self) -> DeviceProperties {
        (**self).properties()
    }

    fn grab(&mut self) -> Result<Option<DepthFrame>> {
        (**self).grab()
    }
}

/// A real-time volumetric fusion engine
pub trait FusionEngine {
    /// Track the camera against the model and integrate `depth`.
    ///
    /// Returns `Ok(false)` when tracking failed on this frame; the caller is
    /// expected to `reset` and keep going.
    fn update(&mut self, depth: &DepthFrame) -> Result<bool>;

    /// Forget the accumulated volume and the camera trajectory
    fn reset(&mut self);

    /// Shaded view of the model from the current camera pose
    fn render(&self) -> RenderImage;

    /// Shaded view of the model from an arbitrary camera pose
    fn render_from(&self, camera_pose: &Isometry3<f32>) -> RenderImage;

    /// Surface points of the model, in world coordinates
    fn points(&self) -> PointCloud<Point3f> {
        self.cloud().positions()
    }

    /// Surface points with normals, in world coordinates
    fn cloud(&self) -> PointCloud<NormalPoint3f>;

    /// Current camera pose (camera to world)
    fn pose(&self) -> Isometry3<f32>;

    fn params(&self) -> &FusionParams;
}

/// Trait for drawable objects
pub trait Drawable {
    /// Get the bounding box of the object
    fn bounding_box(&self) -> (Point3f, Point3f);

    /// Get the center point of the object
    fn center(&self) -> Point3f {
        let (min, max) = self.bounding_box();
        Point3f::new(
            (min.x + max.x) / 2.0,
            (min.y + max.y) / 2.0,
            (min.z + max.z) / 2.0,
        )
    }
}

impl<T> Drawable for PointCloud<T>
where
    T: Clone + Copy,
    Point3f: From<T>,
{
    fn bounding_box(&self) -> (Point3f, Point3f) {
        if self.is_empty() {
            return (Point3f::origin(), Point3f::origin());
        }

        let first_point = Point3f::from(self.points[0]);
        let mut min = first_point;
        let mut max = first_point;

        for point in &self.points {
            let p = Point3f::from(*point);
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);

            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        (min, max)
    }
}

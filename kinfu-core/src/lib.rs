//! Core data structures and traits for kinfu-rs
//!
//! This crate provides the types shared by every part of the fusion demo:
//! points and point clouds, camera intrinsics, depth frames and rendered
//! images, fusion parameters, and the two traits that separate the control
//! loop from its collaborators (`DepthSource` and `FusionEngine`).

pub mod point;
pub mod point_cloud;
pub mod intrinsics;
pub mod frame;
pub mod params;
pub mod traits;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use intrinsics::*;
pub use frame::*;
pub use params::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix3, Matrix4, Isometry3, UnitQuaternion, Translation3};

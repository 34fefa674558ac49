//! # kinfu-fusion
//!
//! Real-time volumetric fusion of depth frames in the style of KinectFusion.
//!
//! Each frame is converted to meters, smoothed with a bilateral filter and
//! turned into a pyramid of point/normal maps. The camera is tracked with
//! projective point-to-plane ICP against a ray cast of the model, and the
//! frame is integrated into a truncated signed distance volume.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use kinfu_core::{DepthFrame, FusionEngine, FusionParams};
//! use kinfu_fusion::KinFu;
//!
//! fn example(frames: Vec<DepthFrame>) -> kinfu_core::Result<()> {
//!     let params = FusionParams::coarse_params().with_camera(640, 480, 525.0, 0.0);
//!     let mut kinfu = KinFu::new(params)?;
//!
//!     for frame in &frames {
//!         if !kinfu.update(frame)? {
//!             kinfu.reset();
//!         }
//!     }
//!
//!     let cloud = kinfu.points();
//!     println!("fused {} points", cloud.len());
//!     Ok(())
//! }
//! ```

pub mod depth;
pub mod surface;
pub mod volume;
pub mod raycast;
pub mod icp;
pub mod render;
pub mod extract;
pub mod kinfu;

// Re-export commonly used items
pub use depth::DepthMap;
pub use surface::SurfaceMap;
pub use volume::{TsdfVolume, TsdfVoxel};
pub use raycast::raycast;
pub use icp::IcpSolver;
pub use render::render_surface;
pub use extract::extract_surface;
pub use kinfu::KinFu;

//! Point cloud files
//!
//! Fused surfaces are exported as PLY; the readers exist so exports can be
//! inspected and checked.

pub mod ply;

pub use ply::{read_normal_cloud, read_point_cloud, write_point_cloud, write_point_cloud_as, PlyFormat};

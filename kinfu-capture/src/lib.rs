//! Depth frame sources
//!
//! Every source implements [`kinfu_core::DepthSource`]:
//! - [`SyntheticSource`] ray-traces a small analytic room from a moving camera
//! - [`SequenceSource`] replays a directory of 16-bit PNG depth images

pub mod scene;
pub mod synthetic;
pub mod sequence;

pub use scene::{Scene, Shape};
pub use synthetic::{SyntheticConfig, SyntheticSource};
pub use sequence::SequenceSource;

use kinfu_core::{DepthSource, Result};
use std::path::PathBuf;

/// Which source to open, and how
#[derive(Debug, Clone)]
pub enum SourceConfig {
    Synthetic(SyntheticConfig),
    Sequence {
        dir: PathBuf,
        focal_length: f32,
        focal_length_y: f32,
    },
}

/// Open a depth source.
///
/// Fails with `Error::DeviceOpen` when the source cannot deliver frames.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn DepthSource>> {
    match config {
        SourceConfig::Synthetic(cfg) => Ok(Box::new(SyntheticSource::new(cfg.clone())?)),
        SourceConfig::Sequence {
            dir,
            focal_length,
            focal_length_y,
        } => Ok(Box::new(SequenceSource::open(dir, *focal_length, *focal_length_y)?)),
    }
}

//! Command line interface

use clap::{Parser, ValueEnum};
use kinfu_capture::{SourceConfig, SyntheticConfig};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Ray-traced room seen from a sweeping camera
    Synthetic,
    /// Directory of 16-bit PNG depth images (millimeters)
    Sequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// 256^3 voxels over 3 m
    Default,
    /// 128^3 voxels over 3 m, fewer ICP iterations
    Coarse,
}

/// Real-time volumetric fusion of a depth stream
#[derive(Parser, Debug, Clone)]
#[command(name = "kinfu", version, about)]
pub struct Cli {
    /// Where depth frames come from
    #[arg(long, value_enum, default_value_t = SourceKind::Synthetic)]
    pub source: SourceKind,

    /// Input directory for `--source sequence`
    #[arg(long, required_if_eq("source", "sequence"))]
    pub input: Option<PathBuf>,

    /// Horizontal focal length of a recorded sequence (pixels)
    #[arg(long, default_value_t = 525.0)]
    pub focal_length: f32,

    /// Vertical focal length of a recorded sequence (pixels, 0 = same as horizontal)
    #[arg(long, default_value_t = 0.0)]
    pub focal_length_y: f32,

    /// Fusion parameter preset
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    pub preset: Preset,

    /// JSON file with the full fusion parameters, instead of a preset
    #[arg(long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Write the fused surface points here on exit and on `s`
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Stop after this many fused frames
    #[arg(long)]
    pub frames: Option<usize>,

    /// Show the mirrored input depth next to the rendering
    #[arg(long)]
    pub show_depth: bool,

    /// Run without windows
    #[arg(long)]
    pub headless: bool,

    #[arg(long, default_value_t = 320)]
    pub synthetic_width: u32,

    #[arg(long, default_value_t = 240)]
    pub synthetic_height: u32,
}

impl Cli {
    pub fn source_config(&self) -> SourceConfig {
        match self.source {
            SourceKind::Synthetic => SourceConfig::Synthetic(
                SyntheticConfig::default().with_size(self.synthetic_width, self.synthetic_height),
            ),
            SourceKind::Sequence => SourceConfig::Sequence {
                dir: self.input.clone().unwrap_or_default(),
                focal_length: self.focal_length,
                focal_length_y: self.focal_length_y,
            },
        }
    }
}

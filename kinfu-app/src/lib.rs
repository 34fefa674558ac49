//! The `kinfu` demo: a depth source feeding a fusion engine, shown live
//!
//! [`run_app`] wires the pieces together; [`control::run`] is the loop
//! itself and only sees the `DepthSource`, `FusionEngine` and [`Display`]
//! traits.

pub mod cli;
pub mod config;
pub mod control;
pub mod display;

pub use cli::Cli;
pub use control::{run, Command, Display, LoopOptions, LoopStats, NullDisplay};

use anyhow::{Context, Result};
use kinfu_capture::open_source;
use kinfu_fusion::KinFu;
use display::WindowDisplay;

/// Open the source, build the engine and run the loop as `cli` asks
pub fn run_app(cli: &Cli) -> Result<LoopStats> {
    let mut source = open_source(&cli.source_config()).context("opening depth source")?;
    let device = source.properties();
    log::info!(
        "depth stream {}x{}, focal length {} px",
        device.width,
        device.height,
        device.focal_length
    );

    let params = config::resolve_params(cli.preset, cli.config.as_deref(), &device)?;
    let frame_size = params.frame_size;
    let mut engine = KinFu::new(params).context("creating fusion engine")?;

    let options = LoopOptions {
        max_frames: cli.frames,
        show_depth: cli.show_depth,
        export: cli.export.clone(),
    };

    let stats = if cli.headless {
        run(&mut source, &mut engine, &mut NullDisplay, &options)?
    } else {
        let mut display = WindowDisplay::open(frame_size).context("opening windows")?;
        run(&mut source, &mut engine, &mut display, &options)?
    };
    Ok(stats)
}

//! The grab / fuse / show loop

use kinfu_core::{DepthSource, FusionEngine, Point3f, PointCloud, RenderImage, Result};
use std::path::{Path, PathBuf};

/// Depth shown as white at zero and black at this range (meters)
const PREVIEW_RANGE: f32 = 4.0;

/// User requests coming from the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    Quit,
    Snapshot,
}

impl Command {
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'r' => Some(Command::Reset),
            'q' => Some(Command::Quit),
            's' => Some(Command::Snapshot),
            _ => None,
        }
    }
}

/// Where the loop shows its output and gets commands from
pub trait Display {
    /// Show the engine's rendering and surface points, plus the depth preview if enabled
    fn show(&mut self, render: &RenderImage, cloud: &PointCloud<Point3f>, depth: Option<&RenderImage>) -> Result<()>;

    /// Handle pending input; returns the commands issued since the last poll
    fn poll(&mut self) -> Result<Vec<Command>>;

    /// The user closed the display
    fn was_stopped(&self) -> bool;

    /// The model was reset and the view should follow
    fn model_reset(&mut self) {}
}

/// Display for headless runs
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn show(&mut self, _render: &RenderImage, _cloud: &PointCloud<Point3f>, _depth: Option<&RenderImage>) -> Result<()> {
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<Command>> {
        Ok(Vec::new())
    }

    fn was_stopped(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoopOptions {
    /// Stop after this many fused frames
    pub max_frames: Option<usize>,
    /// Pass the mirrored depth frame to the display
    pub show_depth: bool,
    /// PLY target for snapshots and the final export
    pub export: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub grabbed: usize,
    pub skipped: usize,
    pub fused: usize,
    pub tracking_resets: usize,
    pub manual_resets: usize,
    pub snapshots: usize,
}

fn reset<E: FusionEngine + ?Sized, D: Display + ?Sized>(engine: &mut E, display: &mut D) {
    log::info!("reset");
    engine.reset();
    display.model_reset();
}

fn export<E: FusionEngine + ?Sized>(engine: &E, path: &Path) -> Result<()> {
    kinfu_io::write_point_cloud(&engine.cloud(), path)
}

/// Run until the source is exhausted, the user quits, or the frame limit is reached
pub fn run<S, E, D>(source: &mut S, engine: &mut E, display: &mut D, options: &LoopOptions) -> Result<LoopStats>
where
    S: DepthSource + ?Sized,
    E: FusionEngine + ?Sized,
    D: Display + ?Sized,
{
    let mut stats = LoopStats::default();
    let preview_max = (PREVIEW_RANGE * engine.params().depth_factor).min(u16::MAX as f32) as u16;

    'frames: loop {
        if display.was_stopped() {
            log::info!("display closed");
            break;
        }
        if options.max_frames.is_some_and(|max| stats.fused >= max) {
            log::info!("fused {} frames, stopping", stats.fused);
            break;
        }

        let Some(mut depth) = source.grab()? else {
            log::info!("depth source exhausted");
            break;
        };
        stats.grabbed += 1;
        if depth.is_empty() {
            stats.skipped += 1;
            continue;
        }

        if !engine.update(&depth)? {
            stats.tracking_resets += 1;
            reset(engine, display);
            continue;
        }
        stats.fused += 1;

        depth.flip_horizontal();
        let preview = options.show_depth.then(|| depth.to_preview(preview_max));

        let render = engine.render();
        let cloud = engine.points();
        log::debug!("frame {}: {} surface points", stats.grabbed, cloud.len());
        display.show(&render, &cloud, preview.as_ref())?;

        for command in display.poll()? {
            match command {
                Command::Reset => {
                    stats.manual_resets += 1;
                    reset(engine, display);
                }
                Command::Quit => break 'frames,
                Command::Snapshot => match &options.export {
                    Some(path) => {
                        export(engine, path)?;
                        stats.snapshots += 1;
                    }
                    None => log::warn!("snapshot requested but no export path is set"),
                },
            }
        }
    }

    if let Some(path) = &options.export {
        export(engine, path)?;
    }

    log::info!(
        "grabbed {} frames: {} fused, {} skipped, {} tracking resets, {} manual resets",
        stats.grabbed,
        stats.fused,
        stats.skipped,
        stats.tracking_resets,
        stats.manual_resets
    );
    Ok(stats)
}

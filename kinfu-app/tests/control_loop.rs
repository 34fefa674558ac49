//! Control loop behavior against scripted collaborators

use kinfu_app::{run, Command, Display, LoopOptions, LoopStats, NullDisplay};
use kinfu_core::{
    DepthFrame, DepthSource, DeviceProperties, Error, FusionEngine, FusionParams, Isometry3, NormalPoint3f,
    Point3f, PointCloud, RenderImage, Result, Vector3f,
};
use std::collections::VecDeque;
use std::sync::{Mutex, Once};
use std::thread::{self, ThreadId};
use tempfile::TempDir;

const W: u32 = 4;
const H: u32 = 2;

fn frame(value: u16) -> DepthFrame {
    DepthFrame::new(W, H, vec![value; (W * H) as usize]).unwrap()
}

/// Hands out a fixed list of grab results
struct ScriptedSource {
    frames: VecDeque<Result<Option<DepthFrame>>>,
}

impl ScriptedSource {
    fn new(frames: Vec<Result<Option<DepthFrame>>>) -> Self {
        Self { frames: frames.into() }
    }

    fn of(frames: Vec<DepthFrame>) -> Self {
        Self::new(frames.into_iter().map(|f| Ok(Some(f))).collect())
    }
}

impl DepthSource for ScriptedSource {
    fn properties(&self) -> DeviceProperties {
        DeviceProperties {
            width: W,
            height: H,
            focal_length: 4.0,
            focal_length_y: 0.0,
        }
    }

    fn grab(&mut self) -> Result<Option<DepthFrame>> {
        self.frames.pop_front().unwrap_or(Ok(None))
    }
}

/// Accepts every frame except those whose first pixel is listed in `fail_on`
struct MockEngine {
    params: FusionParams,
    fail_on: Vec<u16>,
    updates: usize,
    resets: usize,
    fused_since_reset: usize,
}

impl MockEngine {
    fn new() -> Self {
        Self {
            params: FusionParams::default_params().with_camera(W, H, 4.0, 0.0),
            fail_on: Vec::new(),
            updates: 0,
            resets: 0,
            fused_since_reset: 0,
        }
    }

    fn failing_on(values: &[u16]) -> Self {
        Self {
            fail_on: values.to_vec(),
            ..Self::new()
        }
    }
}

impl FusionEngine for MockEngine {
    fn update(&mut self, depth: &DepthFrame) -> Result<bool> {
        self.updates += 1;
        if depth.size() != self.params.frame_size {
            return Err(Error::InvalidData("wrong size".into()));
        }
        let first = depth.get(0, 0).unwrap_or(0);
        if self.fail_on.contains(&first) {
            return Ok(false);
        }
        self.fused_since_reset += 1;
        Ok(true)
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.fused_since_reset = 0;
    }

    fn render(&self) -> RenderImage {
        RenderImage::new(W, H)
    }

    fn render_from(&self, _camera_pose: &Isometry3<f32>) -> RenderImage {
        RenderImage::new(W, H)
    }

    fn cloud(&self) -> PointCloud<NormalPoint3f> {
        (0..self.fused_since_reset)
            .map(|i| NormalPoint3f::new(Point3f::new(i as f32, 0.0, 1.0), -Vector3f::z()))
            .collect()
    }

    fn pose(&self) -> Isometry3<f32> {
        Isometry3::identity()
    }

    fn params(&self) -> &FusionParams {
        &self.params
    }
}

/// Records what it is shown and replays scripted key commands
#[derive(Default)]
struct RecordingDisplay {
    commands: VecDeque<Vec<Command>>,
    stop_after_shows: Option<usize>,
    shown_clouds: Vec<usize>,
    depth_previews: Vec<RenderImage>,
    model_resets: usize,
}

impl Display for RecordingDisplay {
    fn show(&mut self, _render: &RenderImage, cloud: &PointCloud<Point3f>, depth: Option<&RenderImage>) -> Result<()> {
        self.shown_clouds.push(cloud.len());
        if let Some(depth) = depth {
            self.depth_previews.push(depth.clone());
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<Command>> {
        Ok(self.commands.pop_front().unwrap_or_default())
    }

    fn was_stopped(&self) -> bool {
        self.stop_after_shows.is_some_and(|n| self.shown_clouds.len() >= n)
    }

    fn model_reset(&mut self) {
        self.model_resets += 1;
    }
}

/// Keeps every info record together with the thread that logged it
struct CaptureLogger {
    records: Mutex<Vec<(ThreadId, log::Level, String)>>,
}

impl log::Log for CaptureLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let entry = (thread::current().id(), record.level(), record.args().to_string());
            self.records.lock().unwrap().push(entry);
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: Mutex::new(Vec::new()),
};
static INSTALL_LOGGER: Once = Once::new();

/// Messages logged at `level` by the calling thread so far
fn logged_on_this_thread(level: log::Level) -> Vec<String> {
    INSTALL_LOGGER.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(log::LevelFilter::Info);
    });
    let me = thread::current().id();
    LOGGER
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(id, l, _)| *id == me && *l == level)
        .map(|(_, _, message)| message.clone())
        .collect()
}

#[test]
fn test_runs_until_source_is_exhausted() {
    let mut source = ScriptedSource::of(vec![frame(1000), frame(1001), frame(1002)]);
    let mut engine = MockEngine::new();
    let mut display = RecordingDisplay::default();

    let stats = run(&mut source, &mut engine, &mut display, &LoopOptions::default()).unwrap();

    assert_eq!(
        stats,
        LoopStats {
            grabbed: 3,
            fused: 3,
            ..LoopStats::default()
        }
    );
    assert_eq!(display.shown_clouds, vec![1, 2, 3]);
    assert!(display.depth_previews.is_empty());
}

#[test]
fn test_empty_frames_are_skipped() {
    let mut source = ScriptedSource::of(vec![DepthFrame::empty(), frame(1000), DepthFrame::empty()]);
    let mut engine = MockEngine::new();
    let mut display = RecordingDisplay::default();

    let stats = run(&mut source, &mut engine, &mut display, &LoopOptions::default()).unwrap();

    assert_eq!(stats.grabbed, 3);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.fused, 1);
    assert_eq!(engine.updates, 1);
    assert_eq!(display.shown_clouds.len(), 1);
}

#[test]
fn test_tracking_failure_resets_and_continues() {
    let mut source = ScriptedSource::of(vec![frame(1000), frame(1001), frame(13), frame(1002)]);
    let mut engine = MockEngine::failing_on(&[13]);
    let mut display = RecordingDisplay::default();

    let stats = run(&mut source, &mut engine, &mut display, &LoopOptions::default()).unwrap();

    assert_eq!(stats.tracking_resets, 1);
    assert_eq!(stats.fused, 3);
    assert_eq!(engine.resets, 1);
    assert_eq!(display.model_resets, 1);
    // the failed frame is not shown, and the model restarts after it
    assert_eq!(display.shown_clouds, vec![1, 2, 1]);
}

#[test]
fn test_reset_and_quit_keys() {
    let mut source = ScriptedSource::of((0..10).map(|i| frame(1000 + i)).collect());
    let mut engine = MockEngine::new();
    let mut display = RecordingDisplay {
        commands: vec![vec![], vec![Command::Reset], vec![], vec![Command::Quit]].into(),
        ..RecordingDisplay::default()
    };

    let stats = run(&mut source, &mut engine, &mut display, &LoopOptions::default()).unwrap();

    assert_eq!(stats.manual_resets, 1);
    assert_eq!(stats.fused, 4);
    assert_eq!(stats.grabbed, 4);
    assert_eq!(engine.resets, 1);
    assert_eq!(display.model_resets, 1);
    assert_eq!(display.shown_clouds, vec![1, 2, 1, 2]);
}

#[test]
fn test_frame_limit() {
    let mut source = ScriptedSource::of((0..10).map(|i| frame(1000 + i)).collect());
    let mut engine = MockEngine::new();
    let options = LoopOptions {
        max_frames: Some(2),
        ..LoopOptions::default()
    };

    let stats = run(&mut source, &mut engine, &mut NullDisplay, &options).unwrap();
    assert_eq!(stats.fused, 2);
    assert_eq!(stats.grabbed, 2);
}

#[test]
fn test_closed_display_stops_before_next_grab() {
    let mut source = ScriptedSource::of((0..10).map(|i| frame(1000 + i)).collect());
    let mut engine = MockEngine::new();
    let mut display = RecordingDisplay {
        stop_after_shows: Some(3),
        ..RecordingDisplay::default()
    };

    let stats = run(&mut source, &mut engine, &mut display, &LoopOptions::default()).unwrap();
    assert_eq!(stats.grabbed, 3);
    assert_eq!(source.frames.len(), 7);
}

#[test]
fn test_depth_preview_is_mirrored() {
    // near on the left edge, nothing elsewhere
    let mut data = vec![0u16; (W * H) as usize];
    data[0] = 500;
    data[W as usize] = 500;
    let mut source = ScriptedSource::of(vec![DepthFrame::new(W, H, data).unwrap()]);
    let mut engine = MockEngine::new();
    let mut display = RecordingDisplay::default();
    let options = LoopOptions {
        show_depth: true,
        ..LoopOptions::default()
    };

    run(&mut source, &mut engine, &mut display, &options).unwrap();

    let preview = &display.depth_previews[0];
    assert_eq!(preview.pixel(0, 0), [0, 0, 0, 255]);
    assert!(preview.pixel(W - 1, 0)[0] > 200);
    assert!(preview.pixel(W - 1, 1)[0] > 200);
}

#[test]
fn test_snapshot_and_final_export() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.ply");
    let mut source = ScriptedSource::of(vec![frame(1000), frame(1001), frame(1002)]);
    let mut engine = MockEngine::new();
    let mut display = RecordingDisplay {
        commands: vec![vec![Command::Snapshot]].into(),
        ..RecordingDisplay::default()
    };
    let options = LoopOptions {
        export: Some(path.clone()),
        ..LoopOptions::default()
    };

    let stats = run(&mut source, &mut engine, &mut display, &options).unwrap();

    assert_eq!(stats.snapshots, 1);
    // the final export overwrites the snapshot with the full model
    assert_eq!(kinfu_io::read_point_cloud(&path).unwrap().len(), 3);
}

#[test]
fn test_snapshot_without_export_path_is_ignored() {
    let mut source = ScriptedSource::of(vec![frame(1000)]);
    let mut engine = MockEngine::new();
    let mut display = RecordingDisplay {
        commands: vec![vec![Command::Snapshot]].into(),
        ..RecordingDisplay::default()
    };

    let stats = run(&mut source, &mut engine, &mut display, &LoopOptions::default()).unwrap();
    assert_eq!(stats.snapshots, 0);
}

#[test]
fn test_source_and_engine_errors_propagate() {
    let mut source = ScriptedSource::new(vec![Ok(Some(frame(1000))), Err(Error::Io(std::io::Error::other("unplugged")))]);
    let mut engine = MockEngine::new();
    let result = run(&mut source, &mut engine, &mut NullDisplay, &LoopOptions::default());
    assert!(matches!(result, Err(Error::Io(_))));

    let mut source = ScriptedSource::of(vec![DepthFrame::zeros(W * 2, H)]);
    let result = run(&mut source, &mut MockEngine::new(), &mut NullDisplay, &LoopOptions::default());
    assert!(matches!(result, Err(Error::InvalidData(_))));
}

#[test]
fn test_tracking_failure_logs_one_reset_notice() {
    assert!(logged_on_this_thread(log::Level::Info).is_empty());

    let mut source = ScriptedSource::of(vec![frame(1000), frame(13), frame(1001)]);
    let mut engine = MockEngine::failing_on(&[13]);
    let stats = run(&mut source, &mut engine, &mut NullDisplay, &LoopOptions::default()).unwrap();
    assert_eq!(stats.tracking_resets, 1);

    let resets = logged_on_this_thread(log::Level::Info)
        .into_iter()
        .filter(|message| message == "reset")
        .count();
    assert_eq!(resets, 1);
}

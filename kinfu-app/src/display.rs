//! Windowed display backed by the wgpu viewer

use crate::control::{Command, Display};
use kinfu_core::{FrameSize, Point3f, PointCloud, RenderImage, Result};
use kinfu_visualization::{FusionViewer, ViewerConfig};

pub struct WindowDisplay {
    viewer: FusionViewer,
}

impl WindowDisplay {
    /// Open the render and point windows sized for `frame` images
    pub fn open(frame: FrameSize) -> Result<Self> {
        let viewer = FusionViewer::new(ViewerConfig {
            window_size: (frame.width, frame.height),
            ..ViewerConfig::default()
        })?;
        log::info!("keys: r = reset, s = snapshot, q = quit");
        Ok(Self { viewer })
    }
}

impl Display for WindowDisplay {
    fn show(&mut self, render: &RenderImage, cloud: &PointCloud<Point3f>, depth: Option<&RenderImage>) -> Result<()> {
        match depth {
            Some(depth) => self.viewer.show_image(&render.hconcat(depth)),
            None => self.viewer.show_image(render),
        }
        self.viewer.show_cloud(cloud);
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<Command>> {
        Ok(self.viewer.spin_once()?.into_iter().filter_map(Command::from_key).collect())
    }

    fn was_stopped(&self) -> bool {
        self.viewer.was_stopped()
    }

    fn model_reset(&mut self) {
        self.viewer.reset_view();
    }
}

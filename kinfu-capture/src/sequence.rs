//! Replay of recorded 16-bit PNG depth images

use kinfu_core::{DepthFrame, DepthSource, DeviceProperties, Error, Result};
use std::path::{Path, PathBuf};

/// Depth source over a directory of PNG files, played back in file name order.
///
/// The first image fixes the frame size; later files that cannot be decoded
/// or have another size come back as empty frames.
pub struct SequenceSource {
    files: Vec<PathBuf>,
    next: usize,
    width: u32,
    height: u32,
    focal_length: f32,
    focal_length_y: f32,
}

impl SequenceSource {
    pub fn open<P: AsRef<Path>>(dir: P, focal_length: f32, focal_length_y: f32) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| Error::DeviceOpen(format!("cannot read {}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
            })
            .collect();
        files.sort();

        let first = files
            .first()
            .ok_or_else(|| Error::DeviceOpen(format!("no PNG depth images in {}", dir.display())))?;
        let (width, height) = image::image_dimensions(first)
            .map_err(|e| Error::DeviceOpen(format!("cannot read {}: {}", first.display(), e)))?;

        log::info!(
            "sequence source: {} frames of {}x{} from {}",
            files.len(),
            width,
            height,
            dir.display()
        );

        Ok(Self {
            files,
            next: 0,
            width,
            height,
            focal_length,
            focal_length_y,
        })
    }

    /// Number of frames in the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn load(&self, path: &Path) -> Result<DepthFrame> {
        let img = image::open(path)
            .map_err(|e| Error::InvalidData(format!("{}: {}", path.display(), e)))?
            .into_luma16();
        if img.width() != self.width || img.height() != self.height {
            return Err(Error::InvalidData(format!(
                "{} is {}x{}, sequence is {}x{}",
                path.display(),
                img.width(),
                img.height(),
                self.width,
                self.height
            )));
        }
        DepthFrame::new(self.width, self.height, img.into_raw())
    }
}

impl DepthSource for SequenceSource {
    fn properties(&self) -> DeviceProperties {
        DeviceProperties {
            width: self.width,
            height: self.height,
            focal_length: self.focal_length,
            focal_length_y: self.focal_length_y,
        }
    }

    fn grab(&mut self) -> Result<Option<DepthFrame>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        match self.load(path) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => {
                log::warn!("skipping depth image: {}", e);
                Ok(Some(DepthFrame::empty()))
            }
        }
    }
}

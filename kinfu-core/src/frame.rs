//! Per-frame image buffers
//!
//! `DepthFrame` is what a depth source hands to the engine; `RenderImage` is
//! what the engine hands back for display. Both live for one loop iteration.

use crate::error::{Error, Result};
use crate::intrinsics::FrameSize;

/// Raw depth image in device units (one `u16` per pixel, row-major).
/// A value of zero means "no measurement".
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    width: u32,
    height: u32,
    data: Vec<u16>,
}

impl DepthFrame {
    /// Wrap a buffer; its length must be `width * height`
    pub fn new(width: u32, height: u32, data: Vec<u16>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(Error::InvalidData(format!(
                "depth buffer has {} values, expected {}x{} = {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self { width, height, data })
    }

    /// A frame with no pixels, standing in for "nothing captured"
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }

    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// True when the frame carries no pixels at all
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        if x < self.width && y < self.height {
            Some(self.data[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }

    /// Mirror the frame around its vertical axis, in place
    pub fn flip_horizontal(&mut self) {
        if self.width == 0 {
            return;
        }
        for row in self.data.chunks_exact_mut(self.width as usize) {
            row.reverse();
        }
    }

    /// Grayscale visualization: near is bright, far and missing are black
    pub fn to_preview(&self, max_depth: u16) -> RenderImage {
        let max_depth = max_depth.max(1) as f32;
        RenderImage::from_fn(self.width, self.height, |x, y| {
            let d = self.data[(y * self.width + x) as usize];
            if d == 0 {
                return [0, 0, 0, 255];
            }
            let t = 1.0 - (d as f32 / max_depth).min(1.0);
            let v = (t * 255.0) as u8;
            [v, v, v, 255]
        })
    }
}

/// RGBA8 image, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct RenderImage {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl RenderImage {
    /// An opaque black image
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0, 0, 0, 255]; width as usize * height as usize],
        }
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [u8; 4],
    {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// Raw bytes, suitable for a texture upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Place `other` to the right of `self`; the shorter image is padded with black
    pub fn hconcat(&self, other: &RenderImage) -> RenderImage {
        let width = self.width + other.width;
        let height = self.height.max(other.height);
        RenderImage::from_fn(width, height, |x, y| {
            if x < self.width {
                if y < self.height {
                    self.pixel(x, y)
                } else {
                    [0, 0, 0, 255]
                }
            } else if y < other.height {
                other.pixel(x - self.width, y)
            } else {
                [0, 0, 0, 255]
            }
        })
    }
}

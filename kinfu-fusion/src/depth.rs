//! Metric depth maps and their preprocessing

use kinfu_core::{DepthFrame, FrameSize};
use rayon::prelude::*;

/// Depth in meters, row-major. Zero marks a missing measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    pub size: FrameSize,
    pub data: Vec<f32>,
}

impl DepthMap {
    pub fn new(size: FrameSize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), size.area());
        Self { size, data }
    }

    /// Convert raw device units to meters.
    ///
    /// `truncate_threshold` drops everything farther away (0 disables it).
    pub fn from_frame(frame: &DepthFrame, depth_factor: f32, truncate_threshold: f32) -> Self {
        let scale = 1.0 / depth_factor;
        let data = frame
            .as_slice()
            .iter()
            .map(|&raw| {
                if raw == 0 {
                    return 0.0;
                }
                let d = raw as f32 * scale;
                if truncate_threshold > 0.0 && d > truncate_threshold {
                    0.0
                } else {
                    d
                }
            })
            .collect();

        Self {
            size: frame.size(),
            data,
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.size.width + x) as usize]
    }

    /// Number of pixels carrying a measurement
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&d| d > 0.0).count()
    }

    /// Edge-preserving smoothing; missing pixels stay missing
    pub fn bilateral_filter(&self, kernel_size: usize, sigma_depth: f32, sigma_spatial: f32) -> DepthMap {
        let width = self.size.width as i64;
        let height = self.size.height as i64;
        let radius = (kernel_size / 2) as i64;
        let inv_spatial = 1.0 / (2.0 * sigma_spatial * sigma_spatial);
        let inv_depth = 1.0 / (2.0 * sigma_depth * sigma_depth);

        let mut out = vec![0.0f32; self.data.len()];
        out.par_chunks_mut(self.size.width.max(1) as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as i64;
                for (x, value) in row.iter_mut().enumerate() {
                    let x = x as i64;
                    let center = self.data[(y * width + x) as usize];
                    if center <= 0.0 {
                        continue;
                    }

                    let mut sum = 0.0f32;
                    let mut weight_sum = 0.0f32;
                    for ny in (y - radius).max(0)..=(y + radius).min(height - 1) {
                        for nx in (x - radius).max(0)..=(x + radius).min(width - 1) {
                            let d = self.data[(ny * width + nx) as usize];
                            if d <= 0.0 {
                                continue;
                            }
                            let spatial = ((nx - x).pow(2) + (ny - y).pow(2)) as f32;
                            let range = (d - center) * (d - center);
                            let w = (-spatial * inv_spatial - range * inv_depth).exp();
                            sum += w * d;
                            weight_sum += w;
                        }
                    }

                    *value = sum / weight_sum;
                }
            });

        DepthMap::new(self.size, out)
    }

    /// Half-resolution map. Each output pixel averages its 2x2 block, ignoring
    /// samples more than `3 * sigma_depth` away from the block's first valid one.
    pub fn pyr_down(&self, sigma_depth: f32) -> DepthMap {
        let size = self.size.halved();
        let max_diff = 3.0 * sigma_depth;

        let mut out = vec![0.0f32; size.area()];
        out.par_chunks_mut(size.width.max(1) as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                for (x, value) in row.iter_mut().enumerate() {
                    let x = x as u32;
                    let block = [
                        self.get(2 * x, 2 * y),
                        self.get(2 * x + 1, 2 * y),
                        self.get(2 * x, 2 * y + 1),
                        self.get(2 * x + 1, 2 * y + 1),
                    ];

                    let Some(&reference) = block.iter().find(|&&d| d > 0.0) else {
                        continue;
                    };

                    let (sum, count) = block
                        .iter()
                        .filter(|&&d| d > 0.0 && (d - reference).abs() <= max_diff)
                        .fold((0.0f32, 0u32), |(s, c), &d| (s + d, c + 1));
                    *value = sum / count as f32;
                }
            });

        DepthMap::new(size, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn constant_map(width: u32, height: u32, depth: f32) -> DepthMap {
        DepthMap::new(FrameSize::new(width, height), vec![depth; (width * height) as usize])
    }

    #[test]
    fn test_from_frame_scales_and_truncates() {
        let frame = DepthFrame::new(4, 1, vec![0, 1000, 2500, 4000]).unwrap();

        let map = DepthMap::from_frame(&frame, 1000.0, 0.0);
        assert_eq!(map.data, vec![0.0, 1.0, 2.5, 4.0]);

        let truncated = DepthMap::from_frame(&frame, 1000.0, 3.0);
        assert_eq!(truncated.data, vec![0.0, 1.0, 2.5, 0.0]);
        assert_eq!(truncated.valid_count(), 2);
    }

    #[test]
    fn test_bilateral_keeps_constant_depth() {
        let map = constant_map(16, 12, 1.25);
        let filtered = map.bilateral_filter(7, 0.04, 4.5);
        for d in filtered.data {
            assert_relative_eq!(d, 1.25, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_bilateral_preserves_holes_and_edges() {
        let mut map = constant_map(8, 8, 1.0);
        for y in 0..8 {
            for x in 4..8 {
                map.data[y * 8 + x] = 2.0;
            }
        }
        map.data[0] = 0.0;

        let filtered = map.bilateral_filter(5, 0.04, 3.0);
        assert_eq!(filtered.get(0, 0), 0.0);
        // the 1 m step is far beyond sigma_depth, so the sides do not mix
        assert_relative_eq!(filtered.get(3, 4), 1.0, epsilon = 1e-4);
        assert_relative_eq!(filtered.get(4, 4), 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_pyr_down_halves_and_rejects_outliers() {
        let mut map = constant_map(4, 4, 1.0);
        map.data[1] = 3.0; // outlier inside the first block
        map.data[2] = 0.0;
        map.data[3] = 0.0;
        map.data[6] = 0.0;
        map.data[7] = 0.0; // second block completely missing

        let half = map.pyr_down(0.04);
        assert_eq!(half.size, FrameSize::new(2, 2));
        assert_relative_eq!(half.get(0, 0), 1.0);
        assert_eq!(half.get(1, 0), 0.0);
        assert_relative_eq!(half.get(1, 1), 1.0);
    }
}

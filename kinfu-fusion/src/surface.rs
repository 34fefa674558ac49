//! Per-pixel point and normal maps

use crate::depth::DepthMap;
use kinfu_core::{CameraIntrinsics, FrameSize, NormalPoint3f, Point3f, Vector3f};
use rayon::prelude::*;

/// A camera-space point/normal sample per pixel; `None` where nothing was seen
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMap {
    pub size: FrameSize,
    pub data: Vec<Option<NormalPoint3f>>,
}

impl SurfaceMap {
    pub fn empty(size: FrameSize) -> Self {
        Self {
            size,
            data: vec![None; size.area()],
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<&NormalPoint3f> {
        self.data[(y * self.size.width + x) as usize].as_ref()
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|s| s.is_some()).count()
    }

    /// Back-project a depth map and estimate normals from forward differences.
    /// Normals face the camera. The last row and column have no normal.
    pub fn from_depth(depth: &DepthMap, intrinsics: &CameraIntrinsics) -> Self {
        let size = depth.size;
        let mut data = vec![None; size.area()];

        data.par_chunks_mut(size.width.max(1) as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                if y + 1 >= size.height {
                    return;
                }
                for (x, sample) in row.iter_mut().enumerate().take(size.width.saturating_sub(1) as usize) {
                    let x = x as u32;
                    let d = depth.get(x, y);
                    let dx = depth.get(x + 1, y);
                    let dy = depth.get(x, y + 1);
                    if d <= 0.0 || dx <= 0.0 || dy <= 0.0 {
                        continue;
                    }

                    let p = intrinsics.reproject(x as f32, y as f32, d);
                    let px = intrinsics.reproject((x + 1) as f32, y as f32, dx);
                    let py = intrinsics.reproject(x as f32, (y + 1) as f32, dy);

                    let Some(normal) = facing_normal(&p, &(px - p), &(py - p)) else {
                        continue;
                    };
                    *sample = Some(NormalPoint3f::new(p, normal));
                }
            });

        Self { size, data }
    }

    /// Half-resolution map averaging the valid samples of each 2x2 block
    pub fn downsample(&self) -> SurfaceMap {
        let size = self.size.halved();
        let mut data = vec![None; size.area()];

        data.par_chunks_mut(size.width.max(1) as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                for (x, sample) in row.iter_mut().enumerate() {
                    let x = x as u32;
                    let mut position = Vector3f::zeros();
                    let mut normal = Vector3f::zeros();
                    let mut count = 0.0f32;

                    for (sx, sy) in [(2 * x, 2 * y), (2 * x + 1, 2 * y), (2 * x, 2 * y + 1), (2 * x + 1, 2 * y + 1)] {
                        if let Some(s) = self.get(sx, sy) {
                            position += s.position.coords;
                            normal += s.normal;
                            count += 1.0;
                        }
                    }

                    if count == 0.0 {
                        continue;
                    }
                    let Some(normal) = normal.try_normalize(1e-6) else {
                        continue;
                    };
                    *sample = Some(NormalPoint3f::new(Point3f::from(position / count), normal));
                }
            });

        Self { size, data }
    }
}

/// Unit normal of the patch spanned by `du` and `dv`, flipped toward the camera
fn facing_normal(point: &Point3f, du: &Vector3f, dv: &Vector3f) -> Option<Vector3f> {
    let normal = du.cross(dv).try_normalize(1e-12)?;
    if normal.dot(&point.coords) > 0.0 {
        Some(-normal)
    } else {
        Some(normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plane(width: u32, height: u32, depth: f32) -> DepthMap {
        DepthMap::new(FrameSize::new(width, height), vec![depth; (width * height) as usize])
    }

    #[test]
    fn test_fronto_parallel_plane_faces_camera() {
        let intr = CameraIntrinsics::from_focal_length(8, 6, 10.0, 0.0);
        let surface = SurfaceMap::from_depth(&plane(8, 6, 2.0), &intr);

        let s = surface.get(3, 2).unwrap();
        assert_relative_eq!(s.position.z, 2.0);
        assert_relative_eq!(s.normal.z, -1.0, epsilon = 1e-5);

        // last row/column have no forward neighbour
        assert!(surface.get(7, 2).is_none());
        assert!(surface.get(3, 5).is_none());
        assert_eq!(surface.valid_count(), 7 * 5);
    }

    #[test]
    fn test_holes_produce_no_samples() {
        let intr = CameraIntrinsics::from_focal_length(4, 4, 5.0, 0.0);
        let mut depth = plane(4, 4, 1.0);
        depth.data[5] = 0.0;
        let surface = SurfaceMap::from_depth(&depth, &intr);

        assert!(surface.get(1, 1).is_none());
        assert!(surface.get(0, 1).is_none()); // right neighbour missing
        assert!(surface.get(1, 0).is_none()); // lower neighbour missing
        assert!(surface.get(0, 0).is_some());
    }

    #[test]
    fn test_downsample_averages_blocks() {
        let intr = CameraIntrinsics::from_focal_length(8, 8, 10.0, 0.0);
        let surface = SurfaceMap::from_depth(&plane(8, 8, 1.5), &intr);
        let half = surface.downsample();

        assert_eq!(half.size, FrameSize::new(4, 4));
        let s = half.get(1, 1).unwrap();
        assert_relative_eq!(s.position.z, 1.5, epsilon = 1e-5);
        assert_relative_eq!(s.normal.norm(), 1.0, epsilon = 1e-5);
        // only the top-left sample of the last block is valid, which is enough
        assert!(half.get(3, 3).is_some());
    }
}

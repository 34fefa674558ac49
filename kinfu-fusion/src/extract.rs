//! Point cloud extraction from the TSDF volume

use crate::volume::TsdfVolume;
use kinfu_core::{NormalPoint3f, PointCloud, Vector3f};
use rayon::prelude::*;

/// Surface samples at every zero crossing between observed neighbouring
/// voxels along the three axes, in world coordinates with unit normals.
pub fn extract_surface(volume: &TsdfVolume) -> PointCloud<NormalPoint3f> {
    let [dim_x, dim_y, dim_z] = volume.dims();
    let voxel_size = volume.voxel_size();
    let pose = *volume.pose();
    let axes = [Vector3f::x(), Vector3f::y(), Vector3f::z()];

    let points: Vec<NormalPoint3f> = (0..dim_x)
        .into_par_iter()
        .flat_map_iter(|x| {
            let mut slab = Vec::new();
            for y in 0..dim_y {
                for z in 0..dim_z {
                    let v0 = volume.voxel(x, y, z);
                    if v0.weight <= 0.0 {
                        continue;
                    }
                    let center = volume.voxel_center(x, y, z);

                    let neighbours = [
                        (x + 1 < dim_x).then(|| volume.voxel(x + 1, y, z)),
                        (y + 1 < dim_y).then(|| volume.voxel(x, y + 1, z)),
                        (z + 1 < dim_z).then(|| volume.voxel(x, y, z + 1)),
                    ];

                    for (axis, neighbour) in axes.iter().zip(neighbours) {
                        let Some(vn) = neighbour else {
                            continue;
                        };
                        if vn.weight <= 0.0 || (v0.tsdf > 0.0) == (vn.tsdf > 0.0) {
                            continue;
                        }

                        let t = v0.tsdf / (v0.tsdf - vn.tsdf);
                        let position = center + axis * (t * voxel_size);
                        let Some(normal) = volume.gradient(&position) else {
                            continue;
                        };

                        slab.push(NormalPoint3f::new(pose * position, pose.rotation * normal));
                    }
                }
            }
            slab
        })
        .collect();

    PointCloud::from_points(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depth::DepthMap;
    use kinfu_core::{CameraIntrinsics, FrameSize, Isometry3};

    #[test]
    fn test_empty_volume_has_no_points() {
        let volume = TsdfVolume::new([8, 8, 8], 0.1, 0.3, 64.0, Isometry3::identity());
        assert!(extract_surface(&volume).is_empty());
    }

    #[test]
    fn test_plane_points_lie_on_plane_in_world() {
        let size = FrameSize::new(64, 48);
        let intr = CameraIntrinsics::from_focal_length(64, 48, 52.5, 0.0);
        let mut volume = TsdfVolume::new([32, 32, 32], 0.02, 0.06, 64.0, Isometry3::translation(-0.32, -0.32, 0.1));
        volume.integrate(&DepthMap::new(size, vec![0.4; size.area()]), &intr, &Isometry3::identity());

        let cloud = extract_surface(&volume);
        assert!(cloud.len() > 100);
        for p in cloud.iter() {
            assert!((p.position.z - 0.4).abs() < 0.02, "point off the plane: {:?}", p.position);
            assert!(p.normal.z < -0.5);
        }
    }
}

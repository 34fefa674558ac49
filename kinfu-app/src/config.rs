//! Fusion parameters from a preset or a JSON file, fitted to the device

use crate::cli::Preset;
use anyhow::{Context, Result};
use kinfu_core::{DeviceProperties, FusionParams};
use std::path::Path;

pub fn preset_params(preset: Preset) -> FusionParams {
    match preset {
        Preset::Default => FusionParams::default_params(),
        Preset::Coarse => FusionParams::coarse_params(),
    }
}

/// Read a full `FusionParams` from JSON
pub fn load_params(path: &Path) -> Result<FusionParams> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing fusion parameters in {}", path.display()))
}

/// Adopt the device's frame size and focal lengths, then check the result
pub fn fit_to_device(params: FusionParams, device: &DeviceProperties) -> Result<FusionParams> {
    let params = params.with_camera(device.width, device.height, device.focal_length, device.focal_length_y);
    params.validate().context("invalid fusion parameters")?;
    log::debug!("fusion parameters: {:?}", params);
    Ok(params)
}

/// Preset or file, fitted to `device`
pub fn resolve_params(preset: Preset, file: Option<&Path>, device: &DeviceProperties) -> Result<FusionParams> {
    let params = match file {
        Some(path) => load_params(path)?,
        None => preset_params(preset),
    };
    fit_to_device(params, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinfu_core::{Error, MILLIMETER_DEPTH_FACTOR};
    use tempfile::TempDir;

    fn device() -> DeviceProperties {
        DeviceProperties {
            width: 320,
            height: 240,
            focal_length: 285.0,
            focal_length_y: 0.0,
        }
    }

    #[test]
    fn test_preset_is_fitted_to_device() {
        let params = resolve_params(Preset::Coarse, None, &device()).unwrap();
        assert_eq!(params.volume_dims, [128; 3]);
        assert_eq!((params.frame_size.width, params.frame_size.height), (320, 240));
        assert_eq!(params.intrinsics.fx, 285.0);
        assert_eq!(params.intrinsics.fy, 285.0);
        assert_eq!(params.intrinsics.cx, 159.5);
        assert_eq!(params.depth_factor, MILLIMETER_DEPTH_FACTOR);
    }

    #[test]
    fn test_json_file_overrides_preset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.json");
        let mut custom = FusionParams::coarse_params();
        custom.volume_dims = [64, 64, 96];
        custom.icp_iterations = vec![8, 4];
        std::fs::write(&path, serde_json::to_string_pretty(&custom).unwrap()).unwrap();

        let params = resolve_params(Preset::Default, Some(&path), &device()).unwrap();
        assert_eq!(params.volume_dims, [64, 64, 96]);
        assert_eq!(params.pyramid_levels(), 2);
        assert_eq!(params.frame_size.width, 320);
    }

    #[test]
    fn test_bad_json_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, "{ \"voxel_size\": ").unwrap();
        assert!(resolve_params(Preset::Default, Some(&path), &device()).is_err());
    }

    #[test]
    fn test_device_too_small_for_pyramid_is_rejected() {
        let tiny = DeviceProperties {
            width: 6,
            height: 6,
            focal_length: 5.0,
            focal_length_y: 0.0,
        };
        let err = resolve_params(Preset::Default, None, &tiny).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
    }
}

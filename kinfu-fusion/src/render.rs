//! Shading of ray cast surfaces

use crate::surface::SurfaceMap;
use kinfu_core::{Point3f, RenderImage};

const AMBIENT: f32 = 0.1;
const DIFFUSE: f32 = 0.8;
const SPECULAR: f32 = 0.2;
const SHININESS: f32 = 20.0;

/// Phong-shaded grayscale rendering of a camera-space surface map.
/// Pixels without a surface sample are black.
pub fn render_surface(surface: &SurfaceMap, light: &Point3f) -> RenderImage {
    RenderImage::from_fn(surface.size.width, surface.size.height, |x, y| {
        let Some(sample) = surface.get(x, y) else {
            return [0, 0, 0, 255];
        };

        let p = sample.position;
        let n = sample.normal;
        let Some(l) = (light - p).try_normalize(1e-8) else {
            return [0, 0, 0, 255];
        };
        let Some(v) = (-p.coords).try_normalize(1e-8) else {
            return [0, 0, 0, 255];
        };

        let n_dot_l = n.dot(&l);
        let r = n * (2.0 * n_dot_l) - l;
        let diffuse = n_dot_l.max(0.0);
        let specular = r.dot(&v).max(0.0).powf(SHININESS);

        let shade = (AMBIENT + DIFFUSE * diffuse + SPECULAR * specular).clamp(0.0, 1.0);
        let value = (shade * 255.0).round() as u8;
        [value, value, value, 255]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinfu_core::{FrameSize, NormalPoint3f, Vector3f};

    #[test]
    fn test_missing_pixels_are_black() {
        let surface = SurfaceMap::empty(FrameSize::new(4, 3));
        let image = render_surface(&surface, &Point3f::origin());
        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 3);
        assert!(image.pixels().iter().all(|p| *p == [0, 0, 0, 255]));
    }

    #[test]
    fn test_surface_facing_light_is_brightest() {
        let size = FrameSize::new(2, 1);
        let mut surface = SurfaceMap::empty(size);
        let p = Point3f::new(0.0, 0.0, 1.0);
        surface.data[0] = Some(NormalPoint3f::new(p, -Vector3f::z()));
        surface.data[1] = Some(NormalPoint3f::new(p, Vector3f::new(-1.0, 0.0, -1.0).normalize()));

        let image = render_surface(&surface, &Point3f::origin());
        assert_eq!(image.pixel(0, 0), [255, 255, 255, 255]);
        assert!(image.pixel(1, 0)[0] < image.pixel(0, 0)[0]);
        assert!(image.pixel(1, 0)[0] > 0);
    }
}

//! Analytic scenes for ray-traced depth

use kinfu_core::{Point3f, Vector3f};

/// A primitive that a ray can hit
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Points `p` with `normal . p = offset`
    Plane { normal: Vector3f, offset: f32 },
    Sphere { center: Point3f, radius: f32 },
    /// Axis-aligned box
    Cuboid { min: Point3f, max: Point3f },
}

const MIN_T: f32 = 1e-4;

impl Shape {
    /// Smallest positive ray parameter at which `origin + t * direction` hits the shape
    pub fn intersect(&self, origin: &Point3f, direction: &Vector3f) -> Option<f32> {
        match self {
            Shape::Plane { normal, offset } => {
                let denom = normal.dot(direction);
                if denom.abs() < 1e-8 {
                    return None;
                }
                let t = (offset - normal.dot(&origin.coords)) / denom;
                (t > MIN_T).then_some(t)
            }
            Shape::Sphere { center, radius } => {
                let oc = origin - center;
                let a = direction.norm_squared();
                let b = oc.dot(direction);
                let c = oc.norm_squared() - radius * radius;
                let disc = b * b - a * c;
                if disc < 0.0 {
                    return None;
                }
                let sqrt_disc = disc.sqrt();
                let near = (-b - sqrt_disc) / a;
                let far = (-b + sqrt_disc) / a;
                if near > MIN_T {
                    Some(near)
                } else if far > MIN_T {
                    Some(far)
                } else {
                    None
                }
            }
            Shape::Cuboid { min, max } => {
                let mut t_enter = f32::NEG_INFINITY;
                let mut t_exit = f32::INFINITY;
                for axis in 0..3 {
                    let inv = 1.0 / direction[axis];
                    let t0 = (min[axis] - origin[axis]) * inv;
                    let t1 = (max[axis] - origin[axis]) * inv;
                    t_enter = t_enter.max(t0.min(t1));
                    t_exit = t_exit.min(t0.max(t1));
                }
                if t_exit < t_enter {
                    None
                } else if t_enter > MIN_T {
                    Some(t_enter)
                } else if t_exit > MIN_T {
                    Some(t_exit)
                } else {
                    None
                }
            }
        }
    }
}

/// A collection of shapes
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub shapes: Vec<Shape>,
}

impl Scene {
    /// A corner of a room with a ball and a crate on the floor.
    ///
    /// Camera convention: x right, y down, z forward; the camera starts at
    /// the origin looking down +z.
    pub fn room() -> Self {
        Self {
            shapes: vec![
                // back wall z = 2.2
                Shape::Plane {
                    normal: Vector3f::z(),
                    offset: 2.2,
                },
                // floor y = 0.6
                Shape::Plane {
                    normal: Vector3f::y(),
                    offset: 0.6,
                },
                // left wall x = -0.9
                Shape::Plane {
                    normal: Vector3f::x(),
                    offset: -0.9,
                },
                Shape::Sphere {
                    center: Point3f::new(0.15, 0.2, 1.5),
                    radius: 0.3,
                },
                Shape::Cuboid {
                    min: Point3f::new(-0.7, 0.2, 1.2),
                    max: Point3f::new(-0.3, 0.6, 1.7),
                },
            ],
        }
    }

    /// Nearest hit along the ray
    pub fn intersect(&self, origin: &Point3f, direction: &Vector3f) -> Option<f32> {
        self.shapes
            .iter()
            .filter_map(|shape| shape.intersect(origin, direction))
            .min_by(|a, b| a.total_cmp(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plane_hit_from_either_side() {
        let plane = Shape::Plane {
            normal: Vector3f::z(),
            offset: 2.0,
        };
        assert_relative_eq!(plane.intersect(&Point3f::origin(), &Vector3f::z()).unwrap(), 2.0);
        assert!(plane.intersect(&Point3f::origin(), &-Vector3f::z()).is_none());
        assert!(plane.intersect(&Point3f::origin(), &Vector3f::x()).is_none());
    }

    #[test]
    fn test_sphere_front_surface() {
        let sphere = Shape::Sphere {
            center: Point3f::new(0.0, 0.0, 3.0),
            radius: 1.0,
        };
        assert_relative_eq!(sphere.intersect(&Point3f::origin(), &Vector3f::z()).unwrap(), 2.0);
        assert!(sphere.intersect(&Point3f::new(2.0, 0.0, 0.0), &Vector3f::z()).is_none());
    }

    #[test]
    fn test_cuboid_entry_face() {
        let cuboid = Shape::Cuboid {
            min: Point3f::new(-1.0, -1.0, 1.0),
            max: Point3f::new(1.0, 1.0, 2.0),
        };
        assert_relative_eq!(cuboid.intersect(&Point3f::origin(), &Vector3f::z()).unwrap(), 1.0);
        assert!(cuboid.intersect(&Point3f::new(0.0, 3.0, 0.0), &Vector3f::z()).is_none());
    }

    #[test]
    fn test_room_nearest_hit_is_sphere_on_axis() {
        let scene = Scene::room();
        let t = scene.intersect(&Point3f::origin(), &Vector3f::z()).unwrap();
        // sphere front at 1.5 - sqrt(0.3^2 - 0.25^2)
        assert_relative_eq!(t, 1.5 - (0.09f32 - 0.0625).sqrt(), epsilon = 1e-4);
    }
}

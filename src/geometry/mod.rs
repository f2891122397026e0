mod aabb;
mod ray_box_intersection;
mod ray_triangle_intersection;
mod triangle;

use assert2::debug_assert;
use nalgebra::{Point3, Vector3, Vector4};
use simba::simd::{WideBoolF32x8, WideF32x8};

pub use aabb::AABB;
pub use ray_box_intersection::RayIntersectionExt;
pub use ray_triangle_intersection::{Intersection, intersect_indexed, ray_hit_triangle};
pub(crate) use ray_triangle_intersection::vertex_at;
pub use triangle::{BarycentricCoordinates, Triangle, TriangleIdx};

pub type FloatType = f32;
pub type SimdFloatType = WideF32x8;
pub type SimdMaskType = WideBoolF32x8;

/// Number of lanes in the SIMD types.
pub const LANES: usize = 8;

/// Relative tolerance for near-parallel ray/triangle tests.
pub const EPSILON: FloatType = 1e-6;

pub type WorldPoint = Point3<FloatType>;
pub type WorldVector = Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;
pub type WorldPoint8 = Point3<SimdFloatType>;
pub type WorldVector8 = Vector3<SimdFloatType>;
pub type WorldBox8 = AABB<WorldPoint8>;

/// Plane in the form (nx, ny, nz, d), where n.p + d = 0 for points on the plane.
pub type PlaneEquation = Vector4<FloatType>;

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: WorldVector,

    /// Componentwise inverse of the ray direction.
    /// Zeros in direction get turned into infinities with the sign of the zero.
    pub inv_direction: WorldVector,

    /// Distance of the closest hit found so far.
    /// Intersection searches don't look past this distance.
    pub t: FloatType,
}

impl Ray {
    /// Creates a new ray. The direction must already be normalized.
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        debug_assert!(
            (direction.norm_squared() - 1.0).abs() < 1e-3,
            "Ray direction must be normalized, got {direction:?}"
        );
        let inv_direction = direction.map(|x| 1.0 / x);

        Ray {
            origin,
            direction,
            inv_direction,
            t: FloatType::INFINITY,
        }
    }

    pub fn with_max_distance(self, t: FloatType) -> Ray {
        Ray { t, ..self }
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction * distance
    }
}

use crate::geometry::{EPSILON, FloatType, Ray, WorldPoint, WorldVector};

use super::{BarycentricCoordinates, Triangle, TriangleIdx};

/// Result of a ray-triangle intersection test.
/// A miss is represented by `t == FloatType::MAX`.
#[derive(Clone, Debug, PartialEq)]
pub struct Intersection {
    /// Distance along the ray
    pub t: FloatType,
    /// Barycentric coordinates of the hit, relative to the triangle's first vertex
    pub uv: BarycentricCoordinates<FloatType>,
    /// Unit geometric normal, facing the ray origin
    pub normal: WorldVector,
    /// True if the ray hit the side the triangle winding points to
    pub front_face: bool,
    /// Index of the hit triangle, if it came from a triangle soup
    pub triangle: Option<TriangleIdx>,
}

impl Intersection {
    pub fn none() -> Intersection {
        Intersection {
            t: FloatType::MAX,
            uv: BarycentricCoordinates::default(),
            normal: WorldVector::zeros(),
            front_face: false,
            triangle: None,
        }
    }

    pub fn is_intersection(&self) -> bool {
        self.t < FloatType::MAX
    }

    /// Point of the hit, reconstructed from the barycentric coordinates.
    pub fn point_on(&self, triangle: &Triangle<WorldPoint>) -> WorldPoint {
        WorldPoint::from(self.uv.interpolate(
            &triangle[0].coords,
            &triangle[1].coords,
            &triangle[2].coords,
        ))
    }
}

impl Default for Intersection {
    fn default() -> Self {
        Intersection::none()
    }
}

/// Calculates ray intersection with a two sided triangle.
/// Hits behind the ray origin (t < 0) are rejected. Distance limit of the ray is not checked.
/// Adapted from https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm#Rust_implementation
pub fn ray_hit_triangle(ray: &Ray, a: &WorldPoint, b: &WorldPoint, c: &WorldPoint) -> Intersection {
    let e1 = b - a;
    let e2 = c - a;

    let ray_cross_e2 = ray.direction.cross(&e2);
    let det = e1.dot(&ray_cross_e2);

    // |det| <= |e1| |e2| for unit ray direction, so the tolerance scales with the triangle.
    if det.abs() <= EPSILON * e1.norm() * e2.norm() {
        return Intersection::none();
    }

    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = inv_det * s.dot(&ray_cross_e2);
    if !(0.0..=1.0).contains(&u) {
        return Intersection::none();
    }

    let s_cross_e1 = s.cross(&e1);
    let v = inv_det * ray.direction.dot(&s_cross_e1);
    if !(v >= 0.0 && u + v <= 1.0) {
        return Intersection::none();
    }

    let t = inv_det * e2.dot(&s_cross_e1);
    // Negated to also reject NaN
    if !(t >= 0.0) {
        return Intersection::none();
    }

    let geometric_normal = e1.cross(&e2).normalize();
    let front_face = ray.direction.dot(&geometric_normal) < 0.0;

    Intersection {
        t,
        uv: BarycentricCoordinates { u, v },
        normal: if front_face {
            geometric_normal
        } else {
            -geometric_normal
        },
        front_face,
        triangle: None,
    }
}

/// Intersects a triangle given by three vertex indices into a strided vertex buffer.
pub fn intersect_indexed(
    ray: &Ray,
    vertices: &[FloatType],
    stride: usize,
    indices: [usize; 3],
) -> Intersection {
    let [a, b, c] = indices.map(|i| vertex_at(vertices, stride, i));
    ray_hit_triangle(ray, &a, &b, &c)
}

/// Position of i-th vertex of a strided buffer.
pub(crate) fn vertex_at(vertices: &[FloatType], stride: usize, index: usize) -> WorldPoint {
    let offset = index * stride;
    WorldPoint::new(
        vertices[offset],
        vertices[offset + 1],
        vertices[offset + 2],
    )
}

impl Triangle<WorldPoint> {
    pub fn intersect(&self, ray: &Ray) -> Intersection {
        ray_hit_triangle(ray, &self[0], &self[1], &self[2])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::test::{UnitWorldVectorWrapper, WorldPointWrapper};

    use assert2::{assert, check};
    use test_case::test_case;
    use test_strategy::proptest;

    fn quad_triangles() -> [Triangle<WorldPoint>; 2] {
        let a = WorldPoint::new(-0.5, -0.5, -0.5);
        let b = WorldPoint::new(0.5, -0.5, -0.5);
        let c = WorldPoint::new(0.5, 0.5, -0.5);
        let d = WorldPoint::new(-0.5, 0.5, -0.5);
        [Triangle::new(a, b, c), Triangle::new(a, c, d)]
    }

    #[test]
    fn cube_face_hit_faces_origin() {
        let ray = Ray::new(
            WorldPoint::new(0.0, 0.0, -5.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );
        let [t1, _] = quad_triangles();

        let hit = t1.intersect(&ray);

        assert!(hit.is_intersection());
        check!((hit.t - 4.5).abs() < 1e-6);
        check!(hit.normal == WorldVector::new(0.0, 0.0, -1.0));
        check!(!hit.front_face);
    }

    #[test]
    fn front_face_keeps_normal() {
        let ray = Ray::new(
            WorldPoint::new(0.1, -0.1, 5.0),
            WorldVector::new(0.0, 0.0, -1.0),
        );
        let [t1, _] = quad_triangles();

        let hit = t1.intersect(&ray);

        assert!(hit.is_intersection());
        check!(hit.front_face);
        check!(hit.normal == WorldVector::new(0.0, 0.0, 1.0));
    }

    #[test_case(WorldVector::new(1.0, 0.0, 0.0) ; "along_x")]
    #[test_case(WorldVector::new(0.0, 1.0, 0.0) ; "along_y")]
    #[test_case(WorldVector::new(-0.6, 0.8, 0.0) ; "diagonal")]
    fn parallel_ray_misses(direction: WorldVector) {
        let ray = Ray::new(WorldPoint::new(-3.0, -3.0, -0.5), direction);

        for t in quad_triangles() {
            let hit = t.intersect(&ray);
            assert!(!hit.is_intersection());
            assert!(hit.t == f32::MAX);
        }
    }

    #[test]
    fn hit_behind_origin_is_rejected() {
        let ray = Ray::new(WorldPoint::new(0.1, -0.1, 5.0), WorldVector::new(0.0, 0.0, 1.0));

        for t in quad_triangles() {
            assert!(!t.intersect(&ray).is_intersection());
        }
    }

    #[test]
    fn degenerate_triangle_misses() {
        let p = WorldPoint::new(0.0, 0.0, 1.0);
        let t = Triangle::new(p, p, WorldPoint::new(1.0, 0.0, 1.0));
        let ray = Ray::new(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0));

        assert!(!t.intersect(&ray).is_intersection());
    }

    #[test]
    fn call_shapes_agree() {
        #[rustfmt::skip]
        let vertices = [
            -0.5, -0.5, -0.5, 7.0,
             0.5, -0.5, -0.5, 7.0,
             0.5,  0.5, -0.5, 7.0,
            -0.5,  0.5, -0.5, 7.0,
        ];
        let ray = Ray::new(
            WorldPoint::new(-0.2, 0.3, -5.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );

        let [_, t2] = quad_triangles();
        let by_reference = t2.intersect(&ray);
        let by_index = intersect_indexed(&ray, &vertices, 4, [0, 2, 3]);
        let by_points = ray_hit_triangle(&ray, &t2[0], &t2[1], &t2[2]);

        assert!(by_reference.is_intersection());
        assert!(by_reference == by_index);
        assert!(by_reference == by_points);
    }

    /// Shoots a ray from a random origin to a random point inside the triangle,
    /// checks that the hit is found at the expected distance.
    #[proptest]
    fn hit_round_trip(
        a: WorldPointWrapper,
        b: WorldPointWrapper,
        c: WorldPointWrapper,
        origin: WorldPointWrapper,
        #[strategy(0.05f32..0.9f32)] u: f32,
        #[strategy(0.05f32..0.9f32)] v_fraction: f32,
    ) {
        let triangle = Triangle::new(*a, *b, *c);
        // Skip degenerate triangles, their hits are not stable
        let normal = triangle.normal();
        let [e1, e2] = triangle.edges();
        proptest::prop_assume!(normal.norm() > 0.1 * e1.norm() * e2.norm());

        let v = (1.0 - u) * v_fraction;
        let target = WorldPoint::from(BarycentricCoordinates { u, v }.interpolate(
            &a.coords,
            &b.coords,
            &c.coords,
        ));
        let to_target = target - *origin;
        let t0 = to_target.norm();
        proptest::prop_assume!(t0 > 1e-2);
        // Grazing rays lose too much precision
        proptest::prop_assume!(to_target.normalize().dot(&normal.normalize()).abs() > 0.1);

        let ray = Ray::new(*origin, to_target / t0);
        let hit = triangle.intersect(&ray);

        assert!(hit.is_intersection());
        assert!((hit.t - t0).abs() < 1e-3 * t0.max(1.0), "{} vs {}", hit.t, t0);
        assert!(hit.uv.u >= 0.0);
        assert!(hit.uv.v >= 0.0);
        assert!(hit.uv.u + hit.uv.v <= 1.0);
        assert!(hit.normal.dot(&ray.direction) <= 0.0);
        let scale = (t0 + e1.norm() + e2.norm()).max(1.0);
        assert!((hit.point_on(&triangle) - ray.point_at(hit.t)).norm() < 1e-3 * scale);
    }

    #[proptest]
    fn miss_is_sentinel(origin: WorldPointWrapper, direction: UnitWorldVectorWrapper) {
        let [t1, _] = quad_triangles();
        let ray = Ray::new(*origin, *direction);
        let hit = t1.intersect(&ray);

        if !hit.is_intersection() {
            assert!(hit == Intersection::none());
        } else {
            assert!(hit.t >= 0.0);
        }
    }
}

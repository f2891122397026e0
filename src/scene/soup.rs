use std::{fs, path::Path};

use assert2::debug_assert;
use log::{debug, warn};
use ordered_float::OrderedFloat;
use rand::Rng;
use rand_distr::{Distribution as _, UnitBall};
use thiserror::Error;

use crate::geometry::{
    FloatType, Intersection, Ray, Triangle, TriangleIdx, WorldBox, WorldPoint, WorldVector,
    vertex_at,
};

/// Borrowed flat buffer of triangles.
/// Every three consecutive vertices form a triangle; each vertex takes `stride` floats,
/// position being the first three of them.
#[derive(Copy, Clone, Debug)]
pub struct TriangleSoup<'a> {
    vertices: &'a [FloatType],
    stride: usize,
}

impl<'a> TriangleSoup<'a> {
    pub fn new(vertices: &'a [FloatType], stride: usize) -> Self {
        debug_assert!(stride >= 3, "Vertex stride {stride} can't hold a position");
        debug_assert!(
            vertices.len() % (3 * stride) == 0,
            "Buffer of {} floats doesn't hold whole triangles with stride {stride}",
            vertices.len()
        );
        TriangleSoup { vertices, stride }
    }

    pub fn len(&self) -> usize {
        self.vertices.len() / (3 * self.stride)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn vertices(&self) -> &'a [FloatType] {
        self.vertices
    }

    pub fn triangle(&self, index: TriangleIdx) -> Triangle<WorldPoint> {
        let first = index.index() * 3;
        Triangle::new(
            vertex_at(self.vertices, self.stride, first),
            vertex_at(self.vertices, self.stride, first + 1),
            vertex_at(self.vertices, self.stride, first + 2),
        )
    }

    pub fn indices(&self) -> impl Iterator<Item = TriangleIdx> + use<> {
        (0..self.len()).map(TriangleIdx::from_usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = Triangle<WorldPoint>> + use<'a> {
        let soup = *self;
        soup.indices().map(move |i| soup.triangle(i))
    }

    pub fn bounding_box(&self) -> WorldBox {
        WorldBox::from_strided(self.vertices, self.stride)
    }

    /// Intersects the ray with a single triangle of the soup.
    pub fn intersect_triangle(&self, ray: &Ray, index: TriangleIdx) -> Intersection {
        let mut hit = self.triangle(index).intersect(ray);
        if hit.is_intersection() {
            hit.triangle = Some(index);
        }
        hit
    }

    /// Finds the nearest hit within the ray's range by testing every triangle.
    pub fn intersect_brute_force(&self, ray: &Ray) -> Intersection {
        self.indices()
            .map(|i| self.intersect_triangle(ray, i))
            .filter(|hit| hit.is_intersection() && hit.t < ray.t)
            .min_by_key(|hit| OrderedFloat(hit.t))
            .unwrap_or_default()
    }
}

/// Owned triangle buffer.
#[derive(Clone, Debug)]
pub struct TriangleBuffer {
    vertices: Vec<FloatType>,
    stride: usize,
}

impl TriangleBuffer {
    pub fn new(vertices: Vec<FloatType>, stride: usize) -> Self {
        // Layout checks only
        let _ = TriangleSoup::new(&vertices, stride);
        TriangleBuffer { vertices, stride }
    }

    pub fn from_triangles(triangles: impl IntoIterator<Item = Triangle<WorldPoint>>) -> Self {
        let vertices = triangles
            .into_iter()
            .flatten()
            .flat_map(|p| [p.x, p.y, p.z])
            .collect();
        TriangleBuffer {
            vertices,
            stride: 3,
        }
    }

    pub fn soup(&self) -> TriangleSoup<'_> {
        TriangleSoup {
            vertices: &self.vertices,
            stride: self.stride,
        }
    }

    pub fn len(&self) -> usize {
        self.soup().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Generates a scene of `count` random triangles.
    /// First vertex of each triangle is uniformly distributed in a cube spanning
    /// `-extent..extent` in each axis, the other two are within `size` distance from it.
    pub fn random(count: usize, extent: FloatType, size: FloatType, rng: &mut impl Rng) -> Self {
        TriangleBuffer::from_triangles((0..count).map(|_| {
            let a = WorldPoint::from(WorldVector::from_fn(|_, _| {
                rng.random_range(-extent..extent)
            }));
            let mut offset = || {
                let v: [FloatType; 3] = UnitBall.sample(&mut *rng);
                WorldVector::from(v) * size
            };
            let b = a + offset();
            let c = a + offset();
            Triangle::new(a, b, c)
        }))
    }

    /// Loads triangles of all objects in a Wavefront OBJ file.
    /// Non-triangle primitives are skipped.
    pub fn with_obj(p: impl AsRef<Path>) -> Result<TriangleBuffer, ObjOpenError> {
        let content = fs::read_to_string(p.as_ref())?;
        let parsed = wavefront_obj::obj::parse(content)?;
        let buffer = Self::load_obj(parsed);
        debug!(
            "Loaded {} triangles from {}",
            buffer.len(),
            p.as_ref().display()
        );
        Ok(buffer)
    }

    fn load_obj(obj: wavefront_obj::obj::ObjSet) -> TriangleBuffer {
        let mut triangles = Vec::new();
        let mut skipped = 0usize;

        for o in obj.objects.iter() {
            let position = |vtindex: (usize, Option<usize>, Option<usize>)| {
                let vertex = &o.vertices[vtindex.0];
                WorldPoint::new(vertex.x as f32, vertex.y as f32, vertex.z as f32)
            };

            for geometry in &o.geometry {
                for shape in &geometry.shapes {
                    let wavefront_obj::obj::Primitive::Triangle(a, b, c) = &shape.primitive else {
                        skipped += 1;
                        continue;
                    };
                    triangles.push(Triangle::new(position(*a), position(*b), position(*c)));
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {skipped} non-triangle primitives");
        }

        TriangleBuffer::from_triangles(triangles)
    }
}

#[derive(Debug, Error)]
pub enum ObjOpenError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),
}

#[cfg(test)]
mod test {
    use super::*;

    use assert2::{assert, let_assert};
    use rand::{SeedableRng, rngs::SmallRng};

    #[rustfmt::skip]
    const STRIDED: [f32; 30] = [
        0.0, 0.0, 0.0, 9.0, 9.0,
        1.0, 0.0, 0.0, 9.0, 9.0,
        0.0, 1.0, 0.0, 9.0, 9.0,

        0.0, 0.0, 2.0, 9.0, 9.0,
        1.0, 0.0, 2.0, 9.0, 9.0,
        0.0, 1.0, 2.0, 9.0, 9.0,
    ];

    #[test]
    fn strided_access() {
        let soup = TriangleSoup::new(&STRIDED, 5);

        assert!(soup.len() == 2);
        assert!(soup.triangle(TriangleIdx::from_usize(1))[2] == WorldPoint::new(0.0, 1.0, 2.0));
        assert!(soup.iter().count() == 2);

        let b = soup.bounding_box();
        assert!(b.min == WorldPoint::new(0.0, 0.0, 0.0));
        assert!(b.max == WorldPoint::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn brute_force_finds_nearest() {
        let soup = TriangleSoup::new(&STRIDED, 5);
        let ray = Ray::new(
            WorldPoint::new(0.2, 0.2, 5.0),
            WorldVector::new(0.0, 0.0, -1.0),
        );

        let hit = soup.intersect_brute_force(&ray);

        assert!(hit.is_intersection());
        assert!(hit.t == 3.0);
        assert!(hit.triangle == Some(TriangleIdx::from_usize(1)));
    }

    #[test]
    fn brute_force_respects_ray_range() {
        let soup = TriangleSoup::new(&STRIDED, 5);
        let ray = Ray::new(
            WorldPoint::new(0.2, 0.2, 5.0),
            WorldVector::new(0.0, 0.0, -1.0),
        )
        .with_max_distance(2.0);

        assert!(!soup.intersect_brute_force(&ray).is_intersection());
    }

    #[test]
    fn from_triangles_round_trip() {
        let soup = TriangleSoup::new(&STRIDED, 5);
        let buffer = TriangleBuffer::from_triangles(soup.iter());

        assert!(buffer.soup().stride() == 3);
        assert!(buffer.soup().iter().eq(soup.iter()));
    }

    #[test]
    fn random_scene_is_deterministic_and_bounded() {
        let a = TriangleBuffer::random(100, 5.0, 1.0, &mut SmallRng::seed_from_u64(7));
        let b = TriangleBuffer::random(100, 5.0, 1.0, &mut SmallRng::seed_from_u64(7));

        assert!(a.len() == 100);
        assert!(a.soup().vertices() == b.soup().vertices());

        let bounds = a.soup().bounding_box();
        assert!(bounds.min.iter().all(|x| *x >= -6.0));
        assert!(bounds.max.iter().all(|x| *x <= 6.0));
    }

    #[test]
    fn obj_loading() {
        let path = std::env::temp_dir().join(format!("minibvh-obj-{}.obj", std::process::id()));
        fs::write(
            &path,
            "o quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3\nf 1 3 4\nl 1 2\n",
        )
        .unwrap();

        let loaded = TriangleBuffer::with_obj(&path);
        fs::remove_file(&path).unwrap();

        let_assert!(Ok(buffer) = loaded);
        assert!(buffer.len() == 2);

        // The parser may start a face at any of its vertices, winding is kept
        let expected = [
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(1.0, 1.0, 0.0),
            WorldPoint::new(0.0, 1.0, 0.0),
        ];
        let triangle = buffer.soup().triangle(TriangleIdx::from_usize(1));
        assert!((0..3).any(|r| (0..3).all(|k| triangle[(k + r) % 3] == expected[k])));
        for triangle in buffer.soup().iter() {
            assert!(triangle.normal().z > 0.0);
        }
    }

    #[test]
    fn obj_missing_file() {
        let_assert!(
            Err(ObjOpenError::ReadError(_)) =
                TriangleBuffer::with_obj("/nonexistent/minibvh/missing.obj")
        );
    }
}

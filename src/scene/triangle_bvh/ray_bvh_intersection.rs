use crate::{
    geometry::{Intersection, Ray, RayIntersectionExt as _},
    scene::TriangleSoup,
};

use super::{Bvh, NodeIdx, NodeLink};

impl Bvh {
    /// Finds the nearest triangle hit by the ray.
    ///
    /// `ray.t` is the initial distance limit and gets tightened to the distance of the
    /// hit, if there is one. Returns `Intersection::none()` on a miss.
    /// `soup` must be the same soup the tree was built from.
    pub fn intersect(&self, soup: &TriangleSoup, ray: &mut Ray) -> Intersection {
        let mut best = Intersection::none();
        if !self.is_empty() {
            self.intersect_node(soup, NodeIdx::from_usize(0), ray, &mut best);
        }
        best
    }

    /// Like `intersect`, but leaves the ray untouched.
    pub fn closest_hit(&self, soup: &TriangleSoup, ray: &Ray) -> Option<Intersection> {
        let mut ray = *ray;
        let hit = self.intersect(soup, &mut ray);
        hit.is_intersection().then_some(hit)
    }

    fn intersect_node(
        &self,
        soup: &TriangleSoup,
        index: NodeIdx,
        ray: &mut Ray,
        best: &mut Intersection,
    ) {
        let node = &self.nodes[index];

        let (t_near, t_far) = node.bounds().intersect(ray);
        if t_near > t_far || t_near > ray.t || t_far < 0.0 {
            return;
        }

        match node.link() {
            NodeLink::Leaf { triangles } => {
                for &triangle in &self.triangle_indices[triangles] {
                    let hit = soup.intersect_triangle(ray, triangle);
                    if hit.is_intersection() && hit.t < ray.t {
                        ray.t = hit.t;
                        *best = hit;
                    }
                }
            }
            NodeLink::Inner { left } => {
                self.intersect_node(soup, left, ray, best);
                self.intersect_node(soup, left + 1, ray, best);
            }
        }
    }
}

use index_vec::IndexVec;
use log::debug;

use crate::{
    geometry::{TriangleIdx, WorldBox, WorldPoint},
    scene::TriangleSoup,
};

use super::{Bvh, BvhNode, LEAF_MAX_TRIANGLES, NodeIdx};

impl Bvh {
    /// Builds the hierarchy by recursive midpoint splits along the longest axis
    /// of each node's box.
    pub fn build(soup: &TriangleSoup) -> Bvh {
        let triangle_count = soup.len();
        if triangle_count == 0 {
            debug!("Empty triangle soup, building empty BVH");
            return Bvh::empty();
        }

        let centroids: IndexVec<TriangleIdx, WorldPoint> =
            soup.iter().map(|t| t.centroid()).collect();

        let mut bvh = Bvh {
            nodes: IndexVec::with_capacity(2 * triangle_count - 1),
            triangle_indices: soup.indices().collect(),
        };

        let root = bvh.nodes.push(BvhNode {
            left_first: 0,
            tri_count: triangle_count as u32,
            ..BvhNode::default()
        });
        bvh.update_node_bounds(soup, root);
        bvh.subdivide(soup, &centroids, root);

        debug!(
            "Built BVH over {} triangles: {} nodes, {} leaves",
            triangle_count,
            bvh.nodes.len(),
            bvh.leaves().count()
        );

        bvh
    }

    fn update_node_bounds(&mut self, soup: &TriangleSoup, index: NodeIdx) {
        let node = self.nodes[index];
        let bounds = WorldBox::from_points(
            self.leaf_triangles(&node)
                .iter()
                .flat_map(|&i| soup.triangle(i)),
        )
        .unwrap_or_else(WorldBox::empty);
        self.nodes[index].set_bounds(&bounds);
    }

    fn subdivide(
        &mut self,
        soup: &TriangleSoup,
        centroids: &IndexVec<TriangleIdx, WorldPoint>,
        index: NodeIdx,
    ) {
        let node = self.nodes[index];
        if node.tri_count <= LEAF_MAX_TRIANGLES {
            return;
        }

        let bounds = node.bounds();
        let axis = bounds.longest_axis();
        let split_pos = bounds.min[axis] + bounds.size()[axis] / 2.0;

        let range = node.triangle_range();
        let left_count = partition(&mut self.triangle_indices[range.clone()], |&i| {
            centroids[i][axis] < split_pos
        });

        if left_count == 0 || left_count == range.len() {
            // All centroids on one side, keep this as an oversized leaf
            return;
        }

        // Children are always allocated next to each other, right = left + 1
        let left = self.nodes.push(BvhNode {
            left_first: range.start as u32,
            tri_count: left_count as u32,
            ..BvhNode::default()
        });
        let right = self.nodes.push(BvhNode {
            left_first: (range.start + left_count) as u32,
            tri_count: (range.len() - left_count) as u32,
            ..BvhNode::default()
        });

        let parent = &mut self.nodes[index];
        parent.left_first = left.raw();
        parent.tri_count = 0;

        self.update_node_bounds(soup, left);
        self.update_node_bounds(soup, right);

        self.subdivide(soup, centroids, left);
        self.subdivide(soup, centroids, right);
    }
}

/// Reorders the slice so that all items satisfying the predicate come first.
/// Returns the number of such items. Not stable.
fn partition<T>(items: &mut [T], mut pred: impl FnMut(&T) -> bool) -> usize {
    let mut i = 0;
    let mut j = items.len();
    while i < j {
        if pred(&items[i]) {
            i += 1;
        } else {
            j -= 1;
            items.swap(i, j);
        }
    }
    i
}

use crate::util::Stats;

use super::{Bvh, NodeIdx, NodeLink};

impl Bvh {
    pub fn print_tree(&self) {
        if !self.is_empty() {
            self.print_recursive(0, NodeIdx::from_usize(0));
        }
    }

    pub fn print_statistics(&self) {
        println!(
            "Nodes: {}; triangles: {}",
            self.node_count(),
            self.triangle_count()
        );
        println!("Leaf depth: {}", self.depth_statistics());
        println!("Leaf triangle count: {}", self.leaf_statistics());
    }

    /// Depth of leaves, root being at depth 1.
    pub fn depth_statistics(&self) -> Stats {
        if self.is_empty() {
            Stats::default()
        } else {
            self.depth_statistics_recursive(NodeIdx::from_usize(0))
        }
    }

    /// Number of triangles in leaves.
    pub fn leaf_statistics(&self) -> Stats {
        let mut stats = Stats::default();
        stats.add_samples(self.leaves().map(|leaf| leaf.tri_count as usize));
        stats
    }

    fn depth_statistics_recursive(&self, index: NodeIdx) -> Stats {
        match self.nodes[index].link() {
            NodeLink::Leaf { .. } => Stats::new_single(1),
            NodeLink::Inner { left } => self
                .depth_statistics_recursive(left)
                .merge(&self.depth_statistics_recursive(left + 1))
                .offset(1),
        }
    }

    fn print_recursive(&self, indent: usize, index: NodeIdx) {
        let node = &self.nodes[index];
        let link = node.link();
        println!(
            "{}- {}{}: {:?}-{:?}",
            "  ".repeat(indent),
            if node.is_leaf() { "L" } else { "I" },
            index.index(),
            node.aabb_min,
            node.aabb_max,
        );

        match link {
            NodeLink::Leaf { triangles } => {
                let indent = "  ".repeat(indent + 1);
                for &i in &self.triangle_indices[triangles] {
                    println!("{}#{}", indent, i.index());
                }
            }
            NodeLink::Inner { left } => {
                self.print_recursive(indent + 1, left);
                self.print_recursive(indent + 1, left + 1);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{Triangle, WorldPoint},
        scene::TriangleBuffer,
    };

    use assert2::assert;

    fn row_of_triangles(count: usize) -> TriangleBuffer {
        TriangleBuffer::from_triangles((0..count).map(|i| {
            let x = 3.0 * i as f32;
            Triangle::new(
                WorldPoint::new(x, 0.0, 0.0),
                WorldPoint::new(x + 1.0, 0.0, 0.0),
                WorldPoint::new(x, 1.0, 0.0),
            )
        }))
    }

    #[test]
    fn statistics_of_balanced_tree() {
        let buffer = row_of_triangles(4);
        let bvh = Bvh::build(&buffer.soup());

        let depth = bvh.depth_statistics();
        assert!(depth.count == 2);
        assert!(depth.min == 2);
        assert!(depth.max == 2);

        let leaves = bvh.leaf_statistics();
        assert!(leaves.count == 2);
        assert!(leaves.min == 2);
        assert!(leaves.max == 2);
    }

    #[test]
    fn statistics_of_empty_tree() {
        let bvh = Bvh::empty();
        assert!(bvh.depth_statistics().count == 0);
        assert!(bvh.leaf_statistics().count == 0);
    }

    #[test]
    fn leaf_counts_add_up() {
        let buffer = row_of_triangles(37);
        let bvh = Bvh::build(&buffer.soup());

        let leaves = bvh.leaf_statistics();
        assert!((leaves.avg * leaves.count as f32).round() as usize == 37);
        assert!(leaves.max as u32 <= crate::scene::LEAF_MAX_TRIANGLES);
        assert!(bvh.depth_statistics().count == leaves.count);

        bvh.print_tree();
        bvh.print_statistics();
    }
}

mod building;
mod persistence;
mod printing;
mod ray_bvh_intersection;

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use index_vec::IndexVec;

use crate::geometry::{TriangleIdx, WorldBox};

pub use persistence::BvhReadError;

/// Nodes with at most this many triangles are never split.
pub const LEAF_MAX_TRIANGLES: u32 = 2;

/// Binary BVH over a triangle soup.
/// The soup itself is not owned, queries take it as a parameter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bvh {
    nodes: IndexVec<NodeIdx, BvhNode>,
    /// Permutation of triangle indices, leaves reference contiguous ranges of it.
    triangle_indices: Vec<TriangleIdx>,
}

/// Node of the BVH, 32 bytes.
///
/// For leaves (`tri_count > 0`) `left_first` is the first index into the triangle
/// permutation; for interior nodes it is the index of the left child,
/// the right child is always at `left_first + 1`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: [f32; 3],
    pub aabb_max: [f32; 3],
    pub left_first: u32,
    pub tri_count: u32,
}

/// Decoded view of where a node points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeLink {
    Inner { left: NodeIdx },
    Leaf { triangles: Range<usize> },
}

index_vec::define_index_type! {
    pub struct NodeIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

impl BvhNode {
    pub fn bounds(&self) -> WorldBox {
        WorldBox::new(self.aabb_min.into(), self.aabb_max.into())
    }

    pub fn set_bounds(&mut self, bounds: &WorldBox) {
        self.aabb_min = bounds.min.into();
        self.aabb_max = bounds.max.into();
    }

    pub fn is_leaf(&self) -> bool {
        self.tri_count > 0
    }

    /// Range in the triangle permutation covered by this leaf. Empty for interior nodes.
    pub fn triangle_range(&self) -> Range<usize> {
        let first = self.left_first as usize;
        first..first + self.tri_count as usize
    }

    pub fn link(&self) -> NodeLink {
        if self.is_leaf() {
            NodeLink::Leaf {
                triangles: self.triangle_range(),
            }
        } else {
            NodeLink::Inner {
                left: NodeIdx::from_raw(self.left_first),
            }
        }
    }

    /// Same node with every field converted to little endian.
    fn to_le(self) -> BvhNode {
        BvhNode {
            aabb_min: self.aabb_min.map(|x| f32::from_bits(x.to_bits().to_le())),
            aabb_max: self.aabb_max.map(|x| f32::from_bits(x.to_bits().to_le())),
            left_first: self.left_first.to_le(),
            tri_count: self.tri_count.to_le(),
        }
    }

    /// Inverse of `to_le`.
    fn from_le(node: BvhNode) -> BvhNode {
        BvhNode {
            aabb_min: node.aabb_min.map(|x| f32::from_bits(u32::from_le(x.to_bits()))),
            aabb_max: node.aabb_max.map(|x| f32::from_bits(u32::from_le(x.to_bits()))),
            left_first: u32::from_le(node.left_first),
            tri_count: u32::from_le(node.tri_count),
        }
    }
}

impl Bvh {
    /// BVH with no nodes, every query misses.
    pub fn empty() -> Bvh {
        Bvh::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &IndexVec<NodeIdx, BvhNode> {
        &self.nodes
    }

    pub fn triangle_indices(&self) -> &[TriangleIdx] {
        &self.triangle_indices
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&BvhNode> {
        self.nodes.first()
    }

    /// Bounds of the whole tree, `WorldBox::empty()` if there are no nodes.
    pub fn bounding_box(&self) -> WorldBox {
        self.root().map_or_else(WorldBox::empty, BvhNode::bounds)
    }

    /// Iterates over the leaves in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = &BvhNode> {
        self.nodes.iter().filter(|n| n.is_leaf())
    }

    /// Triangles referenced by a leaf node.
    pub fn leaf_triangles(&self, node: &BvhNode) -> &[TriangleIdx] {
        &self.triangle_indices[node.triangle_range()]
    }
}

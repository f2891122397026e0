pub mod soup;
pub mod triangle_bvh;

pub use soup::{ObjOpenError, TriangleBuffer, TriangleSoup};
pub use triangle_bvh::{Bvh, BvhNode, BvhReadError, LEAF_MAX_TRIANGLES, NodeIdx, NodeLink};

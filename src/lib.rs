pub mod culling;
pub mod geometry;
pub mod scene;
mod util;

pub use culling::{
    CullSettings, Frustum, FrustumSimd, InstanceBoxes, WorkerCount, cull, cull_parallel,
    visible_indices,
};
pub use scene::{Bvh, TriangleBuffer, TriangleSoup};
pub use util::Stats;

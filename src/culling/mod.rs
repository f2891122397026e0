mod frustum;
mod frustum_simd;
mod instances;
mod parallel;

pub use frustum::{Frustum, FrustumPlane, Plane};
pub use frustum_simd::FrustumSimd;
pub use instances::InstanceBoxes;
pub use parallel::{CullSettings, WorkerCount, cull_parallel};

use crate::{
    geometry::{LANES, WorldBox8},
    util::bit_iter,
};

/// Tests all instances against the frustum.
/// Returns one mask per group of 8 instances, bit `i` of mask `g` is set
/// if instance `8 * g + i` is at least partially inside the frustum.
/// Padding lanes are always cleared.
pub fn cull(frustum: &FrustumSimd, instances: &InstanceBoxes) -> Vec<u8> {
    cull_groups(frustum, instances.batches(), instances.valid_masks())
}

fn cull_groups(frustum: &FrustumSimd, batches: &[WorldBox8], valid: &[u8]) -> Vec<u8> {
    batches
        .iter()
        .zip(valid)
        .map(|(batch, &valid)| frustum.test(batch) & valid)
        .collect()
}

/// Indices of instances with their bit set.
pub fn visible_indices(masks: &[u8]) -> Vec<u32> {
    masks
        .iter()
        .enumerate()
        .flat_map(|(group, &mask)| bit_iter(mask as u64).map(move |lane| (group * LANES + lane) as u32))
        .collect()
}

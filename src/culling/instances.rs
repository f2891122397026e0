use ordered_float::OrderedFloat;
use simba::simd::{SimdPartialOrd as _, SimdValue as _};

use crate::{
    geometry::{FloatType, LANES, Ray, RayIntersectionExt as _, SimdFloatType, WorldBox, WorldBox8, WorldVector},
    util::{
        bit_iter,
        simba::{lane_bits, simd_windows},
    },
};

/// Bounding boxes of object instances, packed 8 per group.
/// If the instance count is not divisible by 8, the last group is padded with empty boxes
/// and the padding lanes are excluded through the validity mask.
#[derive(Clone, Debug, Default)]
pub struct InstanceBoxes {
    batches: Vec<WorldBox8>,
    /// Bit `i` of mask `g` is set if lane `i` of group `g` holds a real instance
    valid: Vec<u8>,
    len: usize,
}

impl InstanceBoxes {
    /// Instances of a single object, each moved by a displacement.
    pub fn new(object_box: &WorldBox, displacements: &[WorldVector]) -> Self {
        Self::from_boxes(displacements.iter().map(|d| object_box.translated(d)))
    }

    pub fn from_boxes(boxes: impl IntoIterator<Item = WorldBox>) -> Self {
        let mut len = 0;
        let (batches, valid) = simd_windows::<WorldBox8>(
            boxes.into_iter().inspect(|_| len += 1),
            WorldBox::empty(),
        )
        .map(|(batch, mask)| (batch, lane_bits(mask)))
        .unzip();

        InstanceBoxes {
            batches,
            valid,
            len,
        }
    }

    /// Number of instances, not counting padding.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of 8-wide groups.
    pub fn group_count(&self) -> usize {
        self.batches.len()
    }

    pub fn batches(&self) -> &[WorldBox8] {
        &self.batches
    }

    pub fn valid_masks(&self) -> &[u8] {
        &self.valid
    }

    pub fn get(&self, index: usize) -> Option<WorldBox> {
        if index >= self.len {
            return None;
        }
        Some(self.batches[index / LANES].extract(index % LANES))
    }

    /// Finds the instance whose box the ray enters first, within the ray's range.
    /// Returns the instance index and the entry distance (0 if the ray starts inside).
    pub fn pick(&self, ray: &Ray) -> Option<(usize, FloatType)> {
        let zero = SimdFloatType::splat(0.0);
        let max_t = SimdFloatType::splat(ray.t);

        self.batches
            .iter()
            .zip(&self.valid)
            .enumerate()
            .flat_map(|(group, (batch, &valid))| {
                let (t_near, t_far) = batch.intersect(ray);
                let hits = lane_bits(t_near.simd_le(t_far))
                    & lane_bits(t_far.simd_ge(zero))
                    & lane_bits(t_near.simd_le(max_t))
                    & valid;
                bit_iter(hits as u64)
                    .map(move |lane| (group * LANES + lane, t_near.extract(lane).max(0.0)))
            })
            .min_by_key(|(_, t)| OrderedFloat(*t))
    }
}

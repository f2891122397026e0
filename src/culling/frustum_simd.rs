use simba::simd::{SimdPartialOrd as _, SimdValue as _};

use crate::{
    geometry::{SimdFloatType, WorldBox8},
    util::simba::lane_bits,
};

use super::{Frustum, Plane};

/// One frustum plane broadcast to all lanes.
#[derive(Copy, Clone, Debug)]
struct PlaneSimd {
    nx: SimdFloatType,
    ny: SimdFloatType,
    nz: SimdFloatType,
    d: SimdFloatType,

    abs_nx: SimdFloatType,
    abs_ny: SimdFloatType,
    abs_nz: SimdFloatType,
}

impl From<&Plane> for PlaneSimd {
    fn from(plane: &Plane) -> Self {
        let [a, b, c, d]: [f32; 4] = plane.equation().into();
        PlaneSimd {
            nx: SimdFloatType::splat(a),
            ny: SimdFloatType::splat(b),
            nz: SimdFloatType::splat(c),
            d: SimdFloatType::splat(d),
            abs_nx: SimdFloatType::splat(a.abs()),
            abs_ny: SimdFloatType::splat(b.abs()),
            abs_nz: SimdFloatType::splat(c.abs()),
        }
    }
}

/// Frustum prepared for testing 8 boxes at a time.
/// Build once per frame and reuse for all batches.
#[derive(Copy, Clone, Debug)]
pub struct FrustumSimd {
    planes: [PlaneSimd; 6],
}

impl From<&Frustum> for FrustumSimd {
    fn from(frustum: &Frustum) -> Self {
        FrustumSimd {
            planes: frustum.planes().each_ref().map(PlaneSimd::from),
        }
    }
}

impl FrustumSimd {
    pub fn new(frustum: &Frustum) -> Self {
        Self::from(frustum)
    }

    /// Tests a batch of 8 boxes against all planes.
    /// Bit `i` of the result is set if box in lane `i` is not completely outside any plane.
    /// Empty boxes and NaNs are never reported as outside, mask them separately.
    pub fn test(&self, boxes: &WorldBox8) -> u8 {
        let half = SimdFloatType::splat(0.5);
        let zero = SimdFloatType::splat(0.0);

        let cx = (boxes.min.x + boxes.max.x) * half;
        let cy = (boxes.min.y + boxes.max.y) * half;
        let cz = (boxes.min.z + boxes.max.z) * half;
        let ex = (boxes.max.x - boxes.min.x) * half;
        let ey = (boxes.max.y - boxes.min.y) * half;
        let ez = (boxes.max.z - boxes.min.z) * half;

        let mut outside = 0u8;
        for plane in &self.planes {
            let s = plane.nx * cx + plane.ny * cy + plane.nz * cz + plane.d;
            let r = plane.abs_nx * ex + plane.abs_ny * ey + plane.abs_nz * ez;
            outside |= lane_bits((s - r).simd_gt(zero));

            if outside == 0xff {
                break;
            }
        }

        !outside
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{WorldBox, WorldPoint, WorldVector};

    use assert2::{assert, check};
    use proptest::prelude::*;
    use simba::simd::SimdValue;
    use test_strategy::proptest;

    fn frustum_at(eye: WorldPoint, tan_half_fov: f32) -> Frustum {
        Frustum::builder()
            .eye(eye)
            .forward(WorldVector::new(0.0, 0.0, 1.0))
            .up(WorldVector::new(0.0, 1.0, 0.0))
            .vertical_fov(2.0 * tan_half_fov.atan())
            .aspect_ratio(1.0)
            .near(1.0)
            .far(100.0)
            .build()
    }

    fn unit_cube_row() -> WorldBox8 {
        let cube = WorldBox::new(
            WorldPoint::new(-0.5, -0.5, -0.5),
            WorldPoint::new(0.5, 0.5, 0.5),
        );
        let mut boxes = WorldBox8::splat(cube.clone());
        for i in 0..8 {
            boxes.replace(i, cube.translated(&WorldVector::new(i as f32, 0.0, 0.0)));
        }
        boxes
    }

    #[test]
    fn narrow_frustum_sees_middle_of_row() {
        let frustum = frustum_at(WorldPoint::new(3.5, 0.0, -10.0), 0.15);
        let mask = FrustumSimd::new(&frustum).test(&unit_cube_row());

        assert!(mask == 0b0011_1100);
    }

    #[test]
    fn touching_box_is_visible() {
        let frustum = frustum_at(WorldPoint::origin(), 1.0);
        let mut boxes = WorldBox8::splat(WorldBox::new(
            WorldPoint::new(-0.5, -0.5, 0.0),
            WorldPoint::new(0.5, 0.5, 0.999),
        ));
        boxes.replace(
            3,
            WorldBox::new(WorldPoint::new(-0.5, -0.5, 0.0), WorldPoint::new(0.5, 0.5, 1.0)),
        );

        assert!(FrustumSimd::new(&frustum).test(&boxes) == 0b0000_1000);
    }

    #[test]
    fn empty_box_is_not_outside() {
        let frustum = frustum_at(WorldPoint::origin(), 1.0);
        let boxes = WorldBox8::splat(WorldBox::empty());

        // Padding has to be masked out by the caller
        check!(FrustumSimd::new(&frustum).test(&boxes) == 0xff);
    }

    fn box_strategy() -> impl Strategy<Value = WorldBox> {
        (
            proptest::array::uniform3(-30.0f32..30.0),
            proptest::array::uniform3(0.0f32..10.0),
        )
            .prop_map(|(min, size)| {
                let min = WorldPoint::from(min);
                WorldBox::new(min, min + WorldVector::from(size))
            })
    }

    #[proptest]
    fn agrees_with_scalar_box_test(
        #[strategy(proptest::array::uniform8(box_strategy()))] boxes: [WorldBox; 8],
        #[strategy(0.05f32..2.0)] tan_half_fov: f32,
    ) {
        let frustum = frustum_at(WorldPoint::new(0.0, 0.0, -20.0), tan_half_fov);
        let mut packed = WorldBox8::splat(WorldBox::empty());
        for (i, b) in boxes.iter().enumerate() {
            packed.replace(i, b.clone());
        }

        let mask = FrustumSimd::new(&frustum).test(&packed);

        for (i, b) in boxes.iter().enumerate() {
            assert!((mask >> i) & 1 == frustum.intersects_box(b) as u8);
        }
    }

    #[proptest]
    fn agrees_with_corner_tests(
        #[strategy(proptest::array::uniform8(box_strategy()))] boxes: [WorldBox; 8],
        #[strategy(0.05f32..2.0)] tan_half_fov: f32,
    ) {
        let frustum = frustum_at(WorldPoint::new(0.0, 0.0, -20.0), tan_half_fov);
        let mut packed = WorldBox8::splat(WorldBox::empty());
        for (i, b) in boxes.iter().enumerate() {
            packed.replace(i, b.clone());
        }

        let mask = FrustumSimd::new(&frustum).test(&packed);

        for (i, b) in boxes.iter().enumerate() {
            let visible = (mask >> i) & 1 == 1;
            let corners = b.corners();

            // Any corner clearly inside implies the box is visible
            if corners
                .iter()
                .any(|c| frustum.planes().iter().all(|plane| plane.signed_distance(c) < -1e-3))
            {
                assert!(visible);
            }

            // Culled box has all corners outside one common plane (with a margin for rounding)
            if !visible {
                assert!(frustum.planes().iter().any(|plane| {
                    corners.iter().all(|c| plane.signed_distance(c) > -1e-3)
                }));
            }
        }
    }
}

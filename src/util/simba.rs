use simba::simd::{SimdValue, WideBoolF32x8, WideF32x8};
use wide::f32x8;

pub trait SimbaWorkarounds: SimdValue {
    fn is_nan(self) -> Self::SimdBool;

    fn infinity() -> Self;
    fn neg_infinity() -> Self;
}

impl SimbaWorkarounds for WideF32x8 {
    #[inline(always)]
    fn is_nan(self) -> Self::SimdBool {
        WideBoolF32x8(self.0.is_nan())
    }

    #[inline(always)]
    fn infinity() -> Self {
        Self::splat(f32::INFINITY)
    }

    #[inline(always)]
    fn neg_infinity() -> Self {
        Self::splat(f32::NEG_INFINITY)
    }
}

/// Lanewise minimum, doesn't care about NaNs
#[inline(always)]
pub fn fast_min(a: WideF32x8, b: WideF32x8) -> WideF32x8 {
    WideF32x8(f32x8::fast_min(a.0, b.0))
}

/// Lanewise maximum, doesn't care about NaNs
#[inline(always)]
pub fn fast_max(a: WideF32x8, b: WideF32x8) -> WideF32x8 {
    WideF32x8(f32x8::fast_max(a.0, b.0))
}

/// Converts a flat iterator of elements into an iterator of SIMD values and mask.
/// If input iterator length is not divisible by T::LANES, remainder of the last
/// vector will be filled with `padding` and mask will be false.
pub fn simd_windows<T: SimdValue>(
    values: impl IntoIterator<Item = T::Element>,
    padding: T::Element,
) -> impl Iterator<Item = (T, T::SimdBool)>
where
    T::Element: Clone,
    T::SimdBool: SimdValue,
    <T::SimdBool as SimdValue>::Element: From<bool>,
{
    let mut iter = values.into_iter();
    std::iter::from_fn(move || {
        let mut t = T::splat(padding.clone());
        let mut mask = <T::SimdBool as SimdValue>::splat(false.into());
        let mut filled = 0;

        for (j, v) in (0..T::LANES).zip(&mut iter) {
            t.replace(j, v);
            mask.replace(j, true.into());
            filled += 1;
        }

        if filled > 0 { Some((t, mask)) } else { None }
    })
}

/// Packs lane mask into the lowest bits of an integer, lane 0 being the least significant.
#[inline(always)]
pub fn lane_bits(mask: WideBoolF32x8) -> u8 {
    f32x8::move_mask(mask.0) as u8
}

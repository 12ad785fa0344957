//! Numeric conversion helpers.
//!
//! Intensity math mixes integer samples with floating-point scaling; these
//! keep the lossy casts in one place.

/// Convert u64 to f64 with allowed precision loss.
#[allow(clippy::cast_precision_loss)]
#[inline]
pub(crate) fn u64_to_f64(value: u64) -> f64 {
    value as f64
}

/// Convert usize to f64 with allowed precision loss.
#[allow(clippy::cast_precision_loss)]
#[inline]
pub(crate) fn usize_to_f64(value: usize) -> f64 {
    value as f64
}

/// Convert f64 to u8, rounding and clamping to [0, 255].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[inline]
pub(crate) fn f64_to_u8(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 255.0).round() as u8
}

/// Convert f64 to u32, truncating toward zero and clamping to [0, `u32::MAX`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[inline]
pub(crate) fn f64_to_u32_floor(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    value.min(f64::from(u32::MAX)) as u32
}

/// Convert f64 to u64, truncating toward zero and clamping at zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[inline]
pub(crate) fn f64_to_u64_floor(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    value as u64
}

/// Convert u32 to usize for table indexing.
#[inline]
pub(crate) fn u32_to_usize(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

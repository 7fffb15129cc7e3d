//! Q16.16 fixed-point helpers
//!
//! Texel stepping runs entirely in 32-bit fixed point: the upper 16 bits are the
//! integer texel row, the lower 16 bits the fraction.

/// 32-bit fixed-point value with 16 fractional bits
pub type Fixed = i32;

pub const FRACBITS: u32 = 16;
pub const FRACUNIT: Fixed = 1 << FRACBITS;

/// Integer to fixed point
#[inline]
pub const fn to_fixed(v: i32) -> Fixed {
    v << FRACBITS
}

/// Truncate to the integer part (arithmetic shift, rounds toward -inf)
#[inline]
pub const fn fixed_to_int(v: Fixed) -> i32 {
    v >> FRACBITS
}

/// Float to fixed point, saturating at the i32 range
#[inline]
pub fn fixed_from_f32(v: f32) -> Fixed {
    (v * FRACUNIT as f32) as Fixed
}

/// Fixed-point multiply through a 64-bit intermediate
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    ((i64::from(a) * i64::from(b)) >> FRACBITS) as Fixed
}

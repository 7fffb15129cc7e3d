//! Fixed-point texel stepping
//!
//! A column samples `source[frac >> 16]` once per scanline, starting from the
//! texel that lines up with `y1` relative to the view center and advancing by
//! `step`. Power-of-two heights wrap with a mask. Other heights keep `frac` inside
//! `[0, texheight << 16)` with one conditional subtraction per scanline, which only
//! holds while `step` stays below a full texture height. Larger steps produce the
//! well known smeared wrap on odd-height textures, and that is kept as is.

use crate::column::{ColumnDescriptor, RemapTable};
use crate::fixed::{Fixed, FRACBITS};

/// Fixed-point texel position for the column's first scanline
#[inline]
pub fn start_frac(column: &ColumnDescriptor, center_y: f32) -> Fixed {
    let rows = f64::from(column.y1) - f64::from(center_y) + 1.0;
    column
        .texmid
        .wrapping_add((rows * f64::from(column.step)) as Fixed)
}

/// Bring `frac` into `[0, heightmask)` by whole-texture steps.
///
/// Repeated addition/subtraction rather than a remainder: `frac` can start
/// negative and the loop mirrors the stepping the inner loop does.
#[inline]
pub fn normalize_frac(mut frac: Fixed, heightmask: Fixed) -> Fixed {
    debug_assert!(heightmask > 0);
    if frac < 0 {
        loop {
            frac += heightmask;
            if frac >= 0 {
                break;
            }
        }
    } else {
        while frac >= heightmask {
            frac -= heightmask;
        }
    }
    frac
}

/// True when the texture wraps with a plain bitmask
#[inline]
pub fn is_pow2_height(texheight: i32) -> bool {
    texheight > 0 && texheight & (texheight - 1) == 0
}

/// Sample one column into `out`, one byte per scanline from `y1`.
///
/// Bytes come out colormapped (and translated first when `translated` is set and
/// the column carries a translation table). Blending with the destination is not
/// done here.
pub fn sample_column(column: &ColumnDescriptor, center_y: f32, translated: bool, out: &mut [u8]) {
    if column.count() <= 0 || column.texheight <= 0 {
        return;
    }
    debug_assert_eq!(out.len(), column.count() as usize);
    debug_assert!(
        column.source.len() >= column.texheight as usize,
        "sample_column: source has {} texels, texheight is {}",
        column.source.len(),
        column.texheight
    );

    let frac = start_frac(column, center_y);
    let colormap = column.colormap;
    match column.translation {
        Some(translation) if translated => {
            sample_with(column, frac, out, |texel| {
                colormap[translation[texel as usize] as usize]
            });
        },
        _ => sample_with(column, frac, out, |texel| colormap[texel as usize]),
    }
}

#[inline]
fn sample_with(column: &ColumnDescriptor, mut frac: Fixed, out: &mut [u8], remap: impl Fn(u8) -> u8) {
    let source = column.source;
    let step = column.step;
    let texheight = column.texheight;

    if !is_pow2_height(texheight) {
        let heightmask = texheight << FRACBITS;
        debug_assert!(
            step >= 0 && step < heightmask,
            "sample_column: step {:#x} outside [0, {:#x}) for texheight {}",
            step,
            heightmask,
            texheight
        );
        frac = normalize_frac(frac, heightmask);

        for dest in out.iter_mut() {
            *dest = remap(source[(frac >> FRACBITS) as usize]);
            frac = frac.wrapping_add(step);
            if frac >= heightmask {
                frac -= heightmask;
            }
        }
    } else {
        let mask = texheight - 1;
        let mut pairs = out.chunks_exact_mut(2);
        for pair in &mut pairs {
            pair[0] = remap(source[((frac >> FRACBITS) & mask) as usize]);
            frac = frac.wrapping_add(step);
            pair[1] = remap(source[((frac >> FRACBITS) & mask) as usize]);
            frac = frac.wrapping_add(step);
        }
        if let [last] = pairs.into_remainder() {
            *last = remap(source[((frac >> FRACBITS) & mask) as usize]);
        }
    }
}

/// Reference remap used by tests and the scalar engine checks
#[inline]
pub fn remap_texel(texel: u8, colormap: &RemapTable, translation: Option<&RemapTable>) -> u8 {
    match translation {
        Some(t) => colormap[t[texel as usize] as usize],
        None => colormap[texel as usize],
    }
}

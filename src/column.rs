//! Per-column drawing requests and the remap tables they reference

use std::rc::Rc;

use crate::fixed::{Fixed, FRACUNIT};

/// 256-entry palette remap (light level, translation)
pub type RemapTable = [u8; 256];

/// Colormap that leaves every index unchanged
pub const IDENTITY_COLORMAP: RemapTable = identity_table();

const fn identity_table() -> RemapTable {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = i as u8;
        i += 1;
    }
    table
}

// ============================================================================
// TranMap
// ============================================================================

/// 256x256 translucency table: `blend(dest, src)` gives the composited index
pub struct TranMap {
    table: Vec<u8>,
}

impl TranMap {
    pub const SIZE: usize = 256 * 256;

    /// Wrap a prebuilt table laid out as `table[(dest << 8) + src]`.
    /// Returns None unless it has exactly 65536 entries.
    pub fn from_table(table: Vec<u8>) -> Option<Self> {
        if table.len() == Self::SIZE {
            Some(Self { table })
        } else {
            None
        }
    }

    /// Build by evaluating `f(dest, src)` for every pair
    pub fn from_fn(mut f: impl FnMut(u8, u8) -> u8) -> Self {
        let mut table = Vec::with_capacity(Self::SIZE);
        for dest in 0..=255u8 {
            for src in 0..=255u8 {
                table.push(f(dest, src));
            }
        }
        Self { table }
    }

    #[inline]
    pub fn blend(&self, dest: u8, src: u8) -> u8 {
        self.table[((dest as usize) << 8) + src as usize]
    }
}

// ============================================================================
// ColumnDescriptor
// ============================================================================

/// One vertical strip to draw.
///
/// Filled in by the caller before every draw call. Nothing here is retained by
/// the core past the call except the blend table handle, which a pending batch
/// keeps alive until it flushes.
#[derive(Clone, Copy)]
pub struct ColumnDescriptor<'a> {
    /// Destination column, view space
    pub x: i32,
    /// First scanline, inclusive
    pub y1: i32,
    /// Last scanline, inclusive
    pub y2: i32,
    /// Texel delta per scanline
    pub step: Fixed,
    /// Texel position at the view center
    pub texmid: Fixed,
    /// Number of texels in `source` the sampler wraps over
    pub texheight: i32,
    pub colormap: &'a RemapTable,
    /// Applied before the colormap by translated drawers
    pub translation: Option<&'a RemapTable>,
    /// Flex/additive opacity, FRACUNIT = opaque
    pub translevel: Fixed,
    /// Blend table for translucent drawers
    pub tranmap: Option<&'a Rc<TranMap>>,
    pub source: &'a [u8],
}

impl<'a> ColumnDescriptor<'a> {
    /// 1:1 column over the whole source, anchored at texel 0
    pub fn new(x: i32, y1: i32, y2: i32, source: &'a [u8], colormap: &'a RemapTable) -> Self {
        Self {
            x,
            y1,
            y2,
            step: FRACUNIT,
            texmid: 0,
            texheight: source.len() as i32,
            colormap,
            translation: None,
            translevel: FRACUNIT,
            tranmap: None,
            source,
        }
    }

    pub fn with_step(mut self, step: Fixed) -> Self {
        self.step = step;
        self
    }

    pub fn with_texmid(mut self, texmid: Fixed) -> Self {
        self.texmid = texmid;
        self
    }

    pub fn with_texheight(mut self, texheight: i32) -> Self {
        self.texheight = texheight;
        self
    }

    pub fn with_translation(mut self, translation: &'a RemapTable) -> Self {
        self.translation = Some(translation);
        self
    }

    pub fn with_translevel(mut self, translevel: Fixed) -> Self {
        self.translevel = translevel;
        self
    }

    pub fn with_tranmap(mut self, tranmap: &'a Rc<TranMap>) -> Self {
        self.tranmap = Some(tranmap);
        self
    }

    /// Scanlines covered; zero or negative means nothing to draw
    #[inline]
    pub fn count(&self) -> i32 {
        self.y2 - self.y1 + 1
    }
}

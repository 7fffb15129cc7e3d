//! Quad column batching
//!
//! Columns drawn left to right at adjacent x are sampled into up to four scratch
//! lanes instead of straight to the frame. When the batch is committed, rows that
//! all four lanes cover form one contiguous 4-byte run per scanline and go out in
//! a single store; the ragged heads and tails go out one pixel at a time. The
//! result is identical to writing each column on its own.

use std::rc::Rc;

use log::{trace, warn};

use crate::column::{ColumnDescriptor, TranMap};
use crate::fixed::Fixed;
use crate::frame::RenderContext;
use crate::style::{ColumnDrawer, ColumnStyle, Compositor, DeferredStyle};

/// Columns per batch
pub const QUAD: usize = 4;

// ============================================================================
// Compositing rules
// ============================================================================

/// What a column's buffered bytes do to the frame.
///
/// Two columns may share a batch only if their modes compare equal (and, for
/// translucency, they use the same blend table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Opaque,
    Translucent,
    Deferred {
        style: DeferredStyle,
        translevel: Fixed,
    },
}

impl BatchMode {
    pub fn for_column(drawer: ColumnDrawer, column: &ColumnDescriptor) -> Self {
        match drawer.deferred_style() {
            // Fuzz ignores opacity; keep it out of the batch key
            Some(DeferredStyle::Fuzz) => BatchMode::Deferred {
                style: DeferredStyle::Fuzz,
                translevel: 0,
            },
            Some(style) => BatchMode::Deferred {
                style,
                translevel: column.translevel,
            },
            None if drawer.style() == ColumnStyle::Translucent => BatchMode::Translucent,
            None => BatchMode::Opaque,
        }
    }

    #[inline]
    pub fn is_fuzz(self) -> bool {
        matches!(
            self,
            BatchMode::Deferred {
                style: DeferredStyle::Fuzz,
                ..
            }
        )
    }
}

/// Per-pixel write rule resolved once per flush
pub(crate) enum PixelRule {
    Copy,
    Blend(Rc<TranMap>),
    Compose {
        compositor: Rc<dyn Compositor>,
        translevel: Fixed,
    },
}

impl PixelRule {
    /// Resolve the rule for `mode`. Modes whose table or compositor is missing fall
    /// back to a plain copy; `warned` limits the warning to once per owner.
    pub(crate) fn resolve(
        mode: BatchMode,
        tranmap: Option<&Rc<TranMap>>,
        ctx: &RenderContext,
        warned: &mut bool,
    ) -> Self {
        match mode {
            BatchMode::Opaque => PixelRule::Copy,
            BatchMode::Translucent => match tranmap {
                Some(map) => PixelRule::Blend(Rc::clone(map)),
                None => {
                    if !*warned {
                        warn!("translucent column without a blend table; drawing opaque");
                        *warned = true;
                    }
                    PixelRule::Copy
                },
            },
            BatchMode::Deferred { style, translevel } => match ctx.compositor(style) {
                Some(compositor) => PixelRule::Compose {
                    compositor,
                    translevel,
                },
                None => {
                    if !*warned {
                        warn!("no compositor bound for {:?} columns; drawing opaque", style);
                        *warned = true;
                    }
                    PixelRule::Copy
                },
            },
        }
    }

    #[inline]
    pub(crate) fn apply(&self, ctx: &mut RenderContext, x: i32, y: i32, src: u8) {
        let value = match self {
            PixelRule::Copy => src,
            PixelRule::Blend(map) => map.blend(ctx.pixel(x, y), src),
            PixelRule::Compose {
                compositor,
                translevel,
            } => compositor.composite(ctx, x, y, src, *translevel),
        };
        ctx.put(x, y, value);
    }

    /// Write one scanline of a full quad starting at `x`
    #[inline]
    fn apply_quad(&self, ctx: &mut RenderContext, x: i32, y: i32, src: [u8; QUAD]) {
        match self {
            PixelRule::Copy => ctx.put_quad(x, y, src),
            PixelRule::Blend(map) => {
                let dest = ctx.quad(x, y);
                ctx.put_quad(
                    x,
                    y,
                    [
                        map.blend(dest[0], src[0]),
                        map.blend(dest[1], src[1]),
                        map.blend(dest[2], src[2]),
                        map.blend(dest[3], src[3]),
                    ],
                );
            },
            PixelRule::Compose { .. } => {
                for (lane, &s) in src.iter().enumerate() {
                    self.apply(ctx, x + lane as i32, y, s);
                }
            },
        }
    }
}

// ============================================================================
// QuadBatch
// ============================================================================

/// Counters for committed batches
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    /// Batches written column by column
    pub whole: u64,
    /// Batches written as head/tail runs plus a quad body
    pub split: u64,
    /// Columns committed in total
    pub columns: u64,
}

/// Up to four pending columns sharing a compositing mode and contiguous x
pub struct QuadBatch {
    count: usize,
    start_x: i32,
    yl: [i32; QUAD],
    yh: [i32; QUAD],
    common_top: i32,
    common_bot: i32,
    mode: BatchMode,
    tranmap: Option<Rc<TranMap>>,
    /// One scratch column per lane, indexed by view scanline
    lanes: [Vec<u8>; QUAD],
    stats: FlushStats,
    warned: bool,
}

impl QuadBatch {
    /// Scratch lanes start out `max_height` rows tall and grow on demand
    pub fn new(max_height: usize) -> Self {
        Self {
            count: 0,
            start_x: 0,
            yl: [0; QUAD],
            yh: [0; QUAD],
            common_top: 0,
            common_bot: 0,
            mode: BatchMode::Opaque,
            tranmap: None,
            lanes: std::array::from_fn(|_| vec![0; max_height]),
            stats: FlushStats::default(),
            warned: false,
        }
    }

    /// Columns waiting to be committed
    #[inline]
    pub fn pending(&self) -> usize {
        self.count
    }

    pub fn start_x(&self) -> i32 {
        self.start_x
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    /// Scanlines shared by every pending column, if any
    pub fn common_span(&self) -> Option<(i32, i32)> {
        (self.count > 0 && self.common_top <= self.common_bot)
            .then_some((self.common_top, self.common_bot))
    }

    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    /// True if `column` cannot join the pending batch
    fn breaks_batch(
        &self,
        column: &ColumnDescriptor,
        mode: BatchMode,
        tranmap: Option<&Rc<TranMap>>,
    ) -> bool {
        if self.count == 0 {
            return false;
        }
        if self.count == QUAD || self.mode != mode {
            return true;
        }
        if self.start_x + self.count as i32 != column.x {
            return true;
        }
        mode == BatchMode::Translucent
            && match (self.tranmap.as_ref(), tranmap) {
                (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
                (None, None) => false,
                _ => true,
            }
    }

    /// Reserve a lane for `column`, committing the pending batch first if the
    /// column cannot join it. Returns the lane's scratch rows `y1..=y2`.
    ///
    /// Callers skip empty spans; they never reach here.
    pub fn acquire(
        &mut self,
        ctx: &mut RenderContext,
        column: &ColumnDescriptor,
        mode: BatchMode,
    ) -> &mut [u8] {
        debug_assert!(column.count() > 0);
        debug_assert!(column.y1 >= 0, "acquire: y1 {} above the view", column.y1);

        let tranmap = column.tranmap;
        if self.breaks_batch(column, mode, tranmap) {
            self.flush(ctx);
        }

        let lane = self.count;
        if lane == 0 {
            self.start_x = column.x;
            self.common_top = column.y1;
            self.common_bot = column.y2;
            self.mode = mode;
            self.tranmap = if mode == BatchMode::Translucent {
                tranmap.cloned()
            } else {
                None
            };
        } else {
            self.common_top = self.common_top.max(column.y1);
            self.common_bot = self.common_bot.min(column.y2);
        }
        self.yl[lane] = column.y1;
        self.yh[lane] = column.y2;
        self.count += 1;

        let rows = &mut self.lanes[lane];
        let needed = column.y2 as usize + 1;
        if rows.len() < needed {
            rows.resize(needed, 0);
        }
        &mut rows[column.y1 as usize..needed]
    }

    /// Commit every pending column to the frame and empty the batch
    pub fn flush(&mut self, ctx: &mut RenderContext) {
        if self.count == 0 {
            return;
        }

        let rule = PixelRule::resolve(self.mode, self.tranmap.as_ref(), ctx, &mut self.warned);
        let split = self.count == QUAD && self.common_top <= self.common_bot && !self.mode.is_fuzz();

        if split {
            trace!(
                "quad flush at x={} rows {}..={}",
                self.start_x,
                self.common_top,
                self.common_bot
            );
            self.flush_head_tail(ctx, &rule);
            self.flush_quad(ctx, &rule);
            self.stats.split += 1;
        } else {
            trace!("whole flush of {} columns at x={}", self.count, self.start_x);
            self.flush_whole(ctx, &rule);
            self.stats.whole += 1;
        }

        self.stats.columns += self.count as u64;
        self.count = 0;
        self.tranmap = None;
    }

    /// Write each pending column top to bottom
    fn flush_whole(&self, ctx: &mut RenderContext, rule: &PixelRule) {
        for lane in 0..self.count {
            self.flush_run(ctx, rule, lane, self.yl[lane], self.yh[lane]);
        }
    }

    /// Write the rows of each lane outside the shared span
    fn flush_head_tail(&self, ctx: &mut RenderContext, rule: &PixelRule) {
        for lane in 0..QUAD {
            if self.yl[lane] < self.common_top {
                self.flush_run(ctx, rule, lane, self.yl[lane], self.common_top - 1);
            }
            if self.yh[lane] > self.common_bot {
                self.flush_run(ctx, rule, lane, self.common_bot + 1, self.yh[lane]);
            }
        }
    }

    /// Write the shared span four pixels per scanline
    fn flush_quad(&self, ctx: &mut RenderContext, rule: &PixelRule) {
        let [l0, l1, l2, l3] = &self.lanes;
        for y in self.common_top..=self.common_bot {
            let row = y as usize;
            rule.apply_quad(ctx, self.start_x, y, [l0[row], l1[row], l2[row], l3[row]]);
        }
    }

    fn flush_run(&self, ctx: &mut RenderContext, rule: &PixelRule, lane: usize, top: i32, bot: i32) {
        let x = self.start_x + lane as i32;
        let rows = &self.lanes[lane];
        for y in top..=bot {
            rule.apply(ctx, x, y, rows[y as usize]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::IDENTITY_COLORMAP;

    const W: usize = 32;
    const H: usize = 16;

    fn fill(lane: &mut [u8], value: u8) {
        lane.fill(value);
    }

    #[test]
    fn test_acquire_seeds_then_appends() {
        let mut pixels = vec![0u8; W * H];
        let mut ctx = RenderContext::new(&mut pixels, W).unwrap();
        let mut batch = QuadBatch::new(H);
        let src = [0u8; 4];

        let a = ColumnDescriptor::new(4, 2, 10, &src, &IDENTITY_COLORMAP);
        assert_eq!(batch.acquire(&mut ctx, &a, BatchMode::Opaque).len(), 9);
        assert_eq!(batch.pending(), 1);
        assert_eq!(batch.common_span(), Some((2, 10)));

        let b = ColumnDescriptor::new(5, 4, 12, &src, &IDENTITY_COLORMAP);
        batch.acquire(&mut ctx, &b, BatchMode::Opaque);
        assert_eq!(batch.pending(), 2);
        assert_eq!(batch.start_x(), 4);
        assert_eq!(batch.common_span(), Some((4, 10)));
        assert_eq!(batch.stats().whole + batch.stats().split, 0);
    }

    #[test]
    fn test_gap_in_x_breaks_batch() {
        let mut pixels = vec![0u8; W * H];
        let mut ctx = RenderContext::new(&mut pixels, W).unwrap();
        let mut batch = QuadBatch::new(H);
        let src = [0u8; 4];

        let a = ColumnDescriptor::new(1, 0, 3, &src, &IDENTITY_COLORMAP);
        let b = ColumnDescriptor::new(3, 0, 3, &src, &IDENTITY_COLORMAP);
        fill(batch.acquire(&mut ctx, &a, BatchMode::Opaque), 7);
        fill(batch.acquire(&mut ctx, &b, BatchMode::Opaque), 8);
        assert_eq!(batch.pending(), 1);
        assert_eq!(batch.start_x(), 3);
        assert_eq!(batch.stats().whole, 1);

        batch.flush(&mut ctx);
        assert_eq!(batch.pending(), 0);
        drop(ctx);
        for y in 0..4 {
            assert_eq!(pixels[y * W + 1], 7);
            assert_eq!(pixels[y * W + 3], 8);
            assert_eq!(pixels[y * W + 2], 0);
        }
    }

    #[test]
    fn test_mode_change_breaks_batch() {
        let mut pixels = vec![0u8; W * H];
        let mut ctx = RenderContext::new(&mut pixels, W).unwrap();
        let mut batch = QuadBatch::new(H);
        let src = [0u8; 4];
        let col = |x| ColumnDescriptor::new(x, 0, 3, &src, &IDENTITY_COLORMAP);

        batch.acquire(&mut ctx, &col(0), BatchMode::Opaque);
        batch.acquire(&mut ctx, &col(1), BatchMode::Opaque);
        let fuzz = BatchMode::Deferred {
            style: DeferredStyle::Fuzz,
            translevel: 0,
        };
        batch.acquire(&mut ctx, &col(2), fuzz);
        assert_eq!(batch.pending(), 1);
        assert_eq!(batch.mode(), fuzz);
        assert_eq!(batch.stats().columns, 2);
    }

    #[test]
    fn test_fifth_column_starts_new_batch() {
        let mut pixels = vec![0u8; W * H];
        let mut ctx = RenderContext::new(&mut pixels, W).unwrap();
        let mut batch = QuadBatch::new(H);
        let src = [0u8; 4];

        for x in 0..5 {
            let col = ColumnDescriptor::new(x, 0, 7, &src, &IDENTITY_COLORMAP);
            fill(batch.acquire(&mut ctx, &col, BatchMode::Opaque), x as u8 + 1);
        }
        assert_eq!(batch.pending(), 1);
        assert_eq!(batch.start_x(), 4);
        assert_eq!(batch.stats().split, 1);

        batch.flush(&mut ctx);
        drop(ctx);
        for x in 0..5 {
            for y in 0..8 {
                assert_eq!(pixels[y * W + x], x as u8 + 1);
            }
        }
    }

    #[test]
    fn test_disjoint_spans_flush_whole() {
        let mut pixels = vec![0u8; W * H];
        let mut ctx = RenderContext::new(&mut pixels, W).unwrap();
        let mut batch = QuadBatch::new(H);
        let src = [0u8; 4];

        let spans = [(0, 3), (2, 5), (6, 9), (1, 4)];
        for (x, &(y1, y2)) in spans.iter().enumerate() {
            let col = ColumnDescriptor::new(x as i32, y1, y2, &src, &IDENTITY_COLORMAP);
            fill(batch.acquire(&mut ctx, &col, BatchMode::Opaque), 9);
        }
        assert_eq!(batch.common_span(), None);
        batch.flush(&mut ctx);
        assert_eq!(batch.stats().whole, 1);
        assert_eq!(batch.stats().split, 0);
        drop(ctx);
        for (x, &(y1, y2)) in spans.iter().enumerate() {
            for y in 0..H as i32 {
                let expected = if y >= y1 && y <= y2 { 9 } else { 0 };
                assert_eq!(pixels[y as usize * W + x], expected, "x={} y={}", x, y);
            }
        }
    }

    #[test]
    fn test_fuzz_never_splits() {
        let mut pixels = vec![0u8; W * H];
        let mut ctx = RenderContext::new(&mut pixels, W).unwrap();
        let mut batch = QuadBatch::new(H);
        let src = [0u8; 4];
        let fuzz = BatchMode::Deferred {
            style: DeferredStyle::Fuzz,
            translevel: 0,
        };
        for x in 0..4 {
            let col = ColumnDescriptor::new(x, 0, 7, &src, &IDENTITY_COLORMAP);
            batch.acquire(&mut ctx, &col, fuzz);
        }
        batch.flush(&mut ctx);
        assert_eq!(batch.stats().whole, 1);
        assert_eq!(batch.stats().split, 0);
    }

    #[test]
    fn test_lanes_grow_for_tall_columns() {
        let mut pixels = vec![0u8; W * 64];
        let mut ctx = RenderContext::new(&mut pixels, W).unwrap();
        let mut batch = QuadBatch::new(8);
        let src = [0u8; 4];
        let col = ColumnDescriptor::new(0, 10, 40, &src, &IDENTITY_COLORMAP);
        assert_eq!(batch.acquire(&mut ctx, &col, BatchMode::Opaque).len(), 31);
    }

    #[test]
    fn test_translevel_is_part_of_batch_key() {
        let src = [0u8; 4];
        let col = ColumnDescriptor::new(0, 0, 3, &src, &IDENTITY_COLORMAP).with_translevel(100);
        let flex = BatchMode::for_column(ColumnDrawer::FlexTranslated, &col);
        assert_eq!(
            flex,
            BatchMode::Deferred {
                style: DeferredStyle::Flex,
                translevel: 100
            }
        );
        let fuzz = BatchMode::for_column(ColumnDrawer::Fuzz, &col);
        assert!(fuzz.is_fuzz());
        assert_eq!(BatchMode::for_column(ColumnDrawer::Translated, &col), BatchMode::Opaque);
        assert_eq!(
            BatchMode::for_column(ColumnDrawer::TranslucentTranslated, &col),
            BatchMode::Translucent
        );
    }
}

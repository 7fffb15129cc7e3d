//! Quad-buffered column engine

use super::{check_column, ColumnEngine};
use crate::batch::{BatchMode, FlushStats, QuadBatch};
use crate::column::ColumnDescriptor;
use crate::frame::RenderContext;
use crate::sampler::sample_column;
use crate::style::ColumnDrawer;

/// Samples columns into a `QuadBatch` and lets the batch decide how to commit them
pub struct QuadEngine {
    batch: QuadBatch,
}

impl QuadEngine {
    pub fn new(max_height: usize) -> Self {
        Self {
            batch: QuadBatch::new(max_height),
        }
    }

    pub fn batch(&self) -> &QuadBatch {
        &self.batch
    }
}

impl ColumnEngine for QuadEngine {
    fn name(&self) -> &str {
        "quad"
    }

    fn draw(&mut self, ctx: &mut RenderContext, drawer: ColumnDrawer, column: &ColumnDescriptor) {
        // Zero length, or nothing to sample
        if column.count() <= 0 || column.texheight <= 0 {
            return;
        }
        check_column(ctx, column, "QuadEngine::draw");

        let mode = BatchMode::for_column(drawer, column);
        let center_y = ctx.center_y();
        let lane = self.batch.acquire(ctx, column, mode);
        sample_column(column, center_y, drawer.is_translated(), lane);
    }

    fn reset(&mut self, ctx: &mut RenderContext) {
        self.batch.flush(ctx);
    }

    fn pending(&self) -> usize {
        self.batch.pending()
    }

    fn stats(&self) -> Option<FlushStats> {
        Some(self.batch.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::IDENTITY_COLORMAP;
    use crate::fixed::FRACUNIT;

    #[test]
    fn test_columns_wait_for_reset() {
        let mut pixels = vec![0u8; 16 * 16];
        let mut ctx = RenderContext::new(&mut pixels, 16).unwrap();
        ctx.set_center_y(0.0);
        let mut engine = QuadEngine::new(16);

        let src: Vec<u8> = (1..=16).collect();
        // texmid -1.0 lines texel 0 up with scanline 0
        let col = ColumnDescriptor::new(3, 0, 15, &src, &IDENTITY_COLORMAP).with_texmid(-FRACUNIT);
        engine.draw(&mut ctx, ColumnDrawer::Opaque, &col);
        assert_eq!(engine.pending(), 1);
        assert_eq!(ctx.pixel(3, 0), 0);

        engine.reset(&mut ctx);
        assert_eq!(engine.pending(), 0);
        for y in 0..16 {
            assert_eq!(ctx.pixel(3, y), y as u8 + 1);
        }
    }

    #[test]
    fn test_empty_column_never_batches() {
        let mut pixels = vec![0u8; 16 * 16];
        let mut ctx = RenderContext::new(&mut pixels, 16).unwrap();
        let mut engine = QuadEngine::new(16);
        let src = [5u8; 4];
        let col = ColumnDescriptor::new(3, 9, 8, &src, &IDENTITY_COLORMAP);
        engine.draw(&mut ctx, ColumnDrawer::Opaque, &col);
        assert_eq!(engine.pending(), 0);
        assert_eq!(engine.batch().stats().columns, 0);
    }
}

//! Column-at-a-time engine
//!
//! Samples each column and writes it straight to the frame with the same
//! compositing rules the quad engine uses. Slower, but has no buffered state, which
//! makes it the yardstick the batched path is checked against.

use super::{check_column, ColumnEngine};
use crate::batch::{BatchMode, PixelRule};
use crate::column::ColumnDescriptor;
use crate::frame::RenderContext;
use crate::sampler::sample_column;
use crate::style::ColumnDrawer;

pub struct ReferenceEngine {
    scratch: Vec<u8>,
    warned: bool,
}

impl ReferenceEngine {
    pub fn new(max_height: usize) -> Self {
        Self {
            scratch: vec![0; max_height],
            warned: false,
        }
    }
}

impl ColumnEngine for ReferenceEngine {
    fn name(&self) -> &str {
        "reference"
    }

    fn draw(&mut self, ctx: &mut RenderContext, drawer: ColumnDrawer, column: &ColumnDescriptor) {
        let count = column.count();
        if count <= 0 || column.texheight <= 0 {
            return;
        }
        check_column(ctx, column, "ReferenceEngine::draw");

        let count = count as usize;
        if self.scratch.len() < count {
            self.scratch.resize(count, 0);
        }
        let rows = &mut self.scratch[..count];
        sample_column(column, ctx.center_y(), drawer.is_translated(), rows);

        let mode = BatchMode::for_column(drawer, column);
        let rule = PixelRule::resolve(mode, column.tranmap, ctx, &mut self.warned);
        for (y, &src) in (column.y1..).zip(rows.iter()) {
            rule.apply(ctx, column.x, y, src);
        }
    }

    fn reset(&mut self, _ctx: &mut RenderContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::IDENTITY_COLORMAP;

    #[test]
    fn test_writes_immediately() {
        let mut pixels = vec![0u8; 8 * 8];
        let mut ctx = RenderContext::new(&mut pixels, 8).unwrap();
        ctx.set_center_y(0.0);
        let mut engine = ReferenceEngine::new(8);
        let src = [10u8, 20, 30, 40];
        let col = ColumnDescriptor::new(2, 1, 6, &src, &IDENTITY_COLORMAP).with_texmid(0);
        engine.draw(&mut ctx, ColumnDrawer::Opaque, &col);
        assert_eq!(engine.pending(), 0);
        // frac at y1=1 is texmid + 2 * FRACUNIT -> texel 2
        let expected = [30, 40, 10, 20, 30, 40];
        for (i, &e) in expected.iter().enumerate() {
            assert_eq!(ctx.pixel(2, 1 + i as i32), e);
        }
        assert_eq!(ctx.pixel(2, 0), 0);
        assert_eq!(ctx.pixel(2, 7), 0);
    }
}

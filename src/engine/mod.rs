//! Column drawing engines
//!
//! An engine implements every `ColumnDrawer` entry point plus a reset hook. The
//! `Renderer` owns the registered engines, resolves (style, translated) to a drawer,
//! and forwards each column to whichever engine is active, so call sites never
//! depend on how an engine gets pixels onto the frame.

mod quad;
mod reference;

pub use quad::QuadEngine;
pub use reference::ReferenceEngine;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::batch::FlushStats;
use crate::column::ColumnDescriptor;
use crate::frame::RenderContext;
use crate::style::{ColumnDrawer, ColumnStyle, SpriteStyle};

/// Trait for all column drawing engines
pub trait ColumnEngine {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Draw one column through the given entry point
    fn draw(&mut self, ctx: &mut RenderContext, drawer: ColumnDrawer, column: &ColumnDescriptor);

    /// Called at frame start and end of stream: commit anything still buffered
    fn reset(&mut self, ctx: &mut RenderContext);

    /// Columns accepted but not yet on the frame
    fn pending(&self) -> usize {
        0
    }

    /// Batching counters, for engines that batch
    fn stats(&self) -> Option<FlushStats> {
        None
    }
}

/// Registered engine slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineId {
    /// Quad-buffered batching engine
    #[default]
    Quad,
    /// Column-at-a-time engine with no buffering
    Reference,
}

impl EngineId {
    pub const ALL: [EngineId; 2] = [EngineId::Quad, EngineId::Reference];
}

/// Debug-build range check shared by the engines
#[inline]
pub(crate) fn check_column(ctx: &RenderContext, column: &ColumnDescriptor, engine: &str) {
    let view = ctx.viewport();
    debug_assert!(
        column.x >= 0 && column.x < view.width && column.y1 >= 0 && column.y2 < view.height,
        "{}: {} to {} at {} outside {}x{} view",
        engine,
        column.y1,
        column.y2,
        column.x,
        view.width,
        view.height
    );
}

// ============================================================================
// Renderer
// ============================================================================

/// Engine table and the active selection
pub struct Renderer {
    engines: Vec<Box<dyn ColumnEngine>>,
    active: EngineId,
    configured: EngineId,
}

impl Renderer {
    /// Register the built-in engines, sized for views up to `max_height` rows
    pub fn new(max_height: usize) -> Self {
        Self {
            engines: vec![
                Box::new(QuadEngine::new(max_height)),
                Box::new(ReferenceEngine::new(max_height)),
            ],
            active: EngineId::Quad,
            configured: EngineId::Quad,
        }
    }

    /// Built-in engines with `engine` as the one `setup_frame` selects
    pub fn with_engine(max_height: usize, engine: EngineId) -> Self {
        let mut renderer = Self::new(max_height);
        renderer.configured = engine;
        renderer.active = engine;
        renderer
    }

    /// Replace the engine in slot `id`
    pub fn register(&mut self, id: EngineId, engine: Box<dyn ColumnEngine>) {
        debug!("registering {} as {:?} engine", engine.name(), id);
        self.engines[id as usize] = engine;
    }

    /// Switch engines. The outgoing engine is reset against `ctx` first, so its
    /// buffered columns land on the frame they were drawn for.
    pub fn select_engine(&mut self, ctx: &mut RenderContext, id: EngineId) {
        if id == self.active {
            return;
        }
        let pending = self.engine().pending();
        if pending > 0 {
            debug!(
                "committing {} buffered columns from {} before switching",
                pending,
                self.engine().name()
            );
        }
        self.engine_mut().reset(ctx);
        self.active = id;
        debug!("column engine: {}", self.engine().name());
    }

    pub fn active_engine(&self) -> EngineId {
        self.active
    }

    pub fn engine(&self) -> &dyn ColumnEngine {
        self.engines[self.active as usize].as_ref()
    }

    fn engine_mut(&mut self) -> &mut dyn ColumnEngine {
        self.engines[self.active as usize].as_mut()
    }

    /// Frame start: select the configured engine and clear leftover batch state
    pub fn setup_frame(&mut self, ctx: &mut RenderContext) {
        self.select_engine(ctx, self.configured);
        self.engine_mut().reset(ctx);
    }

    /// Draw one column in `style`
    #[inline]
    pub fn draw(
        &mut self,
        ctx: &mut RenderContext,
        column: &ColumnDescriptor,
        style: ColumnStyle,
        translated: bool,
    ) {
        self.draw_with(ctx, ColumnDrawer::resolve(style, translated), column);
    }

    /// Draw one sprite column in a sprite draw style
    #[inline]
    pub fn draw_sprite(
        &mut self,
        ctx: &mut RenderContext,
        column: &ColumnDescriptor,
        style: SpriteStyle,
        translated: bool,
    ) {
        self.draw_with(ctx, style.drawer(translated), column);
    }

    /// Draw through an already resolved entry point
    #[inline]
    pub fn draw_with(&mut self, ctx: &mut RenderContext, drawer: ColumnDrawer, column: &ColumnDescriptor) {
        self.engine_mut().draw(ctx, drawer, column);
    }

    /// Commit everything buffered so far. Call before presenting the frame.
    pub fn end_column_stream(&mut self, ctx: &mut RenderContext) {
        self.engine_mut().reset(ctx);
    }

    pub fn stats(&self) -> Option<FlushStats> {
        self.engine().stats()
    }
}

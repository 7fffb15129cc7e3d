//! quadcol: batched column rasterizer for 8-bit palettized software renderers
//!
//! Callers describe one vertical strip at a time with a [`ColumnDescriptor`] and
//! hand it to a [`Renderer`] together with the frame's [`RenderContext`]. The
//! default engine samples up to four adjacent columns into scratch lanes and
//! commits them together, writing the rows they share four pixels at a time.
//!
//! ```
//! use quadcol::{ColumnDescriptor, ColumnStyle, FrameBuffer, Renderer, IDENTITY_COLORMAP};
//!
//! let mut frame = FrameBuffer::with_size(320, 200);
//! let mut renderer = Renderer::new(frame.height());
//! let texels: Vec<u8> = (0..64).collect();
//!
//! let mut ctx = frame.context().unwrap();
//! renderer.setup_frame(&mut ctx);
//! for x in 10..14 {
//!     let column = ColumnDescriptor::new(x, 50, 150, &texels, &IDENTITY_COLORMAP);
//!     renderer.draw(&mut ctx, &column, ColumnStyle::Normal, false);
//! }
//! renderer.end_column_stream(&mut ctx);
//! ```

pub mod batch;
pub mod column;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixed;
pub mod frame;
pub mod sampler;
pub mod style;

pub use batch::{BatchMode, FlushStats, QuadBatch, QUAD};
pub use column::{ColumnDescriptor, RemapTable, TranMap, IDENTITY_COLORMAP};
pub use config::RenderConfig;
pub use engine::{ColumnEngine, EngineId, QuadEngine, ReferenceEngine, Renderer};
pub use error::{RenderError, Result};
pub use fixed::{Fixed, FRACBITS, FRACUNIT};
pub use frame::{FrameBuffer, Palette, RenderContext, Viewport};
pub use style::{ColumnDrawer, ColumnStyle, Compositor, CompositorSet, DeferredStyle, SpriteStyle};

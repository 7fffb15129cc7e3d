use thiserror::Error;

use crate::frame::Viewport;

/// Errors from binding render targets and loading configuration.
///
/// The drawing hot path never returns these; span and coordinate contracts there are
/// checked with debug assertions only.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("stride {stride} is zero or wider than a {len}-byte frame buffer")]
    InvalidStride { stride: usize, len: usize },

    #[error("viewport {viewport:?} does not fit a {width}x{height} frame buffer")]
    ViewportOutOfBounds {
        viewport: Viewport,
        width: usize,
        height: usize,
    },

    #[error("palette needs 768 RGB bytes, got {0}")]
    PaletteSize(usize),

    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;

//! Render configuration
//!
//! Loaded from JSON; every field has a default so partial files work.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::{EngineId, Renderer};
use crate::error::Result;
use crate::frame::{RenderContext, Viewport};

pub const SCREENWIDTH: usize = 320;
pub const SCREENHEIGHT: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Frame buffer width in pixels (also the stride)
    pub screen_width: usize,
    /// Frame buffer height in scanlines
    pub screen_height: usize,
    /// View window; the whole screen when absent
    pub viewport: Option<Viewport>,
    /// Vertical view center; half the view height when absent
    pub center_y: Option<f32>,
    /// Engine selected at frame setup
    pub engine: EngineId,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            screen_width: SCREENWIDTH,
            screen_height: SCREENHEIGHT,
            viewport: None,
            center_y: None,
            engine: EngineId::Quad,
        }
    }
}

impl RenderConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save config to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        debug!("loaded render config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Frame buffer size in bytes
    pub fn frame_len(&self) -> usize {
        self.screen_width * self.screen_height
    }

    /// Bind `pixels` as this config's render target
    pub fn bind<'f>(&self, pixels: &'f mut [u8]) -> Result<RenderContext<'f>> {
        let mut ctx = RenderContext::new(pixels, self.screen_width)?;
        if let Some(viewport) = self.viewport {
            ctx.set_viewport(viewport)?;
        }
        if let Some(center_y) = self.center_y {
            ctx.set_center_y(center_y);
        }
        Ok(ctx)
    }

    /// Renderer with lanes tall enough for this screen
    pub fn renderer(&self) -> Renderer {
        Renderer::with_engine(self.screen_height, self.engine)
    }
}

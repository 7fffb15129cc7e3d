//! Render targets and pixel addressing
//!
//! `FrameBuffer` owns an 8-bit palettized canvas. `RenderContext` is the per-frame
//! binding of a borrowed pixel slice, its stride, the view window inside it, and the
//! vertical view center the sampler anchors texture steps on. Engines only ever read
//! the binding; pixels are written through `address()`.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};
use crate::style::{Compositor, CompositorSet, DeferredStyle};

// ============================================================================
// Viewport
// ============================================================================

/// View window inside the frame buffer, in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True if view-space (x, y) lies inside the window
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    fn fits(&self, width: usize, height: usize) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width >= 0
            && self.height >= 0
            && (self.x + self.width) as usize <= width
            && (self.y + self.height) as usize <= height
    }
}

// ============================================================================
// Palette
// ============================================================================

/// 256-entry RGB palette used to present an 8-bit frame
#[derive(Clone)]
pub struct Palette {
    colors: [(u8, u8, u8); 256],
}

impl Palette {
    /// Gray ramp: index i maps to (i, i, i)
    pub fn grayscale() -> Self {
        let mut colors = [(0, 0, 0); 256];
        for (i, c) in colors.iter_mut().enumerate() {
            *c = (i as u8, i as u8, i as u8);
        }
        Self { colors }
    }

    /// Build from packed RGB triplets (768 bytes)
    pub fn from_rgb_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 768 {
            return Err(RenderError::PaletteSize(bytes.len()));
        }
        let mut colors = [(0, 0, 0); 256];
        for (c, rgb) in colors.iter_mut().zip(bytes.chunks_exact(3)) {
            *c = (rgb[0], rgb[1], rgb[2]);
        }
        Ok(Self { colors })
    }

    #[inline]
    pub fn get(&self, index: u8) -> (u8, u8, u8) {
        self.colors[index as usize]
    }

    /// Index of the entry closest to (r, g, b), by squared distance
    pub fn nearest(&self, r: u8, g: u8, b: u8) -> u8 {
        let mut best = 0;
        let mut best_dist = u32::MAX;
        for (i, &(pr, pg, pb)) in self.colors.iter().enumerate() {
            let dr = i32::from(pr) - i32::from(r);
            let dg = i32::from(pg) - i32::from(g);
            let db = i32::from(pb) - i32::from(b);
            let dist = (dr * dr + dg * dg + db * db) as u32;
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        best as u8
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::grayscale()
    }
}

// ============================================================================
// FrameBuffer
// ============================================================================

/// Owned 8-bit palettized canvas, one byte per pixel, stride == width
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pixels: Vec<u8>,
    width: usize,
    height: usize,
}

impl FrameBuffer {
    pub fn with_size(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height],
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn clear(&mut self, index: u8) {
        self.pixels.fill(index);
    }

    /// Read a pixel (bounds checked)
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Write a pixel (bounds checked, silently ignored outside)
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, index: u8) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = index;
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Bind the whole buffer as a render target
    pub fn context(&mut self) -> Result<RenderContext<'_>> {
        let stride = self.width;
        RenderContext::new(&mut self.pixels, stride)
    }

    /// Expand to RGBA8888 through the palette (A, B, G, R byte order, as SDL expects
    /// on little-endian targets)
    pub fn expand_rgba(&self, palette: &Palette, out: &mut [u8]) {
        debug_assert!(out.len() >= self.pixels.len() * 4);
        for (dest, &index) in out.chunks_exact_mut(4).zip(self.pixels.iter()) {
            let (r, g, b) = palette.get(index);
            dest[0] = 255;
            dest[1] = b;
            dest[2] = g;
            dest[3] = r;
        }
    }
}

// ============================================================================
// RenderContext
// ============================================================================

/// Per-frame render target binding.
///
/// Set up once per frame (target, viewport, view center, compositors) and then
/// handed by reference to every draw and flush.
pub struct RenderContext<'f> {
    pixels: &'f mut [u8],
    stride: usize,
    rows: usize,
    viewport: Viewport,
    center_y: f32,
    compositors: CompositorSet,
}

impl<'f> RenderContext<'f> {
    /// Bind a frame buffer; the viewport covers all of it and the view center sits
    /// at half its height.
    pub fn new(pixels: &'f mut [u8], stride: usize) -> Result<Self> {
        let len = pixels.len();
        if stride == 0 || stride > len {
            return Err(RenderError::InvalidStride { stride, len });
        }
        let rows = len / stride;
        let viewport = Viewport::new(0, 0, stride as i32, rows as i32);
        Ok(Self {
            pixels,
            stride,
            rows,
            viewport,
            center_y: rows as f32 / 2.0,
            compositors: CompositorSet::default(),
        })
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Result<Self> {
        self.set_viewport(viewport)?;
        Ok(self)
    }

    /// Move the view window. Resets the view center to half the window height.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        if !viewport.fits(self.stride, self.rows) {
            return Err(RenderError::ViewportOutOfBounds {
                viewport,
                width: self.stride,
                height: self.rows,
            });
        }
        self.viewport = viewport;
        self.center_y = viewport.height as f32 / 2.0;
        Ok(())
    }

    /// Rebind the pixel memory, keeping the current viewport
    pub fn set_frame_buffer(&mut self, pixels: &'f mut [u8], stride: usize) -> Result<()> {
        let len = pixels.len();
        if stride == 0 || stride > len {
            return Err(RenderError::InvalidStride { stride, len });
        }
        let rows = len / stride;
        if !self.viewport.fits(stride, rows) {
            return Err(RenderError::ViewportOutOfBounds {
                viewport: self.viewport,
                width: stride,
                height: rows,
            });
        }
        self.pixels = pixels;
        self.stride = stride;
        self.rows = rows;
        Ok(())
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Vertical view center in view-space scanlines
    #[inline]
    pub fn center_y(&self) -> f32 {
        self.center_y
    }

    pub fn set_center_y(&mut self, center_y: f32) {
        self.center_y = center_y;
    }

    pub fn bind_compositor(&mut self, style: DeferredStyle, compositor: Rc<dyn Compositor>) {
        self.compositors.bind(style, compositor);
    }

    pub fn with_compositor(mut self, style: DeferredStyle, compositor: Rc<dyn Compositor>) -> Self {
        self.bind_compositor(style, compositor);
        self
    }

    #[inline]
    pub(crate) fn compositor(&self, style: DeferredStyle) -> Option<Rc<dyn Compositor>> {
        self.compositors.get(style)
    }

    /// Byte offset of view-space (x, y):
    /// `(viewport.y + y) * stride + (viewport.x + x)`
    #[inline]
    pub fn address(&self, x: i32, y: i32) -> usize {
        debug_assert!(
            self.viewport.contains(x, y),
            "address: ({}, {}) outside {}x{} view",
            x,
            y,
            self.viewport.width,
            self.viewport.height
        );
        (self.viewport.y + y) as usize * self.stride + (self.viewport.x + x) as usize
    }

    #[inline]
    pub fn pixel(&self, x: i32, y: i32) -> u8 {
        self.pixels[self.address(x, y)]
    }

    #[inline]
    pub fn put(&mut self, x: i32, y: i32, value: u8) {
        let a = self.address(x, y);
        self.pixels[a] = value;
    }

    /// Write four horizontally adjacent pixels starting at (x, y) in one store
    #[inline]
    pub fn put_quad(&mut self, x: i32, y: i32, quad: [u8; 4]) {
        debug_assert!(x + 3 < self.viewport.width, "put_quad: x {} + 3 outside view", x);
        let a = self.address(x, y);
        self.pixels[a..a + 4].copy_from_slice(&quad);
    }

    /// Read four horizontally adjacent pixels starting at (x, y)
    #[inline]
    pub fn quad(&self, x: i32, y: i32) -> [u8; 4] {
        let a = self.address(x, y);
        let mut quad = [0; 4];
        quad.copy_from_slice(&self.pixels[a..a + 4]);
        quad
    }
}

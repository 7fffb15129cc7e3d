//! Compositing styles and the style x translation drawer matrix

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::fixed::Fixed;
use crate::frame::RenderContext;

/// How sampled bytes land on the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnStyle {
    /// Straight copy
    Normal,
    /// Blend-table lookup against the destination
    Translucent,
    /// Destination distortion (reads neighbouring pixels)
    Fuzz,
    /// Variable-opacity blend driven by `translevel`
    Flex,
    /// Additive blend driven by `translevel`
    Additive,
}

impl ColumnStyle {
    pub const ALL: [ColumnStyle; 5] = [
        ColumnStyle::Normal,
        ColumnStyle::Translucent,
        ColumnStyle::Fuzz,
        ColumnStyle::Flex,
        ColumnStyle::Additive,
    ];
}

/// A concrete drawing entry point: one per style, crossed with translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnDrawer {
    Opaque,
    Translucent,
    Translated,
    TranslucentTranslated,
    Fuzz,
    Flex,
    FlexTranslated,
    Additive,
    AdditiveTranslated,
}

//                 untranslated              translated
const STYLE_DRAWERS: [[ColumnDrawer; 2]; 5] = [
    [ColumnDrawer::Opaque, ColumnDrawer::Translated],                 // Normal
    [ColumnDrawer::Translucent, ColumnDrawer::TranslucentTranslated], // Translucent
    [ColumnDrawer::Fuzz, ColumnDrawer::Fuzz],                         // Fuzz
    [ColumnDrawer::Flex, ColumnDrawer::FlexTranslated],               // Flex
    [ColumnDrawer::Additive, ColumnDrawer::AdditiveTranslated],       // Additive
];

impl ColumnDrawer {
    /// Resolve (style, translated) to its entry point. Fuzz has no translated form.
    #[inline]
    pub fn resolve(style: ColumnStyle, translated: bool) -> Self {
        STYLE_DRAWERS[style as usize][usize::from(translated)]
    }

    pub fn style(self) -> ColumnStyle {
        match self {
            ColumnDrawer::Opaque | ColumnDrawer::Translated => ColumnStyle::Normal,
            ColumnDrawer::Translucent | ColumnDrawer::TranslucentTranslated => {
                ColumnStyle::Translucent
            },
            ColumnDrawer::Fuzz => ColumnStyle::Fuzz,
            ColumnDrawer::Flex | ColumnDrawer::FlexTranslated => ColumnStyle::Flex,
            ColumnDrawer::Additive | ColumnDrawer::AdditiveTranslated => ColumnStyle::Additive,
        }
    }

    pub fn is_translated(self) -> bool {
        matches!(
            self,
            ColumnDrawer::Translated
                | ColumnDrawer::TranslucentTranslated
                | ColumnDrawer::FlexTranslated
                | ColumnDrawer::AdditiveTranslated
        )
    }

    /// Compositor-driven styles, whose arithmetic is supplied by the host
    pub fn deferred_style(self) -> Option<DeferredStyle> {
        match self.style() {
            ColumnStyle::Fuzz => Some(DeferredStyle::Fuzz),
            ColumnStyle::Flex => Some(DeferredStyle::Flex),
            ColumnStyle::Additive => Some(DeferredStyle::Additive),
            ColumnStyle::Normal | ColumnStyle::Translucent => None,
        }
    }
}

/// Sprite draw styles, mapped onto column drawers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpriteStyle {
    Normal,
    /// Spectre-style fuzz
    Shadow,
    /// Flex translucency
    Alpha,
    /// Additive flex translucency
    Add,
    /// Static subtractive blend table
    Sub,
    /// Static blend table
    Tranmap,
}

const SPRITE_DRAWERS: [[ColumnDrawer; 2]; 6] = [
    [ColumnDrawer::Opaque, ColumnDrawer::Translated],                 // Normal
    [ColumnDrawer::Fuzz, ColumnDrawer::Fuzz],                         // Shadow
    [ColumnDrawer::Flex, ColumnDrawer::FlexTranslated],               // Alpha
    [ColumnDrawer::Additive, ColumnDrawer::AdditiveTranslated],       // Add
    [ColumnDrawer::Translucent, ColumnDrawer::TranslucentTranslated], // Sub
    [ColumnDrawer::Translucent, ColumnDrawer::TranslucentTranslated], // Tranmap
];

impl SpriteStyle {
    #[inline]
    pub fn drawer(self, translated: bool) -> ColumnDrawer {
        SPRITE_DRAWERS[self as usize][usize::from(translated)]
    }
}

// ============================================================================
// Compositors
// ============================================================================

/// Styles whose per-pixel arithmetic comes from a bound `Compositor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredStyle {
    Fuzz,
    Flex,
    Additive,
}

/// Host-supplied compositing rule, run when buffered pixels reach the frame.
///
/// `frame` still holds the destination as it was before this pixel is written, so
/// rules may read the target and its neighbours (check `viewport().contains` before
/// reading around the edges). `translevel` is the drawing column's opacity.
pub trait Compositor {
    fn composite(&self, frame: &RenderContext, x: i32, y: i32, src: u8, translevel: Fixed) -> u8;
}

impl<F> Compositor for F
where
    F: Fn(&RenderContext, i32, i32, u8, Fixed) -> u8,
{
    fn composite(&self, frame: &RenderContext, x: i32, y: i32, src: u8, translevel: Fixed) -> u8 {
        self(frame, x, y, src, translevel)
    }
}

/// Compositors bound for the current frame
#[derive(Clone, Default)]
pub struct CompositorSet {
    fuzz: Option<Rc<dyn Compositor>>,
    flex: Option<Rc<dyn Compositor>>,
    additive: Option<Rc<dyn Compositor>>,
}

impl CompositorSet {
    pub fn bind(&mut self, style: DeferredStyle, compositor: Rc<dyn Compositor>) {
        *self.slot_mut(style) = Some(compositor);
    }

    pub fn get(&self, style: DeferredStyle) -> Option<Rc<dyn Compositor>> {
        match style {
            DeferredStyle::Fuzz => self.fuzz.clone(),
            DeferredStyle::Flex => self.flex.clone(),
            DeferredStyle::Additive => self.additive.clone(),
        }
    }

    fn slot_mut(&mut self, style: DeferredStyle) -> &mut Option<Rc<dyn Compositor>> {
        match style {
            DeferredStyle::Fuzz => &mut self.fuzz,
            DeferredStyle::Flex => &mut self.flex,
            DeferredStyle::Additive => &mut self.additive,
        }
    }
}

impl fmt::Debug for CompositorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositorSet")
            .field("fuzz", &self.fuzz.is_some())
            .field("flex", &self.flex.is_some())
            .field("additive", &self.additive.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_matrix() {
        assert_eq!(ColumnDrawer::resolve(ColumnStyle::Normal, false), ColumnDrawer::Opaque);
        assert_eq!(ColumnDrawer::resolve(ColumnStyle::Normal, true), ColumnDrawer::Translated);
        assert_eq!(
            ColumnDrawer::resolve(ColumnStyle::Translucent, true),
            ColumnDrawer::TranslucentTranslated
        );
        assert_eq!(ColumnDrawer::resolve(ColumnStyle::Fuzz, true), ColumnDrawer::Fuzz);
        assert_eq!(
            ColumnDrawer::resolve(ColumnStyle::Additive, true),
            ColumnDrawer::AdditiveTranslated
        );
    }

    #[test]
    fn test_resolve_round_trips_style() {
        for style in ColumnStyle::ALL {
            for translated in [false, true] {
                let drawer = ColumnDrawer::resolve(style, translated);
                assert_eq!(drawer.style(), style);
                if style != ColumnStyle::Fuzz {
                    assert_eq!(drawer.is_translated(), translated);
                }
            }
        }
    }

    #[test]
    fn test_sprite_styles() {
        assert_eq!(SpriteStyle::Shadow.drawer(true), ColumnDrawer::Fuzz);
        assert_eq!(SpriteStyle::Alpha.drawer(false), ColumnDrawer::Flex);
        assert_eq!(SpriteStyle::Add.drawer(true), ColumnDrawer::AdditiveTranslated);
        assert_eq!(SpriteStyle::Sub.drawer(false), ColumnDrawer::Translucent);
        assert_eq!(SpriteStyle::Tranmap.drawer(true), ColumnDrawer::TranslucentTranslated);
        assert_eq!(SpriteStyle::Normal.drawer(false), ColumnDrawer::Opaque);
    }

    #[test]
    fn test_deferred_styles() {
        assert_eq!(ColumnDrawer::Opaque.deferred_style(), None);
        assert_eq!(ColumnDrawer::TranslucentTranslated.deferred_style(), None);
        assert_eq!(ColumnDrawer::FlexTranslated.deferred_style(), Some(DeferredStyle::Flex));
        assert_eq!(ColumnDrawer::Fuzz.deferred_style(), Some(DeferredStyle::Fuzz));
    }

    fn halve(_: &RenderContext, _: i32, _: i32, src: u8, _: Fixed) -> u8 {
        src / 2
    }

    #[test]
    fn test_compositor_set_binds_functions() {
        let mut set = CompositorSet::default();
        assert!(set.get(DeferredStyle::Flex).is_none());
        set.bind(DeferredStyle::Flex, Rc::new(halve));
        assert!(set.get(DeferredStyle::Flex).is_some());
        assert!(set.get(DeferredStyle::Additive).is_none());
    }

    #[test]
    fn test_style_serde_names() {
        let json = serde_json::to_string(&ColumnStyle::Additive).unwrap();
        assert_eq!(json, "\"additive\"");
        let style: SpriteStyle = serde_json::from_str("\"tranmap\"").unwrap();
        assert_eq!(style, SpriteStyle::Tranmap);
    }
}

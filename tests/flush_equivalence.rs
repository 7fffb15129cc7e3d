//! Batched output must match drawing every column on its own

use std::rc::Rc;

use quadcol::fixed::{to_fixed, Fixed, FRACUNIT};
use quadcol::style::DeferredStyle;
use quadcol::{
    ColumnDescriptor, ColumnStyle, Compositor, EngineId, FlushStats, RenderConfig, RenderContext,
    RemapTable, TranMap, Viewport, IDENTITY_COLORMAP,
};

const WIDTH: usize = 96;
const HEIGHT: usize = 80;

/// xorshift64, enough to scatter spans and steps deterministically
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn range(&mut self, lo: i32, hi: i32) -> i32 {
        lo + (self.next() % (hi - lo + 1) as u64) as i32
    }
}

/// dest + (src - dest) * translevel
struct FlexBlend;

impl Compositor for FlexBlend {
    fn composite(&self, frame: &RenderContext, x: i32, y: i32, src: u8, translevel: Fixed) -> u8 {
        let dest = i64::from(frame.pixel(x, y));
        let delta = (i64::from(src) - dest) * i64::from(translevel) >> 16;
        (dest + delta) as u8
    }
}

/// dest + src * translevel, saturating
struct AddBlend;

impl Compositor for AddBlend {
    fn composite(&self, frame: &RenderContext, x: i32, y: i32, src: u8, translevel: Fixed) -> u8 {
        let add = (i64::from(src) * i64::from(translevel)) >> 16;
        frame.pixel(x, y).saturating_add(add.min(255) as u8)
    }
}

/// Copies the pixel one row up (or down at the top edge), shifted
struct Smear;

impl Compositor for Smear {
    fn composite(&self, frame: &RenderContext, x: i32, y: i32, _src: u8, _: Fixed) -> u8 {
        let ny = if frame.viewport().contains(x, y - 1) { y - 1 } else { y + 1 };
        frame.pixel(x, ny).wrapping_add(3)
    }
}

struct Scene {
    textures: Vec<Vec<u8>>,
    colormap: RemapTable,
    translation: RemapTable,
    tranmaps: [Rc<TranMap>; 2],
}

impl Scene {
    fn new() -> Self {
        let mut colormap = IDENTITY_COLORMAP;
        let mut translation = IDENTITY_COLORMAP;
        for i in 0..256 {
            colormap[i] = (i as u8).wrapping_mul(7).wrapping_add(1);
            translation[i] = 255 - i as u8;
        }
        Self {
            textures: vec![
                (0..64).map(|i| (i * 4) as u8).collect(),
                (0..35).map(|i| (i * 7 + 3) as u8).collect(),
                (0..100).map(|i| i as u8).collect(),
                (0..128).map(|i| (i ^ 0x5A) as u8).collect(),
            ],
            colormap,
            translation,
            tranmaps: [
                Rc::new(TranMap::from_fn(|d, s| ((u16::from(d) + u16::from(s)) / 2) as u8)),
                Rc::new(TranMap::from_fn(|d, s| d ^ s)),
            ],
        }
    }
}

#[derive(Clone, Copy)]
struct Draw {
    x: i32,
    y1: i32,
    y2: i32,
    texture: usize,
    step: Fixed,
    texmid: Fixed,
    style: ColumnStyle,
    translated: bool,
    translevel: Fixed,
    tranmap: usize,
}

fn background() -> Vec<u8> {
    (0..WIDTH * HEIGHT).map(|i| (i * 31 % 251) as u8).collect()
}

fn render(engine: EngineId, scene: &Scene, draws: &[Draw]) -> (Vec<u8>, Option<FlushStats>) {
    let config = RenderConfig {
        screen_width: WIDTH,
        screen_height: HEIGHT,
        viewport: Some(Viewport::new(4, 2, 88, 72)),
        center_y: Some(36.0),
        engine,
    };
    let mut pixels = background();
    let mut renderer = config.renderer();
    let stats;
    {
        let mut ctx = config
            .bind(&mut pixels)
            .unwrap()
            .with_compositor(DeferredStyle::Flex, Rc::new(FlexBlend))
            .with_compositor(DeferredStyle::Additive, Rc::new(AddBlend))
            .with_compositor(DeferredStyle::Fuzz, Rc::new(Smear));
        ctx.set_center_y(36.0);
        renderer.setup_frame(&mut ctx);
        for d in draws {
            let column = ColumnDescriptor::new(d.x, d.y1, d.y2, &scene.textures[d.texture], &scene.colormap)
                .with_step(d.step)
                .with_texmid(d.texmid)
                .with_translation(&scene.translation)
                .with_translevel(d.translevel)
                .with_tranmap(&scene.tranmaps[d.tranmap]);
            renderer.draw(&mut ctx, &column, d.style, d.translated);
        }
        renderer.end_column_stream(&mut ctx);
        stats = renderer.stats();
    }
    (pixels, stats)
}

fn quad_run(x: i32, style: ColumnStyle, spans: [(i32, i32); 4]) -> Vec<Draw> {
    spans
        .iter()
        .enumerate()
        .map(|(i, &(y1, y2))| Draw {
            x: x + i as i32,
            y1,
            y2,
            texture: i % 4,
            step: FRACUNIT + i as Fixed * 4000,
            texmid: to_fixed(3),
            style,
            translated: i % 2 == 1,
            translevel: FRACUNIT / 3,
            tranmap: 0,
        })
        .collect()
}

fn assert_equivalent(scene: &Scene, draws: &[Draw]) -> FlushStats {
    let (quad, stats) = render(EngineId::Quad, scene, draws);
    let (reference, _) = render(EngineId::Reference, scene, draws);
    for (i, (q, r)) in quad.iter().zip(reference.iter()).enumerate() {
        assert_eq!(q, r, "pixel {} (x={}, y={}) differs", i, i % WIDTH, i / WIDTH);
    }
    stats.unwrap()
}

#[test]
fn test_overlapping_quad_splits_and_matches() {
    let scene = Scene::new();
    for style in [ColumnStyle::Normal, ColumnStyle::Translucent, ColumnStyle::Flex, ColumnStyle::Additive] {
        let draws = quad_run(8, style, [(5, 60), (10, 70), (0, 40), (20, 55)]);
        let stats = assert_equivalent(&scene, &draws);
        assert_eq!(stats.split, 1, "{:?}", style);
        assert_eq!(stats.whole, 0, "{:?}", style);
    }
}

#[test]
fn test_disjoint_quad_flushes_whole_and_matches() {
    let scene = Scene::new();
    for style in [ColumnStyle::Normal, ColumnStyle::Translucent] {
        let draws = quad_run(20, style, [(0, 10), (5, 30), (40, 71), (11, 12)]);
        let stats = assert_equivalent(&scene, &draws);
        assert_eq!(stats.split, 0);
        assert_eq!(stats.whole, 1);
    }
}

#[test]
fn test_single_shared_row_splits() {
    let scene = Scene::new();
    let draws = quad_run(0, ColumnStyle::Normal, [(0, 30), (30, 60), (10, 30), (30, 31)]);
    let stats = assert_equivalent(&scene, &draws);
    assert_eq!(stats.split, 1);
}

#[test]
fn test_fuzz_batches_flush_whole_and_match() {
    let scene = Scene::new();
    let draws = quad_run(30, ColumnStyle::Fuzz, [(1, 50), (3, 50), (2, 48), (1, 60)]);
    let stats = assert_equivalent(&scene, &draws);
    assert_eq!(stats.split, 0);
    assert_eq!(stats.whole, 1);
}

#[test]
fn test_random_column_streams_match() {
    let scene = Scene::new();
    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
    let styles = ColumnStyle::ALL;

    for _ in 0..40 {
        let mut draws = Vec::new();
        let mut x = rng.range(0, 8);
        while x < 88 {
            let y1 = rng.range(0, 60);
            let y2 = rng.range(y1 - 3, 71);
            let texture = rng.range(0, 3) as usize;
            let texheight = scene.textures[texture].len() as i32;
            draws.push(Draw {
                x,
                y1,
                y2,
                texture,
                step: rng.range(FRACUNIT / 4, (texheight << 16) - 1),
                texmid: rng.range(-to_fixed(200), to_fixed(200)),
                style: styles[rng.range(0, 4) as usize],
                translated: rng.range(0, 1) == 1,
                translevel: rng.range(0, FRACUNIT),
                tranmap: rng.range(0, 1) as usize,
            });
            // Mostly adjacent, sometimes a gap or a repeat
            x += match rng.range(0, 9) {
                0 => 0,
                1 => 3,
                _ => 1,
            };
        }
        assert_equivalent(&scene, &draws);
    }
}

//! Palettized maze walk
//!
//! Auto-walks a procedurally generated maze. Wall slices go through the renderer
//! as opaque columns (some of them translated), and a row of hovering orbs cycles
//! through every sprite draw style so each compositing path shows up on screen.

use std::cell::Cell;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_3, PI, TAU};
use std::rc::Rc;

use quadcol::fixed::{fixed_from_f32, fixed_mul, fixed_to_int, to_fixed, Fixed, FRACUNIT};
use quadcol::style::DeferredStyle;
use quadcol::{
    ColumnDescriptor, ColumnStyle, Compositor, FrameBuffer, Palette, RemapTable, RenderConfig,
    RenderContext, Renderer, Result, SpriteStyle, TranMap, IDENTITY_COLORMAP,
};

const MAP_SIZE: usize = 16;
const TEX_SIZE: usize = 64;
/// Orb sprites are deliberately not a power of two tall
const ORB_SIZE: usize = 48;
const LIGHT_LEVELS: usize = 32;

/// The palette is four bands of 64 shades, darkest first
const SHADES: usize = 64;
const BAND_BRICK: usize = 0;
const BAND_STONE: usize = 1;
const BAND_SKY: usize = 2;
const BAND_GLOW: usize = 3;
const BAND_COLORS: [(f32, f32, f32); 4] = [
    (255.0, 170.0, 120.0),
    (200.0, 205.0, 215.0),
    (90.0, 130.0, 255.0),
    (130.0, 255.0, 170.0),
];

const FUZZ_OFFSETS: [i32; 16] = [1, -1, 1, -1, 1, 1, -1, 1, 1, -1, 1, 1, 1, -1, 1, -1];

#[inline]
fn shade(band: usize, level: usize) -> u8 {
    (band * SHADES + level.min(SHADES - 1)) as u8
}

/// Simple deterministic RNG using xorshift64
struct Rng {
    state: u64,
}

impl Rng {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform in [0, 1)
    fn next_f32(&mut self) -> f32 {
        (self.next_u64() & 0xFFFFFF) as f32 / 0x1000000 as f32
    }
}

// ============================================================================
// Compositors
// ============================================================================

/// Darkened copy of the pixel just above or below, walking a fixed offset table
struct FuzzShadow {
    dark: RemapTable,
    pos: Cell<usize>,
}

impl Compositor for FuzzShadow {
    fn composite(&self, frame: &RenderContext, x: i32, y: i32, _src: u8, _: Fixed) -> u8 {
        let pos = self.pos.get();
        self.pos.set((pos + 1) % FUZZ_OFFSETS.len());
        let sy = y + FUZZ_OFFSETS[pos];
        let sy = if frame.viewport().contains(x, sy) { sy } else { y };
        self.dark[frame.pixel(x, sy) as usize]
    }
}

#[derive(Clone, Copy)]
enum BlendOp {
    /// dest + (src - dest) * translevel
    Flex,
    /// dest + src * translevel, clamped
    Additive,
}

/// Blends in RGB and maps the result back to the nearest palette entry
struct PaletteBlend {
    palette: Rc<Palette>,
    op: BlendOp,
}

impl PaletteBlend {
    fn channel(&self, dest: u8, src: u8, translevel: Fixed) -> u8 {
        let (d, s) = (i32::from(dest), i32::from(src));
        let v = match self.op {
            BlendOp::Flex => d + fixed_to_int(fixed_mul(to_fixed(s - d), translevel)),
            BlendOp::Additive => d + fixed_to_int(fixed_mul(to_fixed(s), translevel)),
        };
        v.clamp(0, 255) as u8
    }
}

impl Compositor for PaletteBlend {
    fn composite(&self, frame: &RenderContext, x: i32, y: i32, src: u8, translevel: Fixed) -> u8 {
        let (dr, dg, db) = self.palette.get(frame.pixel(x, y));
        let (sr, sg, sb) = self.palette.get(src);
        self.palette.nearest(
            self.channel(dr, sr, translevel),
            self.channel(dg, sg, translevel),
            self.channel(db, sb, translevel),
        )
    }
}

// ============================================================================
// Assets
// ============================================================================

fn build_palette() -> Result<Palette> {
    let mut bytes = Vec::with_capacity(256 * 3);
    for &(r, g, b) in &BAND_COLORS {
        for level in 0..SHADES {
            let k = (level + 1) as f32 / SHADES as f32;
            bytes.extend_from_slice(&[(r * k) as u8, (g * k) as u8, (b * k) as u8]);
        }
    }
    Palette::from_rgb_bytes(&bytes)
}

/// One colormap per light level; level 0 is full bright
fn build_colormaps() -> Vec<RemapTable> {
    (0..LIGHT_LEVELS)
        .map(|light| {
            let mut map = IDENTITY_COLORMAP;
            for (i, entry) in map.iter_mut().enumerate() {
                let level = i % SHADES * (LIGHT_LEVELS - light) / LIGHT_LEVELS;
                *entry = shade(i / SHADES, level);
            }
            map
        })
        .collect()
}

/// Brick to stone, glow to sky
fn build_translation() -> RemapTable {
    let mut map = IDENTITY_COLORMAP;
    for level in 0..SHADES {
        map[shade(BAND_BRICK, level) as usize] = shade(BAND_STONE, level);
        map[shade(BAND_GLOW, level) as usize] = shade(BAND_SKY, level);
    }
    map
}

/// 50/50 mix of every destination and source pair
fn build_tranmap(palette: &Palette) -> TranMap {
    TranMap::from_fn(|dest, src| {
        let (dr, dg, db) = palette.get(dest);
        let (sr, sg, sb) = palette.get(src);
        let mix = |a: u8, b: u8| ((u16::from(a) + u16::from(b)) / 2) as u8;
        palette.nearest(mix(dr, sr), mix(dg, sg), mix(db, sb))
    })
}

/// Procedural brick wall texture, stored column-major
fn build_brick_texture() -> Vec<u8> {
    let brick_w = 16;
    let brick_h = 8;
    let mut tex = vec![0u8; TEX_SIZE * TEX_SIZE];

    for x in 0..TEX_SIZE {
        for y in 0..TEX_SIZE {
            let row = y / brick_h;
            let offset = if row % 2 == 0 { 0 } else { brick_w / 2 };
            let bx = (x + offset) % brick_w;
            let by = y % brick_h;

            tex[x * TEX_SIZE + y] = if bx < 1 || by < 1 {
                shade(BAND_STONE, 12)
            } else {
                let brick_id = (row * 13 + ((x + offset) / brick_w) * 29) & 0xFF;
                shade(BAND_BRICK, 36 + (brick_id & 0x1B))
            };
        }
    }
    tex
}

/// Shaded sphere, column-major, plus the texel rows each column covers
fn build_orb_texture() -> (Vec<u8>, Vec<(i32, i32)>) {
    let r = ORB_SIZE as f32 / 2.0;
    let mut tex = vec![0u8; ORB_SIZE * ORB_SIZE];
    let mut spans = vec![(1, 0); ORB_SIZE];

    for (u, span) in spans.iter_mut().enumerate() {
        let dx = u as f32 + 0.5 - r;
        for v in 0..ORB_SIZE {
            let dy = v as f32 + 0.5 - r;
            let d = (dx * dx + dy * dy).sqrt() / r;
            if d >= 1.0 {
                continue;
            }
            // Highlight up and to the left
            let lx = dx / r + 0.35;
            let ly = dy / r + 0.35;
            let lit = 1.0 - (lx * lx + ly * ly).sqrt().min(1.0) * 0.8;
            tex[u * ORB_SIZE + v] = shade(BAND_GLOW, (lit * (SHADES - 1) as f32) as usize);
            if span.0 > span.1 {
                *span = (v as i32, v as i32);
            } else {
                span.1 = v as i32;
            }
        }
    }
    (tex, spans)
}

// ============================================================================
// Maze
// ============================================================================

/// Find an open cell that's in a corridor (has open neighbors)
fn find_open_cell(map: &[u8]) -> (usize, usize) {
    let mut best = (1, 1);
    let mut best_score = 0;

    for y in 1..MAP_SIZE - 1 {
        for x in 1..MAP_SIZE - 1 {
            if map[y * MAP_SIZE + x] != 0 {
                continue;
            }
            let score = [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)]
                .iter()
                .filter(|&&(nx, ny)| map[ny * MAP_SIZE + nx] == 0)
                .count();
            if score > best_score {
                best_score = score;
                best = (x, y);
            }
        }
    }
    best
}

/// Direction with the longest straight run of open cells
fn find_open_direction(map: &[u8], cx: usize, cy: usize) -> f32 {
    let dirs: [(i32, i32, f32); 4] = [(1, 0, 0.0), (0, 1, FRAC_PI_2), (-1, 0, PI), (0, -1, -FRAC_PI_2)];

    let mut best_angle = 0.0_f32;
    let mut best_dist = 0;

    for &(dx, dy, angle) in &dirs {
        let mut dist = 0;
        let (mut x, mut y) = (cx as i32, cy as i32);
        loop {
            x += dx;
            y += dy;
            if x < 0 || y < 0 || x >= MAP_SIZE as i32 || y >= MAP_SIZE as i32 {
                break;
            }
            if map[y as usize * MAP_SIZE + x as usize] != 0 {
                break;
            }
            dist += 1;
        }
        if dist > best_dist {
            best_dist = dist;
            best_angle = angle;
        }
    }
    best_angle
}

/// Recursive backtracker with an explicit stack. Some walls are tagged 2 and
/// drawn through the translation table.
fn generate_maze(rng: &mut Rng) -> Vec<u8> {
    let mut grid = vec![1u8; MAP_SIZE * MAP_SIZE];

    let cells = (MAP_SIZE - 1) / 2;
    let mut visited = vec![false; cells * cells];
    visited[0] = true;
    grid[MAP_SIZE + 1] = 0;

    let mut stack: Vec<(usize, usize)> = vec![(0, 0)];

    while let Some(&(cx, cy)) = stack.last() {
        let mut neighbors = Vec::new();
        if cx > 0 && !visited[cy * cells + (cx - 1)] {
            neighbors.push((cx - 1, cy));
        }
        if cx + 1 < cells && !visited[cy * cells + (cx + 1)] {
            neighbors.push((cx + 1, cy));
        }
        if cy > 0 && !visited[(cy - 1) * cells + cx] {
            neighbors.push((cx, cy - 1));
        }
        if cy + 1 < cells && !visited[(cy + 1) * cells + cx] {
            neighbors.push((cx, cy + 1));
        }

        if neighbors.is_empty() {
            stack.pop();
            continue;
        }

        let (nx, ny) = neighbors[rng.next_u64() as usize % neighbors.len()];
        grid[(cy + ny + 1) * MAP_SIZE + (cx + nx + 1)] = 0;
        grid[(ny * 2 + 1) * MAP_SIZE + (nx * 2 + 1)] = 0;

        visited[ny * cells + nx] = true;
        stack.push((nx, ny));
    }

    for (i, cell) in grid.iter_mut().enumerate() {
        if *cell == 1 && (i * 7 + i / MAP_SIZE * 3) % 5 == 0 {
            *cell = 2;
        }
    }
    grid
}

/// First wall along a ray
struct Hit {
    dist: f32,
    side: usize,
    cell: u8,
    /// Fractional position along the wall face
    wall_x: f32,
}

/// One sprite placement for the current frame, in view pixels
struct Orb {
    x: f32,
    y: f32,
    size: f32,
    style: SpriteStyle,
    translated: bool,
    translevel: Fixed,
}

pub struct MazeWalk {
    time: f32,
    paused: bool,
    map: Vec<u8>,
    player_x: f32,
    player_y: f32,
    player_angle: f32,
    target_angle: f32,
    /// Locks turn direction until the current turn completes
    turning: bool,
    move_speed: f32,
    rng: Rng,

    palette: Rc<Palette>,
    colormaps: Vec<RemapTable>,
    translation: RemapTable,
    tranmap: Rc<TranMap>,
    brick: Vec<u8>,
    orb: Vec<u8>,
    orb_spans: Vec<(i32, i32)>,
    fuzz: Rc<dyn Compositor>,
    flex: Rc<dyn Compositor>,
    additive: Rc<dyn Compositor>,
}

impl MazeWalk {
    pub fn new() -> Result<Self> {
        let mut rng = Rng::new(1337);
        let map = generate_maze(&mut rng);
        let (sx, sy) = find_open_cell(&map);
        let start_angle = find_open_direction(&map, sx, sy);

        let palette = Rc::new(build_palette()?);
        let colormaps = build_colormaps();
        let tranmap = Rc::new(build_tranmap(&palette));
        let (orb, orb_spans) = build_orb_texture();

        let fuzz: Rc<dyn Compositor> = Rc::new(FuzzShadow {
            dark: colormaps[LIGHT_LEVELS * 3 / 4],
            pos: Cell::new(0),
        });
        let flex: Rc<dyn Compositor> = Rc::new(PaletteBlend {
            palette: Rc::clone(&palette),
            op: BlendOp::Flex,
        });
        let additive: Rc<dyn Compositor> = Rc::new(PaletteBlend {
            palette: Rc::clone(&palette),
            op: BlendOp::Additive,
        });

        Ok(Self {
            time: 0.0,
            paused: false,
            map,
            player_x: sx as f32 + 0.5,
            player_y: sy as f32 + 0.5,
            player_angle: start_angle,
            target_angle: start_angle,
            turning: false,
            move_speed: 1.5,
            rng,
            palette,
            colormaps,
            translation: build_translation(),
            tranmap,
            brick: build_brick_texture(),
            orb,
            orb_spans,
            fuzz,
            flex,
            additive,
        })
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    fn cell(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= MAP_SIZE as i32 || y >= MAP_SIZE as i32 {
            return 1;
        }
        self.map[y as usize * MAP_SIZE + x as usize]
    }

    fn is_wall(&self, x: i32, y: i32) -> bool {
        self.cell(x, y) != 0
    }

    /// Grid DDA from the player along `angle`
    fn cast(&self, angle: f32) -> Option<Hit> {
        let ray_cos = angle.cos();
        let ray_sin = angle.sin();

        let mut map_x = self.player_x as i32;
        let mut map_y = self.player_y as i32;

        let delta_dist_x = if ray_cos == 0.0 { f32::MAX } else { (1.0 / ray_cos).abs() };
        let delta_dist_y = if ray_sin == 0.0 { f32::MAX } else { (1.0 / ray_sin).abs() };

        let (step_x, mut side_dist_x) = if ray_cos < 0.0 {
            (-1, (self.player_x - map_x as f32) * delta_dist_x)
        } else {
            (1, (map_x as f32 + 1.0 - self.player_x) * delta_dist_x)
        };
        let (step_y, mut side_dist_y) = if ray_sin < 0.0 {
            (-1, (self.player_y - map_y as f32) * delta_dist_y)
        } else {
            (1, (map_y as f32 + 1.0 - self.player_y) * delta_dist_y)
        };

        for _ in 0..64 {
            let side = if side_dist_x < side_dist_y {
                side_dist_x += delta_dist_x;
                map_x += step_x;
                0
            } else {
                side_dist_y += delta_dist_y;
                map_y += step_y;
                1
            };

            let cell = self.cell(map_x, map_y);
            if cell != 0 {
                let dist = if side == 0 {
                    (map_x as f32 - self.player_x + (1 - step_x) as f32 * 0.5) / ray_cos
                } else {
                    (map_y as f32 - self.player_y + (1 - step_y) as f32 * 0.5) / ray_sin
                };
                let wall_x = if side == 0 {
                    self.player_y + dist * ray_sin
                } else {
                    self.player_x + dist * ray_cos
                };
                return Some(Hit {
                    dist,
                    side,
                    cell,
                    wall_x: wall_x - wall_x.floor(),
                });
            }
        }
        None
    }

    fn distance(&self, angle: f32) -> f32 {
        self.cast(angle).map_or(f32::MAX, |hit| hit.dist)
    }

    pub fn update(&mut self, dt: f32) {
        if self.paused {
            return;
        }
        self.time += dt;

        let mut angle_diff = wrap_angle(self.target_angle - self.player_angle);
        if angle_diff.abs() < 0.05 {
            self.player_angle = self.target_angle;
            self.turning = false;
        }

        // Only evaluate new navigation decisions when not mid-turn
        if !self.turning {
            let fwd_dist = self.distance(self.player_angle);
            let left_dist = self.distance(self.player_angle - FRAC_PI_2);
            let right_dist = self.distance(self.player_angle + FRAC_PI_2);

            if fwd_dist < 1.8 {
                self.target_angle = if left_dist > right_dist {
                    self.player_angle - FRAC_PI_2
                } else if right_dist > left_dist {
                    self.player_angle + FRAC_PI_2
                } else {
                    self.player_angle + PI
                };
                self.turning = true;
            } else if fwd_dist > 3.0 && self.rng.next_f32() < 0.005 {
                if left_dist > 2.5 && self.rng.next_f32() < 0.5 {
                    self.target_angle = self.player_angle - FRAC_PI_2;
                    self.turning = true;
                } else if right_dist > 2.5 {
                    self.target_angle = self.player_angle + FRAC_PI_2;
                    self.turning = true;
                }
            }
        }

        angle_diff = wrap_angle(self.target_angle - self.player_angle);
        let turn_speed = 3.0 * dt;
        if angle_diff.abs() < turn_speed {
            self.player_angle = self.target_angle;
        } else {
            self.player_angle += turn_speed * angle_diff.signum();
        }

        // Slow down during turns, stop short of walls
        if self.distance(self.player_angle) > 0.4 {
            let (sin_a, cos_a) = self.player_angle.sin_cos();
            let speed = if self.turning { 0.4 } else { 1.0 };
            let step = self.move_speed * speed * dt;
            let new_x = self.player_x + cos_a * step;
            let new_y = self.player_y + sin_a * step;

            let margin = 0.25;
            if !self.is_wall((new_x + margin * cos_a.signum()) as i32, self.player_y as i32) {
                self.player_x = new_x;
            }
            if !self.is_wall(self.player_x as i32, (new_y + margin * sin_a.signum()) as i32) {
                self.player_y = new_y;
            }
        }
    }

    /// Draw the frame: backdrop, wall columns, then the orb sprites on top
    pub fn render(
        &self,
        config: &RenderConfig,
        frame: &mut FrameBuffer,
        renderer: &mut Renderer,
    ) -> Result<()> {
        let mut ctx = config.bind(frame.as_bytes_mut())?;
        ctx.bind_compositor(DeferredStyle::Fuzz, Rc::clone(&self.fuzz));
        ctx.bind_compositor(DeferredStyle::Flex, Rc::clone(&self.flex));
        ctx.bind_compositor(DeferredStyle::Additive, Rc::clone(&self.additive));

        self.draw_backdrop(&mut ctx);
        renderer.setup_frame(&mut ctx);
        self.draw_walls(&mut ctx, renderer);
        for orb in self.orbs(&ctx) {
            self.draw_orb(&mut ctx, renderer, &orb);
        }
        renderer.end_column_stream(&mut ctx);
        Ok(())
    }

    fn draw_backdrop(&self, ctx: &mut RenderContext) {
        let view = ctx.viewport();
        let horizon = ctx.center_y();
        for y in 0..view.height {
            let t = ((y as f32 - horizon).abs() / horizon.max(1.0)).min(1.0);
            let value = if (y as f32) < horizon {
                shade(BAND_SKY, 4 + (16.0 * (1.0 - t)) as usize)
            } else {
                shade(BAND_STONE, 2 + (14.0 * t) as usize)
            };
            for x in 0..view.width {
                ctx.put(x, y, value);
            }
        }
    }

    fn draw_walls(&self, ctx: &mut RenderContext, renderer: &mut Renderer) {
        let view = ctx.viewport();
        let center = ctx.center_y();
        let h = view.height as f32;

        for col in 0..view.width {
            let ray_offset = (col as f32 / view.width as f32 - 0.5) * FRAC_PI_3;
            let Some(hit) = self.cast(self.player_angle + ray_offset) else {
                continue;
            };
            // Perpendicular distance (avoids fisheye)
            let perp = hit.dist * ray_offset.cos();
            let wall_h = if perp > 0.001 { (h / perp).min(h * 4.0) } else { h * 4.0 };

            let top = center - wall_h / 2.0;
            let y1 = (top.ceil() as i32).max(0);
            let y2 = ((top + wall_h).ceil() as i32 - 1).min(view.height - 1);

            // Texel rows per pixel, and the offset that puts row 0 at the wall top
            let step = fixed_from_f32(TEX_SIZE as f32 / wall_h);
            let texmid = fixed_from_f32((center - 1.0 - top) * TEX_SIZE as f32 / wall_h);

            let fog = (perp / 10.0).min(1.0) * (LIGHT_LEVELS - 1) as f32;
            let light = (fog as usize + hit.side * 4).min(LIGHT_LEVELS - 1);

            let u = ((hit.wall_x * TEX_SIZE as f32) as usize).min(TEX_SIZE - 1);
            let texels = &self.brick[u * TEX_SIZE..(u + 1) * TEX_SIZE];
            let column = ColumnDescriptor::new(col, y1, y2, texels, &self.colormaps[light])
                .with_step(step)
                .with_texmid(texmid)
                .with_translation(&self.translation);
            renderer.draw(ctx, &column, ColumnStyle::Normal, hit.cell == 2);
        }
    }

    /// One orb per sprite style, bobbing across the view
    fn orbs(&self, ctx: &RenderContext) -> Vec<Orb> {
        let view = ctx.viewport();
        let (w, h) = (view.width as f32, view.height as f32);
        let styles = [
            (SpriteStyle::Shadow, false),
            (SpriteStyle::Alpha, false),
            (SpriteStyle::Add, false),
            (SpriteStyle::Tranmap, false),
            (SpriteStyle::Normal, true),
        ];

        styles
            .iter()
            .enumerate()
            .map(|(i, &(style, translated))| {
                let phase = self.time * 1.3 + i as f32;
                Orb {
                    x: w * (i as f32 + 0.5) / styles.len() as f32 + (self.time * 0.7 + i as f32).sin() * w * 0.03,
                    y: ctx.center_y() + phase.sin() * h * 0.15,
                    size: (h * 0.22 * (1.0 + 0.15 * (phase * 0.5).cos())).max(8.0),
                    style,
                    translated,
                    translevel: fixed_from_f32(0.5 + 0.4 * (self.time * 0.9 + i as f32).sin()),
                }
            })
            .collect()
    }

    fn draw_orb(&self, ctx: &mut RenderContext, renderer: &mut Renderer, orb: &Orb) {
        let view = ctx.viewport();
        let center = ctx.center_y();
        let left = orb.x - orb.size / 2.0;
        let top = orb.y - orb.size / 2.0;
        let scale = orb.size / ORB_SIZE as f32;

        let step = fixed_from_f32(1.0 / scale);
        let texmid = fixed_from_f32((center - 1.0 - top) / scale);
        debug_assert!(step < (ORB_SIZE as Fixed) * FRACUNIT);

        let x0 = (left.ceil() as i32).max(0);
        let x1 = ((left + orb.size).ceil() as i32).min(view.width);
        for x in x0..x1 {
            let u = (((x as f32 - left) / scale) as usize).min(ORB_SIZE - 1);
            let (t0, t1) = self.orb_spans[u];
            if t0 > t1 {
                continue;
            }
            let y1 = ((top + t0 as f32 * scale).ceil() as i32).max(0);
            let y2 = ((top + (t1 + 1) as f32 * scale).ceil() as i32 - 1).min(view.height - 1);

            let texels = &self.orb[u * ORB_SIZE..(u + 1) * ORB_SIZE];
            let column = ColumnDescriptor::new(x, y1, y2, texels, &self.colormaps[0])
                .with_step(step)
                .with_texmid(texmid)
                .with_translation(&self.translation)
                .with_translevel(orb.translevel)
                .with_tranmap(&self.tranmap);
            renderer.draw_sprite(ctx, &column, orb.style, orb.translated);
        }
    }
}

fn wrap_angle(mut a: f32) -> f32 {
    while a > PI {
        a -= TAU;
    }
    while a < -PI {
        a += TAU;
    }
    a
}

//! quadcol viewer: a palettized maze drawn one column at a time

mod demo;
mod display;

use std::time::Instant;

use log::{error, info, warn};
use quadcol::{EngineId, FrameBuffer, RenderConfig};
use sdl2::keyboard::Keycode;

use demo::MazeWalk;
use display::{Display, InputEvent, RenderTarget, DEFAULT_SCALE};

const CONFIG_PATH: &str = "quadcol.json";
/// Seconds between frame rate and batching reports
const REPORT_INTERVAL: f32 = 2.0;

struct Options {
    scale: u32,
    vsync: bool,
    config_path: String,
}

/// Parse command line arguments
fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        scale: DEFAULT_SCALE,
        vsync: true,
        config_path: CONFIG_PATH.to_string(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--no-vsync" => options.vsync = false,
            "--scale" | "-s" => {
                if i + 1 < args.len() {
                    if let Ok(s) = args[i + 1].parse::<u32>() {
                        options.scale = s.max(1);
                    }
                    i += 1;
                }
            },
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    options.config_path = args[i + 1].clone();
                    i += 1;
                }
            },
            "--help" => {
                println!("Usage: quadcol [OPTIONS]");
                println!();
                println!("Options:");
                println!(
                    "  --scale N, -s N       Window pixels per frame pixel (default: {})",
                    DEFAULT_SCALE
                );
                println!(
                    "  --config PATH, -c PATH  Render config file (default: {})",
                    CONFIG_PATH
                );
                println!("  --no-vsync            Disable VSync for uncapped framerate");
                println!("  --help                Show this help message");
                println!();
                println!("Keys: E switch engine, Space pause, S save config, L load config, Escape quit");
                std::process::exit(0);
            },
            _ => {},
        }
        i += 1;
    }

    options
}

/// Frame timing with a periodic report window
struct FrameClock {
    last_frame: Instant,
    window_start: Instant,
    window_frames: u32,
}

impl FrameClock {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            window_start: now,
            window_frames: 0,
        }
    }

    /// Seconds since the previous tick
    fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.window_frames += 1;
        dt
    }

    /// Average frame rate once the report window has elapsed
    fn report(&mut self) -> Option<f32> {
        let elapsed = self.window_start.elapsed().as_secs_f32();
        if elapsed < REPORT_INTERVAL {
            return None;
        }
        let fps = self.window_frames as f32 / elapsed;
        self.window_start = Instant::now();
        self.window_frames = 0;
        Some(fps)
    }
}

fn next_engine(engine: EngineId) -> EngineId {
    let i = EngineId::ALL.iter().position(|&e| e == engine).unwrap_or(0);
    EngineId::ALL[(i + 1) % EngineId::ALL.len()]
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let options = parse_args();

    let mut config = RenderConfig::load(&options.config_path).unwrap_or_else(|e| {
        info!("{}: {}; using defaults", options.config_path, e);
        RenderConfig::default()
    });
    let (width, height) = (config.screen_width as u32, config.screen_height as u32);

    let (mut display, texture_creator) = Display::with_options(
        "quadcol",
        width * options.scale,
        height * options.scale,
        options.vsync,
    )?;
    let mut target = RenderTarget::with_size(&texture_creator, width, height)?;
    let mut frame = FrameBuffer::with_size(config.screen_width, config.screen_height);
    let mut renderer = config.renderer();
    let mut demo = MazeWalk::new().map_err(|e| e.to_string())?;
    let mut clock = FrameClock::new();

    info!(
        "{}x{} frame, {}x window, engine {:?}",
        width, height, options.scale, config.engine
    );

    'main: loop {
        let dt = clock.tick();

        for event in display.poll_events() {
            match event {
                InputEvent::Quit | InputEvent::KeyDown(Keycode::Escape) => break 'main,
                InputEvent::KeyDown(Keycode::E) => {
                    config.engine = next_engine(config.engine);
                    renderer = config.renderer();
                    info!("engine: {:?}", config.engine);
                },
                InputEvent::KeyDown(Keycode::Space) => demo.toggle_pause(),
                InputEvent::KeyDown(Keycode::S) => match config.save(&options.config_path) {
                    Ok(()) => info!("config saved to {}", options.config_path),
                    Err(e) => error!("failed to save {}: {}", options.config_path, e),
                },
                InputEvent::KeyDown(Keycode::L) => match RenderConfig::load(&options.config_path) {
                    // The window and texture are sized once; keep the screen size
                    Ok(loaded)
                        if (loaded.screen_width, loaded.screen_height)
                            != (config.screen_width, config.screen_height) =>
                    {
                        warn!(
                            "{} wants a {}x{} screen; restart to resize",
                            options.config_path, loaded.screen_width, loaded.screen_height
                        );
                    },
                    Ok(loaded) => {
                        config = loaded;
                        renderer = config.renderer();
                        info!("config loaded from {}", options.config_path);
                    },
                    Err(e) => error!("failed to load {}: {}", options.config_path, e),
                },
                InputEvent::KeyDown(_) => {},
            }
        }

        demo.update(dt);
        if let Err(e) = demo.render(&config, &mut frame, &mut renderer) {
            error!("render failed: {}", e);
            break 'main;
        }
        display.present(&mut target, &frame, demo.palette())?;

        if let Some(fps) = clock.report() {
            match renderer.stats() {
                Some(stats) => info!(
                    "{:.1} fps, {} columns, {} quad flushes, {} whole flushes",
                    fps, stats.columns, stats.split, stats.whole
                ),
                None => info!("{:.1} fps ({:?})", fps, config.engine),
            }
        }
    }

    Ok(())
}

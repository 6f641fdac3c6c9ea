use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use image::{Rgba, RgbaImage};
use log::{error, info};
use serde_json::json;
use simplelog::{Config, LevelFilter, WriteLogger};

use pageturn::engine::{ReaderEngine, Snapshot};
use pageturn::progress::{JsonProgressStore, MemoryProgressStore, ReadingProgressStore};
use pageturn::settings::{Settings, preferred_config_path};
use pageturn::viewer::{Notification, Point, RasterizeError, Rasterizer, Rect, Size};

#[derive(Parser)]
#[command(name = "pageturn", about = "Headless page viewer driven by a command script")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Number of pages in the synthetic document
    #[arg(long, default_value_t = 12)]
    pages: usize,

    /// Page size in content units, WIDTHxHEIGHT
    #[arg(long, default_value = "600x800", value_parser = parse_size)]
    page_size: Size,

    /// Display surface, WIDTHxHEIGHT
    #[arg(long, default_value = "1080x1920", value_parser = parse_size)]
    viewport: Size,

    /// Key for saved reading progress
    #[arg(long, default_value = "synthetic")]
    document: String,

    /// JSON file for reading progress; progress is not kept without it
    #[arg(long)]
    progress_file: Option<PathBuf>,

    /// Settings file (defaults to the per-user config location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final composed page as PNG
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = "pageturn.log")]
    log_file: PathBuf,

    /// Steps: next, prev, jump:N, half, spread, rotate, night, controls,
    /// tap:X,Y, drag:DX,DY, pinch:FACTOR, doubletap, viewport:WxH
    steps: Vec<Step>,
}

#[derive(Clone, Debug)]
enum Step {
    Next,
    Prev,
    Jump(usize),
    Half,
    Spread,
    Rotate,
    Night,
    Controls,
    Tap(Point),
    Drag(f32, f32),
    Pinch(f32),
    DoubleTap,
    Viewport(Size),
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        let pair = |arg: Option<&str>| -> Result<(f32, f32), String> {
            let (a, b) = arg
                .and_then(|arg| arg.split_once(','))
                .ok_or_else(|| format!("{name} needs two comma separated numbers"))?;
            Ok((parse_number(a)?, parse_number(b)?))
        };

        match (name, arg) {
            ("next", None) => Ok(Step::Next),
            ("prev", None) => Ok(Step::Prev),
            ("jump", Some(page)) => page
                .parse()
                .map(Step::Jump)
                .map_err(|_| format!("invalid page number: {page}")),
            ("half", None) => Ok(Step::Half),
            ("spread", None) => Ok(Step::Spread),
            ("rotate", None) => Ok(Step::Rotate),
            ("night", None) => Ok(Step::Night),
            ("controls", None) => Ok(Step::Controls),
            ("tap", arg) => pair(arg).map(|(x, y)| Step::Tap(Point::new(x, y))),
            ("drag", arg) => pair(arg).map(|(dx, dy)| Step::Drag(dx, dy)),
            ("pinch", Some(factor)) => parse_number(factor).map(Step::Pinch),
            ("doubletap", None) => Ok(Step::DoubleTap),
            ("viewport", Some(size)) => parse_size(size).map(Step::Viewport),
            _ => Err(format!("unknown step: {s}")),
        }
    }
}

fn parse_number(s: &str) -> Result<f32, String> {
    s.trim()
        .parse::<f32>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| format!("invalid number: {s}"))
}

fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s}"))?;
    let size = Size::new(parse_number(w)?, parse_number(h)?);
    if size.is_drawable() {
        Ok(size)
    } else {
        Err(format!("size must be positive: {s}"))
    }
}

/// Stand-in document: paper-colored pages with ruled "text" lines and a
/// header band tinted per page, so crops and spreads are visible in output.
struct SyntheticDocument {
    page_count: usize,
    page_size: Size,
}

impl SyntheticDocument {
    const PAPER: Rgba<u8> = Rgba([250, 247, 240, 255]);
    const INK: Rgba<u8> = Rgba([40, 40, 40, 255]);
    const MARGIN: f32 = 50.0;
    const LINE_PITCH: f32 = 24.0;
    const LINE_WEIGHT: f32 = 6.0;

    fn header_color(page: usize) -> Rgba<u8> {
        let hue = (page * 53 % 200) as u8;
        Rgba([55 + hue, 120, 255 - hue, 255])
    }

    fn sample(&self, page: usize, u: f32, v: f32) -> Rgba<u8> {
        let inside = u >= Self::MARGIN
            && u <= self.page_size.width - Self::MARGIN
            && v >= Self::MARGIN
            && v <= self.page_size.height - Self::MARGIN;
        if !inside {
            return Self::PAPER;
        }
        if v < Self::MARGIN * 2.0 {
            return Self::header_color(page);
        }
        if (v - Self::MARGIN * 2.0) % Self::LINE_PITCH < Self::LINE_WEIGHT {
            Self::INK
        } else {
            Self::PAPER
        }
    }
}

impl Rasterizer for SyntheticDocument {
    fn page_size(&self, page: usize) -> Result<Size, RasterizeError> {
        if page < self.page_count {
            Ok(self.page_size)
        } else {
            Err(RasterizeError::NotFound { page })
        }
    }

    fn rasterize(
        &self,
        page: usize,
        crop: Option<Rect>,
        target: (u32, u32),
    ) -> Result<RgbaImage, RasterizeError> {
        let crop = crop.unwrap_or(Rect::from_size(self.page_size(page)?));
        let (width, height) = target;
        Ok(RgbaImage::from_fn(width, height, |x, y| {
            let u = crop.x + (x as f32 + 0.5) / width as f32 * crop.width;
            let v = crop.y + (y as f32 + 0.5) / height as f32 * crop.height;
            self.sample(page, u, v)
        }))
    }
}

fn run_step(
    engine: &mut ReaderEngine,
    step: &Step,
    viewport: &mut Size,
) -> Result<Snapshot, Notification> {
    match *step {
        Step::Next => engine.next(),
        Step::Prev => engine.prev(),
        Step::Jump(page) => engine.jump_to(page),
        Step::Half => engine.toggle_half_page(),
        Step::Spread => engine.toggle_double_spread(),
        Step::Rotate => engine.rotate(),
        Step::Night => engine.toggle_night_mode(),
        Step::Controls => Ok(engine.toggle_controls()),
        Step::Tap(point) => {
            engine.on_gesture_start(point);
            engine.on_release()
        }
        Step::Drag(dx, dy) => {
            let center = Point::new(viewport.width / 2.0, viewport.height / 2.0);
            engine.on_gesture_start(center);
            engine.on_drag(dx, dy);
            engine.on_release()
        }
        Step::Pinch(factor) => {
            let center = Point::new(viewport.width / 2.0, viewport.height / 2.0);
            let spacing = 200.0;
            engine.on_pointer_down2(
                Point::new(center.x - spacing / 2.0, center.y),
                Point::new(center.x + spacing / 2.0, center.y),
            );
            engine.on_pinch(spacing * factor, spacing, center);
            engine.on_release()
        }
        Step::DoubleTap => Ok(engine.on_double_tap()),
        Step::Viewport(size) => {
            *viewport = size;
            Ok(engine.set_viewport(size))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(level, Config::default(), File::create(&cli.log_file)?)?;

    info!("Starting pageturn with {} pages", cli.pages);

    let config_path = cli.config.clone().or_else(preferred_config_path);
    let settings = match &config_path {
        Some(path) => Settings::load_from_path(path),
        None => Settings::default(),
    };

    let store: Box<dyn ReadingProgressStore> = match &cli.progress_file {
        Some(path) => Box::new(JsonProgressStore::load_or_ephemeral(Some(path.as_path()))),
        None => Box::new(MemoryProgressStore::new()),
    };

    let document = Arc::new(SyntheticDocument {
        page_count: cli.pages,
        page_size: cli.page_size,
    });

    let mut engine = ReaderEngine::open(
        cli.document.clone(),
        cli.pages,
        document,
        cli.viewport,
        store,
        settings,
    );
    if let Some(path) = config_path {
        engine = engine.with_settings_path(path);
    }

    println!("{}", json!({ "step": "open", "snapshot": engine.snapshot() }));

    let mut viewport = cli.viewport;
    for step in &cli.steps {
        let line = match run_step(&mut engine, step, &mut viewport) {
            Ok(snapshot) => json!({ "step": format!("{step:?}"), "snapshot": snapshot }),
            Err(notification) => {
                json!({ "step": format!("{step:?}"), "notification": notification.to_string() })
            }
        };
        println!("{line}");
    }

    if let Some(output) = &cli.output {
        if !engine.wait_render(Duration::from_secs(10)) {
            error!("Rasterization did not finish, writing placeholders");
        }
        let image = engine
            .composite()
            .context("nothing to draw: document has no pages")?;
        image
            .save(output)
            .with_context(|| format!("writing {}", output.display()))?;
        info!("Wrote {}", output.display());
    }

    info!("Shutting down pageturn");
    Ok(())
}

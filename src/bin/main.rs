//! mealclock host simulator
//! ========================================
//! RUST_LOG=debug cargo run -- --settings mealclock.toml --dump frame.ppm
//! ========================================
//!
//! Runs the face against a JSON menu document and renders frames into an
//! in-memory RGB565 framebuffer. `--shake` simulates the double-shake
//! gesture to reveal the menu detail overlay.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use mealclock::{
    compositor::DrawMode,
    geometry::DrawBounds,
    gesture::{GestureConfig, MotionSample},
    menu::{local_now, MenuService},
    raster::{rasterize, Framebuffer, SkipComplications},
    settings::Settings,
    source::JsonFileSource,
    store::JsonFileStore,
    style::{Configuration, StyleRepository},
    watchface::WatchFace,
};

// Time between the two simulated shakes
const SHAKE_GAP_MS: u64 = 700;

#[derive(Parser, Debug)]
#[command(name = "mealclock", version, about = "Analog campus watch face simulator")]
struct Args {
    /// TOML settings file; defaults apply when omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Frame clock ticks to run before exiting
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Draw in low-power ambient mode
    #[arg(long)]
    ambient: bool,

    /// Simulate a double shake at startup
    #[arg(long)]
    shake: bool,

    /// Write the last frame as a binary PPM
    #[arg(long)]
    dump: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = match &args.settings {
        Some(path) => Settings::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Settings::default(),
    };
    debug!(?settings, "settings loaded");

    // -------------------- Engines --------------------
    let source = JsonFileSource::new(&settings.menu.locator);
    let mut service = MenuService::new(
        source,
        settings.menu.fetch_policy(),
        settings.menu.schedule_hours.clone(),
        Default::default(),
        local_now(),
    );
    if let Some(path) = &settings.menu.store_path {
        let store = JsonFileStore::open(path).with_context(|| format!("opening menu store {}", path.display()))?;
        service = service.with_store(Box::new(store));
    }

    let mut face = WatchFace::new(
        service,
        Configuration::default(),
        Vec::new(),
        GestureConfig::from(&settings.gesture),
        settings.face.labels.clone(),
        Handle::current(),
    );
    let repository = StyleRepository::new();
    face.subscribe_to(&repository);
    repository.publish(settings.face.style_batch());
    face.start();

    let mode = if args.ambient {
        DrawMode::Ambient
    } else {
        DrawMode::Interactive
    };
    let width = settings.face.width;
    let bounds = DrawBounds::square(width);
    let mut framebuffer = Framebuffer::new(width, width);

    let period = settings.face.frame_period();
    let shake_frames = [0, SHAKE_GAP_MS.div_ceil(period.as_millis().max(1) as u64)];
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // -------------------- Frame loop --------------------
    let mut needs_redraw = true;
    let mut last_second = None;
    let mut drawn: u64 = 0;
    for frame in 0..args.frames {
        ticker.tick().await;

        if args.shake && shake_frames.contains(&frame) && face.on_motion(MotionSample::gyroscope(0.0, 0.0, 3.0)) {
            info!(frame, "menu overlay revealed");
        }

        let now = Local::now().naive_local();
        // Second hand ticks once a second
        let second = now.and_utc().timestamp();
        if last_second != Some(second) {
            last_second = Some(second);
            needs_redraw = true;
        }
        if face.redraw().is_pending() {
            needs_redraw = true;
        }
        if !needs_redraw {
            continue;
        }

        let ops = face.draw_frame(now, bounds, mode);
        rasterize(&ops, &mut framebuffer, &mut SkipComplications)?;
        drawn += 1;
        needs_redraw = false;
    }

    if let Some(path) = &args.dump {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        framebuffer.write_ppm(BufWriter::new(file))?;
        info!(path = %path.display(), "frame written");
    }

    face.shutdown().await;
    info!(ticks = args.frames, drawn, recomputes = face.geometry_recomputes(), "simulation finished");
    Ok(())
}

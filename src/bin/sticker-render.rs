use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sticker_render::{
    AnimationSession, BufferStats, Fps, FrameClock, FrameIndex, NullSink, Priority, RenderConfig,
    RenderScheduler, SchedulerStats, SessionStats, Size,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sticker-render", version)]
struct Cli {
    /// JSON file with scheduler and session options.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Play a grid of animated cells for a while and report statistics.
    Grid(GridArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input Lottie JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long, default_value_t = 0)]
    frame: u64,

    /// Display size in points, `WxH`. Scaled by the configured pixel density.
    #[arg(long, value_parser = parse_size, default_value = "128x128")]
    size: Size,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct GridArgs {
    /// Input Lottie JSON, shared by every cell.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Number of visible cells.
    #[arg(long, default_value_t = 12)]
    cells: usize,

    /// How long to play, in seconds.
    #[arg(long, default_value_t = 2.0)]
    seconds: f64,

    /// Tick rate per cell. Defaults to the configured target rate.
    #[arg(long)]
    fps: Option<u32>,

    /// How many of the cells are background prefetch cells.
    #[arg(long, default_value_t = 0)]
    background: usize,

    /// Override the scheduler queue bound.
    #[arg(long)]
    max_pending: Option<usize>,

    /// Cell size in points, `WxH`.
    #[arg(long, value_parser = parse_size, default_value = "64x64")]
    cell_size: Size,
}

#[derive(serde::Serialize)]
struct GridReport {
    scheduler: SchedulerStats,
    cells: Vec<CellReport>,
}

#[derive(serde::Serialize)]
struct CellReport {
    cell: usize,
    priority: Priority,
    ticks: u64,
    session: SessionStats,
    buffers: BufferStats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Frame(args) => cmd_frame(&cfg, args),
        Command::Grid(args) => cmd_grid(cfg, args),
    }
}

fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{s}'"))?;
    let w: f64 = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h: f64 = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    if !(w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
        return Err(format!("size must be positive, got '{s}'"));
    }
    Ok(Size::new(w, h))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RenderConfig> {
    match path {
        Some(p) => RenderConfig::from_path(p)
            .with_context(|| format!("load config '{}'", p.display())),
        None => Ok(RenderConfig::default()),
    }
}

fn read_payload(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read animation '{}'", path.display()))
}

/// Convert premultiplied RGBA8 to straight alpha, in place.
fn unpremultiply(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        match a {
            0 => px[..3].fill(0),
            255 => {}
            _ => {
                for c in &mut px[..3] {
                    *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
    }
}

fn cmd_frame(cfg: &RenderConfig, args: FrameArgs) -> anyhow::Result<()> {
    let payload = read_payload(&args.in_path)?;
    let scheduler = RenderScheduler::new(cfg.scheduler.clone())?;
    let mut session = AnimationSession::load(
        scheduler,
        &payload,
        Box::new(NullSink::default()),
        cfg.session.clone(),
    )
    .with_context(|| format!("load animation '{}'", args.in_path.display()))?;

    let mut frame = session
        .render_sync(FrameIndex(args.frame), args.size)
        .with_context(|| format!("render frame {}", args.frame))?;
    unpremultiply(&mut frame.data);

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({}x{}, frame {} of {})",
        args.out.display(),
        frame.width,
        frame.height,
        args.frame,
        session.frame_count()
    );
    Ok(())
}

fn cmd_grid(mut cfg: RenderConfig, args: GridArgs) -> anyhow::Result<()> {
    if args.cells == 0 {
        anyhow::bail!("--cells must be >= 1");
    }
    if args.background > args.cells {
        anyhow::bail!("--background ({}) exceeds --cells ({})", args.background, args.cells);
    }
    let run_for = Duration::try_from_secs_f64(args.seconds)
        .with_context(|| format!("invalid --seconds {}", args.seconds))?;
    if let Some(max) = args.max_pending {
        cfg.scheduler.max_pending = max;
    }
    let fps = match args.fps {
        Some(n) => Fps::new(n, 1)?,
        None => cfg.session.target_fps,
    };
    cfg.validate()?;

    let payload = read_payload(&args.in_path)?;
    let scheduler = RenderScheduler::new(cfg.scheduler.clone())?;

    let mut cells = Vec::with_capacity(args.cells);
    for cell in 0..args.cells {
        let mut opts = cfg.session.clone();
        if cell >= args.cells - args.background {
            opts.priority = Priority::Background;
        }
        let priority = opts.priority;
        let mut session =
            AnimationSession::load(scheduler.clone(), &payload, Box::new(NullSink::default()), opts)
                .with_context(|| format!("load animation for cell {cell}"))?;
        session.set_display_size(args.cell_size);
        let session = Arc::new(Mutex::new(session));
        let mut clock = FrameClock::new(session.clone());
        clock.start(fps)?;
        cells.push((cell, priority, session, clock));
    }
    tracing::info!(cells = args.cells, fps = fps.as_f64(), "grid playing");

    std::thread::sleep(run_for);

    let mut reports = Vec::with_capacity(cells.len());
    for (cell, priority, session, mut clock) in cells {
        clock.stop();
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        session.invalidate();
        reports.push(CellReport {
            cell,
            priority,
            ticks: clock.ticks(),
            session: session.stats(),
            buffers: session.buffer_stats(),
        });
    }

    let report = GridReport {
        scheduler: scheduler.stats(),
        cells: reports,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize grid report")?
    );
    Ok(())
}

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use touch_replay::core::MAX_CONTACTS;
use touch_replay::playback::{PlaybackSpeed, PlaybackState};
use touch_replay::{PlaybackDriver, PlaybackSession, PlaybackView, ViewerSettings};

#[derive(Parser)]
#[command(
    name = "touch-replay",
    version,
    about = "Replay recorded touch sensor test captures"
)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, env = "TOUCH_REPLAY_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a capture and print a summary of its frames and traces
    Inspect(InspectArgs),
    /// Replay a capture on the frame timer
    Play(PlayArgs),
    /// Show the viewer settings, updating any that are given
    Config(ConfigArgs),
}

#[derive(Args)]
struct InspectArgs {
    /// Capture file (.json)
    file: PathBuf,
}

#[derive(Args)]
struct PlayArgs {
    /// Capture file (.json)
    file: PathBuf,

    /// Playback speed (0.25x, 0.5x, 1x, 2x, 4x)
    #[arg(long)]
    speed: Option<PlaybackSpeed>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Frame to start from
    #[arg(long, default_value_t = 0)]
    start: usize,
}

#[derive(Args)]
struct ConfigArgs {
    /// Delay between frames at 1x, in milliseconds
    #[arg(long)]
    frame_interval_ms: Option<u64>,

    /// Default playback speed
    #[arg(long)]
    speed: Option<PlaybackSpeed>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long)]
    log_filter: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => ViewerSettings::load_from(path),
        None => ViewerSettings::load(),
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Create tokio runtime for the playback timer
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    match cli.cmd {
        Command::Inspect(args) => inspect(&args.file),
        Command::Play(args) => rt.block_on(play(args, &settings)),
        Command::Config(args) => configure(args, settings, cli.settings.as_deref()),
    }
}

fn configure(args: ConfigArgs, mut settings: ViewerSettings, path: Option<&Path>) -> Result<()> {
    let changed = args.frame_interval_ms.is_some()
        || args.speed.is_some()
        || args.log_filter.is_some();

    if let Some(ms) = args.frame_interval_ms {
        settings.frame_interval_ms = ms;
    }
    if let Some(speed) = args.speed {
        settings.speed = speed;
    }
    if let Some(filter) = args.log_filter {
        settings.log_filter = filter;
    }

    if changed {
        match path {
            Some(path) => settings.save_to(path)?,
            None => settings.save()?,
        }
        info!("Settings saved");
    }

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn open_session(path: &Path) -> Result<PlaybackSession> {
    PlaybackSession::open(path).map_err(|e| {
        warn!("{}: {}", e.advisory(), e);
        anyhow::Error::new(e).context(format!("Could not load {}", path.display()))
    })
}

fn inspect(path: &Path) -> Result<()> {
    let session = open_session(path)?;

    let contacts: usize = session.reports().iter().map(|r| r.contacts().len()).sum();
    let touched_frames = session.reports().iter().filter(|r| !r.is_empty()).count();
    let (rows, cols) = session
        .adc_frames()
        .first()
        .map(|f| f.dimensions())
        .unwrap_or_default();

    println!("File:      {}", path.display());
    println!("Loaded:    {}", session.loaded_at().format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Frames:    {}", session.num_frames());
    println!("Image:     {} x {}", rows, cols);
    println!("Contacts:  {} across {} frames", contacts, touched_frames);
    if let Some(info) = session.info().as_object() {
        for (key, value) in info {
            println!("  {}: {}", key, value);
        }
    }

    if let Some(last) = session.traces().last() {
        println!("Trace lengths at last frame:");
        for slot in 0..MAX_CONTACTS {
            let len = last.trace(slot).len();
            if len > 0 {
                println!("  slot {}: {} points", slot, len);
            }
        }
    }
    Ok(())
}

async fn play(args: PlayArgs, settings: &ViewerSettings) -> Result<()> {
    let session = open_session(&args.file)?;
    let num_frames = session.num_frames();

    let handle = PlaybackDriver::spawn(settings.playback_config());
    handle.load(session).await?;
    if let Some(speed) = args.speed {
        handle.set_speed(speed).await?;
    }
    if args.start > 0 {
        let index = handle.seek(args.start).await?;
        info!("Starting at frame {}", index);
    }

    let adc_view = tokio::spawn(adc_view(handle.subscribe()));
    let touch_view = tokio::spawn(touch_view(handle.subscribe()));

    handle.toggle_play().await?;
    info!(
        "Playing {} frames at {} (Ctrl-C to stop)",
        num_frames,
        handle.view().speed
    );

    match args.duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }

    let at = handle.view().frame_index;
    handle.stop().await?;
    info!("Stopped at frame {} of {}", at, num_frames);

    drop(handle);
    let _ = adc_view.await;
    let _ = touch_view.await;
    Ok(())
}

/// Headless stand-in for the capacitive image plot
async fn adc_view(mut view: watch::Receiver<PlaybackView>) {
    while view.changed().await.is_ok() {
        let snapshot = view.borrow_and_update().clone();
        let Some(frame) = snapshot.frame() else {
            continue;
        };
        if let Some(stats) = frame.adc.stats() {
            debug!(
                "adc  frame {:>5}/{}: min {:.0} max {:.0} mean {:.1}",
                frame.index, snapshot.num_frames, stats.min, stats.max, stats.mean
            );
        }
    }
}

/// Headless stand-in for the touch position and trace plot
async fn touch_view(mut view: watch::Receiver<PlaybackView>) {
    while view.changed().await.is_ok() {
        let snapshot = view.borrow_and_update().clone();
        if snapshot.state() == PlaybackState::Stopped {
            debug!("touch view idle at frame 0");
        }
        let Some(frame) = snapshot.frame() else {
            continue;
        };
        let traces: Vec<String> = frame
            .traces
            .non_empty_slots()
            .map(|slot| format!("{}:{}", slot, frame.traces.trace(slot).len()))
            .collect();
        debug!(
            "touch frame {:>5}/{}: {} contacts, traces [{}]",
            frame.index,
            snapshot.num_frames,
            frame.report.contacts().len(),
            traces.join(" ")
        );
    }
}

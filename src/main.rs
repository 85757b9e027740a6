//! Terminal host for the read-aloud engine.
//!
//! Opens a book, resumes where the last run stopped and reads it aloud
//! screen by screen, printing host events as they happen.

use anyhow::{Context, Result, anyhow};
use readalong::config::{Orientation, ReaderConfig, load_config};
use readalong::document::{DocumentSource, OutlineEntry};
use readalong::position::{FileStore, PositionStore};
use readalong::session::{HostEvent, ReaderSession, SessionEvents};
use readalong::speech::ConsoleSpeechEngine;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage: readalong <path-to-book> [--landscape] [--screen N] [--json]";

struct Args {
    path: PathBuf,
    landscape: bool,
    screen: Option<usize>,
    json: bool,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args()?;
    let mut config = load_config(Path::new("conf/config.toml"));
    if args.landscape {
        config.orientation = Orientation::Landscape;
    }
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        path = %args.path.display(),
        level = %config.log_level,
        orientation = %config.orientation,
        chunk_size = config.chunk_size,
        "Starting read-aloud"
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    let source = DocumentSource::from_path(&args.path)
        .with_context(|| format!("Failed to open {}", args.path.display()))?;
    let positions = PositionStore::new(FileStore::new(&config.position_store));
    let mut session = open_session(&config, source, positions)?;

    let mut pending_screen = args.screen;
    let mut started = false;
    'reading: while !interrupted.load(Ordering::SeqCst) {
        for event in session.wait(Duration::from_millis(100)) {
            report(&event, args.json)?;
            match &event {
                HostEvent::DocumentFailed { error } => {
                    return Err(anyhow!("Could not open {}: {error}", args.path.display()));
                }
                HostEvent::DocumentOpened { outline, .. } => {
                    if !args.json {
                        print_outline(outline);
                    }
                    if let Some(screen) = pending_screen.take() {
                        for event in session.go_to_screen(screen) {
                            report(&event, args.json)?;
                        }
                    }
                }
                HostEvent::ScreenReady { .. } if !started => {
                    started = true;
                    for event in session.start() {
                        report(&event, args.json)?;
                    }
                }
                HostEvent::ReadingFinished => {
                    info!("Reached the end of the book");
                    break 'reading;
                }
                HostEvent::ReadingStopped => {
                    warn!("Reading stopped");
                    break 'reading;
                }
                _ => {}
            }
        }
    }

    if interrupted.load(Ordering::SeqCst) {
        info!("Interrupted; saving position and stopping");
        for event in session.stop() {
            report(&event, args.json)?;
        }
    }
    session.close();
    Ok(())
}

#[cfg(feature = "piper")]
fn open_session(
    config: &ReaderConfig,
    source: DocumentSource,
    positions: PositionStore,
) -> Result<ReaderSession> {
    use readalong::speech::PiperSpeechEngine;

    let events = SessionEvents::new();
    match PiperSpeechEngine::new(
        PathBuf::from(&config.tts_model_path),
        PathBuf::from(&config.tts_espeak_path),
        events.speech_sink(),
    ) {
        Ok(engine) => ReaderSession::open(config.clone(), source, engine, positions, events),
        Err(err) => {
            warn!("Piper unavailable, using console speech: {err}");
            let engine = ConsoleSpeechEngine::new(events.speech_sink());
            ReaderSession::open(config.clone(), source, engine, positions, events)
        }
    }
}

#[cfg(not(feature = "piper"))]
fn open_session(
    config: &ReaderConfig,
    source: DocumentSource,
    positions: PositionStore,
) -> Result<ReaderSession> {
    let events = SessionEvents::new();
    let engine = ConsoleSpeechEngine::new(events.speech_sink());
    ReaderSession::open(config.clone(), source, engine, positions, events)
}

fn report(event: &HostEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event).context("Serializing host event")?);
        return Ok(());
    }
    match event {
        HostEvent::ScreenChanged { pages, screen_count } => match pages.right {
            Some(right) => info!(screen = pages.screen, screen_count, left = pages.left, right, "Screen"),
            None => info!(screen = pages.screen, screen_count, page = pages.left, "Screen"),
        },
        HostEvent::BlockSpoken { chunk_start, .. } => info!(chunk_start, "Block"),
        other => info!(?other, "Event"),
    }
    Ok(())
}

fn print_outline(outline: &[OutlineEntry]) {
    for (depth, entry) in OutlineEntry::flatten(outline) {
        println!("{}{} (page {})", "  ".repeat(depth), entry.title, entry.target_page + 1);
    }
}

fn parse_args() -> Result<Args> {
    let mut path = None;
    let mut landscape = false;
    let mut screen = None;
    let mut json = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--landscape" => landscape = true,
            "--json" => json = true,
            "--screen" => {
                let value = args.next().ok_or_else(|| anyhow!(USAGE))?;
                screen = Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid screen number: {value}"))?,
                );
            }
            _ if path.is_none() => path = Some(PathBuf::from(arg)),
            _ => return Err(anyhow!(USAGE)),
        }
    }

    let path = path.ok_or_else(|| anyhow!(USAGE))?;
    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.display()));
    }
    Ok(Args {
        path,
        landscape,
        screen,
        json,
    })
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}

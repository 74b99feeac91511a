//! ReelFeed (reelfeed) - simulated feed runner
//!
//! Runs the feed scheduler end to end against in-memory collaborators: a
//! paginated item source, simulated playback engines and a recording view.
//! A swipe script drives navigation; scheduler events are logged or printed as
//! JSON lines.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use reelfeed::sim::{RecordingView, SimEngineFactory, SimSource};
use reelfeed::{FeedFilter, ItemKind, ItemSource, Scheduler, SchedulerHandle, SurfaceHandle};
use reelfeed_common::{LoggingConfig, TomlConfig};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for reelfeed
#[derive(Parser, Debug)]
#[command(name = "reelfeed")]
#[command(about = "Run the feed scheduler against a simulated feed")]
#[command(version)]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "REELFEED_CONFIG")]
    config: Option<PathBuf>,

    /// Total number of items in the simulated feed
    #[arg(long, default_value = "24")]
    items: usize,

    /// Items per page
    #[arg(long, default_value = "8")]
    page_size: usize,

    /// Simulate live channels instead of clips
    #[arg(long)]
    live: bool,

    /// Positions to swipe to, in order (default: one step at a time)
    #[arg(long, value_delimiter = ',')]
    swipes: Vec<usize>,

    /// Pause between swipes
    #[arg(long, default_value = "400")]
    swipe_interval_ms: u64,

    /// Length of each simulated clip
    #[arg(long, default_value = "1500")]
    clip_ms: u64,

    /// Advance to the next item when a clip ends
    #[arg(long)]
    auto_advance: bool,

    /// Print scheduler events as JSON lines on stdout
    #[arg(long)]
    json_events: bool,

    /// Log at debug level regardless of the configured level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging, args.verbose)?;

    let mut scheduler_config = config.scheduler.clone();
    if args.auto_advance {
        scheduler_config.auto_advance = true;
    }
    info!(
        "Starting ReelFeed simulation: {} items, pages of {}, pool of {}",
        args.items, args.page_size, scheduler_config.pool_size
    );

    let filter = FeedFilter::default();
    let kind = if args.live { ItemKind::Live } else { ItemKind::Clip };
    let source = Arc::new(
        SimSource::paginated(&filter, "item", kind, args.items, args.page_size)
            .with_latency(Duration::from_millis(20), Duration::from_millis(30)),
    );
    let (factory, engines) = SimEngineFactory::new(args.clip_ms);
    let (view, view_log) = RecordingView::new();

    let (handle, scheduler_task) = Scheduler::spawn(
        scheduler_config,
        source.clone(),
        Box::new(view),
        Box::new(factory),
    )
    .context("Failed to start feed scheduler")?;

    let printer = tokio::spawn(print_events(handle.subscribe(), args.json_events));

    // Simulated engines do not end on their own
    let ender = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        loop {
            ticker.tick().await;
            for slot_id in engines.end_finished() {
                debug!("{} reached the end of its clip", slot_id);
            }
        }
    });

    let first = source
        .fetch_page(&filter, None)
        .await
        .context("Failed to fetch first page")?;
    handle.open_session(filter, first.items, 0, first.next_cursor)?;
    handle.row_attached(0, SurfaceHandle(0))?;

    let swipes = if args.swipes.is_empty() {
        (1..args.items.min(12)).collect()
    } else {
        args.swipes.clone()
    };
    let interval = Duration::from_millis(args.swipe_interval_ms);

    tokio::select! {
        result = run_script(&handle, &swipes, interval) => result?,
        _ = shutdown_signal() => {}
    }

    let snapshot = handle.snapshot().await?;
    info!(
        "Final state: position {:?}, {} items loaded, slots cover {:?}",
        snapshot.current_position,
        snapshot.item_count,
        snapshot.covered_positions()
    );
    if args.json_events {
        println!("{}", serde_json::to_string(&snapshot)?);
    }

    handle.shutdown()?;
    scheduler_task.await.context("Scheduler task failed")?;
    ender.abort();
    drop(handle);
    if let Err(e) = printer.await {
        warn!("Event printer failed: {}", e);
    }

    info!("View received {} callbacks", view_log.calls().len());
    info!("Shutdown complete");
    Ok(())
}

/// Swipe through `swipes`, attaching each row before selecting it
async fn run_script(handle: &SchedulerHandle, swipes: &[usize], interval: Duration) -> Result<()> {
    let mut previous = 0;
    for (step, &target) in swipes.iter().enumerate() {
        tokio::time::sleep(interval).await;

        // Three row views are recycled across the list
        handle.row_attached(target, SurfaceHandle((target % 3) as u64))?;
        handle.position_selected(target)?;
        if previous != target {
            handle.row_detached(previous)?;
        }
        previous = target;

        if step == swipes.len() / 2 {
            handle.toggle_mute()?;
        }
    }
    tokio::time::sleep(interval).await;
    Ok(())
}

async fn print_events(
    mut events: tokio::sync::broadcast::Receiver<reelfeed_common::FeedEvent>,
    json: bool,
) {
    loop {
        match events.recv().await {
            Ok(event) if json => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize {}: {}", event.event_type(), e),
            },
            Ok(event) => info!("Event: {:?}", event),
            Err(RecvError::Lagged(missed)) => warn!("Event printer missed {} events", missed),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins; otherwise the configured level applies to both crates.
fn init_tracing(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("reelfeed={level},reelfeed_common={level}").into()
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

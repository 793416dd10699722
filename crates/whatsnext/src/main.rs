mod cache;
mod config;
mod mock_data;
mod storage;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whatsnext_core::config::SettingsHandle;
use whatsnext_core::render::featured_event;
use whatsnext_core::storage::{EventStore, TimeWindow};
use whatsnext_core::view::{StatusInput, ViewModelBuilder};

use crate::cache::CacheManager;
use crate::config::Config;
use crate::storage::SqliteEventStore;

/// WhatsNext - glanceable "now and next" view over your calendar cache
#[derive(Parser, Debug)]
#[command(name = "whatsnext")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the cache database (overrides WHATSNEXT_DB)
    #[arg(long)]
    database: Option<String>,

    /// Seed the cache with demo events before rendering
    #[arg(long)]
    seed: bool,

    /// Days ahead to include in the query window
    #[arg(long, default_value = "1")]
    window_days: i64,

    /// Print the view model as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whatsnext=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    let clock = config.clock();
    let settings = SettingsHandle::new(config.selection_settings());

    let store = SqliteEventStore::open(&config.database_path)
        .await
        .with_context(|| format!("cannot open event store at {}", config.database_path))?;
    let manager = CacheManager::new(store, clock.clone(), config.cache_ttl(), config.retention());

    if cli.seed {
        let outcome = manager
            .ingest(mock_data::demo_records(clock.now()))
            .await
            .context("seeding demo events")?;
        tracing::info!(
            stored = outcome.stored,
            raw_stored = outcome.raw_stored,
            skipped = outcome.skipped,
            "seeded demo events"
        );
    }

    let cleaned = manager.cleanup().await.context("retention cleanup")?;
    if cleaned.events_removed > 0 || cleaned.raw_removed > 0 {
        tracing::info!(
            events = cleaned.events_removed,
            raw = cleaned.raw_removed,
            "removed rows past retention"
        );
    }

    let now = clock.now();
    let window = TimeWindow::new(now - Duration::hours(1), now + Duration::days(cli.window_days))
        .context("invalid query window")?;
    let events = manager.events_in_window(window).await;
    let stale = manager.is_stale().await;
    if stale {
        if let Ok(metadata) = manager.metadata().await {
            tracing::warn!(
                consecutive_failures = metadata.consecutive_failures,
                last_error = ?metadata.last_error,
                last_successful_fetch = ?metadata.last_successful_fetch,
                "cache is stale"
            );
        }
    }

    let builder = ViewModelBuilder::new(clock, settings);
    let status = StatusInput {
        is_cached: stale,
        connection_status: stale.then(|| "showing cached data".to_string()),
        ..StatusInput::default()
    };
    let view = builder.build(&events, status);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        match featured_event(&view) {
            Some(event) => tracing::info!(
                subject = %event.subject,
                time_range = %event.formatted_time_range,
                starts_in_minutes = ?event.time_until_minutes,
                "featured meeting"
            ),
            None => tracing::info!("no meetings to display"),
        }
        tracing::info!(
            current = view.current_events.len(),
            next = view.next_events.len(),
            later = view.later_events.len(),
            stale,
            date = %view.display_date,
            "view model built"
        );
    }

    let info = manager.store().describe().await.context("describe store")?;
    tracing::debug!(
        journal_mode = %info.journal_mode,
        user_version = info.user_version,
        file_size_bytes = ?info.file_size_bytes,
        "store state"
    );

    Ok(())
}

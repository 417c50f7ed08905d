// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! CondoWatch - fire and intrusion alerting for a small monitored space
//!
//! Accepts camera and sensor events over HTTP, fuses them into alerts and
//! sends Telegram reminders until someone acknowledges them.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use condowatch::core::Scheduler;
use condowatch::notify::{test_message, NotificationChannel, TelegramChannel};
use condowatch::{Clock, Config, Database, Engine, SystemClock, VERSION};

/// CondoWatch - event fusion and alert lifecycle engine
#[derive(Parser, Debug)]
#[command(name = "condowatch")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Fire and intrusion event fusion with alert reminders")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// HTTP bind address, e.g. 0.0.0.0:5000
    #[arg(long)]
    bind: Option<String>,

    /// Data directory; the database lives here
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Send a Telegram connectivity test and exit
    #[arg(long)]
    test_telegram: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true);
    // RUST_LOG wins over the flags when set
    match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish())?,
        Err(_) => tracing::subscriber::set_global_default(builder.with_max_level(log_level).finish())?,
    }

    info!("CondoWatch v{} starting", VERSION);

    let config_path = args.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;
    config.apply_env();

    if let Some(data_dir) = args.data_dir {
        config.database.path = data_dir.join("condowatch.db");
        config.data_dir = data_dir;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    config.validate()?;
    info!("Configuration loaded from {:?}", config_path);

    let rt = tokio::runtime::Runtime::new()?;
    if args.test_telegram {
        return rt.block_on(send_test_message(&config));
    }
    rt.block_on(run(config))
}

async fn send_test_message(config: &Config) -> Result<()> {
    let channel = TelegramChannel::from_config(&config.notifier);
    let target = config.notifier.telegram_chat_id.clone().unwrap_or_default();
    let text = test_message(config.notifier.public_base_url.as_deref());
    channel.send(&target, &text).await?;
    info!("Telegram test message sent");
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    use tokio::sync::broadcast;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    let engine = if config.database.enabled {
        let db = Arc::new(Database::open(&config.database)?);
        Engine::with_database(config.clone(), clock, db)?
    } else {
        warn!("Database disabled; alert history is kept in memory only");
        Engine::new(config.clone(), clock)?
    };
    let engine = Arc::new(engine);
    info!(
        "Engine ready: fire window {}s, intruder window {}s, guest mode {}",
        config.fusion.fire_window_secs,
        config.fusion.intruder_window_secs,
        engine.guest_mode()
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    let mut handles = Vec::new();

    let channel: Arc<dyn NotificationChannel> = Arc::new(TelegramChannel::from_config(&config.notifier));
    let notifier = engine.notifier(channel);
    handles.push(tokio::spawn(notifier.run(shutdown_tx.subscribe())));

    let scheduler = Scheduler::new();
    engine.register_housekeeping(&scheduler).await;
    handles.extend(scheduler.spawn(&shutdown_tx).await);

    #[cfg(feature = "http")]
    {
        if config.server.enabled {
            let app = condowatch::api::router(engine.clone());
            let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
            info!("HTTP API listening on http://{}", config.server.bind);

            let mut shutdown = shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    warn!("HTTP server stopped: {}", e);
                }
            }));
        }
    }

    info!("CondoWatch running, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, cleaning up...");
    let _ = shutdown_tx.send(());
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            warn!("Task ended abnormally: {}", e);
        }
    }

    let stats = engine.stats();
    info!(
        "CondoWatch stopped: {} events accepted, {} alerts raised",
        stats.events_accepted, stats.alerts_created
    );
    Ok(())
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::{signal, task};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use calendar::{
    app,
    config::Config,
    logger, open_store,
    services::{consumer::KafkaConsumer, producer::KafkaProducer, scheduler::Scheduler},
    AppState,
};

#[derive(Parser)]
#[command(name = "calendar", about = "Event calendar service")]
struct Cli {
    /// Путь к TOML-файлу конфигурации
    #[arg(long, default_value = "configs/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// HTTP API
    Api,
    /// Очистка старых событий и рассылка напоминаний по расписанию
    Scheduler,
    /// Сохранение событий из Kafka
    Storer,
    /// Версия сборки
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        println!("calendar {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    dotenvy::dotenv().ok();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    logger::init(&config.logger)?;

    let token = CancellationToken::new();
    let shutdown = token.clone();
    task::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    match cli.command {
        Command::Api => run_api(config, token).await,
        Command::Scheduler => run_scheduler(config, token).await,
        Command::Storer => run_storer(config, token).await,
        Command::Version => Ok(()),
    }
}

async fn run_api(config: Config, token: CancellationToken) -> anyhow::Result<()> {
    info!("Starting calendar API");

    let store = open_store(&config.database).await?;
    let addr = config.http.addr();
    let grace = Duration::from_secs(config.http.shutdown_timeout_secs);
    let router = app(AppState::new(store));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    let stop = token.clone();
    let mut server = task::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(stop.cancelled_owned())
            .await
    });

    tokio::select! {
        result = &mut server => {
            result.context("http server task panicked")?.context("http server failed")?;
            return Ok(());
        }
        _ = token.cancelled() => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => {
            result.context("http server task panicked")?.context("http server failed")?;
            info!("Server stopped");
        }
        Err(_) => warn!("Server did not drain within {:?}, exiting", grace),
    }
    Ok(())
}

async fn run_scheduler(config: Config, token: CancellationToken) -> anyhow::Result<()> {
    info!("Starting calendar scheduler");

    let store = open_store(&config.database).await?;
    let producer = KafkaProducer::new(&config.kafka).context("failed to create Kafka producer")?;
    let scheduler = Scheduler::new(store, Arc::new(producer), &config.schedule.cron)
        .with_context(|| format!("invalid cron expression {:?}", config.schedule.cron))?;

    for handle in scheduler.start(token) {
        if let Err(e) = handle.await {
            error!("Scheduler job panicked: {}", e);
        }
    }

    info!("Scheduler stopped");
    Ok(())
}

async fn run_storer(config: Config, token: CancellationToken) -> anyhow::Result<()> {
    info!("Starting calendar storer");

    let store = open_store(&config.database).await?;
    let consumer = KafkaConsumer::new(&config.kafka, store).context("failed to create Kafka consumer")?;
    consumer.run(token).await;

    info!("Storer stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}

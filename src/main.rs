use anyhow::{Context, Result};
use aws_sdk_sqs::Client as SqsClient;
use aws_types::region::Region;
use futures_util::StreamExt;
use log::{error, info};
use signal_hook::consts::TERM_SIGNALS;
use signal_hook_tokio::Signals;
use std::sync::Arc;

use queue_event_source::health::HealthServer;
use queue_event_source::models::{Config, QueueConfig};
use queue_event_source::services::{JsonLinesEmitter, Poller, Shutdown, SqsQueueClient};

/// Initialize the logger
fn init_logger(log_level: &str) {
    let env = env_logger::Env::default().filter_or("RUST_LOG", log_level);
    env_logger::Builder::from_env(env).init();
}

/// Initialize AWS SQS client
async fn init_sqs_client(config: &QueueConfig) -> SqsClient {
    info!(
        "Using region {} with profile {}",
        config.region, config.config_profile
    );

    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .profile_name(&config.config_profile)
        .load()
        .await;

    SqsClient::new(&sdk_config)
}

/// Handle termination signals
async fn handle_signals(mut signals: Signals, shutdown: Shutdown) {
    while let Some(signal) = signals.next().await {
        info!("Received signal: {}", signal);
        shutdown.trigger();
    }
}

/// Main application logic
async fn run_app() -> Result<()> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_logger("info");
            return Err(e).context("Failed to load configuration");
        }
    };

    init_logger(&config.logging.level);
    info!("Starting queue event source");

    let shutdown = Shutdown::new();

    // Register signal handlers
    let signals = Signals::new(TERM_SIGNALS)?;
    let signals_handle = signals.handle();
    let signal_task = tokio::spawn(handle_signals(signals, shutdown.clone()));

    let sqs_client = init_sqs_client(&config.queue).await;
    let queue_client = SqsQueueClient::new(sqs_client, &config.queue)
        .context("Failed to initialize queue client")?;

    let emitter = JsonLinesEmitter::new(tokio::io::stdout());
    let poller = Poller::new(config.queue.clone(), queue_client, emitter, shutdown.clone())
        .context("Failed to initialize poller")?;

    let health_server = Arc::new(HealthServer::new(config.health.clone()));
    let health_server_task = {
        let health_server = health_server.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = health_server.start(shutdown).await {
                error!("Health server error: {}", e);
            }
        })
    };

    health_server.set_ready(true);
    info!("Application is ready");

    let result = poller.run().await;

    // Graceful shutdown
    info!("Shutting down gracefully...");
    health_server.set_ready(false);
    shutdown.trigger();

    signals_handle.close();
    let _ = signal_task.await;
    let _ = health_server_task.await;

    info!("Shutdown complete");
    result.context("Queue polling stopped")
}

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

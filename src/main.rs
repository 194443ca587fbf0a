use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use translation_network::broker::{BrokerFactory, ConsumerSettings, ConsumerWorker};
use translation_network::config::Config;
use translation_network::detection::{self, DetectionHttpClient, DetectionStage, LanguageDetector};
use translation_network::gateway::{self, BackgroundConsumers, GatewayState};
use translation_network::server;
use translation_network::shutdown::{Shutdown, StopFlag};
use translation_network::text_intelligence::{OpenAiClient, TextIntelligence};
use translation_network::translation::{self, TranslationWorker};

/// Real-time translation network
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Path to a YAML/JSON/TOML config file
    #[clap(long, short, env = "CONFIG_PATH")]
    config: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// WebSocket gateway and /status endpoint
    Gateway,
    /// Language detection HTTP service
    Detection,
    /// Translation worker consuming the detection queue
    Translation,
    /// All three roles in one process
    Standalone,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("translation_network=debug,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    match &cli.config {
        Some(path) => info!("Loaded configuration from: {}", path),
        None => info!("No config file given, using defaults and environment"),
    }

    let shutdown = Shutdown::new();
    shutdown.listen_for_ctrl_c();

    match cli.command {
        Command::Gateway => run_gateway(config, shutdown).await,
        Command::Detection => run_detection(config, shutdown).await,
        Command::Translation => run_translation(config, shutdown).await,
        Command::Standalone => run_standalone(config, shutdown).await,
    }
}

fn text_intelligence(config: &Config) -> Result<Arc<dyn TextIntelligence>> {
    Ok(Arc::new(OpenAiClient::new(&config.text_intelligence)?))
}

async fn stop_consumers(consumers: BackgroundConsumers) -> Result<()> {
    tokio::task::spawn_blocking(move || consumers.stop_and_join()).await?;
    Ok(())
}

async fn run_gateway(config: Config, shutdown: Shutdown) -> Result<()> {
    let broker = BrokerFactory::create(&config.broker, &config.queues).await?;
    let detector: Arc<dyn LanguageDetector> = Arc::new(DetectionHttpClient::new(
        config.gateway.detection_url.clone(),
        config.gateway.detection_timeout(),
    )?);

    let (state, consumers) = GatewayState::start(
        &config,
        broker,
        detector,
        shutdown.clone(),
        ConsumerSettings::from_config(&config.broker),
    )?;

    let served = server::serve(
        gateway::routes::create_routes(state),
        &config.gateway.host,
        config.gateway.port,
        shutdown.clone(),
    )
    .await;

    shutdown.trigger();
    stop_consumers(consumers).await?;
    served
}

async fn run_detection(config: Config, shutdown: Shutdown) -> Result<()> {
    let broker = BrokerFactory::create(&config.broker, &config.queues).await?;
    let stage = Arc::new(DetectionStage::from_config(
        &config,
        broker,
        text_intelligence(&config)?,
    ));

    server::serve(
        detection::routes::create_routes(stage),
        &config.detection.host,
        config.detection.port,
        shutdown,
    )
    .await
}

async fn run_translation(config: Config, shutdown: Shutdown) -> Result<()> {
    let broker = BrokerFactory::create(&config.broker, &config.queues).await?;
    let worker = TranslationWorker::from_config(&config, broker.clone(), text_intelligence(&config)?);

    let stop = StopFlag::new();
    let consumer = ConsumerWorker::spawn(
        broker,
        &config.queues.detection,
        worker,
        stop.clone(),
        ConsumerSettings::from_config(&config.broker),
    )?;
    let consumers = BackgroundConsumers::new(stop, vec![consumer]);

    let served = server::serve(
        translation::routes::create_routes(),
        &config.translation.host,
        config.translation.port,
        shutdown.clone(),
    )
    .await;

    shutdown.trigger();
    stop_consumers(consumers).await?;
    served
}

/// Gateway, detection and translation sharing one broker. The gateway
/// calls the detection stage directly instead of over HTTP.
async fn run_standalone(config: Config, shutdown: Shutdown) -> Result<()> {
    let broker = BrokerFactory::create_in_process(&config.broker, &config.queues).await?;
    let text_intelligence = text_intelligence(&config)?;
    let settings = ConsumerSettings::from_config(&config.broker);

    let stop = StopFlag::new();
    let translation_consumer = ConsumerWorker::spawn(
        broker.clone(),
        &config.queues.detection,
        TranslationWorker::from_config(&config, broker.clone(), text_intelligence.clone()),
        stop.clone(),
        settings,
    )?;
    let translation_consumers = BackgroundConsumers::new(stop, vec![translation_consumer]);

    let detector: Arc<dyn LanguageDetector> = Arc::new(DetectionStage::from_config(
        &config,
        broker.clone(),
        text_intelligence,
    ));
    let (state, gateway_consumers) =
        match GatewayState::start(&config, broker, detector, shutdown.clone(), settings) {
            Ok(started) => started,
            Err(e) => {
                stop_consumers(translation_consumers).await?;
                return Err(e);
            }
        };

    let served = server::serve(
        gateway::routes::create_routes(state),
        &config.gateway.host,
        config.gateway.port,
        shutdown.clone(),
    )
    .await;

    shutdown.trigger();
    stop_consumers(gateway_consumers).await?;
    stop_consumers(translation_consumers).await?;
    served
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mqtt_event_bus::{ConnectionState, EventBus, EventBusConfig};
use serde_json::Value;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{error, info};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "eventbus")]
#[command(about = "Publish and subscribe to JSON events over MQTT")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a JSON message to a topic
    Pub {
        #[arg(help = "Topic to publish to")]
        topic: String,
        #[arg(help = "Message payload (sent as a JSON string if it is not valid JSON)")]
        message: String,
        #[command(flatten)]
        broker: BrokerArgs,
    },
    /// Subscribe to one or more topics and print incoming messages
    Sub {
        #[arg(required = true, help = "Topics to subscribe to")]
        topics: Vec<String>,
        #[arg(long, help = "Hide topic names in output")]
        no_topic: bool,
        #[arg(
            short = 'n',
            long,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
            help = "Exit after receiving this many messages"
        )]
        count: Option<usize>,
        #[command(flatten)]
        broker: BrokerArgs,
    },
    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(clap::Args)]
struct BrokerArgs {
    #[arg(long, help = "Broker address, e.g. mqtt://localhost:1883 (overrides config)")]
    address: Option<String>,
    #[arg(long, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Generate default configuration
    Init {
        #[arg(long, help = "Configuration file path")]
        config: Option<PathBuf>,
    },
    /// Show current configuration
    Show {
        #[arg(long, help = "Configuration file path")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_filter = if cli.verbose {
        "debug,rumqttc=info"
    } else {
        "info,rumqttc=warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Pub {
            topic,
            message,
            broker,
        } => handle_publish(topic, message, broker).await,
        Commands::Sub {
            topics,
            no_topic,
            count,
            broker,
        } => handle_subscribe(topics, no_topic, count, broker).await,
        Commands::Config { action } => handle_config_commands(action),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn load_config(broker: BrokerArgs) -> Result<EventBusConfig> {
    let config_path = broker
        .config
        .unwrap_or_else(EventBusConfig::get_config_path);
    let mut config = EventBusConfig::load_from_file(&config_path)
        .context("Failed to load configuration. Run 'eventbus config init' first.")?;

    if let Some(address) = broker.address {
        config.broker.address = address;
        config.validate()?;
    }

    Ok(config)
}

/// Accepts raw JSON, falling back to a JSON string for anything else.
fn parse_message(message: &str) -> Value {
    serde_json::from_str(message).unwrap_or_else(|_| Value::String(message.to_string()))
}

fn format_line(topic: &str, payload: &Value, no_topic: bool) -> String {
    if no_topic {
        payload.to_string()
    } else {
        format!("{} {}", topic, payload)
    }
}

async fn handle_publish(topic: String, message: String, broker: BrokerArgs) -> Result<()> {
    let config = load_config(broker)?;
    let payload = parse_message(&message);

    let (bus, handle) = EventBus::start(&config).context("Failed to create event bus")?;
    let mut state = bus.watch_state();

    info!("Publishing to topic '{}' on {}", topic, config.broker.address);
    bus.emit(&topic, &payload).context("Failed to queue message")?;

    let connected = matches!(
        timeout(PUBLISH_TIMEOUT, state.wait_for(ConnectionState::is_connected)).await,
        Ok(Ok(_))
    );
    if !connected {
        handle.stop().await;
        anyhow::bail!(
            "Could not reach broker at {} within {:?}",
            config.broker.address,
            PUBLISH_TIMEOUT
        );
    }

    handle.close(CLOSE_GRACE).await;
    info!("Message published");
    Ok(())
}

async fn handle_subscribe(
    topics: Vec<String>,
    no_topic: bool,
    count: Option<usize>,
    broker: BrokerArgs,
) -> Result<()> {
    let config = load_config(broker)?;
    let (bus, handle) = EventBus::start(&config).context("Failed to create event bus")?;

    let (message_sender, mut message_receiver) = mpsc::unbounded_channel();
    for topic in &topics {
        let sender = message_sender.clone();
        bus.on(topic, move |topic, payload| {
            let _ = sender.send((topic.to_string(), payload.clone()));
        })
        .with_context(|| format!("Failed to subscribe to {}", topic))?;
    }
    drop(message_sender);

    info!(
        "Subscribed to {} on {}, press Ctrl+C to exit",
        topics.join(", "),
        config.broker.address
    );

    let mut received = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C");
                break;
            }
            message = message_receiver.recv() => {
                let Some((topic, payload)) = message else { break };
                println!("{}", format_line(&topic, &payload, no_topic));
                received += 1;
                if count.is_some_and(|limit| received >= limit) {
                    break;
                }
            }
        }
    }

    handle.close(CLOSE_GRACE).await;
    Ok(())
}

fn handle_config_commands(action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Init { config } => {
            let config_path = config.unwrap_or_else(EventBusConfig::get_config_path);
            EventBusConfig::default()
                .save_to_file(&config_path)
                .context("Failed to create default configuration")?;
            info!("Default configuration created at: {:?}", config_path);
        }
        ConfigCommands::Show { config } => {
            let config_path = config.unwrap_or_else(EventBusConfig::get_config_path);
            let config = EventBusConfig::load_from_file(&config_path)
                .context("Failed to load configuration")?;

            let toml_str =
                toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
            println!("{}", toml_str);
        }
    }

    Ok(())
}

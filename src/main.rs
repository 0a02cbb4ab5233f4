mod gateway;

use chrono::Local;
use clap::{Parser, Subcommand};
use relay_channels::WhatsAppCloudChannel;
use relay_core::{config, context::Context, shellexpand, traits::Provider};
use relay_memory::{audit::AuditStatus, AuditLogger, Store};
use relay_providers::OpenAiProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "relay",
    version,
    about = "WhatsApp webhook relay to a chat-completion API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, env = "RELAY_CONFIG", default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server and background loops.
    Start,
    /// Show configuration, storage, and provider status.
    Status,
    /// Send a one-shot message to the completion provider.
    Ask {
        /// The message to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Broadcast the promotion template now, unless today's run already happened.
    Broadcast,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _log_guard = init_logging(&cfg);

    match cli.command {
        Commands::Start => {
            cfg.validate()?;

            let provider = OpenAiProvider::from_config(&cfg.provider)?;
            if !provider.is_available().await {
                tracing::warn!(
                    "provider '{}' did not answer the availability check, starting anyway",
                    provider.name()
                );
            }
            let channel = WhatsAppCloudChannel::new(&cfg.whatsapp)?;
            let memory = Store::new(&cfg.memory).await?;

            println!("Relay: starting on {}:{}", cfg.server.host, cfg.server.port);
            let gw = Arc::new(gateway::Gateway::new(
                Arc::new(provider),
                Arc::new(channel),
                memory,
                &cfg,
            ));
            gw.run(cfg.server.clone()).await?;
        }
        Commands::Status => {
            println!("Relay: status\n");
            println!("Config: {}", cli.config);
            println!("Server: {}:{}", cfg.server.host, cfg.server.port);
            match cfg.validate() {
                Ok(()) => println!("Settings: complete"),
                Err(e) => println!("Settings: {e}"),
            }
            println!();

            let provider = OpenAiProvider::from_config(&cfg.provider)?;
            println!(
                "  {} ({}): {}",
                provider.name(),
                provider.model(),
                if provider.is_available().await {
                    "available"
                } else {
                    "unavailable"
                }
            );
            println!(
                "  whatsapp: {}",
                if cfg.whatsapp.access_token.is_empty() || cfg.whatsapp.phone_number_id.is_empty() {
                    "missing credentials"
                } else {
                    "configured"
                }
            );
            println!(
                "  followups: {}",
                if cfg.followup.enabled { "enabled" } else { "disabled" }
            );
            println!(
                "  promotion: {}",
                if cfg.promotion.enabled {
                    format!("{} {} ({})", cfg.promotion.weekday, cfg.promotion.time, cfg.promotion.template)
                } else {
                    "disabled".to_string()
                }
            );
            println!();

            let memory = Store::new(&cfg.memory).await?;
            let audit = AuditLogger::new(memory.pool().clone());
            println!("Database: {} ({} bytes)", cfg.memory.db_path, memory.db_size().await?);
            println!("Customers: {}", memory.customer_count().await?);
            println!(
                "Replies: {} ok, {} fallback, {} send failed",
                audit.count_by_status(AuditStatus::Ok).await?,
                audit.count_by_status(AuditStatus::Fallback).await?,
                audit.count_by_status(AuditStatus::SendFailed).await?
            );
            match memory.last_broadcast().await? {
                Some(b) => println!(
                    "Last broadcast: {} {} ({} delivered, {} failed{})",
                    b.sent_on,
                    b.template,
                    b.delivered,
                    b.failed,
                    if b.finished { "" } else { ", unfinished" }
                ),
                None => println!("Last broadcast: never"),
            }
        }
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: relay ask <message>");
            }
            if cfg.provider.api_key.is_empty() {
                anyhow::bail!("provider.api_key is empty. Set it in config.toml or OPENAI_API_KEY.");
            }

            let prompt = message.join(" ");
            let provider = OpenAiProvider::from_config(&cfg.provider)?;
            let context = Context::new(&cfg.prompts.system, &prompt);
            let response = provider.complete(&context).await?;
            println!("{}", response.text);
        }
        Commands::Broadcast => {
            cfg.validate()?;

            let provider = OpenAiProvider::from_config(&cfg.provider)?;
            let channel = WhatsAppCloudChannel::new(&cfg.whatsapp)?;
            let memory = Store::new(&cfg.memory).await?;
            let gw = gateway::Gateway::new(Arc::new(provider), Arc::new(channel), memory, &cfg);

            let today = Local::now().date_naive();
            match gw.broadcast_promotion(today).await? {
                Some(report) => println!(
                    "Broadcast {}: {}/{} delivered, {} failed",
                    report.date, report.delivered, report.recipients, report.failed
                ),
                None => println!("Broadcast for {today} already sent, nothing to do."),
            }
        }
    }

    Ok(())
}

/// Console logging plus a daily-rotated file under `{data_dir}/logs`.
///
/// `RUST_LOG` wins over the configured level. The returned guard flushes the
/// file writer on drop and must live until exit.
fn init_logging(cfg: &config::Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.relay.log_level));

    let log_dir = PathBuf::from(shellexpand(&cfg.relay.data_dir)).join("logs");
    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, "relay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(e) => {
            eprintln!("file logging disabled, cannot create {}: {e}", log_dir.display());
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

//! TCI Surface GW
//!
//! Gateway to control an SDR transceiver from a MIDI control surface.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tci_surface_gw::config::AppConfig;
use tci_surface_gw::control::NoIndicator;
use tci_surface_gw::dispatcher::Dispatcher;
use tci_surface_gw::paths::AppPaths;
use tci_surface_gw::radio::{ConfirmationBus, SimulatedRadio};
use tci_surface_gw::surface::{self, SurfaceDriver};

/// TCI Surface GW - Control an SDR transceiver from a MIDI control surface
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML, or JSON by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Build the mapping table, print it and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.log_json)?;

    if args.list_ports {
        return print_ports();
    }

    info!("Starting TCI Surface GW v{}...", env!("CARGO_PKG_VERSION"));

    let paths = AppPaths::detect(args.config.as_deref());
    info!(
        "Configuration file: {} ({:?})",
        paths.config.display(),
        paths.source
    );

    let config = AppConfig::load(&paths.config).await?;
    info!("Configuration loaded: {} mappings", config.mappings.len());

    if args.check_config {
        return check_config(&config).await;
    }

    run_app(config, shutdown_signal()).await?;

    info!("TCI Surface GW shutdown complete");
    Ok(())
}

async fn run_app(config: AppConfig, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
    let bus = ConfirmationBus::new();
    let radio = Arc::new(SimulatedRadio::new(
        config.radio.name.clone(),
        bus.clone(),
        config.radio.confirm_delay(),
        config.radio.trx_count,
    ));
    info!(
        "Radio '{}' at {} (simulated, {} trx)",
        config.radio.name, config.radio.address, config.radio.trx_count
    );

    let mut surface = SurfaceDriver::connect(&config.midi)?;
    let mut events = surface
        .take_event_receiver()
        .context("Surface event receiver already taken")?;

    let dispatcher = Arc::new(Dispatcher::build(
        &config.mappings,
        config.radio.trx_count,
        radio.clone(),
        surface.indicator(),
    ));

    let feed = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let confirmations = bus.subscribe();
        async move { dispatcher.run_confirmations(confirmations).await }
    });
    radio.announce();

    info!("Ready to process MIDI events!");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(message) => {
                    debug!("Surface: {}", message);
                    dispatcher.on_midi(&message);
                }
                None => {
                    warn!("⚠️  Surface input closed, stopping");
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    surface.disconnect();
    dispatcher.close().await;
    feed.abort();
    Ok(())
}

/// Build the dispatch table without touching the surface and report it
async fn check_config(config: &AppConfig) -> Result<()> {
    let radio = Arc::new(SimulatedRadio::new(
        config.radio.name.clone(),
        ConfirmationBus::new(),
        config.radio.confirm_delay(),
        config.radio.trx_count,
    ));
    let dispatcher = Dispatcher::build(
        &config.mappings,
        config.radio.trx_count,
        radio,
        Arc::new(NoIndicator),
    );

    println!("\n{}", "=== Mapping Table ===".bold().cyan());
    println!("  Input port:  {}", config.midi.input_port.bright_white());
    println!("  Output port: {}", config.midi.output_port().bright_white());

    println!("\n{}", "Registered:".bold());
    for registration in dispatcher.registered() {
        println!(
            "  {} {:<7} {}",
            registration.key.to_string().yellow(),
            registration.role.green(),
            registration.mapping
        );
    }

    if !dispatcher.skipped().is_empty() {
        println!("\n{}", "Skipped:".bold());
        for (mapping, reason) in dispatcher.skipped() {
            println!("  {} {}", mapping.red(), reason.to_string().dimmed());
        }
    }

    dispatcher.close().await;

    println!(
        "\n{} {} registered, {} skipped",
        "✅".green(),
        dispatcher.registered().len().to_string().green(),
        dispatcher.skipped().len().to_string().red()
    );
    Ok(())
}

fn print_ports() -> Result<()> {
    let (inputs, outputs) = surface::list_ports()?;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    for (title, ports) in [("Input Ports:", inputs), ("Output Ports:", outputs)] {
        println!("\n{}", title.bold());
        if ports.is_empty() {
            println!("  {}", "No ports found".dimmed());
        }
        for (index, name) in ports.iter().enumerate() {
            println!("  {} {}", format!("[{}]", index).yellow(), name);
        }
    }
    println!();
    Ok(())
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {}", level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init();
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("⚠️  Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

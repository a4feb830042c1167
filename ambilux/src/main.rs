//! ambilux entry point.
//!
//! ```text
//! ambilux                           Run with ambilux.toml (or defaults)
//! ambilux --config <path>           Load a custom config TOML
//! ambilux --gen-config              Write default config to stdout
//! ambilux --pattern --preview       Test pattern, mirrored on the terminal
//! grabber | ambilux --input -       Raw RGB24 frames from stdin
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ambilux::config::{AmbiluxConfig, Overrides};
use ambilux::service::AmbiluxService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ambilux", about = "Ambient lighting host: screen frames to LED zones")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "ambilux.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Mirror the outgoing zone colors on stderr.
    #[arg(long)]
    preview: bool,

    #[command(flatten)]
    overrides: Overrides,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&AmbiluxConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config, then let the command line win.
    let mut config = AmbiluxConfig::load(&cli.config);
    config.apply(&cli.overrides);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("ambilux v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "capture: {}x{} depth {} @ {} fps",
        config.capture.width, config.capture.height, config.capture.depth, config.capture.fps
    );
    info!(
        "device: brightness {} saturation {} smoothing {}",
        config.device.brightness, config.device.saturation, config.device.smoothing
    );

    let service = AmbiluxService::new(config).with_preview(cli.preview);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    service.run().await?;

    if cli.preview {
        eprintln!();
    }
    Ok(())
}

//! CLI command implementations

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use futures::TryStreamExt;
use vidhost_core::config::VidhostConfig;
use vidhost_core::{RangeMode, RangeStreamer, VidhostError};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Server {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory holding uploaded videos
        #[arg(long)]
        media_dir: Option<PathBuf>,
        /// Read block size for streamed bodies
        #[arg(long)]
        block_size: Option<usize>,
        /// Reject unsatisfiable ranges with 416 and honor suffix ranges
        #[arg(long)]
        strict_ranges: bool,
        /// Skip indexing existing files in the media directory
        #[arg(long)]
        no_scan: bool,
    },
    /// Show how a file would be served for a Range header
    Probe {
        /// Media file to open
        file: PathBuf,
        /// Raw Range header value, e.g. "bytes=0-99"
        #[arg(short, long)]
        range: Option<String>,
        /// Use strict range interpretation
        #[arg(long)]
        strict_ranges: bool,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that failed
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Server {
            host,
            port,
            media_dir,
            block_size,
            strict_ranges,
            no_scan,
        } => {
            let mut config = VidhostConfig::from_env();
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(media_dir) = media_dir {
                config.storage.media_dir = media_dir;
            }
            if let Some(block_size) = block_size {
                anyhow::ensure!(block_size > 0, "block size must be positive");
                config.streaming.block_size = block_size;
            }
            if strict_ranges {
                config.streaming.range_mode = RangeMode::Strict;
            }
            if no_scan {
                config.storage.scan_on_startup = false;
            }
            start_server(config).await
        }
        Commands::Probe {
            file,
            range,
            strict_ranges,
        } => probe_file(file, range, strict_ranges).await,
    }
}

/// Run the web server with the resolved configuration
///
/// # Errors
/// - Listen address invalid, media directory not creatable, or port in use
pub async fn start_server(config: VidhostConfig) -> anyhow::Result<()> {
    println!(
        "Starting vidhost on {}:{} (media: {})",
        config.server.host,
        config.server.port,
        config.storage.media_dir.display()
    );

    vidhost_web::run_server(config).await.map_err(report)
}

/// Wraps a core error so the CLI prints its user-facing message first.
fn report(error: VidhostError) -> anyhow::Error {
    let message = error.user_message();
    anyhow::Error::new(error).context(message)
}

/// Open a file through the range streamer and report the response it would produce
///
/// # Errors
/// - File missing or unreadable, range unsatisfiable in strict mode, or a read failure
pub async fn probe_file(
    file: PathBuf,
    range: Option<String>,
    strict_ranges: bool,
) -> anyhow::Result<()> {
    let mut config = VidhostConfig::from_env();
    if strict_ranges {
        config.streaming.range_mode = RangeMode::Strict;
    }
    let streamer = RangeStreamer::new(&config.streaming);

    let descriptor = streamer
        .open(&file, range.as_deref())
        .await
        .map_err(|e| report(e.into()))
        .with_context(|| format!("cannot stream {}", file.display()))?;

    println!("Status: {}", descriptor.status());
    println!("Content-Length: {}", descriptor.content_length());
    for (name, value) in descriptor.headers() {
        println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }

    let declared = descriptor.content_length();
    let produced = descriptor
        .into_body()
        .try_fold(0u64, |total, chunk| async move { Ok(total + chunk.len() as u64) })
        .await
        .context("read failed mid-stream")?;

    println!("Produced: {produced} bytes");
    if produced != declared {
        println!("Warning: body ended {} bytes short", declared - produced);
    }

    Ok(())
}

//! Prism CLI - Terminal front end for the generation service
//!
//! A line-oriented REPL over the conductor core. Plain lines are sent as
//! prompts in the current mode; `/` commands switch modes and stage files.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (http://localhost:8080, chat mode)
//! prism
//!
//! # Another service, starting in invoice mode
//! prism --base-url http://gen.internal:9000 --mode invoice
//!
//! # With config file
//! prism --config ~/.config/prism/prism.toml
//!
//! # Verbose logging (written to stderr)
//! RUST_LOG=debug prism
//! ```

mod commands;
mod render;

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use prism_conductor::{
    load_config, load_config_from_path, Attachment, Conductor, ConfigOverrides, HttpTransport,
    Mode,
};

use commands::{Command, HELP};

/// Prism - multi-mode generation client
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Base URL of the generation service
    #[arg(short = 'u', long, value_name = "URL")]
    base_url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "PRISM_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Mode to start in (chat, image, document, audio, invoice)
    #[arg(short = 'm', long, value_name = "MODE")]
    mode: Option<Mode>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "PRISM_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so the conversation on stdout stays readable.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("prism_cli={level},prism_conductor={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Read a file into an attachment named after its last path component
async fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Could not read {}", path.display()))?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(Attachment::new(name, bytes))
}

/// Run `work` unless `interrupt` completes first
async fn interruptible<W, I>(work: W, interrupt: I) -> Option<W::Output>
where
    W: Future,
    I: Future,
{
    tokio::select! {
        out = work => Some(out),
        _ = interrupt => None,
    }
}

/// Log a renderer task that ended abnormally; true when it exited cleanly
fn renderer_finished(result: Result<(), tokio::task::JoinError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Renderer task failed");
            false
        }
    }
}

fn describe_mode(mode: Mode) -> String {
    format!("{} mode. {}", mode.display_name(), mode.input_placeholder())
}

/// Read lines and drive the conductor until EOF or `/quit`
async fn repl(conductor: &mut Conductor<HttpTransport>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut staged: Option<Attachment> = None;

    println!("{} Type /help for commands.", describe_mode(conductor.mode()));

    loop {
        let Some(line) = interruptible(lines.next_line(), tokio::signal::ctrl_c()).await else {
            info!("Interrupted");
            break;
        };
        let Some(line) = line.context("Failed to read stdin")? else {
            break;
        };

        let prompt = match Command::parse(&line) {
            Command::Submit(prompt) => prompt,
            // A staged file may be sent without a prompt
            Command::Empty if conductor.mode().requires_attachment() && staged.is_some() => {
                String::new()
            }
            Command::Empty => continue,
            Command::Mode(mode) => {
                conductor.set_mode(mode);
                println!("{}", describe_mode(mode));
                continue;
            }
            Command::Modes => {
                for mode in Mode::ALL {
                    let marker = if mode == conductor.mode() { "*" } else { " " };
                    println!("{marker} {:<9} {}", mode.as_str(), mode.display_name());
                }
                continue;
            }
            Command::File(path) => {
                match read_attachment(&path).await {
                    Ok(file) => {
                        println!("Staged {} ({} bytes)", file.name, file.size());
                        staged = Some(file);
                    }
                    Err(e) => println!("{e:#}"),
                }
                continue;
            }
            Command::ClearFile => {
                staged = None;
                continue;
            }
            Command::History => {
                print!("{}", render::transcript(conductor.session().messages()));
                continue;
            }
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            Command::Quit => break,
            Command::Invalid(message) => {
                println!("{message}");
                continue;
            }
        };

        // Chat leaves a staged file for a later file-mode submission
        let attachment = if conductor.mode().requires_attachment() {
            staged.take()
        } else {
            None
        };
        let action = conductor.action(prompt, attachment);
        match interruptible(conductor.handle(action), tokio::signal::ctrl_c()).await {
            Some(Ok(_)) => {}
            Some(Err(e)) => println!("{e}"),
            // Dropping the conductor afterwards stops the dispatch task
            None => {
                info!("Interrupted during request");
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging first
    init_logging(&args.log_level);

    let overrides = ConfigOverrides {
        base_url: args.base_url,
        default_mode: args.mode,
        ..ConfigOverrides::default()
    };
    let loaded = match args.config {
        Some(path) => load_config_from_path(Some(path), &overrides),
        None => load_config(&overrides),
    }
    .context("Failed to load configuration")?;

    info!(
        base_url = %loaded.conductor.base_url,
        source = %loaded.source(),
        "Using generation service"
    );

    let transport =
        HttpTransport::from_config(&loaded.conductor).context("Failed to create HTTP client")?;
    let (tx, rx) = mpsc::channel(loaded.conductor.event_buffer);
    let renderer = tokio::spawn(render::run(rx));

    let mut conductor = Conductor::new(transport, loaded.conductor, tx);
    let result = repl(&mut conductor).await;

    // Closing the channel lets the renderer finish
    drop(conductor);
    renderer_finished(renderer.await);

    result
}

//! Decode application binary - composition root.
//!
//! 1. Parse arguments and load configuration from TOML
//! 2. Read the transcript files
//! 3. Build the embedding and generation providers
//! 4. Index the corpus and answer the research question
//! 5. Print the findings as text or JSON

mod cli;
mod providers;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use decode_core::config::DecodeConfig;
use decode_core::error::{DecodeError, ErrorCategory, Result};
use decode_insight::session::{IndexStatus, ResearchSession};

use cli::CliArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(category = %err.category(), error = %err, "Decode failed");
            eprintln!("error [{}]: {}", err.category(), err);
            match err.category() {
                ErrorCategory::Config | ErrorCategory::Question => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(args: CliArgs) -> Result<()> {
    // Config.
    let (config_file, explicit) = args.resolve_config_path();
    let mut config = if explicit {
        DecodeConfig::load(&config_file)?
    } else {
        DecodeConfig::load_or_default(&config_file)
    };
    args.apply_overrides(&mut config);
    config.validate()?;

    // Tracing. Logs go to stderr so stdout stays clean for --json.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting Decode v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), explicit, "Configuration loaded");

    let (sources, transcripts) = read_transcripts(&args.transcripts)?;

    let embedder = providers::create_embedding_service(&config.embedding)?;
    let llm = providers::create_generation_service(&config.generation)?;
    let mut session = ResearchSession::new(config, embedder, llm)?;

    match session.load_transcripts(&transcripts).await? {
        IndexStatus::Rebuilt(report) => tracing::info!(
            transcripts = report.transcripts,
            chunks = report.chunks,
            elapsed_ms = report.elapsed_ms,
            "Corpus indexed"
        ),
        IndexStatus::Reused => tracing::debug!("Corpus index reused"),
    }

    let findings = session.ask(&args.question).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
    } else {
        print!("{}", render::render_text(&findings, &sources));
    }
    Ok(())
}

/// Read every transcript file, returning display names alongside contents.
fn read_transcripts(paths: &[PathBuf]) -> Result<(Vec<String>, Vec<String>)> {
    let mut sources = Vec::with_capacity(paths.len());
    let mut transcripts = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DecodeError::Ingestion(format!("cannot read transcript {}: {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        tracing::debug!(transcript = %name, chars = text.chars().count(), "Transcript read");
        sources.push(name);
        transcripts.push(text);
    }
    Ok((sources, transcripts))
}

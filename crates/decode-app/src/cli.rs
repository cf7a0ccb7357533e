//! CLI argument definitions for the Decode binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use decode_core::config::DecodeConfig;

/// Decode - qualitative insights from interview transcripts, with supporting quotes.
#[derive(Parser, Debug)]
#[command(name = "decode", version, about)]
pub struct CliArgs {
    /// Research question to answer from the transcripts.
    #[arg(short = 'q', long = "question")]
    pub question: String,

    /// Transcript files (UTF-8 text or markdown), one interview per file.
    #[arg(required = true)]
    pub transcripts: Vec<PathBuf>,

    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Print the findings as JSON instead of text.
    #[arg(long = "json")]
    pub json: bool,

    /// Number of transcript chunks given to the generator as context.
    #[arg(long = "top-k")]
    pub top_k: Option<usize>,

    /// Maximum supporting quotes per insight.
    #[arg(long = "top-n")]
    pub top_n: Option<usize>,

    /// Minimum cosine similarity for a supporting quote.
    #[arg(long = "min-similarity")]
    pub min_similarity: Option<f64>,

    /// Embedding provider (openai, onnx, hashing).
    #[arg(long = "embedding-provider")]
    pub embedding_provider: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path and whether it was given explicitly.
    ///
    /// Priority: --config flag > DECODE_CONFIG env var > ~/.decode/config.toml.
    pub fn resolve_config_path(&self) -> (PathBuf, bool) {
        if let Some(ref p) = self.config {
            return (p.clone(), true);
        }
        if let Ok(p) = std::env::var("DECODE_CONFIG") {
            return (PathBuf::from(p), true);
        }
        (default_config_path(), false)
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut DecodeConfig) {
        if let Some(k) = self.top_k {
            config.retrieval.top_k = k;
        }
        if let Some(n) = self.top_n {
            config.attribution.top_n = n;
        }
        if let Some(threshold) = self.min_similarity {
            config.attribution.min_similarity = threshold;
        }
        if let Some(ref provider) = self.embedding_provider {
            config.embedding.provider = provider.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".decode").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    std::env::var(var).ok().map(PathBuf::from)
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

//! csstrim CLI - removes unused CSS from generated sites.
//!
//! Features:
//! - TOML or JSON configuration (`csstrim.toml` by default)
//! - Rayon-powered parallel scanning and pruning
//! - Opt-in token caching for faster re-runs
//! - Plain or JSON reports, CI-friendly exit codes

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use csstrim_core::{
    find_config, init_structured_logging, load_config, print_json, print_plain, Csstrim,
    CsstrimError, RunResult, CONFIG_FILE_NAME,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Removes unused CSS selectors from stylesheets")]
pub struct Cli {
    /// Path to the config file, or a directory containing csstrim.toml
    #[arg(default_value = CONFIG_FILE_NAME)]
    config: String,

    /// Output the report in JSON format
    #[arg(long)]
    json: bool,

    /// Show what would be removed without writing anything
    #[arg(long)]
    dry_run: bool,

    /// List every removed selector in the report
    #[arg(long)]
    rejected: bool,

    /// Ignore and do not update the token cache
    #[arg(long)]
    no_cache: bool,

    /// Write pruned stylesheets into this directory instead of the configured one
    #[arg(long, value_name = "DIR")]
    output: Option<String>,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long)]
    jobs: Option<usize>,
}

/// Resolves the CLI argument to a config file path.
fn resolve_config_path(arg: &str) -> Result<PathBuf> {
    let path = PathBuf::from(arg);
    if path.is_dir() {
        return find_config(&path)
            .ok_or_else(|| anyhow!("No {} found in {}", CONFIG_FILE_NAME, path.display()));
    }
    Ok(path)
}

/// Directory the config's relative paths are resolved against.
fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Rejects output directories that cannot be valid paths.
fn validate_output_path(path: &str) -> Result<PathBuf> {
    if path.contains('\0') {
        return Err(anyhow!("Output path contains null bytes"));
    }
    if path.trim().is_empty() {
        return Err(anyhow!("Output path is empty"));
    }
    Ok(PathBuf::from(path))
}

/// One line per error: kind, offending file or pattern, message.
fn format_error(err: &CsstrimError) -> String {
    match err {
        CsstrimError::InvalidPattern { pattern, .. } => {
            format!("[{}] {}: {}", err.kind(), pattern, err)
        }
        _ => match err.path() {
            Some(path) => format!("[{}] {}: {}", err.kind(), path.display(), err),
            None => format!("[{}] {}", err.kind(), err),
        },
    }
}

fn report(result: &RunResult, json: bool) {
    if json {
        print_json(result);
    } else {
        print_plain(result);
    }
    for err in &result.errors {
        eprintln!("{}", format_error(err));
    }
}

fn main() -> Result<()> {
    // Global panic guard
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] csstrim internal error: {}", info);
        eprintln!("[PANIC] No stylesheet was partially written. Exiting with code 2.");
        std::process::exit(2);
    }));

    // Initialize structured logging (JSON to stderr, respects RUST_LOG)
    init_structured_logging();

    let cli = Cli::parse();

    if let Some(jobs) = cli.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    // 1. Load configuration
    let config_path = resolve_config_path(&cli.config)?;
    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", format_error(&e));
            std::process::exit(1);
        }
    };

    // 2. Configure the run
    let mut run = Csstrim::new(config)
        .base_dir(base_dir(&config_path))
        .dry_run(cli.dry_run);
    if cli.no_cache {
        run = run.with_cache(false);
    }
    if cli.rejected {
        run = run.rejected(true);
    }
    if let Some(out) = &cli.output {
        run = run.output_override(validate_output_path(out)?);
    }

    // 3. Run; fatal errors stop before any stylesheet is written
    let result = match run.run() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", format_error(&e));
            std::process::exit(1);
        }
    };

    // 4. Report and exit (CI-friendly)
    report(&result, cli.json);
    std::process::exit(if result.has_errors() { 1 } else { 0 });
}

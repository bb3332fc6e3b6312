//! oumanifest - Filesystem manifest generator and reconciler.
//!
//! Usage:
//!   oumanifest [OPTIONS] [PATH]...             Write a new manifest to stdout
//!   oumanifest -u arm [OPTIONS] [PATH]...      Update the manifest on stdin
//!   oumanifest --help                          Show help

use std::io::{self, BufWriter};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Context, Result};
use tracing_subscriber::EnvFilter;

use oumanifest_core::{FieldSet, KindFilter, ManifestConfig, RemoveScope, ScanWarning, UpdatePolicy};
use oumanifest_reconcile::update_manifest;
use oumanifest_scan::create_manifest;

#[derive(Parser)]
#[command(
    name = "oumanifest",
    version,
    about = "Record file hierarchies in OUmanifest format",
    long_about = "oumanifest walks the named paths (or the current directory) and writes \
                  one record per file to stdout.\n\n\
                  With -u, an existing manifest is read from stdin and brought up to date \
                  with the filesystem instead."
)]
struct Cli {
    /// Paths to record (defaults to the contents of the current directory)
    paths: Vec<PathBuf>,

    /// Report and skip files that cannot be examined
    #[arg(short, long)]
    verbose: bool,

    /// File types to record: r(egular) d(irectory) c(haracter) b(lock) l(ink) f(ifo).
    /// Every type is recorded when -t is not given
    #[arg(short = 't', long = "types", value_name = "TYPES")]
    types: Option<String>,

    /// Update the manifest on stdin: a(dd) r(emove) m(odified)
    #[arg(short = 'u', long = "update", value_name = "UPDATES")]
    update: Option<String>,

    /// Metadata to record: s(ize) m(time)
    #[arg(short = 'm', long = "metadata", value_name = "METADATA")]
    metadata: Option<String>,

    /// Follow symbolic links named on the command line
    #[arg(short = 'H')]
    command_line_links: bool,

    /// Follow all symbolic links
    #[arg(short = 'L')]
    all_links: bool,

    /// JSON configuration file, overridden by command-line flags
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Which records a named path makes eligible for removal
    #[arg(long, value_enum)]
    remove_scope: Option<ScopeArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScopeArg {
    Subtree,
    Exact,
}

impl From<ScopeArg> for RemoveScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Subtree => RemoveScope::Subtree,
            ScopeArg::Exact => RemoveScope::Exact,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = build_config(&cli)?;

    match config.update {
        Some(_) => run_update(&cli.paths, &config),
        None => run_create(&cli.paths, &config),
    }
}

/// Send diagnostics to stderr, filtered by `RUST_LOG` when set.
fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Layer command-line flags over the configuration file, if any.
fn build_config(cli: &Cli) -> Result<ManifestConfig> {
    let mut config = match &cli.config {
        Some(path) => ManifestConfig::from_json_file(path)
            .wrap_err_with(|| format!("Failed to load {}", path.display()))?,
        None => ManifestConfig::new(),
    };

    if let Some(types) = &cli.types {
        config.kinds = KindFilter::from_letters(types).wrap_err("Invalid -t argument")?;
    }
    if let Some(metadata) = &cli.metadata {
        config.fields = FieldSet::from_letters(metadata).wrap_err("Invalid -m argument")?;
    }
    if let Some(update) = &cli.update {
        config.update = Some(UpdatePolicy::from_letters(update).wrap_err("Invalid -u argument")?);
    }
    if let Some(scope) = cli.remove_scope {
        config.remove_scope = scope.into();
    }

    config.follow_command_line_links |= cli.command_line_links;
    config.follow_all_links |= cli.all_links;
    config.verbose |= cli.verbose;

    config.validate()?;
    Ok(config)
}

/// Walk the roots and write a fresh manifest.
fn run_create(paths: &[PathBuf], config: &ManifestConfig) -> Result<()> {
    let out = BufWriter::new(io::stdout().lock());
    let summary = create_manifest(paths, config, out).wrap_err("Failed to create manifest")?;

    if config.verbose {
        eprintln!(
            "{} records, {} recorded",
            summary.records,
            format_size(summary.recorded_size)
        );
        report_warnings(&summary.warnings);
    }

    Ok(())
}

/// Read a manifest from stdin and write the updated one.
fn run_update(paths: &[PathBuf], config: &ManifestConfig) -> Result<()> {
    let input = io::stdin().lock();
    let out = BufWriter::new(io::stdout().lock());
    let summary =
        update_manifest(paths, config, input, out).wrap_err("Failed to update manifest")?;

    if config.verbose {
        eprintln!(
            "{} kept ({} refreshed), {} removed, {} added",
            summary.retained, summary.refreshed, summary.removed, summary.added
        );
        report_warnings(&summary.warnings);
    }

    Ok(())
}

fn report_warnings(warnings: &[ScanWarning]) {
    if !warnings.is_empty() {
        eprintln!("{} path(s) skipped", warnings.len());
    }
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

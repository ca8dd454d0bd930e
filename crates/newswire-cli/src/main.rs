use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newswire_core::{storage::ArticleQuery, AppConfig, ExportFormat};

mod commands;

#[derive(Parser)]
#[command(name = "newswire")]
#[command(author, version, about = "Scrape, deduplicate and export news from Kenyan and US publishers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (defaults to ~/.config/newswire/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// TOML file with [[sources]] replacing the configured catalog
    #[arg(long, global = true)]
    sources: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest news once and export it (default)
    Run(RunArgs),
    /// List the configured sources grouped by region
    Sources,
    /// Ingest and export on a fixed interval until interrupted
    Schedule {
        /// Hours between runs (overrides scheduler.interval_hours)
        #[arg(long)]
        hours: Option<u64>,
    },
    /// Delete stored articles older than the retention period
    Cleanup {
        /// Retention in days (overrides scheduler.retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
    /// List stored articles, newest first
    Articles {
        /// Only articles from this region
        #[arg(short, long)]
        region: Option<String>,

        /// Only articles from the named source
        #[arg(short, long)]
        source: Option<String>,

        /// Maximum number of articles to show
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Show stored article totals and recent run history
    Stats {
        /// Number of recent runs to show
        #[arg(long, default_value_t = 5)]
        runs: u32,
    },
}

#[derive(clap::Args, Default)]
struct RunArgs {
    /// Only ingest sources from this region (e.g. kenya, usa)
    #[arg(short, long)]
    region: Option<String>,

    /// Only ingest the named source
    #[arg(short, long)]
    source: Option<String>,

    /// Export format; repeat for several (defaults to export.formats)
    #[arg(short, long = "format", value_enum)]
    formats: Vec<FormatArg>,

    /// Directory for JSON and CSV exports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Json,
    Csv,
    Sqlite,
    All,
}

/// Expand `all` and fall back to the configured formats
fn resolve_formats(args: &[FormatArg], config: &AppConfig) -> Vec<ExportFormat> {
    if args.is_empty() {
        return config.export.formats.clone();
    }
    if args.contains(&FormatArg::All) {
        return ExportFormat::ALL.to_vec();
    }

    let mut formats = Vec::new();
    for arg in args {
        let format = match arg {
            FormatArg::Json => ExportFormat::Json,
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Sqlite => ExportFormat::Sqlite,
            FormatArg::All => continue,
        };
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    formats
}

fn init_logging(verbose: bool, config: &AppConfig) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose {
            "debug".into()
        } else {
            config.general.log_level.clone()
        }
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    init_logging(cli.verbose, &config);

    let sources_file = cli.sources.as_deref();

    match cli.command {
        Some(Commands::Run(args)) => {
            let formats = resolve_formats(&args.formats, &config);
            commands::run::run(&config, sources_file, &args, &formats).await
        }
        None => {
            let args = RunArgs::default();
            let formats = resolve_formats(&args.formats, &config);
            commands::run::run(&config, sources_file, &args, &formats).await
        }
        Some(Commands::Sources) => commands::sources::run(&config, sources_file),
        Some(Commands::Schedule { hours }) => commands::schedule::run(config, sources_file, hours).await,
        Some(Commands::Cleanup { days }) => commands::cleanup::run(&config, days).await,
        Some(Commands::Articles { region, source, limit }) => {
            let query = ArticleQuery {
                region,
                source_name: source,
                limit,
            };
            commands::articles::run(&config, query).await
        }
        Some(Commands::Stats { runs }) => commands::stats::run(&config, runs).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_expands_to_every_format() {
        let config = AppConfig::default();
        assert_eq!(
            resolve_formats(&[FormatArg::Csv, FormatArg::All], &config),
            ExportFormat::ALL.to_vec()
        );
    }

    #[test]
    fn test_formats_default_to_config_and_dedup() {
        let config = AppConfig::default();
        assert_eq!(resolve_formats(&[], &config), vec![ExportFormat::Json]);
        assert_eq!(
            resolve_formats(&[FormatArg::Csv, FormatArg::Sqlite, FormatArg::Csv], &config),
            vec![ExportFormat::Csv, ExportFormat::Sqlite]
        );
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

//! Clickfeed: clickstream feed importer for analytics warehouses

use anyhow::Result;
use clap::{Parser, Subcommand};
use clickfeed::config::{Config, LogFormat};
use clickfeed::feed::{grouping, PipelineBuilder};
use clickfeed::sink::CsvSink;
use clickfeed::source::DropDirSource;
use std::path::{Path, PathBuf};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_CONFIG_FILE: &str = "clickfeed.toml";

#[derive(Parser)]
#[command(name = "clickfeed")]
#[command(about = "Clickstream feed importer for analytics warehouses")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, enrich, and export every pending partition
    Run {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what is waiting in the drop directory without processing it
    Scan,

    /// Initialize a new clickfeed configuration
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_found) = resolve_config(&cli.config)?;

    // Verbosity flags override the configured level
    let log_level = match cli.verbose {
        0 => config.logging.level.to_level(),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let builder = FmtSubscriber::builder().with_max_level(log_level);
    match config.logging.format {
        LogFormat::Text => {
            tracing::subscriber::set_global_default(builder.with_target(false).finish())?
        }
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }

    // Init bootstraps the config file, so a missing one is expected there
    if !config_found && !matches!(cli.command, Commands::Init { .. }) {
        warn!("No '{}' found; using built-in defaults", DEFAULT_CONFIG_FILE);
    }

    match cli.command {
        Commands::Run { json } => run_feed(config, json),
        Commands::Scan => scan_drop_dir(config),
        Commands::Init { path } => init_config(path),
    }
}

// A missing file is tolerated only for the default path (the bool reports
// whether one was loaded); an explicitly requested path that does not exist
// is an error, not a silent fallback.
fn resolve_config(path: &Path) -> Result<(Config, bool)> {
    if path.exists() {
        return Ok((Config::load(path)?, true));
    }
    if path != Path::new(DEFAULT_CONFIG_FILE) {
        anyhow::bail!("Config file '{}' not found", path.display());
    }
    Ok((Config::default(), false))
}

fn run_feed(config: Config, json: bool) -> Result<()> {
    std::fs::create_dir_all(&config.processing.work_dir)?;

    let source = DropDirSource::new(&config.endpoint.drop_dir, &config.processing.work_dir);
    let sink = CsvSink::new(&config.warehouse.out_dir, config.warehouse.dataset.clone());

    let mut pipeline = PipelineBuilder::new(config)
        .with_source(source)
        .with_sink(sink)
        .build()?;

    let report = pipeline.run()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_summary();
    }

    if report.failed_count() > 0 {
        anyhow::bail!("{} partition(s) failed", report.failed_count());
    }
    Ok(())
}

fn scan_drop_dir(config: Config) -> Result<()> {
    let drop_dir = &config.endpoint.drop_dir;
    let mut names = Vec::new();
    let mut manifests = 0usize;
    for entry in std::fs::read_dir(drop_dir)? {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            if name.ends_with(".txt") {
                manifests += 1;
            } else {
                names.push(name);
            }
        }
    }
    names.sort();

    let (index, skipped) = grouping::group_files(&names);

    println!("Drop directory: {}", drop_dir.display());
    println!("==============");
    println!("Files waiting:     {}", names.len());
    println!("Manifests (left):  {}", manifests);
    println!("Unrecognized:      {}", skipped.len());
    println!("Partitions:        {}", index.len());

    if !index.is_empty() {
        println!("\nPartitions:");
        for (key, entry) in index.iter() {
            let bundle = if entry.lookup_archive.is_some() {
                "lookup bundle present"
            } else {
                "lookup bundle MISSING"
            };
            println!("  {}: {} data file(s), {}", key, entry.data_files.len(), bundle);
        }
    }

    if !skipped.is_empty() {
        println!("\nUnrecognized names:");
        for skip in &skipped {
            println!("  {}", skip.name);
        }
    }

    Ok(())
}

fn init_config(path: PathBuf) -> Result<()> {
    let config = Config::default();
    let config_path = path.join(DEFAULT_CONFIG_FILE);

    // Generate TOML config
    let toml_content = format!(
        r#"# Clickfeed Configuration

[endpoint]
host = "{}"
username = ""
password = ""
drop_dir = "drop"

[warehouse]
project_id = ""
credential_path = ""
dataset = "{}"
out_dir = "warehouse"
chunk_size = {}

[processing]
keep_post_only = {}
work_dir = "work"
max_retries = {}
retry_delay_ms = {}

[logging]
format = "text"
level = "info"
"#,
        config.endpoint.host,
        config.warehouse.dataset,
        config.warehouse.chunk_size,
        config.processing.keep_post_only,
        config.processing.max_retries,
        config.processing.retry_delay_ms,
    );

    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    for dir in ["drop", "work", "warehouse"] {
        let dir_path = path.join(dir);
        std::fs::create_dir_all(&dir_path)?;
        println!("Created directory: {}", dir_path.display());
    }

    Ok(())
}

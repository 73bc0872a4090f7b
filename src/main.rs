//! romscout - command-line entry point.
//!
//! # Execution Flow
//!
//! 1. Load settings from `<config dir>/romscout.yaml` and `ROMSCOUT_*` variables
//! 2. Initialize logging → `<log dir>/romscout.<date>`
//! 3. Load the configuration list and drop disabled entries
//! 4. Run the discovery pipeline on a tokio runtime
//! 5. Write the run output as YAML to stdout or `--output`

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use romscout::{APP_NAME, ConfigManager, Pipeline, PipelineOptions, VERSION};
use std::fs;

#[derive(Debug, Parser)]
#[command(name = "romscout", version, about = "Discover game files and build shortcut metadata")]
struct Cli {
    /// Directory holding configurations.yaml and romscout.yaml
    #[arg(long, default_value = "romscout-data")]
    config_dir: Utf8PathBuf,

    /// Configuration list to run instead of <config-dir>/configurations.yaml
    #[arg(long)]
    configs: Option<Utf8PathBuf>,

    /// Write the run output here instead of stdout
    #[arg(short, long)]
    output: Option<Utf8PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Also log to stderr
    #[arg(long)]
    console: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config_manager = ConfigManager::new(&cli.config_dir)?;
    if let Some(path) = &cli.configs {
        config_manager = config_manager.with_configurations_path(path);
    }
    let settings = config_manager.load_settings()?;

    let _guard = romscout::logging::setup_logging_with_console(
        &settings.log_dir,
        &settings.log_prefix,
        settings.debug_mode || cli.debug,
        settings.console_logging || cli.console,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let configurations: Vec<_> = config_manager
        .load_configurations()?
        .into_iter()
        .filter(|config| {
            if !config.enabled {
                tracing::info!("Skipping disabled configuration {}", config.display_name());
            }
            config.enabled
        })
        .collect();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("romscout-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let pipeline = Pipeline::with_defaults().with_options(PipelineOptions {
        timeout: settings.operation_timeout(),
    });

    let output = runtime.block_on(pipeline.run(&configurations)).map_err(|e| {
        tracing::error!("Run failed: {}", e);
        anyhow::Error::new(e).context("Discovery run failed")
    })?;

    if output.no_accounts_found && configurations.iter().any(|c| !c.steam_directory.is_empty()) {
        eprintln!("warning: no user accounts were found");
    }

    let yaml = serde_yaml_ng::to_string(&output).context("Failed to serialize run output")?;
    match &cli.output {
        Some(path) => {
            fs::write(path, yaml).with_context(|| format!("Failed to write output: {}", path))?;
            tracing::info!("Wrote run output to {}", path);
        }
        None => print!("{}", yaml),
    }

    Ok(())
}

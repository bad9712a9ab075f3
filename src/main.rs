//! Binary entry point: resolve the configuration once, start file logging,
//! build the HTTP client, and drive the ratatui event loop until the user
//! exits.
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use partitura_browser::config::{data_dir, API_URL_ENV};
use partitura_browser::download::ImageDownloader;
use partitura_browser::logging::init_logging;
use partitura_browser::{run_app, App, Config, HttpSheetClient, Overrides};

#[derive(Parser)]
#[command(
    name = "partitura-browser",
    version,
    about = "Browse sheet music and recommendations from the terminal"
)]
struct Cli {
    #[arg(long, help = "Root URL of the partituras API (overrides config and environment)")]
    api_base: Option<String>,

    #[arg(short, long, help = "Path to the config file")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Number of recommendations to request per sheet")]
    recommendations: Option<usize>,

    #[arg(long, help = "tracing filter, e.g. info or partitura_browser=debug")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load_from(&config_path)?.apply(Overrides {
        env_api_base: env::var(API_URL_ENV).ok(),
        cli_api_base: cli.api_base,
        recommendation_count: cli.recommendations,
        log_level: cli.log_level,
    });
    config.validate()?;

    let _guard = init_logging(&data_dir()?.join("logs"), &config.log_level)?;
    info!(api_base = %config.api_base, config = %config_path.display(), "starting partitura browser");

    let client = HttpSheetClient::new(&config.api_base, config.request_timeout())
        .context("failed to build HTTP client")?;
    let downloader = ImageDownloader::from_config(&config);

    let mut app = App::new(config, Arc::new(client), downloader);
    run_app(&mut app)
}

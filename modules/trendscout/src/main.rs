use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bing_client::BingClient;
use chrome_surface::ChromeSurface;
use spotify_client::SpotifyClient;
use trendscout::enrichment::{DistroStage, FeatureStage};
use trendscout::store::JsonFileStore;
use trendscout::{AppConfig, HarvestConfig, Harvester};

#[derive(Parser)]
#[command(name = "trendscout", about = "Trending hashtag and music harvester")]
struct Cli {
    /// Path to a harvest config TOML file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape the trending listings from the dashboard
    Harvest {
        /// Scrape only one listing
        #[arg(long, value_enum)]
        only: Option<Listing>,
    },
    /// Attach audio features to the harvested tracks
    Features,
    /// Flag self-distributed tracks via video search
    Distro,
    /// Harvest, then both enrichment stages
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum Listing {
    Hashtags,
    Music,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trendscout=info".parse()?))
        .init();

    let cli = Cli::parse();
    let app = AppConfig::from_env();
    let harvest_config = match &cli.config {
        Some(path) => HarvestConfig::load(path)?,
        None => HarvestConfig::default(),
    };
    let store = JsonFileStore::new(&app.output_dir);

    match cli.command {
        Command::Harvest { only } => harvest(&app, harvest_config, &store, only).await?,
        Command::Features => features(&app, &store).await?,
        Command::Distro => distro(&app, &store).await?,
        Command::All => {
            harvest(&app, harvest_config, &store, None).await?;
            features(&app, &store).await?;
            distro(&app, &store).await?;
        }
    }

    Ok(())
}

async fn open_surface(app: &AppConfig) -> Result<ChromeSurface> {
    match &app.chrome_ws_url {
        Some(url) => {
            info!(url = url.as_str(), "Connecting to remote browser");
            ChromeSurface::connect(url)
                .await
                .context("Failed to connect to browser")
        }
        None => {
            info!(headless = app.chrome_headless, "Launching local browser");
            ChromeSurface::launch(app.chrome_headless)
                .await
                .context("Failed to launch browser")
        }
    }
}

async fn harvest(
    app: &AppConfig,
    config: HarvestConfig,
    store: &JsonFileStore,
    only: Option<Listing>,
) -> Result<()> {
    let surface = open_surface(app).await?;
    let result = run_harvest(&surface, store, config, only).await;

    // Close regardless of how the harvest ended.
    if let Err(e) = surface.close().await {
        warn!(error = %e, "Failed to close browser");
    }
    result
}

async fn run_harvest(
    surface: &ChromeSurface,
    store: &JsonFileStore,
    config: HarvestConfig,
    only: Option<Listing>,
) -> Result<()> {
    let harvester = Harvester::new(surface, store, config);
    match only {
        Some(Listing::Hashtags) => {
            let hashtags = harvester.harvest_hashtags().await?;
            info!(hashtags = hashtags.len(), "Harvest finished");
        }
        Some(Listing::Music) => {
            let music = harvester.harvest_music().await?;
            info!(music = music.len(), "Harvest finished");
        }
        None => {
            let report = harvester.run().await?;
            info!(%report, "Harvest finished");
        }
    }
    Ok(())
}

async fn features(app: &AppConfig, store: &JsonFileStore) -> Result<()> {
    let (client_id, client_secret) = app
        .spotify_credentials()
        .context("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET are required for the features stage")?;

    let stage = FeatureStage::new(SpotifyClient::new(client_id, client_secret));
    let tracks = stage.run(store).await?;
    info!(tracks = tracks.len(), "Feature stage finished");
    Ok(())
}

async fn distro(app: &AppConfig, store: &JsonFileStore) -> Result<()> {
    let api_key = app
        .bing_api_key
        .clone()
        .context("BING_API_KEY is required for the distro stage")?;

    let stage = DistroStage::new(BingClient::new(api_key));
    let rows = stage.run(store).await?;
    info!(tracks = rows.len(), "Distro stage finished");
    Ok(())
}

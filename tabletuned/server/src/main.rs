mod server;
mod services;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Result, WrapErr};
use libtabletune_queue::tabletune_queue::{
    BarProfile, HttpCatalogResolver, Settings, StaticBarDirectory, TabletuneQueue,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tabletuned", about = "Song request queue daemon for table-side jukeboxes")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "TABLETUNE_ADDR", default_value = "127.0.0.1:7632")]
    addr: SocketAddr,
    /// Base URL of the track catalog service
    #[arg(long, env = "TABLETUNE_CATALOG_URL")]
    catalog_url: String,
    /// JSON file listing bar profiles (id, active flag, tables, settings)
    #[arg(long, env = "TABLETUNE_BARS_FILE")]
    bars_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let directory = match &args.bars_file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("error reading bars file {}", path.display()))?;
            let profiles: Vec<BarProfile> =
                serde_json::from_str(&contents).wrap_err("error parsing bars file")?;
            info!("loaded {} bar profiles from {}", profiles.len(), path.display());
            StaticBarDirectory::new(profiles)
        }
        None => {
            warn!("no bars file configured, accepting any bar with default settings");
            StaticBarDirectory::permissive()
        }
    };

    let settings = Settings::default();
    let resolver = HttpCatalogResolver::new(&args.catalog_url, settings.resolver_timeout)?;
    let queue = Arc::new(TabletuneQueue::new(
        Arc::new(directory),
        Arc::new(resolver),
        settings,
    ));

    server::run(args.addr, queue).await
}

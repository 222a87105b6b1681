use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stage_gen::{CachedGenerator, PlaceholderSynthesizer};
use stage_server::{app, Hub, HubConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stage_server=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bind = env::var("STAGE_BIND").unwrap_or_else(|_| "127.0.0.1:8765".to_string());
    let asset_dir = env::var("STAGE_ASSET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("stage-assets"));
    let public_origin =
        env::var("STAGE_PUBLIC_ORIGIN").unwrap_or_else(|_| format!("http://{bind}"));

    let config = HubConfig {
        public_origin,
        asset_dir: asset_dir.clone(),
    };
    let generator = Arc::new(CachedGenerator::new(asset_dir, PlaceholderSynthesizer));
    let hub = Arc::new(Hub::new(
        config,
        Box::new(stage_nlu::parse_command),
        generator,
    ));

    let listener = TcpListener::bind(&bind).await?;
    info!(addr = %listener.local_addr()?, "stage server listening");
    axum::serve(listener, app(hub)).await?;
    Ok(())
}

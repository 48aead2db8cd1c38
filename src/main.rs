use std::env;
use std::sync::Arc;

use axum::{Router, routing::get};
use log::*;
use tokio::net::TcpListener;

use birdquiz::catalog::Catalog;
use birdquiz::server::{AppState, start_ws_server};

async fn health_check() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    info!("Starting birdquiz backend");

    let catalog = match env::var("CATALOG_PATH") {
        Ok(path) => {
            info!("Loading catalog from {path}");
            Arc::new(Catalog::from_json_file(&path)?)
        }
        Err(_) => {
            warn!("CATALOG_PATH not set, using the built-in sample catalog");
            Arc::new(Catalog::sample())
        }
    };

    let ws_addr = env::var("BIRDQUIZ_WS_ADDR").unwrap_or_else(|_| "0.0.0.0:9002".to_string());
    let health_addr = env::var("BIRDQUIZ_HEALTH_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let state = Arc::new(AppState::new(catalog));
    let ws_listener = TcpListener::bind(&ws_addr).await?;
    let health_listener = TcpListener::bind(&health_addr).await?;
    let health_app = Router::new().route("/health", get(health_check));

    tokio::select! {
        _ = start_ws_server(ws_listener, state) => {},
        _ = axum::serve(health_listener, health_app) => {},
    }

    Ok(())
}

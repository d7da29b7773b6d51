#![allow(dead_code)]

mod config;
mod document;
mod protocol;
mod rate_limit;
mod routes;
mod services;
mod session;
mod state;

use std::sync::Arc;

use services::store::{DocumentStore, HttpStore, MemoryStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env();

    let store: Arc<dyn DocumentStore> = match &config.store_url {
        Some(url) => {
            let store = HttpStore::new(url).expect("document store client build failed");
            tracing::info!(store_url = %url, "document store configured");
            Arc::new(store)
        }
        None => {
            tracing::warn!("STORE_URL not set — using in-memory store, documents will not survive restarts");
            Arc::new(MemoryStore::default())
        }
    };

    let port = config.port;
    let state = state::AppState::new(config, store);

    // Spawn the background warm-save sweep.
    let _saver = services::saver::spawn_save_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "inkboard listening");
    axum::serve(listener, app).await.expect("server failed");
}

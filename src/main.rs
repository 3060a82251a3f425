use clap::Parser;

use caregate::client::BackendClient;
use caregate::config;
use caregate::proxy::{app, AppState};

#[derive(Debug, Parser)]
#[command(name = "caregate", about = "Multi-tenant healthcare admin API gateway")]
struct Args {
    /// Port to listen on (overrides CAREGATE_PORT / PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Backend base URL (overrides BACKEND_BASE_URL)
    #[arg(long)]
    backend: Option<String>,
}

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up BACKEND_BASE_URL etc.
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();

    tracing_subscriber::fmt::init();
    tracing::info!("Starting caregate in {:?} mode", config.environment);

    let backend_url = args
        .backend
        .unwrap_or_else(|| config.backend.base_url.clone());
    let state = AppState::new(BackendClient::new(&backend_url));

    // Allow tests or deployments to override port via env
    let port = args
        .port
        .or_else(|| {
            std::env::var("CAREGATE_PORT")
                .ok()
                .or_else(|| std::env::var("PORT").ok())
                .and_then(|s| s.parse::<u16>().ok())
        })
        .unwrap_or(4000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("caregate listening on http://{} -> {}", bind_addr, backend_url);

    axum::serve(listener, app(state)).await.expect("server");
}

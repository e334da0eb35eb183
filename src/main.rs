mod actions;
mod auth;
mod calendar;
mod config;
mod constants;
mod db;
mod error;
mod handlers;
mod llm;
mod macros;
mod planner;
mod scraping;
mod server;
mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kitchenos_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = server::run().await {
        tracing::error!("Error: {:?}", err);
        std::process::exit(1);
    }
}

pub mod api;
pub mod auth;
pub mod blob;
pub mod category;
pub mod error;
pub mod feedback;
pub mod mail;
pub mod state;
pub mod storage;

use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

pub async fn run() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_env_filter(EnvFilter::from_env("FEEDS_LOG"))
        .init();

    let state = state::AppState::new(
        storage::init_db_from_env().await,
        auth::Keys::from_env(),
        mail::Mailer::from_env(),
        blob::BlobStore::from_env(),
    );

    api::run_server(state).await
}

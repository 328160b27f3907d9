pub mod account;
pub mod auth;
pub mod campaigns;
pub mod contact;
pub mod donations;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod registration;
pub mod reset;
pub mod routes;
pub mod validation;

use std::sync::Arc;

use mockable::Clock;
use tracing::error;

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Run blocking DB or hashing work off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        anyhow::Error::from(e)
    })?
}

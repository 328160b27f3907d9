mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use manavjyot_api::SharedClock;
use manavjyot_api::auth::{AppState, AppStateInner};
use manavjyot_api::payments::{PaymentGateway, StripeGateway};
use manavjyot_api::reset::{ResetSettings, ResetTokenManager};
use manavjyot_api::routes;
use manavjyot_db::Database;
use manavjyot_mail::{HttpMailer, LogMailer, Mailer};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manavjyot=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(Database::open(&config.db_path)?);
    info!("Database ready at {}", config.db_path.display());

    let mailer: Arc<dyn Mailer> = match &config.mail {
        Some(mail) => Arc::new(HttpMailer::new(&mail.api_url, &mail.api_key)?),
        None => {
            warn!("No mail API configured, outgoing e-mail will only be logged");
            Arc::new(LogMailer)
        }
    };

    let payments: Option<Arc<dyn PaymentGateway>> = match &config.stripe_secret {
        Some(secret) => Some(Arc::new(StripeGateway::new(secret)?)),
        None => {
            warn!("No Stripe secret configured, donations are disabled");
            None
        }
    };

    let clock: SharedClock = Arc::new(mockable::DefaultClock);
    let reset = ResetTokenManager::new(
        Arc::clone(&db),
        Arc::clone(&mailer),
        Arc::clone(&clock),
        ResetSettings {
            ttl: chrono::Duration::seconds(config.reset_ttl_secs),
            sender: config.site_email.clone(),
            public_url: config.public_url.clone(),
        },
    );

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        mailer,
        payments,
        reset,
        clock,
        site_email: config.site_email.clone(),
    });

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Manavjyot server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

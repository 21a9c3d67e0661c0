use std::sync::Arc;

use anyhow::anyhow;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedback_board::app::auth::AuthService;
use feedback_board::app::feedback::{FeedbackService, SEED_ITEMS};
use feedback_board::config::{AppConfig, SessionBackend};
use feedback_board::http;
use feedback_board::infra::db::Db;
use feedback_board::infra::sessions::{MemorySessionStore, RedisSessionStore, SessionStore};
use feedback_board::infra::store::{AccountStore, FeedbackStore, PgAccountStore, PgFeedbackStore};
use feedback_board::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect_with_retry(&config).await?;
    db.migrate().await?;

    let feedback: Arc<dyn FeedbackStore> = Arc::new(PgFeedbackStore::new(db.clone()));
    let accounts: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(db.clone()));

    match config.app_mode.as_str() {
        "api" => {
            let sessions: Arc<dyn SessionStore> = match config.session_backend {
                SessionBackend::Redis => Arc::new(RedisSessionStore::connect(&config.redis_url).await?),
                SessionBackend::Memory => {
                    tracing::warn!("using in-process session store; sessions are lost on restart");
                    Arc::new(MemorySessionStore::new())
                }
            };

            let state = AppState::new(&config, feedback, accounts, sessions);
            let app: Router = http::router(state).layer(TraceLayer::new_for_http());
            let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
            tracing::info!("listening on {}", config.http_addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        "create-staff" => {
            let username = std::env::var("STAFF_USERNAME")
                .map_err(|_| anyhow!("missing required env var: STAFF_USERNAME"))?;
            let password = std::env::var("STAFF_PASSWORD")
                .map_err(|_| anyhow!("missing required env var: STAFF_PASSWORD"))?;

            // Sessions are not touched when provisioning accounts.
            let service = AuthService::new(accounts, Arc::new(MemorySessionStore::new()), 0);
            let account = service.create_staff(&username, &password).await?;
            tracing::info!(user_id = account.id, username = %account.username, "staff account ready");
        }
        "clear-feedback" => {
            let confirmed = std::env::var("CONFIRM_CLEAR")
                .map(|value| value.eq_ignore_ascii_case("yes"))
                .unwrap_or(false);
            if !confirmed {
                return Err(anyhow!(
                    "refusing to delete all feedback without CONFIRM_CLEAR=yes"
                ));
            }
            let removed = FeedbackService::new(feedback).clear().await?;
            tracing::info!(removed, "deleted all feedback entries");
        }
        "seed-feedback" => {
            let created = FeedbackService::new(feedback).seed(SEED_ITEMS).await?;
            tracing::info!(created, "populated feedback items");
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

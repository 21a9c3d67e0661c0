use anyhow::{anyhow, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::AppConfig;

const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.db_idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(config.db_max_lifetime_seconds))
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Startup-only retry loop; request handling never retries.
    pub async fn connect_with_retry(config: &AppConfig) -> Result<Self> {
        let attempts = config.db_connect_attempts.max(1);
        for attempt in 1..=attempts {
            match Self::connect(config).await {
                Ok(db) => {
                    tracing::info!(attempt, "database available");
                    return Ok(db);
                }
                Err(err) if attempt < attempts => {
                    tracing::warn!(error = %err, attempt, "database unavailable, waiting 1 second");
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
                Err(err) => {
                    return Err(anyhow!(
                        "database unavailable after {} attempts: {}",
                        attempts,
                        err
                    ));
                }
            }
        }
        Err(anyhow!("database unavailable"))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

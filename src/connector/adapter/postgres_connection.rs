use std::future::Future;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::domain::DomainError;

const MAX_POOL_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Exponential retry schedule: `base_delay * 2^attempt`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds or the policy runs out of attempts.
/// Returns the last error.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &BackoffPolicy,
    what: &str,
    mut operation: F,
) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    what,
                    attempt + 1,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.dbname)
        .username(&config.user)
        .password(&config.password)
}

/// A named connection pool to one of the two databases.
#[derive(Debug, Clone)]
pub struct PostgresConnection {
    pool: PgPool,
    label: String,
}

impl PostgresConnection {
    pub async fn connect(
        label: &str,
        config: &DatabaseConfig,
        policy: &BackoffPolicy,
    ) -> Result<Self, DomainError> {
        let what = format!("Connection to {} database ({})", label, config.redacted());

        let pool = retry_with_backoff(policy, &what, move || async move {
            let pool = PgPoolOptions::new()
                .max_connections(MAX_POOL_CONNECTIONS)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect_with(connect_options(config))
                .await
                .map_err(|e| DomainError::connection(format!("{}: {}", label, e)))?;

            sqlx::query("SELECT 1")
                .execute(&pool)
                .await
                .map_err(|e| DomainError::connection(format!("{}: {}", label, e)))?;

            Ok(pool)
        })
        .await?;

        info!("Connected to {} database: {}", label, config.redacted());

        Ok(Self::from_pool(label, pool))
    }

    pub fn from_pool(label: &str, pool: PgPool) -> Self {
        Self {
            pool,
            label: label.to_string(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed {} database connection", self.label);
    }
}

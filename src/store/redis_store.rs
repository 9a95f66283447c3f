use super::{Connectivity, GpsStore, StoreError, StoreStatus};
use crate::config::StoreConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, RedisResult};
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Build the Redis connection URL for `config`.
///
/// With `redact` set the password is replaced by `***` so the URL can be
/// logged.
pub fn redis_url(config: &StoreConfig, redact: bool) -> String {
    let auth = match config.password.as_deref() {
        Some(password) if !password.is_empty() => {
            if redact {
                ":***@".to_string()
            } else {
                format!(":{}@", urlencoding::encode(password))
            }
        }
        _ => String::new(),
    };
    format!("redis://{}{}:{}/{}", auth, config.host, config.port, config.db)
}

/// Errors that mean the connection itself is gone, not just the command
fn is_connection_error(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
}

struct Inner {
    client: redis::Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    connectivity: Connectivity,
    connect_timeout: Duration,
    command_timeout: Duration,
    retry_delay: Duration,
}

impl Inner {
    /// Clone the live connection, or report the store unavailable
    fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        if !self.connectivity.current().is_available() {
            return Err(StoreError::Unavailable);
        }
        self.connection
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(StoreError::Unavailable)
    }

    fn replace_connection(&self, conn: Option<MultiplexedConnection>) {
        *self.connection.write().unwrap_or_else(|e| e.into_inner()) = conn;
    }

    /// Flag the connection as lost; the supervisor reconnects.
    fn connection_lost(&self, op: &str, reason: &str) {
        warn!(op = op, reason = reason, "Redis connection lost");
        self.connectivity.transition(StoreStatus::Error);
    }
}

/// Redis-backed store adapter.
///
/// A supervisor task owns the connection lifecycle: it connects (bounded by
/// the connect timeout), marks the adapter ready, and once a command reports
/// the connection lost, marks it errored and reconnects after the retry
/// delay.
pub struct RedisStore {
    inner: Arc<Inner>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl RedisStore {
    /// Create the client and start connecting in the background.
    ///
    /// Must be called from within a Tokio runtime. Only fails if the
    /// connection settings cannot form a valid Redis address.
    pub fn connect(config: &StoreConfig) -> Result<Arc<Self>> {
        let client = redis::Client::open(redis_url(config, false))
            .context("Invalid Redis connection settings")?;

        info!(url = %redis_url(config, true), "Connecting to Redis");

        let inner = Arc::new(Inner {
            client,
            connection: RwLock::new(None),
            connectivity: Connectivity::new(StoreStatus::Connecting),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            command_timeout: Duration::from_millis(config.command_timeout_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        });

        let handle = tokio::spawn(supervise(Arc::clone(&inner)));

        Ok(Arc::new(Self {
            inner,
            supervisor: Mutex::new(Some(handle)),
        }))
    }

    /// Run one command against the live connection, bounded by the command
    /// timeout.
    async fn run<T, F, Fut>(&self, op: &'static str, command: F) -> Result<T, StoreError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.inner.connection()?;

        match timeout(self.inner.command_timeout, command(conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if is_connection_error(&e) {
                    self.inner.connection_lost(op, &e.to_string());
                }
                Err(StoreError::OperationFailed(format!("{} failed: {}", op, e)))
            }
            Err(_) => {
                self.inner.connection_lost(op, "command timed out");
                Err(StoreError::OperationFailed(format!("{} timed out", op)))
            }
        }
    }
}

/// Connection supervisor loop; exits once the adapter is closed.
async fn supervise(inner: Arc<Inner>) {
    let mut status_rx = inner.connectivity.subscribe();

    loop {
        if inner.connectivity.current() == StoreStatus::Closed {
            return;
        }
        inner.connectivity.transition(StoreStatus::Connecting);

        match timeout(
            inner.connect_timeout,
            inner.client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(Ok(conn)) => {
                inner.replace_connection(Some(conn));
                info!("Redis client is ready");
                inner.connectivity.transition(StoreStatus::Ready);

                // Hold the connection until a command reports it lost
                let lost = status_rx
                    .wait_for(|status| *status != StoreStatus::Ready)
                    .await
                    .is_ok();
                if !lost {
                    return;
                }
                inner.replace_connection(None);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to connect to Redis");
                inner.connectivity.transition(StoreStatus::Error);
            }
            Err(_) => {
                warn!(
                    timeout_ms = inner.connect_timeout.as_millis() as u64,
                    "Timed out connecting to Redis"
                );
                inner.connectivity.transition(StoreStatus::Error);
            }
        }

        debug!(
            retry_delay_ms = inner.retry_delay.as_millis() as u64,
            "Retrying Redis connection"
        );
        sleep(inner.retry_delay).await;
    }
}

#[async_trait]
impl GpsStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.run("GET", |mut conn| async move {
            let value: Option<String> = conn.get(key).await?;
            Ok::<_, RedisError>(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        let value = value.to_string();
        self.run("SET", |mut conn| async move {
            let _: () = conn.set(key, value).await?;
            Ok::<_, RedisError>(())
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.run("PING", |mut conn| async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, RedisError>(())
        })
        .await
    }

    fn status(&self) -> StoreStatus {
        self.inner.connectivity.current()
    }

    fn subscribe(&self) -> tokio::sync::watch::Receiver<StoreStatus> {
        self.inner.connectivity.subscribe()
    }

    async fn close(&self) {
        let handle = self
            .supervisor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }

        self.inner.replace_connection(None);

        if self.inner.connectivity.transition(StoreStatus::Closed) {
            info!("Redis connection closed");
        }
    }
}

impl Drop for RedisStore {
    fn drop(&mut self) {
        if let Ok(mut supervisor) = self.supervisor.lock() {
            if let Some(handle) = supervisor.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(password: Option<&str>) -> StoreConfig {
        StoreConfig {
            host: "redis.internal".to_string(),
            port: 6380,
            db: 2,
            password: password.map(|p| p.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_without_password() {
        assert_eq!(redis_url(&config(None), false), "redis://redis.internal:6380/2");
        assert_eq!(redis_url(&config(Some("")), false), "redis://redis.internal:6380/2");
    }

    #[test]
    fn test_url_encodes_password() {
        assert_eq!(
            redis_url(&config(Some("p@ss/word")), false),
            "redis://:p%40ss%2Fword@redis.internal:6380/2"
        );
    }

    #[test]
    fn test_url_redacts_password() {
        let url = redis_url(&config(Some("secret")), true);
        assert_eq!(url, "redis://:***@redis.internal:6380/2");
        assert!(!url.contains("secret"));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unavailable() {
        // Port 1 on localhost refuses connections
        let cfg = StoreConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_ms: 200,
            retry_delay_ms: 50,
            ..Default::default()
        };
        let store = RedisStore::connect(&cfg).unwrap();

        assert!(!store.is_available());
        assert_eq!(store.get("gps_data").await, Err(StoreError::Unavailable));
        assert_eq!(store.set("gps_data", "{}").await, Err(StoreError::Unavailable));

        store.close().await;
        assert_eq!(store.status(), StoreStatus::Closed);
    }
}

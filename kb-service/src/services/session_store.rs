//! Per-session transcript storage.
//!
//! Transcripts are created on first access holding only the seeded system
//! turn, appended to after every exchange and reset by `clear`.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use super::locks::KeyedLocks;
use super::metrics;
use crate::models::{Transcript, Turn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    #[error("Stored transcript is corrupt: {0}")]
    Corrupt(String),

    #[error("Session store timed out after {0}s")]
    Timeout(u64),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Transcript for `session_id`, creating the seeded one if absent.
    async fn get(&self, session_id: &str) -> Result<Transcript, StoreError>;

    /// Append `turns` in order as one atomic update.
    async fn append(&self, session_id: &str, turns: Vec<Turn>) -> Result<(), StoreError>;

    /// Reset to the seeded transcript. Idempotent.
    async fn clear(&self, session_id: &str) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Transcript>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Transcript, StoreError> {
        if let Some(transcript) = self.sessions.read().await.get(session_id) {
            return Ok(transcript.clone());
        }
        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .entry(session_id.to_string())
            .or_insert_with(Transcript::seeded)
            .clone())
    }

    async fn append(&self, session_id: &str, turns: Vec<Turn>) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let transcript = sessions
            .entry(session_id.to_string())
            .or_insert_with(Transcript::seeded);
        for turn in turns {
            transcript.push(turn);
        }
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), Transcript::seeded());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// Redis
// ============================================================================

#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    pub url: String,
    pub key_prefix: String,
    pub ttl_seconds: u64,
    pub timeout: Duration,
}

/// Transcripts stored as JSON arrays under `{prefix}:{session_id}`.
/// Every write refreshes the expiry.
#[derive(Clone)]
pub struct RedisSessionStore {
    _client: Client,
    manager: ConnectionManager,
    key_prefix: String,
    ttl_seconds: u64,
    timeout: Duration,
    locks: KeyedLocks,
}

impl RedisSessionStore {
    pub async fn new(config: &RedisStoreConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(host = %redis_host(&config.url), "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
            key_prefix: config.key_prefix.clone(),
            ttl_seconds: config.ttl_seconds,
            timeout: config.timeout,
            locks: KeyedLocks::new(),
        })
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}:{}", self.key_prefix, session_id)
    }

    async fn bounded<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let result = match tokio::time::timeout(self.timeout, f).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout.as_secs())),
        };
        if let Err(e) = &result {
            tracing::error!(operation, error = %e, "Session store operation failed");
            metrics::record_store_error(operation);
        }
        result
    }

    async fn read(&self, key: &str) -> Result<Option<Transcript>, StoreError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        raw.map(|json| {
            serde_json::from_str::<Transcript>(&json).map_err(|e| StoreError::Corrupt(e.to_string()))
        })
        .transpose()
    }

    async fn write(&self, key: &str, transcript: &Transcript) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(transcript).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(json)
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

/// Host and port of a Redis URL, for logs. Credentials are never included.
fn redis_host(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => "<unknown>".to_string(),
        },
        Err(_) => "<unparseable>".to_string(),
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &str) -> Result<Transcript, StoreError> {
        let key = self.key(session_id);
        self.bounded("get", async {
            let _guard = self.locks.lock(&key).await;
            match self.read(&key).await? {
                Some(transcript) => Ok(transcript),
                None => {
                    let transcript = Transcript::seeded();
                    self.write(&key, &transcript).await?;
                    Ok(transcript)
                }
            }
        })
        .await
    }

    async fn append(&self, session_id: &str, turns: Vec<Turn>) -> Result<(), StoreError> {
        let key = self.key(session_id);
        self.bounded("append", async {
            let _guard = self.locks.lock(&key).await;
            let mut transcript = self.read(&key).await?.unwrap_or_else(Transcript::seeded);
            for turn in turns {
                transcript.push(turn);
            }
            self.write(&key, &transcript).await
        })
        .await
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        let key = self.key(session_id);
        self.bounded("clear", async {
            let _guard = self.locks.lock(&key).await;
            self.write(&key, &Transcript::seeded()).await
        })
        .await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.bounded("health_check", async {
            let mut conn = self.manager.clone();
            redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .map(|_| ())
                .map_err(|e| StoreError::Unavailable(format!("Redis health check failed: {}", e)))
        })
        .await
    }
}

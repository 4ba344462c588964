use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde_json::Value;
use tracing::debug;

use crate::data::kv_backend::{BackendError, BackendKind, KvBackend};

/// Collections stored as JSON strings under `{namespace}:{key}`.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisBackend {
    /// Connects and issues a `PING`; both steps are bounded by `timeout`.
    pub async fn connect(
        redis_url: &str,
        namespace: &str,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(1);
        let client = Client::open(redis_url).map_err(unavailable)?;

        let conn = tokio::time::timeout(
            timeout,
            client.get_connection_manager_with_config(config),
        )
        .await
        .map_err(|_| BackendError::Unavailable(format!("connect timed out after {timeout:?}")))?
        .map_err(unavailable)?;

        let mut probe = conn.clone();
        let pong: String = tokio::time::timeout(timeout, redis::cmd("PING").query_async(&mut probe))
            .await
            .map_err(|_| BackendError::Unavailable(format!("ping timed out after {timeout:?}")))?
            .map_err(unavailable)?;
        debug!(%pong, "redis probe answered");

        Ok(Self {
            conn,
            namespace: namespace.to_string(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, BackendError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.namespaced(key)).await.map_err(unavailable)?;
        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|err| BackendError::Corrupt {
                key: key.to_string(),
                reason: err.to_string(),
            })
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.namespaced(key), value.to_string())
            .await
            .map_err(unavailable)
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.namespaced(key))
            .await
            .map_err(unavailable)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }
}

fn unavailable(err: redis::RedisError) -> BackendError {
    BackendError::Unavailable(err.to_string())
}

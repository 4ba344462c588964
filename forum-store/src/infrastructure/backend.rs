use std::sync::Arc;

use tracing::{info, warn};

use crate::data::backends::memory_backend::MemoryBackend;
use crate::data::backends::redis_backend::RedisBackend;
use crate::data::kv_backend::KvBackend;
use crate::infrastructure::settings::Settings;

/// Probe the remote store once. Any failure falls back to process memory for
/// the rest of the run; the choice is never revisited.
pub async fn select_backend(settings: &Settings) -> Arc<dyn KvBackend> {
    let Some(redis_url) = settings.redis_url.as_deref() else {
        info!("REDIS_URL not set, using in-memory store");
        return Arc::new(MemoryBackend::new());
    };

    match RedisBackend::connect(redis_url, &settings.kv_namespace, settings.kv_connect_timeout)
        .await
    {
        Ok(backend) => {
            info!(namespace = %settings.kv_namespace, "using redis store");
            Arc::new(backend)
        }
        Err(err) => {
            warn!(error = %err, "redis unreachable, falling back to in-memory store");
            Arc::new(MemoryBackend::new())
        }
    }
}

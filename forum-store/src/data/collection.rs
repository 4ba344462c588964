//! Typed access to whole-collection keys.
//!
//! Every mutation is read -> transform -> write of the entire value. The
//! sequence runs under an async mutex owned by the key, so writers in this
//! process never interleave on the same collection. Writers in other
//! processes sharing the backend are not covered.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::data::kv_backend::{BackendError, BackendKind, KvBackend};
use crate::domain::error::DomainError;

pub(crate) mod keys {
    pub(crate) const CATEGORIES: &str = "categories";
    pub(crate) const POSTS: &str = "posts";
    pub(crate) const REPLIES: &str = "replies";
    pub(crate) const USERS: &str = "users";
    pub(crate) const MEETS: &str = "meets";
    pub(crate) const GROUPS: &str = "groups";
    pub(crate) const REWARDS_SETTINGS: &str = "rewards_settings";
    pub(crate) const USER_REWARDS: &str = "user_rewards";
    pub(crate) const INITIALIZED: &str = "initialized";
    pub(crate) const PARKED_AWARDS: &str = "parked_awards";
}

/// Result of a transform: whether the new value must be written back.
pub(crate) enum Mutation<R> {
    Commit(R),
    Discard(R),
}

#[derive(Default)]
struct KeyLocks(Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>);

impl KeyLocks {
    fn for_key(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }
}

#[derive(Clone)]
pub struct CollectionStore {
    backend: Arc<dyn KvBackend>,
    locks: Arc<KeyLocks>,
}

impl CollectionStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            locks: Arc::new(KeyLocks::default()),
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub(crate) async fn read<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, DomainError> {
        let Some(value) = self.backend.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| corrupt(key, err))
    }

    /// Absent collections read as empty.
    pub(crate) async fn read_all<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Vec<T>, DomainError> {
        Ok(self.read::<Vec<T>>(key).await?.unwrap_or_default())
    }

    pub(crate) async fn write<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), DomainError> {
        let value = serde_json::to_value(value)
            .map_err(|err| DomainError::Unexpected(format!("serialize {key}: {err}")))?;
        self.backend.set(key, value).await?;
        Ok(())
    }

    /// Guarded read-modify-write of a single value. An `Err` from `apply`
    /// or a `Mutation::Discard` leaves the stored value untouched.
    pub(crate) async fn mutate<T, R, F>(&self, key: &str, apply: F) -> Result<R, DomainError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Option<T>) -> Result<Mutation<R>, DomainError>,
    {
        let lock = self.locks.for_key(key);
        let _guard = lock.lock().await;

        let mut current = self.read::<T>(key).await?;
        match apply(&mut current)? {
            Mutation::Discard(out) => Ok(out),
            Mutation::Commit(out) => {
                match &current {
                    Some(value) => self.write(key, value).await?,
                    None => self.backend.delete(key).await?,
                }
                debug!(key, "collection committed");
                Ok(out)
            }
        }
    }

    pub(crate) async fn mutate_all<T, R, F>(&self, key: &str, apply: F) -> Result<R, DomainError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> Result<Mutation<R>, DomainError>,
    {
        self.mutate::<Vec<T>, R, _>(key, |slot| {
            let items = slot.get_or_insert_with(Vec::new);
            apply(items)
        })
        .await
    }
}

fn corrupt(key: &str, err: serde_json::Error) -> DomainError {
    DomainError::Backend(BackendError::Corrupt {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

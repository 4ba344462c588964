//! Shared test doubles: a settable clock, gate and backend fakes, and a
//! wired in-memory forum.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use serde_json::Value;

use crate::data::backends::memory_backend::MemoryBackend;
use crate::data::entity_repository::StoreGate;
use crate::data::kv_backend::{BackendError, BackendKind, KvBackend};
use crate::domain::error::DomainError;
use crate::domain::user::{NewUserRequest, Role, User};
use crate::forum::Forum;
use crate::infrastructure::clock::SharedClock;
use crate::infrastructure::settings::Settings;

pub(crate) const ADMIN_EMAIL: &str = "admin@forum.local";

pub(crate) struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }

    pub(crate) fn advance(&self, delta: chrono::Duration) {
        *self.lock_clock() += delta;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now()
    }
}

fn start_of_test() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0)
        .single()
        .expect("fixed test instant")
}

pub(crate) fn fixed_clock() -> SharedClock {
    Arc::new(MutableClock::new(start_of_test()))
}

/// Gate for repositories tested without a bootstrapper.
pub(crate) struct OpenGate;

#[async_trait]
impl StoreGate for OpenGate {
    async fn ensure_initialized(&self) -> Result<bool, DomainError> {
        Ok(false)
    }
}

/// Memory backend that yields between read and write, so unguarded
/// read-modify-write sequences would interleave.
#[derive(Default)]
pub(crate) struct SlowBackend {
    inner: MemoryBackend,
}

impl SlowBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for SlowBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, BackendError> {
        let value = self.inner.get(key).await?;
        tokio::time::sleep(Duration::from_millis(1)).await;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), BackendError> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.inner.delete(key).await
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

/// Memory backend whose writes to chosen keys fail as unavailable.
#[derive(Default)]
pub(crate) struct FlakyBackend {
    inner: MemoryBackend,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FlakyBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_writes_to(&self, key: &str) {
        self.failing
            .lock()
            .expect("failing keys mutex poisoned")
            .insert(key.to_string());
    }

    pub(crate) fn heal(&self) {
        self.failing
            .lock()
            .expect("failing keys mutex poisoned")
            .clear();
    }

    fn is_failing(&self, key: &str) -> bool {
        self.failing
            .lock()
            .expect("failing keys mutex poisoned")
            .contains(key)
    }
}

#[async_trait]
impl KvBackend for FlakyBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, BackendError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), BackendError> {
        if self.is_failing(key) {
            return Err(BackendError::Unavailable(format!("write to {key} refused")));
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.inner.delete(key).await
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

pub(crate) struct TestForum {
    pub(crate) forum: Forum,
    pub(crate) clock: Arc<MutableClock>,
}

impl TestForum {
    /// Registers `{name}@example.com` as a regular member.
    pub(crate) async fn register(&self, name: &str) -> User {
        self.forum
            .users()
            .register_user(NewUserRequest {
                username: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: "$argon2id$test".to_string(),
                role: Role::User,
            })
            .await
            .expect("register test user")
    }
}

pub(crate) async fn test_forum() -> TestForum {
    test_forum_on(Arc::new(MemoryBackend::new())).await
}

/// Wired forum over `backend`, already seeded.
pub(crate) async fn test_forum_on(backend: Arc<dyn KvBackend>) -> TestForum {
    let clock = Arc::new(MutableClock::new(start_of_test()));
    let forum = Forum::with_backend(backend, &Settings::in_memory(), clock.clone());
    forum.ensure_initialized().await.expect("bootstrap test forum");
    TestForum { forum, clock }
}

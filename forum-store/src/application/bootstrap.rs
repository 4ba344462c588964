use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::data::collection::{CollectionStore, Mutation, keys};
use crate::data::entity_repository::StoreGate;
use crate::domain::category::{Category, NewCategoryRequest};
use crate::domain::error::DomainError;
use crate::domain::rewards::RewardsSettings;
use crate::domain::user::{NewUserRequest, Role, User};
use crate::infrastructure::clock::SharedClock;
use crate::infrastructure::ids::new_id;
use crate::infrastructure::password::hash_password;
use crate::infrastructure::settings::AdminSeed;

const DEFAULT_CATEGORIES: [(&str, &str, &str, &str); 5] = [
    (
        "General Discussion",
        "Talk about anything community related",
        "#3b82f6",
        "message-circle",
    ),
    (
        "Announcements",
        "News and updates from the team",
        "#ef4444",
        "megaphone",
    ),
    (
        "Help & Support",
        "Ask questions and get help",
        "#10b981",
        "life-buoy",
    ),
    (
        "Events & Meets",
        "Plan and discuss meetups",
        "#f59e0b",
        "calendar",
    ),
    ("Off Topic", "Everything else", "#8b5cf6", "coffee"),
];

/// Seeds default categories, the admin account and rewards settings once,
/// then records the `initialized` flag.
///
/// Seeding is serialized in-process and each step skips records that are
/// already present, so repeated or concurrent calls never duplicate data.
pub struct Bootstrapper {
    store: CollectionStore,
    clock: SharedClock,
    admin: AdminSeed,
    ready: AtomicBool,
    seeding: Mutex<()>,
}

impl Bootstrapper {
    pub fn new(store: CollectionStore, clock: SharedClock, admin: AdminSeed) -> Self {
        Self {
            store,
            clock,
            admin,
            ready: AtomicBool::new(false),
            seeding: Mutex::new(()),
        }
    }

    /// Returns `true` only for the call that performed the seeding.
    pub async fn ensure_initialized(&self) -> Result<bool, DomainError> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(false);
        }

        let _seeding = self.seeding.lock().await;
        if self.ready.load(Ordering::Acquire) {
            return Ok(false);
        }

        if self.store.read::<bool>(keys::INITIALIZED).await? == Some(true) {
            self.ready.store(true, Ordering::Release);
            return Ok(false);
        }

        let categories = self.seed_categories().await?;
        let admin_created = self.seed_admin().await?;
        let settings_created = self.seed_rewards_settings().await?;
        self.store.write(keys::INITIALIZED, &true).await?;
        self.ready.store(true, Ordering::Release);

        info!(
            categories,
            admin_created, settings_created, "store bootstrap completed"
        );
        Ok(true)
    }

    async fn seed_categories(&self) -> Result<usize, DomainError> {
        let now = self.clock.utc();
        self.store
            .mutate_all(keys::CATEGORIES, |categories: &mut Vec<Category>| {
                let mut added = 0;
                for (name, description, color, icon) in DEFAULT_CATEGORIES {
                    if categories.iter().any(|c| c.name == name) {
                        continue;
                    }
                    let req = NewCategoryRequest {
                        name: name.to_string(),
                        description: description.to_string(),
                        color: Some(color.to_string()),
                        icon: Some(icon.to_string()),
                        private: false,
                        moderators: Vec::new(),
                    };
                    categories.push(Category::new(new_id("cat", now), req, now));
                    added += 1;
                }
                if added == 0 {
                    return Ok(Mutation::Discard(0));
                }
                Ok(Mutation::Commit(added))
            })
            .await
    }

    async fn seed_admin(&self) -> Result<bool, DomainError> {
        let existing: Vec<User> = self.store.read_all(keys::USERS).await?;
        if existing.iter().any(|u| u.has_email(&self.admin.email)) {
            return Ok(false);
        }

        let req = NewUserRequest {
            username: self.admin.username.clone(),
            email: self.admin.email.clone(),
            password_hash: hash_password(&self.admin.password)?,
            role: Role::Admin,
        }
        .validate()?;
        let now = self.clock.utc();

        self.store
            .mutate_all(keys::USERS, |users: &mut Vec<User>| {
                if users.iter().any(|u| u.has_email(&req.email)) {
                    return Ok(Mutation::Discard(false));
                }
                if users.iter().any(|u| u.has_username(&req.username)) {
                    warn!(username = %req.username, "admin username taken, skipping admin seed");
                    return Ok(Mutation::Discard(false));
                }
                users.push(User::new(new_id("user", now), req, now));
                Ok(Mutation::Commit(true))
            })
            .await
    }

    async fn seed_rewards_settings(&self) -> Result<bool, DomainError> {
        let now = self.clock.utc();
        self.store
            .mutate(keys::REWARDS_SETTINGS, |slot: &mut Option<RewardsSettings>| {
                if slot.is_some() {
                    return Ok(Mutation::Discard(false));
                }
                *slot = Some(RewardsSettings::defaults(now));
                Ok(Mutation::Commit(true))
            })
            .await
    }
}

#[async_trait]
impl StoreGate for Bootstrapper {
    async fn ensure_initialized(&self) -> Result<bool, DomainError> {
        Bootstrapper::ensure_initialized(self).await
    }
}

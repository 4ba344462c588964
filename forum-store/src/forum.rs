use std::sync::Arc;

use tracing::info;

use crate::application::award_outbox::AwardOutbox;
use crate::application::bootstrap::Bootstrapper;
use crate::application::community_service::CommunityService;
use crate::application::content_service::ContentService;
use crate::application::rewards_ledger::RewardsLedger;
use crate::application::user_service::UserService;
use crate::data::collection::CollectionStore;
use crate::data::entity_repository::{EntityRepository, StoreGate};
use crate::data::kv_backend::{BackendKind, KvBackend};
use crate::domain::error::DomainError;
use crate::infrastructure::backend::select_backend;
use crate::infrastructure::clock::{SharedClock, system_clock};
use crate::infrastructure::settings::Settings;

/// Wired services over one backend. Cheap to clone; every clone shares the
/// store, its per-key locks and the bootstrap state.
#[derive(Clone)]
pub struct Forum {
    store: CollectionStore,
    bootstrap: Arc<Bootstrapper>,
    content: Arc<ContentService>,
    community: Arc<CommunityService>,
    users: Arc<UserService>,
    rewards: Arc<RewardsLedger>,
    outbox: Arc<AwardOutbox>,
    leaderboard_limit: usize,
}

impl Forum {
    /// Select the backend from settings and wire the services on the system clock.
    pub async fn connect(settings: &Settings) -> Self {
        let backend = select_backend(settings).await;
        Self::with_backend(backend, settings, system_clock())
    }

    pub fn with_backend(
        backend: Arc<dyn KvBackend>,
        settings: &Settings,
        clock: SharedClock,
    ) -> Self {
        let store = CollectionStore::new(backend);
        let bootstrap = Arc::new(Bootstrapper::new(
            store.clone(),
            clock.clone(),
            settings.admin.clone(),
        ));
        let gate: Arc<dyn StoreGate> = bootstrap.clone();

        let users = EntityRepository::new(store.clone(), clock.clone(), gate.clone());
        let posts = EntityRepository::new(store.clone(), clock.clone(), gate.clone());
        let replies = EntityRepository::new(store.clone(), clock.clone(), gate.clone());
        let categories = EntityRepository::new(store.clone(), clock.clone(), gate.clone());
        let meets = EntityRepository::new(store.clone(), clock.clone(), gate.clone());
        let groups = EntityRepository::new(store.clone(), clock.clone(), gate.clone());

        let rewards = Arc::new(RewardsLedger::new(
            store.clone(),
            users.clone(),
            gate,
            clock,
        ));
        let outbox = Arc::new(AwardOutbox::new(store.clone()));
        let content = Arc::new(ContentService::new(
            posts,
            replies,
            categories,
            users.clone(),
            rewards.clone(),
            outbox.clone(),
        ));
        let community = Arc::new(CommunityService::new(meets, groups, users.clone()));
        let users = Arc::new(UserService::new(users));

        info!(backend = ?store.backend_kind(), "forum store wired");
        Self {
            store,
            bootstrap,
            content,
            community,
            users,
            rewards,
            outbox,
            leaderboard_limit: settings.leaderboard_limit,
        }
    }

    /// Seeds the store if needed. Every service call does this implicitly;
    /// returns `true` only when this call performed the seeding.
    pub async fn ensure_initialized(&self) -> Result<bool, DomainError> {
        self.bootstrap.ensure_initialized().await
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.store.backend_kind()
    }

    pub fn leaderboard_limit(&self) -> usize {
        self.leaderboard_limit
    }

    pub fn content(&self) -> &ContentService {
        &self.content
    }

    pub fn community(&self) -> &CommunityService {
        &self.community
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    pub fn rewards(&self) -> &Arc<RewardsLedger> {
        &self.rewards
    }

    pub fn outbox(&self) -> &AwardOutbox {
        &self.outbox
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &CollectionStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Forum;
    use crate::data::backends::memory_backend::MemoryBackend;
    use crate::data::kv_backend::BackendKind;
    use crate::infrastructure::settings::Settings;
    use crate::test_support::fixed_clock;

    #[tokio::test]
    async fn connect_without_redis_uses_memory() {
        let forum = Forum::connect(&Settings::in_memory()).await;
        assert_eq!(forum.backend_kind(), BackendKind::Memory);
        assert_eq!(forum.leaderboard_limit(), 10);
    }

    #[tokio::test]
    async fn first_service_call_seeds_the_store() {
        let forum = Forum::with_backend(
            Arc::new(MemoryBackend::new()),
            &Settings::in_memory(),
            fixed_clock(),
        );
        let categories = forum.content().list_categories(false).await.expect("list");
        assert_eq!(categories.len(), 5);
        assert!(!forum.ensure_initialized().await.expect("bootstrap"));
    }
}

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::data::collection::{CollectionStore, Mutation};
use crate::domain::error::DomainError;
use crate::infrastructure::clock::SharedClock;
use crate::infrastructure::ids::new_id;

/// How `delete` treats a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    /// Flip the record's lifecycle and keep it in the collection.
    Soft,
    /// Filter the record out of the collection.
    Hard,
}

pub(crate) trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KEY: &'static str;
    const ID_PREFIX: &'static str;
    const REMOVAL: Removal;

    fn id(&self) -> &str;

    /// Soft-delete hook. Returns `false` when the record was already deleted.
    fn mark_deleted(&mut self, _now: DateTime<Utc>) -> bool {
        true
    }
}

/// Called before any repository access so the store is seeded on first use.
#[async_trait]
pub(crate) trait StoreGate: Send + Sync {
    async fn ensure_initialized(&self) -> Result<bool, DomainError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteResult {
    Deleted,
    AlreadyDeleted,
    NotFound,
}

pub(crate) struct EntityRepository<T> {
    store: CollectionStore,
    clock: SharedClock,
    gate: Arc<dyn StoreGate>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            gate: self.gate.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> EntityRepository<T> {
    pub(crate) fn new(store: CollectionStore, clock: SharedClock, gate: Arc<dyn StoreGate>) -> Self {
        Self {
            store,
            clock,
            gate,
            _entity: PhantomData,
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    pub(crate) async fn list(&self) -> Result<Vec<T>, DomainError> {
        self.gate.ensure_initialized().await?;
        self.store.read_all(T::KEY).await
    }

    pub(crate) async fn get_by_id(&self, id: &str) -> Result<Option<T>, DomainError> {
        Ok(self.list().await?.into_iter().find(|item| item.id() == id))
    }

    pub(crate) async fn find<P>(&self, predicate: P) -> Result<Option<T>, DomainError>
    where
        P: Fn(&T) -> bool,
    {
        Ok(self.list().await?.into_iter().find(|item| predicate(item)))
    }

    pub(crate) async fn create<B>(&self, build: B) -> Result<T, DomainError>
    where
        B: FnOnce(String, DateTime<Utc>) -> T,
    {
        self.create_checked(build, |_, _| Ok(())).await
    }

    /// Create with a check against the current collection, evaluated inside
    /// the same guarded mutation as the append.
    pub(crate) async fn create_checked<B, C>(&self, build: B, check: C) -> Result<T, DomainError>
    where
        B: FnOnce(String, DateTime<Utc>) -> T,
        C: FnOnce(&[T], &T) -> Result<(), DomainError>,
    {
        self.gate.ensure_initialized().await?;
        let now = self.now();
        let item = build(new_id(T::ID_PREFIX, now), now);

        self.store
            .mutate_all(T::KEY, |items: &mut Vec<T>| {
                check(items, &item)?;
                items.push(item.clone());
                Ok(Mutation::Commit(()))
            })
            .await?;
        Ok(item)
    }

    /// Apply `patch` to the record with `id`. `Ok(None)` means not found;
    /// an `Err` from `patch` aborts without writing.
    pub(crate) async fn update<F>(&self, id: &str, patch: F) -> Result<Option<T>, DomainError>
    where
        F: FnOnce(&mut T) -> Result<(), DomainError>,
    {
        self.gate.ensure_initialized().await?;
        self.store
            .mutate_all(T::KEY, |items: &mut Vec<T>| {
                let Some(item) = items.iter_mut().find(|item| item.id() == id) else {
                    return Ok(Mutation::Discard(None));
                };
                patch(item)?;
                Ok(Mutation::Commit(Some(item.clone())))
            })
            .await
    }

    /// Apply `patch` to every record matching `predicate` in one rewrite.
    /// `patch` returns whether it changed the record. Returns the change count.
    pub(crate) async fn update_where<P, F>(&self, predicate: P, mut patch: F) -> Result<usize, DomainError>
    where
        P: Fn(&T) -> bool,
        F: FnMut(&mut T) -> bool,
    {
        self.gate.ensure_initialized().await?;
        self.store
            .mutate_all(T::KEY, |items: &mut Vec<T>| {
                let changed = items
                    .iter_mut()
                    .filter(|item| predicate(item))
                    .fold(0, |count, item| count + usize::from(patch(item)));
                if changed == 0 {
                    return Ok(Mutation::Discard(0));
                }
                Ok(Mutation::Commit(changed))
            })
            .await
    }

    pub(crate) async fn delete(&self, id: &str) -> Result<DeleteResult, DomainError> {
        self.gate.ensure_initialized().await?;
        let now = self.now();
        self.store
            .mutate_all(T::KEY, |items: &mut Vec<T>| match T::REMOVAL {
                Removal::Hard => {
                    let before = items.len();
                    items.retain(|item| item.id() != id);
                    if items.len() == before {
                        return Ok(Mutation::Discard(DeleteResult::NotFound));
                    }
                    Ok(Mutation::Commit(DeleteResult::Deleted))
                }
                Removal::Soft => {
                    let Some(item) = items.iter_mut().find(|item| item.id() == id) else {
                        return Ok(Mutation::Discard(DeleteResult::NotFound));
                    };
                    if !item.mark_deleted(now) {
                        return Ok(Mutation::Discard(DeleteResult::AlreadyDeleted));
                    }
                    Ok(Mutation::Commit(DeleteResult::Deleted))
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    use super::{DeleteResult, Entity, EntityRepository, Removal};
    use crate::data::backends::memory_backend::MemoryBackend;
    use crate::data::collection::CollectionStore;
    use crate::domain::error::DomainError;
    use crate::test_support::{OpenGate, fixed_clock};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        id: String,
        body: String,
        deleted: bool,
    }

    impl Entity for Note {
        const KEY: &'static str = "notes";
        const ID_PREFIX: &'static str = "note";
        const REMOVAL: Removal = Removal::Soft;

        fn id(&self) -> &str {
            &self.id
        }

        fn mark_deleted(&mut self, _now: DateTime<Utc>) -> bool {
            !std::mem::replace(&mut self.deleted, true)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Tag {
        id: String,
    }

    impl Entity for Tag {
        const KEY: &'static str = "tags";
        const ID_PREFIX: &'static str = "tag";
        const REMOVAL: Removal = Removal::Hard;

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn repo<T: Entity>() -> EntityRepository<T> {
        let store = CollectionStore::new(Arc::new(MemoryBackend::new()));
        EntityRepository::new(store, fixed_clock(), Arc::new(OpenGate))
    }

    fn note(body: &str) -> impl FnOnce(String, DateTime<Utc>) -> Note + '_ {
        move |id, _| Note {
            id,
            body: body.to_string(),
            deleted: false,
        }
    }

    #[tokio::test]
    async fn create_assigns_prefixed_id_and_appends() {
        let repo = repo::<Note>();
        let first = repo.create(note("a")).await.expect("create");
        let second = repo.create(note("b")).await.expect("create");

        assert!(first.id.starts_with("note-"));
        assert_ne!(first.id, second.id);
        let listed = repo.list().await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].body, "b");
    }

    #[tokio::test]
    async fn update_missing_id_is_none() {
        let repo = repo::<Note>();
        let updated = repo
            .update("note-missing", |n| {
                n.body = "x".into();
                Ok(())
            })
            .await
            .expect("update");
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn failing_check_rejects_create() {
        let repo = repo::<Note>();
        let err = repo
            .create_checked(note("a"), |_, _| {
                Err(DomainError::AlreadyExists("note".into()))
            })
            .await
            .expect_err("check must fail");
        assert!(matches!(err, DomainError::AlreadyExists(_)));
        assert!(repo.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn soft_delete_keeps_record_and_reports_repeat() {
        let repo = repo::<Note>();
        let created = repo.create(note("a")).await.expect("create");

        assert_eq!(repo.delete(&created.id).await.expect("delete"), DeleteResult::Deleted);
        assert_eq!(
            repo.delete(&created.id).await.expect("delete"),
            DeleteResult::AlreadyDeleted
        );
        let stored = repo.get_by_id(&created.id).await.expect("get").expect("kept");
        assert!(stored.deleted);
    }

    #[tokio::test]
    async fn hard_delete_filters_record_out() {
        let repo = repo::<Tag>();
        let created = repo.create(|id, _| Tag { id }).await.expect("create");

        assert_eq!(repo.delete(&created.id).await.expect("delete"), DeleteResult::Deleted);
        assert_eq!(repo.delete(&created.id).await.expect("delete"), DeleteResult::NotFound);
        assert!(repo.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn update_where_counts_changes() {
        let repo = repo::<Note>();
        for body in ["a", "b", "a"] {
            repo.create(note(body)).await.expect("create");
        }
        let changed = repo
            .update_where(|n| n.body == "a", |n| n.mark_deleted(Utc::now()))
            .await
            .expect("update_where");
        assert_eq!(changed, 2);

        let again = repo
            .update_where(|n| n.body == "a", |n| n.mark_deleted(Utc::now()))
            .await
            .expect("update_where");
        assert_eq!(again, 0);
    }
}

//! Follow-up point awards produced by content actions.
//!
//! A content operation commits first, then hands the awards it produced to
//! `dispatch`. `dispatch` returns a report, never an error: an award that
//! fails with a retryable error is logged and parked, a permanent failure is
//! logged and dropped, and the content operation has already succeeded
//! either way. Parked awards are written under their own key so that
//! `retry_failed` can pick them up from any process sharing the backend.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::rewards_ledger::RewardsLedger;
use crate::data::collection::{CollectionStore, Mutation, keys};
use crate::domain::error::DomainError;
use crate::domain::rewards::ActionKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAward {
    pub user_id: String,
    pub action: ActionKind,
    pub reason: String,
}

impl PendingAward {
    pub fn new(user_id: impl Into<String>, action: ActionKind, reason: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            action,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub applied: usize,
    pub parked: usize,
    pub dropped: usize,
}

pub struct AwardOutbox {
    store: CollectionStore,
    /// Parked awards not yet written to the store.
    local: Mutex<Vec<PendingAward>>,
    persisting: tokio::sync::Mutex<()>,
}

/// Awards of one dispatch that have not been applied yet. Dropping it with
/// awards left (a cancelled dispatch) parks them instead of losing them.
struct InFlight<'a> {
    outbox: &'a AwardOutbox,
    remaining: VecDeque<PendingAward>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.remaining.is_empty() {
            return;
        }
        warn!(
            count = self.remaining.len(),
            "award dispatch interrupted, parking unapplied awards"
        );
        self.outbox.park_local(self.remaining.drain(..));
    }
}

impl AwardOutbox {
    pub fn new(store: CollectionStore) -> Self {
        Self {
            store,
            local: Mutex::new(Vec::new()),
            persisting: tokio::sync::Mutex::new(()),
        }
    }

    /// Every parked award, stored or still held in memory.
    pub async fn parked(&self) -> Result<Vec<PendingAward>, DomainError> {
        let mut parked: Vec<PendingAward> = self.store.read_all(keys::PARKED_AWARDS).await?;
        parked.extend(self.lock_local().iter().cloned());
        Ok(parked)
    }

    /// Apply `awards` one at a time against the ledger.
    pub async fn dispatch(
        &self,
        ledger: &RewardsLedger,
        awards: Vec<PendingAward>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut in_flight = InFlight {
            outbox: self,
            remaining: awards.into(),
        };

        while let Some(award) = in_flight.remaining.front() {
            let result = ledger
                .award_for_action(&award.user_id, award.action, &award.reason)
                .await;
            let Some(award) = in_flight.remaining.pop_front() else {
                break;
            };
            match result {
                Ok(rewards) => {
                    debug!(
                        user_id = %award.user_id,
                        action = ?award.action,
                        total = rewards.total_points,
                        "award applied"
                    );
                    report.applied += 1;
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        user_id = %award.user_id,
                        action = ?award.action,
                        error = %err,
                        "award failed, parked for retry"
                    );
                    self.park_local([award]);
                    report.parked += 1;
                }
                Err(err) => {
                    warn!(
                        user_id = %award.user_id,
                        action = ?award.action,
                        reason = %award.reason,
                        error = %err,
                        "award failed permanently, dropped"
                    );
                    report.dropped += 1;
                }
            }
        }
        drop(in_flight);

        if report.parked > 0 {
            self.persist_parked().await;
        }
        report
    }

    /// Take every parked award and dispatch it again.
    pub async fn retry_failed(
        &self,
        ledger: &RewardsLedger,
    ) -> Result<DispatchReport, DomainError> {
        let awards = {
            let _persisting = self.persisting.lock().await;
            let mut awards = self
                .store
                .mutate_all(keys::PARKED_AWARDS, |stored: &mut Vec<PendingAward>| {
                    Ok(Mutation::Commit(std::mem::take(stored)))
                })
                .await?;
            awards.append(&mut self.lock_local());
            awards
        };
        debug!(count = awards.len(), "retrying parked awards");
        Ok(self.dispatch(ledger, awards).await)
    }

    /// Move memory-held parked awards to the store. On failure they stay in
    /// memory for the next attempt; a write cut short may store them twice.
    async fn persist_parked(&self) {
        let _persisting = self.persisting.lock().await;
        let snapshot = self.lock_local().clone();
        if snapshot.is_empty() {
            return;
        }

        let result = self
            .store
            .mutate_all(keys::PARKED_AWARDS, |stored: &mut Vec<PendingAward>| {
                stored.extend(snapshot.iter().cloned());
                Ok(Mutation::Commit(()))
            })
            .await;
        match result {
            Ok(()) => {
                let mut local = self.lock_local();
                local.drain(..snapshot.len());
            }
            Err(err) => warn!(
                count = snapshot.len(),
                error = %err,
                "parked awards kept in memory"
            ),
        }
    }

    fn park_local(&self, awards: impl IntoIterator<Item = PendingAward>) {
        self.lock_local().extend(awards);
    }

    fn lock_local(&self) -> std::sync::MutexGuard<'_, Vec<PendingAward>> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

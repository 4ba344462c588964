use std::sync::Arc;

use tracing::{debug, info};

use crate::data::collection::{CollectionStore, Mutation, keys};
use crate::data::entity_repository::{EntityRepository, StoreGate};
use crate::domain::error::{DomainError, RuleViolation};
use crate::domain::rewards::{
    ActionKind, LeaderboardEntry, PointsEntry, Redemption, RewardsSettings, UserRewards,
};
use crate::domain::user::User;
use crate::infrastructure::clock::SharedClock;

/// Point balances, daily caps and coupon redemption.
///
/// All ledgers live under one collection key; each operation is a guarded
/// read-modify-write of that collection, so two awards for the same user
/// cannot overwrite each other within this process.
pub struct RewardsLedger {
    store: CollectionStore,
    users: EntityRepository<User>,
    gate: Arc<dyn StoreGate>,
    clock: SharedClock,
}

impl RewardsLedger {
    pub(crate) fn new(
        store: CollectionStore,
        users: EntityRepository<User>,
        gate: Arc<dyn StoreGate>,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            users,
            gate,
            clock,
        }
    }

    pub async fn get_settings(&self) -> Result<RewardsSettings, DomainError> {
        self.gate.ensure_initialized().await?;
        Ok(self
            .store
            .read(keys::REWARDS_SETTINGS)
            .await?
            .unwrap_or_else(|| RewardsSettings::defaults(self.clock.utc())))
    }

    /// Replaces the settings singleton wholesale.
    pub async fn update_settings(
        &self,
        settings: RewardsSettings,
    ) -> Result<RewardsSettings, DomainError> {
        self.gate.ensure_initialized().await?;
        let mut settings = settings.validate()?;
        settings.last_updated = self.clock.utc();

        self.store
            .mutate(keys::REWARDS_SETTINGS, |slot: &mut Option<RewardsSettings>| {
                *slot = Some(settings.clone());
                Ok(Mutation::Commit(()))
            })
            .await?;
        info!(
            daily_points_limit = settings.daily_points_limit,
            coupons = settings.coupons.len(),
            "rewards settings replaced"
        );
        Ok(settings)
    }

    /// Creates the ledger on first access and applies the daily reset.
    pub async fn get_user_rewards(&self, user_id: &str) -> Result<UserRewards, DomainError> {
        self.ensure_user(user_id).await?;
        self.with_ledger(user_id, |ledger| Ok((ledger.clone(), false)))
            .await
    }

    pub async fn points_history(&self, user_id: &str) -> Result<Vec<PointsEntry>, DomainError> {
        Ok(self.get_user_rewards(user_id).await?.points_history)
    }

    /// Credits `points`, clamped to the user's remaining daily headroom.
    /// With no headroom left this is a no-op returning the unchanged ledger.
    pub async fn award_points(
        &self,
        user_id: &str,
        points: i64,
        reason: &str,
        action_type: ActionKind,
    ) -> Result<UserRewards, DomainError> {
        if points < 0 {
            return Err(DomainError::Validation {
                field: "points",
                message: "must be >= 0",
            });
        }
        self.ensure_user(user_id).await?;
        let daily_limit = self.get_settings().await?.daily_points_limit;
        let now = self.clock.utc();

        self.with_ledger(user_id, |ledger| {
            let awarded = ledger.credit(points, daily_limit, reason, action_type, now);
            if awarded < points {
                debug!(user_id, requested = points, awarded, "award clamped by daily cap");
            }
            Ok((ledger.clone(), awarded > 0))
        })
        .await
    }

    /// Awards the configured value for a content action.
    pub async fn award_for_action(
        &self,
        user_id: &str,
        action: ActionKind,
        reason: &str,
    ) -> Result<UserRewards, DomainError> {
        let settings = self.get_settings().await?;
        let points = settings
            .points
            .for_action(action)
            .ok_or(DomainError::Validation {
                field: "action_type",
                message: "has no configured point value",
            })?;
        self.award_points(user_id, points, reason, action).await
    }

    /// The balance check and the deduction happen inside one guarded
    /// mutation, so concurrent redemptions cannot spend the same points twice.
    pub async fn redeem_coupon(
        &self,
        user_id: &str,
        coupon_id: &str,
    ) -> Result<Redemption, DomainError> {
        self.ensure_user(user_id).await?;
        let settings = self.get_settings().await?;
        let coupon = settings
            .active_coupon(coupon_id)
            .cloned()
            .ok_or_else(|| RuleViolation::CouponUnavailable(coupon_id.to_string()))?;
        let now = self.clock.utc();

        let redemption = self
            .with_ledger(user_id, |ledger| {
                let redemption = ledger.redeem(&coupon, now)?;
                Ok((redemption, true))
            })
            .await?;
        info!(user_id, coupon_id, code = %redemption.coupon_code, "coupon redeemed");
        Ok(redemption)
    }

    /// Top `limit` ledgers by total points with dense ranks starting at 1.
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, DomainError> {
        self.gate.ensure_initialized().await?;
        let mut ledgers: Vec<UserRewards> = self.store.read_all(keys::USER_REWARDS).await?;
        let users = self.users.list().await?;

        ledgers.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        Ok(ledgers
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(idx, ledger)| {
                let username = users
                    .iter()
                    .find(|u| u.id == ledger.user_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                LeaderboardEntry {
                    rank: idx + 1,
                    user_id: ledger.user_id,
                    username,
                    total_points: ledger.total_points,
                }
            })
            .collect())
    }

    async fn ensure_user(&self, user_id: &str) -> Result<(), DomainError> {
        match self.users.get_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("user", user_id)),
        }
    }

    /// Runs `apply` on the user's ledger inside the guarded mutation of the
    /// ledger collection. `apply` reports whether it changed the ledger; lazy
    /// creation and daily resets count as changes too.
    async fn with_ledger<R, F>(&self, user_id: &str, apply: F) -> Result<R, DomainError>
    where
        F: FnOnce(&mut UserRewards) -> Result<(R, bool), DomainError>,
    {
        let now = self.clock.utc();
        let local_now = self.clock.local();

        self.store
            .mutate_all(keys::USER_REWARDS, |ledgers: &mut Vec<UserRewards>| {
                let (idx, created) = match ledgers.iter().position(|l| l.user_id == user_id) {
                    Some(idx) => (idx, false),
                    None => {
                        ledgers.push(UserRewards::new(user_id, now));
                        (ledgers.len() - 1, true)
                    }
                };
                let ledger = &mut ledgers[idx];
                let reset = ledger.roll_daily_window(local_now);
                let (out, changed) = apply(ledger)?;

                if created || reset || changed {
                    Ok(Mutation::Commit(out))
                } else {
                    Ok(Mutation::Discard(out))
                }
            })
            .await
    }
}

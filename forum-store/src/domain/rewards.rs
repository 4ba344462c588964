//! Points economy: per-user ledgers, the global settings singleton and coupons.
//!
//! All arithmetic here is pure; persistence lives in the rewards ledger service.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::error::{DomainError, RuleViolation};

pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Post,
    Reply,
    LikeGiven,
    LikeReceived,
    Redemption,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsEntry {
    pub points: i64,
    pub reason: String,
    pub action_type: ActionKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemedCoupon {
    pub coupon_id: String,
    pub coupon_name: String,
    pub coupon_code: String,
    pub discount: u32,
    pub points_spent: i64,
    pub redeemed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRewards {
    pub user_id: String,
    pub total_points: i64,
    pub daily_points: i64,
    pub last_daily_reset: DateTime<Utc>,
    /// Newest first, at most [`HISTORY_LIMIT`] entries.
    #[serde(default)]
    pub points_history: Vec<PointsEntry>,
    #[serde(default)]
    pub redeemed_coupons: Vec<RedeemedCoupon>,
}

impl UserRewards {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            total_points: 0,
            daily_points: 0,
            last_daily_reset: now,
            points_history: Vec::new(),
            redeemed_coupons: Vec::new(),
        }
    }

    /// Zero `daily_points` when the calendar day of `now` (in its own timezone)
    /// differs from the day of the last reset. Returns whether a reset happened.
    pub fn roll_daily_window<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> bool {
        let last_day = self
            .last_daily_reset
            .with_timezone(&now.timezone())
            .date_naive();
        if last_day == now.date_naive() {
            return false;
        }
        self.daily_points = 0;
        self.last_daily_reset = now.with_timezone(&Utc);
        true
    }

    pub fn daily_headroom(&self, daily_limit: i64) -> i64 {
        (daily_limit - self.daily_points).max(0)
    }

    /// Credit up to `points`, clamped to what remains of today's cap.
    /// Returns the amount actually credited; zero leaves the ledger untouched.
    pub fn credit(
        &mut self,
        points: i64,
        daily_limit: i64,
        reason: &str,
        action_type: ActionKind,
        now: DateTime<Utc>,
    ) -> i64 {
        let awarded = points.max(0).min(self.daily_headroom(daily_limit));
        if awarded == 0 {
            return 0;
        }
        self.total_points += awarded;
        self.daily_points += awarded;
        self.record(PointsEntry {
            points: awarded,
            reason: reason.to_string(),
            action_type,
            timestamp: now,
        });
        awarded
    }

    pub fn redeem(
        &mut self,
        coupon: &Coupon,
        now: DateTime<Utc>,
    ) -> Result<Redemption, RuleViolation> {
        if self.total_points < coupon.points_required {
            return Err(RuleViolation::InsufficientPoints {
                required: coupon.points_required,
                available: self.total_points,
            });
        }

        let coupon_code = coupon_code(coupon.discount, now);
        self.total_points -= coupon.points_required;
        self.redeemed_coupons.push(RedeemedCoupon {
            coupon_id: coupon.id.clone(),
            coupon_name: coupon.name.clone(),
            coupon_code: coupon_code.clone(),
            discount: coupon.discount,
            points_spent: coupon.points_required,
            redeemed_at: now,
        });
        self.record(PointsEntry {
            points: -coupon.points_required,
            reason: format!("Redeemed {}", coupon.name),
            action_type: ActionKind::Redemption,
            timestamp: now,
        });

        Ok(Redemption {
            coupon_code,
            discount: coupon.discount,
            remaining_points: self.total_points,
        })
    }

    fn record(&mut self, entry: PointsEntry) {
        self.points_history.insert(0, entry);
        self.points_history.truncate(HISTORY_LIMIT);
    }
}

/// `CTM{discount}OFF{last 6 digits of the millisecond timestamp}`.
pub fn coupon_code(discount: u32, now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().rem_euclid(1_000_000);
    format!("CTM{discount}OFF{millis:06}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub coupon_code: String,
    pub discount: u32,
    pub remaining_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
    pub name: String,
    pub points_required: i64,
    /// Percentage off.
    pub discount: u32,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointValues {
    pub post: i64,
    pub reply: i64,
    pub like_given: i64,
    pub like_received: i64,
}

impl PointValues {
    /// Configured value for an action; redemptions and manual grants carry their own amount.
    pub fn for_action(&self, action: ActionKind) -> Option<i64> {
        match action {
            ActionKind::Post => Some(self.post),
            ActionKind::Reply => Some(self.reply),
            ActionKind::LikeGiven => Some(self.like_given),
            ActionKind::LikeReceived => Some(self.like_received),
            ActionKind::Redemption | ActionKind::Manual => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsSettings {
    pub points: PointValues,
    pub daily_points_limit: i64,
    pub coupons: Vec<Coupon>,
    pub last_updated: DateTime<Utc>,
}

impl RewardsSettings {
    pub fn defaults(now: DateTime<Utc>) -> Self {
        Self {
            points: PointValues {
                post: 10,
                reply: 5,
                like_given: 1,
                like_received: 2,
            },
            daily_points_limit: 100,
            coupons: vec![
                default_coupon("coupon-5", "5% off", 300, 5),
                default_coupon("coupon-10", "10% off", 700, 10),
                default_coupon("coupon-20", "20% off", 1500, 20),
            ],
            last_updated: now,
        }
    }

    pub fn active_coupon(&self, coupon_id: &str) -> Option<&Coupon> {
        self.coupons
            .iter()
            .find(|coupon| coupon.id == coupon_id && coupon.active)
    }

    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        let values = [
            self.points.post,
            self.points.reply,
            self.points.like_given,
            self.points.like_received,
        ];
        if values.iter().any(|value| *value < 0) {
            return Err(DomainError::Validation {
                field: "points",
                message: "must be >= 0",
            });
        }
        if self.daily_points_limit < 0 {
            return Err(DomainError::Validation {
                field: "daily_points_limit",
                message: "must be >= 0",
            });
        }
        for (idx, coupon) in self.coupons.iter().enumerate() {
            if coupon.id.trim().is_empty() || coupon.points_required <= 0 {
                return Err(DomainError::Validation {
                    field: "coupons",
                    message: "each coupon needs an id and a positive cost",
                });
            }
            if self.coupons[..idx].iter().any(|other| other.id == coupon.id) {
                return Err(DomainError::Validation {
                    field: "coupons",
                    message: "coupon ids must be unique",
                });
            }
        }
        Ok(self)
    }
}

fn default_coupon(id: &str, name: &str, points_required: i64, discount: u32) -> Coupon {
    Coupon {
        id: id.to_string(),
        name: name.to_string(),
        points_required,
        discount,
        active: true,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub username: String,
    pub total_points: i64,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rstest::rstest;

    use super::{
        ActionKind, Coupon, HISTORY_LIMIT, RewardsSettings, UserRewards, coupon_code,
    };
    use crate::domain::error::RuleViolation;

    fn coupon(points_required: i64) -> Coupon {
        Coupon {
            id: "coupon-10".into(),
            name: "10% off".into(),
            points_required,
            discount: 10,
            active: true,
        }
    }

    #[rstest]
    #[case(0, 10, 10)]
    #[case(95, 10, 5)]
    #[case(100, 10, 0)]
    #[case(120, 10, 0)]
    fn credit_clamps_to_daily_headroom(
        #[case] daily_points: i64,
        #[case] points: i64,
        #[case] expected: i64,
    ) {
        let now = Utc::now();
        let mut ledger = UserRewards::new("user-1", now);
        ledger.daily_points = daily_points;

        let awarded = ledger.credit(points, 100, "post", ActionKind::Post, now);

        assert_eq!(awarded, expected);
        assert_eq!(ledger.total_points, expected);
        assert_eq!(ledger.points_history.len(), usize::from(expected > 0));
    }

    #[test]
    fn daily_window_resets_on_new_day_without_touching_total() {
        let yesterday = Utc.with_ymd_and_hms(2026, 3, 9, 23, 0, 0).unwrap();
        let mut ledger = UserRewards::new("user-1", yesterday);
        ledger.credit(40, 100, "post", ActionKind::Post, yesterday);

        let now = yesterday + Duration::hours(2);
        assert!(ledger.roll_daily_window(now));
        assert_eq!(ledger.daily_points, 0);
        assert_eq!(ledger.total_points, 40);
        assert_eq!(ledger.last_daily_reset, now);

        assert!(!ledger.roll_daily_window(now + Duration::minutes(5)));
    }

    #[test]
    fn history_keeps_the_newest_fifty() {
        let start = Utc::now();
        let mut ledger = UserRewards::new("user-1", start);
        for i in 0..60 {
            ledger.credit(
                1,
                1_000,
                &format!("event {i}"),
                ActionKind::Reply,
                start + Duration::seconds(i),
            );
        }
        assert_eq!(ledger.points_history.len(), HISTORY_LIMIT);
        assert_eq!(ledger.points_history[0].reason, "event 59");
        assert_eq!(ledger.total_points, 60);
    }

    #[test]
    fn redeem_exact_balance_leaves_zero() {
        let now = Utc::now();
        let mut ledger = UserRewards::new("user-1", now);
        ledger.total_points = 700;

        let redemption = ledger.redeem(&coupon(700), now).expect("must redeem");

        assert_eq!(redemption.remaining_points, 0);
        assert_eq!(redemption.discount, 10);
        assert!(redemption.coupon_code.starts_with("CTM10OFF"));
        assert_eq!(ledger.points_history[0].points, -700);
        assert_eq!(ledger.redeemed_coupons.len(), 1);
    }

    #[test]
    fn redeem_short_by_one_is_rejected_without_mutation() {
        let now = Utc::now();
        let mut ledger = UserRewards::new("user-1", now);
        ledger.total_points = 699;

        let err = ledger.redeem(&coupon(700), now).expect_err("must fail");

        assert_eq!(
            err,
            RuleViolation::InsufficientPoints {
                required: 700,
                available: 699
            }
        );
        assert_eq!(ledger.total_points, 699);
        assert!(ledger.points_history.is_empty());
        assert!(ledger.redeemed_coupons.is_empty());
    }

    #[test]
    fn coupon_code_uses_last_six_timestamp_digits() {
        let now = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        assert_eq!(coupon_code(15, now), "CTM15OFF123456");

        let padded = Utc.timestamp_millis_opt(1_700_000_000_042).unwrap();
        assert_eq!(coupon_code(5, padded), "CTM5OFF000042");
    }

    #[test]
    fn inactive_coupons_are_not_offered() {
        let mut settings = RewardsSettings::defaults(Utc::now());
        settings.coupons[0].active = false;
        let first_id = settings.coupons[0].id.clone();
        assert!(settings.active_coupon(&first_id).is_none());
        assert!(settings.active_coupon("coupon-10").is_some());
    }

    #[test]
    fn settings_reject_duplicate_coupon_ids() {
        let mut settings = RewardsSettings::defaults(Utc::now());
        settings.coupons.push(coupon(10));
        assert!(settings.validate().is_err());
    }
}

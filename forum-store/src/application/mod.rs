pub mod award_outbox;
pub mod bootstrap;
pub mod community_service;
pub mod content_service;
pub mod rewards_ledger;
pub mod user_service;

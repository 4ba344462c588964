//! Storage and business core of a community forum: posts and replies,
//! categories, users, meets and groups, and a points economy with daily
//! caps and coupon redemption, all persisted as whole collections in a
//! key-value store.

pub mod application;
pub mod data;
pub mod domain;
mod forum;
pub mod infrastructure;
pub mod presentation;

#[cfg(test)]
pub(crate) mod test_support;

pub use forum::Forum;
pub use presentation::envelope::Envelope;

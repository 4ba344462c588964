use chrono::{DateTime, Utc};

use crate::data::collection::keys;
use crate::data::entity_repository::{Entity, Removal};
use crate::domain::category::Category;
use crate::domain::community::{Group, Meet};
use crate::domain::post::{Lifecycle, Post};
use crate::domain::reply::Reply;
use crate::domain::user::User;

fn retire(lifecycle: &mut Lifecycle) -> bool {
    std::mem::replace(lifecycle, Lifecycle::Deleted) == Lifecycle::Active
}

impl Entity for Category {
    const KEY: &'static str = keys::CATEGORIES;
    const ID_PREFIX: &'static str = "cat";
    const REMOVAL: Removal = Removal::Hard;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Post {
    const KEY: &'static str = keys::POSTS;
    const ID_PREFIX: &'static str = "post";
    const REMOVAL: Removal = Removal::Soft;

    fn id(&self) -> &str {
        &self.id
    }

    fn mark_deleted(&mut self, now: DateTime<Utc>) -> bool {
        let changed = retire(&mut self.lifecycle);
        if changed {
            self.updated_at = now;
        }
        changed
    }
}

impl Entity for Reply {
    const KEY: &'static str = keys::REPLIES;
    const ID_PREFIX: &'static str = "reply";
    const REMOVAL: Removal = Removal::Soft;

    fn id(&self) -> &str {
        &self.id
    }

    fn mark_deleted(&mut self, now: DateTime<Utc>) -> bool {
        let changed = retire(&mut self.lifecycle);
        if changed {
            self.updated_at = now;
        }
        changed
    }
}

impl Entity for User {
    const KEY: &'static str = keys::USERS;
    const ID_PREFIX: &'static str = "user";
    const REMOVAL: Removal = Removal::Soft;

    fn id(&self) -> &str {
        &self.id
    }

    /// Users are deactivated, never removed.
    fn mark_deleted(&mut self, _now: DateTime<Utc>) -> bool {
        std::mem::replace(&mut self.is_active, false)
    }
}

impl Entity for Meet {
    const KEY: &'static str = keys::MEETS;
    const ID_PREFIX: &'static str = "meet";
    const REMOVAL: Removal = Removal::Soft;

    fn id(&self) -> &str {
        &self.id
    }

    fn mark_deleted(&mut self, _now: DateTime<Utc>) -> bool {
        retire(&mut self.lifecycle)
    }
}

impl Entity for Group {
    const KEY: &'static str = keys::GROUPS;
    const ID_PREFIX: &'static str = "group";
    const REMOVAL: Removal = Removal::Hard;

    fn id(&self) -> &str {
        &self.id
    }
}

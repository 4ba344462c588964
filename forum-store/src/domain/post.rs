use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::validate::{normalize_optional_email, normalize_required, normalize_tags, same_email};

/// Delete state of a post or reply. `Active -> Deleted` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Active,
    Deleted,
}

/// Moderation toggle, independent of [`Lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    #[serde(default)]
    pub author_email: Option<String>,
    pub category_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub replies: u32,
    pub views: u64,
    pub likes: u64,
    pub pinned: bool,
    pub locked: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub visibility: Visibility,
}

impl Post {
    pub(crate) fn new(id: String, req: NewPostRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: req.title,
            content: req.content,
            author: req.author,
            author_email: req.author_email,
            category_id: req.category_id,
            created_at: now,
            updated_at: now,
            replies: 0,
            views: 0,
            likes: 0,
            pinned: false,
            locked: false,
            tags: req.tags,
            lifecycle: Lifecycle::Active,
            visibility: Visibility::Visible,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Active and not hidden by a moderator.
    pub fn is_public(&self) -> bool {
        self.is_active() && self.visibility == Visibility::Visible
    }

    /// Hidden posts stay listed for staff only.
    pub fn is_listed_for(&self, staff: bool) -> bool {
        self.is_active() && (staff || self.visibility == Visibility::Visible)
    }

    pub fn is_authored_by(&self, email: &str) -> bool {
        self.author_email
            .as_deref()
            .is_some_and(|author| same_email(author, email))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPostRequest {
    pub title: String,
    pub content: String,
    pub author: String,
    pub category_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author_email: Option<String>,
}

impl NewPostRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            title: normalize_title(&self.title)?,
            content: normalize_content(&self.content)?,
            author: normalize_author(&self.author)?,
            category_id: normalize_required(
                "category_id",
                &self.category_id,
                128,
                "must not be empty",
            )?,
            tags: normalize_tags(self.tags),
            author_email: normalize_optional_email("author_email", self.author_email)?,
        })
    }
}

/// Shallow patch: `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl PostPatch {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            title: self.title.as_deref().map(normalize_title).transpose()?,
            content: self.content.as_deref().map(normalize_content).transpose()?,
            category_id: self
                .category_id
                .as_deref()
                .map(|id| normalize_required("category_id", id, 128, "must not be empty"))
                .transpose()?,
            tags: self.tags.map(normalize_tags),
        })
    }

    pub(crate) fn apply_to(self, post: &mut Post, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(category_id) = self.category_id {
            post.category_id = category_id;
        }
        if let Some(tags) = self.tags {
            post.tags = tags;
        }
        post.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter<'a> {
    pub category_id: Option<&'a str>,
    pub include_hidden: bool,
}

pub(crate) fn normalize_author(author: &str) -> Result<String, DomainError> {
    normalize_required("author", author, 64, "must be 1..64 chars")
}

fn normalize_title(title: &str) -> Result<String, DomainError> {
    normalize_required("title", title, 255, "must be 1..255 chars")
}

pub(crate) fn normalize_content(content: &str) -> Result<String, DomainError> {
    normalize_required("content", content, 20_000, "must be 1..20000 chars")
}

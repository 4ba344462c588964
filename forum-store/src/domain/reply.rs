use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::post::{Lifecycle, normalize_author, normalize_content};
use super::validate::{normalize_optional_email, same_email};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    /// Back-reference to the parent post.
    pub post_id: String,
    pub content: String,
    pub author: String,
    #[serde(default)]
    pub author_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes: u64,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

impl Reply {
    pub(crate) fn new(id: String, req: NewReplyRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            post_id: req.post_id,
            content: req.content,
            author: req.author,
            author_email: req.author_email,
            created_at: now,
            updated_at: now,
            likes: 0,
            lifecycle: Lifecycle::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn is_authored_by(&self, email: &str) -> bool {
        self.author_email
            .as_deref()
            .is_some_and(|author| same_email(author, email))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReplyRequest {
    pub post_id: String,
    pub content: String,
    pub author: String,
    #[serde(default)]
    pub author_email: Option<String>,
}

impl NewReplyRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        let post_id = self.post_id.trim();
        if post_id.is_empty() {
            return Err(DomainError::Validation {
                field: "post_id",
                message: "must not be empty",
            });
        }
        Ok(Self {
            post_id: post_id.to_string(),
            content: normalize_content(&self.content)?,
            author: normalize_author(&self.author)?,
            author_email: normalize_optional_email("author_email", self.author_email)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{NewReplyRequest, Reply};
    use crate::domain::error::DomainError;

    #[test]
    fn reply_request_rejects_blank_content() {
        let req = NewReplyRequest {
            post_id: "post-1".into(),
            content: "   ".into(),
            author: "bob".into(),
            author_email: None,
        };
        let err = req.validate().expect_err("content must be rejected");
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "content",
                ..
            }
        ));
    }

    #[test]
    fn new_reply_is_active() {
        let req = NewReplyRequest {
            post_id: " post-1 ".into(),
            content: "hi".into(),
            author: "bob".into(),
            author_email: Some("bob@example.com".into()),
        }
        .validate()
        .expect("must validate");
        let reply = Reply::new("reply-1".into(), req, Utc::now());
        assert!(reply.is_active());
        assert_eq!(reply.post_id, "post-1");
        assert!(reply.is_authored_by("BOB@example.com"));
    }
}

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::application::award_outbox::{AwardOutbox, PendingAward};
use crate::application::rewards_ledger::RewardsLedger;
use crate::data::entity_repository::{DeleteResult, Entity, EntityRepository};
use crate::domain::category::{Category, CategoryPatch, NewCategoryRequest};
use crate::domain::error::DomainError;
use crate::domain::post::{NewPostRequest, Post, PostFilter, PostPatch, Visibility};
use crate::domain::reply::{NewReplyRequest, Reply};
use crate::domain::rewards::ActionKind;
use crate::domain::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted { cascaded: usize },
    AlreadyDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    pub likes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub posts_checked: usize,
    pub counters_fixed: usize,
    pub replies_retired: usize,
}

/// Posts, replies and categories, plus the counters tying them together.
///
/// A post's `replies` counter is maintained incrementally by a second write
/// after the reply write. If that second write fails the counter drifts until
/// [`ContentService::reconcile_reply_counts`] runs.
pub struct ContentService {
    posts: EntityRepository<Post>,
    replies: EntityRepository<Reply>,
    categories: EntityRepository<Category>,
    users: EntityRepository<User>,
    rewards: Arc<RewardsLedger>,
    outbox: Arc<AwardOutbox>,
}

impl ContentService {
    pub(crate) fn new(
        posts: EntityRepository<Post>,
        replies: EntityRepository<Reply>,
        categories: EntityRepository<Category>,
        users: EntityRepository<User>,
        rewards: Arc<RewardsLedger>,
        outbox: Arc<AwardOutbox>,
    ) -> Self {
        Self {
            posts,
            replies,
            categories,
            users,
            rewards,
            outbox,
        }
    }

    pub async fn create_post(&self, req: NewPostRequest) -> Result<Post, DomainError> {
        let req = req.validate()?;
        self.require_category(&req.category_id).await?;
        let author_email = req.author_email.clone();

        let post = self.posts.create(|id, now| Post::new(id, req, now)).await?;
        info!(post_id = %post.id, category_id = %post.category_id, "post created");

        if let Some(author) = self.resolve_user(author_email.as_deref()).await {
            let award = PendingAward::new(
                author.id,
                ActionKind::Post,
                format!("Created post: {}", post.title),
            );
            self.flush_awards(vec![award]).await;
        }
        Ok(post)
    }

    /// Hidden posts read as absent here; staff reach them through
    /// `list_posts` with `include_hidden` and the moderation calls.
    pub async fn get_post(&self, post_id: &str) -> Result<Post, DomainError> {
        self.posts
            .get_by_id(post_id)
            .await?
            .filter(Post::is_public)
            .ok_or_else(|| DomainError::not_found("post", post_id))
    }

    /// Active posts, pinned first then newest first.
    pub async fn list_posts(&self, filter: PostFilter<'_>) -> Result<Vec<Post>, DomainError> {
        let mut posts: Vec<Post> = self
            .posts
            .list()
            .await?
            .into_iter()
            .filter(|p| p.is_listed_for(filter.include_hidden))
            .filter(|p| filter.category_id.is_none_or(|id| p.category_id == id))
            .collect();
        posts.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(posts)
    }

    /// Fetch a post for display, counting the view.
    pub async fn view_post(&self, post_id: &str) -> Result<Post, DomainError> {
        self.posts
            .update(post_id, |post| {
                if !post.is_public() {
                    return Err(DomainError::not_found("post", post_id));
                }
                post.views += 1;
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("post", post_id))
    }

    pub async fn update_post(
        &self,
        actor_email: &str,
        post_id: &str,
        patch: PostPatch,
    ) -> Result<Post, DomainError> {
        let patch = patch.validate()?;
        let post = self.active_post(post_id).await?;
        let actor = self.resolve_user(Some(actor_email)).await;
        if !post.is_authored_by(actor_email) && !actor.as_ref().is_some_and(User::is_admin) {
            return Err(DomainError::Forbidden);
        }
        if let Some(category_id) = patch.category_id.as_deref() {
            self.require_category(category_id).await?;
        }

        let now = self.posts.now();
        self.posts
            .update(post_id, |post| {
                patch.apply_to(post, now);
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("post", post_id))
    }

    /// Author or admin only. Soft-deletes the post, then flips every active
    /// reply of it to deleted in one rewrite of the replies collection.
    pub async fn delete_post(
        &self,
        post_id: &str,
        requester_email: &str,
    ) -> Result<DeleteOutcome, DomainError> {
        let post = self
            .posts
            .get_by_id(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("post", post_id))?;
        let requester = self.resolve_user(Some(requester_email)).await;
        if !post.is_authored_by(requester_email) && !requester.as_ref().is_some_and(User::is_admin)
        {
            return Err(DomainError::Forbidden);
        }
        if !post.is_active() {
            return Ok(DeleteOutcome::AlreadyDeleted);
        }

        let now = self.posts.now();
        let mut newly_deleted = false;
        self.posts
            .update(post_id, |post| {
                newly_deleted = post.mark_deleted(now);
                post.replies = 0;
                Ok(())
            })
            .await?;
        if !newly_deleted {
            return Ok(DeleteOutcome::AlreadyDeleted);
        }

        let cascaded = self
            .replies
            .update_where(
                |r| r.post_id == post_id && r.is_active(),
                |r| r.mark_deleted(now),
            )
            .await
            .inspect_err(|err| {
                error!(post_id, error = %err, "post deleted but reply cascade failed");
            })?;
        info!(post_id, cascaded, "post deleted");
        Ok(DeleteOutcome::Deleted { cascaded })
    }

    /// Bumps the like counter. A resolvable liker earns like-given points and,
    /// when the author is a different known user, the author earns
    /// like-received points.
    pub async fn like_post(
        &self,
        post_id: &str,
        liker_email: Option<&str>,
    ) -> Result<LikeOutcome, DomainError> {
        let post = self
            .posts
            .update(post_id, |post| {
                if !post.is_public() {
                    return Err(DomainError::not_found("post", post_id));
                }
                post.likes += 1;
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("post", post_id))?;

        if let Some(liker) = self.resolve_user(liker_email).await {
            let mut awards = Vec::with_capacity(2);
            if let Some(author) = self.resolve_user(post.author_email.as_deref()).await
                && author.id != liker.id
            {
                awards.push(PendingAward::new(
                    author.id,
                    ActionKind::LikeReceived,
                    format!("Post liked: {}", post.title),
                ));
            }
            awards.push(PendingAward::new(
                liker.id,
                ActionKind::LikeGiven,
                format!("Liked post: {}", post.title),
            ));
            self.flush_awards(awards).await;
        }
        Ok(LikeOutcome { likes: post.likes })
    }

    pub async fn set_post_visibility(
        &self,
        actor_email: &str,
        post_id: &str,
        visibility: Visibility,
    ) -> Result<Post, DomainError> {
        self.moderate(actor_email, post_id, |post| post.visibility = visibility)
            .await
    }

    pub async fn set_pinned(
        &self,
        actor_email: &str,
        post_id: &str,
        pinned: bool,
    ) -> Result<Post, DomainError> {
        self.moderate(actor_email, post_id, |post| post.pinned = pinned)
            .await
    }

    pub async fn set_locked(
        &self,
        actor_email: &str,
        post_id: &str,
        locked: bool,
    ) -> Result<Post, DomainError> {
        self.moderate(actor_email, post_id, |post| post.locked = locked)
            .await
    }

    /// Creates the reply, then bumps the parent's counter in a second write.
    pub async fn add_reply(&self, req: NewReplyRequest) -> Result<Reply, DomainError> {
        let req = req.validate()?;
        let post = self.get_post(&req.post_id).await?;
        if post.locked {
            return Err(DomainError::Conflict(format!("post {} is locked", post.id)));
        }
        let author_email = req.author_email.clone();

        let reply = self.replies.create(|id, now| Reply::new(id, req, now)).await?;

        let bumped = self
            .posts
            .update(&post.id, |post| {
                post.replies += 1;
                Ok(())
            })
            .await
            .inspect_err(|err| {
                error!(
                    reply_id = %reply.id,
                    post_id = %post.id,
                    error = %err,
                    "reply stored but post counter update failed"
                );
            })?;
        if bumped.is_none() {
            warn!(post_id = %post.id, "parent post vanished before counter update");
        }

        if let Some(author) = self.resolve_user(author_email.as_deref()).await {
            let award = PendingAward::new(
                author.id,
                ActionKind::Reply,
                format!("Replied to: {}", post.title),
            );
            self.flush_awards(vec![award]).await;
        }
        Ok(reply)
    }

    /// Active replies of a post, oldest first.
    pub async fn list_replies(&self, post_id: &str) -> Result<Vec<Reply>, DomainError> {
        let mut replies: Vec<Reply> = self
            .replies
            .list()
            .await?
            .into_iter()
            .filter(|r| r.post_id == post_id && r.is_active())
            .collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(replies)
    }

    pub async fn like_reply(&self, reply_id: &str) -> Result<LikeOutcome, DomainError> {
        let reply = self
            .replies
            .update(reply_id, |reply| {
                if !reply.is_active() {
                    return Err(DomainError::not_found("reply", reply_id));
                }
                reply.likes += 1;
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("reply", reply_id))?;
        Ok(LikeOutcome { likes: reply.likes })
    }

    /// Author or staff. Decrements the parent counter after the soft delete.
    pub async fn delete_reply(
        &self,
        actor_email: &str,
        reply_id: &str,
    ) -> Result<DeleteOutcome, DomainError> {
        let reply = self
            .replies
            .get_by_id(reply_id)
            .await?
            .ok_or_else(|| DomainError::not_found("reply", reply_id))?;
        let actor = self.resolve_user(Some(actor_email)).await;
        if !reply.is_authored_by(actor_email) && !actor.as_ref().is_some_and(User::is_staff) {
            return Err(DomainError::Forbidden);
        }

        match self.replies.delete(reply_id).await? {
            DeleteResult::Deleted => {}
            DeleteResult::AlreadyDeleted => return Ok(DeleteOutcome::AlreadyDeleted),
            DeleteResult::NotFound => return Err(DomainError::not_found("reply", reply_id)),
        }

        self.posts
            .update(&reply.post_id, |post| {
                post.replies = post.replies.saturating_sub(1);
                Ok(())
            })
            .await
            .inspect_err(|err| {
                error!(
                    reply_id,
                    post_id = %reply.post_id,
                    error = %err,
                    "reply deleted but post counter update failed"
                );
            })?;
        Ok(DeleteOutcome::Deleted { cascaded: 0 })
    }

    pub async fn create_category(
        &self,
        actor_email: &str,
        req: NewCategoryRequest,
    ) -> Result<Category, DomainError> {
        self.require_admin(actor_email).await?;
        let req = req.validate()?;
        self.categories
            .create_checked(
                |id, now| Category::new(id, req, now),
                |existing, new| {
                    if existing
                        .iter()
                        .any(|c| c.name.eq_ignore_ascii_case(&new.name))
                    {
                        return Err(DomainError::AlreadyExists(format!("category {}", new.name)));
                    }
                    Ok(())
                },
            )
            .await
    }

    /// Private categories are returned to staff only.
    pub async fn list_categories(&self, include_private: bool) -> Result<Vec<Category>, DomainError> {
        Ok(self
            .categories
            .list()
            .await?
            .into_iter()
            .filter(|c| include_private || !c.private)
            .collect())
    }

    pub async fn update_category(
        &self,
        actor_email: &str,
        category_id: &str,
        patch: CategoryPatch,
    ) -> Result<Category, DomainError> {
        self.require_admin(actor_email).await?;
        let patch = patch.validate()?;
        self.categories
            .update(category_id, |category| {
                patch.apply_to(category);
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("category", category_id))
    }

    /// Hard delete, refused while any active post still references the category.
    pub async fn delete_category(
        &self,
        actor_email: &str,
        category_id: &str,
    ) -> Result<(), DomainError> {
        self.require_admin(actor_email).await?;
        let in_use = self
            .posts
            .list()
            .await?
            .iter()
            .filter(|p| p.is_active() && p.category_id == category_id)
            .count();
        if in_use > 0 {
            return Err(DomainError::Conflict(format!(
                "category {category_id} still has {in_use} active posts"
            )));
        }

        match self.categories.delete(category_id).await? {
            DeleteResult::NotFound => Err(DomainError::not_found("category", category_id)),
            DeleteResult::Deleted | DeleteResult::AlreadyDeleted => Ok(()),
        }
    }

    /// Recompute every post's `replies` counter from the active replies and
    /// finish reply cascades of deleted posts that were interrupted.
    pub async fn reconcile_reply_counts(&self) -> Result<ReconcileReport, DomainError> {
        let posts = self.posts.list().await?;
        let deleted_posts: Vec<String> = posts
            .iter()
            .filter(|p| !p.is_active())
            .map(|p| p.id.clone())
            .collect();

        let now = self.posts.now();
        let replies_retired = self
            .replies
            .update_where(
                |r| r.is_active() && deleted_posts.contains(&r.post_id),
                |r| r.mark_deleted(now),
            )
            .await?;

        let replies = self.replies.list().await?;
        let counters_fixed = self
            .posts
            .update_where(
                |_| true,
                |post| {
                    let actual = replies
                        .iter()
                        .filter(|r| r.post_id == post.id && r.is_active())
                        .count() as u32;
                    if post.replies == actual {
                        return false;
                    }
                    warn!(post_id = %post.id, stored = post.replies, actual, "reply counter drift");
                    post.replies = actual;
                    true
                },
            )
            .await?;

        let report = ReconcileReport {
            posts_checked: posts.len(),
            counters_fixed,
            replies_retired,
        };
        info!(?report, "reply counters reconciled");
        Ok(report)
    }

    async fn moderate<F>(
        &self,
        actor_email: &str,
        post_id: &str,
        change: F,
    ) -> Result<Post, DomainError>
    where
        F: FnOnce(&mut Post),
    {
        let post = self.active_post(post_id).await?;
        let actor = self.resolve_user(Some(actor_email)).await;
        let category = self.categories.get_by_id(&post.category_id).await?;
        let category_moderator = category.is_some_and(|c| {
            c.moderators
                .iter()
                .any(|m| m.eq_ignore_ascii_case(actor_email.trim()))
        });
        if !actor.as_ref().is_some_and(User::is_staff) && !category_moderator {
            return Err(DomainError::Forbidden);
        }

        let now = self.posts.now();
        self.posts
            .update(post_id, |post| {
                change(post);
                post.updated_at = now;
                Ok(())
            })
            .await?
            .ok_or_else(|| DomainError::not_found("post", post_id))
    }

    /// Active post whether hidden or not, for authors and moderators.
    async fn active_post(&self, post_id: &str) -> Result<Post, DomainError> {
        self.posts
            .get_by_id(post_id)
            .await?
            .filter(Post::is_active)
            .ok_or_else(|| DomainError::not_found("post", post_id))
    }

    async fn require_category(&self, category_id: &str) -> Result<(), DomainError> {
        match self.categories.get_by_id(category_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("category", category_id)),
        }
    }

    async fn require_admin(&self, actor_email: &str) -> Result<(), DomainError> {
        match self.resolve_user(Some(actor_email)).await {
            Some(user) if user.is_admin() => Ok(()),
            _ => Err(DomainError::Forbidden),
        }
    }

    /// Active user for an email. Lookup failures count as "unknown user":
    /// callers only use this for authorization and optional awards.
    async fn resolve_user(&self, email: Option<&str>) -> Option<User> {
        let email = email?.trim();
        if email.is_empty() {
            return None;
        }
        match self.users.find(|u| u.is_active && u.has_email(email)).await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "user lookup failed");
                None
            }
        }
    }

    /// Dispatch the awards this call produced. Never fails the caller.
    async fn flush_awards(&self, awards: Vec<PendingAward>) {
        let report = self.outbox.dispatch(&self.rewards, awards).await;
        if report.parked + report.dropped > 0 {
            warn!(
                applied = report.applied,
                parked = report.parked,
                dropped = report.dropped,
                "some point awards did not apply"
            );
        }
    }
}

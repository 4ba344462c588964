use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use forum_store::application::content_service::DeleteOutcome;
use forum_store::data::backends::memory_backend::MemoryBackend;
use forum_store::data::kv_backend::BackendKind;
use forum_store::domain::error::DomainError;
use forum_store::domain::post::{NewPostRequest, PostFilter};
use forum_store::domain::reply::NewReplyRequest;
use forum_store::domain::user::{NewUserRequest, Role};
use forum_store::infrastructure::clock::system_clock;
use forum_store::infrastructure::settings::Settings;
use forum_store::{Envelope, Forum};

const ADMIN_EMAIL: &str = "admin@forum.local";

fn memory_forum() -> Forum {
    Forum::with_backend(
        Arc::new(MemoryBackend::new()),
        &Settings::in_memory(),
        system_clock(),
    )
}

fn member(username: &str) -> NewUserRequest {
    NewUserRequest {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: "$argon2id$placeholder".to_string(),
        role: Role::User,
    }
}

fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock must be after unix epoch")
        .as_nanos();
    format!("{nanos}")
}

#[tokio::test]
async fn post_reply_like_redeem_flow() {
    let forum = memory_forum();
    assert_eq!(forum.backend_kind(), BackendKind::Memory);

    let alice = forum
        .users()
        .register_user(member("alice"))
        .await
        .expect("register alice");
    let bob = forum
        .users()
        .register_user(member("bob"))
        .await
        .expect("register bob");

    let category = forum
        .content()
        .list_categories(false)
        .await
        .expect("seeded categories")
        .into_iter()
        .next()
        .expect("at least one category");

    let post = forum
        .content()
        .create_post(NewPostRequest {
            title: "Weekend ride".into(),
            content: "Who is in?".into(),
            author: "alice".into(),
            category_id: category.id.clone(),
            tags: vec!["Cycling".into()],
            author_email: Some(alice.email.clone()),
        })
        .await
        .expect("create post");

    for _ in 0..2 {
        forum
            .content()
            .add_reply(NewReplyRequest {
                post_id: post.id.clone(),
                content: "Count me in".into(),
                author: "bob".into(),
                author_email: Some(bob.email.clone()),
            })
            .await
            .expect("reply");
    }
    forum
        .content()
        .like_post(&post.id, Some(bob.email.as_str()))
        .await
        .expect("like");

    let stored = forum.content().get_post(&post.id).await.expect("get post");
    assert_eq!(stored.replies, 2);
    assert_eq!(stored.likes, 1);

    let listed = forum
        .content()
        .list_posts(PostFilter {
            category_id: Some(category.id.as_str()),
            include_hidden: false,
        })
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);

    // post 10 + like received 2 / two replies 10 + like given 1
    let rewards = forum.rewards();
    assert_eq!(
        rewards.get_user_rewards(&alice.id).await.expect("ledger").total_points,
        12
    );
    assert_eq!(
        rewards.get_user_rewards(&bob.id).await.expect("ledger").total_points,
        11
    );

    let board = rewards.leaderboard(forum.leaderboard_limit()).await.expect("board");
    assert_eq!(board[0].username, "alice");
    assert_eq!(board[0].rank, 1);

    let envelope = Envelope::from(rewards.redeem_coupon(&alice.id, "coupon-5").await);
    assert!(!envelope.success);
    assert_eq!(envelope.error, Some("insufficient_points"));

    let outcome = forum
        .content()
        .delete_post(&post.id, &alice.email)
        .await
        .expect("delete");
    assert_eq!(outcome, DeleteOutcome::Deleted { cascaded: 2 });
    assert!(forum.content().list_replies(&post.id).await.expect("replies").is_empty());

    let report = forum
        .content()
        .reconcile_reply_counts()
        .await
        .expect("reconcile");
    assert_eq!(report.counters_fixed, 0);
}

#[tokio::test]
async fn clones_share_store_and_seed_once() {
    let forum = memory_forum();
    let other = forum.clone();

    let (a, b) = tokio::join!(forum.ensure_initialized(), other.ensure_initialized());
    let seeded = [a.expect("bootstrap"), b.expect("bootstrap")];
    assert_eq!(seeded.iter().filter(|s| **s).count(), 1);

    let admin = other
        .users()
        .find_by_email(ADMIN_EMAIL)
        .await
        .expect("find")
        .expect("admin seeded");
    assert!(admin.is_admin());
    assert_eq!(forum.users().list_users().await.expect("users").len(), 1);
}

#[tokio::test]
async fn members_cannot_administer_categories() {
    let forum = memory_forum();
    let carol = forum
        .users()
        .register_user(member("carol"))
        .await
        .expect("register");
    let categories = forum.content().list_categories(true).await.expect("list");
    let category = &categories[0];

    let err = forum
        .content()
        .delete_category(&carol.email, &category.id)
        .await
        .expect_err("forbidden");
    assert!(matches!(err, DomainError::Forbidden));
}

#[tokio::test]
#[ignore = "requires running redis server"]
async fn redis_backed_flow() {
    let settings = Settings {
        redis_url: Some(
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string()),
        ),
        kv_namespace: format!("forum-test-{}", unique_suffix()),
        ..Settings::in_memory()
    };
    let forum = Forum::connect(&settings).await;
    assert_eq!(forum.backend_kind(), BackendKind::Redis);

    let user = forum
        .users()
        .register_user(member("redis_user"))
        .await
        .expect("register");
    let fetched = forum.users().get_user(&user.id).await.expect("get");
    assert_eq!(fetched.email, user.email);

    let reopened = Forum::connect(&settings).await;
    assert!(!reopened.ensure_initialized().await.expect("flag persisted"));
}

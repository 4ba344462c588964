use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forum_store::data::kv_backend::BackendKind;
use forum_store::domain::error::DomainError;
use forum_store::infrastructure::logging::init_logging;
use forum_store::infrastructure::settings::Settings;
use forum_store::{Envelope, Forum};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "forum-cli", version, about = "Operator tooling for the forum store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Seed default categories, the admin account and rewards settings.
    Init,
    /// Recompute every post's reply counter from its active replies.
    Reconcile,
    /// Apply point awards parked after backend failures.
    RetryAwards,
    /// Top users by total points.
    Leaderboard {
        /// Defaults to FORUM_LEADERBOARD_LIMIT.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show a user's points ledger.
    Rewards {
        /// User id or email.
        #[arg(long)]
        user: String,
    },
    /// List categories.
    Categories {
        /// Include private categories.
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitReport {
    backend: BackendKind,
    seeded: bool,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(2);
        }
    }
}

/// `Ok(false)` when the command ran but its envelope reports a failure.
async fn run() -> Result<bool> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let settings = Settings::from_env().context("failed to load settings")?;
    init_logging(&settings.log_level)?;
    if settings.uses_default_admin_password() {
        warn!("FORUM_ADMIN_PASSWORD not set, seeding the admin with the default password");
    }

    let forum = Forum::connect(&settings).await;

    match cli.command {
        Command::Init => {
            let backend = forum.backend_kind();
            let envelope = match forum.ensure_initialized().await {
                Ok(seeded) => Envelope::ok_with_message(
                    InitReport { backend, seeded },
                    init_message(seeded),
                ),
                Err(err) => Envelope::failure(&err),
            };
            print_envelope(&envelope)
        }
        Command::Reconcile => emit(forum.content().reconcile_reply_counts().await),
        Command::RetryAwards => emit(forum.outbox().retry_failed(forum.rewards()).await),
        Command::Leaderboard { limit } => {
            let limit = limit.unwrap_or(forum.leaderboard_limit());
            emit(forum.rewards().leaderboard(limit).await)
        }
        Command::Rewards { user } => {
            let result = match resolve_user_id(&forum, &user).await {
                Ok(user_id) => forum.rewards().get_user_rewards(&user_id).await,
                Err(err) => Err(err),
            };
            emit(result)
        }
        Command::Categories { all } => emit(forum.content().list_categories(all).await),
    }
}

async fn resolve_user_id(forum: &Forum, user: &str) -> Result<String, DomainError> {
    if !looks_like_email(user) {
        return Ok(user.trim().to_string());
    }
    forum
        .users()
        .find_by_email(user)
        .await?
        .map(|u| u.id)
        .ok_or_else(|| DomainError::NotFound(format!("user email: {}", user.trim())))
}

fn looks_like_email(user: &str) -> bool {
    user.contains('@')
}

fn init_message(seeded: bool) -> &'static str {
    if seeded {
        "store seeded with default categories, admin and rewards settings"
    } else {
        "store already initialized"
    }
}

fn emit<T: Serialize>(result: Result<T, DomainError>) -> Result<bool> {
    print_envelope(&Envelope::from(result))
}

fn print_envelope<T: Serialize>(envelope: &Envelope<T>) -> Result<bool> {
    let body = serde_json::to_string_pretty(envelope).context("failed to encode envelope")?;
    println!("{body}");
    Ok(envelope.success)
}

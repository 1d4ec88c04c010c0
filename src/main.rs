// Entry point of the portfolio feedback CLI.
//
// **Architecture Overview:**
// - `core/` = Business logic (moderation rules, submission flow, ports)
// - `infra/` = Implementations of core traits (feedback stores, AI providers)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run the requested subcommand and print its status line

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::ai::AiProvider;
use crate::core::feedback::{FeedbackService, FeedbackStore};
use crate::core::moderation::{
    ModerationRules, ModerationService, RemoteModeration, RemoteModerationConfig, Vocabulary,
};
use crate::infra::ai::{GeminiClient, OpenRouterClient};
use crate::infra::feedback::{InMemoryFeedbackStore, RealtimeDbFeedbackStore, SqliteFeedbackStore};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";
const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_DB_PATH: &str = "data/feedback.db";

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "portfolio-feedback")]
#[command(version, about = "Moderated feedback box for a portfolio site")]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Moderate a piece of feedback and store it if accepted
    Submit {
        /// Display name; a random one is generated when omitted
        #[arg(long)]
        name: Option<String>,
        text: String,
    },
    /// Show stored feedback, newest first
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the moderation verdict for a text as JSON without storing it
    Check { text: String },
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// A set, non-blank environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or_default<T: FromStr + std::fmt::Display>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value {:?}, using {}", name, raw, default);
            default
        }),
    }
}

fn env_number<T: FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    parse_or_default(name, env_var(name), default)
}

fn load_vocabulary() -> Vocabulary {
    let Some(path) = env_var("MODERATION_VOCABULARY_FILE") else {
        return Vocabulary::default();
    };

    Vocabulary::from_json_file(&path).unwrap_or_else(|e| {
        tracing::warn!("Failed to read vocabulary file at {}: {}", path, e);
        Vocabulary::default()
    })
}

fn build_remote() -> Option<RemoteModeration> {
    let gemini_key = env_var("GEMINI_API_KEY");
    let openrouter_key = env_var("OPENROUTER_API_KEY");

    let provider = env_var("MODERATION_PROVIDER")
        .map(|p| p.to_lowercase())
        .unwrap_or_else(|| {
            if gemini_key.is_some() {
                "gemini".to_string()
            } else if openrouter_key.is_some() {
                "openrouter".to_string()
            } else {
                "none".to_string()
            }
        });

    let (client, default_model): (Box<dyn AiProvider>, &str) = match provider.as_str() {
        "gemini" => {
            let Some(key) = gemini_key else {
                tracing::warn!("MODERATION_PROVIDER=gemini but GEMINI_API_KEY is not set");
                return None;
            };
            (Box::new(GeminiClient::new(key)), DEFAULT_GEMINI_MODEL)
        }
        "openrouter" => {
            let Some(key) = openrouter_key else {
                tracing::warn!("MODERATION_PROVIDER=openrouter but OPENROUTER_API_KEY is not set");
                return None;
            };
            (Box::new(OpenRouterClient::new(key)), DEFAULT_OPENROUTER_MODEL)
        }
        "none" => return None,
        other => {
            tracing::warn!("Unknown MODERATION_PROVIDER {:?}", other);
            return None;
        }
    };

    let defaults = RemoteModerationConfig::default();
    let config = RemoteModerationConfig {
        model: env_var("MODERATION_MODEL").unwrap_or_else(|| default_model.to_string()),
        timeout: Duration::from_millis(env_number(
            "MODERATION_TIMEOUT_MS",
            defaults.timeout.as_millis() as u64,
        )),
        min_chars: env_number("MODERATION_MIN_REMOTE_CHARS", defaults.min_chars),
        ..defaults
    };

    tracing::info!(
        provider = %provider,
        model = %config.model,
        timeout_ms = config.timeout.as_millis() as u64,
        "Remote moderation enabled"
    );

    Some(RemoteModeration::new(client, config))
}

async fn build_store() -> anyhow::Result<Option<Box<dyn FeedbackStore>>> {
    let firebase_url = env_var("FIREBASE_DATABASE_URL");

    let kind = env_var("FEEDBACK_STORE")
        .map(|k| k.to_lowercase())
        .unwrap_or_else(|| {
            if firebase_url.is_some() {
                "realtime".to_string()
            } else {
                "sqlite".to_string()
            }
        });

    let store: Box<dyn FeedbackStore> = match kind.as_str() {
        "sqlite" => {
            let path = env_var("FEEDBACK_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
            let store = SqliteFeedbackStore::new(&path)
                .await
                .with_context(|| format!("Failed to open feedback database at {}", path))?;
            Box::new(store)
        }
        "realtime" => {
            let Some(url) = firebase_url else {
                tracing::warn!("FEEDBACK_STORE=realtime but FIREBASE_DATABASE_URL is not set");
                return Ok(None);
            };
            Box::new(RealtimeDbFeedbackStore::new(url, env_var("FIREBASE_AUTH_TOKEN")))
        }
        "memory" => Box::new(InMemoryFeedbackStore::new()),
        "none" => return Ok(None),
        other => {
            tracing::warn!("Unknown FEEDBACK_STORE {:?}", other);
            return Ok(None);
        }
    };

    tracing::debug!(store = %kind, "Feedback store ready");
    Ok(Some(store))
}

// ============================================================================
// MAIN
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env first so RUST_LOG set there is honoured
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let rules =
        ModerationRules::compile(&load_vocabulary()).context("Failed to compile moderation rules")?;
    let moderation = match build_remote() {
        Some(remote) => ModerationService::with_remote(rules, remote),
        None => ModerationService::local(rules),
    };
    tracing::debug!(remote = moderation.has_remote(), "Moderation ready");

    match cli.command {
        Command::Check { text } => {
            // No store needed to moderate
            let service = FeedbackService::<Box<dyn FeedbackStore>>::new(moderation, None);
            let verdict = service.check(&text).await;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Submit { name, text } => {
            let service = FeedbackService::new(moderation, build_store().await?);
            match service.submit(name.as_deref().unwrap_or(""), &text).await {
                Ok(receipt) => {
                    tracing::debug!(
                        id = %receipt.entry.id,
                        severity = %receipt.verdict.severity,
                        "Submission stored"
                    );
                    println!("{}", receipt.status_message());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{}", e.user_message());
                    // 1: the text was refused, 2: storage trouble
                    Ok(ExitCode::from(if e.is_policy_rejection() { 1 } else { 2 }))
                }
            }
        }
        Command::List { limit } => {
            let service = FeedbackService::new(moderation, build_store().await?);
            let entries = match service.list().await {
                Ok(entries) => entries,
                Err(e) => {
                    eprintln!("{}", e.user_message());
                    return Ok(ExitCode::FAILURE);
                }
            };

            if entries.is_empty() {
                println!("No feedback yet.");
            }
            for entry in entries.iter().take(limit.unwrap_or(usize::MAX)) {
                println!(
                    "[{}] {}: {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.display_name(),
                    entry.text
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

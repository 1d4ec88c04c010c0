// Moderation service - local heuristics first, optional remote refinement.
//
// The remote classifier is only consulted for text the local rules already
// accepted as feedback, and only when it is long enough to be worth the latency.
// Any remote failure (timeout, transport, bad status, no JSON, bad JSON) leaves
// the local verdict untouched.

use super::moderation_models::{
    Category, ModerationVerdict, RemoteModerationConfig, RemoteVerdict, Severity,
};
use super::moderation_rules::ModerationRules;
use crate::core::ai::{AiConfig, AiProvider, AiService};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// Instruction sent with every remote moderation request.
pub const MODERATION_PROMPT: &str = "You review visitor feedback left on a personal portfolio website. \
Reply with a single JSON object and nothing else. Use these keys: \
\"blocked\" (true when the text must not be published at all), \
\"severity\" (\"low\", \"medium\" or \"high\"), \
\"categories\" (array drawn from \"profanity\", \"hate\", \"sexual\", \"threat\", \"irrelevant\", \"personal_attack\"), \
\"masked\" (the original text with offensive words replaced by asterisks of the same length), \
\"is_feedback\" (true when the text is meaningful feedback about the site or its content) \
and optionally \"reason\" (a short tag explaining why the text is not feedback).";

/// Why a remote refinement was dropped.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote moderation timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote moderation call failed: {0}")]
    Provider(String),

    #[error("remote moderation answer contained no JSON object")]
    MissingJson,

    #[error("remote moderation answer was not a verdict: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Remote half of the classifier: a provider bound to the moderation prompt.
pub struct RemoteModeration {
    ai: AiService<Box<dyn AiProvider>>,
    timeout: Duration,
    min_chars: usize,
}

impl RemoteModeration {
    pub fn new(provider: Box<dyn AiProvider>, config: RemoteModerationConfig) -> Self {
        let ai_config = AiConfig {
            model: config.model,
            temperature: 0.0,
            max_tokens: Some(config.max_output_tokens),
            json_response: true,
        };

        Self {
            ai: AiService::new(provider, MODERATION_PROMPT.to_string(), ai_config),
            timeout: config.timeout,
            min_chars: config.min_chars,
        }
    }

    fn wants(&self, text: &str) -> bool {
        text.chars().count() >= self.min_chars
    }

    async fn fetch(&self, text: &str) -> Result<RemoteVerdict, RemoteError> {
        let request = format!("Text:\n{}", text);

        let answer = tokio::time::timeout(self.timeout, self.ai.ask(&request))
            .await
            .map_err(|_| RemoteError::Timeout(self.timeout))?
            .map_err(|e| RemoteError::Provider(e.to_string()))?;

        let json = extract_json_object(&answer).ok_or(RemoteError::MissingJson)?;
        Ok(serde_json::from_str(json)?)
    }
}

/// The `{ ... }` span from the first opening brace to the last closing brace.
///
/// Models often wrap the object in prose or code fences, so the answer is never
/// parsed as a whole.
pub fn extract_json_object(answer: &str) -> Option<&str> {
    let start = answer.find('{')?;
    let end = answer.rfind('}')?;
    (end > start).then(|| &answer[start..=end])
}

/// Lay the fields the remote classifier answered over the local verdict.
pub fn merge_verdicts(
    baseline: ModerationVerdict,
    remote: RemoteVerdict,
    text: &str,
) -> ModerationVerdict {
    let mut merged = baseline;

    if let Some(blocked) = remote.blocked {
        merged.blocked = blocked;
    }

    if let Some(raw) = remote.severity.as_deref() {
        match raw.parse::<Severity>() {
            Ok(severity) => merged.severity = severity,
            Err(()) => tracing::debug!(severity = raw, "Ignoring unknown remote severity"),
        }
    }

    if let Some(raw) = remote.categories {
        let mut categories = BTreeSet::new();
        for tag in &raw {
            match tag.parse::<Category>() {
                Ok(category) => {
                    categories.insert(category);
                }
                Err(()) => tracing::debug!(category = %tag, "Ignoring unknown remote category"),
            }
        }
        merged.categories = categories;
    }

    // Masked text has to line up with the original; a remote rewrite that
    // changes the length is discarded.
    if let Some(masked) = remote.masked {
        if masked.chars().count() == text.chars().count() {
            merged.masked = masked;
        } else {
            tracing::debug!("Ignoring remote masked text with a different length");
        }
    }

    if let Some(is_feedback) = remote.is_feedback {
        merged.is_feedback = is_feedback;
    }
    if let Some(reason) = remote.reason {
        merged.reason = Some(reason);
    }
    if let Some(personal_attack) = remote.personal_attack {
        merged.personal_attack = Some(personal_attack);
    }

    // Blocked only ever goes with a forcing category or high severity
    if merged.categories.iter().any(Category::forces_block) {
        merged.blocked = true;
    } else if merged.blocked {
        merged.severity = Severity::High;
    }

    merged
}

/// Classifies feedback text.
pub struct ModerationService {
    rules: ModerationRules,
    remote: Option<RemoteModeration>,
}

impl ModerationService {
    /// Heuristics only, never touches the network.
    pub fn local(rules: ModerationRules) -> Self {
        Self {
            rules,
            remote: None,
        }
    }

    pub fn with_remote(rules: ModerationRules, remote: RemoteModeration) -> Self {
        Self {
            rules,
            remote: Some(remote),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Classify a piece of text. Never fails; the worst case is the local verdict.
    pub async fn classify(&self, text: &str) -> ModerationVerdict {
        let baseline = self.rules.evaluate(text);

        if !baseline.is_feedback {
            tracing::debug!(reason = ?baseline.reason, "Rejected by local heuristics");
            return baseline;
        }

        let Some(remote) = &self.remote else {
            return baseline;
        };

        if !remote.wants(text) {
            return baseline;
        }

        match remote.fetch(text).await {
            Ok(answer) => {
                let merged = merge_verdicts(baseline, answer, text);
                tracing::debug!(
                    blocked = merged.blocked,
                    severity = %merged.severity,
                    is_feedback = merged.is_feedback,
                    "Remote moderation refined verdict"
                );
                merged
            }
            Err(err) => {
                tracing::warn!("{}, using local heuristics", err);
                baseline
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

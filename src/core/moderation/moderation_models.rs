// Moderation domain models - the verdict produced for a piece of feedback text.
//
// These are pure domain types. The field names serialise to the same snake_case
// keys the remote classifier is asked to answer with, so a remote JSON object can
// be merged straight over a local verdict.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

/// Ordinal risk level of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(()),
        }
    }
}

/// Category tags attached to a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Profanity,
    Threat,
    PersonalAttack,
    Irrelevant,
    Sexual,
    Hate,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Profanity => "profanity",
            Category::Threat => "threat",
            Category::PersonalAttack => "personal_attack",
            Category::Irrelevant => "irrelevant",
            Category::Sexual => "sexual",
            Category::Hate => "hate",
        }
    }

    /// Categories that always force a block, whatever the severity says.
    pub fn forces_block(&self) -> bool {
        matches!(self, Category::Threat | Category::Sexual | Category::Hate)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "profanity" => Ok(Category::Profanity),
            "threat" => Ok(Category::Threat),
            "personal_attack" => Ok(Category::PersonalAttack),
            "irrelevant" => Ok(Category::Irrelevant),
            "sexual" => Ok(Category::Sexual),
            "hate" => Ok(Category::Hate),
            _ => Err(()),
        }
    }
}

/// Machine tags the local pipeline uses for `ModerationVerdict::reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictReason {
    Empty,
    Threat,
    PersonalAttack,
    ContactOrSolicitation,
    TooShortOrGibberish,
    IrrelevantOrPersonalStatement,
    AppearsMeaningful,
}

impl VerdictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictReason::Empty => "empty",
            VerdictReason::Threat => "threat",
            VerdictReason::PersonalAttack => "personal_attack",
            VerdictReason::ContactOrSolicitation => "contact_or_solicitation",
            VerdictReason::TooShortOrGibberish => "too_short_or_gibberish",
            VerdictReason::IrrelevantOrPersonalStatement => "irrelevant_or_personal_statement",
            VerdictReason::AppearsMeaningful => "appears_meaningful",
        }
    }
}

impl std::fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of moderating one piece of text.
///
/// Constructed per submission and discarded; it has no identity of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationVerdict {
    /// Caller must refuse to store the text at all
    pub blocked: bool,
    pub severity: Severity,
    pub categories: BTreeSet<Category>,
    /// Input text with profane spans replaced by asterisks of the same length
    pub masked: String,
    /// False when the text is not meaningful feedback and must not be persisted
    pub is_feedback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_attack: Option<bool>,
}

impl ModerationVerdict {
    /// Verdict for empty or whitespace-only input.
    pub fn empty(text: &str) -> Self {
        Self {
            blocked: false,
            severity: Severity::Low,
            categories: BTreeSet::new(),
            masked: text.to_string(),
            is_feedback: false,
            reason: Some(VerdictReason::Empty.as_str().to_string()),
            personal_attack: None,
        }
    }

    /// Verdict for text that must not be stored at all.
    pub fn blocked(
        severity: Severity,
        categories: BTreeSet<Category>,
        masked: String,
        reason: VerdictReason,
    ) -> Self {
        Self {
            blocked: true,
            severity,
            categories,
            masked,
            is_feedback: false,
            reason: Some(reason.as_str().to_string()),
            personal_attack: None,
        }
    }

    /// Verdict for harmless text that still isn't feedback (spam, gibberish, off-topic).
    pub fn not_feedback(
        mut categories: BTreeSet<Category>,
        masked: String,
        reason: VerdictReason,
    ) -> Self {
        categories.insert(Category::Irrelevant);
        Self {
            blocked: false,
            severity: Severity::Low,
            categories,
            masked,
            is_feedback: false,
            reason: Some(reason.as_str().to_string()),
            personal_attack: None,
        }
    }

    /// Verdict for text accepted as feedback.
    pub fn accepted(severity: Severity, categories: BTreeSet<Category>, masked: String) -> Self {
        Self {
            blocked: false,
            severity,
            categories,
            masked,
            is_feedback: true,
            reason: Some(VerdictReason::AppearsMeaningful.as_str().to_string()),
            personal_attack: None,
        }
    }

    pub fn has_category(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    pub fn is_personal_attack(&self) -> bool {
        self.personal_attack.unwrap_or(false)
    }

    pub fn reason_is(&self, reason: VerdictReason) -> bool {
        self.reason.as_deref() == Some(reason.as_str())
    }
}

/// A verdict as answered by the remote classifier. Every field is optional;
/// whatever is present wins over the local verdict when merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteVerdict {
    pub blocked: Option<bool>,
    pub severity: Option<String>,
    pub categories: Option<Vec<String>>,
    pub masked: Option<String>,
    pub is_feedback: Option<bool>,
    pub reason: Option<String>,
    pub personal_attack: Option<bool>,
}

/// Settings for the optional remote refinement call.
#[derive(Debug, Clone)]
pub struct RemoteModerationConfig {
    /// Model id passed to the provider
    pub model: String,
    /// Abort the remote call after this long and keep the local verdict
    pub timeout: Duration,
    /// Texts shorter than this (in characters) never go remote
    pub min_chars: usize,
    pub max_output_tokens: u32,
}

impl Default for RemoteModerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-lite".to_string(),
            timeout: Duration::from_millis(1500),
            min_chars: 120,
            max_output_tokens: 300,
        }
    }
}

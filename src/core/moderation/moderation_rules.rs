// Local moderation heuristics.
//
// The vocabularies are plain data (`Vocabulary`) that get compiled once into
// `ModerationRules`. Classification itself never fails: an invalid pattern is
// reported when the rules are built, not when text is checked.
//
// Pipeline (first matching rule wins):
// 1. empty input
// 2. profanity scan + masking (no verdict on its own)
// 3. threats                   -> blocked, high
// 4. personal attacks          -> blocked, medium
// 5. contact / solicitation    -> not feedback
// 6. gibberish                 -> not feedback
// 7. relevance                 -> not feedback
// 8. accepted

use super::moderation_models::{Category, ModerationVerdict, Severity, VerdictReason};
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Invalid {table} pattern: {source}")]
    InvalidPattern {
        table: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Vocabulary error: {0}")]
    Vocabulary(String),
}

// ============================================================================
// VOCABULARY (PLAIN DATA)
// ============================================================================

const PROFANITY: &[&str] = &[
    "fuck",
    "shit",
    "bitch",
    "asshole",
    "bastard",
    "cunt",
    "motherfucker",
    "nigger",
    "faggot",
];

const HIGH_SEVERITY_SLURS: &[&str] = &["nigger", "faggot", "cunt", "motherfucker"];

const THREAT_PATTERNS: &[&str] = &[
    r"\bi will kill you\b",
    r"\bkill you\b",
    r"\bi['’]ll kill you\b",
    r"\bi will (hurt|harm) you\b",
    r"\bi['’]ll (hurt|harm) you\b",
    r"\bi am going to kill\b",
    r"\bshoot you\b",
    r"\bstab you\b",
    r"\bbeat you\b",
    r"\brape you\b",
    r"\bkill yourself\b",
];

const SECOND_PERSON: &[&str] = &["you", "u", "your", "you're", "you’re", "youre"];

const INSULTS: &[&str] = &[
    "stupid",
    "idiot",
    "suck",
    "sucks",
    "trash",
    "worthless",
    "loser",
    "pathetic",
    "dumb",
    "moron",
    "garbage",
];

const CONTACT_PATTERNS: &[&str] = &[
    r"\bmailto:",
    r"@\w+\.\w+",
    r"\b\d{3}[-.\s]?\d{3}[-.\s]?\d{4}\b",
    r"\b(api[-_ ]?key|token|secret)\b",
    r"\bcontact me\b",
    r"\bcall me\b",
    r"\badd me\b",
    r"\bfollow me\b",
    r"\b(instagram|twitter|facebook|telegram)\b",
];

const FEEDBACK_KEYWORDS: &[&str] = &[
    "site",
    "website",
    "page",
    "portfolio",
    "project",
    "resume",
    "mobile",
    "desktop",
    "design",
    "load",
    "loading",
    "slow",
    "bug",
    "error",
    "issue",
    "feature",
    "layout",
    "link",
    "image",
    "certificate",
    "pdf",
    "feedback",
    "suggest",
    "improve",
    "improvement",
    "responsive",
    "button",
    "form",
    "typo",
    "content",
    "performance",
    "accessibility",
    "readability",
    "navigation",
    "nav",
    "submit",
    "contact",
    "email",
];

const OPINION_WORDS: &[&str] = &[
    "love", "like", "dislike", "hate", "great", "good", "bad", "terrible", "awesome", "awful",
];

/// Numeric knobs of the gibberish and relevance heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicThresholds {
    /// Fewer words than this is "too short"
    pub min_words: usize,
    /// Ratio of symbol characters (not alphanumeric, not whitespace) above which text is noise
    pub max_symbol_ratio: f64,
    /// A word character repeated this many times in a row marks keyboard mashing
    pub repeat_run: usize,
    /// Tokens of at most this many characters count as "short"
    pub short_token_len: usize,
    /// Share of short tokens above which text is noise
    pub max_short_token_ratio: f64,
    /// Without a feedback keyword, an opinion only counts in texts of at least this many words
    pub min_words_for_opinion: usize,
}

impl Default for HeuristicThresholds {
    fn default() -> Self {
        Self {
            min_words: 3,
            max_symbol_ratio: 0.4,
            repeat_run: 6,
            short_token_len: 2,
            max_short_token_ratio: 0.6,
            min_words_for_opinion: 6,
        }
    }
}

/// Word lists and patterns the heuristics run against.
///
/// Word lists are matched literally (case-insensitive). `threat_patterns` and
/// `contact_patterns` are regular expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub profanity: Vec<String>,
    pub high_severity_slurs: Vec<String>,
    pub threat_patterns: Vec<String>,
    pub second_person: Vec<String>,
    pub insults: Vec<String>,
    pub contact_patterns: Vec<String>,
    pub feedback_keywords: Vec<String>,
    pub opinion_words: Vec<String>,
    pub thresholds: HeuristicThresholds,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            profanity: owned(PROFANITY),
            high_severity_slurs: owned(HIGH_SEVERITY_SLURS),
            threat_patterns: owned(THREAT_PATTERNS),
            second_person: owned(SECOND_PERSON),
            insults: owned(INSULTS),
            contact_patterns: owned(CONTACT_PATTERNS),
            feedback_keywords: owned(FEEDBACK_KEYWORDS),
            opinion_words: owned(OPINION_WORDS),
            thresholds: HeuristicThresholds::default(),
        }
    }
}

impl Vocabulary {
    /// Load a vocabulary from a JSON file. Missing keys keep their built-in values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ModerationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ModerationError::Vocabulary(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| ModerationError::Vocabulary(format!("{}: {}", path.display(), e)))
    }
}

// ============================================================================
// COMPILED RULES
// ============================================================================

/// Counts the gibberish heuristic looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStats {
    pub word_count: usize,
    pub symbol_ratio: f64,
    pub longest_run: usize,
    pub short_tokens: usize,
}

impl TextStats {
    pub fn measure(text: &str, short_token_len: usize) -> Self {
        let words: Vec<&str> = text.split_whitespace().collect();

        let total = text.chars().count();
        let symbols = text
            .chars()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .count();
        let symbol_ratio = if total == 0 {
            0.0
        } else {
            symbols as f64 / total as f64
        };

        let short_tokens = words
            .iter()
            .filter(|w| w.chars().count() <= short_token_len)
            .count();

        Self {
            word_count: words.len(),
            symbol_ratio,
            longest_run: longest_word_char_run(text),
            short_tokens,
        }
    }

    pub fn short_token_ratio(&self) -> f64 {
        self.short_tokens as f64 / self.word_count.max(1) as f64
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Length of the longest run of one word character (case-insensitive), e.g. "sooooo" -> 6.
fn longest_word_char_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut prev: Option<char> = None;

    for c in text.chars() {
        if !is_word_char(c) {
            prev = None;
            current = 0;
            continue;
        }
        let folded = fold(c);
        if prev == Some(folded) {
            current += 1;
        } else {
            prev = Some(folded);
            current = 1;
        }
        longest = longest.max(current);
    }

    longest
}

/// Outcome of the profanity pass.
struct ProfanityScan {
    masked: String,
    found: bool,
}

/// Compiled, read-only moderation rules.
#[derive(Debug, Clone)]
pub struct ModerationRules {
    profanity: Option<Regex>,
    high_severity: Option<Regex>,
    threats: RegexSet,
    second_person: Option<Regex>,
    insults: Option<Regex>,
    contact: RegexSet,
    feedback_keywords: Vec<String>,
    opinion_words: Vec<String>,
    thresholds: HeuristicThresholds,
}

/// Case-insensitive alternation of literal words, longest first so that
/// "motherfucker" wins over "fuck" at the same position.
fn literal_alternation(
    table: &'static str,
    words: &[String],
    whole_word: bool,
) -> Result<Option<Regex>, ModerationError> {
    let mut words: Vec<&str> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return Ok(None);
    }
    words.sort_by(|a, b| b.len().cmp(&a.len()));

    let body = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = if whole_word {
        format!(r"(?i)\b(?:{})\b", body)
    } else {
        format!("(?i)(?:{})", body)
    };

    Regex::new(&pattern)
        .map(Some)
        .map_err(|source| ModerationError::InvalidPattern { table, source })
}

fn case_insensitive_set(
    table: &'static str,
    patterns: &[String],
) -> Result<RegexSet, ModerationError> {
    RegexSet::new(patterns.iter().map(|p| format!("(?i){}", p)))
        .map_err(|source| ModerationError::InvalidPattern { table, source })
}

fn lowercase_list(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

impl ModerationRules {
    /// Compile a vocabulary into rules.
    pub fn compile(vocabulary: &Vocabulary) -> Result<Self, ModerationError> {
        Ok(Self {
            profanity: literal_alternation("profanity", &vocabulary.profanity, false)?,
            high_severity: literal_alternation(
                "high_severity_slurs",
                &vocabulary.high_severity_slurs,
                false,
            )?,
            threats: case_insensitive_set("threat", &vocabulary.threat_patterns)?,
            second_person: literal_alternation("second_person", &vocabulary.second_person, true)?,
            insults: literal_alternation("insults", &vocabulary.insults, true)?,
            contact: case_insensitive_set("contact", &vocabulary.contact_patterns)?,
            feedback_keywords: lowercase_list(&vocabulary.feedback_keywords),
            opinion_words: lowercase_list(&vocabulary.opinion_words),
            thresholds: vocabulary.thresholds.clone(),
        })
    }

    /// Rules built from the built-in vocabulary.
    pub fn builtin() -> Result<Self, ModerationError> {
        Self::compile(&Vocabulary::default())
    }

    /// Replace every profane span with asterisks of the same character count.
    fn scan_profanity(&self, text: &str) -> ProfanityScan {
        let Some(profanity) = &self.profanity else {
            return ProfanityScan {
                masked: text.to_string(),
                found: false,
            };
        };

        let found = profanity.is_match(text);
        let masked = if found {
            profanity
                .replace_all(text, |caps: &regex::Captures<'_>| {
                    "*".repeat(caps[0].chars().count())
                })
                .into_owned()
        } else {
            text.to_string()
        };

        ProfanityScan { masked, found }
    }

    fn has_high_severity_slur(&self, text: &str) -> bool {
        self.high_severity
            .as_ref()
            .is_some_and(|re| re.is_match(text))
    }

    fn addresses_reader(&self, text: &str) -> bool {
        self.second_person
            .as_ref()
            .is_some_and(|re| re.is_match(text))
    }

    fn has_insult(&self, text: &str) -> bool {
        self.insults.as_ref().is_some_and(|re| re.is_match(text))
    }

    pub fn is_threat(&self, text: &str) -> bool {
        self.threats.is_match(text)
    }

    pub fn is_contact_or_solicitation(&self, text: &str) -> bool {
        self.contact.is_match(text)
    }

    pub fn is_gibberish(&self, stats: &TextStats) -> bool {
        let t = &self.thresholds;
        stats.word_count < t.min_words
            || stats.symbol_ratio > t.max_symbol_ratio
            || stats.longest_run >= t.repeat_run
            || stats.short_token_ratio() > t.max_short_token_ratio
    }

    pub fn is_relevant(&self, text: &str, stats: &TextStats) -> bool {
        let lower = text.to_lowercase();
        let has_keyword = self.feedback_keywords.iter().any(|k| lower.contains(k));
        if has_keyword {
            return true;
        }
        stats.word_count >= self.thresholds.min_words_for_opinion
            && self.opinion_words.iter().any(|k| lower.contains(k))
    }

    /// Run the local pipeline. Pure and deterministic.
    pub fn evaluate(&self, text: &str) -> ModerationVerdict {
        if text.trim().is_empty() {
            return ModerationVerdict::empty(text);
        }

        let scan = self.scan_profanity(text);
        let mut categories = BTreeSet::new();
        if scan.found {
            categories.insert(Category::Profanity);
        }

        if self.is_threat(text) {
            categories.insert(Category::Threat);
            return ModerationVerdict::blocked(
                Severity::High,
                categories,
                scan.masked,
                VerdictReason::Threat,
            );
        }

        if self.addresses_reader(text) && (scan.found || self.has_insult(text)) {
            categories.insert(Category::PersonalAttack);
            let mut verdict = ModerationVerdict::blocked(
                Severity::Medium,
                categories,
                scan.masked,
                VerdictReason::PersonalAttack,
            );
            verdict.personal_attack = Some(true);
            return verdict;
        }

        if self.is_contact_or_solicitation(text) {
            return ModerationVerdict::not_feedback(
                categories,
                scan.masked,
                VerdictReason::ContactOrSolicitation,
            );
        }

        let stats = TextStats::measure(text, self.thresholds.short_token_len);
        if self.is_gibberish(&stats) {
            return ModerationVerdict::not_feedback(
                categories,
                scan.masked,
                VerdictReason::TooShortOrGibberish,
            );
        }

        if !self.is_relevant(text, &stats) {
            return ModerationVerdict::not_feedback(
                categories,
                scan.masked,
                VerdictReason::IrrelevantOrPersonalStatement,
            );
        }

        let severity = if self.has_high_severity_slur(text) {
            Severity::High
        } else if scan.found {
            Severity::Medium
        } else {
            Severity::Low
        };

        ModerationVerdict::accepted(severity, categories, scan.masked)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ModerationRules {
        ModerationRules::builtin().unwrap()
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        let rules = rules();
        for text in ["", "   ", "\n\t "] {
            let verdict = rules.evaluate(text);
            assert!(!verdict.is_feedback);
            assert!(!verdict.blocked);
            assert_eq!(verdict.severity, Severity::Low);
            assert!(verdict.reason_is(VerdictReason::Empty));
        }
    }

    #[test]
    fn test_threat_wins_over_feedback_content() {
        let verdict = rules().evaluate("I will kill you, this site is great");

        assert!(verdict.blocked);
        assert_eq!(verdict.severity, Severity::High);
        assert!(!verdict.is_feedback);
        assert!(verdict.has_category(Category::Threat));
        assert!(verdict.reason_is(VerdictReason::Threat));
    }

    #[test]
    fn test_threat_contraction_variants() {
        let rules = rules();
        for text in [
            "I'll hurt you if the page stays this slow",
            "i’ll kill you",
            "just KILL YOURSELF already",
        ] {
            let verdict = rules.evaluate(text);
            assert!(verdict.blocked, "{text} should be blocked");
            assert!(verdict.reason_is(VerdictReason::Threat), "{text}");
        }
    }

    #[test]
    fn test_personal_attack() {
        let verdict = rules().evaluate("you are trash and worthless");

        assert!(verdict.blocked);
        assert!(!verdict.is_feedback);
        assert_eq!(verdict.severity, Severity::Medium);
        assert_eq!(verdict.personal_attack, Some(true));
        assert!(verdict.has_category(Category::PersonalAttack));
        assert!(verdict.reason_is(VerdictReason::PersonalAttack));
    }

    #[test]
    fn test_profanity_aimed_at_reader_is_personal_attack() {
        let verdict = rules().evaluate("you fucking legend");

        assert!(verdict.is_personal_attack());
        assert!(verdict.has_category(Category::Profanity));
        assert_eq!(verdict.masked, "you ****ing legend");
    }

    #[test]
    fn test_personal_attack_beats_word_count() {
        // Two words, but the attack rule runs before the gibberish rule
        let verdict = rules().evaluate("u idiot");
        assert!(verdict.reason_is(VerdictReason::PersonalAttack));
    }

    #[test]
    fn test_insult_without_addressee_is_not_an_attack() {
        let verdict = rules().evaluate("the navigation menu is garbage on desktop");

        assert!(!verdict.blocked);
        assert!(verdict.is_feedback);
    }

    #[test]
    fn test_contact_solicitation() {
        let verdict = rules().evaluate("contact me at foo@bar.com for work");

        assert!(!verdict.blocked);
        assert!(!verdict.is_feedback);
        assert!(verdict.has_category(Category::Irrelevant));
        assert!(verdict.reason_is(VerdictReason::ContactOrSolicitation));
    }

    #[test]
    fn test_contact_patterns() {
        let rules = rules();
        for text in [
            "please call 555-123-4567 about the site",
            "here is my api_key for the project page",
            "follow me on instagram for more design tips",
        ] {
            let verdict = rules.evaluate(text);
            assert!(
                verdict.reason_is(VerdictReason::ContactOrSolicitation),
                "{text} -> {:?}",
                verdict.reason
            );
        }
    }

    #[test]
    fn test_gibberish_short_tokens() {
        let verdict = rules().evaluate("asdkj qp 11 !! ??");

        assert!(!verdict.is_feedback);
        assert!(verdict.reason_is(VerdictReason::TooShortOrGibberish));
    }

    #[test]
    fn test_gibberish_too_few_words() {
        let verdict = rules().evaluate("nice site");
        assert!(!verdict.is_feedback);
        assert!(verdict.reason_is(VerdictReason::TooShortOrGibberish));
    }

    #[test]
    fn test_gibberish_repeated_run() {
        let verdict = rules().evaluate("the site is soooooooo slow on my phone");
        assert!(verdict.reason_is(VerdictReason::TooShortOrGibberish));
    }

    #[test]
    fn test_gibberish_symbol_ratio() {
        let verdict = rules().evaluate("site !!!! ???? #### $$$$ page");
        assert!(verdict.reason_is(VerdictReason::TooShortOrGibberish));
    }

    #[test]
    fn test_irrelevant_statement() {
        let verdict = rules().evaluate("my cat is called mister whiskers");

        assert!(!verdict.is_feedback);
        assert!(!verdict.blocked);
        assert!(verdict.has_category(Category::Irrelevant));
        assert!(verdict.reason_is(VerdictReason::IrrelevantOrPersonalStatement));
    }

    #[test]
    fn test_opinion_needs_enough_words() {
        let rules = rules();

        let long = rules.evaluate("I really love my cat and dog so much");
        assert!(long.is_feedback);

        let short = rules.evaluate("love cats and dogs");
        assert!(short.reason_is(VerdictReason::IrrelevantOrPersonalStatement));
    }

    #[test]
    fn test_meaningful_feedback() {
        let verdict = rules().evaluate("the site loads super slow on mobile");

        assert!(verdict.is_feedback);
        assert!(!verdict.blocked);
        assert_eq!(verdict.severity, Severity::Low);
        assert!(verdict.categories.is_empty());
        assert!(verdict.reason_is(VerdictReason::AppearsMeaningful));
        assert_eq!(verdict.masked, "the site loads super slow on mobile");
    }

    #[test]
    fn test_profane_feedback_is_masked_and_medium() {
        let text = "this site layout is shit and confusing";
        let verdict = rules().evaluate(text);

        assert!(verdict.is_feedback);
        assert_eq!(verdict.severity, Severity::Medium);
        assert!(verdict.has_category(Category::Profanity));
        assert_eq!(verdict.masked, "this site layout is **** and confusing");
        assert_eq!(verdict.masked.chars().count(), text.chars().count());
    }

    #[test]
    fn test_longest_profane_word_masked_whole() {
        let verdict = rules().evaluate("MotherFucker");
        assert_eq!(verdict.masked, "************");
    }

    #[test]
    fn test_masking_preserves_length() {
        let rules = rules();
        for text in [
            "Shit shit SHIT",
            "bastard-ish content on the page",
            "asshole résumé page fuck",
            "no profanity here at all",
        ] {
            let verdict = rules.evaluate(text);
            assert_eq!(
                verdict.masked.chars().count(),
                text.chars().count(),
                "{text}"
            );
        }
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let rules = rules();
        let text = "the contact form button does nothing when I press submit";
        assert_eq!(rules.evaluate(text), rules.evaluate(text));
    }

    #[test]
    fn test_injected_vocabulary() {
        let vocabulary = Vocabulary {
            profanity: vec!["heck".to_string()],
            high_severity_slurs: vec!["heck".to_string()],
            ..Vocabulary::default()
        };
        let rules = ModerationRules::compile(&vocabulary).unwrap();

        let verdict = rules.evaluate("what the heck is this page layout doing");
        assert!(verdict.is_feedback);
        assert_eq!(verdict.severity, Severity::High);
        assert_eq!(verdict.masked, "what the **** is this page layout doing");

        // The built-in words are no longer on the list
        let verdict = rules.evaluate("this site layout is shit and confusing");
        assert_eq!(verdict.severity, Severity::Low);
    }

    #[test]
    fn test_empty_word_lists_match_nothing() {
        let vocabulary = Vocabulary {
            profanity: Vec::new(),
            insults: Vec::new(),
            ..Vocabulary::default()
        };
        let rules = ModerationRules::compile(&vocabulary).unwrap();

        assert_eq!(rules.evaluate("shit happens").masked, "shit happens");
        assert!(!rules.evaluate("you are trash and worthless").blocked);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let vocabulary = Vocabulary {
            threat_patterns: vec!["(unclosed".to_string()],
            ..Vocabulary::default()
        };
        let err = ModerationRules::compile(&vocabulary).unwrap_err();
        assert!(matches!(
            err,
            ModerationError::InvalidPattern {
                table: "threat",
                ..
            }
        ));
    }

    #[test]
    fn test_vocabulary_file_keeps_defaults_for_missing_keys() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{ "insults": ["clown"] }"#).unwrap();

        let vocabulary = Vocabulary::from_json_file(file.path()).unwrap();
        assert_eq!(vocabulary.insults, vec!["clown".to_string()]);
        assert_eq!(vocabulary.profanity, Vocabulary::default().profanity);
        assert_eq!(vocabulary.thresholds, HeuristicThresholds::default());
    }

    #[test]
    fn test_text_stats() {
        let stats = TextStats::measure("aaa  bb\tc!!", 2);
        assert_eq!(stats.word_count, 3);
        assert_eq!(stats.short_tokens, 1);
        assert_eq!(stats.longest_run, 3);
        assert!((stats.symbol_ratio - 2.0 / 11.0).abs() < 1e-9);
    }
}

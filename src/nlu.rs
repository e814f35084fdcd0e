//! Tone and intent classification seams.
//!
//! The router only needs two labels per message. Real NLU lives behind the
//! `ToneClassifier` / `IntentClassifier` traits; the defaults here are the
//! rule-based classifiers the system ships with — keyword tables for tone,
//! a pattern database with fuzzy matching for intent.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Intent label returned when no pattern matches.
pub const UNKNOWN_INTENT: &str = "unknown";

/// Tone label returned when no keyword matches.
pub const NEUTRAL_TONE: &str = "neutral";

/// Minimum similarity for a fuzzy pattern match.
const INTENT_MATCH_CUTOFF: f64 = 0.7;

/// Classifies the emotional tone of a message.
#[async_trait]
pub trait ToneClassifier: Send + Sync {
    async fn classify_tone(&self, text: &str) -> String;
}

/// Classifies the intent of a message. Returns `"unknown"` when unsure.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify_intent(&self, text: &str) -> String;
}

// ── Intent database ─────────────────────────────────────────────────

/// One intent entry: a tag, the phrasings that trigger it, and canned
/// responses the local responder may use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentEntry {
    pub tag: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub responses: Vec<String>,
}

/// Pattern database shared by the intent classifier and the local
/// responder.
#[derive(Debug, Clone, Default)]
pub struct IntentDb {
    entries: Vec<IntentEntry>,
}

impl IntentDb {
    /// Built-in intents covering the conversational basics.
    pub fn default_db() -> Self {
        let entries = vec![
            IntentEntry {
                tag: "greeting".into(),
                patterns: vec![
                    "hi".into(),
                    "hello".into(),
                    "hey".into(),
                    "good morning".into(),
                    "good evening".into(),
                ],
                responses: vec!["Hello! How can I assist you today?".into()],
            },
            IntentEntry {
                tag: "farewell".into(),
                patterns: vec!["bye".into(), "goodbye".into(), "see you".into()],
                responses: vec!["Goodbye! Feel free to reach out anytime.".into()],
            },
            IntentEntry {
                tag: "help_request".into(),
                patterns: vec![
                    "help".into(),
                    "i need help".into(),
                    "can you help me".into(),
                ],
                responses: vec![
                    "Sure, I'm here to help. Please explain what you need.".into(),
                ],
            },
            IntentEntry {
                tag: "chitchat".into(),
                patterns: vec![
                    "how are you".into(),
                    "what's up".into(),
                    "tell me a joke".into(),
                ],
                responses: vec!["Doing well, thanks for asking!".into()],
            },
            IntentEntry {
                tag: "doctrine_query".into(),
                patterns: vec![
                    "what does the scripture say".into(),
                    "is it a sin".into(),
                    "tell me about faith".into(),
                ],
                responses: vec![],
            },
        ];
        Self { entries }
    }

    /// Load the database from a JSON file: `[{tag, patterns, responses}]`.
    ///
    /// A missing or malformed file yields an empty database (the classifier
    /// then answers `"unknown"` for everything) rather than failing startup.
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Malformed intent database, using empty");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Missing intent database, using empty");
                Vec::new()
            }
        };
        Self { entries }
    }

    pub fn entries(&self) -> &[IntentEntry] {
        &self.entries
    }

    /// Canned responses for a tag, if any.
    pub fn responses_for(&self, tag: &str) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.tag == tag)
            .map(|e| e.responses.as_slice())
            .unwrap_or(&[])
    }
}

// ── Pattern intent classifier ───────────────────────────────────────

/// Fuzzy pattern matcher over an `IntentDb`.
pub struct PatternIntentClassifier {
    db: IntentDb,
}

impl PatternIntentClassifier {
    pub fn new(db: IntentDb) -> Self {
        Self { db }
    }

    fn best_match(&self, message: &str) -> Option<&str> {
        let msg = message.trim().to_lowercase();
        if msg.is_empty() {
            return None;
        }

        let mut best: Option<(&str, f64)> = None;
        for entry in self.db.entries() {
            for pattern in &entry.patterns {
                let score = similarity(&msg, &pattern.to_lowercase());
                if score >= INTENT_MATCH_CUTOFF
                    && best.map(|(_, s)| score > s).unwrap_or(true)
                {
                    best = Some((&entry.tag, score));
                }
            }
        }
        best.map(|(tag, _)| tag)
    }
}

#[async_trait]
impl IntentClassifier for PatternIntentClassifier {
    async fn classify_intent(&self, text: &str) -> String {
        self.best_match(text)
            .unwrap_or(UNKNOWN_INTENT)
            .to_string()
    }
}

/// Normalized similarity between two strings (1.0 = identical), based on
/// Levenshtein distance over characters.
fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

// ── Keyword tone classifier ─────────────────────────────────────────

/// Keyword-table tone detector. First matching tone wins; table order is
/// preserved from construction.
pub struct KeywordToneClassifier {
    rules: Vec<(String, Vec<String>)>,
}

impl KeywordToneClassifier {
    /// Built-in tone keyword table.
    pub fn default_rules() -> Self {
        let rules = vec![
            (
                "happy".to_string(),
                vec!["yay", "awesome", "great", "glad", "love"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ),
            (
                "sad".to_string(),
                vec!["sad", "unhappy", "depressed"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ),
            (
                "angry".to_string(),
                vec!["mad", "angry", "furious"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ),
            (
                "curious".to_string(),
                vec!["wonder", "curious", "question"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ),
        ];
        Self { rules }
    }

    /// Load tone rules from a JSON file shaped
    /// `{"tones": {"happy": {"keywords": [...]}, ...}}`.
    /// Missing/malformed files fall back to the built-in table.
    pub fn load(path: &Path) -> Self {
        #[derive(Deserialize)]
        struct ToneRule {
            #[serde(default)]
            keywords: Vec<String>,
        }
        #[derive(Deserialize)]
        struct ToneFile {
            tones: HashMap<String, ToneRule>,
        }

        match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<ToneFile>(&raw).map_err(|e| e.to_string()))
        {
            Ok(file) => {
                let mut rules: Vec<(String, Vec<String>)> = file
                    .tones
                    .into_iter()
                    .map(|(tone, rule)| (tone, rule.keywords))
                    .collect();
                rules.sort_by(|a, b| a.0.cmp(&b.0));
                Self { rules }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable tone rules, using built-ins");
                Self::default_rules()
            }
        }
    }
}

#[async_trait]
impl ToneClassifier for KeywordToneClassifier {
    async fn classify_tone(&self, text: &str) -> String {
        let lower = text.to_lowercase();
        for (tone, keywords) in &self.rules {
            if keywords.iter().any(|k| lower.contains(k.as_str())) {
                return tone.clone();
            }
        }
        NEUTRAL_TONE.to_string()
    }
}

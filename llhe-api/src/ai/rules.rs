//! Rule-based capability implementations
//!
//! Used when no hosted key or local endpoint is configured. Deterministic and
//! offline; quality is intentionally modest.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{AiError, Classification, Classifier, Embedder, PiiDetection, PiiDetector, Transcriber};

const PROVIDER: &str = "rules";

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[\s.-]?)?(?:\(\d{3}\)|\d{3})[\s.-]?\d{3}[\s.-]?\d{4}\b").unwrap()
});
static SSN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static CARD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:\d[ -]?){12,15}\d\b").unwrap());

/// Regex detector for emails, phone numbers, SSNs and card numbers
pub struct RegexPiiDetector;

impl RegexPiiDetector {
    pub fn scan(text: &str) -> Vec<PiiDetection> {
        let mut detections: Vec<PiiDetection> = Vec::new();
        // Order matters: earlier patterns win overlapping spans
        let patterns: [(&str, &Regex); 4] =
            [("email", &EMAIL), ("ssn", &SSN), ("credit_card", &CARD), ("phone", &PHONE)];

        for (kind, pattern) in patterns {
            for m in pattern.find_iter(text) {
                let overlaps = detections.iter().any(|d| m.start() < d.end && d.start < m.end());
                if !overlaps {
                    detections.push(PiiDetection {
                        kind: kind.to_string(),
                        text: m.as_str().to_string(),
                        start: m.start(),
                        end: m.end(),
                        confidence: 0.9,
                    });
                }
            }
        }

        detections.sort_by_key(|d| d.start);
        detections
    }
}

#[async_trait::async_trait]
impl PiiDetector for RegexPiiDetector {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn detect(&self, text: &str) -> Result<Vec<PiiDetection>, AiError> {
        Ok(Self::scan(text))
    }
}

/// (label, keywords) pairs; a label applies when any keyword appears as a word
const THEME_LEXICON: &[(&str, &[&str])] = &[
    ("family", &["family", "mother", "father", "mom", "dad", "sister", "brother", "grandmother", "grandfather", "parents", "daughter", "son"]),
    ("growth", &["learned", "grew", "growth", "changed", "realized", "discovered", "became"]),
    ("love", &["love", "loved", "romance", "partner", "wedding", "married"]),
    ("loss", &["died", "death", "funeral", "lost", "passed", "grief", "goodbye"]),
    ("work", &["job", "work", "career", "boss", "office", "hired", "fired", "colleague"]),
    ("health", &["hospital", "doctor", "illness", "sick", "diagnosis", "recovery", "surgery"]),
    ("travel", &["travel", "trip", "journey", "flight", "abroad", "visited", "road"]),
    ("friendship", &["friend", "friends", "friendship", "companion"]),
    ("childhood", &["childhood", "child", "kid", "school", "playground", "young"]),
    ("education", &["university", "college", "teacher", "class", "exam", "graduated", "studied"]),
    ("identity", &["identity", "myself", "belong", "culture", "heritage", "who i am"]),
    ("resilience", &["survived", "overcame", "struggle", "persevered", "strength", "endured"]),
    ("faith", &["faith", "church", "prayer", "god", "spiritual", "temple", "mosque"]),
    ("community", &["community", "neighbors", "neighbourhood", "neighborhood", "volunteer", "town"]),
    ("home", &["home", "house", "moved", "kitchen", "hometown"]),
];

const EMOTION_LEXICON: &[(&str, &[&str])] = &[
    ("joy", &["happy", "joy", "delighted", "laughed", "celebrated", "excited"]),
    ("sadness", &["sad", "cried", "tears", "lonely", "heartbroken", "miss"]),
    ("fear", &["afraid", "scared", "fear", "terrified", "anxious", "nervous"]),
    ("anger", &["angry", "furious", "rage", "mad", "frustrated"]),
    ("gratitude", &["grateful", "thankful", "gratitude", "blessed", "appreciate"]),
    ("hope", &["hope", "hopeful", "dream", "wish", "optimistic"]),
    ("nostalgia", &["remember", "nostalgia", "memories", "used to", "back then"]),
    ("pride", &["proud", "pride", "accomplished", "achievement"]),
    ("grief", &["grief", "mourning", "mourned", "loss"]),
    ("surprise", &["surprised", "shocked", "unexpected", "suddenly"]),
];

/// Lexicon-based theme and emotion tagging
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn tag(text: &str) -> Classification {
        let normalized = normalize(text);
        Classification {
            themes: matching_labels(&normalized, THEME_LEXICON),
            emotions: matching_labels(&normalized, EMOTION_LEXICON),
        }
    }
}

/// Lowercase, punctuation to spaces, padded so phrase lookups can use ` word `
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn matching_labels(normalized: &str, lexicon: &[(&str, &[&str])]) -> Vec<String> {
    lexicon
        .iter()
        .filter(|(_, keywords)| {
            keywords
                .iter()
                .any(|kw| normalized.contains(&format!(" {} ", kw)))
        })
        .map(|(label, _)| label.to_string())
        .collect()
}

#[async_trait::async_trait]
impl Classifier for KeywordClassifier {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn classify(&self, text: &str) -> Result<Classification, AiError> {
        Ok(Self::tag(text))
    }
}

/// Feature-hashing bag-of-words embedding, L2 normalized
///
/// Uses FNV-1a so vectors stored in the database stay comparable across
/// process restarts.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimensions: 256 }
    }
}

impl HashingEmbedder {
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in normalize(text).split_whitespace() {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            // Sign bit from the high half spreads collisions around zero
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait::async_trait]
impl Embedder for HashingEmbedder {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        Ok(self.vectorize(text))
    }
}

/// Transcription has no rule-based equivalent
pub struct NoTranscriber;

#[async_trait::async_trait]
impl Transcriber for NoTranscriber {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn transcribe(&self, _audio: Vec<u8>, _file_name: &str, _content_type: &str) -> Result<String, AiError> {
        Err(AiError::NotConfigured("Transcription"))
    }
}

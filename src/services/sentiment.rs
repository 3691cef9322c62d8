use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::coach::{SentimentLabel, SentimentResult};

const POSITIVE_WORDS: &[&str] = &[
    "calm",
    "disciplined",
    "patient",
    "confident",
    "consistent",
    "plan",
    "focused",
    "clear",
];

const NEGATIVE_WORDS: &[&str] = &[
    "panic",
    "anxious",
    "revenge",
    "frustrated",
    "fear",
    "greedy",
    "impulsive",
    "angry",
    "stressed",
    "fomo",
];

const POSITIVE_THRESHOLD: f64 = 0.65;
const NEGATIVE_THRESHOLD: f64 = 0.4;
const SIGNAL_SPAN: f64 = 6.0;

const NO_NOTES_EVIDENCE: &str = "No trader notes provided; defaulting to neutral.";

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-z']+").expect("static regex"))
}

fn positive_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| POSITIVE_WORDS.iter().copied().collect())
}

fn negative_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| NEGATIVE_WORDS.iter().copied().collect())
}

/// Lowercase alphabetic words; apostrophes stay inside a word.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keyword polarity of free-text trader notes.
pub fn analyze_sentiment(notes: &str) -> SentimentResult {
    let tokens = tokenize(notes);
    if tokens.is_empty() {
        return SentimentResult {
            label: SentimentLabel::Neutral,
            score: 0.5,
            evidence: NO_NOTES_EVIDENCE.to_string(),
        };
    }

    let positives: Vec<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|t| positive_words().contains(*t))
        .collect();
    let negatives: Vec<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|t| negative_words().contains(*t))
        .collect();

    let raw = positives.len() as f64 - negatives.len() as f64;
    let score = polarity_score(raw);

    SentimentResult {
        label: label_for(score),
        score,
        evidence: evidence(&positives, &negatives),
    }
}

fn polarity_score(raw: f64) -> f64 {
    let score = ((raw + SIGNAL_SPAN) / (2.0 * SIGNAL_SPAN)).clamp(0.0, 1.0);
    (score * 100.0).round() / 100.0
}

fn label_for(score: f64) -> SentimentLabel {
    if score > POSITIVE_THRESHOLD {
        SentimentLabel::Positive
    } else if score < NEGATIVE_THRESHOLD {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

fn evidence(positives: &[&str], negatives: &[&str]) -> String {
    if positives.is_empty() && negatives.is_empty() {
        return "No emotional keywords detected in trader notes.".to_string();
    }
    let mut parts = Vec::new();
    if !positives.is_empty() {
        parts.push(format!("positive cues: {}", dedup(positives).join(", ")));
    }
    if !negatives.is_empty() {
        parts.push(format!("negative cues: {}", dedup(negatives).join(", ")));
    }
    format!("Detected {}.", parts.join("; "))
}

fn dedup<'a>(words: &[&'a str]) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    words.iter().copied().filter(|w| seen.insert(*w)).collect()
}

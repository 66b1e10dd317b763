//! Discriminative keyword extraction
//!
//! TF-IDF over a two-document corpus (one cluster against its context) picks
//! the token that best distinguishes a group of terms. Used for hybrid
//! cluster names and for contextual orphan-bucket labels like
//! "Other (Fruit)". Pure functions: identical inputs yield identical labels.

use std::collections::{HashMap, HashSet};

/// Common English words excluded from keyword candidates
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "did", "do", "does", "down", "during", "each",
    "few", "for", "from", "further", "had", "has", "have", "having", "her",
    "here", "his", "how", "if", "in", "into", "is", "it", "its", "just",
    "more", "most", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "out", "over", "own", "same", "she", "so",
    "some", "such", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under",
    "until", "up", "very", "was", "were", "what", "when", "where", "which",
    "while", "who", "why", "will", "with", "you", "your",
];

/// Tokenize into lower-cased word tokens of at least two characters
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
        .into_iter()
        .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn term_counts(tokens: &[String]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token.clone()).or_insert(0) += 1;
    }
    counts
}

/// Extract up to `top_n` keywords that distinguish `cluster_terms` from
/// `context_terms`.
///
/// A keyword qualifies when its normalized TF-IDF score exceeds 0.2 and it
/// either occurs at least twice as a substring of the joined cluster text
/// or scores above 0.5.
pub fn extract_unique_keywords(
    cluster_terms: &[String],
    context_terms: &[String],
    top_n: usize,
) -> Vec<String> {
    if cluster_terms.is_empty() || context_terms.is_empty() || top_n == 0 {
        return Vec::new();
    }

    let cluster_set: HashSet<&str> = cluster_terms.iter().map(String::as_str).collect();
    let context_doc: Vec<&str> = context_terms
        .iter()
        .map(String::as_str)
        .filter(|t| !cluster_set.contains(t))
        .collect();
    if context_doc.is_empty() {
        // The cluster IS the whole corpus; nothing is discriminative
        return Vec::new();
    }

    let cluster_tokens = tokenize(&cluster_terms.join(" "));
    let context_tokens = tokenize(&context_doc.join(" "));
    if cluster_tokens.is_empty() {
        return Vec::new();
    }

    let cluster_counts = term_counts(&cluster_tokens);
    let context_counts = term_counts(&context_tokens);

    // The "appears at least twice" gate counts raw substring occurrences
    // in the joined cluster text, so "wine" inside "wines" still counts
    let cluster_doc = cluster_terms.join(" ").to_lowercase();

    // Two-document smoothed TF-IDF, L2-normalized over the cluster row
    let n_docs = 2.0_f64;
    let mut weighted: Vec<(String, f64, usize)> = cluster_counts
        .iter()
        .map(|(word, &count)| {
            let df = 1 + usize::from(context_counts.contains_key(word));
            let idf = ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0;
            let occurrences = cluster_doc.matches(word.as_str()).count();
            (word.clone(), count as f64 * idf, occurrences)
        })
        .collect();

    let norm: f64 = weighted.iter().map(|(_, w, _)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for entry in &mut weighted {
            entry.1 /= norm;
        }
    }

    weighted.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    weighted
        .into_iter()
        .filter(|(_, score, occurrences)| *score > 0.2 && (*occurrences >= 2 || *score > 0.5))
        .take(top_n)
        .map(|(word, _, _)| word)
        .collect()
}

/// Label a group of terms against its context, e.g. "Other (Fruit)".
///
/// Falls back to the given label when no keyword is discriminative enough.
pub fn contextual_label(terms: &[String], context_terms: &[String], fallback: &str) -> String {
    if terms.is_empty() {
        return fallback.to_string();
    }
    match extract_unique_keywords(terms, context_terms, 1).first() {
        Some(keyword) => format!("{fallback} ({})", title_case(keyword)),
        None => fallback.to_string(),
    }
}

/// Title-case a label: the first letter of each alphabetic run is
/// upper-cased, the rest lower-cased ("other (fruit)" -> "Other (Fruit)").
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

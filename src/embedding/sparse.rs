// src/embedding/sparse.rs
// TF-IDF sparse vector fallback, used when no SPLADE-class encoder is
// configured. Exact formula and thresholds are grounded in the reference
// implementation: idf weights a fixed, curated stop-word list down rather
// than computing document frequency from a corpus, since this path has no
// corpus to draw from at query time.

use std::collections::HashMap;

pub type SparseVector = HashMap<String, f32>;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Skills, roles, and technologies get a relevance boost -- a candidate
/// profile mentioning "rust" should outweigh one mentioning "the".
const CURATED_VOCAB: &[&str] = &[
    "rust", "python", "javascript", "typescript", "golang", "java", "kotlin", "swift",
    "react", "vue", "angular", "node", "django", "flask", "postgres", "mysql", "redis",
    "kubernetes", "docker", "aws", "gcp", "azure", "terraform", "backend", "frontend",
    "fullstack", "engineer", "developer", "designer", "manager", "researcher", "analyst",
    "architect", "devops", "ml", "ai", "data", "security", "mobile", "ios", "android",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

fn is_curated(word: &str) -> bool {
    CURATED_VOCAB.contains(&word)
}

/// Compute a TF-IDF sparse vector for `text`.
///
/// `tf = count / total_words`, `idf = ln(10000 / (100 if !stopword else 1000))`,
/// `score = tf * idf`. Scores at or below 0.001 are dropped as noise.
/// Curated-vocabulary terms get a 2x boost applied after the base score,
/// then the whole map is max-normalized to `[0, 1]`.
pub fn tfidf_sparse_vector(text: &str) -> SparseVector {
    let words: Vec<String> = text
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect();

    let total_words = words.len() as f32;
    if total_words == 0.0 {
        return SparseVector::new();
    }

    let mut counts: HashMap<String, u32> = HashMap::new();
    for word in &words {
        *counts.entry(word.clone()).or_insert(0) += 1;
    }

    let mut scores: SparseVector = HashMap::new();
    for (word, count) in &counts {
        let tf = *count as f32 / total_words;
        let idf = if is_stop_word(word) {
            (10000.0_f32 / 1000.0).ln()
        } else {
            (10000.0_f32 / 100.0).ln()
        };
        let mut score = tf * idf;
        if score <= 0.001 {
            continue;
        }
        if is_curated(word) {
            score *= 2.0;
        }
        scores.insert(word.clone(), score);
    }

    let max_score = scores.values().cloned().fold(0.0_f32, f32::max);
    if max_score > 0.0 {
        for score in scores.values_mut() {
            *score /= max_score;
        }
    }

    scores
}

//! Description-based product similarity (TF-IDF + cosine)

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::data::ItemCatalog;
use crate::ids::StockCode;
use crate::outcome::{EmptyReason, Outcome};

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most",
    "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our",
    "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such", "than", "that",
    "the", "their", "them", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarProduct {
    pub stock_code: StockCode,
    pub description: String,
    pub similarity: f64,
}

#[derive(Debug, Clone)]
struct Document {
    stock_code: StockCode,
    description: String,
    lowered: String,
    /// L2-normalized term weights keyed by vocabulary index
    weights: HashMap<usize, f64>,
}

/// TF-IDF index over one description per product
#[derive(Debug, Clone, Default)]
pub struct ContentIndex {
    documents: Vec<Document>,
    vocabulary: HashMap<String, usize>,
}

impl ContentIndex {
    /// Index the first description of every catalogued product.
    ///
    /// Products without a description are skipped.
    pub fn build(catalog: &ItemCatalog) -> Self {
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut counts: Vec<(StockCode, String, HashMap<usize, f64>)> = Vec::new();
        let mut document_frequency: HashMap<usize, usize> = HashMap::new();

        for (code, description) in catalog.iter() {
            let Some(description) = description else {
                continue;
            };
            let mut term_counts: HashMap<usize, f64> = HashMap::new();
            for token in tokenize(description) {
                let next = vocabulary.len();
                let term = *vocabulary.entry(token).or_insert(next);
                *term_counts.entry(term).or_insert(0.0) += 1.0;
            }
            for &term in term_counts.keys() {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
            counts.push((code.clone(), description.to_string(), term_counts));
        }

        let n = counts.len() as f64;
        let documents = counts
            .into_iter()
            .map(|(stock_code, description, term_counts)| {
                let mut weights: HashMap<usize, f64> = term_counts
                    .into_iter()
                    .map(|(term, tf)| {
                        let df = document_frequency[&term] as f64;
                        let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
                        (term, tf * idf)
                    })
                    .collect();
                let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    weights.values_mut().for_each(|w| *w /= norm);
                }
                Document {
                    stock_code,
                    lowered: description.to_lowercase(),
                    description,
                    weights,
                }
            })
            .collect();

        Self {
            documents,
            vocabulary,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Products whose descriptions read most like the first product
    /// matching `query` (case-insensitive substring).
    pub fn similar_products(&self, query: &str, top_n: usize) -> Outcome<Vec<SimilarProduct>> {
        let needle = query.trim().to_lowercase();
        let anchor = if needle.is_empty() {
            None
        } else {
            self.documents.iter().position(|d| d.lowered.contains(&needle))
        };
        let Some(anchor) = anchor else {
            return Outcome::Empty(EmptyReason::NoMatchingProduct {
                query: query.to_string(),
            });
        };

        let reference = &self.documents[anchor];
        let mut scored: Vec<SimilarProduct> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != anchor)
            .map(|(_, doc)| SimilarProduct {
                stock_code: doc.stock_code.clone(),
                description: doc.description.clone(),
                similarity: dot(&reference.weights, &doc.weights),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_n);
        Outcome::Success(scored)
    }
}

fn dot(a: &HashMap<usize, f64>, b: &HashMap<usize, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|v| w * v))
        .sum()
}

/// Lowercase alphanumeric runs of two or more characters, stop words removed
fn tokenize(text: &str) -> Vec<String> {
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2 && !stop.contains(token))
        .map(str::to_string)
        .collect()
}

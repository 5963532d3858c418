use std::collections::{BTreeMap, BTreeSet};

use super::stopwords::is_stop_word;

/// Sparse TF-IDF vector, entries sorted by ascending term index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(usize, f64)>,
}

impl FeatureVector {
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, weight)| weight * weight).sum::<f64>().sqrt()
    }

    /// Merge-join dot product. For unit vectors this is the cosine similarity.
    pub fn dot(&self, other: &FeatureVector) -> f64 {
        let (mut left, mut right) = (0, 0);
        let mut total = 0.0;
        while left < self.entries.len() && right < other.entries.len() {
            let (left_term, left_weight) = self.entries[left];
            let (right_term, right_weight) = other.entries[right];
            if left_term == right_term {
                total += left_weight * right_weight;
                left += 1;
                right += 1;
            } else if left_term < right_term {
                left += 1;
            } else {
                right += 1;
            }
        }
        total
    }
}

/// Vocabulary and smoothed idf weights fitted on one corpus.
///
/// idf(t) = ln((1 + N) / (1 + df(t))) + 1, term frequency is the raw count and every vector is
/// L2-normalized. Term indices follow lexicographic order so two fits over the same corpus are
/// identical.
#[derive(Clone, Debug, Default)]
pub struct TfIdfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    pub fn fit(documents: &[String]) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|doc| tokenize(doc)).collect();

        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let unique: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *document_frequency.entry(term.to_string()).or_insert(0) += 1;
            }
        }

        let corpus_size = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            idf.push(((1.0 + corpus_size) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(term, index);
        }

        Self { vocabulary, idf }
    }

    pub fn fit_transform(documents: &[String]) -> (Self, Vec<FeatureVector>) {
        let vectorizer = Self::fit(documents);
        let vectors = documents.iter().map(|doc| vectorizer.transform(doc)).collect();
        (vectorizer, vectors)
    }

    pub fn transform(&self, document: &str) -> FeatureVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(document) {
            if let Some(&index) = self.vocabulary.get(&token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> =
            counts.into_iter().map(|(index, count)| (index, count * self.idf[index])).collect();

        let norm = entries.iter().map(|(_, weight)| weight * weight).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, weight) in entries.iter_mut() {
                *weight /= norm;
            }
        }

        FeatureVector { entries }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.vocabulary.get(term).map(|&index| self.idf[index])
    }
}

/// Lower-cased runs of alphanumerics or `_`, at least two characters, stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|character: char| !(character.is_alphanumeric() || character == '_'))
        .filter(|token| token.chars().count() >= 2)
        .filter(|token| !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::similarity::SimilarityMatrix;
use super::vectorizer::TfIdfVectorizer;
use crate::catalog::CatalogSnapshot;
use crate::domain::product::{Product, ProductId};
use crate::errors::RefreshError;

pub const DEFAULT_TOP_N: usize = 4;

/// One complete build of the catalog and everything derived from it.
///
/// The snapshot rows and similarity matrix share a single row ordering and are
/// only ever constructed together in [`Generation::build`].
#[derive(Debug)]
pub struct Generation {
    number: u64,
    built_at: DateTime<Utc>,
    snapshot: CatalogSnapshot,
    vectorizer: TfIdfVectorizer,
    similarity: SimilarityMatrix,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredProduct {
    pub product_id: ProductId,
    pub score: f64,
}

impl Generation {
    pub fn build(number: u64, snapshot: CatalogSnapshot) -> Result<Self, RefreshError> {
        if snapshot.is_empty() {
            return Err(RefreshError::EmptyCatalog);
        }

        let documents: Vec<String> = snapshot.products().iter().map(Product::document).collect();
        let (vectorizer, vectors) = TfIdfVectorizer::fit_transform(&documents);
        let similarity = SimilarityMatrix::from_vectors(&vectors);

        Ok(Self { number, built_at: Utc::now(), snapshot, vectorizer, similarity })
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn products(&self) -> &[Product] {
        self.snapshot.products()
    }

    pub fn product_count(&self) -> usize {
        self.snapshot.len()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vectorizer.vocabulary_len()
    }

    pub fn find(&self, product_id: ProductId) -> Option<&Product> {
        self.snapshot.find(product_id)
    }

    /// Ids of the `top_n` products most similar to `product_id`, best first.
    ///
    /// Unknown ids produce an empty list.
    pub fn similar(&self, product_id: ProductId, top_n: usize) -> Vec<ProductId> {
        self.similar_scored(product_id, top_n).into_iter().map(|scored| scored.product_id).collect()
    }

    /// Same ordering as [`Generation::similar`] with the cosine score attached. Ties are broken
    /// by ascending product id and the product itself is never part of the result.
    pub fn similar_scored(&self, product_id: ProductId, top_n: usize) -> Vec<ScoredProduct> {
        let Some(row) = self.snapshot.row_of(product_id) else {
            return Vec::new();
        };

        let products = self.snapshot.products();
        let mut scored: Vec<ScoredProduct> = self
            .similarity
            .row(row)
            .iter()
            .enumerate()
            .filter(|(column, _)| *column != row)
            .map(|(column, score)| ScoredProduct { product_id: products[column].id, score: *score })
            .collect();

        scored.sort_by(|left, right| match right.score.total_cmp(&left.score) {
            Ordering::Equal => left.product_id.cmp(&right.product_id),
            ordering => ordering,
        });
        scored.truncate(top_n);
        scored
    }
}

//! Content-based recommendations: TF-IDF vectors, the cosine-similarity matrix built from them,
//! and the versioned store that publishes each rebuilt generation.

pub mod generation;
pub mod similarity;
pub mod stopwords;
pub mod store;
pub mod vectorizer;

pub use generation::{Generation, ScoredProduct, DEFAULT_TOP_N};
pub use similarity::SimilarityMatrix;
pub use store::{GenerationStore, RefreshOutcome};
pub use vectorizer::{FeatureVector, TfIdfVectorizer};

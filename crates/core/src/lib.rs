pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod recommend;
pub mod search;

pub use catalog::{CatalogSnapshot, CatalogSource, StaticCatalogSource};
pub use domain::product::{Product, ProductId};
pub use errors::{ApplicationError, InterfaceError, RefreshError};
pub use recommend::{
    FeatureVector, Generation, GenerationStore, RefreshOutcome, ScoredProduct, SimilarityMatrix,
    TfIdfVectorizer, DEFAULT_TOP_N,
};
pub use search::{search, ProductQuery, ProductType};

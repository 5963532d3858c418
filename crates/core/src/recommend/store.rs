use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::generation::Generation;
use crate::catalog::CatalogSource;
use crate::errors::RefreshError;

#[derive(Clone, Debug)]
pub struct RefreshOutcome {
    pub generation: Arc<Generation>,
    /// True when this caller waited on an in-flight refresh and received its result instead of
    /// rebuilding.
    pub coalesced: bool,
}

/// Holds the currently published [`Generation`].
///
/// Readers take a cheap `Arc` clone and never block a refresh for longer than the pointer swap.
/// Refreshes are serialized; a generation is never mutated after it is published.
pub struct GenerationStore {
    current: RwLock<Option<Arc<Generation>>>,
    refresh_lock: Mutex<()>,
    load_timeout: Duration,
}

impl GenerationStore {
    pub fn new(load_timeout: Duration) -> Self {
        Self { current: RwLock::new(None), refresh_lock: Mutex::new(()), load_timeout }
    }

    pub async fn current(&self) -> Option<Arc<Generation>> {
        self.current.read().await.clone()
    }

    pub async fn refresh(&self, source: &dyn CatalogSource) -> Result<RefreshOutcome, RefreshError> {
        let observed = self.current_number().await;
        let _guard = self.refresh_lock.lock().await;

        if let Some(generation) = self.current().await {
            if generation.number() > observed {
                info!(
                    event_name = "catalog.refresh.coalesced",
                    correlation_id = "refresh",
                    generation = generation.number(),
                    "refresh request served by concurrent rebuild"
                );
                return Ok(RefreshOutcome { generation, coalesced: true });
            }
        }

        let next_number = observed + 1;
        let generation = match self.build(source, next_number).await {
            Ok(generation) => Arc::new(generation),
            Err(error) => {
                warn!(
                    event_name = "catalog.refresh.failed",
                    correlation_id = "refresh",
                    serving_generation = observed,
                    error = %error,
                    "catalog refresh failed; previous generation keeps serving"
                );
                return Err(error);
            }
        };

        *self.current.write().await = Some(Arc::clone(&generation));
        info!(
            event_name = "catalog.refresh.published",
            correlation_id = "refresh",
            generation = generation.number(),
            product_count = generation.product_count(),
            vocabulary_len = generation.vocabulary_len(),
            "catalog generation published"
        );

        Ok(RefreshOutcome { generation, coalesced: false })
    }

    async fn build(
        &self,
        source: &dyn CatalogSource,
        number: u64,
    ) -> Result<Generation, RefreshError> {
        let snapshot = tokio::time::timeout(self.load_timeout, source.load())
            .await
            .map_err(|_| RefreshError::Timeout { secs: self.load_timeout.as_secs() })??;

        tokio::task::spawn_blocking(move || Generation::build(number, snapshot))
            .await
            .map_err(|error| RefreshError::DataSource(format!("index build task failed: {error}")))?
    }

    async fn current_number(&self) -> u64 {
        self.current.read().await.as_ref().map(|generation| generation.number()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use super::GenerationStore;
    use crate::catalog::{CatalogSnapshot, CatalogSource, StaticCatalogSource};
    use crate::domain::product::{Product, ProductId};
    use crate::errors::RefreshError;

    fn product(id: i64, name: &str) -> Product {
        Product {
            id: ProductId(id),
            name: name.to_string(),
            description: format!("{name} in washed cotton"),
            price: Decimal::new(2000, 2),
            category: "Tees".to_string(),
        }
    }

    struct ScriptedSource {
        responses: Mutex<Vec<Result<Vec<Product>, RefreshError>>>,
        loads: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<Product>, RefreshError>>, delay: Duration) -> Self {
            Self { responses: Mutex::new(responses), loads: AtomicUsize::new(0), delay }
        }
    }

    #[async_trait]
    impl CatalogSource for ScriptedSource {
        async fn load(&self) -> Result<CatalogSnapshot, RefreshError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let mut responses = self.responses.lock().await;
            let next = if responses.len() > 1 { responses.remove(0) } else { responses[0].clone() };
            CatalogSnapshot::new(next?)
        }
    }

    #[tokio::test]
    async fn store_starts_empty_and_publishes_first_generation() {
        let store = GenerationStore::new(Duration::from_secs(5));
        assert!(store.current().await.is_none());

        let source = StaticCatalogSource::new(vec![product(1, "Graphic Tee"), product(2, "Logo Tee")]);
        let outcome = store.refresh(&source).await.expect("refresh");

        assert!(!outcome.coalesced);
        assert_eq!(outcome.generation.number(), 1);
        let current = store.current().await.expect("published");
        assert_eq!(current.product_count(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_generation_serving() {
        let store = GenerationStore::new(Duration::from_secs(5));
        let source = ScriptedSource::new(
            vec![
                Ok(vec![product(1, "Graphic Tee"), product(2, "Logo Tee")]),
                Err(RefreshError::DataSource("connection refused".to_string())),
                Ok(vec![]),
            ],
            Duration::ZERO,
        );

        store.refresh(&source).await.expect("first refresh");
        let failed = store.refresh(&source).await;
        assert!(matches!(failed, Err(RefreshError::DataSource(_))));
        let empty = store.refresh(&source).await;
        assert!(matches!(empty, Err(RefreshError::EmptyCatalog)));

        let current = store.current().await.expect("still serving");
        assert_eq!(current.number(), 1);
        assert_eq!(current.similar(ProductId(1), 4), vec![ProductId(2)]);
    }

    #[tokio::test]
    async fn slow_source_times_out_without_publishing() {
        let store = GenerationStore::new(Duration::from_millis(20));
        let source =
            ScriptedSource::new(vec![Ok(vec![product(1, "Graphic Tee")])], Duration::from_secs(5));

        let result = store.refresh(&source).await;

        assert!(matches!(result, Err(RefreshError::Timeout { .. })));
        assert!(store.current().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_refreshes_are_coalesced() {
        let store = Arc::new(GenerationStore::new(Duration::from_secs(5)));
        let source = Arc::new(ScriptedSource::new(
            vec![Ok(vec![product(1, "Graphic Tee"), product(2, "Logo Tee")])],
            Duration::from_millis(50),
        ));

        let first = {
            let (store, source) = (Arc::clone(&store), Arc::clone(&source));
            tokio::spawn(async move { store.refresh(source.as_ref()).await })
        };
        let second = {
            let (store, source) = (Arc::clone(&store), Arc::clone(&source));
            tokio::spawn(async move { store.refresh(source.as_ref()).await })
        };

        let first = first.await.expect("join").expect("refresh");
        let second = second.await.expect("join").expect("refresh");

        assert_eq!(first.generation.number(), 1);
        assert_eq!(second.generation.number(), 1);
        assert!(first.coalesced != second.coalesced);
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sequential_refreshes_bump_generation_and_keep_rankings() {
        let store = GenerationStore::new(Duration::from_secs(5));
        let source = StaticCatalogSource::new(vec![
            product(1, "Graphic Tee"),
            product(2, "Logo Tee"),
            product(3, "Denim Jacket"),
        ]);

        let first = store.refresh(&source).await.expect("refresh").generation;
        let second = store.refresh(&source).await.expect("refresh").generation;

        assert_eq!(second.number(), 2);
        for id in [1, 2, 3] {
            assert_eq!(first.similar(ProductId(id), 4), second.similar(ProductId(id), 4));
        }
    }
}

use serde_json::json;
use shopsense_core::domain::product::ProductId;
use shopsense_core::recommend::GenerationStore;
use shopsense_db::SqlCatalogSource;

use crate::commands::{load_config, migrated_pool, runtime, CommandFailure, CommandResult};

pub fn run(product_id: i64, limit: Option<usize>) -> CommandResult {
    let config = match load_config("recommend") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("recommend") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };
    let top_n = limit
        .unwrap_or(config.recommender.default_top_n)
        .clamp(1, config.recommender.max_top_n);

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let store = GenerationStore::new(config.recommender.refresh_timeout());
        let outcome = store
            .refresh(&SqlCatalogSource::new(pool.clone()))
            .await
            .map_err(|error| ("catalog_refresh", error.to_string(), 6u8));
        pool.close().await;
        Ok::<_, CommandFailure>(outcome?.generation)
    });

    let generation = match result {
        Ok(generation) => generation,
        Err(failure) => return CommandResult::from_failure("recommend", failure),
    };

    let id = ProductId(product_id);
    let recommendations: Vec<_> = generation
        .similar_scored(id, top_n)
        .into_iter()
        .map(|scored| {
            let name = generation.find(scored.product_id).map(|product| product.name.clone());
            json!({ "product_id": scored.product_id, "name": name, "score": scored.score })
        })
        .collect();

    let message = match generation.find(id) {
        Some(product) => {
            format!("{} recommendations for product {id} ({})", recommendations.len(), product.name)
        }
        None => format!("product {id} is not in the catalog; no recommendations"),
    };

    CommandResult::success_with_data(
        "recommend",
        message,
        Some(json!({
            "product_id": product_id,
            "generation": generation.number(),
            "recommendations": recommendations,
        })),
    )
}

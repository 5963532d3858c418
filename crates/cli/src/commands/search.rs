use serde_json::json;
use shopsense_core::search::{search, ProductQuery};
use shopsense_db::SqlCatalogSource;

use crate::commands::{load_config, migrated_pool, runtime, CommandFailure, CommandResult};

pub fn run(message: &str) -> CommandResult {
    let config = match load_config("search") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("search") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let products = SqlCatalogSource::new(pool.clone())
            .fetch_products()
            .await
            .map_err(|error| ("catalog_load", error.to_string(), 6u8));
        pool.close().await;
        Ok::<_, CommandFailure>(products?)
    });

    let products = match result {
        Ok(products) => products,
        Err(failure) => return CommandResult::from_failure("search", failure),
    };

    let query = ProductQuery::parse(message);
    let matches = search(&products, message);

    CommandResult::success_with_data(
        "search",
        format!("{} of {} products match", matches.len(), products.len()),
        Some(json!({
            "price_ceiling": query.price_ceiling,
            "product_types": query.product_types,
            "matches": matches,
        })),
    )
}

use serde_json::json;
use shopsense_db::DemoCatalog;

use crate::commands::{load_config, migrated_pool, runtime, CommandFailure, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;

        let seed_result = DemoCatalog::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoCatalog::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        pool.close().await;

        if !verification.all_present {
            let failed_checks = failed_check_labels(&verification.checks);
            return Err(("seed_verification", verification_message(&failed_checks), 6u8));
        }
        Ok::<_, CommandFailure>(seed_result)
    });

    match result {
        Ok(seed) => CommandResult::success_with_data(
            "seed",
            format!(
                "demo catalog loaded: {} products in {} categories (catalog now holds {})",
                seed.products_seeded, seed.categories_seeded, seed.catalog_size
            ),
            Some(json!({
                "products_seeded": seed.products_seeded,
                "categories_seeded": seed.categories_seeded,
                "catalog_size": seed.catalog_size,
            })),
        ),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn failed_check_labels(checks: &[(String, bool)]) -> Vec<&str> {
    checks.iter().filter_map(|(check, passed)| (!passed).then_some(check.as_str())).collect()
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

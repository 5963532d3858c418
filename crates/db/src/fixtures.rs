use sqlx::Executor;

use crate::connection::DbPool;
use crate::errors::RepositoryError;

const SEED_PRODUCT_IDS: &[i64] = &[1, 2, 3, 4, 5, 6, 7, 8];
const SEED_CATEGORY_NAMES: &[&str] = &["Tees", "Jeans", "Hoodies"];

/// Small streetwear catalog used for local runs and smoke tests.
///
/// Loading is idempotent: rows that already exist are left untouched.
pub struct DemoCatalog;

impl DemoCatalog {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_catalog.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let product_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM products")
            .fetch_one(pool)
            .await?;

        Ok(SeedResult {
            categories_seeded: SEED_CATEGORY_NAMES.len(),
            products_seeded: SEED_PRODUCT_IDS.len(),
            catalog_size: product_count,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for name in SEED_CATEGORY_NAMES {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE name = ?1)")
                    .bind(name)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("category:{name}"), exists == 1));
        }

        for id in SEED_PRODUCT_IDS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM products p JOIN categories c ON p.category_id = c.id WHERE p.id = ?1)",
            )
            .bind(id)
            .fetch_one(pool)
            .await?;
            checks.push((format!("product:{id}"), exists == 1));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub categories_seeded: usize,
    pub products_seeded: usize,
    pub catalog_size: i64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

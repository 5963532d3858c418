use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shopsense_core::catalog::{CatalogSnapshot, CatalogSource};
use shopsense_core::domain::product::{Product, ProductId};
use shopsense_core::errors::RefreshError;
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use crate::errors::RepositoryError;
use crate::DbPool;

const CATALOG_QUERY: &str = "SELECT p.id AS id, p.name AS name, p.description AS description, \
     CAST(p.price AS TEXT) AS price, c.name AS category \
     FROM products p JOIN categories c ON p.category_id = c.id \
     ORDER BY p.id";

/// Loads the full catalog from the `products` and `categories` tables.
pub struct SqlCatalogSource {
    pool: DbPool,
}

impl SqlCatalogSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn fetch_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(CATALOG_QUERY).fetch_all(&self.pool).await?;
        rows.iter().map(product_from_row).collect()
    }
}

#[async_trait]
impl CatalogSource for SqlCatalogSource {
    async fn load(&self) -> Result<CatalogSnapshot, RefreshError> {
        let products = self.fetch_products().await?;
        debug!(
            event_name = "catalog.load.fetched",
            correlation_id = "refresh",
            product_count = products.len(),
            "catalog rows fetched"
        );
        CatalogSnapshot::new(products)
    }
}

fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let id: i64 = row.try_get("id")?;
    let name = required_text(row, "name", id)?;
    let description = required_text(row, "description", id)?;
    let category = required_text(row, "category", id)?;
    let raw_price = required_text(row, "price", id)?;

    let price = Decimal::from_str(raw_price.trim()).map_err(|error| {
        RepositoryError::Decode(format!("product {id} has unparsable price `{raw_price}`: {error}"))
    })?;

    Ok(Product { id: ProductId(id), name, description, price, category })
}

fn required_text(row: &SqliteRow, column: &str, id: i64) -> Result<String, RepositoryError> {
    row.try_get::<Option<String>, _>(column)?
        .ok_or_else(|| RepositoryError::Decode(format!("product {id} has NULL {column}")))
}

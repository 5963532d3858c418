use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::product::{Product, ProductId};
use crate::errors::RefreshError;

/// Ordered product rows plus the dense `id -> row` lookup derived from that order.
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    products: Vec<Product>,
    rows: HashMap<ProductId, usize>,
}

impl CatalogSnapshot {
    pub fn new(products: Vec<Product>) -> Result<Self, RefreshError> {
        let mut rows = HashMap::with_capacity(products.len());
        for (row, product) in products.iter().enumerate() {
            if product.price < Decimal::ZERO {
                return Err(RefreshError::DataSource(format!(
                    "product {} has negative price {}",
                    product.id, product.price
                )));
            }
            if rows.insert(product.id, row).is_some() {
                return Err(RefreshError::DataSource(format!(
                    "product id {} appears more than once",
                    product.id
                )));
            }
        }

        Ok(Self { products, rows })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn row_of(&self, id: ProductId) -> Option<usize> {
        self.rows.get(&id).copied()
    }

    pub fn find(&self, id: ProductId) -> Option<&Product> {
        self.row_of(id).map(|row| &self.products[row])
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load(&self) -> Result<CatalogSnapshot, RefreshError>;
}

/// Serves a fixed product list. Used for demos and tests where no database is wired in.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalogSource {
    products: Vec<Product>,
}

impl StaticCatalogSource {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn load(&self) -> Result<CatalogSnapshot, RefreshError> {
        CatalogSnapshot::new(self.products.clone())
    }
}

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
}

impl Product {
    /// Text the vectorizer sees for this product: name, description and category joined by
    /// single spaces.
    pub fn document(&self) -> String {
        format!("{} {} {}", self.name, self.description, self.category)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Product, ProductId};

    #[test]
    fn document_joins_name_description_and_category() {
        let product = Product {
            id: ProductId(7),
            name: "Graphic Tee".to_string(),
            description: "Heavyweight cotton print".to_string(),
            price: Decimal::new(2500, 2),
            category: "Tops".to_string(),
        };

        assert_eq!(product.document(), "Graphic Tee Heavyweight cotton print Tops");
    }

    #[test]
    fn product_id_serializes_as_bare_integer() {
        let json = serde_json::to_string(&ProductId(42)).expect("serialize id");
        assert_eq!(json, "42");
    }
}

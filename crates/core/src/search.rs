//! Keyword product filter used to ground product-search chat replies.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::Product;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Tee,
    Jeans,
    Hoodie,
}

impl ProductType {
    pub const ALL: [ProductType; 3] = [Self::Tee, Self::Jeans, Self::Hoodie];

    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Self::Tee => &["tee", "tees", "t-shirt", "tshirt", "shirt", "top", "tops"],
            Self::Jeans => &["jean", "jeans", "denim", "bottom", "bottoms"],
            Self::Hoodie => &["hoodie", "hoodies", "hooded"],
        }
    }

    fn mentioned_in(&self, normalized_text: &str) -> bool {
        self.synonyms().iter().any(|synonym| normalized_text.contains(synonym))
    }
}

/// Constraints pulled out of a shopper's message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProductQuery {
    pub price_ceiling: Option<Decimal>,
    pub product_types: Vec<ProductType>,
}

impl ProductQuery {
    pub fn parse(message: &str) -> Self {
        let normalized_text = message.to_lowercase();
        let tokens = tokenize(&normalized_text);

        Self {
            price_ceiling: extract_price_ceiling(&tokens),
            product_types: ProductType::ALL
                .into_iter()
                .filter(|product_type| product_type.mentioned_in(&normalized_text))
                .collect(),
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        let type_ok = self.product_types.is_empty() || {
            let name = product.name.to_lowercase();
            self.product_types
                .iter()
                .flat_map(ProductType::synonyms)
                .any(|synonym| name.contains(synonym))
        };
        let price_ok = self.price_ceiling.map_or(true, |ceiling| product.price < ceiling);

        type_ok && price_ok
    }
}

/// Products matching the message's type keywords and price ceiling, in catalog order.
pub fn search(products: &[Product], message: &str) -> Vec<Product> {
    let query = ProductQuery::parse(message);
    products.iter().filter(|product| query.matches(product)).cloned().collect()
}

fn tokenize(normalized_text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(normalized_text.len());
    for character in normalized_text.chars() {
        if character.is_ascii_alphanumeric() || matches!(character, '$' | '.') {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_string()).collect()
}

/// "under/below/less than $N" wins over "N bucks/dollars"; within a pattern the leftmost match
/// wins.
fn extract_price_ceiling(tokens: &[String]) -> Option<Decimal> {
    ceiling_after_comparator(tokens).or_else(|| ceiling_before_currency_word(tokens))
}

fn ceiling_after_comparator(tokens: &[String]) -> Option<Decimal> {
    for (index, token) in tokens.iter().enumerate() {
        let amount_at = match token.as_str() {
            "under" | "below" => index + 1,
            "less" if tokens.get(index + 1).map(String::as_str) == Some("than") => index + 2,
            _ => continue,
        };

        let amount = match tokens.get(amount_at).map(String::as_str) {
            Some("$") => tokens.get(amount_at + 1),
            _ => tokens.get(amount_at),
        };
        if let Some(amount) = amount.and_then(|token| parse_amount(token)) {
            return Some(amount);
        }
    }
    None
}

fn ceiling_before_currency_word(tokens: &[String]) -> Option<Decimal> {
    for (index, token) in tokens.iter().enumerate() {
        for unit in ["bucks", "dollars"] {
            if let Some(prefix) = token.strip_suffix(unit).filter(|prefix| !prefix.is_empty()) {
                if let Some(amount) = parse_amount(prefix) {
                    return Some(amount);
                }
            }
            if token == unit && index > 0 {
                if let Some(amount) = parse_amount(&tokens[index - 1]) {
                    return Some(amount);
                }
            }
        }
    }
    None
}

fn parse_amount(token: &str) -> Option<Decimal> {
    let trimmed = token.trim_start_matches('$').trim_end_matches('.');
    if trimmed.is_empty() || !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}

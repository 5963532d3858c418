use serde::Serialize;
use shopsense_core::config::{IntentConfig, StoreProfile};
use shopsense_core::search::ProductType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    StoreInfo,
    ProductSearch,
    General,
}

impl Intent {
    /// Keyword-driven intents in the order they are checked. `General` is the fallthrough.
    pub const PRIORITY: [Intent; 2] = [Self::StoreInfo, Self::ProductSearch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StoreInfo => "store_info",
            Self::ProductSearch => "product_search",
            Self::General => "general",
        }
    }

    fn default_keywords(&self) -> &'static [&'static str] {
        match self {
            Self::StoreInfo => &[
                "owner",
                "owners",
                "owns",
                "manager",
                "ceo",
                "creator",
                "admin",
                "founder",
                "founders",
                "who made",
                "who runs",
                "who started",
                "dhp",
                "dhp store",
            ],
            Self::ProductSearch => &[
                "buy",
                "purchase",
                "price",
                "prices",
                "cost",
                "cheap",
                "product",
                "products",
                "recommend",
                "recommendation",
                "recommendations",
                "suggest",
                "search",
                "find",
                "best seller",
                "bestseller",
                "trending",
            ],
            Self::General => &[],
        }
    }
}

/// A keyword as a sequence of whole tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Phrase(Vec<String>);

impl Phrase {
    fn parse(keyword: &str) -> Option<Self> {
        let tokens = tokenize(&keyword.to_lowercase());
        (!tokens.is_empty()).then_some(Self(tokens))
    }

    fn occurs_in(&self, tokens: &[String]) -> bool {
        if self.0.len() == 1 {
            return tokens.iter().any(|token| token_matches(token, &self.0[0]));
        }
        tokens.windows(self.0.len()).any(|window| {
            window.iter().zip(&self.0).all(|(token, keyword)| token_matches(token, keyword))
        })
    }
}

/// Exact token match, also accepting a trailing plural `s` or possessive `'s`.
fn token_matches(token: &str, keyword: &str) -> bool {
    token == keyword
        || token.strip_suffix("'s").is_some_and(|stem| stem == keyword)
        || token.strip_suffix('s').is_some_and(|stem| stem == keyword)
}

#[derive(Clone, Debug)]
pub struct IntentClassifier {
    store_info: Vec<Phrase>,
    product_search: Vec<Phrase>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(&IntentConfig::default(), &StoreProfile::default())
    }
}

impl IntentClassifier {
    /// Store names (assistant, founders, staff) always join the store-info set, even when the
    /// configured keywords replace the built-in ones.
    pub fn new(intent: &IntentConfig, store: &StoreProfile) -> Self {
        let store_info_defaults: &[&str] = if intent.replace_store_info_defaults {
            &[]
        } else {
            Intent::StoreInfo.default_keywords()
        };
        let store_info = store_info_defaults
            .iter()
            .map(|keyword| keyword.to_string())
            .chain(std::iter::once(store.assistant_name.clone()))
            .chain(store.founders.iter().cloned())
            .chain(store.staff.iter().cloned())
            .chain(intent.store_info_keywords.iter().cloned());

        let product_search_defaults: Vec<&str> = if intent.replace_product_search_defaults {
            Vec::new()
        } else {
            Intent::ProductSearch
                .default_keywords()
                .iter()
                .copied()
                .chain(
                    ProductType::ALL
                        .into_iter()
                        .flat_map(|product_type| product_type.synonyms().iter().copied()),
                )
                .collect()
        };
        let product_search = product_search_defaults
            .into_iter()
            .map(str::to_string)
            .chain(intent.product_search_keywords.iter().cloned());

        Self { store_info: phrases(store_info), product_search: phrases(product_search) }
    }

    pub fn classify(&self, message: &str) -> Intent {
        let tokens = tokenize(&message.to_lowercase());

        Intent::PRIORITY
            .into_iter()
            .find(|intent| self.phrases_for(*intent).iter().any(|phrase| phrase.occurs_in(&tokens)))
            .unwrap_or(Intent::General)
    }

    fn phrases_for(&self, intent: Intent) -> &[Phrase] {
        match intent {
            Intent::StoreInfo => &self.store_info,
            Intent::ProductSearch => &self.product_search,
            Intent::General => &[],
        }
    }
}

fn phrases(keywords: impl Iterator<Item = String>) -> Vec<Phrase> {
    let mut phrases: Vec<Phrase> = Vec::new();
    for phrase in keywords.filter_map(|keyword| Phrase::parse(&keyword)) {
        if !phrases.contains(&phrase) {
            phrases.push(phrase);
        }
    }
    phrases
}

fn tokenize(normalized_text: &str) -> Vec<String> {
    normalized_text
        .split(|character: char| !(character.is_alphanumeric() || matches!(character, '-' | '\'')))
        .map(|token| token.trim_matches(|character| matches!(character, '-' | '\'')))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

use shopsense_core::config::StoreProfile;
use shopsense_core::domain::product::Product;
use tera::{Context, Tera};

/// Sentence every product-search reply must carry when nothing matched.
pub const NO_MATCHES_SENTENCE: &str = "We can't find any products matching that description.";

/// Pointer that follows [`NO_MATCHES_SENTENCE`] in a product-search reply with no matches.
pub const BROWSE_ALL_POINTER: &str = "Please browse all products on the shop page.";

const STORE_INFO_TEMPLATE: &str = "store_info.txt";
const PRODUCT_SEARCH_TEMPLATE: &str = "product_search.txt";
const GENERAL_TEMPLATE: &str = "general.txt";

/// Renders the intent-specific prompts sent to the language model.
#[derive(Clone, Debug)]
pub struct PromptRenderer {
    tera: Tera,
    store: StoreProfile,
}

impl PromptRenderer {
    pub fn new(store: StoreProfile) -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (STORE_INFO_TEMPLATE, include_str!("../../../templates/prompts/store_info.txt")),
            (PRODUCT_SEARCH_TEMPLATE, include_str!("../../../templates/prompts/product_search.txt")),
            (GENERAL_TEMPLATE, include_str!("../../../templates/prompts/general.txt")),
        ])?;

        Ok(Self { tera, store })
    }

    pub fn store_info(&self, message: &str) -> Result<String, tera::Error> {
        self.tera.render(STORE_INFO_TEMPLATE, &self.context(message))
    }

    /// `products` is the grounding list already capped by the caller; `omitted` counts matches
    /// that did not fit.
    pub fn product_search(
        &self,
        message: &str,
        products: &[Product],
        omitted: usize,
    ) -> Result<String, tera::Error> {
        let mut context = self.context(message);
        context.insert("products", products);
        context.insert("omitted", &omitted);
        context.insert("no_matches", NO_MATCHES_SENTENCE);
        context.insert("browse_all", BROWSE_ALL_POINTER);
        self.tera.render(PRODUCT_SEARCH_TEMPLATE, &context)
    }

    pub fn general(&self, message: &str) -> Result<String, tera::Error> {
        self.tera.render(GENERAL_TEMPLATE, &self.context(message))
    }

    fn context(&self, message: &str) -> Context {
        let mut context = Context::new();
        context.insert("store", &self.store);
        context.insert("message", message.trim());
        context
    }
}

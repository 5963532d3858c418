use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use shopsense_core::config::AppConfig;
use shopsense_core::recommend::Generation;
use shopsense_core::search::search;
use thiserror::Error;
use tracing::{info, warn};

use crate::intent::{Intent, IntentClassifier};
use crate::llm::LlmClient;
use crate::prompt::{PromptRenderer, BROWSE_ALL_POINTER, NO_MATCHES_SENTENCE};

/// Returned for every message when no language model is configured.
pub const FALLBACK_REPLY: &str =
    "Our shopping assistant is offline at the moment. Please browse all products on the shop page.";

/// Returned when the configured language model fails or does not answer in time.
pub const DEGRADED_REPLY: &str = "I'm sorry, I can't connect to the server right now.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("language model backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("language model did not answer within {secs}s")]
    Timeout { secs: u64 },
    #[error("language model returned an empty reply")]
    EmptyReply,
    #[error("prompt rendering failed: {0}")]
    Prompt(#[from] tera::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Model,
    Fallback,
    Degraded,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub intent: Option<Intent>,
    pub source: ReplySource,
}

impl ChatReply {
    fn fallback() -> Self {
        Self { reply: FALLBACK_REPLY.to_string(), intent: None, source: ReplySource::Fallback }
    }

    fn degraded(intent: Intent) -> Self {
        Self { reply: DEGRADED_REPLY.to_string(), intent: Some(intent), source: ReplySource::Degraded }
    }
}

/// Classifies a shopper's message, grounds it in catalog or store facts, and asks the language
/// model for the reply. Never fails: backend problems turn into [`DEGRADED_REPLY`].
pub struct ChatOrchestrator {
    classifier: IntentClassifier,
    prompts: PromptRenderer,
    llm: Option<Arc<dyn LlmClient>>,
    llm_timeout: Duration,
    max_context_products: usize,
}

impl ChatOrchestrator {
    pub fn new(
        classifier: IntentClassifier,
        prompts: PromptRenderer,
        llm: Option<Arc<dyn LlmClient>>,
        llm_timeout: Duration,
        max_context_products: usize,
    ) -> Self {
        Self { classifier, prompts, llm, llm_timeout, max_context_products: max_context_products.max(1) }
    }

    pub fn from_config(
        config: &AppConfig,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Result<Self, ChatError> {
        Ok(Self::new(
            IntentClassifier::new(&config.intent, &config.store),
            PromptRenderer::new(config.store.clone())?,
            llm,
            config.llm.timeout(),
            config.chat.max_context_products,
        ))
    }

    pub fn backend_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// `generation` is the catalog the product search runs over; `None` before the first
    /// successful refresh, which searches an empty catalog.
    pub async fn chat(
        &self,
        generation: Option<&Generation>,
        message: &str,
        correlation_id: &str,
    ) -> ChatReply {
        let Some(llm) = self.llm.as_ref() else {
            return ChatReply::fallback();
        };

        let intent = self.classifier.classify(message);
        let outcome = match self.prompt_for(intent, generation, message) {
            Ok((prompt, no_matches)) => {
                self.generate(llm.as_ref(), &prompt).await.map(|reply| (reply, no_matches))
            }
            Err(error) => Err(error),
        };

        match outcome {
            Ok((reply, no_matches)) => {
                let reply = if no_matches { with_no_match_notice(reply) } else { reply };
                info!(
                    event_name = "chat.reply.generated",
                    correlation_id = %correlation_id,
                    intent = intent.as_str(),
                    no_matches,
                    "chat reply generated"
                );
                ChatReply { reply, intent: Some(intent), source: ReplySource::Model }
            }
            Err(error) => {
                warn!(
                    event_name = "chat.reply.degraded",
                    correlation_id = %correlation_id,
                    intent = intent.as_str(),
                    error = %error,
                    "chat backend failed; returning degraded reply"
                );
                ChatReply::degraded(intent)
            }
        }
    }

    /// Renders the prompt for `intent`. The flag is true when a product search found nothing.
    fn prompt_for(
        &self,
        intent: Intent,
        generation: Option<&Generation>,
        message: &str,
    ) -> Result<(String, bool), ChatError> {
        match intent {
            Intent::StoreInfo => Ok((self.prompts.store_info(message)?, false)),
            Intent::General => Ok((self.prompts.general(message)?, false)),
            Intent::ProductSearch => {
                let products = generation.map(Generation::products).unwrap_or_default();
                let matches = search(products, message);
                let shown = matches.len().min(self.max_context_products);
                let prompt = self.prompts.product_search(
                    message,
                    &matches[..shown],
                    matches.len() - shown,
                )?;
                Ok((prompt, matches.is_empty()))
            }
        }
    }

    async fn generate(&self, llm: &dyn LlmClient, prompt: &str) -> Result<String, ChatError> {
        let reply = tokio::time::timeout(self.llm_timeout, llm.complete(prompt))
            .await
            .map_err(|_| ChatError::Timeout { secs: self.llm_timeout.as_secs() })?
            .map_err(|error| ChatError::BackendUnavailable(format!("{error:#}")))?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(ChatError::EmptyReply);
        }
        Ok(reply.to_string())
    }
}

/// Makes sure a reply to a search with no matches carries the fixed sentence followed by the
/// browse pointer, adding whichever the model left out.
fn with_no_match_notice(reply: String) -> String {
    let has_pointer = reply.to_lowercase().contains("browse all products");
    match (reply.contains(NO_MATCHES_SENTENCE), has_pointer) {
        (true, true) => reply,
        (true, false) => reply.replacen(
            NO_MATCHES_SENTENCE,
            &format!("{NO_MATCHES_SENTENCE} {BROWSE_ALL_POINTER}"),
            1,
        ),
        (false, true) => format!("{NO_MATCHES_SENTENCE} {reply}"),
        (false, false) => format!("{NO_MATCHES_SENTENCE} {BROWSE_ALL_POINTER} {reply}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use shopsense_core::catalog::CatalogSnapshot;
    use shopsense_core::config::AppConfig;
    use shopsense_core::domain::product::{Product, ProductId};
    use shopsense_core::recommend::Generation;
    use tokio::sync::Mutex;

    use super::{ChatOrchestrator, ReplySource, DEGRADED_REPLY, FALLBACK_REPLY};
    use crate::intent::Intent;
    use crate::llm::LlmClient;
    use crate::prompt::{BROWSE_ALL_POINTER, NO_MATCHES_SENTENCE};

    enum Script {
        Reply(&'static str),
        Fail,
        Hang,
    }

    struct ScriptedLlm {
        script: Script,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self { script, prompts: Mutex::new(Vec::new()) })
        }

        async fn last_prompt(&self) -> String {
            self.prompts.lock().await.last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().await.push(prompt.to_string());
            match self.script {
                Script::Reply(text) => Ok(text.to_string()),
                Script::Fail => Err(anyhow!("connection refused")),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    fn product(id: i64, name: &str, dollars: i64) -> Product {
        Product {
            id: ProductId(id),
            name: name.to_string(),
            description: format!("{name} description"),
            price: Decimal::from(dollars),
            category: "Streetwear".to_string(),
        }
    }

    fn generation() -> Generation {
        let snapshot = CatalogSnapshot::new(vec![
            product(1, "Graphic Tee", 25),
            product(2, "Denim Jeans", 45),
            product(3, "Logo Tee", 35),
        ])
        .expect("snapshot");
        Generation::build(1, snapshot).expect("generation")
    }

    fn orchestrator(llm: Option<Arc<ScriptedLlm>>) -> ChatOrchestrator {
        let mut config = AppConfig::default();
        config.llm.timeout_secs = 1;
        let llm = llm.map(|llm| llm as Arc<dyn LlmClient>);
        let mut orchestrator = ChatOrchestrator::from_config(&config, llm).expect("orchestrator");
        orchestrator.llm_timeout = Duration::from_millis(50);
        orchestrator
    }

    #[tokio::test]
    async fn without_backend_every_message_gets_the_fallback() {
        let orchestrator = orchestrator(None);
        let generation = generation();

        for message in ["who owns this store?", "recommend me some jeans", "what's the weather", ""] {
            let reply = orchestrator.chat(Some(&generation), message, "test").await;
            assert_eq!(reply.reply, FALLBACK_REPLY);
            assert_eq!(reply.source, ReplySource::Fallback);
            assert!(reply.intent.is_none());
        }
    }

    #[tokio::test]
    async fn product_search_grounds_prompt_in_filtered_products() {
        let llm = ScriptedLlm::new(Script::Reply("  Try the Graphic Tee at $25.  "));
        let orchestrator = orchestrator(Some(Arc::clone(&llm)));

        let reply = orchestrator.chat(Some(&generation()), "show me tees under 30 bucks", "test").await;

        assert_eq!(reply.reply, "Try the Graphic Tee at $25.");
        assert_eq!(reply.intent, Some(Intent::ProductSearch));
        let prompt = llm.last_prompt().await;
        assert!(prompt.contains("Graphic Tee"));
        assert!(!prompt.contains("Logo Tee"));
        assert!(!prompt.contains("Denim Jeans"));
    }

    #[tokio::test]
    async fn product_search_without_matches_always_carries_the_fixed_sentence() {
        let llm = ScriptedLlm::new(Script::Reply("Maybe check back later!"));
        let orchestrator = orchestrator(Some(Arc::clone(&llm)));

        let reply = orchestrator.chat(Some(&generation()), "any hoodies under 10 bucks", "test").await;

        assert_eq!(
            reply.reply,
            format!("{NO_MATCHES_SENTENCE} {BROWSE_ALL_POINTER} Maybe check back later!")
        );
        let prompt = llm.last_prompt().await;
        assert!(prompt.contains(NO_MATCHES_SENTENCE));
        assert!(prompt.contains(BROWSE_ALL_POINTER));
    }

    #[tokio::test]
    async fn browse_pointer_follows_the_sentence_when_model_kept_only_the_sentence() {
        let llm = ScriptedLlm::new(Script::Reply(
            "We can't find any products matching that description. Sorry about that.",
        ));
        let orchestrator = orchestrator(Some(llm));

        let reply = orchestrator.chat(Some(&generation()), "any hoodies under 10 bucks", "test").await;

        assert_eq!(
            reply.reply,
            format!("{NO_MATCHES_SENTENCE} {BROWSE_ALL_POINTER} Sorry about that.")
        );
    }

    #[tokio::test]
    async fn context_products_are_capped_and_the_rest_counted() {
        let llm = ScriptedLlm::new(Script::Reply("Both tees are great."));
        let mut orchestrator = orchestrator(Some(Arc::clone(&llm)));
        orchestrator.max_context_products = 1;

        let reply = orchestrator.chat(Some(&generation()), "show me your tees", "test").await;

        assert_eq!(reply.reply, "Both tees are great.");
        let prompt = llm.last_prompt().await;
        assert!(prompt.contains("- Graphic Tee ($25): Graphic Tee description"));
        assert!(!prompt.contains("Logo Tee"));
        assert!(prompt.contains("There are 1 more matching products on the shop page."));
        assert!(!prompt.contains(NO_MATCHES_SENTENCE));
    }

    #[tokio::test]
    async fn no_match_sentence_is_not_duplicated_when_model_includes_it() {
        let llm = ScriptedLlm::new(Script::Reply(
            "We can't find any products matching that description. Browse the shop page!",
        ));
        let orchestrator = orchestrator(Some(llm));

        let reply = orchestrator.chat(None, "find me a hoodie", "test").await;

        assert_eq!(reply.reply.matches(NO_MATCHES_SENTENCE).count(), 1);
        assert_eq!(reply.reply.matches(BROWSE_ALL_POINTER).count(), 1);
    }

    #[tokio::test]
    async fn store_info_prompt_never_lists_products() {
        let llm = ScriptedLlm::new(Script::Reply("DHP Store is run by its founders."));
        let orchestrator = orchestrator(Some(Arc::clone(&llm)));

        let reply = orchestrator.chat(Some(&generation()), "who owns this store?", "test").await;

        assert_eq!(reply.intent, Some(Intent::StoreInfo));
        let prompt = llm.last_prompt().await;
        assert!(prompt.contains("dhpStore@gmail.com"));
        assert!(!prompt.contains("Graphic Tee"));
    }

    #[tokio::test]
    async fn backend_failure_and_timeout_yield_the_degraded_reply() {
        for script in [Script::Fail, Script::Hang, Script::Reply("   ")] {
            let orchestrator = orchestrator(Some(ScriptedLlm::new(script)));

            let reply = orchestrator.chat(Some(&generation()), "what's the weather", "test").await;

            assert_eq!(reply.reply, DEGRADED_REPLY);
            assert_eq!(reply.source, ReplySource::Degraded);
            assert_eq!(reply.intent, Some(Intent::General));
        }
    }
}

use serde_json::json;
use shopsense_agent::IntentClassifier;

use crate::commands::{load_config, CommandResult};

pub fn run(message: &str) -> CommandResult {
    let config = match load_config("classify") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let intent = IntentClassifier::new(&config.intent, &config.store).classify(message);

    CommandResult::success_with_data(
        "classify",
        format!("message routed to {}", intent.as_str()),
        Some(json!({ "intent": intent, "llm_configured": config.llm.is_configured() })),
    )
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use shopsense_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    let entries: Vec<(&str, String, &str)> = vec![
        ("database.url", config.database.url.clone(), "SHOPSENSE_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "SHOPSENSE_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "SHOPSENSE_DATABASE_TIMEOUT_SECS",
        ),
        ("llm.provider", format!("{:?}", config.llm.provider), "SHOPSENSE_LLM_PROVIDER"),
        ("llm.model", config.llm.model.clone(), "SHOPSENSE_LLM_MODEL"),
        (
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            "SHOPSENSE_LLM_BASE_URL",
        ),
        ("llm.api_key", llm_api_key.to_string(), "SHOPSENSE_LLM_API_KEY"),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), "SHOPSENSE_LLM_TIMEOUT_SECS"),
        ("server.bind_address", config.server.bind_address.clone(), "SHOPSENSE_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "SHOPSENSE_SERVER_PORT"),
        (
            "recommender.default_top_n",
            config.recommender.default_top_n.to_string(),
            "SHOPSENSE_RECOMMENDER_DEFAULT_TOP_N",
        ),
        (
            "recommender.max_top_n",
            config.recommender.max_top_n.to_string(),
            "SHOPSENSE_RECOMMENDER_MAX_TOP_N",
        ),
        (
            "recommender.refresh_timeout_secs",
            config.recommender.refresh_timeout_secs.to_string(),
            "SHOPSENSE_RECOMMENDER_REFRESH_TIMEOUT_SECS",
        ),
        (
            "chat.max_context_products",
            config.chat.max_context_products.to_string(),
            "SHOPSENSE_CHAT_MAX_CONTEXT_PRODUCTS",
        ),
        ("store.name", config.store.name.clone(), "SHOPSENSE_STORE_NAME"),
        ("store.contact_email", config.store.contact_email.clone(), "SHOPSENSE_STORE_CONTACT_EMAIL"),
        ("logging.level", config.logging.level.clone(), "SHOPSENSE_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "SHOPSENSE_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .into_iter()
            .map(|(key, value, env_key)| render_line(key, &value, source(key, env_key))),
    );
    lines.push(format!(
        "- llm.configured = {} (derived from llm.provider and credentials)",
        config.llm.is_configured()
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("shopsense.toml"), PathBuf::from("config/shopsense.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

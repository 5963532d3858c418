use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub recommender: RecommenderConfig,
    pub chat: ChatConfig,
    pub store: StoreProfile,
    pub intent: IntentConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RecommenderConfig {
    pub default_top_n: usize,
    pub max_top_n: usize,
    pub refresh_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub max_context_products: usize,
}

/// Fixed identity facts the assistant may share when asked about the store itself.
#[derive(Clone, Debug, Serialize)]
pub struct StoreProfile {
    pub name: String,
    pub assistant_name: String,
    pub founders: Vec<String>,
    pub staff: Vec<String>,
    pub contact_email: String,
    pub locations: Vec<String>,
}

/// Keywords added on top of the built-in intent tables. With a `replace_*_defaults` flag set,
/// the configured list is used instead of the built-in one for that intent.
#[derive(Clone, Debug, Default)]
pub struct IntentConfig {
    pub store_info_keywords: Vec<String>,
    pub product_search_keywords: Vec<String>,
    pub replace_store_info_defaults: bool,
    pub replace_product_search_defaults: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://shopsense.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 10000,
                graceful_shutdown_secs: 15,
            },
            recommender: RecommenderConfig {
                default_top_n: 4,
                max_top_n: 20,
                refresh_timeout_secs: 30,
            },
            chat: ChatConfig { max_context_products: 8 },
            store: StoreProfile::default(),
            intent: IntentConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for StoreProfile {
    fn default() -> Self {
        Self {
            name: "DHP Store".to_string(),
            assistant_name: "Naviah".to_string(),
            founders: Vec::new(),
            staff: Vec::new(),
            contact_email: "dhpStore@gmail.com".to_string(),
            locations: vec![
                "DHP Store Vincom Center Dong Khoi".to_string(),
                "DHP Store Su Van Hanh".to_string(),
                "DHP Store Binh Tan".to_string(),
                "DHP Store Vincom Mega Mall Times City".to_string(),
                "DHP Store Ha Dong".to_string(),
            ],
        }
    }
}

impl LlmConfig {
    /// Whether a language-model backend can be called. Hosted providers need an api key, a local
    /// Ollama needs a base URL.
    pub fn is_configured(&self) -> bool {
        match self.provider {
            LlmProvider::OpenAi | LlmProvider::Anthropic => self
                .api_key
                .as_ref()
                .map(|value| !value.expose_secret().trim().is_empty())
                .unwrap_or(false),
            LlmProvider::Ollama => {
                self.base_url.as_ref().map(|value| !value.trim().is_empty()).unwrap_or(false)
            }
            LlmProvider::None => false,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RecommenderConfig {
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "none" | "disabled" => Ok(Self::None),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama|none)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("shopsense.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(recommender) = patch.recommender {
            if let Some(default_top_n) = recommender.default_top_n {
                self.recommender.default_top_n = default_top_n;
            }
            if let Some(max_top_n) = recommender.max_top_n {
                self.recommender.max_top_n = max_top_n;
            }
            if let Some(refresh_timeout_secs) = recommender.refresh_timeout_secs {
                self.recommender.refresh_timeout_secs = refresh_timeout_secs;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(max_context_products) = chat.max_context_products {
                self.chat.max_context_products = max_context_products;
            }
        }

        if let Some(store) = patch.store {
            if let Some(name) = store.name {
                self.store.name = name;
            }
            if let Some(assistant_name) = store.assistant_name {
                self.store.assistant_name = assistant_name;
            }
            if let Some(founders) = store.founders {
                self.store.founders = founders;
            }
            if let Some(staff) = store.staff {
                self.store.staff = staff;
            }
            if let Some(contact_email) = store.contact_email {
                self.store.contact_email = contact_email;
            }
            if let Some(locations) = store.locations {
                self.store.locations = locations;
            }
        }

        if let Some(intent) = patch.intent {
            if let Some(keywords) = intent.store_info_keywords {
                self.intent.store_info_keywords = keywords;
            }
            if let Some(keywords) = intent.product_search_keywords {
                self.intent.product_search_keywords = keywords;
            }
            if let Some(replace) = intent.replace_store_info_defaults {
                self.intent.replace_store_info_defaults = replace;
            }
            if let Some(replace) = intent.replace_product_search_defaults {
                self.intent.replace_product_search_defaults = replace;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHOPSENSE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SHOPSENSE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SHOPSENSE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SHOPSENSE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPSENSE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("SHOPSENSE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SHOPSENSE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SHOPSENSE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SHOPSENSE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SHOPSENSE_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPSENSE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SHOPSENSE_SERVER_PORT") {
            self.server.port = parse_u16("SHOPSENSE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SHOPSENSE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPSENSE_RECOMMENDER_DEFAULT_TOP_N") {
            self.recommender.default_top_n =
                parse_usize("SHOPSENSE_RECOMMENDER_DEFAULT_TOP_N", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_RECOMMENDER_MAX_TOP_N") {
            self.recommender.max_top_n = parse_usize("SHOPSENSE_RECOMMENDER_MAX_TOP_N", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_RECOMMENDER_REFRESH_TIMEOUT_SECS") {
            self.recommender.refresh_timeout_secs =
                parse_u64("SHOPSENSE_RECOMMENDER_REFRESH_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPSENSE_CHAT_MAX_CONTEXT_PRODUCTS") {
            self.chat.max_context_products =
                parse_usize("SHOPSENSE_CHAT_MAX_CONTEXT_PRODUCTS", &value)?;
        }

        if let Some(value) = read_env("SHOPSENSE_STORE_NAME") {
            self.store.name = value;
        }
        if let Some(value) = read_env("SHOPSENSE_STORE_CONTACT_EMAIL") {
            self.store.contact_email = value;
        }

        let log_level =
            read_env("SHOPSENSE_LOGGING_LEVEL").or_else(|| read_env("SHOPSENSE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHOPSENSE_LOGGING_FORMAT").or_else(|| read_env("SHOPSENSE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_recommender(&self.recommender)?;
        validate_chat(&self.chat)?;
        validate_store(&self.store)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("shopsense.toml"), PathBuf::from("config/shopsense.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if let Some(base_url) = &llm.base_url {
        let base_url = base_url.trim();
        if !base_url.is_empty()
            && !base_url.starts_with("http://")
            && !base_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if llm.provider != LlmProvider::None && llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommender(recommender: &RecommenderConfig) -> Result<(), ConfigError> {
    if recommender.default_top_n == 0 {
        return Err(ConfigError::Validation(
            "recommender.default_top_n must be greater than zero".to_string(),
        ));
    }

    if recommender.max_top_n < recommender.default_top_n {
        return Err(ConfigError::Validation(
            "recommender.max_top_n must be at least recommender.default_top_n".to_string(),
        ));
    }

    if recommender.refresh_timeout_secs == 0 || recommender.refresh_timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "recommender.refresh_timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.max_context_products == 0 {
        return Err(ConfigError::Validation(
            "chat.max_context_products must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_store(store: &StoreProfile) -> Result<(), ConfigError> {
    if store.name.trim().is_empty() {
        return Err(ConfigError::Validation("store.name must not be empty".to_string()));
    }
    if store.assistant_name.trim().is_empty() {
        return Err(ConfigError::Validation("store.assistant_name must not be empty".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    recommender: Option<RecommenderPatch>,
    chat: Option<ChatPatch>,
    store: Option<StorePatch>,
    intent: Option<IntentPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommenderPatch {
    default_top_n: Option<usize>,
    max_top_n: Option<usize>,
    refresh_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    max_context_products: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    name: Option<String>,
    assistant_name: Option<String>,
    founders: Option<Vec<String>>,
    staff: Option<Vec<String>>,
    contact_email: Option<String>,
    locations: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct IntentPatch {
    store_info_keywords: Option<Vec<String>>,
    product_search_keywords: Option<Vec<String>>,
    replace_store_info_defaults: Option<bool>,
    replace_product_search_defaults: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_leave_language_model_unconfigured() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(!config.llm.is_configured(), "openai without api key should be unconfigured")?;
        ensure(config.recommender.default_top_n == 4, "default top n should be 4")?;
        ensure(config.store.assistant_name == "Naviah", "default assistant name")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SHOPSENSE_LLM_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("shopsense.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "open_ai"
api_key = "${TEST_SHOPSENSE_LLM_KEY}"

[store]
name = "Test Store"
staff = ["Linh", "Minh"]

[intent]
store_info_keywords = ["headquarters"]
replace_store_info_defaults = true
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be loaded from environment",
            )?;
            ensure(config.llm.is_configured(), "openai with api key should be configured")?;
            ensure(config.store.name == "Test Store", "store name should come from file")?;
            ensure(config.store.staff.len() == 2, "staff list should come from file")?;
            ensure(
                config.intent.store_info_keywords == vec!["headquarters".to_string()],
                "intent keywords should come from file",
            )?;
            ensure(
                config.intent.replace_store_info_defaults
                    && !config.intent.replace_product_search_defaults,
                "replace flags should come from file per intent",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_SHOPSENSE_LLM_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SHOPSENSE_LOG_LEVEL", "warn");
        env::set_var("SHOPSENSE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["SHOPSENSE_LOG_LEVEL", "SHOPSENSE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SHOPSENSE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("SHOPSENSE_RECOMMENDER_DEFAULT_TOP_N", "6");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("shopsense.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[recommender]
default_top_n = 5
max_top_n = 10

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    llm_provider: Some(LlmProvider::Ollama),
                    llm_base_url: Some("http://localhost:11434".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.recommender.default_top_n == 6, "env top n should win over file")?;
            ensure(config.recommender.max_top_n == 10, "file max top n should win over default")?;
            ensure(config.llm.is_configured(), "ollama with base url should be configured")?;
            Ok(())
        })();

        clear_vars(&["SHOPSENSE_DATABASE_URL", "SHOPSENSE_RECOMMENDER_DEFAULT_TOP_N"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SHOPSENSE_DATABASE_URL", "mysql://localhost/shop");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("database.url")
            );
            ensure(has_message, "validation failure should mention database.url")
        })();

        clear_vars(&["SHOPSENSE_DATABASE_URL"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SHOPSENSE_SERVER_PORT", "not-a-port");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "SHOPSENSE_SERVER_PORT" => {
                Ok(())
            }
            other => Err(format!("expected invalid env override, got {other:?}")),
        };

        clear_vars(&["SHOPSENSE_SERVER_PORT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SHOPSENSE_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["SHOPSENSE_LLM_API_KEY"]);
        result
    }
}

use std::sync::Arc;

use shopsense_agent::{client_from_config, ChatError, ChatOrchestrator};
use shopsense_core::catalog::CatalogSource;
use shopsense_core::config::{AppConfig, ConfigError, LoadOptions};
use shopsense_core::recommend::GenerationStore;
use shopsense_db::{connect_with_config, migrations, DbPool, SqlCatalogSource};
use thiserror::Error;
use tracing::{info, warn};

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("language model client setup failed: {0}")]
    LlmClient(#[source] anyhow::Error),
    #[error("chat setup failed: {0}")]
    Chat(#[from] ChatError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Connects, migrates, builds the first catalog generation and wires the chat orchestrator.
///
/// A failed first refresh is logged and the service starts without a generation; a later
/// `POST /refresh` can publish one.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_config(&config.database)
        .await
        .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let llm = client_from_config(&config.llm).map_err(BootstrapError::LlmClient)?;
    if llm.is_none() {
        warn!(
            event_name = "system.bootstrap.llm_unconfigured",
            correlation_id = "bootstrap",
            provider = ?config.llm.provider,
            "no language model configured; chat will return the fallback reply"
        );
    }
    let chat = ChatOrchestrator::from_config(&config, llm)?;

    let catalog: Arc<dyn CatalogSource> = Arc::new(SqlCatalogSource::new(db_pool.clone()));
    let store = Arc::new(GenerationStore::new(config.recommender.refresh_timeout()));

    if let Err(error) = store.refresh(catalog.as_ref()).await {
        warn!(
            event_name = "system.bootstrap.initial_refresh_failed",
            correlation_id = "bootstrap",
            error = %error,
            "initial catalog refresh failed; serving without a generation"
        );
    }

    let state = AppState::new(
        store,
        catalog,
        Arc::new(chat),
        config.recommender.clone(),
        db_pool.clone(),
    );

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use shopsense_core::config::{ConfigOverrides, LoadOptions};
    use shopsense_core::domain::product::ProductId;
    use shopsense_db::DemoCatalog;

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_configuration() {
        let result = bootstrap(overrides("postgres://localhost/shop")).await;

        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }

    #[tokio::test]
    async fn bootstrap_starts_without_generation_on_empty_catalog_then_refreshes() {
        let app = bootstrap(overrides("sqlite::memory:"))
            .await
            .expect("bootstrap should succeed on an empty database");

        assert!(app.state.store.current().await.is_none());
        assert!(!app.state.chat.backend_configured());

        DemoCatalog::load(&app.db_pool).await.expect("seed demo catalog");
        let outcome =
            app.state.store.refresh(app.state.catalog.as_ref()).await.expect("refresh");

        assert_eq!(outcome.generation.number(), 1);
        assert!(!outcome.generation.similar(ProductId(1), 4).is_empty());

        app.db_pool.close().await;
    }
}

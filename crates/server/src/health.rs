use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use shopsense_core::recommend::GenerationStore;
use shopsense_db::{ping, DbPool};

use crate::routes::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub catalog: HealthCheck,
    pub checked_at: String,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let catalog = catalog_check(&state.store).await;
    let ready = database.status == "ready" && catalog.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: if state.chat.backend_configured() {
                "shopsense-server running with language model".to_string()
            } else {
                "shopsense-server running without language model".to_string()
            },
        },
        database,
        catalog,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match ping(pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn catalog_check(store: &GenerationStore) -> HealthCheck {
    match store.current().await {
        Some(generation) => HealthCheck {
            status: "ready",
            detail: format!(
                "generation {} with {} products built at {}",
                generation.number(),
                generation.product_count(),
                generation.built_at().to_rfc3339()
            ),
        },
        None => HealthCheck {
            status: "degraded",
            detail: "no catalog generation published yet".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{extract::State, http::StatusCode, Json};
    use rust_decimal::Decimal;
    use shopsense_agent::ChatOrchestrator;
    use shopsense_core::catalog::StaticCatalogSource;
    use shopsense_core::config::AppConfig;
    use shopsense_core::domain::product::{Product, ProductId};
    use shopsense_core::recommend::GenerationStore;
    use shopsense_db::connect_with_settings;

    use crate::health::health;
    use crate::routes::AppState;

    async fn state() -> AppState {
        let config = AppConfig::default();
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let catalog = Arc::new(StaticCatalogSource::new(vec![Product {
            id: ProductId(1),
            name: "Graphic Tee".to_string(),
            description: "cotton".to_string(),
            price: Decimal::new(2500, 2),
            category: "Tees".to_string(),
        }]));
        AppState::new(
            Arc::new(GenerationStore::new(Duration::from_secs(5))),
            catalog,
            Arc::new(ChatOrchestrator::from_config(&config, None).expect("chat")),
            config.recommender,
            pool,
        )
    }

    #[tokio::test]
    async fn health_is_degraded_until_a_generation_is_published() {
        let state = state().await;

        let (status, Json(payload)) = health(State(state.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.catalog.status, "degraded");

        state.store.refresh(state.catalog.as_ref()).await.expect("refresh");

        let (status, Json(payload)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert!(payload.catalog.detail.starts_with("generation 1 with 1 products"));
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let state = state().await;
        state.store.refresh(state.catalog.as_ref()).await.expect("refresh");
        state.db_pool.close().await;

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shopsense_agent::ChatOrchestrator;
use shopsense_core::catalog::CatalogSource;
use shopsense_core::config::RecommenderConfig;
use shopsense_core::domain::product::ProductId;
use shopsense_core::errors::ApplicationError;
use shopsense_core::recommend::GenerationStore;
use shopsense_db::DbPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::health;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<GenerationStore>,
    pub catalog: Arc<dyn CatalogSource>,
    pub chat: Arc<ChatOrchestrator>,
    pub recommender: RecommenderConfig,
    pub db_pool: DbPool,
}

impl AppState {
    pub fn new(
        store: Arc<GenerationStore>,
        catalog: Arc<dyn CatalogSource>,
        chat: Arc<ChatOrchestrator>,
        recommender: RecommenderConfig,
        db_pool: DbPool,
    ) -> Self {
        Self { store, catalog, chat, recommender, db_pool }
    }

    /// Caller-supplied limits are clamped to `1..=max_top_n`.
    fn top_n(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.recommender.default_top_n)
            .clamp(1, self.recommender.max_top_n.max(1))
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub product_id: i64,
    pub recommendations: Vec<ProductId>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/recommend/{product_id}", get(recommend))
        .route("/refresh", post(refresh))
        .route("/chat", post(chat))
        .route("/health", get(health::health))
        .with_state(state)
}

async fn home() -> Json<StatusResponse> {
    Json(StatusResponse { status: "AI Service Running" })
}

async fn recommend(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Query(params): Query<RecommendParams>,
) -> Json<RecommendResponse> {
    let top_n = state.top_n(params.limit);
    let recommendations = match state.store.current().await {
        Some(generation) => generation.similar(ProductId(product_id), top_n),
        None => Vec::new(),
    };

    Json(RecommendResponse { product_id, recommendations })
}

async fn refresh(State(state): State<AppState>) -> (StatusCode, Json<RefreshResponse>) {
    let correlation_id = Uuid::new_v4().to_string();

    match state.store.refresh(state.catalog.as_ref()).await {
        Ok(outcome) => {
            info!(
                event_name = "http.refresh.completed",
                correlation_id = %correlation_id,
                generation = outcome.generation.number(),
                coalesced = outcome.coalesced,
                "catalog refresh request completed"
            );
            (
                StatusCode::OK,
                Json(RefreshResponse {
                    status: "Refreshed",
                    generation: Some(outcome.generation.number()),
                    product_count: Some(outcome.generation.product_count()),
                    error: None,
                    correlation_id: None,
                }),
            )
        }
        Err(error) => {
            let interface = ApplicationError::from(error).into_interface(correlation_id);
            warn!(
                event_name = "http.refresh.failed",
                correlation_id = interface.correlation_id(),
                error = %interface,
                "catalog refresh request failed"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(RefreshResponse {
                    status: "Failed",
                    generation: None,
                    product_count: None,
                    error: Some(interface.user_message()),
                    correlation_id: Some(interface.correlation_id().to_string()),
                }),
            )
        }
    }
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Json<ChatResponse> {
    let correlation_id = Uuid::new_v4().to_string();
    let generation = state.store.current().await;

    let reply = state.chat.chat(generation.as_deref(), &request.message, &correlation_id).await;

    Json(ChatResponse { reply: reply.reply })
}

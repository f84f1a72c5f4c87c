//! Interactive HTTP mode for the enrichment job.
//!
//! A small JSON API over the same pipeline as batch mode. Failures fail
//! the request with an error body instead of leaking as unhandled
//! rejections.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/gen` | Enrich one product: `{"product":{"name":"sku42.png"}}` inserts a new row; `{"index":3}` re-enriches the existing row at that offset |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "either product or index is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `parse_error`
//! (500, model output was not the expected JSON), `internal` (500).

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use organizer_core::Error as CoreError;

use crate::config::Config;
use crate::enrich::{enrich_new, enrich_product};
use crate::genai::GenerativeModel;
use crate::warehouse::Warehouse;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub model: Arc<dyn GenerativeModel>,
    pub warehouse: Arc<Warehouse>,
}

#[derive(Debug, Deserialize)]
struct GenRequest {
    product: Option<ProductInput>,
    index: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ProductInput {
    name: String,
}

fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    let body = serde_json::json!({ "error": { "code": code, "message": message } });
    (status, Json(body)).into_response()
}

fn map_pipeline_error(err: anyhow::Error) -> Response {
    if let Some(CoreError::Parse(message)) = err.downcast_ref::<CoreError>() {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "parse_error",
            format!("model response could not be parsed: {message}"),
        );
    }
    error!(error = %err, "enrichment request failed");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        err.to_string(),
    )
}

async fn gen_handler(State(state): State<AppState>, Json(request): Json<GenRequest>) -> Response {
    let outcome = match (&request.product, request.index) {
        (Some(product), _) => {
            enrich_new(&state.config, &*state.model, &state.warehouse, &product.name).await
        }
        (None, Some(index)) => {
            let product = match state.warehouse.get_product(index).await {
                Ok(Some(product)) => product,
                Ok(None) => {
                    return error_response(
                        StatusCode::NOT_FOUND,
                        "not_found",
                        format!("no product row at index {index}"),
                    )
                }
                Err(err) => return map_pipeline_error(err),
            };
            enrich_product(&state.config, &*state.model, &state.warehouse, &product).await
        }
        (None, None) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "bad_request",
                "either product or index is required".to_string(),
            )
        }
    };

    match outcome {
        Ok(outcome) => Json(serde_json::json!({
            "message": "OK",
            "id": outcome.product_id,
            "image": outcome.image_uri,
        }))
        .into_response(),
        Err(err) => map_pipeline_error(err),
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

/// Build the router. Exposed separately from [`run_server`] so tests can
/// drive it in-process.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/gen", post(gen_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind `[server].bind` and serve until the process is terminated.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.server.bind.clone();
    let app = router(state);

    println!("aio serve listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

//! End-to-end tests for the enrichment pipeline: scripted model, real
//! SQLite warehouse in a temp directory, and the HTTP router driven
//! in-process.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use organizer::config::{BatchItem, Config, JobConfig, ModelConfig, ServerConfig, StorageConfig, WarehouseConfig};
use organizer::enrich::{enrich_new, run_batch};
use organizer::genai::{GenerateRequest, GenerativeModel};
use organizer::server::{router, AppState};
use organizer::warehouse::Warehouse;
use organizer::{db, migrate};

/// Model stub that returns a fixed text for every request.
struct Scripted {
    text: String,
}

impl Scripted {
    fn new(text: &str) -> Self {
        Scripted {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl GenerativeModel for Scripted {
    async fn generate(&self, _request: &GenerateRequest) -> Result<String> {
        Ok(self.text.clone())
    }
}

const GOOD_RESPONSE: &str =
    r#"{"title":"T","description":"D","categories":["a"],"tags":["b"]}"#;

fn test_config(dir: &tempfile::TempDir, items: Vec<&str>) -> Config {
    Config {
        warehouse: WarehouseConfig {
            db_path: dir.path().join("warehouse.sqlite"),
            table: "products".to_string(),
        },
        storage: StorageConfig {
            bucket: "catalog-images".to_string(),
        },
        model: ModelConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 5,
            prompt: None,
        },
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
        job: JobConfig {
            items: Some(
                items
                    .into_iter()
                    .map(|name| BatchItem {
                        name: name.to_string(),
                    })
                    .collect(),
            ),
        },
    }
}

async fn setup(config: &Config) -> Warehouse {
    let pool = db::connect(config).await.unwrap();
    migrate::run_migrations(config, &pool).await.unwrap();
    Warehouse::new(pool, config.warehouse.table.clone())
}

#[tokio::test]
async fn batch_task_enriches_the_indexed_item() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir, vec!["a.png", "b.png", "c.png", "sku42.png", "e.png"]);
    let warehouse = setup(&config).await;
    let model = Scripted::new(GOOD_RESPONSE);

    // This is the only test that touches CLOUD_RUN_TASK_INDEX.
    std::env::set_var("CLOUD_RUN_TASK_INDEX", "3");
    let outcome = run_batch(&config, &model, &warehouse).await;
    std::env::remove_var("CLOUD_RUN_TASK_INDEX");

    let outcome = outcome.unwrap();
    assert_eq!(outcome.product_id, "sku42");
    assert_eq!(outcome.image_uri, "gs://catalog-images/sku42.png");

    assert_eq!(warehouse.count().await.unwrap(), 1);
    let record = warehouse.fetch("sku42").await.unwrap().unwrap();
    assert_eq!(record.image, "sku42.png");
    assert_eq!(record.title.as_deref(), Some("T"));
    assert_eq!(record.description.as_deref(), Some("D"));
    assert_eq!(record.categories, vec!["a"]);
    assert_eq!(record.tags, vec!["b"]);
}

#[tokio::test]
async fn batch_task_index_out_of_range_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir, vec!["a.png"]);
    config.job.items = Some(vec![]);
    let warehouse = setup(&config).await;
    let model = Scripted::new(GOOD_RESPONSE);

    let result = run_batch(&config, &model, &warehouse).await;
    assert!(result.is_err());
    assert_eq!(warehouse.count().await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_model_response_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir, vec!["sku42.png"]);
    let warehouse = setup(&config).await;
    let model = Scripted::new("certainly! here is your JSON: {\"title\"");

    let err = enrich_new(&config, &model, &warehouse, "sku42.png")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<organizer_core::Error>(),
        Some(organizer_core::Error::Parse(_))
    ));
    assert_eq!(warehouse.count().await.unwrap(), 0);
}

#[tokio::test]
async fn warehouse_roundtrip_binds_untrusted_text() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir, vec![]);
    let warehouse = setup(&config).await;

    let enrichment = organizer::warehouse::ProductEnrichment {
        title: "Robert'); DROP TABLE products;--".to_string(),
        description: "a \"quoted\" description".to_string(),
        categories: vec!["x'y".to_string()],
        tags: vec!["#tag".to_string()],
    };
    warehouse
        .insert_product("sku1", "sku1.png", &enrichment)
        .await
        .unwrap();

    let record = warehouse.fetch("sku1").await.unwrap().unwrap();
    assert_eq!(record.title.as_deref(), Some("Robert'); DROP TABLE products;--"));
    assert_eq!(record.categories, vec!["x'y"]);
    assert_eq!(warehouse.count().await.unwrap(), 1);

    // Table survived the hostile title.
    let product = warehouse.get_product(0).await.unwrap().unwrap();
    assert_eq!(product.id, "sku1");
}

async fn state_with(dir: &tempfile::TempDir, model_text: &str) -> AppState {
    let config = test_config(dir, vec![]);
    let warehouse = setup(&config).await;
    AppState {
        config: Arc::new(config),
        model: Arc::new(Scripted::new(model_text)),
        warehouse: Arc::new(warehouse),
    }
}

async fn post_gen(state: AppState, body: &str) -> (StatusCode, serde_json::Value) {
    let response = router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/gen")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn gen_endpoint_inserts_named_product() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(&dir, GOOD_RESPONSE).await;
    let warehouse = state.warehouse.clone();

    let (status, json) = post_gen(state, r#"{"product":{"name":"sku42.png"}}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], "sku42");
    assert_eq!(json["image"], "gs://catalog-images/sku42.png");
    assert_eq!(warehouse.count().await.unwrap(), 1);
}

#[tokio::test]
async fn gen_endpoint_index_mode_updates_existing_row() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(
        &dir,
        r#"{"title":"T2","description":"D2","categories":["c2"],"tags":["t2"]}"#,
    )
    .await;
    let warehouse = state.warehouse.clone();
    let seed = organizer::warehouse::ProductEnrichment {
        title: "T1".to_string(),
        description: "D1".to_string(),
        categories: vec![],
        tags: vec![],
    };
    warehouse
        .insert_product("sku42", "sku42.png", &seed)
        .await
        .unwrap();

    let (status, json) = post_gen(state, r#"{"index":0}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], "sku42");

    let record = warehouse.fetch("sku42").await.unwrap().unwrap();
    assert_eq!(record.title.as_deref(), Some("T2"));
    assert_eq!(warehouse.count().await.unwrap(), 1);
}

#[tokio::test]
async fn gen_endpoint_index_mode_missing_row_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(&dir, GOOD_RESPONSE).await;

    let (status, json) = post_gen(state, r#"{"index":7}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn gen_endpoint_requires_product_or_index() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(&dir, GOOD_RESPONSE).await;

    let (status, json) = post_gen(state, r#"{}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
}

#[tokio::test]
async fn gen_endpoint_surfaces_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(&dir, "not json at all").await;
    let warehouse = state.warehouse.clone();

    let (status, json) = post_gen(state, r#"{"product":{"name":"sku42.png"}}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "parse_error");
    assert_eq!(warehouse.count().await.unwrap(), 0);
}

#[tokio::test]
async fn health_reports_version() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(&dir, GOOD_RESPONSE).await;

    let response = router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

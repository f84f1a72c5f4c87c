//! Catalog enrichment orchestration.
//!
//! One run handles exactly one product image: resolve the item, send the
//! image and prompt to the model, parse the structured result, write one
//! warehouse row. Batch task-array mode picks the item by the task index
//! the runner assigns; interactive mode enriches a named image or an
//! existing row by offset. Any failure aborts the attempt with zero rows
//! written — nothing here retries or partially commits.

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::{task_index, Config};
use crate::genai::{parse_enrichment, GenerateRequest, GenerativeModel, Part};
use crate::warehouse::Warehouse;

/// Built-in prompt, overridable via `[model].prompt`.
pub const DEFAULT_PROMPT: &str = "\
You are the content manager of an e-commerce site. Based on the attached \
product image, write the product information for its listing page. \
Respond in JSON with these attributes:

- title : an appealing product name for the listing page title. String.
- description : a paragraph introducing the product. String.
- categories : product categories. Array of strings.
- tags : product hashtags. Array of strings.
";

/// Split an item name into product id and storage URI:
/// `"sku42.png"` → `("sku42", "gs://{bucket}/sku42.png")`.
pub fn resolve_item(name: &str, bucket: &str) -> (String, String) {
    let product_id = name.split('.').next().unwrap_or(name).to_string();
    let uri = format!("gs://{bucket}/{name}");
    (product_id, uri)
}

fn image_mime(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

fn prompt(config: &Config) -> &str {
    config.model.prompt.as_deref().unwrap_or(DEFAULT_PROMPT)
}

/// Outcome of one enrichment attempt.
#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    pub product_id: String,
    pub image_uri: String,
}

/// Enrich a new product image and insert its row.
pub async fn enrich_new(
    config: &Config,
    model: &dyn GenerativeModel,
    warehouse: &Warehouse,
    name: &str,
) -> Result<EnrichmentOutcome> {
    let (product_id, uri) = resolve_item(name, &config.storage.bucket);
    info!(uri = %uri, "enriching product image");

    let request = GenerateRequest::user(vec![
        Part::text(prompt(config)),
        Part::file(uri.clone(), image_mime(name)),
    ]);
    let text = model.generate(&request).await?;
    let enrichment = parse_enrichment(&text)?;

    warehouse.insert_product(&product_id, name, &enrichment).await?;
    info!(product = %product_id, "enrichment row inserted");
    Ok(EnrichmentOutcome {
        product_id,
        image_uri: uri,
    })
}

/// Re-enrich the existing row at `index` (insertion order) and update it
/// in place.
pub async fn enrich_existing(
    config: &Config,
    model: &dyn GenerativeModel,
    warehouse: &Warehouse,
    index: i64,
) -> Result<EnrichmentOutcome> {
    let product = warehouse
        .get_product(index)
        .await?
        .with_context(|| format!("no product row at index {index}"))?;
    enrich_product(config, model, warehouse, &product).await
}

/// Re-enrich one known row and update it in place.
pub async fn enrich_product(
    config: &Config,
    model: &dyn GenerativeModel,
    warehouse: &Warehouse,
    product: &crate::warehouse::ProductRef,
) -> Result<EnrichmentOutcome> {
    let (_, uri) = resolve_item(&product.image, &config.storage.bucket);
    info!(uri = %uri, product = %product.id, "re-enriching product image");

    let request = GenerateRequest::user(vec![
        Part::text(prompt(config)),
        Part::file(uri.clone(), image_mime(&product.image)),
    ]);
    let text = model.generate(&request).await?;
    let enrichment = parse_enrichment(&text)?;

    warehouse
        .update_product(&product.id, &product.image, &enrichment)
        .await?;
    Ok(EnrichmentOutcome {
        product_id: product.id.clone(),
        image_uri: uri,
    })
}

/// Batch task-array mode: process the single item this task instance owns.
///
/// The item list comes from `ITEMS`/`[job].items`; the index from
/// `CLOUD_RUN_TASK_INDEX` (0 when unset). One item, one row; any failure
/// is fatal to the task and the process exits non-zero.
pub async fn run_batch(
    config: &Config,
    model: &dyn GenerativeModel,
    warehouse: &Warehouse,
) -> Result<EnrichmentOutcome> {
    let items = config.batch_items()?;
    let index = task_index()?;
    let item = match items.get(index) {
        Some(item) => item,
        None => bail!("task index {} out of range: {} items", index, items.len()),
    };
    enrich_new(config, model, warehouse, &item.name).await
}

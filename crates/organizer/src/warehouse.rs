//! Warehouse access for the enrichment job.
//!
//! One fixed table keyed by product id. All values go through bound
//! parameters — model output (titles, descriptions) is untrusted text and
//! must never be interpolated into SQL. Only the table name, validated to
//! a plain identifier at config load, is formatted in.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Structured enrichment produced by the model for one product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEnrichment {
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

/// An existing row's identity, as fetched for the update path.
#[derive(Debug, Clone)]
pub struct ProductRef {
    pub id: String,
    pub image: String,
}

/// A full row, used for verification and the HTTP read path.
#[derive(Debug, Clone, Serialize)]
pub struct ProductRecord {
    pub id: String,
    pub image: String,
    pub title: Option<String>,
    pub categories: Vec<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

pub struct Warehouse {
    pool: SqlitePool,
    table: String,
}

impl Warehouse {
    /// `table` must already be validated as a plain identifier
    /// (see `config::load_config`).
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Self {
        Warehouse {
            pool,
            table: table.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The row at `index` in insertion order, for interactive index mode.
    pub async fn get_product(&self, index: i64) -> Result<Option<ProductRef>> {
        let row = sqlx::query(&format!(
            "SELECT id, image FROM {} LIMIT 1 OFFSET ?",
            self.table
        ))
        .bind(index)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ProductRef {
            id: r.get("id"),
            image: r.get("image"),
        }))
    }

    pub async fn insert_product(
        &self,
        id: &str,
        image: &str,
        enrichment: &ProductEnrichment,
    ) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {} (id, image, title, categories, description, tags) VALUES (?, ?, ?, ?, ?, ?)",
            self.table
        ))
        .bind(id)
        .bind(image)
        .bind(&enrichment.title)
        .bind(serde_json::to_string(&enrichment.categories)?)
        .bind(&enrichment.description)
        .bind(serde_json::to_string(&enrichment.tags)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_product(
        &self,
        id: &str,
        image: &str,
        enrichment: &ProductEnrichment,
    ) -> Result<()> {
        sqlx::query(&format!(
            "UPDATE {} SET title = ?, categories = ?, description = ?, tags = ?, image = ? WHERE id = ?",
            self.table
        ))
        .bind(&enrichment.title)
        .bind(serde_json::to_string(&enrichment.categories)?)
        .bind(&enrichment.description)
        .bind(serde_json::to_string(&enrichment.tags)?)
        .bind(image)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fetch(&self, id: &str) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(&format!(
            "SELECT id, image, title, categories, description, tags FROM {} WHERE id = ?",
            self.table
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ProductRecord {
            id: r.get("id"),
            image: r.get("image"),
            title: r.get("title"),
            categories: parse_json_list(r.get::<Option<String>, _>("categories")),
            description: r.get("description"),
            tags: parse_json_list(r.get::<Option<String>, _>("tags")),
        }))
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn parse_json_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

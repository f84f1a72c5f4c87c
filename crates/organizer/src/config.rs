use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable set by the task runner to select the batch item
/// this task instance should process.
pub const TASK_INDEX_VAR: &str = "CLOUD_RUN_TASK_INDEX";
/// Environment variable carrying the batch item list as a JSON array,
/// overriding `[job].items` from the config file.
pub const ITEMS_VAR: &str = "ITEMS";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub warehouse: WarehouseConfig,
    pub storage: StorageConfig,
    pub model: ModelConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub job: JobConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    "products".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Bucket holding the product images referenced by batch items.
    pub bucket: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Base URL of the generateContent-style endpoint.
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Override for the built-in enrichment prompt.
    #[serde(default)]
    pub prompt: Option<String>,
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct JobConfig {
    /// Batch items for task-array mode. Overridden by the `ITEMS`
    /// environment variable when set.
    #[serde(default)]
    pub items: Option<Vec<BatchItem>>,
}

/// One work item of the enrichment batch: the object name of a product
/// image, e.g. `"sku42.png"`.
#[derive(Debug, Deserialize, Clone)]
pub struct BatchItem {
    pub name: String,
}

impl Config {
    /// Resolve the batch item list: `ITEMS` env (JSON array) wins over
    /// `[job].items`.
    pub fn batch_items(&self) -> Result<Vec<BatchItem>> {
        if let Ok(raw) = std::env::var(ITEMS_VAR) {
            let items: Vec<BatchItem> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {} as a JSON array", ITEMS_VAR))?;
            return Ok(items);
        }
        self.job
            .items
            .clone()
            .context("No batch items: set [job].items or the ITEMS environment variable")
    }
}

/// The task-array index assigned to this instance; 0 when unset.
pub fn task_index() -> Result<usize> {
    match std::env::var(TASK_INDEX_VAR) {
        Ok(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("{} must be a non-negative integer, got '{}'", TASK_INDEX_VAR, raw)),
        Err(_) => Ok(0),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // The table name is interpolated into SQL (identifiers cannot be
    // bound), so it must stay a plain identifier.
    if config.warehouse.table.is_empty()
        || !config
            .warehouse
            .table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        anyhow::bail!(
            "warehouse.table must be a plain identifier, got '{}'",
            config.warehouse.table
        );
    }

    if config.storage.bucket.is_empty() {
        anyhow::bail!("storage.bucket must not be empty");
    }

    if config.model.endpoint.is_empty() {
        anyhow::bail!("model.endpoint must not be empty");
    }
    if config.model.timeout_secs == 0 {
        anyhow::bail!("model.timeout_secs must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    const VALID: &str = r#"
[warehouse]
db_path = "/tmp/warehouse.sqlite"

[storage]
bucket = "catalog-images"

[model]
endpoint = "http://127.0.0.1:9999"

[server]
bind = "127.0.0.1:3000"

[[job.items]]
name = "sku1.png"
"#;

    #[test]
    fn defaults_applied() {
        let file = write_config(VALID);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.warehouse.table, "products");
        assert_eq!(config.model.model, "gemini-1.5-flash");
        assert_eq!(config.model.timeout_secs, 30);
        assert_eq!(config.job.items.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn rejects_non_identifier_table() {
        let body = VALID.replace(
            "db_path = \"/tmp/warehouse.sqlite\"",
            "db_path = \"/tmp/warehouse.sqlite\"\ntable = \"products; DROP TABLE x\"",
        );
        let file = write_config(&body);
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn items_env_overrides_config() {
        let file = write_config(VALID);
        let config = load_config(file.path()).unwrap();
        std::env::set_var(ITEMS_VAR, r#"[{"name":"a.png"},{"name":"b.png"}]"#);
        let items = config.batch_items().unwrap();
        std::env::remove_var(ITEMS_VAR);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].name, "b.png");
    }
}

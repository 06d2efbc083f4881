use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Configuration item definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigItem {
    pub name: String,
    /// Display title (friendly name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl ConfigItem {
    pub fn new(name: &str, item_type: &str) -> Self {
        Self {
            name: name.to_string(),
            title: None,
            item_type: item_type.to_string(),
            default: None,
            required: false,
            help: None,
        }
    }

    pub fn title(mut self, val: &str) -> Self {
        self.title = Some(val.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, val: &str) -> Self {
        self.default = Some(val.to_string());
        self
    }

    pub fn help(mut self, val: &str) -> Self {
        self.help = Some(val.to_string());
        self
    }
}

/// Backend description for host registries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendInfo {
    pub protocol: String,
    pub display_name: String,
    pub description: String,
    /// Backend-specific configuration items
    pub items: Vec<ConfigItem>,
}

/// Normalized listing record
///
/// Entries are children of the single directory the backend addresses;
/// listings are shallow and never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub is_dir: bool,
    /// Size in bytes, -1 when the remote did not report one.
    pub size: i64,
    pub modified: Option<DateTime<Utc>>,
}

/// Storage backend interface (provides only primitive operations)
///
/// Every operation is a single request/response exchange against the remote
/// store. Implementations hold only immutable configuration, so a shared
/// instance is safe to call from concurrent tasks.
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Protocol key the host discovers this backend by
    fn protocol(&self) -> &'static str;

    /// Human-readable backend name
    fn display_name(&self) -> &'static str;

    /// Verify the backend is reachable and lists correctly
    async fn test(&self) -> Result<()>;

    /// List the entries of the addressed directory
    async fn list(&self) -> Result<Vec<Entry>>;

    /// Create the addressed directory on the remote store
    async fn create_folder(&self) -> Result<()>;

    /// Upload a byte stream under `name`. `size_hint` declares the content
    /// length when the source length is known; `None` streams without one.
    async fn put(
        &self,
        name: &str,
        source: Box<dyn AsyncRead + Send + Unpin>,
        size_hint: Option<u64>,
    ) -> Result<()>;

    /// Download the object under `name` into `dest`, returning the number
    /// of bytes copied.
    async fn get(&self, name: &str, dest: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<u64>;

    /// Delete the object under `name`
    async fn delete(&self, name: &str) -> Result<()>;

    /// Upload a local file
    async fn put_file(&self, name: &str, path: &Path) -> Result<()> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await.ok().map(|m| m.len());
        self.put(name, Box::new(file), size).await
    }

    /// Download into a local file, created or truncated
    async fn get_file(&self, name: &str, path: &Path) -> Result<()> {
        let mut file = tokio::fs::File::create(path).await?;
        self.get(name, &mut file).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Backend factory trait
pub trait BackendFactory: Send + Sync {
    /// Protocol key
    fn protocol(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Backend-specific configuration items
    fn config_items(&self) -> Vec<ConfigItem>;

    /// Create a backend instance from an options mapping
    fn create(&self, options: serde_json::Value) -> Result<Box<dyn Backend>>;

    /// Generate complete backend info for host registries
    fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            protocol: self.protocol().to_string(),
            display_name: self.display_name().to_string(),
            description: self.description().to_string(),
            items: self.config_items(),
        }
    }
}

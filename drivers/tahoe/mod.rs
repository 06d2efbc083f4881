//! Tahoe-LAFS grid storage backend
//!
//! Addresses a single remote directory by its capability string and talks
//! to the grid through its HTTP/JSON gateway.

mod driver;
mod listing;
mod trust;

pub use driver::{TahoeBackend, TahoeConfig};
pub use trust::TrustPolicy;

use serde_json::Value;

use crate::backend::{Backend, BackendFactory, ConfigItem};
use crate::error::{BackendError, Result};

/// Tahoe-LAFS backend factory
pub struct TahoeBackendFactory;

impl BackendFactory for TahoeBackendFactory {
    fn protocol(&self) -> &'static str {
        "tahoe"
    }

    fn display_name(&self) -> &'static str {
        "Tahoe-LAFS"
    }

    fn description(&self) -> &'static str {
        "Stores data in a directory on a Tahoe-LAFS grid, addressed by its \
         directory capability and reached through the grid's HTTP gateway"
    }

    fn config_items(&self) -> Vec<ConfigItem> {
        vec![
            ConfigItem::new("address", "string")
                .title("Gateway address")
                .help("Gateway URL, the path must start with /uri/URI:DIR2:<capability>")
                .required(),
            ConfigItem::new("use-ssl", "bool")
                .title("Use SSL")
                .help("Connect to the gateway over https")
                .default("false"),
            ConfigItem::new("accept-any-ssl-certificate", "bool")
                .title("Accept any certificate")
                .help("Disable all TLS certificate checks (not recommended)")
                .default("false"),
            ConfigItem::new("accept-specified-ssl-hash", "string")
                .title("Pinned certificate hash")
                .help("Accept exactly one certificate by its SHA-1 or SHA-256 hex fingerprint"),
        ]
    }

    fn create(&self, options: Value) -> Result<Box<dyn Backend>> {
        let config: TahoeConfig = serde_json::from_value(options)
            .map_err(|e| BackendError::Configuration(format!("invalid options: {}", e)))?;
        Ok(Box::new(TahoeBackend::new(config)?))
    }
}

// Backend driver package
pub mod tahoe;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::backend::{Backend, BackendFactory, BackendInfo};
use crate::error::{BackendError, Result};

// Global backend registry, keyed by protocol
static BACKEND_REGISTRY: Lazy<HashMap<&'static str, Box<dyn BackendFactory>>> = Lazy::new(|| {
    let mut registry: HashMap<&'static str, Box<dyn BackendFactory>> = HashMap::new();

    // Register the Tahoe-LAFS backend
    let tahoe = tahoe::TahoeBackendFactory;
    registry.insert(tahoe.protocol(), Box::new(tahoe));

    registry
});

/// Info for every registered backend
pub fn available_backends() -> Vec<BackendInfo> {
    BACKEND_REGISTRY
        .values()
        .map(|factory| factory.backend_info())
        .collect()
}

/// Create a backend by protocol key and options mapping
pub fn create_backend(protocol: &str, options: Value) -> Result<Box<dyn Backend>> {
    match BACKEND_REGISTRY.get(protocol) {
        Some(factory) => factory.create(options),
        None => Err(BackendError::Configuration(format!(
            "unknown backend protocol: {}",
            protocol
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_exposes_the_tahoe_backend() {
        let backends = available_backends();
        assert_eq!(backends.len(), 1);
        assert_eq!(backends[0].protocol, "tahoe");
        assert!(backends[0].items.iter().any(|item| item.name == "use-ssl"));
    }

    #[test]
    fn creates_backends_by_protocol_key() {
        let options = serde_json::json!({
            "address": "http://127.0.0.1:3456/uri/URI:DIR2:abcdefghijklmnop"
        });
        let backend = create_backend("tahoe", options).unwrap();
        assert_eq!(backend.protocol(), "tahoe");
    }

    #[test]
    fn unknown_protocols_are_configuration_errors() {
        let err = create_backend("gopher", serde_json::json!({})).unwrap_err();
        assert!(matches!(err, BackendError::Configuration(_)));
    }
}

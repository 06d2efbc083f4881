//! Directory-node document decoding.
//!
//! A `t=json` listing is a `["dirnode", body]` pair whose `body.children`
//! maps child names to further `[kind, body]` pairs.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::backend::Entry;
use crate::error::{BackendError, Result};

/// Node kinds the gateway reports for directory children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Directory,
    File,
}

impl NodeKind {
    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "dirnode" => Some(NodeKind::Directory),
            "filenode" => Some(NodeKind::File),
            _ => None,
        }
    }
}

/// Decode a `t=json` directory document into entries.
///
/// Pure function of the bytes. Malformed or unknown child nodes are
/// skipped; the optional `size` and `linkmotime` fields are best-effort per
/// child and never fail the listing.
pub fn decode_listing(body: &[u8]) -> Result<Vec<Entry>> {
    let document: Value = serde_json::from_slice(body).map_err(|e| {
        BackendError::Protocol(format!("directory document is not valid JSON: {}", e))
    })?;

    let root = document.as_array().filter(|pair| pair.len() >= 2).ok_or_else(|| {
        BackendError::Protocol("unexpected root kind, expected a [\"dirnode\", body] pair".into())
    })?;

    match root[0].as_str().and_then(NodeKind::parse) {
        Some(NodeKind::Directory) => {}
        _ => {
            return Err(BackendError::Protocol(format!(
                "unexpected root kind {}, expected \"dirnode\"",
                root[0]
            )))
        }
    }

    let children = root[1]
        .as_object()
        .and_then(|body| body.get("children"))
        .and_then(Value::as_object)
        .ok_or_else(|| {
            BackendError::Protocol("missing children object in directory body".into())
        })?;

    let mut entries = Vec::with_capacity(children.len());
    for (name, node) in children {
        let (kind, node_body) = match child_node(node) {
            Some(pair) => pair,
            None => {
                tracing::debug!("skipping malformed child node {:?}", name);
                continue;
            }
        };

        entries.push(Entry {
            name: name.clone(),
            is_dir: kind == NodeKind::Directory,
            size: node_body.get("size").and_then(Value::as_i64).unwrap_or(-1),
            modified: link_motime(node_body).and_then(timestamp_from_seconds),
        });
    }

    Ok(entries)
}

/// Split a `[kind, body]` child pair. None when the node is malformed or of
/// an unknown kind.
fn child_node(node: &Value) -> Option<(NodeKind, &Map<String, Value>)> {
    let pair = node.as_array().filter(|pair| pair.len() >= 2)?;
    let kind = pair[0].as_str().and_then(NodeKind::parse)?;
    let body = pair[1].as_object()?;
    Some((kind, body))
}

/// `metadata.tahoe.linkmotime`, seconds since epoch.
fn link_motime(body: &Map<String, Value>) -> Option<f64> {
    body.get("metadata")?
        .get("tahoe")?
        .get("linkmotime")?
        .as_f64()
}

fn timestamp_from_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let secs = seconds.trunc() as i64;
    let nanos = (seconds.fract().abs() * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_file_and_directory_children() {
        let body = br#"["dirnode", {"children": {
            "a": ["filenode", {"size": 10, "metadata": {"tahoe": {"linkmotime": 0}}}],
            "b": ["dirnode", {}]
        }}]"#;
        let mut entries = decode_listing(body).unwrap();
        entries.sort_by(|x, y| x.name.cmp(&y.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a");
        assert!(!entries[0].is_dir);
        assert_eq!(entries[0].size, 10);
        assert_eq!(entries[0].modified, DateTime::<Utc>::from_timestamp(0, 0));

        assert_eq!(entries[1].name, "b");
        assert!(entries[1].is_dir);
        assert_eq!(entries[1].size, -1);
        assert_eq!(entries[1].modified, None);
    }

    #[test]
    fn rejects_non_directory_root() {
        let err = decode_listing(br#"["filenode", {}]"#).unwrap_err();
        assert!(matches!(err, BackendError::Protocol(_)));
    }

    #[test]
    fn rejects_truncated_or_non_array_roots() {
        for body in [
            br#"["dirnode"]"#.as_slice(),
            br#"{"children": {}}"#.as_slice(),
            b"not json".as_slice(),
        ] {
            let err = decode_listing(body).unwrap_err();
            assert!(matches!(err, BackendError::Protocol(_)));
        }
    }

    #[test]
    fn rejects_missing_children() {
        let err = decode_listing(br#"["dirnode", {"ro_uri": "URI:DIR2-RO:x"}]"#).unwrap_err();
        assert!(matches!(err, BackendError::Protocol(_)));
    }

    #[test]
    fn tolerates_non_numeric_linkmotime() {
        let body = br#"["dirnode", {"children": {
            "a": ["filenode", {"size": 3, "metadata": {"tahoe": {"linkmotime": "yesterday"}}}]
        }}]"#;
        let entries = decode_listing(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 3);
        assert_eq!(entries[0].modified, None);
    }

    #[test]
    fn tolerates_non_numeric_size() {
        let body = br#"["dirnode", {"children": {
            "a": ["filenode", {"size": "big"}]
        }}]"#;
        let entries = decode_listing(body).unwrap();
        assert_eq!(entries[0].size, -1);
    }

    #[test]
    fn skips_unknown_and_malformed_nodes() {
        let body = br#"["dirnode", {"children": {
            "unknown": ["unknownnode", {}],
            "broken": "not-a-pair",
            "short": ["filenode"],
            "kept": ["filenode", {"size": 1}]
        }}]"#;
        let entries = decode_listing(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "kept");
    }

    #[test]
    fn fractional_linkmotime_keeps_subsecond_precision() {
        let body = br#"["dirnode", {"children": {
            "a": ["filenode", {"metadata": {"tahoe": {"linkmotime": 1.5}}}]
        }}]"#;
        let entries = decode_listing(body).unwrap();
        let modified = entries[0].modified.unwrap();
        assert_eq!(modified.timestamp(), 1);
        assert_eq!(modified.timestamp_subsec_millis(), 500);
    }
}

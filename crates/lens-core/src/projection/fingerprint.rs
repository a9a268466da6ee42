//! Canonical view configuration keys.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Compact JSON with object keys sorted at every depth.
///
/// Two documents that differ only in key order canonicalize identically.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Canonical text of a configuration and its SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewFingerprint {
    canonical: String,
    digest: String,
}

impl ViewFingerprint {
    pub fn from_value(value: &Value) -> Self {
        let canonical = canonicalize(value);
        let digest = hex::encode(Sha256::digest(canonical.as_bytes()));
        Self { canonical, digest }
    }

    pub fn of<T: Serialize>(config: &T) -> Result<Self> {
        Ok(Self::from_value(&serde_json::to_value(config)?))
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Hex digest; used as the cache key.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

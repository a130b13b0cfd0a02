//! Extraction of version and size from registry metadata documents.
//!
//! Three document shapes show up in practice:
//!
//! - `npm view <pkg> version dist.unpackedSize dist.size --json` yields a flat
//!   object with dotted keys (`"dist.unpackedSize": 123`).
//! - A version manifest (`GET /<pkg>/latest`, or `npm view <pkg> --json`) has a
//!   top-level `version` and a nested `dist` object.
//! - A full packument (`GET /<pkg>`) only has `dist-tags.latest` and a
//!   `versions` map keyed by version string.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version and declared size of a package as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Resolved version (latest when the document does not pin one).
    pub version: String,

    /// Declared unpacked size in bytes; 0 when the registry does not report one.
    pub size_bytes: u64,
}

impl PackageMetadata {
    /// Parse a registry document. Returns `None` when no version can be resolved.
    pub fn from_value(meta: &Value) -> Option<Self> {
        let obj = meta.as_object()?;

        let version = obj
            .get("version")
            .and_then(Value::as_str)
            .or_else(|| {
                obj.get("dist-tags")
                    .and_then(|tags| tags.get("latest"))
                    .and_then(Value::as_str)
            })
            .filter(|v| !v.is_empty())?
            .to_string();

        let size_bytes = declared_size(meta)
            .or_else(|| {
                // Full packument: size lives on the selected version entry.
                obj.get("versions")
                    .and_then(|versions| versions.get(&version))
                    .and_then(declared_size)
            })
            .unwrap_or(0);

        Some(Self {
            version,
            size_bytes,
        })
    }
}

fn declared_size(meta: &Value) -> Option<u64> {
    let nested = meta.get("dist").and_then(|dist| {
        positive(dist.get("unpackedSize")).or_else(|| positive(dist.get("size")))
    });
    nested
        .or_else(|| positive(meta.get("dist.unpackedSize")))
        .or_else(|| positive(meta.get("dist.size")))
}

fn positive(value: Option<&Value>) -> Option<u64> {
    value.and_then(Value::as_u64).filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_dotted_fields() {
        let meta = json!({
            "version": "4.17.21",
            "dist.unpackedSize": 1_412_415,
        });
        let parsed = PackageMetadata::from_value(&meta).unwrap();
        assert_eq!(parsed.version, "4.17.21");
        assert_eq!(parsed.size_bytes, 1_412_415);
    }

    #[test]
    fn test_nested_dist_prefers_unpacked_size() {
        let meta = json!({
            "version": "1.0.0",
            "dist": { "unpackedSize": 2048, "size": 512 }
        });
        let parsed = PackageMetadata::from_value(&meta).unwrap();
        assert_eq!(parsed.size_bytes, 2048);
    }

    #[test]
    fn test_full_packument_uses_latest_tag() {
        let meta = json!({
            "name": "left-pad",
            "dist-tags": { "latest": "1.3.0" },
            "versions": {
                "1.2.0": { "dist": { "unpackedSize": 10 } },
                "1.3.0": { "dist": { "unpackedSize": 9001 } }
            }
        });
        let parsed = PackageMetadata::from_value(&meta).unwrap();
        assert_eq!(parsed.version, "1.3.0");
        assert_eq!(parsed.size_bytes, 9001);
    }

    #[test]
    fn test_missing_size_defaults_to_zero() {
        let parsed = PackageMetadata::from_value(&json!({ "version": "0.1.0" })).unwrap();
        assert_eq!(parsed.size_bytes, 0);
    }

    #[test]
    fn test_no_version_is_unresolvable() {
        assert!(PackageMetadata::from_value(&json!({ "dist": { "size": 1 } })).is_none());
        assert!(PackageMetadata::from_value(&json!({ "version": "" })).is_none());
        assert!(PackageMetadata::from_value(&json!(["1.0.0"])).is_none());
    }
}

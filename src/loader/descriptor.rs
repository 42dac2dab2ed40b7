// Resource descriptors and manifest validation

use super::ConfigError;
use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Broad category of a resource
///
/// Only the quality policy looks at this; fetch mechanics are identical for
/// every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Model,
    Texture,
    EnvironmentMap,
    #[default]
    Other,
}

impl ResourceKind {
    /// Get the lowercase name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Model => "model",
            ResourceKind::Texture => "texture",
            ResourceKind::EnvironmentMap => "environmentMap",
            ResourceKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated manifest entry, as it arrives from configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDescriptor {
    pub id: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub kind: ResourceKind,
    pub uri: String,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RawDescriptor {
    /// Create an entry with the fields that drive loading
    pub fn new(id: impl Into<String>, order: i64, kind: ResourceKind, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order,
            kind,
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Mark this entry as the critical resource
    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }
}

/// A validated, immutable resource entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    id: String,
    order: i64,
    kind: ResourceKind,
    uri: Url,
    is_critical: bool,
    version: Option<String>,
    added_date: Option<String>,
    notes: Option<String>,
}

impl ResourceDescriptor {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn order(&self) -> i64 {
        self.order
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn is_critical(&self) -> bool {
        self.is_critical
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn added_date(&self) -> Option<&str> {
        self.added_date.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

/// Validate a raw manifest and sort it by `order`
///
/// The sort is stable, so entries sharing an `order` keep their input position.
pub fn build(raw: Vec<RawDescriptor>) -> Result<Vec<ResourceDescriptor>, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::EmptyList);
    }

    let mut seen_ids = HashSet::with_capacity(raw.len());
    let mut critical: Option<String> = None;
    let mut descriptors = Vec::with_capacity(raw.len());

    for (index, entry) in raw.into_iter().enumerate() {
        if entry.id.trim().is_empty() {
            return Err(ConfigError::EmptyId { index });
        }
        if !seen_ids.insert(entry.id.clone()) {
            return Err(ConfigError::DuplicateId(entry.id));
        }
        if entry.is_critical {
            if let Some(first) = critical.take() {
                return Err(ConfigError::MultipleCritical {
                    first,
                    second: entry.id,
                });
            }
            critical = Some(entry.id.clone());
        }

        let uri = parse_uri(&entry.id, &entry.uri)?;
        descriptors.push(ResourceDescriptor {
            id: entry.id,
            order: entry.order,
            kind: entry.kind,
            uri,
            is_critical: entry.is_critical,
            version: entry.version,
            added_date: entry.added_date,
            notes: entry.notes,
        });
    }

    descriptors.sort_by_key(|descriptor| descriptor.order);
    Ok(descriptors)
}

fn parse_uri(id: &str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidUri {
        id: id.to_string(),
        uri: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.trim().is_empty() {
        return Err(invalid("uri is empty"));
    }
    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("uri is not an absolute locator"));
    }
    Ok(url)
}

/// Resource manifest as shipped alongside a viewer
///
/// Accepts either a bare array of entries or `{ "resources": [...] }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub resources: Vec<RawDescriptor>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestShape {
    List(Vec<RawDescriptor>),
    Object(Manifest),
}

impl Manifest {
    /// Parse a manifest from JSON text
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let shape: ManifestShape =
            serde_json::from_str(json).map_err(|e| ConfigError::Manifest(e.to_string()))?;
        Ok(match shape {
            ManifestShape::List(resources) => Manifest { resources },
            ManifestShape::Object(manifest) => manifest,
        })
    }

    /// Read and parse a manifest file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Failed to parse manifest {}", path.display()))
    }

    /// Validate the manifest into sorted descriptors
    pub fn build(self) -> Result<Vec<ResourceDescriptor>, ConfigError> {
        build(self.resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, order: i64) -> RawDescriptor {
        RawDescriptor::new(id, order, ResourceKind::Model, format!("https://x/{id}.glb"))
    }

    #[test]
    fn test_empty_list_rejected() {
        assert_eq!(build(Vec::new()), Err(ConfigError::EmptyList));
    }

    #[test]
    fn test_two_critical_rejected() {
        let result = build(vec![raw("a", 1).critical(), raw("b", 2).critical()]);
        assert_eq!(
            result,
            Err(ConfigError::MultipleCritical {
                first: "a".into(),
                second: "b".into()
            })
        );
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let result = build(vec![raw("a", 1), raw("a", 2)]);
        assert_eq!(result, Err(ConfigError::DuplicateId("a".into())));
    }

    #[test]
    fn test_empty_id_rejected() {
        let result = build(vec![raw("a", 1), raw(" ", 2)]);
        assert_eq!(result, Err(ConfigError::EmptyId { index: 1 }));
    }

    #[test]
    fn test_bad_uris_rejected() {
        let mut empty = raw("a", 1);
        empty.uri = String::new();
        assert!(matches!(build(vec![empty]), Err(ConfigError::InvalidUri { .. })));

        let mut relative = raw("a", 1);
        relative.uri = "models/a.glb".into();
        assert!(matches!(build(vec![relative]), Err(ConfigError::InvalidUri { .. })));

        let mut opaque = raw("a", 1);
        opaque.uri = "mailto:someone@example.com".into();
        assert!(matches!(build(vec![opaque]), Err(ConfigError::InvalidUri { .. })));
    }

    #[test]
    fn test_zero_critical_is_legal() {
        let descriptors = build(vec![raw("a", 1), raw("b", 2)]).unwrap();
        assert!(descriptors.iter().all(|d| !d.is_critical()));
    }

    #[test]
    fn test_sorted_stable_by_order() {
        let descriptors =
            build(vec![raw("c", 3), raw("a1", 1), raw("b", 2), raw("a2", 1)]).unwrap();
        let ids: Vec<&str> = descriptors.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b", "c"]);
    }

    #[test]
    fn test_manifest_shapes() {
        let list = r#"[{"id": "bld", "order": 1, "kind": "model", "uri": "https://x/a.glb", "isCritical": true}]"#;
        let object = r#"{"resources": [{"id": "sky", "kind": "environmentMap", "uri": "https://x/sky.env",
            "version": "1.2", "addedDate": "2024-03-01", "notes": "hdr"}]}"#;

        let from_list = Manifest::from_json(list).unwrap().build().unwrap();
        assert!(from_list[0].is_critical());
        assert_eq!(from_list[0].kind(), ResourceKind::Model);

        let from_object = Manifest::from_json(object).unwrap().build().unwrap();
        let sky = &from_object[0];
        assert_eq!(sky.kind(), ResourceKind::EnvironmentMap);
        assert_eq!(sky.order(), 0);
        assert_eq!(sky.version(), Some("1.2"));
        assert_eq!(sky.added_date(), Some("2024-03-01"));
        assert_eq!(sky.notes(), Some("hdr"));
    }

    #[test]
    fn test_manifest_malformed() {
        assert!(matches!(
            Manifest::from_json("{\"resources\": 3}"),
            Err(ConfigError::Manifest(_))
        ));
    }

    #[test]
    fn test_manifest_from_missing_path() {
        let result = Manifest::from_path("/nonexistent/manifest.json");
        assert!(result.is_err());
    }
}

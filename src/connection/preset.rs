//! Saved connection presets.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ConsoleError;
use crate::models::{ApiVersion, Candidate, Credentials, TargetKind};
use crate::store::KeyValueStore;

/// Namespace holding the preset list.
pub const PRESET_NAMESPACE: &str = "clusterdeck.presets";

/// A saved, not-yet-connected cluster endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: TargetKind,
    #[serde(rename = "ip")]
    pub address: String,
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<ApiVersion>,
}

impl Preset {
    pub fn to_candidate(&self) -> Candidate {
        Candidate {
            name: self.name.clone(),
            address: self.address.clone(),
            credentials: self.credentials.clone(),
            kind: self.kind,
            api_version: self.api_version.unwrap_or_default(),
        }
    }
}

/// Preset fields supplied by the operator; the id is assigned on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetDraft {
    pub name: Option<String>,
    pub kind: TargetKind,
    pub address: String,
    pub credentials: Credentials,
    pub api_version: Option<ApiVersion>,
}

impl From<Candidate> for PresetDraft {
    fn from(c: Candidate) -> Self {
        Self {
            name: c.name,
            kind: c.kind,
            address: c.address,
            credentials: c.credentials,
            api_version: Some(c.api_version),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Ordered preset list with write-through persistence.
///
/// Every mutation writes the complete new list to the backing store first
/// and only then replaces the in-memory copy, so the two never diverge.
pub struct PresetStore {
    store: Arc<dyn KeyValueStore>,
    presets: Vec<Preset>,
}

impl PresetStore {
    /// Loads presets from `store`. A missing entry is an empty list; a
    /// malformed one is rejected and left as is.
    pub fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, ConsoleError> {
        let presets = match store.get(PRESET_NAMESPACE)? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| ConsoleError::PersistenceFormat(format!("stored presets: {}", e)))?,
            None => Vec::new(),
        };
        Ok(Self { store, presets })
    }

    pub fn list(&self) -> &[Preset] {
        &self.presets
    }

    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn save(&mut self, draft: PresetDraft) -> Result<Preset, ConsoleError> {
        require("address", &draft.address)?;
        require("username", &draft.credentials.username)?;
        require("password", &draft.credentials.password)?;

        let preset = Preset {
            id: Uuid::new_v4().to_string(),
            name: draft.name.filter(|n| !n.trim().is_empty()),
            kind: draft.kind,
            address: draft.address.trim().to_string(),
            credentials: draft.credentials,
            api_version: draft.api_version,
        };
        let mut next = self.presets.clone();
        next.push(preset.clone());
        self.commit(next)?;
        info!(id = %preset.id, address = %preset.address, "preset saved");
        Ok(preset)
    }

    /// Removes one preset. Returns whether it existed.
    pub fn delete(&mut self, id: &str) -> Result<bool, ConsoleError> {
        Ok(self.bulk_delete(&[id])? == 1)
    }

    /// Removes every preset whose id is listed. Returns how many went.
    pub fn bulk_delete(&mut self, ids: &[&str]) -> Result<usize, ConsoleError> {
        let next: Vec<Preset> = self
            .presets
            .iter()
            .filter(|p| !ids.contains(&p.id.as_str()))
            .cloned()
            .collect();
        let removed = self.presets.len() - next.len();
        if removed > 0 {
            self.commit(next)?;
            debug!(removed, "presets deleted");
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<(), ConsoleError> {
        self.store.delete(PRESET_NAMESPACE)?;
        self.presets.clear();
        Ok(())
    }

    /// Appends presets from a JSON array of candidate objects.
    ///
    /// Objects lacking a non-empty `ip`, `username` or `password` are
    /// skipped. `type` defaults to PE and `apiVersion` to v2.0.
    pub fn import_json(&mut self, json: &str) -> Result<ImportReport, ConsoleError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ConsoleError::PersistenceFormat(e.to_string()))?;
        let serde_json::Value::Array(items) = value else {
            return Err(ConsoleError::PersistenceFormat(
                "expected a JSON array of presets".to_string(),
            ));
        };

        let mut report = ImportReport::default();
        let mut next = self.presets.clone();
        for item in &items {
            match parse_import_entry(item) {
                Some(preset) => {
                    next.push(preset);
                    report.imported += 1;
                }
                None => report.skipped += 1,
            }
        }
        if report.imported > 0 {
            self.commit(next)?;
        }
        info!(
            imported = report.imported,
            skipped = report.skipped,
            "presets imported"
        );
        Ok(report)
    }

    fn commit(&mut self, next: Vec<Preset>) -> Result<(), ConsoleError> {
        let raw = serde_json::to_string_pretty(&next)
            .map_err(|e| ConsoleError::PersistenceFormat(e.to_string()))?;
        self.store.put(PRESET_NAMESPACE, &raw)?;
        self.presets = next;
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<(), ConsoleError> {
    if value.trim().is_empty() {
        Err(ConsoleError::validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

fn parse_import_entry(item: &serde_json::Value) -> Option<Preset> {
    let text = |key: &str| {
        item.get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let address = text("ip")?;
    let username = text("username")?;
    let password = item.get("password").and_then(serde_json::Value::as_str)?;
    if password.is_empty() {
        return None;
    }

    Some(Preset {
        id: Uuid::new_v4().to_string(),
        name: text("name").map(str::to_string),
        kind: text("type")
            .and_then(|t| t.parse().ok())
            .unwrap_or_default(),
        address: address.to_string(),
        credentials: Credentials::new(username, password),
        api_version: Some(
            text("apiVersion")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};
    use tempfile::TempDir;

    fn draft(address: &str) -> PresetDraft {
        PresetDraft {
            name: Some("lab".into()),
            kind: TargetKind::Element,
            address: address.into(),
            credentials: Credentials::new("admin", "secret"),
            api_version: None,
        }
    }

    fn memory() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_import_example_accepts_one() {
        let mut presets = PresetStore::open(memory()).unwrap();
        let report = presets
            .import_json(r#"[{"ip":"10.0.0.1","username":"a","password":"b"},{"username":"x"}]"#)
            .unwrap();
        assert_eq!(report, ImportReport { imported: 1, skipped: 1 });
        assert_eq!(presets.list().len(), 1);
        let p = &presets.list()[0];
        assert_eq!(p.address, "10.0.0.1");
        assert_eq!(p.kind, TargetKind::Element);
        assert_eq!(p.api_version, Some(ApiVersion::V2));
    }

    #[test]
    fn test_import_honours_explicit_fields() {
        let mut presets = PresetStore::open(memory()).unwrap();
        presets
            .import_json(
                r#"[{"ip":"10.0.0.2","username":"a","password":"b","type":"PC","apiVersion":"v3.0","name":"central"}]"#,
            )
            .unwrap();
        let p = &presets.list()[0];
        assert_eq!(p.kind, TargetKind::Central);
        assert_eq!(p.api_version, Some(ApiVersion::V3));
        assert_eq!(p.name.as_deref(), Some("central"));
    }

    #[test]
    fn test_malformed_import_leaves_store_untouched() {
        let store = memory();
        let mut presets = PresetStore::open(store.clone()).unwrap();
        presets.save(draft("10.0.0.1")).unwrap();
        let before = store.get(PRESET_NAMESPACE).unwrap();

        assert!(matches!(
            presets.import_json("{not json"),
            Err(ConsoleError::PersistenceFormat(_))
        ));
        assert!(matches!(
            presets.import_json(r#"{"ip":"10.0.0.1"}"#),
            Err(ConsoleError::PersistenceFormat(_))
        ));
        assert_eq!(presets.list().len(), 1);
        assert_eq!(store.get(PRESET_NAMESPACE).unwrap(), before);
    }

    #[test]
    fn test_malformed_stored_presets_rejected() {
        let store = memory();
        store.put(PRESET_NAMESPACE, "not json").unwrap();
        assert!(matches!(
            PresetStore::open(store.clone()),
            Err(ConsoleError::PersistenceFormat(_))
        ));
        assert_eq!(
            store.get(PRESET_NAMESPACE).unwrap().as_deref(),
            Some("not json")
        );
    }

    #[test]
    fn test_save_assigns_unique_ids_and_persists() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
        let mut presets = PresetStore::open(store.clone()).unwrap();
        let a = presets.save(draft("10.0.0.1")).unwrap();
        let b = presets.save(draft("10.0.0.1")).unwrap();
        assert_ne!(a.id, b.id);

        let reopened = PresetStore::open(store).unwrap();
        assert_eq!(reopened.list(), presets.list());
    }

    #[test]
    fn test_save_requires_fields() {
        let mut presets = PresetStore::open(memory()).unwrap();
        let mut d = draft("10.0.0.1");
        d.credentials.password.clear();
        assert!(matches!(presets.save(d), Err(ConsoleError::Validation(_))));
        assert!(presets.list().is_empty());
    }

    #[test]
    fn test_delete_and_bulk_delete() {
        let store = memory();
        let mut presets = PresetStore::open(store.clone()).unwrap();
        let a = presets.save(draft("10.0.0.1")).unwrap();
        let b = presets.save(draft("10.0.0.2")).unwrap();
        let c = presets.save(draft("10.0.0.3")).unwrap();

        assert!(presets.delete(&a.id).unwrap());
        assert!(!presets.delete(&a.id).unwrap());
        assert_eq!(presets.bulk_delete(&[b.id.as_str(), "missing"]).unwrap(), 1);
        assert_eq!(presets.list(), &[c]);

        let reopened = PresetStore::open(store.clone()).unwrap();
        assert_eq!(reopened.list().len(), 1);

        presets.clear().unwrap();
        assert!(presets.list().is_empty());
        assert_eq!(store.get(PRESET_NAMESPACE).unwrap(), None);
    }

    #[test]
    fn test_persisted_shape_matches_import_format() {
        let store = memory();
        let mut presets = PresetStore::open(store.clone()).unwrap();
        presets.save(draft("10.0.0.9")).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&store.get(PRESET_NAMESPACE).unwrap().unwrap()).unwrap();
        assert_eq!(raw[0]["ip"], "10.0.0.9");
        assert_eq!(raw[0]["type"], "PE");
        assert_eq!(raw[0]["username"], "admin");
    }
}

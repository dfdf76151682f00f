//! Read-only bundle of localized default texts shipped with the
//! application, used by migration steps that seed per-language
//! configuration rows.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{MigrateError, Result};

/// Localized default texts: section -> key -> language -> text.
///
/// The bundle is loaded once before a migration run and never written to;
/// steps read defaults out of it when a historical store predates a
/// configurable text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppData {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    texts: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
}

impl AppData {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| MigrateError::Codec(format!("Failed to parse appdata bundle: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|e| {
            MigrateError::IoError(format!(
                "Failed to read appdata bundle {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// The default text for one key in one language.
    pub fn default_text(&self, section: &str, key: &str, language: &str) -> Option<&str> {
        self.texts
            .get(section)?
            .get(key)?
            .get(language)
            .map(|s| s.as_str())
    }

    /// All language variants of one key.
    pub fn texts_for(&self, section: &str, key: &str) -> Option<&BTreeMap<String, String>> {
        self.texts.get(section)?.get(key)
    }

    /// Keys present in a section.
    pub fn keys(&self, section: &str) -> impl Iterator<Item = &str> {
        self.texts
            .get(section)
            .into_iter()
            .flat_map(|keys| keys.keys().map(|k| k.as_str()))
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.texts.contains_key(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": 6,
        "texts": {
            "node": {
                "header_title": {"en": "Report a concern", "it": "Segnala un problema"},
                "footer": {"en": "Powered by the platform"}
            }
        }
    }"#;

    #[test]
    fn test_lookup() {
        let appdata = AppData::from_json_str(SAMPLE).unwrap();
        assert_eq!(appdata.version, 6);
        assert_eq!(
            appdata.default_text("node", "header_title", "it"),
            Some("Segnala un problema")
        );
        assert_eq!(appdata.default_text("node", "footer", "it"), None);
        assert_eq!(appdata.default_text("ghost", "x", "en"), None);

        let keys: Vec<&str> = appdata.keys("node").collect();
        assert_eq!(keys, vec!["footer", "header_title"]);
    }

    #[test]
    fn test_empty_bundle() {
        let appdata = AppData::empty();
        assert!(!appdata.has_section("node"));
        assert_eq!(appdata.keys("node").count(), 0);
    }

    #[test]
    fn test_malformed_json() {
        assert!(AppData::from_json_str("{not json").is_err());
    }
}

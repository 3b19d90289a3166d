use std::{collections::BTreeMap, path::Path};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::partition::Attributes;

/// Hand-curated attribute values for fine records the geometric join could not place.
///
/// Stored as versioned JSON:
///
/// ```json
/// {
///   "version": 1,
///   "description": "2016 small areas outside every Dublin postcode polygon",
///   "overrides": {
///     "267103003": { "postcodes": "Co. Dublin", "local_authority": "South Dublin" }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideTable {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    overrides: BTreeMap<String, Attributes>,
}

impl Default for OverrideTable {
    fn default() -> Self {
        Self { version: Self::VERSION, description: None, overrides: BTreeMap::new() }
    }
}

impl OverrideTable {
    const VERSION: u32 = 1;

    pub fn new() -> Self { Self::default() }

    /// Set one attribute for one fine identifier.
    pub fn set(&mut self, id: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.overrides.entry(id.into()).or_default().insert(name.into(), value.into());
        self
    }

    /// Set `name = value` for every identifier in `ids`.
    pub fn set_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>, name: &str, value: &str) -> &mut Self {
        for id in ids {
            self.set(id, name, value);
        }
        self
    }

    /// Load and validate a table from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to open override table: {}", path.display()))?;
        Self::from_json_bytes(&bytes)
            .with_context(|| format!("Invalid override table: {}", path.display()))
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let table: Self = serde_json::from_slice(bytes).context("Failed to parse override JSON")?;
        if table.version != Self::VERSION {
            bail!("unsupported override table version {} (expected {})", table.version, Self::VERSION);
        }
        if let Some((id, _)) = table.overrides.iter().find(|(_, attributes)| attributes.is_empty()) {
            bail!("override for {id:?} sets no attributes");
        }
        Ok(table)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize override table")
    }

    #[inline] pub fn len(&self) -> usize { self.overrides.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.overrides.is_empty() }

    #[inline] pub fn description(&self) -> Option<&str> { self.description.as_deref() }

    /// Override attributes for a fine identifier.
    #[inline]
    pub fn get(&self, id: &str) -> Option<&Attributes> {
        self.overrides.get(id)
    }

    /// Identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.overrides.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versioned_table() {
        let json = r#"{
            "version": 1,
            "overrides": {
                "267120004": { "postcodes": "Dublin 18", "local_authority": "Dún Laoghaire-Rathdown" },
                "267103003": { "postcodes": "Co. Dublin" }
            }
        }"#;
        let table = OverrideTable::from_json_bytes(json.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.ids().collect::<Vec<_>>(), vec!["267103003", "267120004"]);
        assert_eq!(table.get("267120004").unwrap()["local_authority"], "Dún Laoghaire-Rathdown");
        assert!(table.get("267999999").is_none());
    }

    #[test]
    fn rejects_unknown_versions_and_empty_entries() {
        assert!(OverrideTable::from_json_bytes(br#"{ "version": 2, "overrides": {} }"#).is_err());
        assert!(OverrideTable::from_json_bytes(br#"{ "version": 1, "overrides": { "X": {} } }"#).is_err());
    }

    #[test]
    fn builder_merges_attributes_per_id() {
        let mut table = OverrideTable::new();
        table
            .set_all(["267106008", "267065027/267065031"], "postcodes", "Co. Dublin")
            .set_all(["267106008"], "local_authority", "Fingal");

        let entry = table.get("267106008").unwrap();
        assert_eq!(entry["postcodes"], "Co. Dublin");
        assert_eq!(entry["local_authority"], "Fingal");
        assert_eq!(table.get("267065027/267065031").unwrap().len(), 1);

        let reparsed = OverrideTable::from_json_bytes(table.to_json_pretty().unwrap().as_bytes()).unwrap();
        assert_eq!(reparsed, table);
    }
}

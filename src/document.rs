//! # Desired-State Documents
//!
//! YAML documents listing resources in apply order:
//!
//! ```yaml
//! resources:
//!   - ref: prod
//!     kind: datacenter
//!     name: prod
//!     location: de/txl
//!   - kind: lan
//!     datacenter_id: ${prod}
//!     public: true
//! ```
//!
//! `ref` names an entry. A string value that is exactly `${name}` is
//! replaced with the id of the named entry when the entry is resolved, so a
//! reference can only point at an entry earlier in the document.

use crate::engine::DesiredResource;
use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{(?P<name>[A-Za-z0-9_-]+)\}$")
        .expect("Failed to compile reference regex - this should never happen")
});

const REF_KEY: &str = "ref";

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    resources: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct RenderedDocument<'a> {
    resources: Vec<&'a Value>,
}

/// One resource entry, references still unresolved
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: Option<String>,
    template: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    entries: Vec<Entry>,
}

impl Document {
    /// Parse and validate a document
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML or unknown kinds, for duplicate
    /// `ref` names and for references to unknown or later entries.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw: RawDocument = serde_yaml::from_str(text).context("Failed to parse document")?;
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(raw.resources.len());

        for (index, value) in raw.resources.into_iter().enumerate() {
            let Value::Object(mut map) = value else {
                bail!("resource #{index} is not a mapping");
            };
            let name = match map.remove(REF_KEY) {
                None => None,
                Some(Value::String(name)) => Some(name),
                Some(other) => bail!("resource #{index}: 'ref' must be a string, got {other}"),
            };
            let template = Value::Object(map);

            for reference in references(&template) {
                if !seen.contains(reference.as_str()) {
                    bail!("resource #{index} references '{reference}', which is not defined earlier in the document");
                }
            }
            serde_json::from_value::<DesiredResource>(template.clone())
                .with_context(|| format!("resource #{index} is not a valid resource"))?;

            if let Some(name) = &name {
                if !seen.insert(name.clone()) {
                    bail!("resource #{index}: duplicate ref '{name}'");
                }
            }
            entries.push(Entry { name, template });
        }
        Ok(Self { entries })
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid document.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid document {}", path.display()))
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

impl Entry {
    /// Substitute references with ids from `ids` (keyed by `ref` name)
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced entry has no id yet.
    pub fn resolve(&self, ids: &HashMap<String, String>) -> Result<DesiredResource> {
        let resolved = substitute(&self.template, ids)?;
        serde_json::from_value(resolved).context("Resolved resource is not valid")
    }
}

/// A resolved resource and the `ref` it was declared with
#[derive(Debug, Clone)]
pub struct StateEntry {
    pub name: Option<String>,
    pub resource: DesiredResource,
}

/// Render resolved resources as a document, `ref` names included
///
/// # Errors
///
/// Returns an error if a resource cannot be serialized.
pub fn render(states: &[StateEntry]) -> Result<String> {
    let values = states
        .iter()
        .map(|state| {
            let mut value = serde_json::to_value(&state.resource)?;
            if let (Some(name), Value::Object(map)) = (&state.name, &mut value) {
                map.insert(REF_KEY.to_string(), Value::String(name.clone()));
            }
            Ok(value)
        })
        .collect::<Result<Vec<Value>>>()?;
    let document = RenderedDocument {
        resources: values.iter().collect(),
    };
    serde_yaml::to_string(&document).context("Failed to render document")
}

fn references(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => REFERENCE
            .captures(s)
            .map(|c| vec![c["name"].to_string()])
            .unwrap_or_default(),
        Value::Array(items) => items.iter().flat_map(references).collect(),
        Value::Object(map) => map.values().flat_map(references).collect(),
        _ => Vec::new(),
    }
}

fn substitute(value: &Value, ids: &HashMap<String, String>) -> Result<Value> {
    Ok(match value {
        Value::String(s) => match REFERENCE.captures(s) {
            Some(captures) => {
                let name = &captures["name"];
                let id = ids
                    .get(name)
                    .ok_or_else(|| anyhow!("'{name}' has no id yet"))?;
                Value::String(id.clone())
            }
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute(item, ids))
                .collect::<Result<_>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), substitute(v, ids)?)))
                .collect::<Result<Map<String, Value>>>()?,
        ),
        _ => value.clone(),
    })
}

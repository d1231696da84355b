//! Allowed component-type vocabulary
//!
//! The vocabulary is plain configuration: the worker builds a default from the
//! environment and the import handler may swap in a project-specific list.

use std::collections::HashMap;
use std::sync::Arc;

/// Component types accepted when nothing else is configured
pub const DEFAULT_COMPONENT_TYPES: &[&str] = &[
    "Spool",
    "field_weld",
    "Valve",
    "Elbow",
    "Tee",
    "Reducer",
    "Flange",
    "Fitting",
    "Pipe",
    "Threaded_Pipe",
    "Support",
    "Instrument",
    "Gasket",
    "Bolt",
    "Cap",
    "Coupling",
    "Olet",
    "Union",
    "Nipple",
    "Plug",
    "Tubing",
    "Hose",
    "Misc_Component",
];

/// Closed set of component types, matched loosely and reported canonically
#[derive(Debug, Clone)]
pub struct ComponentTypeVocabulary {
    // match key → canonical spelling
    entries: Arc<HashMap<String, String>>,
}

impl ComponentTypeVocabulary {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = HashMap::new();
        for name in types {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            entries
                .entry(match_key(name))
                .or_insert_with(|| name.to_string());
        }
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Parse a comma-separated list such as `Valve, Elbow, field_weld`
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Canonical spelling of `value`, or `None` when it is not in the vocabulary
    pub fn resolve(&self, value: &str) -> Option<&str> {
        self.entries.get(&match_key(value)).map(String::as_str)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ComponentTypeVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_COMPONENT_TYPES)
    }
}

fn match_key(value: &str) -> String {
    value
        .trim()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

//! Quantity fan-out and identity-key collision detection

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::validator::{RowCategory, ValidationResult};
use crate::types::{CanonicalField, ImportErrorKind, ImportIssue};

/// Identity of one physical component within a drawing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityKey {
    pub commodity_code: String,
    pub size: Option<String>,
    pub seq: u32,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.size {
            Some(size) => write!(f, "{}-{}-{:03}", self.commodity_code, size, self.seq),
            None => write!(f, "{}-{:03}", self.commodity_code, self.seq),
        }
    }
}

/// One unit of quantity, ready for the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDraft {
    pub drawing: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub identity_key: IdentityKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    /// CSV row the draft came from
    #[serde(skip)]
    pub source_row: u32,
}

/// How far apart two drafts may be and still collide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityScope {
    /// Keys must be unique across the whole import
    #[default]
    Project,
    /// Keys must be unique within one normalized drawing
    Drawing,
}

impl IdentityScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityScope::Project => "project",
            IdentityScope::Drawing => "drawing",
        }
    }
}

impl FromStr for IdentityScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "project" => Ok(IdentityScope::Project),
            "drawing" => Ok(IdentityScope::Drawing),
            other => Err(format!("unknown identity scope '{}' (expected 'project' or 'drawing')", other)),
        }
    }
}

/// Result of expanding a batch of validated rows
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub drafts: Vec<ComponentDraft>,
    pub duplicates: Vec<ImportIssue>,
}

/// Fan every component row out into drafts, then flag colliding keys.
///
/// Error rows and skipped rows contribute nothing. Collisions are found in one
/// pass over all drafts, so the outcome does not depend on row order. Each row
/// involved in a collision gets exactly one issue.
pub fn expand(rows: &[ValidationResult], scope: IdentityScope) -> Expansion {
    let mut drafts = Vec::new();

    for result in rows {
        let ValidationResult::Valid {
            row_number,
            category: RowCategory::Component,
            data,
        } = result
        else {
            continue;
        };

        for seq in 1..=data.qty {
            drafts.push(ComponentDraft {
                drawing: data.drawing.clone(),
                component_type: data.component_type.clone(),
                identity_key: IdentityKey {
                    commodity_code: data.commodity_code.clone(),
                    size: data.size.clone(),
                    seq,
                },
                spec: data.spec.clone(),
                description: data.description.clone(),
                comments: data.comments.clone(),
                source_row: *row_number,
            });
        }
    }

    let duplicates = find_duplicates(&drafts, scope);
    Expansion { drafts, duplicates }
}

fn find_duplicates(drafts: &[ComponentDraft], scope: IdentityScope) -> Vec<ImportIssue> {
    let mut owners: HashMap<(Option<&str>, &IdentityKey), BTreeSet<u32>> = HashMap::with_capacity(drafts.len());
    for draft in drafts {
        let drawing = match scope {
            IdentityScope::Project => None,
            IdentityScope::Drawing => Some(draft.drawing.as_str()),
        };
        owners
            .entry((drawing, &draft.identity_key))
            .or_default()
            .insert(draft.source_row);
    }

    // row → (first colliding key, other rows)
    let mut collisions: BTreeMap<u32, (&IdentityKey, BTreeSet<u32>)> = BTreeMap::new();
    for ((_, key), rows) in owners.iter().filter(|(_, rows)| rows.len() > 1) {
        for &row in rows {
            let entry = collisions.entry(row).or_insert_with(|| (*key, BTreeSet::new()));
            // keep the lowest-seq key so the message is stable across runs
            if key.seq < entry.0.seq || (key.seq == entry.0.seq && key.to_string() < entry.0.to_string()) {
                entry.0 = *key;
            }
            entry.1.extend(rows.iter().copied().filter(|&other| other != row));
        }
    }

    collisions
        .into_iter()
        .map(|(row, (key, others))| {
            let others = others.iter().map(u32::to_string).collect::<Vec<_>>().join(", ");
            ImportIssue::new(
                row,
                Some(CanonicalField::CmdtyCode),
                ImportErrorKind::DuplicateIdentityKey,
                format!("Duplicate identity key {} (also generated by row {})", key, others),
            )
        })
        .collect()
}

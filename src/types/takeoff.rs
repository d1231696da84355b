//! Takeoff import types shared by the handler, the import pipeline and the store

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical takeoff column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalField {
    Drawing,
    Type,
    Qty,
    CmdtyCode,
    Spec,
    Description,
    Size,
    Comments,
}

impl CanonicalField {
    pub const REQUIRED: [CanonicalField; 4] = [
        CanonicalField::Drawing,
        CanonicalField::Type,
        CanonicalField::Qty,
        CanonicalField::CmdtyCode,
    ];

    /// Column name as it appears in a reference takeoff export
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Drawing => "DRAWING",
            CanonicalField::Type => "TYPE",
            CanonicalField::Qty => "QTY",
            CanonicalField::CmdtyCode => "CMDTY CODE",
            CanonicalField::Spec => "SPEC",
            CanonicalField::Description => "DESCRIPTION",
            CanonicalField::Size => "SIZE",
            CanonicalField::Comments => "COMMENTS",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportErrorKind {
    MissingColumn,
    InvalidDataType,
    InvalidEnum,
    EmptyRequiredField,
    QuantityTooLarge,
    DuplicateIdentityKey,
    FileTooLarge,
    RowCountExceeded,
    ComponentCountExceeded,
    MalformedCsv,
    EmptyFile,
    AuthError,
    PermissionError,
    PersistenceError,
}

/// Single row/column error reported back to the uploader.
///
/// `row` is 1-based with the header on row 1; structural problems that are
/// not tied to a data row are reported on row 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportIssue {
    pub row: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub reason: String,
    pub kind: ImportErrorKind,
}

impl ImportIssue {
    pub fn new(row: u32, column: Option<CanonicalField>, kind: ImportErrorKind, reason: impl Into<String>) -> Self {
        Self {
            row,
            column: column.map(|c| c.as_str().to_string()),
            reason: reason.into(),
            kind,
        }
    }

    /// Error on the header row / whole file
    pub fn file(kind: ImportErrorKind, reason: impl Into<String>) -> Self {
        Self::new(0, None, kind, reason)
    }
}

/// Outcome of one takeoff import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components_created: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_processed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_skipped: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ImportIssue>>,
}

impl ImportResult {
    pub fn succeeded(components_created: u32, rows_processed: u32, rows_skipped: u32) -> Self {
        Self {
            success: true,
            components_created: Some(components_created),
            rows_processed: Some(rows_processed),
            rows_skipped: Some(rows_skipped),
            errors: None,
        }
    }

    pub fn failed(errors: Vec<ImportIssue>) -> Self {
        Self {
            success: false,
            components_created: None,
            rows_processed: None,
            rows_skipped: None,
            errors: Some(errors),
        }
    }

    pub fn failed_with(issue: ImportIssue) -> Self {
        Self::failed(vec![issue])
    }

    pub fn errors(&self) -> &[ImportIssue] {
        self.errors.as_deref().unwrap_or(&[])
    }
}

/// Who is importing into which project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportContext {
    pub project_id: Uuid,
    pub user_id: Uuid,
}

/// Request to import a takeoff CSV into a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTakeoffRequest {
    pub project_id: Uuid,
    pub csv_content: String,
    /// Must match the token subject when present
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

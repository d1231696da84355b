//! Per-row validation
//!
//! Checks run in a fixed order and the first failure decides the row's error:
//! QTY, then TYPE, then the DRAWING and CMDTY CODE presence checks. Rows never
//! influence each other here.

use std::num::IntErrorKind;

use serde::Serialize;

use super::columns::ColumnMapping;
use super::drawing;
use super::vocabulary::ComponentTypeVocabulary;
use crate::types::{CanonicalField, ImportErrorKind, ImportIssue};

/// One data row of the CSV, cells in header order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based; the header is row 1
    pub row_number: u32,
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn new(row_number: u32, cells: Vec<String>) -> Self {
        Self { row_number, cells }
    }

    /// Raw cell for `field`, `None` when the column is not mapped or the row is short
    pub fn get<'a>(&'a self, mapping: &ColumnMapping, field: CanonicalField) -> Option<&'a str> {
        mapping
            .index_of(field)
            .and_then(|index| self.cells.get(index))
            .map(String::as_str)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|cell| cell.trim().is_empty())
    }
}

/// Validated, typed payload of a good row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeoffRow {
    /// Normalized drawing number
    pub drawing: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub qty: u32,
    pub commodity_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowCategory {
    /// QTY > 0, fans out into components
    Component,
    /// QTY == 0, nothing to create
    Skipped,
}

/// Column-level problem inside one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub column: CanonicalField,
    pub reason: String,
    #[serde(skip)]
    pub kind: ImportErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ValidationResult {
    #[serde(rename_all = "camelCase")]
    Valid {
        row_number: u32,
        category: RowCategory,
        data: TakeoffRow,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        row_number: u32,
        errors: Vec<FieldError>,
    },
}

impl ValidationResult {
    #[cfg(test)]
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }

    /// Errors flattened into the report shape
    pub fn issues(&self) -> Vec<ImportIssue> {
        match self {
            ValidationResult::Valid { .. } => Vec::new(),
            ValidationResult::Error { row_number, errors } => errors
                .iter()
                .map(|e| ImportIssue::new(*row_number, Some(e.column), e.kind, e.reason.clone()))
                .collect(),
        }
    }
}

/// Validates rows against one column mapping and one vocabulary
#[derive(Debug, Clone)]
pub struct RowValidator<'a> {
    mapping: &'a ColumnMapping,
    vocabulary: &'a ComponentTypeVocabulary,
    max_qty_per_row: u32,
}

impl<'a> RowValidator<'a> {
    pub fn new(mapping: &'a ColumnMapping, vocabulary: &'a ComponentTypeVocabulary, max_qty_per_row: u32) -> Self {
        Self {
            mapping,
            vocabulary,
            max_qty_per_row,
        }
    }

    pub fn validate(&self, row: &RawRow) -> ValidationResult {
        match self.check(row) {
            Ok(data) => ValidationResult::Valid {
                row_number: row.row_number,
                category: if data.qty == 0 { RowCategory::Skipped } else { RowCategory::Component },
                data,
            },
            Err(error) => ValidationResult::Error {
                row_number: row.row_number,
                errors: vec![error],
            },
        }
    }

    fn check(&self, row: &RawRow) -> Result<TakeoffRow, FieldError> {
        let cell = |field| row.get(self.mapping, field).unwrap_or("");

        let raw_qty = cell(CanonicalField::Qty);
        let too_large = |got: &str| FieldError {
            column: CanonicalField::Qty,
            reason: format!("Quantity exceeds maximum of {} per row, got {}", self.max_qty_per_row, got),
            kind: ImportErrorKind::QuantityTooLarge,
        };
        let qty = match raw_qty.trim().parse::<u32>() {
            Ok(qty) if qty > self.max_qty_per_row => return Err(too_large(raw_qty.trim())),
            Ok(qty) => qty,
            // Digits only, just wider than u32
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => return Err(too_large(raw_qty.trim())),
            Err(_) => {
                return Err(FieldError {
                    column: CanonicalField::Qty,
                    reason: format!("Invalid data type: QTY must be a non-negative integer, got '{}'", raw_qty),
                    kind: ImportErrorKind::InvalidDataType,
                })
            }
        };

        let raw_type = cell(CanonicalField::Type);
        let component_type = self.vocabulary.resolve(raw_type).ok_or_else(|| FieldError {
            column: CanonicalField::Type,
            reason: format!("Invalid component type: '{}'", raw_type),
            kind: ImportErrorKind::InvalidEnum,
        })?;

        let raw_drawing = required(cell(CanonicalField::Drawing), CanonicalField::Drawing)?;
        let commodity_code = required(cell(CanonicalField::CmdtyCode), CanonicalField::CmdtyCode)?;

        let optional = |field| {
            row.get(self.mapping, field)
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string)
        };

        Ok(TakeoffRow {
            drawing: drawing::normalize(raw_drawing),
            component_type: component_type.to_string(),
            qty,
            commodity_code: commodity_code.trim().to_string(),
            spec: optional(CanonicalField::Spec),
            description: optional(CanonicalField::Description),
            size: optional(CanonicalField::Size),
            comments: optional(CanonicalField::Comments),
        })
    }
}

fn required(value: &str, column: CanonicalField) -> Result<&str, FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError {
            column,
            reason: format!("Required field {} is empty", column),
            kind: ImportErrorKind::EmptyRequiredField,
        });
    }
    Ok(value)
}

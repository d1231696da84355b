//! Header row → canonical field mapping
//!
//! Matching goes through an explicit synonym table keyed by the normalized
//! header text (trimmed, uppercased, `_` read as a space, inner whitespace
//! collapsed). Unknown headers are carried along unmapped.

use tracing::debug;

use crate::types::CanonicalField;

const UTF8_BOM: char = '\u{feff}';

/// Normalized header text → canonical field
const SYNONYMS: &[(&str, CanonicalField)] = &[
    ("DRAWING", CanonicalField::Drawing),
    ("DRAWING NO", CanonicalField::Drawing),
    ("DRAWING NUMBER", CanonicalField::Drawing),
    ("DWG", CanonicalField::Drawing),
    ("DWG NO", CanonicalField::Drawing),
    ("ISO", CanonicalField::Drawing),
    ("TYPE", CanonicalField::Type),
    ("COMPONENT TYPE", CanonicalField::Type),
    ("ITEM TYPE", CanonicalField::Type),
    ("QTY", CanonicalField::Qty),
    ("QUANTITY", CanonicalField::Qty),
    ("CMDTY CODE", CanonicalField::CmdtyCode),
    ("CMDTY", CanonicalField::CmdtyCode),
    ("COMMODITY CODE", CanonicalField::CmdtyCode),
    ("COMMODITY", CanonicalField::CmdtyCode),
    ("SPEC", CanonicalField::Spec),
    ("PIPING SPEC", CanonicalField::Spec),
    ("SPECIFICATION", CanonicalField::Spec),
    ("DESCRIPTION", CanonicalField::Description),
    ("DESC", CanonicalField::Description),
    ("SIZE", CanonicalField::Size),
    ("NPS", CanonicalField::Size),
    ("NOMINAL SIZE", CanonicalField::Size),
    ("COMMENTS", CanonicalField::Comments),
    ("COMMENT", CanonicalField::Comments),
    ("NOTES", CanonicalField::Comments),
    ("REMARKS", CanonicalField::Comments),
];

/// One CSV column resolved to a canonical field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedColumn {
    /// Position in the header row
    pub index: usize,
    /// Header text as it appeared in the file
    pub name: String,
    pub field: CanonicalField,
}

/// Resolved header row. Built once per import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: Vec<MappedColumn>,
    unmapped: Vec<String>,
    missing_required_fields: Vec<CanonicalField>,
}

impl ColumnMapping {
    pub fn columns(&self) -> &[MappedColumn] {
        &self.columns
    }

    /// Headers that matched nothing, or lost to an earlier header for the same field
    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }

    pub fn missing_required_fields(&self) -> &[CanonicalField] {
        &self.missing_required_fields
    }

    pub fn has_all_required_fields(&self) -> bool {
        self.missing_required_fields.is_empty()
    }

    /// Column position holding `field`, if the header row had one
    pub fn index_of(&self, field: CanonicalField) -> Option<usize> {
        self.columns.iter().find(|c| c.field == field).map(|c| c.index)
    }
}

/// Canonical field for one header cell
pub fn resolve_header(header: &str) -> Option<CanonicalField> {
    let key = normalize_header(header);
    SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == key)
        .map(|(_, field)| *field)
}

/// Map a header row onto canonical fields
pub fn map_columns<S: AsRef<str>>(headers: &[S]) -> ColumnMapping {
    let mut columns: Vec<MappedColumn> = Vec::new();
    let mut unmapped = Vec::new();

    for (index, header) in headers.iter().enumerate() {
        let name = header.as_ref();
        match resolve_header(name) {
            Some(field) if columns.iter().any(|c| c.field == field) => {
                debug!("Header '{}' duplicates {}, ignoring", name, field);
                unmapped.push(name.to_string());
            }
            Some(field) => columns.push(MappedColumn {
                index,
                name: name.to_string(),
                field,
            }),
            None => unmapped.push(name.to_string()),
        }
    }

    let missing_required_fields = CanonicalField::REQUIRED
        .iter()
        .copied()
        .filter(|field| !columns.iter().any(|c| c.field == *field))
        .collect();

    ColumnMapping {
        columns,
        unmapped,
        missing_required_fields,
    }
}

fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches(UTF8_BOM)
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

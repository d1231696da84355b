//! Takeoff import orchestration
//!
//! Pre-flight limits → CSV parse → column mapping → per-row validation →
//! fan-out and duplicate check → single store call. Any hard error anywhere
//! in the file vetoes the whole import.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::columns;
use super::error::{StoreError, StructuralError};
use super::identity::{self, ComponentDraft};
use super::store::ComponentStore;
use super::validator::{RawRow, RowCategory, RowValidator, ValidationResult};
use super::vocabulary::ComponentTypeVocabulary;
use crate::config::ImportSettings;
use crate::types::{ImportContext, ImportErrorKind, ImportIssue, ImportResult};

const PERSISTENCE_FAILURE: &str = "Import failed: components could not be saved, please try again";
const EXISTING_COMPONENTS: &str = "Duplicate identity key: one or more components already exist in this project";

/// Everything the store needs, produced only when the file is clean
#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub drafts: Vec<ComponentDraft>,
    /// Rows with QTY > 0
    pub rows_processed: u32,
    /// Rows with QTY == 0
    pub rows_skipped: u32,
}

/// Run every check and build the draft set without touching any store.
/// On failure the returned issues are sorted by row, then column.
pub fn plan_import(
    csv_content: &str,
    settings: &ImportSettings,
    vocabulary: &ComponentTypeVocabulary,
) -> Result<ImportPlan, Vec<ImportIssue>> {
    if csv_content.len() > settings.max_file_bytes {
        return Err(vec![StructuralError::FileTooLarge {
            size: csv_content.len(),
            limit: format_bytes(settings.max_file_bytes),
        }
        .to_issue()]);
    }

    let (headers, rows) = parse_csv(csv_content).map_err(|e| vec![e.to_issue()])?;

    if rows.len() > settings.max_rows {
        return Err(vec![StructuralError::RowCountExceeded {
            count: rows.len(),
            limit: format_thousands(settings.max_rows),
        }
        .to_issue()]);
    }

    let mapping = columns::map_columns(&headers);
    if !mapping.has_all_required_fields() {
        return Err(mapping
            .missing_required_fields()
            .iter()
            .map(|field| {
                ImportIssue::new(
                    0,
                    Some(*field),
                    ImportErrorKind::MissingColumn,
                    format!("Missing required column: {}", field),
                )
            })
            .collect());
    }
    for column in mapping.columns() {
        debug!("Column {} '{}' → {}", column.index, column.name, column.field);
    }
    if !mapping.unmapped().is_empty() {
        debug!("Ignoring unmapped columns: {:?}", mapping.unmapped());
    }

    if rows.is_empty() {
        return Err(vec![StructuralError::NoDataRows.to_issue()]);
    }

    let validator = RowValidator::new(&mapping, vocabulary, settings.max_qty_per_row);
    let results: Vec<ValidationResult> = rows.iter().map(|row| validator.validate(row)).collect();

    let mut errors: Vec<ImportIssue> = results.iter().flat_map(ValidationResult::issues).collect();

    // Total fan-out, bounded before any draft exists
    let total: u64 = results
        .iter()
        .filter_map(|r| match r {
            ValidationResult::Valid { category: RowCategory::Component, data, .. } => Some(u64::from(data.qty)),
            _ => None,
        })
        .sum();
    if total > settings.max_components as u64 {
        errors.push(
            StructuralError::ComponentCountExceeded {
                count: total,
                limit: format_thousands(settings.max_components),
            }
            .to_issue(),
        );
        return Err(sorted(errors));
    }

    let expansion = identity::expand(&results, settings.identity_scope);
    errors.extend(expansion.duplicates);

    if !errors.is_empty() {
        return Err(sorted(errors));
    }

    let count = |wanted: RowCategory| {
        results
            .iter()
            .filter(|r| matches!(r, ValidationResult::Valid { category, .. } if *category == wanted))
            .count() as u32
    };

    Ok(ImportPlan {
        drafts: expansion.drafts,
        rows_processed: count(RowCategory::Component),
        rows_skipped: count(RowCategory::Skipped),
    })
}

/// Dry run: the result an import would produce, without writing anything.
/// `componentsCreated` is the number of components that would be created.
pub fn validate_takeoff(
    csv_content: &str,
    settings: &ImportSettings,
    vocabulary: &ComponentTypeVocabulary,
) -> ImportResult {
    match plan_import(csv_content, settings, vocabulary) {
        Ok(plan) => ImportResult::succeeded(plan.drafts.len() as u32, plan.rows_processed, plan.rows_skipped),
        Err(errors) => ImportResult::failed(errors),
    }
}

/// Imports takeoff CSVs into one store
#[derive(Clone)]
pub struct TakeoffImporter {
    settings: Arc<ImportSettings>,
    vocabulary: ComponentTypeVocabulary,
    store: Arc<dyn ComponentStore>,
}

impl TakeoffImporter {
    pub fn new(settings: Arc<ImportSettings>, store: Arc<dyn ComponentStore>) -> Self {
        Self {
            vocabulary: settings.component_types.clone(),
            settings,
            store,
        }
    }

    /// Replace the configured component types, e.g. with a project's own list
    pub fn with_vocabulary(mut self, vocabulary: ComponentTypeVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub async fn import_takeoff(&self, csv_content: &str, context: &ImportContext) -> ImportResult {
        info!(
            project_id = %context.project_id,
            user_id = %context.user_id,
            bytes = csv_content.len(),
            "Starting takeoff import"
        );

        let plan = match plan_import(csv_content, &self.settings, &self.vocabulary) {
            Ok(plan) => plan,
            Err(errors) => {
                warn!(
                    project_id = %context.project_id,
                    error_count = errors.len(),
                    "Takeoff import rejected"
                );
                return ImportResult::failed(errors);
            }
        };

        let created = plan.drafts.len() as u32;
        if plan.drafts.is_empty() {
            info!(project_id = %context.project_id, "Takeoff contained only zero-quantity rows");
            return ImportResult::succeeded(0, plan.rows_processed, plan.rows_skipped);
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.settings.store_timeout,
            self.store.insert_components(context, &plan.drafts),
        )
        .await
        .unwrap_or_else(|_| Err(StoreError::Timeout(self.settings.store_timeout)));

        match outcome {
            Ok(written) => {
                info!(
                    project_id = %context.project_id,
                    components = created,
                    written,
                    rows_processed = plan.rows_processed,
                    rows_skipped = plan.rows_skipped,
                    store = self.store.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Takeoff import committed"
                );
                ImportResult::succeeded(created, plan.rows_processed, plan.rows_skipped)
            }
            Err(StoreError::Conflict(detail)) => {
                warn!(project_id = %context.project_id, "Takeoff import conflicts with stored components: {}", detail);
                ImportResult::failed_with(ImportIssue::file(ImportErrorKind::DuplicateIdentityKey, EXISTING_COMPONENTS))
            }
            Err(e) => {
                error!(project_id = %context.project_id, store = self.store.name(), "Takeoff import failed to persist: {}", e);
                ImportResult::failed_with(ImportIssue::file(ImportErrorKind::PersistenceError, PERSISTENCE_FAILURE))
            }
        }
    }
}

fn sorted(mut errors: Vec<ImportIssue>) -> Vec<ImportIssue> {
    errors.sort_by(|a, b| a.row.cmp(&b.row).then_with(|| a.column.cmp(&b.column)));
    errors
}

/// Header cells plus non-blank data rows, numbered by the line each record
/// starts on
fn parse_csv(content: &str) -> Result<(Vec<String>, Vec<RawRow>), StructuralError> {
    let delimiter = sniff_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| StructuralError::MalformedCsv { row: 1, message: e.to_string() })?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(StructuralError::MissingHeader);
    }

    // (start byte, row) of the last record read; the header until a data row follows
    let mut last = (0, 1);
    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let fallback = index as u32 + 2;
        let record = record.map_err(|e| StructuralError::MalformedCsv {
            row: e.position().map_or(fallback, |p| record_start(content.as_bytes(), p).1),
            message: e.to_string(),
        })?;
        let (start, row_number) = record
            .position()
            .map_or((last.0, fallback), |p| record_start(content.as_bytes(), p));
        last = (start, row_number);

        let row = RawRow::new(row_number, record.iter().map(str::to_string).collect());
        if !row.is_blank() {
            rows.push(row);
        }
    }

    // The reader closes an open quote at end of input; only the final record can be affected
    let (start, row) = last;
    if has_unterminated_quote(content.as_bytes().get(start..).unwrap_or_default(), delimiter) {
        return Err(StructuralError::MalformedCsv {
            row,
            message: "unterminated quoted field".to_string(),
        });
    }

    Ok((headers, rows))
}

/// The reader stamps a record with its position before skipping the empty
/// lines in front of it; step over them to the record's own byte and line.
fn record_start(content: &[u8], position: &csv::Position) -> (usize, u32) {
    let mut byte = position.byte() as usize;
    let mut line = position.line() as u32;
    while let Some(&b) = content.get(byte) {
        match b {
            b'\n' => line += 1,
            b'\r' => {}
            _ => break,
        }
        byte += 1;
    }
    (byte, line)
}

/// True when a field opened with `"` is still open at the end of `record`.
/// A quote only opens a field at its start, so `2"` stays a plain value.
fn has_unterminated_quote(record: &[u8], delimiter: u8) -> bool {
    let mut quoted = false;
    let mut field_start = true;
    let mut bytes = record.iter().copied().peekable();

    while let Some(b) = bytes.next() {
        if quoted {
            if b == b'"' {
                if bytes.peek() == Some(&b'"') {
                    bytes.next();
                } else {
                    quoted = false;
                }
            }
        } else if b == b'"' && field_start {
            quoted = true;
            field_start = false;
        } else {
            field_start = b == delimiter || b == b'\n' || b == b'\r';
        }
    }

    quoted
}

/// Pick `,`, `;` or tab from the header line; comma wins ties
fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    let count = |c: char| header.matches(c).count();
    let (comma, semicolon, tab) = (count(','), count(';'), count('\t'));

    if semicolon > comma && semicolon >= tab {
        b';'
    } else if tab > comma && tab > semicolon {
        b'\t'
    } else {
        b','
    }
}

fn format_bytes(bytes: usize) -> String {
    const MB: usize = 1024 * 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else {
        format!("{} bytes", format_thousands(bytes))
    }
}

fn format_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::takeoff::identity::IdentityScope;
    use crate::services::takeoff::store::MockComponentStore;
    use std::time::Duration;
    use uuid::Uuid;

    const HEADER: &str = "DRAWING,TYPE,QTY,CMDTY CODE,SPEC,DESCRIPTION,SIZE,Comments\n";

    fn context() -> ImportContext {
        ImportContext { project_id: Uuid::new_v4(), user_id: Uuid::new_v4() }
    }

    fn importer(settings: ImportSettings) -> (TakeoffImporter, Arc<MockComponentStore>) {
        let store = Arc::new(MockComponentStore::new());
        (TakeoffImporter::new(Arc::new(settings), store.clone()), store)
    }

    fn csv(rows: &[&str]) -> String {
        let mut content = HEADER.to_string();
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        content
    }

    fn reasons(result: &ImportResult) -> Vec<&str> {
        result.errors().iter().map(|e| e.reason.as_str()).collect()
    }

    #[tokio::test]
    async fn test_quantity_fans_out_into_components() {
        let (importer, store) = importer(ImportSettings::default());
        let ctx = context();

        let result = importer.import_takeoff(&csv(&["P-001,Valve,2,VTEST-001,,,,"]), &ctx).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.components_created, Some(2));
        assert_eq!(result.rows_processed, Some(1));
        assert_eq!(result.rows_skipped, Some(0));

        let stored = store.components(ctx.project_id);
        let seqs: Vec<u32> = stored.iter().map(|d| d.identity_key.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert!(stored.iter().all(|d| d.identity_key.commodity_code == "VTEST-001"));
    }

    #[tokio::test]
    async fn test_zero_quantity_rows_are_skipped() {
        let (importer, store) = importer(ImportSettings::default());
        let ctx = context();

        let result = importer
            .import_takeoff(&csv(&["P-001,Valve,1,V-1", "P-001,Elbow,0,E-1", "P-002,Flange,0,F-1"]), &ctx)
            .await;

        assert!(result.success);
        assert_eq!(result.components_created, Some(1));
        assert_eq!(result.rows_processed, Some(1));
        assert_eq!(result.rows_skipped, Some(2));
        assert!(result.errors.is_none());
        assert_eq!(store.components(ctx.project_id).len(), 1);
    }

    #[tokio::test]
    async fn test_only_zero_quantity_rows_never_call_store() {
        let (importer, store) = importer(ImportSettings::default());

        let result = importer.import_takeoff(&csv(&["P-001,Valve,0,V-1"]), &context()).await;

        assert!(result.success);
        assert_eq!(result.components_created, Some(0));
        assert_eq!(result.rows_skipped, Some(1));
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_keys_abort_whole_import() {
        let (importer, store) = importer(ImportSettings::default());
        let ctx = context();

        let result = importer
            .import_takeoff(
                &csv(&["P-001,Valve,2,VTEST-001", "P-002,Valve,2,VTEST-001", "P-003,Elbow,5,E-9"]),
                &ctx,
            )
            .await;

        assert!(!result.success);
        assert!(result.components_created.is_none());
        assert!(reasons(&result).iter().all(|r| r.contains("Duplicate identity key")));
        let rows: Vec<u32> = result.errors().iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![2, 3]);
        assert_eq!(store.insert_calls(), 0);
        assert!(store.components(ctx.project_id).is_empty());
    }

    #[tokio::test]
    async fn test_drawing_scope_accepts_same_code_on_different_drawings() {
        let settings = ImportSettings { identity_scope: IdentityScope::Drawing, ..ImportSettings::default() };
        let (importer, _) = importer(settings);

        let result = importer
            .import_takeoff(&csv(&["P-001,Valve,2,VTEST-001", "P-002,Valve,2,VTEST-001"]), &context())
            .await;

        assert!(result.success);
        assert_eq!(result.components_created, Some(4));
    }

    #[tokio::test]
    async fn test_sheets_are_separate_drawings() {
        let settings = ImportSettings { identity_scope: IdentityScope::Drawing, ..ImportSettings::default() };
        let (importer, store) = importer(settings);
        let ctx = context();

        let result = importer
            .import_takeoff(&csv(&["P-91010_1 01of02,Spool,1,SP-1", "p-91010_1  02of02,Spool,1,SP-1"]), &ctx)
            .await;

        assert!(result.success, "{:?}", result.errors);
        let drawings: Vec<String> = store.components(ctx.project_id).into_iter().map(|d| d.drawing).collect();
        assert_eq!(drawings, vec!["P-91010_1 01OF02", "P-91010_1 02OF02"]);
    }

    #[tokio::test]
    async fn test_missing_columns_short_circuit() {
        let (importer, store) = importer(ImportSettings::default());

        let result = importer.import_takeoff("DRAWING,SPEC\nP-001,CS150\n", &context()).await;

        assert!(!result.success);
        assert_eq!(
            reasons(&result),
            vec![
                "Missing required column: TYPE",
                "Missing required column: QTY",
                "Missing required column: CMDTY CODE",
            ]
        );
        assert!(result.errors().iter().all(|e| e.row == 0 && e.kind == ImportErrorKind::MissingColumn));
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_columns_reported_even_without_data_rows() {
        let (importer, _) = importer(ImportSettings::default());
        let result = importer.import_takeoff("DRAWING,SPEC", &context()).await;
        assert_eq!(result.errors().len(), 3);
    }

    #[tokio::test]
    async fn test_header_only_file_has_no_data_rows() {
        let (importer, _) = importer(ImportSettings::default());
        let result = importer.import_takeoff(HEADER, &context()).await;
        assert!(!result.success);
        assert_eq!(reasons(&result), vec!["CSV file contains no data rows"]);
    }

    #[tokio::test]
    async fn test_empty_file_has_no_header() {
        let (importer, _) = importer(ImportSettings::default());
        let result = importer.import_takeoff("", &context()).await;
        assert_eq!(result.errors()[0].kind, ImportErrorKind::EmptyFile);
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_parsing() {
        let (importer, store) = importer(ImportSettings::default());
        let mut content = csv(&["P-001,Valve,1,V-1"]);
        content.push_str(&"x".repeat(5 * 1024 * 1024));

        let result = importer.import_takeoff(&content, &context()).await;

        assert!(!result.success);
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0].reason.contains("File too large"));
        assert!(result.errors()[0].reason.contains("5 MB"));
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_too_many_rows_is_rejected() {
        let (importer, store) = importer(ImportSettings::default());
        let rows: Vec<String> = (0..10_001).map(|i| format!("P-001,Valve,1,V-{}", i)).collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();

        let result = importer.import_takeoff(&csv(&rows), &context()).await;

        assert!(!result.success);
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0].reason.contains("Maximum 10,000 rows"));
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_row_limit_is_inclusive() {
        let (importer, _) = importer(ImportSettings::default());
        let rows: Vec<String> = (0..10_000).map(|i| format!("P-001,Valve,1,V-{}", i)).collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();

        let result = importer.import_takeoff(&csv(&rows), &context()).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.components_created, Some(10_000));
    }

    #[tokio::test]
    async fn test_every_row_error_is_reported() {
        let (importer, store) = importer(ImportSettings::default());

        let result = importer
            .import_takeoff(
                &csv(&["P-001,Valve,ABC,V-1", "P-001,Valve,1,V-2", "P-001,InvalidType,1,V-3", ",Valve,1,V-4"]),
                &context(),
            )
            .await;

        assert!(!result.success);
        let errors = result.errors();
        assert_eq!(errors.len(), 3);

        assert_eq!(errors[0].row, 2);
        assert_eq!(errors[0].column.as_deref(), Some("QTY"));
        assert!(errors[0].reason.contains("Invalid data type"));

        assert_eq!(errors[1].row, 4);
        assert_eq!(errors[1].column.as_deref(), Some("TYPE"));
        assert!(errors[1].reason.contains("Invalid component type"));

        assert_eq!(errors[2].row, 5);
        assert_eq!(errors[2].column.as_deref(), Some("DRAWING"));
        assert_eq!(errors[2].kind, ImportErrorKind::EmptyRequiredField);

        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_headers_match_loosely_and_unknown_columns_are_ignored() {
        let (importer, store) = importer(ImportSettings::default());
        let ctx = context();
        let content = " drawing ;Weight; Type ;Quantity;cmdty code\nP-001;12kg;gasket;3;G-1\n";

        let result = importer.import_takeoff(content, &ctx).await;

        assert!(result.success, "{:?}", result.errors);
        let stored = store.components(ctx.project_id);
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].component_type, "Gasket");
    }

    #[tokio::test]
    async fn test_blank_rows_are_ignored_and_numbering_follows_the_file() {
        let (importer, _) = importer(ImportSettings::default());

        let result = importer
            .import_takeoff(&csv(&["P-001,Valve,1,V-1", ",,,,,,,", "P-001,Valve,X,V-2"]), &context())
            .await;

        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].row, 4);
    }

    #[tokio::test]
    async fn test_store_failure_is_generic() {
        let (importer, store) = importer(ImportSettings::default());
        store.fail_inserts("connection reset by peer");

        let result = importer.import_takeoff(&csv(&["P-001,Valve,1,V-1"]), &context()).await;

        assert!(!result.success);
        assert_eq!(result.errors()[0].kind, ImportErrorKind::PersistenceError);
        assert!(!result.errors()[0].reason.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_store_conflict_reports_duplicate_identity_key() {
        let (importer, _) = importer(ImportSettings::default());
        let ctx = context();
        let content = csv(&["P-001,Valve,1,V-1"]);

        assert!(importer.import_takeoff(&content, &ctx).await.success);
        let second = importer.import_takeoff(&content, &ctx).await;

        assert!(!second.success);
        assert_eq!(second.errors()[0].kind, ImportErrorKind::DuplicateIdentityKey);
        assert!(second.errors()[0].reason.contains("Duplicate identity key"));
    }

    #[tokio::test]
    async fn test_stalled_store_times_out() {
        let settings = ImportSettings { store_timeout: Duration::from_millis(20), ..ImportSettings::default() };
        let store = Arc::new(MockComponentStore::new().with_delay(Duration::from_secs(5)));
        let importer = TakeoffImporter::new(Arc::new(settings), store.clone());

        let result = importer.import_takeoff(&csv(&["P-001,Valve,1,V-1"]), &context()).await;

        assert!(!result.success);
        assert_eq!(result.errors()[0].kind, ImportErrorKind::PersistenceError);
    }

    #[tokio::test]
    async fn test_project_vocabulary_replaces_default() {
        let (importer, _) = importer(ImportSettings::default());
        let importer = importer.with_vocabulary(ComponentTypeVocabulary::from_list("Spool,field_weld"));

        let result = importer
            .import_takeoff(&csv(&["P-001,Spool,1,S-1", "P-001,Valve,1,V-1"]), &context())
            .await;

        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].row, 3);
        assert_eq!(result.errors()[0].column.as_deref(), Some("TYPE"));
    }

    #[test]
    fn test_unterminated_quote_is_malformed_csv() {
        let settings = ImportSettings::default();
        let content = "DRAWING,TYPE,QTY,CMDTY CODE\nP-001,Valve,1,V-1\nP-002,\"Valve,1,V-2\n";
        let result = validate_takeoff(content, &settings, &ComponentTypeVocabulary::default());
        assert!(!result.success);
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].row, 3);
        assert_eq!(result.errors()[0].kind, ImportErrorKind::MalformedCsv);
    }

    #[test]
    fn test_unterminated_quote_in_header_is_malformed_csv() {
        let result = validate_takeoff(
            "DRAWING,\"TYPE,QTY,CMDTY CODE\n",
            &ImportSettings::default(),
            &ComponentTypeVocabulary::default(),
        );
        assert_eq!(result.errors()[0].kind, ImportErrorKind::MalformedCsv);
        assert_eq!(result.errors()[0].row, 1);
    }

    #[test]
    fn test_inch_marks_and_quoted_delimiters_still_parse() {
        let content = csv(&[
            "P-001,Valve,1,V-1,,\"Gate valve, flanged\",2\"",
            "P-001,Valve,1,V-2,,\"He said \"\"hi\"\"\",4\"",
        ]);
        let result = validate_takeoff(&content, &ImportSettings::default(), &ComponentTypeVocabulary::default());
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.components_created, Some(2));
    }

    #[test]
    fn test_quote_detection_is_field_aware() {
        assert!(has_unterminated_quote(b"P-002,\"Valve,1,V-2\n", b','));
        assert!(has_unterminated_quote(b"\"a\"\"b\n", b','));
        assert!(!has_unterminated_quote(b"P-001,Valve,1,V-1,2\"\n", b','));
        assert!(!has_unterminated_quote(b"P-001,\"multi\nline\",1\n", b','));
        assert!(!has_unterminated_quote(b"P-001;\"a;b\";1\n", b';'));
        assert!(!has_unterminated_quote(b"", b','));
    }

    #[test]
    fn test_empty_lines_are_skipped_before_the_record() {
        let content = b"H\nA\n\r\n\nB\n";
        let position = {
            let mut position = csv::Position::new();
            position.set_byte(4).set_line(3);
            position
        };
        assert_eq!(record_start(content, &position), (7, 5));
        assert_eq!(record_start(b"H\nA", &csv::Position::new()), (0, 1));
    }

    #[test]
    fn test_empty_lines_do_not_shift_row_numbers() {
        let content = "DRAWING,TYPE,QTY,CMDTY CODE\nP-001,Valve,1,V-1\n\nP-001,Valve,X,V-2\n";
        let result = validate_takeoff(content, &ImportSettings::default(), &ComponentTypeVocabulary::default());
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].row, 4);
        assert_eq!(result.errors()[0].column.as_deref(), Some("QTY"));
    }

    #[test]
    fn test_component_count_over_limit_is_rejected() {
        let settings = ImportSettings { max_components: 5, ..ImportSettings::default() };
        let result = validate_takeoff(
            &csv(&["P-001,Valve,3,V-1", "P-001,Valve,3,V-2"]),
            &settings,
            &ComponentTypeVocabulary::default(),
        );
        assert!(!result.success);
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].row, 0);
        assert_eq!(result.errors()[0].kind, ImportErrorKind::ComponentCountExceeded);
        assert!(result.errors()[0].reason.contains("Maximum 5 components"));
    }

    #[test]
    fn test_component_count_limit_is_inclusive() {
        let settings = ImportSettings { max_components: 5, ..ImportSettings::default() };
        let result = validate_takeoff(
            &csv(&["P-001,Valve,3,V-1", "P-001,Valve,2,V-2", "P-001,Valve,0,V-3"]),
            &settings,
            &ComponentTypeVocabulary::default(),
        );
        assert_eq!(result, ImportResult::succeeded(5, 2, 1));
    }

    #[tokio::test]
    async fn test_max_quantity_on_every_row_is_capped_before_fan_out() {
        let (importer, store) = importer(ImportSettings::default());
        let rows: Vec<String> = (0..10_000).map(|i| format!("P-001,Valve,10000,V-{}", i)).collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();

        let result = importer.import_takeoff(&csv(&rows), &context()).await;

        assert!(!result.success);
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].kind, ImportErrorKind::ComponentCountExceeded);
        assert!(result.errors()[0].reason.contains("100000000"));
        assert_eq!(store.insert_calls(), 0);
    }

    #[test]
    fn test_dry_run_counts_without_store() {
        let result = validate_takeoff(
            &csv(&["P-001,Valve,3,V-1", "P-001,Valve,0,V-2"]),
            &ImportSettings::default(),
            &ComponentTypeVocabulary::default(),
        );
        assert_eq!(result, ImportResult::succeeded(3, 1, 1));
    }

    #[test]
    fn test_delimiter_sniffing() {
        assert_eq!(sniff_delimiter("DRAWING,TYPE,QTY"), b',');
        assert_eq!(sniff_delimiter("DRAWING;TYPE;QTY"), b';');
        assert_eq!(sniff_delimiter("DRAWING\tTYPE\tQTY"), b'\t');
        assert_eq!(sniff_delimiter("A;B,C"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn test_limit_formatting() {
        assert_eq!(format_thousands(10_000), "10,000");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_bytes(1500), "1,500 bytes");
    }
}

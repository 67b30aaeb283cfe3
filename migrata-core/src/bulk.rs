//! Bulk data import.
//!
//! Data files are CSV with a header row naming the target columns. Rows are
//! streamed from the script content into batches and each batch is handed to
//! [`BulkImportService::insert_batch`]. The default implementation sends one
//! multi-row `INSERT`; engines with their own limits override it.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::catalog::BulkTarget;
use crate::error::{MigrateResult, MigrationError};
use crate::platform::{with_timeout, DataService};

/// One CSV record. `None` is SQL `NULL`.
pub type CsvRecord = Vec<Option<String>>;

/// A malformed CSV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvError {
    /// 0-based record index; the header is record 0.
    pub record: usize,
    /// What was wrong.
    pub message: String,
}

/// Streaming reader over CSV text.
///
/// - fields are separated by a single character
/// - `"` quotes a field; `""` inside quotes is a literal quote and quoted
///   fields may span lines
/// - an empty unquoted field and the unquoted literal `NULL` are `None`
/// - blank lines are skipped
///
/// Iteration stops after the first error.
#[derive(Debug, Clone)]
pub struct CsvReader<'a> {
    input: &'a str,
    pos: usize,
    separator: char,
    record: usize,
}

impl<'a> CsvReader<'a> {
    /// Create a reader over `input`.
    pub fn new(input: &'a str, separator: char) -> Self {
        Self {
            input,
            pos: 0,
            separator,
            record: 0,
        }
    }

    fn fail(&mut self, message: impl Into<String>) -> Option<Result<CsvRecord, CsvError>> {
        self.pos = self.input.len();
        Some(Err(CsvError {
            record: self.record,
            message: message.into(),
        }))
    }

    fn skip_blank_lines(&mut self) {
        loop {
            let rest = &self.input[self.pos..];
            if rest.starts_with('\n') {
                self.pos += 1;
            } else if rest.starts_with("\r\n") {
                self.pos += 2;
            } else {
                return;
            }
        }
    }
}

impl Iterator for CsvReader<'_> {
    type Item = Result<CsvRecord, CsvError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_blank_lines();
        if self.pos >= self.input.len() {
            return None;
        }

        let sep = self.separator;
        let mut fields = Vec::new();
        let mut chars = self.input[self.pos..].char_indices().peekable();
        let mut consumed = self.input.len() - self.pos;

        'record: loop {
            if let Some(&(_, '"')) = chars.peek() {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        None => return self.fail("unterminated quoted field"),
                        Some((_, '"')) => {
                            if let Some(&(_, '"')) = chars.peek() {
                                chars.next();
                                value.push('"');
                            } else {
                                break;
                            }
                        }
                        Some((_, c)) => value.push(c),
                    }
                }
                fields.push(Some(value));

                match chars.next() {
                    None => break 'record,
                    Some((_, c)) if c == sep => continue 'record,
                    Some((i, '\n')) => {
                        consumed = i + 1;
                        break 'record;
                    }
                    Some((_, '\r')) if matches!(chars.peek(), Some(&(_, '\n'))) => {
                        if let Some((i, _)) = chars.next() {
                            consumed = i + 1;
                        }
                        break 'record;
                    }
                    Some((_, c)) => {
                        return self.fail(format!("unexpected '{c}' after closing quote"));
                    }
                }
            } else {
                let mut value = String::new();
                let mut end_of_record = true;
                loop {
                    match chars.next() {
                        None => break,
                        Some((_, c)) if c == sep => {
                            end_of_record = false;
                            break;
                        }
                        Some((i, '\n')) => {
                            consumed = i + 1;
                            if value.ends_with('\r') {
                                value.pop();
                            }
                            break;
                        }
                        Some((_, c)) => value.push(c),
                    }
                }

                fields.push(if value.is_empty() || value == "NULL" {
                    None
                } else {
                    Some(value)
                });

                if end_of_record {
                    break 'record;
                }
            }
        }

        self.pos += consumed;
        self.record += 1;
        Some(Ok(fields))
    }
}

/// A bulk import of one data file.
#[derive(Debug, Clone)]
pub struct BulkImportRequest<'a> {
    /// Data file, for error reporting.
    pub path: &'a Path,
    /// Target table.
    pub target: &'a BulkTarget,
    /// File content as read by the catalog.
    pub content: &'a str,
    /// Field separator.
    pub separator: char,
    /// Rows per batch; `0` sends every row in one batch.
    pub batch_size: usize,
    /// Timeout for each batch.
    pub timeout: Duration,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkImportSummary {
    /// Data rows inserted.
    pub rows: usize,
    /// Batches sent.
    pub batches: usize,
}

/// Build a multi-row `INSERT` for a batch using the service's quoting rules.
pub fn insert_statement<D: DataService + ?Sized>(
    service: &D,
    target: &BulkTarget,
    columns: &[String],
    rows: &[CsvRecord],
) -> String {
    let table = match &target.schema {
        Some(schema) => format!(
            "{}.{}",
            service.quote_identifier(schema),
            service.quote_identifier(&target.table)
        ),
        None => service.quote_identifier(&target.table),
    };
    let columns = columns
        .iter()
        .map(|c| service.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let values = rows
        .iter()
        .map(|row| {
            let fields = row
                .iter()
                .map(|field| match field {
                    Some(value) => service.quote_literal(value),
                    None => "NULL".to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("({fields})")
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!("INSERT INTO {table} ({columns}) VALUES\n{values}")
}

/// Database-specific bulk loading.
#[async_trait]
pub trait BulkImportService: DataService {
    /// Insert one batch of rows.
    async fn insert_batch(
        &mut self,
        target: &BulkTarget,
        columns: &[String],
        rows: &[CsvRecord],
    ) -> MigrateResult<()> {
        let sql = insert_statement(&*self, target, columns, rows);
        self.execute(&sql).await
    }

    /// Stream a data file into its target table in batches.
    async fn bulk_import(
        &mut self,
        request: BulkImportRequest<'_>,
    ) -> MigrateResult<BulkImportSummary> {
        let failure = |batch: usize, row: usize, message: String| MigrationError::BulkImport {
            path: request.path.to_path_buf(),
            batch,
            row,
            message,
        };

        let mut reader = CsvReader::new(request.content, request.separator);
        let columns: Vec<String> = match reader.next() {
            None => return Err(failure(0, 0, "file has no header row".to_string())),
            Some(Err(e)) => return Err(failure(0, 0, e.message)),
            Some(Ok(header)) => {
                let mut columns = Vec::with_capacity(header.len());
                for field in header {
                    match field {
                        Some(name) if !name.trim().is_empty() => {
                            columns.push(name.trim().to_string())
                        }
                        _ => return Err(failure(0, 0, "header has an empty column name".into())),
                    }
                }
                columns
            }
        };

        let batch_size = if request.batch_size == 0 {
            usize::MAX
        } else {
            request.batch_size
        };

        let mut summary = BulkImportSummary::default();
        let mut batch: Vec<CsvRecord> = Vec::new();
        let mut row = 0;

        for record in reader {
            row += 1;
            let record = record.map_err(|e| failure(summary.batches + 1, e.record, e.message))?;
            if record.len() != columns.len() {
                return Err(failure(
                    summary.batches + 1,
                    row,
                    format!("expected {} fields, found {}", columns.len(), record.len()),
                ));
            }
            batch.push(record);

            if batch.len() == batch_size {
                send_batch(self, &request, &columns, &batch, &mut summary).await?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            send_batch(self, &request, &columns, &batch, &mut summary).await?;
        }

        Ok(summary)
    }
}

async fn send_batch<S: BulkImportService + ?Sized>(
    service: &mut S,
    request: &BulkImportRequest<'_>,
    columns: &[String],
    batch: &[CsvRecord],
    summary: &mut BulkImportSummary,
) -> MigrateResult<()> {
    summary.batches += 1;
    debug!(
        table = %request.target,
        batch = summary.batches,
        rows = batch.len(),
        "Inserting bulk batch"
    );

    with_timeout(
        request.timeout,
        "bulk import",
        service.insert_batch(request.target, columns, batch),
    )
    .await
    .map_err(|e| match e {
        MigrationError::Timeout { .. } => e,
        other => MigrationError::BulkImport {
            path: request.path.to_path_buf(),
            batch: summary.batches,
            row: summary.rows + 1,
            message: other.to_string(),
        },
    })?;

    summary.rows += batch.len();
    Ok(())
}

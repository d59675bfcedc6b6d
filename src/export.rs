//! Multi-sheet tabular export.
//!
//! Rows are JSON objects; each sheet is projected onto its requested column
//! order before an injected [`WorkbookWriter`] renders the workbook.

use crate::error::{AnalyticsError, Result};
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Legacy spreadsheet limit on worksheet name length.
pub const MAX_SHEET_NAME_CHARS: usize = 31;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedSheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

pub fn truncate_sheet_name(name: &str) -> String {
    name.chars().take(MAX_SHEET_NAME_CHARS).collect()
}

/// Columns to emit for `rows`. With an order, the requested columns that
/// occur in at least one row, in requested order. Without one, every
/// column in first-seen order.
pub fn resolve_columns(rows: &[Row], order: Option<&[String]>) -> Vec<String> {
    match order {
        Some(order) => order
            .iter()
            .filter(|col| rows.iter().any(|row| row.contains_key(col.as_str())))
            .cloned()
            .collect(),
        None => {
            let mut columns: Vec<String> = Vec::new();
            for row in rows {
                for key in row.keys() {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
            }
            columns
        }
    }
}

pub fn project_sheet(name: &str, rows: &[Row], order: Option<&[String]>) -> ProjectedSheet {
    let columns = resolve_columns(rows, order);
    let projected = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| row.get(col).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    ProjectedSheet {
        name: truncate_sheet_name(name),
        columns,
        rows: projected,
    }
}

/// Renders projected sheets into one binary artifact.
pub trait WorkbookWriter: Send + Sync {
    fn content_type(&self) -> &str;
    fn extension(&self) -> &str;
    fn write(&self, sheets: &[ProjectedSheet]) -> Result<Vec<u8>>;
}

#[cfg(feature = "xlsx")]
pub use xlsx::XlsxWorkbookWriter;

#[cfg(feature = "xlsx")]
mod xlsx {
    use super::{ProjectedSheet, WorkbookWriter};
    use crate::error::{AnalyticsError, Result};
    use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
    use serde_json::Value;

    fn export_err(e: XlsxError) -> AnalyticsError {
        AnalyticsError::Export(e.to_string())
    }

    #[derive(Debug, Default, Clone, Copy)]
    pub struct XlsxWorkbookWriter;

    impl XlsxWorkbookWriter {
        fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<()> {
            match value {
                Value::Null => {}
                Value::Bool(b) => {
                    sheet.write_boolean(row, col, *b).map_err(export_err)?;
                }
                Value::Number(n) => {
                    let number = n.as_f64().unwrap_or(0.0);
                    sheet.write_number(row, col, number).map_err(export_err)?;
                }
                Value::String(s) => {
                    sheet.write_string(row, col, s).map_err(export_err)?;
                }
                other => {
                    sheet
                        .write_string(row, col, &other.to_string())
                        .map_err(export_err)?;
                }
            }
            Ok(())
        }
    }

    impl WorkbookWriter for XlsxWorkbookWriter {
        fn content_type(&self) -> &str {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        }

        fn extension(&self) -> &str {
            "xlsx"
        }

        fn write(&self, sheets: &[ProjectedSheet]) -> Result<Vec<u8>> {
            let mut workbook = Workbook::new();
            for projected in sheets {
                let sheet = workbook.add_worksheet();
                sheet.set_name(&projected.name).map_err(export_err)?;

                for (col, header) in projected.columns.iter().enumerate() {
                    sheet
                        .write_string(0, col as u16, header)
                        .map_err(export_err)?;
                }
                for (row_idx, row) in projected.rows.iter().enumerate() {
                    for (col, value) in row.iter().enumerate() {
                        Self::write_cell(sheet, row_idx as u32 + 1, col as u16, value)?;
                    }
                }
            }
            workbook.save_to_buffer().map_err(export_err)
        }
    }
}

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`, so the
/// result is a single path component that is also safe inside a quoted
/// header value.
pub fn sanitize_file_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "export".to_string()
    } else {
        cleaned
    }
}

/// A rendered export ready to be saved or sent as a download.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }

    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        info!("Wrote {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

pub struct ExportAssembler {
    writer: Option<Box<dyn WorkbookWriter>>,
}

impl Default for ExportAssembler {
    #[cfg(feature = "xlsx")]
    fn default() -> Self {
        Self::with_writer(Box::new(XlsxWorkbookWriter))
    }

    #[cfg(not(feature = "xlsx"))]
    fn default() -> Self {
        Self::without_writer()
    }
}

impl ExportAssembler {
    pub fn with_writer(writer: Box<dyn WorkbookWriter>) -> Self {
        Self {
            writer: Some(writer),
        }
    }

    pub fn without_writer() -> Self {
        Self { writer: None }
    }

    fn writer(&self) -> Result<&dyn WorkbookWriter> {
        self.writer
            .as_deref()
            .ok_or(AnalyticsError::MissingCapability {
                capability: "workbook-writer",
                hint: "enable the `xlsx` feature or install a writer with ExportAssembler::with_writer",
            })
    }

    /// Renders `sheets` in the given order. `orders` maps a sheet name to
    /// its column order; sheets without an entry keep every column.
    pub fn assemble(
        &self,
        sheets: &[(String, Vec<Row>)],
        orders: Option<&BTreeMap<String, Vec<String>>>,
    ) -> Result<Vec<u8>> {
        let writer = self.writer()?;

        let projected: Vec<ProjectedSheet> = sheets
            .iter()
            .map(|(name, rows)| {
                let order = orders.and_then(|o| o.get(name)).map(Vec::as_slice);
                project_sheet(name, rows, order)
            })
            .collect();

        for sheet in &projected {
            debug!(
                "Sheet '{}': {} columns, {} rows",
                sheet.name,
                sheet.columns.len(),
                sheet.rows.len()
            );
        }

        writer.write(&projected)
    }

    /// Assembles, names the artifact `<stem>.<ext>` and writes it into `dir`.
    /// The stem is passed through [`sanitize_file_stem`] first.
    pub fn export(
        &self,
        stem: &str,
        dir: &Path,
        sheets: &[(String, Vec<Row>)],
        orders: Option<&BTreeMap<String, Vec<String>>>,
    ) -> Result<ExportArtifact> {
        let writer = self.writer()?;
        let bytes = self.assemble(sheets, orders)?;
        let artifact = ExportArtifact {
            filename: format!("{}.{}", sanitize_file_stem(stem), writer.extension()),
            content_type: writer.content_type().to_string(),
            bytes,
        };
        artifact.write_to(dir)?;
        Ok(artifact)
    }
}

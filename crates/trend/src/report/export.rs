//! Report persistence

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use log::info;
use rust_xlsxwriter::{Workbook as XlsxWorkbook, Worksheet, XlsxError};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::workbook::{Sheet, Workbook, build_workbook};
use crate::collect::MailboxReport;

/// Persists a harvested mailbox
pub trait ReportExporter: Send + Sync {
    /// Write the report and return where it went
    fn export(&self, report: &MailboxReport) -> Result<PathBuf>;
}

/// `{mailbox}_{YYYYmmdd_HHMMSS}.{extension}` with `@` and `.` made filesystem-friendly
pub fn report_file_name(mailbox: &str, at: NaiveDateTime, extension: &str) -> String {
    let safe_mailbox = mailbox.replace('@', "_at_").replace('.', "_");
    format!(
        "{}_{}.{}",
        safe_mailbox,
        at.format("%Y%m%d_%H%M%S"),
        extension
    )
}

fn prepare_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))
}

/// Writes each workbook as an Excel `.xlsx` file into a directory
#[derive(Debug, Clone)]
pub struct XlsxExporter {
    output_dir: PathBuf,
}

impl XlsxExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `workbook` to `path`
    pub fn write(workbook: &Workbook, path: &Path) -> Result<()> {
        let mut xlsx = XlsxWorkbook::new();
        for sheet in &workbook.sheets {
            let worksheet = xlsx.add_worksheet();
            fill_worksheet(worksheet, sheet)
                .with_context(|| format!("Failed to lay out sheet '{}'", sheet.name))?;
        }
        xlsx.save(path)
            .with_context(|| format!("Failed to write report {}", path.display()))
    }
}

fn fill_worksheet(worksheet: &mut Worksheet, sheet: &Sheet) -> Result<()> {
    worksheet.set_name(&sheet.name)?;

    for (col, title) in sheet.columns.iter().enumerate() {
        worksheet.write_string(0, column_index(col)?, title)?;
    }
    for (index, row) in sheet.rows.iter().enumerate() {
        let row_index = u32::try_from(index + 1).context("Too many rows for one sheet")?;
        for (col, value) in row.iter().enumerate() {
            write_cell(worksheet, row_index, column_index(col)?, value)?;
        }
    }
    Ok(())
}

fn column_index(col: usize) -> Result<u16> {
    u16::try_from(col).context("Too many columns for one sheet")
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Bool(flag) => {
            worksheet.write_boolean(row, col, *flag)?;
        }
        Value::Number(number) => {
            if let Some(number) = number.as_f64() {
                worksheet.write_number(row, col, number)?;
            }
        }
        Value::String(text) => {
            worksheet.write_string(row, col, text)?;
        }
        other => {
            worksheet.write_string(row, col, &other.to_string())?;
        }
    }
    Ok(())
}

impl ReportExporter for XlsxExporter {
    fn export(&self, report: &MailboxReport) -> Result<PathBuf> {
        prepare_output_dir(&self.output_dir)?;

        let workbook = build_workbook(report);
        let path = self.output_dir.join(report_file_name(
            &report.mailbox,
            Local::now().naive_local(),
            "xlsx",
        ));
        Self::write(&workbook, &path)?;

        info!(
            "Wrote {} sheets for {} to {}",
            workbook.sheets.len(),
            report.mailbox,
            path.display()
        );
        Ok(path)
    }
}

/// Writes each workbook as pretty-printed JSON into a directory
#[derive(Debug, Clone)]
pub struct JsonWorkbookExporter {
    output_dir: PathBuf,
}

impl JsonWorkbookExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl ReportExporter for JsonWorkbookExporter {
    fn export(&self, report: &MailboxReport) -> Result<PathBuf> {
        prepare_output_dir(&self.output_dir)?;

        let workbook = build_workbook(report);
        let path = self.output_dir.join(report_file_name(
            &report.mailbox,
            Local::now().naive_local(),
            "json",
        ));
        let json =
            serde_json::to_string_pretty(&workbook).context("Failed to serialize workbook")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;

        info!(
            "Wrote {} sheets for {} to {}",
            workbook.sheets.len(),
            report.mailbox,
            path.display()
        );
        Ok(path)
    }
}

//! Report generation
//!
//! A harvested mailbox becomes a workbook: one sheet per folder listing
//! its messages and a `Summary` sheet with the monthly rollups. The
//! workbook model is format-neutral; [`XlsxExporter`] writes it as an
//! Excel file and [`JsonWorkbookExporter`] as JSON.

mod export;
mod sheet;
mod workbook;

pub use export::{JsonWorkbookExporter, ReportExporter, XlsxExporter, report_file_name};
pub use sheet::{MAX_SHEET_NAME_CHARS, SUMMARY_SHEET, SheetNamer};
pub use workbook::{Sheet, Workbook, build_workbook};

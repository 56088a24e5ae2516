//! Workbook model built from a harvested mailbox

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use super::sheet::{SUMMARY_SHEET, SheetNamer};
use crate::aggregate::{month_key, parse_received};
use crate::collect::MailboxReport;
use crate::models::SizedMessage;

const FOLDER_COLUMNS: [&str; 15] = [
    "Subject",
    "Sender",
    "Message Size (bytes)",
    "Message Size (KB)",
    "Message Size (MB)",
    "Attachment Size (bytes)",
    "Attachment Size (KB)",
    "Attachment Size (MB)",
    "Total Size (bytes)",
    "Total Size (KB)",
    "Total Size (MB)",
    "Has Attachments",
    "Received Date",
    "Received Time",
    "Month",
];

const SUMMARY_COLUMNS: [&str; 10] = [
    "Mailbox",
    "Folder",
    "Month",
    "Message Count",
    "Total Size (KB)",
    "Message Size (KB)",
    "Attachment Size (KB)",
    "Total Size (MB)",
    "Message Size (MB)",
    "Attachment Size (MB)",
];

/// One named table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    pub name: String,
    /// Folder path the sheet was made for; `None` for the summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Sheet {
    fn new(name: String, folder_path: Option<String>, columns: &[&str]) -> Self {
        Self {
            name,
            folder_path,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

/// Folder sheets in discovery order followed by the summary sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workbook {
    pub mailbox: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

fn kilobytes(bytes: u64) -> Value {
    rounded(bytes as f64 / 1024.0)
}

fn megabytes(bytes: u64) -> Value {
    rounded(bytes as f64 / (1024.0 * 1024.0))
}

fn rounded(value: f64) -> Value {
    Value::from((value * 100.0).round() / 100.0)
}

fn message_row(message: &SizedMessage) -> Vec<Value> {
    let (date, time) = match message.received_date_time.as_deref() {
        Some(raw) => match parse_received(raw) {
            Some(parsed) => (
                parsed.format("%Y-%m-%d").to_string(),
                parsed.format("%H:%M:%S").to_string(),
            ),
            None => (raw.to_string(), String::new()),
        },
        None => (String::new(), String::new()),
    };
    let has_attachments = if message.attachment_size > 0 { "Yes" } else { "No" };

    vec![
        message.subject.clone().map_or(Value::Null, Value::from),
        Value::from(message.sender_address()),
        Value::from(message.body_size),
        kilobytes(message.body_size),
        megabytes(message.body_size),
        Value::from(message.attachment_size),
        kilobytes(message.attachment_size),
        megabytes(message.attachment_size),
        Value::from(message.total_size),
        kilobytes(message.total_size),
        megabytes(message.total_size),
        Value::from(has_attachments),
        Value::from(date),
        Value::from(time),
        Value::from(month_key(message.received_date_time.as_deref())),
    ]
}

/// Lay out a mailbox report as sheets
pub fn build_workbook(report: &MailboxReport) -> Workbook {
    let mut namer = SheetNamer::new();
    let mut seen = HashSet::new();
    let mut sheets = Vec::new();

    for folder in &report.folders {
        if !seen.insert(folder.path.as_str()) {
            continue;
        }
        let mut sheet = Sheet::new(
            namer.name_for(&folder.path),
            Some(folder.path.clone()),
            &FOLDER_COLUMNS,
        );
        if let Some(messages) = report.data.get(&folder.path) {
            sheet.rows = messages.iter().map(message_row).collect();
        }
        sheets.push(sheet);
    }

    let mut summary = Sheet::new(SUMMARY_SHEET.to_string(), None, &SUMMARY_COLUMNS);
    summary.rows = report
        .summary
        .iter()
        .map(|(key, totals)| {
            vec![
                Value::from(report.mailbox.as_str()),
                Value::from(key.folder_path.as_str()),
                Value::from(key.month.as_str()),
                Value::from(totals.message_count),
                kilobytes(totals.total_size),
                kilobytes(totals.body_size),
                kilobytes(totals.attachment_size),
                megabytes(totals.total_size),
                megabytes(totals.body_size),
                megabytes(totals.attachment_size),
            ]
        })
        .collect();
    sheets.push(summary);

    Workbook {
        mailbox: report.mailbox.clone(),
        sheets,
    }
}

//! Trend crate - Mailbox size telemetry over the Microsoft Graph mail API
//!
//! This crate provides the collection pipeline and size reconciliation:
//! - Graph API types, URL building, HTTP transport and client-credentials auth
//! - A rate-bounded fetch client with retry and error classification
//! - Folder tree discovery, capability probing and per-folder message collection
//! - Message size reconciliation from several partially trusted signals
//! - Monthly rollups per folder and a workbook-shaped report export
//!
//! The crate has no UI or terminal dependencies; progress and diagnostics
//! flow through the [`ProgressSink`] trait.

pub mod aggregate;
pub mod collect;
pub mod config;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod models;
pub mod numeric;
pub mod progress;
pub mod report;
pub mod sizing;

pub use aggregate::{
    MonthlyAggregate, MonthlyKey, MonthlySummary, UNKNOWN_MONTH, month_key, parse_received, summarize,
};
pub use collect::{
    CollectError, FolderTreeCollector, HarvestError, MailboxHarvester, MailboxOutcome, MailboxReport,
    MessageCollector, ProbeOutcome, harvest_all, probe_size_support,
};
pub use self::config::{GraphCredentials, HarvestSettings};
pub use error::{ErrorClass, FetchError, TransportError, classify};
pub use fetch::{FetchClient, RetryPolicy};
pub use graph::{
    ClientCredentialsAuth, FnTransport, GraphUrls, HttpResponse, HttpTransport, StaticToken,
    TokenProvider, UreqTransport,
};
pub use models::{EmailAddress, Folder, MailboxCapabilityState, RawMessage, SizedMessage};
pub use numeric::{lenient_int, lenient_int_str};
pub use progress::{LogSink, ProgressSink};
pub use report::{
    JsonWorkbookExporter, ReportExporter, Sheet, SheetNamer, Workbook, XlsxExporter, build_workbook,
};
pub use sizing::{MessageSizes, compute_sizes};

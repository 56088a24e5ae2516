//! Mailbox collection pipeline
//!
//! Folder discovery, the size capability probe, per-folder message paging
//! and the per-mailbox fan-out that ties them together.

mod folders;
mod mailbox;
mod messages;
mod probe;

use thiserror::Error;

use crate::error::FetchError;

pub use folders::FolderTreeCollector;
pub use mailbox::{MailboxHarvester, MailboxOutcome, MailboxReport, harvest_all};
pub use messages::MessageCollector;
pub use probe::{ProbeOutcome, probe_size_support};

/// Failure of one folder's message collection
#[derive(Debug, Error)]
pub enum CollectError {
    /// A 200 page that does not look like a message listing
    #[error("undecodable message page in folder '{folder}': {reason}")]
    Decode { folder: String, reason: String },

    /// The folder task died before returning
    #[error("task for folder '{folder}' did not complete: {reason}")]
    Task { folder: String, reason: String },
}

/// Failure that ends one mailbox's harvest
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("could not list folders of {mailbox}: {source}")]
    FolderTree {
        mailbox: String,
        #[source]
        source: FetchError,
    },

    #[error("could not export report for {mailbox}: {reason}")]
    Export { mailbox: String, reason: String },

    #[error("harvest task for {mailbox} did not complete: {reason}")]
    Task { mailbox: String, reason: String },
}

//! Progress and diagnostics reporting
//!
//! Deep call sites never print; they report through a [`ProgressSink`]
//! handed down by whoever drives the run.

use log::{debug, error, info, warn};

/// Receiver for incremental counts and warning/error text
pub trait ProgressSink: Send + Sync {
    /// A mailbox is about to be harvested; `expected_messages` is the server's item count
    fn begin_mailbox(&self, mailbox: &str, expected_messages: u64) {
        let _ = (mailbox, expected_messages);
    }

    /// `count` more messages were collected for `mailbox`
    fn advance(&self, mailbox: &str, count: u64) {
        let _ = (mailbox, count);
    }

    /// The mailbox is done, successfully or not
    fn finish_mailbox(&self, mailbox: &str) {
        let _ = mailbox;
    }

    fn warn(&self, message: &str);

    fn error(&self, message: &str);
}

/// Sink that forwards everything to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn begin_mailbox(&self, mailbox: &str, expected_messages: u64) {
        info!("Harvesting {} (~{} messages)", mailbox, expected_messages);
    }

    fn advance(&self, mailbox: &str, count: u64) {
        debug!("{}: +{} messages", mailbox, count);
    }

    fn finish_mailbox(&self, mailbox: &str) {
        info!("Finished {}", mailbox);
    }

    fn warn(&self, message: &str) {
        warn!("{}", message);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}

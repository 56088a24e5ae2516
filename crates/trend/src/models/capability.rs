//! Per-mailbox capability state shared by all of that mailbox's tasks

use std::sync::{Mutex, MutexGuard};

use crate::progress::ProgressSink;

#[derive(Debug)]
struct Flags {
    size_field_supported: bool,
    warning_emitted: bool,
}

/// Whether the mailbox accepts the native `size` field in `$select`
///
/// Starts optimistic. The only transition is supported -> unsupported,
/// and the downgrade warning goes out once no matter how many tasks
/// observe the rejection.
#[derive(Debug)]
pub struct MailboxCapabilityState {
    mailbox: String,
    flags: Mutex<Flags>,
}

impl MailboxCapabilityState {
    pub fn new(mailbox: impl Into<String>) -> Self {
        Self {
            mailbox: mailbox.into(),
            flags: Mutex::new(Flags {
                size_field_supported: true,
                warning_emitted: false,
            }),
        }
    }

    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    fn lock(&self) -> MutexGuard<'_, Flags> {
        // Flags stay consistent even if a holder panicked
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current value of the size flag
    pub fn size_field_supported(&self) -> bool {
        self.lock().size_field_supported
    }

    /// Record that the mailbox rejected the size field
    ///
    /// Returns `true` for the call that emitted the warning.
    pub fn mark_size_unsupported(&self, sink: &dyn ProgressSink) -> bool {
        let mut flags = self.lock();
        flags.size_field_supported = false;
        if flags.warning_emitted {
            return false;
        }
        flags.warning_emitted = true;
        drop(flags);

        sink.warn(&format!(
            "Graph rejected the 'size' property for mailbox {}; message sizes will come from PR_MESSAGE_SIZE and local estimates",
            self.mailbox
        ));
        true
    }
}

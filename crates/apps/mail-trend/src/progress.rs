//! Terminal progress bars for harvest runs

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, warn};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use trend::ProgressSink;

const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix:30} [{bar:40.cyan/blue}] {pos}/{len} msgs ({elapsed})";

/// One bar per mailbox; log lines are printed above the bars
pub struct BarSink {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl BarSink {
    pub fn new() -> Result<Self> {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)?.progress_chars("#>-");
        Ok(Self {
            multi: MultiProgress::new(),
            style,
            bars: Mutex::new(HashMap::new()),
        })
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.bars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressSink for BarSink {
    fn begin_mailbox(&self, mailbox: &str, expected_messages: u64) {
        let bar = self.multi.add(ProgressBar::new(expected_messages));
        bar.set_style(self.style.clone());
        bar.set_prefix(mailbox.to_string());
        self.bars().insert(mailbox.to_string(), bar);
    }

    fn advance(&self, mailbox: &str, count: u64) {
        if let Some(bar) = self.bars().get(mailbox) {
            bar.inc(count);
            // Item counts are the server's estimate
            if bar.length().is_some_and(|len| bar.position() > len) {
                bar.set_length(bar.position());
            }
        }
    }

    fn finish_mailbox(&self, mailbox: &str) {
        if let Some(bar) = self.bars().remove(mailbox) {
            bar.finish();
        }
    }

    fn warn(&self, message: &str) {
        self.multi.suspend(|| warn!("{}", message));
    }

    fn error(&self, message: &str) {
        self.multi.suspend(|| error!("{}", message));
    }
}

//! Per-mailbox orchestration and the multi-mailbox run

use log::info;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};

use super::{CollectError, FolderTreeCollector, HarvestError, MessageCollector, probe_size_support};
use crate::aggregate::{MonthlySummary, summarize};
use crate::fetch::FetchClient;
use crate::graph::GraphUrls;
use crate::models::{Folder, MailboxCapabilityState, SizedMessage};
use crate::progress::ProgressSink;
use crate::report::ReportExporter;

/// Everything harvested from one mailbox, ready for export
#[derive(Debug, Clone)]
pub struct MailboxReport {
    pub mailbox: String,
    /// Folders in discovery order
    pub folders: Vec<Folder>,
    /// Messages keyed by folder path; every discovered path is present
    pub data: BTreeMap<String, Vec<SizedMessage>>,
    pub summary: MonthlySummary,
}

impl MailboxReport {
    pub fn message_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }
}

/// Result of one mailbox in a multi-mailbox run
#[derive(Debug)]
pub struct MailboxOutcome {
    pub mailbox: String,
    /// Where the report was written
    pub result: Result<PathBuf, HarvestError>,
}

type FolderResult = Result<Vec<SizedMessage>, CollectError>;

/// Harvests mailboxes through one shared fetch client
#[derive(Clone)]
pub struct MailboxHarvester {
    client: Arc<FetchClient>,
    urls: GraphUrls,
}

impl MailboxHarvester {
    pub fn new(client: Arc<FetchClient>, urls: GraphUrls) -> Self {
        Self { client, urls }
    }

    pub fn sink(&self) -> &Arc<dyn ProgressSink> {
        self.client.sink()
    }

    /// Discover folders, probe, then collect every folder concurrently
    ///
    /// Only a failed top-level folder listing fails the mailbox. Folder
    /// tasks that error or panic get one more try, after which the folder
    /// is reported empty.
    pub async fn harvest(&self, mailbox: &str) -> Result<MailboxReport, HarvestError> {
        let folders = FolderTreeCollector::new(self.client.clone(), self.urls.clone())
            .collect(mailbox)
            .await?;

        let expected = folders.iter().map(|f| f.total_item_count).sum();
        self.sink().begin_mailbox(mailbox, expected);

        let state = Arc::new(MailboxCapabilityState::new(mailbox));
        let outcome =
            probe_size_support(&self.client, &self.urls, mailbox, &folders, &state).await;
        info!("{}: {} folders, size probe {:?}", mailbox, folders.len(), outcome);

        let collector = MessageCollector::new(self.client.clone(), self.urls.clone());

        let handles: Vec<_> = folders
            .iter()
            .map(|folder| spawn_folder(&collector, mailbox, folder, &state))
            .collect();
        let mut results = Vec::with_capacity(folders.len());
        for (folder, handle) in folders.iter().zip(handles) {
            results.push(joined(folder, handle.await));
        }

        let retries: Vec<_> = folders
            .iter()
            .zip(&results)
            .enumerate()
            .filter_map(|(index, (folder, result))| {
                let err = result.as_ref().err()?;
                self.sink().warn(&format!(
                    "Folder '{}' of {} failed ({}); retrying once",
                    folder.path, mailbox, err
                ));
                Some((index, spawn_folder(&collector, mailbox, folder, &state)))
            })
            .collect();
        for (index, handle) in retries {
            results[index] = joined(&folders[index], handle.await);
        }

        let mut data: BTreeMap<String, Vec<SizedMessage>> = BTreeMap::new();
        for (folder, result) in folders.iter().zip(results) {
            let messages = result.unwrap_or_else(|err| {
                self.sink().error(&format!(
                    "Giving up on folder '{}' of {}: {}",
                    folder.path, mailbox, err
                ));
                Vec::new()
            });
            data.entry(folder.path.clone()).or_default().extend(messages);
        }

        let summary = summarize(&data);
        self.sink().finish_mailbox(mailbox);

        Ok(MailboxReport {
            mailbox: mailbox.to_string(),
            folders,
            data,
            summary,
        })
    }
}

fn spawn_folder(
    collector: &MessageCollector,
    mailbox: &str,
    folder: &Folder,
    state: &Arc<MailboxCapabilityState>,
) -> JoinHandle<FolderResult> {
    let collector = collector.clone();
    let mailbox = mailbox.to_string();
    let folder = folder.clone();
    let state = state.clone();

    tokio::spawn(async move { collector.collect(&mailbox, &folder, &state).await })
}

fn joined(folder: &Folder, result: Result<FolderResult, JoinError>) -> FolderResult {
    result.unwrap_or_else(|e| {
        Err(CollectError::Task {
            folder: folder.path.clone(),
            reason: e.to_string(),
        })
    })
}

/// Harvest and export every mailbox concurrently
///
/// A mailbox failure is logged and recorded in its outcome; it never
/// affects the others. Outcomes come back in input order.
pub async fn harvest_all(
    harvester: &MailboxHarvester,
    mailboxes: &[String],
    exporter: Arc<dyn ReportExporter>,
) -> Vec<MailboxOutcome> {
    let handles: Vec<_> = mailboxes
        .iter()
        .map(|mailbox| {
            let harvester = harvester.clone();
            let exporter = exporter.clone();
            let mailbox = mailbox.clone();
            tokio::spawn(async move {
                let report = harvester.harvest(&mailbox).await?;
                info!(
                    "{}: {} messages in {} folders",
                    mailbox,
                    report.message_count(),
                    report.folders.len()
                );
                exporter
                    .export(&report)
                    .map_err(|e| HarvestError::Export {
                        mailbox: mailbox.clone(),
                        reason: format!("{:#}", e),
                    })
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(mailboxes.len());
    for (mailbox, handle) in mailboxes.iter().zip(handles) {
        let result = handle.await.unwrap_or_else(|e| {
            Err(HarvestError::Task {
                mailbox: mailbox.clone(),
                reason: e.to_string(),
            })
        });

        match &result {
            Ok(path) => info!("{}: report written to {}", mailbox, path.display()),
            Err(err) => {
                harvester.sink().error(&err.to_string());
                harvester.sink().finish_mailbox(mailbox);
            }
        }

        outcomes.push(MailboxOutcome {
            mailbox: mailbox.clone(),
            result,
        });
    }

    outcomes
}

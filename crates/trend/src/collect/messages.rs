//! Per-folder message paging with size downgrade

use log::debug;
use std::sync::Arc;

use super::CollectError;
use crate::fetch::FetchClient;
use crate::graph::api::Page;
use crate::graph::{GraphUrls, SIZE_FIELD};
use crate::models::{Folder, MailboxCapabilityState, RawMessage, SizedMessage};

/// How one pass over a folder ended
enum Pass {
    Complete(Vec<SizedMessage>),
    /// The first page rejected the `size` field
    SizeRejected,
}

/// Collects and sizes every message of a folder
#[derive(Clone)]
pub struct MessageCollector {
    client: Arc<FetchClient>,
    urls: GraphUrls,
}

impl MessageCollector {
    pub fn new(client: Arc<FetchClient>, urls: GraphUrls) -> Self {
        Self { client, urls }
    }

    /// Page through `folder`, sizing each message as it arrives
    ///
    /// If the mailbox turns out not to support `size`, the state is
    /// downgraded and the folder is fetched again from the start without
    /// it. Failures after the first page end paging with what was
    /// collected so far.
    pub async fn collect(
        &self,
        mailbox: &str,
        folder: &Folder,
        state: &MailboxCapabilityState,
    ) -> Result<Vec<SizedMessage>, CollectError> {
        loop {
            let include_size = state.size_field_supported();
            match self.pass(mailbox, folder, include_size).await? {
                Pass::Complete(messages) => return Ok(messages),
                Pass::SizeRejected => {
                    state.mark_size_unsupported(self.client.sink().as_ref());
                    debug!(
                        "{}: restarting '{}' without the size field",
                        mailbox, folder.path
                    );
                }
            }
        }
    }

    async fn pass(
        &self,
        mailbox: &str,
        folder: &Folder,
        include_size: bool,
    ) -> Result<Pass, CollectError> {
        let mut messages = Vec::new();
        let mut next = Some(self.urls.messages(mailbox, &folder.id, include_size));
        let mut first_page = true;

        while let Some(url) = next.take() {
            let value = match self.client.get_json(&url).await {
                Ok(value) => value,
                Err(err) if first_page && include_size && err.rejects_property(SIZE_FIELD) => {
                    return Ok(Pass::SizeRejected);
                }
                Err(err) => {
                    self.client.sink().warn(&format!(
                        "Stopped paging '{}' in {} after {} messages: {}",
                        folder.path,
                        mailbox,
                        messages.len(),
                        err
                    ));
                    break;
                }
            };

            let page: Page<RawMessage> =
                serde_json::from_value(value).map_err(|e| CollectError::Decode {
                    folder: folder.path.clone(),
                    reason: e.to_string(),
                })?;
            first_page = false;

            let count = page.value.len() as u64;
            messages.extend(page.value.into_iter().map(SizedMessage::from_raw));
            self.client.sink().advance(mailbox, count);
            next = page.next_link;
        }

        debug!(
            "{}: '{}' yielded {} messages",
            mailbox,
            folder.path,
            messages.len()
        );
        Ok(Pass::Complete(messages))
    }
}

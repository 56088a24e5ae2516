//! Folder tree discovery

use log::debug;
use std::sync::Arc;

use super::HarvestError;
use crate::error::FetchError;
use crate::fetch::FetchClient;
use crate::graph::GraphUrls;
use crate::graph::api::GraphMailFolder;
use crate::models::Folder;

/// Walks a mailbox's folder hierarchy
pub struct FolderTreeCollector {
    client: Arc<FetchClient>,
    urls: GraphUrls,
}

impl FolderTreeCollector {
    pub fn new(client: Arc<FetchClient>, urls: GraphUrls) -> Self {
        Self { client, urls }
    }

    /// Every folder of `mailbox` in pre-order, depth first
    ///
    /// The top-level listing must succeed in full. A failing child listing
    /// keeps the children it already returned and the walk carries on.
    pub async fn collect(&self, mailbox: &str) -> Result<Vec<Folder>, HarvestError> {
        let (top, failure) = self.list(self.urls.top_folders(mailbox)).await;
        if let Some(source) = failure {
            return Err(HarvestError::FolderTree {
                mailbox: mailbox.to_string(),
                source,
            });
        }

        // Reversed so pops come out in server order
        let mut stack: Vec<(GraphMailFolder, Option<String>)> =
            top.into_iter().rev().map(|raw| (raw, None)).collect();
        let mut folders = Vec::new();

        while let Some((raw, parent_path)) = stack.pop() {
            let folder = Folder::from_api(raw, parent_path.as_deref());

            if !folder.is_leaf() && !folder.id.is_empty() {
                let (children, failure) = self
                    .list(self.urls.child_folders(mailbox, &folder.id))
                    .await;
                if let Some(err) = failure {
                    self.client.sink().warn(&format!(
                        "Child folders of '{}' in {} are incomplete ({} listed): {}",
                        folder.path,
                        mailbox,
                        children.len(),
                        err
                    ));
                }
                for child in children.into_iter().rev() {
                    stack.push((child, Some(folder.path.clone())));
                }
            }

            folders.push(folder);
        }

        debug!("{}: discovered {} folders", mailbox, folders.len());
        Ok(folders)
    }

    /// Follow `@odata.nextLink` from `url`, stopping at the first failure
    async fn list(&self, url: String) -> (Vec<GraphMailFolder>, Option<FetchError>) {
        let mut items = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            match self.client.get_page::<GraphMailFolder>(&url).await {
                Ok(page) => {
                    items.extend(page.value);
                    next = page.next_link;
                }
                Err(err) => return (items, Some(err)),
            }
        }

        (items, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::RetryPolicy;
    use crate::graph::{FnTransport, HttpResponse};
    use crate::progress::tests::RecordingSink;
    use serde_json::json;

    fn collector(transport: Arc<FnTransport>) -> (FolderTreeCollector, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let client = Arc::new(FetchClient::new(
            transport,
            "token",
            4,
            RetryPolicy::immediate(1),
            sink.clone(),
        ));
        let urls = GraphUrls::new("https://graph.test/v1.0", 10).unwrap();
        (FolderTreeCollector::new(client, urls), sink)
    }

    fn folder(id: &str, name: &str, children: Option<u64>) -> serde_json::Value {
        json!({"id": id, "displayName": name, "totalItemCount": 1, "childFolderCount": children})
    }

    #[tokio::test]
    async fn test_tree_is_walked_in_pre_order_with_paths() {
        let transport = Arc::new(FnTransport::new(|url| {
            let body = if url.ends_with("/users/ann%40example.com/mailFolders?$top=10") {
                json!({
                    "value": [folder("INBOX", "Inbox", Some(2))],
                    "@odata.nextLink": "https://graph.test/v1.0/top-page-2"
                })
            } else if url.ends_with("top-page-2") {
                json!({"value": [folder("ARCH", "Archive", Some(0))]})
            } else if url.contains("/mailFolders/INBOX/childFolders") {
                json!({"value": [folder("A", "Projects", Some(1)), folder("B", "Receipts", Some(0))]})
            } else if url.contains("/mailFolders/A/childFolders") {
                json!({"value": [folder("A1", "2024", None)]})
            } else if url.contains("/mailFolders/A1/childFolders") {
                json!({"value": []})
            } else {
                return Ok(HttpResponse::new(404, "unexpected"));
            };
            Ok(HttpResponse::ok(&body))
        }));
        let (collector, _sink) = collector(transport.clone());

        let folders = collector.collect("ann@example.com").await.unwrap();
        let paths: Vec<_> = folders.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "Inbox",
                "Inbox/Projects",
                "Inbox/Projects/2024",
                "Inbox/Receipts",
                "Archive"
            ]
        );

        // Folders reporting no children are never asked for them
        assert_eq!(transport.count_matching("/ARCH/childFolders"), 0);
        assert_eq!(transport.count_matching("/B/childFolders"), 0);
    }

    #[tokio::test]
    async fn test_top_level_failure_is_fatal() {
        let transport = Arc::new(FnTransport::new(|_| Ok(HttpResponse::new(403, "denied"))));
        let (collector, _sink) = collector(transport);

        let err = collector.collect("ann@example.com").await.unwrap_err();
        match err {
            HarvestError::FolderTree { mailbox, source } => {
                assert_eq!(mailbox, "ann@example.com");
                assert_eq!(source.status, Some(403));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_child_failure_keeps_partial_tree() {
        let transport = Arc::new(FnTransport::new(|url| {
            if url.contains("/INBOX/childFolders") {
                return Ok(HttpResponse::new(500, "boom"));
            }
            if url.contains("childFolders") {
                return Ok(HttpResponse::ok(&json!({"value": []})));
            }
            Ok(HttpResponse::ok(&json!({
                "value": [folder("INBOX", "Inbox", Some(3)), folder("SENT", "Sent Items", None)]
            })))
        }));
        let (collector, sink) = collector(transport);

        let folders = collector.collect("ann@example.com").await.unwrap();
        let paths: Vec<_> = folders.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["Inbox", "Sent Items"]);
        assert_eq!(sink.warnings().len(), 1);
        assert!(sink.warnings()[0].contains("Inbox"));
    }
}

//! URL construction for the Graph mail endpoints

use anyhow::{Context, Result};
use url::Url;

/// Native message size property, optional per mailbox
pub const SIZE_FIELD: &str = "size";

/// Graph API base URL
pub const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Metadata fields always requested for messages
const MESSAGE_SELECT_FIELDS: [&str; 11] = [
    "id",
    "subject",
    "receivedDateTime",
    "hasAttachments",
    "from",
    "toRecipients",
    "ccRecipients",
    "bodyPreview",
    "body",
    "internetMessageHeaders",
    "singleValueExtendedProperties",
];

const ATTACHMENTS_EXPAND: &str = "attachments($select=size,isInline)";

/// `PR_MESSAGE_SIZE` under both type tags Exchange uses for it
const MESSAGE_SIZE_FILTER: &str = "id eq 'Integer 0x0E08' or id eq 'Long 0x0E08'";

/// Builds request URLs for one Graph endpoint
#[derive(Debug, Clone)]
pub struct GraphUrls {
    base: String,
    page_size: u32,
}

impl Default for GraphUrls {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_URL.to_string(),
            page_size: 100,
        }
    }
}

impl GraphUrls {
    /// Create a URL builder for `base` (e.g. `https://graph.microsoft.com/v1.0`)
    pub fn new(base: &str, page_size: u32) -> Result<Self> {
        let parsed = Url::parse(base).with_context(|| format!("Invalid Graph base URL: {}", base))?;
        anyhow::ensure!(
            matches!(parsed.scheme(), "http" | "https"),
            "Graph base URL must be http(s): {}",
            base
        );

        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            page_size: page_size.clamp(1, 1000),
        })
    }

    fn user_root(&self, mailbox: &str) -> String {
        format!("{}/users/{}", self.base, urlencoding::encode(mailbox))
    }

    fn folder_root(&self, mailbox: &str, folder_id: &str) -> String {
        format!(
            "{}/mailFolders/{}",
            self.user_root(mailbox),
            urlencoding::encode(folder_id)
        )
    }

    /// Top-level folder listing
    pub fn top_folders(&self, mailbox: &str) -> String {
        format!("{}/mailFolders?$top={}", self.user_root(mailbox), self.page_size)
    }

    /// Direct children of a folder
    pub fn child_folders(&self, mailbox: &str, folder_id: &str) -> String {
        format!(
            "{}/childFolders?$top={}",
            self.folder_root(mailbox, folder_id),
            self.page_size
        )
    }

    /// One-item query that fails with 400 if the mailbox rejects `size`
    pub fn size_probe(&self, mailbox: &str, folder_id: &str) -> String {
        format!(
            "{}/messages?$select=id,{}&$top=1",
            self.folder_root(mailbox, folder_id),
            SIZE_FIELD
        )
    }

    /// First page of a folder's message listing
    pub fn messages(&self, mailbox: &str, folder_id: &str, include_size: bool) -> String {
        let mut select = MESSAGE_SELECT_FIELDS.join(",");
        if include_size {
            select.push(',');
            select.push_str(SIZE_FIELD);
        }

        let expand = format!(
            "{},singleValueExtendedProperties($filter={})",
            ATTACHMENTS_EXPAND,
            urlencoding::encode(MESSAGE_SIZE_FILTER)
        );

        format!(
            "{}/messages?$select={}&$expand={}&$top={}",
            self.folder_root(mailbox, folder_id),
            select,
            expand,
            self.page_size
        )
    }
}

/// Fields named in a URL's `$select`, for inspecting requests
pub fn selected_fields(url: &str) -> Vec<&str> {
    url.split_once("$select=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or_default())
        .map(|select| select.split(',').collect::<Vec<_>>())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_base_is_rejected() {
        assert!(GraphUrls::new("not a url", 100).is_err());
        assert!(GraphUrls::new("ftp://graph.example.com", 100).is_err());
    }

    #[test]
    fn test_folder_urls() {
        let urls = GraphUrls::new("https://graph.example.com/v1.0/", 50).unwrap();
        assert_eq!(
            urls.top_folders("ann@example.com"),
            "https://graph.example.com/v1.0/users/ann%40example.com/mailFolders?$top=50"
        );
        assert_eq!(
            urls.child_folders("ann@example.com", "AQMk=="),
            "https://graph.example.com/v1.0/users/ann%40example.com/mailFolders/AQMk%3D%3D/childFolders?$top=50"
        );
    }

    #[test]
    fn test_message_url_size_toggle() {
        let urls = GraphUrls::default();
        let with_size = urls.messages("ann@example.com", "F1", true);
        let without_size = urls.messages("ann@example.com", "F1", false);

        assert!(selected_fields(&with_size).contains(&SIZE_FIELD));
        assert!(!selected_fields(&without_size).contains(&SIZE_FIELD));
        assert!(with_size.contains("$expand=attachments($select=size,isInline)"));
        assert!(with_size.contains("Integer%200x0E08"));
        assert!(with_size.ends_with("&$top=100"));
    }

    #[test]
    fn test_size_probe_selects_size() {
        let url = GraphUrls::default().size_probe("ann@example.com", "F1");
        assert_eq!(selected_fields(&url), vec!["id", "size"]);
        assert!(url.ends_with("$top=1"));
    }
}

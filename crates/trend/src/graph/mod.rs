//! Microsoft Graph mail API integration
//!
//! This module provides:
//! - Response types for the folder and message listings
//! - URL construction for every endpoint the harvester calls
//! - The HTTP transport seam and its ureq implementation
//! - Client-credentials token acquisition

mod auth;
mod transport;
mod urls;

pub use auth::{ClientCredentialsAuth, StaticToken, TokenProvider};
pub use transport::{FnTransport, HttpResponse, HttpTransport, UreqTransport};
pub use urls::{DEFAULT_BASE_URL, GraphUrls, SIZE_FIELD, selected_fields};

/// Graph API response types
pub mod api {
    use serde::Deserialize;

    /// One page of any `value` + `@odata.nextLink` collection
    #[derive(Debug, Deserialize)]
    pub struct Page<T> {
        #[serde(default = "Vec::new")]
        pub value: Vec<T>,
        #[serde(rename = "@odata.nextLink")]
        pub next_link: Option<String>,
    }

    /// Mail folder as returned by `mailFolders` and `childFolders`
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GraphMailFolder {
        pub id: Option<String>,
        pub display_name: Option<String>,
        pub total_item_count: Option<u64>,
        pub child_folder_count: Option<u64>,
    }
}

//! Folder model representing one node of a mailbox folder tree

use serde::{Deserialize, Serialize};

use crate::graph::api::GraphMailFolder;

/// A mail folder with its full slash-joined path
///
/// The path is assigned once, top-down, while the tree is walked and is
/// the key used for grouping and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Graph folder ID
    pub id: String,
    /// Ancestor display names joined with `/`
    pub path: String,
    /// Display name of this folder alone
    pub display_name: String,
    /// Number of items the server reports for this folder
    pub total_item_count: u64,
    /// Number of direct children the server reports, when it says
    pub child_folder_count: Option<u64>,
}

impl Folder {
    /// Build a folder from its API representation and the parent's path
    pub fn from_api(raw: GraphMailFolder, parent_path: Option<&str>) -> Self {
        let display_name = raw.display_name.unwrap_or_default();
        let path = match parent_path {
            Some(parent) if !parent.is_empty() => format!("{}/{}", parent, display_name),
            _ => display_name.clone(),
        };

        Self {
            id: raw.id.unwrap_or_default(),
            path,
            display_name,
            total_item_count: raw.total_item_count.unwrap_or(0),
            child_folder_count: raw.child_folder_count,
        }
    }

    /// Whether the server explicitly reported that this folder has no children
    pub fn is_leaf(&self) -> bool {
        self.child_folder_count == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_folder(name: &str, children: Option<u64>) -> GraphMailFolder {
        GraphMailFolder {
            id: Some(format!("id-{}", name)),
            display_name: Some(name.to_string()),
            total_item_count: Some(3),
            child_folder_count: children,
        }
    }

    #[test]
    fn test_top_level_path_is_display_name() {
        let folder = Folder::from_api(api_folder("Inbox", Some(1)), None);
        assert_eq!(folder.path, "Inbox");
        assert_eq!(folder.id, "id-Inbox");
        assert_eq!(folder.total_item_count, 3);
        assert!(!folder.is_leaf());
    }

    #[test]
    fn test_child_path_joins_parent() {
        let folder = Folder::from_api(api_folder("Reports", Some(0)), Some("Inbox/Work"));
        assert_eq!(folder.path, "Inbox/Work/Reports");
        assert_eq!(folder.display_name, "Reports");
        assert!(folder.is_leaf());
    }

    #[test]
    fn test_unknown_child_count_is_not_leaf() {
        let folder = Folder::from_api(api_folder("Archive", None), None);
        assert!(!folder.is_leaf());
    }
}

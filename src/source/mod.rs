//! Dataset listing collaborators.
//!
//! The tree controller never talks to storage directly; it hands out
//! requests and a [`DirectorySource`] answers them, one level at a time.

pub mod local;
pub mod manifest;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::tree::node::TreeNode;

/// Lists a dataset's directories one level deep.
///
/// Both calls are idempotent reads. Directory nodes in a listing must come
/// back with their children unloaded.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Human-readable dataset label, shown in the tree title.
    fn dataset(&self) -> &str;

    /// Top-level base directories of the dataset.
    async fn base_directories(&self) -> Result<Vec<TreeNode>, FetchError>;

    /// Immediate children of the directory at `dir_path`.
    async fn child_directories(&self, dir_path: &str) -> Result<Vec<TreeNode>, FetchError>;
}

/// Sort a listing: optionally directories first, then case-insensitive name.
pub fn sort_listing(nodes: &mut [TreeNode], dirs_first: bool) {
    nodes.sort_by(|a, b| {
        let mut cmp = std::cmp::Ordering::Equal;
        if dirs_first {
            cmp = b.is_dir().cmp(&a.is_dir());
        }
        cmp.then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// Join a dataset-relative directory path and an entry name.
pub fn join_path(dir_path: &str, name: &str) -> String {
    let dir = dir_path.trim_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

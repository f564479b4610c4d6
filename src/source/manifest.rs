use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{join_path, sort_listing, DirectorySource};
use crate::error::{AppError, FetchError, Result};
use crate::tree::node::TreeNode;

/// One entry of a dataset manifest. An entry with `children` is a directory.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    #[serde(default = "default_verified")]
    pub verified: bool,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub children: Option<Vec<ManifestEntry>>,
}

fn default_verified() -> bool {
    true
}

/// A dataset described by a JSON manifest document.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub dataset: String,
    pub entries: Vec<ManifestEntry>,
}

/// Serves a manifest one level at a time, like a remote listing service would.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    manifest: Manifest,
    dirs_first: bool,
}

/// Entry names become path segments and node ids, so each must be a single
/// segment and unique among its siblings.
fn validate(entries: &[ManifestEntry], dir_path: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        let name = entry.name.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(AppError::InvalidPath(format!(
                "manifest entry {:?} under {:?} is not a valid name",
                name, dir_path
            )));
        }
        if !seen.insert(name) {
            return Err(AppError::InvalidPath(format!(
                "manifest lists {:?} twice under {:?}",
                name, dir_path
            )));
        }
        if let Some(children) = &entry.children {
            validate(children, &join_path(dir_path, name))?;
        }
    }
    Ok(())
}

impl ManifestSource {
    /// Wrap a parsed manifest, rejecting names that would collide as ids.
    pub fn new(manifest: Manifest, dirs_first: bool) -> Result<Self> {
        validate(&manifest.entries, "")?;
        Ok(Self {
            manifest,
            dirs_first,
        })
    }

    pub fn from_json(json: &str, dirs_first: bool) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(json)?;
        Self::new(manifest, dirs_first)
    }

    pub fn load(path: &Path, dirs_first: bool) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json, dirs_first)
    }

    /// Entries of the directory at `dir_path`.
    fn lookup(&self, dir_path: &str) -> std::result::Result<&[ManifestEntry], FetchError> {
        let mut entries: &[ManifestEntry] = &self.manifest.entries;
        for part in dir_path.split('/').filter(|p| !p.is_empty()) {
            let entry = entries
                .iter()
                .find(|e| e.name == part)
                .ok_or_else(|| FetchError::NotFound {
                    path: dir_path.to_string(),
                })?;
            entries = entry
                .children
                .as_deref()
                .ok_or_else(|| FetchError::Status {
                    path: dir_path.to_string(),
                    status: 400,
                })?;
        }
        Ok(entries)
    }

    fn listing(&self, dir_path: &str) -> std::result::Result<Vec<TreeNode>, FetchError> {
        let mut nodes: Vec<TreeNode> = self
            .lookup(dir_path)?
            .iter()
            .map(|entry| to_node(dir_path, entry))
            .collect();
        sort_listing(&mut nodes, self.dirs_first);
        debug!(path = %dir_path, count = nodes.len(), "listed manifest directory");
        Ok(nodes)
    }
}

fn to_node(dir_path: &str, entry: &ManifestEntry) -> TreeNode {
    let rel = join_path(dir_path, &entry.name);
    let node = if entry.children.is_some() {
        TreeNode::directory(rel.clone(), entry.name.clone(), rel)
    } else {
        let file = TreeNode::file(rel.clone(), entry.name.clone(), rel);
        match entry.size {
            Some(size) => file.with_size(size),
            None => file,
        }
    };
    node.with_verified(entry.verified)
}

#[async_trait]
impl DirectorySource for ManifestSource {
    fn dataset(&self) -> &str {
        &self.manifest.dataset
    }

    async fn base_directories(&self) -> std::result::Result<Vec<TreeNode>, FetchError> {
        self.listing("")
    }

    async fn child_directories(
        &self,
        dir_path: &str,
    ) -> std::result::Result<Vec<TreeNode>, FetchError> {
        self.listing(dir_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    const MANIFEST: &str = r#"{
        "dataset": "ds-0042",
        "entries": [
            { "name": "notes.txt", "size": 12 },
            { "name": "raw", "children": [
                { "name": "run1", "children": [] },
                { "name": "locked.bin", "verified": false, "size": 900 }
            ]}
        ]
    }"#;

    #[tokio::test]
    async fn base_directories_one_level_deep() {
        let source = ManifestSource::from_json(MANIFEST, true).unwrap();
        assert_eq!(source.dataset(), "ds-0042");
        let roots = source.base_directories().await.unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].name, "raw");
        assert!(roots[0].is_dir());
        assert!(!roots[0].is_loaded());
        assert_eq!(roots[1].size(), Some(12));
    }

    #[tokio::test]
    async fn child_directories_carry_verified_flag() {
        let source = ManifestSource::from_json(MANIFEST, true).unwrap();
        let children = source.child_directories("raw").await.unwrap();
        assert_eq!(children[0].id.as_str(), "raw/run1");
        let locked = &children[1];
        assert_eq!(locked.id.as_str(), "raw/locked.bin");
        assert!(!locked.verified);
    }

    #[tokio::test]
    async fn empty_directory_lists_nothing() {
        let source = ManifestSource::from_json(MANIFEST, true).unwrap();
        assert!(source.child_directories("raw/run1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_and_file_paths_fail() {
        let source = ManifestSource::from_json(MANIFEST, true).unwrap();
        assert!(matches!(
            source.child_directories("raw/nope").await,
            Err(FetchError::NotFound { .. })
        ));
        assert!(matches!(
            source.child_directories("notes.txt").await,
            Err(FetchError::Status { status: 400, .. })
        ));
    }

    #[test]
    fn malformed_manifest_is_rejected() {
        let err = ManifestSource::from_json("{ not json", true).unwrap_err();
        assert!(matches!(err, AppError::Manifest(_)));
    }

    #[test]
    fn duplicate_sibling_names_are_rejected() {
        let json = r#"{ "dataset": "ds", "entries": [
            { "name": "raw", "children": [
                { "name": "a.csv" },
                { "name": "a.csv", "size": 4 }
            ]}
        ]}"#;
        let err = ManifestSource::from_json(json, true).unwrap_err();
        assert!(matches!(err, AppError::InvalidPath(_)));
        assert!(err.to_string().contains("a.csv"));
    }

    #[test]
    fn names_with_separators_are_rejected() {
        // "raw/a.csv" would collide with the id of a.csv inside raw.
        let json = r#"{ "dataset": "ds", "entries": [
            { "name": "raw", "children": [ { "name": "a.csv" } ] },
            { "name": "raw/a.csv" }
        ]}"#;
        assert!(matches!(
            ManifestSource::from_json(json, true),
            Err(AppError::InvalidPath(_))
        ));
        for bad in ["", ".", ".."] {
            let json = format!(r#"{{ "dataset": "ds", "entries": [ {{ "name": "{}" }} ] }}"#, bad);
            assert!(ManifestSource::from_json(&json, true).is_err(), "{:?} accepted", bad);
        }
    }

    #[test]
    fn same_name_in_different_directories_is_fine() {
        let json = r#"{ "dataset": "ds", "entries": [
            { "name": "a", "children": [ { "name": "data.csv" } ] },
            { "name": "b", "children": [ { "name": "data.csv" } ] }
        ]}"#;
        assert!(ManifestSource::from_json(json, true).is_ok());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, MANIFEST).expect("write");
        let source = ManifestSource::load(&path, false).expect("load");
        assert_eq!(source.dataset(), "ds-0042");
    }
}

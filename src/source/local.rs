use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{join_path, sort_listing, DirectorySource};
use crate::error::{AppError, FetchError, Result};
use crate::tree::node::TreeNode;

/// A dataset rooted at a local directory.
///
/// Node ids and paths are relative to the root. Regular files and
/// directories are verified; symlinks and special files are listed but
/// cannot be selected.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
    dataset: String,
    dirs_first: bool,
}

impl LocalSource {
    pub fn new(root: &Path, dirs_first: bool) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|_| AppError::InvalidPath(format!("{} does not exist", root.display())))?;
        if !root.is_dir() {
            return Err(AppError::InvalidPath(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let dataset = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root.to_string_lossy().to_string());
        Ok(Self {
            root,
            dataset,
            dirs_first,
        })
    }

    /// Map a dataset-relative path onto the filesystem, refusing escapes.
    fn resolve(&self, dir_path: &str) -> std::result::Result<PathBuf, FetchError> {
        let mut resolved = self.root.clone();
        for component in Path::new(dir_path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FetchError::Status {
                        path: dir_path.to_string(),
                        status: 400,
                    });
                }
            }
        }
        Ok(resolved)
    }

    async fn list(&self, dir_path: &str) -> std::result::Result<Vec<TreeNode>, FetchError> {
        let dir = self.resolve(dir_path)?;
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| io_to_fetch(dir_path, e))?;

        let mut nodes = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_to_fetch(dir_path, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(_) => continue,
            };
            let rel = join_path(dir_path, &name);

            let node = if file_type.is_dir() {
                TreeNode::directory(rel.clone(), name, rel)
            } else if file_type.is_file() {
                let node = TreeNode::file(rel.clone(), name, rel);
                match entry.metadata().await {
                    Ok(meta) => node.with_size(meta.len()),
                    Err(_) => node,
                }
            } else {
                TreeNode::file(rel.clone(), name, rel).with_verified(false)
            };
            nodes.push(node);
        }

        sort_listing(&mut nodes, self.dirs_first);
        debug!(path = %dir_path, count = nodes.len(), "listed local directory");
        Ok(nodes)
    }
}

fn io_to_fetch(path: &str, err: io::Error) -> FetchError {
    let path = path.to_string();
    match err.kind() {
        io::ErrorKind::NotFound => FetchError::NotFound { path },
        io::ErrorKind::PermissionDenied => FetchError::Status { path, status: 403 },
        _ => FetchError::Transport {
            path,
            reason: err.to_string(),
        },
    }
}

#[async_trait]
impl DirectorySource for LocalSource {
    fn dataset(&self) -> &str {
        &self.dataset
    }

    async fn base_directories(&self) -> std::result::Result<Vec<TreeNode>, FetchError> {
        self.list("").await
    }

    async fn child_directories(
        &self,
        dir_path: &str,
    ) -> std::result::Result<Vec<TreeNode>, FetchError> {
        self.list(dir_path).await
    }
}

//! Download request document built from the current selection.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, Result};
use crate::tree::node::{NodeId, TreeNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Directory,
}

/// One selected entry. Directories appear here only when their contents were
/// never loaded, so the whole directory is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadItem {
    pub id: NodeId,
    pub path: String,
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub dataset: String,
    pub items: Vec<DownloadItem>,
    /// Sum of known file sizes. Whole-directory items contribute nothing.
    pub total_bytes: u64,
}

impl DownloadRequest {
    pub fn from_selection(dataset: &str, selected: &[&TreeNode]) -> Self {
        let items: Vec<DownloadItem> = selected
            .iter()
            .map(|node| DownloadItem {
                id: node.id.clone(),
                path: node.path.clone(),
                kind: if node.is_dir() {
                    ItemKind::Directory
                } else {
                    ItemKind::File
                },
                size: node.size(),
            })
            .collect();
        let total_bytes = items.iter().filter_map(|i| i.size).sum();
        Self {
            dataset: dataset.to_string(),
            items,
            total_bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AppError::Export(e.to_string()))
    }

    /// Write the request as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Export(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, json)
            .map_err(|e| AppError::Export(format!("{}: {}", path.display(), e)))?;
        info!(
            path = %path.display(),
            items = self.items.len(),
            total_bytes = self.total_bytes,
            "download request written"
        );
        Ok(())
    }
}

/// Human-readable byte count, e.g. `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a node, unique within one tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What is known about a directory's children.
#[derive(Debug, Clone, PartialEq)]
pub enum Children {
    /// Not yet fetched.
    Unloaded,
    /// The last fetch failed; toggling again retries.
    Failed(String),
    /// Fetched. An empty vector means the directory is empty.
    Loaded(Vec<TreeNode>),
}

/// Type of dataset node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    File {
        size: Option<u64>,
    },
    Directory {
        children: Children,
        toggled: bool,
    },
}

/// A node in the dataset tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: NodeId,
    pub name: String,
    /// Dataset-relative path, used to key child fetches.
    pub path: String,
    pub kind: NodeKind,
    pub selected: bool,
    /// Only verified leaves may be selected.
    pub verified: bool,
}

impl TreeNode {
    /// A verified file leaf.
    pub fn file(id: impl Into<String>, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(id),
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File { size: None },
            selected: false,
            verified: true,
        }
    }

    /// A collapsed directory whose children have not been fetched.
    pub fn directory(
        id: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: NodeId::new(id),
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Directory {
                children: Children::Unloaded,
                toggled: false,
            },
            selected: false,
            verified: true,
        }
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        if let NodeKind::File { size: ref mut s } = self.kind {
            *s = Some(size);
        }
        self
    }

    /// Mark a directory as loaded with the given children. No-op on files.
    #[cfg(test)]
    pub fn with_children(mut self, nodes: Vec<TreeNode>) -> Self {
        if let NodeKind::Directory { children, .. } = &mut self.kind {
            *children = Children::Loaded(nodes);
        }
        self
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// Files are implicitly loaded.
    pub fn is_loaded(&self) -> bool {
        match &self.kind {
            NodeKind::File { .. } => true,
            NodeKind::Directory { children, .. } => matches!(children, Children::Loaded(_)),
        }
    }

    pub fn is_toggled(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { toggled: true, .. })
    }

    /// Set the expansion flag. Files are never toggled.
    pub fn set_toggled(&mut self, value: bool) {
        if let NodeKind::Directory { toggled, .. } = &mut self.kind {
            *toggled = value;
        }
    }

    pub fn size(&self) -> Option<u64> {
        match self.kind {
            NodeKind::File { size } => size,
            NodeKind::Directory { .. } => None,
        }
    }

    /// Loaded children, or `None` for files and undetermined directories.
    pub fn children(&self) -> Option<&[TreeNode]> {
        match &self.kind {
            NodeKind::Directory {
                children: Children::Loaded(nodes),
                ..
            } => Some(nodes),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<TreeNode>> {
        match &mut self.kind {
            NodeKind::Directory {
                children: Children::Loaded(nodes),
                ..
            } => Some(nodes),
            _ => None,
        }
    }

    /// True if this node has at least one loaded child.
    pub fn has_children(&self) -> bool {
        self.children().is_some_and(|c| !c.is_empty())
    }

    /// Reason of the last failed fetch, if any.
    pub fn load_error(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Directory {
                children: Children::Failed(reason),
                ..
            } => Some(reason),
            _ => None,
        }
    }

    /// Replace the children state. No-op on files.
    pub fn set_children(&mut self, state: Children) {
        if let NodeKind::Directory { children, .. } = &mut self.kind {
            *children = state;
        }
    }

    /// Number of loaded descendants, excluding this node.
    #[cfg(test)]
    pub fn descendant_count(&self) -> usize {
        self.children()
            .map(|c| c.iter().map(|child| 1 + child.descendant_count()).sum())
            .unwrap_or(0)
    }

    pub fn find(&self, id: &NodeId) -> Option<&TreeNode> {
        if &self.id == id {
            return Some(self);
        }
        self.children()?.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: &NodeId) -> Option<&mut TreeNode> {
        if &self.id == id {
            return Some(self);
        }
        self.children_mut()?
            .iter_mut()
            .find_map(|child| child.find_mut(id))
    }

    fn collect_ids<'a>(&'a self, seen: &mut HashSet<&'a NodeId>) -> Option<&'a NodeId> {
        if !seen.insert(&self.id) {
            return Some(&self.id);
        }
        self.children()?
            .iter()
            .find_map(|child| child.collect_ids(seen))
    }
}

/// An ordered forest of root nodes plus the single active node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    pub roots: Vec<TreeNode>,
    active: Option<NodeId>,
}

impl Tree {
    pub fn new(roots: Vec<TreeNode>) -> Self {
        Self {
            roots,
            active: None,
        }
    }

    pub fn find(&self, id: &NodeId) -> Option<&TreeNode> {
        self.roots.iter().find_map(|root| root.find(id))
    }

    pub fn find_mut(&mut self, id: &NodeId) -> Option<&mut TreeNode> {
        self.roots.iter_mut().find_map(|root| root.find_mut(id))
    }

    pub fn active(&self) -> Option<&NodeId> {
        self.active.as_ref()
    }

    pub fn is_active(&self, id: &NodeId) -> bool {
        self.active.as_ref() == Some(id)
    }

    /// Make `id` the active node, deactivating the previous one.
    /// Returns false (and leaves the tree unchanged) if `id` is not present.
    pub fn set_active(&mut self, id: &NodeId) -> bool {
        if self.find(id).is_none() {
            return false;
        }
        self.active = Some(id.clone());
        true
    }

    /// First id that appears twice in the tree, if any.
    pub fn duplicate_id(&self) -> Option<&NodeId> {
        let mut seen = HashSet::new();
        self.roots
            .iter()
            .find_map(|root| root.collect_ids(&mut seen))
    }
}

use super::node::{NodeId, Tree, TreeNode};
use super::select::{combine_states, SelectionState};

/// Load state of a row, as far as rendering cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowLoad {
    /// A file, or a directory whose children are present.
    Ready,
    /// A directory that has never been fetched.
    Unloaded,
    /// A child fetch is in flight.
    Pending,
    /// The last fetch failed.
    Failed(String),
}

/// A flattened representation of a tree node for rendering.
#[derive(Debug, Clone)]
pub struct FlatItem {
    pub id: NodeId,
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub depth: usize,
    pub is_expanded: bool,
    pub is_last_sibling: bool,
    pub is_active: bool,
    pub verified: bool,
    pub size: Option<u64>,
    pub selection: SelectionState,
    pub load: RowLoad,
}

/// Rebuild the visible rows of `tree`, descending only into toggled directories.
///
/// `is_pending` reports whether a child fetch is in flight for a node.
/// Selection states are folded bottom-up in the same walk, so every loaded
/// node is visited once.
pub fn flatten<F>(tree: &Tree, is_pending: F) -> Vec<FlatItem>
where
    F: Fn(&NodeId) -> bool,
{
    let mut items = Vec::new();
    let count = tree.roots.len();
    for (i, root) in tree.roots.iter().enumerate() {
        flatten_node(tree, root, &mut items, true, 0, i + 1 == count, &is_pending);
    }
    items
}

fn row<F>(tree: &Tree, node: &TreeNode, depth: usize, is_last: bool, is_pending: &F) -> FlatItem
where
    F: Fn(&NodeId) -> bool,
{
    let load = if is_pending(&node.id) {
        RowLoad::Pending
    } else if let Some(reason) = node.load_error() {
        RowLoad::Failed(reason.to_string())
    } else if node.is_loaded() {
        RowLoad::Ready
    } else {
        RowLoad::Unloaded
    };

    FlatItem {
        id: node.id.clone(),
        name: node.name.clone(),
        path: node.path.clone(),
        is_dir: node.is_dir(),
        depth,
        is_expanded: node.is_toggled(),
        is_last_sibling: is_last,
        is_active: tree.is_active(&node.id),
        verified: node.verified,
        size: node.size(),
        selection: SelectionState::Unselected,
        load,
    }
}

/// Push the row for `node` (if visible) and its visible descendants, and
/// return the node's selection state. Collapsed subtrees are still walked
/// for their state but produce no rows.
fn flatten_node<F>(
    tree: &Tree,
    node: &TreeNode,
    items: &mut Vec<FlatItem>,
    visible: bool,
    depth: usize,
    is_last: bool,
    is_pending: &F,
) -> SelectionState
where
    F: Fn(&NodeId) -> bool,
{
    let index = visible.then(|| {
        items.push(row(tree, node, depth, is_last, is_pending));
        items.len() - 1
    });

    let open = visible && node.is_toggled();
    let children = node.children().unwrap_or_default();
    let states: Vec<(&TreeNode, SelectionState)> = children
        .iter()
        .enumerate()
        .map(|(i, child)| {
            let last = i + 1 == children.len();
            let state = flatten_node(tree, child, items, open, depth + 1, last, is_pending);
            (child, state)
        })
        .collect();

    let state = combine_states(node, states);
    if let Some(index) = index {
        items[index].selection = state;
    }
    state
}

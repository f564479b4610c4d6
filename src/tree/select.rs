//! Selection cascade and aggregation.
//!
//! Selection flows down only: selecting a directory selects its loaded
//! descendants, and an ancestor's appearance is derived from
//! [`combine_states`] rather than stored.

use super::node::{NodeKind, Tree, TreeNode};

/// Aggregate selection of a subtree, for tri-state markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Unselected,
    Partial,
    Selected,
}

/// Return a copy of `node` with `selected` cascaded to every loaded descendant.
///
/// A node without loaded children that is not verified is always deselected.
pub fn toggle_selection(node: &TreeNode, selected: bool) -> TreeNode {
    let mut out = node.clone();
    apply_selection(&mut out, selected);
    out
}

fn apply_selection(node: &mut TreeNode, selected: bool) {
    if !node.has_children() && !node.verified {
        node.selected = false;
        return;
    }
    node.selected = selected;
    if let Some(children) = node.children_mut() {
        for child in children.iter_mut() {
            apply_selection(child, selected);
        }
    }
}

/// Add one to `running` for every selected node in the subtree.
pub fn count_selection(node: &TreeNode, running: usize) -> usize {
    let own = running + usize::from(node.selected);
    node.children()
        .map(|c| c.iter().fold(own, |acc, child| count_selection(child, acc)))
        .unwrap_or(own)
}

/// Collect selected leaves and selected empty (or undetermined) directories.
///
/// A selected directory with loaded children contributes its selected
/// descendants, never itself.
pub fn find_selected<'a>(node: &'a TreeNode, acc: &mut Vec<&'a TreeNode>) {
    match node.children() {
        Some(children) if !children.is_empty() => {
            for child in children {
                find_selected(child, acc);
            }
        }
        _ => {
            if node.selected {
                acc.push(node);
            }
        }
    }
}

/// Tri-state summary of `node` and its loaded subtree.
#[cfg(test)]
pub fn selection_state(node: &TreeNode) -> SelectionState {
    let children = node.children().unwrap_or_default();
    combine_states(
        node,
        children.iter().map(|child| (child, selection_state(child))),
    )
}

/// Fold a node's own flag with the already computed states of its children.
/// With no children the node's flag alone decides.
pub fn combine_states<'a, I>(node: &TreeNode, children: I) -> SelectionState
where
    I: IntoIterator<Item = (&'a TreeNode, SelectionState)>,
{
    let mut any = node.selected;
    let mut all = true;
    for (child, state) in children {
        match state {
            SelectionState::Selected => any = true,
            SelectionState::Partial => {
                any = true;
                all = false;
            }
            SelectionState::Unselected => {
                // Unverified leaves can never be selected; they don't block "all".
                if !(matches!(child.kind, NodeKind::File { .. }) && !child.verified) {
                    all = false;
                }
            }
        }
    }
    match (any, all) {
        (true, true) => SelectionState::Selected,
        (true, false) => SelectionState::Partial,
        (false, _) => SelectionState::Unselected,
    }
}

/// Selected node count across the forest.
pub fn count_forest(tree: &Tree) -> usize {
    tree.roots
        .iter()
        .fold(0, |acc, root| count_selection(root, acc))
}

/// Flat, ordered selection across the forest.
pub fn selected_items(tree: &Tree) -> Vec<&TreeNode> {
    let mut acc = Vec::new();
    for root in &tree.roots {
        find_selected(root, &mut acc);
    }
    acc
}

/// Copy of `tree` with every selection flag cleared.
pub fn clear_forest(tree: &Tree) -> Tree {
    let mut out = tree.clone();
    for root in out.roots.iter_mut() {
        clear_node(root);
    }
    out
}

fn clear_node(node: &mut TreeNode) {
    node.selected = false;
    if let Some(children) = node.children_mut() {
        children.iter_mut().for_each(clear_node);
    }
}

//! Non-destructive filtering of the dataset tree.
//!
//! Every function here borrows its input and builds a new tree, so the
//! controller's authoritative tree stays untouched while a filter is shown.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use super::node::{Children, NodeKind, Tree, TreeNode};

/// Predicate deciding whether a node matches the filter text.
pub trait Matcher {
    fn matches(&self, filter: &str, node: &TreeNode) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&str, &TreeNode) -> bool,
{
    fn matches(&self, filter: &str, node: &TreeNode) -> bool {
        self(filter, node)
    }
}

/// Case-insensitive substring match on the node name.
#[derive(Debug, Default, Clone, Copy)]
pub struct NameContains;

impl Matcher for NameContains {
    fn matches(&self, filter: &str, node: &TreeNode) -> bool {
        matches(filter, node)
    }
}

/// Skim-style fuzzy match on the node name, ignoring case.
pub struct FuzzyName {
    inner: SkimMatcherV2,
}

impl Default for FuzzyName {
    fn default() -> Self {
        Self {
            inner: SkimMatcherV2::default().ignore_case(),
        }
    }
}

impl Matcher for FuzzyName {
    fn matches(&self, filter: &str, node: &TreeNode) -> bool {
        self.inner.fuzzy_match(&node.name, filter).is_some()
    }
}

/// Which built-in matcher the filter prompt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Substring,
    Fuzzy,
}

impl MatchMode {
    /// Parse from config string; unknown values fall back to substring.
    pub fn from_config(s: &str) -> Self {
        match s {
            "fuzzy" => MatchMode::Fuzzy,
            _ => MatchMode::Substring,
        }
    }

    pub fn next(self) -> Self {
        match self {
            MatchMode::Substring => MatchMode::Fuzzy,
            MatchMode::Fuzzy => MatchMode::Substring,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchMode::Substring => "substring",
            MatchMode::Fuzzy => "fuzzy",
        }
    }

    pub fn matcher(&self) -> Box<dyn Matcher> {
        match self {
            MatchMode::Substring => Box::new(NameContains),
            MatchMode::Fuzzy => Box::new(FuzzyName::default()),
        }
    }
}

/// Default predicate: case-insensitive substring test against the name.
pub fn matches(filter: &str, node: &TreeNode) -> bool {
    node.name.to_lowercase().contains(&filter.to_lowercase())
}

/// True if `node` or any loaded descendant matches.
pub fn find_node(node: &TreeNode, filter: &str, matcher: &dyn Matcher) -> bool {
    matcher.matches(filter, node)
        || node
            .children()
            .is_some_and(|c| c.iter().any(|child| find_node(child, filter, matcher)))
}

/// Prune `node` down to the paths that lead to matches.
///
/// A matching node, a file, or a directory without loaded children is kept
/// verbatim: its contents are either wanted or unknown.
pub fn filter_tree(node: &TreeNode, filter: &str, matcher: &dyn Matcher) -> TreeNode {
    let Some(children) = node.children() else {
        return node.clone();
    };
    if matcher.matches(filter, node) {
        return node.clone();
    }

    let kept = children
        .iter()
        .filter(|child| find_node(child, filter, matcher))
        .map(|child| filter_tree(child, filter, matcher))
        .collect();

    let mut out = shallow_copy(node);
    out.set_children(Children::Loaded(kept));
    out
}

/// Decide `toggled` for a filtered tree: open exactly the directories that
/// lead to a match, collapse everything else.
pub fn expand_filtered_nodes(node: &TreeNode, filter: &str, matcher: &dyn Matcher) -> TreeNode {
    let Some(children) = node.children().filter(|c| !c.is_empty()) else {
        let mut out = node.clone();
        out.set_toggled(false);
        return out;
    };

    let mut should_expand = false;
    let processed = children
        .iter()
        .map(|child| {
            if find_node(child, filter, matcher) {
                should_expand = true;
                expand_filtered_nodes(child, filter, matcher)
            } else {
                collapse_all(child)
            }
        })
        .collect();

    let mut out = shallow_copy(node);
    out.set_children(Children::Loaded(processed));
    out.set_toggled(should_expand);
    out
}

/// Filter and auto-expand a whole forest.
///
/// Roots obey the same rule as children: only roots that match or contain a
/// match survive. The active id is kept if its node survived.
pub fn filter_forest(tree: &Tree, filter: &str, matcher: &dyn Matcher) -> Tree {
    let roots = tree
        .roots
        .iter()
        .filter(|root| find_node(root, filter, matcher))
        .map(|root| {
            let pruned = filter_tree(root, filter, matcher);
            expand_filtered_nodes(&pruned, filter, matcher)
        })
        .collect();

    let mut out = Tree::new(roots);
    if let Some(active) = tree.active() {
        out.set_active(active);
    }
    out
}

/// Number of matching nodes in a (filtered) forest.
pub fn count_matches(tree: &Tree, filter: &str, matcher: &dyn Matcher) -> usize {
    fn walk(node: &TreeNode, filter: &str, matcher: &dyn Matcher) -> usize {
        usize::from(matcher.matches(filter, node))
            + node
                .children()
                .map(|c| c.iter().map(|child| walk(child, filter, matcher)).sum())
                .unwrap_or(0)
    }
    tree.roots
        .iter()
        .map(|root| walk(root, filter, matcher))
        .sum()
}

/// Copy of `node` with its children state left empty-loaded, to be replaced.
fn shallow_copy(node: &TreeNode) -> TreeNode {
    TreeNode {
        id: node.id.clone(),
        name: node.name.clone(),
        path: node.path.clone(),
        kind: match &node.kind {
            NodeKind::File { size } => NodeKind::File { size: *size },
            NodeKind::Directory { toggled, .. } => {
                NodeKind::Directory {
                    children: Children::Loaded(Vec::new()),
                    toggled: *toggled,
                }
            }
        },
        selected: node.selected,
        verified: node.verified,
    }
}

fn collapse_all(node: &TreeNode) -> TreeNode {
    let mut out = node.clone();
    collapse_in_place(&mut out);
    out
}

fn collapse_in_place(node: &mut TreeNode) {
    node.set_toggled(false);
    if let Some(children) = node.children_mut() {
        children.iter_mut().for_each(collapse_in_place);
    }
}

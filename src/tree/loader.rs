//! Authoritative tree ownership and the expand/collapse state machine.
//!
//! The controller never performs I/O itself. Expanding an unloaded directory
//! yields a [`ChildRequest`]; whoever runs the fetch reports back through
//! [`TreeController::finish_children`]. Each request carries a token, and only
//! the latest token issued for a node may apply its response.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::filter::{self, Matcher, NameContains};
use super::node::{Children, NodeId, Tree, TreeNode};
use super::select;
use crate::error::{AppError, FetchError, Result};
use crate::source::DirectorySource;

pub type RequestToken = u64;

/// A child listing the caller must fetch and report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRequest {
    pub node_id: NodeId,
    pub path: String,
    pub token: RequestToken,
}

/// A base-directory listing the caller must fetch and report back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootsRequest {
    pub token: RequestToken,
}

/// What a toggle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Collapsed,
    /// Opened from cached children, no fetch needed.
    Expanded,
    /// Children must be fetched before the node can open.
    Fetch(ChildRequest),
    /// A fetch for this node is already in flight.
    AlreadyPending,
    /// Files don't expand; the node only became active.
    Leaf,
}

/// Whether a fetch response was applied or dropped as superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

/// Owns the authoritative tree and the filtered view derived from it.
pub struct TreeController {
    tree: Tree,
    /// Filtered, auto-expanded derivative shown while a filter is active.
    view: Option<Tree>,
    filter_text: String,
    matcher: Box<dyn Matcher>,
    refetch_on_clear: bool,
    in_flight: HashMap<NodeId, RequestToken>,
    roots_in_flight: Option<RequestToken>,
    next_token: RequestToken,
}

impl Default for TreeController {
    fn default() -> Self {
        Self::new(Box::new(NameContains), true)
    }
}

impl TreeController {
    pub fn new(matcher: Box<dyn Matcher>, refetch_on_clear: bool) -> Self {
        Self {
            tree: Tree::default(),
            view: None,
            filter_text: String::new(),
            matcher,
            refetch_on_clear,
            in_flight: HashMap::new(),
            roots_in_flight: None,
            next_token: 0,
        }
    }

    /// The tree the user is looking at: filtered if a filter is active.
    pub fn displayed(&self) -> &Tree {
        self.view.as_ref().unwrap_or(&self.tree)
    }

    pub fn authoritative(&self) -> &Tree {
        &self.tree
    }

    pub fn is_filtering(&self) -> bool {
        self.view.is_some()
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn is_pending(&self, id: &NodeId) -> bool {
        self.in_flight.contains_key(id)
    }

    pub fn is_loading_roots(&self) -> bool {
        self.roots_in_flight.is_some()
    }

    fn issue_token(&mut self) -> RequestToken {
        self.next_token += 1;
        self.next_token
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.tree.duplicate_id().is_none(),
            "duplicate node id {:?} in authoritative tree",
            self.tree.duplicate_id()
        );
    }

    // ── Roots ────────────────────────────────────────────────────────────

    /// Start a base-directory load. Any earlier roots request becomes stale.
    pub fn begin_load_roots(&mut self) -> RootsRequest {
        let token = self.issue_token();
        self.roots_in_flight = Some(token);
        RootsRequest { token }
    }

    /// Apply a base-directory response.
    ///
    /// On failure the previous forest stays in place and the error is returned.
    pub fn finish_load_roots(
        &mut self,
        request: RootsRequest,
        result: std::result::Result<Vec<TreeNode>, FetchError>,
    ) -> std::result::Result<Completion, FetchError> {
        if self.roots_in_flight != Some(request.token) {
            debug!(token = request.token, "discarding stale base-directory response");
            return Ok(Completion::Stale);
        }
        self.roots_in_flight = None;

        let roots = match result {
            Ok(roots) => roots,
            Err(e) => {
                warn!(error = %e, "base-directory load failed");
                return Err(e);
            }
        };

        let previous = std::mem::take(&mut self.tree);
        let mut roots = roots;
        carry_over(&mut roots, &previous.roots);
        self.tree = Tree::new(roots);
        if let Some(id) = previous.active() {
            self.tree.set_active(id);
        }
        // Outstanding child requests point into the replaced forest.
        self.in_flight.clear();
        self.refresh_view();
        self.check_invariants();
        info!(roots = self.tree.roots.len(), "base directories loaded");
        Ok(Completion::Applied)
    }

    /// Fetch and apply the base directories in one step.
    pub async fn load_roots(
        &mut self,
        source: &dyn DirectorySource,
    ) -> std::result::Result<Completion, FetchError> {
        let request = self.begin_load_roots();
        let result = source.base_directories().await;
        self.finish_load_roots(request, result)
    }

    // ── Expansion ────────────────────────────────────────────────────────

    /// Expand (`desired = true`) or collapse a node in the displayed tree.
    ///
    /// The node becomes the active node either way.
    pub fn toggle(&mut self, id: &NodeId, desired: bool) -> Result<ToggleOutcome> {
        let displayed = match self.view.as_mut() {
            Some(view) => view,
            None => &mut self.tree,
        };
        let node = displayed
            .find_mut(id)
            .ok_or_else(|| AppError::UnknownNode(id.to_string()))?;

        let outcome = if !node.is_dir() {
            ToggleOutcome::Leaf
        } else if !desired {
            node.set_toggled(false);
            if self.in_flight.remove(id).is_some() {
                debug!(node = %id, "collapsed while loading; response will be discarded");
            }
            ToggleOutcome::Collapsed
        } else if self.in_flight.contains_key(id) {
            ToggleOutcome::AlreadyPending
        } else if node.is_loaded() {
            node.set_toggled(true);
            ToggleOutcome::Expanded
        } else {
            let path = node.path.clone();
            let token = self.issue_token();
            self.in_flight.insert(id.clone(), token);
            debug!(node = %id, path = %path, token, "requesting children");
            ToggleOutcome::Fetch(ChildRequest {
                node_id: id.clone(),
                path,
                token,
            })
        };

        self.set_active(id)?;
        Ok(outcome)
    }

    /// Apply a child listing for `request`.
    ///
    /// Responses whose token is no longer the latest for the node are dropped.
    /// On failure the node is left collapsed and re-toggleable.
    pub fn finish_children(
        &mut self,
        request: &ChildRequest,
        result: std::result::Result<Vec<TreeNode>, FetchError>,
    ) -> std::result::Result<Completion, FetchError> {
        if self.in_flight.get(&request.node_id) != Some(&request.token) {
            debug!(
                node = %request.node_id,
                token = request.token,
                "discarding stale child response"
            );
            return Ok(Completion::Stale);
        }
        self.in_flight.remove(&request.node_id);

        match result {
            Ok(children) => {
                let filtering = self.view.is_some();
                if let Some(node) = self
                    .view
                    .as_mut()
                    .and_then(|view| view.find_mut(&request.node_id))
                {
                    node.set_children(Children::Loaded(children.clone()));
                    node.set_toggled(true);
                }
                if let Some(node) = self.tree.find_mut(&request.node_id) {
                    debug!(node = %request.node_id, count = children.len(), "children loaded");
                    node.set_children(Children::Loaded(children));
                    if !filtering {
                        node.set_toggled(true);
                    }
                }
                self.check_invariants();
                Ok(Completion::Applied)
            }
            Err(e) => {
                warn!(node = %request.node_id, error = %e, "child load failed");
                let reason = e.to_string();
                for tree in self.view.iter_mut().chain(std::iter::once(&mut self.tree)) {
                    if let Some(node) = tree.find_mut(&request.node_id) {
                        node.set_children(Children::Failed(reason.clone()));
                        node.set_toggled(false);
                    }
                }
                Err(e)
            }
        }
    }

    /// Toggle open and, if needed, fetch the children in one step.
    pub async fn expand(
        &mut self,
        source: &dyn DirectorySource,
        id: &NodeId,
    ) -> Result<ToggleOutcome> {
        let outcome = self.toggle(id, true)?;
        if let ToggleOutcome::Fetch(request) = &outcome {
            let result = source.child_directories(&request.path).await;
            self.finish_children(request, result)?;
        }
        Ok(outcome)
    }

    /// Make `id` the single active node.
    pub fn set_active(&mut self, id: &NodeId) -> Result<()> {
        if let Some(view) = self.view.as_mut() {
            if !view.set_active(id) {
                return Err(AppError::UnknownNode(id.to_string()));
            }
            self.tree.set_active(id);
            return Ok(());
        }
        if !self.tree.set_active(id) {
            return Err(AppError::UnknownNode(id.to_string()));
        }
        Ok(())
    }

    // ── Filtering ────────────────────────────────────────────────────────

    /// Change the filter text. An empty string clears the filter.
    ///
    /// Clearing returns a roots request when the controller is configured to
    /// re-fetch base directories on clear.
    pub fn set_filter_text(&mut self, text: &str) -> Option<RootsRequest> {
        if text.is_empty() {
            self.filter_text.clear();
            let was_filtering = self.view.take().is_some();
            if was_filtering && self.refetch_on_clear {
                return Some(self.begin_load_roots());
            }
            return None;
        }
        self.filter_text = text.to_string();
        self.refresh_view();
        None
    }

    /// Swap the filter predicate and re-run the active filter.
    pub fn set_matcher(&mut self, matcher: Box<dyn Matcher>) {
        self.matcher = matcher;
        self.refresh_view();
    }

    /// Number of matching nodes in the filtered view.
    pub fn match_count(&self) -> usize {
        match &self.view {
            Some(view) => filter::count_matches(view, &self.filter_text, self.matcher.as_ref()),
            None => 0,
        }
    }

    fn refresh_view(&mut self) {
        if self.filter_text.is_empty() {
            return;
        }
        let view = filter::filter_forest(&self.tree, &self.filter_text, self.matcher.as_ref());
        debug!(filter = %self.filter_text, roots = view.roots.len(), "filter applied");
        self.view = Some(view);
    }

    // ── Selection ────────────────────────────────────────────────────────

    /// Flip the selection of a node in the displayed tree, cascading down.
    ///
    /// Returns the node's resulting state (always false for unverified leaves).
    pub fn toggle_selection(&mut self, id: &NodeId) -> Result<bool> {
        let displayed = match self.view.as_mut() {
            Some(view) => view,
            None => &mut self.tree,
        };
        let node = displayed
            .find_mut(id)
            .ok_or_else(|| AppError::UnknownNode(id.to_string()))?;
        let updated = select::toggle_selection(node, !node.selected);
        let selected = updated.selected;
        *node = updated;

        if let Some(view) = self.view.as_ref() {
            if let (Some(shown), Some(target)) = (view.find(id), self.tree.find_mut(id)) {
                mirror_selection(target, shown);
            }
        }
        debug!(node = %id, selected, "selection toggled");
        Ok(selected)
    }

    pub fn clear_selection(&mut self) {
        self.tree = select::clear_forest(&self.tree);
        self.view = self.view.as_ref().map(select::clear_forest);
    }

    pub fn selected_count(&self) -> usize {
        select::count_forest(self.displayed())
    }

    pub fn selected_items(&self) -> Vec<&TreeNode> {
        select::selected_items(self.displayed())
    }
}

/// Keep selection, loaded subtrees and expansion of nodes that survive a
/// base-directory reload, matched by id.
fn carry_over(fresh: &mut [TreeNode], previous: &[TreeNode]) {
    for node in fresh {
        let Some(old) = previous
            .iter()
            .find(|p| p.id == node.id && p.is_dir() == node.is_dir())
        else {
            continue;
        };
        if let Some(old_children) = old.children() {
            match node.children_mut() {
                Some(children) => carry_over(children, old_children),
                None => node.set_children(Children::Loaded(old_children.to_vec())),
            }
            node.set_toggled(old.is_toggled());
        }
        node.selected = old.selected && (node.verified || node.has_children());
    }
}

/// Copy selection flags from a displayed subtree onto the authoritative one.
/// Children pruned from the displayed subtree keep their flags.
fn mirror_selection(target: &mut TreeNode, shown: &TreeNode) {
    target.selected = shown.selected;
    let (Some(shown_children), Some(target_children)) = (shown.children(), target.children_mut())
    else {
        return;
    };
    for child in shown_children {
        if let Some(t) = target_children.iter_mut().find(|t| t.id == child.id) {
            mirror_selection(t, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Source that serves canned listings and counts calls.
    #[derive(Default)]
    struct ScriptedSource {
        roots: Mutex<Option<std::result::Result<Vec<TreeNode>, FetchError>>>,
        children: Mutex<HashMap<String, std::result::Result<Vec<TreeNode>, FetchError>>>,
        child_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn with_roots(roots: Vec<TreeNode>) -> Self {
            let s = Self::default();
            *s.roots.lock().unwrap() = Some(Ok(roots));
            s
        }

        fn set_children(&self, path: &str, result: std::result::Result<Vec<TreeNode>, FetchError>) {
            self.children.lock().unwrap().insert(path.to_string(), result);
        }
    }

    #[async_trait]
    impl DirectorySource for ScriptedSource {
        fn dataset(&self) -> &str {
            "scripted"
        }

        async fn base_directories(&self) -> std::result::Result<Vec<TreeNode>, FetchError> {
            self.roots.lock().unwrap().clone().unwrap_or_else(|| {
                Err(FetchError::Transport {
                    path: String::new(),
                    reason: "offline".into(),
                })
            })
        }

        async fn child_directories(
            &self,
            dir_path: &str,
        ) -> std::result::Result<Vec<TreeNode>, FetchError> {
            self.child_calls.fetch_add(1, Ordering::SeqCst);
            self.children
                .lock()
                .unwrap()
                .get(dir_path)
                .cloned()
                .unwrap_or_else(|| {
                    Err(FetchError::NotFound {
                        path: dir_path.to_string(),
                    })
                })
        }
    }

    fn roots() -> Vec<TreeNode> {
        vec![
            TreeNode::directory("raw", "raw", "raw"),
            TreeNode::directory("derived", "derived", "derived"),
            TreeNode::file("README.md", "README.md", "README.md"),
        ]
    }

    fn raw_children() -> Vec<TreeNode> {
        vec![
            TreeNode::directory("raw/run1", "run1", "raw/run1"),
            TreeNode::file("raw/keep.txt", "keep.txt", "raw/keep.txt"),
            TreeNode::file("raw/skip.txt", "skip.txt", "raw/skip.txt"),
        ]
    }

    async fn loaded() -> (ScriptedSource, TreeController) {
        let source = ScriptedSource::with_roots(roots());
        source.set_children("raw", Ok(raw_children()));
        let mut ctl = TreeController::default();
        ctl.load_roots(&source).await.unwrap();
        (source, ctl)
    }

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    #[tokio::test]
    async fn load_roots_replaces_forest() {
        let (_source, ctl) = loaded().await;
        assert_eq!(ctl.displayed().roots.len(), 3);
        assert!(!ctl.is_loading_roots());
    }

    #[tokio::test]
    async fn failed_first_load_leaves_empty_tree() {
        let source = ScriptedSource::default();
        let mut ctl = TreeController::default();
        let err = ctl.load_roots(&source).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert!(ctl.displayed().roots.is_empty());
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_forest() {
        let (_source, mut ctl) = loaded().await;
        let req = ctl.begin_load_roots();
        let err = ctl.finish_load_roots(
            req,
            Err(FetchError::Status {
                path: String::new(),
                status: 500,
            }),
        );
        assert!(err.is_err());
        assert_eq!(ctl.displayed().roots.len(), 3);
    }

    #[tokio::test]
    async fn stale_roots_response_is_discarded() {
        let (_source, mut ctl) = loaded().await;
        let first = ctl.begin_load_roots();
        let second = ctl.begin_load_roots();
        let outcome = ctl.finish_load_roots(first, Ok(Vec::new())).unwrap();
        assert_eq!(outcome, Completion::Stale);
        assert_eq!(ctl.displayed().roots.len(), 3);
        let outcome = ctl
            .finish_load_roots(second, Ok(vec![TreeNode::file("x", "x", "x")]))
            .unwrap();
        assert_eq!(outcome, Completion::Applied);
        assert_eq!(ctl.displayed().roots.len(), 1);
    }

    #[tokio::test]
    async fn expanding_unloaded_issues_one_request() {
        let (_source, mut ctl) = loaded().await;
        let first = ctl.toggle(&id("raw"), true).unwrap();
        let ToggleOutcome::Fetch(req) = first else {
            panic!("expected a fetch");
        };
        assert_eq!(req.path, "raw");
        assert!(ctl.is_pending(&id("raw")));

        let second = ctl.toggle(&id("raw"), true).unwrap();
        assert_eq!(second, ToggleOutcome::AlreadyPending);

        let done = ctl.finish_children(&req, Ok(raw_children())).unwrap();
        assert_eq!(done, Completion::Applied);
        let raw = ctl.displayed().find(&id("raw")).unwrap();
        assert!(raw.is_loaded());
        assert!(raw.is_toggled());
        assert_eq!(raw.children().unwrap().len(), 3);
        assert!(!ctl.is_pending(&id("raw")));
    }

    #[tokio::test]
    async fn expand_fetches_once_then_uses_cache() {
        let (source, mut ctl) = loaded().await;
        ctl.expand(&source, &id("raw")).await.unwrap();
        assert_eq!(source.child_calls.load(Ordering::SeqCst), 1);

        assert_eq!(ctl.toggle(&id("raw"), false).unwrap(), ToggleOutcome::Collapsed);
        let again = ctl.expand(&source, &id("raw")).await.unwrap();
        assert_eq!(again, ToggleOutcome::Expanded);
        assert_eq!(source.child_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn collapse_is_idempotent() {
        let (_source, mut ctl) = loaded().await;
        let before = ctl.displayed().find(&id("derived")).unwrap().clone();
        ctl.toggle(&id("derived"), false).unwrap();
        ctl.toggle(&id("derived"), false).unwrap();
        let after = ctl.displayed().find(&id("derived")).unwrap();
        assert_eq!(&before, after);
        assert!(!after.is_toggled());
    }

    #[tokio::test]
    async fn failed_child_load_leaves_node_retoggleable() {
        let (source, mut ctl) = loaded().await;
        let err = ctl.expand(&source, &id("derived")).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(FetchError::NotFound { .. })));

        let node = ctl.displayed().find(&id("derived")).unwrap();
        assert!(!node.is_toggled());
        assert!(!node.is_loaded());
        assert!(node.load_error().is_some());
        assert!(!ctl.is_pending(&id("derived")));

        source.set_children("derived", Ok(Vec::new()));
        ctl.expand(&source, &id("derived")).await.unwrap();
        let node = ctl.displayed().find(&id("derived")).unwrap();
        assert!(node.is_loaded());
        assert!(node.is_toggled());
        assert_eq!(source.child_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn collapse_while_pending_discards_late_response() {
        let (_source, mut ctl) = loaded().await;
        let ToggleOutcome::Fetch(req) = ctl.toggle(&id("raw"), true).unwrap() else {
            panic!("expected fetch");
        };
        ctl.toggle(&id("raw"), false).unwrap();
        let done = ctl.finish_children(&req, Ok(raw_children())).unwrap();
        assert_eq!(done, Completion::Stale);
        assert!(!ctl.displayed().find(&id("raw")).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn only_latest_request_applies() {
        let (_source, mut ctl) = loaded().await;
        let ToggleOutcome::Fetch(old) = ctl.toggle(&id("raw"), true).unwrap() else {
            panic!("expected fetch");
        };
        ctl.toggle(&id("raw"), false).unwrap();
        let ToggleOutcome::Fetch(new) = ctl.toggle(&id("raw"), true).unwrap() else {
            panic!("expected fetch");
        };
        assert!(new.token > old.token);

        assert_eq!(
            ctl.finish_children(&new, Ok(raw_children())).unwrap(),
            Completion::Applied
        );
        assert_eq!(
            ctl.finish_children(&old, Ok(Vec::new())).unwrap(),
            Completion::Stale
        );
        assert_eq!(
            ctl.displayed()
                .find(&id("raw"))
                .unwrap()
                .children()
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn roots_reload_invalidates_pending_children() {
        let (_source, mut ctl) = loaded().await;
        let ToggleOutcome::Fetch(req) = ctl.toggle(&id("raw"), true).unwrap() else {
            panic!("expected fetch");
        };
        let roots_req = ctl.begin_load_roots();
        ctl.finish_load_roots(roots_req, Ok(roots())).unwrap();
        assert_eq!(
            ctl.finish_children(&req, Ok(raw_children())).unwrap(),
            Completion::Stale
        );
    }

    #[tokio::test]
    async fn toggle_moves_active_node() {
        let (_source, mut ctl) = loaded().await;
        ctl.toggle(&id("README.md"), true).unwrap();
        assert!(ctl.displayed().is_active(&id("README.md")));
        ctl.toggle(&id("derived"), false).unwrap();
        assert!(ctl.displayed().is_active(&id("derived")));
        assert!(!ctl.displayed().is_active(&id("README.md")));
    }

    #[tokio::test]
    async fn unknown_node_is_an_error() {
        let (_source, mut ctl) = loaded().await;
        assert!(matches!(
            ctl.toggle(&id("ghost"), true),
            Err(AppError::UnknownNode(_))
        ));
        assert!(ctl.set_active(&id("ghost")).is_err());
    }

    #[tokio::test]
    async fn filter_does_not_touch_authoritative_tree() {
        let (source, mut ctl) = loaded().await;
        ctl.expand(&source, &id("raw")).await.unwrap();
        let before = ctl.authoritative().clone();

        assert!(ctl.set_filter_text("keep").is_none());
        assert!(ctl.is_filtering());
        let shown = ctl.displayed();
        assert!(shown.find(&id("raw/keep.txt")).is_some());
        assert!(shown.find(&id("raw/skip.txt")).is_none());
        assert!(shown.find(&id("derived")).is_none());
        assert_eq!(ctl.match_count(), 1);
        assert_eq!(ctl.authoritative().roots, before.roots);
    }

    #[tokio::test]
    async fn clearing_filter_refetches_roots() {
        let (source, mut ctl) = loaded().await;
        ctl.set_filter_text("keep");
        let req = ctl.set_filter_text("").expect("roots request");
        assert!(!ctl.is_filtering());
        let result = source.base_directories().await;
        ctl.finish_load_roots(req, result).unwrap();
        assert_eq!(ctl.displayed().roots.len(), 3);
    }

    #[tokio::test]
    async fn refetch_on_clear_keeps_selection_and_loaded_subtrees() {
        let (source, mut ctl) = loaded().await;
        ctl.expand(&source, &id("raw")).await.unwrap();
        ctl.set_filter_text("keep");
        assert!(ctl.toggle_selection(&id("raw/keep.txt")).unwrap());

        let req = ctl.set_filter_text("").expect("roots request");
        let result = source.base_directories().await;
        ctl.finish_load_roots(req, result).unwrap();

        let raw = ctl.displayed().find(&id("raw")).unwrap();
        assert!(raw.is_loaded());
        assert!(raw.is_toggled());
        assert!(!raw.selected);
        assert_eq!(ctl.selected_count(), 1);
        let items: Vec<&str> = ctl.selected_items().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(items, vec!["raw/keep.txt"]);
    }

    #[tokio::test]
    async fn reload_drops_state_of_vanished_nodes() {
        let (source, mut ctl) = loaded().await;
        ctl.expand(&source, &id("raw")).await.unwrap();
        ctl.toggle_selection(&id("raw")).unwrap();
        ctl.toggle_selection(&id("derived")).unwrap();

        let req = ctl.begin_load_roots();
        let fresh = vec![
            TreeNode::directory("derived", "derived", "derived"),
            TreeNode::file("README.md", "README.md", "README.md"),
        ];
        ctl.finish_load_roots(req, Ok(fresh)).unwrap();
        assert!(ctl.displayed().find(&id("raw")).is_none());
        assert!(ctl.displayed().find(&id("derived")).unwrap().selected);
        assert_eq!(ctl.selected_count(), 1);
    }

    #[tokio::test]
    async fn filter_change_while_child_fetch_outstanding() {
        let (_source, mut ctl) = loaded().await;
        ctl.set_filter_text("raw");
        let ToggleOutcome::Fetch(req) = ctl.toggle(&id("raw"), true).unwrap() else {
            panic!("expected fetch");
        };
        ctl.set_filter_text("ra");
        assert!(ctl.is_pending(&id("raw")));

        let done = ctl.finish_children(&req, Ok(raw_children())).unwrap();
        assert_eq!(done, Completion::Applied);
        assert!(!ctl.is_pending(&id("raw")));
        assert!(ctl.authoritative().find(&id("raw")).unwrap().is_loaded());
        assert!(ctl.displayed().find(&id("raw")).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn response_for_node_pruned_from_view_reaches_authoritative_tree() {
        let (_source, mut ctl) = loaded().await;
        ctl.set_filter_text("raw");
        let ToggleOutcome::Fetch(req) = ctl.toggle(&id("raw"), true).unwrap() else {
            panic!("expected fetch");
        };
        ctl.set_filter_text("derived");
        assert!(ctl.displayed().find(&id("raw")).is_none());

        let done = ctl.finish_children(&req, Ok(raw_children())).unwrap();
        assert_eq!(done, Completion::Applied);
        assert!(!ctl.is_pending(&id("raw")));
        assert!(ctl.authoritative().find(&id("raw/keep.txt")).is_some());

        ctl.set_filter_text("keep");
        assert!(ctl.displayed().find(&id("raw/keep.txt")).is_some());
    }

    #[tokio::test]
    async fn clearing_filter_without_refetch_restores_expansion() {
        let source = ScriptedSource::with_roots(roots());
        source.set_children("raw", Ok(raw_children()));
        let mut ctl = TreeController::new(Box::new(NameContains), false);
        ctl.load_roots(&source).await.unwrap();
        ctl.expand(&source, &id("raw")).await.unwrap();
        ctl.toggle(&id("raw"), false).unwrap();

        ctl.set_filter_text("keep");
        assert!(ctl.displayed().find(&id("raw")).unwrap().is_toggled());
        assert!(ctl.set_filter_text("").is_none());
        assert!(!ctl.displayed().find(&id("raw")).unwrap().is_toggled());
    }

    #[tokio::test]
    async fn children_loaded_under_filter_reach_both_trees() {
        let (source, mut ctl) = loaded().await;
        ctl.set_filter_text("raw");
        let outcome = ctl.expand(&source, &id("raw")).await.unwrap();
        assert!(matches!(outcome, ToggleOutcome::Fetch(_)));
        assert!(ctl.displayed().find(&id("raw/keep.txt")).is_some());
        assert!(ctl.authoritative().find(&id("raw/keep.txt")).is_some());
        assert!(ctl.displayed().find(&id("raw")).unwrap().is_toggled());
    }

    #[tokio::test]
    async fn selection_cascades_and_counts() {
        let (source, mut ctl) = loaded().await;
        ctl.expand(&source, &id("raw")).await.unwrap();
        assert!(ctl.toggle_selection(&id("raw")).unwrap());
        assert_eq!(ctl.selected_count(), 4);
        let items: Vec<&str> = ctl.selected_items().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(items, vec!["raw/run1", "raw/keep.txt", "raw/skip.txt"]);

        assert!(!ctl.toggle_selection(&id("raw")).unwrap());
        assert_eq!(ctl.selected_count(), 0);
    }

    #[tokio::test]
    async fn unverified_leaf_cannot_be_selected() {
        let source = ScriptedSource::with_roots(vec![
            TreeNode::file("locked.bin", "locked.bin", "locked.bin").with_verified(false)
        ]);
        let mut ctl = TreeController::default();
        ctl.load_roots(&source).await.unwrap();
        assert!(!ctl.toggle_selection(&id("locked.bin")).unwrap());
        assert_eq!(ctl.selected_count(), 0);
    }

    #[tokio::test]
    async fn selection_under_filter_survives_filter_change() {
        let source = ScriptedSource::with_roots(roots());
        source.set_children("raw", Ok(raw_children()));
        let mut ctl = TreeController::new(Box::new(NameContains), false);
        ctl.load_roots(&source).await.unwrap();
        ctl.expand(&source, &id("raw")).await.unwrap();

        ctl.set_filter_text("keep");
        ctl.toggle_selection(&id("raw")).unwrap();
        // Only the visible child was selected.
        assert_eq!(ctl.selected_count(), 2);
        let auth = ctl.authoritative();
        assert!(auth.find(&id("raw/keep.txt")).unwrap().selected);
        assert!(!auth.find(&id("raw/skip.txt")).unwrap().selected);

        ctl.set_filter_text("");
        assert_eq!(ctl.selected_count(), 2);
        ctl.clear_selection();
        assert_eq!(ctl.selected_count(), 0);
    }
}

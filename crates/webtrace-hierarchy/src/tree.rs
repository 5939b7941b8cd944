use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use webtrace_core::Table;
use webtrace_rules::entry_path;

use crate::HierarchyError;
use crate::options::BuildOptions;

pub const ROOT_NAME: &str = "/";
const EMPTY_SEGMENT: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNode {
    pub name: String,
    pub count: u64,
    pub is_activity: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl PageNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in first-seen order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub entries: usize,
    pub page_loads: usize,
    pub malformed: usize,
    pub max_count: u64,
}

/// Prefix tree of URL path segments with visit counts.
///
/// Nodes live in an arena; detaching a node only unlinks it from its parent,
/// so ids stay valid for the lifetime of the tree.
#[derive(Debug, Clone)]
pub struct PageTree {
    nodes: Vec<PageNode>,
    index: HashMap<(NodeId, String), NodeId>,
    max_count: u64,
}

impl Default for PageTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Segments of a path below the root; empty segments become `-`.
pub fn path_segments(path: &str) -> Vec<String> {
    let relative = path.strip_prefix('/').unwrap_or(path);
    relative
        .split('/')
        .map(|segment| {
            if segment.is_empty() {
                EMPTY_SEGMENT.to_owned()
            } else {
                segment.to_owned()
            }
        })
        .collect()
}

impl PageTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![PageNode {
                name: ROOT_NAME.to_owned(),
                count: 0,
                is_activity: false,
                parent: None,
                children: Vec::new(),
            }],
            index: HashMap::new(),
            max_count: 0,
        }
    }

    /// Builds the tree from raw entries such as `loading of page /blog/post-1`.
    /// Entries without the page-load marker are ignored; page loads without a
    /// path are logged and skipped.
    pub fn build<'a>(
        entries: impl IntoIterator<Item = &'a str>,
        options: &BuildOptions,
    ) -> (Self, BuildReport) {
        let mut tree = Self::new();
        let mut report = BuildReport::default();

        for (row, entry) in entries.into_iter().enumerate() {
            report.entries += 1;
            if !entry.contains(options.entry_marker.as_str()) {
                continue;
            }
            let Some(path) = entry_path(entry) else {
                let err = HierarchyError::MalformedEntry {
                    row,
                    entry: entry.to_owned(),
                };
                tracing::warn!(error = %err, "skipping page load");
                report.malformed += 1;
                continue;
            };
            report.page_loads += 1;
            tree.visit(&path_segments(path), options);
        }

        report.max_count = tree.max_count;
        tracing::debug!(
            entries = report.entries,
            page_loads = report.page_loads,
            malformed = report.malformed,
            nodes = tree.len(),
            "built page hierarchy"
        );
        (tree, report)
    }

    pub fn build_from_table(
        table: &Table,
        entry_attr: &str,
        options: &BuildOptions,
    ) -> Result<(Self, BuildReport), HierarchyError> {
        table.require_column(entry_attr)?;
        let entries: Vec<String> = table
            .rows()
            .iter()
            .map(|row| row.get(entry_attr).to_string())
            .collect();
        Ok(Self::build(entries.iter().map(String::as_str), options))
    }

    fn visit(&mut self, segments: &[String], options: &BuildOptions) {
        let mut current = self.root();
        for segment in segments {
            let key = (current, segment.clone());
            if let Some(existing) = self.index.get(&key) {
                current = *existing;
                continue;
            }
            let stop = options
                .pre_pruning
                .as_ref()
                .is_some_and(|pre_pruning| pre_pruning.stops_at(&self.nodes[current.0].name, segment));
            if stop {
                break;
            }
            let child = self.push_child(current, segment.clone());
            self.index.insert(key, child);
            current = child;
        }

        let node = &mut self.nodes[current.0];
        node.count += 1;
        self.max_count = self.max_count.max(node.count);
    }

    fn push_child(&mut self, parent: NodeId, name: String) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(PageNode {
            name,
            count: 0,
            is_activity: false,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &PageNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut PageNode {
        &mut self.nodes[id.0]
    }

    /// Highest visit count seen while building.
    pub fn max_count(&self) -> u64 {
        self.max_count
    }

    /// Number of nodes reachable from the root, root included.
    pub fn len(&self) -> usize {
        self.post_order().len()
    }

    pub fn is_empty(&self) -> bool {
        self.node(self.root()).is_leaf()
    }

    /// Follows child names from the root, e.g. `find(&["a", "b"])`.
    pub fn find(&self, names: &[&str]) -> Option<NodeId> {
        names.iter().try_fold(self.root(), |current, name| {
            self.node(current)
                .children
                .iter()
                .copied()
                .find(|child| self.node(*child).name == *name)
        })
    }

    pub fn child_names(&self, id: NodeId) -> Vec<&str> {
        self.node(id)
            .children
            .iter()
            .map(|child| self.node(*child).name.as_str())
            .collect()
    }

    /// Children before parents, siblings in order.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root(), false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for child in self.node(id).children.iter().rev() {
                stack.push((*child, false));
            }
        }
        order
    }

    /// `/a/b` for the node reached through `a` then `b`; empty for the root.
    pub fn full_path(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            if node.parent.is_some() {
                names.push(node.name.as_str());
            }
            current = node.parent;
        }
        names
            .iter()
            .rev()
            .fold(String::new(), |mut path, name| {
                path.push('/');
                path.push_str(name);
                path
            })
    }

    pub(crate) fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    /// Moves every child of `id` to the end of `new_parent`'s children.
    pub(crate) fn reparent_children(&mut self, id: NodeId, new_parent: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in &children {
            self.nodes[child.0].parent = Some(new_parent);
        }
        self.nodes[new_parent.0].children.extend(children);
    }

    /// Drops every non-root node visited fewer than `min_count` times whose
    /// subtree kept nothing. Pruning twice with the same threshold changes
    /// nothing the second time.
    pub fn post_prune(&mut self, min_count: u64) -> usize {
        let mut removed = 0;
        for id in self.post_order() {
            let node = self.node(id);
            if node.parent.is_some() && node.count < min_count && node.is_leaf() {
                self.detach(id);
                removed += 1;
            }
        }
        tracing::debug!(min_count, removed, "post-pruned page hierarchy");
        removed
    }

    /// Indented `name (count)` listing; activity nodes are starred.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.root(), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            out.push_str(&"  ".repeat(depth));
            out.push_str(&node.name);
            out.push_str(&format!(" ({})", node.count));
            if node.is_activity {
                out.push_str(" *");
            }
            out.push('\n');
            for child in node.children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }
}

impl fmt::Display for PageTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PrePruning;

    fn page_loads(paths: &[&str]) -> Vec<String> {
        paths
            .iter()
            .map(|path| format!("loading of page {path}"))
            .collect()
    }

    fn build(paths: &[&str], options: &BuildOptions) -> (PageTree, BuildReport) {
        let entries = page_loads(paths);
        PageTree::build(entries.iter().map(String::as_str), options)
    }

    fn count_of(tree: &PageTree, names: &[&str]) -> u64 {
        tree.node(tree.find(names).expect("node")).count
    }

    #[test]
    fn single_visits_build_the_expected_shape() {
        let (mut tree, report) = build(&["/a/b/x", "/a/b/y", "/a/c/z"], &BuildOptions::default());

        tree.post_prune(1);

        assert_eq!(report.page_loads, 3);
        assert_eq!(tree.child_names(tree.root()), vec!["a"]);
        let a = tree.find(&["a"]).expect("a");
        assert_eq!(tree.child_names(a), vec!["b", "c"]);
        assert_eq!(tree.child_names(tree.find(&["a", "b"]).expect("b")), vec!["x", "y"]);
        assert_eq!(tree.child_names(tree.find(&["a", "c"]).expect("c")), vec!["z"]);
        assert_eq!(count_of(&tree, &["a", "b", "x"]), 1);
        assert_eq!(count_of(&tree, &["a", "b", "y"]), 1);
        assert_eq!(count_of(&tree, &["a", "c", "z"]), 1);
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn same_name_under_different_parents_are_distinct_nodes() {
        let (tree, _) = build(&["/a/item", "/b/item", "/a/item"], &BuildOptions::default());

        let under_a = tree.find(&["a", "item"]).expect("a/item");
        let under_b = tree.find(&["b", "item"]).expect("b/item");

        assert_ne!(under_a, under_b);
        assert_eq!(tree.node(under_a).count, 2);
        assert_eq!(tree.node(under_b).count, 1);
        assert_eq!(tree.max_count(), 2);
    }

    #[test]
    fn empty_segments_become_placeholders() {
        assert_eq!(path_segments("/blog/"), vec!["blog", "-"]);
        assert_eq!(path_segments("/"), vec!["-"]);
        assert_eq!(path_segments("/a//b"), vec!["a", "-", "b"]);
    }

    #[test]
    fn non_page_entries_are_ignored_and_malformed_ones_counted() {
        let entries = [
            "loading of page /a",
            "click on search",
            "loading of page",
            "loading of page index.html",
        ];
        let options = BuildOptions::default().with_marker("loading of page");

        let (tree, report) = PageTree::build(entries, &options);

        assert_eq!(report.entries, 4);
        assert_eq!(report.page_loads, 1);
        assert_eq!(report.malformed, 2);
        assert_eq!(tree.child_names(tree.root()), vec!["a"]);
    }

    #[test]
    fn pre_pruning_collapses_aggregation_nodes_and_pagination() {
        let pre_pruning = PrePruning::new(
            &["blog".to_owned()],
            &["author".to_owned()],
            &["page".to_owned()],
        )
        .expect("pre-pruning");
        let options = BuildOptions::default().with_pre_pruning(pre_pruning);

        let (tree, _) = build(
            &[
                "/blog/post-1",
                "/blog/post-2/comments",
                "/blog/author/jane",
                "/news/page/2",
            ],
            &options,
        );

        assert_eq!(count_of(&tree, &["blog"]), 2);
        assert_eq!(tree.child_names(tree.find(&["blog"]).expect("blog")), vec!["author"]);
        assert_eq!(count_of(&tree, &["blog", "author", "jane"]), 1);
        assert_eq!(count_of(&tree, &["news"]), 1);
        assert!(tree.find(&["news", "page"]).is_none());
    }

    #[test]
    fn post_prune_drops_rare_leaves_and_is_idempotent() {
        let (mut tree, _) = build(
            &["/a/x", "/a/x", "/a/y", "/b", "/b", "/c"],
            &BuildOptions::default(),
        );

        let removed = tree.post_prune(2);
        let once = tree.render();
        let removed_again = tree.post_prune(2);

        assert_eq!(removed, 2);
        assert_eq!(removed_again, 0);
        assert_eq!(tree.render(), once);
        assert_eq!(tree.child_names(tree.root()), vec!["a", "b"]);
        assert_eq!(tree.child_names(tree.find(&["a"]).expect("a")), vec!["x"]);
    }

    #[test]
    fn pre_pruned_counts_feed_post_pruning() {
        let paths = [
            "/blog/post-1",
            "/blog/post-2",
            "/blog/post-3",
            "/shop/item-1",
            "/shop/item-2",
            "/shop/item-3",
        ];
        let pre_pruning = PrePruning::new(&["blog".to_owned()], &[], &[]).expect("pre-pruning");
        let (mut pruned, _) = build(&paths, &BuildOptions::default().with_pre_pruning(pre_pruning));
        let (mut plain, _) = build(&paths, &BuildOptions::default());

        pruned.post_prune(2);
        plain.post_prune(2);

        assert_eq!(pruned.child_names(pruned.root()), vec!["blog"]);
        assert_eq!(count_of(&pruned, &["blog"]), 3);
        assert!(pruned.node(pruned.find(&["blog"]).expect("blog")).is_leaf());
        assert!(plain.node(plain.root()).is_leaf());
    }

    #[test]
    fn render_lists_nodes_depth_first() {
        let (tree, _) = build(&["/a/b", "/c"], &BuildOptions::default());

        assert_eq!(tree.render(), "/ (0)\n  a (0)\n    b (1)\n  c (1)\n");
        assert_eq!(tree.full_path(tree.find(&["a", "b"]).expect("b")), "/a/b");
        assert_eq!(tree.full_path(tree.root()), "");
    }

    #[test]
    fn table_entries_feed_the_build() {
        let table = Table::new(vec![
            [("ua_name", "loading of page /a")].into_iter().collect(),
            [("ua_name", "loading of page /a")].into_iter().collect(),
        ]);

        let (tree, report) =
            PageTree::build_from_table(&table, "ua_name", &BuildOptions::default()).expect("build");

        assert_eq!(report.max_count, 2);
        assert_eq!(count_of(&tree, &["a"]), 2);
        assert!(PageTree::build_from_table(&table, "entry", &BuildOptions::default()).is_err());
    }
}

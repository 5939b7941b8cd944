use regex::Regex;
use webtrace_config::HierarchyConfig;
use webtrace_rules::{Rule, RulePair, Ruleset, title_case};

use crate::tree::{NodeId, PageTree};
use crate::{HierarchyError, whole_name_pattern};

#[derive(Debug, Clone)]
pub struct MiningOptions {
    /// A node needs strictly more children than this to become an activity.
    pub min_children: usize,
    exclusions: Vec<(Regex, Regex)>,
    fallback_rules: Vec<RulePair>,
}

impl MiningOptions {
    pub fn new(min_children: usize) -> Self {
        Self {
            min_children,
            exclusions: Vec::new(),
            fallback_rules: Vec::new(),
        }
    }

    pub fn from_config(config: &HierarchyConfig) -> Result<Self, HierarchyError> {
        let mut options = Self::new(config.min_children);
        for entry in &config.exclusions.entries {
            options = options.exclude(&entry.parent, &entry.child)?;
        }
        for rule in &config.fallback_rules {
            options = options.fallback(&rule.pattern, &rule.activity);
        }
        Ok(options)
    }

    /// Never promote a node named like `child` below a parent named like
    /// `parent`.
    pub fn exclude(mut self, parent: &str, child: &str) -> Result<Self, HierarchyError> {
        self.exclusions
            .push((whole_name_pattern(parent)?, whole_name_pattern(child)?));
        Ok(self)
    }

    pub fn fallback(mut self, pattern: &str, activity: &str) -> Self {
        self.fallback_rules.push(RulePair {
            pattern: pattern.to_owned(),
            activity: activity.to_owned(),
        });
        self
    }

    fn is_excluded(&self, parent: &str, child: &str) -> bool {
        self.exclusions
            .iter()
            .any(|(parent_re, child_re)| parent_re.is_match(parent) && child_re.is_match(child))
    }
}

impl Default for MiningOptions {
    fn default() -> Self {
        // The default configuration only holds compilable patterns.
        Self::from_config(&HierarchyConfig::default())
            .unwrap_or_else(|_| Self::new(webtrace_config::DEFAULT_MIN_CHILDREN))
    }
}

impl PageTree {
    /// Promotes high fan-out nodes to activities and derives one rule per
    /// activity, followed by the fallback rules.
    ///
    /// Promoted nodes drop their non-activity children. Other nodes hand their
    /// children to their parent, so the tree flattens towards the activities.
    pub fn mine_rules(&mut self, options: &MiningOptions) -> Result<Ruleset, HierarchyError> {
        let mut rules = Vec::new();

        for id in self.post_order() {
            self.node_mut(id).is_activity = false;
            let Some(parent) = self.node(id).parent() else {
                continue;
            };

            if self.node(id).children().len() > options.min_children {
                if options.is_excluded(&self.node(parent).name, &self.node(id).name) {
                    continue;
                }
                rules.push(self.promote(id)?);
            } else {
                self.reparent_children(id, parent);
            }
        }

        for fallback in &options.fallback_rules {
            rules.push(Rule::new(
                fallback.pattern.clone(),
                Some(fallback.activity.clone()),
            )?);
        }
        tracing::debug!(rules = rules.len(), "mined activity rules");
        Ok(Ruleset::new(rules))
    }

    fn promote(&mut self, id: NodeId) -> Result<Rule, HierarchyError> {
        // Matches the node itself and its descendants, never a sibling sharing its prefix.
        let pattern = format!("{}(?:/|$)", regex::escape(&self.full_path(id)));
        let activity = format!("Visit {}", title_case(&self.node(id).name));

        self.node_mut(id).is_activity = true;
        let discarded: Vec<NodeId> = self
            .node(id)
            .children()
            .iter()
            .copied()
            .filter(|child| !self.node(*child).is_activity)
            .collect();
        for child in discarded {
            self.detach(child);
        }

        Ok(Rule::new(pattern, Some(activity))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::BuildOptions;

    fn tree(paths: &[&str]) -> PageTree {
        let entries: Vec<String> = paths
            .iter()
            .map(|path| format!("loading of page {path}"))
            .collect();
        PageTree::build(entries.iter().map(String::as_str), &BuildOptions::default()).0
    }

    #[test]
    fn wide_nodes_become_activities_with_wildcard_rules() {
        let mut tree = tree(&["/blog/a", "/blog/b", "/blog/c", "/about"]);

        let rules = tree.mine_rules(&MiningOptions::default()).expect("mine");

        let blog = tree.find(&["blog"]).expect("blog");
        assert!(tree.node(blog).is_activity);
        assert!(tree.node(blog).is_leaf());
        assert_eq!(rules.rules()[0].pattern(), "/blog(?:/|$)");
        assert_eq!(rules.classify("/blog/a").expect("blog"), "Visit Blog");
        assert_eq!(rules.classify("/about").expect("home"), "View homepage");
        assert_eq!(
            rules.classify("/perform-2020").expect("perform"),
            "View Perform-Conference Details"
        );
    }

    #[test]
    fn narrow_nodes_splice_children_into_their_parent() {
        let mut tree = tree(&["/a/b/x"]);

        let rules = tree
            .mine_rules(&MiningOptions::new(5).fallback("/.*", "View homepage"))
            .expect("mine");

        assert_eq!(tree.child_names(tree.root()), vec!["a", "b", "x"]);
        assert!(tree.node(tree.find(&["a"]).expect("a")).is_leaf());
        assert_eq!(tree.node(tree.find(&["x"]).expect("x")).count, 1);
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn spliced_grandchildren_can_trigger_promotion() {
        let mut tree = tree(&["/a/b/x", "/a/b/y", "/a/c/z"]);
        tree.post_prune(1);

        let rules = tree.mine_rules(&MiningOptions::new(2)).expect("mine");

        let pairs = rules.to_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].pattern, "/a(?:/|$)");
        assert_eq!(pairs[0].activity, "Visit A");
        assert!(tree.node(tree.find(&["a"]).expect("a")).is_leaf());
    }

    #[test]
    fn exclusions_leave_matching_nodes_untouched() {
        let mut tree = tree(&[
            "/technologies/apm-monitoring/a",
            "/technologies/apm-monitoring/b",
            "/technologies/apm-monitoring/c",
            "/perform-2020/x",
            "/perform-2020/y",
            "/perform-2020/z",
        ]);

        let rules = tree.mine_rules(&MiningOptions::default()).expect("mine");

        assert!(rules
            .to_pairs()
            .iter()
            .all(|pair| !pair.pattern.contains("monitoring") && !pair.pattern.contains("2020")));
        let perform = tree.find(&["perform-2020"]).expect("perform");
        assert!(!tree.node(perform).is_activity);
        assert_eq!(tree.child_names(perform), vec!["x", "y", "z"]);
        let monitoring = tree.find(&["apm-monitoring"]).expect("spliced to root");
        assert_eq!(tree.node(monitoring).children().len(), 3);
    }

    #[test]
    fn promoted_rules_do_not_capture_prefix_siblings() {
        let mut tree = tree(&["/a/x", "/a/y", "/a/z", "/about"]);

        let rules = tree
            .mine_rules(&MiningOptions::new(2).fallback("/.*", "View homepage"))
            .expect("mine");

        assert_eq!(rules.classify("/a/x").expect("child"), "Visit A");
        assert_eq!(rules.classify("/a").expect("node"), "Visit A");
        assert_eq!(rules.classify("/about").expect("sibling"), "View homepage");
        assert_eq!(rules.classify("/apple").expect("sibling"), "View homepage");
    }

    #[test]
    fn promoted_paths_are_escaped_literally() {
        let mut tree = tree(&["/c++/a", "/c++/b", "/c++/c"]);

        let rules = tree.mine_rules(&MiningOptions::new(2)).expect("mine");

        assert_eq!(rules.classify("/c++/a").expect("c++"), "Visit C++");
        assert!(rules.classify("/cc/a").is_err());
    }

    #[test]
    fn mining_is_deterministic() {
        let paths = [
            "/blog/a", "/blog/b", "/blog/c", "/docs/x/1", "/docs/y/2", "/docs/z/3", "/docs/z/4",
        ];
        let run = || {
            let mut tree = tree(&paths);
            tree.post_prune(1);
            let rules = tree.mine_rules(&MiningOptions::default()).expect("mine");
            (tree.render(), rules.to_pairs())
        };

        assert_eq!(run(), run());
    }
}

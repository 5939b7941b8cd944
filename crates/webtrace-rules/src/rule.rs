use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::RuleError;

/// A path pattern and the activity it stands for.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: String,
    activity: String,
    regex: Regex,
}

impl Rule {
    /// Compiles `pattern` anchored at the start of the path. Without an explicit
    /// activity name the rule is called `View <Pattern>`.
    pub fn new(pattern: impl Into<String>, activity: Option<String>) -> Result<Self, RuleError> {
        let pattern = pattern.into();
        let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|source| {
            RuleError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            }
        })?;
        let activity = activity
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("View {}", title_case(&pattern)));
        Ok(Self {
            pattern,
            activity,
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn activity(&self) -> &str {
        &self.activity
    }

    /// Number of path separators in the pattern; deeper patterns win.
    pub fn priority(&self) -> usize {
        self.pattern.matches('/').count()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Serialized form of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePair {
    pub pattern: String,
    pub activity: String,
}

/// Rules ordered by descending priority; equal priorities keep their
/// declared order.
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    rules: Vec<Rule>,
}

impl Ruleset {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(|rule| std::cmp::Reverse(rule.priority()));
        Self { rules }
    }

    pub fn from_pairs(pairs: Vec<RulePair>) -> Result<Self, RuleError> {
        let rules = pairs
            .into_iter()
            .map(|pair| Rule::new(pair.pattern, Some(pair.activity)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Pairs in priority order.
    pub fn to_pairs(&self) -> Vec<RulePair> {
        self.rules
            .iter()
            .map(|rule| RulePair {
                pattern: rule.pattern.clone(),
                activity: rule.activity.clone(),
            })
            .collect()
    }

    pub fn from_json(raw: &str) -> Result<Self, RuleError> {
        let pairs: Vec<RulePair> = serde_json::from_str(raw)
            .map_err(|err| RuleError::Core(webtrace_core::CoreError::Json(err)))?;
        Self::from_pairs(pairs)
    }

    pub fn to_json(&self) -> Result<String, RuleError> {
        serde_json::to_string_pretty(&self.to_pairs())
            .map_err(|err| RuleError::Core(webtrace_core::CoreError::Json(err)))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
        self.rules.sort_by_key(|rule| std::cmp::Reverse(rule.priority()));
    }

    pub fn classify(&self, path: &str) -> Result<&str, RuleError> {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(Rule::activity)
            .ok_or_else(|| RuleError::NoMatchingRule {
                path: path.to_owned(),
            })
    }

    /// Classifies the path carried by a raw log entry such as
    /// `loading of page /blog/post-1`.
    pub fn entry_to_activity(&self, entry: &str) -> Result<&str, RuleError> {
        let path = entry_path(entry).ok_or_else(|| RuleError::MissingPath {
            entry: entry.to_owned(),
        })?;
        self.classify(path)
    }
}

/// Last whitespace-separated token of an entry, when it is a path.
pub fn entry_path(entry: &str) -> Option<&str> {
    entry
        .split_whitespace()
        .next_back()
        .filter(|token| token.starts_with('/'))
}

/// Uppercases the first letter of every alphabetic run and lowercases the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut inside_word = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if inside_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            inside_word = true;
        } else {
            out.push(ch);
            inside_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, activity: &str) -> Rule {
        Rule::new(pattern, Some(activity.to_owned())).expect("rule")
    }

    #[test]
    fn default_activity_name_is_title_cased_pattern() {
        let rule = Rule::new("/contact-us", None).expect("rule");

        assert_eq!(rule.activity(), "View /Contact-Us");
        assert_eq!(title_case("technologies/APM"), "Technologies/Apm");
        assert_eq!(title_case("perform2go"), "Perform2Go");
    }

    #[test]
    fn priority_counts_separators() {
        assert_eq!(rule("/.*", "home").priority(), 1);
        assert_eq!(rule("/blog/news/*", "news").priority(), 3);
    }

    #[test]
    fn patterns_match_from_the_start_of_the_path() {
        let blog = rule("/blog/*", "Visit Blog");

        assert!(blog.matches("/blog/post-1"));
        assert!(!blog.matches("/en/blog/post-1"));
    }

    #[test]
    fn deeper_rules_win_regardless_of_declared_order() {
        let shallow_first = Ruleset::new(vec![
            rule("/.*", "View homepage"),
            rule("/blog/*", "Visit Blog"),
            rule("/blog/news/*", "Visit News"),
        ]);
        let deep_first = Ruleset::new(vec![
            rule("/blog/news/*", "Visit News"),
            rule("/blog/*", "Visit Blog"),
            rule("/.*", "View homepage"),
        ]);

        for ruleset in [&shallow_first, &deep_first] {
            assert_eq!(ruleset.classify("/blog/news/today").expect("news"), "Visit News");
            assert_eq!(ruleset.classify("/blog/post").expect("blog"), "Visit Blog");
            assert_eq!(ruleset.classify("/pricing").expect("home"), "View homepage");
        }
    }

    #[test]
    fn equal_priorities_keep_declared_order() {
        let ruleset = Ruleset::new(vec![
            rule("/perform-?\\w*", "View Perform-Conference Details"),
            rule("/.*", "View homepage"),
        ]);

        assert_eq!(
            ruleset.classify("/perform-2020").expect("perform"),
            "View Perform-Conference Details"
        );
        assert_eq!(ruleset.classify("/about").expect("home"), "View homepage");
    }

    #[test]
    fn unmatched_path_is_an_error() {
        let ruleset = Ruleset::new(vec![rule("/blog/*", "Visit Blog")]);

        assert!(matches!(
            ruleset.classify("/shop"),
            Err(RuleError::NoMatchingRule { path }) if path == "/shop"
        ));
    }

    #[test]
    fn entries_are_classified_by_their_trailing_path() {
        let ruleset = Ruleset::new(vec![rule("/blog/*", "Visit Blog"), rule("/.*", "View homepage")]);

        assert_eq!(
            ruleset
                .entry_to_activity("loading of page /blog/post-1")
                .expect("activity"),
            "Visit Blog"
        );
        assert!(matches!(
            ruleset.entry_to_activity("click on button"),
            Err(RuleError::MissingPath { .. })
        ));
        assert_eq!(entry_path("   "), None);
    }

    #[test]
    fn json_pairs_restore_an_equivalent_ruleset() {
        let ruleset = Ruleset::new(vec![rule("/.*", "View homepage"), rule("/blog/*", "Visit Blog")]);

        let raw = ruleset.to_json().expect("to json");
        let restored = Ruleset::from_json(&raw).expect("from json");

        assert_eq!(restored.to_pairs(), ruleset.to_pairs());
        assert_eq!(restored.to_pairs()[0].pattern, "/blog/*");
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(matches!(
            Rule::new("/blog/(", None),
            Err(RuleError::InvalidPattern { .. })
        ));
    }
}

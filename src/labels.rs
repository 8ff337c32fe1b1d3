//! Hiding pull requests by label.

use std::collections::{HashMap, HashSet};

use crate::models::{Label, PullRequest};

/// A label as it appears across a set of pull requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCount {
    pub name: String,
    pub color: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSummary {
    /// Distinct labels in order of first appearance, compared case-insensitively.
    pub labels: Vec<LabelCount>,
    pub unlabeled: usize,
}

pub fn summarize_labels(pull_requests: &[PullRequest]) -> LabelSummary {
    let mut summary = LabelSummary::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for pr in pull_requests {
        if pr.labels.is_empty() {
            summary.unlabeled += 1;
            continue;
        }

        for label in &pr.labels {
            let key = label.name.to_lowercase();
            match positions.get(&key) {
                Some(&position) => summary.labels[position].count += 1,
                None => {
                    positions.insert(key, summary.labels.len());
                    summary.labels.push(LabelCount {
                        name: label.name.clone(),
                        color: label.color.clone(),
                        count: 1,
                    });
                }
            }
        }
    }

    summary
}

/// Which pull requests are hidden from view.
///
/// Hidden label names are kept lower-cased.
#[derive(Debug, Clone, Default)]
pub struct LabelFilter {
    hidden_labels: HashSet<String>,
    hide_unlabeled: bool,
}

impl LabelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hide_label(&mut self, name: &str) {
        self.hidden_labels.insert(name.to_lowercase());
    }

    pub fn toggle_label(&mut self, name: &str) {
        let name = name.to_lowercase();
        if !self.hidden_labels.remove(&name) {
            self.hidden_labels.insert(name);
        }
    }

    pub fn is_label_hidden(&self, name: &str) -> bool {
        self.hidden_labels.contains(&name.to_lowercase())
    }

    pub fn set_hide_unlabeled(&mut self, hide: bool) {
        self.hide_unlabeled = hide;
    }

    pub fn toggle_unlabeled(&mut self) {
        self.hide_unlabeled = !self.hide_unlabeled;
    }

    pub fn hides_unlabeled(&self) -> bool {
        self.hide_unlabeled
    }

    pub fn reset(&mut self) {
        self.hidden_labels.clear();
        self.hide_unlabeled = false;
    }

    /// A labelled pull request stays visible while any of its labels is shown.
    pub fn is_visible(&self, labels: &[Label]) -> bool {
        if labels.is_empty() {
            return !self.hide_unlabeled;
        }
        !labels.iter().all(|label| self.is_label_hidden(&label.name))
    }

    pub fn apply<'a>(&'a self, pull_requests: &'a [PullRequest]) -> impl Iterator<Item = &'a PullRequest> + 'a {
        pull_requests.iter().filter(|pr| self.is_visible(&pr.labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LastCommitChecks, PullRequestState, User};
    use chrono::Utc;

    fn label(name: &str, color: &str) -> Label {
        Label {
            id: name.to_string(),
            color: color.to_string(),
            name: name.to_string(),
            description: None,
        }
    }

    fn pull_request(id: &str, labels: Vec<Label>) -> PullRequest {
        let author = User {
            login: "alice".into(),
            avatar_url: String::new(),
        };
        PullRequest {
            id: id.to_string(),
            title: id.to_string(),
            number: 1,
            url: String::new(),
            author,
            repository_url: String::new(),
            repository_name: "api".into(),
            repository_base_ref: "main".into(),
            base_ref: "main".into(),
            state: PullRequestState::Open,
            is_draft: false,
            review_decision: None,
            created_at: Utc::now(),
            labels,
            reviews: Vec::new(),
            comments: 0,
            requested_reviewers: Vec::new(),
            contributors: Vec::new(),
            assignees: Vec::new(),
            last_commit_checks: LastCommitChecks::default(),
        }
    }

    #[test]
    fn hidden_only_when_every_label_is_hidden() {
        let mut filter = LabelFilter::new();
        let labels = vec![label("Bug", "f00"), label("backend", "0f0")];

        filter.toggle_label("bug");
        assert!(filter.is_label_hidden("BUG"));
        assert!(filter.is_visible(&labels));

        filter.toggle_label("Backend");
        assert!(!filter.is_visible(&labels));

        filter.toggle_label("BUG");
        assert!(filter.is_visible(&labels));
    }

    #[test]
    fn unlabeled_toggle_and_reset() {
        let mut filter = LabelFilter::new();
        assert!(filter.is_visible(&[]));
        filter.toggle_unlabeled();
        assert!(filter.hides_unlabeled());
        assert!(!filter.is_visible(&[]));

        filter.hide_label("bug");
        filter.reset();
        assert!(filter.is_visible(&[]));
        assert!(!filter.is_label_hidden("bug"));
    }

    #[test]
    fn apply_keeps_order() {
        let prs = vec![
            pull_request("one", vec![label("wip", "aaa")]),
            pull_request("two", vec![]),
            pull_request("three", vec![label("bug", "f00")]),
        ];
        let mut filter = LabelFilter::new();
        filter.hide_label("WIP");
        let ids: Vec<_> = filter.apply(&prs).map(|pr| pr.id.as_str()).collect();
        assert_eq!(ids, ["two", "three"]);
    }

    #[test]
    fn summary_counts_case_insensitively() {
        let prs = vec![
            pull_request("one", vec![label("Bug", "f00"), label("ui", "00f")]),
            pull_request("two", vec![label("bug", "123")]),
            pull_request("three", vec![]),
        ];
        let summary = summarize_labels(&prs);
        assert_eq!(summary.unlabeled, 1);
        assert_eq!(
            summary.labels,
            [
                LabelCount { name: "Bug".into(), color: "f00".into(), count: 2 },
                LabelCount { name: "ui".into(), color: "00f".into(), count: 1 },
            ]
        );
    }
}

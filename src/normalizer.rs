//! Flattens raw pull request search nodes into [`PullRequest`] view models.

use std::collections::HashSet;

use crate::commit_checks::last_commit_checks;
use crate::graphql::{RawPullRequest, RawPullRequestCommit, RawReview, RawReviewRequest, RequestedReviewer};
use crate::models::{LastCommitChecks, PullRequest, Review, ReviewState, User};

/// Issue comments do not include review comments, so those are added on top:
/// one per review with a body plus every comment left inside a review.
pub fn count_comments(issue_comments: u64, reviews: &[RawReview]) -> u64 {
    let review_bodies = reviews.iter().filter(|review| !review.body.is_empty()).count() as u64;
    let review_comments: u64 = reviews.iter().map(|review| review.comments.total_count).sum();

    issue_comments + review_bodies + review_comments
}

/// Keeps one review per reviewer, in order of first appearance.
///
/// A later review replaces an earlier one unless the later one is only a
/// comment; an earlier comment-only review is always replaced.
pub fn dedupe_reviews(reviews: &[RawReview]) -> Vec<Review> {
    let mut deduped: Vec<Review> = Vec::new();

    for raw in reviews {
        let review = Review {
            state: raw.state,
            reviewer: raw.author.clone(),
        };

        match deduped
            .iter_mut()
            .find(|existing| existing.reviewer.login == review.reviewer.login)
        {
            None => deduped.push(review),
            Some(existing) if review.state != ReviewState::Commented => *existing = review,
            Some(_) => {}
        }
    }

    deduped
}

pub fn requested_reviewers(requests: &[RawReviewRequest]) -> Vec<User> {
    requests
        .iter()
        .filter_map(|request| match request.requested_reviewer.as_ref()? {
            RequestedReviewer::User { login, avatar_url } => Some(User {
                login: login.clone(),
                avatar_url: avatar_url.clone(),
            }),
            RequestedReviewer::Team { name, avatar_url } => Some(User {
                login: name.clone(),
                avatar_url: avatar_url.clone().unwrap_or_default(),
            }),
            RequestedReviewer::Other => None,
        })
        .collect()
}

/// Everyone who authored or committed a commit, except the pull request
/// author. Identities not linked to an account count as the author.
pub fn contributors(commits: &[RawPullRequestCommit], author: &User) -> Vec<User> {
    let mut seen = HashSet::new();
    seen.insert(author.login.clone());

    commits
        .iter()
        .flat_map(|entry| [entry.commit.author.as_ref(), entry.commit.committer.as_ref()])
        .map(|actor| actor.and_then(|actor| actor.user.as_ref()).unwrap_or(author))
        .filter(|user| seen.insert(user.login.clone()))
        .cloned()
        .collect()
}

pub fn dedupe_users(users: &[User]) -> Vec<User> {
    let mut seen = HashSet::new();
    users
        .iter()
        .filter(|user| seen.insert(user.login.as_str()))
        .cloned()
        .collect()
}

pub fn normalize_pull_request(raw: RawPullRequest) -> PullRequest {
    let required_contexts = raw.base_ref.required_status_check_contexts();
    let last_commit_checks = raw
        .last_commit
        .nodes
        .first()
        .map(|last| last_commit_checks(&last.commit, required_contexts))
        .unwrap_or_else(LastCommitChecks::default);

    PullRequest {
        comments: count_comments(raw.comments.total_count, &raw.reviews.nodes),
        reviews: dedupe_reviews(&raw.reviews.nodes),
        requested_reviewers: requested_reviewers(&raw.review_requests.nodes),
        contributors: contributors(&raw.commits.nodes, &raw.author),
        assignees: dedupe_users(&raw.assignees.nodes),
        last_commit_checks,
        id: raw.id,
        title: raw.title,
        number: raw.number,
        url: raw.permalink,
        author: raw.author,
        repository_url: raw.repository.url,
        repository_name: raw.repository.name,
        repository_base_ref: raw
            .repository
            .default_branch_ref
            .map(|branch| branch.name)
            .unwrap_or_default(),
        base_ref: raw.base_ref.name,
        state: raw.state,
        is_draft: raw.is_draft,
        review_decision: raw.review_decision,
        created_at: raw.created_at,
        labels: raw.labels.nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckResult;
    use serde_json::{Value, json};

    fn user(login: &str) -> Value {
        json!({ "login": login, "avatarUrl": format!("https://avatars/{login}") })
    }

    fn review(login: &str, state: &str, body: &str, comments: u64) -> Value {
        json!({ "body": body, "state": state, "author": user(login), "comments": { "totalCount": comments } })
    }

    fn raw_reviews(values: Vec<Value>) -> Vec<RawReview> {
        serde_json::from_value(Value::Array(values)).unwrap()
    }

    fn raw_pull_request() -> RawPullRequest {
        serde_json::from_value(json!({
            "id": "PR_1",
            "title": "Add retries",
            "permalink": "https://github.com/acme/api/pull/7",
            "number": 7,
            "createdAt": "2024-03-01T09:00:00Z",
            "state": "OPEN",
            "isDraft": false,
            "reviewDecision": "REVIEW_REQUIRED",
            "author": user("alice"),
            "repository": { "name": "api", "url": "https://github.com/acme/api", "defaultBranchRef": { "name": "main" } },
            "baseRef": { "name": "main", "branchProtectionRule": { "requiredStatusCheckContexts": ["build"] } },
            "comments": { "totalCount": 2 },
            "reviews": { "nodes": [review("bob", "COMMENTED", "nit", 3), review("bob", "APPROVED", "", 0)] },
            "assignees": { "nodes": [user("alice"), user("alice")] },
            "reviewRequests": { "nodes": [
                { "requestedReviewer": { "__typename": "User", "login": "carol", "avatarUrl": "c" } },
                { "requestedReviewer": { "__typename": "Team", "name": "core", "avatarUrl": "t" } },
                { "requestedReviewer": null }
            ]},
            "commits": { "nodes": [
                { "commit": { "author": { "user": user("alice") }, "committer": { "user": null } } },
                { "commit": { "author": { "user": user("dave") }, "committer": { "user": user("web-flow") } } }
            ]},
            "lastCommit": { "nodes": [{ "commit": {
                "checkSuites": { "nodes": [] },
                "status": null,
                "statusCheckRollup": { "state": "SUCCESS", "contexts": { "nodes": [] } }
            }}]},
            "labels": { "nodes": [{ "id": "L1", "color": "ff0000", "name": "bug", "description": "" }] }
        }))
        .unwrap()
    }

    #[test]
    fn comments_include_review_bodies_and_threads() {
        let reviews = raw_reviews(vec![
            review("bob", "COMMENTED", "looks odd", 2),
            review("eve", "APPROVED", "", 1),
        ]);
        assert_eq!(count_comments(4, &reviews), 4 + 1 + 3);
        assert_eq!(count_comments(4, &[]), 4);
    }

    #[test]
    fn comment_review_never_overrides_verdict() {
        let reviews = raw_reviews(vec![
            review("bob", "APPROVED", "", 0),
            review("bob", "COMMENTED", "one more thing", 0),
        ]);
        let deduped = dedupe_reviews(&reviews);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].state, ReviewState::Approved);
    }

    #[test]
    fn verdict_replaces_earlier_comment_review() {
        let reviews = raw_reviews(vec![
            review("bob", "COMMENTED", "q", 0),
            review("eve", "COMMENTED", "", 0),
            review("bob", "APPROVED", "", 0),
        ]);
        let deduped = dedupe_reviews(&reviews);
        let states: Vec<_> = deduped
            .iter()
            .map(|review| (review.reviewer.login.as_str(), review.state))
            .collect();
        assert_eq!(
            states,
            [("bob", ReviewState::Approved), ("eve", ReviewState::Commented)]
        );
    }

    #[test]
    fn later_verdict_wins() {
        let reviews = raw_reviews(vec![
            review("bob", "CHANGES_REQUESTED", "", 0),
            review("bob", "APPROVED", "", 0),
        ]);
        assert_eq!(dedupe_reviews(&reviews)[0].state, ReviewState::Approved);
    }

    #[test]
    fn normalizes_a_full_node() {
        let pr = normalize_pull_request(raw_pull_request());

        assert_eq!(pr.id, "PR_1");
        assert_eq!(pr.url, "https://github.com/acme/api/pull/7");
        assert_eq!(pr.repository_base_ref, "main");
        assert_eq!(pr.comments, 2 + 1 + 3);
        assert_eq!(pr.reviews.len(), 1);
        assert_eq!(pr.reviews[0].state, ReviewState::Approved);

        let requested: Vec<_> = pr.requested_reviewers.iter().map(|u| u.login.as_str()).collect();
        assert_eq!(requested, ["carol", "core"]);

        let contributors: Vec<_> = pr.contributors.iter().map(|u| u.login.as_str()).collect();
        assert_eq!(contributors, ["dave", "web-flow"]);

        assert_eq!(pr.assignees.len(), 1);
        assert_eq!(pr.labels[0].name, "bug");

        // The required "build" context has not reported yet.
        let checks = &pr.last_commit_checks;
        assert_eq!(checks.result, Some(CheckResult::Success));
        assert_eq!(checks.commit_checks.len(), 1);
        assert_eq!(checks.commit_checks[0].result, CheckResult::Pending);
    }

    #[test]
    fn missing_head_commit_yields_empty_checks() {
        let mut raw = raw_pull_request();
        raw.last_commit.nodes.clear();
        let pr = normalize_pull_request(raw);
        assert_eq!(pr.last_commit_checks, LastCommitChecks::default());
    }
}

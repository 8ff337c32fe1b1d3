use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub login: String,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Label {
    pub id: String,
    pub color: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    ReviewRequired,
    Approved,
    ChangesRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Pending,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub state: ReviewState,
    pub reviewer: User,
}

/// Outcome of a single commit check, and of the rollup as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckResult {
    Success,
    Failure,
    InProgress,
    Pending,
    Skipped,
}

/// The app (or status creator) that reported a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitChecker {
    pub login: String,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: String,
    #[serde(rename = "backgroundColor")]
    pub background_color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitCheck {
    pub id: String,
    pub name: String,
    pub description: String,
    pub result: CheckResult,
    pub required: bool,
    #[serde(rename = "runUrl")]
    pub run_url: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
    pub checker: CommitChecker,
}

/// Checks of the head commit plus the rollup's own verdict.
///
/// `result` comes from the status rollup and is `None` when the commit has
/// no rollup at all. It is not recomputed from `commit_checks`, so the two
/// may briefly disagree while GitHub catches up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LastCommitChecks {
    #[serde(rename = "commitChecks")]
    pub commit_checks: Vec<CommitCheck>,
    pub result: Option<CheckResult>,
}

impl LastCommitChecks {
    /// Rollup result as it should be shown: a rollup that claims success
    /// while some check is still pending is reported as a failure.
    pub fn display_result(&self) -> Option<CheckResult> {
        match self.result {
            Some(CheckResult::Success)
                if self
                    .commit_checks
                    .iter()
                    .any(|check| check.result == CheckResult::Pending) =>
            {
                Some(CheckResult::Failure)
            }
            other => other,
        }
    }

    pub fn summary(&self) -> &'static str {
        match self.display_result() {
            Some(CheckResult::Success) => "All checks have passed",
            Some(CheckResult::InProgress) | Some(CheckResult::Pending) => {
                "Some checks haven't completed yet"
            }
            Some(CheckResult::Skipped) => "All checks were skipped",
            _ => "Some checks were not successful",
        }
    }

    /// Number of checks that either succeeded or were skipped.
    pub fn passed_count(&self) -> usize {
        self.commit_checks
            .iter()
            .filter(|check| matches!(check.result, CheckResult::Success | CheckResult::Skipped))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequest {
    pub id: String,
    pub title: String,
    pub number: u64,
    pub url: String,
    pub author: User,
    #[serde(rename = "repositoryUrl")]
    pub repository_url: String,
    #[serde(rename = "repositoryName")]
    pub repository_name: String,
    #[serde(rename = "repositoryBaseRef")]
    pub repository_base_ref: String,
    #[serde(rename = "baseRef")]
    pub base_ref: String,
    pub state: PullRequestState,
    #[serde(rename = "isDraft")]
    pub is_draft: bool,
    #[serde(rename = "reviewDecision")]
    pub review_decision: Option<ReviewDecision>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub labels: Vec<Label>,
    pub reviews: Vec<Review>,
    pub comments: u64,
    #[serde(rename = "requestedReviewers")]
    pub requested_reviewers: Vec<User>,
    pub contributors: Vec<User>,
    pub assignees: Vec<User>,
    #[serde(rename = "lastCommitChecks")]
    pub last_commit_checks: LastCommitChecks,
}

impl PullRequest {
    /// Reviews worth showing; dismissed ones are stale.
    pub fn visible_reviews(&self) -> impl Iterator<Item = &Review> {
        self.reviews
            .iter()
            .filter(|review| review.state != ReviewState::Dismissed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepositoryPermission {
    Admin,
    Maintain,
    Write,
    Triage,
    Read,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamRepository {
    pub name: String,
    #[serde(rename = "nameWithOwner")]
    pub name_with_owner: String,
    pub permission: RepositoryPermission,
}

/// One page of a team's repositories together with its cursors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeamRepositoryPageable {
    #[serde(rename = "teamRepositories")]
    pub team_repositories: Vec<TeamRepository>,
    pub total: u32,
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
    #[serde(rename = "hasPreviousPage")]
    pub has_previous_page: bool,
    #[serde(rename = "startCursor")]
    pub start_cursor: Option<String>,
    #[serde(rename = "endCursor")]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Organization {
    pub name: Option<String>,
    pub login: String,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(result: CheckResult) -> CommitCheck {
        CommitCheck {
            id: "c".to_string(),
            name: "build".to_string(),
            description: String::new(),
            result,
            required: false,
            run_url: String::new(),
            started_at: None,
            completed_at: None,
            checker: CommitChecker {
                login: "ci".to_string(),
                avatar_url: String::new(),
                background_color: "000000".to_string(),
            },
        }
    }

    #[test]
    fn pending_check_downgrades_successful_rollup() {
        let checks = LastCommitChecks {
            commit_checks: vec![check(CheckResult::Success), check(CheckResult::Pending)],
            result: Some(CheckResult::Success),
        };
        assert_eq!(checks.result, Some(CheckResult::Success));
        assert_eq!(checks.display_result(), Some(CheckResult::Failure));
        assert_eq!(checks.summary(), "Some checks were not successful");
        assert_eq!(checks.passed_count(), 1);
    }

    #[test]
    fn summary_follows_rollup() {
        let mut checks = LastCommitChecks {
            commit_checks: vec![check(CheckResult::Skipped)],
            result: Some(CheckResult::Skipped),
        };
        assert_eq!(checks.summary(), "All checks were skipped");
        checks.result = Some(CheckResult::InProgress);
        assert_eq!(checks.summary(), "Some checks haven't completed yet");
        checks.result = None;
        assert_eq!(checks.display_result(), None);
    }

    #[test]
    fn check_result_uses_screaming_case() {
        let json = serde_json::to_string(&CheckResult::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }
}

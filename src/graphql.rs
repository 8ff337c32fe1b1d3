//! GitHub GraphQL documents and the raw shapes they return.
//!
//! Every user supplied value (organization, team, search text, cursors) goes
//! through `variables`; the documents themselves are constant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::models::{
    Label, Organization, PullRequestState, RepositoryPermission, ReviewDecision, ReviewState, User,
};
use crate::pagination::PageWindow;

/// Body of a GraphQL POST.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: Value,
}

/// Envelope every GraphQL response arrives in.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlErrorMessage {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Nodes<T> {
    pub nodes: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TotalCount {
    #[serde(rename = "totalCount")]
    pub total_count: u64,
}

const USER_FIELDS: &str = "login avatarUrl";

fn last_commit_checks_fields() -> String {
    r#"
    baseRef {
      name
      branchProtectionRule {
        requiredStatusCheckContexts
      }
    }
    lastCommit: commits(last: 1) {
      nodes {
        commit {
          checkSuites(last: 10) {
            nodes {
              checkRuns(last: 100) {
                nodes {
                  id
                  name
                  status
                  conclusion
                  permalink
                  startedAt
                  completedAt
                }
              }
              app {
                slug
                logoUrl
                logoBackgroundColor
              }
            }
          }
          status {
            contexts {
              id
              context
              description
              state
              createdAt
              creator {
                login
              }
              avatarUrl
              targetUrl
            }
          }
          statusCheckRollup {
            state
            contexts(last: 100) {
              nodes {
                ... on CheckRun {
                  id
                }
                ... on StatusContext {
                  id
                }
              }
            }
          }
        }
      }
    }"#
    .to_string()
}

fn pull_request_fields() -> String {
    format!(
        r#"
    ... on PullRequest {{
      title
      permalink
      number
      createdAt
      state
      id
      isDraft
      reviewDecision
      author {{
        {USER_FIELDS}
      }}
      repository {{
        name
        url
        defaultBranchRef {{
          name
        }}
      }}
      comments {{
        totalCount
      }}
      reviews(last: 100) {{
        nodes {{
          body
          state
          author {{
            {USER_FIELDS}
          }}
          comments {{
            totalCount
          }}
        }}
      }}
      assignees(last: 100) {{
        nodes {{
          {USER_FIELDS}
        }}
      }}
      reviewRequests(last: 100) {{
        nodes {{
          requestedReviewer {{
            __typename
            ... on Team {{
              avatarUrl
              name
            }}
            ... on User {{
              {USER_FIELDS}
            }}
          }}
        }}
      }}
      commits(last: 100) {{
        nodes {{
          ... on PullRequestCommit {{
            commit {{
              author {{
                user {{
                  {USER_FIELDS}
                }}
              }}
              committer {{
                user {{
                  {USER_FIELDS}
                }}
              }}
            }}
          }}
        }}
      }}
      {checks}
      labels(first: 100) {{
        nodes {{
          id
          color
          name
          description
        }}
      }}
    }}"#,
        checks = last_commit_checks_fields()
    )
}

pub fn organizations_query() -> GraphQlRequest {
    GraphQlRequest {
        query: format!(
            r#"query {{
  viewer {{
    organizations(first: 100) {{
      nodes {{
        name
        {USER_FIELDS}
      }}
    }}
  }}
}}"#
        ),
        variables: json!({}),
    }
}

pub fn team_members_query(org_name: &str, team_name: &str) -> GraphQlRequest {
    GraphQlRequest {
        query: format!(
            r#"query($org: String!, $team: String!) {{
  organization(login: $org) {{
    teams(query: $team, first: 1) {{
      nodes {{
        members(first: 100) {{
          nodes {{
            {USER_FIELDS}
          }}
        }}
      }}
    }}
  }}
}}"#
        ),
        variables: json!({ "org": org_name, "team": team_name }),
    }
}

pub fn team_repositories_query(org_name: &str, team_name: &str, window: &PageWindow) -> GraphQlRequest {
    let mut variables = json!({ "org": org_name, "team": team_name });
    if let Value::Object(map) = &mut variables {
        map.extend(window.variables());
    }

    GraphQlRequest {
        query: r#"query($org: String!, $team: String!, $first: Int, $after: String, $last: Int, $before: String) {
  organization(login: $org) {
    teams(query: $team, first: 1) {
      nodes {
        repositories(
          first: $first
          after: $after
          last: $last
          before: $before
          orderBy: {field: NAME, direction: ASC}
        ) {
          edges {
            permission
            node {
              name
              nameWithOwner
            }
          }
          totalCount
          pageInfo {
            startCursor
            endCursor
            hasNextPage
            hasPreviousPage
          }
        }
      }
    }
  }
}"#
        .to_string(),
        variables,
    }
}

/// Search text for open pull requests opened by `author` inside `org_name`.
pub fn author_search(org_name: &str, author: &str) -> String {
    format!("is:open org:{} type:pr author:{}", org_name, author)
}

/// Search text for open pull requests in any of `repositories` (`owner/name`).
pub fn repositories_search(repositories: &[String]) -> String {
    let repos = repositories
        .iter()
        .map(|name| format!("repo:{}", name))
        .collect::<Vec<_>>()
        .join(" ");
    format!("is:open type:pr {}", repos)
}

pub fn search_pull_requests_query(search: &str) -> GraphQlRequest {
    GraphQlRequest {
        query: format!(
            r#"query($search: String!) {{
  search(query: $search, first: 100, type: ISSUE) {{
    nodes {{
      {fields}
    }}
  }}
}}"#,
            fields = pull_request_fields()
        ),
        variables: json!({ "search": search }),
    }
}

pub fn commit_checks_query(org_name: &str, repo_name: &str, pr_number: u64) -> GraphQlRequest {
    GraphQlRequest {
        query: format!(
            r#"query($org: String!, $repo: String!, $number: Int!) {{
  organization(login: $org) {{
    repository(name: $repo) {{
      pullRequest(number: $number) {{
        {checks}
      }}
    }}
  }}
}}"#,
            checks = last_commit_checks_fields()
        ),
        variables: json!({ "org": org_name, "repo": repo_name, "number": pr_number }),
    }
}

// Organizations

#[derive(Debug, Deserialize)]
pub struct OrganizationsResponse {
    pub viewer: Viewer,
}

#[derive(Debug, Deserialize)]
pub struct Viewer {
    pub organizations: Nodes<Organization>,
}

// Team members

#[derive(Debug, Deserialize)]
pub struct TeamMembersResponse {
    pub organization: Option<TeamsOf<TeamMembers>>,
}

#[derive(Debug, Deserialize)]
pub struct TeamsOf<T> {
    pub teams: Nodes<T>,
}

#[derive(Debug, Deserialize)]
pub struct TeamMembers {
    pub members: Nodes<User>,
}

// Team repositories

#[derive(Debug, Deserialize)]
pub struct TeamRepositoriesResponse {
    pub organization: Option<TeamsOf<TeamRepositories>>,
}

#[derive(Debug, Deserialize)]
pub struct TeamRepositories {
    pub repositories: RepositoryConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConnection {
    pub edges: Vec<RepositoryEdge>,
    pub total_count: u32,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryEdge {
    pub permission: RepositoryPermission,
    pub node: RepositoryNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    pub name: String,
    pub name_with_owner: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

// Pull request search

#[derive(Debug, Deserialize)]
pub struct PullRequestSearchResponse {
    pub search: Nodes<RawPullRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPullRequest {
    pub id: String,
    pub title: String,
    pub permalink: String,
    pub number: u64,
    pub created_at: DateTime<Utc>,
    pub state: PullRequestState,
    pub is_draft: bool,
    pub review_decision: Option<ReviewDecision>,
    pub author: User,
    pub repository: RawRepository,
    pub base_ref: RawBaseRef,
    pub comments: TotalCount,
    pub reviews: Nodes<RawReview>,
    pub assignees: Nodes<User>,
    pub review_requests: Nodes<RawReviewRequest>,
    pub commits: Nodes<RawPullRequestCommit>,
    pub last_commit: Nodes<RawLastCommit>,
    pub labels: Nodes<Label>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRepository {
    pub name: String,
    pub url: String,
    pub default_branch_ref: Option<RefName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefName {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBaseRef {
    #[serde(default)]
    pub name: String,
    pub branch_protection_rule: Option<BranchProtectionRule>,
}

impl RawBaseRef {
    pub fn required_status_check_contexts(&self) -> &[String] {
        self.branch_protection_rule
            .as_ref()
            .and_then(|rule| rule.required_status_check_contexts.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchProtectionRule {
    pub required_status_check_contexts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReview {
    #[serde(default)]
    pub body: String,
    pub state: ReviewState,
    pub author: User,
    pub comments: TotalCount,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReviewRequest {
    pub requested_reviewer: Option<RequestedReviewer>,
}

/// Target of a review request, discriminated by GraphQL `__typename`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "__typename")]
pub enum RequestedReviewer {
    User {
        login: String,
        #[serde(rename = "avatarUrl")]
        avatar_url: String,
    },
    Team {
        name: String,
        #[serde(rename = "avatarUrl")]
        avatar_url: Option<String>,
    },
    /// Bots and mannequins, which the query does not select fields for.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPullRequestCommit {
    pub commit: RawCommitIdentities,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCommitIdentities {
    pub author: Option<GitActor>,
    pub committer: Option<GitActor>,
}

/// Git identity; `user` is `None` when it is not linked to an account.
#[derive(Debug, Clone, Deserialize)]
pub struct GitActor {
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLastCommit {
    pub commit: RawCommitWithChecks,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCommitWithChecks {
    pub check_suites: Option<Nodes<RawCheckSuite>>,
    pub status: Option<RawCommitStatus>,
    pub status_check_rollup: Option<RawStatusRollup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCheckSuite {
    pub check_runs: Option<Nodes<RawCheckRun>>,
    pub app: Option<RawCheckSuiteApp>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCheckSuiteApp {
    pub slug: String,
    pub logo_url: String,
    pub logo_background_color: String,
}

/// Check run status. Values GitHub adds later are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Pending,
    Requested,
    Unknown(String),
}

impl CheckStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CheckStatus::Queued => "QUEUED",
            CheckStatus::InProgress => "IN_PROGRESS",
            CheckStatus::Completed => "COMPLETED",
            CheckStatus::Waiting => "WAITING",
            CheckStatus::Pending => "PENDING",
            CheckStatus::Requested => "REQUESTED",
            CheckStatus::Unknown(raw) => raw,
        }
    }
}

impl From<String> for CheckStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "QUEUED" => CheckStatus::Queued,
            "IN_PROGRESS" => CheckStatus::InProgress,
            "COMPLETED" => CheckStatus::Completed,
            "WAITING" => CheckStatus::Waiting,
            "PENDING" => CheckStatus::Pending,
            "REQUESTED" => CheckStatus::Requested,
            _ => CheckStatus::Unknown(raw),
        }
    }
}

impl<'de> Deserialize<'de> for CheckStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(CheckStatus::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckConclusion {
    Success,
    Failure,
    Skipped,
    Cancelled,
    Neutral,
    TimedOut,
    ActionRequired,
    StartupFailure,
    Stale,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCheckRun {
    pub id: String,
    pub name: String,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
    #[serde(default)]
    pub permalink: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCommitStatus {
    pub contexts: Vec<RawStatusContext>,
}

/// State shared by legacy status contexts and the status rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusState {
    Success,
    Failure,
    Expected,
    Error,
    Pending,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatusContext {
    pub id: String,
    pub context: String,
    pub description: Option<String>,
    pub state: StatusState,
    pub created_at: DateTime<Utc>,
    pub creator: Option<Creator>,
    pub avatar_url: Option<String>,
    pub target_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Creator {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStatusRollup {
    pub state: StatusState,
    pub contexts: Nodes<RollupContext>,
}

/// Either a check run or a status context; only the id is selected.
#[derive(Debug, Clone, Deserialize)]
pub struct RollupContext {
    pub id: Option<String>,
}

// Commit checks of a single pull request

#[derive(Debug, Deserialize)]
pub struct CommitChecksResponse {
    pub organization: Option<CommitChecksOrganization>,
}

#[derive(Debug, Deserialize)]
pub struct CommitChecksOrganization {
    pub repository: Option<CommitChecksRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitChecksRepository {
    pub pull_request: Option<CommitChecksPullRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitChecksPullRequest {
    pub base_ref: Option<RawBaseRef>,
    pub last_commit: Nodes<RawLastCommit>,
}

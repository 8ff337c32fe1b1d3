use anyhow::{Context, Result, anyhow};
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;

use crate::commit_checks::last_commit_checks;
use crate::github_client::{GitHubClient, GitHubError};
use crate::graphql::{
    self, CommitChecksResponse, OrganizationsResponse, PullRequestSearchResponse, RawPullRequest,
    TeamMembersResponse, TeamRepositoriesResponse,
};
use crate::models::{LastCommitChecks, Organization, PullRequest, TeamRepository, TeamRepositoryPageable};
use crate::normalizer::normalize_pull_request;
use crate::pagination::{PageCursor, page_window};
use crate::settings::SettingsRepository;

/// Share of the progress bar reserved for resolving team membership.
const MEMBERSHIP_PROGRESS: f64 = 10.0;
const COMPLETE_PROGRESS: f64 = 100.0;

/// Receives loading progress as a percentage.
pub trait ProgressSink {
    fn report(&mut self, percent: f64);
}

impl<F: FnMut(f64)> ProgressSink for F {
    fn report(&mut self, percent: f64) {
        self(percent)
    }
}

/// Hands out reload generations so that a fetch can tell it was superseded.
#[derive(Debug, Clone, Default)]
pub struct ReloadTracker {
    generation: Arc<AtomicU64>,
}

impl ReloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new reload, making every earlier one stale.
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Forwards progress only while its generation is the latest one.
struct GenerationSink<'a, P: ProgressSink + ?Sized> {
    tracker: &'a ReloadTracker,
    generation: u64,
    inner: &'a mut P,
}

impl<P: ProgressSink + ?Sized> ProgressSink for GenerationSink<'_, P> {
    fn report(&mut self, percent: f64) {
        if self.tracker.is_current(self.generation) {
            self.inner.report(percent);
        }
    }
}

/// Progress after `completed` of `total` searches finished. Reaches exactly
/// [`COMPLETE_PROGRESS`] on the last one.
fn search_progress(completed: usize, total: usize) -> f64 {
    let share = (COMPLETE_PROGRESS - MEMBERSHIP_PROGRESS) * completed as f64 / total as f64;
    (MEMBERSHIP_PROGRESS + share).min(COMPLETE_PROGRESS)
}

/// Collapses search results into view models: one entry per pull request id
/// (a later copy replaces an earlier one in place), newest first.
pub fn merge_pull_requests(pages: Vec<Vec<RawPullRequest>>) -> Vec<PullRequest> {
    let mut unique: Vec<RawPullRequest> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for pr in pages.into_iter().flatten() {
        match positions.get(&pr.id) {
            Some(&position) => unique[position] = pr,
            None => {
                positions.insert(pr.id.clone(), unique.len());
                unique.push(pr);
            }
        }
    }

    let mut pull_requests: Vec<PullRequest> = unique.into_iter().map(normalize_pull_request).collect();
    pull_requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    pull_requests
}

/// Loads everything the dashboard shows from GitHub.
pub struct DataFetcher {
    client: GitHubClient,
    settings: Arc<dyn SettingsRepository>,
    settle_delay: Duration,
}

impl DataFetcher {
    pub fn new(client: GitHubClient, settings: Arc<dyn SettingsRepository>) -> Self {
        Self {
            client,
            settings,
            settle_delay: Duration::ZERO,
        }
    }

    /// Pause after reaching 100% so a progress bar can be seen completing.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn set_token(&mut self, token: &str) {
        self.client.set_token(token);
    }

    pub fn settings(&self) -> &dyn SettingsRepository {
        self.settings.as_ref()
    }

    pub async fn fetch_organizations(&self) -> Result<Vec<Organization>> {
        let response: OrganizationsResponse = self
            .client
            .query(&graphql::organizations_query())
            .await
            .context("Failed to fetch organizations")?;

        Ok(response.viewer.organizations.nodes)
    }

    async fn fetch_team_members(&self, org_name: &str, team_name: &str) -> Result<Vec<String>, GitHubError> {
        let response: TeamMembersResponse = self
            .client
            .query(&graphql::team_members_query(org_name, team_name))
            .await?;

        Ok(response
            .organization
            .and_then(|organization| organization.teams.nodes.into_iter().next())
            .map(|team| team.members.nodes.into_iter().map(|user| user.login).collect())
            .unwrap_or_default())
    }

    async fn search_pull_requests(&self, search: String) -> Result<Vec<RawPullRequest>> {
        debug!("Searching pull requests: {}", search);
        let response: PullRequestSearchResponse = self
            .client
            .query(&graphql::search_pull_requests_query(&search))
            .await
            .with_context(|| format!("Failed to search pull requests ({})", search))?;

        Ok(response.search.nodes)
    }

    /// Open pull requests authored by the team's members, plus those in the
    /// repositories saved for the team, newest first.
    ///
    /// A rejected token while resolving the team calls `on_invalid_token`
    /// and yields no pull requests; every other failure is returned.
    pub async fn fetch_pull_requests<P, F>(
        &self,
        org_name: &str,
        team_name: &str,
        progress: &mut P,
        on_invalid_token: F,
    ) -> Result<Vec<PullRequest>>
    where
        P: ProgressSink + ?Sized,
        F: FnOnce(),
    {
        let team_repositories = self
            .settings
            .load_team(team_name)?
            .map(|team| team.repositories)
            .filter(|repositories| !repositories.is_empty());

        let members = match self.fetch_team_members(org_name, team_name).await {
            Ok(members) => members,
            Err(e) if e.is_unauthorized() => {
                warn!("GitHub token rejected while loading team {}: {}", team_name, e);
                on_invalid_token();
                Vec::new()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to load members of team {}", team_name));
            }
        };

        if members.is_empty() {
            progress.report(COMPLETE_PROGRESS);
            return Ok(Vec::new());
        }

        progress.report(MEMBERSHIP_PROGRESS);

        let mut searches: Vec<String> = members
            .iter()
            .map(|member| graphql::author_search(org_name, member))
            .collect();
        if let Some(repositories) = &team_repositories {
            searches.push(graphql::repositories_search(repositories));
        }

        info!(
            "Fetching pull requests of {} members of {}/{} ({} queries)",
            members.len(),
            org_name,
            team_name,
            searches.len()
        );

        let total = searches.len();
        let mut completed = 0;
        let mut pages: Vec<Vec<RawPullRequest>> = vec![Vec::new(); searches.len()];

        let mut pending: FuturesUnordered<_> = searches
            .into_iter()
            .enumerate()
            .map(|(index, search)| async move { (index, self.search_pull_requests(search).await) })
            .collect();

        while let Some((index, result)) = pending.next().await {
            pages[index] = result?;
            completed += 1;
            progress.report(search_progress(completed, total));
        }

        let pull_requests = merge_pull_requests(pages);
        progress.report(COMPLETE_PROGRESS);
        info!("Found {} open pull requests for {}", pull_requests.len(), team_name);

        if !self.settle_delay.is_zero() {
            sleep(self.settle_delay).await;
        }

        Ok(pull_requests)
    }

    /// Like [`fetch_pull_requests`](Self::fetch_pull_requests) but returns
    /// `None` when another reload started on `tracker` before this one
    /// finished. A superseded reload neither forwards progress nor reports a
    /// rejected token.
    pub async fn fetch_latest_pull_requests<P, F>(
        &self,
        tracker: &ReloadTracker,
        org_name: &str,
        team_name: &str,
        progress: &mut P,
        on_invalid_token: F,
    ) -> Result<Option<Vec<PullRequest>>>
    where
        P: ProgressSink + ?Sized,
        F: FnOnce(),
    {
        let generation = tracker.begin();
        let mut sink = GenerationSink {
            tracker,
            generation,
            inner: progress,
        };

        let pull_requests = self
            .fetch_pull_requests(org_name, team_name, &mut sink, || {
                if tracker.is_current(generation) {
                    on_invalid_token();
                }
            })
            .await?;

        if tracker.is_current(generation) {
            Ok(Some(pull_requests))
        } else {
            warn!("Dropping pull requests of superseded reload for {}", team_name);
            Ok(None)
        }
    }

    pub async fn refresh_last_commit_checks(
        &self,
        org_name: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<LastCommitChecks> {
        let response: CommitChecksResponse = self
            .client
            .query(&graphql::commit_checks_query(org_name, repo_name, pr_number))
            .await
            .with_context(|| format!("Failed to fetch commit checks of {}/{}#{}", org_name, repo_name, pr_number))?;

        let pull_request = response
            .organization
            .and_then(|organization| organization.repository)
            .and_then(|repository| repository.pull_request)
            .ok_or_else(|| anyhow!("Pull request {}/{}#{} not found", org_name, repo_name, pr_number))?;

        let base_ref = pull_request.base_ref.unwrap_or_default();
        Ok(pull_request
            .last_commit
            .nodes
            .first()
            .map(|last| last_commit_checks(&last.commit, base_ref.required_status_check_contexts()))
            .unwrap_or_default())
    }

    pub async fn fetch_team_repositories(
        &self,
        org_name: &str,
        team_name: &str,
        cursor: &PageCursor,
        page_size: u32,
    ) -> Result<TeamRepositoryPageable> {
        let window = page_window(page_size, cursor);
        debug!("Fetching repositories of {} with {}", team_name, window);

        let response: TeamRepositoriesResponse = self
            .client
            .query(&graphql::team_repositories_query(org_name, team_name, &window))
            .await
            .with_context(|| format!("Failed to fetch repositories of team {}", team_name))?;

        let connection = response
            .organization
            .and_then(|organization| organization.teams.nodes.into_iter().next())
            .map(|team| team.repositories)
            .ok_or_else(|| anyhow!("Team {} not found in {}", team_name, org_name))?;

        Ok(TeamRepositoryPageable {
            team_repositories: connection
                .edges
                .into_iter()
                .map(|edge| TeamRepository {
                    name: edge.node.name,
                    name_with_owner: edge.node.name_with_owner,
                    permission: edge.permission,
                })
                .collect(),
            total: connection.total_count,
            has_next_page: connection.page_info.has_next_page,
            has_previous_page: connection.page_info.has_previous_page,
            start_cursor: connection.page_info.start_cursor,
            end_cursor: connection.page_info.end_cursor,
        })
    }
}

#![allow(dead_code)]

use std::sync::Arc;

use daily_helper::fetcher::DataFetcher;
use daily_helper::github_client::GitHubClient;
use daily_helper::settings::{MemorySettings, SettingsRepository};
use serde_json::{Value, json};
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";

pub fn fetcher(server: &MockServer, settings: Arc<dyn SettingsRepository>) -> DataFetcher {
    let client = GitHubClient::with_api_url(&format!("{}/graphql", server.uri()), TOKEN).unwrap();
    DataFetcher::new(client, settings)
}

pub fn memory_settings() -> Arc<dyn SettingsRepository> {
    Arc::new(MemorySettings::default())
}

pub fn user(login: &str) -> Value {
    json!({ "login": login, "avatarUrl": format!("https://avatars.example/{login}") })
}

pub fn members_response(logins: &[&str]) -> Value {
    let members: Vec<Value> = logins.iter().map(|login| user(login)).collect();
    json!({ "data": { "organization": { "teams": { "nodes": [{ "members": { "nodes": members } }] } } } })
}

pub fn search_response(nodes: Vec<Value>) -> Value {
    json!({ "data": { "search": { "nodes": nodes } } })
}

pub fn last_commit(state: &str) -> Value {
    json!({
        "checkSuites": { "nodes": [{
            "app": { "slug": "github-actions", "logoUrl": "logo", "logoBackgroundColor": "24292f" },
            "checkRuns": { "nodes": [{
                "id": "CR_build", "name": "build", "status": "COMPLETED", "conclusion": "SUCCESS",
                "permalink": "https://github.com/acme/api/runs/1",
                "startedAt": "2024-03-01T10:00:00Z", "completedAt": "2024-03-01T10:05:00Z"
            }]}
        }]},
        "status": null,
        "statusCheckRollup": { "state": state, "contexts": { "nodes": [{ "id": "CR_build" }] } }
    })
}

pub fn pull_request(id: &str, title: &str, author: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "permalink": format!("https://github.com/acme/api/pull/{id}"),
        "number": 42,
        "createdAt": created_at,
        "state": "OPEN",
        "isDraft": false,
        "reviewDecision": "REVIEW_REQUIRED",
        "author": user(author),
        "repository": { "name": "api", "url": "https://github.com/acme/api", "defaultBranchRef": { "name": "main" } },
        "baseRef": { "name": "main", "branchProtectionRule": { "requiredStatusCheckContexts": ["build"] } },
        "comments": { "totalCount": 1 },
        "reviews": { "nodes": [] },
        "assignees": { "nodes": [] },
        "reviewRequests": { "nodes": [] },
        "commits": { "nodes": [] },
        "lastCommit": { "nodes": [{ "commit": last_commit("SUCCESS") }] },
        "labels": { "nodes": [] }
    })
}

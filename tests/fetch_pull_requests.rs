use std::sync::Arc;
use std::time::Duration;

use daily_helper::fetcher::ReloadTracker;
use daily_helper::models::CheckResult;
use daily_helper::settings::{MemorySettings, SettingsRepository};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::*;

async fn mount_members(server: &MockServer, logins: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("members(first: 100)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(members_response(logins)))
        .mount(server)
        .await;
}

async fn mount_search(server: &MockServer, needle: &str, nodes: Vec<serde_json::Value>) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains(needle))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_response(nodes)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn shared_pull_request_is_listed_once() {
    let server = MockServer::start().await;
    mount_members(&server, &["alice", "bob"]).await;
    let shared = pull_request("PR_shared", "Pair work", "alice", "2024-03-01T09:00:00Z");
    mount_search(&server, "author:alice", vec![shared.clone()]).await;
    mount_search(&server, "author:bob", vec![shared]).await;

    let fetcher = fetcher(&server, memory_settings());
    let mut seen = Vec::new();
    let mut record = |percent: f64| seen.push(percent);
    let mut invalid_token = false;

    let pull_requests = fetcher
        .fetch_pull_requests("acme", "team-black", &mut record, || invalid_token = true)
        .await
        .unwrap();

    assert!(!invalid_token);
    assert_eq!(pull_requests.len(), 1);
    let pr = &pull_requests[0];
    assert_eq!(pr.id, "PR_shared");
    assert_eq!(pr.repository_name, "api");
    assert_eq!(pr.last_commit_checks.result, Some(CheckResult::Success));
    assert_eq!(pr.last_commit_checks.commit_checks[0].description, "Completed in 5 minutes");
    assert!(pr.last_commit_checks.commit_checks[0].required);

    assert_eq!(seen.first(), Some(&10.0));
    assert_eq!(seen.last(), Some(&100.0));
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn results_are_sorted_newest_first() {
    let server = MockServer::start().await;
    mount_members(&server, &["alice", "bob"]).await;
    mount_search(
        &server,
        "author:alice",
        vec![pull_request("PR_old", "Old", "alice", "2024-01-01T00:00:00Z")],
    )
    .await;
    mount_search(
        &server,
        "author:bob",
        vec![pull_request("PR_new", "New", "bob", "2024-05-01T00:00:00Z")],
    )
    .await;

    let fetcher = fetcher(&server, memory_settings());
    let pull_requests = fetcher
        .fetch_pull_requests("acme", "team-black", &mut |_: f64| {}, || {})
        .await
        .unwrap();

    let titles: Vec<_> = pull_requests.iter().map(|pr| pr.title.as_str()).collect();
    assert_eq!(titles, ["New", "Old"]);
}

#[tokio::test]
async fn empty_team_finishes_immediately() {
    let server = MockServer::start().await;
    mount_members(&server, &[]).await;

    let fetcher = fetcher(&server, memory_settings());
    let mut seen = Vec::new();
    let mut record = |percent: f64| seen.push(percent);

    let pull_requests = fetcher
        .fetch_pull_requests("acme", "team-black", &mut record, || {})
        .await
        .unwrap();

    assert!(pull_requests.is_empty());
    assert_eq!(seen, [100.0]);
}

#[tokio::test]
async fn rejected_token_is_reported_not_raised() {
    for status in [401, 403] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "bearer test-token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "message": "Bad credentials" })))
            .mount(&server)
            .await;

        let fetcher = fetcher(&server, memory_settings());
        let mut seen = Vec::new();
        let mut record = |percent: f64| seen.push(percent);
        let mut invalid_token = false;

        let pull_requests = fetcher
            .fetch_pull_requests("acme", "team-black", &mut record, || invalid_token = true)
            .await
            .unwrap();

        assert!(invalid_token, "status {status}");
        assert!(pull_requests.is_empty(), "status {status}");
        assert_eq!(seen, [100.0], "status {status}");
    }
}

#[tokio::test]
async fn rejected_token_during_search_is_an_error() {
    for status in [401, 403] {
        let server = MockServer::start().await;
        mount_members(&server, &["alice"]).await;
        Mock::given(method("POST"))
            .and(body_string_contains("author:alice"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let fetcher = fetcher(&server, memory_settings());
        let mut invalid_token = false;
        let result = fetcher
            .fetch_pull_requests("acme", "team-black", &mut |_: f64| {}, || invalid_token = true)
            .await;

        assert!(result.is_err(), "status {status}");
        assert!(!invalid_token, "status {status}");
    }
}

#[tokio::test]
async fn progress_stays_within_bounds_for_uneven_query_counts() {
    let members = ["m1", "m2", "m3", "m4", "m5", "m6", "m7"];
    let server = MockServer::start().await;
    mount_members(&server, &members).await;
    Mock::given(method("POST"))
        .and(body_string_contains("author:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_response(Vec::new())))
        .expect(7)
        .mount(&server)
        .await;

    let fetcher = fetcher(&server, memory_settings());
    let mut seen = Vec::new();
    let mut record = |percent: f64| seen.push(percent);
    fetcher
        .fetch_pull_requests("acme", "team-black", &mut record, || {})
        .await
        .unwrap();

    assert_eq!(seen.len(), 9);
    assert_eq!(seen.first(), Some(&10.0));
    assert!(seen.iter().all(|percent| *percent <= 100.0), "{seen:?}");
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]), "{seen:?}");
    assert_eq!(seen.last(), Some(&100.0));
}

#[tokio::test]
async fn other_failures_propagate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let fetcher = fetcher(&server, memory_settings());
    let mut invalid_token = false;
    let result = fetcher
        .fetch_pull_requests("acme", "team-black", &mut |_: f64| {}, || invalid_token = true)
        .await;

    assert!(result.is_err());
    assert!(!invalid_token);
}

#[tokio::test]
async fn graphql_errors_fail_the_search() {
    let server = MockServer::start().await;
    mount_members(&server, &["alice"]).await;
    Mock::given(method("POST"))
        .and(body_string_contains("author:alice"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "errors": [{ "message": "Something went wrong" }] })),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher(&server, memory_settings());
    let err = fetcher
        .fetch_pull_requests("acme", "team-black", &mut |_: f64| {}, || {})
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Something went wrong"));
}

#[tokio::test]
async fn saved_repositories_add_a_query_whose_copy_wins() {
    let server = MockServer::start().await;
    mount_members(&server, &["alice"]).await;
    mount_search(
        &server,
        "author:alice",
        vec![pull_request("PR_1", "Seen by author", "alice", "2024-03-01T09:00:00Z")],
    )
    .await;
    mount_search(
        &server,
        "repo:acme/api repo:acme/web",
        vec![
            pull_request("PR_1", "Seen by repository", "alice", "2024-03-01T09:00:00Z"),
            pull_request("PR_2", "Outside contributor", "mallory", "2024-02-01T09:00:00Z"),
        ],
    )
    .await;

    let settings = Arc::new(MemorySettings::default());
    settings
        .partial_save_team("team-black", vec!["acme/api".into(), "acme/web".into()])
        .unwrap();

    let fetcher = fetcher(&server, settings);
    let mut seen = Vec::new();
    let mut record = |percent: f64| seen.push(percent);
    let pull_requests = fetcher
        .fetch_pull_requests("acme", "team-black", &mut record, || {})
        .await
        .unwrap();

    let titles: Vec<_> = pull_requests.iter().map(|pr| pr.title.as_str()).collect();
    assert_eq!(titles, ["Seen by repository", "Outside contributor"]);
    assert_eq!(seen.len(), 4);
    assert_eq!(seen.last(), Some(&100.0));
}

#[tokio::test]
async fn superseded_reload_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("members(first: 100)"))
        .and(body_string_contains("team-slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(members_response(&["alice"]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("members(first: 100)"))
        .and(body_string_contains("team-fast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(members_response(&["bob"])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("author:alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_response(vec![pull_request(
            "PR_a", "Slow team", "alice", "2024-03-01T09:00:00Z",
        )])))
        .mount(&server)
        .await;
    mount_search(
        &server,
        "author:bob",
        vec![pull_request("PR_b", "Fast team", "bob", "2024-03-02T09:00:00Z")],
    )
    .await;

    let fetcher = fetcher(&server, memory_settings());
    let tracker = ReloadTracker::new();
    let mut stale_progress = Vec::new();
    let mut record_stale = |percent: f64| stale_progress.push(percent);

    let slow = fetcher.fetch_latest_pull_requests(&tracker, "acme", "team-slow", &mut record_stale, || {});
    let fast = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        fetcher
            .fetch_latest_pull_requests(&tracker, "acme", "team-fast", &mut |_: f64| {}, || {})
            .await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    assert!(slow.unwrap().is_none());
    let fast = fast.unwrap().unwrap();
    assert_eq!(fast.len(), 1);
    assert_eq!(fast[0].title, "Fast team");
    assert!(stale_progress.is_empty());
}

#[tokio::test]
async fn superseded_reload_does_not_report_rejected_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("members(first: 100)"))
        .and(body_string_contains("team-slow"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("members(first: 100)"))
        .and(body_string_contains("team-fast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(members_response(&[])))
        .mount(&server)
        .await;

    let fetcher = fetcher(&server, memory_settings());
    let tracker = ReloadTracker::new();
    let mut stale_invalid_token = false;

    let mut slow_progress = |_: f64| {};
    let slow = fetcher.fetch_latest_pull_requests(&tracker, "acme", "team-slow", &mut slow_progress, || {
        stale_invalid_token = true
    });
    let fast = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        fetcher
            .fetch_latest_pull_requests(&tracker, "acme", "team-fast", &mut |_: f64| {}, || {})
            .await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    assert!(slow.unwrap().is_none());
    assert!(fast.unwrap().unwrap().is_empty());
    assert!(!stale_invalid_token);
}

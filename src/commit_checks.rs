//! Turns the head commit's check suites, legacy statuses and status rollup
//! into one ordered list of [`CommitCheck`]s.

use chrono::Duration;

use crate::graphql::{
    CheckConclusion, CheckStatus, RawCheckRun, RawCheckSuiteApp, RawCommitWithChecks,
    RawStatusContext, StatusState,
};
use crate::models::{CheckResult, CommitCheck, CommitChecker, LastCommitChecks};

const DEFAULT_CHECKER_BACKGROUND: &str = "000000";

pub fn check_run_result(status: &CheckStatus, conclusion: Option<CheckConclusion>) -> CheckResult {
    match status {
        CheckStatus::Completed => match conclusion {
            Some(CheckConclusion::Success) => CheckResult::Success,
            Some(CheckConclusion::Skipped) | Some(CheckConclusion::Neutral) => CheckResult::Skipped,
            _ => CheckResult::Failure,
        },
        CheckStatus::InProgress => CheckResult::InProgress,
        CheckStatus::Pending | CheckStatus::Queued | CheckStatus::Waiting | CheckStatus::Requested => {
            CheckResult::Pending
        }
        CheckStatus::Unknown(_) => CheckResult::Failure,
    }
}

/// Maps a legacy status or rollup state onto a check result.
pub fn status_state_result(state: StatusState) -> CheckResult {
    match state {
        StatusState::Expected => CheckResult::InProgress,
        StatusState::Pending => CheckResult::Pending,
        StatusState::Success => CheckResult::Success,
        _ => CheckResult::Failure,
    }
}

pub fn check_run_description(run: &RawCheckRun) -> String {
    if run.status != CheckStatus::Completed {
        return enumeration_to_sentence_case(run.status.as_str());
    }

    if matches!(run.conclusion, Some(CheckConclusion::Neutral) | Some(CheckConclusion::Skipped)) {
        return "Skipped".to_string();
    }

    match (run.started_at, run.completed_at) {
        (Some(started_at), Some(completed_at)) => {
            let run_time = humanize_duration(completed_at - started_at);
            enumeration_to_sentence_case(&format!("{} in {}", run.status.as_str(), run_time))
        }
        // Without both timestamps there is no elapsed time to show.
        _ => enumeration_to_sentence_case(run.status.as_str()),
    }
}

/// Renders a duration the way people say it: "a few seconds", "5 minutes",
/// "an hour", "3 days". The sign is ignored.
pub fn humanize_duration(duration: Duration) -> String {
    let millis = duration.num_milliseconds().unsigned_abs() as f64;
    let seconds = (millis / 1_000.0).round();
    let minutes = (millis / 60_000.0).round();
    let hours = (millis / 3_600_000.0).round();
    let days_exact = millis / 86_400_000.0;
    let days = days_exact.round();
    let months_exact = days_exact * 4_800.0 / 146_097.0;
    let months = months_exact.round();
    let years = (months_exact / 12.0).round();

    if seconds <= 44.0 {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{} minutes", minutes)
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{} hours", hours)
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{} days", days)
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{} months", months)
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{} years", years)
    }
}

/// `IN_PROGRESS` -> `In progress`, `COMPLETED in 5 minutes` -> `Completed in 5 minutes`.
pub fn enumeration_to_sentence_case(text: &str) -> String {
    to_sentence_case(&text.to_lowercase().replace('_', " "))
}

/// Capitalizes the first letter of every sentence.
pub fn to_sentence_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut sentence_start = true;

    for c in text.chars() {
        if sentence_start && c.is_ascii_lowercase() {
            result.push(c.to_ascii_uppercase());
            sentence_start = false;
            continue;
        }

        match c {
            '.' | '?' | '!' => sentence_start = true,
            c if c.is_alphanumeric() || c == '_' => sentence_start = false,
            _ => {}
        }
        result.push(c);
    }

    result
}

fn checker_for_app(app: Option<&RawCheckSuiteApp>) -> CommitChecker {
    let app = app.cloned().unwrap_or_default();
    CommitChecker {
        login: app.slug,
        avatar_url: app.logo_url,
        background_color: app.logo_background_color,
    }
}

fn check_from_run(run: &RawCheckRun, checker: &CommitChecker) -> CommitCheck {
    CommitCheck {
        id: run.id.clone(),
        name: run.name.clone(),
        description: check_run_description(run),
        result: check_run_result(&run.status, run.conclusion),
        required: false,
        run_url: run.permalink.clone(),
        started_at: run.started_at,
        completed_at: run.completed_at,
        checker: checker.clone(),
    }
}

fn check_from_status_context(context: &RawStatusContext) -> CommitCheck {
    CommitCheck {
        id: context.id.clone(),
        name: context.context.clone(),
        description: context.description.clone().unwrap_or_default(),
        result: status_state_result(context.state),
        required: false,
        run_url: context.target_url.clone().unwrap_or_default(),
        started_at: Some(context.created_at),
        completed_at: None,
        checker: CommitChecker {
            login: context
                .creator
                .as_ref()
                .map(|creator| creator.login.clone())
                .unwrap_or_default(),
            avatar_url: context.avatar_url.clone().unwrap_or_default(),
            background_color: DEFAULT_CHECKER_BACKGROUND.to_string(),
        },
    }
}

fn required_placeholder(index: usize, context_name: &str) -> CommitCheck {
    CommitCheck {
        id: format!("required-{}", index),
        name: context_name.to_string(),
        description: String::new(),
        result: CheckResult::Pending,
        required: true,
        run_url: String::new(),
        started_at: None,
        completed_at: None,
        checker: CommitChecker {
            login: context_name.to_uppercase(),
            avatar_url: String::new(),
            background_color: DEFAULT_CHECKER_BACKGROUND.to_string(),
        },
    }
}

/// Marks checks named in `required_contexts` as required and appends a
/// pending placeholder for every required name no check reported yet.
pub fn mark_required(commit_checks: &mut Vec<CommitCheck>, required_contexts: &[String]) {
    for (index, context_name) in required_contexts.iter().enumerate() {
        match commit_checks
            .iter_mut()
            .find(|check| &check.name == context_name)
        {
            Some(check) => check.required = true,
            None => commit_checks.push(required_placeholder(index, context_name)),
        }
    }
}

/// Sorts checks by their position in the rollup's context list.
///
/// Checks the rollup does not know about get key -1 and so land in front of
/// every known one, keeping their relative order.
pub fn order_by_rollup(commit_checks: &mut [CommitCheck], rollup_ids: &[&str]) {
    commit_checks.sort_by_key(|check| {
        rollup_ids
            .iter()
            .position(|id| *id == check.id)
            .map_or(-1, |position| position as i64)
    });
}

pub fn collect_commit_checks(commit: &RawCommitWithChecks, required_contexts: &[String]) -> Vec<CommitCheck> {
    let mut commit_checks = Vec::new();

    for suite in commit.check_suites.iter().flat_map(|suites| &suites.nodes) {
        let checker = checker_for_app(suite.app.as_ref());
        for run in suite.check_runs.iter().flat_map(|runs| &runs.nodes) {
            commit_checks.push(check_from_run(run, &checker));
        }
    }

    if let Some(status) = &commit.status {
        commit_checks.extend(status.contexts.iter().map(check_from_status_context));
    }

    mark_required(&mut commit_checks, required_contexts);

    if let Some(rollup) = &commit.status_check_rollup {
        let rollup_ids: Vec<&str> = rollup
            .contexts
            .nodes
            .iter()
            .filter_map(|context| context.id.as_deref())
            .collect();
        order_by_rollup(&mut commit_checks, &rollup_ids);
    }

    commit_checks
}

/// Builds the checks aggregate for a head commit. The composite result is
/// taken from the status rollup, not folded from the individual checks.
pub fn last_commit_checks(commit: &RawCommitWithChecks, required_contexts: &[String]) -> LastCommitChecks {
    LastCommitChecks {
        commit_checks: collect_commit_checks(commit, required_contexts),
        result: commit
            .status_check_rollup
            .as_ref()
            .map(|rollup| status_state_result(rollup.state)),
    }
}

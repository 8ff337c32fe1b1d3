use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use daily_helper::config::AppConfig;
use daily_helper::fetcher::{DataFetcher, ReloadTracker};
use daily_helper::github_client::GitHubClient;
use daily_helper::labels::{LabelFilter, summarize_labels};
use daily_helper::models::{CheckResult, LastCommitChecks, PullRequest};
use daily_helper::pagination::{PageNavigation, RepositoryBrowser};
use daily_helper::settings::{JsonFileSettings, Settings, SettingsPatch, SettingsRepository};

/// Daily Helper - Open pull requests of a GitHub team at a glance
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to config file
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// GitHub token, overrides GITHUB_TOKEN and saved settings
    #[clap(long)]
    token: Option<String>,

    /// GitHub organization, overrides saved settings and config
    #[clap(long)]
    org: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List open pull requests of a team
    PullRequests {
        /// Team to load, defaults to the first configured team
        #[clap(short, long)]
        team: Option<String>,

        /// Hide pull requests whose labels are all hidden
        #[clap(long = "hide-label")]
        hide_labels: Vec<String>,

        /// Hide pull requests without labels
        #[clap(long)]
        hide_unlabeled: bool,

        /// Print JSON instead of text
        #[clap(long)]
        json: bool,

        /// Reload every N seconds instead of exiting
        #[clap(short, long)]
        interval: Option<u64>,
    },
    /// Show commit checks of a single pull request
    Checks {
        /// Repository name inside the organization
        #[clap(short, long)]
        repo: String,

        /// Pull request number
        #[clap(short, long)]
        number: u64,

        /// Print JSON instead of text
        #[clap(long)]
        json: bool,
    },
    /// Browse a team's repositories and choose which ones to follow
    Repositories {
        #[clap(short, long)]
        team: Option<String>,
    },
    /// List organizations of the token's owner
    Organizations,
    /// Save a GitHub token to the settings file
    Login {
        #[clap(long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let config = AppConfig::from_file(&args.config)
        .context("Failed to load configuration")?;
    let settings: Arc<dyn SettingsRepository> = Arc::new(JsonFileSettings::new(&config.settings_path));
    let saved = settings.load().context("Failed to load settings")?;

    if let Command::Login { token } = &args.command {
        settings.partial_save(SettingsPatch {
            github_token: Some(token.clone()),
            ..SettingsPatch::default()
        })?;
        info!("Saved GitHub token to {}", config.settings_path);
        return Ok(());
    }

    let token = resolve_token(&args, &saved, &config)?;
    let org_name = args
        .org
        .clone()
        .or_else(|| saved.org_name.clone())
        .unwrap_or_else(|| config.organization.clone());

    let client = GitHubClient::with_api_url(&config.api_url, &token)?;
    let fetcher = DataFetcher::new(client, Arc::clone(&settings))
        .with_settle_delay(Duration::from_millis(config.progress_settle_ms));

    info!("Organization: {}", org_name);

    let result = match args.command {
        Command::PullRequests {
            team,
            hide_labels,
            hide_unlabeled,
            json,
            interval,
        } => {
            let team_name = resolve_team(team, &saved, &config);
            let mut filter = LabelFilter::new();
            for label in &hide_labels {
                filter.hide_label(label);
            }
            filter.set_hide_unlabeled(hide_unlabeled);

            match interval {
                Some(seconds) => {
                    watch_pull_requests(&fetcher, &org_name, &team_name, &filter, json, seconds).await
                }
                None => {
                    show_pull_requests(&fetcher, &ReloadTracker::new(), &org_name, &team_name, &filter, json).await
                }
            }
        }
        Command::Checks { repo, number, json } => show_checks(&fetcher, &org_name, &repo, number, json).await,
        Command::Repositories { team } => {
            let team_name = resolve_team(team, &saved, &config);
            browse_repositories(&fetcher, &org_name, &team_name, config.page_size).await
        }
        Command::Organizations => show_organizations(&fetcher).await,
        Command::Login { .. } => Ok(()),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn resolve_token(args: &Args, saved: &Settings, config: &AppConfig) -> Result<String> {
    args.token
        .clone()
        .or_else(|| env::var("GITHUB_TOKEN").ok())
        .or_else(|| saved.github_token.clone())
        .or_else(|| config.github_token.clone())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| anyhow::anyhow!("GitHub token is not provided; run `daily-helper login --token <TOKEN>`"))
}

fn resolve_team(team: Option<String>, saved: &Settings, config: &AppConfig) -> String {
    team.or_else(|| saved.team_names.first().cloned())
        .unwrap_or_else(|| config.team_names[0].clone())
}

async fn show_pull_requests(
    fetcher: &DataFetcher,
    tracker: &ReloadTracker,
    org_name: &str,
    team_name: &str,
    filter: &LabelFilter,
    json: bool,
) -> Result<()> {
    let mut token_rejected = false;
    let mut progress = |percent: f64| {
        eprint!("\rLoading pull requests of {}: {:>3.0}%", team_name, percent);
    };

    let pull_requests = fetcher
        .fetch_latest_pull_requests(tracker, org_name, team_name, &mut progress, || token_rejected = true)
        .await?;
    eprintln!();

    if token_rejected {
        return Err(anyhow::anyhow!(
            "GitHub token is not provided or is invalid, run `daily-helper login --token <TOKEN>`"
        ));
    }

    let Some(pull_requests) = pull_requests else {
        return Ok(());
    };

    let visible: Vec<&PullRequest> = filter.apply(&pull_requests).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&visible)?);
        return Ok(());
    }

    for pr in &visible {
        print_pull_request(pr);
    }

    let summary = summarize_labels(&pull_requests);
    println!();
    println!(
        "{} of {} pull requests shown ({} without labels)",
        visible.len(),
        pull_requests.len(),
        summary.unlabeled
    );
    for label in &summary.labels {
        let marker = if filter.is_label_hidden(&label.name) { "hidden" } else { "shown" };
        println!("  {} ({}) #{} {}", label.name, label.count, label.color, marker);
    }

    Ok(())
}

async fn watch_pull_requests(
    fetcher: &DataFetcher,
    org_name: &str,
    team_name: &str,
    filter: &LabelFilter,
    json: bool,
    seconds: u64,
) -> Result<()> {
    let tracker = ReloadTracker::new();
    let polling_interval = Duration::from_secs(seconds);
    info!("Polling interval: {} seconds", seconds);

    loop {
        match show_pull_requests(fetcher, &tracker, org_name, team_name, filter, json).await {
            Ok(()) => (),
            Err(e) => error!("Error loading pull requests: {:#}", e),
        }

        time::sleep(polling_interval).await;
    }
}

fn check_marker(result: Option<CheckResult>) -> &'static str {
    match result {
        Some(CheckResult::Success) => "passed",
        Some(CheckResult::Failure) => "failed",
        Some(CheckResult::InProgress) => "running",
        Some(CheckResult::Pending) => "pending",
        Some(CheckResult::Skipped) => "skipped",
        None => "no checks",
    }
}

fn print_pull_request(pr: &PullRequest) {
    let draft = if pr.is_draft { " [draft]" } else { "" };
    println!("{} #{} {}{}", pr.repository_name, pr.number, pr.title, draft);
    println!(
        "    by {} on {} into {} | {} comments | checks: {} ({}/{})",
        pr.author.login,
        pr.created_at.format("%Y-%m-%d %H:%M"),
        pr.base_ref,
        pr.comments,
        check_marker(pr.last_commit_checks.display_result()),
        pr.last_commit_checks.passed_count(),
        pr.last_commit_checks.commit_checks.len()
    );

    let reviews: Vec<String> = pr
        .visible_reviews()
        .map(|review| format!("{}:{:?}", review.reviewer.login, review.state))
        .collect();
    let requested: Vec<&str> = pr.requested_reviewers.iter().map(|user| user.login.as_str()).collect();
    if !reviews.is_empty() || !requested.is_empty() {
        println!("    reviews: {} requested: {}", reviews.join(" "), requested.join(" "));
    }

    if !pr.contributors.is_empty() {
        let contributors: Vec<&str> = pr.contributors.iter().map(|user| user.login.as_str()).collect();
        println!("    contributors: {}", contributors.join(" "));
    }

    if !pr.labels.is_empty() {
        let labels: Vec<&str> = pr.labels.iter().map(|label| label.name.as_str()).collect();
        println!("    labels: {}", labels.join(", "));
    }
    println!("    {}", pr.url);
}

fn print_checks(checks: &LastCommitChecks) {
    println!(
        "{} ({} of {} passed)",
        checks.summary(),
        checks.passed_count(),
        checks.commit_checks.len()
    );
    for check in &checks.commit_checks {
        let required = if check.required { " [required]" } else { "" };
        println!(
            "  {:<8} {}{} by {}: {}",
            check_marker(Some(check.result)),
            check.name,
            required,
            check.checker.login,
            check.description
        );
        if !check.run_url.is_empty() {
            println!("           {}", check.run_url);
        }
    }
}

async fn show_checks(fetcher: &DataFetcher, org_name: &str, repo: &str, number: u64, json: bool) -> Result<()> {
    let checks = fetcher.refresh_last_commit_checks(org_name, repo, number).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&checks)?);
    } else {
        print_checks(&checks);
    }
    Ok(())
}

async fn show_organizations(fetcher: &DataFetcher) -> Result<()> {
    for organization in fetcher.fetch_organizations().await? {
        match &organization.name {
            Some(name) => println!("{} ({})", organization.login, name),
            None => println!("{}", organization.login),
        }
    }
    Ok(())
}

const REPOSITORY_HELP: &str =
    "n next, p previous, f first, l last, t <repo> toggle, a select page, u unselect all, r restore, s save, q quit";

async fn browse_repositories(fetcher: &DataFetcher, org_name: &str, team_name: &str, page_size: u32) -> Result<()> {
    let mut browser = RepositoryBrowser::new();
    browser.switch_team(team_name, fetcher.settings())?;

    let stdin = io::stdin();
    let mut reload = true;

    loop {
        if reload {
            let page = browser.load_page(fetcher, org_name, page_size).await?;
            println!("{} repositories of {}", page.total, team_name);
            reload = false;
        }

        if let Some(page) = browser.page() {
            for repository in &page.team_repositories {
                let mark = if browser.is_selected(&repository.name_with_owner) { "x" } else { " " };
                println!("  [{}] {} ({:?})", mark, repository.name_with_owner, repository.permission);
            }
        }
        println!("{}", REPOSITORY_HELP);
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("n"), _) if browser.has_next_page() => {
                browser.navigate(PageNavigation::NextPage);
                reload = true;
            }
            (Some("p"), _) if browser.has_previous_page() => {
                browser.navigate(PageNavigation::PreviousPage);
                reload = true;
            }
            (Some("n"), _) | (Some("p"), _) => warn!("No more pages in that direction"),
            (Some("f"), _) => {
                browser.navigate(PageNavigation::FirstPage);
                reload = true;
            }
            (Some("l"), _) => {
                browser.navigate(PageNavigation::LastPage);
                reload = true;
            }
            (Some("t"), Some(repository)) => browser.toggle(repository),
            (Some("a"), _) => browser.select_all_on_page(),
            (Some("u"), _) => browser.unselect_all(),
            (Some("r"), _) => browser.restore(fetcher.settings())?,
            (Some("s"), _) => {
                browser.save(fetcher.settings())?;
                let count = browser.selected().count();
                info!("Saved {} repositories for {}", count, team_name);
            }
            (Some("q"), _) => return Ok(()),
            _ => println!("Unknown command"),
        }
    }
}

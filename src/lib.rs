//! Open pull requests of a GitHub team, with reviews, commit checks and
//! labels, gathered from the GitHub GraphQL API.

pub mod commit_checks;
pub mod config;
pub mod fetcher;
pub mod github_client;
pub mod graphql;
pub mod labels;
pub mod models;
pub mod normalizer;
pub mod pagination;
pub mod settings;

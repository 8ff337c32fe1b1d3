use anyhow::Context;
use log::debug;
use reqwest::{Client, StatusCode, header};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::graphql::{GraphQlRequest, GraphQlResponse};

pub const DEFAULT_API_URL: &str = "https://api.github.com/graphql";

const USER_AGENT: &str = concat!("daily-helper/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub rejected the token ({0})")]
    Unauthorized(StatusCode),

    #[error("GitHub API request failed with status {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("GitHub GraphQL errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("GitHub GraphQL response carried no data")]
    MissingData,

    #[error("Failed to send request to GitHub: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to parse GitHub response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GitHubError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GitHubError::Unauthorized(_))
    }
}

/// GitHub GraphQL API client
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    auth_header: String,
}

impl GitHubClient {
    pub fn new(token: &str) -> anyhow::Result<Self> {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    /// Client for a GitHub Enterprise endpoint or a test server.
    pub fn with_api_url(api_url: &str, token: &str) -> anyhow::Result<Self> {
        let api_url = Url::parse(api_url)
            .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        // GitHub refuses requests without a user agent
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url,
            auth_header: format!("bearer {}", token),
        })
    }

    /// Replaces the token used for every following request.
    pub fn set_token(&mut self, token: &str) {
        self.auth_header = format!("bearer {}", token);
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Runs one GraphQL document and decodes its `data`.
    pub async fn query<T: DeserializeOwned>(&self, request: &GraphQlRequest) -> Result<T, GitHubError> {
        debug!("POST {} variables={}", self.api_url, request.variables);

        let response = self
            .client
            .post(self.api_url.clone())
            .header(header::AUTHORIZATION, &self.auth_header)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GitHubError::Unauthorized(status));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("Unable to read response body"));
            return Err(GitHubError::Http { status, body });
        }

        let bytes = response.bytes().await?;
        let envelope: GraphQlResponse<T> = serde_json::from_slice(&bytes)?;

        if !envelope.errors.is_empty() {
            return Err(GitHubError::GraphQl(
                envelope.errors.into_iter().map(|error| error.message).collect(),
            ));
        }

        envelope.data.ok_or(GitHubError::MissingData)
    }
}

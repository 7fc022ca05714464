//! Typed façade over the GitHub REST and GraphQL APIs.
//!
//! One method per read-only endpoint the exporter needs; this is not a
//! general-purpose GitHub client. All I/O goes through the injected
//! [`HttpTransport`], every call threads the caller's cancellation token,
//! list endpoints request `per_page=100` and follow trusted `Link`
//! pagination, and non-2xx responses become structured API errors carrying
//! rate limit state parsed from the response headers.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::pagination::{next_link, trusted_next_url};
use super::types::{
    ActionsJob, ActionsRun, CommitDetail, CommitSummary, DiffFile, Issue, IssueComment, JobsPage,
    Pull, Review, ReviewComment,
};
use crate::error::{ExportError, RateLimitSnapshot};
use crate::http::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport};

/// Default API root; overridable for GitHub Enterprise installations.
pub const DEFAULT_API_ROOT: &str = "https://api.github.com";

const ACCEPT_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "hubmark";

pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    api_root: Url,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client against the public GitHub API.
    ///
    /// An empty token is treated as no token; unauthenticated requests
    /// still work against public repositories at a lower rate limit.
    pub fn new(transport: Arc<dyn HttpTransport>, token: Option<String>) -> Self {
        let api_root = Url::parse(DEFAULT_API_ROOT).expect("default API root is a valid URL");
        Self::with_api_root(transport, api_root, token)
    }

    /// Create a client against a custom API root.
    pub fn with_api_root(
        transport: Arc<dyn HttpTransport>,
        api_root: Url,
        token: Option<String>,
    ) -> Self {
        Self {
            transport,
            api_root,
            token: token.filter(|t| !t.is_empty()),
        }
    }

    #[must_use]
    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    // ---------- endpoints ----------

    pub async fn get_issue(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Issue, ExportError> {
        let url = self.route(&format!("/repos/{owner}/{repo}/issues/{number}"))?;
        self.get_json(url, cancel).await
    }

    pub async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<IssueComment>, ExportError> {
        let url = self.route(&format!(
            "/repos/{owner}/{repo}/issues/{number}/comments?per_page=100"
        ))?;
        self.get_paginated(url, cancel).await
    }

    pub async fn get_pull(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Pull, ExportError> {
        let url = self.route(&format!("/repos/{owner}/{repo}/pulls/{number}"))?;
        self.get_json(url, cancel).await
    }

    pub async fn list_pull_files(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<DiffFile>, ExportError> {
        let url = self.route(&format!(
            "/repos/{owner}/{repo}/pulls/{number}/files?per_page=100"
        ))?;
        self.get_paginated(url, cancel).await
    }

    pub async fn list_pull_commits(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommitSummary>, ExportError> {
        let url = self.route(&format!(
            "/repos/{owner}/{repo}/pulls/{number}/commits?per_page=100"
        ))?;
        self.get_paginated(url, cancel).await
    }

    pub async fn list_pull_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Review>, ExportError> {
        let url = self.route(&format!(
            "/repos/{owner}/{repo}/pulls/{number}/reviews?per_page=100"
        ))?;
        self.get_paginated(url, cancel).await
    }

    pub async fn list_review_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReviewComment>, ExportError> {
        let url = self.route(&format!(
            "/repos/{owner}/{repo}/pulls/{number}/comments?per_page=100"
        ))?;
        self.get_paginated(url, cancel).await
    }

    /// Raw review-thread pages; field extraction lives in the thread
    /// resolution module because the payload shape is not stable.
    pub async fn list_pull_threads(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<serde_json::Value>, ExportError> {
        let url = self.route(&format!(
            "/repos/{owner}/{repo}/pulls/{number}/threads?per_page=100"
        ))?;
        self.get_paginated(url, cancel).await
    }

    pub async fn get_commit(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        cancel: &CancellationToken,
    ) -> Result<CommitDetail, ExportError> {
        let url = self.route(&format!("/repos/{owner}/{repo}/commits/{sha}"))?;
        self.get_json(url, cancel).await
    }

    pub async fn get_actions_run(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
        cancel: &CancellationToken,
    ) -> Result<ActionsRun, ExportError> {
        let url = self.route(&format!("/repos/{owner}/{repo}/actions/runs/{run_id}"))?;
        self.get_json(url, cancel).await
    }

    pub async fn list_actions_jobs(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<ActionsJob>, ExportError> {
        let url = self.route(&format!(
            "/repos/{owner}/{repo}/actions/runs/{run_id}/jobs?per_page=100"
        ))?;
        self.get_paginated_map(url, |page: JobsPage| page.jobs, cancel)
            .await
    }

    /// Fetch a job's log as plain text. The endpoint redirects to blob
    /// storage; the transport follows the redirect.
    pub async fn get_actions_job_logs(
        &self,
        owner: &str,
        repo: &str,
        job_id: u64,
        cancel: &CancellationToken,
    ) -> Result<String, ExportError> {
        let url = self.route(&format!("/repos/{owner}/{repo}/actions/jobs/{job_id}/logs"))?;
        let response = self.send(self.build_get(url), cancel).await?;
        check_status(&response)?;
        Ok(response.text())
    }

    /// Execute a GraphQL query against `{api_root}/graphql`.
    pub async fn post_graphql(
        &self,
        body: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ExportError> {
        let url = self.route("/graphql")?;
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: url.to_string(),
            headers: self.base_headers(),
            body: serde_json::to_vec(body)
                .map_err(|e| ExportError::Other(format!("Failed to encode GraphQL query: {e}")))?,
        };
        let response = self.send(request, cancel).await?;
        check_status(&response)?;
        decode_json(&response)
    }

    // ---------- request plumbing ----------

    fn route(&self, path: &str) -> Result<Url, ExportError> {
        // Append to the root's own path so an Enterprise base like
        // `https://ghe.example/api/v3` is preserved.
        let joined = format!("{}{}", self.api_root.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| ExportError::Other(format!("Invalid API route: {e}")))
    }

    fn base_headers(&self) -> HttpHeaders {
        let mut headers: HttpHeaders = vec![
            ("Accept".to_string(), ACCEPT_JSON.to_string()),
            ("X-GitHub-Api-Version".to_string(), API_VERSION.to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    fn build_get(&self, url: Url) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: self.base_headers(),
            body: Vec::new(),
        }
    }

    /// Send one request, racing it against the cancellation token. A
    /// cancelled token drops the in-flight transport future immediately.
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ExportError> {
        if cancel.is_cancelled() {
            return Err(ExportError::Aborted);
        }

        tracing::debug!(method = request.method.as_str(), url = %request.url, "GitHub API request");

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ExportError::Aborted),
            result = self.transport.send(request) => {
                result.map_err(|e| ExportError::Network(e.to_string()))
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        cancel: &CancellationToken,
    ) -> Result<T, ExportError> {
        let response = self.send(self.build_get(url), cancel).await?;
        check_status(&response)?;
        decode_json(&response)
    }

    /// Fetch every page of a plain-array list endpoint.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        first: Url,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, ExportError> {
        self.get_paginated_map(first, |page: Vec<T>| page, cancel)
            .await
    }

    /// Fetch every page of a list endpoint whose page shape needs
    /// unwrapping (e.g. the `{jobs: [...]}` envelope).
    async fn get_paginated_map<P, T, F>(
        &self,
        first: Url,
        extract: F,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, ExportError>
    where
        P: DeserializeOwned,
        F: Fn(P) -> Vec<T>,
    {
        let mut items: Vec<T> = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            let response = self.send(self.build_get(url), cancel).await?;
            check_status(&response)?;

            let page: P = decode_json(&response)?;
            items.extend(extract(page));

            // The next URL comes from the response, so it must pass the
            // origin trust check before another authenticated request.
            if let Some(raw) = response.header("link").and_then(next_link) {
                next = Some(trusted_next_url(&self.api_root, &raw)?);
            }
        }

        Ok(items)
    }
}

/// Wrap a non-2xx response in a structured API error.
fn check_status(response: &HttpResponse) -> Result<(), ExportError> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }

    let rate_limit = parse_rate_limit_headers(response);
    let message = parse_error_message(response);
    tracing::debug!(status = response.status, %message, "GitHub API error response");

    Err(ExportError::api(
        response.status,
        status_text(response.status),
        message,
        rate_limit,
    ))
}

/// Error body is JSON `{"message": ...}` when GitHub produced it, raw text
/// when a proxy or blob storage did.
fn parse_error_message(response: &HttpResponse) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&response.body)
        && let Some(message) = value.get("message").and_then(|m| m.as_str())
    {
        return message.to_string();
    }
    response.text()
}

fn parse_rate_limit_headers(response: &HttpResponse) -> RateLimitSnapshot {
    RateLimitSnapshot {
        remaining: response
            .header("x-ratelimit-remaining")
            .and_then(|v| v.parse().ok()),
        reset: response
            .header("x-ratelimit-reset")
            .and_then(|v| v.parse().ok()),
        retry_after: response
            .header("retry-after")
            .and_then(|v| v.parse().ok()),
    }
}

fn decode_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ExportError> {
    serde_json::from_slice(&response.body)
        .map_err(|e| ExportError::Other(format!("Failed to decode GitHub response: {e}")))
}

fn status_text(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

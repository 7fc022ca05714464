//! The export pipeline: request in, Markdown (or a typed failure) out.
//!
//! Per request the flow is: validate the target, resolve the effective
//! profile, derive the fetch plan, run the plan's API calls (independent
//! calls in parallel, per-item calls through the bounded executor and the
//! read-through caches), apply slicing and filtering, render. Degradable
//! per-item failures (one commit's detail, one job's log, the thread
//! resolution lookup) become silent fallbacks or warnings; cancellation is
//! never degraded and always surfaces as the aborted failure.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::cache::{TtlCache, cache_key};
use crate::error::{ExportError, ExportFailure, classify};
use crate::executor::run_ordered;
use crate::github::GitHubClient;
use crate::github::logs::{JobLog, parse_job_log};
use crate::github::threads::get_pull_review_thread_resolution;
use crate::github::types::{ActionsJob, CommitDetail, CommitSummary};
use crate::plan::{plan_actions_run, plan_issue, plan_pull};
use crate::profile::{
    ActionsRunOptions, ActionsRunProfile, ExportProfile, IssueProfile, PullOptions, PullProfile,
};
use crate::render::{PullRenderInput, render_actions_run, render_issue, render_pull};
use crate::timeline::{
    MarkerRange, TimelineEvent, build_timeline_events, slice_issue_comments, slice_pull_timeline,
};

/// Default parallelism for per-item fetches (commit details, job logs).
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default TTL for the commit-detail and job-log caches.
pub const DEFAULT_CACHE_TTL_MS: i64 = 5 * 60 * 1000;

const MISSING_TARGET: &str = "Export request is missing a valid target.";
const PROFILE_MISMATCH: &str = "Export profile does not match the requested target kind.";

/// What to export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Target {
    #[serde(rename_all = "camelCase")]
    Pull {
        owner: String,
        repo: String,
        number: u64,
    },
    #[serde(rename_all = "camelCase")]
    Issue {
        owner: String,
        repo: String,
        number: u64,
    },
    #[serde(rename_all = "camelCase")]
    ActionsRun {
        owner: String,
        repo: String,
        run_id: u64,
    },
}

impl Target {
    fn kind(&self) -> &'static str {
        match self {
            Target::Pull { .. } => "pull",
            Target::Issue { .. } => "issue",
            Target::ActionsRun { .. } => "actionsRun",
        }
    }
}

/// One export request. The id is caller-supplied and only used for log
/// correlation; cancellation arrives through the token, not the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub request_id: String,
    pub target: Target,
    #[serde(default)]
    pub selection: Option<MarkerRange>,
    #[serde(default)]
    pub profile: Option<ExportProfile>,
}

/// A successful export. Warnings are advisory; they never turn a success
/// into a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSuccess {
    pub markdown: String,
    pub warning: Option<String>,
}

/// Runs export requests against one GitHub client, with per-exporter
/// commit-detail and job-log caches.
pub struct Exporter {
    client: GitHubClient,
    concurrency: usize,
    auth_scope: Option<String>,
    commit_cache: TtlCache<CommitDetail>,
    log_cache: TtlCache<String>,
}

impl Exporter {
    #[must_use]
    pub fn new(client: GitHubClient) -> Self {
        Self {
            client,
            concurrency: DEFAULT_CONCURRENCY,
            auth_scope: None,
            commit_cache: TtlCache::new(DEFAULT_CACHE_TTL_MS),
            log_cache: TtlCache::new(DEFAULT_CACHE_TTL_MS),
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Key cache entries to an auth scope so a token change cannot serve
    /// another scope's cached data.
    #[must_use]
    pub fn with_auth_scope(mut self, scope: impl Into<String>) -> Self {
        self.auth_scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl_ms: i64) -> Self {
        self.commit_cache = TtlCache::new(ttl_ms);
        self.log_cache = TtlCache::new(ttl_ms);
        self
    }

    /// Run one export. Never returns partial Markdown: the result is
    /// either rendered output (plus warnings) or a classified failure.
    pub async fn run_export(
        &self,
        request: &ExportRequest,
        cancel: &CancellationToken,
    ) -> Result<ExportSuccess, ExportFailure> {
        tracing::info!(
            request_id = %request.request_id,
            kind = request.target.kind(),
            "starting export"
        );

        match self.execute(request, cancel).await {
            Ok(success) => {
                tracing::info!(
                    request_id = %request.request_id,
                    warning = success.warning.is_some(),
                    "export finished"
                );
                Ok(success)
            }
            Err(error) => {
                let failure = classify(&error);
                tracing::info!(
                    request_id = %request.request_id,
                    code = failure.code.as_str(),
                    "export failed"
                );
                Err(failure)
            }
        }
    }

    async fn execute(
        &self,
        request: &ExportRequest,
        cancel: &CancellationToken,
    ) -> Result<ExportSuccess, ExportError> {
        validate_target(&request.target)?;

        let selection = request.selection.as_ref();
        let profile = request.profile.as_ref();
        match &request.target {
            Target::Pull {
                owner,
                repo,
                number,
            } => {
                self.export_pull(owner, repo, *number, profile, selection, cancel)
                    .await
            }
            Target::Issue {
                owner,
                repo,
                number,
            } => {
                self.export_issue(owner, repo, *number, profile, selection, cancel)
                    .await
            }
            Target::ActionsRun {
                owner,
                repo,
                run_id,
            } => {
                self.export_actions_run(owner, repo, *run_id, profile, cancel)
                    .await
            }
        }
    }

    // ---------- pull ----------

    async fn export_pull(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        profile: Option<&ExportProfile>,
        selection: Option<&MarkerRange>,
        cancel: &CancellationToken,
    ) -> Result<ExportSuccess, ExportError> {
        let options: PullOptions = match profile {
            None => PullProfile::default().resolve(),
            Some(ExportProfile::Pull(p)) => p.resolve(),
            Some(_) => return Err(ExportError::InvalidRequest(PROFILE_MISMATCH.to_string())),
        };
        let plan = plan_pull(&options);
        let mut warnings: Vec<String> = Vec::new();

        let (pull, issue_comments, review_comments, reviews, files, commits) = tokio::try_join!(
            self.client.get_pull(owner, repo, number, cancel),
            maybe(
                plan.fetch_issue_comments,
                self.client.list_issue_comments(owner, repo, number, cancel),
            ),
            maybe(
                plan.fetch_review_comments,
                self.client.list_review_comments(owner, repo, number, cancel),
            ),
            maybe(
                plan.fetch_reviews,
                self.client.list_pull_reviews(owner, repo, number, cancel),
            ),
            maybe(
                plan.fetch_files,
                self.client.list_pull_files(owner, repo, number, cancel),
            ),
            maybe(
                plan.fetch_commits,
                self.client.list_pull_commits(owner, repo, number, cancel),
            ),
        )?;

        let issue_comments = issue_comments.unwrap_or_default();
        let mut review_comments = review_comments.unwrap_or_default();
        let reviews = reviews.unwrap_or_default();
        let files = files.unwrap_or_default();
        let commits = commits.unwrap_or_default();

        let mut commit_details: Vec<CommitDetail> = Vec::new();
        if plan.fetch_commit_details && !commits.is_empty() {
            let tasks: Vec<BoxFuture<'_, Result<CommitDetail, ExportError>>> = commits
                .iter()
                .map(|summary| self.commit_detail_task(owner, repo, summary, cancel))
                .collect();
            commit_details = run_ordered(tasks, self.concurrency, cancel).await?;
        }

        if options.smart_diff_mode && !commit_details.is_empty() {
            // Narrow each commit's diff to files still present in the PR's
            // final diff. Commits whose files all fall outside stay listed
            // with an empty diff rather than disappearing.
            let pr_files: HashSet<&str> = files.iter().map(|f| f.filename.as_str()).collect();
            for detail in &mut commit_details {
                if let Some(detail_files) = &mut detail.files {
                    detail_files.retain(|f| pr_files.contains(f.filename.as_str()));
                }
            }
        }

        if plan.fetch_thread_resolution {
            match get_pull_review_thread_resolution(&self.client, owner, repo, number, cancel)
                .await
            {
                Ok(resolution) => {
                    let mut unknown = 0usize;
                    review_comments.retain(|comment| {
                        match resolution.resolved_by_comment.get(&comment.id) {
                            Some(true) => false,
                            Some(false) => true,
                            None => {
                                unknown += 1;
                                true
                            }
                        }
                    });
                    if unknown > 0 {
                        warnings.push(format!(
                            "{unknown} review comment(s) had unknown resolution status and were kept."
                        ));
                    }
                }
                Err(error) if error.is_aborted() => return Err(error),
                Err(error) => {
                    tracing::debug!(%error, "thread resolution lookup failed");
                    warnings.push(
                        "Could not determine resolved review threads; resolved comments were not filtered."
                            .to_string(),
                    );
                }
            }
        }

        let has_selection = selection.is_some_and(|r| !r.is_empty());
        let mut issue_comments = issue_comments;
        let mut reviews = reviews;
        let mut commits = commits;
        let mut timeline: Option<Vec<TimelineEvent>> = None;

        if has_selection {
            let events =
                build_timeline_events(&commits, &issue_comments, &review_comments, &reviews);
            let sliced = slice_pull_timeline(events, selection)?;
            if let Some(w) = sliced.warning {
                warnings.push(w);
            }

            let mut sliced_commits = Vec::new();
            let mut sliced_issue_comments = Vec::new();
            let mut sliced_review_comments = Vec::new();
            let mut sliced_reviews = Vec::new();
            for event in &sliced.items {
                match event {
                    TimelineEvent::Commit(c) => sliced_commits.push(c.clone()),
                    TimelineEvent::IssueComment(c) => sliced_issue_comments.push(c.clone()),
                    TimelineEvent::ReviewComment(c) => sliced_review_comments.push(c.clone()),
                    TimelineEvent::Review(r) => sliced_reviews.push(r.clone()),
                }
            }
            commits = sliced_commits;
            issue_comments = sliced_issue_comments;
            review_comments = sliced_review_comments;
            reviews = sliced_reviews;

            let kept: HashSet<&str> = commits.iter().map(|c| c.sha.as_str()).collect();
            commit_details.retain(|d| kept.contains(d.sha.as_str()));

            if options.timeline_mode {
                timeline = Some(sliced.items);
            }
        } else if options.timeline_mode {
            timeline = Some(build_timeline_events(
                &commits,
                &issue_comments,
                &review_comments,
                &reviews,
            ));
        }

        let input = PullRenderInput {
            issue_comments: &issue_comments,
            review_comments: &review_comments,
            reviews: &reviews,
            commits: &commits,
            commit_details: &commit_details,
            files: &files,
            timeline: timeline.as_deref(),
        };
        Ok(ExportSuccess {
            markdown: render_pull(&pull, &options, &input),
            warning: join_warnings(warnings),
        })
    }

    /// One commit's detail fetch: cache read-through, falling back to the
    /// summary data on any non-cancellation failure.
    fn commit_detail_task<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        summary: &'a CommitSummary,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<CommitDetail, ExportError>> {
        async move {
            let key = cache_key([
                Some("commit"),
                self.auth_scope.as_deref(),
                Some(owner),
                Some(repo),
                Some(summary.sha.as_str()),
            ]);
            if let Some(hit) = self.commit_cache.get(&key) {
                return Ok(hit);
            }
            match self.client.get_commit(owner, repo, &summary.sha, cancel).await {
                Ok(detail) => {
                    self.commit_cache.insert(key, detail.clone());
                    Ok(detail)
                }
                Err(error) if error.is_aborted() => Err(error),
                Err(error) => {
                    tracing::debug!(sha = %summary.sha, %error, "commit detail fetch failed");
                    Ok(CommitDetail::from_summary(summary))
                }
            }
        }
        .boxed()
    }

    // ---------- issue ----------

    async fn export_issue(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        profile: Option<&ExportProfile>,
        selection: Option<&MarkerRange>,
        cancel: &CancellationToken,
    ) -> Result<ExportSuccess, ExportError> {
        let profile: IssueProfile = match profile {
            None => IssueProfile::default(),
            Some(ExportProfile::Issue(p)) => *p,
            Some(_) => return Err(ExportError::InvalidRequest(PROFILE_MISMATCH.to_string())),
        };
        let plan = plan_issue(&profile);
        let mut warnings: Vec<String> = Vec::new();

        let (issue, comments) = tokio::try_join!(
            self.client.get_issue(owner, repo, number, cancel),
            maybe(
                plan.fetch_comments,
                self.client.list_issue_comments(owner, repo, number, cancel),
            ),
        )?;

        let sliced = slice_issue_comments(comments.unwrap_or_default(), selection)?;
        if let Some(w) = sliced.warning {
            warnings.push(w);
        }
        let mut comments = sliced.items;
        if !plan.historical_order {
            comments.reverse();
        }

        Ok(ExportSuccess {
            markdown: render_issue(&issue, &comments),
            warning: join_warnings(warnings),
        })
    }

    // ---------- actions run ----------

    async fn export_actions_run(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
        profile: Option<&ExportProfile>,
        cancel: &CancellationToken,
    ) -> Result<ExportSuccess, ExportError> {
        let options: ActionsRunOptions = match profile {
            None => ActionsRunProfile::default().resolve(),
            Some(ExportProfile::ActionsRun(p)) => p.resolve(),
            Some(_) => return Err(ExportError::InvalidRequest(PROFILE_MISMATCH.to_string())),
        };
        let plan = plan_actions_run(&options);
        let mut warnings: Vec<String> = Vec::new();

        let (run, jobs) = tokio::try_join!(
            self.client.get_actions_run(owner, repo, run_id, cancel),
            maybe(
                plan.fetch_jobs,
                self.client.list_actions_jobs(owner, repo, run_id, cancel),
            ),
        )?;

        let mut jobs = jobs.unwrap_or_default();
        if plan.failure_jobs_only {
            jobs.retain(ActionsJob::is_failed);
        }

        let mut logs: HashMap<u64, JobLog> = HashMap::new();
        if plan.fetch_logs && !jobs.is_empty() {
            let tasks: Vec<BoxFuture<'_, Result<Option<(u64, String)>, ExportError>>> = jobs
                .iter()
                .map(|job| self.job_log_task(owner, repo, job.id, cancel))
                .collect();
            let results = run_ordered(tasks, self.concurrency, cancel).await?;

            let mut failed = 0usize;
            for result in results.into_iter() {
                match result {
                    Some((job_id, text)) => {
                        logs.insert(job_id, parse_job_log(&text));
                    }
                    None => failed += 1,
                }
            }
            if failed > 0 {
                warnings.push(format!("Failed to fetch logs for {failed} job(s)."));
            }
        }

        Ok(ExportSuccess {
            markdown: render_actions_run(&run, &options, &jobs, &logs),
            warning: join_warnings(warnings),
        })
    }

    /// One job's log fetch: cache read-through; any non-cancellation
    /// failure degrades to `None` and is counted by the caller.
    fn job_log_task<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        job_id: u64,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Option<(u64, String)>, ExportError>> {
        async move {
            let id = job_id.to_string();
            let key = cache_key([
                Some("job-logs"),
                self.auth_scope.as_deref(),
                Some(owner),
                Some(repo),
                Some(id.as_str()),
            ]);
            if let Some(hit) = self.log_cache.get(&key) {
                return Ok(Some((job_id, hit)));
            }
            match self.client.get_actions_job_logs(owner, repo, job_id, cancel).await {
                Ok(text) => {
                    self.log_cache.insert(key, text.clone());
                    Ok(Some((job_id, text)))
                }
                Err(error) if error.is_aborted() => Err(error),
                Err(error) => {
                    tracing::debug!(job_id, %error, "job log fetch failed");
                    Ok(None)
                }
            }
        }
        .boxed()
    }
}

fn validate_target(target: &Target) -> Result<(), ExportError> {
    let (owner, repo, id) = match target {
        Target::Pull { owner, repo, number } | Target::Issue { owner, repo, number } => {
            (owner, repo, *number)
        }
        Target::ActionsRun { owner, repo, run_id } => (owner, repo, *run_id),
    };
    if owner.trim().is_empty() || repo.trim().is_empty() || id == 0 {
        return Err(ExportError::InvalidRequest(MISSING_TARGET.to_string()));
    }
    Ok(())
}

async fn maybe<T>(
    wanted: bool,
    fetch: impl Future<Output = Result<T, ExportError>>,
) -> Result<Option<T>, ExportError> {
    if wanted {
        fetch.await.map(Some)
    } else {
        Ok(None)
    }
}

fn join_warnings(warnings: Vec<String>) -> Option<String> {
    let joined = warnings
        .into_iter()
        .filter(|w| !w.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() { None } else { Some(joined) }
}

//! Fetch planning: maps resolved export options to the minimal set of API
//! calls the pipeline needs to make.
//!
//! The plan is derived once, before any network traffic, so the pipeline
//! body can stay a flat sequence of `if plan.x { fetch }` steps. Derived
//! flags encode the cross-option rules, for example smart diff mode needs
//! the changed-file list even when file diffs themselves are not rendered.

use crate::profile::{ActionsRunOptions, IssueProfile, PullOptions};

/// Which pull-related fetches to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullFetchPlan {
    pub fetch_issue_comments: bool,
    pub fetch_review_comments: bool,
    pub fetch_reviews: bool,
    pub fetch_commits: bool,
    pub fetch_files: bool,
    pub fetch_commit_details: bool,
    pub fetch_thread_resolution: bool,
}

/// Derive the pull fetch plan. Options must already be invariant-enforced.
#[must_use]
pub fn plan_pull(options: &PullOptions) -> PullFetchPlan {
    PullFetchPlan {
        fetch_issue_comments: options.include_issue_comments,
        fetch_review_comments: options.include_review_comments,
        fetch_reviews: options.include_reviews,
        fetch_commits: options.include_commits,
        // Smart diff intersects commit patches against the PR's changed
        // files, so the file list is needed even without file diffs.
        fetch_files: options.include_file_diffs
            || (options.include_commit_diffs && options.smart_diff_mode),
        fetch_commit_details: options.include_commit_diffs,
        fetch_thread_resolution: options.include_review_comments
            && options.ignore_resolved_comments,
    }
}

/// Which issue-related fetches to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueFetchPlan {
    pub fetch_comments: bool,
    pub historical_order: bool,
}

/// Derive the issue fetch plan. Comments are always fetched; the profile
/// only controls presentation order.
#[must_use]
pub fn plan_issue(profile: &IssueProfile) -> IssueFetchPlan {
    IssueFetchPlan {
        fetch_comments: true,
        historical_order: profile.timeline_mode,
    }
}

/// Which Actions-run fetches to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionsRunFetchPlan {
    pub fetch_jobs: bool,
    pub fetch_logs: bool,
    pub failure_jobs_only: bool,
    pub failure_steps_only: bool,
}

/// Derive the Actions-run fetch plan. Options must already be
/// invariant-enforced.
#[must_use]
pub fn plan_actions_run(options: &ActionsRunOptions) -> ActionsRunFetchPlan {
    ActionsRunFetchPlan {
        fetch_jobs: options.include_jobs,
        // Logs exist to annotate steps; without steps they are dead weight.
        fetch_logs: options.include_jobs && options.include_steps,
        failure_jobs_only: options.only_failure_jobs,
        failure_steps_only: options.only_failure_steps,
    }
}

//! Markdown renderers.
//!
//! Pure functions from fetched data to Markdown text. Each renderer takes
//! already-filtered, already-sliced collections; inclusion decisions are
//! made upstream by the pipeline, so the only option flags consulted here
//! are the ones that change layout (timeline versus sectioned, diffs on or
//! off, failure-only step lists).

use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::github::logs::JobLog;
use crate::github::types::{
    ActionsJob, ActionsRun, CommitDetail, CommitSummary, DiffFile, Issue, IssueComment, Pull,
    Review, ReviewComment, User,
};
use crate::profile::{ActionsRunOptions, PullOptions};
use crate::timeline::TimelineEvent;

fn login(user: Option<&User>) -> &str {
    user.map_or("unknown", |u| u.login.as_str())
}

fn date(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || "unknown date".to_string(),
        |t| t.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}

fn body_or_empty(body: Option<&str>) -> &str {
    let text = body.unwrap_or("").trim();
    if text.is_empty() { "_No description._" } else { text }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

// ---------- issue ----------

/// Render an issue and its (already sliced and ordered) comments.
#[must_use]
pub fn render_issue(issue: &Issue, comments: &[IssueComment]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Issue #{}: {}", issue.number, issue.title);
    out.push('\n');
    let _ = writeln!(out, "- State: {}", issue.state);
    let _ = writeln!(out, "- Author: {}", login(issue.user.as_ref()));
    let _ = writeln!(out, "- Created: {}", date(issue.created_at));
    if let Some(url) = &issue.html_url {
        let _ = writeln!(out, "- URL: {url}");
    }
    out.push('\n');
    let _ = writeln!(out, "{}", body_or_empty(issue.body.as_deref()));

    if !comments.is_empty() {
        out.push('\n');
        out.push_str("## Comments\n");
        for comment in comments {
            push_issue_comment(&mut out, comment);
        }
    }

    out
}

fn push_issue_comment(out: &mut String, comment: &IssueComment) {
    out.push('\n');
    let _ = writeln!(
        out,
        "### {} ({})",
        login(comment.user.as_ref()),
        date(comment.created_at)
    );
    out.push('\n');
    let _ = writeln!(out, "{}", body_or_empty(comment.body.as_deref()));
}

// ---------- pull ----------

/// Everything the pull renderer needs. Collections are empty when the
/// corresponding option is off.
#[derive(Debug, Default)]
pub struct PullRenderInput<'a> {
    pub issue_comments: &'a [IssueComment],
    pub review_comments: &'a [ReviewComment],
    pub reviews: &'a [Review],
    pub commits: &'a [CommitSummary],
    /// Per-commit file diffs, keyed by sha.
    pub commit_details: &'a [CommitDetail],
    pub files: &'a [DiffFile],
    /// Present only in timeline mode: the merged, sliced event stream.
    pub timeline: Option<&'a [TimelineEvent]>,
}

/// Render a pull request export.
#[must_use]
pub fn render_pull(pull: &Pull, options: &PullOptions, input: &PullRenderInput<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# PR #{}: {}", pull.number, pull.title);
    out.push('\n');
    let state = if pull.merged == Some(true) {
        "merged"
    } else {
        pull.state.as_str()
    };
    let _ = writeln!(out, "- State: {state}");
    let _ = writeln!(out, "- Author: {}", login(pull.user.as_ref()));
    let _ = writeln!(out, "- Created: {}", date(pull.created_at));
    if let (Some(base), Some(head)) = (&pull.base, &pull.head) {
        let _ = writeln!(out, "- Branches: {} <- {}", base.name, head.name);
    }
    if let Some(url) = &pull.html_url {
        let _ = writeln!(out, "- URL: {url}");
    }
    out.push('\n');
    let _ = writeln!(out, "{}", body_or_empty(pull.body.as_deref()));

    let details: HashMap<&str, &CommitDetail> = input
        .commit_details
        .iter()
        .map(|d| (d.sha.as_str(), d))
        .collect();

    if let Some(timeline) = input.timeline {
        push_timeline(&mut out, timeline, options, &details);
    } else {
        push_pull_sections(&mut out, options, input, &details);
    }

    if options.include_file_diffs && !input.files.is_empty() {
        out.push('\n');
        out.push_str("## Files Changed\n");
        for file in input.files {
            push_file(&mut out, file);
        }
    }

    out
}

fn push_pull_sections(
    out: &mut String,
    options: &PullOptions,
    input: &PullRenderInput<'_>,
    details: &HashMap<&str, &CommitDetail>,
) {
    if options.include_commits && !input.commits.is_empty() {
        out.push('\n');
        out.push_str("## Commits\n");
        for commit in input.commits {
            push_commit(out, commit, options, details);
        }
    }
    if options.include_issue_comments && !input.issue_comments.is_empty() {
        out.push('\n');
        out.push_str("## Issue Comments\n");
        for comment in input.issue_comments {
            push_issue_comment(out, comment);
        }
    }
    if options.include_review_comments && !input.review_comments.is_empty() {
        out.push('\n');
        out.push_str("## Review Comments\n");
        for comment in input.review_comments {
            push_review_comment(out, comment);
        }
    }
    if options.include_reviews && !input.reviews.is_empty() {
        out.push('\n');
        out.push_str("## Reviews\n");
        for review in input.reviews {
            push_review(out, review);
        }
    }
}

fn push_timeline(
    out: &mut String,
    timeline: &[TimelineEvent],
    options: &PullOptions,
    details: &HashMap<&str, &CommitDetail>,
) {
    if timeline.is_empty() {
        return;
    }
    out.push('\n');
    out.push_str("## Timeline\n");
    for event in timeline {
        match event {
            TimelineEvent::Commit(commit) => push_commit(out, commit, options, details),
            TimelineEvent::IssueComment(comment) => push_issue_comment(out, comment),
            TimelineEvent::ReviewComment(comment) => push_review_comment(out, comment),
            TimelineEvent::Review(review) => push_review(out, review),
        }
    }
}

fn push_commit(
    out: &mut String,
    commit: &CommitSummary,
    options: &PullOptions,
    details: &HashMap<&str, &CommitDetail>,
) {
    let short = commit.sha.get(..7).unwrap_or(&commit.sha);
    out.push('\n');
    let _ = writeln!(
        out,
        "### `{short}` {} ({})",
        first_line(&commit.commit.message),
        date(commit.date())
    );
    let rest: Vec<&str> = commit.commit.message.lines().skip(1).collect();
    if rest.iter().any(|l| !l.trim().is_empty()) {
        out.push('\n');
        let _ = writeln!(out, "{}", rest.join("\n").trim());
    }
    if options.include_commit_diffs
        && let Some(detail) = details.get(commit.sha.as_str())
        && let Some(files) = &detail.files
    {
        for file in files {
            push_file(out, file);
        }
    }
}

fn push_review_comment(out: &mut String, comment: &ReviewComment) {
    out.push('\n');
    let _ = writeln!(
        out,
        "### {} ({})",
        login(comment.user.as_ref()),
        date(comment.created_at)
    );
    if let Some(path) = &comment.path {
        let _ = writeln!(out, "File: `{path}`");
    }
    if let Some(hunk) = &comment.diff_hunk {
        out.push('\n');
        let _ = writeln!(out, "```diff\n{hunk}\n```");
    }
    out.push('\n');
    let _ = writeln!(out, "{}", body_or_empty(comment.body.as_deref()));
}

fn push_review(out: &mut String, review: &Review) {
    out.push('\n');
    let _ = writeln!(
        out,
        "### {} reviewed: {} ({})",
        login(review.user.as_ref()),
        review.state.as_deref().unwrap_or("COMMENTED"),
        date(review.date())
    );
    if let Some(body) = &review.body
        && !body.trim().is_empty()
    {
        out.push('\n');
        let _ = writeln!(out, "{}", body.trim());
    }
}

fn push_file(out: &mut String, file: &DiffFile) {
    out.push('\n');
    let mut header = format!("#### `{}`", file.filename);
    if let Some(status) = &file.status {
        let _ = write!(header, " ({status}");
        if let (Some(a), Some(d)) = (file.additions, file.deletions) {
            let _ = write!(header, ", +{a}/-{d}");
        }
        header.push(')');
    }
    let _ = writeln!(out, "{header}");
    if let Some(patch) = &file.patch {
        out.push('\n');
        let _ = writeln!(out, "```diff\n{patch}\n```");
    }
}

// ---------- actions run ----------

/// Render a workflow run export. `logs` maps job id to its parsed log; jobs
/// and logs are already failure-filtered upstream when the options ask for
/// that.
#[must_use]
pub fn render_actions_run(
    run: &ActionsRun,
    options: &ActionsRunOptions,
    jobs: &[ActionsJob],
    logs: &HashMap<u64, JobLog>,
) -> String {
    let mut out = String::new();
    let title = run
        .display_title
        .as_deref()
        .or(run.name.as_deref())
        .unwrap_or("Workflow run");
    let _ = writeln!(out, "# Actions Run: {title}");

    if options.include_summary {
        out.push('\n');
        if let Some(name) = &run.name {
            let _ = writeln!(out, "- Workflow: {name}");
        }
        if let Some(number) = run.run_number {
            let _ = writeln!(out, "- Run number: {number}");
        }
        if let Some(event) = &run.event {
            let _ = writeln!(out, "- Event: {event}");
        }
        let _ = writeln!(out, "- Status: {}", run_status(run));
        if let Some(branch) = &run.head_branch {
            let _ = writeln!(out, "- Branch: {branch}");
        }
        if let Some(sha) = &run.head_sha {
            let short = sha.get(..7).unwrap_or(sha);
            let _ = writeln!(out, "- Commit: `{short}`");
        }
        let _ = writeln!(out, "- Created: {}", date(run.created_at));
        if let Some(url) = &run.html_url {
            let _ = writeln!(out, "- URL: {url}");
        }
    }

    if options.include_jobs && !jobs.is_empty() {
        out.push('\n');
        out.push_str("## Jobs\n");
        for job in jobs {
            push_job(&mut out, job, options, logs.get(&job.id));
        }
    }

    out
}

fn run_status(run: &ActionsRun) -> String {
    match (run.status.as_deref(), run.conclusion.as_deref()) {
        (_, Some(conclusion)) => conclusion.to_string(),
        (Some(status), None) => status.to_string(),
        (None, None) => "unknown".to_string(),
    }
}

fn push_job(out: &mut String, job: &ActionsJob, options: &ActionsRunOptions, log: Option<&JobLog>) {
    out.push('\n');
    let conclusion = job
        .conclusion
        .as_deref()
        .or(job.status.as_deref())
        .unwrap_or("unknown");
    let _ = writeln!(out, "### {} ({conclusion})", job.name);

    if !options.include_steps {
        return;
    }
    let Some(steps) = &job.steps else {
        return;
    };
    for step in steps {
        let failed = matches!(
            step.conclusion.as_deref(),
            Some("failure") | Some("timed_out")
        );
        if options.only_failure_steps && !failed {
            continue;
        }
        let mark = match step.conclusion.as_deref() {
            Some("success") => "x",
            _ => " ",
        };
        let _ = writeln!(
            out,
            "- [{mark}] {} ({})",
            step.name,
            step.conclusion.as_deref().or(step.status.as_deref()).unwrap_or("unknown")
        );
        if let Some(section) = log.and_then(|l| l.section_for_step(&step.name))
            && !section.lines.is_empty()
        {
            out.push('\n');
            let _ = writeln!(out, "```\n{}\n```", section.lines.join("\n"));
            out.push('\n');
        }
    }
}

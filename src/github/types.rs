//! Wire types for the GitHub REST endpoints the exporter reads.
//!
//! Only the fields the renderers and pipeline consume are modeled; all
//! other response fields are ignored. Fields that GitHub omits or nulls in
//! practice are `Option` so a sparse payload never fails decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A GitHub account reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Branch endpoint of a pull request (`base` / `head`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref", default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pull {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub merged: Option<bool>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub base: Option<BranchRef>,
    #[serde(default)]
    pub head: Option<BranchRef>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// One file in a pull request or commit diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffFile {
    pub filename: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub additions: Option<u64>,
    #[serde(default)]
    pub deletions: Option<u64>,
    #[serde(default)]
    pub patch: Option<String>,
}

/// Author/committer identity inside the git commit object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitActor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitCommit {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<GitActor>,
    #[serde(default)]
    pub committer: Option<GitActor>,
}

/// A commit as returned by `/pulls/{n}/commits` (no file-level diff).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub commit: GitCommit,
    #[serde(default)]
    pub author: Option<User>,
}

impl CommitSummary {
    /// Commit timestamp, preferring the author date over the committer date.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.commit
            .author
            .as_ref()
            .and_then(|a| a.date)
            .or_else(|| self.commit.committer.as_ref().and_then(|c| c.date))
    }
}

/// A commit as returned by `/commits/{sha}` (includes the file diff).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub sha: String,
    pub commit: GitCommit,
    #[serde(default)]
    pub files: Option<Vec<DiffFile>>,
}

impl CommitDetail {
    /// Degrade a summary commit into a detail without files. Used when a
    /// per-commit detail fetch fails and the export falls back to whatever
    /// the pull-level listing already carried.
    #[must_use]
    pub fn from_summary(summary: &CommitSummary) -> Self {
        Self {
            sha: summary.sha.clone(),
            commit: summary.commit.clone(),
            files: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Review {
    /// Review timestamp, preferring submission time over creation time.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.submitted_at.or(self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub diff_hunk: Option<String>,
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionsRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
    #[serde(default)]
    pub run_number: Option<u64>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub head_sha: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStep {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionsJob {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Option<Vec<JobStep>>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl ActionsJob {
    /// Whether the job counts as failed for failure-only filtering.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(
            self.conclusion.as_deref(),
            Some("failure") | Some("timed_out")
        )
    }
}

/// Page envelope of `/actions/runs/{id}/jobs`; the client unwraps `jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsPage {
    #[serde(default)]
    pub jobs: Vec<ActionsJob>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_date_prefers_author_over_committer() {
        let commit: CommitSummary = serde_json::from_str(
            r#"{
                "sha": "abc",
                "commit": {
                    "message": "m",
                    "author": {"name": "a", "date": "2024-03-01T10:00:00Z"},
                    "committer": {"name": "c", "date": "2024-03-02T10:00:00Z"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(
            commit.date().unwrap().to_rfc3339(),
            "2024-03-01T10:00:00+00:00"
        );
    }

    #[test]
    fn commit_date_falls_back_to_committer() {
        let commit: CommitSummary = serde_json::from_str(
            r#"{
                "sha": "abc",
                "commit": {
                    "message": "m",
                    "committer": {"name": "c", "date": "2024-03-02T10:00:00Z"}
                }
            }"#,
        )
        .unwrap();
        assert!(commit.date().is_some());
    }

    #[test]
    fn review_date_prefers_submitted_at() {
        let review: Review = serde_json::from_str(
            r#"{
                "id": 1,
                "submitted_at": "2024-04-01T00:00:00Z",
                "created_at": "2024-03-01T00:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(review.date(), review.submitted_at);
    }

    #[test]
    fn sparse_pull_payload_still_decodes() {
        let pull: Pull = serde_json::from_str(r#"{"number": 5}"#).unwrap();
        assert_eq!(pull.number, 5);
        assert!(pull.user.is_none());
        assert!(pull.base.is_none());
    }

    #[test]
    fn job_failure_check_covers_timeouts() {
        let mut job: ActionsJob = serde_json::from_str(r#"{"id": 1, "name": "build"}"#).unwrap();
        assert!(!job.is_failed());
        job.conclusion = Some("timed_out".to_string());
        assert!(job.is_failed());
        job.conclusion = Some("success".to_string());
        assert!(!job.is_failed());
    }

    #[test]
    fn commit_detail_from_summary_drops_files() {
        let summary: CommitSummary =
            serde_json::from_str(r#"{"sha": "abc", "commit": {"message": "m"}}"#).unwrap();
        let detail = CommitDetail::from_summary(&summary);
        assert_eq!(detail.sha, "abc");
        assert!(detail.files.is_none());
    }
}

//! Export profiles: per-target option records, named presets, and the
//! dependent-flag invariants.
//!
//! Profiles arrive either inline on a request or from stored settings, so
//! every resolution path ends in `enforce_*_invariants`; stored data is
//! never assumed valid. Custom presets layer overrides from a
//! loosely-typed JSON object and silently drop anything that is not a
//! recognized boolean key, which keeps a malformed or stale stored patch
//! from poisoning an export.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------- pull ----------

/// Named option sets for pull request exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullPreset {
    Full,
    Conversation,
    ReviewCommentsOnly,
    DiffsOnly,
    Minimal,
    Custom,
}

/// The nine pull export flags, named as stored (camelCase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullOptions {
    pub include_issue_comments: bool,
    pub include_review_comments: bool,
    pub include_reviews: bool,
    pub include_commits: bool,
    pub include_file_diffs: bool,
    pub include_commit_diffs: bool,
    pub smart_diff_mode: bool,
    pub timeline_mode: bool,
    pub ignore_resolved_comments: bool,
}

impl Default for PullOptions {
    /// The `conversation` preset is the baseline custom options start from.
    fn default() -> Self {
        PullPreset::Conversation.canonical_options()
    }
}

impl PullPreset {
    /// All built-in presets, in the order `infer` checks them.
    pub const BUILT_IN: [PullPreset; 5] = [
        PullPreset::Full,
        PullPreset::Conversation,
        PullPreset::ReviewCommentsOnly,
        PullPreset::DiffsOnly,
        PullPreset::Minimal,
    ];

    /// Canonical option set for this preset. `Custom` yields the defaults;
    /// callers layer overrides on top via [`resolve_pull_options`].
    #[must_use]
    pub fn canonical_options(self) -> PullOptions {
        match self {
            PullPreset::Full => PullOptions {
                include_issue_comments: true,
                include_review_comments: true,
                include_reviews: true,
                include_commits: true,
                include_file_diffs: true,
                include_commit_diffs: true,
                smart_diff_mode: true,
                timeline_mode: true,
                ignore_resolved_comments: false,
            },
            PullPreset::Conversation => PullOptions {
                include_issue_comments: true,
                include_review_comments: true,
                include_reviews: true,
                include_commits: false,
                include_file_diffs: false,
                include_commit_diffs: false,
                smart_diff_mode: false,
                timeline_mode: true,
                ignore_resolved_comments: false,
            },
            PullPreset::ReviewCommentsOnly => PullOptions {
                include_issue_comments: false,
                include_review_comments: true,
                include_reviews: false,
                include_commits: false,
                include_file_diffs: false,
                include_commit_diffs: false,
                smart_diff_mode: false,
                timeline_mode: false,
                ignore_resolved_comments: false,
            },
            PullPreset::DiffsOnly => PullOptions {
                include_issue_comments: false,
                include_review_comments: false,
                include_reviews: false,
                include_commits: true,
                include_file_diffs: true,
                include_commit_diffs: true,
                smart_diff_mode: true,
                timeline_mode: false,
                ignore_resolved_comments: false,
            },
            PullPreset::Minimal => PullOptions {
                include_issue_comments: false,
                include_review_comments: false,
                include_reviews: false,
                include_commits: false,
                include_file_diffs: false,
                include_commit_diffs: false,
                smart_diff_mode: false,
                timeline_mode: false,
                ignore_resolved_comments: false,
            },
            PullPreset::Custom => PullOptions::default(),
        }
    }
}

/// Resolve a preset (plus custom overrides) into a full option record.
///
/// Built-in presets return their canonical copy and ignore overrides.
/// `Custom` starts from the defaults and applies only recognized keys with
/// boolean values; everything else in the override object is dropped.
#[must_use]
pub fn resolve_pull_options(preset: PullPreset, overrides: Option<&Value>) -> PullOptions {
    let mut options = preset.canonical_options();
    if preset == PullPreset::Custom
        && let Some(Value::Object(map)) = overrides
    {
        for (key, value) in map {
            if let Value::Bool(flag) = value {
                apply_pull_override(&mut options, key, *flag);
            }
        }
    }
    options
}

fn apply_pull_override(options: &mut PullOptions, key: &str, value: bool) {
    match key {
        "includeIssueComments" => options.include_issue_comments = value,
        "includeReviewComments" => options.include_review_comments = value,
        "includeReviews" => options.include_reviews = value,
        "includeCommits" => options.include_commits = value,
        "includeFileDiffs" => options.include_file_diffs = value,
        "includeCommitDiffs" => options.include_commit_diffs = value,
        "smartDiffMode" => options.smart_diff_mode = value,
        "timelineMode" => options.timeline_mode = value,
        "ignoreResolvedComments" => options.ignore_resolved_comments = value,
        _ => {}
    }
}

/// Force dependent flags off when their prerequisite is off. Must be the
/// last step before options are used to plan fetches.
#[must_use]
pub fn enforce_pull_invariants(mut options: PullOptions) -> PullOptions {
    if !options.include_commits {
        options.include_commit_diffs = false;
    }
    if !options.include_commit_diffs {
        options.smart_diff_mode = false;
    }
    if !options.include_review_comments {
        options.ignore_resolved_comments = false;
    }
    options
}

/// Find the built-in preset exactly matching `options`, or `Custom`.
#[must_use]
pub fn infer_pull_preset(options: &PullOptions) -> PullPreset {
    PullPreset::BUILT_IN
        .into_iter()
        .find(|p| p.canonical_options() == *options)
        .unwrap_or(PullPreset::Custom)
}

// ---------- issue ----------

/// Issue exports carry a single switch: chronological (timeline) order
/// versus the site's default reverse-chronological comment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueProfile {
    #[serde(default = "default_true")]
    pub timeline_mode: bool,
}

impl Default for IssueProfile {
    fn default() -> Self {
        Self {
            timeline_mode: true,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------- actions run ----------

/// Named option sets for Actions run exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionsRunPreset {
    Full,
    Summary,
    Jobs,
    Failures,
    Custom,
}

/// The five Actions run export flags, named as stored (camelCase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionsRunOptions {
    pub include_summary: bool,
    pub include_jobs: bool,
    pub include_steps: bool,
    pub only_failure_jobs: bool,
    pub only_failure_steps: bool,
}

impl Default for ActionsRunOptions {
    fn default() -> Self {
        ActionsRunPreset::Full.canonical_options()
    }
}

impl ActionsRunPreset {
    /// All built-in presets, in the order `infer` checks them.
    pub const BUILT_IN: [ActionsRunPreset; 4] = [
        ActionsRunPreset::Full,
        ActionsRunPreset::Summary,
        ActionsRunPreset::Jobs,
        ActionsRunPreset::Failures,
    ];

    #[must_use]
    pub fn canonical_options(self) -> ActionsRunOptions {
        match self {
            ActionsRunPreset::Full => ActionsRunOptions {
                include_summary: true,
                include_jobs: true,
                include_steps: true,
                only_failure_jobs: false,
                only_failure_steps: false,
            },
            ActionsRunPreset::Summary => ActionsRunOptions {
                include_summary: true,
                include_jobs: false,
                include_steps: false,
                only_failure_jobs: false,
                only_failure_steps: false,
            },
            ActionsRunPreset::Jobs => ActionsRunOptions {
                include_summary: true,
                include_jobs: true,
                include_steps: false,
                only_failure_jobs: false,
                only_failure_steps: false,
            },
            ActionsRunPreset::Failures => ActionsRunOptions {
                include_summary: true,
                include_jobs: true,
                include_steps: true,
                only_failure_jobs: true,
                only_failure_steps: true,
            },
            ActionsRunPreset::Custom => ActionsRunOptions::default(),
        }
    }
}

/// Actions-run counterpart of [`resolve_pull_options`].
#[must_use]
pub fn resolve_actions_run_options(
    preset: ActionsRunPreset,
    overrides: Option<&Value>,
) -> ActionsRunOptions {
    let mut options = preset.canonical_options();
    if preset == ActionsRunPreset::Custom
        && let Some(Value::Object(map)) = overrides
    {
        for (key, value) in map {
            if let Value::Bool(flag) = value {
                apply_actions_run_override(&mut options, key, *flag);
            }
        }
    }
    options
}

fn apply_actions_run_override(options: &mut ActionsRunOptions, key: &str, value: bool) {
    match key {
        "includeSummary" => options.include_summary = value,
        "includeJobs" => options.include_jobs = value,
        "includeSteps" => options.include_steps = value,
        "onlyFailureJobs" => options.only_failure_jobs = value,
        "onlyFailureSteps" => options.only_failure_steps = value,
        _ => {}
    }
}

/// Force dependent flags off when their prerequisite is off.
#[must_use]
pub fn enforce_actions_run_invariants(mut options: ActionsRunOptions) -> ActionsRunOptions {
    if !options.include_jobs {
        options.include_steps = false;
        options.only_failure_jobs = false;
        options.only_failure_steps = false;
    }
    if !options.include_steps {
        options.only_failure_steps = false;
    }
    if !options.only_failure_jobs {
        options.only_failure_steps = false;
    }
    options
}

/// Find the built-in preset exactly matching `options`, or `Custom`.
#[must_use]
pub fn infer_actions_run_preset(options: &ActionsRunOptions) -> ActionsRunPreset {
    ActionsRunPreset::BUILT_IN
        .into_iter()
        .find(|p| p.canonical_options() == *options)
        .unwrap_or(ActionsRunPreset::Custom)
}

// ---------- profiles ----------

/// A stored or request-supplied pull profile: a preset label plus the raw
/// option object it was saved with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullProfile {
    #[serde(default = "PullProfile::default_preset")]
    pub preset: PullPreset,
    #[serde(default)]
    pub options: Option<Value>,
}

impl PullProfile {
    fn default_preset() -> PullPreset {
        PullPreset::Conversation
    }

    /// Resolve to a fully-specified, invariant-enforced option record.
    #[must_use]
    pub fn resolve(&self) -> PullOptions {
        enforce_pull_invariants(resolve_pull_options(self.preset, self.options.as_ref()))
    }
}

impl Default for PullPreset {
    fn default() -> Self {
        PullPreset::Conversation
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionsRunProfile {
    #[serde(default = "ActionsRunProfile::default_preset")]
    pub preset: ActionsRunPreset,
    #[serde(default)]
    pub options: Option<Value>,
}

impl ActionsRunProfile {
    fn default_preset() -> ActionsRunPreset {
        ActionsRunPreset::Full
    }

    /// Resolve to a fully-specified, invariant-enforced option record.
    #[must_use]
    pub fn resolve(&self) -> ActionsRunOptions {
        enforce_actions_run_invariants(resolve_actions_run_options(
            self.preset,
            self.options.as_ref(),
        ))
    }
}

impl Default for ActionsRunPreset {
    fn default() -> Self {
        ActionsRunPreset::Full
    }
}

/// A profile for any target kind, tagged the way the settings collaborator
/// stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExportProfile {
    Pull(PullProfile),
    Issue(IssueProfile),
    ActionsRun(ActionsRunProfile),
}

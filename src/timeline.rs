//! Timeline merge and marker-range slicing.
//!
//! Commits, issue comments, review comments, and reviews are merged into
//! one list sorted ascending by timestamp. The sort is stable and events
//! missing a date sort to the front, so equal or absent timestamps keep
//! their source-list relative order. Range selection is by exact marker
//! match; reversed markers are corrected with a warning rather than
//! rejected, since the selection UI lets users click endpoints in either
//! order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::github::types::{CommitSummary, IssueComment, Review, ReviewComment};

/// The item kinds a marker can point at. Commits cannot be markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerType {
    IssueComment,
    ReviewComment,
    Review,
}

/// One selection endpoint, matched against events by `{kind, id}` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    #[serde(rename = "type")]
    pub kind: MarkerType,
    pub id: u64,
}

/// An inclusive selection range. Absent endpoints default to the first and
/// last event respectively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRange {
    #[serde(default)]
    pub start: Option<Marker>,
    #[serde(default)]
    pub end: Option<Marker>,
}

impl MarkerRange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// One event in the merged pull request timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    Commit(CommitSummary),
    IssueComment(IssueComment),
    ReviewComment(ReviewComment),
    Review(Review),
}

impl TimelineEvent {
    /// Event timestamp used for ordering, when one exists.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        match self {
            TimelineEvent::Commit(c) => c.date(),
            TimelineEvent::IssueComment(c) => c.created_at,
            TimelineEvent::ReviewComment(c) => c.created_at,
            TimelineEvent::Review(r) => r.date(),
        }
    }

    /// The marker identifying this event, if its kind is addressable.
    #[must_use]
    pub fn marker(&self) -> Option<Marker> {
        let (kind, id) = match self {
            TimelineEvent::Commit(_) => return None,
            TimelineEvent::IssueComment(c) => (MarkerType::IssueComment, c.id),
            TimelineEvent::ReviewComment(c) => (MarkerType::ReviewComment, c.id),
            TimelineEvent::Review(r) => (MarkerType::Review, r.id),
        };
        Some(Marker { kind, id })
    }

    fn sort_key(&self) -> i64 {
        // Undated events sort ahead of everything with a real timestamp.
        self.date().map_or(0, |d| d.timestamp_millis())
    }
}

/// Merge the fetched collections into one chronologically sorted timeline.
#[must_use]
pub fn build_timeline_events(
    commits: &[CommitSummary],
    issue_comments: &[IssueComment],
    review_comments: &[ReviewComment],
    reviews: &[Review],
) -> Vec<TimelineEvent> {
    let mut events: Vec<TimelineEvent> = Vec::with_capacity(
        commits.len() + issue_comments.len() + review_comments.len() + reviews.len(),
    );
    events.extend(commits.iter().cloned().map(TimelineEvent::Commit));
    events.extend(
        issue_comments
            .iter()
            .cloned()
            .map(TimelineEvent::IssueComment),
    );
    events.extend(
        review_comments
            .iter()
            .cloned()
            .map(TimelineEvent::ReviewComment),
    );
    events.extend(reviews.iter().cloned().map(TimelineEvent::Review));
    events.sort_by_key(TimelineEvent::sort_key);
    events
}

/// A successful slice: the selected events plus an optional usability
/// warning (currently only marker reversal).
#[derive(Debug, Clone, PartialEq)]
pub struct Sliced<T> {
    pub items: Vec<T>,
    pub warning: Option<String>,
}

const REVERSED_WARNING: &str = "Markers were reversed, so the export range was swapped.";

/// Slice a merged pull timeline to the requested inclusive marker range.
pub fn slice_pull_timeline(
    events: Vec<TimelineEvent>,
    range: Option<&MarkerRange>,
) -> Result<Sliced<TimelineEvent>, ExportError> {
    slice_by_markers(
        events,
        range,
        |event, marker| event.marker() == Some(*marker),
        "No timeline events were found for this PR.",
        "Selected marker could not be found in the PR timeline.",
    )
}

/// Slice a flat issue comment list to the requested inclusive marker range.
/// Issue pages carry a single comment stream, so only `issue-comment`
/// markers are accepted.
pub fn slice_issue_comments(
    comments: Vec<IssueComment>,
    range: Option<&MarkerRange>,
) -> Result<Sliced<IssueComment>, ExportError> {
    if let Some(range) = range {
        for marker in [range.start, range.end].into_iter().flatten() {
            if marker.kind != MarkerType::IssueComment {
                return Err(ExportError::InvalidSelection(
                    "Only issue comment markers can select an issue comment range.".to_string(),
                ));
            }
        }
    }
    slice_by_markers(
        comments,
        range,
        |comment, marker| comment.id == marker.id,
        "No comments were found for this issue.",
        "Selected marker could not be found in the issue comments.",
    )
}

fn slice_by_markers<T>(
    items: Vec<T>,
    range: Option<&MarkerRange>,
    matches: impl Fn(&T, &Marker) -> bool,
    empty_message: &str,
    not_found_message: &str,
) -> Result<Sliced<T>, ExportError> {
    let range = match range {
        Some(range) if !range.is_empty() => range,
        _ => {
            return Ok(Sliced {
                items,
                warning: None,
            });
        }
    };

    if items.is_empty() {
        return Err(ExportError::InvalidSelection(empty_message.to_string()));
    }

    let resolve = |marker: Option<Marker>, default: usize| -> Result<usize, ExportError> {
        match marker {
            None => Ok(default),
            Some(marker) => items
                .iter()
                .position(|item| matches(item, &marker))
                .ok_or_else(|| ExportError::InvalidSelection(not_found_message.to_string())),
        }
    };

    let mut start = resolve(range.start, 0)?;
    let mut end = resolve(range.end, items.len() - 1)?;

    let mut warning = None;
    if start > end {
        std::mem::swap(&mut start, &mut end);
        warning = Some(REVERSED_WARNING.to_string());
    }

    let items = items
        .into_iter()
        .skip(start)
        .take(end - start + 1)
        .collect();
    Ok(Sliced { items, warning })
}

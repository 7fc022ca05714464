//! Review-thread resolution lookup with a REST-then-GraphQL fallback.
//!
//! The REST `/pulls/{n}/threads` endpoint is the cheap path but is not
//! universally available; when it fails for any reason other than
//! cancellation, the same data is rebuilt through the GraphQL
//! `PullReviewThreadResolution` query. Payload shapes differ between the
//! phases and have drifted over time, so field extraction runs through an
//! explicit ordered list of candidate field names rather than assuming one
//! shape. Cancellation at either phase is rethrown immediately; a double
//! failure raises one combined error citing both reasons.

use std::collections::HashMap;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::client::GitHubClient;
use crate::error::ExportError;

/// Resolution state per review comment id.
#[derive(Debug, Clone, Default)]
pub struct ThreadResolution {
    /// Comment id → whether its thread is resolved.
    pub resolved_by_comment: HashMap<u64, bool>,
    /// True when some thread could not be fully read (missing fields or an
    /// unpaged comment connection); affected comments stay unknown.
    pub incomplete: bool,
}

/// Candidate field names for the thread-level resolution flag, in trust order.
const RESOLVED_FIELDS: &[&str] = &["resolved", "is_resolved", "isResolved"];
/// Candidate field names for a comment's numeric id, in trust order.
const COMMENT_ID_FIELDS: &[&str] = &["id", "comment_id", "fullDatabaseId", "databaseId"];

const THREAD_RESOLUTION_QUERY: &str = "\
query PullReviewThreadResolution($owner: String!, $repo: String!, $number: Int!, $after: String) {
  repository(owner: $owner, name: $repo) {
    pullRequest(number: $number) {
      reviewThreads(first: 100, after: $after) {
        pageInfo { hasNextPage endCursor }
        nodes {
          isResolved
          comments(first: 100) {
            totalCount
            nodes { fullDatabaseId databaseId }
          }
        }
      }
    }
  }
}";

/// Look up which review comments belong to resolved threads.
pub async fn get_pull_review_thread_resolution(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    number: u64,
    cancel: &CancellationToken,
) -> Result<ThreadResolution, ExportError> {
    let rest_error = match client.list_pull_threads(owner, repo, number, cancel).await {
        Ok(threads) => return Ok(from_rest_threads(&threads)),
        Err(e) if e.is_aborted() => return Err(e),
        Err(e) => e,
    };

    tracing::debug!(error = %rest_error, "REST thread listing failed, trying GraphQL");

    match from_graphql(client, owner, repo, number, cancel).await {
        Ok(resolution) => Ok(resolution),
        Err(e) if e.is_aborted() => Err(e),
        Err(graphql_error) => Err(ExportError::Other(format!(
            "Review thread resolution failed. REST: {rest_error} GraphQL: {graphql_error}"
        ))),
    }
}

fn from_rest_threads(threads: &[Value]) -> ThreadResolution {
    let mut resolution = ThreadResolution::default();

    for thread in threads {
        let resolved = first_bool(thread, RESOLVED_FIELDS);
        let comments = thread.get("comments").and_then(Value::as_array);

        let (Some(resolved), Some(comments)) = (resolved, comments) else {
            resolution.incomplete = true;
            continue;
        };

        for comment in comments {
            match first_id(comment, COMMENT_ID_FIELDS) {
                Some(id) => {
                    resolution.resolved_by_comment.insert(id, resolved);
                }
                None => resolution.incomplete = true,
            }
        }
    }

    resolution
}

async fn from_graphql(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    number: u64,
    cancel: &CancellationToken,
) -> Result<ThreadResolution, ExportError> {
    let mut resolution = ThreadResolution::default();
    let mut after: Option<String> = None;

    loop {
        let body = json!({
            "query": THREAD_RESOLUTION_QUERY,
            "variables": {
                "owner": owner,
                "repo": repo,
                "number": number,
                "after": after,
            },
        });

        let response = client.post_graphql(&body, cancel).await?;

        if let Some(errors) = response.get("errors").and_then(Value::as_array)
            && !errors.is_empty()
        {
            let message = errors[0]
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("GraphQL query failed");
            return Err(ExportError::Other(message.to_string()));
        }

        let threads = response
            .pointer("/data/repository/pullRequest/reviewThreads")
            .ok_or_else(|| {
                ExportError::Other("GraphQL response is missing review threads".to_string())
            })?;

        if let Some(nodes) = threads.get("nodes").and_then(Value::as_array) {
            for thread in nodes {
                collect_graphql_thread(thread, &mut resolution);
            }
        }

        let page_info = threads.get("pageInfo");
        let has_next = page_info
            .and_then(|p| p.get("hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !has_next {
            break;
        }
        after = page_info
            .and_then(|p| p.get("endCursor"))
            .and_then(Value::as_str)
            .map(String::from);
        if after.is_none() {
            // No cursor despite hasNextPage; stop rather than loop forever.
            resolution.incomplete = true;
            break;
        }
    }

    Ok(resolution)
}

fn collect_graphql_thread(thread: &Value, resolution: &mut ThreadResolution) {
    let Some(resolved) = first_bool(thread, RESOLVED_FIELDS) else {
        resolution.incomplete = true;
        return;
    };

    let Some(comments) = thread.get("comments") else {
        resolution.incomplete = true;
        return;
    };

    let nodes = comments.get("nodes").and_then(Value::as_array);
    let Some(nodes) = nodes else {
        resolution.incomplete = true;
        return;
    };

    // A comment connection larger than the fetched window leaves the tail
    // comments unknown.
    if let Some(total) = comments.get("totalCount").and_then(Value::as_u64)
        && total as usize > nodes.len()
    {
        resolution.incomplete = true;
    }

    for comment in nodes {
        match first_id(comment, COMMENT_ID_FIELDS) {
            Some(id) => {
                resolution.resolved_by_comment.insert(id, resolved);
            }
            None => resolution.incomplete = true,
        }
    }
}

/// Try each candidate field in order, returning the first boolean found.
fn first_bool(value: &Value, fields: &[&str]) -> Option<bool> {
    fields.iter().find_map(|f| value.get(f).and_then(Value::as_bool))
}

/// Try each candidate field in order, accepting numeric or numeric-string ids.
fn first_id(value: &Value, fields: &[&str]) -> Option<u64> {
    fields.iter().find_map(|f| {
        let field = value.get(f)?;
        field
            .as_u64()
            .or_else(|| field.as_str().and_then(|s| s.parse().ok()))
    })
}

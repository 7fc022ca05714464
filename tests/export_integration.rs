//! Integration tests for the export building blocks reachable without a
//! network transport: profile resolution feeding the planners, timeline
//! slicing, the TTL cache, and the bounded executor.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use hubmark::cache::{NowFn, TtlCache, cache_key};
use hubmark::error::ExportError;
use hubmark::executor::run_ordered;
use hubmark::github::types::IssueComment;
use hubmark::plan::{plan_actions_run, plan_pull};
use hubmark::profile::{
    ActionsRunProfile, ExportProfile, PullPreset, PullProfile, infer_pull_preset,
};
use hubmark::timeline::{Marker, MarkerRange, MarkerType, slice_issue_comments};
use tokio_util::sync::CancellationToken;

fn comment(id: u64, ts: &str) -> IssueComment {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "body": format!("comment {id}"),
        "created_at": ts
    }))
    .unwrap()
}

#[test]
fn stored_profile_json_drives_the_planner() {
    let profile: ExportProfile = serde_json::from_str(
        r#"{
            "kind": "pull",
            "preset": "custom",
            "options": {
                "includeCommits": true,
                "includeCommitDiffs": true,
                "smartDiffMode": true,
                "includeFileDiffs": false,
                "includeReviewComments": false,
                "ignoreResolvedComments": true
            }
        }"#,
    )
    .unwrap();

    let ExportProfile::Pull(pull) = profile else {
        panic!("expected a pull profile");
    };
    let options = pull.resolve();
    // The resolved filter was stripped by invariant enforcement, so no
    // thread-resolution fetch; smart diff still forces the file list.
    let plan = plan_pull(&options);
    assert!(plan.fetch_files);
    assert!(plan.fetch_commit_details);
    assert!(!plan.fetch_thread_resolution);
    assert!(!plan.fetch_review_comments);
}

#[test]
fn preset_inference_survives_a_serde_round_trip() {
    for preset in PullPreset::BUILT_IN {
        let profile = PullProfile {
            preset,
            options: None,
        };
        let json = serde_json::to_string(&profile).unwrap();
        let restored: PullProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(infer_pull_preset(&restored.resolve()), preset);
    }
}

#[test]
fn default_actions_profile_fetches_jobs_and_logs() {
    let plan = plan_actions_run(&ActionsRunProfile::default().resolve());
    assert!(plan.fetch_jobs);
    assert!(plan.fetch_logs);
    assert!(!plan.failure_jobs_only);
}

#[test]
fn slicing_is_idempotent_under_operand_swap() {
    let comments = vec![
        comment(1, "2024-01-01T00:00:00Z"),
        comment(2, "2024-01-02T00:00:00Z"),
        comment(3, "2024-01-03T00:00:00Z"),
        comment(4, "2024-01-04T00:00:00Z"),
    ];
    let forward = MarkerRange {
        start: Some(Marker {
            kind: MarkerType::IssueComment,
            id: 2,
        }),
        end: Some(Marker {
            kind: MarkerType::IssueComment,
            id: 4,
        }),
    };
    let reversed = MarkerRange {
        start: forward.end,
        end: forward.start,
    };

    let a = slice_issue_comments(comments.clone(), Some(&forward)).unwrap();
    let b = slice_issue_comments(comments, Some(&reversed)).unwrap();
    assert_eq!(a.items, b.items);
    let ids: Vec<u64> = a.items.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![2, 3, 4]);
    assert!(b.warning.unwrap().contains("swapped"));
}

#[test]
fn cache_entries_expire_exactly_at_the_ttl_boundary() {
    let clock = Arc::new(AtomicI64::new(1_000));
    let now: NowFn = {
        let clock = Arc::clone(&clock);
        Arc::new(move || clock.load(Ordering::SeqCst))
    };
    let cache: TtlCache<String> = TtlCache::with_clock(50, now);

    let key = cache_key([Some("commit"), None, Some("o"), Some("r"), Some("abc")]);
    cache.insert(key.clone(), "cached".to_string());

    clock.store(1_049, Ordering::SeqCst);
    assert_eq!(cache.get(&key).as_deref(), Some("cached"));

    clock.store(1_050, Ordering::SeqCst);
    assert_eq!(cache.get(&key), None);
}

#[tokio::test(start_paused = true)]
async fn executor_preserves_order_and_respects_the_bound() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<BoxFuture<'static, Result<usize, ExportError>>> = (0..8)
        .map(|i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let current = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(current, Ordering::SeqCst);
                // Later tasks finish sooner; order must still hold.
                tokio::time::sleep(Duration::from_millis(80 - 10 * i as u64)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(i)
            }
            .boxed()
        })
        .collect();

    let cancel = CancellationToken::new();
    let results = run_ordered(tasks, 3, &cancel).await.unwrap();
    assert_eq!(results, (0..8).collect::<Vec<_>>());
    assert!(peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn executor_refuses_work_on_a_cancelled_token() {
    let ran = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<BoxFuture<'static, Result<(), ExportError>>> = (0..4)
        .map(|_| {
            let ran = Arc::clone(&ran);
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
        .collect();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = run_ordered(tasks, 2, &cancel).await.unwrap_err();
    assert!(err.is_aborted());
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

//! # Command Response Manager Integration Tests
//!
//! End-to-end behaviour of the public surface: submission, updates, snapshots,
//! bounded waits and multi-observer delivery.

mod common;

use command_response_manager::{
    CommandResponseError, QueryFinalAllOutcome, QueryFinalOutcome, ResponseKind,
};
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[test]
fn test_unknown_ids_query_invalid() {
    let crm = common::manager();
    for _ in 0..10 {
        assert_eq!(crm.query(&common::new_id()), ResponseKind::Invalid);
    }
}

#[test]
fn test_submit_track_registers_accepted_and_rejects_duplicates() {
    let crm = common::manager();
    let id = common::new_id();

    crm.submit_track(id, vec![]).unwrap();
    assert_eq!(crm.query(&id), ResponseKind::Accepted);

    let err = crm.submit_track(id, vec![]).unwrap_err();
    assert!(matches!(err, CommandResponseError::AlreadyExists { id: dup } if dup == id));
    assert_eq!(crm.query(&id), ResponseKind::Accepted);
}

#[test]
fn test_terminal_response_cannot_be_rewritten() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();

    crm.update(id, ResponseKind::Started).unwrap();
    crm.update(id, ResponseKind::Completed(json!({"position": 12.5})))
        .unwrap();
    assert_eq!(
        crm.query(&id),
        ResponseKind::Completed(json!({"position": 12.5}))
    );

    let err = crm
        .update(id, ResponseKind::Error("too late".into()))
        .unwrap_err();
    assert!(matches!(err, CommandResponseError::InvalidOperation { .. }));
    assert_eq!(
        crm.query(&id),
        ResponseKind::Completed(json!({"position": 12.5}))
    );
}

#[test]
fn test_executor_may_finish_without_started() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();
    crm.update(id, ResponseKind::Locked).unwrap();
    assert_eq!(crm.query(&id), ResponseKind::Locked);
}

#[tokio::test]
async fn test_query_final_returns_terminal_arriving_before_deadline() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();

    let executor = crm.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(20)).await;
        executor.update(id, ResponseKind::Started).unwrap();
        sleep(Duration::from_millis(20)).await;
        executor
            .update(id, ResponseKind::Completed(json!("done")))
            .unwrap();
    });

    let outcome = crm.query_final(id, Duration::from_secs(5)).await;
    assert_eq!(
        outcome,
        QueryFinalOutcome::Response(ResponseKind::Completed(json!("done")))
    );
    assert_eq!(crm.subscriber_count(&id), 0);
}

#[tokio::test(start_paused = true)]
async fn test_query_final_timeout_leaves_state_untouched() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();
    crm.update(id, ResponseKind::Started).unwrap();

    let outcome = crm.query_final(id, Duration::from_millis(100)).await;
    assert!(outcome.is_timeout());
    assert_eq!(crm.query(&id), ResponseKind::Started);
    assert_eq!(crm.subscriber_count(&id), 0);

    // A retry after the timeout still sees the eventual result
    let waiter = {
        let crm = crm.clone();
        tokio::spawn(async move { crm.query_final(id, Duration::from_secs(1)).await })
    };
    tokio::task::yield_now().await;
    crm.update(id, ResponseKind::Cancelled).unwrap();
    assert_eq!(
        waiter.await.unwrap(),
        QueryFinalOutcome::Response(ResponseKind::Cancelled)
    );
}

#[tokio::test]
async fn test_query_final_on_unknown_and_finished_commands_returns_immediately() {
    let crm = common::manager();
    assert_eq!(
        crm.query_final(common::new_id(), Duration::from_secs(30)).await,
        QueryFinalOutcome::Response(ResponseKind::Invalid)
    );

    let id = common::new_id();
    crm.update(id, ResponseKind::Error("stalled".into())).unwrap();
    assert_eq!(
        crm.query_final(id, Duration::from_secs(30)).await,
        QueryFinalOutcome::Response(ResponseKind::Error("stalled".into()))
    );
}

#[tokio::test]
async fn test_query_final_cancellation_releases_subscription() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();

    let cancel = CancellationToken::new();
    let waiter = {
        let crm = crm.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            crm.query_final_with_cancel(id, Duration::from_secs(30), cancel)
                .await
        })
    };

    while crm.subscriber_count(&id) == 0 {
        tokio::task::yield_now().await;
    }
    cancel.cancel();

    assert_eq!(waiter.await.unwrap(), QueryFinalOutcome::Cancelled);
    assert_eq!(crm.subscriber_count(&id), 0);
    assert_eq!(crm.query(&id), ResponseKind::Accepted);
}

#[tokio::test]
async fn test_dropping_query_final_future_releases_subscription() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();

    let result = tokio::time::timeout(
        Duration::from_millis(20),
        crm.query_final(id, Duration::from_secs(30)),
    )
    .await;
    assert!(result.is_err());
    assert_eq!(crm.subscriber_count(&id), 0);
}

#[tokio::test]
async fn test_concurrent_subscribers_each_receive_one_terminal() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();

    let observers: Vec<_> = (0..8)
        .map(|_| {
            let subscription = crm.subscribe(id);
            tokio::spawn(async move { subscription.collect::<Vec<_>>().await })
        })
        .collect();
    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let crm = crm.clone();
            tokio::spawn(async move { crm.query_final(id, Duration::from_secs(5)).await })
        })
        .collect();

    while crm.subscriber_count(&id) < 12 {
        tokio::task::yield_now().await;
    }
    crm.update(id, ResponseKind::Started).unwrap();
    crm.update(id, ResponseKind::Completed(json!(7))).unwrap();

    for observer in observers {
        let seen = observer.await.unwrap();
        let terminals: Vec<_> = seen.iter().filter(|k| k.is_terminal()).collect();
        assert_eq!(terminals, vec![&ResponseKind::Completed(json!(7))]);
        assert_eq!(seen.last(), Some(&ResponseKind::Completed(json!(7))));
    }
    for waiter in waiters {
        assert_eq!(
            waiter.await.unwrap(),
            QueryFinalOutcome::Response(ResponseKind::Completed(json!(7)))
        );
    }
}

#[tokio::test]
async fn test_duplicate_terminal_update_is_idempotent() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();
    let subscription = crm.subscribe(id);

    crm.update(id, ResponseKind::Completed(json!("r"))).unwrap();
    crm.update(id, ResponseKind::Completed(json!("r"))).unwrap();
    assert_eq!(crm.query(&id), ResponseKind::Completed(json!("r")));

    let seen: Vec<_> = subscription.collect().await;
    assert_eq!(
        seen,
        vec![
            ResponseKind::Accepted,
            ResponseKind::Completed(json!("r"))
        ]
    );
}

#[tokio::test]
async fn test_late_subscriber_gets_terminal_immediately() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();
    crm.update(id, ResponseKind::Cancelled).unwrap();

    let seen: Vec<_> = crm.subscribe(id).collect().await;
    assert_eq!(seen, vec![ResponseKind::Cancelled]);
}

#[test]
fn test_record_exposes_timestamps_and_links() {
    let crm = common::manager();
    let [parent, child] = common::new_ids::<2>();
    crm.submit_track(parent, vec![child]).unwrap();

    let record = crm.record(&parent).unwrap();
    assert_eq!(record.children, vec![child]);
    assert!(record.terminal_at.is_none());
    assert_eq!(crm.children_of(&parent), Some(vec![child]));
    assert_eq!(crm.parent_of(&child), Some(parent));
    assert_eq!(crm.parent_of(&parent), None);
}

#[tokio::test(start_paused = true)]
async fn test_query_final_default_uses_configured_timeout() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();

    let started = tokio::time::Instant::now();
    assert!(crm.query_final_default(id).await.is_timeout());
    assert!(started.elapsed() >= crm.config().default_query_final_timeout());
}

#[tokio::test]
async fn test_query_final_all_succeeds_when_every_command_completes() {
    let crm = common::manager();
    let ids = common::new_ids::<3>();
    for id in ids {
        crm.submit_track(id, vec![]).unwrap();
    }

    let executor = crm.clone();
    tokio::spawn(async move {
        for (n, id) in ids.into_iter().enumerate().rev() {
            sleep(Duration::from_millis(5)).await;
            executor.update(id, ResponseKind::Completed(json!(n))).unwrap();
        }
    });

    let outcome = crm.query_final_all(&ids, Duration::from_secs(5)).await;
    assert_eq!(
        outcome,
        QueryFinalAllOutcome::Success(vec![
            QueryFinalOutcome::Response(ResponseKind::Completed(json!(0))),
            QueryFinalOutcome::Response(ResponseKind::Completed(json!(1))),
            QueryFinalOutcome::Response(ResponseKind::Completed(json!(2))),
        ])
    );
}

#[tokio::test]
async fn test_query_final_all_fails_on_one_error() {
    let crm = common::manager();
    let [ok, failed] = common::new_ids::<2>();
    crm.submit_track(ok, vec![]).unwrap();
    crm.submit_track(failed, vec![]).unwrap();

    let executor = crm.clone();
    tokio::spawn(async move {
        executor.update(failed, ResponseKind::Error("axis fault".into())).unwrap();
        executor.update(ok, ResponseKind::Completed(json!("parked"))).unwrap();
    });

    let outcome = crm.query_final_all(&[ok, failed], Duration::from_secs(5)).await;
    assert!(!outcome.is_success());
    assert_eq!(
        outcome.outcomes(),
        &[
            QueryFinalOutcome::Response(ResponseKind::Completed(json!("parked"))),
            QueryFinalOutcome::Response(ResponseKind::Error("axis fault".into())),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_query_final_all_fails_when_a_command_times_out() {
    let crm = common::manager();
    let [done, stuck] = common::new_ids::<2>();
    crm.submit_track(done, vec![]).unwrap();
    crm.submit_track(stuck, vec![]).unwrap();
    crm.update(done, ResponseKind::Completed(json!(1))).unwrap();
    crm.update(stuck, ResponseKind::Started).unwrap();

    let outcome = crm
        .query_final_all(&[done, stuck], Duration::from_millis(250))
        .await;
    assert_eq!(
        outcome,
        QueryFinalAllOutcome::Failure(vec![
            QueryFinalOutcome::Response(ResponseKind::Completed(json!(1))),
            QueryFinalOutcome::Timeout,
        ])
    );
    assert_eq!(crm.subscriber_count(&stuck), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_produce_one_terminal_per_command() {
    let crm = common::manager();
    let ids: Vec<_> = (0..200).map(|_| common::new_id()).collect();
    for id in &ids {
        crm.submit_track(*id, vec![]).unwrap();
    }

    let mut observers = Vec::new();
    for id in &ids {
        for _ in 0..4 {
            let subscription = crm.subscribe(*id);
            observers.push((*id, tokio::spawn(subscription.collect::<Vec<_>>())));
        }
    }

    let writers: Vec<_> = (0..8)
        .map(|writer| {
            let crm = crm.clone();
            let ids = ids.clone();
            tokio::spawn(async move {
                for id in ids {
                    // Losing writers are rejected once another terminal is stored
                    let _ = crm.update(id, ResponseKind::Started);
                    let terminal = if writer % 2 == 0 {
                        ResponseKind::Completed(json!(writer))
                    } else {
                        ResponseKind::Error(format!("writer {writer}"))
                    };
                    let _ = crm.update(id, terminal);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    for (id, observer) in observers {
        let seen = observer.await.unwrap();
        let terminals: Vec<_> = seen.iter().filter(|k| k.is_terminal()).collect();
        assert_eq!(terminals.len(), 1);
        assert_eq!(seen.last(), Some(&crm.query(&id)));
    }
}

//! Subscription streams under backpressure and explicit cancellation.

mod common;

use command_response_manager::ResponseKind;
use futures::StreamExt;
use serde_json::json;
use tokio_test::{assert_pending, assert_ready_eq};

#[tokio::test]
async fn test_slow_consumer_never_loses_terminal() {
    let crm = common::manager_with_buffer(2);
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();
    let subscription = crm.subscribe(id);

    crm.update(id, ResponseKind::Started).unwrap();
    crm.update(id, ResponseKind::Error("overheated".into()))
        .unwrap();

    // Producer finished without waiting on the consumer
    assert_eq!(subscription.dropped_updates(), 0);
    let seen: Vec<_> = subscription.collect().await;
    assert_eq!(
        seen,
        vec![
            ResponseKind::Accepted,
            ResponseKind::Started,
            ResponseKind::Error("overheated".into())
        ]
    );
}

#[tokio::test]
async fn test_buffer_overflow_drops_oldest_progress_update() {
    let crm = common::manager_with_buffer(1);
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();
    let subscription = crm.subscribe(id);

    crm.update(id, ResponseKind::Started).unwrap();
    crm.update(id, ResponseKind::Completed(json!(3))).unwrap();

    assert_eq!(subscription.dropped_updates(), 1);
    let seen: Vec<_> = subscription.collect().await;
    assert_eq!(
        seen,
        vec![ResponseKind::Started, ResponseKind::Completed(json!(3))]
    );
}

#[tokio::test]
async fn test_unsubscribe_ends_stream_without_terminal() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();

    let mut subscription = crm.subscribe(id);
    assert_eq!(subscription.recv().await, Some(ResponseKind::Accepted));

    let handle = subscription.handle();
    assert_eq!(handle.command_id, id);
    assert!(crm.unsubscribe(&handle));
    assert!(!crm.unsubscribe(&handle));

    crm.update(id, ResponseKind::Completed(json!(1))).unwrap();
    assert_eq!(subscription.recv().await, None);
}

#[tokio::test]
async fn test_unsubscribe_leaves_other_observers_untouched() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();

    let cancelled = crm.subscribe(id);
    let kept = crm.subscribe(id);
    assert_eq!(crm.subscriber_count(&id), 2);

    crm.unsubscribe(&cancelled.handle());
    assert_eq!(crm.subscriber_count(&id), 1);

    crm.update(id, ResponseKind::Cancelled).unwrap();
    let seen: Vec<_> = kept.collect().await;
    assert_eq!(seen.last(), Some(&ResponseKind::Cancelled));
    assert_eq!(crm.subscriber_count(&id), 0);
}

#[tokio::test]
async fn test_subscribe_to_unknown_yields_invalid_once() {
    let crm = common::manager();
    let seen: Vec<_> = crm.subscribe(common::new_id()).collect().await;
    assert_eq!(seen, vec![ResponseKind::Invalid]);
}

#[tokio::test]
async fn test_subscription_is_restartable_by_resubscribing() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();

    let first: Vec<_> = {
        let subscription = crm.subscribe(id);
        crm.update(id, ResponseKind::Started).unwrap();
        crm.update(id, ResponseKind::Completed(json!("ok"))).unwrap();
        subscription.collect().await
    };
    let second: Vec<_> = crm.subscribe(id).collect().await;

    assert_eq!(first.last(), second.last());
    assert_eq!(second, vec![ResponseKind::Completed(json!("ok"))]);
}

#[test]
fn test_stream_is_woken_by_publish() {
    let crm = common::manager();
    let id = common::new_id();
    crm.submit_track(id, vec![]).unwrap();

    let mut stream = tokio_test::task::spawn(crm.subscribe(id));
    assert_ready_eq!(stream.poll_next(), Some(ResponseKind::Accepted));
    assert_pending!(stream.poll_next());

    crm.update(id, ResponseKind::Started).unwrap();
    assert!(stream.is_woken());
    assert_ready_eq!(stream.poll_next(), Some(ResponseKind::Started));
    assert_pending!(stream.poll_next());
}

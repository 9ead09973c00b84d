mod common;

use std::time::Duration;

use common::{dispatch_config, expand_message, sns_config, TestContext};
use pushwire_common::models::Platform;
use pushwire_common::BrokerError;
use pushwire_config::SnsConfig;
use pushwire_db::DeviceRepository;
use pushwire_sns::{
    run_job, DispatchError, DispatchJob, DispatchQueue, Notifiable, Notifier, RetryPolicy,
    SilentNotification, VisibleNotification,
};

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Duration::from_millis(1),
    }
}

struct Member {
    user_id: String,
    unread: u32,
}

impl Notifiable for Member {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn badge_count(&self) -> u32 {
        self.unread
    }
}

#[tokio::test]
async fn test_run_job_retries_transient_failures() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;
    ctx.broker
        .fail_next_publish(BrokerError::Transport("connection reset".to_string()));
    ctx.broker.fail_next_publish(BrokerError::Timeout);

    let job = DispatchJob::new(device.id, VisibleNotification::new("hi"));
    let outcome = run_job(&ctx.handler, &job, &fast_policy(3)).await.unwrap();

    assert!(outcome.is_delivered());
    assert_eq!(ctx.broker.published().len(), 3);
    assert_eq!(ctx.broker.created().len(), 1);
    assert_eq!(ctx.messages.all().await.len(), 1);
}

#[tokio::test]
async fn test_run_job_gives_up_after_max_attempts() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;
    for _ in 0..3 {
        ctx.broker
            .fail_next_publish(BrokerError::Transport("connection reset".to_string()));
    }

    let job = DispatchJob::new(device.id, VisibleNotification::new("hi"));
    let err = run_job(&ctx.handler, &job, &fast_policy(2)).await.unwrap_err();

    assert!(matches!(err, DispatchError::Transport(_)));
    assert_eq!(ctx.broker.published().len(), 2);
    assert!(ctx.messages.all().await.is_empty());
}

#[tokio::test]
async fn test_run_job_does_not_retry_inactive_devices() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;
    ctx.devices.invalidate(device.id).await.unwrap();

    let job = DispatchJob::new(device.id, VisibleNotification::new("hi"));
    let err = run_job(&ctx.handler, &job, &fast_policy(5)).await.unwrap_err();

    assert!(matches!(err, DispatchError::DeviceInactive(_)));
    assert!(ctx.broker.published().is_empty());
}

#[tokio::test]
async fn test_workers_drain_the_queue_on_shutdown() {
    let ctx = TestContext::new();
    let mut ids = Vec::new();
    for n in 0..5 {
        let device = ctx
            .register(&format!("user-{}", n), &format!("token-{}", n), Platform::Android)
            .await;
        ids.push(device.id);
    }

    let (queue, workers) = DispatchQueue::spawn(ctx.handler.clone(), &dispatch_config());
    for id in &ids {
        queue
            .submit(DispatchJob::new(*id, VisibleNotification::new("hello")))
            .await
            .unwrap();
    }
    workers.shutdown(queue).await;

    assert_eq!(ctx.broker.published().len(), 5);
    let mut logged: Vec<i64> = ctx
        .messages
        .all()
        .await
        .into_iter()
        .map(|record| record.device_id)
        .collect();
    logged.sort_unstable();
    assert_eq!(logged, ids);
}

#[tokio::test]
async fn test_notify_targets_latest_active_device() {
    let config = SnsConfig {
        default_sound: Some("default".to_string()),
        ..sns_config()
    };
    let ctx = TestContext::with_config(&config);
    let old = ctx.register("alice", "old-token", Platform::Android).await;
    let stale = ctx.register("alice", "stale-token", Platform::Android).await;
    ctx.devices.invalidate(stale.id).await.unwrap();

    let (queue, workers) = DispatchQueue::spawn(ctx.handler.clone(), &dispatch_config());
    let notifier = Notifier::new(ctx.devices.clone(), queue.clone(), &config);
    let alice = Member {
        user_id: "alice".to_string(),
        unread: 3,
    };

    let active = alice.active_device(&notifier).await.unwrap().unwrap();
    assert_eq!(active.id, old.id);

    let queued = alice
        .send_push_notification(&notifier, VisibleNotification::new("You have mail"))
        .await
        .unwrap();
    assert!(queued);

    drop(notifier);
    workers.shutdown(queue).await;

    let records = ctx.messages.all().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].device_id, old.id);
    let message = expand_message(&ctx.broker.published()[0].message);
    assert_eq!(message["GCM"]["data"]["badge"], 3);
    assert_eq!(message["GCM"]["data"]["sound"], "default");
}

#[tokio::test]
async fn test_badge_count_replaces_notification_badge() {
    let ctx = TestContext::new();
    ctx.register("alice", "apns-token", Platform::Ios).await;

    let (queue, workers) = DispatchQueue::spawn(ctx.handler.clone(), &dispatch_config());
    let notifier = Notifier::new(ctx.devices.clone(), queue.clone(), &sns_config());
    let alice = Member {
        user_id: "alice".to_string(),
        unread: 3,
    };

    alice
        .send_silent_push_notification(&notifier, SilentNotification::new().with_badge(0))
        .await
        .unwrap();
    alice
        .send_push_notification(&notifier, VisibleNotification::new("hi").with_badge(9))
        .await
        .unwrap();

    drop(notifier);
    workers.shutdown(queue).await;

    let messages: Vec<_> = ctx
        .broker
        .published()
        .iter()
        .map(|publish| expand_message(&publish.message))
        .collect();
    assert_eq!(messages.len(), 2);
    for message in &messages {
        assert_eq!(message["APNS"]["aps"]["badge"], 3);
    }
    assert!(messages
        .iter()
        .any(|message| message["APNS"]["aps"]["content-available"] == true));
}

#[tokio::test]
async fn test_notify_without_active_device_queues_nothing() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;
    ctx.devices.invalidate(device.id).await.unwrap();

    let (queue, workers) = DispatchQueue::spawn(ctx.handler.clone(), &dispatch_config());
    let notifier = Notifier::new(ctx.devices.clone(), queue.clone(), &sns_config());

    let queued = notifier
        .notify("alice", 0, VisibleNotification::new("hi"))
        .await
        .unwrap();
    assert!(!queued);
    assert!(!notifier.notify("nobody", 0, VisibleNotification::new("hi")).await.unwrap());

    drop(notifier);
    workers.shutdown(queue).await;
    assert!(ctx.broker.published().is_empty());
}

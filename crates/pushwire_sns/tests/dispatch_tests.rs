mod common;

use common::{expand_message, sns_config, TestContext, ANDROID_ARN, IOS_ARN, IOS_SANDBOX_ARN};
use pushwire_common::models::Platform;
use pushwire_common::{BrokerError, ENDPOINT_DISABLED, MESSAGE_STRUCTURE_JSON};
use pushwire_config::SnsConfig;
use pushwire_db::DeviceRepository;
use pushwire_sns::{
    ApplicationArns, DispatchError, DispatchHandler, Notification, PayloadBuilder,
    SilentNotification, VisibleNotification,
};
use serde_json::json;

fn visible(message: &str) -> Notification {
    VisibleNotification::new(message).into()
}

#[tokio::test]
async fn test_first_send_creates_and_persists_endpoint() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "fcm-token-1", Platform::Android).await;

    let outcome = ctx.handler.dispatch(device.id, &visible("hello")).await.unwrap();

    assert_eq!(
        ctx.broker.created(),
        vec![(ANDROID_ARN.to_string(), "fcm-token-1".to_string())]
    );
    let stored = ctx.device(device.id).await;
    let arn = stored.sns_platform_endpoint_arn.clone().unwrap();

    let published = ctx.broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].target_arn, arn);
    assert_eq!(published[0].message_structure, MESSAGE_STRUCTURE_JSON);
    assert_eq!(outcome.message_id.as_deref(), Some("msg-1"));
    assert!(outcome.is_delivered());
    assert!(!outcome.endpoint_disabled);

    let record = outcome.record.unwrap();
    assert_eq!(record.device_id, device.id);
    assert_eq!(record.body, "hello");
    assert_eq!(record.data, published[0].message);
    assert_eq!(record.sns_message_id.as_deref(), Some("msg-1"));
    assert_eq!(record.sns_response, r#"{"MessageId":"msg-1"}"#);

    // The second send reuses the stored endpoint.
    ctx.handler.dispatch(device.id, &visible("again")).await.unwrap();
    assert_eq!(ctx.broker.created().len(), 1);
    assert_eq!(ctx.broker.published()[1].target_arn, arn);
}

#[tokio::test]
async fn test_cached_endpoint_skips_registration() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "apns-token", Platform::Ios).await;
    ctx.devices
        .update_endpoint_arn(device.id, "arn:aws:sns:eu-west-1:123456789012:endpoint/APNS/pushwire/cached")
        .await
        .unwrap();

    ctx.handler.dispatch(device.id, &visible("hi")).await.unwrap();

    assert!(ctx.broker.created().is_empty());
    assert_eq!(
        ctx.broker.published()[0].target_arn,
        "arn:aws:sns:eu-west-1:123456789012:endpoint/APNS/pushwire/cached"
    );
}

#[tokio::test]
async fn test_ios_visible_payload() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "apns-token", Platform::Ios).await;
    let notification = VisibleNotification::new("Your order has shipped")
        .with_url("https://example.com/orders/42")
        .with_badge(2)
        .with_sound("chime.caf");

    ctx.handler
        .dispatch(device.id, &notification.into())
        .await
        .unwrap();

    assert_eq!(ctx.broker.created()[0].0, IOS_ARN);
    let message = expand_message(&ctx.broker.published()[0].message);
    assert_eq!(
        message,
        json!({
            "APNS": {
                "aps": {
                    "alert": "Your order has shipped",
                    "sound": "chime.caf",
                    "badge": 2,
                    "custom": {"url": "https://example.com/orders/42"}
                }
            }
        })
    );
}

#[tokio::test]
async fn test_android_silent_payload() {
    let ctx = TestContext::new();
    let device = ctx.register("bob", "fcm-token", Platform::Android).await;
    let notification = SilentNotification::new().with_custom("sync", "inbox");

    let outcome = ctx
        .handler
        .dispatch(device.id, &notification.into())
        .await
        .unwrap();

    let message = expand_message(&ctx.broker.published()[0].message);
    assert_eq!(
        message,
        json!({
            "GCM": {
                "data": {
                    "content-available": true,
                    "sound": "",
                    "custom": {"sync": "inbox"}
                }
            }
        })
    );
    assert_eq!(outcome.record.unwrap().body, "");
}

#[tokio::test]
async fn test_sandbox_uses_sandbox_application_and_envelope() {
    let config = SnsConfig {
        ios_sandbox_enabled: true,
        ..sns_config()
    };
    let ctx = TestContext::with_config(&config);
    let device = ctx.register("alice", "apns-token", Platform::Ios).await;

    ctx.handler.dispatch(device.id, &visible("hi")).await.unwrap();

    assert_eq!(ctx.broker.created()[0].0, IOS_SANDBOX_ARN);
    let message = expand_message(&ctx.broker.published()[0].message);
    assert_eq!(message["APNS_SANDBOX"]["aps"]["alert"], "hi");
    assert!(message.get("APNS").is_none());
}

#[tokio::test]
async fn test_long_messages_are_truncated() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;
    let long = "é".repeat(300);

    let outcome = ctx.handler.dispatch(device.id, &visible(&long)).await.unwrap();

    let record = outcome.record.unwrap();
    assert_eq!(record.body.chars().count(), 255);
    let message = expand_message(&ctx.broker.published()[0].message);
    assert_eq!(message["GCM"]["data"]["alert"].as_str().unwrap().chars().count(), 255);
}

#[tokio::test]
async fn test_inactive_device_is_never_published() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;
    ctx.devices.invalidate(device.id).await.unwrap();

    let err = ctx.handler.dispatch(device.id, &visible("hi")).await.unwrap_err();

    assert!(matches!(err, DispatchError::DeviceInactive(id) if id == device.id));
    assert!(ctx.broker.created().is_empty());
    assert!(ctx.broker.published().is_empty());
    assert!(ctx.messages.all().await.is_empty());
}

#[tokio::test]
async fn test_endpoint_disabled_invalidates_device() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;
    ctx.broker
        .fail_next_publish(BrokerError::service(ENDPOINT_DISABLED, None));

    let outcome = ctx.handler.dispatch(device.id, &visible("hi")).await.unwrap();

    assert!(outcome.endpoint_disabled);
    assert!(!outcome.is_delivered());
    let record = outcome.record.unwrap();
    assert_eq!(record.sns_message_id, None);
    assert_eq!(record.sns_response, r#"{"Error":{"Code":"EndpointDisabled"}}"#);
    assert_eq!(record.error_message(), None);

    let stored = ctx.device(device.id).await;
    assert!(!stored.is_active());

    let err = ctx.handler.dispatch(device.id, &visible("hi")).await.unwrap_err();
    assert!(matches!(err, DispatchError::DeviceInactive(_)));
    assert_eq!(ctx.broker.published().len(), 1);
}

#[tokio::test]
async fn test_other_broker_errors_propagate_without_record() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;
    ctx.broker.fail_next_publish(BrokerError::service(
        "InvalidParameter",
        Some("Invalid parameter: TargetArn".to_string()),
    ));

    let err = ctx.handler.dispatch(device.id, &visible("hi")).await.unwrap_err();

    assert!(matches!(
        err,
        DispatchError::Transport(BrokerError::Service { ref code, .. }) if code == "InvalidParameter"
    ));
    assert!(ctx.messages.all().await.is_empty());
    assert!(ctx.device(device.id).await.is_active());
}

#[tokio::test]
async fn test_audit_log_can_be_disabled() {
    let ctx = TestContext::new();
    let config = sns_config();
    let handler = DispatchHandler::with_parts(
        ctx.broker.clone(),
        ctx.devices.clone(),
        ctx.messages.clone(),
        PayloadBuilder::from_config(&config),
        ApplicationArns::from_config(&config),
        false,
    );
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;

    let outcome = handler.dispatch(device.id, &visible("hi")).await.unwrap();

    assert!(outcome.record.is_none());
    assert!(outcome.is_delivered());
    assert!(ctx.messages.all().await.is_empty());
}

#[tokio::test]
async fn test_missing_application_arn_is_a_config_error() {
    let ctx = TestContext::new();
    let handler = DispatchHandler::with_parts(
        ctx.broker.clone(),
        ctx.devices.clone(),
        ctx.messages.clone(),
        PayloadBuilder::default(),
        ApplicationArns::default(),
        true,
    );
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;

    let err = handler.dispatch(device.id, &visible("hi")).await.unwrap_err();

    assert!(matches!(err, DispatchError::Config(_)));
    assert!(ctx.broker.published().is_empty());
}

#[tokio::test]
async fn test_unknown_device() {
    let ctx = TestContext::new();
    let err = ctx.handler.dispatch(42, &visible("hi")).await.unwrap_err();
    assert!(matches!(err, DispatchError::DeviceNotFound(42)));
}

#[tokio::test]
async fn test_empty_visible_message_is_rejected() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;

    let err = ctx.handler.dispatch(device.id, &visible("")).await.unwrap_err();

    assert!(matches!(err, DispatchError::Payload(_)));
    assert!(ctx.broker.created().is_empty());
}

#[tokio::test]
async fn test_resend_publishes_the_recorded_message_again() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "apns-token", Platform::Ios).await;
    let notification = VisibleNotification::new("Reminder")
        .with_url("https://example.com/r/1")
        .with_category("reminder");
    let first = ctx
        .handler
        .dispatch(device.id, &notification.into())
        .await
        .unwrap();
    let record = first.record.unwrap();

    let second = ctx.handler.resend(record.id).await.unwrap();

    let published = ctx.broker.published();
    assert_eq!(published.len(), 2);
    assert_eq!(
        expand_message(&published[1].message),
        expand_message(&published[0].message)
    );
    assert_ne!(second.record.unwrap().id, record.id);
    assert_eq!(ctx.messages.all().await.len(), 2);
}

#[tokio::test]
async fn test_resend_of_silent_push_stays_silent() {
    let ctx = TestContext::new();
    let device = ctx.register("bob", "fcm-token", Platform::Android).await;
    let first = ctx
        .handler
        .dispatch(device.id, &SilentNotification::new().with_badge(4).into())
        .await
        .unwrap();

    ctx.handler.resend(first.record.unwrap().id).await.unwrap();

    let message = expand_message(&ctx.broker.published()[1].message);
    assert_eq!(message["GCM"]["data"]["content-available"], true);
    assert_eq!(message["GCM"]["data"]["badge"], 4);
    assert!(message["GCM"]["data"].get("alert").is_none());
}

#[tokio::test]
async fn test_resend_unknown_message() {
    let ctx = TestContext::new();
    let err = ctx.handler.resend(7).await.unwrap_err();
    assert!(matches!(err, DispatchError::MessageNotFound(7)));
}

#[tokio::test]
async fn test_reset_endpoint_forces_a_new_registration() {
    let ctx = TestContext::new();
    let device = ctx.register("alice", "fcm-token", Platform::Android).await;
    ctx.handler.dispatch(device.id, &visible("hi")).await.unwrap();

    let reset = ctx.handler.reset_endpoint(device.id).await.unwrap();
    assert_eq!(reset.sns_platform_endpoint_arn, None);

    ctx.handler.dispatch(device.id, &visible("hi")).await.unwrap();
    assert_eq!(ctx.broker.created().len(), 2);
}

#[tokio::test]
async fn test_reset_endpoint_of_unknown_device() {
    let ctx = TestContext::new();
    let err = ctx.handler.reset_endpoint(99).await.unwrap_err();
    assert!(matches!(err, DispatchError::DeviceNotFound(99)));
}

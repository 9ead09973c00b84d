//! Test fixtures for dispatch tests
//!
//! A recording [`MockBroker`] stands in for SNS; devices and messages live in the in-memory
//! repositories.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use pushwire_common::models::{Device, DeviceRegistration, Platform};
use pushwire_common::{BoxFuture, BrokerError, PublishRequest, PublishResponse, PushBroker};
use pushwire_config::{DispatchConfig, SnsConfig};
use pushwire_db::{DeviceRepository, MemoryDeviceRepository, MemoryPushMessageRepository};
use pushwire_sns::DispatchHandler;
use serde_json::{Map, Value};

pub const IOS_ARN: &str = "arn:aws:sns:eu-west-1:123456789012:app/APNS/pushwire";
pub const IOS_SANDBOX_ARN: &str = "arn:aws:sns:eu-west-1:123456789012:app/APNS_SANDBOX/pushwire";
pub const ANDROID_ARN: &str = "arn:aws:sns:eu-west-1:123456789012:app/GCM/pushwire";

pub type MemoryHandler = DispatchHandler<MemoryDeviceRepository, MemoryPushMessageRepository>;

#[derive(Default)]
struct Recorded {
    created: Vec<(String, String)>,
    published: Vec<PublishRequest>,
    publish_errors: VecDeque<BrokerError>,
}

/// Records every broker call; publishes fail with queued errors first, then succeed.
#[derive(Default)]
pub struct MockBroker {
    recorded: Mutex<Recorded>,
}

impl MockBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next publish call fail with `err`.
    pub fn fail_next_publish(&self, err: BrokerError) {
        self.recorded.lock().unwrap().publish_errors.push_back(err);
    }

    /// `(application ARN, token)` of every endpoint creation
    pub fn created(&self) -> Vec<(String, String)> {
        self.recorded.lock().unwrap().created.clone()
    }

    pub fn published(&self) -> Vec<PublishRequest> {
        self.recorded.lock().unwrap().published.clone()
    }
}

impl PushBroker for MockBroker {
    fn create_platform_endpoint(
        &self,
        application_arn: &str,
        token: &str,
    ) -> BoxFuture<'_, String, BrokerError> {
        let application_arn = application_arn.to_string();
        let token = token.to_string();
        Box::pin(async move {
            let arn = format!("{}/endpoint/{}", application_arn.replace(":app/", ":endpoint/"), token);
            self.recorded
                .lock()
                .unwrap()
                .created
                .push((application_arn, token));
            Ok(arn)
        })
    }

    fn publish(&self, request: PublishRequest) -> BoxFuture<'_, PublishResponse, BrokerError> {
        Box::pin(async move {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.published.push(request);
            match recorded.publish_errors.pop_front() {
                Some(err) => Err(err),
                None => Ok(PublishResponse::with_message_id(format!(
                    "msg-{}",
                    recorded.published.len()
                ))),
            }
        })
    }
}

pub fn sns_config() -> SnsConfig {
    SnsConfig {
        region: Some("eu-west-1".to_string()),
        ios_application_arn: Some(IOS_ARN.to_string()),
        ios_sandbox_application_arn: Some(IOS_SANDBOX_ARN.to_string()),
        android_application_arn: Some(ANDROID_ARN.to_string()),
        ..SnsConfig::default()
    }
}

pub fn dispatch_config() -> DispatchConfig {
    DispatchConfig {
        worker_count: 2,
        queue_capacity: 16,
        max_attempts: 3,
        retry_backoff_ms: 1,
    }
}

pub struct TestContext {
    pub broker: Arc<MockBroker>,
    pub devices: MemoryDeviceRepository,
    pub messages: MemoryPushMessageRepository,
    pub handler: Arc<MemoryHandler>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(&sns_config())
    }

    pub fn with_config(config: &SnsConfig) -> Self {
        let broker = MockBroker::new();
        let devices = MemoryDeviceRepository::new();
        let messages = MemoryPushMessageRepository::new();
        let handler = Arc::new(DispatchHandler::new(
            broker.clone(),
            devices.clone(),
            messages.clone(),
            config,
        ));
        Self {
            broker,
            devices,
            messages,
            handler,
        }
    }

    pub async fn register(&self, user_id: &str, token: &str, platform: Platform) -> Device {
        self.devices
            .register_device(DeviceRegistration::new(user_id, token, platform))
            .await
            .unwrap()
    }

    pub async fn device(&self, id: i64) -> Device {
        self.devices.find_by_id(id).await.unwrap().unwrap()
    }
}

/// Parses a published message with the envelope payload expanded into JSON.
pub fn expand_message(message: &str) -> Value {
    let outer: Map<String, Value> = serde_json::from_str(message).unwrap();
    let expanded = outer
        .into_iter()
        .map(|(key, value)| {
            let inner: Value = serde_json::from_str(value.as_str().unwrap()).unwrap();
            (key, inner)
        })
        .collect::<Map<String, Value>>();
    Value::Object(expanded)
}

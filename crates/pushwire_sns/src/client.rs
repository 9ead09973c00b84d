//! AWS SNS client module
//!
//! [`SnsClient`] implements [`PushBroker`] on top of `aws-sdk-sns`. Broker answers are mapped to
//! [`BrokerError`]: service errors keep their SNS error code (e.g. `EndpointDisabled`), calls
//! exceeding the configured operation timeout become [`BrokerError::Timeout`] and anything
//! else is a transport failure.

use std::fmt::Debug;
use std::time::Duration;

use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sns::config::Credentials;
use aws_sdk_sns::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sns::Client;
use pushwire_common::{BoxFuture, BrokerError, PublishRequest, PublishResponse, PushBroker};
use pushwire_config::SnsConfig;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

/// Client for the SNS mobile push API
///
/// Holds no per-call state; one instance is shared by all dispatch attempts.
#[derive(Debug, Clone)]
pub struct SnsClient {
    client: Client,
}

impl SnsClient {
    /// Creates a new SNS client from the SNS configuration
    ///
    /// Region and credentials fall back to the default AWS provider chain when they are not
    /// configured.
    ///
    /// # Arguments
    ///
    /// * `config` - The SNS configuration, including region, credentials and timeout
    pub async fn new(config: &SnsConfig) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.timeout_secs))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(timeouts);

        if let Some(region) = non_empty(&config.region) {
            loader = loader.region(Region::new(region.to_string()));
        }

        if let (Some(access_key), Some(secret_key)) = (
            non_empty(&config.access_key_id),
            non_empty(&config.secret_access_key),
        ) {
            let credentials = Credentials::new(access_key, secret_key, None, None, "pushwire");
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint) = non_empty(&config.endpoint_url) {
            debug!("Using SNS endpoint override: {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        info!("SNS client initialized");

        Self {
            client: Client::new(&sdk_config),
        }
    }

    /// Wraps an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Maps an SDK failure onto the broker error taxonomy.
fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> BrokerError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: Debug,
{
    match &err {
        SdkError::TimeoutError(_) => return BrokerError::Timeout,
        SdkError::ServiceError(service) => {
            let inner = service.err();
            if let Some(code) = inner.code() {
                return BrokerError::service(code, inner.message().map(str::to_string));
            }
        }
        _ => {}
    }
    BrokerError::Transport(DisplayErrorContext(&err).to_string())
}

impl PushBroker for SnsClient {
    fn create_platform_endpoint(
        &self,
        application_arn: &str,
        token: &str,
    ) -> BoxFuture<'_, String, BrokerError> {
        let application_arn = application_arn.to_string();
        let token = token.to_string();

        Box::pin(async move {
            debug!("Creating platform endpoint in {}", application_arn);

            let output = self
                .client
                .create_platform_endpoint()
                .platform_application_arn(application_arn)
                .token(token)
                .send()
                .await
                .map_err(|e| {
                    let err = classify_sdk_error(e);
                    error!("CreatePlatformEndpoint failed: {}", err);
                    err
                })?;

            output
                .endpoint_arn()
                .map(str::to_string)
                .ok_or_else(|| BrokerError::MalformedResponse("EndpointArn".to_string()))
        })
    }

    fn publish(&self, request: PublishRequest) -> BoxFuture<'_, PublishResponse, BrokerError> {
        Box::pin(async move {
            let output = self
                .client
                .publish()
                .target_arn(request.target_arn)
                .message(request.message)
                .message_structure(request.message_structure)
                .send()
                .await
                .map_err(classify_sdk_error)?;

            let mut raw = Map::new();
            if let Some(message_id) = output.message_id() {
                raw.insert("MessageId".to_string(), Value::String(message_id.to_string()));
            }
            if let Some(sequence_number) = output.sequence_number() {
                raw.insert(
                    "SequenceNumber".to_string(),
                    Value::String(sequence_number.to_string()),
                );
            }

            Ok(PublishResponse {
                message_id: output.message_id().map(str::to_string),
                raw: Value::Object(raw),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_skips_blank_settings() {
        assert_eq!(non_empty(&Some("eu-west-1".to_string())), Some("eu-west-1"));
        assert_eq!(non_empty(&Some(String::new())), None);
        assert_eq!(non_empty(&None), None);
    }

    #[tokio::test]
    async fn test_client_builds_from_static_settings() {
        let config = SnsConfig {
            region: Some("eu-central-1".to_string()),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            endpoint_url: Some("http://localhost:4566".to_string()),
            ..SnsConfig::default()
        };

        let client = SnsClient::new(&config).await;
        assert_eq!(
            client.client.config().region().map(|r| r.as_ref()),
            Some("eu-central-1")
        );
    }
}

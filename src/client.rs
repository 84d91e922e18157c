//! Client seam for the three mobile-push providers.
//!
//! The vendor SDKs are outside this crate. Drivers construct provider
//! messages and hand them to these traits; the bundled HTTP
//! implementations post the documented wire shapes with the configured
//! credential applied as an opaque bearer token. Token exchange and
//! certificate handling belong to a vendor client behind the same seam.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::ProviderError;
use crate::types::FcmNotification;

const APNS_HOST_PRODUCTION: &str = "https://api.push.apple.com";
const APNS_HOST_DEVELOPMENT: &str = "https://api.development.push.apple.com";

/// One APNs delivery unit. Everything except `payload` travels as headers.
#[derive(Debug, Clone)]
pub struct ApnsMessage {
    pub device_token: String,
    pub topic: String,
    pub apns_id: String,
    pub collapse_id: String,
    pub push_type: String,
    pub priority: u8,
    pub expiration: Option<i64>,
    pub development: bool,
    pub payload: Value,
}

/// One FCM-style delivery unit, serialized as the wire message.
#[derive(Debug, Clone, Serialize)]
pub struct FcmMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<FcmNotification>,

    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub webpush: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub apns: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcm_options: Option<Value>,
}

/// One HMS delivery unit. Credentials ride along for the client but are
/// never serialized into the message body.
#[derive(Debug, Clone, Serialize)]
pub struct HmsMessage {
    #[serde(skip)]
    pub app_id: String,

    #[serde(skip)]
    pub app_secret: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub data: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_key: Option<i64>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub ttl: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub bi_tag: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fast_app_target: Option<i32>,
}

#[async_trait]
pub trait ApnsClient: Send + Sync {
    async fn send(&self, message: &ApnsMessage) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait FcmClient: Send + Sync {
    async fn send(&self, message: &FcmMessage) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait HmsClient: Send + Sync {
    async fn send(&self, message: &HmsMessage) -> Result<(), ProviderError>;
}

/// HTTP/2 APNs client.
pub struct HttpApnsClient {
    http: reqwest::Client,
    auth_token: String,
}

impl HttpApnsClient {
    pub fn new(http: reqwest::Client, auth_token: impl Into<String>) -> Self {
        Self {
            http,
            auth_token: auth_token.into(),
        }
    }
}

#[async_trait]
impl ApnsClient for HttpApnsClient {
    async fn send(&self, message: &ApnsMessage) -> Result<(), ProviderError> {
        let host = if message.development {
            APNS_HOST_DEVELOPMENT
        } else {
            APNS_HOST_PRODUCTION
        };
        let url = format!("{}/3/device/{}", host, message.device_token);

        let mut request = self
            .http
            .post(&url)
            .header("authorization", format!("bearer {}", self.auth_token))
            .header("apns-priority", message.priority.to_string());

        if !message.topic.is_empty() {
            request = request.header("apns-topic", &message.topic);
        }
        if !message.apns_id.is_empty() {
            request = request.header("apns-id", &message.apns_id);
        }
        if !message.collapse_id.is_empty() {
            request = request.header("apns-collapse-id", &message.collapse_id);
        }
        if !message.push_type.is_empty() {
            request = request.header("apns-push-type", &message.push_type);
        }
        if let Some(expiration) = message.expiration {
            request = request.header("apns-expiration", expiration.to_string());
        }

        let response = request
            .json(&message.payload)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        check_status(response).await
    }
}

/// FCM HTTP v1 client.
pub struct HttpFcmClient {
    http: reqwest::Client,
    api_url: String,
    credential: String,
}

impl HttpFcmClient {
    pub fn new(
        http: reqwest::Client,
        api_url: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            credential: credential.into(),
        }
    }
}

#[async_trait]
impl FcmClient for HttpFcmClient {
    async fn send(&self, message: &FcmMessage) -> Result<(), ProviderError> {
        let body = serde_json::json!({ "message": message });

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.credential))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        check_status(response).await
    }
}

/// HMS push client.
pub struct HttpHmsClient {
    http: reqwest::Client,
    api_url: String,
}

impl HttpHmsClient {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl HmsClient for HttpHmsClient {
    async fn send(&self, message: &HmsMessage) -> Result<(), ProviderError> {
        let body = serde_json::json!({ "message": message });

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", message.app_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Rejected(format!(
        "status {}: {}",
        status.as_u16(),
        body
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fcm_message_omits_empty_fields() {
        let message = FcmMessage {
            token: Some("t1".to_string()),
            topic: None,
            condition: None,
            notification: None,
            data: HashMap::new(),
            android: None,
            webpush: None,
            apns: None,
            fcm_options: None,
        };

        let wire = serde_json::to_value(&message).unwrap();
        assert_eq!(wire, serde_json::json!({ "token": "t1" }));
    }

    #[test]
    fn hms_message_never_serializes_credentials() {
        let message = HmsMessage {
            app_id: "app".to_string(),
            app_secret: "secret".to_string(),
            token: Some("t1".to_string()),
            topic: None,
            condition: None,
            data: String::new(),
            notification: None,
            collapse_key: None,
            ttl: String::new(),
            bi_tag: String::new(),
            fast_app_target: None,
        };

        let wire = serde_json::to_string(&message).unwrap();
        assert!(!wire.contains("secret"));
        assert!(!wire.contains("app_id"));
    }
}

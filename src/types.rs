use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// Delivery channel for a push request.
///
/// Serialized as the integer tag used on the wire (1=ios, 2=android,
/// 3=huawei, 4=sms, 5=telegram-gateway, 6=call-auto). An unrecognized tag
/// is a deserialization error rather than a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Platform {
    Ios,
    Android,
    Huawei,
    Sms,
    TelegramGateway,
    CallAuto,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Huawei => "huawei",
            Platform::Sms => "sms",
            Platform::TelegramGateway => "telegram-gateway",
            Platform::CallAuto => "call-auto",
        }
    }
}

impl TryFrom<i32> for Platform {
    type Error = DispatchError;

    fn try_from(tag: i32) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Platform::Ios),
            2 => Ok(Platform::Android),
            3 => Ok(Platform::Huawei),
            4 => Ok(Platform::Sms),
            5 => Ok(Platform::TelegramGateway),
            6 => Ok(Platform::CallAuto),
            other => Err(DispatchError::UnknownPlatform(other)),
        }
    }
}

impl From<Platform> for i32 {
    fn from(platform: Platform) -> i32 {
        match platform {
            Platform::Ios => 1,
            Platform::Android => 2,
            Platform::Huawei => 3,
            Platform::Sms => 4,
            Platform::TelegramGateway => 5,
            Platform::CallAuto => 6,
        }
    }
}

/// APNs alert dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,

    #[serde(rename = "action-loc-key", default, skip_serializing_if = "String::is_empty")]
    pub action_loc_key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,

    #[serde(rename = "launch-image", default, skip_serializing_if = "String::is_empty")]
    pub launch_image: String,

    #[serde(rename = "loc-args", default, skip_serializing_if = "Vec::is_empty")]
    pub loc_args: Vec<String>,

    #[serde(rename = "loc-key", default, skip_serializing_if = "String::is_empty")]
    pub loc_key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subtitle: String,

    #[serde(rename = "title-loc-args", default, skip_serializing_if = "Vec::is_empty")]
    pub title_loc_args: Vec<String>,

    #[serde(rename = "title-loc-key", default, skip_serializing_if = "String::is_empty")]
    pub title_loc_key: String,

    #[serde(rename = "summary-arg", default, skip_serializing_if = "String::is_empty")]
    pub summary_arg: String,

    #[serde(rename = "summary-arg-count", default, skip_serializing_if = "is_zero")]
    pub summary_arg_count: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

/// Notification sub-record for FCM-style delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FcmNotification {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
}

/// A single push request targeting one delivery channel.
///
/// This is the union record produced at ingress. It is immutable after
/// validation; the validator is the only place allowed to touch it (it
/// folds the scalar `to` field into `tokens`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    #[serde(rename = "notif_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub to: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topic: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<String>,

    pub platform: Platform,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub priority: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub content_available: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mutable_content: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Map<String, Value>>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub retry: i32,

    // FCM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<FcmNotification>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webpush: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apns: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcm_options: Option<Value>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub condition: String,

    // Huawei
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_secret: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub huawei_notification: Option<Value>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub huawei_data: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub huawei_collapse_key: Option<i64>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub huawei_ttl: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bi_tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_app_target: Option<i32>,

    // iOS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub apns_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collapse_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub push_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<i64>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,

    #[serde(rename = "thread-id", default, skip_serializing_if = "String::is_empty")]
    pub thread_id: String,

    #[serde(rename = "url-args", default, skip_serializing_if = "Vec::is_empty")]
    pub url_args: Vec<String>,

    #[serde(default, skip_serializing_if = "alert_is_empty")]
    pub alert: Alert,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub production: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub development: bool,

    #[serde(rename = "name", default, skip_serializing_if = "String::is_empty")]
    pub sound_name: String,

    #[serde(rename = "volume", default, skip_serializing_if = "is_zero_f32")]
    pub sound_volume: f32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub interruption_level: String,

    // SMS and voice
    #[serde(rename = "phoneNumbers", default, skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<String>,

    #[serde(rename = "SMSRequired", default, skip_serializing_if = "std::ops::Not::not")]
    pub sms_required: bool,

    #[serde(rename = "SMSMessage", default, skip_serializing_if = "String::is_empty")]
    pub sms_message: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template_id: String,

    // Telegram gateway
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub telegram_gateway_code: String,
}

fn alert_is_empty(alert: &Alert) -> bool {
    *alert == Alert::default()
}

fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

impl PushRequest {
    /// Create an empty request for the given platform.
    pub fn new(platform: Platform) -> Self {
        Self {
            id: String::new(),
            to: String::new(),
            topic: String::new(),
            tokens: Vec::new(),
            platform,
            message: String::new(),
            title: String::new(),
            image: String::new(),
            priority: String::new(),
            content_available: false,
            mutable_content: false,
            sound: None,
            data: None,
            retry: 0,
            notification: None,
            android: None,
            webpush: None,
            apns: None,
            fcm_options: None,
            condition: String::new(),
            app_id: String::new(),
            app_secret: String::new(),
            huawei_notification: None,
            huawei_data: String::new(),
            huawei_collapse_key: None,
            huawei_ttl: String::new(),
            bi_tag: String::new(),
            fast_app_target: None,
            expiration: None,
            apns_id: String::new(),
            collapse_id: String::new(),
            push_type: String::new(),
            badge: None,
            category: String::new(),
            thread_id: String::new(),
            url_args: Vec::new(),
            alert: Alert::default(),
            production: false,
            development: false,
            sound_name: String::new(),
            sound_volume: 0.0,
            interruption_level: String::new(),
            phone_numbers: Vec::new(),
            sms_required: false,
            sms_message: String::new(),
            template_id: String::new(),
            telegram_gateway_code: String::new(),
        }
    }

    /// Set the device token list.
    pub fn with_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Set the message body.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the recipient phone numbers.
    pub fn with_phone_numbers<I, S>(mut self, numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phone_numbers = numbers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the SMS text.
    pub fn with_sms_message(mut self, message: impl Into<String>) -> Self {
        self.sms_message = message.into();
        self
    }

    /// Whether this is a topic-style request. Topics apply to Android and
    /// Huawei only and are addressed by a topic name or a boolean condition
    /// string instead of device tokens.
    pub fn is_topic(&self) -> bool {
        if self.platform == Platform::Android || self.platform == Platform::Huawei {
            return !self.topic.is_empty() || !self.condition.is_empty();
        }

        false
    }
}

/// Batch ingress record carrying multiple push requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPush {
    pub notifications: Vec<PushRequest>,
}

/// Request body that cancels a scheduled fallback SMS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescheduleRequest {
    pub request_id: String,
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushStatus {
    #[serde(rename = "succeeded-push")]
    Succeeded,

    #[serde(rename = "failed-push")]
    Failed,
}

/// Uniform per-recipient delivery record.
///
/// One entry per token or phone number attempted. Phone numbers are always
/// stored masked. Entries are never mutated after emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPushEntry {
    #[serde(rename = "notif_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    pub status: PushStatus,

    pub platform: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: i64,
}

impl LogPushEntry {
    pub(crate) fn push_succeeded(req: &PushRequest, token: &str) -> Self {
        Self {
            id: req.id.clone(),
            status: PushStatus::Succeeded,
            platform: req.platform.as_str().to_string(),
            token: Some(token.to_string()),
            phone: None,
            message: req.message.clone(),
            error: None,
            timestamp: unix_now(),
        }
    }

    pub(crate) fn push_failed(req: &PushRequest, token: &str, error: impl std::fmt::Display) -> Self {
        Self {
            id: req.id.clone(),
            status: PushStatus::Failed,
            platform: req.platform.as_str().to_string(),
            token: Some(token.to_string()),
            phone: None,
            message: req.message.clone(),
            error: Some(error.to_string()),
            timestamp: unix_now(),
        }
    }

    pub(crate) fn phone_succeeded(req: &PushRequest, phone: &str) -> Self {
        Self {
            id: req.id.clone(),
            status: PushStatus::Succeeded,
            platform: req.platform.as_str().to_string(),
            token: None,
            phone: Some(mask_phone(phone, DEFAULT_MASK_LEN)),
            message: req.sms_message.clone(),
            error: None,
            timestamp: unix_now(),
        }
    }

    pub(crate) fn phone_failed(req: &PushRequest, phone: &str, error: impl std::fmt::Display) -> Self {
        Self {
            id: req.id.clone(),
            status: PushStatus::Failed,
            platform: req.platform.as_str().to_string(),
            token: None,
            phone: Some(mask_phone(phone, DEFAULT_MASK_LEN)),
            message: req.sms_message.clone(),
            error: Some(error.to_string()),
            timestamp: unix_now(),
        }
    }
}

/// Aggregate response for one dispatched request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushResponse {
    pub logs: Vec<LogPushEntry>,
}

/// Number of leading and trailing characters replaced when masking.
pub const DEFAULT_MASK_LEN: usize = 3;

/// Redact a phone number by replacing its first and last `mark_len`
/// characters with `*`. Strings shorter than `2 * mark_len` become all `*`.
pub fn mask_phone(phone: &str, mark_len: usize) -> String {
    if phone.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = phone.chars().collect();
    if chars.len() < mark_len * 2 {
        return "*".repeat(chars.len());
    }

    let mut masked = String::with_capacity(phone.len());
    for (i, c) in chars.iter().enumerate() {
        if i < mark_len || i >= chars.len() - mark_len {
            masked.push('*');
        } else {
            masked.push(*c);
        }
    }

    masked
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

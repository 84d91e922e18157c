use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Immutable configuration snapshot.
///
/// Built once at startup, validated with [`Config::validate`], then shared
/// by read-only reference for the life of the process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub core: SectionCore,

    #[serde(default)]
    pub ios: SectionIos,

    #[serde(default)]
    pub android: SectionAndroid,

    #[serde(default)]
    pub huawei: SectionHuawei,

    #[serde(default)]
    pub sms: SectionSms,

    #[serde(default)]
    pub telegram_gateway: SectionTelegramGateway,

    #[serde(default)]
    pub call_auto: SectionCallAuto,
}

/// Feedback reporting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionCore {
    /// URL that receives one POST per log entry after dispatch.
    /// Empty disables feedback entirely.
    #[serde(default)]
    pub feedback_url: String,

    /// Per-call timeout in seconds. Zero means no timeout.
    #[serde(default = "default_feedback_timeout")]
    pub feedback_timeout_secs: u64,

    /// Optional custom header attached to every feedback post.
    #[serde(default)]
    pub feedback_header_name: Option<String>,

    #[serde(default)]
    pub feedback_header_value: Option<String>,
}

impl Default for SectionCore {
    fn default() -> Self {
        Self {
            feedback_url: String::new(),
            feedback_timeout_secs: default_feedback_timeout(),
            feedback_header_name: None,
            feedback_header_value: None,
        }
    }
}

fn default_feedback_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionIos {
    #[serde(default)]
    pub enabled: bool,

    /// Path to the provider key file.
    #[serde(default)]
    pub key_path: String,

    /// Inline provider key. Applied as an opaque bearer credential by the
    /// bundled HTTP client; real token exchange belongs to a vendor client.
    #[serde(default)]
    pub key_base64: String,

    #[serde(default)]
    pub key_id: String,

    #[serde(default)]
    pub team_id: String,

    /// Default APNs topic (the app bundle id).
    #[serde(default)]
    pub topic: String,

    /// Default endpoint when the request sets neither `production` nor
    /// `development`.
    #[serde(default)]
    pub production: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionAndroid {
    #[serde(default)]
    pub enabled: bool,

    /// FCM credential. Applied as an opaque bearer credential by the
    /// bundled HTTP client.
    #[serde(default)]
    pub credential: String,

    /// Path to a credential file, honored as an alternative to `credential`.
    #[serde(default)]
    pub key_path: String,

    /// Message send endpoint.
    #[serde(default)]
    pub api_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionHuawei {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub app_id: String,

    #[serde(default)]
    pub app_secret: String,

    /// Message send endpoint.
    #[serde(default)]
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSms {
    #[serde(default)]
    pub enabled: bool,

    /// Provider selector: `mts`, `devino-v1` or `devino-v2`. Any other
    /// value is logged and ignored at dispatch time.
    #[serde(default)]
    pub provider: String,

    #[serde(default)]
    pub mts_api_url: String,

    #[serde(default)]
    pub mts_api_key: String,

    #[serde(default)]
    pub mts_sender_number: String,

    #[serde(default)]
    pub devino_api_url_v1: String,

    #[serde(default)]
    pub devino_api_url_v2: String,

    #[serde(default)]
    pub devino_api_key: String,

    #[serde(default)]
    pub devino_login: String,

    #[serde(default)]
    pub devino_password: String,

    #[serde(default)]
    pub devino_sender_number: String,

    /// Cadence of the scheduled-SMS sweep.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SectionSms {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: String::new(),
            mts_api_url: String::new(),
            mts_api_key: String::new(),
            mts_sender_number: String::new(),
            devino_api_url_v1: String::new(),
            devino_api_url_v2: String::new(),
            devino_api_key: String::new(),
            devino_login: String::new(),
            devino_password: String::new(),
            devino_sender_number: String::new(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionTelegramGateway {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub api_url: String,

    #[serde(default)]
    pub api_token: String,

    /// Delivery-report callback advertised to the gateway.
    #[serde(default)]
    pub callback_url: String,

    /// Grace period between a gateway accept and the fallback SMS firing.
    #[serde(default = "default_fallback_grace")]
    pub fallback_grace_secs: u64,
}

impl Default for SectionTelegramGateway {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: String::new(),
            api_token: String::new(),
            callback_url: String::new(),
            fallback_grace_secs: default_fallback_grace(),
        }
    }
}

fn default_fallback_grace() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionCallAuto {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub api_url: String,

    #[serde(default)]
    pub app_id: String,

    #[serde(default)]
    pub app_secret: String,
}

/// Startup validation failures. Fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    NoChannelEnabled,
    MissingIosKey,
    IosKeyNotFound,
    MissingFcmCredential,
    MissingHuaweiAppSecret,
    MissingHuaweiAppId,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoChannelEnabled =>
                write!(f, "please enable iOS, Android, Huawei or SMS config in yml config"),
            ConfigError::MissingIosKey =>
                write!(f, "missing iOS certificate key"),
            ConfigError::IosKeyNotFound =>
                write!(f, "certificate file does not exist"),
            ConfigError::MissingFcmCredential =>
                write!(f, "missing fcm credential data"),
            ConfigError::MissingHuaweiAppSecret =>
                write!(f, "missing huawei app secret"),
            ConfigError::MissingHuaweiAppId =>
                write!(f, "missing huawei app id"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Validate channel settings. Called once at startup; any error here
    /// is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ios.enabled && !self.android.enabled && !self.huawei.enabled && !self.sms.enabled
        {
            return Err(ConfigError::NoChannelEnabled);
        }

        if self.ios.enabled {
            if self.ios.key_path.is_empty() && self.ios.key_base64.is_empty() {
                return Err(ConfigError::MissingIosKey);
            }

            if !self.ios.key_path.is_empty() && !Path::new(&self.ios.key_path).exists() {
                return Err(ConfigError::IosKeyNotFound);
            }
        }

        if self.android.enabled {
            // GOOGLE_APPLICATION_CREDENTIALS is consulted here and only here.
            let env_credential = std::env::var("GOOGLE_APPLICATION_CREDENTIALS").unwrap_or_default();
            if self.android.credential.is_empty()
                && self.android.key_path.is_empty()
                && env_credential.is_empty()
            {
                return Err(ConfigError::MissingFcmCredential);
            }
        }

        if self.huawei.enabled {
            if self.huawei.app_secret.is_empty() {
                return Err(ConfigError::MissingHuaweiAppSecret);
            }

            if self.huawei.app_id.is_empty() {
                return Err(ConfigError::MissingHuaweiAppId);
            }
        }

        Ok(())
    }
}

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::client::{ApnsClient, ApnsMessage};
use crate::config::Config;
use crate::error::DispatchError;
use crate::types::{LogPushEntry, PushRequest, PushResponse};

/// APNs delivers low-priority pushes at a time that takes power
/// considerations into account. They may be grouped and throttled.
pub const APNS_PRIORITY_LOW: u8 = 5;

/// High-priority pushes are delivered immediately and must trigger an
/// alert, sound or badge on the device.
pub const APNS_PRIORITY_HIGH: u8 = 10;

/// Deliver a request over APNs, one attempt per device token.
///
/// Transport and provider failures become failed log entries; only the
/// failed entries are surfaced in the response. The outer error is
/// reserved for setup problems.
pub(crate) async fn push(
    cancel: &CancellationToken,
    req: &PushRequest,
    cfg: &Config,
    client: &dyn ApnsClient,
) -> Result<PushResponse, DispatchError> {
    if !cfg.ios.enabled {
        return Ok(PushResponse::default());
    }

    if cfg.ios.key_path.is_empty() && cfg.ios.key_base64.is_empty() {
        return Err(DispatchError::Setup("missing iOS certificate key"));
    }

    let payload = build_payload(req);
    let priority = priority_for(req);
    let development = is_development(req, cfg);

    let topic = if req.topic.is_empty() {
        cfg.ios.topic.clone()
    } else {
        req.topic.clone()
    };

    let mut logs = Vec::new();
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for token in &req.tokens {
        if cancel.is_cancelled() {
            break;
        }

        let message = ApnsMessage {
            device_token: token.clone(),
            topic: topic.clone(),
            apns_id: req.apns_id.clone(),
            collapse_id: req.collapse_id.clone(),
            push_type: req.push_type.clone(),
            priority,
            expiration: req.expiration,
            development,
            payload: payload.clone(),
        };

        match client.send(&message).await {
            Ok(()) => {
                succeeded += 1;
                debug!(token = %token, "APNs push succeeded");
            }
            Err(e) => {
                failed += 1;
                error!(token = %token, error = %e, "APNs push failed");
                logs.push(LogPushEntry::push_failed(req, token, &e));
            }
        }
    }

    debug!(succeeded, failed, "APNs push finished");
    Ok(PushResponse { logs })
}

/// Assemble the APNs payload: the `aps` dictionary plus the request's data
/// map merged in as custom keys.
pub(crate) fn build_payload(req: &PushRequest) -> Value {
    let mut aps = Map::new();

    let alert = build_alert(req);
    if !alert.is_empty() {
        aps.insert("alert".to_string(), Value::Object(alert));
    }

    if let Some(badge) = req.badge {
        aps.insert("badge".to_string(), badge.into());
    }

    if let Some(sound) = build_sound(req) {
        aps.insert("sound".to_string(), sound);
    }

    if req.content_available {
        aps.insert("content-available".to_string(), 1.into());
    }

    if req.mutable_content {
        aps.insert("mutable-content".to_string(), 1.into());
    }

    if !req.category.is_empty() {
        aps.insert("category".to_string(), req.category.clone().into());
    }

    if !req.thread_id.is_empty() {
        aps.insert("thread-id".to_string(), req.thread_id.clone().into());
    }

    if !req.url_args.is_empty() {
        aps.insert(
            "url-args".to_string(),
            Value::Array(req.url_args.iter().cloned().map(Value::String).collect()),
        );
    }

    if !req.interruption_level.is_empty() {
        aps.insert(
            "interruption-level".to_string(),
            req.interruption_level.clone().into(),
        );
    }

    let mut payload = Map::new();
    payload.insert("aps".to_string(), Value::Object(aps));

    if let Some(data) = &req.data {
        for (key, value) in data {
            payload.insert(key.clone(), value.clone());
        }
    }

    Value::Object(payload)
}

fn build_alert(req: &PushRequest) -> Map<String, Value> {
    let mut alert = match serde_json::to_value(&req.alert) {
        Ok(Value::Object(alert)) => alert,
        _ => Map::new(),
    };

    if !alert.contains_key("body") && !req.message.is_empty() {
        alert.insert("body".to_string(), req.message.clone().into());
    }

    if !alert.contains_key("title") && !req.title.is_empty() {
        alert.insert("title".to_string(), req.title.clone().into());
    }

    alert
}

fn build_sound(req: &PushRequest) -> Option<Value> {
    if !req.sound_name.is_empty() {
        let mut sound = Map::new();
        sound.insert("name".to_string(), req.sound_name.clone().into());
        if req.sound_volume > 0.0 {
            sound.insert("volume".to_string(), serde_json::json!(req.sound_volume));
        }
        return Some(Value::Object(sound));
    }

    req.sound.clone()
}

pub(crate) fn priority_for(req: &PushRequest) -> u8 {
    if req.priority == "normal" {
        APNS_PRIORITY_LOW
    } else {
        APNS_PRIORITY_HIGH
    }
}

/// Pick the endpoint: request flags win, the config default decides
/// otherwise.
fn is_development(req: &PushRequest, cfg: &Config) -> bool {
    if req.development {
        return true;
    }

    if req.production {
        return false;
    }

    !cfg.ios.production
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    fn request() -> PushRequest {
        PushRequest::new(Platform::Ios).with_tokens(["token-1"])
    }

    #[test]
    fn priority_defaults_to_high() {
        let mut req = request();
        assert_eq!(priority_for(&req), APNS_PRIORITY_HIGH);

        req.priority = "high".to_string();
        assert_eq!(priority_for(&req), APNS_PRIORITY_HIGH);

        req.priority = "normal".to_string();
        assert_eq!(priority_for(&req), APNS_PRIORITY_LOW);
    }

    #[test]
    fn request_flags_override_config_endpoint() {
        let mut cfg = Config::default();
        cfg.ios.production = true;

        let mut req = request();
        assert!(!is_development(&req, &cfg));

        req.development = true;
        assert!(is_development(&req, &cfg));

        req.development = false;
        cfg.ios.production = false;
        assert!(is_development(&req, &cfg));

        req.production = true;
        assert!(!is_development(&req, &cfg));
    }

    #[test]
    fn payload_carries_alert_and_flags() {
        let mut req = request().with_message("Welcome");
        req.title = "Greetings".to_string();
        req.badge = Some(2);
        req.content_available = true;
        req.mutable_content = true;
        req.category = "news".to_string();

        let payload = build_payload(&req);
        assert_eq!(payload["aps"]["alert"]["body"], "Welcome");
        assert_eq!(payload["aps"]["alert"]["title"], "Greetings");
        assert_eq!(payload["aps"]["badge"], 2);
        assert_eq!(payload["aps"]["content-available"], 1);
        assert_eq!(payload["aps"]["mutable-content"], 1);
        assert_eq!(payload["aps"]["category"], "news");
    }

    #[test]
    fn alert_fields_win_over_scalar_message() {
        let mut req = request().with_message("fallback body");
        req.alert.body = "alert body".to_string();
        req.alert.title = "alert title".to_string();

        let payload = build_payload(&req);
        assert_eq!(payload["aps"]["alert"]["body"], "alert body");
        assert_eq!(payload["aps"]["alert"]["title"], "alert title");
    }

    #[test]
    fn data_map_becomes_custom_payload_keys() {
        let mut req = request().with_message("hi");
        let mut data = serde_json::Map::new();
        data.insert("a".to_string(), "1".into());
        data.insert("b".to_string(), 2.into());
        req.data = Some(data);

        let payload = build_payload(&req);
        assert_eq!(payload["a"], "1");
        assert_eq!(payload["b"], 2);
    }

    #[test]
    fn named_sound_builds_a_dictionary() {
        let mut req = request();
        req.sound_name = "ping.aiff".to_string();
        req.sound_volume = 0.5;

        let payload = build_payload(&req);
        assert_eq!(payload["aps"]["sound"]["name"], "ping.aiff");
        assert_eq!(payload["aps"]["sound"]["volume"], 0.5);
    }
}

use std::collections::HashMap;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::client::{FcmClient, FcmMessage};
use crate::config::Config;
use crate::error::DispatchError;
use crate::types::{FcmNotification, LogPushEntry, PushRequest, PushResponse};

/// Deliver a request through FCM.
///
/// Token-list requests get one message per token; topic-style requests get
/// a single message addressed by topic or condition. Only failed attempts
/// are surfaced in the response.
pub(crate) async fn push(
    cancel: &CancellationToken,
    req: &PushRequest,
    cfg: &Config,
    client: &dyn FcmClient,
) -> Result<PushResponse, DispatchError> {
    if !cfg.android.enabled {
        return Ok(PushResponse::default());
    }

    if cfg.android.credential.is_empty() && cfg.android.key_path.is_empty() {
        return Err(DispatchError::Setup("missing fcm credential data"));
    }

    let mut logs = Vec::new();
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for message in build_messages(req) {
        if cancel.is_cancelled() {
            break;
        }

        let recipient = message
            .token
            .as_deref()
            .or(message.topic.as_deref())
            .or(message.condition.as_deref())
            .unwrap_or_default()
            .to_string();

        match client.send(&message).await {
            Ok(()) => {
                succeeded += 1;
                debug!(recipient = %recipient, "FCM push succeeded");
            }
            Err(e) => {
                failed += 1;
                error!(recipient = %recipient, error = %e, "FCM push failed");
                logs.push(LogPushEntry::push_failed(req, &recipient, &e));
            }
        }
    }

    debug!(succeeded, failed, "FCM push finished");
    Ok(PushResponse { logs })
}

/// Build the outbound FCM messages for a request.
pub(crate) fn build_messages(req: &PushRequest) -> Vec<FcmMessage> {
    let notification = build_notification(req);
    let data = coerce_data(req.data.as_ref());
    let android = build_android(req);
    let apns = req.apns.clone().or_else(|| build_apns_mirror(req));

    let base = FcmMessage {
        token: None,
        topic: None,
        condition: None,
        notification,
        data,
        android,
        webpush: req.webpush.clone(),
        apns,
        fcm_options: req.fcm_options.clone(),
    };

    if req.is_topic() {
        let mut message = base;
        if !req.topic.is_empty() {
            message.topic = Some(req.topic.clone());
        } else {
            message.condition = Some(req.condition.clone());
        }
        return vec![message];
    }

    req.tokens
        .iter()
        .map(|token| {
            let mut message = base.clone();
            message.token = Some(token.clone());
            message
        })
        .collect()
}

fn build_notification(req: &PushRequest) -> Option<FcmNotification> {
    match &req.notification {
        Some(notification) => {
            let mut notification = notification.clone();
            if notification.title.is_empty() {
                notification.title = req.title.clone();
            }
            if notification.body.is_empty() {
                notification.body = req.message.clone();
            }
            if notification.image.is_empty() {
                notification.image = req.image.clone();
            }
            Some(notification)
        }
        None => {
            if req.message.is_empty() && req.title.is_empty() {
                return None;
            }

            Some(FcmNotification {
                title: req.title.clone(),
                body: req.message.clone(),
                image: req.image.clone(),
            })
        }
    }
}

/// Coerce every data value to a string. Strings pass through; everything
/// else becomes its compact JSON rendering, so numbers keep their decimal
/// form and nested objects collapse to one JSON string.
pub(crate) fn coerce_data(data: Option<&Map<String, Value>>) -> HashMap<String, String> {
    let mut coerced = HashMap::new();

    if let Some(data) = data {
        for (key, value) in data {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            coerced.insert(key.clone(), text);
        }
    }

    coerced
}

fn build_android(req: &PushRequest) -> Option<Value> {
    let mut android = match req.android.clone() {
        Some(Value::Object(android)) => android,
        _ => Map::new(),
    };

    if !req.priority.is_empty() {
        let priority = if req.priority == "normal" { "normal" } else { "high" };
        android.insert("priority".to_string(), priority.into());
    }

    if android.is_empty() {
        None
    } else {
        Some(Value::Object(android))
    }
}

/// Mirror an APNS sub-payload so iOS devices reached through FCM receive
/// the sound and delivery flags plus a custom-data copy of the full data
/// map with its original values.
fn build_apns_mirror(req: &PushRequest) -> Option<Value> {
    let mut aps = Map::new();

    if let Some(sound) = &req.sound {
        aps.insert("sound".to_string(), sound.clone());
    }

    if req.mutable_content {
        aps.insert("mutable-content".to_string(), 1.into());
    }

    if req.content_available {
        aps.insert("content-available".to_string(), 1.into());
    }

    let mut payload = Map::new();
    if let Some(data) = &req.data {
        for (key, value) in data {
            payload.insert(key.clone(), value.clone());
        }
    }

    if aps.is_empty() && payload.is_empty() {
        return None;
    }

    payload.insert("aps".to_string(), Value::Object(aps));

    Some(serde_json::json!({ "payload": Value::Object(payload) }))
}

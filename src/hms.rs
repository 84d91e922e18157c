use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::client::{HmsClient, HmsMessage};
use crate::config::Config;
use crate::error::DispatchError;
use crate::types::{LogPushEntry, PushRequest, PushResponse};

/// Deliver a request through Huawei Mobile Services, one attempt per
/// device token or a single attempt for a topic-style request. Only failed
/// attempts are surfaced in the response.
///
/// Request-level app credentials override the configured ones.
pub(crate) async fn push(
    cancel: &CancellationToken,
    req: &PushRequest,
    cfg: &Config,
    client: &dyn HmsClient,
) -> Result<PushResponse, DispatchError> {
    if !cfg.huawei.enabled {
        return Ok(PushResponse::default());
    }

    let app_secret = if req.app_secret.is_empty() {
        cfg.huawei.app_secret.clone()
    } else {
        req.app_secret.clone()
    };
    if app_secret.is_empty() {
        return Err(DispatchError::Setup("missing huawei app secret"));
    }

    let app_id = if req.app_id.is_empty() {
        cfg.huawei.app_id.clone()
    } else {
        req.app_id.clone()
    };
    if app_id.is_empty() {
        return Err(DispatchError::Setup("missing huawei app id"));
    }

    let base = HmsMessage {
        app_id,
        app_secret,
        token: None,
        topic: None,
        condition: None,
        data: req.huawei_data.clone(),
        notification: req.huawei_notification.clone(),
        collapse_key: req.huawei_collapse_key,
        ttl: req.huawei_ttl.clone(),
        bi_tag: req.bi_tag.clone(),
        fast_app_target: req.fast_app_target,
    };

    let mut logs = Vec::new();
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    if req.is_topic() {
        let mut message = base;
        let recipient = if !req.topic.is_empty() {
            message.topic = Some(req.topic.clone());
            req.topic.clone()
        } else {
            message.condition = Some(req.condition.clone());
            req.condition.clone()
        };

        if !cancel.is_cancelled() {
            match client.send(&message).await {
                Ok(()) => {
                    succeeded += 1;
                    debug!(recipient = %recipient, "HMS push succeeded");
                }
                Err(e) => {
                    failed += 1;
                    error!(recipient = %recipient, error = %e, "HMS push failed");
                    logs.push(LogPushEntry::push_failed(req, &recipient, &e));
                }
            }
        }
    } else {
        for token in &req.tokens {
            if cancel.is_cancelled() {
                break;
            }

            let mut message = base.clone();
            message.token = Some(token.clone());

            match client.send(&message).await {
                Ok(()) => {
                    succeeded += 1;
                    debug!(token = %token, "HMS push succeeded");
                }
                Err(e) => {
                    failed += 1;
                    error!(token = %token, error = %e, "HMS push failed");
                    logs.push(LogPushEntry::push_failed(req, token, &e));
                }
            }
        }
    }

    debug!(succeeded, failed, "HMS push finished");
    Ok(PushResponse { logs })
}

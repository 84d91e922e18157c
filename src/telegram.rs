use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::ProviderError;
use crate::scheduler::SmsScheduler;
use crate::sms;
use crate::types::{mask_phone, unix_now, LogPushEntry, PushRequest, PushResponse, DEFAULT_MASK_LEN};

/// Client timeout for one gateway call.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// TTL advertised to the gateway for the delivered code, in seconds.
const CODE_TTL: u32 = 60;

#[derive(Serialize)]
struct GatewayRequest<'a> {
    phone_number: &'a str,
    code: &'a str,
    callback_url: &'a str,
    ttl: u32,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    ok: bool,

    #[serde(default)]
    error: String,

    #[serde(default)]
    result: GatewayResult,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayResult {
    #[serde(default)]
    request_id: String,
}

/// Deliver an auth code through the Telegram gateway, one call per phone
/// number.
///
/// A rejected or failed gateway call falls back to an immediate SMS for
/// that single recipient. An accepted call installs a deferred SMS in the
/// scheduler instead; the fallback fires after the grace period unless a
/// delivery event deschedules it first.
pub(crate) async fn send(
    http: &reqwest::Client,
    cancel: &CancellationToken,
    req: &Arc<PushRequest>,
    cfg: &Arc<Config>,
    scheduler: &SmsScheduler,
) -> PushResponse {
    if !cfg.telegram_gateway.enabled {
        return PushResponse::default();
    }

    let mut logs = Vec::new();

    for (i, phone) in req.phone_numbers.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        match request_code(http, cfg, phone, &req.telegram_gateway_code).await {
            Ok(request_id) => {
                let send_at = unix_now() + cfg.telegram_gateway.fallback_grace_secs as i64;
                scheduler
                    .schedule(request_id, send_at, Arc::clone(req), Arc::clone(cfg), i)
                    .await;
                logs.push(LogPushEntry::phone_succeeded(req, phone));
            }
            Err(e) => {
                debug!(
                    phone = %mask_phone(phone, DEFAULT_MASK_LEN),
                    error = %e,
                    "Telegram gateway refused, falling back to SMS"
                );
                logs.push(LogPushEntry::phone_failed(req, phone, &e));

                let mut fallback = sms::send(http, cancel, req, cfg, Some(i)).await;
                logs.append(&mut fallback.logs);
            }
        }
    }

    PushResponse { logs }
}

/// POST one code-delivery request. Returns the gateway request id on
/// accept; any transport failure, non-200 status or `ok: false` body is an
/// error.
async fn request_code(
    http: &reqwest::Client,
    cfg: &Config,
    phone: &str,
    code: &str,
) -> Result<String, ProviderError> {
    debug!(
        phone = %mask_phone(phone, DEFAULT_MASK_LEN),
        "start Telegram gateway push"
    );

    let body = GatewayRequest {
        phone_number: phone,
        code,
        callback_url: &cfg.telegram_gateway.callback_url,
        ttl: CODE_TTL,
    };

    let response = http
        .post(&cfg.telegram_gateway.api_url)
        .timeout(GATEWAY_TIMEOUT)
        .header(
            "Authorization",
            format!("Bearer {}", cfg.telegram_gateway.api_token),
        )
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    if status != reqwest::StatusCode::OK {
        debug!(status = status.as_u16(), body = %body, "Telegram gateway response status code != 200");
        return Err(ProviderError::Rejected(format!(
            "status {}: {}",
            status.as_u16(),
            body
        )));
    }

    let decoded: GatewayResponse =
        serde_json::from_str(&body).map_err(|e| ProviderError::Transport(e.to_string()))?;

    if !decoded.ok {
        debug!(body = %body, "Telegram gateway response is not ok");
        return Err(ProviderError::Rejected(if decoded.error.is_empty() {
            "response is not ok".to_string()
        } else {
            decoded.error
        }));
    }

    if decoded.result.request_id.is_empty() {
        error!("Telegram gateway accepted without a request id");
    }

    Ok(decoded.result.request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_request_wire_shape() {
        let body = GatewayRequest {
            phone_number: "+79991112233",
            code: "123456",
            callback_url: "https://example.com/report",
            ttl: CODE_TTL,
        };

        let wire = serde_json::to_value(&body).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({
                "phone_number": "+79991112233",
                "code": "123456",
                "callback_url": "https://example.com/report",
                "ttl": 60
            })
        );
    }

    #[test]
    fn gateway_response_tolerates_missing_fields() {
        let decoded: GatewayResponse = serde_json::from_str(r#"{"ok":false}"#).unwrap();
        assert!(!decoded.ok);
        assert!(decoded.result.request_id.is_empty());

        let decoded: GatewayResponse =
            serde_json::from_str(r#"{"ok":true,"result":{"request_id":"R1"}}"#).unwrap();
        assert!(decoded.ok);
        assert_eq!(decoded.result.request_id, "R1");
    }

    #[tokio::test]
    async fn disabled_gateway_is_a_no_op() {
        let req = Arc::new(
            crate::types::PushRequest::new(crate::types::Platform::TelegramGateway)
                .with_phone_numbers(["+79991112233"]),
        );
        let cfg = Arc::new(Config::default());
        let scheduler = SmsScheduler::new(reqwest::Client::new(), Duration::from_secs(2));

        let resp = send(
            &reqwest::Client::new(),
            &CancellationToken::new(),
            &req,
            &cfg,
            &scheduler,
        )
        .await;
        assert!(resp.logs.is_empty());
    }
}

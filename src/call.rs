use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::ProviderError;
use crate::types::{mask_phone, LogPushEntry, PushRequest, PushResponse, DEFAULT_MASK_LEN};

#[derive(Serialize)]
struct CallRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
    number: &'a str,
    auth_code: &'a str,
}

/// Deliver an auth code by automated voice call, one POST per phone
/// number. The code is reused from the request's SMS text field.
///
/// A transport failure aborts the remaining numbers; a non-2xx answer is
/// recorded for that recipient and the loop moves on.
pub(crate) async fn send(
    http: &reqwest::Client,
    cancel: &CancellationToken,
    req: &PushRequest,
    cfg: &Config,
) -> PushResponse {
    if !cfg.call_auto.enabled {
        return PushResponse::default();
    }

    let mut logs = Vec::new();

    for phone in &req.phone_numbers {
        if cancel.is_cancelled() {
            break;
        }

        debug!(
            phone = %mask_phone(phone, DEFAULT_MASK_LEN),
            message = %req.sms_message,
            "start auth call"
        );

        let body = CallRequest {
            app_id: &cfg.call_auto.app_id,
            app_secret: &cfg.call_auto.app_secret,
            number: phone,
            auth_code: &req.sms_message,
        };

        let response = match http
            .post(&cfg.call_auto.api_url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "auth call transport error");
                logs.push(LogPushEntry::phone_failed(
                    req,
                    phone,
                    ProviderError::Transport(e.to_string()),
                ));
                break;
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "auth call response");

        if status.is_success() {
            logs.push(LogPushEntry::phone_succeeded(req, phone));
        } else {
            logs.push(LogPushEntry::phone_failed(
                req,
                phone,
                ProviderError::Rejected(format!("status {}: {}", status.as_u16(), body)),
            ));
        }
    }

    PushResponse { logs }
}

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::{Config, SectionSms};
use crate::error::ProviderError;
use crate::types::{mask_phone, LogPushEntry, PushRequest, PushResponse, DEFAULT_MASK_LEN};

/// Whether the fan-out proceeds to the next recipient after an adapter call.
///
/// `Continue` covers genuine successes and benign per-recipient skips
/// (invalid prefix, invalid template id, pattern mismatch). `Stop` is a
/// hard failure: transport error or a non-200 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsOutcome {
    Continue,
    Stop,
}

static MTS_PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)^[7][9][0-9]+$").expect("invalid MTS phone pattern"));

#[derive(Debug, Clone, Copy)]
enum Provider {
    Mts,
    DevinoV1,
    DevinoV2,
}

impl Provider {
    fn from_config(provider: &str) -> Option<Self> {
        match provider {
            "mts" => Some(Provider::Mts),
            "devino-v1" => Some(Provider::DevinoV1),
            "devino-v2" => Some(Provider::DevinoV2),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct MtsBody<'a> {
    number: &'a str,
    destination: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_resource_id: Option<u64>,
}

#[derive(Serialize)]
struct DevinoBody<'a> {
    from: &'a str,
    to: &'a str,
    text: &'a str,
    priority: &'a str,
}

#[derive(Serialize)]
struct DevinoPayload<'a> {
    messages: Vec<DevinoBody<'a>>,
}

/// Fan a request out across the configured SMS provider.
///
/// With `index = None` every phone number is attempted in order and the
/// fan-out stops at the first hard failure. With `index = Some(i)` only
/// that single recipient is contacted.
pub(crate) async fn send(
    http: &reqwest::Client,
    cancel: &CancellationToken,
    req: &PushRequest,
    cfg: &Config,
    index: Option<usize>,
) -> PushResponse {
    if !cfg.sms.enabled {
        return PushResponse::default();
    }

    let Some(provider) = Provider::from_config(&cfg.sms.provider) else {
        error!(provider = %cfg.sms.provider, "unsupported SMS provider");
        return PushResponse::default();
    };

    let mut logs = Vec::new();

    match index {
        None => {
            for phone in &req.phone_numbers {
                if cancel.is_cancelled() {
                    break;
                }

                if send_one(http, provider, phone, req, &cfg.sms, &mut logs).await
                    == SmsOutcome::Stop
                {
                    break;
                }
            }
        }
        Some(i) => match req.phone_numbers.get(i) {
            Some(phone) => {
                if !cancel.is_cancelled() {
                    send_one(http, provider, phone, req, &cfg.sms, &mut logs).await;
                }
            }
            None => {
                error!(
                    index = i,
                    count = req.phone_numbers.len(),
                    "invalid phone number index for SMS"
                );
            }
        },
    }

    PushResponse { logs }
}

async fn send_one(
    http: &reqwest::Client,
    provider: Provider,
    phone: &str,
    req: &PushRequest,
    cfg: &SectionSms,
    logs: &mut Vec<LogPushEntry>,
) -> SmsOutcome {
    let (outcome, entry) = match provider {
        Provider::Mts => send_via_mts(http, phone, req, cfg).await,
        Provider::DevinoV1 => send_via_devino_v1(http, phone, req, cfg).await,
        Provider::DevinoV2 => send_via_devino_v2(http, phone, req, cfg).await,
    };

    if let Some(entry) = entry {
        logs.push(entry);
    }

    outcome
}

async fn send_via_mts(
    http: &reqwest::Client,
    phone: &str,
    req: &PushRequest,
    cfg: &SectionSms,
) -> (SmsOutcome, Option<LogPushEntry>) {
    let number = phone.replace('+', "");

    if !MTS_PHONE_RE.is_match(&number) {
        debug!(
            phone = %mask_phone(phone, DEFAULT_MASK_LEN),
            "skipping phone number, does not match the MTS pattern"
        );
        return (SmsOutcome::Continue, None);
    }

    let template_id = if req.template_id.is_empty() {
        None
    } else {
        match req.template_id.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                error!(
                    phone = %mask_phone(phone, DEFAULT_MASK_LEN),
                    template_id = %req.template_id,
                    "skipping phone number, invalid template id"
                );
                return (SmsOutcome::Continue, None);
            }
        }
    };

    let payload = MtsBody {
        number: &cfg.mts_sender_number,
        destination: &number,
        text: &req.sms_message,
        template_resource_id: template_id,
    };

    let auth = format!("Bearer {}", cfg.mts_api_key);
    match post_json(http, &cfg.mts_api_url, &auth, &payload).await {
        Ok(()) => (
            SmsOutcome::Continue,
            Some(LogPushEntry::phone_succeeded(req, phone)),
        ),
        Err(e) => (
            SmsOutcome::Stop,
            Some(LogPushEntry::phone_failed(req, phone, &e)),
        ),
    }
}

async fn send_via_devino_v2(
    http: &reqwest::Client,
    phone: &str,
    req: &PushRequest,
    cfg: &SectionSms,
) -> (SmsOutcome, Option<LogPushEntry>) {
    if !valid_phone_prefix(phone) {
        debug!(
            phone = %mask_phone(phone, DEFAULT_MASK_LEN),
            "skipping phone number, does not start with prefix +7 or +375"
        );
        return (SmsOutcome::Continue, None);
    }

    let payload = DevinoPayload {
        messages: vec![DevinoBody {
            from: &cfg.devino_sender_number,
            to: phone,
            text: &req.sms_message,
            priority: "HIGH",
        }],
    };

    let auth = format!("Key {}", cfg.devino_api_key);
    match post_json(http, &cfg.devino_api_url_v2, &auth, &payload).await {
        Ok(()) => (
            SmsOutcome::Continue,
            Some(LogPushEntry::phone_succeeded(req, phone)),
        ),
        Err(e) => (
            SmsOutcome::Stop,
            Some(LogPushEntry::phone_failed(req, phone, &e)),
        ),
    }
}

async fn send_via_devino_v1(
    http: &reqwest::Client,
    phone: &str,
    req: &PushRequest,
    cfg: &SectionSms,
) -> (SmsOutcome, Option<LogPushEntry>) {
    if !valid_phone_prefix(phone) {
        debug!(
            phone = %mask_phone(phone, DEFAULT_MASK_LEN),
            "skipping phone number, does not start with prefix +7 or +375"
        );
        return (SmsOutcome::Continue, None);
    }

    let session_id = devino_session_id(http, cfg).await;
    let url = format!(
        "{}/Sms/Send?SessionId={}&DestinationAddress={}&SourceAddress={}&Data={}&Validity=0",
        cfg.devino_api_url_v1,
        session_id,
        phone,
        cfg.devino_sender_number,
        urlencoding::encode(&req.sms_message),
    );

    debug!(url = %url, "start push notification via SMS");

    let result = async {
        let response = http
            .post(&url)
            .header("content-type", "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        expect_ok(response).await
    }
    .await;

    match result {
        Ok(()) => (
            SmsOutcome::Continue,
            Some(LogPushEntry::phone_succeeded(req, phone)),
        ),
        Err(e) => (
            SmsOutcome::Stop,
            Some(LogPushEntry::phone_failed(req, phone, &e)),
        ),
    }
}

/// Fetch a Devino v1 session id. The body is the raw session string with
/// surrounding quotes stripped. Failures are logged and yield an empty id,
/// which the send call then rejects with a non-200.
async fn devino_session_id(http: &reqwest::Client, cfg: &SectionSms) -> String {
    let url = format!(
        "{}/user/sessionid?login={}&password={}",
        cfg.devino_api_url_v1, cfg.devino_login, cfg.devino_password,
    );

    let response = match http
        .post(&url)
        .header("content-type", "application/x-www-form-urlencoded")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "failed to fetch Devino session id");
            return String::new();
        }
    };

    match response.text().await {
        Ok(body) => body.replace('"', ""),
        Err(e) => {
            error!(error = %e, "failed to read Devino session id");
            String::new()
        }
    }
}

async fn post_json<T: Serialize>(
    http: &reqwest::Client,
    url: &str,
    auth: &str,
    payload: &T,
) -> Result<(), ProviderError> {
    debug!(url = %url, "start push notification via SMS");

    let response = http
        .post(url)
        .header("Authorization", auth)
        .header("Content-Type", "application/json")
        .json(payload)
        .send()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    expect_ok(response).await
}

async fn expect_ok(response: reqwest::Response) -> Result<(), ProviderError> {
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "SMS response status code != 200");
        return Err(ProviderError::Rejected(format!(
            "status {}: {}",
            status.as_u16(),
            body
        )));
    }

    Ok(())
}

fn valid_phone_prefix(phone: &str) -> bool {
    phone.starts_with("+7")
        || phone.starts_with('7')
        || phone.starts_with("+375")
        || phone.starts_with("375")
}

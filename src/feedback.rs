use std::time::Duration;

use tracing::debug;

use crate::config::SectionCore;
use crate::error::ProviderError;
use crate::types::LogPushEntry;

/// POST one log entry to the feedback URL.
///
/// Applies the configured per-call timeout and the optional custom header.
/// Errors are returned for the caller to log; they never propagate
/// further.
pub(crate) async fn dispatch(
    http: &reqwest::Client,
    entry: &LogPushEntry,
    cfg: &SectionCore,
) -> Result<(), ProviderError> {
    let mut request = http.post(&cfg.feedback_url).json(entry);

    if cfg.feedback_timeout_secs > 0 {
        request = request.timeout(Duration::from_secs(cfg.feedback_timeout_secs));
    }

    if let (Some(name), Some(value)) = (&cfg.feedback_header_name, &cfg.feedback_header_value) {
        request = request.header(name, value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Rejected(format!("status {}", status.as_u16())));
    }

    debug!(notif_id = %entry.id, "feedback dispatched");
    Ok(())
}

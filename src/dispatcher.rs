use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::client::{
    ApnsClient, FcmClient, HmsClient, HttpApnsClient, HttpFcmClient, HttpHmsClient,
};
use crate::config::Config;
use crate::error::DispatchError;
use crate::scheduler::SmsScheduler;
use crate::types::{Platform, PushRequest, PushResponse};
use crate::{apns, call, fcm, feedback, hms, sms, telegram};

/// FCM and HMS accept at most this many registration tokens per call.
const MAX_MULTICAST_TOKENS: usize = 500;

/// Validate and normalize a request in place.
///
/// The scalar `to` field, when set, is moved into the tokens list. The
/// error messages are part of the external contract.
pub(crate) fn check_request(req: &mut PushRequest) -> Result<(), DispatchError> {
    if !req.to.is_empty() {
        let to = std::mem::take(&mut req.to);
        req.tokens.push(to);
    }

    // Topic requests are addressed without tokens.
    if !req.is_topic() && req.tokens.is_empty() {
        return Err(DispatchError::InvalidRequest(
            "please provide at least one device token".to_string(),
        ));
    }

    match req.platform {
        Platform::Ios => {
            if req.tokens.len() == 1 && req.tokens[0].is_empty() {
                let msg = "the device token cannot be empty";
                debug!("{}", msg);
                return Err(DispatchError::InvalidRequest(msg.to_string()));
            }
        }
        Platform::Android | Platform::Huawei => {
            if req.tokens.len() > MAX_MULTICAST_TOKENS {
                let msg = "you can specify up to 500 device registration tokens per invocation";
                debug!("{}", msg);
                return Err(DispatchError::InvalidRequest(msg.to_string()));
            }
        }
        _ => {}
    }

    Ok(())
}

/// Facade driving a request to completion across the six channels.
///
/// Owns the config snapshot, the shared HTTP client, the mobile-push
/// client seams and the fallback scheduler. One instance serves the whole
/// process; `dispatch` may be called concurrently.
pub struct Dispatcher {
    config: Arc<Config>,
    http: reqwest::Client,
    apns: Arc<dyn ApnsClient>,
    fcm: Arc<dyn FcmClient>,
    hms: Arc<dyn HmsClient>,
    scheduler: SmsScheduler,
}

impl Dispatcher {
    /// Build a dispatcher with the bundled HTTP provider clients.
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::new();

        let apns: Arc<dyn ApnsClient> = Arc::new(HttpApnsClient::new(
            http.clone(),
            config.ios.key_base64.clone(),
        ));
        let fcm: Arc<dyn FcmClient> = Arc::new(HttpFcmClient::new(
            http.clone(),
            config.android.api_url.clone(),
            config.android.credential.clone(),
        ));
        let hms: Arc<dyn HmsClient> =
            Arc::new(HttpHmsClient::new(http.clone(), config.huawei.api_url.clone()));

        Self::assemble(config, http, apns, fcm, hms)
    }

    /// Build a dispatcher with caller-supplied mobile-push clients.
    pub fn with_clients(
        config: Config,
        apns: Arc<dyn ApnsClient>,
        fcm: Arc<dyn FcmClient>,
        hms: Arc<dyn HmsClient>,
    ) -> Self {
        let http = reqwest::Client::new();
        Self::assemble(config, http, apns, fcm, hms)
    }

    fn assemble(
        config: Config,
        http: reqwest::Client,
        apns: Arc<dyn ApnsClient>,
        fcm: Arc<dyn FcmClient>,
        hms: Arc<dyn HmsClient>,
    ) -> Self {
        let sweep_interval = Duration::from_secs(config.sms.sweep_interval_secs.max(1));
        let scheduler = SmsScheduler::new(http.clone(), sweep_interval);

        Self {
            config: Arc::new(config),
            http,
            apns,
            fcm,
            hms,
            scheduler,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start the scheduled-SMS sweeper. Idempotent.
    pub fn start_sweeper(&self) {
        self.scheduler.start_sweeper();
    }

    /// Cancel a scheduled fallback SMS by the gateway request id. Returns
    /// whether an entry was actually removed in time.
    pub async fn deschedule(&self, request_id: &str) -> bool {
        self.scheduler.deschedule(request_id).await
    }

    /// Whether a fallback SMS is still owed for the gateway request id.
    pub async fn is_scheduled(&self, request_id: &str) -> bool {
        self.scheduler.is_scheduled(request_id).await
    }

    /// Validate a request, route it to its channel driver and report the
    /// resulting log entries to the feedback URL.
    pub async fn dispatch(
        &self,
        cancel: &CancellationToken,
        mut req: PushRequest,
    ) -> Result<PushResponse, DispatchError> {
        check_request(&mut req)?;
        let req = Arc::new(req);

        let response = match req.platform {
            Platform::Ios => apns::push(cancel, &req, &self.config, self.apns.as_ref()).await?,
            Platform::Android => fcm::push(cancel, &req, &self.config, self.fcm.as_ref()).await?,
            Platform::Huawei => hms::push(cancel, &req, &self.config, self.hms.as_ref()).await?,
            Platform::Sms => sms::send(&self.http, cancel, &req, &self.config, None).await,
            Platform::TelegramGateway => {
                telegram::send(&self.http, cancel, &req, &self.config, &self.scheduler).await
            }
            Platform::CallAuto => call::send(&self.http, cancel, &req, &self.config).await,
        };

        if !self.config.core.feedback_url.is_empty() {
            for entry in &response.logs {
                if let Err(e) = feedback::dispatch(&self.http, entry, &self.config.core).await {
                    error!(error = %e, notif_id = %entry.id, "feedback dispatch failed");
                }
            }
        }

        Ok(response)
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::sms;
use crate::types::{unix_now, PushRequest};

/// A fallback SMS owed for an outstanding Telegram-gateway attempt.
#[derive(Clone)]
pub struct ScheduledSms {
    /// Absolute unix-seconds send time.
    pub send_at: i64,

    /// The originating request, shared read-only.
    pub request: Arc<PushRequest>,

    /// Config snapshot taken when the fallback was installed.
    pub config: Arc<Config>,

    /// Index into the request's phone-number list for the one recipient
    /// this fallback covers.
    pub index: usize,
}

type PendingMap = Arc<Mutex<HashMap<String, ScheduledSms>>>;

/// In-memory table of deferred fallback SMS sends, keyed by the opaque
/// request id the Telegram gateway returned.
///
/// All reads and writes happen under one mutex. Removal from the map is
/// the sole authority to cancel: once an entry is gone, no SMS is sent
/// for it. The sweep drains due entries under the lock and dispatches
/// them only after releasing it, so the lock is never held across
/// network I/O.
pub struct SmsScheduler {
    http: reqwest::Client,
    pending: PendingMap,
    sweep_interval: Duration,
    sweeper_started: AtomicBool,
}

impl SmsScheduler {
    pub fn new(http: reqwest::Client, sweep_interval: Duration) -> Self {
        Self {
            http,
            pending: Arc::new(Mutex::new(HashMap::new())),
            sweep_interval,
            sweeper_started: AtomicBool::new(false),
        }
    }

    /// Install or overwrite the fallback for `request_id`.
    pub async fn schedule(
        &self,
        request_id: impl Into<String>,
        send_at: i64,
        request: Arc<PushRequest>,
        config: Arc<Config>,
        index: usize,
    ) {
        let request_id = request_id.into();
        debug!(request_id = %request_id, send_at, index, "scheduling fallback SMS");

        let mut pending = self.pending.lock().await;
        pending.insert(
            request_id,
            ScheduledSms {
                send_at,
                request,
                config,
                index,
            },
        );
    }

    /// Cancel the fallback for `request_id`. Returns whether an entry was
    /// actually removed; descheduling an unknown id is silent.
    pub async fn deschedule(&self, request_id: &str) -> bool {
        let mut pending = self.pending.lock().await;
        let removed = pending.remove(request_id).is_some();
        if removed {
            debug!(request_id = %request_id, "descheduled fallback SMS");
        }

        removed
    }

    /// Whether a fallback is still owed for `request_id`.
    pub async fn is_scheduled(&self, request_id: &str) -> bool {
        self.pending.lock().await.contains_key(request_id)
    }

    /// Start the periodic sweep. Idempotent; only the first call for a
    /// scheduler instance spawns the ticker task.
    pub fn start_sweeper(&self) {
        if self.sweeper_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let pending = Arc::clone(&self.pending);
        let http = self.http.clone();
        let interval = self.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                sweep(&pending, &http).await;
            }
        });
    }

    #[cfg(test)]
    async fn sweep_once(&self) {
        sweep(&self.pending, &self.http).await;
    }
}

/// One sweep pass: drain the due entries under the lock, then dispatch
/// their sends with the lock released.
async fn sweep(pending: &Mutex<HashMap<String, ScheduledSms>>, http: &reqwest::Client) {
    let due: Vec<(String, ScheduledSms)> = {
        let mut pending = pending.lock().await;
        let now = unix_now();

        let due_ids: Vec<String> = pending
            .iter()
            .filter(|(_, sms)| sms.send_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        due_ids
            .into_iter()
            .filter_map(|id| pending.remove(&id).map(|sms| (id, sms)))
            .collect()
    };

    for (request_id, scheduled) in due {
        debug!(request_id = %request_id, index = scheduled.index, "sending scheduled fallback SMS");

        let http = http.clone();
        tokio::spawn(async move {
            // Scheduled sends outlive the originating request and are not
            // bound to its cancellation scope.
            let cancel = CancellationToken::new();
            let response = sms::send(
                &http,
                &cancel,
                &scheduled.request,
                &scheduled.config,
                Some(scheduled.index),
            )
            .await;

            for entry in &response.logs {
                debug!(
                    request_id = %request_id,
                    status = ?entry.status,
                    phone = entry.phone.as_deref().unwrap_or_default(),
                    "scheduled fallback SMS finished"
                );
            }
        });
    }
}

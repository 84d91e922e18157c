//! A single-process outbound notification dispatcher.
//!
//! This crate accepts one abstract push request targeting one of six
//! delivery channels (APNs, FCM-style Android, Huawei Mobile Services,
//! bulk SMS, Telegram-gateway code delivery, automated voice calls) and
//! drives it to completion across the provider APIs, producing one
//! uniform log record per attempted recipient.
//!
//! ## Guarantees
//! - One validated request reaches exactly one channel driver
//! - Per-recipient fan-out in list order, with explicit short-circuit
//!   semantics for SMS
//! - A Telegram-gateway accept installs an SMS fallback that fires after
//!   a grace period unless descheduled first; deliver and cancel race
//!   deterministically under one lock
//! - Provider failures become failed log entries, never panics
//!
//! ## Non-Guarantees
//! - Durability of scheduled fallbacks across restarts
//! - Exactly-once delivery
//! - Ordering between independent requests
//! - Rate limiting or admission control
//!
//! The inbound HTTP or queue front-end that produces [`PushRequest`]
//! values, and the vendor push SDKs, are external collaborators. The
//! mobile-push providers sit behind the [`ApnsClient`], [`FcmClient`] and
//! [`HmsClient`] seams.

mod apns;
mod call;
mod client;
mod config;
mod dispatcher;
mod error;
mod fcm;
mod feedback;
mod hms;
mod scheduler;
mod sms;
mod telegram;
mod types;

pub use apns::{APNS_PRIORITY_HIGH, APNS_PRIORITY_LOW};
pub use client::{
    ApnsClient, ApnsMessage, FcmClient, FcmMessage, HmsClient, HmsMessage, HttpApnsClient,
    HttpFcmClient, HttpHmsClient,
};
pub use config::{
    Config, ConfigError, SectionAndroid, SectionCallAuto, SectionCore, SectionHuawei, SectionIos,
    SectionSms, SectionTelegramGateway,
};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, ProviderError};
pub use scheduler::{ScheduledSms, SmsScheduler};
pub use sms::SmsOutcome;
pub use types::{
    mask_phone, Alert, DescheduleRequest, FcmNotification, LogPushEntry, Platform, PushRequest,
    PushResponse, PushStatus, RequestPush, DEFAULT_MASK_LEN,
};

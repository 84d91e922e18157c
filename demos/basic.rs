use push_dispatcher::{Config, Dispatcher, Platform, PushRequest};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let mut config = Config::default();
    config.sms.enabled = true;
    config.sms.provider = "mts".to_string();
    config.sms.mts_api_url = "https://api.example.com/sms".to_string();
    config.sms.mts_api_key = "api-key".to_string();
    config.sms.mts_sender_number = "SENDER".to_string();

    config.validate().expect("invalid config");

    let dispatcher = Dispatcher::new(config);
    dispatcher.start_sweeper();

    let request = PushRequest::new(Platform::Sms)
        .with_tokens(["device-token"])
        .with_phone_numbers(["+79991112233"])
        .with_sms_message("your code is 123456");

    let response = dispatcher
        .dispatch(&CancellationToken::new(), request)
        .await
        .expect("dispatch failed");

    for entry in &response.logs {
        println!(
            "{:?} {} {:?}",
            entry.status,
            entry.phone.as_deref().unwrap_or_default(),
            entry.error
        );
    }
}

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use push_dispatcher::{
    ApnsClient, ApnsMessage, Config, Dispatcher, FcmClient, FcmMessage, HmsClient, HmsMessage,
    Platform, ProviderError, PushRequest, PushStatus,
};

struct NoopApns;

#[async_trait::async_trait]
impl ApnsClient for NoopApns {
    async fn send(&self, _message: &ApnsMessage) -> Result<(), ProviderError> {
        Ok(())
    }
}

struct NoopFcm;

#[async_trait::async_trait]
impl FcmClient for NoopFcm {
    async fn send(&self, _message: &FcmMessage) -> Result<(), ProviderError> {
        Ok(())
    }
}

struct NoopHms;

#[async_trait::async_trait]
impl HmsClient for NoopHms {
    async fn send(&self, _message: &HmsMessage) -> Result<(), ProviderError> {
        Ok(())
    }
}

fn call_config(api_url: String) -> Config {
    let mut config = Config::default();
    config.call_auto.enabled = true;
    config.call_auto.api_url = api_url;
    config.call_auto.app_id = "call-app".to_string();
    config.call_auto.app_secret = "call-secret".to_string();
    config
}

fn dispatcher(config: Config) -> Dispatcher {
    Dispatcher::with_clients(
        config,
        Arc::new(NoopApns),
        Arc::new(NoopFcm),
        Arc::new(NoopHms),
    )
}

fn call_request() -> PushRequest {
    PushRequest::new(Platform::CallAuto)
        .with_tokens(["ignored"])
        .with_phone_numbers(["+79990000000", "+79991111111"])
        .with_sms_message("123456")
}

#[tokio::test]
async fn every_number_gets_its_own_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = dispatcher(call_config(format!("{}/call", server.uri())));

    let response = dispatcher
        .dispatch(&CancellationToken::new(), call_request())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let first: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        first,
        serde_json::json!({
            "app_id": "call-app",
            "app_secret": "call-secret",
            "number": "+79990000000",
            "auth_code": "123456"
        })
    );

    assert_eq!(response.logs.len(), 2);
    assert!(response.logs.iter().all(|l| l.status == PushStatus::Succeeded));
    assert_eq!(response.logs[0].phone.as_deref(), Some("***990000***"));
}

#[tokio::test]
async fn rejected_calls_do_not_stop_the_sequence() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call"))
        .and(body_partial_json(serde_json::json!({ "number": "+79990000000" })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/call"))
        .and(body_partial_json(serde_json::json!({ "number": "+79991111111" })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = dispatcher(call_config(format!("{}/call", server.uri())));

    let response = dispatcher
        .dispatch(&CancellationToken::new(), call_request())
        .await
        .unwrap();

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert_eq!(response.logs.len(), 2);
    assert_eq!(response.logs[0].status, PushStatus::Failed);
    assert_eq!(response.logs[1].status, PushStatus::Succeeded);
}

#[tokio::test]
async fn transport_error_aborts_the_remaining_numbers() {
    // Nothing listens on this port, so the first call fails in transport
    // and the second number is never attempted.
    let dispatcher = dispatcher(call_config("http://127.0.0.1:9/call".to_string()));

    let response = dispatcher
        .dispatch(&CancellationToken::new(), call_request())
        .await
        .unwrap();

    assert_eq!(response.logs.len(), 1);
    assert_eq!(response.logs[0].status, PushStatus::Failed);
}

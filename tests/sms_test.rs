use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
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

fn dispatcher(config: Config) -> Dispatcher {
    Dispatcher::with_clients(
        config,
        Arc::new(NoopApns),
        Arc::new(NoopFcm),
        Arc::new(NoopHms),
    )
}

fn mts_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.sms.enabled = true;
    config.sms.provider = "mts".to_string();
    config.sms.mts_api_url = format!("{}/sms", server.uri());
    config.sms.mts_api_key = "mts-key".to_string();
    config.sms.mts_sender_number = "SENDER".to_string();
    config
}

#[tokio::test]
async fn mts_posts_the_documented_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sms"))
        .and(header("Authorization", "Bearer mts-key"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = dispatcher(mts_config(&server));

    let mut request = PushRequest::new(Platform::Sms)
        .with_tokens(["ignored"])
        .with_phone_numbers(["+79991112233"])
        .with_sms_message("your code is 123456");
    request.template_id = "42".to_string();

    let response = dispatcher
        .dispatch(&CancellationToken::new(), request)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "number": "SENDER",
            "destination": "79991112233",
            "text": "your code is 123456",
            "template_resource_id": 42
        })
    );

    assert_eq!(response.logs.len(), 1);
    assert_eq!(response.logs[0].status, PushStatus::Succeeded);
    assert_eq!(response.logs[0].phone.as_deref(), Some("***991112***"));
}

#[tokio::test]
async fn fan_out_short_circuits_on_hard_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sms"))
        .and(body_partial_json(serde_json::json!({ "destination": "79990000000" })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sms"))
        .and(body_partial_json(serde_json::json!({ "destination": "79991111111" })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dispatcher = dispatcher(mts_config(&server));

    let request = PushRequest::new(Platform::Sms)
        .with_tokens(["ignored"])
        .with_phone_numbers(["+79990000000", "+79991111111", "+79992222222"])
        .with_sms_message("code");

    let response = dispatcher
        .dispatch(&CancellationToken::new(), request)
        .await
        .unwrap();

    // The failing call counts; the third recipient is never contacted.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    assert_eq!(response.logs.len(), 2);
    assert_eq!(response.logs[0].status, PushStatus::Succeeded);
    assert_eq!(response.logs[1].status, PushStatus::Failed);
}

#[tokio::test]
async fn mts_skips_numbers_outside_the_pattern() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sms"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = dispatcher(mts_config(&server));

    // The first number fails the pattern and is skipped without stopping
    // the fan-out.
    let request = PushRequest::new(Platform::Sms)
        .with_tokens(["ignored"])
        .with_phone_numbers(["+19991112233", "+79991112233"])
        .with_sms_message("code");

    let response = dispatcher
        .dispatch(&CancellationToken::new(), request)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["destination"], "79991112233");

    assert_eq!(response.logs.len(), 1);
}

#[tokio::test]
async fn invalid_template_id_skips_the_recipient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sms"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = dispatcher(mts_config(&server));

    let mut request = PushRequest::new(Platform::Sms)
        .with_tokens(["ignored"])
        .with_phone_numbers(["+79991112233"])
        .with_sms_message("code");
    request.template_id = "not-a-number".to_string();

    let response = dispatcher
        .dispatch(&CancellationToken::new(), request)
        .await
        .unwrap();

    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(response.logs.is_empty());
}

#[tokio::test]
async fn devino_v2_posts_high_priority_messages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/send"))
        .and(header("Authorization", "Key devino-key"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.sms.enabled = true;
    config.sms.provider = "devino-v2".to_string();
    config.sms.devino_api_url_v2 = format!("{}/v2/send", server.uri());
    config.sms.devino_api_key = "devino-key".to_string();
    config.sms.devino_sender_number = "SENDER".to_string();

    let dispatcher = dispatcher(config);

    // Belarusian prefixes are accepted alongside Russian ones.
    let request = PushRequest::new(Platform::Sms)
        .with_tokens(["ignored"])
        .with_phone_numbers(["+19991112233", "+375291112233"])
        .with_sms_message("hello");

    dispatcher
        .dispatch(&CancellationToken::new(), request)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "messages": [{
                "from": "SENDER",
                "to": "+375291112233",
                "text": "hello",
                "priority": "HIGH"
            }]
        })
    );
}

#[tokio::test]
async fn devino_v1_fetches_a_session_then_sends() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/user/sessionid"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"SESSION1\""))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/Sms/Send"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.sms.enabled = true;
    config.sms.provider = "devino-v1".to_string();
    config.sms.devino_api_url_v1 = format!("{}/v1", server.uri());
    config.sms.devino_login = "login".to_string();
    config.sms.devino_password = "password".to_string();
    config.sms.devino_sender_number = "SENDER".to_string();

    let dispatcher = dispatcher(config);

    let request = PushRequest::new(Platform::Sms)
        .with_tokens(["ignored"])
        .with_phone_numbers(["+79991112233"])
        .with_sms_message("hello world");

    let response = dispatcher
        .dispatch(&CancellationToken::new(), request)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    // Quotes are stripped from the session body; the text is url-encoded.
    let send_url = requests[1].url.as_str();
    assert!(send_url.contains("SessionId=SESSION1"));
    assert!(send_url.contains("SourceAddress=SENDER"));
    assert!(send_url.contains("Data=hello%20world"));
    assert!(send_url.contains("Validity=0"));

    assert_eq!(response.logs.len(), 1);
    assert_eq!(response.logs[0].status, PushStatus::Succeeded);
}

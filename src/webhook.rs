use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::{debug, error, info};

use crate::bot::Dispatcher;
use crate::error::WebhookError;
use crate::platform::telegram::{TelegramClient, Update};

const INDEX_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Telegram Bot</title></head>
  <body>
    <h1>Telegram Bot</h1>
    <p>Bot is running! Send a message to the bot to get started.</p>
  </body>
</html>
"#;

/// Shared, read-only request state
pub struct AppState {
    pub telegram: TelegramClient,
    pub dispatcher: Dispatcher,
}

pub fn router(state: Arc<AppState>, webhook_path: &str) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route(webhook_path, get(probe).post(receive_update))
        .with_state(state)
}

async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Liveness probe: checks the bot token against `getMe`.
async fn probe(State(state): State<Arc<AppState>>) -> Response {
    info!("Received liveness probe");
    match state.telegram.get_me().await {
        Ok(bot) => (StatusCode::OK, Json(json!({ "status": "ok", "bot": bot }))).into_response(),
        Err(e) => {
            error!("Liveness probe failed (status {:?}): {}", e.status(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn receive_update(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    info!("Received webhook update ({} bytes)", body.len());
    match handle_update(&state, &body).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            error!("Failed to handle webhook update: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": e.to_string(),
                    "stack": e.trace(),
                })),
            )
                .into_response()
        }
    }
}

async fn handle_update(state: &AppState, body: &[u8]) -> Result<(), WebhookError> {
    let update = Update::from_slice(body)?;
    let Some(incoming) = update.into_incoming()? else {
        debug!("Update carries no text message, ignoring");
        return Ok(());
    };

    info!("Message from chat {}: {}", incoming.chat_id, incoming.text);

    let sent = state
        .dispatcher
        .dispatch(&state.telegram, incoming.chat_id, &incoming.text)
        .await?;
    if sent.is_none() {
        debug!("Plain text from chat {}, no reply", incoming.chat_id);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::Clock;
    use crate::config::ClockConfig;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_with_timeout(api_base: String, timeout: Duration) -> Router {
        let state = AppState {
            telegram: TelegramClient::new(api_base, timeout).unwrap(),
            dispatcher: Dispatcher::new(Clock::new(&ClockConfig::default()).unwrap()),
        };
        router(Arc::new(state), "/webhook")
    }

    fn app(server: &MockServer) -> Router {
        app_with_timeout(format!("{}/bottest", server.uri()), Duration::from_secs(10))
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn update(text: &str) -> String {
        json!({
            "update_id": 1,
            "message": { "message_id": 3, "chat": { "id": 12345 }, "text": text }
        })
        .to_string()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    async fn mount_send_ok(server: &MockServer, expected: Value, times: u64) {
        Mock::given(method("POST"))
            .and(path("/bottest/sendMessage"))
            .and(body_partial_json(expected))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_command_is_dispatched_then_acknowledged() {
        let server = MockServer::start().await;
        mount_send_ok(
            &server,
            json!({"chat_id": 12345, "text": "hello world", "parse_mode": "HTML"}),
            1,
        )
        .await;

        let response = app(&server)
            .oneshot(post(&update("/echo hello world")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_unknown_command_gets_reply() {
        let server = MockServer::start().await;
        mount_send_ok(
            &server,
            json!({"chat_id": 12345, "text": "❌ Unknown command, send /help to see the available commands"}),
            1,
        )
        .await;

        let response = app(&server).oneshot(post(&update("/foo"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_plain_text_is_acknowledged_without_reply() {
        let server = MockServer::start().await;
        mount_send_ok(&server, json!({}), 0).await;

        let response = app(&server)
            .oneshot(post(&update("just chatting")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_update_without_message_is_acknowledged() {
        let server = MockServer::start().await;
        mount_send_ok(&server, json!({}), 0).await;

        let response = app(&server)
            .oneshot(post(r#"{"update_id": 2, "callback_query": {"id": "x"}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_json_returns_error_payload() {
        let server = MockServer::start().await;
        mount_send_ok(&server, json!({}), 0).await;

        let response = app(&server).oneshot(post("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().starts_with("Malformed update"));
        assert!(!body["stack"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_text_without_chat_returns_error_payload() {
        let server = MockServer::start().await;
        mount_send_ok(&server, json!({}), 0).await;

        let response = app(&server)
            .oneshot(post(r#"{"message": {"text": "/start"}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["status"], "error");
    }

    #[tokio::test]
    async fn test_platform_error_fails_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest/sendMessage"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("Bad Request: chat not found"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = app(&server).oneshot(post(&update("/start"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("400"));
        assert!(message.contains("chat not found"));
    }

    #[tokio::test]
    async fn test_platform_timeout_fails_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest/sendMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let app = app_with_timeout(
            format!("{}/bottest", server.uri()),
            Duration::from_millis(100),
        );
        let response = app.oneshot(post(&update("/help"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Telegram API request timed out");
    }

    #[tokio::test]
    async fn test_probe_reports_bot_identity() {
        let server = MockServer::start().await;
        let me = json!({"ok": true, "result": {"id": 1, "is_bot": true, "username": "demo_bot"}});
        Mock::given(method("GET"))
            .and(path("/bottest/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(me.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let response = app(&server).oneshot(get("/webhook")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["bot"], me);
    }

    #[tokio::test]
    async fn test_probe_unreachable_platform() {
        let app = app_with_timeout(
            "http://127.0.0.1:9/bottest".to_string(),
            Duration::from_secs(2),
        );
        let response = app.oneshot(get("/webhook")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_error_payloads_do_not_expose_token() {
        let app = app_with_timeout(
            "http://127.0.0.1:9/bot123456:SECRETTOKEN".to_string(),
            Duration::from_secs(2),
        );

        let probe = app.clone().oneshot(get("/webhook")).await.unwrap();
        assert_eq!(probe.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let probe_body = body_text(probe).await;
        assert!(!probe_body.contains("SECRETTOKEN"), "leaked: {probe_body}");

        let intake = app.oneshot(post(&update("/start"))).await.unwrap();
        assert_eq!(intake.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let intake_body = body_text(intake).await;
        assert!(intake_body.contains("\"stack\""));
        assert!(!intake_body.contains("SECRETTOKEN"), "leaked: {intake_body}");
    }

    #[tokio::test]
    async fn test_index_page() {
        let server = MockServer::start().await;
        let response = app(&server).oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Bot is running"));
    }
}

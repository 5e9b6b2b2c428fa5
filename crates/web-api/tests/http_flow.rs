mod support;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use chrono::Duration;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use application::SendMessageRequest;
use support::{TestApp, TestUser};

async fn get(app: &TestApp, uri: &str, user: Option<&TestUser>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(user) = user {
        request = request.header("authorization", format!("Bearer {}", user.token));
    }
    let response = app
        .router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// 绕过 WebSocket 直接通过应用层发送
async fn send(app: &TestApp, from: &TestUser, to: &TestUser, text: &str) {
    app.chat_service
        .send_message(SendMessageRequest {
            sender_id: from.id,
            recipient_id: to.id,
            message_text: text.to_owned(),
        })
        .await
        .unwrap();
}

/// 查询参数里的时间需要转义 `+`
fn encode(value: &Value) -> String {
    value.as_str().unwrap().replace('+', "%2B").replace(':', "%3A")
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn endpoints_require_bearer_token() {
    let app = TestApp::new();
    let (status, body) = get(&app, "/api/v1/chat/messages/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let forged = TestUser {
        id: Uuid::new_v4(),
        token: "not-a-token".to_string(),
    };
    let (status, _) = get(&app, "/api/v1/chat/users/?username=a", Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_of_unknown_user_is_rejected() {
    let app = TestApp::new();
    let ghost = TestUser {
        id: Uuid::new_v4(),
        token: app.jwt.generate_token(Uuid::new_v4()).unwrap(),
    };
    let (status, body) = get(&app, "/api/v1/chat/messages/", Some(&ghost)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTHENTICATION_FAILED");
}

#[tokio::test]
async fn chat_list_and_history_pagination() {
    let app = TestApp::new();
    let alice = app.add_user("alice").await;
    let bob = app.add_user("bob").await;
    let carol = app.add_user("carol").await;

    send(&app, &alice, &bob, "hi").await;
    app.clock.advance(Duration::seconds(1));
    send(&app, &carol, &alice, "ping").await;
    app.clock.advance(Duration::seconds(1));
    send(&app, &bob, &alice, "hello").await;
    app.clock.advance(Duration::seconds(1));
    send(&app, &alice, &bob, "bye").await;

    let (status, list) = get(&app, "/api/v1/chat/messages/?limit=1", Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["chats"].as_array().unwrap().len(), 1);
    assert_eq!(list["chats"][0]["partner_username"], "bob");
    assert_eq!(list["cursor_partner_id"], bob.id.to_string());

    let uri = format!(
        "/api/v1/chat/messages/?limit=5&cursor_last_message_time={}&cursor_partner_id={}",
        encode(&list["cursor_last_message_time"]),
        bob.id
    );
    let (status, rest) = get(&app, &uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rest["chats"].as_array().unwrap().len(), 1);
    assert_eq!(rest["chats"][0]["partner_id"], carol.id.to_string());

    let uri = format!("/api/v1/chat/messages/{}/?limit=2", bob.id);
    let (status, page) = get(&app, &uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = page["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message_text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["bye", "hello"]);
    assert_eq!(page["messages"][1]["username"], "bob");
    assert_eq!(page["participants"][0]["participant_id"], alice.id.to_string());
    assert_eq!(page["participants"][0]["is_current_user"], true);

    let uri = format!(
        "/api/v1/chat/messages/{}/?limit=2&cursor_time={}&cursor_message_id={}",
        alice.id,
        encode(&page["cursor_time"]),
        page["cursor_message_id"]
    );
    let (status, older) = get(&app, &uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(older["messages"].as_array().unwrap().len(), 1);
    assert_eq!(older["messages"][0]["message_text"], "hi");
}

#[tokio::test]
async fn history_error_statuses() {
    let app = TestApp::new();
    let alice = app.add_user("alice").await;
    let ghost = Uuid::new_v4();

    let uri = format!("/api/v1/chat/messages/{}/", alice.id);
    let (status, body) = get(&app, &uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "It is not possible to receive messages between the current user and the same user."
    );

    let uri = format!("/api/v1/chat/messages/{ghost}/");
    let (status, body) = get(&app, &uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"]["not_found_id"], ghost.to_string());

    let (status, _) = get(&app, "/api/v1/chat/messages/not-a-uuid/", Some(&alice)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_search_offsets_and_not_found() {
    let app = TestApp::new();
    let anna = app.add_user("anna").await;
    app.add_user("annabel").await;
    app.add_user("hannah").await;

    // 默认页大小为 2
    let (status, first) = get(&app, "/api/v1/chat/users/?username=ANN", Some(&anna)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["users"].as_array().unwrap().len(), 2);
    assert_eq!(first["pagination"]["new_offset"], 2);
    assert_eq!(first["pagination"]["is_end"], false);

    let (status, second) =
        get(&app, "/api/v1/chat/users/?username=ann&offset=2", Some(&anna)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["users"][0]["username"], "hannah");
    assert_eq!(second["pagination"]["is_end"], true);

    let (status, body) = get(&app, "/api/v1/chat/users/?username=zed", Some(&anna)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Users not found.");

    let (status, _) = get(&app, "/api/v1/chat/users/?username=ann&limit=0", Some(&anna)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

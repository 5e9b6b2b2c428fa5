use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use application::dto::{ChatListDto, HistoryDto, UserSearchDto};
use application::{ChatListRequest, HistoryRequest, SearchUsersRequest};

use crate::{
    auth::CurrentUser, error::ApiError, state::AppState, ws_connection::WebSocketConnection,
};

#[derive(Debug, Default, Deserialize)]
struct ChatListParams {
    cursor_last_message_time: Option<DateTime<Utc>>,
    cursor_partner_id: Option<Uuid>,
    limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
    cursor_time: Option<DateTime<Utc>>,
    cursor_message_id: Option<i64>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    username: String,
    limit: Option<u32>,
    #[serde(default)]
    offset: u32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/messages/", get(get_chat_list))
        .route("/chat/messages/{partner_id}/", get(get_history))
        .route("/chat/users/", get(search_users))
        .route("/chat/ws/", get(websocket_handler))
}

async fn health() -> &'static str {
    "ok"
}

async fn get_chat_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ChatListParams>,
) -> Result<Json<ChatListDto>, ApiError> {
    let page = state
        .chat_service
        .get_chat_list(ChatListRequest {
            user_id: user.id.into(),
            cursor_last_message_time: params.cursor_last_message_time,
            cursor_partner_id: params.cursor_partner_id,
            limit: params.limit,
        })
        .await?;
    Ok(Json(page))
}

async fn get_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(partner_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryDto>, ApiError> {
    let page = state
        .chat_service
        .get_history(HistoryRequest {
            user_id: user.id.into(),
            partner_id,
            cursor_time: params.cursor_time,
            cursor_message_id: params.cursor_message_id,
            limit: params.limit,
        })
        .await?;
    Ok(Json(page))
}

async fn search_users(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<UserSearchDto>, ApiError> {
    let page = state
        .chat_service
        .search_users(SearchUsersRequest {
            username: params.username,
            limit: params.limit,
            offset: params.offset,
        })
        .await?;
    Ok(Json(page))
}

/// 认证在升级之前完成，失败时直接返回 401，不建立连接。
async fn websocket_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let connection = WebSocketConnection::new(socket, state, user).await;
        connection.run().await;
    })
}

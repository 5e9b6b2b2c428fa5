use application::{
    ApplicationError, ConnectionHandle, ConnectionReceiver, SendMessageRequest,
};
use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::User;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::domain_detail;
use crate::state::AppState;

/// 客户端发送的私信帧
#[derive(Debug, Deserialize)]
struct IncomingMessage {
    message_text: String,
    recipient_id: Uuid,
}

/// WebSocket 连接管理器
///
/// 封装单个 WebSocket 连接的所有状态和逻辑，包括：
/// - 在注册表中登记（替换同一用户的旧连接）
/// - 解析客户端发来的私信并交给应用层
/// - 把推送事件写回客户端
/// - 断开时只移除自己的登记
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    user: User,
    handle: ConnectionHandle,
    receiver: ConnectionReceiver,
}

impl WebSocketConnection {
    /// 创建新的 WebSocket 连接并登记，旧连接会收到关闭通知
    pub async fn new(socket: WebSocket, state: AppState, user: User) -> Self {
        let (handle, receiver) = ConnectionHandle::channel(user.id, state.outbound_buffer);

        if let Some(previous) = state.registry.register(handle.clone()).await {
            tracing::info!(
                user_id = %user.id,
                previous_connection = %previous.id(),
                "同一用户建立了新连接，关闭旧连接"
            );
            previous.close();
        }

        tracing::info!(user_id = %user.id, connection_id = %handle.id(), "WebSocket 连接已建立");

        Self {
            socket,
            state,
            user,
            handle,
            receiver,
        }
    }

    /// 运行 WebSocket 连接的主循环
    ///
    /// 写任务统一处理所有对 sender 的写操作：本地回复、推送事件、关闭信号；
    /// 读任务逐帧处理客户端消息。任一任务结束即断开连接。
    pub async fn run(self) {
        let Self {
            socket,
            state,
            user,
            handle,
            receiver,
        } = self;
        let ConnectionReceiver {
            mut events,
            mut close_signal,
        } = receiver;

        let (mut sender, mut incoming) = socket.split();

        // 创建 mpsc channel 来解耦对 sender 的访问
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        let mut send_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(cmd) = cmd_rx.recv() => {
                        let frame = match cmd {
                            WsCommand::SendText(text) => WsMessage::Text(text.into()),
                            WsCommand::SendPong(data) => WsMessage::Pong(data),
                        };
                        if sender.send(frame).await.is_err() {
                            tracing::warn!("Failed to send reply frame");
                            break;
                        }
                    }
                    Some(event) = events.recv() => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(err) => {
                                tracing::warn!(error = %err, "failed to serialize websocket payload");
                                continue;
                            }
                        };
                        if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                            tracing::warn!(event = event.kind(), "Failed to push event");
                            break;
                        }
                    }
                    _ = close_signal.wait() => {
                        tracing::debug!("收到关闭通知");
                        let _ = sender.send(WsMessage::Close(None)).await;
                        break;
                    }
                }
            }
            tracing::debug!("WebSocket发送任务结束");
        });

        let mut recv_task = tokio::spawn({
            let state = state.clone();
            let user_id = Uuid::from(user.id);
            async move {
                while let Some(Ok(message)) = incoming.next().await {
                    if Self::handle_incoming(&state, user_id, message, &cmd_tx)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                tracing::debug!("WebSocket接收任务结束");
            }
        });

        // 等待任意一个任务完成（连接断开），另一个随之终止
        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        // 期间若已被新连接替换，这里不会移除新连接
        state
            .registry
            .deregister_if_current(user.id, handle.id())
            .await;
        handle.close();

        tracing::info!(user_id = %user.id, connection_id = %handle.id(), "WebSocket连接已断开");
    }

    /// 处理来自客户端的消息
    ///
    /// 格式或业务校验失败只回复错误帧，连接保持；返回 `Err` 表示应断开。
    async fn handle_incoming(
        state: &AppState,
        user_id: Uuid,
        message: WsMessage,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) -> Result<(), ()> {
        match message {
            WsMessage::Close(_) => {
                tracing::info!("WebSocket收到关闭消息");
                Err(())
            }
            WsMessage::Ping(data) => {
                tracing::debug!("收到ping消息，发送pong回应");
                cmd_tx
                    .send(WsCommand::SendPong(data))
                    .await
                    .map_err(|_| tracing::warn!("Failed to send pong command"))
            }
            WsMessage::Pong(_) => Ok(()),
            WsMessage::Binary(_) => {
                let error = frame_error("json_invalid", "Binary frames are not supported");
                Self::reply(cmd_tx, error).await
            }
            WsMessage::Text(text) => {
                let incoming = match serde_json::from_str::<IncomingMessage>(text.as_str()) {
                    Ok(incoming) => incoming,
                    Err(err) => {
                        let kind = if err.is_data() { "value_error" } else { "json_invalid" };
                        tracing::debug!(error = %err, "无法解析客户端消息");
                        return Self::reply(cmd_tx, frame_error(kind, &err.to_string())).await;
                    }
                };

                let request = SendMessageRequest {
                    sender_id: user_id,
                    recipient_id: incoming.recipient_id,
                    message_text: incoming.message_text,
                };
                match state.chat_service.send_message(request).await {
                    Ok(_) => Ok(()),
                    Err(ApplicationError::Domain(err)) => {
                        Self::reply(cmd_tx, json!({ "detail": domain_detail(&err) })).await
                    }
                    Err(err) => {
                        tracing::error!(error = %err, %user_id, "消息发送失败");
                        Self::reply(cmd_tx, json!({ "detail": "Incorrect data." })).await
                    }
                }
            }
        }
    }

    async fn reply(cmd_tx: &mpsc::Sender<WsCommand>, body: Value) -> Result<(), ()> {
        cmd_tx
            .send(WsCommand::SendText(body.to_string()))
            .await
            .map_err(|_| tracing::warn!("Failed to queue reply"))
    }
}

/// 帧格式错误，结构与 HTTP 校验错误一致
fn frame_error(kind: &str, message: &str) -> Value {
    json!({
        "detail": [{
            "type": kind,
            "loc": ["body"],
            "msg": message,
        }]
    })
}

/// WebSocket 写操作命令
///
/// 使用命令模式统一管理所有对 WebSocket sender 的写操作
#[derive(Debug)]
enum WsCommand {
    SendText(String),
    SendPong(Bytes),
}

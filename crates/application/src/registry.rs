//! 在线连接注册表
//!
//! 每位用户至多一条活动连接。新连接注册时替换旧连接，旧连接由调用方关闭。
//! 连接退出时只能移除自己（按连接 ID 比对），不会误删已替换它的新连接。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use domain::UserId;
use thiserror::Error;
use tokio::sync::{mpsc, watch, RwLock};
use uuid::Uuid;

use crate::events::ServerEvent;

/// 连接唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("连接已关闭")]
    Closed,
    #[error("发送超时")]
    Timeout,
}

/// 指向一条在线连接的句柄，可廉价克隆。
///
/// 事件经有界通道交给连接的写任务；关闭信号通过 `watch` 通知写任务结束。
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: UserId,
    events: mpsc::Sender<ServerEvent>,
    closed: Arc<watch::Sender<bool>>,
}

/// 连接写任务持有的接收端
#[derive(Debug)]
pub struct ConnectionReceiver {
    pub events: mpsc::Receiver<ServerEvent>,
    pub close_signal: CloseSignal,
}

#[derive(Debug)]
pub struct CloseSignal(watch::Receiver<bool>);

impl CloseSignal {
    /// 等到连接被关闭（或所有句柄都已释放）。
    pub async fn wait(&mut self) {
        loop {
            let closed = *self.0.borrow_and_update();
            if closed {
                return;
            }
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

impl ConnectionHandle {
    /// 为 `user_id` 创建新连接的句柄和接收端，`buffer` 为待发送事件的上限。
    pub fn channel(user_id: UserId, buffer: usize) -> (Self, ConnectionReceiver) {
        let (events_tx, events_rx) = mpsc::channel(buffer.max(1));
        let (closed_tx, closed_rx) = watch::channel(false);
        let handle = Self {
            id: ConnectionId::new(),
            user_id,
            events: events_tx,
            closed: Arc::new(closed_tx),
        };
        let receiver = ConnectionReceiver {
            events: events_rx,
            close_signal: CloseSignal(closed_rx),
        };
        (handle, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// 在 `timeout` 内把事件交给连接，缓冲区满且超时视为发送失败。
    pub async fn send(&self, event: ServerEvent, timeout: Duration) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        match tokio::time::timeout(timeout, self.events.send(event)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Closed),
            Err(_) => Err(DeliveryError::Timeout),
        }
    }

    /// 通知连接关闭，可重复调用。
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.events.is_closed()
    }
}

/// 用户到其唯一活动连接的映射。
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<UserId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册连接，返回被替换的旧连接（如有）。
    pub async fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let mut connections = self.connections.write().await;
        connections.insert(handle.user_id(), handle)
    }

    /// 无条件移除用户的连接。
    pub async fn deregister(&self, user_id: UserId) -> Option<ConnectionHandle> {
        self.connections.write().await.remove(&user_id)
    }

    /// 仅当当前登记的仍是 `connection_id` 时才移除。
    pub async fn deregister_if_current(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Option<ConnectionHandle> {
        let mut connections = self.connections.write().await;
        match connections.get(&user_id) {
            Some(current) if current.id() == connection_id => connections.remove(&user_id),
            _ => None,
        }
    }

    pub async fn lookup(&self, user_id: UserId) -> Option<ConnectionHandle> {
        self.connections.read().await.get(&user_id).cloned()
    }

    /// 取出全部连接，用于停机时逐个关闭。
    pub async fn drain(&self) -> Vec<ConnectionHandle> {
        let mut connections = self.connections.write().await;
        connections.drain().map(|(_, handle)| handle).collect()
    }

    pub async fn connected_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

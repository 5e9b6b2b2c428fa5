//! 消息投递
//!
//! 消息持久化成功后，把事件推送给在线的参与者：
//! 接收者收到 `new_message` 与 `chat_list_update`，发送者收到 `chat_list_update`。
//! 离线用户直接跳过，稍后通过历史接口获取。

use std::sync::Arc;
use std::time::Duration;

use domain::{Message, UserId};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::events::ServerEvent;
use crate::registry::ConnectionRegistry;

/// 一次待投递的推送
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub target: UserId,
    pub event: ServerEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// 目标不在线
    Offline,
    /// 发送失败，连接已被移除并关闭
    Evicted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub outcomes: Vec<(UserId, &'static str, DeliveryOutcome)>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, _, outcome)| *outcome == DeliveryOutcome::Delivered)
            .count()
    }
}

/// 一条消息对应的全部推送。
pub fn notifications_for(message: &Message) -> Vec<Notification> {
    vec![
        Notification {
            target: message.recipient_id,
            event: ServerEvent::new_message(message),
        },
        Notification {
            target: message.recipient_id,
            event: ServerEvent::chat_list_update(message, message.recipient_id),
        },
        Notification {
            target: message.sender_id,
            event: ServerEvent::chat_list_update(message, message.sender_id),
        },
    ]
}

pub struct DeliveryDispatcher {
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
}

impl DeliveryDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// 并发推送，单个连接的失败或阻塞不影响其他推送。
    pub async fn on_message_persisted(&self, message: &Message) -> DeliveryReport {
        let sends = notifications_for(message)
            .into_iter()
            .map(|notification| self.deliver(notification));
        let outcomes = join_all(sends).await;

        debug!(
            message_id = %message.id,
            sender_id = %message.sender_id,
            recipient_id = %message.recipient_id,
            "消息推送完成"
        );
        DeliveryReport { outcomes }
    }

    async fn deliver(&self, notification: Notification) -> (UserId, &'static str, DeliveryOutcome) {
        let target = notification.target;
        let kind = notification.event.kind();

        let Some(handle) = self.registry.lookup(target).await else {
            return (target, kind, DeliveryOutcome::Offline);
        };

        match handle.send(notification.event, self.send_timeout).await {
            Ok(()) => (target, kind, DeliveryOutcome::Delivered),
            Err(err) => {
                warn!(
                    user_id = %target,
                    connection_id = %handle.id(),
                    event = kind,
                    error = %err,
                    "推送失败，移除连接"
                );
                // 只移除失败的那条连接，期间重连的新连接不受影响
                self.registry
                    .deregister_if_current(target, handle.id())
                    .await;
                handle.close();
                (target, kind, DeliveryOutcome::Evicted)
            }
        }
    }
}

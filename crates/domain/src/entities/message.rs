//! 消息实体定义

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{MessageId, MessageText, Timestamp, UserId};

/// 已持久化的私信。创建后不可修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub text: MessageText,
    /// 由存储在插入时分配
    pub created_at: Timestamp,
}

impl Message {
    /// 是否为两位用户之间的消息（不区分方向）。
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.recipient_id == b)
            || (self.sender_id == b && self.recipient_id == a)
    }

    pub fn involves(&self, user_id: UserId) -> bool {
        self.sender_id == user_id || self.recipient_id == user_id
    }

    /// 从 `user_id` 的视角看的会话对方。
    pub fn partner_of(&self, user_id: UserId) -> UserId {
        if self.sender_id == user_id {
            self.recipient_id
        } else {
            self.sender_id
        }
    }
}

/// 待插入的消息，`id` 和 `created_at` 由存储分配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub text: MessageText,
}

impl NewMessage {
    pub fn new(sender_id: UserId, recipient_id: UserId, text: MessageText) -> DomainResult<Self> {
        if sender_id == recipient_id {
            return Err(DomainError::SelfMessage);
        }
        Ok(Self {
            sender_id,
            recipient_id,
            text,
        })
    }
}

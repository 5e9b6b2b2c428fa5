//! 推送给在线连接的事件
//!
//! 线上格式为 `{"type": "...", "data": {...}}`。

use domain::{Message, Timestamp, UserId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// 发给接收者的新消息
    NewMessage(NewMessagePayload),
    /// 发给会话双方的会话列表变更
    ChatListUpdate(ChatListUpdatePayload),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessagePayload {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub message_text: String,
    #[serde(serialize_with = "wire_time::serialize")]
    pub created_at: Timestamp,
}

/// `partner_id` 是从收件方视角看的会话对方。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatListUpdatePayload {
    pub partner_id: UserId,
    #[serde(serialize_with = "wire_time::serialize")]
    pub last_message_time: Timestamp,
}

impl ServerEvent {
    pub fn new_message(message: &Message) -> Self {
        Self::NewMessage(NewMessagePayload {
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            message_text: message.text.as_str().to_owned(),
            created_at: message.created_at,
        })
    }

    /// 给 `addressee` 的会话列表更新，`partner_id` 取另一位参与者。
    pub fn chat_list_update(message: &Message, addressee: UserId) -> Self {
        Self::ChatListUpdate(ChatListUpdatePayload {
            partner_id: message.partner_of(addressee),
            last_message_time: message.created_at,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::ChatListUpdate(_) => "chat_list_update",
        }
    }
}

/// 实时推送中的时间格式：`YYYY-MM-DD HH:MM:SS[.ffffff]`，微秒为零时省略小数部分。
pub mod wire_time {
    use chrono::{DateTime, Timelike, Utc};
    use serde::Serializer;

    pub fn format(value: &DateTime<Utc>) -> String {
        if value.nanosecond() / 1_000 == 0 {
            value.format("%Y-%m-%d %H:%M:%S").to_string()
        } else {
            value.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
        }
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(value))
    }
}

use domain::{ChatSummary, Message, Timestamp, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pagination::OffsetPagination;

/// 发送成功的确认
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessageDto {
    pub status: String,
    pub id: i64,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub message_text: String,
    pub created_at: Timestamp,
}

impl From<&Message> for SentMessageDto {
    fn from(message: &Message) -> Self {
        Self {
            status: "success".to_owned(),
            id: message.id.0,
            sender_id: Uuid::from(message.sender_id),
            recipient_id: Uuid::from(message.recipient_id),
            message_text: message.text.as_str().to_owned(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummaryDto {
    pub partner_id: Uuid,
    pub partner_username: String,
    pub last_message_time: Timestamp,
}

impl From<&ChatSummary> for ChatSummaryDto {
    fn from(summary: &ChatSummary) -> Self {
        Self {
            partner_id: Uuid::from(summary.partner_id),
            partner_username: summary.partner_username.as_str().to_owned(),
            last_message_time: summary.last_message_time,
        }
    }
}

/// 会话列表页；游标字段为空表示没有更多数据。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatListDto {
    pub chats: Vec<ChatSummaryDto>,
    pub cursor_last_message_time: Option<Timestamp>,
    pub cursor_partner_id: Option<Uuid>,
}

/// 历史中的参与者，当前用户排在第一位。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantDto {
    pub participant_id: Uuid,
    pub is_current_user: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessageDto {
    pub id: i64,
    pub sender_id: Uuid,
    pub username: String,
    pub message_text: String,
    pub created_at: Timestamp,
}

/// 历史页，`messages` 按时间由新到旧。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDto {
    pub participants: Vec<ParticipantDto>,
    pub messages: Vec<HistoryMessageDto>,
    pub cursor_time: Option<Timestamp>,
    pub cursor_message_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummaryDto {
    pub id: Uuid,
    pub username: String,
}

impl From<&User> for UserSummaryDto {
    fn from(user: &User) -> Self {
        Self {
            id: Uuid::from(user.id),
            username: user.username.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSearchDto {
    pub users: Vec<UserSummaryDto>,
    pub pagination: OffsetPagination,
}

//! 会话列表项

use serde::{Deserialize, Serialize};

use crate::value_objects::{Timestamp, UserId, Username};

/// 会话列表中的一项：从某位用户视角看的会话对方及最近一条消息的时间。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub partner_id: UserId,
    pub partner_username: Username,
    pub last_message_time: Timestamp,
}

//! 游标分页引擎
//!
//! 会话列表和聊天历史使用键集（keyset）分页：结果按复合键降序排列，
//! 游标取自上一页最后一行，下一页只包含严格“更早”的行。
//! 用户搜索使用偏移分页。
//!
//! 这里的谓词和排序同时被内存存储使用，SQL 实现与之保持同一语义。

use std::cmp::Ordering;
use std::collections::HashMap;

use domain::{ChatSummary, Message, MessageId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// 会话列表游标：`(last_message_time, partner_id)`。
///
/// 没有 `partner_id` 时退化为只按时间严格小于过滤，同一时刻的其余会话会被跳过。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatListCursor {
    pub last_message_time: Timestamp,
    pub partner_id: Option<UserId>,
}

impl ChatListCursor {
    /// 由请求参数组装游标；未给出时间时不存在游标。
    pub fn from_parts(
        last_message_time: Option<Timestamp>,
        partner_id: Option<UserId>,
    ) -> Option<Self> {
        last_message_time.map(|last_message_time| Self {
            last_message_time,
            partner_id,
        })
    }

    /// 取自一页的最后一行。
    pub fn after(summary: &ChatSummary) -> Self {
        Self {
            last_message_time: summary.last_message_time,
            partner_id: Some(summary.partner_id),
        }
    }

    /// 行是否排在游标之后（即属于下一页）。
    pub fn admits(&self, summary: &ChatSummary) -> bool {
        admits_chat(self, summary.last_message_time, summary.partner_id)
    }
}

fn admits_chat(cursor: &ChatListCursor, time: Timestamp, partner_id: UserId) -> bool {
    match cursor.partner_id {
        Some(cursor_partner) => {
            time < cursor.last_message_time
                || (time == cursor.last_message_time && partner_id < cursor_partner)
        }
        None => time < cursor.last_message_time,
    }
}

/// 历史游标：`(created_at, message_id)`，两部分必须同时给出。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCursor {
    pub created_at: Timestamp,
    pub message_id: MessageId,
}

impl HistoryCursor {
    /// 只有两部分都存在时游标才生效，缺任何一部分都按首页处理。
    pub fn from_parts(created_at: Option<Timestamp>, message_id: Option<i64>) -> Option<Self> {
        match (created_at, message_id) {
            (Some(created_at), Some(id)) => Some(Self {
                created_at,
                message_id: MessageId(id),
            }),
            _ => None,
        }
    }

    pub fn after(message: &Message) -> Self {
        Self {
            created_at: message.created_at,
            message_id: message.id,
        }
    }

    pub fn admits(&self, message: &Message) -> bool {
        message.created_at < self.created_at
            || (message.created_at == self.created_at && message.id < self.message_id)
    }
}

/// 会话列表查询
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatListQuery {
    pub user_id: UserId,
    pub cursor: Option<ChatListCursor>,
    pub limit: u32,
}

/// 历史查询，`user_id` 与 `partner_id` 的顺序无关。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub user_id: UserId,
    pub partner_id: UserId,
    pub cursor: Option<HistoryCursor>,
    pub limit: u32,
}

impl HistoryQuery {
    pub fn matches(&self, message: &Message) -> bool {
        message.is_between(self.user_id, self.partner_id)
            && self.cursor.map_or(true, |cursor| cursor.admits(message))
    }
}

/// 历史排序：最新的在前，同一时刻按 ID 降序。
pub fn history_order(a: &Message, b: &Message) -> Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

/// 会话列表排序：最近活跃的在前，同一时刻按伙伴 ID 降序。
pub fn chat_list_order(a: &ChatSummary, b: &ChatSummary) -> Ordering {
    b.last_message_time
        .cmp(&a.last_message_time)
        .then(b.partner_id.cmp(&a.partner_id))
}

/// 按会话伙伴聚合用户参与的消息，得到每位伙伴的最近消息时间。
pub fn latest_by_partner<'a>(
    user_id: UserId,
    messages: impl IntoIterator<Item = &'a Message>,
) -> HashMap<UserId, Timestamp> {
    let mut latest: HashMap<UserId, Timestamp> = HashMap::new();
    for message in messages.into_iter().filter(|m| m.involves(user_id)) {
        let entry = latest
            .entry(message.partner_of(user_id))
            .or_insert(message.created_at);
        if message.created_at > *entry {
            *entry = message.created_at;
        }
    }
    latest
}

/// 对已聚合的 `(partner_id, last_message_time)` 应用游标过滤并排序，不截断。
pub fn filter_partners(
    latest: HashMap<UserId, Timestamp>,
    cursor: Option<&ChatListCursor>,
) -> Vec<(UserId, Timestamp)> {
    let mut rows: Vec<(UserId, Timestamp)> = latest
        .into_iter()
        .filter(|(partner_id, time)| cursor.map_or(true, |c| admits_chat(c, *time, *partner_id)))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));
    rows
}

/// 历史页的下一页游标。
///
/// 不足一整页说明已到末尾，返回 `None`，客户端不必再多请求一次空页。
pub fn next_history_cursor(page: &[Message], limit: u32) -> Option<HistoryCursor> {
    if is_short_page(page.len(), limit) {
        return None;
    }
    page.last().map(HistoryCursor::after)
}

/// 会话列表页的下一页游标，末页规则同上。
pub fn next_chat_list_cursor(page: &[ChatSummary], limit: u32) -> Option<ChatListCursor> {
    if is_short_page(page.len(), limit) {
        return None;
    }
    page.last().map(ChatListCursor::after)
}

fn is_short_page(returned: usize, limit: u32) -> bool {
    u32::try_from(returned).map_or(false, |returned| returned < limit)
}

/// 偏移分页信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetPagination {
    pub limit: u32,
    pub current_offset: u32,
    pub new_offset: u32,
    pub is_end: bool,
}

impl OffsetPagination {
    /// `returned` 为本页实际返回的条数，少于 `limit` 即视为到达末尾；
    /// 有数据时下一页偏移前进一整页。
    pub fn new(limit: u32, offset: u32, returned: usize) -> Self {
        let returned = u32::try_from(returned).unwrap_or(u32::MAX);
        let new_offset = if returned > 0 {
            offset.saturating_add(limit)
        } else {
            offset
        };
        Self {
            limit,
            current_offset: offset,
            new_offset,
            is_end: returned < limit,
        }
    }
}

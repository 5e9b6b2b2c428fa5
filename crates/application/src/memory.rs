//! 内存存储
//!
//! 同时实现 `UserRepository` 与 `MessageRepository`，用于测试和无数据库的本地运行。
//! 过滤与排序复用分页引擎，与 SQL 实现保持同一语义。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    ChatSummary, Message, MessageId, NewMessage, RepositoryError, Timestamp, User, UserId,
};
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::pagination::{
    filter_partners, history_order, latest_by_partner, ChatListQuery, HistoryQuery,
};
use crate::repository::{MessageRepository, UserRepository};

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    messages: Vec<Message>,
    next_id: i64,
    last_created_at: Option<Timestamp>,
}

pub struct MemoryStorage {
    clock: Arc<dyn Clock>,
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: RwLock::new(MemoryState::default()),
        }
    }

    pub async fn add_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStorage {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = Vec::new();
        for id in ids {
            if let Some(user) = state.users.get(id) {
                if !users.iter().any(|u| u.id == user.id) {
                    users.push(user.clone());
                }
            }
        }
        Ok(users)
    }

    async fn search_by_username(
        &self,
        fragment: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<User>, RepositoryError> {
        let needle = fragment.to_lowercase();
        let state = self.state.read().await;
        let mut matches: Vec<&User> = state
            .users
            .values()
            .filter(|user| user.username.as_str().to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|a, b| {
            a.username
                .as_str()
                .cmp(b.username.as_str())
                .then(a.id.cmp(&b.id))
        });
        Ok(matches
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageRepository for MemoryStorage {
    async fn insert(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&message.sender_id) {
            return Err(RepositoryError::integrity("messages_sender_id_fkey"));
        }
        if !state.users.contains_key(&message.recipient_id) {
            return Err(RepositoryError::integrity("messages_recipient_id_fkey"));
        }

        // 插入时间单调不减，与 id 的分配顺序一致
        let now = self.clock.now();
        let created_at = match state.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        state.next_id += 1;
        state.last_created_at = Some(created_at);

        let stored = Message {
            id: MessageId(state.next_id),
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            text: message.text,
            created_at,
        };
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn query_history(&self, query: HistoryQuery) -> Result<Vec<Message>, RepositoryError> {
        let state = self.state.read().await;
        let mut page: Vec<Message> = state
            .messages
            .iter()
            .filter(|message| query.matches(message))
            .cloned()
            .collect();
        page.sort_by(history_order);
        page.truncate(query.limit as usize);
        Ok(page)
    }

    async fn query_chat_summaries(
        &self,
        query: ChatListQuery,
    ) -> Result<Vec<ChatSummary>, RepositoryError> {
        let state = self.state.read().await;
        let latest = latest_by_partner(query.user_id, &state.messages);
        let page = filter_partners(latest, query.cursor.as_ref())
            .into_iter()
            .filter_map(|(partner_id, last_message_time)| {
                state.users.get(&partner_id).map(|partner| ChatSummary {
                    partner_id,
                    partner_username: partner.username.clone(),
                    last_message_time,
                })
            })
            .take(query.limit as usize)
            .collect();
        Ok(page)
    }
}

use async_trait::async_trait;
use domain::{ChatSummary, Message, NewMessage, RepositoryError, User, UserId};

use crate::pagination::{ChatListQuery, HistoryQuery};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// 返回存在的用户，顺序不保证；不存在的 ID 直接忽略。
    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError>;

    /// 按用户名子串（不区分大小写）搜索，按用户名排序后做偏移分页。
    async fn search_by_username(
        &self,
        fragment: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<User>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 持久化消息并分配 `id` 与 `created_at`。
    ///
    /// 任一参与者不存在时返回 `RepositoryError::IntegrityViolation`。
    async fn insert(&self, message: NewMessage) -> Result<Message, RepositoryError>;

    /// 两位用户之间的消息，按 `(created_at DESC, id DESC)` 排序。
    async fn query_history(&self, query: HistoryQuery) -> Result<Vec<Message>, RepositoryError>;

    /// 用户的会话列表，按 `(last_message_time DESC, partner_id DESC)` 排序。
    async fn query_chat_summaries(
        &self,
        query: ChatListQuery,
    ) -> Result<Vec<ChatSummary>, RepositoryError>;
}

use std::sync::Arc;

use application::pagination::{ChatListQuery, HistoryQuery};
use application::repository::{MessageRepository, UserRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    ChatSummary, Message, MessageId, MessageText, NewMessage, RepositoryError, User, UserId,
    Username,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            RepositoryError::integrity(db.constraint().unwrap_or("foreign_key").to_owned())
        }
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        _ => RepositoryError::storage(err.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

/// 转义 LIKE 模式中的通配符，用户输入按字面子串匹配。
fn like_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
    is_moderator: bool,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let username =
            Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;

        Ok(User {
            id: UserId::from(value.id),
            username,
            email: value.email,
            is_moderator: value.is_moderator,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: i64,
    sender_id: Uuid,
    recipient_id: Uuid,
    message_text: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let text =
            MessageText::parse(value.message_text).map_err(|err| invalid_data(err.to_string()))?;

        Ok(Message {
            id: MessageId(value.id),
            sender_id: UserId::from(value.sender_id),
            recipient_id: UserId::from(value.recipient_id),
            text,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChatSummaryRecord {
    partner_id: Uuid,
    partner_username: String,
    last_message_time: DateTime<Utc>,
}

impl TryFrom<ChatSummaryRecord> for ChatSummary {
    type Error = RepositoryError;

    fn try_from(value: ChatSummaryRecord) -> Result<Self, Self::Error> {
        let partner_username = Username::parse(value.partner_username)
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(ChatSummary {
            partner_id: UserId::from(value.partner_id),
            partner_username,
            last_message_time: value.last_message_time,
        })
    }
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, is_moderator
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let ids: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
        let records = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, is_moderator
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }

    async fn search_by_username(
        &self,
        fragment: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<User>, RepositoryError> {
        let records = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, is_moderator
            FROM users
            WHERE username ILIKE $1
            ORDER BY username, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(like_pattern(fragment))
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }
}

pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        // created_at 由数据库的 clock_timestamp() 默认值分配
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (sender_id, recipient_id, message_text)
            VALUES ($1, $2, $3)
            RETURNING id, sender_id, recipient_id, message_text, created_at
            "#,
        )
        .bind(Uuid::from(message.sender_id))
        .bind(Uuid::from(message.recipient_id))
        .bind(message.text.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Message::try_from(record)
    }

    async fn query_history(&self, query: HistoryQuery) -> Result<Vec<Message>, RepositoryError> {
        let (cursor_time, cursor_id) = match query.cursor {
            Some(cursor) => (Some(cursor.created_at), Some(cursor.message_id.0)),
            None => (None, None),
        };

        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, sender_id, recipient_id, message_text, created_at
            FROM messages
            WHERE ((sender_id = $1 AND recipient_id = $2)
                OR (sender_id = $2 AND recipient_id = $1))
              AND ($3::timestamptz IS NULL
                OR created_at < $3
                OR (created_at = $3 AND id < $4))
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "#,
        )
        .bind(Uuid::from(query.user_id))
        .bind(Uuid::from(query.partner_id))
        .bind(cursor_time)
        .bind(cursor_id)
        .bind(i64::from(query.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Message::try_from).collect()
    }

    async fn query_chat_summaries(
        &self,
        query: ChatListQuery,
    ) -> Result<Vec<ChatSummary>, RepositoryError> {
        let cursor_time = query.cursor.map(|cursor| cursor.last_message_time);
        let cursor_partner = query
            .cursor
            .and_then(|cursor| cursor.partner_id)
            .map(Uuid::from);

        let records = sqlx::query_as::<_, ChatSummaryRecord>(
            r#"
            WITH partners AS (
                SELECT CASE WHEN sender_id = $1 THEN recipient_id ELSE sender_id END AS partner_id,
                       MAX(created_at) AS last_message_time
                FROM messages
                WHERE sender_id = $1 OR recipient_id = $1
                GROUP BY 1
            )
            SELECT p.partner_id, u.username AS partner_username, p.last_message_time
            FROM partners p
            JOIN users u ON u.id = p.partner_id
            WHERE $2::timestamptz IS NULL
               OR p.last_message_time < $2
               OR ($3::uuid IS NOT NULL AND p.last_message_time = $2 AND p.partner_id < $3)
            ORDER BY p.last_message_time DESC, p.partner_id DESC
            LIMIT $4
            "#,
        )
        .bind(Uuid::from(query.user_id))
        .bind(cursor_time)
        .bind(cursor_partner)
        .bind(i64::from(query.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(ChatSummary::try_from).collect()
    }
}

pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

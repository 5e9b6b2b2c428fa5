use std::collections::HashMap;
use std::sync::Arc;

use domain::{
    DomainError, MessageText, NewMessage, RepositoryError, Timestamp, User, UserId,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dispatcher::DeliveryDispatcher,
    dto::{
        ChatListDto, ChatSummaryDto, HistoryDto, HistoryMessageDto, ParticipantDto,
        SentMessageDto, UserSearchDto, UserSummaryDto,
    },
    error::ApplicationError,
    pagination::{
        next_chat_list_cursor, next_history_cursor, ChatListCursor, ChatListQuery,
        HistoryCursor, HistoryQuery, OffsetPagination,
    },
    repository::{MessageRepository, UserRepository},
};

/// 各接口的默认页大小
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub chat_list: u32,
    pub history: u32,
    pub search: u32,
    /// 搜索允许的最大页大小，超过时截断
    pub max_search: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            chat_list: 20,
            history: 50,
            search: 10,
            max_search: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub message_text: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatListRequest {
    pub user_id: Uuid,
    pub cursor_last_message_time: Option<Timestamp>,
    pub cursor_partner_id: Option<Uuid>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryRequest {
    pub user_id: Uuid,
    pub partner_id: Uuid,
    pub cursor_time: Option<Timestamp>,
    pub cursor_message_id: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchUsersRequest {
    pub username: String,
    pub limit: Option<u32>,
    pub offset: u32,
}

pub struct ChatServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub dispatcher: Arc<DeliveryDispatcher>,
    pub limits: PageLimits,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 发送私信：校验、持久化，然后推送给在线的参与者。
    ///
    /// 校验失败时不写入也不推送；推送结果不影响返回值。
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<SentMessageDto, ApplicationError> {
        let sender_id = UserId::from(request.sender_id);
        let recipient_id = UserId::from(request.recipient_id);
        if sender_id == recipient_id {
            return Err(DomainError::SelfMessage.into());
        }
        let text = MessageText::parse(request.message_text)?;
        let new_message = NewMessage::new(sender_id, recipient_id, text)?;

        let message = match self.deps.message_repository.insert(new_message).await {
            Ok(message) => message,
            Err(RepositoryError::IntegrityViolation { constraint }) => {
                warn!(%sender_id, %recipient_id, %constraint, "接收者不存在，消息未保存");
                return Err(DomainError::RecipientNotFound { recipient_id }.into());
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            message_id = %message.id,
            %sender_id,
            %recipient_id,
            "消息已保存"
        );

        self.deps.dispatcher.on_message_persisted(&message).await;

        Ok(SentMessageDto::from(&message))
    }

    /// 当前用户的会话列表，按最近活跃时间倒序分页。
    pub async fn get_chat_list(
        &self,
        request: ChatListRequest,
    ) -> Result<ChatListDto, ApplicationError> {
        let limit = self.page_size(request.limit, self.deps.limits.chat_list, None)?;
        let query = ChatListQuery {
            user_id: UserId::from(request.user_id),
            cursor: ChatListCursor::from_parts(
                request.cursor_last_message_time,
                request.cursor_partner_id.map(UserId::from),
            ),
            limit,
        };

        let chats = self.deps.message_repository.query_chat_summaries(query).await?;
        let next = next_chat_list_cursor(&chats, limit);

        Ok(ChatListDto {
            chats: chats.iter().map(ChatSummaryDto::from).collect(),
            cursor_last_message_time: next.map(|c| c.last_message_time),
            cursor_partner_id: next.and_then(|c| c.partner_id).map(Uuid::from),
        })
    }

    /// 当前用户与 `partner_id` 之间的历史，由新到旧分页。
    pub async fn get_history(
        &self,
        request: HistoryRequest,
    ) -> Result<HistoryDto, ApplicationError> {
        let user_id = UserId::from(request.user_id);
        let partner_id = UserId::from(request.partner_id);
        if user_id == partner_id {
            return Err(DomainError::SameParticipant.into());
        }
        let limit = self.page_size(request.limit, self.deps.limits.history, None)?;

        let participants = self.resolve_participants(user_id, partner_id).await?;
        let usernames: HashMap<UserId, &str> = participants
            .iter()
            .map(|user| (user.id, user.username.as_str()))
            .collect();

        let query = HistoryQuery {
            user_id,
            partner_id,
            cursor: HistoryCursor::from_parts(request.cursor_time, request.cursor_message_id),
            limit,
        };
        let messages = self.deps.message_repository.query_history(query).await?;
        let next = next_history_cursor(&messages, limit);

        let messages = messages
            .iter()
            .map(|message| HistoryMessageDto {
                id: message.id.0,
                sender_id: Uuid::from(message.sender_id),
                username: usernames
                    .get(&message.sender_id)
                    .map(|name| (*name).to_owned())
                    .unwrap_or_default(),
                message_text: message.text.as_str().to_owned(),
                created_at: message.created_at,
            })
            .collect();

        Ok(HistoryDto {
            participants: vec![
                ParticipantDto {
                    participant_id: request.user_id,
                    is_current_user: true,
                },
                ParticipantDto {
                    participant_id: request.partner_id,
                    is_current_user: false,
                },
            ],
            messages,
            cursor_time: next.map(|c| c.created_at),
            cursor_message_id: next.map(|c| c.message_id.0),
        })
    }

    /// 按用户名子串搜索用户，偏移分页。
    pub async fn search_users(
        &self,
        request: SearchUsersRequest,
    ) -> Result<UserSearchDto, ApplicationError> {
        let fragment = request.username.as_str();
        if fragment.is_empty() {
            return Err(
                DomainError::validation("username", "String should have at least 1 character")
                    .into(),
            );
        }
        let limit = self.page_size(
            request.limit,
            self.deps.limits.search,
            Some(self.deps.limits.max_search),
        )?;

        let users = self
            .deps
            .user_repository
            .search_by_username(fragment, limit, request.offset)
            .await?;
        if users.is_empty() {
            return Err(DomainError::NoSearchResults.into());
        }

        Ok(UserSearchDto {
            pagination: OffsetPagination::new(limit, request.offset, users.len()),
            users: users.iter().map(UserSummaryDto::from).collect(),
        })
    }

    /// 两位参与者都必须存在；缺一方时报告缺失的那一方。
    async fn resolve_participants(
        &self,
        user_id: UserId,
        partner_id: UserId,
    ) -> Result<Vec<User>, ApplicationError> {
        let users = self
            .deps
            .user_repository
            .find_many(&[user_id, partner_id])
            .await?;

        let has = |id: UserId| users.iter().any(|user| user.id == id);
        match (has(user_id), has(partner_id)) {
            (true, true) => Ok(users),
            (false, false) => Err(DomainError::ParticipantsNotFound.into()),
            (true, false) => Err(DomainError::ParticipantNotFound {
                missing_id: partner_id,
            }
            .into()),
            (false, true) => Err(DomainError::ParticipantNotFound {
                missing_id: user_id,
            }
            .into()),
        }
    }

    fn page_size(
        &self,
        requested: Option<u32>,
        default: u32,
        max: Option<u32>,
    ) -> Result<u32, ApplicationError> {
        let size = requested.unwrap_or(default);
        if size == 0 {
            return Err(DomainError::validation("limit", "Input should be greater than 0").into());
        }
        Ok(max.map_or(size, |max| size.min(max)))
    }
}

//! 领域模型错误定义
//!
//! 错误文本直接作为 `detail` 返回给客户端，保持与现有客户端一致的英文措辞。

use thiserror::Error;

use crate::value_objects::UserId;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 发送者与接收者相同
    #[error("The user cannot send messages to himself.")]
    SelfMessage,

    /// 查询自己与自己的历史
    #[error("It is not possible to receive messages between the current user and the same user.")]
    SameParticipant,

    /// 接收者不存在（发送时由存储的外键约束发现）
    #[error("The user with this IDs was not found.")]
    RecipientNotFound { recipient_id: UserId },

    /// 会话双方都不存在
    #[error("No users with such IDs were found.")]
    ParticipantsNotFound,

    /// 会话中的一方不存在，`missing_id` 为缺失的那一方
    #[error("The user with this IDs was not found.")]
    ParticipantNotFound { missing_id: UserId },

    /// 用户名搜索无结果
    #[error("Users not found.")]
    NoSearchResults,

    /// 输入校验失败
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
}

impl DomainError {
    /// 创建验证错误
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 需要附带 `not_found_id` 的错误返回对应 ID。
    pub fn not_found_id(&self) -> Option<UserId> {
        match self {
            Self::RecipientNotFound { recipient_id } => Some(*recipient_id),
            Self::ParticipantNotFound { missing_id } => Some(*missing_id),
            _ => None,
        }
    }
}

/// 存储层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("记录不存在")]
    NotFound,

    /// 外键等完整性约束被违反
    #[error("完整性约束被违反: {constraint}")]
    IntegrityViolation { constraint: String },

    #[error("存储错误: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn integrity(constraint: impl Into<String>) -> Self {
        Self::IntegrityViolation {
            constraint: constraint.into(),
        }
    }
}

/// 领域操作结果类型
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn not_found_id_only_for_single_missing_user() {
        let id = UserId::from(Uuid::new_v4());
        assert_eq!(
            DomainError::ParticipantNotFound { missing_id: id }.not_found_id(),
            Some(id)
        );
        assert_eq!(
            DomainError::RecipientNotFound { recipient_id: id }.not_found_id(),
            Some(id)
        );
        assert_eq!(DomainError::ParticipantsNotFound.not_found_id(), None);
    }

    #[test]
    fn detail_texts_are_stable() {
        assert_eq!(
            DomainError::SelfMessage.to_string(),
            "The user cannot send messages to himself."
        );
        assert_eq!(DomainError::NoSearchResults.to_string(), "Users not found.");
    }
}

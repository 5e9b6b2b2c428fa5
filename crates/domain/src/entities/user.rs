//! 用户实体定义
//!
//! 用户由身份服务拥有，本服务只读取。

use serde::{Deserialize, Serialize};

use crate::value_objects::{UserId, Username};

/// 用户实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// 用户唯一ID
    pub id: UserId,
    /// 用户名（唯一）
    pub username: Username,
    /// 邮箱（唯一）
    pub email: String,
    /// 是否为版主
    pub is_moderator: bool,
}

impl User {
    pub fn new(id: UserId, username: Username, email: impl Into<String>) -> Self {
        Self {
            id,
            username,
            email: email.into(),
            is_moderator: false,
        }
    }
}

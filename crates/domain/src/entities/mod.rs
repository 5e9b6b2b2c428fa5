//! 领域实体定义
//!
//! 包含系统的核心实体：用户、消息、会话。

pub mod chat;
pub mod message;
pub mod user;

pub use chat::ChatSummary;
pub use message::{Message, NewMessage};
pub use user::User;

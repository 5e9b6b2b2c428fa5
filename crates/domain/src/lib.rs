//! 私信系统核心领域模型
//!
//! 包含用户、消息、会话等核心实体，以及相关的校验规则。

pub mod entities;
pub mod errors;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use value_objects::*;

//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、分页游标，
//! 以及在线连接的登记与消息推送。存储与身份校验通过 trait 抽象。

pub mod clock;
pub mod dispatcher;
pub mod dto;
pub mod error;
pub mod events;
pub mod identity;
pub mod memory;
pub mod pagination;
pub mod registry;
pub mod repository;
pub mod services;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{DeliveryDispatcher, DeliveryOutcome, DeliveryReport};
pub use error::ApplicationError;
pub use events::ServerEvent;
pub use identity::IdentityProvider;
pub use memory::MemoryStorage;
pub use registry::{
    CloseSignal, ConnectionHandle, ConnectionId, ConnectionReceiver, ConnectionRegistry,
};
pub use repository::{MessageRepository, UserRepository};
pub use services::{
    ChatListRequest, ChatService, ChatServiceDependencies, HistoryRequest, PageLimits,
    SearchUsersRequest, SendMessageRequest,
};

mod chat_service;

pub use chat_service::{
    ChatListRequest, ChatService, ChatServiceDependencies, HistoryRequest, PageLimits,
    SearchUsersRequest, SendMessageRequest,
};

use std::sync::Arc;

use application::{ChatService, ConnectionRegistry, IdentityProvider};

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub registry: Arc<ConnectionRegistry>,
    pub identity: Arc<dyn IdentityProvider>,
    /// 每条 WebSocket 连接的待发送事件上限
    pub outbound_buffer: usize,
}

impl AppState {
    pub fn new(
        chat_service: Arc<ChatService>,
        registry: Arc<ConnectionRegistry>,
        identity: Arc<dyn IdentityProvider>,
        outbound_buffer: usize,
    ) -> Self {
        Self {
            chat_service,
            registry,
            identity,
            outbound_buffer,
        }
    }
}

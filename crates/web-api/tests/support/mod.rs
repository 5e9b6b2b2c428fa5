#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{
    ChatService, ChatServiceDependencies, ConnectionRegistry, DeliveryDispatcher, ManualClock,
    MemoryStorage, PageLimits,
};
use axum::Router;
use chrono::{TimeZone, Utc};
use domain::{User, UserId, Username};
use tokio::{net::TcpListener, sync::oneshot};
use uuid::Uuid;
use web_api::{router, AppState, JwtConfig, JwtService};

pub struct TestApp {
    pub router: Router,
    pub chat_service: Arc<ChatService>,
    pub storage: Arc<MemoryStorage>,
    pub registry: Arc<ConnectionRegistry>,
    pub clock: Arc<ManualClock>,
    pub jwt: Arc<JwtService>,
}

pub struct TestUser {
    pub id: Uuid,
    pub token: String,
}

impl TestApp {
    /// 基于内存存储构建完整的路由
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 11, 3, 18, 0, 0).unwrap(),
        ));
        let storage = Arc::new(MemoryStorage::new(clock.clone()));
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(DeliveryDispatcher::new(
            registry.clone(),
            Duration::from_millis(500),
        ));

        let chat_service = ChatService::new(ChatServiceDependencies {
            message_repository: storage.clone(),
            user_repository: storage.clone(),
            dispatcher,
            limits: PageLimits {
                chat_list: 20,
                history: 50,
                search: 2,
                max_search: 10,
            },
        });

        let jwt = Arc::new(JwtService::new(
            JwtConfig {
                secret: "integration-test-secret-key-32-characters".to_string(),
                expiration_hours: 24,
            },
            storage.clone(),
        ));

        let chat_service = Arc::new(chat_service);
        let state = AppState::new(chat_service.clone(), registry.clone(), jwt.clone(), 16);

        Self {
            router: router(state),
            chat_service,
            storage,
            registry,
            clock,
            jwt,
        }
    }

    pub async fn add_user(&self, name: &str) -> TestUser {
        let id = Uuid::new_v4();
        self.storage
            .add_user(User::new(
                UserId::from(id),
                Username::parse(name).unwrap(),
                format!("{name}@example.com"),
            ))
            .await;
        let token = self.jwt.generate_token(id).unwrap();
        TestUser { id, token }
    }

    /// 在随机端口上启动服务，返回地址和关闭信号
    pub async fn spawn(&self) -> (SocketAddr, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = self.router.clone();

        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        (addr, shutdown_tx)
    }

    /// 等待用户的连接出现在注册表中
    pub async fn wait_registered(&self, user_id: Uuid) {
        let user_id = UserId::from(user_id);
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.registry.lookup(user_id).await.is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection registered");
    }
}

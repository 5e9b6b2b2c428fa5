use std::sync::Arc;

use application::repository::{MessageRepository, UserRepository};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use crate::{
    migrations::MIGRATOR,
    repository::{create_pg_pool, PgStorage},
};

/// 数据库连接参数，由 main 从应用配置转换而来
#[derive(Debug, Clone)]
pub struct InfrastructureConfig {
    pub database_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// 启动时组装好的存储层
#[derive(Clone)]
pub struct Infrastructure {
    storage: Arc<PgStorage>,
}

impl Infrastructure {
    /// 建立连接池并执行迁移，迁移失败时不启动服务。
    pub async fn connect(config: InfrastructureConfig) -> Result<Self, InfrastructureError> {
        let pool = create_pg_pool(&config.database_url, config.max_connections).await?;
        MIGRATOR.run(&pool).await?;

        let host = config
            .database_url
            .rsplit('@')
            .next()
            .unwrap_or("unknown");
        info!(%host, max_connections = config.max_connections, "数据库已连接，迁移完成");

        Ok(Self {
            storage: Arc::new(PgStorage::new(pool)),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.storage.pool
    }

    pub fn message_repository(&self) -> Arc<dyn MessageRepository> {
        self.storage.message_repository.clone()
    }

    pub fn user_repository(&self) -> Arc<dyn UserRepository> {
        self.storage.user_repository.clone()
    }
}

use async_trait::async_trait;
use domain::User;

use crate::error::ApplicationError;

/// 身份提供方：把客户端携带的凭证解析为已存在的用户。
///
/// 凭证的签发不属于本服务，这里只做校验。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// 凭证无效、过期或用户不存在时返回 `ApplicationError::Authentication`。
    async fn verify_credential(&self, credential: &str) -> Result<User, ApplicationError>;
}

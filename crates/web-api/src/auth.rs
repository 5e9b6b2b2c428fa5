//! JWT 认证模块
//!
//! 校验身份服务签发的 access token（HS256，`sub` 为用户 ID，`type` 为 `access`），
//! 并提供从请求头提取当前用户的 extractor。

use std::sync::Arc;

use application::{ApplicationError, IdentityProvider, UserRepository};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use config::JwtConfig;
use domain::{User, UserId};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

const ACCESS_TOKEN_TYPE: &str = "access";

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(rename = "type")]
    pub token_type: String,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    users: Arc<dyn UserRepository>,
}

impl JwtService {
    pub fn new(config: JwtConfig, users: Arc<dyn UserRepository>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
            users,
        }
    }

    /// 生成 access token，供运维工具和测试使用
    pub fn generate_token(&self, user_id: Uuid) -> Result<String, ApplicationError> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            sub: user_id,
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| {
                ApplicationError::authentication(format!("Token generation failed: {err}"))
            })
    }

    /// 验证并解析 JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApplicationError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| ApplicationError::authentication(format!("Invalid token: {err}")))?;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(ApplicationError::authentication("Invalid token type"));
        }
        Ok(claims)
    }
}

#[async_trait]
impl IdentityProvider for JwtService {
    async fn verify_credential(&self, credential: &str) -> Result<User, ApplicationError> {
        let claims = self.verify_token(credential)?;
        self.users
            .find_by_id(UserId::from(claims.sub))
            .await?
            .ok_or_else(|| ApplicationError::authentication("User not found"))
    }
}

/// 从 headers 中提取 Bearer token
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))
}

/// 已认证的当前用户
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let user = state.identity.verify_credential(token).await?;
        Ok(CurrentUser(user))
    }
}

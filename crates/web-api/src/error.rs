use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, RepositoryError};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub detail: Value,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, detail: impl Into<Value>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                detail: detail.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message.into())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// 领域错误的 `detail`：需要指出缺失用户时为 `{message, not_found_id}`，否则为文本。
pub fn domain_detail(error: &DomainError) -> Value {
    match error.not_found_id() {
        Some(id) => json!({
            "message": error.to_string(),
            "not_found_id": id,
        }),
        None => Value::String(error.to_string()),
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;

        match error {
            AppErr::Domain(err) => {
                let (status, code) = match &err {
                    DomainError::SelfMessage => (StatusCode::BAD_REQUEST, "SELF_MESSAGE"),
                    DomainError::SameParticipant => (StatusCode::BAD_REQUEST, "SAME_PARTICIPANT"),
                    DomainError::RecipientNotFound { .. } => {
                        (StatusCode::BAD_REQUEST, "RECIPIENT_NOT_FOUND")
                    }
                    DomainError::ParticipantsNotFound => {
                        (StatusCode::NOT_FOUND, "PARTICIPANTS_NOT_FOUND")
                    }
                    DomainError::ParticipantNotFound { .. } => {
                        (StatusCode::BAD_REQUEST, "PARTICIPANT_NOT_FOUND")
                    }
                    DomainError::NoSearchResults => (StatusCode::NOT_FOUND, "USERS_NOT_FOUND"),
                    DomainError::Validation { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
                    }
                };
                ApiError::new(status, code, domain_detail(&err))
            }
            AppErr::Repository(repo_err) => match repo_err {
                RepositoryError::NotFound => ApiError::new(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "requested resource not found",
                ),
                RepositoryError::IntegrityViolation { .. } | RepositoryError::Storage { .. } => {
                    tracing::error!(error = %repo_err, "存储不可用");
                    ApiError::new(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "STORAGE_UNAVAILABLE",
                        "storage is temporarily unavailable",
                    )
                }
            },
            AppErr::Authentication(reason) => {
                tracing::debug!(%reason, "认证失败");
                ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    "AUTHENTICATION_FAILED",
                    "Could not validate credentials",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

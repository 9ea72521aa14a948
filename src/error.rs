use std::io;

use axum::{Json, extract::multipart::MultipartError, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub type Result<T> = core::result::Result<T, Error>;

/// 业务错误分类
///
/// 对应 HTTP 状态码：400 / 401 / 404 / 409。
/// 所有权校验失败一律返回 [`ApiError::NotFound`]，不泄露资源是否存在。
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid or expired OTP. Please request a new one")]
    InvalidOrExpiredOtp,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidOrExpiredOtp => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    PasswordHash(#[from] argon2::password_hash::Error),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    ApiError(#[from] ApiError),
}

/// 统一的错误响应体：`{status, statusCode, message}`
fn error_body(status: &str, code: StatusCode, message: String) -> axum::response::Response {
    (
        code,
        Json(json!({
            "status": status,
            "statusCode": code.as_u16(),
            "message": message,
        })),
    )
        .into_response()
}

/// 非业务错误不向客户端暴露细节
fn internal() -> axum::response::Response {
    error_body(
        "error",
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong!".to_string(),
    )
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        match self {
            Error::ApiError(api_error) => {
                let code = api_error.status_code();
                error_body("fail", code, api_error.to_string())
            }
            Error::Multipart(e) => error_body("fail", StatusCode::BAD_REQUEST, e.to_string()),
            Error::Sqlx(e) => {
                tracing::error!(%e, "sqlx error");
                internal()
            }
            Error::Reqwest(e) => {
                tracing::error!(%e, "upstream http error");
                internal()
            }
            Error::Jwt(e) => {
                tracing::error!(%e, "jwt error");
                internal()
            }
            Error::PasswordHash(e) => {
                tracing::error!(%e, "password hash error");
                internal()
            }
            Error::Io(e) => {
                tracing::error!(%e, "file io error");
                internal()
            }
        }
    }
}

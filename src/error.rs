use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::{error_codes, error_to_api_response};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("数据库错误: {0}")]
    Database(sqlx::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// 仍被 PROTECT 外键引用，不能删除
    #[error("{0}")]
    Protected(String),

    #[error("未授权访问")]
    Unauthorized,

    #[error("权限不足")]
    Forbidden,

    #[error("请求过于频繁，请在{0}秒后重试")]
    RateLimited(u64),

    #[error("令牌错误: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("密码哈希失败: {0}")]
    Password(#[from] bcrypt::BcryptError),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: &str, id: i32) -> Self {
        AppError::NotFound(format!("{} {} 不存在", what, id))
    }

    /// 删除语句的错误：外键冲突只可能是仍被 PROTECT 引用
    pub fn on_delete(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
                return AppError::Protected(format!(
                    "记录仍被引用，无法删除: {}",
                    db.constraint().unwrap_or("unknown")
                ));
            }
        }
        AppError::from(err)
    }

    fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
            AppError::Conflict(_) => (StatusCode::CONFLICT, error_codes::CONFLICT),
            AppError::Protected(_) => (StatusCode::CONFLICT, error_codes::PROTECTED),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED),
            AppError::Forbidden => (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED),
            AppError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, error_codes::RATE_LIMIT),
            AppError::Database(_)
            | AppError::Token(_)
            | AppError::Password(_)
            | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
            ),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return AppError::NotFound("记录不存在".into());
        }

        if let sqlx::Error::Database(db) = &err {
            let constraint = db.constraint().unwrap_or("unknown").to_string();
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    return AppError::Conflict(format!("违反唯一约束: {}", constraint));
                }
                // 插入/更新时引用的记录不存在；删除语句走 on_delete
                Some(FOREIGN_KEY_VIOLATION) => {
                    return AppError::NotFound(format!("引用的记录不存在: {}", constraint));
                }
                _ => {}
            }
        }

        AppError::Database(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("请求体无效: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(format!("路径参数无效: {}", rejection.body_text()))
    }
}

/// 5xx 的内部错误细节，放在响应扩展里交给 log_errors 记录
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // 不向客户端暴露内部错误细节
        if status.is_server_error() {
            let detail = ErrorDetail(format!("{:?}", self));
            let mut response =
                (status, error_to_api_response::<()>(code, "内部服务器错误".to_string()))
                    .into_response();
            response.extensions_mut().insert(detail);
            return response;
        }

        (status, error_to_api_response::<()>(code, self.to_string())).into_response()
    }
}

//! 字段校验，对应数据库列的长度与非空约束。

use crate::error::AppError;

pub const USERNAME_MAX_LEN: usize = 200;
pub const NAME_MAX_LEN: usize = 200;
pub const EMAIL_MAX_LEN: usize = 200;
pub const TEXT_MAX_LEN: usize = 255;

/// 用户名只允许字母、数字和 `@ . + - _`
pub fn validate_username(username: &str) -> Result<(), AppError> {
    if username.trim().is_empty() {
        return Err(AppError::Validation("用户名不能为空".into()));
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(AppError::Validation(format!(
            "用户名长度不能超过{}个字符",
            USERNAME_MAX_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(AppError::Validation(
            "用户名格式无效，只允许使用字母、数字和 @/./+/-/_".into(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.chars().count() > EMAIL_MAX_LEN {
        return Err(AppError::Validation(format!(
            "邮箱长度不能超过{}个字符",
            EMAIL_MAX_LEN
        )));
    }

    let valid = match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && (domain.contains('.') || domain == "localhost")
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("邮箱格式无效: {}", email)))
    }
}

/// 空字符串视为未填写，存为 NULL
pub fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}

/// 非空（去除空白后）且不超过 `max_len` 个字符
pub fn validate_required_text(field: &str, value: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{}不能为空", field)));
    }
    validate_max_len(field, value, max_len)
}

pub fn validate_max_len(field: &str, value: &str, max_len: usize) -> Result<(), AppError> {
    if value.chars().count() > max_len {
        return Err(AppError::Validation(format!(
            "{}长度不能超过{}个字符",
            field, max_len
        )));
    }
    Ok(())
}

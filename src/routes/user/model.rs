use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;
use crate::utils::validation::{
    NAME_MAX_LEN, normalize_email, validate_email, validate_max_len, validate_username,
};
use crate::utils::{hash_password, verify_password};

/// 用于登录的字段
pub const USERNAME_FIELD: &str = "username";
/// 创建超级用户时除用户名和密码外必须提供的字段
pub const REQUIRED_FIELDS: &[&str] = &["email"];

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, password_hash, \
                            is_staff, is_superuser, is_active, last_login, date_joined";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    /// NULL 表示不可用的密码，任何密码都无法通过校验
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

/// 创建用户的参数；`is_*` 为 None 时由创建方式决定默认值
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: Option<bool>,
    #[serde(default)]
    pub is_superuser: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserFlags {
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: Option<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            email,
            password,
            ..Default::default()
        }
    }

    /// 普通用户：is_staff / is_superuser 默认为 false
    pub fn regular_flags(&self) -> UserFlags {
        UserFlags {
            is_staff: self.is_staff.unwrap_or(false),
            is_superuser: self.is_superuser.unwrap_or(false),
            is_active: self.is_active.unwrap_or(true),
        }
    }

    /// 超级用户：is_staff / is_superuser 默认为 true，显式设为 false 时报错
    pub fn superuser_flags(&self) -> Result<UserFlags, AppError> {
        let is_staff = self.is_staff.unwrap_or(true);
        let is_superuser = self.is_superuser.unwrap_or(true);

        if !is_staff {
            return Err(AppError::Validation(
                "Superuser must have is_staff=True.".into(),
            ));
        }
        if !is_superuser {
            return Err(AppError::Validation(
                "Superuser must have is_superuser=True.".into(),
            ));
        }

        Ok(UserFlags {
            is_staff,
            is_superuser,
            is_active: self.is_active.unwrap_or(true),
        })
    }

    fn validate(&mut self) -> Result<(), AppError> {
        validate_username(&self.username)?;
        validate_max_len("名", &self.first_name, NAME_MAX_LEN)?;
        validate_max_len("姓", &self.last_name, NAME_MAX_LEN)?;
        self.email = normalize_email(self.email.take());
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl From<RegisterRequest> for NewUser {
    fn from(req: RegisterRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            password: Some(req.password),
            first_name: req.first_name,
            last_name: req.last_name,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub user: User,
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// 传空字符串清空邮箱
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl User {
    pub async fn create_user(pool: &PgPool, new: NewUser) -> Result<Self, AppError> {
        let flags = new.regular_flags();
        Self::insert(pool, new, flags).await
    }

    pub async fn create_superuser(pool: &PgPool, new: NewUser) -> Result<Self, AppError> {
        let flags = new.superuser_flags()?;
        Self::insert(pool, new, flags).await
    }

    /// 先插入记录，再通过 set_password 设置密码，二者在同一事务中
    async fn insert(pool: &PgPool, mut new: NewUser, flags: UserFlags) -> Result<Self, AppError> {
        new.validate()?;

        let sql = format!(
            r#"
            INSERT INTO users (username, first_name, last_name, email,
                               is_staff, is_superuser, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let mut tx = pool.begin().await?;

        let result = sqlx::query_as::<_, User>(&sql)
            .bind(&new.username)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.email)
            .bind(flags.is_staff)
            .bind(flags.is_superuser)
            .bind(flags.is_active)
            .fetch_one(&mut *tx)
            .await;

        let mut user = match result {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("Failed to create user {}: {:?}", new.username, e);
                return Err(e.into());
            }
        };

        user.set_password(new.password.as_deref())?;
        user.store_password(&mut *tx).await?;
        tx.commit().await?;

        tracing::info!(
            "Created user: {} (staff: {}, superuser: {}, usable password: {})",
            user,
            user.is_staff,
            user.is_superuser,
            user.has_usable_password()
        );
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    /// 按自然键（用户名）查找
    pub async fn get_by_natural_key(pool: &PgPool, username: &str) -> Result<Option<Self>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, AppError> {
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?;
        Ok(users)
    }

    /// 保存可修改的字段（不含密码）
    pub async fn save(&self, pool: &PgPool) -> Result<Self, AppError> {
        validate_username(&self.username)?;
        validate_max_len("名", &self.first_name, NAME_MAX_LEN)?;
        validate_max_len("姓", &self.last_name, NAME_MAX_LEN)?;
        let email = normalize_email(self.email.clone());
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let sql = format!(
            r#"
            UPDATE users
            SET username = $1, first_name = $2, last_name = $3, email = $4,
                is_staff = $5, is_superuser = $6, is_active = $7
            WHERE id = $8
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(&self.username)
            .bind(&self.first_name)
            .bind(&self.last_name)
            .bind(&email)
            .bind(self.is_staff)
            .bind(self.is_superuser)
            .bind(self.is_active)
            .bind(self.id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("用户", self.id))
    }

    /// 设置密码；None 表示设为不可用密码
    pub fn set_password(&mut self, raw: Option<&str>) -> Result<(), AppError> {
        self.password_hash = raw.map(hash_password).transpose()?;
        Ok(())
    }

    pub fn check_password(&self, raw: &str) -> bool {
        match &self.password_hash {
            Some(hash) => verify_password(raw, hash).unwrap_or_else(|e| {
                tracing::warn!("Stored password hash for {} is invalid: {}", self.username, e);
                false
            }),
            None => false,
        }
    }

    pub fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// 修改密码并保存；None 表示设为不可用密码
    pub async fn update_password(
        &mut self,
        pool: &PgPool,
        raw: Option<&str>,
    ) -> Result<(), AppError> {
        self.set_password(raw)?;
        self.store_password(pool).await
    }

    async fn store_password<'e, E>(&self, executor: E) -> Result<(), AppError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(&self.password_hash)
            .bind(self.id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("用户", self.id));
        }
        Ok(())
    }

    pub async fn set_active(pool: &PgPool, id: i32, is_active: bool) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET is_active = $1 WHERE id = $2")
            .bind(is_active)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("用户", id));
        }
        Ok(())
    }

    pub async fn record_login(pool: &PgPool, id: i32) -> Result<DateTime<Utc>, AppError> {
        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(now)
    }

    /// 仍拥有订单的用户无法删除（PROTECT）
    pub async fn delete(pool: &PgPool, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::on_delete)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("用户", id));
        }
        tracing::info!("Deleted user: {}", id);
        Ok(())
    }

    /// 活跃的超级用户拥有全部权限，停用用户没有任何权限
    pub fn has_perm(&self, _perm: &str) -> bool {
        self.is_active && self.is_superuser
    }

    /// 菜单和菜品的写操作需要后台人员身份
    pub fn can_manage_catalogue(&self) -> bool {
        self.is_active && (self.is_staff || self.is_superuser)
    }
}

#[cfg(test)]
pub(crate) fn sample_user(id: i32, username: &str) -> User {
    User {
        id,
        username: username.to_string(),
        first_name: String::new(),
        last_name: String::new(),
        email: None,
        password_hash: None,
        is_staff: false,
        is_superuser: false,
        is_active: true,
        last_login: None,
        date_joined: Utc::now(),
    }
}

use chrono::{DateTime, Local};
use uuid::Uuid;

use super::{ActivityRow, DBPool, UserRow};

/// 新用户插入参数
#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub password_hash: &'a str,
    pub preferences: &'a [String],
    pub verification_otp: &'a str,
    pub otp_expiry: DateTime<Local>,
}

/// 用户相关的数据库操作接口
///
/// 覆盖注册、OTP 生命周期、资料与偏好更新。
pub trait UserStore: Send + Sync {
    type Error;

    /// 按 id 查询用户
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<UserRow>, Self::Error>>;

    /// 按邮箱查询用户
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserRow>, Self::Error>>;

    /// 按邮箱或手机号查询用户，注册查重用
    fn find_by_email_or_phone(
        &self,
        email: &str,
        phone: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserRow>, Self::Error>>;

    /// 插入新用户，返回完整行
    fn insert_user(
        &self,
        new: NewUser<'_>,
    ) -> impl std::future::Future<Output = Result<UserRow, Self::Error>>;

    /// 原地刷新未验证的待注册记录：姓名、密码、偏好与新 OTP
    fn refresh_pending_registration(
        &self,
        id: Uuid,
        name: &str,
        password_hash: &str,
        preferences: &[String],
        otp: &str,
        otp_expiry: DateTime<Local>,
    ) -> impl std::future::Future<Output = Result<(), Self::Error>>;

    /// 重置注册验证 OTP
    fn set_verification_otp(
        &self,
        id: Uuid,
        otp: &str,
        otp_expiry: DateTime<Local>,
    ) -> impl std::future::Future<Output = Result<(), Self::Error>>;

    /// 标记邮箱已验证并清除 OTP 列，OTP 一次性使用
    fn mark_verified(&self, id: Uuid)
    -> impl std::future::Future<Output = Result<(), Self::Error>>;

    /// 设置密码重置 OTP
    fn set_reset_otp(
        &self,
        id: Uuid,
        otp: &str,
        otp_expiry: DateTime<Local>,
    ) -> impl std::future::Future<Output = Result<(), Self::Error>>;

    /// 更新密码哈希并清除重置 OTP
    fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> impl std::future::Future<Output = Result<(), Self::Error>>;

    /// 更新资料字段，`None` 表示保持原值
    fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Option<UserRow>, Self::Error>>;

    /// 整体替换偏好分类列表
    fn update_preferences(
        &self,
        id: Uuid,
        preferences: &[String],
    ) -> impl std::future::Future<Output = Result<Option<UserRow>, Self::Error>>;

    /// 查询用户的反馈活动，按时间倒序
    fn activity(
        &self,
        user_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ActivityRow>, Self::Error>>;
}

impl UserStore for DBPool {
    type Error = sqlx::Error;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self)
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self)
            .await
    }

    async fn find_by_email_or_phone(
        &self,
        email: &str,
        phone: &str,
    ) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1 OR phone = $2 LIMIT 1")
            .bind(email)
            .bind(phone)
            .fetch_optional(self)
            .await
    }

    async fn insert_user(&self, new: NewUser<'_>) -> Result<UserRow, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users
                (id, name, email, phone, password_hash, preferences, verification_otp, otp_expiry)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.name)
        .bind(new.email)
        .bind(new.phone)
        .bind(new.password_hash)
        .bind(new.preferences)
        .bind(new.verification_otp)
        .bind(new.otp_expiry)
        .fetch_one(self)
        .await
    }

    async fn refresh_pending_registration(
        &self,
        id: Uuid,
        name: &str,
        password_hash: &str,
        preferences: &[String],
        otp: &str,
        otp_expiry: DateTime<Local>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET name = $2,
                password_hash = $3,
                preferences = $4,
                verification_otp = $5,
                otp_expiry = $6
            WHERE id = $1 AND verified = FALSE
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(password_hash)
        .bind(preferences)
        .bind(otp)
        .bind(otp_expiry)
        .execute(self)
        .await?;
        Ok(())
    }

    async fn set_verification_otp(
        &self,
        id: Uuid,
        otp: &str,
        otp_expiry: DateTime<Local>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET verification_otp = $2, otp_expiry = $3 WHERE id = $1")
            .bind(id)
            .bind(otp)
            .bind(otp_expiry)
            .execute(self)
            .await?;
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET verified = TRUE, verification_otp = NULL, otp_expiry = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self)
        .await?;
        Ok(())
    }

    async fn set_reset_otp(
        &self,
        id: Uuid,
        otp: &str,
        otp_expiry: DateTime<Local>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET reset_otp = $2, reset_otp_expiry = $3 WHERE id = $1")
            .bind(id)
            .bind(otp)
            .bind(otp_expiry)
            .execute(self)
            .await?;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, reset_otp = NULL, reset_otp_expiry = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(self)
        .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name), phone = COALESCE($3, phone)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(phone)
        .fetch_optional(self)
        .await
    }

    async fn update_preferences(
        &self,
        id: Uuid,
        preferences: &[String],
    ) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(
            "UPDATE users SET preferences = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(preferences)
        .fetch_optional(self)
        .await
    }

    async fn activity(&self, user_id: Uuid) -> Result<Vec<ActivityRow>, sqlx::Error> {
        sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT f.article_id, a.title AS article_title, f.reaction, f.created_at
            FROM feedback f
            INNER JOIN articles a ON f.article_id = a.id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self)
        .await
    }
}

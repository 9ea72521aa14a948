use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Message, auth::validate_categories};
use crate::{
    auth::{AuthUser, hash_password, verify_password},
    category,
    error::{ApiError, Result},
    state::AppState,
    storage::{ActivityRow, DBPool, UserRow, UserStore},
};

/// 配置用户资料相关路由，全部要求已验证会话。
///
/// - `GET|PUT /profile`：资料
/// - `GET|PUT /preferences`：偏好分类
/// - `PUT /password`：修改密码
/// - `GET /activity`：反馈活动记录
/// - `GET /categories`：固定分类集合
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/preferences", get(preferences).put(update_preferences))
        .route("/password", put(change_password))
        .route("/activity", get(activity))
        .route("/categories", get(category_list))
}

/// 用户资料响应体，不携带密码哈希与 OTP 列
#[derive(Debug, Serialize)]
pub struct ProfileDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub preferences: Vec<String>,
    pub verified: bool,
    pub created_at: i64,
}

impl From<UserRow> for ProfileDto {
    fn from(u: UserRow) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            phone: u.phone,
            preferences: u.preferences,
            verified: u.verified,
            created_at: u.created_at.timestamp_millis(),
        }
    }
}

async fn profile(AuthUser(user): AuthUser) -> Json<ProfileDto> {
    Json(user.into())
}

#[derive(Debug, Deserialize)]
struct UpdateProfileRequest {
    name: Option<String>,
    phone: Option<String>,
}

/// 更新姓名和/或手机号，未提供的字段保持原值。
async fn update_profile(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileDto>> {
    let updated = pool
        .update_profile(
            user.id,
            req.name.as_deref().filter(|s| !s.trim().is_empty()),
            req.phone.as_deref().filter(|s| !s.trim().is_empty()),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(updated.into()))
}

#[derive(Debug, Serialize)]
struct PreferencesDto {
    preferences: Vec<String>,
}

async fn preferences(AuthUser(user): AuthUser) -> Json<PreferencesDto> {
    Json(PreferencesDto {
        preferences: user.preferences,
    })
}

#[derive(Debug, Deserialize)]
struct UpdatePreferencesRequest {
    preferences: Vec<String>,
}

/// 整体替换偏好分类列表。
async fn update_preferences(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    Json(req): Json<UpdatePreferencesRequest>,
) -> Result<Json<ProfileDto>> {
    validate_categories(&req.preferences)?;

    let updated = pool
        .update_preferences(user.id, &req.preferences)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(updated.into()))
}

#[derive(Debug, Deserialize)]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

/// 修改密码，需要提供当前密码。
async fn change_password(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<Message>> {
    if req.current_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::Validation(
            "Please provide current password and new password".to_string(),
        )
        .into());
    }

    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(
            ApiError::Unauthorized("Current password is incorrect".to_string()).into(),
        );
    }

    let password_hash = hash_password(&req.new_password)?;
    pool.update_password(user.id, &password_hash).await?;

    Ok(Json(Message::new("Password changed successfully")))
}

#[derive(Debug, Serialize)]
struct ActivityDto {
    article_id: Uuid,
    article_title: String,
    reaction: String,
    created_at: i64,
}

impl From<ActivityRow> for ActivityDto {
    fn from(a: ActivityRow) -> Self {
        Self {
            article_id: a.article_id,
            article_title: a.article_title,
            reaction: a.reaction,
            created_at: a.created_at.timestamp_millis(),
        }
    }
}

/// 调用者的反馈活动记录，按时间倒序。
async fn activity(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
) -> Result<Json<Vec<ActivityDto>>> {
    let rows = pool.activity(user.id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

async fn category_list() -> Json<Vec<&'static str>> {
    Json(category::CATEGORIES.to_vec())
}

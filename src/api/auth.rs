use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use super::{Message, users::ProfileDto};
use crate::{
    auth::{
        Keys, Session, generate_otp, hash_password, otp_expiry, otp_valid, removal_cookie,
        session_cookie, verify_password,
    },
    category,
    error::{ApiError, Result},
    mail::Mailer,
    state::AppState,
    storage::{DBPool, NewUser, UserStore},
};

/// 配置认证相关路由。
///
/// 公开路由：
/// - `POST /register`：注册并发送验证 OTP
/// - `POST /login`：登录，下发会话 cookie
/// - `POST /forgot-password`：发送密码重置 OTP
/// - `POST /reset-password`：凭 OTP 重置密码
/// - `POST /resend-verification`：重发验证 OTP
///
/// 受保护路由（允许未验证用户）：
/// - `POST /verify-email`：消费 OTP，标记已验证
/// - `POST /logout`：清除会话 cookie
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/verify-email", post(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/resend-verification", post(resend_verification))
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    message: String,
    user: ProfileDto,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    phone: String,
    password: String,
    #[serde(default)]
    preferences: Vec<String>,
}

/// 注册新账号。
///
/// 已验证的邮箱/手机号重复返回 `Conflict`；
/// 同邮箱的未验证待注册记录被原地更新并刷新 OTP。
/// OTP 邮件投递失败不会使注册失败。
async fn register(
    State(pool): State<DBPool>,
    State(keys): State<Keys>,
    State(mailer): State<Mailer>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    if req.name.trim().is_empty()
        || req.email.trim().is_empty()
        || req.phone.trim().is_empty()
        || req.password.is_empty()
    {
        return Err(
            ApiError::Validation("Please provide all required fields".to_string()).into(),
        );
    }
    validate_categories(&req.preferences)?;

    if let Some(existing) = pool.find_by_email_or_phone(&req.email, &req.phone).await? {
        if existing.verified {
            return Err(ApiError::Conflict(
                "User already exists with this email or phone number".to_string(),
            )
            .into());
        }
        if existing.email != req.email {
            // 待注册记录是别人的手机号占位，不能原地接管
            return Err(
                ApiError::Conflict("Phone number already in use".to_string()).into(),
            );
        }

        let password_hash = hash_password(&req.password)?;
        let otp = generate_otp();
        pool.refresh_pending_registration(
            existing.id,
            &req.name,
            &password_hash,
            &req.preferences,
            &otp,
            otp_expiry(),
        )
        .await?;
        mailer.send_otp(&req.email, &otp).await;

        let user = pool
            .find_by_id(existing.id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
        let token = keys.issue(user.id)?;

        return Ok((
            StatusCode::OK,
            jar.add(session_cookie(token)),
            Json(AuthResponse {
                message: "Account updated! Please verify your email with the new OTP sent."
                    .to_string(),
                user: user.into(),
            }),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let otp = generate_otp();

    let user = pool
        .insert_user(NewUser {
            name: req.name.trim(),
            email: req.email.trim(),
            phone: req.phone.trim(),
            password_hash: &password_hash,
            preferences: &req.preferences,
            verification_otp: &otp,
            otp_expiry: otp_expiry(),
        })
        .await?;

    mailer.send_otp(&user.email, &otp).await;

    let token = keys.issue(user.id)?;

    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(token)),
        Json(AuthResponse {
            message: "Registration successful! Please verify your email with the OTP sent."
                .to_string(),
            user: user.into(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// 邮箱 + 密码登录，成功后下发 7 天有效的会话 cookie。
async fn login(
    State(pool): State<DBPool>,
    State(keys): State<Keys>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(
            ApiError::Validation("Please provide both email and password".to_string()).into(),
        );
    }

    let user = pool
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not registered. Please sign up.".to_string()))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Incorrect password.".to_string()).into());
    }

    let token = keys.issue(user.id)?;

    Ok((
        jar.add(session_cookie(token)),
        Json(AuthResponse {
            message: "Login successful".to_string(),
            user: user.into(),
        }),
    ))
}

/// 清除会话 cookie。
async fn logout(_session: Session, jar: CookieJar) -> (CookieJar, Json<Message>) {
    (
        jar.remove(removal_cookie()),
        Json(Message::new("Logged out successfully")),
    )
}

#[derive(Debug, Deserialize)]
struct VerifyEmailRequest {
    otp: String,
}

/// 消费验证 OTP，标记邮箱已验证。
///
/// OTP 一次性使用：不匹配或超过 10 分钟有效期都返回
/// [`ApiError::InvalidOrExpiredOtp`]。
async fn verify_email(
    Session(user): Session,
    State(pool): State<DBPool>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<AuthResponse>> {
    if req.otp.trim().is_empty() {
        return Err(ApiError::Validation("Please provide the OTP".to_string()).into());
    }
    if user.verified {
        return Err(ApiError::Validation("Email is already verified".to_string()).into());
    }

    if !otp_valid(user.verification_otp.as_deref(), user.otp_expiry, &req.otp) {
        return Err(ApiError::InvalidOrExpiredOtp.into());
    }

    pool.mark_verified(user.id).await?;

    let mut profile: ProfileDto = user.into();
    profile.verified = true;

    Ok(Json(AuthResponse {
        message: "Email verified successfully".to_string(),
        user: profile,
    }))
}

#[derive(Debug, Deserialize)]
struct EmailRequest {
    email: String,
}

/// 发送密码重置 OTP。重置 OTP 与注册验证 OTP 相互独立。
async fn forgot_password(
    State(pool): State<DBPool>,
    State(mailer): State<Mailer>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<Message>> {
    if req.email.trim().is_empty() {
        return Err(ApiError::Validation("Please provide email".to_string()).into());
    }

    let user = pool
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found with this email".to_string()))?;

    let otp = generate_otp();
    pool.set_reset_otp(user.id, &otp, otp_expiry()).await?;
    mailer.send_otp(&user.email, &otp).await;

    Ok(Json(Message::new("Password reset OTP sent to your email")))
}

#[derive(Debug, Deserialize)]
struct ResetPasswordRequest {
    email: String,
    otp: String,
    password: String,
}

/// 凭重置 OTP 设置新密码。
async fn reset_password(
    State(pool): State<DBPool>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<Message>> {
    if req.email.trim().is_empty() || req.otp.trim().is_empty() || req.password.is_empty() {
        return Err(
            ApiError::Validation("Please provide all required fields".to_string()).into(),
        );
    }

    let user = pool
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !otp_valid(user.reset_otp.as_deref(), user.reset_otp_expiry, &req.otp) {
        return Err(ApiError::InvalidOrExpiredOtp.into());
    }

    let password_hash = hash_password(&req.password)?;
    pool.update_password(user.id, &password_hash).await?;

    Ok(Json(Message::new("Password reset successful")))
}

/// 为未验证账号重发验证 OTP。
async fn resend_verification(
    State(pool): State<DBPool>,
    State(mailer): State<Mailer>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<Message>> {
    if req.email.trim().is_empty() {
        return Err(ApiError::Validation("Please provide email address".to_string()).into());
    }

    let user = pool
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.verified {
        return Err(
            ApiError::Validation("User is already verified, please login".to_string()).into(),
        );
    }

    let otp = generate_otp();
    pool.set_verification_otp(user.id, &otp, otp_expiry()).await?;
    mailer.send_otp(&user.email, &otp).await;

    Ok(Json(Message::new("Verification OTP resent to your email")))
}

/// 偏好分类合法性校验，注册与偏好更新共用
pub(crate) fn validate_categories(preferences: &[String]) -> Result<()> {
    for pref in preferences {
        if !category::is_valid(pref) {
            return Err(ApiError::Validation(format!("Invalid category: {pref}")).into());
        }
    }
    Ok(())
}

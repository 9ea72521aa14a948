use axum::{extract::FromRef, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;

use super::{Keys, USER_TOKEN};
use crate::{
    error::{ApiError, Error},
    storage::{DBPool, UserRow, UserStore},
};

/// 已登录会话：cookie 中的令牌验签通过且用户存在
///
/// 允许未验证邮箱的用户，verify-email 和 logout 用。
pub struct Session(pub UserRow);

/// 已登录且邮箱已验证的用户，其余受保护接口一律使用
pub struct AuthUser(pub UserRow);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    DBPool: FromRef<S>,
    Keys: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Error> {
        let jar = CookieJar::from_headers(&parts.headers);

        let token = jar
            .get(USER_TOKEN)
            .map(|c| c.value().to_owned())
            .ok_or_else(|| unauthorized("Not authorized, please login"))?;

        let keys = Keys::from_ref(state);
        let user_id = keys
            .verify(&token)
            .ok_or_else(|| unauthorized("Invalid or expired token, please login again"))?;

        let pool = DBPool::from_ref(state);
        let user = pool
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| unauthorized("User not found"))?;

        Ok(Session(user))
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    DBPool: FromRef<S>,
    Keys: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Error> {
        let Session(user) = Session::from_request_parts(parts, state).await?;

        if !user.verified {
            return Err(unauthorized("Please verify your email first"));
        }

        Ok(AuthUser(user))
    }
}

fn unauthorized(message: &str) -> Error {
    ApiError::Unauthorized(message.to_string()).into()
}

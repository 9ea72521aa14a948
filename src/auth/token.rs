use std::env;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Local};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// 会话 cookie 名称
pub const USER_TOKEN: &str = "user_token";

/// 会话有效期（天）
const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    exp: i64,
}

/// JWT 签名/验签密钥对，从同一个共享密钥派生
#[derive(Clone)]
pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// 从环境变量 `JWT_SECRET` 构建
    pub fn from_env() -> Self {
        let secret = env::var("JWT_SECRET").expect("环境变量: `JWT_SECRET`: NotPresent");
        Self::new(secret.as_bytes())
    }

    /// 为用户签发一个 7 天有效的令牌
    pub fn issue(&self, user_id: Uuid) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            exp: (Local::now() + Duration::days(SESSION_TTL_DAYS)).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// 验签并返回用户 id；签名错误或过期返回 `None`
    pub fn verify(&self, token: &str) -> Option<Uuid> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .ok()
            .map(|data| data.claims.sub)
    }
}

/// 构造 httpOnly 会话 cookie
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((USER_TOKEN, token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .build()
}

/// 构造用于清除会话的同名 cookie
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((USER_TOKEN, ""))
        .http_only(true)
        .path("/")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify() {
        let keys = Keys::new(b"test-secret");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id).unwrap();
        assert_eq!(keys.verify(&token), Some(user_id));
    }

    #[test]
    fn wrong_secret_rejected() {
        let keys = Keys::new(b"test-secret");
        let other = Keys::new(b"other-secret");
        let token = keys.issue(Uuid::new_v4()).unwrap();
        assert_eq!(other.verify(&token), None);
    }

    #[test]
    fn garbage_token_rejected() {
        let keys = Keys::new(b"test-secret");
        assert_eq!(keys.verify("not.a.jwt"), None);
    }
}

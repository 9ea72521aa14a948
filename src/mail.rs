use std::{env, sync::Arc};

use serde::Serialize;

/// OTP 邮件投递客户端
///
/// 通过 HTTP 邮件中继发送。投递是尽力而为的：
/// 失败只记日志，绝不让触发它的请求失败。
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    relay_url: Arc<str>,
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    to: &'a str,
    subject: &'a str,
    text: String,
}

impl Mailer {
    pub fn new(relay_url: impl AsRef<str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url: Arc::from(relay_url.as_ref()),
        }
    }

    /// 从环境变量 `MAIL_RELAY_URL` 构建
    pub fn from_env() -> Self {
        let url = env::var("MAIL_RELAY_URL").expect("环境变量: `MAIL_RELAY_URL`: NotPresent");
        Self::new(url)
    }

    /// 发送验证/重置 OTP
    pub async fn send_otp(&self, email: &str, otp: &str) {
        let body = MailRequest {
            to: email,
            subject: "Authentication OTP for Article Feeds",
            text: format!("Your OTP for authentication on Article Feeds is: {otp}"),
        };

        let result = self
            .client
            .post(self.relay_url.as_ref())
            .json(&body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        match result {
            Ok(_) => tracing::info!(email, "OTP mail sent"),
            Err(e) => tracing::error!(%e, email, "OTP mail delivery failed"),
        }
    }
}

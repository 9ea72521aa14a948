mod articles;
mod auth;
mod images;
mod users;

use std::env;

use axum::{Router, extract::DefaultBodyLimit};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// 请求体大小上限，对齐单张图片 10MB 的上传限制
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// 只有一句话要说的响应
#[derive(Debug, Serialize)]
pub(crate) struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 组装全部路由
///
/// - `/api/auth`：注册、登录、OTP 流程
/// - `/api/article`：文章 CRUD 与 Feedback Ledger 入口
/// - `/api/images`：个人图库
/// - `/api/user`：资料与偏好
pub fn setup_route(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth::setup_route())
        .nest("/api/article", articles::setup_route())
        .nest("/api/images", images::setup_route())
        .nest("/api/user", users::setup_route())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

pub async fn run_server(state: AppState) {
    let router = add_middlewares(setup_route(state));

    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    println!("Listening on {addr}");
    axum::serve(listener, router).await.unwrap();
}

fn add_middlewares(router: Router) -> Router {
    fn log_failure(
        err: tower_http::classify::ServerErrorsFailureClass,
        _latency: std::time::Duration,
        _span: &tracing::Span,
    ) {
        tracing::error!(error = %err, "request failed");
    }

    router.layer(TraceLayer::new_for_http().on_failure(log_failure))
}

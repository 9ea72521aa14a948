use axum::extract::FromRef;

use crate::{auth::Keys, blob::BlobStore, mail::Mailer, storage::DBPool};

/// 应用程序上下文
///
/// [`AppState`] 封装数据库连接池、JWT 密钥对与两个外部协作方客户端，
/// 提供统一访问入口；子状态通过 `FromRef` 提取。
#[derive(Clone, FromRef)]
pub struct AppState {
    pool: DBPool,
    keys: Keys,
    mailer: Mailer,
    blobs: BlobStore,
}

impl AppState {
    /// 创建一个新的 [`AppState`] 实例
    pub fn new(pool: DBPool, keys: Keys, mailer: Mailer, blobs: BlobStore) -> Self {
        Self {
            pool,
            keys,
            mailer,
            blobs,
        }
    }

    /// 获取数据库连接池
    pub fn pool(&self) -> &DBPool {
        &self.pool
    }

    /// 获取 JWT 密钥对
    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// 获取邮件客户端
    pub fn mailer(&self) -> &Mailer {
        &self.mailer
    }

    /// 获取图片存储客户端
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }
}

use std::{env, sync::Arc};

use axum::body::Bytes;
use serde::Deserialize;

use crate::error::Result;

/// 云图片存储客户端
///
/// 文章与图库只保存上传后返回的 URL，字节本身交给外部存储。
#[derive(Clone)]
pub struct BlobStore {
    client: reqwest::Client,
    base_url: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

impl BlobStore {
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
        }
    }

    /// 从环境变量 `BLOB_STORE_URL` 构建
    pub fn from_env() -> Self {
        let url = env::var("BLOB_STORE_URL").expect("环境变量: `BLOB_STORE_URL`: NotPresent");
        Self::new(url)
    }

    /// 上传一段字节，返回可公开访问的 URL
    ///
    /// `folder` 用于按用户隔离，如 `article-images/{user_id}`。
    pub async fn upload(
        &self,
        folder: &str,
        filename: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/upload", self.base_url))
            .query(&[("folder", folder), ("name", filename)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?
            .error_for_status()?
            .json::<UploadResponse>()
            .await?;

        Ok(resp.url)
    }

    /// 请求删除一个不再被引用的对象
    ///
    /// 尽力而为：删除失败记日志，不阻断触发它的请求。
    pub async fn delete(&self, url: &str) {
        let result = self
            .client
            .delete(format!("{}/object", self.base_url))
            .query(&[("url", url)])
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        if let Err(e) = result {
            tracing::error!(%e, url, "blob delete failed");
        }
    }
}

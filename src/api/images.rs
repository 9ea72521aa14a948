use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Message;
use crate::{
    auth::AuthUser,
    blob::BlobStore,
    error::{ApiError, Result},
    state::AppState,
    storage::{DBPool, ImageRow, ImageStore, NewImage},
};

/// 配置个人图库路由，全部要求已验证会话。
///
/// - `POST /upload`：批量上传，`titles` 与 `images` 一一对应
/// - `GET /`：按排序值升序列出
/// - `PUT /{id}`：改标题和/或换图
/// - `DELETE /{id}`：删除
/// - `POST /rearrange`：批量重排，单事务落盘
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/", get(image_list))
        .route("/upload", post(upload_images))
        .route("/{id}", put(update_image).delete(delete_image))
        .route("/rearrange", post(rearrange_images))
}

/// 图片响应体
#[derive(Debug, Serialize)]
pub struct ImageDto {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub order: i64,
    pub created_at: i64,
}

impl From<ImageRow> for ImageDto {
    fn from(i: ImageRow) -> Self {
        Self {
            id: i.id,
            title: i.title,
            url: i.url,
            order: i.ord,
            created_at: i.created_at.timestamp_millis(),
        }
    }
}

struct Upload {
    filename: String,
    content_type: String,
    bytes: Bytes,
}

/// 读取一个图片字段，校验内容类型
async fn read_image_field(field: axum::extract::multipart::Field<'_>) -> Result<Upload> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    if !content_type.starts_with("image/") {
        return Err(ApiError::Validation("Only image files are allowed".to_string()).into());
    }

    let filename = field.file_name().unwrap_or("image").to_string();
    let bytes = field.bytes().await?;
    Ok(Upload {
        filename,
        content_type,
        bytes,
    })
}

/// 批量上传图片。
///
/// `titles` 字段与 `images` 文件按出现顺序配对，数量必须一致；
/// 新图片的排序值从当前最大值之后续接。
async fn upload_images(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    State(blobs): State<BlobStore>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<ImageDto>>)> {
    let mut titles: Vec<String> = Vec::new();
    let mut uploads: Vec<Upload> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or_default() {
            "titles" => titles.push(field.text().await?),
            "images" => uploads.push(read_image_field(field).await?),
            _ => {}
        }
    }

    if uploads.is_empty() {
        return Err(
            ApiError::Validation("Please upload at least one image".to_string()).into(),
        );
    }
    if titles.len() != uploads.len() {
        return Err(ApiError::Validation(
            "Number of titles must match number of images".to_string(),
        )
        .into());
    }

    let start = pool.max_order(user.id).await?.map(|m| m + 1).unwrap_or(0);

    let folder = format!("stock-images/{}", user.id);
    let mut items = Vec::with_capacity(uploads.len());
    for (i, (title, up)) in titles.into_iter().zip(uploads).enumerate() {
        let url = blobs
            .upload(&folder, &up.filename, &up.content_type, up.bytes)
            .await?;
        items.push(NewImage {
            title,
            url,
            ord: start + i as i64,
        });
    }

    let rows = pool.insert_images(user.id, &items).await?;

    Ok((
        StatusCode::CREATED,
        Json(rows.into_iter().map(Into::into).collect()),
    ))
}

/// 调用者的图库，按排序值升序。
async fn image_list(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
) -> Result<Json<Vec<ImageDto>>> {
    let rows = pool.list_images(user.id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// 更新图片：可改标题，可换图（旧对象请求删除）。
async fn update_image(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    State(blobs): State<BlobStore>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<ImageDto>> {
    let not_found = || ApiError::NotFound("Image not found or not authorized".to_string());

    let image = pool.get_owned(id, user.id).await?.ok_or_else(not_found)?;

    let mut title: Option<String> = None;
    let mut replacement: Option<Upload> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or_default() {
            "title" => title = Some(field.text().await?),
            "image" => replacement = Some(read_image_field(field).await?),
            _ => {}
        }
    }

    let mut new_url: Option<String> = None;
    if let Some(up) = replacement {
        blobs.delete(&image.url).await;
        let folder = format!("stock-images/{}", user.id);
        new_url = Some(
            blobs
                .upload(&folder, &up.filename, &up.content_type, up.bytes)
                .await?,
        );
    }

    let updated = pool
        .update_image(
            id,
            user.id,
            title.as_deref().filter(|t| !t.trim().is_empty()),
            new_url.as_deref(),
        )
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(updated.into()))
}

/// 删除图片，先向存储请求删除对象。
async fn delete_image(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    State(blobs): State<BlobStore>,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>> {
    let image = pool
        .get_owned(id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found or not authorized".to_string()))?;

    blobs.delete(&image.url).await;
    pool.delete_image(id, user.id).await?;

    Ok(Json(Message::new("Image deleted successfully")))
}

#[derive(Debug, Deserialize)]
struct OrderItem {
    id: Uuid,
    order: i64,
}

#[derive(Debug, Deserialize)]
struct RearrangeRequest {
    orders: Vec<OrderItem>,
}

/// 批量重排。
///
/// 所有排序写入在一个事务中提交，只改调用者自己的行，
/// 然后返回重排后的完整列表。
async fn rearrange_images(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    Json(req): Json<RearrangeRequest>,
) -> Result<Json<Vec<ImageDto>>> {
    if req.orders.is_empty() {
        return Err(ApiError::Validation(
            "Please provide image order information".to_string(),
        )
        .into());
    }

    let orders: Vec<(Uuid, i64)> = req.orders.iter().map(|o| (o.id, o.order)).collect();
    pool.rearrange(user.id, &orders).await?;

    let rows = pool.list_images(user.id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

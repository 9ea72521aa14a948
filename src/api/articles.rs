use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    blob::BlobStore,
    category,
    error::{ApiError, Result},
    feedback::{self, Reaction},
    state::AppState,
    storage::{
        ArticleContentUpdate, ArticleRow, ArticleStore, ArticleWithAuthor, DBPool, NewArticle,
    },
};

/// 每篇文章的图片数量上限
const MAX_ARTICLE_IMAGES: usize = 5;

/// 配置文章相关路由，全部要求已验证会话。
///
/// - `GET /`：全部文章；`POST /`：创建（multipart，至多 5 张图）
/// - `GET /preferences`：偏好过滤的未屏蔽文章流
/// - `GET /my-articles`：作者视角列表，含已屏蔽
/// - `GET|PATCH|DELETE /{id}`：详情 / 更新 / 删除（级联 feedback）
/// - `POST /{id}/like`、`POST /{id}/dislike`：Feedback Ledger 入口
/// - `POST /{id}/block`：作者翻转屏蔽标记
/// - `GET /{id}/stats`：当前计数对
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/", get(article_list).post(create_article))
        .route("/preferences", get(preference_feed))
        .route("/my-articles", get(my_articles))
        .route(
            "/{id}",
            get(article_detail).patch(update_article).delete(delete_article),
        )
        .route("/{id}/like", post(like_article))
        .route("/{id}/dislike", post(dislike_article))
        .route("/{id}/block", post(block_article))
        .route("/{id}/stats", get(article_stats))
}

/// 文章响应体
#[derive(Debug, Serialize)]
pub struct ArticleDto {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub likes: i64,
    pub dislikes: i64,
    pub blocked: bool,
    pub created_by: Uuid,
    pub author_name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<ArticleWithAuthor> for ArticleDto {
    fn from(a: ArticleWithAuthor) -> Self {
        Self {
            id: a.id,
            title: a.title,
            description: a.description,
            category: a.category,
            tags: a.tags,
            images: a.images,
            likes: a.likes,
            dislikes: a.dislikes,
            blocked: a.blocked,
            created_by: a.created_by,
            author_name: Some(a.author_name),
            created_at: a.created_at.timestamp_millis(),
            updated_at: a.updated_at.timestamp_millis(),
        }
    }
}

impl From<ArticleRow> for ArticleDto {
    fn from(a: ArticleRow) -> Self {
        Self {
            id: a.id,
            title: a.title,
            description: a.description,
            category: a.category,
            tags: a.tags,
            images: a.images,
            likes: a.likes,
            dislikes: a.dislikes,
            blocked: a.blocked,
            created_by: a.created_by,
            author_name: None,
            created_at: a.created_at.timestamp_millis(),
            updated_at: a.updated_at.timestamp_millis(),
        }
    }
}

/// 待上传的图片字节
struct Upload {
    filename: String,
    content_type: String,
    bytes: Bytes,
}

/// 创建/更新共用的 multipart 表单
#[derive(Default)]
struct ArticleForm {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    tags: Option<Vec<String>>,
    remove_images: Option<Vec<String>>,
    uploads: Vec<Upload>,
}

/// 解析文章表单
///
/// `tags` 与 `remove_images` 是 JSON 数组字符串；
/// `images` 字段只接受 `image/*`，数量超限立即拒绝。
async fn parse_article_form(multipart: &mut Multipart) -> Result<ArticleForm> {
    let mut form = ArticleForm::default();

    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or_default() {
            "title" => form.title = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            "category" => form.category = Some(field.text().await?),
            "tags" => form.tags = Some(parse_json_list(&field.text().await?, "tags")?),
            "remove_images" => {
                form.remove_images =
                    Some(parse_json_list(&field.text().await?, "remove_images")?)
            }
            "images" => {
                if form.uploads.len() >= MAX_ARTICLE_IMAGES {
                    return Err(ApiError::Validation(format!(
                        "An article can have at most {MAX_ARTICLE_IMAGES} images"
                    ))
                    .into());
                }

                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                if !content_type.starts_with("image/") {
                    return Err(ApiError::Validation(
                        "Only image files are allowed".to_string(),
                    )
                    .into());
                }

                let filename = field.file_name().unwrap_or("image").to_string();
                let bytes = field.bytes().await?;
                form.uploads.push(Upload {
                    filename,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

fn parse_json_list(raw: &str, field: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|_| ApiError::Validation(format!("Invalid {field} format")).into())
}

/// 全部文章，带作者名，按创建时间倒序。
async fn article_list(
    _user: AuthUser,
    State(pool): State<DBPool>,
) -> Result<Json<Vec<ArticleDto>>> {
    let articles = pool.list_all().await?;
    Ok(Json(articles.into_iter().map(Into::into).collect()))
}

/// 偏好流：未屏蔽、分类命中调用者偏好集合的文章。
async fn preference_feed(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
) -> Result<Json<Vec<ArticleDto>>> {
    let articles = pool.list_by_preferences(&user.preferences).await?;
    Ok(Json(articles.into_iter().map(Into::into).collect()))
}

/// 调用者自己的文章，包含已屏蔽的。
async fn my_articles(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
) -> Result<Json<Vec<ArticleDto>>> {
    let articles = pool.list_by_author(user.id).await?;
    Ok(Json(articles.into_iter().map(Into::into).collect()))
}

/// 创建文章（multipart）。
async fn create_article(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    State(blobs): State<BlobStore>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ArticleDto>)> {
    let form = parse_article_form(&mut multipart).await?;

    let missing = || ApiError::Validation("Please provide all required fields".to_string());
    let title = form.title.filter(|s| !s.trim().is_empty()).ok_or_else(missing)?;
    let description = form
        .description
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(missing)?;
    let category = form
        .category
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(missing)?;

    if !category::is_valid(&category) {
        return Err(ApiError::Validation(format!("Invalid category: {category}")).into());
    }

    let folder = format!("article-images/{}", user.id);
    let mut images = Vec::with_capacity(form.uploads.len());
    for up in form.uploads {
        let url = blobs
            .upload(&folder, &up.filename, &up.content_type, up.bytes)
            .await?;
        images.push(url);
    }

    let article = pool
        .insert_article(NewArticle {
            title: title.trim(),
            description: description.trim(),
            category: &category,
            tags: &form.tags.unwrap_or_default(),
            images: &images,
            created_by: user.id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(article.into())))
}

async fn article_detail(
    _user: AuthUser,
    State(pool): State<DBPool>,
    Path(id): Path<Uuid>,
) -> Result<Json<ArticleDto>> {
    let article = pool
        .get_article(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;
    Ok(Json(article.into()))
}

/// 更新文章内容（multipart，仅作者）。
///
/// 新上传的图片追加在现有列表之后，总数不超过 5；
/// `remove_images` 中列出的 URL 被移除并向存储请求删除。
async fn update_article(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    State(blobs): State<BlobStore>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<ArticleDto>> {
    let not_found =
        || ApiError::NotFound("Article not found or you are not authorized".to_string());

    let article = pool.get_owned(id, user.id).await?.ok_or_else(not_found)?;
    let form = parse_article_form(&mut multipart).await?;

    let title = form.title.filter(|s| !s.trim().is_empty()).unwrap_or(article.title);
    let description = form
        .description
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(article.description);
    let category = form
        .category
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(article.category);
    if !category::is_valid(&category) {
        return Err(ApiError::Validation(format!("Invalid category: {category}")).into());
    }
    let tags = form.tags.unwrap_or(article.tags);

    let mut images = article.images;
    if images.len() + form.uploads.len() > MAX_ARTICLE_IMAGES {
        return Err(ApiError::Validation(format!(
            "An article can have at most {MAX_ARTICLE_IMAGES} images"
        ))
        .into());
    }

    let folder = format!("article-images/{}", user.id);
    for up in form.uploads {
        let url = blobs
            .upload(&folder, &up.filename, &up.content_type, up.bytes)
            .await?;
        images.push(url);
    }

    if let Some(remove) = form.remove_images {
        for url in &remove {
            blobs.delete(url).await;
        }
        images.retain(|url| !remove.contains(url));
    }

    let updated = pool
        .update_content(
            id,
            user.id,
            ArticleContentUpdate {
                title: title.trim(),
                description: description.trim(),
                category: &category,
                tags: &tags,
                images: &images,
            },
        )
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(updated.into()))
}

/// 删除文章（仅作者）。
///
/// 图片先向存储请求删除；feedback 行随外键级联清除，
/// 不会留下悬挂的反馈记录。
async fn delete_article(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    State(blobs): State<BlobStore>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let article = pool.get_owned(id, user.id).await?.ok_or_else(|| {
        ApiError::NotFound("Article not found or you are not authorized".to_string())
    })?;

    for url in &article.images {
        blobs.delete(url).await;
    }

    pool.delete_article(id, user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `react` 的响应体
#[derive(Debug, Serialize)]
struct ReactionDto {
    likes: i64,
    dislikes: i64,
    user_feedback: Option<Reaction>,
}

impl From<feedback::ReactionOutcome> for ReactionDto {
    fn from(o: feedback::ReactionOutcome) -> Self {
        Self {
            likes: o.likes,
            dislikes: o.dislikes,
            user_feedback: o.reaction,
        }
    }
}

async fn like_article(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReactionDto>> {
    let outcome = feedback::react(&pool, user.id, id, Reaction::Like).await?;
    Ok(Json(outcome.into()))
}

async fn dislike_article(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReactionDto>> {
    let outcome = feedback::react(&pool, user.id, id, Reaction::Dislike).await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Serialize)]
struct BlockDto {
    blocked: bool,
    message: String,
}

/// 翻转屏蔽标记（仅作者）。
async fn block_article(
    AuthUser(user): AuthUser,
    State(pool): State<DBPool>,
    Path(id): Path<Uuid>,
) -> Result<Json<BlockDto>> {
    let blocked = pool.toggle_block(id, user.id).await?.ok_or_else(|| {
        ApiError::NotFound("Article not found or you are not authorized".to_string())
    })?;

    Ok(Json(BlockDto {
        blocked,
        message: format!("Article {}", if blocked { "blocked" } else { "unblocked" }),
    }))
}

#[derive(Debug, Serialize)]
struct StatsDto {
    likes: i64,
    dislikes: i64,
}

async fn article_stats(
    _user: AuthUser,
    State(pool): State<DBPool>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatsDto>> {
    let (likes, dislikes) = pool
        .stats(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;

    Ok(Json(StatsDto { likes, dislikes }))
}

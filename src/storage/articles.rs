use uuid::Uuid;

use super::{ArticleRow, ArticleWithAuthor, DBPool};

/// 新文章插入参数
#[derive(Debug)]
pub struct NewArticle<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub tags: &'a [String],
    pub images: &'a [String],
    pub created_by: Uuid,
}

/// 文章内容更新参数
///
/// 只覆盖内容字段，`likes`/`dislikes` 不在此路径上，
/// 计数列由 [`crate::feedback`] 独占写入。
#[derive(Debug)]
pub struct ArticleContentUpdate<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub tags: &'a [String],
    pub images: &'a [String],
}

/// 文章相关的数据库操作接口
pub trait ArticleStore: Send + Sync {
    type Error;

    /// 插入新文章
    fn insert_article(
        &self,
        new: NewArticle<'_>,
    ) -> impl std::future::Future<Output = Result<ArticleRow, Self::Error>>;

    /// 全部文章，带作者名，按创建时间倒序
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ArticleWithAuthor>, Self::Error>>;

    /// 偏好流：未屏蔽文章，分类命中偏好集合；集合为空时返回全部未屏蔽文章
    fn list_by_preferences(
        &self,
        preferences: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<ArticleWithAuthor>, Self::Error>>;

    /// 作者视角的文章列表，包含已屏蔽的
    fn list_by_author(
        &self,
        author: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ArticleRow>, Self::Error>>;

    /// 查询单篇文章
    fn get_article(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ArticleWithAuthor>, Self::Error>>;

    /// 按 (id, 作者) 查询，所有权校验用
    fn get_owned(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ArticleRow>, Self::Error>>;

    /// 覆盖内容字段并刷新 updated_at
    fn update_content(
        &self,
        id: Uuid,
        owner: Uuid,
        update: ArticleContentUpdate<'_>,
    ) -> impl std::future::Future<Output = Result<Option<ArticleRow>, Self::Error>>;

    /// 翻转屏蔽标记，返回新值
    fn toggle_block(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<bool>, Self::Error>>;

    /// 删除文章；feedback 行随外键级联删除
    fn delete_article(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> impl std::future::Future<Output = Result<bool, Self::Error>>;

    /// 当前计数对 (likes, dislikes)
    fn stats(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<(i64, i64)>, Self::Error>>;
}

impl ArticleStore for DBPool {
    type Error = sqlx::Error;

    async fn insert_article(&self, new: NewArticle<'_>) -> Result<ArticleRow, sqlx::Error> {
        sqlx::query_as::<_, ArticleRow>(
            r#"
            INSERT INTO articles (id, title, description, category, tags, images, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.title)
        .bind(new.description)
        .bind(new.category)
        .bind(new.tags)
        .bind(new.images)
        .bind(new.created_by)
        .fetch_one(self)
        .await
    }

    async fn list_all(&self) -> Result<Vec<ArticleWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, ArticleWithAuthor>(
            r#"
            SELECT a.*, u.name AS author_name
            FROM articles a
            INNER JOIN users u ON a.created_by = u.id
            ORDER BY a.created_at DESC
            "#,
        )
        .fetch_all(self)
        .await
    }

    async fn list_by_preferences(
        &self,
        preferences: &[String],
    ) -> Result<Vec<ArticleWithAuthor>, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::new(
            r#"
            SELECT a.*, u.name AS author_name
            FROM articles a
            INNER JOIN users u ON a.created_by = u.id
            "#,
        );

        builder.push("WHERE a.blocked = FALSE");
        if !preferences.is_empty() {
            builder
                .push(" AND a.category = ANY(")
                .push_bind(preferences)
                .push(")");
        }
        builder.push(" ORDER BY a.created_at DESC");

        builder
            .build_query_as::<ArticleWithAuthor>()
            .fetch_all(self)
            .await
    }

    async fn list_by_author(&self, author: Uuid) -> Result<Vec<ArticleRow>, sqlx::Error> {
        sqlx::query_as::<_, ArticleRow>(
            "SELECT * FROM articles WHERE created_by = $1 ORDER BY created_at DESC",
        )
        .bind(author)
        .fetch_all(self)
        .await
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<ArticleWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, ArticleWithAuthor>(
            r#"
            SELECT a.*, u.name AS author_name
            FROM articles a
            INNER JOIN users u ON a.created_by = u.id
            WHERE a.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self)
        .await
    }

    async fn get_owned(&self, id: Uuid, owner: Uuid) -> Result<Option<ArticleRow>, sqlx::Error> {
        sqlx::query_as::<_, ArticleRow>(
            "SELECT * FROM articles WHERE id = $1 AND created_by = $2",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(self)
        .await
    }

    async fn update_content(
        &self,
        id: Uuid,
        owner: Uuid,
        update: ArticleContentUpdate<'_>,
    ) -> Result<Option<ArticleRow>, sqlx::Error> {
        sqlx::query_as::<_, ArticleRow>(
            r#"
            UPDATE articles
            SET title = $3,
                description = $4,
                category = $5,
                tags = $6,
                images = $7,
                updated_at = now()
            WHERE id = $1 AND created_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(update.title)
        .bind(update.description)
        .bind(update.category)
        .bind(update.tags)
        .bind(update.images)
        .fetch_optional(self)
        .await
    }

    async fn toggle_block(&self, id: Uuid, owner: Uuid) -> Result<Option<bool>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            UPDATE articles
            SET blocked = NOT blocked
            WHERE id = $1 AND created_by = $2
            RETURNING blocked
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(self)
        .await
    }

    async fn delete_article(&self, id: Uuid, owner: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1 AND created_by = $2")
            .bind(id)
            .bind(owner)
            .execute(self)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self, id: Uuid) -> Result<Option<(i64, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (i64, i64)>("SELECT likes, dislikes FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(self)
            .await
    }
}

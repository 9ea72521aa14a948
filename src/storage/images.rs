use uuid::Uuid;

use super::{DBPool, ImageRow};

/// 新图片插入参数
#[derive(Debug)]
pub struct NewImage {
    pub title: String,
    pub url: String,
    pub ord: i64,
}

/// 图库相关的数据库操作接口
pub trait ImageStore: Send + Sync {
    type Error;

    /// 批量插入图片，单事务提交
    fn insert_images(
        &self,
        user_id: Uuid,
        items: &[NewImage],
    ) -> impl std::future::Future<Output = Result<Vec<ImageRow>, Self::Error>>;

    /// 用户当前最大排序值
    fn max_order(
        &self,
        user_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<i64>, Self::Error>>;

    /// 用户的全部图片，按排序值升序
    fn list_images(
        &self,
        user_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ImageRow>, Self::Error>>;

    /// 按 (id, 所属用户) 查询，所有权校验用
    fn get_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ImageRow>, Self::Error>>;

    /// 更新标题和/或 URL，`None` 表示保持原值
    fn update_image(
        &self,
        id: Uuid,
        user_id: Uuid,
        title: Option<&str>,
        url: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Option<ImageRow>, Self::Error>>;

    /// 删除图片，返回是否删除了行
    fn delete_image(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> impl std::future::Future<Output = Result<bool, Self::Error>>;

    /// 批量重排：所有排序写入在一个事务中落盘，
    /// 读者不会观察到部分重排的列表
    fn rearrange(
        &self,
        user_id: Uuid,
        orders: &[(Uuid, i64)],
    ) -> impl std::future::Future<Output = Result<(), Self::Error>>;
}

impl ImageStore for DBPool {
    type Error = sqlx::Error;

    async fn insert_images(
        &self,
        user_id: Uuid,
        items: &[NewImage],
    ) -> Result<Vec<ImageRow>, sqlx::Error> {
        let mut tx = self.begin().await?;

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, ImageRow>(
                r#"
                INSERT INTO images (id, user_id, title, url, ord)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&item.title)
            .bind(&item.url)
            .bind(item.ord)
            .fetch_one(tx.as_mut())
            .await?;
            rows.push(row);
        }

        tx.commit().await?;
        Ok(rows)
    }

    async fn max_order(&self, user_id: Uuid) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT MAX(ord) FROM images WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self)
            .await
    }

    async fn list_images(&self, user_id: Uuid) -> Result<Vec<ImageRow>, sqlx::Error> {
        sqlx::query_as::<_, ImageRow>(
            "SELECT * FROM images WHERE user_id = $1 ORDER BY ord ASC, created_at ASC",
        )
        .bind(user_id)
        .fetch_all(self)
        .await
    }

    async fn get_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<ImageRow>, sqlx::Error> {
        sqlx::query_as::<_, ImageRow>("SELECT * FROM images WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(self)
            .await
    }

    async fn update_image(
        &self,
        id: Uuid,
        user_id: Uuid,
        title: Option<&str>,
        url: Option<&str>,
    ) -> Result<Option<ImageRow>, sqlx::Error> {
        sqlx::query_as::<_, ImageRow>(
            r#"
            UPDATE images
            SET title = COALESCE($3, title), url = COALESCE($4, url)
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(title)
        .bind(url)
        .fetch_optional(self)
        .await
    }

    async fn delete_image(&self, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rearrange(&self, user_id: Uuid, orders: &[(Uuid, i64)]) -> Result<(), sqlx::Error> {
        let mut tx = self.begin().await?;

        for (id, ord) in orders {
            sqlx::query("UPDATE images SET ord = $3 WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .bind(ord)
                .execute(tx.as_mut())
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

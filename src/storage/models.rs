use chrono::{DateTime, Local};
use uuid::Uuid;

/// 用户行
///
/// 包含密码哈希和 OTP 列，仅在存储层和鉴权路径中流转，
/// 响应序列化使用 API 层的 DTO。
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    /// 用户唯一标识
    pub id: Uuid,
    /// 姓名
    pub name: String,
    /// 邮箱，唯一
    pub email: String,
    /// 手机号，唯一
    pub phone: String,
    /// argon2 密码哈希
    pub password_hash: String,
    /// 邮箱是否已验证
    pub verified: bool,
    /// 注册验证 OTP
    pub verification_otp: Option<String>,
    /// 注册验证 OTP 过期时间
    pub otp_expiry: Option<DateTime<Local>>,
    /// 密码重置 OTP，与注册 OTP 相互独立
    pub reset_otp: Option<String>,
    /// 密码重置 OTP 过期时间
    pub reset_otp_expiry: Option<DateTime<Local>>,
    /// 偏好分类列表
    pub preferences: Vec<String>,
    /// 创建时间
    pub created_at: DateTime<Local>,
}

/// 文章行
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArticleRow {
    /// 文章唯一标识
    pub id: Uuid,
    /// 标题
    pub title: String,
    /// 正文描述
    pub description: String,
    /// 分类，取值见 [`crate::category::CATEGORIES`]
    pub category: String,
    /// 标签列表
    pub tags: Vec<String>,
    /// 图片 URL 列表，最多 5 张
    pub images: Vec<String>,
    /// 点赞计数，是 feedback 表的物化视图，只由 Feedback Ledger 写入
    pub likes: i64,
    /// 点踩计数，同上
    pub dislikes: i64,
    /// 作者屏蔽标记，屏蔽后不出现在偏好流中
    pub blocked: bool,
    /// 作者
    pub created_by: Uuid,
    /// 创建时间
    pub created_at: DateTime<Local>,
    /// 更新时间
    pub updated_at: DateTime<Local>,
}

/// 文章行 + 作者名，用于列表和详情展示
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArticleWithAuthor {
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
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,

    /// 作者名称
    pub author_name: String,
}

/// 图库图片行
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImageRow {
    pub id: Uuid,
    /// 所属用户
    pub user_id: Uuid,
    /// 标题
    pub title: String,
    /// 图片 URL
    pub url: String,
    /// 排序值，升序展示；只要求相对可比，不要求连续
    pub ord: i64,
    pub created_at: DateTime<Local>,
}

/// 用户反馈活动行：feedback 与文章标题的连接结果
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub article_id: Uuid,
    pub article_title: String,
    /// `like` 或 `dislike`
    pub reaction: String,
    pub created_at: DateTime<Local>,
}

//! Feedback Ledger
//!
//! 维护 (user, article) 反馈记录与文章上冗余计数列的一致性。
//! `likes`/`dislikes` 是 feedback 表的物化视图，
//! 本模块是这两列唯一的写入路径。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ApiError, Result},
    storage::DBPool,
};

/// 一次请求携带的反应类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    pub fn as_str(self) -> &'static str {
        match self {
            Reaction::Like => "like",
            Reaction::Dislike => "dislike",
        }
    }

    fn from_column(value: &str) -> Option<Reaction> {
        match value {
            "like" => Some(Reaction::Like),
            "dislike" => Some(Reaction::Dislike),
            _ => None,
        }
    }
}

/// (user, article) 对的当前反馈状态
///
/// `None` 对应 feedback 表中不存在记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackState {
    #[default]
    None,
    Liked,
    Disliked,
}

impl FeedbackState {
    /// 状态对应的当前反应，`None` 状态返回 `Option::None`
    pub fn reaction(self) -> Option<Reaction> {
        match self {
            FeedbackState::None => None,
            FeedbackState::Liked => Some(Reaction::Like),
            FeedbackState::Disliked => Some(Reaction::Dislike),
        }
    }
}

/// 一次状态转移：目标状态与两个计数列的增量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: FeedbackState,
    pub likes_delta: i64,
    pub dislikes_delta: i64,
}

/// 状态转移表
///
/// 重复同一反应走取消路径；切换反应在同一次转移里同时调整两个计数。
pub fn transition(current: FeedbackState, action: Reaction) -> Transition {
    use FeedbackState::*;
    use Reaction::*;

    match (current, action) {
        (None, Like) => Transition {
            next: Liked,
            likes_delta: 1,
            dislikes_delta: 0,
        },
        (None, Dislike) => Transition {
            next: Disliked,
            likes_delta: 0,
            dislikes_delta: 1,
        },
        (Liked, Like) => Transition {
            next: None,
            likes_delta: -1,
            dislikes_delta: 0,
        },
        (Liked, Dislike) => Transition {
            next: Disliked,
            likes_delta: -1,
            dislikes_delta: 1,
        },
        (Disliked, Like) => Transition {
            next: Liked,
            likes_delta: 1,
            dislikes_delta: -1,
        },
        (Disliked, Dislike) => Transition {
            next: None,
            likes_delta: 0,
            dislikes_delta: -1,
        },
    }
}

/// `react` 的结果：最新计数对与调用者落点反应
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionOutcome {
    pub likes: i64,
    pub dislikes: i64,
    pub reaction: Option<Reaction>,
}

/// 对一篇文章施加一次反应
///
/// 读取-决策-写入序列在单个数据库事务中执行，
/// 事务先对文章行加 `FOR UPDATE` 锁：
/// 同一文章上的并发反应被串行化，与并发删除的竞争
/// 要么整体发生在删除之前（随外键级联一并删除），
/// 要么看到文章不存在返回 [`ApiError::NotFound`]。
///
/// 计数递减用 `GREATEST(0, ..)` 兜底，容忍历史漂移而不出现负数。
pub async fn react(
    pool: &DBPool,
    user_id: Uuid,
    article_id: Uuid,
    action: Reaction,
) -> Result<ReactionOutcome> {
    let mut tx = pool.begin().await?;

    let locked: Option<(i64, i64)> =
        sqlx::query_as("SELECT likes, dislikes FROM articles WHERE id = $1 FOR UPDATE")
            .bind(article_id)
            .fetch_optional(tx.as_mut())
            .await?;

    if locked.is_none() {
        return Err(ApiError::NotFound("Article not found".to_string()).into());
    }

    let stored: Option<String> =
        sqlx::query_scalar("SELECT reaction FROM feedback WHERE user_id = $1 AND article_id = $2")
            .bind(user_id)
            .bind(article_id)
            .fetch_optional(tx.as_mut())
            .await?;

    let current = stored
        .as_deref()
        .and_then(Reaction::from_column)
        .map(|r| match r {
            Reaction::Like => FeedbackState::Liked,
            Reaction::Dislike => FeedbackState::Disliked,
        })
        .unwrap_or_default();

    let t = transition(current, action);

    // 对 feedback 表恰好一次写入：创建、改写或删除
    match (current, t.next) {
        (FeedbackState::None, next) => {
            let reaction = next.reaction().map(Reaction::as_str);
            sqlx::query(
                "INSERT INTO feedback (user_id, article_id, reaction) VALUES ($1, $2, $3)",
            )
            .bind(user_id)
            .bind(article_id)
            .bind(reaction)
            .execute(tx.as_mut())
            .await?;
        }
        (_, FeedbackState::None) => {
            sqlx::query("DELETE FROM feedback WHERE user_id = $1 AND article_id = $2")
                .bind(user_id)
                .bind(article_id)
                .execute(tx.as_mut())
                .await?;
        }
        (_, next) => {
            let reaction = next.reaction().map(Reaction::as_str);
            sqlx::query(
                "UPDATE feedback SET reaction = $3 WHERE user_id = $1 AND article_id = $2",
            )
            .bind(user_id)
            .bind(article_id)
            .bind(reaction)
            .execute(tx.as_mut())
            .await?;
        }
    }

    let (likes, dislikes): (i64, i64) = sqlx::query_as(
        r#"
        UPDATE articles
        SET likes = GREATEST(0, likes + $2),
            dislikes = GREATEST(0, dislikes + $3)
        WHERE id = $1
        RETURNING likes, dislikes
        "#,
    )
    .bind(article_id)
    .bind(t.likes_delta)
    .bind(t.dislikes_delta)
    .fetch_one(tx.as_mut())
    .await?;

    tx.commit().await?;

    Ok(ReactionOutcome {
        likes,
        dislikes,
        reaction: t.next.reaction(),
    })
}

#[cfg(test)]
mod tests {
    use super::FeedbackState::*;
    use super::Reaction::*;
    use super::*;

    #[test]
    fn none_like_creates_liked() {
        let t = transition(None, Like);
        assert_eq!(t.next, Liked);
        assert_eq!((t.likes_delta, t.dislikes_delta), (1, 0));
    }

    #[test]
    fn none_dislike_creates_disliked() {
        let t = transition(None, Dislike);
        assert_eq!(t.next, Disliked);
        assert_eq!((t.likes_delta, t.dislikes_delta), (0, 1));
    }

    #[test]
    fn repeated_like_is_unreact() {
        let t = transition(Liked, Like);
        assert_eq!(t.next, None);
        assert_eq!((t.likes_delta, t.dislikes_delta), (-1, 0));
    }

    #[test]
    fn repeated_dislike_is_unreact() {
        let t = transition(Disliked, Dislike);
        assert_eq!(t.next, None);
        assert_eq!((t.likes_delta, t.dislikes_delta), (0, -1));
    }

    #[test]
    fn switch_adjusts_both_counters() {
        let t = transition(Liked, Dislike);
        assert_eq!(t.next, Disliked);
        assert_eq!((t.likes_delta, t.dislikes_delta), (-1, 1));

        let t = transition(Disliked, Like);
        assert_eq!(t.next, Liked);
        assert_eq!((t.likes_delta, t.dislikes_delta), (1, -1));
    }

    /// like 紧跟 like 回到起点：状态 None，计数复原
    #[test]
    fn toggle_returns_counters_to_baseline() {
        let (mut likes, mut dislikes) = (7i64, 3i64);

        let first = transition(None, Like);
        likes += first.likes_delta;
        dislikes += first.dislikes_delta;

        let second = transition(first.next, Like);
        likes += second.likes_delta;
        dislikes += second.dislikes_delta;

        assert_eq!(second.next, None);
        assert_eq!((likes, dislikes), (7, 3));
    }

    /// 任意反应序列下增量累计和不为负
    #[test]
    fn delta_sums_never_negative_from_empty() {
        let sequences = [
            vec![Like, Like, Like, Like],
            vec![Dislike, Dislike, Dislike],
            vec![Like, Dislike, Like, Dislike, Dislike],
            vec![Dislike, Like, Like, Dislike, Like, Like],
        ];

        for seq in sequences {
            let mut state = None;
            let (mut likes, mut dislikes) = (0i64, 0i64);
            for action in seq {
                let t = transition(state, action);
                likes += t.likes_delta;
                dislikes += t.dislikes_delta;
                state = t.next;
                assert!(likes >= 0 && dislikes >= 0);
            }
        }
    }

    #[test]
    fn state_reaction_mapping() {
        assert_eq!(None.reaction(), Option::None);
        assert_eq!(Liked.reaction(), Some(Like));
        assert_eq!(Disliked.reaction(), Some(Dislike));
    }
}

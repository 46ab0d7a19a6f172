use async_trait::async_trait;
use sqlx::{types::Uuid, PgConnection, PgPool};
use trendly_common::{get_current_timestamp, ModuleClient};
use trendly_database::{OrderDirection, QueryCriteria, SqlxCrud, SqlxFilterQuery, SqlxSchema};

use super::{DeleteReport, DiscussionStore};
use crate::{
    Comment, CommentRowSqlx, DiscussionError, DiscussionRoom, Keyword, KeywordRowSqlx, NewComment, Result,
    SentimentTally, Vote,
};

// Rooms first: keywords and comments both reference them.
trendly_database::init_databases!(
    default: [
        DiscussionRoom,
        Keyword,
        Comment
    ]
);

trendly_common::define_module_client! {
    (struct PostgresClient, "postgres")
    client_type: &'static PgPool,
    env: ["DATABASE_URL"],
    setup: async {
        connect(false, false, false).await
    }
}

const SUBTREE_SIZE_SQL: &str = r#"
WITH RECURSIVE subtree AS (
    SELECT "id" FROM "comments" WHERE "id" = $1
    UNION ALL
    SELECT c."id" FROM "comments" c JOIN subtree s ON c."parent" = s."id"
)
SELECT COUNT(*) FROM subtree
"#;

fn by_id_for_update(id: Uuid) -> QueryCriteria {
    QueryCriteria::new().add_valued_filter("id", "=", id).for_update()
}

async fn lock_room(conn: &mut PgConnection, id: Uuid) -> Result<DiscussionRoom> {
    DiscussionRoom::find_one_by_criteria(by_id_for_update(id), &mut *conn)
        .await?
        .ok_or_else(|| DiscussionError::not_found("discussion_room", id))
}

async fn lock_comment(conn: &mut PgConnection, id: Uuid) -> Result<Comment> {
    Comment::find_one_by_criteria(by_id_for_update(id), &mut *conn)
        .await?
        .ok_or_else(|| DiscussionError::not_found("comment", id))
}

/// Postgres-backed store. Cascade and set-null are left to the foreign keys;
/// read-modify-write operations lock the rows they touch, room before comment.
#[derive(Clone)]
pub struct PgDiscussionStore {
    pool: PgPool,
}

impl PgDiscussionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn from_client(client: &PostgresClient) -> Self {
        let pool: &PgPool = client.get_client();
        Self::new(pool.clone())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DiscussionStore for PgDiscussionStore {
    async fn track_keyword(&self, keyword: Keyword) -> Result<Keyword> {
        let room_id = keyword.current_discussion_room;
        let keyword = keyword.create(&self.pool).await.map_err(|e| match room_id {
            Some(id) if e.is_foreign_key_violation() => DiscussionError::not_found("discussion_room", id),
            _ => DiscussionError::from(e),
        })?;
        tracing::debug!("[PgDiscussionStore] Tracked keyword '{}' ({}) at rank {}", keyword.keyword, keyword.id, keyword.rank);
        Ok(keyword)
    }

    async fn keyword(&self, id: Uuid) -> Result<Option<Keyword>> {
        Ok(Keyword::find_by_id(id, &self.pool).await?)
    }

    async fn keywords_by_text(&self, text: &str) -> Result<Vec<Keyword>> {
        let criteria = QueryCriteria::new()
            .add_valued_filter("keyword", "=", text.to_string())
            .order_by("created_at", OrderDirection::Desc)
            .order_by("seq", OrderDirection::Desc);
        Ok(Keyword::find_by_criteria(criteria, &self.pool).await?)
    }

    async fn current_keywords(&self, limit: usize) -> Result<Vec<Keyword>> {
        let sql = format!(
            "SELECT DISTINCT ON (\"rank\") {} FROM \"{}\" ORDER BY \"rank\" ASC, \"created_at\" DESC, \"seq\" DESC LIMIT $1",
            Keyword::SELECT_COLUMNS,
            Keyword::TABLE_NAME
        );
        let rows = sqlx::query_as::<_, KeywordRowSqlx>(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(<Keyword as SqlxSchema>::from_row).collect())
    }

    async fn attach_room(&self, keyword_id: Uuid, room_id: Option<Uuid>) -> Result<Keyword> {
        let mut tx = self.pool.begin().await?;
        if let Some(room_id) = room_id {
            lock_room(&mut tx, room_id).await?;
        }
        let mut keyword = Keyword::find_one_by_criteria(by_id_for_update(keyword_id), &mut *tx)
            .await?
            .ok_or_else(|| DiscussionError::not_found("keyword", keyword_id))?;

        keyword.current_discussion_room = room_id;
        let keyword = keyword.update(&mut *tx).await?;
        tx.commit().await?;

        tracing::debug!("[PgDiscussionStore] Keyword {} now points at room {:?}", keyword_id, room_id);
        Ok(keyword)
    }

    async fn open_room(&self, mut room: DiscussionRoom) -> Result<DiscussionRoom> {
        room.reset_for_open();
        let room = room.create(&self.pool).await?;
        tracing::debug!("[PgDiscussionStore] Opened room {} for '{}'", room.id, room.keyword);
        Ok(room)
    }

    async fn room(&self, id: Uuid) -> Result<Option<DiscussionRoom>> {
        Ok(DiscussionRoom::find_by_id(id, &self.pool).await?)
    }

    async fn close_room(&self, id: Uuid) -> Result<DiscussionRoom> {
        let mut tx = self.pool.begin().await?;
        let mut room = lock_room(&mut tx, id).await?;
        if room.is_closed {
            return Err(DiscussionError::RoomAlreadyClosed(id));
        }

        room.is_closed = true;
        room.closed_at = Some(get_current_timestamp());
        let room = room.update(&mut *tx).await?;
        tx.commit().await?;

        tracing::debug!("[PgDiscussionStore] Closed room {}", id);
        Ok(room)
    }

    async fn record_sentiment(
        &self,
        id: Uuid,
        tally: SentimentTally,
        summary: Option<String>,
    ) -> Result<DiscussionRoom> {
        let mut tx = self.pool.begin().await?;
        let mut room = lock_room(&mut tx, id).await?;
        room.apply_sentiment(tally, summary, get_current_timestamp());
        let room = room.update(&mut *tx).await?;
        tx.commit().await?;

        tracing::debug!("[PgDiscussionStore] Recorded sentiment {:?} for room {}", tally, id);
        Ok(room)
    }

    async fn delete_room(&self, id: Uuid) -> Result<DeleteReport> {
        let mut tx = self.pool.begin().await?;
        let room = lock_room(&mut tx, id).await?;

        let comments: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "comments" WHERE "discussion_room" = $1"#)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let keywords: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "keywords" WHERE "current_discussion_room" = $1"#)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let rooms = room.delete(&mut *tx).await?;
        tx.commit().await?;

        let report = DeleteReport {
            rooms,
            comments: comments.max(0) as u64,
            keywords_detached: keywords.max(0) as u64,
        };
        tracing::debug!("[PgDiscussionStore] Deleted room {}: {:?}", id, report);
        Ok(report)
    }

    async fn post_comment(&self, room_id: Uuid, new_comment: NewComment) -> Result<Comment> {
        let comment = new_comment.into_comment(room_id)?;

        let mut tx = self.pool.begin().await?;
        let mut room = lock_room(&mut tx, room_id).await?;
        if room.is_closed {
            return Err(DiscussionError::RoomClosed(room_id));
        }
        let parent = match comment.parent {
            Some(parent_id) => {
                let parent = lock_comment(&mut tx, parent_id).await?;
                if parent.discussion_room != room_id {
                    return Err(DiscussionError::ParentInOtherRoom { parent: parent_id, room: room_id });
                }
                Some(parent)
            }
            None => None,
        };

        let comment = comment.create(&mut *tx).await?;

        room.adjust_comment_count(1);
        room.update(&mut *tx).await?;
        if let Some(mut parent) = parent {
            parent.add_reply();
            parent.update(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::debug!("[PgDiscussionStore] Posted comment {} in room {} (parent {:?})", comment.id, room_id, comment.parent);
        Ok(comment)
    }

    async fn comment(&self, id: Uuid) -> Result<Option<Comment>> {
        Ok(Comment::find_by_id(id, &self.pool).await?)
    }

    async fn comments_in_room(&self, room_id: Uuid) -> Result<Vec<Comment>> {
        let criteria = QueryCriteria::new()
            .add_valued_filter("discussion_room", "=", room_id)
            .order_by("created_at", OrderDirection::Asc)
            .order_by("seq", OrderDirection::Asc);
        Ok(Comment::find_by_criteria(criteria, &self.pool).await?)
    }

    async fn replies(&self, parent_id: Uuid) -> Result<Vec<Comment>> {
        let criteria = QueryCriteria::new()
            .add_valued_filter("parent", "=", parent_id)
            .order_by("created_at", OrderDirection::Asc)
            .order_by("seq", OrderDirection::Asc);
        Ok(Comment::find_by_criteria(criteria, &self.pool).await?)
    }

    async fn vote(&self, comment_id: Uuid, vote: Vote) -> Result<Comment> {
        let sql = format!(
            "UPDATE \"{table}\" SET \"{column}\" = \"{column}\" + 1 WHERE \"id\" = $1 RETURNING {columns}",
            table = Comment::TABLE_NAME,
            column = vote.column(),
            columns = Comment::SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, CommentRowSqlx>(&sql)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DiscussionError::not_found("comment", comment_id))?;

        tracing::debug!("[PgDiscussionStore] {:?} on comment {}", vote, comment_id);
        Ok(<Comment as SqlxSchema>::from_row(row))
    }

    async fn delete_comment(&self, id: Uuid) -> Result<DeleteReport> {
        let mut tx = self.pool.begin().await?;
        let room_id = Comment::find_by_id(id, &mut *tx)
            .await?
            .ok_or_else(|| DiscussionError::not_found("comment", id))?
            .discussion_room;

        let mut room = lock_room(&mut tx, room_id).await?;
        let target = lock_comment(&mut tx, id).await?;
        let parent = match target.parent {
            Some(parent_id) => Some(lock_comment(&mut tx, parent_id).await?),
            None => None,
        };

        let removed: i64 = sqlx::query_scalar(SUBTREE_SIZE_SQL).bind(id).fetch_one(&mut *tx).await?;
        target.delete(&mut *tx).await?;

        room.adjust_comment_count(-i32::try_from(removed).unwrap_or(i32::MAX));
        room.update(&mut *tx).await?;
        if let Some(mut parent) = parent {
            parent.remove_reply();
            parent.update(&mut *tx).await?;
        }
        tx.commit().await?;

        let report = DeleteReport { rooms: 0, comments: removed.max(0) as u64, keywords_detached: 0 };
        tracing::debug!("[PgDiscussionStore] Deleted comment {}: {:?}", id, report);
        Ok(report)
    }
}

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{connect, PgDiscussionStore, PostgresClient};

use async_trait::async_trait;
use sqlx::types::Uuid;

use crate::{Comment, DiscussionRoom, Keyword, NewComment, Result, SentimentTally, Vote};

/// Rows removed or detached by a delete, cascades included.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub rooms: u64,
    pub comments: u64,
    pub keywords_detached: u64,
}

/// Keyword, room and comment persistence with the schema's cascade and
/// set-null rules applied on delete.
///
/// Each call is atomic. Counters on rooms and parent comments are kept in
/// step with the comments actually stored.
#[async_trait]
pub trait DiscussionStore: Send + Sync {
    /// Stores a new keyword; `id` and `created_at` are assigned here.
    async fn track_keyword(&self, keyword: Keyword) -> Result<Keyword>;
    async fn keyword(&self, id: Uuid) -> Result<Option<Keyword>>;
    /// Exact matches, newest first.
    async fn keywords_by_text(&self, text: &str) -> Result<Vec<Keyword>>;
    /// Newest keyword per rank, by rank ascending.
    async fn current_keywords(&self, limit: usize) -> Result<Vec<Keyword>>;
    async fn attach_room(&self, keyword_id: Uuid, room_id: Option<Uuid>) -> Result<Keyword>;

    async fn open_room(&self, room: DiscussionRoom) -> Result<DiscussionRoom>;
    async fn room(&self, id: Uuid) -> Result<Option<DiscussionRoom>>;
    async fn close_room(&self, id: Uuid) -> Result<DiscussionRoom>;
    async fn record_sentiment(
        &self,
        id: Uuid,
        tally: SentimentTally,
        summary: Option<String>,
    ) -> Result<DiscussionRoom>;
    /// Removes the room and its comments and clears keywords pointing at it.
    async fn delete_room(&self, id: Uuid) -> Result<DeleteReport>;

    async fn post_comment(&self, room_id: Uuid, comment: NewComment) -> Result<Comment>;
    async fn comment(&self, id: Uuid) -> Result<Option<Comment>>;
    /// Every comment of the room, replies included, oldest first.
    async fn comments_in_room(&self, room_id: Uuid) -> Result<Vec<Comment>>;
    async fn replies(&self, parent_id: Uuid) -> Result<Vec<Comment>>;
    async fn vote(&self, comment_id: Uuid, vote: Vote) -> Result<Comment>;
    /// Removes the comment with its whole reply subtree.
    async fn delete_comment(&self, id: Uuid) -> Result<DeleteReport>;
}

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use sqlx::types::Uuid;
use tokio::sync::RwLock;
use trendly_common::get_current_timestamp;
use trendly_database::Validate;

use super::{DeleteReport, DiscussionStore};
use crate::{Comment, DiscussionError, DiscussionRoom, Keyword, NewComment, Result, SentimentTally, Vote};

#[derive(Default)]
struct Tables {
    keywords: HashMap<Uuid, Keyword>,
    // creation order
    keyword_order: Vec<Uuid>,
    keywords_by_text: HashMap<String, Vec<Uuid>>,
    keywords_by_room: HashMap<Uuid, HashSet<Uuid>>,

    rooms: HashMap<Uuid, DiscussionRoom>,

    comments: HashMap<Uuid, Comment>,
    comments_by_room: HashMap<Uuid, Vec<Uuid>>,
    replies_by_parent: HashMap<Uuid, Vec<Uuid>>,

    last_seq: i64,
}

impl Tables {
    fn next_seq(&mut self) -> i64 {
        self.last_seq += 1;
        self.last_seq
    }

    fn require_room(&self, id: Uuid) -> Result<&DiscussionRoom> {
        self.rooms.get(&id).ok_or_else(|| DiscussionError::not_found("discussion_room", id))
    }

    fn room_mut(&mut self, id: Uuid) -> Result<&mut DiscussionRoom> {
        self.rooms.get_mut(&id).ok_or_else(|| DiscussionError::not_found("discussion_room", id))
    }

    fn link_keyword(&mut self, keyword_id: Uuid, room_id: Option<Uuid>) {
        if let Some(room_id) = room_id {
            self.keywords_by_room.entry(room_id).or_default().insert(keyword_id);
        }
    }

    fn unlink_keyword(&mut self, keyword_id: Uuid, room_id: Option<Uuid>) {
        let Some(room_id) = room_id else { return };
        if let Some(keywords) = self.keywords_by_room.get_mut(&room_id) {
            keywords.remove(&keyword_id);
            if keywords.is_empty() {
                self.keywords_by_room.remove(&room_id);
            }
        }
    }

    /// `root` followed by every reply beneath it.
    fn subtree(&self, root: Uuid) -> Vec<Uuid> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            found.push(id);
            if let Some(children) = self.replies_by_parent.get(&id) {
                stack.extend(children.iter().copied());
            }
        }
        found
    }

    fn remove_comments(&mut self, room_id: Uuid, ids: &[Uuid]) {
        let removed: HashSet<Uuid> = ids.iter().copied().collect();
        for id in ids {
            self.comments.remove(id);
            self.replies_by_parent.remove(id);
        }
        if let Some(room_comments) = self.comments_by_room.get_mut(&room_id) {
            room_comments.retain(|id| !removed.contains(id));
        }
    }

    fn collect_comments<'a>(&self, ids: impl Iterator<Item = &'a Uuid>) -> Vec<Comment> {
        ids.filter_map(|id| self.comments.get(id)).cloned().collect()
    }
}

/// In-process store. Every table lives in an id-keyed map; cascade and
/// set-null are carried out by walking the reverse indexes.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiscussionStore for MemoryStore {
    async fn track_keyword(&self, mut keyword: Keyword) -> Result<Keyword> {
        keyword.validate()?;

        let mut tables = self.tables.write().await;
        if let Some(room_id) = keyword.current_discussion_room {
            tables.require_room(room_id)?;
        }

        keyword.id = Uuid::new_v4();
        keyword.seq = tables.next_seq();
        keyword.created_at = get_current_timestamp();

        tables.keyword_order.push(keyword.id);
        tables.keywords_by_text.entry(keyword.keyword.clone()).or_default().push(keyword.id);
        tables.link_keyword(keyword.id, keyword.current_discussion_room);
        tables.keywords.insert(keyword.id, keyword.clone());

        tracing::debug!("[MemoryStore] Tracked keyword '{}' ({}) at rank {}", keyword.keyword, keyword.id, keyword.rank);
        Ok(keyword)
    }

    async fn keyword(&self, id: Uuid) -> Result<Option<Keyword>> {
        Ok(self.tables.read().await.keywords.get(&id).cloned())
    }

    async fn keywords_by_text(&self, text: &str) -> Result<Vec<Keyword>> {
        let tables = self.tables.read().await;
        let found = match tables.keywords_by_text.get(text) {
            Some(ids) => ids.iter().rev().filter_map(|id| tables.keywords.get(id)).cloned().collect(),
            None => Vec::new(),
        };
        Ok(found)
    }

    async fn current_keywords(&self, limit: usize) -> Result<Vec<Keyword>> {
        let tables = self.tables.read().await;
        let mut latest: BTreeMap<i16, &Keyword> = BTreeMap::new();
        for id in tables.keyword_order.iter().rev() {
            if let Some(keyword) = tables.keywords.get(id) {
                latest.entry(keyword.rank).or_insert(keyword);
            }
        }
        Ok(latest.into_values().take(limit).cloned().collect())
    }

    async fn attach_room(&self, keyword_id: Uuid, room_id: Option<Uuid>) -> Result<Keyword> {
        let mut tables = self.tables.write().await;
        if let Some(room_id) = room_id {
            tables.require_room(room_id)?;
        }

        let keyword = tables
            .keywords
            .get_mut(&keyword_id)
            .ok_or_else(|| DiscussionError::not_found("keyword", keyword_id))?;
        let previous = std::mem::replace(&mut keyword.current_discussion_room, room_id);
        let updated = keyword.clone();

        tables.unlink_keyword(keyword_id, previous);
        tables.link_keyword(keyword_id, room_id);

        tracing::debug!("[MemoryStore] Keyword {} now points at room {:?}", keyword_id, room_id);
        Ok(updated)
    }

    async fn open_room(&self, mut room: DiscussionRoom) -> Result<DiscussionRoom> {
        room.reset_for_open();
        room.validate()?;

        room.id = Uuid::new_v4();
        room.created_at = get_current_timestamp();

        let mut tables = self.tables.write().await;
        tables.rooms.insert(room.id, room.clone());

        tracing::debug!("[MemoryStore] Opened room {} for '{}'", room.id, room.keyword);
        Ok(room)
    }

    async fn room(&self, id: Uuid) -> Result<Option<DiscussionRoom>> {
        Ok(self.tables.read().await.rooms.get(&id).cloned())
    }

    async fn close_room(&self, id: Uuid) -> Result<DiscussionRoom> {
        let now = get_current_timestamp();
        let mut tables = self.tables.write().await;
        let room = tables.room_mut(id)?;
        if room.is_closed {
            return Err(DiscussionError::RoomAlreadyClosed(id));
        }

        room.is_closed = true;
        room.closed_at = Some(now);
        room.updated_at = Some(now);

        tracing::debug!("[MemoryStore] Closed room {}", id);
        Ok(room.clone())
    }

    async fn record_sentiment(
        &self,
        id: Uuid,
        tally: SentimentTally,
        summary: Option<String>,
    ) -> Result<DiscussionRoom> {
        let now = get_current_timestamp();
        let mut tables = self.tables.write().await;
        let room = tables.room_mut(id)?;

        let mut updated = room.clone();
        updated.apply_sentiment(tally, summary, now);
        updated.updated_at = Some(now);
        updated.validate()?;
        *room = updated.clone();

        tracing::debug!("[MemoryStore] Recorded sentiment {:?} for room {}", tally, id);
        Ok(updated)
    }

    async fn delete_room(&self, id: Uuid) -> Result<DeleteReport> {
        let mut tables = self.tables.write().await;
        if tables.rooms.remove(&id).is_none() {
            return Err(DiscussionError::not_found("discussion_room", id));
        }

        let comment_ids = tables.comments_by_room.remove(&id).unwrap_or_default();
        for comment_id in &comment_ids {
            tables.comments.remove(comment_id);
            tables.replies_by_parent.remove(comment_id);
        }

        let detached = tables.keywords_by_room.remove(&id).unwrap_or_default();
        for keyword_id in &detached {
            if let Some(keyword) = tables.keywords.get_mut(keyword_id) {
                keyword.current_discussion_room = None;
            }
        }

        let report = DeleteReport {
            rooms: 1,
            comments: comment_ids.len() as u64,
            keywords_detached: detached.len() as u64,
        };
        tracing::debug!("[MemoryStore] Deleted room {}: {:?}", id, report);
        Ok(report)
    }

    async fn post_comment(&self, room_id: Uuid, new_comment: NewComment) -> Result<Comment> {
        let mut comment = new_comment.into_comment(room_id)?;
        comment.validate()?;

        let now = get_current_timestamp();
        let mut tables = self.tables.write().await;
        if tables.require_room(room_id)?.is_closed {
            return Err(DiscussionError::RoomClosed(room_id));
        }
        if let Some(parent_id) = comment.parent {
            let parent = tables
                .comments
                .get(&parent_id)
                .ok_or_else(|| DiscussionError::not_found("comment", parent_id))?;
            if parent.discussion_room != room_id {
                return Err(DiscussionError::ParentInOtherRoom { parent: parent_id, room: room_id });
            }
        }

        comment.id = Uuid::new_v4();
        comment.seq = tables.next_seq();
        comment.created_at = now;

        let room = tables.room_mut(room_id)?;
        room.adjust_comment_count(1);
        room.updated_at = Some(now);

        if let Some(parent_id) = comment.parent {
            if let Some(parent) = tables.comments.get_mut(&parent_id) {
                parent.add_reply();
            }
            tables.replies_by_parent.entry(parent_id).or_default().push(comment.id);
        }
        tables.comments_by_room.entry(room_id).or_default().push(comment.id);
        tables.comments.insert(comment.id, comment.clone());

        tracing::debug!("[MemoryStore] Posted comment {} in room {} (parent {:?})", comment.id, room_id, comment.parent);
        Ok(comment)
    }

    async fn comment(&self, id: Uuid) -> Result<Option<Comment>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn comments_in_room(&self, room_id: Uuid) -> Result<Vec<Comment>> {
        let tables = self.tables.read().await;
        Ok(match tables.comments_by_room.get(&room_id) {
            Some(ids) => tables.collect_comments(ids.iter()),
            None => Vec::new(),
        })
    }

    async fn replies(&self, parent_id: Uuid) -> Result<Vec<Comment>> {
        let tables = self.tables.read().await;
        Ok(match tables.replies_by_parent.get(&parent_id) {
            Some(ids) => tables.collect_comments(ids.iter()),
            None => Vec::new(),
        })
    }

    async fn vote(&self, comment_id: Uuid, vote: Vote) -> Result<Comment> {
        let mut tables = self.tables.write().await;
        let comment = tables
            .comments
            .get_mut(&comment_id)
            .ok_or_else(|| DiscussionError::not_found("comment", comment_id))?;
        comment.apply_vote(vote);

        tracing::debug!("[MemoryStore] {:?} on comment {}", vote, comment_id);
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<DeleteReport> {
        let now = get_current_timestamp();
        let mut tables = self.tables.write().await;
        let (room_id, parent_id) = match tables.comments.get(&id) {
            Some(comment) => (comment.discussion_room, comment.parent),
            None => return Err(DiscussionError::not_found("comment", id)),
        };

        let doomed = tables.subtree(id);
        tables.remove_comments(room_id, &doomed);

        if let Some(parent_id) = parent_id {
            if let Some(siblings) = tables.replies_by_parent.get_mut(&parent_id) {
                siblings.retain(|sibling| *sibling != id);
            }
            if let Some(parent) = tables.comments.get_mut(&parent_id) {
                parent.remove_reply();
            }
        }

        if let Some(room) = tables.rooms.get_mut(&room_id) {
            room.adjust_comment_count(-i32::try_from(doomed.len()).unwrap_or(i32::MAX));
            room.updated_at = Some(now);
        }

        let report = DeleteReport { rooms: 0, comments: doomed.len() as u64, keywords_detached: 0 };
        tracing::debug!("[MemoryStore] Deleted comment {}: {:?}", id, report);
        Ok(report)
    }
}

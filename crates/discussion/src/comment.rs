use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use trendly_common::{hash_password, PASSWORD_MAX_CHARS};
use trendly_database::{check_max_length, check_not_empty, ConstraintViolation, SqlxObject};

use crate::DiscussionRoom;

#[derive(Clone, Debug, Serialize, Deserialize, SqlxObject)]
#[table_name = "comments"]
#[check = "\"is_sub_comment\" = (\"parent\" IS NOT NULL)"]
pub struct Comment {
    pub id: Uuid,

    #[foreign_key(referenced_table = "discussion_rooms", related_rust_type = "DiscussionRoom", on_delete = "cascade")]
    pub discussion_room: Uuid,

    #[max_length(40)]
    pub ip_addr: Option<String>,
    #[max_length(40)]
    pub user: String,
    // salted digest, see `trendly_common::hash_password`
    #[serde(default, skip_serializing)]
    #[max_length(128)]
    pub password: String,
    #[max_length(40)]
    pub nick: String,
    #[max_length(400)]
    pub comment: String,

    #[non_negative]
    #[sql_default = "0"]
    pub sub_comment_count: i32,
    #[sql_default = "false"]
    pub is_sub_comment: bool,
    #[foreign_key(referenced_table = "comments", related_rust_type = "Comment", on_delete = "cascade")]
    pub parent: Option<Uuid>,

    pub created_at: i64,
    #[sequence]
    pub seq: i64,

    #[non_negative]
    #[sql_default = "0"]
    pub like_count: i32,
    #[non_negative]
    #[sql_default = "0"]
    pub dislike_count: i32,
}

/// What a visitor submits when posting. `parent` makes it a reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewComment {
    pub ip_addr: Option<String>,
    pub user: String,
    pub password: String,
    pub nick: String,
    pub comment: String,
    pub parent: Option<Uuid>,
}

impl NewComment {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        nick: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            ip_addr: None,
            user: user.into(),
            password: password.into(),
            nick: nick.into(),
            comment: comment.into(),
            parent: None,
        }
    }

    pub fn reply_to(mut self, parent: Uuid) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn from_ip(mut self, ip_addr: impl Into<String>) -> Self {
        self.ip_addr = Some(ip_addr.into());
        self
    }

    /// Checks the submitted password and replaces it with its digest.
    pub fn into_comment(self, discussion_room: Uuid) -> Result<Comment, ConstraintViolation> {
        check_not_empty("comments", "password", &self.password)?;
        check_max_length("comments", "password", &self.password, PASSWORD_MAX_CHARS)?;

        Ok(Comment {
            id: Uuid::nil(),
            discussion_room,
            ip_addr: self.ip_addr,
            user: self.user,
            password: hash_password(&self.password),
            nick: self.nick,
            comment: self.comment,
            sub_comment_count: 0,
            is_sub_comment: self.parent.is_some(),
            parent: self.parent,
            created_at: 0,
            seq: 0,
            like_count: 0,
            dislike_count: 0,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    Like,
    Dislike,
}

impl Vote {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Vote::Like => "like_count",
            Vote::Dislike => "dislike_count",
        }
    }
}

impl Comment {
    pub fn verify_password(&self, password: &str) -> anyhow::Result<bool> {
        trendly_common::verify_password(password, &self.password)
    }

    pub(crate) fn add_reply(&mut self) {
        self.sub_comment_count = self.sub_comment_count.saturating_add(1);
    }

    pub(crate) fn remove_reply(&mut self) {
        self.sub_comment_count = (self.sub_comment_count - 1).max(0);
    }

    pub(crate) fn apply_vote(&mut self, vote: Vote) {
        match vote {
            Vote::Like => self.like_count = self.like_count.saturating_add(1),
            Vote::Dislike => self.dislike_count = self.dislike_count.saturating_add(1),
        }
    }
}

use serde::{Deserialize, Serialize};
use sqlx::types::{Json, Uuid};
use trendly_database::SqlxObject;

/// Sentiment counts supplied by the caller; computing them is out of scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentTally {
    pub positive: i32,
    pub neutral: i32,
    pub negative: i32,
}

/// One entry of a room's sentiment history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    pub taken_at: i64,
    pub positive: i32,
    pub neutral: i32,
    pub negative: i32,
}

impl SentimentSnapshot {
    pub fn new(taken_at: i64, tally: SentimentTally) -> Self {
        Self {
            taken_at,
            positive: tally.positive,
            neutral: tally.neutral,
            negative: tally.negative,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, SqlxObject)]
#[table_name = "discussion_rooms"]
pub struct DiscussionRoom {
    pub id: Uuid,

    #[max_length(30)]
    pub keyword: String,
    #[sql_default = "'[]'"]
    pub keyword_id_list: Json<Vec<Uuid>>,

    #[sql_default = "false"]
    pub is_closed: bool,

    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub closed_at: Option<i64>,

    #[non_negative]
    #[sql_default = "0"]
    pub comment_count: Option<i32>,
    #[max_length(400)]
    pub comment_summary: Option<String>,

    #[non_negative]
    #[sql_default = "0"]
    pub positive_count: i32,
    #[non_negative]
    #[sql_default = "0"]
    pub neutral_count: i32,
    #[non_negative]
    #[sql_default = "0"]
    pub negative_count: i32,

    #[sql_default = "'[]'"]
    pub sentiment_snapshot: Json<Vec<SentimentSnapshot>>,
}

impl DiscussionRoom {
    pub fn new(keyword: impl Into<String>, keyword_id_list: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::nil(),
            keyword: keyword.into(),
            keyword_id_list: Json(keyword_id_list),
            is_closed: false,
            created_at: 0,
            updated_at: None,
            closed_at: None,
            comment_count: Some(0),
            comment_summary: None,
            positive_count: 0,
            neutral_count: 0,
            negative_count: 0,
            sentiment_snapshot: Json(Vec::new()),
        }
    }

    pub fn comment_count(&self) -> i32 {
        self.comment_count.unwrap_or(0)
    }

    pub(crate) fn adjust_comment_count(&mut self, delta: i32) {
        self.comment_count = Some((self.comment_count() + delta).max(0));
    }

    /// Overwrites the counters and appends a snapshot taken at `now`.
    pub(crate) fn apply_sentiment(&mut self, tally: SentimentTally, summary: Option<String>, now: i64) {
        self.positive_count = tally.positive;
        self.neutral_count = tally.neutral;
        self.negative_count = tally.negative;
        self.sentiment_snapshot.0.push(SentimentSnapshot::new(now, tally));
        if let Some(summary) = summary {
            self.comment_summary = Some(summary);
        }
    }

    /// Resets the fields the store owns at creation time.
    pub(crate) fn reset_for_open(&mut self) {
        self.is_closed = false;
        self.closed_at = None;
        self.updated_at = None;
        self.comment_count = Some(0);
    }
}

use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use trendly_database::SqlxObject;

use crate::DiscussionRoom;

/// A tracked trending term. `rank` is its position in the trend list at the
/// time it was tracked.
#[derive(Clone, Debug, Serialize, Deserialize, SqlxObject)]
#[table_name = "keywords"]
pub struct Keyword {
    pub id: Uuid,

    #[max_length(30)]
    #[indexed]
    pub keyword: String,
    pub rank: i16,

    pub created_at: i64,
    // insertion order within one `created_at` second
    #[sequence]
    pub seq: i64,

    pub type1: serde_json::Value,
    #[max_length(1200)]
    pub type2: String,
    #[max_length(2000)]
    pub type3: String,

    #[max_length(30)]
    pub category: String,
    pub references: Option<serde_json::Value>,

    #[foreign_key(referenced_table = "discussion_rooms", related_rust_type = "DiscussionRoom", on_delete = "set_null")]
    pub current_discussion_room: Option<Uuid>,
}

impl Keyword {
    pub fn new(
        keyword: impl Into<String>,
        rank: i16,
        category: impl Into<String>,
        type1: serde_json::Value,
        type2: impl Into<String>,
        type3: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            keyword: keyword.into(),
            rank,
            created_at: 0,
            seq: 0,
            type1,
            type2: type2.into(),
            type3: type3.into(),
            category: category.into(),
            references: None,
            current_discussion_room: None,
        }
    }

    pub fn with_references(mut self, references: serde_json::Value) -> Self {
        self.references = Some(references);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trendly_database::{ConstraintViolation, SqlxSchema, Validate};

    #[test]
    fn keyword_text_is_indexed() {
        assert_eq!(
            Keyword::INDEXES_SQL,
            &["CREATE INDEX IF NOT EXISTS \"idx_keywords_keyword\" ON \"keywords\"(\"keyword\")"]
        );
    }

    #[test]
    fn current_room_is_cleared_when_room_goes() {
        let ddl = Keyword::create_table_sql();
        assert!(ddl.contains(
            "FOREIGN KEY (\"current_discussion_room\") REFERENCES \"discussion_rooms\"(\"id\") ON DELETE SET NULL"
        ));
        assert!(ddl.contains("\"current_discussion_room\" UUID,"));
        assert!(ddl.contains("\"references\" JSONB,"));
        assert!(ddl.contains("\"rank\" SMALLINT NOT NULL"));
        assert!(ddl.contains("\"type2\" VARCHAR(1200) NOT NULL"));
        assert!(ddl.contains("\"type3\" VARCHAR(2000) NOT NULL"));
    }

    #[test]
    fn seq_is_assigned_by_the_database() {
        assert!(Keyword::create_table_sql().contains("\"seq\" BIGINT GENERATED BY DEFAULT AS IDENTITY"));
        assert!(Keyword::insert_sql().starts_with("INSERT INTO \"keywords\" (\"keyword\", \"rank\", \"type1\","));
        assert!(Keyword::SELECT_COLUMNS.contains("\"seq\""));
    }

    #[test]
    fn new_keyword_has_no_room() {
        let kw = Keyword::new("bitcoin", 1, "finance", json!({"src": "naver"}), "", "")
            .with_references(json!(["https://example.com"]));
        assert!(kw.current_discussion_room.is_none());
        assert!(kw.references.is_some());
        assert!(kw.validate().is_ok());
    }

    #[test]
    fn long_keyword_is_rejected() {
        let kw = Keyword::new("k".repeat(31), 1, "finance", json!(null), "", "");
        assert!(matches!(
            kw.validate(),
            Err(ConstraintViolation::TooLong { column: "keyword", max: 30, actual: 31, .. })
        ));
    }
}

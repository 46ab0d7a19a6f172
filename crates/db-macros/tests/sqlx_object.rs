use sqlx::types::{Json, Uuid};
use trendly_database::{ConstraintViolation, SqlxObject, SqlxSchema, Validate};

#[derive(Clone, Debug, SqlxObject)]
#[table_name = "boards"]
pub struct Board {
    pub id: Uuid,
    #[max_length(30)]
    #[indexed]
    pub title: String,
    #[sql_default = "false"]
    pub is_closed: bool,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    #[non_negative]
    #[sql_default = "0"]
    pub post_count: Option<i32>,
}

#[derive(Clone, Debug, SqlxObject)]
#[table_name = "posts"]
#[check = "\"is_reply\" = (\"parent\" IS NOT NULL)"]
pub struct Post {
    pub id: Uuid,
    #[foreign_key(referenced_table = "boards", related_rust_type = "Board", on_delete = "cascade")]
    pub board: Uuid,
    #[foreign_key(referenced_table = "posts", related_rust_type = "Post", on_delete = "cascade")]
    pub parent: Option<Uuid>,
    pub is_reply: bool,
    #[max_length(400)]
    pub body: String,
    #[max_length(40)]
    pub author_ip: Option<String>,
    #[non_negative]
    pub like_count: i32,
    #[sequence]
    pub seq: i64,
    pub created_at: i64,
}

#[derive(Clone, Debug, SqlxObject)]
#[table_name = "tags"]
pub struct Tag {
    pub id: Uuid,
    #[max_length(30)]
    #[unique]
    pub label: String,
    #[foreign_key(referenced_table = "boards", related_rust_type = "Board")]
    pub board: Option<Uuid>,
    #[sql_default = "'[]'"]
    pub related: Json<Vec<Uuid>>,
    pub extra: Option<serde_json::Value>,
    pub created_at: i64,
}

fn post(body: &str) -> Post {
    Post {
        id: Uuid::nil(),
        board: Uuid::nil(),
        parent: None,
        is_reply: false,
        body: body.to_string(),
        author_ip: None,
        like_count: 0,
        seq: 0,
        created_at: 0,
    }
}

#[test]
fn bounded_strings_become_varchar() {
    let ddl = Board::create_table_sql();
    assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"boards\" ("));
    assert!(ddl.contains("\"id\" UUID PRIMARY KEY DEFAULT gen_random_uuid()"));
    assert!(ddl.contains("\"title\" VARCHAR(30) NOT NULL"));
    assert!(Post::create_table_sql().contains("\"author_ip\" VARCHAR(40),"));
}

#[test]
fn timestamps_are_database_managed() {
    let ddl = Board::create_table_sql();
    assert!(ddl.contains("\"created_at\" BIGINT NOT NULL DEFAULT floor(extract(epoch from now()))"));
    assert!(ddl.contains("\"updated_at\" BIGINT,"));

    assert_eq!(
        Board::insert_sql(),
        "INSERT INTO \"boards\" (\"title\", \"is_closed\", \"post_count\") VALUES ($1, $2, $3) \
         RETURNING \"id\", \"title\", \"is_closed\", \"created_at\", \"updated_at\", \"post_count\""
    );
    assert_eq!(
        Board::update_by_id_sql(),
        "UPDATE \"boards\" SET \"title\" = $1, \"is_closed\" = $2, \"post_count\" = $3 WHERE \"id\" = $4 \
         RETURNING \"id\", \"title\", \"is_closed\", \"created_at\", \"updated_at\", \"post_count\""
    );

    let trigger = Board::trigger_sql();
    assert!(trigger.contains("CREATE TRIGGER set_updated_at_boards BEFORE UPDATE ON \"boards\""));
    assert!(Post::trigger_sql().is_empty());
}

#[test]
fn sequence_columns_are_identity_and_never_bound() {
    let ddl = Post::create_table_sql();
    assert!(ddl.contains("\"seq\" BIGINT GENERATED BY DEFAULT AS IDENTITY,"));
    assert!(!ddl.contains("\"seq\" BIGINT NOT NULL"));

    let insert = Post::insert_sql();
    assert!(insert.starts_with(
        "INSERT INTO \"posts\" (\"board\", \"parent\", \"is_reply\", \"body\", \"author_ip\", \"like_count\") \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING"
    ));
    assert!(insert.ends_with("\"like_count\", \"seq\", \"created_at\""));
    assert!(!Post::update_by_id_sql().contains("\"seq\" ="));
}

#[test]
fn defaults_and_non_negative_checks() {
    let ddl = Board::create_table_sql();
    assert!(ddl.contains("\"is_closed\" BOOLEAN NOT NULL DEFAULT false"));
    assert!(ddl.contains("\"post_count\" INTEGER DEFAULT 0 CHECK (\"post_count\" >= 0)"));
    assert!(Post::create_table_sql().contains("\"like_count\" INTEGER NOT NULL CHECK (\"like_count\" >= 0)"));
}

#[test]
fn foreign_keys_carry_delete_actions() {
    let ddl = Post::create_table_sql();
    assert!(ddl.contains("FOREIGN KEY (\"board\") REFERENCES \"boards\"(\"id\") ON DELETE CASCADE ON UPDATE CASCADE"));
    assert!(ddl.contains("FOREIGN KEY (\"parent\") REFERENCES \"posts\"(\"id\") ON DELETE CASCADE ON UPDATE CASCADE"));
    assert!(ddl.contains("CHECK (\"is_reply\" = (\"parent\" IS NOT NULL))"));

    let tag_ddl = Tag::create_table_sql();
    assert!(tag_ddl.contains("FOREIGN KEY (\"board\") REFERENCES \"boards\"(\"id\") ON DELETE SET NULL ON UPDATE CASCADE"));
    assert!(tag_ddl.contains("\"label\" VARCHAR(30) NOT NULL UNIQUE"));
    assert!(tag_ddl.contains("\"related\" JSONB NOT NULL DEFAULT '[]'"));
    assert!(tag_ddl.contains("\"extra\" JSONB,"));
}

#[test]
fn indexes_are_named_after_table_and_column() {
    assert_eq!(
        Board::INDEXES_SQL,
        &["CREATE INDEX IF NOT EXISTS \"idx_boards_title\" ON \"boards\"(\"title\")"]
    );
    assert!(Post::INDEXES_SQL.is_empty());
}

#[test]
fn select_columns_are_quoted() {
    assert_eq!(Tag::SELECT_COLUMNS, "\"id\", \"label\", \"board\", \"related\", \"extra\", \"created_at\"");
    assert_eq!(Tag::COLUMNS.len(), 6);
    assert_eq!(Tag::TABLE_NAME, "tags");
}

#[test]
fn validate_rejects_over_length_text() {
    assert!(post(&"a".repeat(400)).validate().is_ok());
    assert_eq!(
        post(&"a".repeat(401)).validate(),
        Err(ConstraintViolation::TooLong { table: "posts", column: "body", max: 400, actual: 401 })
    );

    let mut with_ip = post("hi");
    with_ip.author_ip = Some("x".repeat(41));
    assert!(matches!(with_ip.validate(), Err(ConstraintViolation::TooLong { column: "author_ip", .. })));
}

#[test]
fn validate_rejects_negative_counters() {
    let mut negative = post("hi");
    negative.like_count = -1;
    assert_eq!(
        negative.validate(),
        Err(ConstraintViolation::Negative { table: "posts", column: "like_count", value: -1 })
    );

    let board = Board {
        id: Uuid::nil(),
        title: "rust".into(),
        is_closed: false,
        created_at: 0,
        updated_at: None,
        post_count: Some(-3),
    };
    assert!(matches!(board.validate(), Err(ConstraintViolation::Negative { column: "post_count", .. })));
}

mod comment;
mod error;
mod keyword;
mod room;
pub mod store;

pub use comment::{Comment, CommentRowSqlx, NewComment, Vote};
pub use error::{DiscussionError, Result};
pub use keyword::{Keyword, KeywordRowSqlx};
pub use room::{DiscussionRoom, DiscussionRoomRowSqlx, SentimentSnapshot, SentimentTally};
pub use store::{DeleteReport, DiscussionStore, MemoryStore, PgDiscussionStore, PostgresClient};

use sqlx::types::Uuid;
use thiserror::Error;
use trendly_database::{ConstraintViolation, DatabaseError};

#[derive(Error, Debug)]
pub enum DiscussionError {
    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("discussion room {0} is closed")]
    RoomClosed(Uuid),

    #[error("discussion room {0} is already closed")]
    RoomAlreadyClosed(Uuid),

    #[error("parent comment {parent} does not belong to discussion room {room}")]
    ParentInOtherRoom { parent: Uuid, room: Uuid },

    #[error(transparent)]
    Database(DatabaseError),
}

impl DiscussionError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        DiscussionError::NotFound { entity, id }
    }
}

impl From<DatabaseError> for DiscussionError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Constraint(violation) => DiscussionError::Constraint(violation),
            other => DiscussionError::Database(other),
        }
    }
}

impl From<sqlx::Error> for DiscussionError {
    fn from(err: sqlx::Error) -> Self {
        DiscussionError::Database(DatabaseError::Sqlx(err))
    }
}

pub type Result<T> = std::result::Result<T, DiscussionError>;

use thiserror::Error;

use crate::ConstraintViolation;

const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Constraint violation: {0}")]
    Constraint(#[from] ConstraintViolation),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DatabaseError {
    fn sqlstate(&self) -> Option<String> {
        match self {
            DatabaseError::Sqlx(sqlx::Error::Database(db_err)) => db_err.code().map(|c| c.into_owned()),
            _ => None,
        }
    }

    /// True when Postgres rejected a row because a referenced row is missing.
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate().as_deref() == Some(FOREIGN_KEY_VIOLATION)
    }

    pub fn is_check_violation(&self) -> bool {
        self.sqlstate().as_deref() == Some(CHECK_VIOLATION)
    }
}

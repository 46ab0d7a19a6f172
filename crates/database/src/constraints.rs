use thiserror::Error;

/// A column value that the schema would reject.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    #[error("{table}.{column} is {actual} characters long, exceeding max_length {max}")]
    TooLong {
        table: &'static str,
        column: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("{table}.{column} must not be empty")]
    Empty {
        table: &'static str,
        column: &'static str,
    },

    #[error("{table}.{column} must be non-negative, got {value}")]
    Negative {
        table: &'static str,
        column: &'static str,
        value: i64,
    },
}

/// Column-level checks that mirror the DDL, run before any write.
pub trait Validate {
    fn validate(&self) -> Result<(), ConstraintViolation>;
}

/// Lengths are counted in characters, the way VARCHAR(n) counts them.
pub fn check_max_length(
    table: &'static str,
    column: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ConstraintViolation> {
    let actual = value.chars().count();
    if actual > max {
        return Err(ConstraintViolation::TooLong { table, column, max, actual });
    }
    Ok(())
}

pub fn check_not_empty(table: &'static str, column: &'static str, value: &str) -> Result<(), ConstraintViolation> {
    if value.is_empty() {
        return Err(ConstraintViolation::Empty { table, column });
    }
    Ok(())
}

pub fn check_non_negative(table: &'static str, column: &'static str, value: i64) -> Result<(), ConstraintViolation> {
    if value < 0 {
        return Err(ConstraintViolation::Negative { table, column, value });
    }
    Ok(())
}

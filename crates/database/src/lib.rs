mod constraints;
mod env;
mod error;
mod postgres_connect;
mod sqlx_postgres;

pub use constraints::*;
pub use env::*;
pub use error::DatabaseError;
pub use postgres_connect::*;
pub use sqlx_postgres::*;

pub use trendly_common::EnvVars;
pub use trendly_db_macros::SqlxObject;

#[doc(hidden)]
pub mod __private {
    pub use sqlx;
    pub use tokio;
    pub use tracing;
}

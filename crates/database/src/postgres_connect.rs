use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{DatabaseError, PostgresEnv, SqlxSchema, UPDATED_AT_TRIGGER_FUNCTION_SQL};

pub async fn connect_pool(env: &PostgresEnv) -> Result<PgPool, DatabaseError> {
    let pool = PgPoolOptions::new()
        .max_connections(env.max_connections)
        .connect(&env.database_url)
        .await?;
    tracing::info!("[Postgres] Connected (max_connections = {})", env.max_connections);
    Ok(pool)
}

/// Creates the `updated_at` trigger function shared by every table.
pub async fn create_trigger_function(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::query(UPDATED_AT_TRIGGER_FUNCTION_SQL).execute(pool).await?;
    Ok(())
}

/// Creates the table, its trigger and its indexes. Referenced tables must exist first.
pub async fn create_table<T: SqlxSchema>(pool: &PgPool) -> Result<(), DatabaseError> {
    let create_table_sql = T::create_table_sql();
    sqlx::query(&create_table_sql).execute(pool).await?;

    let trigger_sql = T::trigger_sql();
    for statement in trigger_sql.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement).execute(pool).await?;
    }

    for index_sql in T::indexes_sql() {
        sqlx::query(index_sql).execute(pool).await?;
    }

    tracing::debug!("[Postgres] Table '{}' ready", T::table_name());
    Ok(())
}

pub async fn drop_table<T: SqlxSchema>(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::query(&T::drop_table_sql()).execute(pool).await?;
    tracing::debug!("[Postgres] Table '{}' dropped", T::table_name());
    Ok(())
}

/// Declares the process-wide pool for a list of schema types.
///
/// Types are created and migrated in the order given, so referenced tables
/// must come before the tables pointing at them. Drops run in reverse.
///
/// # Generated Functions
/// - `pub async fn connect(drop_tables: bool, create_tables: bool, run_migrations: bool)
///   -> Result<&'static PgPool, DatabaseError>`
///
/// # Example
/// ```rust,ignore
/// init_databases!(default: [DiscussionRoom, Keyword, Comment]);
///
/// let pool = connect(false, true, false).await?;
/// ```
#[macro_export]
macro_rules! init_databases {
    (
        default: [$($default_type:ty),* $(,)?]
    ) => {
        static POOL: $crate::__private::tokio::sync::OnceCell<$crate::__private::sqlx::PgPool> =
            $crate::__private::tokio::sync::OnceCell::const_new();

        pub async fn connect(
            drop_tables: bool,
            create_tables: bool,
            run_migrations: bool,
        ) -> ::std::result::Result<&'static $crate::__private::sqlx::PgPool, $crate::DatabaseError> {
            POOL.get_or_try_init(|| async {
                let env = <$crate::PostgresEnv as $crate::EnvVars>::load()
                    .map_err(|e| $crate::DatabaseError::Config(e.to_string()))?;
                let pool = $crate::connect_pool(&env).await?;

                if drop_tables {
                    let mut drops: ::std::vec::Vec<(&'static str, ::std::string::String)> = ::std::vec::Vec::new();
                    $(
                        drops.push((
                            stringify!($default_type),
                            <$default_type as $crate::SqlxSchema>::drop_table_sql(),
                        ));
                    )*
                    for (type_name, drop_sql) in drops.into_iter().rev() {
                        $crate::__private::tracing::warn!("[Postgres] Dropping table for '{}'", type_name);
                        $crate::__private::sqlx::query(&drop_sql).execute(&pool).await?;
                    }
                }

                if create_tables {
                    $crate::create_trigger_function(&pool).await?;
                    $(
                        $crate::create_table::<$default_type>(&pool).await?;
                    )*
                }

                if run_migrations {
                    $(
                        <$default_type as $crate::SchemaMigrator>::migrate(&pool).await?;
                    )*
                }

                ::std::result::Result::Ok::<_, $crate::DatabaseError>(pool)
            }).await
        }
    };
}

use sqlx::{FromRow, Postgres, Error as SqlxError, postgres::PgArguments, Executor};

use crate::{DatabaseError, Validate};

/// Keeps `updated_at` current on every UPDATE for tables that carry one.
pub const UPDATED_AT_TRIGGER_FUNCTION_SQL: &str = r#"
CREATE OR REPLACE FUNCTION set_updated_at_unix_timestamp()
RETURNS TRIGGER AS $$
BEGIN NEW.updated_at = floor(extract(epoch from now())); RETURN NEW; END;
$$ language 'plpgsql';
"#;

/// Trait to define the schema of a database object for PostgreSQL.
pub trait SqlxSchema: Send + Sync + Unpin + Clone + std::fmt::Debug {
    /// The type of the primary key for this database object.
    type Id: Send + Sync + Clone + 'static + for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres>;

    /// The intermediate type that implements FromRow, used for fetching from the database.
    type Row: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin;

    const TABLE_NAME: &'static str;
    const ID_COLUMN_NAME: &'static str;
    const COLUMNS: &'static [&'static str];
    /// `COLUMNS` quoted and comma separated, ready for a SELECT list.
    const SELECT_COLUMNS: &'static str;
    const INDEXES_SQL: &'static [&'static str];

    fn id_column_name() -> &'static str { Self::ID_COLUMN_NAME }
    fn table_name() -> &'static str { Self::TABLE_NAME }
    fn columns() -> &'static [&'static str] { Self::COLUMNS }
    fn indexes_sql() -> &'static [&'static str] { Self::INDEXES_SQL }

    /// Retrieves the value of the primary key for an instance of the object.
    fn get_id_value(&self) -> Self::Id;

    /// Converts the intermediate Row type to the Self type.
    fn from_row(row: Self::Row) -> Self;

    fn create_table_sql() -> String;
    fn drop_table_sql() -> String;
    fn insert_sql() -> String;
    fn update_by_id_sql() -> String;
    fn delete_by_id_sql() -> String;
    fn trigger_sql() -> String;
}

/// Create, update and delete by primary key. Writes are validated first.
#[async_trait::async_trait]
pub trait SqlxCrud: SqlxSchema + SqlxFilterQuery + Validate + Sized {
    /// Binds the struct fields to an insert query.
    fn bind_insert<'q>(&self, query: sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>)
        -> sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>;

    /// Binds the struct fields to an update query, primary key last.
    fn bind_update<'q>(&self, query: sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>)
        -> sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>;

    /// Inserts the record. The database assigns `id` and `created_at`.
    async fn create<'e, E>(self, executor: E) -> Result<Self, DatabaseError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send;

    /// Updates every writable column of the record identified by its primary key.
    async fn update<'e, E>(self, executor: E) -> Result<Self, DatabaseError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send;

    /// Deletes the record; dependent rows follow the table's ON DELETE actions.
    async fn delete<'e, E>(self, executor: E) -> Result<u64, DatabaseError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send;
}

/// Specifies the direction for ordering query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

// --- Filtering Structures and Trait ---

/// A type-erased value that can be appended to a Postgres argument list.
pub trait AsSqlxArg: Send + Sync {
    fn add_to_args(&self, args: &mut PgArguments) -> Result<(), SqlxError>;
}

impl<T> AsSqlxArg for T
where
    T: for<'a> sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
{
    fn add_to_args(&self, args: &mut PgArguments) -> Result<(), SqlxError> {
        use sqlx::Arguments;
        args.add(self.clone()).map_err(SqlxError::Encode)
    }
}

/// Represents a single filter condition for a database query.
pub struct FilterCondition {
    pub column: &'static str,
    pub operator: &'static str,
    /// Holds the value for the condition's placeholder, if any.
    pub value: Option<Box<dyn AsSqlxArg>>,
}

/// Filters, ordering and paging for a generated SELECT or DELETE.
#[derive(Default)]
pub struct QueryCriteria {
    pub conditions: Vec<FilterCondition>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order_by: Vec<(&'static str, OrderDirection)>,
    pub for_update: bool,
}

impl QueryCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter condition that may or may not have a value.
    /// Value-less conditions are used for operators like `IS NULL`.
    pub fn add_filter<V>(mut self, column: &'static str, operator: &'static str, value: Option<V>) -> Self
    where
        V: for<'a> sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
    {
        self.conditions.push(FilterCondition {
            column,
            operator,
            value: value.map(|v| Box::new(v) as Box<dyn AsSqlxArg>),
        });
        self
    }

    pub fn add_valued_filter<V>(self, column: &'static str, operator: &'static str, value: V) -> Self
    where
        V: for<'a> sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
    {
        self.add_filter(column, operator, Some(value))
    }

    pub fn limit(mut self, limit_val: i64) -> Self {
        self.limit = Some(limit_val);
        self
    }

    pub fn offset(mut self, offset_val: i64) -> Self {
        self.offset = Some(offset_val);
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: OrderDirection) -> Self {
        self.order_by.push((column, direction));
        self
    }

    /// Locks the selected rows until the surrounding transaction ends.
    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    /// Appends ` WHERE ...` for the conditions (if any) and binds their values
    /// starting at `$first_placeholder`. Returns the next free placeholder index.
    pub fn push_where_clause(
        &self,
        sql: &mut String,
        arguments: &mut PgArguments,
        first_placeholder: usize,
    ) -> Result<usize, SqlxError> {
        let mut placeholder_idx = first_placeholder;
        let mut where_clauses = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            let mut current_condition_sql = format!("\"{}\" {}", condition.column, condition.operator);
            if let Some(value) = &condition.value {
                value.add_to_args(arguments)?;
                current_condition_sql.push_str(&format!(" ${}", placeholder_idx));
                placeholder_idx += 1;
            }
            where_clauses.push(current_condition_sql);
        }
        if !where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clauses.join(" AND "));
        }
        Ok(placeholder_idx)
    }
}

/// Trait for finding records based on dynamic filter criteria.
#[async_trait::async_trait]
pub trait SqlxFilterQuery: SqlxSchema + Sized {
    async fn find_by_criteria<'e, E>(
        criteria: QueryCriteria,
        executor: E,
    ) -> Result<Vec<Self>, DatabaseError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send;

    /// Finds a single optional record. Adds `LIMIT 1` unless a limit is set.
    async fn find_one_by_criteria<'e, E>(
        mut criteria: QueryCriteria,
        executor: E,
    ) -> Result<Option<Self>, DatabaseError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send
    {
        if criteria.limit.is_none() {
            criteria = criteria.limit(1);
        };
        let mut results = Self::find_by_criteria(criteria, executor).await?;
        Ok(results.pop())
    }

    async fn find_by_id<'e, E>(
        id: Self::Id,
        executor: E,
    ) -> Result<Option<Self>, DatabaseError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send
    {
        let criteria = QueryCriteria::new().add_valued_filter(Self::ID_COLUMN_NAME, "=", id);
        Self::find_one_by_criteria(criteria, executor).await
    }

    async fn delete_by_criteria<'e, E>(
        criteria: QueryCriteria,
        executor: E,
    ) -> Result<u64, DatabaseError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send;
}

#[async_trait::async_trait]
pub trait SchemaMigrator {
    /// Creates the table when missing, otherwise adds missing columns and
    /// reconciles nullability. Never drops or retypes columns.
    async fn migrate(pool: &sqlx::PgPool) -> Result<(), DatabaseError>;
}

/// Whether a declared column type and the `udt_name` Postgres reports agree.
pub fn sql_types_equivalent(struct_type: &str, db_type_raw: &str) -> bool {
    let struct_type_upper = struct_type.trim().to_uppercase();
    let db_type_upper = db_type_raw.trim().to_uppercase();

    if struct_type_upper.ends_with("[]") && db_type_upper.starts_with('_') {
        let struct_inner = struct_type_upper.trim_end_matches("[]");
        let db_inner = db_type_upper.trim_start_matches('_');
        return sql_types_equivalent(struct_inner, db_inner);
    }

    let struct_type_base = struct_type_upper.split(|c: char| c == '(' || c == '[').next().unwrap_or("").trim();

    if db_type_upper.starts_with(struct_type_base) {
        return true;
    }

    matches!(
        (struct_type_base, db_type_upper.as_str()),
        ("SMALLINT", "INT2")
            | ("INTEGER", "INT4")
            | ("BIGINT", "INT8")
            | ("REAL", "FLOAT4")
            | ("DOUBLE PRECISION", "FLOAT8")
            | ("BOOLEAN", "BOOL")
            | ("VARCHAR", "TEXT")
            | ("TEXT", "VARCHAR")
    )
}

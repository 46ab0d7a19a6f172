use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Ident, LitStr};
use super::types::FieldData;

const EPOCH_NOW_SQL: &str = "floor(extract(epoch from now()))";

fn lit(s: &str) -> LitStr {
    LitStr::new(s, proc_macro2::Span::call_site())
}

fn quoted_columns(active_fields: &[&FieldData]) -> String {
    active_fields.iter().map(|f| format!("\"{}\"", f.name)).collect::<Vec<String>>().join(", ")
}

pub fn generate_row_struct(row_struct_name: &Ident, fields_data: &[FieldData]) -> TokenStream {
    let row_struct_fields_defs: Vec<TokenStream> = fields_data.iter().filter(|f| !f.is_skipped).map(|field| {
        let field_ident = format_ident!("{}", field.name);
        let field_ty = &field.ty;
        quote! { pub #field_ident: #field_ty }
    }).collect();

    quote! {
        #[derive(::sqlx::FromRow, Debug, Clone)]
        #[automatically_derived]
        pub struct #row_struct_name {
            #(#row_struct_fields_defs),*
        }
    }
}

pub fn generate_sqlx_schema_impl(
    struct_name: &Ident,
    row_struct_name: &Ident,
    table_name_str: &str,
    fields_data: &[FieldData],
    table_checks: &[String],
) -> TokenStream {
    let active_fields: Vec<_> = fields_data.iter().filter(|f| !f.is_skipped).collect();
    let has_updated_at = active_fields.iter().any(|f| f.name == "updated_at");

    let all_sql_column_names_str_lits: Vec<LitStr> = active_fields.iter().map(|f| lit(&f.name)).collect();
    let select_columns = quoted_columns(&active_fields);

    let from_row_assignments = generate_from_row_assignments(fields_data);

    let (create_table_sql_query, create_index_sqls) = generate_create_table_sql(table_name_str, fields_data, table_checks);
    let drop_table_sql_query = format!("DROP TABLE IF EXISTS \"{}\" CASCADE", table_name_str);
    let insert_sql_query = generate_insert_sql(table_name_str, &active_fields);
    let update_sql_query = generate_update_sql(table_name_str, &active_fields);
    let delete_sql_query = format!("DELETE FROM \"{}\" WHERE \"id\" = $1", table_name_str);

    let trigger_sql_impl = if has_updated_at {
        let trigger_name = format!("set_updated_at_{}", table_name_str);
        format!(
            "DROP TRIGGER IF EXISTS {trigger} ON \"{table}\"; CREATE TRIGGER {trigger} BEFORE UPDATE ON \"{table}\" FOR EACH ROW EXECUTE PROCEDURE set_updated_at_unix_timestamp();",
            trigger = trigger_name,
            table = table_name_str
        )
    } else {
        "".to_string()
    };

    quote! {
        #[automatically_derived]
        impl ::trendly_database::SqlxSchema for #struct_name {
            type Id = ::sqlx::types::Uuid;
            type Row = #row_struct_name;

            const TABLE_NAME: &'static str = #table_name_str;
            const ID_COLUMN_NAME: &'static str = "id";
            const COLUMNS: &'static [&'static str] = &[#( #all_sql_column_names_str_lits ),*];
            const SELECT_COLUMNS: &'static str = #select_columns;
            const INDEXES_SQL: &'static [&'static str] = &[#( #create_index_sqls ),*];

            fn get_id_value(&self) -> Self::Id { self.id }

            fn from_row(row: Self::Row) -> Self {
                Self {
                    #(#from_row_assignments),*
                }
            }

            fn insert_sql() -> String { #insert_sql_query.to_string() }
            fn update_by_id_sql() -> String { #update_sql_query.to_string() }
            fn delete_by_id_sql() -> String { #delete_sql_query.to_string() }
            fn create_table_sql() -> String { #create_table_sql_query.to_string() }
            fn drop_table_sql() -> String { #drop_table_sql_query.to_string() }
            fn trigger_sql() -> String { #trigger_sql_impl.to_string() }
        }
    }
}

pub fn generate_validate_impl(struct_name: &Ident, table_name_str: &str, fields_data: &[FieldData]) -> TokenStream {
    let checks: Vec<TokenStream> = fields_data.iter().filter(|f| !f.is_skipped).flat_map(|field| {
        let field_ident = format_ident!("{}", field.name);
        let column = &field.name;
        let mut out = Vec::new();

        if let Some(max) = field.max_length {
            out.push(if field.is_option {
                quote! {
                    if let Some(value) = &self.#field_ident {
                        ::trendly_database::check_max_length(#table_name_str, #column, value, #max)?;
                    }
                }
            } else {
                quote! { ::trendly_database::check_max_length(#table_name_str, #column, &self.#field_ident, #max)?; }
            });
        }

        if field.non_negative {
            out.push(if field.is_option {
                quote! {
                    if let Some(value) = self.#field_ident {
                        ::trendly_database::check_non_negative(#table_name_str, #column, i64::from(value))?;
                    }
                }
            } else {
                quote! { ::trendly_database::check_non_negative(#table_name_str, #column, i64::from(self.#field_ident))?; }
            });
        }
        out
    }).collect();

    quote! {
        #[automatically_derived]
        impl ::trendly_database::Validate for #struct_name {
            fn validate(&self) -> ::std::result::Result<(), ::trendly_database::ConstraintViolation> {
                #(#checks)*
                Ok(())
            }
        }
    }
}

pub fn generate_sqlx_crud_impl(struct_name: &Ident, fields_data: &[FieldData]) -> TokenStream {
    let bindings = generate_bind_streams(fields_data);

    quote! {
        #[automatically_derived]
        #[::async_trait::async_trait]
        impl ::trendly_database::SqlxCrud for #struct_name {
            fn bind_insert<'q>(
                &self,
                query: ::sqlx::query::QueryAs<'q, ::sqlx::Postgres, <Self as ::trendly_database::SqlxSchema>::Row, ::sqlx::postgres::PgArguments>
            ) -> ::sqlx::query::QueryAs<'q, ::sqlx::Postgres, <Self as ::trendly_database::SqlxSchema>::Row, ::sqlx::postgres::PgArguments> {
                query #(#bindings)*
            }

            fn bind_update<'q>(
                &self,
                query: ::sqlx::query::QueryAs<'q, ::sqlx::Postgres, <Self as ::trendly_database::SqlxSchema>::Row, ::sqlx::postgres::PgArguments>
            ) -> ::sqlx::query::QueryAs<'q, ::sqlx::Postgres, <Self as ::trendly_database::SqlxSchema>::Row, ::sqlx::postgres::PgArguments> {
                query #(#bindings)* .bind(self.id)
            }

            async fn create<'e, E>(self, executor: E) -> ::std::result::Result<Self, ::trendly_database::DatabaseError>
            where
                E: ::sqlx::Executor<'e, Database = ::sqlx::Postgres> + Send,
                Self: Send
            {
                ::trendly_database::Validate::validate(&self)?;
                let sql = <Self as ::trendly_database::SqlxSchema>::insert_sql();
                let row = self.bind_insert(::sqlx::query_as::<_, <Self as ::trendly_database::SqlxSchema>::Row>(&sql))
                    .fetch_one(executor)
                    .await?;
                Ok(<Self as ::trendly_database::SqlxSchema>::from_row(row))
            }

            async fn update<'e, E>(self, executor: E) -> ::std::result::Result<Self, ::trendly_database::DatabaseError>
            where
                E: ::sqlx::Executor<'e, Database = ::sqlx::Postgres> + Send,
                Self: Send
            {
                ::trendly_database::Validate::validate(&self)?;
                let sql = <Self as ::trendly_database::SqlxSchema>::update_by_id_sql();
                let row = self.bind_update(::sqlx::query_as::<_, <Self as ::trendly_database::SqlxSchema>::Row>(&sql))
                    .fetch_one(executor)
                    .await?;
                Ok(<Self as ::trendly_database::SqlxSchema>::from_row(row))
            }

            async fn delete<'e, E>(self, executor: E) -> ::std::result::Result<u64, ::trendly_database::DatabaseError>
            where
                E: ::sqlx::Executor<'e, Database = ::sqlx::Postgres> + Send,
                Self: Send
            {
                let sql = <Self as ::trendly_database::SqlxSchema>::delete_by_id_sql();
                let done = ::sqlx::query(&sql)
                    .bind(self.id)
                    .execute(executor)
                    .await?;
                Ok(done.rows_affected())
            }
        }
    }
}

pub fn generate_sqlx_filter_query_impl(struct_name: &Ident, row_struct_name: &Ident) -> TokenStream {
    quote! {
        #[automatically_derived]
        #[::async_trait::async_trait]
        impl ::trendly_database::SqlxFilterQuery for #struct_name {
            async fn find_by_criteria<'exe, E>(
                criteria: ::trendly_database::QueryCriteria,
                executor: E,
            ) -> ::std::result::Result<Vec<Self>, ::trendly_database::DatabaseError>
            where
                E: ::sqlx::Executor<'exe, Database = ::sqlx::Postgres> + Send,
                Self: Send,
            {
                use ::sqlx::Arguments;

                let mut arguments = ::sqlx::postgres::PgArguments::default();
                let mut sql = format!(
                    "SELECT {} FROM \"{}\"",
                    <Self as ::trendly_database::SqlxSchema>::SELECT_COLUMNS,
                    <Self as ::trendly_database::SqlxSchema>::TABLE_NAME
                );
                let mut placeholder_idx = criteria.push_where_clause(&mut sql, &mut arguments, 1)?;

                if !criteria.order_by.is_empty() {
                    let order_clauses: Vec<String> = criteria.order_by.iter()
                        .map(|&(col, dir)| format!("\"{}\" {}", col, dir.as_sql()))
                        .collect();
                    sql.push_str(&format!(" ORDER BY {}", order_clauses.join(", ")));
                }

                if let Some(limit_val) = criteria.limit {
                    arguments.add(limit_val).map_err(::sqlx::Error::Encode)?;
                    sql.push_str(&format!(" LIMIT ${}", placeholder_idx));
                    placeholder_idx += 1;
                }

                if let Some(offset_val) = criteria.offset {
                    arguments.add(offset_val).map_err(::sqlx::Error::Encode)?;
                    sql.push_str(&format!(" OFFSET ${}", placeholder_idx));
                }

                if criteria.for_update {
                    sql.push_str(" FOR UPDATE");
                }

                let rows = ::sqlx::query_as_with::<_, #row_struct_name, _>(&sql, arguments)
                    .fetch_all(executor)
                    .await?;
                Ok(rows.into_iter().map(<Self as ::trendly_database::SqlxSchema>::from_row).collect())
            }

            async fn delete_by_criteria<'exe, E>(
                criteria: ::trendly_database::QueryCriteria,
                executor: E,
            ) -> ::std::result::Result<u64, ::trendly_database::DatabaseError>
            where
                E: ::sqlx::Executor<'exe, Database = ::sqlx::Postgres> + Send,
                Self: Send,
            {
                let mut arguments = ::sqlx::postgres::PgArguments::default();
                let mut sql = format!("DELETE FROM \"{}\"", <Self as ::trendly_database::SqlxSchema>::TABLE_NAME);
                criteria.push_where_clause(&mut sql, &mut arguments, 1)?;

                let done = ::sqlx::query_with(&sql, arguments)
                    .execute(executor)
                    .await?;
                Ok(done.rows_affected())
            }
        }
    }
}

pub fn generate_fetch_helpers(struct_name: &Ident, fields_data: &[FieldData]) -> TokenStream {
    let fetch_helper_methods: Vec<TokenStream> = fields_data.iter().filter_map(|field| {
        let fk_info = field.foreign_key.as_ref()?;
        let field_ident = format_ident!("{}", field.name);
        let fetch_method_name = format_ident!("fetch_{}", field_ident);
        let related_type = &fk_info.related_rust_type;

        let lookup = if field.is_option {
            quote! {
                match self.#field_ident {
                    Some(id) => <#related_type as ::trendly_database::SqlxFilterQuery>::find_by_id(id, executor).await,
                    None => Ok(None),
                }
            }
        } else {
            quote! {
                <#related_type as ::trendly_database::SqlxFilterQuery>::find_by_id(self.#field_ident, executor).await
            }
        };

        Some(quote! {
            pub async fn #fetch_method_name<'exe, E>(
                &self,
                executor: E
            ) -> ::std::result::Result<Option<#related_type>, ::trendly_database::DatabaseError>
            where
                E: ::sqlx::Executor<'exe, Database = ::sqlx::Postgres> + Send,
            {
                #lookup
            }
        })
    }).collect();

    if fetch_helper_methods.is_empty() {
        return quote! {};
    }

    quote! {
        #[automatically_derived]
        impl #struct_name {
            #(#fetch_helper_methods)*
        }
    }
}

fn generate_from_row_assignments(fields_data: &[FieldData]) -> Vec<TokenStream> {
    fields_data.iter().map(|field| {
        let field_ident = format_ident!("{}", field.name);
        if field.is_skipped {
            quote! { #field_ident: Default::default() }
        } else {
            quote! { #field_ident: row.#field_ident }
        }
    }).collect()
}

fn column_definition(field: &FieldData) -> String {
    let quoted = format!("\"{}\"", field.name);

    if field.is_pk {
        return format!("{} {} PRIMARY KEY DEFAULT gen_random_uuid()", quoted, field.sql_type);
    }
    if field.name == "created_at" || (field.name == "updated_at" && !field.is_option) {
        return format!("{} BIGINT NOT NULL DEFAULT {}", quoted, EPOCH_NOW_SQL);
    }
    if field.name == "updated_at" {
        return format!("{} BIGINT", quoted);
    }
    if field.sequence {
        return field.identity_definition();
    }

    let mut col_def_parts = vec![quoted.clone(), field.sql_type.clone()];
    if !field.is_option {
        col_def_parts.push("NOT NULL".to_string());
    }
    if let Some(default) = &field.sql_default {
        col_def_parts.push(format!("DEFAULT {}", default));
    }
    if field.unique {
        col_def_parts.push("UNIQUE".to_string());
    }
    if field.non_negative {
        col_def_parts.push(format!("CHECK ({} >= 0)", quoted));
    }
    col_def_parts.join(" ")
}

fn generate_create_table_sql(table_name_str: &str, fields_data: &[FieldData], table_checks: &[String]) -> (String, Vec<LitStr>) {
    let mut create_table_parts: Vec<String> = Vec::new();
    let mut foreign_key_clauses: Vec<String> = Vec::new();
    let mut create_index_sqls: Vec<LitStr> = Vec::new();

    for field in fields_data.iter().filter(|f| !f.is_skipped) {
        create_table_parts.push(column_definition(field));

        if field.indexed {
            let index_name = format!("idx_{}_{}", table_name_str, field.name);
            let index_sql = format!(
                "CREATE INDEX IF NOT EXISTS \"{}\" ON \"{}\"(\"{}\")",
                index_name, table_name_str, field.name
            );
            create_index_sqls.push(lit(&index_sql));
        }

        if let Some(fk_info) = &field.foreign_key {
            foreign_key_clauses.push(format!(
                "FOREIGN KEY (\"{}\") REFERENCES \"{}\"(\"id\") {} ON UPDATE CASCADE",
                field.name, fk_info.referenced_table, fk_info.on_delete.as_sql()
            ));
        }
    }

    create_table_parts.extend(foreign_key_clauses);
    create_table_parts.extend(table_checks.iter().map(|check| format!("CHECK ({})", check)));

    let create_table_sql_query = format!("CREATE TABLE IF NOT EXISTS \"{}\" ({})", table_name_str, create_table_parts.join(", "));
    (create_table_sql_query, create_index_sqls)
}

fn generate_insert_sql(table_name_str: &str, active_fields: &[&FieldData]) -> String {
    let insert_col_sql_names: Vec<String> = active_fields.iter()
        .filter(|f| !f.is_db_managed())
        .map(|f| format!("\"{}\"", f.name))
        .collect();

    let all_sql_columns_joined_str = quoted_columns(active_fields);
    if insert_col_sql_names.is_empty() {
        return format!("INSERT INTO \"{}\" DEFAULT VALUES RETURNING {}", table_name_str, all_sql_columns_joined_str);
    }

    let insert_bind_placeholders_sql = (1..=insert_col_sql_names.len()).map(|i| format!("${}", i)).collect::<Vec<String>>().join(", ");
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING {}",
        table_name_str, insert_col_sql_names.join(", "), insert_bind_placeholders_sql, all_sql_columns_joined_str
    )
}

fn generate_update_sql(table_name_str: &str, active_fields: &[&FieldData]) -> String {
    let update_set_clauses_sql: Vec<String> = active_fields.iter()
        .filter(|f| !f.is_db_managed())
        .enumerate()
        .map(|(i, f)| format!("\"{}\" = ${}", f.name, i + 1))
        .collect();

    let all_sql_columns_joined_str = quoted_columns(active_fields);
    if update_set_clauses_sql.is_empty() {
        return format!("SELECT {} FROM \"{}\" WHERE \"id\" = $1", all_sql_columns_joined_str, table_name_str);
    }

    let pk_placeholder_idx = update_set_clauses_sql.len() + 1;
    format!(
        "UPDATE \"{}\" SET {} WHERE \"id\" = ${} RETURNING {}",
        table_name_str, update_set_clauses_sql.join(", "), pk_placeholder_idx, all_sql_columns_joined_str
    )
}

fn generate_bind_streams(fields_data: &[FieldData]) -> Vec<TokenStream> {
    fields_data.iter()
        .filter(|f| !f.is_skipped && !f.is_db_managed())
        .map(|field| {
            let field_ident = format_ident!("{}", field.name);
            quote! { .bind(self.#field_ident.clone()) }
        })
        .collect()
}

fn get_sql_default_value(field: &FieldData) -> String {
    if let Some(default) = &field.sql_default {
        return format!("DEFAULT {}", default);
    }

    let sql_type_upper = field.sql_type.to_uppercase();
    if sql_type_upper.ends_with("[]") {
        "DEFAULT '{}'".to_string()
    } else if sql_type_upper.starts_with("TEXT") || sql_type_upper.starts_with("VARCHAR") {
        "DEFAULT ''".to_string()
    } else if sql_type_upper.starts_with("SMALLINT") || sql_type_upper.starts_with("INT") || sql_type_upper.starts_with("BIGINT")
        || sql_type_upper.starts_with("REAL") || sql_type_upper.starts_with("DOUBLE") {
        "DEFAULT 0".to_string()
    } else if sql_type_upper.starts_with("BOOL") {
        "DEFAULT false".to_string()
    } else if sql_type_upper.starts_with("JSON") {
        "DEFAULT 'null'".to_string()
    } else if sql_type_upper.contains("TIMESTAMP") {
        "DEFAULT to_timestamp(0)".to_string()
    } else {
        "".to_string()
    }
}

pub fn generate_migrate_fn(struct_name: &Ident, table_name: &str, fields_data: &[FieldData]) -> TokenStream {
    let active_fields: Vec<_> = fields_data.iter().filter(|f| !f.is_skipped && !f.is_pk).collect();

    let add_column_logics = active_fields.iter().map(|field| {
        let col_name = &field.name;
        let mut add_sql_parts = vec![
            format!("ALTER TABLE \"{}\"", table_name),
            "ADD COLUMN".to_string(),
            format!("\"{}\"", col_name),
            field.sql_type.clone(),
        ];

        if !field.is_option {
            add_sql_parts.push("NOT NULL".to_string());
            let default_clause = get_sql_default_value(field);
            if !default_clause.is_empty() {
                add_sql_parts.push(default_clause);
            }
        } else if let Some(default) = &field.sql_default {
            add_sql_parts.push(format!("DEFAULT {}", default));
        }

        let add_sql = if field.sequence {
            format!("ALTER TABLE \"{}\" ADD COLUMN {}", table_name, field.identity_definition())
        } else {
            add_sql_parts.join(" ")
        };

        quote! {
            if !db_columns.contains_key(#col_name) {
                ::tracing::info!("[MIGRATE][ACTION] Table '{}': Adding column '{}'.", #table_name, #col_name);
                alter_statements.push(#add_sql.to_string());
            }
        }
    });

    let struct_column_definitions: Vec<_> = active_fields.iter().map(|f| {
        let column_name = &f.name;
        let sql_type = &f.sql_type;
        let is_nullable = f.is_option;
        quote! { ( #column_name, #sql_type, #is_nullable ) }
    }).collect();

    quote! {
        #[automatically_derived]
        #[::async_trait::async_trait]
        impl ::trendly_database::SchemaMigrator for #struct_name {
            async fn migrate(pool: &::sqlx::PgPool) -> ::std::result::Result<(), ::trendly_database::DatabaseError> {
                use ::sqlx::Row;

                ::tracing::info!("[MIGRATE][INFO] Starting migration check for table '{}'...", #table_name);

                let table_exists: bool = ::sqlx::query_scalar(
                    "SELECT EXISTS (
                        SELECT FROM information_schema.tables
                        WHERE table_schema = current_schema() AND table_name = $1
                    )"
                )
                .bind(#table_name)
                .fetch_one(pool)
                .await?;

                if !table_exists {
                    ::tracing::info!("[MIGRATE][ACTION] Table '{}' does not exist. Creating it now.", #table_name);
                    let mut tx = pool.begin().await?;
                    ::sqlx::query(::trendly_database::UPDATED_AT_TRIGGER_FUNCTION_SQL).execute(&mut *tx).await?;
                    let create_sql = <Self as ::trendly_database::SqlxSchema>::create_table_sql();
                    ::sqlx::query(&create_sql).execute(&mut *tx).await?;
                    for index_sql in <Self as ::trendly_database::SqlxSchema>::INDEXES_SQL {
                        ::sqlx::query(index_sql).execute(&mut *tx).await?;
                    }
                    let trigger_sql = <Self as ::trendly_database::SqlxSchema>::trigger_sql();
                    for statement in trigger_sql.split(';').filter(|s| !s.trim().is_empty()) {
                        ::sqlx::query(statement).execute(&mut *tx).await?;
                    }
                    tx.commit().await?;

                    ::tracing::info!("[MIGRATE][SUCCESS] Table '{}' created.", #table_name);
                    return Ok(());
                }

                let db_columns: std::collections::HashMap<String, (String, bool)> = ::sqlx::query(
                    "SELECT column_name, udt_name, is_nullable
                     FROM information_schema.columns
                     WHERE table_name = $1 AND table_schema = current_schema()"
                )
                .bind(#table_name)
                .fetch_all(pool)
                .await?
                .into_iter()
                .map(|row| {
                    let col_name: String = row.get("column_name");
                    let type_name: String = row.get("udt_name");
                    let nullable: String = row.get("is_nullable");
                    (col_name, (type_name.to_uppercase(), nullable == "YES"))
                })
                .collect();

                let struct_columns: std::collections::HashMap<&'static str, (&'static str, bool)> = [
                    #(#struct_column_definitions),*
                ].into_iter().map(|(name, ty, nullable)| (name, (ty, nullable))).collect();

                let mut alter_statements: Vec<String> = Vec::new();

                #(#add_column_logics)*

                for (col_name, (db_type, db_nullable)) in &db_columns {
                    if col_name == "id" {
                        continue;
                    }
                    match struct_columns.get(col_name.as_str()) {
                        None => {
                            ::tracing::warn!("[MIGRATE][WARNING] Table '{}': Column '{}' exists in the database but not in the struct. It will NOT be dropped.", #table_name, col_name);
                        }
                        Some((struct_type, struct_nullable)) => {
                            if !::trendly_database::sql_types_equivalent(struct_type, db_type) {
                                ::tracing::warn!("[MIGRATE][WARNING] Table '{}': Column '{}' expects '{}' but database has '{}'. The column type will NOT be changed.", #table_name, col_name, struct_type, db_type);
                            }
                            if db_nullable != struct_nullable {
                                let new_nullability = if *struct_nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
                                ::tracing::info!("[MIGRATE][ACTION] Table '{}': Altering nullability of column '{}'.", #table_name, col_name);
                                alter_statements.push(format!("ALTER TABLE \"{}\" ALTER COLUMN \"{}\" {}", #table_name, col_name, new_nullability));
                            }
                        }
                    }
                }

                if alter_statements.is_empty() {
                    ::tracing::info!("[MIGRATE][INFO] Table '{}' is already up-to-date.", #table_name);
                    return Ok(());
                }

                let mut tx = pool.begin().await?;
                for stmt in alter_statements {
                    ::sqlx::query(&stmt).execute(&mut *tx).await?;
                }
                tx.commit().await?;
                ::tracing::info!("[MIGRATE][SUCCESS] Table '{}' migrated successfully.", #table_name);
                Ok(())
            }
        }
    }
}

use quote::ToTokens;
use syn::{GenericArgument, PathArguments, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
}

impl OnDelete {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cascade" => Some(OnDelete::Cascade),
            "set_null" => Some(OnDelete::SetNull),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "ON DELETE CASCADE",
            OnDelete::SetNull => "ON DELETE SET NULL",
        }
    }
}

#[derive(Debug)]
pub struct ForeignKeyInfo {
    pub referenced_table: String,
    pub related_rust_type: syn::Ident,
    pub on_delete: OnDelete,
}

pub struct StructAttrs {
    pub table_name: Option<String>,
    pub checks: Vec<String>,
}

pub struct FieldData {
    pub name: String,
    pub ty: syn::Type,
    pub is_option: bool,
    pub is_pk: bool,
    pub is_skipped: bool,
    pub sql_type: String,
    pub foreign_key: Option<ForeignKeyInfo>,
    pub unique: bool,
    pub indexed: bool,
    pub max_length: Option<usize>,
    pub non_negative: bool,
    pub sequence: bool,
    pub sql_default: Option<String>,
}

impl FieldData {
    /// `created_at` is written once by the database; `updated_at` by trigger.
    /// `#[sequence]` columns draw from an identity sequence on insert.
    pub fn is_db_managed(&self) -> bool {
        self.is_pk || self.sequence || self.name == "created_at" || self.name == "updated_at"
    }

    pub fn identity_definition(&self) -> String {
        format!("\"{}\" BIGINT GENERATED BY DEFAULT AS IDENTITY", self.name)
    }
}

impl std::fmt::Debug for FieldData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldData")
            .field("name", &self.name)
            .field("ty", &self.ty.to_token_stream().to_string())
            .field("is_option", &self.is_option)
            .field("is_pk", &self.is_pk)
            .field("is_skipped", &self.is_skipped)
            .field("sql_type", &self.sql_type)
            .field("foreign_key", &self.foreign_key)
            .field("unique", &self.unique)
            .field("indexed", &self.indexed)
            .field("max_length", &self.max_length)
            .field("non_negative", &self.non_negative)
            .field("sequence", &self.sequence)
            .field("sql_default", &self.sql_default)
            .finish()
    }
}

// Helper functions for type analysis
pub fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(last_segment) = type_path.path.segments.last() {
            if last_segment.ident == "Option" {
                return true;
            }
        }
    }
    false
}

fn single_generic_arg(ty: &Type, wrapper: &str) -> Option<Type> {
    if let Type::Path(type_path) = ty {
        if let Some(last_segment) = type_path.path.segments.last() {
            if last_segment.ident == wrapper {
                if let PathArguments::AngleBracketed(angle_args) = &last_segment.arguments {
                    if angle_args.args.len() == 1 {
                        if let GenericArgument::Type(inner_ty) = &angle_args.args[0] {
                            return Some(inner_ty.clone());
                        }
                    }
                }
            }
        }
    }
    None
}

pub fn get_option_inner_type(ty: &Type) -> Option<Type> {
    single_generic_arg(ty, "Option")
}

pub fn get_fully_qualified_type_string(ty: &Type) -> String {
    quote::quote!(#ty).to_string().replace(' ', "")
}

fn is_json_type(type_str: &str) -> bool {
    type_str.starts_with("Json<")
        || type_str.starts_with("::sqlx::types::Json<")
        || type_str.starts_with("sqlx::types::Json<")
        || matches!(type_str, "JsonValue" | "serde_json::Value" | "::serde_json::Value")
}

pub fn is_string_type(ty: &Type) -> bool {
    matches!(get_fully_qualified_type_string(ty).as_str(), "String" | "std::string::String")
}

pub fn is_integer_type(ty: &Type) -> bool {
    matches!(get_fully_qualified_type_string(ty).as_str(), "i16" | "i32" | "i64")
}

/// Maps the (Option-stripped) Rust type of a column to its PostgreSQL type.
pub fn map_rust_type_to_sql(ty: &Type, max_length: Option<usize>) -> Result<String, String> {
    let type_str = get_fully_qualified_type_string(ty);

    if let Some(len) = max_length {
        if !is_string_type(ty) {
            return Err(format!("#[max_length] is only supported on String columns, found '{}'", type_str));
        }
        return Ok(format!("VARCHAR({})", len));
    }

    if is_json_type(&type_str) {
        return Ok("JSONB".to_string());
    }

    let sql = match type_str.as_str() {
        "String" | "std::string::String" => "TEXT",
        "i16" => "SMALLINT",
        "i32" => "INTEGER",
        "i64" => "BIGINT",
        "f32" => "REAL",
        "f64" => "DOUBLE PRECISION",
        "bool" => "BOOLEAN",
        "Vec<u8>" => "BYTEA",
        "Uuid" | "::sqlx::types::Uuid" | "sqlx::types::Uuid" => "UUID",
        "Vec<Uuid>" | "Vec<::sqlx::types::Uuid>" | "Vec<sqlx::types::Uuid>" => "UUID[]",
        "Vec<String>" | "Vec<std::string::String>" => "TEXT[]",
        "DateTime<Utc>" | "::chrono::DateTime<::chrono::Utc>" | "chrono::DateTime<chrono::Utc>" => "TIMESTAMPTZ",
        "NaiveDateTime" | "::chrono::NaiveDateTime" | "chrono::NaiveDateTime" => "TIMESTAMP",
        "NaiveDate" | "::chrono::NaiveDate" | "chrono::NaiveDate" => "DATE",
        _ => {
            return Err(format!(
                "Unsupported Rust type for SQL mapping: '{}'. Use a scalar, Uuid, Vec<Uuid>, Vec<String>, a chrono type or Json<T>.",
                type_str
            ))
        }
    };
    Ok(sql.to_string())
}

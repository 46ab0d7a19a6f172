use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DataStruct, DeriveInput, Fields};

mod internals;

use internals::{codegen, parse};

/// Derives the Postgres schema, CRUD, filtering, validation and migration
/// impls for a struct with a `id: Uuid` primary key.
///
/// ```rust,ignore
/// #[derive(Clone, Debug, SqlxObject)]
/// #[table_name = "comments"]
/// #[check = "\"is_sub_comment\" = (\"parent\" IS NOT NULL)"]
/// pub struct Comment {
///     pub id: Uuid,
///     #[foreign_key(referenced_table = "discussion_rooms", related_rust_type = "DiscussionRoom", on_delete = "cascade")]
///     pub discussion_room: Uuid,
///     #[max_length(400)]
///     pub comment: String,
///     #[non_negative]
///     #[sql_default = "0"]
///     pub like_count: i32,
///     pub created_at: i64,
/// }
/// ```
#[proc_macro_derive(
    SqlxObject,
    attributes(table_name, check, foreign_key, max_length, non_negative, indexed, unique, sql_default, sequence, sqlx_skip_column)
)]
pub fn sqlx_object_derive(input: TokenStream) -> TokenStream {
    let input_ast = parse_macro_input!(input as DeriveInput);
    match expand_sqlx_object(&input_ast) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_sqlx_object(input_ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input_ast.ident;
    let row_struct_name = format_ident!("{}RowSqlx", struct_name);

    let struct_attrs = parse::parse_struct_attrs(&input_ast.attrs)?;
    let table_name = struct_attrs
        .table_name
        .unwrap_or_else(|| struct_name.to_string().to_lowercase() + "s");

    let fields_named = match &input_ast.data {
        Data::Struct(DataStruct { fields: Fields::Named(fields_named), .. }) => fields_named,
        _ => return Err(syn::Error::new_spanned(struct_name, "#[derive(SqlxObject)] is only supported for structs with named fields.")),
    };

    let fields_data = parse::get_fields_data(&fields_named.named)?;
    if !fields_data.iter().any(|f| f.is_pk && !f.is_skipped) {
        return Err(syn::Error::new_spanned(struct_name, "#[derive(SqlxObject)] requires an `id: Uuid` primary key field."));
    }

    let row_struct = codegen::generate_row_struct(&row_struct_name, &fields_data);
    let schema_impl = codegen::generate_sqlx_schema_impl(struct_name, &row_struct_name, &table_name, &fields_data, &struct_attrs.checks);
    let validate_impl = codegen::generate_validate_impl(struct_name, &table_name, &fields_data);
    let crud_impl = codegen::generate_sqlx_crud_impl(struct_name, &fields_data);
    let filter_impl = codegen::generate_sqlx_filter_query_impl(struct_name, &row_struct_name);
    let fetch_helpers = codegen::generate_fetch_helpers(struct_name, &fields_data);
    let migrate_impl = codegen::generate_migrate_fn(struct_name, &table_name, &fields_data);

    Ok(quote! {
        #row_struct
        #schema_impl
        #validate_impl
        #crud_impl
        #filter_impl
        #fetch_helpers
        #migrate_impl
    })
}

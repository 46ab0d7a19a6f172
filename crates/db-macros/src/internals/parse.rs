use quote::format_ident;
use syn::{Attribute, Expr, Field, Lit, LitInt, LitStr, Meta};
use super::types::{
    FieldData, ForeignKeyInfo, OnDelete, StructAttrs, get_fully_qualified_type_string,
    get_option_inner_type, is_integer_type, is_option_type, map_rust_type_to_sql
};

fn name_value_str(attr: &Attribute) -> syn::Result<String> {
    match &attr.meta {
        Meta::NameValue(mnv) => match &mnv.value {
            Expr::Lit(expr_lit) => match &expr_lit.lit {
                Lit::Str(lit_str) => Ok(lit_str.value()),
                other => Err(syn::Error::new_spanned(other, "expected a string literal")),
            },
            other => Err(syn::Error::new_spanned(other, "expected a string literal")),
        },
        other => Err(syn::Error::new_spanned(other, "expected `name = \"value\"`")),
    }
}

pub fn parse_struct_attrs(attrs: &[Attribute]) -> syn::Result<StructAttrs> {
    let mut parsed = StructAttrs { table_name: None, checks: Vec::new() };
    for attr in attrs {
        if attr.path().is_ident("table_name") {
            parsed.table_name = Some(name_value_str(attr)?);
        } else if attr.path().is_ident("check") {
            parsed.checks.push(name_value_str(attr)?);
        }
    }
    Ok(parsed)
}

// Functions for parsing attributes from fields
pub fn parse_foreign_key_attr(field: &Field) -> syn::Result<Option<ForeignKeyInfo>> {
    for attr in field.attrs.iter() {
        if !attr.path().is_ident("foreign_key") {
            continue;
        }
        let mut referenced_table_opt = None;
        let mut related_rust_type_str_opt = None;
        let mut on_delete = OnDelete::SetNull;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("referenced_table") {
                let lit: LitStr = meta.value()?.parse()?;
                referenced_table_opt = Some(lit.value());
            } else if meta.path.is_ident("related_rust_type") {
                let lit: LitStr = meta.value()?.parse()?;
                related_rust_type_str_opt = Some(lit.value());
            } else if meta.path.is_ident("on_delete") {
                let lit: LitStr = meta.value()?.parse()?;
                on_delete = OnDelete::parse(&lit.value())
                    .ok_or_else(|| meta.error("on_delete must be \"cascade\" or \"set_null\""))?;
            } else {
                return Err(meta.error("unknown foreign_key option"));
            }
            Ok(())
        })?;
        return match (referenced_table_opt, related_rust_type_str_opt) {
            (Some(rt), Some(rrt_str)) => Ok(Some(ForeignKeyInfo {
                referenced_table: rt,
                related_rust_type: format_ident!("{}", rrt_str),
                on_delete,
            })),
            _ => Err(syn::Error::new_spanned(attr, "foreign_key requires referenced_table and related_rust_type")),
        };
    }
    Ok(None)
}

pub fn parse_max_length_attr(field: &Field) -> syn::Result<Option<usize>> {
    for attr in field.attrs.iter() {
        if attr.path().is_ident("max_length") {
            let lit: LitInt = attr.parse_args()?;
            return lit.base10_parse::<usize>().map(Some);
        }
    }
    Ok(None)
}

pub fn parse_sql_default_attr(field: &Field) -> syn::Result<Option<String>> {
    for attr in field.attrs.iter() {
        if attr.path().is_ident("sql_default") {
            return name_value_str(attr).map(Some);
        }
    }
    Ok(None)
}

fn has_attr(field: &Field, name: &str) -> bool {
    field.attrs.iter().any(|attr| attr.path().is_ident(name))
}

/// Gathers all relevant data from the struct's fields.
pub fn get_fields_data(fields: &syn::punctuated::Punctuated<syn::Field, syn::Token![,]>) -> syn::Result<Vec<FieldData>> {
    let mut out = Vec::with_capacity(fields.len());
    for field in fields.iter() {
        let field_ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "SqlxObject fields must be named"))?;
        let field_ty = &field.ty;
        let field_is_option = is_option_type(field_ty);
        let field_is_pk = field_ident == "id";
        let field_is_skipped = has_attr(field, "sqlx_skip_column");
        let max_length = parse_max_length_attr(field)?;
        let non_negative = has_attr(field, "non_negative");
        let sequence = has_attr(field, "sequence");

        let type_for_analysis = get_option_inner_type(field_ty).unwrap_or_else(|| field_ty.clone());
        if non_negative && !is_integer_type(&type_for_analysis) {
            return Err(syn::Error::new_spanned(field_ty, "#[non_negative] is only supported on i16, i32 and i64 columns"));
        }
        if sequence && get_fully_qualified_type_string(field_ty) != "i64" {
            return Err(syn::Error::new_spanned(field_ty, "#[sequence] is only supported on i64 columns"));
        }

        let sql_type = if field_is_skipped {
            "SKIP".to_string()
        } else {
            map_rust_type_to_sql(&type_for_analysis, max_length)
                .map_err(|msg| syn::Error::new_spanned(field_ty, msg))?
        };

        out.push(FieldData {
            name: field_ident.to_string(),
            ty: field_ty.clone(),
            is_option: field_is_option,
            is_pk: field_is_pk,
            is_skipped: field_is_skipped,
            sql_type,
            foreign_key: parse_foreign_key_attr(field)?,
            unique: has_attr(field, "unique"),
            indexed: has_attr(field, "indexed"),
            max_length,
            non_negative,
            sequence,
            sql_default: parse_sql_default_attr(field)?,
        });
    }
    Ok(out)
}

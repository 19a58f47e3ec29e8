//! Renders a populated [`TypeRegistry`] into a GraphQL SDL document.
//!
//! This module only reads the registry; all mutation happens upstream in
//! [`crate::extractor`]. Every list is sorted before being rendered so the
//! output text is independent of the `IndexMap`'s insertion order and
//! therefore reproducible across runs over the same trace set.

use crate::registry::{EnumRecord, FieldRecord, GraphQLSchemaData, TypeKind, TypeRecord, TypeRegistry};

/// Builds a complete SDL string from inferred schema data. Returns an empty
/// string if nothing was inferred.
pub fn build_sdl(schema_data: &GraphQLSchemaData) -> String {
    let registry = &schema_data.registry;
    let mut parts: Vec<String> = Vec::new();

    for (root_name, root_fields) in [
        ("Query", &schema_data.root_query_fields),
        ("Mutation", &schema_data.root_mutation_fields),
        ("Subscription", &schema_data.root_subscription_fields),
    ] {
        if root_fields.is_empty() {
            continue;
        }
        if let Some(root_type) = registry.types.get(root_name) {
            parts.push(render_type(root_type, Some(root_fields)));
        }
    }

    for type_rec in sorted_types(registry) {
        if matches!(type_rec.name.as_str(), "Query" | "Mutation" | "Subscription") {
            continue;
        }
        if type_rec.kind == TypeKind::Input {
            continue;
        }
        if type_rec.fields.is_empty() {
            continue;
        }
        parts.push(render_type(type_rec, None));
    }

    for type_rec in sorted_types(registry) {
        if type_rec.kind != TypeKind::Input {
            continue;
        }
        if type_rec.fields.is_empty() {
            continue;
        }
        parts.push(render_input_type(type_rec));
    }

    for enum_rec in sorted_enums(registry) {
        if enum_rec.values.is_empty() {
            continue;
        }
        parts.push(render_enum(enum_rec));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("{}\n", parts.join("\n\n"))
    }
}

fn sorted_types(registry: &TypeRegistry) -> Vec<&TypeRecord> {
    let mut types: Vec<&TypeRecord> = registry.types.values().collect();
    types.sort_by(|a, b| a.name.cmp(&b.name));
    types
}

fn sorted_enums(registry: &TypeRegistry) -> Vec<&EnumRecord> {
    let mut enums: Vec<&EnumRecord> = registry.enums.values().collect();
    enums.sort_by(|a, b| a.name.cmp(&b.name));
    enums
}

fn render_type(type_rec: &TypeRecord, field_order: Option<&[String]>) -> String {
    let mut lines = Vec::new();

    if let Some(description) = &type_rec.description {
        lines.push(format!("\"\"\"{}\"\"\"", escape_description(description)));
    }

    let mut decl = format!("type {}", type_rec.name);
    if !type_rec.interfaces.is_empty() {
        let implements = type_rec.interfaces.iter().cloned().collect::<Vec<_>>().join(" & ");
        decl.push_str(&format!(" implements {implements}"));
    }
    lines.push(format!("{decl} {{"));

    let ordered_fields = match field_order {
        Some(order) => {
            let mut ordered: Vec<&FieldRecord> = order
                .iter()
                .filter_map(|name| type_rec.fields.get(name))
                .collect();
            let ordered_names: std::collections::BTreeSet<&str> =
                order.iter().map(String::as_str).collect();
            let mut remaining: Vec<&FieldRecord> = type_rec
                .fields
                .values()
                .filter(|f| !ordered_names.contains(f.name.as_str()))
                .collect();
            remaining.sort_by(|a, b| a.name.cmp(&b.name));
            ordered.extend(remaining);
            ordered
        }
        None => {
            let mut fields: Vec<&FieldRecord> = type_rec.fields.values().collect();
            fields.sort_by(|a, b| a.name.cmp(&b.name));
            fields
        }
    };

    for field_rec in ordered_fields {
        lines.push(render_field(field_rec));
    }

    lines.push("}".to_string());
    lines.join("\n")
}

fn render_input_type(type_rec: &TypeRecord) -> String {
    let mut lines = Vec::new();

    if let Some(description) = &type_rec.description {
        lines.push(format!("\"\"\"{}\"\"\"", escape_description(description)));
    }

    lines.push(format!("input {} {{", type_rec.name));
    let mut fields: Vec<&FieldRecord> = type_rec.fields.values().collect();
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    for field_rec in fields {
        lines.push(render_field(field_rec));
    }
    lines.push("}".to_string());
    lines.join("\n")
}

fn render_enum(enum_rec: &EnumRecord) -> String {
    let mut lines = Vec::new();

    if let Some(description) = &enum_rec.description {
        lines.push(format!("\"\"\"{}\"\"\"", escape_description(description)));
    }

    lines.push(format!("enum {} {{", enum_rec.name));
    for value in &enum_rec.values {
        lines.push(format!("  {value}"));
    }
    lines.push("}".to_string());
    lines.join("\n")
}

fn render_field(field_rec: &FieldRecord) -> String {
    let mut parts = Vec::new();

    if let Some(description) = &field_rec.description {
        parts.push(format!("  \"\"\"{}\"\"\"", escape_description(description)));
    }

    let mut field_line = format!("  {}", field_rec.name);

    if !field_rec.arguments.is_empty() {
        let mut args: Vec<(&str, &str)> = field_rec
            .arguments
            .iter()
            .map(|(name, ty)| (name.as_str(), ty.as_str()))
            .collect();
        args.sort_by(|a, b| a.0.cmp(b.0));
        let rendered = args
            .into_iter()
            .map(|(name, ty)| format!("{name}: {ty}"))
            .collect::<Vec<_>>()
            .join(", ");
        field_line.push_str(&format!("({rendered})"));
    }

    field_line.push_str(&format!(": {}", format_field_type(field_rec)));

    parts.push(field_line);
    parts.join("\n")
}

/// Non-nullable if never observed null and always present; a list wraps its
/// (always non-nullable) element type, with the outer bracket itself
/// nullable unless every observed list was non-null.
fn format_field_type(field_rec: &FieldRecord) -> String {
    let base = field_rec.type_name.as_deref().unwrap_or("String");

    if field_rec.is_list {
        let inner = format!("{base}!");
        return if field_rec.is_nullable {
            format!("[{inner}]")
        } else {
            format!("[{inner}]!")
        };
    }

    if !field_rec.is_nullable && field_rec.is_always_present {
        return format!("{base}!");
    }

    base.to_string()
}

fn escape_description(text: &str) -> String {
    text.replace("\"\"\"", "\\\"\\\"\\\"")
}

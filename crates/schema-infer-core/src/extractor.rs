//! Walks each parsed operation's selection tree in lockstep with its
//! matching JSON response, populating a [`TypeRegistry`] with types,
//! fields, scalars, enums, and input types.
//!
//! This module is the permissive half of the pipeline: a malformed trace
//! produces a skip, never a propagated error (see the module docs on
//! [`crate::parser`] for the same policy on the parse side). The only
//! fatal condition here is a registry invariant violation, which can only
//! be a defect in this crate's own bookkeeping.

use crate::parser::{self, OperationKind, ParsedField, ParsedOperation, ParsedVariable};
use crate::registry::{is_builtin_scalar, GraphQLSchemaData, TypeRegistry, MAX_SAMPLED_LIST_ELEMENTS};
use crate::trace::Trace;
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

const VARIABLE_SKIP_SCALARS: &[&str] = &["String", "Int", "Float", "Boolean", "ID", "JSON"];

/// Builds a [`GraphQLSchemaData`] from a sequence of traces.
///
/// Panics if the resulting registry violates one of its structural
/// invariants (see [`crate::error::RegistryInvariantError`]) — that can
/// only happen from a defect in this crate, never from malformed input.
pub fn extract_graphql_schema(traces: &[Trace]) -> GraphQLSchemaData {
    let mut registry = TypeRegistry::new();
    let mut root_query_fields = BTreeSet::new();
    let mut root_mutation_fields = BTreeSet::new();
    let mut root_subscription_fields = BTreeSet::new();

    let operations = parser::parse_graphql_traces(traces);
    let trace_responses = build_trace_response_map(traces);

    for op in &operations {
        let response_data = find_response_for_operation(op, &trace_responses);
        let root_type_name = op.kind.root_type_name();

        let root_set = match op.kind {
            OperationKind::Query => &mut root_query_fields,
            OperationKind::Mutation => &mut root_mutation_fields,
            OperationKind::Subscription => &mut root_subscription_fields,
        };
        for field in &op.fields {
            if field.name != "__typename" {
                root_set.insert(field.name.clone());
            }
        }

        let data = response_data.and_then(|resp| resp.get("data"));
        let var_types: HashMap<String, String> = op
            .variables
            .iter()
            .map(|v| (v.name.clone(), v.type_name.clone()))
            .collect();

        walk_fields(
            &mut registry,
            &var_types,
            &op.fields,
            data,
            root_type_name,
            root_type_name,
        );

        process_variables(&mut registry, &op.variables);
    }

    if let Err(violation) = registry.check_invariants() {
        warn!(%violation, "registry invariant violated");
        panic!("{violation}");
    }

    GraphQLSchemaData {
        registry,
        root_query_fields: root_query_fields.into_iter().collect(),
        root_mutation_fields: root_mutation_fields.into_iter().collect(),
        root_subscription_fields: root_subscription_fields.into_iter().collect(),
    }
}

/// Maps a trace's raw request body text to its parsed JSON response, in
/// trace-list order, so the first match for a given query string wins
/// deterministically.
fn build_trace_response_map(traces: &[Trace]) -> IndexMap<String, Json> {
    let mut result = IndexMap::new();
    for trace in traces {
        if trace.request_body.is_empty() || trace.response_body.is_empty() {
            continue;
        }
        let key = String::from_utf8_lossy(&trace.request_body).into_owned();
        let Ok(response) = serde_json::from_slice::<Json>(&trace.response_body) else {
            continue;
        };
        if response.is_object() {
            result.insert(key, response);
        }
    }
    result
}

fn find_response_for_operation<'a>(
    op: &ParsedOperation,
    trace_responses: &'a IndexMap<String, Json>,
) -> Option<&'a Json> {
    for (key, response) in trace_responses {
        let Ok(body) = serde_json::from_str::<Json>(key) else {
            continue;
        };
        let matches = match &body {
            Json::Object(map) => map.get("query").and_then(Json::as_str) == Some(op.raw_query.as_str()),
            Json::Array(items) => items.iter().any(|item| {
                item.as_object()
                    .and_then(|map| map.get("query"))
                    .and_then(Json::as_str)
                    == Some(op.raw_query.as_str())
            }),
            _ => false,
        };
        if matches {
            return Some(response);
        }
    }
    None
}

fn walk_fields(
    registry: &mut TypeRegistry,
    var_types: &HashMap<String, String>,
    fields: &[ParsedField],
    response_data: Option<&Json>,
    parent_type_name: &str,
    parent_path: &str,
) {
    let type_record = registry.get_or_create_type(parent_type_name);
    let prior_observation_count = type_record.observation_count;
    type_record.record_observation(parent_path);

    let empty_map = serde_json::Map::new();
    let resp_map = response_data.and_then(Json::as_object).unwrap_or(&empty_map);

    for field in fields {
        if field.name == "__typename" {
            continue;
        }

        let existed_before_this_observation = registry
            .get_or_create_type(parent_type_name)
            .fields
            .contains_key(&field.name);

        merge_arguments(registry, parent_type_name, &field.name, &field.arguments, var_types);

        // A field newly created on a type that was already observed before
        // this round necessarily didn't appear on those earlier observations.
        if !existed_before_this_observation && prior_observation_count > 0 {
            registry
                .get_or_create_type(parent_type_name)
                .field_or_create(&field.name)
                .is_always_present = false;
        }

        match resp_map.get(field.response_key()) {
            None => {
                let field_rec = registry
                    .get_or_create_type(parent_type_name)
                    .field_or_create(&field.name);
                field_rec.is_nullable = true;
                field_rec.is_always_present = false;
            }
            Some(Json::Null) => {
                registry
                    .get_or_create_type(parent_type_name)
                    .field_or_create(&field.name)
                    .is_nullable = true;
            }
            Some(Json::Array(items)) => {
                registry
                    .get_or_create_type(parent_type_name)
                    .field_or_create(&field.name)
                    .is_list = true;
                process_list_value(registry, var_types, parent_type_name, field, items, parent_path);
            }
            Some(object_value @ Json::Object(obj)) => {
                let type_name = resolve_type_name(obj, field);
                registry
                    .get_or_create_type(parent_type_name)
                    .field_or_create(&field.name)
                    .type_name = Some(type_name.clone());
                let child_path = format!("{parent_path}.{}", field.name);
                walk_fields(
                    registry,
                    var_types,
                    &field.children,
                    Some(object_value),
                    &type_name,
                    &child_path,
                );
            }
            Some(scalar_value) => {
                let scalar_type = infer_scalar(scalar_value);
                let field_rec = registry
                    .get_or_create_type(parent_type_name)
                    .field_or_create(&field.name);
                field_rec.type_name = Some(scalar_type);
                field_rec.add_observed_value(scalar_value.clone());
            }
        }
    }
}

fn process_list_value(
    registry: &mut TypeRegistry,
    var_types: &HashMap<String, String>,
    parent_type_name: &str,
    field: &ParsedField,
    items: &[Json],
    parent_path: &str,
) {
    let sample = &items[..items.len().min(MAX_SAMPLED_LIST_ELEMENTS)];

    if let Some(obj) = sample.iter().find_map(|item| item.as_object()) {
        let type_name = resolve_type_name(obj, field);
        registry
            .get_or_create_type(parent_type_name)
            .field_or_create(&field.name)
            .type_name = Some(type_name.clone());
        let child_path = format!("{parent_path}.{}[]", field.name);
        let object_value = sample.iter().find(|item| item.is_object()).unwrap();
        walk_fields(
            registry,
            var_types,
            &field.children,
            Some(object_value),
            &type_name,
            &child_path,
        );
        return;
    }

    if let Some(scalar) = sample.iter().find(|item| !item.is_null()) {
        let scalar_type = infer_scalar(scalar);
        let field_rec = registry
            .get_or_create_type(parent_type_name)
            .field_or_create(&field.name);
        field_rec.type_name = Some(scalar_type);
        field_rec.add_observed_value((*scalar).clone());
    }
}

/// Priority order: a response object's own `__typename`, then an inline
/// fragment's type condition on the field itself, then the first child
/// carrying one, then a Pascalized fallback from the field's name.
///
/// The fallback is the one case with no real type name behind it at all
/// (legacy bundles with no `__typename`, per the original's own docstring),
/// so it's the one case that can coincidentally Pascalize to a built-in
/// scalar's name (a field called `string`, `int`, ...). Suffixed with
/// `Object` in that case so it never collides with a registry-reserved
/// scalar name.
fn resolve_type_name(obj: &serde_json::Map<String, Json>, field: &ParsedField) -> String {
    if let Some(typename) = obj.get("__typename").and_then(Json::as_str) {
        if !typename.is_empty() {
            return typename.to_string();
        }
    }
    if let Some(tc) = &field.type_condition {
        return tc.clone();
    }
    if let Some(child_tc) = field.children.iter().find_map(|c| c.type_condition.clone()) {
        return child_tc;
    }
    let fallback = pascal_case(&field.name);
    if is_builtin_scalar(&fallback) {
        format!("{fallback}Object")
    } else {
        fallback
    }
}

fn infer_scalar(value: &Json) -> String {
    match value {
        Json::String(_) => "String".to_string(),
        Json::Number(n) if n.is_i64() || n.is_u64() => "Int".to_string(),
        Json::Number(_) => "Float".to_string(),
        Json::Bool(_) => "Boolean".to_string(),
        _ => "String".to_string(),
    }
}

/// Converts a field/argument/variable name to PascalCase: `snake_case`
/// joins and capitalizes each segment; `camelCase` just upper-cases the
/// first letter; an empty name falls back to `Unknown`.
fn pascal_case(name: &str) -> String {
    if name.is_empty() {
        return "Unknown".to_string();
    }
    if name.contains('_') {
        name.split('_').map(capitalize_first).collect()
    } else {
        capitalize_first(name)
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Resolves `$foo` against the operation's declared variable types,
/// stripping `!` modifiers. Returns `None` for non-variable text or an
/// undeclared variable name, in which case the caller falls back to
/// literal inference over the same source text.
fn resolve_from_variable(source_form: &str, var_types: &HashMap<String, String>) -> Option<String> {
    let var_name = source_form.strip_prefix('$')?;
    let declared = var_types.get(var_name)?;
    Some(declared.replace('!', ""))
}

fn is_enum_literal(text: &str) -> bool {
    if text.is_empty() || matches!(text, "true" | "false" | "null") {
        return false;
    }
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn infer_literal_type(text: &str) -> String {
    let t = text.trim();
    if t.starts_with('"') {
        return "String".to_string();
    }
    if t == "true" || t == "false" {
        return "Boolean".to_string();
    }
    if t == "null" {
        return "JSON".to_string();
    }
    if let Some(inner) = t.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let inner = inner.trim();
        if inner.is_empty() {
            return "[JSON]".to_string();
        }
        let first_item = first_top_level_item(inner);
        return format!("[{}]", infer_literal_type(&first_item));
    }
    if t.starts_with('{') {
        return "JSON".to_string();
    }
    if is_integer_literal(t) {
        return "Int".to_string();
    }
    if is_float_literal(t) {
        return "Float".to_string();
    }
    "String".to_string()
}

fn first_top_level_item(s: &str) -> String {
    let mut depth = 0i32;
    let mut in_string = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '[' | '{' if !in_string => depth += 1,
            ']' | '}' if !in_string => depth -= 1,
            ',' if !in_string && depth == 0 => return s[..i].trim().to_string(),
            _ => {}
        }
    }
    s.trim().to_string()
}

fn is_integer_literal(t: &str) -> bool {
    let digits = t.strip_prefix('-').unwrap_or(t);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_float_literal(t: &str) -> bool {
    let digits = t.strip_prefix('-').unwrap_or(t);
    match digits.split_once('.') {
        Some((int_part, frac_part)) => {
            !int_part.is_empty()
                && !frac_part.is_empty()
                && int_part.chars().all(|c| c.is_ascii_digit())
                && frac_part.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Merges a field's argument list into the registry per the sticky
/// variable-vs-literal precedence rule: once an argument's type is
/// resolved from a variable reference, no later literal observation may
/// overwrite it, but a variable observation always overwrites a literal.
fn merge_arguments(
    registry: &mut TypeRegistry,
    parent_type_name: &str,
    field_name: &str,
    raw_arguments: &IndexMap<String, String>,
    var_types: &HashMap<String, String>,
) {
    for (arg_name, source_form) in raw_arguments {
        if let Some(resolved) = resolve_from_variable(source_form, var_types) {
            let field_rec = registry
                .get_or_create_type(parent_type_name)
                .field_or_create(field_name);
            field_rec.arguments.insert(arg_name.clone(), resolved);
            field_rec.variable_derived_arguments.insert(arg_name.clone());
            continue;
        }

        let sticky = registry
            .get_or_create_type(parent_type_name)
            .field_or_create(field_name)
            .variable_derived_arguments
            .contains(arg_name);
        if sticky {
            continue;
        }

        if is_enum_literal(source_form) {
            let enum_name = format!(
                "Inferred{parent_type_name}{}{}Enum",
                pascal_case(field_name),
                pascal_case(arg_name)
            );
            registry
                .get_or_create_enum(&enum_name)
                .values
                .insert(source_form.clone());
            registry
                .get_or_create_type(parent_type_name)
                .field_or_create(field_name)
                .arguments
                .insert(arg_name.clone(), enum_name);
        } else {
            let inferred = infer_literal_type(source_form);
            registry
                .get_or_create_type(parent_type_name)
                .field_or_create(field_name)
                .arguments
                .insert(arg_name.clone(), inferred);
        }
    }
}

fn strip_type_modifiers(type_str: &str) -> String {
    let result = type_str.trim();
    let result = result.trim_end_matches('!');
    let result = result.strip_prefix('[').unwrap_or(result);
    let result = result.trim_end_matches(']');
    let result = result.trim_end_matches('!');
    result.to_string()
}

fn strip_outer_list_brackets(type_str: &str) -> String {
    let result = type_str.trim_start_matches('[');
    let result = result.trim_end_matches(|c| c == ']' || c == '!');
    let result = result.trim_end_matches(']');
    result.to_string()
}

/// Processes every declared variable with a non-null observed value,
/// inferring enums (string values) or input types (object values) for
/// any base type that isn't a built-in scalar.
fn process_variables(registry: &mut TypeRegistry, variables: &[ParsedVariable]) {
    for var in variables {
        let Some(observed) = &var.observed_value else {
            continue;
        };
        if observed.is_null() {
            continue;
        }

        let base_type = strip_type_modifiers(&var.type_name);
        if VARIABLE_SKIP_SCALARS.contains(&base_type.as_str()) {
            continue;
        }

        match observed {
            Json::String(s) => {
                registry.get_or_create_enum(&base_type).values.insert(s.clone());
            }
            Json::Object(map) => process_input_type(registry, &base_type, map),
            Json::Array(items) => {
                let inner_type = strip_type_modifiers(&strip_outer_list_brackets(&var.type_name));
                if VARIABLE_SKIP_SCALARS.contains(&inner_type.as_str()) {
                    continue;
                }
                match items.first() {
                    Some(Json::String(s)) => {
                        registry.get_or_create_enum(&inner_type).values.insert(s.clone());
                    }
                    Some(Json::Object(map)) => process_input_type(registry, &inner_type, map),
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

fn process_input_type(registry: &mut TypeRegistry, type_name: &str, data: &serde_json::Map<String, Json>) {
    registry.get_or_create_input_type(type_name).observation_count += 1;

    for (key, value) in data {
        match value {
            Json::Null => {
                registry
                    .get_or_create_input_type(type_name)
                    .field_or_create(key)
                    .is_nullable = true;
            }
            Json::Array(items) => {
                registry
                    .get_or_create_input_type(type_name)
                    .field_or_create(key)
                    .is_list = true;
                if let Some(first) = items.first() {
                    let scalar = infer_scalar(first);
                    registry
                        .get_or_create_input_type(type_name)
                        .field_or_create(key)
                        .type_name = Some(scalar);
                }
            }
            Json::Object(nested) => {
                let nested_name = format!("{}Input", pascal_case(key));
                registry
                    .get_or_create_input_type(type_name)
                    .field_or_create(key)
                    .type_name = Some(nested_name.clone());
                process_input_type(registry, &nested_name, nested);
            }
            scalar => {
                let scalar_type = infer_scalar(scalar);
                let field_rec = registry
                    .get_or_create_input_type(type_name)
                    .field_or_create(key);
                field_rec.type_name = Some(scalar_type);
                field_rec.add_observed_value(scalar.clone());
            }
        }
    }
}

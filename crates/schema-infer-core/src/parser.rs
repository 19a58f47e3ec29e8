//! Turns each trace's captured request body into zero or more
//! [`ParsedOperation`]s: fragments resolved, arguments printed back to
//! their source form, anonymous operations named from their root fields.

use crate::ast;
use crate::trace::Trace;
use crate::value::{ast_value_to_json, print_ast_value};
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::collections::HashMap;
use tracing::debug;

/// One node of a query's selection tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedField {
    pub name: String,
    pub alias: Option<String>,
    /// Argument values in their syntactic source form (`$id`, `"abc"`, `42`, `ACTIVE`, ...).
    pub arguments: IndexMap<String, String>,
    pub children: Vec<ParsedField>,
    /// The type named by an enclosing inline fragment or fragment spread, if any.
    pub type_condition: Option<String>,
}

impl ParsedField {
    /// The key this field's value appears under in a JSON response object.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A declared variable on an operation, paired with the value it was
/// actually invoked with on this trace.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedVariable {
    pub name: String,
    /// The printed GraphQL type annotation, e.g. `"[ID!]!"`.
    pub type_name: String,
    pub default_value: Option<Json>,
    pub observed_value: Option<Json>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// The root type this operation's selections are evaluated against.
    pub fn root_type_name(self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
            OperationKind::Subscription => "Subscription",
        }
    }
}

/// A single parsed operation from a single trace, ready for extraction.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedOperation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<ParsedVariable>,
    pub fields: Vec<ParsedField>,
    pub raw_query: String,
    pub fragment_names: Vec<String>,
}

/// Parses every trace's request body into a flat, order-preserving list of
/// operations. A single trace may yield zero operations (persisted query,
/// parse failure), one, or many (a batched request body, or a document
/// defining multiple operations when no `operationName` narrows it).
pub fn parse_graphql_traces(traces: &[Trace]) -> Vec<ParsedOperation> {
    let mut operations = Vec::new();
    for trace in traces {
        if trace.request_body.is_empty() {
            continue;
        }
        let Ok(body_text) = std::str::from_utf8(&trace.request_body) else {
            debug!("skipping trace with non-utf8 request body");
            continue;
        };
        let Ok(body) = serde_json::from_str::<Json>(body_text) else {
            debug!("skipping trace with unparseable JSON request body");
            continue;
        };

        match body {
            Json::Array(items) => {
                for item in items {
                    if let Json::Object(map) = item {
                        operations.extend(parse_single_body(&map));
                    }
                }
            }
            Json::Object(map) => operations.extend(parse_single_body(&map)),
            _ => {}
        }
    }
    operations
}

fn parse_single_body(body: &serde_json::Map<String, Json>) -> Vec<ParsedOperation> {
    let Some(query_str) = body.get("query").and_then(Json::as_str) else {
        return Vec::new();
    };
    if query_str.trim().is_empty() {
        return Vec::new();
    }

    let document = match ast::operation::parse(query_str) {
        Ok(doc) => doc,
        Err(_) => {
            debug!("skipping trace with unparseable GraphQL query");
            return Vec::new();
        }
    };

    let empty_map = serde_json::Map::new();
    let variables_json = body
        .get("variables")
        .and_then(Json::as_object)
        .unwrap_or(&empty_map);
    let operation_name = body.get("operationName").and_then(Json::as_str);

    let mut fragments: HashMap<&str, &ast::operation::FragmentDefinition> = HashMap::new();
    for def in &document.definitions {
        if let ast::operation::Definition::Fragment(frag) = def {
            fragments.insert(frag.name.as_str(), frag);
        }
    }

    let mut operations = Vec::new();
    for def in &document.definitions {
        let ast::operation::Definition::Operation(op) = def else {
            continue;
        };
        if let Some(requested) = operation_name {
            if let Some(op_name) = operation_name_of(op) {
                if op_name != requested {
                    continue;
                }
            }
        }
        operations.push(build_operation(op, &fragments, variables_json, query_str));
    }
    operations
}

fn operation_name_of(op: &ast::operation::OperationDefinition) -> Option<&str> {
    match op {
        ast::operation::OperationDefinition::SelectionSet(_) => None,
        ast::operation::OperationDefinition::Query(q) => q.name.as_deref(),
        ast::operation::OperationDefinition::Mutation(m) => m.name.as_deref(),
        ast::operation::OperationDefinition::Subscription(s) => s.name.as_deref(),
    }
}

fn build_operation(
    op: &ast::operation::OperationDefinition,
    fragments: &HashMap<&str, &ast::operation::FragmentDefinition>,
    variables_json: &serde_json::Map<String, Json>,
    raw_query: &str,
) -> ParsedOperation {
    let (kind, name, variable_definitions, selection_set) = match op {
        ast::operation::OperationDefinition::SelectionSet(ss) => {
            (OperationKind::Query, None, &[][..], ss)
        }
        ast::operation::OperationDefinition::Query(q) => (
            OperationKind::Query,
            q.name.clone(),
            q.variable_definitions.as_slice(),
            &q.selection_set,
        ),
        ast::operation::OperationDefinition::Mutation(m) => (
            OperationKind::Mutation,
            m.name.clone(),
            m.variable_definitions.as_slice(),
            &m.selection_set,
        ),
        ast::operation::OperationDefinition::Subscription(s) => (
            OperationKind::Subscription,
            s.name.clone(),
            s.variable_definitions.as_slice(),
            &s.selection_set,
        ),
    };

    let variables = variable_definitions
        .iter()
        .map(|var_def| ParsedVariable {
            name: var_def.name.clone(),
            type_name: var_def.var_type.to_string(),
            default_value: var_def.default_value.as_ref().map(ast_value_to_json),
            observed_value: variables_json.get(&var_def.name).cloned(),
        })
        .collect();

    let fields = parse_selection_set(selection_set, fragments);
    let fragment_names = collect_fragment_refs(selection_set);

    let name = name.or_else(|| {
        if fields.is_empty() {
            None
        } else {
            Some(generate_anonymous_name(kind, &fields))
        }
    });

    ParsedOperation {
        kind,
        name,
        variables,
        fields,
        raw_query: raw_query.to_string(),
        fragment_names,
    }
}

fn parse_selection_set(
    selection_set: &ast::operation::SelectionSet,
    fragments: &HashMap<&str, &ast::operation::FragmentDefinition>,
) -> Vec<ParsedField> {
    let mut fields = Vec::new();
    for selection in &selection_set.items {
        match selection {
            ast::operation::Selection::Field(f) => {
                let arguments = f
                    .arguments
                    .iter()
                    .map(|(name, value)| (name.clone(), print_ast_value(value)))
                    .collect();
                fields.push(ParsedField {
                    name: f.name.clone(),
                    alias: f.alias.clone(),
                    arguments,
                    children: parse_selection_set(&f.selection_set, fragments),
                    type_condition: None,
                });
            }
            ast::operation::Selection::FragmentSpread(spread) => {
                let Some(frag) = fragments.get(spread.fragment_name.as_str()) else {
                    continue;
                };
                let type_cond = type_condition_name(&frag.type_condition);
                let mut frag_fields = parse_selection_set(&frag.selection_set, fragments);
                stamp_type_condition(&mut frag_fields, type_cond.as_deref());
                fields.extend(frag_fields);
            }
            ast::operation::Selection::InlineFragment(inline) => {
                let type_cond = inline.type_condition.as_ref().and_then(type_condition_name);
                let mut inline_fields = parse_selection_set(&inline.selection_set, fragments);
                stamp_type_condition(&mut inline_fields, type_cond.as_deref());
                fields.extend(inline_fields);
            }
        }
    }
    fields
}

fn stamp_type_condition(fields: &mut [ParsedField], type_cond: Option<&str>) {
    let Some(type_cond) = type_cond else {
        return;
    };
    for field in fields {
        if field.type_condition.is_none() {
            field.type_condition = Some(type_cond.to_string());
        }
    }
}

fn type_condition_name(tc: &ast::operation::TypeCondition) -> Option<String> {
    let graphql_parser::query::TypeCondition::On(name) = tc;
    Some(name.clone())
}

fn collect_fragment_refs(selection_set: &ast::operation::SelectionSet) -> Vec<String> {
    let mut names = Vec::new();
    for selection in &selection_set.items {
        match selection {
            ast::operation::Selection::FragmentSpread(spread) => {
                names.push(spread.fragment_name.clone());
            }
            ast::operation::Selection::Field(f) => {
                names.extend(collect_fragment_refs(&f.selection_set));
            }
            ast::operation::Selection::InlineFragment(inline) => {
                names.extend(collect_fragment_refs(&inline.selection_set));
            }
        }
    }
    names
}

fn generate_anonymous_name(kind: OperationKind, fields: &[ParsedField]) -> String {
    let op_label = match kind {
        OperationKind::Query => "Query",
        OperationKind::Mutation => "Mutation",
        OperationKind::Subscription => "Subscription",
    };
    let root_names: Vec<&str> = fields
        .iter()
        .map(|f| f.name.as_str())
        .filter(|name| *name != "__typename")
        .take(3)
        .collect();

    if root_names.is_empty() {
        return format!("Anonymous{op_label}");
    }

    let parts = root_names
        .iter()
        .map(|name| python_capitalize(name))
        .collect::<Vec<_>>()
        .join("_");
    format!("Anonymous{op_label}_{parts}")
}

/// Mimics Python's `str.capitalize()`: upper-cases the first character and
/// lower-cases the rest, used only for the anonymous-operation naming
/// scheme this crate inherited.
fn python_capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trace_with(query: &str) -> Trace {
        let body = json!({ "query": query });
        Trace::new(body.to_string().into_bytes(), Vec::new())
    }

    fn trace_with_vars(query: &str, variables: Json) -> Trace {
        let body = json!({ "query": query, "variables": variables });
        Trace::new(body.to_string().into_bytes(), Vec::new())
    }

    #[test]
    fn parses_basic_query() {
        let ops = parse_graphql_traces(&[trace_with("query GetUser { user { id name } }")]);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OperationKind::Query);
        assert_eq!(ops[0].name.as_deref(), Some("GetUser"));
        assert!(ops[0].fields.iter().any(|f| f.name == "user"));
    }

    #[test]
    fn parses_mutation_and_subscription() {
        let ops = parse_graphql_traces(&[trace_with(
            "mutation CreateUser($name: String!) { createUser(name: $name) { id } }",
        )]);
        assert_eq!(ops[0].kind, OperationKind::Mutation);
        assert_eq!(ops[0].name.as_deref(), Some("CreateUser"));

        let ops = parse_graphql_traces(&[trace_with(
            "subscription OnMessage { messageAdded { id text } }",
        )]);
        assert_eq!(ops[0].kind, OperationKind::Subscription);
    }

    #[test]
    fn generates_name_from_root_fields() {
        let ops = parse_graphql_traces(&[trace_with("{ user { id } }")]);
        assert!(ops[0].name.as_deref().unwrap().contains("User"));
    }

    #[test]
    fn generates_name_from_multiple_root_fields() {
        let ops = parse_graphql_traces(&[trace_with("{ user { id } posts { title } }")]);
        let name = ops[0].name.as_deref().unwrap();
        assert!(name.contains("User"));
        assert!(name.contains("Posts"));
    }

    #[test]
    fn parses_variable_declarations() {
        let ops = parse_graphql_traces(&[trace_with_vars(
            "query GetUser($id: ID!, $limit: Int = 10) { user(id: $id) { name } }",
            json!({ "id": "123", "limit": 5 }),
        )]);
        let vars = &ops[0].variables;
        assert_eq!(vars.len(), 2);
        let id_var = vars.iter().find(|v| v.name == "id").unwrap();
        assert_eq!(id_var.type_name, "ID!");
        assert_eq!(id_var.observed_value, Some(json!("123")));
        let limit_var = vars.iter().find(|v| v.name == "limit").unwrap();
        assert_eq!(limit_var.type_name, "Int");
        assert_eq!(limit_var.default_value, Some(json!(10)));
        assert_eq!(limit_var.observed_value, Some(json!(5)));
    }

    #[test]
    fn inlines_fragment_spread_with_type_condition() {
        let query = r#"
            query GetUser {
                user {
                    ...UserFields
                }
            }
            fragment UserFields on User {
                id
                name
                email
            }
        "#;
        let ops = parse_graphql_traces(&[trace_with(query)]);
        let user_field = ops[0].fields.iter().find(|f| f.name == "user").unwrap();
        let child_names: Vec<&str> = user_field.children.iter().map(|c| c.name.as_str()).collect();
        assert!(child_names.contains(&"id"));
        assert!(child_names.contains(&"name"));
        assert!(child_names.contains(&"email"));
        for child in &user_field.children {
            assert_eq!(child.type_condition.as_deref(), Some("User"));
        }
    }

    #[test]
    fn collects_fragment_names() {
        let query = r#"
            query GetUser {
                user { ...UserFields }
            }
            fragment UserFields on User { id name }
        "#;
        let ops = parse_graphql_traces(&[trace_with(query)]);
        assert!(ops[0].fragment_names.contains(&"UserFields".to_string()));
    }

    #[test]
    fn inline_fragment_type_conditions_are_distinct_per_branch() {
        let query = r#"
            query GetNode {
                node(id: "1") {
                    ... on User { name }
                    ... on Post { title }
                }
            }
        "#;
        let ops = parse_graphql_traces(&[trace_with(query)]);
        let node_field = ops[0].fields.iter().find(|f| f.name == "node").unwrap();
        assert!(node_field
            .children
            .iter()
            .any(|c| c.name == "name" && c.type_condition.as_deref() == Some("User")));
        assert!(node_field
            .children
            .iter()
            .any(|c| c.name == "title" && c.type_condition.as_deref() == Some("Post")));
    }

    #[test]
    fn batch_request_yields_multiple_operations() {
        let items = json!([
            { "query": "query A { user { id } }" },
            { "query": "query B { posts { title } }" },
        ]);
        let trace = Trace::new(items.to_string().into_bytes(), Vec::new());
        let ops = parse_graphql_traces(&[trace]);
        assert_eq!(ops.len(), 2);
        let names: Vec<&str> = ops.iter().map(|o| o.name.as_deref().unwrap()).collect();
        assert!(names.contains(&"A"));
        assert!(names.contains(&"B"));
    }

    #[test]
    fn persisted_query_without_query_field_is_skipped() {
        let body = json!({ "extensions": { "persistedQuery": { "sha256Hash": "abc123" } } });
        let trace = Trace::new(body.to_string().into_bytes(), Vec::new());
        assert!(parse_graphql_traces(&[trace]).is_empty());
    }

    #[test]
    fn empty_and_invalid_queries_are_skipped() {
        assert!(parse_graphql_traces(&[trace_with("")]).is_empty());
        assert!(parse_graphql_traces(&[trace_with("this is not graphql")]).is_empty());
    }

    #[test]
    fn field_arguments_are_preserved_in_source_form() {
        let ops = parse_graphql_traces(&[trace_with(r#"query { user(id: "123") { name } }"#)]);
        let user_field = ops[0].fields.iter().find(|f| f.name == "user").unwrap();
        assert_eq!(user_field.arguments.get("id").map(String::as_str), Some("\"123\""));
    }

    #[test]
    fn operation_name_selects_matching_definition() {
        let query = r#"
            query GetUser { user { id } }
            query GetPosts { posts { title } }
        "#;
        let body = json!({ "query": query, "operationName": "GetPosts" });
        let trace = Trace::new(body.to_string().into_bytes(), Vec::new());
        let ops = parse_graphql_traces(&[trace]);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].name.as_deref(), Some("GetPosts"));
    }
}

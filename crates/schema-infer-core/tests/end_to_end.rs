//! End-to-end scenarios from the inference pipeline's testable-properties
//! list: full trace sequences in, a rendered SDL string out.

use schema_infer_core::{build_sdl, extract_graphql_schema, Trace};
use serde_json::json;
use serde_json::Value as Json;

fn trace(query: &str, variables: Json, response_data: Json) -> Trace {
    let body = json!({ "query": query, "variables": variables });
    let response = json!({ "data": response_data });
    Trace::new(body.to_string().into_bytes(), response.to_string().into_bytes())
}

#[test]
fn basic_type_inference_end_to_end() {
    let traces = vec![trace(
        "{ user { id name } }",
        Json::Null,
        json!({ "user": { "__typename": "User", "id": "1", "name": "Alice" } }),
    )];

    let schema = extract_graphql_schema(&traces);
    assert!(schema.root_query_fields.contains(&"user".to_string()));
    let user = &schema.registry.types["User"];
    assert_eq!(user.fields["id"].type_name.as_deref(), Some("String"));
    assert_eq!(user.fields["name"].type_name.as_deref(), Some("String"));

    let sdl = build_sdl(&schema);
    assert!(sdl.contains("type Query {"));
    assert!(sdl.contains("type User {"));
}

#[test]
fn list_inference_from_nested_objects_end_to_end() {
    let traces = vec![trace(
        "{ users { id name } }",
        Json::Null,
        json!({ "users": [
            { "__typename": "User", "id": "1", "name": "Alice" },
            { "__typename": "User", "id": "2", "name": "Bob" },
        ] }),
    )];

    let schema = extract_graphql_schema(&traces);
    let users_field = &schema.registry.types["Query"].fields["users"];
    assert!(users_field.is_list);
    assert_eq!(users_field.type_name.as_deref(), Some("User"));

    let sdl = build_sdl(&schema);
    assert!(sdl.contains("users: [User!]"));
}

#[test]
fn variable_derived_input_type_and_enum_end_to_end() {
    let traces = vec![trace(
        "mutation M($input: CreateUserInput!, $role: Role!) { createUser(input: $input, role: $role) { id } }",
        json!({ "input": { "name": "Alice", "age": 30 }, "role": "ADMIN" }),
        json!({ "createUser": { "id": "1" } }),
    )];

    let schema = extract_graphql_schema(&traces);
    let input = &schema.registry.types["CreateUserInput"];
    assert_eq!(input.fields["name"].type_name.as_deref(), Some("String"));
    assert_eq!(input.fields["age"].type_name.as_deref(), Some("Int"));
    assert!(schema.registry.enums["Role"].values.contains("ADMIN"));

    let sdl = build_sdl(&schema);
    assert!(sdl.contains("input CreateUserInput {"));
    assert!(sdl.contains("enum Role {"));
}

#[test]
fn literal_enum_inference_then_variable_override_end_to_end() {
    let traces = vec![
        trace(
            "query { items(status: ACTIVE) { id } }",
            Json::Null,
            json!({ "items": [{ "id": "1" }] }),
        ),
        trace(
            "query Q($s: Status!) { items(status: $s) { id } }",
            json!({ "s": "ACTIVE" }),
            json!({ "items": [{ "id": "2" }] }),
        ),
    ];

    let schema = extract_graphql_schema(&traces);
    assert!(schema.registry.enums["InferredQueryItemsStatusEnum"]
        .values
        .contains("ACTIVE"));
    assert_eq!(
        schema.registry.types["Query"].fields["items"].arguments["status"],
        "Status"
    );
}

#[test]
fn batch_request_yields_two_operations_end_to_end() {
    let items = json!([
        { "query": "query A { user { id } }" },
        { "query": "query B { posts { title } }" },
    ]);
    let responses = json!([
        { "data": { "user": { "id": "1" } } },
        { "data": { "posts": [{ "title": "Hi" }] } },
    ]);
    let traces = vec![Trace::new(
        items.to_string().into_bytes(),
        responses.to_string().into_bytes(),
    )];

    let schema = extract_graphql_schema(&traces);
    assert!(schema.root_query_fields.contains(&"user".to_string()));
    assert!(schema.root_query_fields.contains(&"posts".to_string()));
}

#[test]
fn registry_monotonicity_across_trace_extension() {
    let base = vec![trace(
        "{ users { id } }",
        Json::Null,
        json!({ "users": [] }),
    )];
    let before = extract_graphql_schema(&base);
    assert!(!before.registry.types["Query"].fields["users"].is_list);

    let mut extended = base;
    extended.push(trace(
        "{ users { id } }",
        Json::Null,
        json!({ "users": [{ "__typename": "User", "id": "1" }] }),
    ));
    let after = extract_graphql_schema(&extended);
    assert!(after.registry.types["Query"].fields["users"].is_list);
    assert_eq!(
        after.registry.types["Query"].fields["users"].type_name.as_deref(),
        Some("User")
    );
}

#[test]
fn deterministic_sdl_is_independent_of_rebuilds() {
    let traces = vec![trace(
        "{ user { id name } posts { title } }",
        Json::Null,
        json!({
            "user": { "__typename": "User", "id": "1", "name": "Alice" },
            "posts": [{ "__typename": "Post", "title": "Hello" }],
        }),
    )];
    let schema = extract_graphql_schema(&traces);
    let first = build_sdl(&schema);
    let second = build_sdl(&schema);
    assert_eq!(first, second);
}

#[test]
fn no_builtin_scalars_ever_appear_as_named_enums() {
    let traces = vec![trace(
        "{ user { id name } }",
        Json::Null,
        json!({ "user": { "__typename": "User", "id": "1", "name": "Alice" } }),
    )];
    let schema = extract_graphql_schema(&traces);
    for builtin in ["String", "Int", "Float", "Boolean", "ID"] {
        assert!(!schema.registry.enums.contains_key(builtin));
        assert!(!schema.registry.types.contains_key(builtin));
    }
}

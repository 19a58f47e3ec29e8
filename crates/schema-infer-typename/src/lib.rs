//! Rewrites outbound GraphQL queries so that every selection set requests
//! `__typename`.
//!
//! This is kept as its own crate because it is logically independent of the
//! inference pipeline in `schema-infer-core`: it only *enables* accurate type
//! naming there by guaranteeing every response object in a captured trace
//! carries its own type name.

use graphql_parser::query::Definition;
use graphql_parser::query::Document;
use graphql_parser::query::Field;
use graphql_parser::query::FragmentDefinition;
use graphql_parser::query::OperationDefinition;
use graphql_parser::query::Selection;
use graphql_parser::query::SelectionSet;

const TYPENAME_FIELD: &str = "__typename";

/// Adds a `__typename` field to every selection set in `query` that does not
/// already request one.
///
/// Selection sets that don't exist in the source query (a scalar field has
/// no sub-selection at all) are never synthesized — only pre-existing
/// selection sets gain a `__typename`.
///
/// If `query` cannot be parsed as a GraphQL document it is returned
/// unchanged. Running this function on its own output is a no-op.
pub fn inject_typename(query: &str) -> String {
    match graphql_parser::query::parse_query::<String>(query) {
        Ok(doc) => inject_into_document(doc.into_static()).to_string(),
        Err(_) => query.to_string(),
    }
}

fn inject_into_document(doc: Document<'static, String>) -> Document<'static, String> {
    Document {
        definitions: doc.definitions.into_iter().map(inject_into_definition).collect(),
    }
}

fn inject_into_definition(
    def: Definition<'static, String>,
) -> Definition<'static, String> {
    match def {
        Definition::Operation(op) => Definition::Operation(inject_into_operation(op)),
        Definition::Fragment(frag) => Definition::Fragment(inject_into_fragment(frag)),
    }
}

fn inject_into_operation(
    op: OperationDefinition<'static, String>,
) -> OperationDefinition<'static, String> {
    match op {
        OperationDefinition::SelectionSet(ss) =>
            OperationDefinition::SelectionSet(inject_into_selection_set(ss)),
        OperationDefinition::Query(mut q) => {
            q.selection_set = inject_into_selection_set(q.selection_set);
            OperationDefinition::Query(q)
        }
        OperationDefinition::Mutation(mut m) => {
            m.selection_set = inject_into_selection_set(m.selection_set);
            OperationDefinition::Mutation(m)
        }
        OperationDefinition::Subscription(mut s) => {
            s.selection_set = inject_into_selection_set(s.selection_set);
            OperationDefinition::Subscription(s)
        }
    }
}

fn inject_into_fragment(
    mut frag: FragmentDefinition<'static, String>,
) -> FragmentDefinition<'static, String> {
    frag.selection_set = inject_into_selection_set(frag.selection_set);
    frag
}

/// Recursively injects `__typename` into `ss` and every nested selection
/// set reachable from it. A selection set with no items (a scalar field's
/// absent sub-selection) is left untouched — there is nothing to recurse
/// into and nothing to inject a field alongside.
fn inject_into_selection_set(
    ss: SelectionSet<'static, String>,
) -> SelectionSet<'static, String> {
    if ss.items.is_empty() {
        return ss;
    }

    let has_typename = ss.items.iter().any(|sel| match sel {
        Selection::Field(f) => f.name == TYPENAME_FIELD,
        _ => false,
    });

    let mut items: Vec<Selection<'static, String>> =
        ss.items.into_iter().map(inject_into_selection).collect();

    if !has_typename {
        items.push(Selection::Field(Field {
            position: ss.span.0,
            alias: None,
            name: TYPENAME_FIELD.to_string(),
            arguments: vec![],
            directives: vec![],
            selection_set: SelectionSet {
                span: ss.span,
                items: vec![],
            },
        }));
    }

    SelectionSet {
        span: ss.span,
        items,
    }
}

fn inject_into_selection(
    sel: Selection<'static, String>,
) -> Selection<'static, String> {
    match sel {
        Selection::Field(mut field) => {
            field.selection_set = inject_into_selection_set(field.selection_set);
            Selection::Field(field)
        }
        Selection::InlineFragment(mut inline) => {
            inline.selection_set = inject_into_selection_set(inline.selection_set);
            Selection::InlineFragment(inline)
        }
        Selection::FragmentSpread(spread) => Selection::FragmentSpread(spread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_into_simple_query() {
        let result = inject_typename("{ user { name } }");
        assert!(result.contains("__typename"));
    }

    #[test]
    fn does_not_duplicate_existing_typename() {
        let query = "{ user { name __typename } __typename }";
        let result = inject_typename(query);
        assert_eq!(result.matches(TYPENAME_FIELD).count(), 2);
    }

    #[test]
    fn injects_into_nested_selection_sets() {
        let result = inject_typename("{ user { name address { city } } }");
        assert!(result.matches(TYPENAME_FIELD).count() >= 3);
    }

    #[test]
    fn leaves_scalar_leaf_fields_alone() {
        let result = inject_typename("{ count }");
        // `count` is a scalar leaf; it must not grow a `{ __typename }` body.
        assert!(!result.contains("count {"));
        assert!(result.contains(TYPENAME_FIELD));
    }

    #[test]
    fn unparseable_query_is_returned_verbatim() {
        let bad_query = "this is not graphql";
        assert_eq!(inject_typename(bad_query), bad_query);
    }

    #[test]
    fn injects_into_mutations() {
        let result = inject_typename(r#"mutation { createUser(name: "Bob") { id } }"#);
        assert!(result.contains(TYPENAME_FIELD));
    }

    #[test]
    fn injects_into_fragments() {
        let query = "query { user { ...Fields } } fragment Fields on User { name }";
        let result = inject_typename(query);
        assert!(result.matches(TYPENAME_FIELD).count() >= 2);
    }

    #[test]
    fn is_idempotent() {
        let query = "{ user { name address { city } } posts { title } }";
        let once = inject_typename(query);
        let twice = inject_typename(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn is_idempotent_on_unparseable_input() {
        let bad_query = "not graphql at all {{{";
        let once = inject_typename(bad_query);
        let twice = inject_typename(&once);
        assert_eq!(once, twice);
    }
}

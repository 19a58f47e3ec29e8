use crate::ast;

/// Prints a parsed argument value back to its syntactic source form, the
/// same textual shape the GraphQL document used it in: a variable reference
/// keeps its leading `$`, a string literal keeps its quotes, and composite
/// literals are printed back recursively. Resolving this text to a GraphQL
/// *type* is the extractor's job (see [`crate::extractor`]), not this
/// function's.
pub fn print_ast_value(value: &ast::Value) -> String {
    match value {
        ast::Value::Variable(name) => format!("${name}"),
        ast::Value::Int(n) => n.as_i64().map(|v| v.to_string()).unwrap_or_default(),
        ast::Value::Float(f) => f.to_string(),
        ast::Value::String(s) => format!("{s:?}"),
        ast::Value::Boolean(b) => b.to_string(),
        ast::Value::Null => "null".to_string(),
        ast::Value::Enum(name) => name.clone(),
        ast::Value::List(items) => {
            let inner = items.iter().map(print_ast_value).collect::<Vec<_>>().join(", ");
            format!("[{inner}]")
        }
        ast::Value::Object(fields) => {
            let inner = fields
                .iter()
                .map(|(key, val)| format!("{key}: {}", print_ast_value(val)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{{inner}}}")
        }
    }
}

/// Converts a parsed AST value (as seen on a variable's default value) into
/// a [`serde_json::Value`] so it shares a representation with the observed
/// values that come straight off the wire as JSON.
pub fn ast_value_to_json(value: &ast::Value) -> serde_json::Value {
    match value {
        // A default value can't itself reference another variable; there's
        // nothing sensible to carry over.
        ast::Value::Variable(_) => serde_json::Value::Null,
        ast::Value::Int(n) => n
            .as_i64()
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        ast::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ast::Value::String(s) => serde_json::Value::String(s.clone()),
        ast::Value::Boolean(b) => serde_json::Value::Bool(*b),
        ast::Value::Null => serde_json::Value::Null,
        ast::Value::Enum(name) => serde_json::Value::String(name.clone()),
        ast::Value::List(items) => {
            serde_json::Value::Array(items.iter().map(ast_value_to_json).collect())
        }
        ast::Value::Object(fields) => serde_json::Value::Object(
            fields
                .iter()
                .map(|(key, val)| (key.clone(), ast_value_to_json(val)))
                .collect(),
        ),
    }
}

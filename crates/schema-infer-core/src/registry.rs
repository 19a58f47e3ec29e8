//! The accumulator mutated by [`crate::extractor`] across every trace, then
//! consumed read-only by [`crate::assembler`].

use crate::error::RegistryInvariantError;
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Per-field sample cap and per-list sampling cap (spec resource bounds).
pub const MAX_OBSERVED_VALUES: usize = 5;
pub const MAX_SAMPLED_LIST_ELEMENTS: usize = 5;

const BUILTIN_SCALARS: &[&str] = &["String", "Int", "Float", "Boolean", "ID", "JSON"];

/// True for the handful of scalar names that never get a `types`/`enums`
/// entry of their own.
pub fn is_builtin_scalar(name: &str) -> bool {
    BUILTIN_SCALARS.contains(&name)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TypeKind {
    Object,
    Input,
}

/// A field accumulated across every trace that observed its parent type.
///
/// All boolean flags here are monotonic: `is_list` and (once lowered)
/// `is_nullable`'s refinement only move in one direction, and
/// `is_always_present` only moves from `true` to `false`, never back.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldRecord {
    pub name: String,
    pub type_name: Option<String>,
    pub is_list: bool,
    pub is_nullable: bool,
    pub is_always_present: bool,
    pub arguments: IndexMap<String, String>,
    /// Guards argument-type stickiness: once an argument's type was derived
    /// from a variable reference, a later literal must not overwrite it
    /// (spec §4.2.3's "sticky" merge rule).
    pub(crate) variable_derived_arguments: BTreeSet<String>,
    pub observed_values: Vec<serde_json::Value>,
    pub description: Option<String>,
}

impl FieldRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            is_list: false,
            is_nullable: true,
            is_always_present: true,
            arguments: IndexMap::new(),
            variable_derived_arguments: BTreeSet::new(),
            observed_values: Vec::new(),
            description: None,
        }
    }

    /// Records an observed scalar value, deduplicated and capped at
    /// [`MAX_OBSERVED_VALUES`].
    pub fn add_observed_value(&mut self, value: serde_json::Value) {
        if self.observed_values.len() < MAX_OBSERVED_VALUES && !self.observed_values.contains(&value) {
            self.observed_values.push(value);
        }
    }
}

/// A GraphQL object or input type being reconstructed from observations.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TypeRecord {
    pub name: String,
    pub kind: TypeKind,
    pub fields: IndexMap<String, FieldRecord>,
    pub interfaces: BTreeSet<String>,
    pub observed_paths: Vec<String>,
    pub description: Option<String>,
    pub observation_count: u64,
}

impl TypeRecord {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: IndexMap::new(),
            interfaces: BTreeSet::new(),
            observed_paths: Vec::new(),
            description: None,
            observation_count: 0,
        }
    }

    pub fn record_observation(&mut self, path: &str) {
        self.observation_count += 1;
        if !self.observed_paths.iter().any(|p| p == path) {
            self.observed_paths.push(path.to_string());
        }
    }

    pub fn field_or_create(&mut self, name: &str) -> &mut FieldRecord {
        self.fields
            .entry(name.to_string())
            .or_insert_with(|| FieldRecord::new(name))
    }
}

/// An enum inferred from either a variable's observed string value or a
/// bare-identifier argument literal.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnumRecord {
    pub name: String,
    pub values: BTreeSet<String>,
    pub description: Option<String>,
}

impl EnumRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeSet::new(),
            description: None,
        }
    }
}

/// Central registry of all discovered types and enums, keyed by name.
///
/// Owned exclusively by one [`crate::extract_graphql_schema`] invocation
/// from construction to handoff to [`crate::assembler`]; there is no shared
/// mutable state across inference runs.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct TypeRegistry {
    pub types: IndexMap<String, TypeRecord>,
    pub enums: IndexMap<String, EnumRecord>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_type(&mut self, name: &str) -> &mut TypeRecord {
        self.types
            .entry(name.to_string())
            .or_insert_with(|| TypeRecord::new(name, TypeKind::Object))
    }

    /// Gets or creates a type record, forcing its kind to [`TypeKind::Input`]
    /// even if it was previously recorded as an object (a type observed both
    /// as a response object and as a variable's input shape is not expected
    /// in well-formed schemas, but when it happens the input observation
    /// wins, per spec §4.2.6).
    pub fn get_or_create_input_type(&mut self, name: &str) -> &mut TypeRecord {
        let record = self
            .types
            .entry(name.to_string())
            .or_insert_with(|| TypeRecord::new(name, TypeKind::Input));
        record.kind = TypeKind::Input;
        record
    }

    pub fn get_or_create_enum(&mut self, name: &str) -> &mut EnumRecord {
        self.enums
            .entry(name.to_string())
            .or_insert_with(|| EnumRecord::new(name))
    }

    /// Validates the registry's structural invariants (spec §3). Returns
    /// the first violation found; violations here indicate a defect in this
    /// crate, never in the traces it was built from.
    pub fn check_invariants(&self) -> Result<(), RegistryInvariantError> {
        for builtin in BUILTIN_SCALARS {
            if self.types.contains_key(*builtin) || self.enums.contains_key(*builtin) {
                return Err(RegistryInvariantError::BuiltinScalarRegistered {
                    name: (*builtin).to_string(),
                });
            }
        }

        for type_record in self.types.values() {
            for field in type_record.fields.values() {
                let Some(referenced) = field.type_name.as_deref() else {
                    continue;
                };
                if is_builtin_scalar(referenced) {
                    continue;
                }
                if !self.types.contains_key(referenced) && !self.enums.contains_key(referenced) {
                    return Err(RegistryInvariantError::DanglingTypeReference {
                        type_name: type_record.name.clone(),
                        field: field.name.clone(),
                        referenced_type: referenced.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// The complete output of one inference run: the populated registry plus
/// the three ordered root-field lists the assembler needs to seed field
/// ordering on `Query`/`Mutation`/`Subscription`.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct GraphQLSchemaData {
    pub registry: TypeRegistry,
    pub root_query_fields: Vec<String>,
    pub root_mutation_fields: Vec<String>,
    pub root_subscription_fields: Vec<String>,
}

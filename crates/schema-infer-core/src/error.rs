/// A violation of one of [`TypeRegistry`](crate::registry::TypeRegistry)'s
/// structural invariants.
///
/// These can only arise from a defect inside this crate — untrusted trace
/// input is handled permissively (see the module docs on
/// [`crate::extractor`]) and never reaches this path. Surfacing it as a
/// `panic!` via [`RegistryInvariantError::Display`] rather than threading a
/// `Result` through every registry mutation keeps the common-case API
/// infallible, matching how the rest of the pipeline treats malformed
/// *input* (skip) differently from broken *invariants* (fatal).
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RegistryInvariantError {
    #[error(
        "field `{field}` on type `{type_name}` references unknown type `{referenced_type}`"
    )]
    DanglingTypeReference {
        type_name: String,
        field: String,
        referenced_type: String,
    },

    #[error("built-in scalar `{name}` was registered as a named type or enum")]
    BuiltinScalarRegistered { name: String },
}

//! Reconstructs a GraphQL SDL document from captured request/response trace
//! pairs.
//!
//! The pipeline runs in three stages: [`parser`] turns each trace's request
//! body into parsed operations, [`extractor`] walks those operations
//! alongside their matching response bodies to populate a [`TypeRegistry`],
//! and [`assembler`] renders the populated registry to SDL text. Call
//! [`extract_graphql_schema`] then [`build_sdl`] to run the whole pipeline,
//! or use the stage modules directly to inspect intermediate state.

pub mod assembler;
pub mod ast;
pub mod error;
pub mod extractor;
pub mod parser;
pub mod registry;
pub mod trace;
pub mod value;

pub use assembler::build_sdl;
pub use error::RegistryInvariantError;
pub use extractor::extract_graphql_schema;
pub use registry::{EnumRecord, FieldRecord, GraphQLSchemaData, TypeKind, TypeRecord, TypeRegistry};
pub use trace::Trace;

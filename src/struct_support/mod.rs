//! WPILib struct support for parsing packed binary structures.
//!
//! Schemas arrive as `structschema` entries in the log and may show up after
//! the data that needs them. Records whose layout is not fully known yet are
//! parked in a [`StructDecodeQueue`] and released once every nested schema is
//! registered.

pub mod deserializer;
pub mod graph;
pub mod lexer;
pub mod parser;
pub mod queue;
pub mod registry;
pub mod types;

pub use deserializer::{FieldValue, StructValue, MAX_DECODE_DEPTH};
pub use graph::StructDependencyGraph;
pub use parser::SchemaParser;
pub use queue::{PendingStructRecord, StructDecodeQueue};
pub use registry::StructRegistry;
pub use types::{
    DecodeStatus, EnumSpec, ScalarType, StructDeclaration, ValueType, KNOWN_TYPE_NAMES,
};

//! OVAL test-definition document model
//!
//! The definition side of the conversion: the document-scoped identifier
//! scheme and the typed element model for definitions, criteria trees,
//! tests, objects, states, and external variables.

mod elements;

pub use elements::{
    oval_id, oval_id_with_version, Criteria, Criterion, Definition, DefinitionMetadata, Entity,
    ExternalVariable, Operator, OvalDocument, OvalKind, OvalObject, OvalState, Test, TestCheck,
    TestExistence,
};

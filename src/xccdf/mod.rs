//! XCCDF benchmark document model
//!
//! The benchmark side of the conversion: identifier generation with a
//! vendor namespace and the typed element model for benchmark, tailoring,
//! profile, group, rule, value, and check entities.

mod elements;
mod generator;

pub use elements::{
    Benchmark, Check, CheckSystem, DcBlock, Group, Profile, Rule, RuleReference, Severity, Status,
    StatusKind, Tailoring, Value, ValueFacet, ValueOperator,
};
pub use generator::{XccdfGenerator, XccdfKind};

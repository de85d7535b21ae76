//! # Rampart
//!
//! Compiles YAML-authored security benchmarks into the two
//! cross-referencing compliance documents scanners consume: an XCCDF
//! benchmark/rule document and an OVAL test-definition document.
//! Benchmark authors write compact YAML; rampart assembles the verbose,
//! schema-heavy XML.
//!
//! ## What it does
//!
//! - **Element assembly**: a namespace-aware tree builder with
//!   schema-declared child ordering, attribute insertion-order
//!   preservation, and identity-deduplicated appends
//! - **Typed object model**: benchmark, profile, group, rule, value,
//!   check on the XCCDF side; definition, criteria, test, object, state,
//!   variable on the OVAL side
//! - **Deterministic identifiers**: `xccdf_<vendor-ns>_<kind>_<local>`
//!   and `oval:<local>:{def|obj|ste|tst|var}:<version>`, pure functions
//!   so independently-parsed rules can discover shared entities by
//!   recomputing ids
//! - **Deduplicating registries**: first-writer-wins by generated id,
//!   merging contributions from many rules without duplication
//! - **Criteria composition**: AND/OR boolean trees over test references
//! - **Check-type parsers**: pkg, file, sysctl, pattern_match, systemd,
//!   listen, sce, cmd_exec
//!
//! ## Quick start
//!
//! ```ignore
//! use rampart::{Compiler, CompilerContext};
//!
//! let compiler = Compiler::new("example.com", CompilerContext::default());
//! let conversion = compiler.convert_str(r#"
//! benchmark:
//!   id: baseline
//!   title: Example baseline
//!   platform: 'cpe:/o:canonical:ubuntu_linux:16.04'
//!   rules:
//!     - aide_installed:
//!         type: pkg
//!         name: aide
//! "#)?;
//! conversion.write("build".as_ref())?;
//! # Ok::<(), rampart::Error>(())
//! ```
//!
//! The conversion is all-or-nothing: every error aborts the run before
//! anything is written, so no partial document ever reaches disk.

pub mod codeblock;
pub mod compiler;
pub mod cpe;
pub mod error;
pub mod oval;
pub mod parsers;
pub mod registry;
pub mod shared;
pub mod xccdf;
pub mod xml;

pub use compiler::{Compiler, CompilerContext, Conversion};
pub use error::{Error, Result};
pub use parsers::{CheckKind, ParsedRule, ParserContext};
pub use shared::{SharedFile, SharedFiles};
pub use xccdf::{Benchmark, Tailoring, XccdfGenerator, XccdfKind};

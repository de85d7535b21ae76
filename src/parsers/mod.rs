//! Check-type parsers
//!
//! Each rule entry in the authoring document selects a parser through its
//! `type` field. The discriminator registry is a closed enumeration: an
//! unrecognized type is a validation error, never a silent no-op.
//!
//! Every parser receives the rule id, the rule's YAML mapping, and a
//! [`ParserContext`], and returns a [`ParsedRule`]: the registered rule
//! plus whatever definition-side content (objects, states, tests, at most
//! one definition, an optional external variable) the check produces.
//! Shared helper files are contributed directly to the context registry.

use std::collections::HashMap;

use serde_yaml::Mapping;

use crate::error::{Error, Result};
use crate::oval::{Definition, ExternalVariable, OvalObject, OvalState, Test};
use crate::shared::SharedFiles;
use crate::xccdf::{Benchmark, Rule};

pub(crate) mod common;

mod cmd;
mod file;
mod listen;
mod pattern;
mod pkg;
mod script;
mod service;
mod sysctl;

/// Closed registry of check-type discriminators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Package installed at a version (`pkg`)
    Pkg,
    /// File mode and ownership (`file`)
    File,
    /// Kernel parameter value (`sysctl`)
    Sysctl,
    /// Text pattern in files (`pattern_match`)
    PatternMatch,
    /// Systemd unit state and wiring (`systemd`)
    Systemd,
    /// Listening network service (`listen`)
    Listen,
    /// Script check engine (`sce`)
    Sce,
    /// Wrapped command execution (`cmd_exec`)
    CmdExec,
}

impl CheckKind {
    /// All check kinds, in discriminator order
    pub fn all() -> &'static [CheckKind] {
        &[
            Self::Pkg,
            Self::File,
            Self::Sysctl,
            Self::PatternMatch,
            Self::Systemd,
            Self::Listen,
            Self::Sce,
            Self::CmdExec,
        ]
    }

    /// The YAML discriminator for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pkg => "pkg",
            Self::File => "file",
            Self::Sysctl => "sysctl",
            Self::PatternMatch => "pattern_match",
            Self::Systemd => "systemd",
            Self::Listen => "listen",
            Self::Sce => "sce",
            Self::CmdExec => "cmd_exec",
        }
    }

    /// Parse a discriminator; unknown types are a validation error naming
    /// the rejected input
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pkg" => Ok(Self::Pkg),
            "file" => Ok(Self::File),
            "sysctl" => Ok(Self::Sysctl),
            "pattern_match" => Ok(Self::PatternMatch),
            "systemd" => Ok(Self::Systemd),
            "listen" => Ok(Self::Listen),
            "sce" => Ok(Self::Sce),
            "cmd_exec" => Ok(Self::CmdExec),
            other => Err(Error::validation(format!(
                "unknown check type '{}', expected one of \
                 pkg/file/sysctl/pattern_match/systemd/listen/sce/cmd_exec",
                other
            ))),
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable conversion state a parser may contribute to
pub struct ParserContext<'a> {
    /// The benchmark under assembly; parsers register values through it
    pub benchmark: &'a mut Benchmark,
    /// Shared helper files contributed by parsers
    pub shared_files: &'a mut SharedFiles,
    /// Platform identifiers this rule affects
    pub affected: Vec<String>,
    /// Declared datatypes of benchmark values, for external variables
    pub value_types: &'a HashMap<String, String>,
}

/// What a check-type parser hands back to the compiler
#[derive(Debug)]
pub struct ParsedRule {
    /// The assembled rule
    pub rule: Rule,
    /// At most one definition
    pub definition: Option<Definition>,
    /// Definition-side tests
    pub tests: Vec<Test>,
    /// Definition-side objects
    pub objects: Vec<OvalObject>,
    /// Definition-side states
    pub states: Vec<OvalState>,
    /// External variable bound to an exported value
    pub variable: Option<ExternalVariable>,
}

impl ParsedRule {
    /// Wrap a rule with no definition-side content yet
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            definition: None,
            tests: Vec::new(),
            objects: Vec::new(),
            states: Vec::new(),
            variable: None,
        }
    }

    /// Whether the core should attach a definition-side content reference
    pub fn has_oval_data(&self) -> bool {
        self.definition.is_some()
            || !self.tests.is_empty()
            || !self.objects.is_empty()
            || !self.states.is_empty()
    }

    /// Whether an external variable was produced
    pub fn has_variable(&self) -> bool {
        self.variable.is_some()
    }
}

/// Dispatch a rule to its check-type parser
pub fn parse_rule(
    kind: CheckKind,
    ctx: &mut ParserContext<'_>,
    id: &str,
    spec: &Mapping,
) -> Result<ParsedRule> {
    tracing::debug!(rule = id, kind = %kind, "parsing rule");
    match kind {
        CheckKind::Pkg => pkg::parse(ctx, id, spec),
        CheckKind::File => file::parse(ctx, id, spec),
        CheckKind::Sysctl => sysctl::parse(ctx, id, spec),
        CheckKind::PatternMatch => pattern::parse(ctx, id, spec),
        CheckKind::Systemd => service::parse(ctx, id, spec),
        CheckKind::Listen => listen::parse(ctx, id, spec),
        CheckKind::Sce => script::parse(ctx, id, spec),
        CheckKind::CmdExec => cmd::parse(ctx, id, spec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_discriminator_is_validation_error() {
        let err = CheckKind::parse("frobnicate").unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn test_discriminator_roundtrip() {
        for kind in CheckKind::all() {
            assert_eq!(CheckKind::parse(kind.as_str()).unwrap(), *kind);
        }
    }
}

//! Benchmark-side identifier generation
//!
//! XCCDF identifiers embed a reversed vendor namespace so that documents
//! from different vendors never collide:
//! `xccdf_<reversed-vendor-namespace>_<kind>_<local>`. The format is
//! bit-exact for downstream scanner interoperability.
//!
//! Identifier construction is a pure function of (namespace, kind, local
//! name). Independently-invoked rule parsers rely on this referential
//! transparency to discover entities created elsewhere in the run by
//! recomputing their ids instead of passing references around.

use crate::error::{Error, Result};

/// Closed set of XCCDF entity kinds that carry generated identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XccdfKind {
    /// Top-level benchmark document
    Benchmark,
    /// Selection profile
    Profile,
    /// Rule group
    Group,
    /// Checkable rule
    Rule,
    /// Tailorable parameter
    Value,
    /// Scan result container
    TestResult,
    /// Tailoring document
    Tailoring,
}

impl XccdfKind {
    /// All kinds, in identifier-vocabulary order
    pub fn all() -> &'static [XccdfKind] {
        &[
            Self::Benchmark,
            Self::Profile,
            Self::Group,
            Self::Rule,
            Self::Value,
            Self::TestResult,
            Self::Tailoring,
        ]
    }

    /// Identifier segment for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Benchmark => "benchmark",
            Self::Profile => "profile",
            Self::Group => "group",
            Self::Rule => "rule",
            Self::Value => "value",
            Self::TestResult => "testresult",
            Self::Tailoring => "tailoring",
        }
    }

    /// Parse a kind segment; unknown kinds are a validation error naming
    /// the rejected input
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "benchmark" => Ok(Self::Benchmark),
            "profile" => Ok(Self::Profile),
            "group" => Ok(Self::Group),
            "rule" => Ok(Self::Rule),
            "value" => Ok(Self::Value),
            "testresult" => Ok(Self::TestResult),
            "tailoring" => Ok(Self::Tailoring),
            other => Err(Error::validation(format!(
                "unknown XCCDF element kind '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for XccdfKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run XCCDF identifier generator
///
/// Normalizes the vendor string once at construction: lowercase, strip
/// characters outside `[a-z0-9._-]`, collapse repeated dots, reverse the
/// dotted segments (`mirantis.com` becomes `com.mirantis`).
///
/// Instantiate one generator per conversion run — never share a generator
/// across runs, so batched conversions stay isolated.
#[derive(Debug, Clone)]
pub struct XccdfGenerator {
    vendor: String,
    namespace: String,
}

impl XccdfGenerator {
    /// Create a generator for a vendor string
    pub fn new(vendor: impl Into<String>) -> Self {
        let vendor = vendor.into();
        let cleaned: String = vendor
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            .collect();
        let mut collapsed = String::with_capacity(cleaned.len());
        for c in cleaned.chars() {
            if c == '.' && collapsed.ends_with('.') {
                continue;
            }
            collapsed.push(c);
        }
        let namespace = collapsed
            .trim_matches('.')
            .split('.')
            .rev()
            .collect::<Vec<_>>()
            .join(".");
        Self { vendor, namespace }
    }

    /// The original vendor string
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// The reversed vendor namespace token
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Build an identifier for a kind and local name
    ///
    /// Pure: the same (kind, local) pair always yields the identical
    /// string within one generator.
    pub fn id(&self, kind: XccdfKind, local: &str) -> String {
        format!("xccdf_{}_{}_{}", self.namespace, kind.as_str(), local)
    }

    /// Build an identifier from a textual kind segment, as used by profile
    /// selector references written `target:idref` in the authoring format
    pub fn parse_id(&self, kind: &str, local: &str) -> Result<String> {
        Ok(self.id(XccdfKind::parse(kind)?, local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_namespace_reversal() {
        let generator = XccdfGenerator::new("mirantis.com");
        assert_eq!(generator.namespace(), "com.mirantis");
    }

    #[test]
    fn test_vendor_normalization() {
        // mixed case, disallowed characters, repeated dots
        let generator = XccdfGenerator::new("Sec Ops!..Example.COM");
        assert_eq!(generator.namespace(), "com.example.secops");
    }

    #[test]
    fn test_id_format() {
        let generator = XccdfGenerator::new("mirantis.com");
        assert_eq!(
            generator.id(XccdfKind::Rule, "pkg_test"),
            "xccdf_com.mirantis_rule_pkg_test"
        );
        assert_eq!(
            generator.id(XccdfKind::Value, "pkg_test-codeblock"),
            "xccdf_com.mirantis_value_pkg_test-codeblock"
        );
    }

    #[test]
    fn test_id_is_idempotent() {
        let generator = XccdfGenerator::new("mirantis.com");
        let a = generator.id(XccdfKind::Profile, "default");
        let b = generator.id(XccdfKind::Profile, "default");
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_kind_is_validation_error() {
        let generator = XccdfGenerator::new("mirantis.com");
        let err = generator.parse_id("gadget", "x").unwrap_err();
        assert!(err.to_string().contains("gadget"));
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in XccdfKind::all() {
            assert_eq!(XccdfKind::parse(kind.as_str()).unwrap(), *kind);
        }
    }
}

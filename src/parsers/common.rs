//! Shared plumbing for check-type parsers
//!
//! Rule metadata common to every check type (title, description,
//! rationale, idents, references) loads through one place, and the small
//! YAML access helpers here keep the per-type parsers focused on their
//! definition-side content.

use serde_yaml::{Mapping, Value as Yaml};

use crate::cpe;
use crate::error::{Error, Result};
use crate::oval::DefinitionMetadata;
use crate::xccdf::{DcBlock, Rule, Severity, XccdfGenerator};

/// Fetch a key from a YAML mapping
pub(crate) fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Yaml> {
    map.get(key)
}

/// Render a YAML scalar as a string
pub(crate) fn scalar_str(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Fetch a string-convertible field
pub(crate) fn str_field(map: &Mapping, key: &str) -> Option<String> {
    get(map, key).and_then(scalar_str)
}

/// Fetch a required string field, reporting the missing key and context
pub(crate) fn require_str(map: &Mapping, key: &'static str, context: &str) -> Result<String> {
    str_field(map, key).ok_or_else(|| Error::config(key, context.to_string()))
}

/// Fetch a boolean field, defaulting to false
pub(crate) fn bool_field(map: &Mapping, key: &str) -> bool {
    get(map, key).and_then(Yaml::as_bool).unwrap_or(false)
}

/// Read a scalar-or-list field as a list of strings
pub(crate) fn string_list(value: &Yaml) -> Vec<String> {
    match value {
        Yaml::Sequence(seq) => seq.iter().filter_map(scalar_str).collect(),
        other => scalar_str(other).into_iter().collect(),
    }
}

/// Build a rule and load the metadata shared by every check type
pub(crate) fn base_rule(generator: &XccdfGenerator, id: &str, spec: &Mapping) -> Result<Rule> {
    let context = format!("rule '{}'", id);
    let mut rule = Rule::new(generator, id);

    if let Some(title) = str_field(spec, "title") {
        rule.set_title(title);
    }
    if let Some(description) = str_field(spec, "description") {
        rule.set_description(description);
    }
    if let Some(rationale) = str_field(spec, "rationale") {
        rule.set_rationale(rationale.trim_end());
    }
    if let Some(severity) = str_field(spec, "severity") {
        rule.set_severity(Severity::parse(&severity)?);
    }

    if let Some(idents) = get(spec, "ident") {
        let idents = idents.as_mapping().ok_or_else(|| {
            Error::validation(format!("'ident' in {} must be a mapping", context))
        })?;
        for (name, system) in idents {
            let (Some(name), Some(system)) = (scalar_str(name), scalar_str(system)) else {
                continue;
            };
            rule.add_ident(name, system);
        }
    }

    if let Some(Yaml::Sequence(references)) = get(spec, "reference") {
        for reference in references {
            match reference {
                Yaml::Mapping(entry) => {
                    let text = require_str(entry, "text", &context)?;
                    rule.add_reference(text, str_field(entry, "url"));
                }
                other => {
                    if let Some(text) = scalar_str(other) {
                        rule.add_reference(text, None);
                    }
                }
            }
        }
    }

    if let Some(Yaml::Sequence(references)) = get(spec, "dc-reference") {
        for reference in references {
            let Some(entry) = reference.as_mapping() else {
                continue;
            };
            let mut dc = DcBlock::reference();
            for (name, value) in entry {
                let (Some(name), Some(value)) = (scalar_str(name), scalar_str(value)) else {
                    continue;
                };
                if name == "href" {
                    dc.set_href(value);
                } else {
                    dc.add_entry(&name, value)?;
                }
            }
            rule.add_dc_reference(dc);
        }
    }

    Ok(rule)
}

/// Build definition metadata: title, a generated description, and the
/// affected-platform list mapped from CPE identifiers
pub(crate) fn definition_metadata(
    id: &str,
    title: Option<&str>,
    affected: &[String],
) -> DefinitionMetadata {
    let mut metadata = DefinitionMetadata::new();
    metadata.set_title(title.unwrap_or(id));
    metadata.set_description(format!("Check for {}", id));
    for platform in affected {
        metadata.set_affected("unix", cpe::affected_platform(platform));
    }
    metadata
}

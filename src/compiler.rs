//! Conversion pipeline
//!
//! One synchronous pass over an already-merged YAML document: load the
//! benchmark header, profiles, values, and shared files, dispatch each
//! rule to its check-type parser, register the parsed content into the
//! shared documents, then render both documents fully in memory. Nothing
//! touches the filesystem until the whole conversion has succeeded, so a
//! failed run leaves no partial output behind.
//!
//! Include/template resolution is a collaborator concern: the compiler
//! expects rule metadata to arrive already deep-merged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_yaml::{Mapping, Value as Yaml};

use crate::error::{Error, Result};
use crate::oval::OvalDocument;
use crate::parsers::{self, CheckKind, ParserContext};
use crate::shared::SharedFiles;
use crate::xccdf::{
    Benchmark, Check, CheckSystem, DcBlock, StatusKind, Tailoring, ValueFacet, ValueOperator,
    XccdfGenerator, XccdfKind,
};
use crate::xml::{serialize, OVAL_NSMAP, XCCDF_NSMAP};

use crate::parsers::common::{get, scalar_str, str_field, string_list};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Explicit per-run paths; nothing in the core consults the process
/// working directory
#[derive(Debug, Clone)]
pub struct CompilerContext {
    /// Optional content root shared-file sources may fall back to
    pub basedir: Option<PathBuf>,
    /// Directory of the authoring document, the primary root for
    /// relative shared-file sources
    pub workdir: PathBuf,
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self {
            basedir: None,
            workdir: PathBuf::from("."),
        }
    }
}

/// The finished, still in-memory output of one conversion run
#[derive(Debug)]
pub struct Conversion {
    /// Local id of the converted document
    pub benchmark_id: String,
    /// Output file name of the primary document
    pub benchmark_filename: String,
    /// Rendered primary document
    pub benchmark_xml: String,
    /// Output file name the rule checks reference for definitions
    pub oval_filename: String,
    /// Rendered test-definition document, absent when no rule produced
    /// definition-side content
    pub oval_xml: Option<String>,
    /// Shared files contributed by the rules
    pub shared_files: SharedFiles,
    context: CompilerContext,
}

impl Conversion {
    /// Write every output file under `output_dir/<benchmark-id>/`
    ///
    /// Documents were fully assembled before this is called; each file is
    /// written exactly once. Returns the primary document path.
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        let target_dir = output_dir.join(&self.benchmark_id);
        std::fs::create_dir_all(&target_dir).map_err(|e| Error::io(&target_dir, &e))?;

        let benchmark_path = target_dir.join(&self.benchmark_filename);
        std::fs::write(&benchmark_path, &self.benchmark_xml)
            .map_err(|e| Error::io(&benchmark_path, &e))?;

        if let Some(ref oval_xml) = self.oval_xml {
            let oval_path = target_dir.join(&self.oval_filename);
            std::fs::write(&oval_path, oval_xml).map_err(|e| Error::io(&oval_path, &e))?;
        }

        self.shared_files.export(
            &target_dir,
            &self.context.workdir,
            self.context.basedir.as_deref(),
        )?;

        tracing::debug!(path = ?benchmark_path, "conversion written");
        Ok(benchmark_path)
    }
}

/// YAML-to-document compiler
///
/// Owns nothing between runs: every conversion instantiates a fresh
/// generator and fresh registries, so repeated or batched conversions
/// stay isolated from one another.
#[derive(Debug, Clone)]
pub struct Compiler {
    vendor: String,
    context: CompilerContext,
}

impl Compiler {
    /// Create a compiler for a vendor namespace
    pub fn new(vendor: impl Into<String>, context: CompilerContext) -> Self {
        Self {
            vendor: vendor.into(),
            context,
        }
    }

    /// Convert a YAML source string
    pub fn convert_str(&self, yaml: &str) -> Result<Conversion> {
        let doc: Yaml = serde_yaml::from_str(yaml)?;
        self.convert(&doc)
    }

    /// Convert an already-parsed, already-merged document
    pub fn convert(&self, doc: &Yaml) -> Result<Conversion> {
        let data = doc
            .get("benchmark")
            .and_then(Yaml::as_mapping)
            .ok_or_else(|| Error::config("benchmark", "document root"))?;

        let benchmark_id = str_field(data, "id").ok_or_else(|| Error::config("id", "benchmark"))?;
        let now = Utc::now().naive_utc();

        let generator = XccdfGenerator::new(self.vendor.as_str());
        let mut benchmark = Benchmark::new(generator.clone(), benchmark_id.as_str());
        benchmark.set_version(
            str_field(data, "version").unwrap_or_else(|| "0.1".to_string()),
            Some(now),
        );
        if let Some(title) = str_field(data, "title") {
            benchmark.set_title(title);
        }
        if let Some(description) = str_field(data, "description") {
            benchmark.set_description(description);
        }
        if let Some(status) = str_field(data, "status") {
            benchmark.add_status(StatusKind::parse(&status)?, now.date());
        }

        for key in ["platform", "platforms"] {
            if let Some(platforms) = get(data, key) {
                for platform in string_list(platforms) {
                    benchmark.add_platform(platform.trim_end());
                }
            }
        }

        if let Some(dc_data) = get(data, "dc-metadata").and_then(Yaml::as_mapping) {
            let mut dc = DcBlock::metadata();
            for (name, values) in dc_data {
                let Some(name) = scalar_str(name) else {
                    continue;
                };
                for value in string_list(values) {
                    dc.add_entry(&name, value)?;
                }
            }
            benchmark.set_dc_metadata(dc);
        }

        self.load_profiles(&mut benchmark, data)?;

        let default_group = self.load_groups(&mut benchmark, data);

        let value_types = self.load_values(&mut benchmark, data)?;

        let mut shared_files = SharedFiles::new();
        if let Some(Yaml::Sequence(items)) = get(data, "shared-files") {
            for item in items {
                match item {
                    Yaml::Mapping(entry) => {
                        for (filename, source) in entry {
                            let (Some(filename), Some(source)) =
                                (scalar_str(filename), scalar_str(source))
                            else {
                                continue;
                            };
                            shared_files.insert_source(Some(filename.as_str()), source)?;
                        }
                    }
                    other => {
                        if let Some(source) = scalar_str(other) {
                            shared_files.insert_source(None, source)?;
                        }
                    }
                }
            }
        }

        let oval_filename = format!("{}-oval.xml", benchmark_id);
        let mut oval = OvalDocument::new(now);

        let rules = get(data, "rules").cloned().unwrap_or(Yaml::Sequence(vec![]));
        for (rule_id, spec) in flatten_rules(&rules)? {
            let kind_name =
                str_field(&spec, "type").unwrap_or_else(|| CheckKind::Sce.as_str().to_string());
            let kind = CheckKind::parse(&kind_name)?;

            let affected = match get(&spec, "affected") {
                Some(value) => string_list(value),
                None => benchmark.platforms().to_vec(),
            };

            let mut parsed = {
                let mut ctx = ParserContext {
                    benchmark: &mut benchmark,
                    shared_files: &mut shared_files,
                    affected,
                    value_types: &value_types,
                };
                parsers::parse_rule(kind, &mut ctx, &rule_id, &spec)?
            };

            if parsed.has_oval_data() {
                let mut check = Check::new(CheckSystem::OvalDefinitions);
                if let Some(ref variable) = parsed.variable {
                    if let Some(value_name) = str_field(&spec, "variable") {
                        check.check_export(
                            generator.id(XccdfKind::Value, &value_name),
                            variable.id().to_string(),
                        );
                    }
                }
                if let Some(ref definition) = parsed.definition {
                    check.check_content_ref(oval_filename.clone(), Some(definition.id().to_string()));
                }
                parsed.rule.add_check(check);

                oval.extend_objects(parsed.objects);
                oval.extend_states(parsed.states);
                oval.extend_tests(parsed.tests);
                if let Some(definition) = parsed.definition {
                    oval.append_definition(definition);
                }
                if let Some(variable) = parsed.variable {
                    oval.append_variable(variable);
                }
            }

            benchmark.new_group(&default_group).append_rule(parsed.rule);
        }

        oval.validate_references()?;

        let benchmark_xml = format!(
            "{}{}",
            XML_DECLARATION,
            serialize(&benchmark.to_element()?, XCCDF_NSMAP)
        );
        let oval_xml = if oval.is_empty() {
            None
        } else {
            Some(format!(
                "{}{}",
                XML_DECLARATION,
                serialize(&oval.to_element()?, OVAL_NSMAP)
            ))
        };

        Ok(Conversion {
            benchmark_filename: format!("{}-xccdf.xml", benchmark_id),
            benchmark_id,
            benchmark_xml,
            oval_filename,
            oval_xml,
            shared_files,
            context: self.context.clone(),
        })
    }

    /// Convert a tailoring document: profiles layered over an existing
    /// benchmark's entities
    pub fn convert_tailoring(&self, doc: &Yaml) -> Result<Conversion> {
        let data = doc
            .get("tailoring")
            .and_then(Yaml::as_mapping)
            .ok_or_else(|| Error::config("tailoring", "document root"))?;

        let tailoring_id =
            str_field(data, "id").ok_or_else(|| Error::config("id", "tailoring"))?;
        let now = Utc::now().naive_utc();

        let generator = XccdfGenerator::new(self.vendor.as_str());
        let mut tailoring = Tailoring::new(generator.clone(), tailoring_id.as_str());
        tailoring.set_version(
            str_field(data, "version").unwrap_or_else(|| "0.1".to_string()),
            Some(now),
        );

        if let Some(profiles) = get(data, "profiles").and_then(Yaml::as_mapping) {
            for (profile_id, profile_data) in profiles {
                let Some(profile_id) = scalar_str(profile_id) else {
                    continue;
                };
                let Some(profile_data) = profile_data.as_mapping() else {
                    continue;
                };
                let extends = generator.id(XccdfKind::Profile, &profile_id);
                let local = format!("extends_{}", profile_id);
                let profile = tailoring.new_profile(&local);
                profile.set_extends(extends);
                if let Some(title) = str_field(profile_data, "title") {
                    profile.set_title(title);
                }
                if let Some(description) = str_field(profile_data, "description") {
                    profile.set_description(description);
                }
                load_selectors(profile, profile_data, &generator)?;
            }
        }

        let benchmark_xml = format!(
            "{}{}",
            XML_DECLARATION,
            serialize(&tailoring.to_element()?, XCCDF_NSMAP)
        );

        Ok(Conversion {
            benchmark_filename: format!("{}-tailoring.xml", tailoring_id),
            oval_filename: format!("{}-oval.xml", tailoring_id),
            benchmark_id: tailoring_id,
            benchmark_xml,
            oval_xml: None,
            shared_files: SharedFiles::new(),
            context: self.context.clone(),
        })
    }

    fn load_profiles(&self, benchmark: &mut Benchmark, data: &Mapping) -> Result<()> {
        let generator = benchmark.generator().clone();
        let profiles = get(data, "profiles").cloned().unwrap_or(Yaml::Null);
        let entries: Vec<(String, Mapping)> = match profiles {
            Yaml::Sequence(items) => {
                let mut entries = Vec::new();
                for item in items {
                    let Yaml::Mapping(entry) = item else { continue };
                    for (profile_id, profile_data) in entry {
                        let (Some(profile_id), Some(profile_data)) =
                            (scalar_str(&profile_id), profile_data.as_mapping())
                        else {
                            continue;
                        };
                        entries.push((profile_id, profile_data.clone()));
                    }
                }
                entries
            }
            _ => Vec::new(),
        };

        if entries.is_empty() {
            benchmark.new_profile("default").set_title("Default Profile");
            return Ok(());
        }

        for (profile_id, profile_data) in entries {
            let profile = benchmark.new_profile(&profile_id);
            if let Some(abstract_) = get(&profile_data, "abstract").and_then(Yaml::as_bool) {
                profile.set_abstract(abstract_);
            }
            if let Some(extends) = str_field(&profile_data, "extends") {
                profile.set_extends(extends);
            }
            if let Some(status) = str_field(&profile_data, "status") {
                let kind = StatusKind::parse(&status)?;
                profile.add_status(kind, Utc::now().date_naive());
            }
            if let Some(version) = str_field(&profile_data, "version") {
                profile.set_version(version);
            }
            if let Some(title) = str_field(&profile_data, "title") {
                profile.set_title(title);
            }
            if let Some(description) = str_field(&profile_data, "description") {
                profile.set_description(description);
            }
            load_selectors(profile, &profile_data, &generator)?;
        }
        Ok(())
    }

    /// Create groups from the `group`/`groups` sections and return the
    /// local id of the group rules attach to
    fn load_groups(&self, benchmark: &mut Benchmark, data: &Mapping) -> String {
        let mut first: Option<String> = None;

        if let Some(group_data) = get(data, "group").and_then(Yaml::as_mapping) {
            let group_id =
                str_field(group_data, "id").unwrap_or_else(|| "default".to_string());
            let group = benchmark.new_group(&group_id);
            if let Some(title) = str_field(group_data, "title") {
                group.set_title(title);
            }
            if let Some(description) = str_field(group_data, "description") {
                group.set_description(description);
            }
            first = Some(group_id);
        }

        if let Some(Yaml::Sequence(items)) = get(data, "groups") {
            for item in items {
                let Some(entry) = item.as_mapping() else { continue };
                for (group_id, group_data) in entry {
                    let Some(group_id) = scalar_str(group_id) else {
                        continue;
                    };
                    let group = benchmark.new_group(&group_id);
                    if let Some(group_data) = group_data.as_mapping() {
                        if let Some(title) = str_field(group_data, "title") {
                            group.set_title(title);
                        }
                        if let Some(description) = str_field(group_data, "description") {
                            group.set_description(description);
                        }
                    }
                    first.get_or_insert(group_id);
                }
            }
        }

        first.unwrap_or_else(|| {
            benchmark
                .new_group("default")
                .set_title("Default Group");
            "default".to_string()
        })
    }

    /// Load the values section; returns the declared datatype per value
    /// id for external-variable binding
    fn load_values(
        &self,
        benchmark: &mut Benchmark,
        data: &Mapping,
    ) -> Result<HashMap<String, String>> {
        let mut value_types = HashMap::new();
        let Some(Yaml::Sequence(items)) = get(data, "values") else {
            return Ok(value_types);
        };

        for item in items {
            let Some(entry) = item.as_mapping() else { continue };
            for (value_id, value_data) in entry {
                let (Some(value_id), Some(value_data)) =
                    (scalar_str(value_id), value_data.as_mapping())
                else {
                    continue;
                };
                let context = format!("value '{}'", value_id);
                let value_type =
                    str_field(value_data, "type").unwrap_or_else(|| "string".to_string());
                let raw = str_field(value_data, "value");

                let value = benchmark.new_value(&value_id);
                if let Some(title) = str_field(value_data, "title") {
                    value.set_title(title);
                }

                // inline code payloads are encoded for the
                // environment-variable transport and keep the raw script
                // as their description
                if value_type == "code" {
                    let code = raw
                        .clone()
                        .ok_or_else(|| Error::config("value", context.clone()))?;
                    value.set_type("string");
                    if str_field(value_data, "description").is_none() {
                        value.set_description(code.clone());
                    }
                    value.set_value(crate::codeblock::encode_compressed(&code)?, None)?;
                    value_types.insert(value_id.clone(), "string".to_string());
                } else {
                    value.set_type(value_type.clone());
                    if let Some(raw) = raw {
                        value.set_value(raw, None)?;
                    }
                    value_types.insert(value_id.clone(), value_type);
                }
                if let Some(description) = str_field(value_data, "description") {
                    value.set_description(description);
                }
                if let Some(operator) = str_field(value_data, "operator") {
                    value.set_operator(ValueOperator::parse(&operator)?);
                }

                for (key, facet) in [
                    ("default", ValueFacet::Default),
                    ("match", ValueFacet::Match),
                    ("lower-bound", ValueFacet::LowerBound),
                    ("upper-bound", ValueFacet::UpperBound),
                ] {
                    match get(value_data, key) {
                        Some(Yaml::Sequence(entries)) => {
                            for selector_entry in entries {
                                let Some(selector_map) = selector_entry.as_mapping() else {
                                    continue;
                                };
                                for (selector, facet_value) in selector_map {
                                    let (Some(selector), Some(facet_value)) =
                                        (scalar_str(selector), scalar_str(facet_value))
                                    else {
                                        continue;
                                    };
                                    value.set_facet(facet, Some(selector.as_str()), facet_value)?;
                                }
                            }
                        }
                        Some(other) => {
                            if let Some(facet_value) = scalar_str(other) {
                                value.set_facet(facet, None, facet_value)?;
                            }
                        }
                        None => {}
                    }
                }
            }
        }
        Ok(value_types)
    }
}

/// Load a profile's selectors list: `select` entries written
/// `target:idref` with a selected flag, and `set-value` overrides
fn load_selectors(
    profile: &mut crate::xccdf::Profile,
    profile_data: &Mapping,
    generator: &XccdfGenerator,
) -> Result<()> {
    let Some(Yaml::Sequence(selectors)) = get(profile_data, "selectors") else {
        return Ok(());
    };
    for selector in selectors {
        let Some(selector) = selector.as_mapping() else {
            continue;
        };
        for (selector_name, selector_data) in selector {
            let Some(selector_name) = scalar_str(selector_name) else {
                continue;
            };
            let Some(selector_data) = selector_data.as_mapping() else {
                continue;
            };
            for (idref, params) in selector_data {
                let Some(idref) = scalar_str(idref) else {
                    continue;
                };
                match selector_name.as_str() {
                    "select" => {
                        let (target, local) = idref.split_once(':').ok_or_else(|| {
                            Error::validation(format!(
                                "select reference '{}' must be written target:idref",
                                idref
                            ))
                        })?;
                        let selected = match params {
                            Yaml::Mapping(params) => get(params, "selected")
                                .and_then(Yaml::as_bool)
                                .unwrap_or(false),
                            other => other.as_bool().unwrap_or(false),
                        };
                        profile.select(generator.parse_id(target, local)?, selected);
                    }
                    "set-value" => {
                        if let Some(value) = scalar_str(params) {
                            profile.set_value(generator.id(XccdfKind::Value, &idref), value);
                        }
                    }
                    other => {
                        return Err(Error::validation(format!(
                            "unsupported profile selector '{}'",
                            other
                        )))
                    }
                }
            }
        }
    }
    Ok(())
}

/// Flatten the rules section: entries may arrive nested one level deep
/// when the include resolver concatenates rule lists
fn flatten_rules(rules: &Yaml) -> Result<Vec<(String, Mapping)>> {
    let mut flat = Vec::new();
    collect_rules(rules, &mut flat)?;
    Ok(flat)
}

fn collect_rules(node: &Yaml, flat: &mut Vec<(String, Mapping)>) -> Result<()> {
    match node {
        Yaml::Sequence(items) => {
            for item in items {
                collect_rules(item, flat)?;
            }
            Ok(())
        }
        Yaml::Mapping(entry) => {
            for (rule_id, spec) in entry {
                let rule_id = scalar_str(rule_id).ok_or_else(|| {
                    Error::validation("rule ids must be scalar strings".to_string())
                })?;
                let spec = spec
                    .as_mapping()
                    .cloned()
                    .ok_or_else(|| Error::config("type", format!("rule '{}'", rule_id)))?;
                flat.push((rule_id, spec));
            }
            Ok(())
        }
        Yaml::Null => Ok(()),
        _ => Err(Error::validation(
            "rules entries must be mappings".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> Compiler {
        Compiler::new("mirantis.com", CompilerContext::default())
    }

    #[test]
    fn test_missing_benchmark_section() {
        let err = compiler().convert_str("tailoring:\n  id: x\n").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_missing_id() {
        let err = compiler()
            .convert_str("benchmark:\n  title: no id\n")
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_minimal_benchmark_synthesizes_defaults() {
        let conversion = compiler()
            .convert_str("benchmark:\n  id: minimal\n  title: Minimal\n")
            .unwrap();
        assert_eq!(conversion.benchmark_id, "minimal");
        assert_eq!(conversion.benchmark_filename, "minimal-xccdf.xml");
        assert!(conversion.oval_xml.is_none());
        assert!(conversion.benchmark_xml.starts_with(XML_DECLARATION));
        // implicit default profile and group
        assert!(conversion
            .benchmark_xml
            .contains("xccdf_com.mirantis_profile_default"));
        assert!(conversion
            .benchmark_xml
            .contains("xccdf_com.mirantis_group_default"));
    }

    #[test]
    fn test_unknown_rule_type_aborts() {
        let err = compiler()
            .convert_str(
                "benchmark:\n  id: b\n  rules:\n    - r1:\n        type: frobnicate\n",
            )
            .unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn test_nested_rule_lists_flatten() {
        let yaml = r#"
benchmark:
  id: b
  rules:
    - - r1:
          type: sysctl
          key: net.ipv4.ip_forward
          value: 0
    - r2:
        type: pkg
        name: aide
"#;
        let conversion = compiler().convert_str(yaml).unwrap();
        let oval = conversion.oval_xml.unwrap();
        assert!(oval.contains("oval:r1:def:1"));
        assert!(oval.contains("oval:r2:def:1"));
    }

    #[test]
    fn test_value_facets_with_selectors() {
        let yaml = r#"
benchmark:
  id: b
  values:
    - session_timeout:
        type: number
        value: 600
        operator: equals
        default:
          - relaxed: 900
          - strict: 300
"#;
        let conversion = compiler().convert_str(yaml).unwrap();
        let xml = &conversion.benchmark_xml;
        assert!(xml.contains("xccdf_com.mirantis_value_session_timeout"));
        assert!(xml.contains("<value>600</value>"));
        assert!(xml.contains("<default selector=\"relaxed\">900</default>"));
        assert!(xml.contains("<default selector=\"strict\">300</default>"));
    }

    #[test]
    fn test_profile_selectors_resolve_ids() {
        let yaml = r#"
benchmark:
  id: b
  profiles:
    - default:
        title: Default Profile
    - hardened:
        title: Hardened
        selectors:
          - select:
              'rule:pkg_aide':
                selected: true
          - set-value:
              session_timeout: 300
"#;
        let conversion = compiler().convert_str(yaml).unwrap();
        let xml = &conversion.benchmark_xml;
        assert!(xml.contains(
            "<select idref=\"xccdf_com.mirantis_rule_pkg_aide\" selected=\"true\"/>"
        ));
        assert!(xml.contains(
            "<set-value idref=\"xccdf_com.mirantis_value_session_timeout\">300</set-value>"
        ));
    }

    #[test]
    fn test_tailoring_conversion() {
        let yaml = r#"
tailoring:
  id: site
  profiles:
    default:
      title: Site default overrides
      selectors:
        - set-value:
            session_timeout: 300
"#;
        let doc: Yaml = serde_yaml::from_str(yaml).unwrap();
        let conversion = compiler().convert_tailoring(&doc).unwrap();
        assert_eq!(conversion.benchmark_filename, "site-tailoring.xml");
        let xml = &conversion.benchmark_xml;
        assert!(xml.contains("xccdf_com.mirantis_tailoring_site"));
        assert!(xml.contains("extends=\"xccdf_com.mirantis_profile_default\""));
        assert!(xml.contains("xccdf_com.mirantis_profile_extends_default"));
    }

    #[test]
    fn test_write_is_all_or_nothing_on_collision() {
        // two rules register the same shared file with different sources:
        // conversion fails before anything could be written
        let yaml = r#"
benchmark:
  id: b
  shared-files:
    - functions.sh: lib/functions.sh
    - functions.sh: other/functions.sh
"#;
        let err = compiler().convert_str(yaml).unwrap_err();
        assert!(matches!(err, Error::Collision { .. }));
    }
}

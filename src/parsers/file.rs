//! File mode and ownership check
//!
//! Verifies permission bits and ownership of a file: one file object by
//! path pattern, plus a state and test per constraint present in the rule
//! (three-digit mode, uid, gid). Criteria require every present
//! constraint to hold.

use serde_yaml::Mapping;

use crate::error::{Error, Result};
use crate::oval::{
    oval_id, Criteria, Definition, Entity, Operator, OvalKind, OvalObject, OvalState, Test,
};
use crate::xml::Ns;

use super::common::{base_rule, definition_metadata, require_str, str_field};
use super::{ParsedRule, ParserContext};

/// Expand a three-digit octal mode into the nine permission-bit entities
/// of a file state
fn mode_entities(mode: &str, context: &str) -> Result<Vec<(String, bool)>> {
    if mode.len() != 3 {
        return Err(Error::validation(format!(
            "mode '{}' in {} must be exactly 3 octal digits",
            mode, context
        )));
    }
    let mut entities = Vec::with_capacity(9);
    for (who, digit) in ["u", "g", "o"].iter().zip(mode.chars()) {
        let bits = digit.to_digit(8).ok_or_else(|| {
            Error::validation(format!(
                "mode '{}' in {} contains a non-octal digit",
                mode, context
            ))
        })?;
        entities.push((format!("{}read", who), bits & 0b100 != 0));
        entities.push((format!("{}write", who), bits & 0b010 != 0));
        entities.push((format!("{}exec", who), bits & 0b001 != 0));
    }
    Ok(entities)
}

fn owner_id(value: &str, what: &str, context: &str) -> Result<String> {
    if value.chars().all(|c| c.is_ascii_digit()) {
        Ok(value.to_string())
    } else {
        Err(Error::validation(format!(
            "{} '{}' in {} must be a non-negative decimal",
            what, value, context
        )))
    }
}

pub(super) fn parse(ctx: &mut ParserContext<'_>, id: &str, spec: &Mapping) -> Result<ParsedRule> {
    let context = format!("rule '{}'", id);
    let mut result = ParsedRule::new(base_rule(ctx.benchmark.generator(), id, spec)?);

    let filename = require_str(spec, "filename", &context)?;
    let object_id = oval_id(id, OvalKind::Object);
    let mut object = OvalObject::new(object_id.clone(), "file_object", Ns::OvalUnix);
    object.add_entity(
        Entity::new("filepath")
            .with_text(filename)
            .with_attr("operation", "pattern match"),
    );
    result.objects.push(object);

    if let Some(mode) = str_field(spec, "mode") {
        let state_id = oval_id(&format!("{}_mode", id), OvalKind::State);
        let test_id = oval_id(&format!("{}_mode", id), OvalKind::Test);
        let mut state = OvalState::new(state_id.clone(), "file_state", Ns::OvalUnix);
        for (name, set) in mode_entities(&mode, &context)? {
            state.add_entity(
                Entity::new(name)
                    .with_text(if set { "true" } else { "false" })
                    .with_attr("datatype", "boolean"),
            );
        }
        result.states.push(state);

        let mut test = Test::new(test_id, "file_test", Ns::OvalUnix);
        test.set_comment(format!("File mode is {}", mode));
        test.add_object_ref(object_id.clone());
        test.add_state_ref(state_id);
        result.tests.push(test);
    }

    if let Some(uid) = str_field(spec, "uid") {
        let uid = owner_id(&uid, "uid", &context)?;
        let state_id = oval_id(&format!("{}_uid", id), OvalKind::State);
        let test_id = oval_id(&format!("{}_uid", id), OvalKind::Test);
        let mut state = OvalState::new(state_id.clone(), "file_state", Ns::OvalUnix);
        state.add_entity(
            Entity::new("user_id")
                .with_text(uid.clone())
                .with_attr("datatype", "int")
                .with_attr("operation", "equals"),
        );
        result.states.push(state);

        let mut test = Test::new(test_id, "file_test", Ns::OvalUnix);
        test.set_comment(format!("File owner uid is {}", uid));
        test.add_object_ref(object_id.clone());
        test.add_state_ref(state_id);
        result.tests.push(test);
    }

    if let Some(gid) = str_field(spec, "gid") {
        let gid = owner_id(&gid, "gid", &context)?;
        let state_id = oval_id(&format!("{}_gid", id), OvalKind::State);
        let test_id = oval_id(&format!("{}_gid", id), OvalKind::Test);
        let mut state = OvalState::new(state_id.clone(), "file_state", Ns::OvalUnix);
        state.add_entity(
            Entity::new("group_id")
                .with_text(gid.clone())
                .with_attr("datatype", "int")
                .with_attr("operation", "equals"),
        );
        result.states.push(state);

        let mut test = Test::new(test_id, "file_test", Ns::OvalUnix);
        test.set_comment(format!("File owner gid is {}", gid));
        test.add_object_ref(object_id.clone());
        test.add_state_ref(state_id);
        result.tests.push(test);
    }

    let mut definition = Definition::new(oval_id(id, OvalKind::Definition));
    definition.set_metadata(definition_metadata(
        id,
        str_field(spec, "title").as_deref(),
        &ctx.affected,
    ));
    let mut criteria = Criteria::new(Operator::And);
    for test in &result.tests {
        criteria.add_criterion(test.id());
    }
    definition.add_criteria(criteria);
    result.definition = Some(definition);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::SharedFiles;
    use crate::xccdf::{Benchmark, XccdfGenerator};
    use std::collections::HashMap;

    fn parse_spec(yaml: &str) -> Result<ParsedRule> {
        let spec: Mapping = serde_yaml::from_str(yaml).unwrap();
        let mut benchmark = Benchmark::new(XccdfGenerator::new("mirantis.com"), "test");
        let mut shared_files = SharedFiles::new();
        let value_types = HashMap::new();
        let mut ctx = ParserContext {
            benchmark: &mut benchmark,
            shared_files: &mut shared_files,
            affected: Vec::new(),
            value_types: &value_types,
        };
        parse(&mut ctx, "shadow_perms", &spec)
    }

    #[test]
    fn test_mode_bits_expansion() {
        let entities = mode_entities("640", "rule 'x'").unwrap();
        let expect: Vec<(&str, bool)> = vec![
            ("uread", true),
            ("uwrite", true),
            ("uexec", false),
            ("gread", true),
            ("gwrite", false),
            ("gexec", false),
            ("oread", false),
            ("owrite", false),
            ("oexec", false),
        ];
        let got: Vec<(&str, bool)> = entities.iter().map(|(n, b)| (n.as_str(), *b)).collect();
        assert_eq!(got, expect);
    }

    #[test]
    fn test_mode_uid_gid_make_three_tests() {
        let result =
            parse_spec("filename: /etc/shadow\nmode: 640\nuid: 0\ngid: 42").unwrap();
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.states.len(), 3);
        assert_eq!(result.tests.len(), 3);
        let ids: Vec<&str> = result.tests.iter().map(|t| t.id()).collect();
        assert!(ids.contains(&"oval:shadow_perms_mode:tst:1"));
        assert!(ids.contains(&"oval:shadow_perms_uid:tst:1"));
        assert!(ids.contains(&"oval:shadow_perms_gid:tst:1"));
    }

    #[test]
    fn test_missing_filename_fails() {
        let err = parse_spec("mode: 640").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_bad_mode_length() {
        let err = parse_spec("filename: /etc/shadow\nmode: 0640").unwrap_err();
        assert!(err.to_string().contains("3 octal digits"));
    }

    #[test]
    fn test_non_decimal_uid() {
        let err = parse_spec("filename: /etc/shadow\nuid: root").unwrap_err();
        assert!(err.to_string().contains("root"));
    }
}

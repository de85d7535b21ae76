//! Systemd unit check
//!
//! Verifies a service unit is in the expected active state and wired into
//! a target, either through the service unit itself or through its
//! socket. Produces three object/state/test triples:
//!
//! - the target's dependency on `<name>.service`
//! - the target's dependency on `<name>.socket`
//! - the unit's ActiveState property
//!
//! For an enabled service the criteria are
//! `AND(state-correct, OR(wanted-by-target, wanted-by-socket))`; for a
//! disabled one every dependency check must fail, so the criteria flatten
//! to an AND over all three tests with inverted expectations.

use serde_yaml::Mapping;

use crate::error::Result;
use crate::oval::{
    oval_id, Criteria, Definition, Entity, Operator, OvalKind, OvalObject, OvalState, Test,
    TestCheck, TestExistence,
};
use crate::xml::Ns;

use super::common::{base_rule, bool_field, definition_metadata, require_str, str_field};
use super::{ParsedRule, ParserContext};

fn dependency_triple(
    object_local: &str,
    state_local: &str,
    test_local: &str,
    target: &str,
    dependency: &str,
    entity_check: &str,
) -> (OvalObject, OvalState, Test) {
    let object_id = oval_id(object_local, OvalKind::Object);
    let state_id = oval_id(state_local, OvalKind::State);
    let test_id = oval_id(test_local, OvalKind::Test);

    let mut object = OvalObject::new(object_id.clone(), "systemdunitdependency_object", Ns::OvalLinux);
    object.add_entity(Entity::new("unit").with_text(target));

    let mut state = OvalState::new(state_id.clone(), "systemdunitdependency_state", Ns::OvalLinux);
    state.add_entity(
        Entity::new("dependency")
            .with_text(dependency)
            .with_attr("entity_check", entity_check),
    );

    let mut test = Test::new(test_id, "systemdunitdependency_test", Ns::OvalLinux);
    test.set_comment(format!("{} wants {}", target, dependency));
    test.add_object_ref(object_id);
    test.add_state_ref(state_id);

    (object, state, test)
}

pub(super) fn parse(ctx: &mut ParserContext<'_>, id: &str, spec: &Mapping) -> Result<ParsedRule> {
    let context = format!("rule '{}'", id);
    let mut result = ParsedRule::new(base_rule(ctx.benchmark.generator(), id, spec)?);

    let name = require_str(spec, "name", &context)?;
    let target = str_field(spec, "target").unwrap_or_else(|| "multi-user.target".to_string());
    let disabled = bool_field(spec, "disabled");

    let (service_state, dependency_check, running_check, running_existence) = if disabled {
        ("inactive", "none satisfy", TestCheck::All, TestExistence::AnyExist)
    } else {
        (
            "active",
            "at least one",
            TestCheck::AtLeastOne,
            TestExistence::AtLeastOneExists,
        )
    };

    // target wants <name>.service
    let (object, state, service_test) = dependency_triple(
        &format!("target_for_{}", name),
        &format!("systemd_service_{}", name),
        &format!("target_wants_{}", name),
        &target,
        &format!("{}.service", name),
        dependency_check,
    );
    result.objects.push(object);
    result.states.push(state);
    let service_test_id = service_test.id().to_string();
    result.tests.push(service_test);

    // target wants <name>.socket
    let (object, state, socket_test) = dependency_triple(
        &format!("target_for_{}_socket", name),
        &format!("systemd_{}_socket", name),
        &format!("target_wants_{}_socket", name),
        &target,
        &format!("{}.socket", name),
        dependency_check,
    );
    result.objects.push(object);
    result.states.push(state);
    let socket_test_id = socket_test.id().to_string();
    result.tests.push(socket_test);

    // unit ActiveState property
    let state_local = format!("service_{}_state", name);
    let object_id = oval_id(&state_local, OvalKind::Object);
    let state_id = oval_id(&state_local, OvalKind::State);
    let running_test_id = oval_id(&state_local, OvalKind::Test);

    let mut object = OvalObject::new(object_id.clone(), "systemdunitproperty_object", Ns::OvalLinux);
    object.add_entity(
        Entity::new("unit")
            .with_text(format!("{}\\.(socket|service)", name))
            .with_attr("operation", "pattern match"),
    );
    object.add_entity(Entity::new("property").with_text("ActiveState"));
    result.objects.push(object);

    let mut state = OvalState::new(state_id.clone(), "systemdunitproperty_state", Ns::OvalLinux);
    state.add_entity(Entity::new("value").with_text(service_state));
    result.states.push(state);

    let mut test = Test::new(running_test_id.clone(), "systemdunitproperty_test", Ns::OvalLinux);
    test.set_comment(format!("Unit {} is {}", name, service_state));
    test.set_check(running_check);
    test.set_existence(running_existence);
    test.add_object_ref(object_id);
    test.add_state_ref(state_id);
    result.tests.push(test);

    let mut definition = Definition::new(oval_id(id, OvalKind::Definition));
    definition.set_metadata(definition_metadata(
        id,
        str_field(spec, "title").as_deref(),
        &ctx.affected,
    ));

    let mut criteria = Criteria::new(Operator::And);
    criteria.add_criterion(running_test_id);
    if disabled {
        criteria.add_criterion(service_test_id);
        criteria.add_criterion(socket_test_id);
    } else {
        let mut wanted = Criteria::new(Operator::Or);
        wanted.add_criterion(service_test_id);
        wanted.add_criterion(socket_test_id);
        criteria.add_criteria(wanted);
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
    use crate::xml::serialize;
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
        parse(&mut ctx, "auditd_running", &spec)
    }

    #[test]
    fn test_enabled_service_produces_three_triples() {
        let result = parse_spec("name: auditd").unwrap();
        assert_eq!(result.objects.len(), 3);
        assert_eq!(result.states.len(), 3);
        assert_eq!(result.tests.len(), 3);

        let ids: Vec<&str> = result.tests.iter().map(|t| t.id()).collect();
        assert!(ids.contains(&"oval:target_wants_auditd:tst:1"));
        assert!(ids.contains(&"oval:target_wants_auditd_socket:tst:1"));
        assert!(ids.contains(&"oval:service_auditd_state:tst:1"));
    }

    fn definition_xml(definition: &Definition) -> String {
        // render through the document path used in production
        let mut doc = crate::oval::OvalDocument::new(
            chrono::NaiveDate::from_ymd_opt(2018, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        );
        doc.append_definition(definition.clone());
        serialize(&doc.to_element().unwrap(), &[])
    }

    #[test]
    fn test_enabled_criteria_nest_or_under_and() {
        let result = parse_spec("name: auditd").unwrap();
        let xml = definition_xml(result.definition.as_ref().unwrap());
        let and_pos = xml.find("operator=\"AND\"").unwrap();
        let or_pos = xml.find("operator=\"OR\"").unwrap();
        assert!(and_pos < or_pos);
        assert!(xml.contains("test_ref=\"oval:service_auditd_state:tst:1\""));
    }

    #[test]
    fn test_disabled_service_flattens_criteria() {
        let result = parse_spec("name: telnetd\ndisabled: true").unwrap();
        let xml = definition_xml(result.definition.as_ref().unwrap());
        assert!(xml.contains("operator=\"AND\""));
        assert!(!xml.contains("operator=\"OR\""));

        // the state expectation flips to inactive
        let state_doc: Vec<&OvalState> = result.states.iter().collect();
        assert_eq!(state_doc.len(), 3);
        assert!(result.tests.iter().any(|t| t.id().contains("service_telnetd_state")));
    }

    #[test]
    fn test_missing_name_fails() {
        let err = parse_spec("target: multi-user.target").unwrap_err();
        assert!(matches!(err, crate::error::Error::Configuration { .. }));
    }
}

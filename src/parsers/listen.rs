//! Listening-port check
//!
//! Verifies a network service listens where expected. The listening
//! address may come from a fixed address, a `host:port` pair, or an
//! external variable exported from a benchmark value; when a concrete
//! non-wildcard address is given, a companion object asserts that no
//! other address is listening on the port.

use serde_yaml::Mapping;

use crate::error::{Error, Result};
use crate::oval::{
    oval_id, Criteria, Definition, Entity, ExternalVariable, Operator, OvalKind, OvalObject,
    OvalState, Test, TestCheck,
};
use crate::xml::Ns;

use super::common::{base_rule, definition_metadata, get, str_field};
use super::{ParsedRule, ParserContext};

const ANY_ADDRESS_PATTERN: &str = "^[0-9]+\\.[0-9]+\\.[0-9]+\\.[0-9]+$";

const WILDCARDS: &[&str] = &["all", "any", "0.0.0.0", "*"];

pub(super) fn parse(ctx: &mut ParserContext<'_>, id: &str, spec: &Mapping) -> Result<ParsedRule> {
    let context = format!("rule '{}'", id);
    let mut result = ParsedRule::new(base_rule(ctx.benchmark.generator(), id, spec)?);

    let protocol = str_field(spec, "protocol").unwrap_or_else(|| "tcp".to_string());

    let (address, port) = match str_field(spec, "local_full_address") {
        Some(full) => match full.split_once(':') {
            Some((address, port)) => (address.to_string(), port.to_string()),
            None => {
                return Err(Error::validation(format!(
                    "local_full_address '{}' in {} must be host:port",
                    full, context
                )))
            }
        },
        None => {
            let port = str_field(spec, "port")
                .ok_or_else(|| Error::config("port", context.clone()))?;
            let address =
                str_field(spec, "address").unwrap_or_else(|| "127.0.0.1".to_string());
            (address, port)
        }
    };

    let listen = get(spec, "listen").and_then(|v| v.as_bool()).unwrap_or(true);
    let program = str_field(spec, "program");
    let uid = str_field(spec, "uid");
    let variable = str_field(spec, "variable");
    let wildcard = WILDCARDS.contains(&address.as_str());
    let exclusive = listen && !wildcard && variable.is_none();

    // companion object: anything else listening on the port
    let companion_test_id = if exclusive {
        let local = format!("{}_listen_any", id);
        let object_id = oval_id(&local, OvalKind::Object);
        let test_id = oval_id(&local, OvalKind::Test);

        let mut object =
            OvalObject::new(object_id.clone(), "inetlisteningservers_object", Ns::OvalLinux);
        object.add_entity(Entity::new("protocol").with_text(protocol.clone()));
        object.add_entity(
            Entity::new("local_address")
                .with_text(ANY_ADDRESS_PATTERN)
                .with_attr("operation", "pattern match"),
        );
        object.add_entity(
            Entity::new("local_port")
                .with_text(port.clone())
                .with_attr("datatype", "int"),
        );
        result.objects.push(object);

        let mut test = Test::new(test_id.clone(), "inetlisteningservers_test", Ns::OvalLinux);
        test.set_comment(format!("No other address listens on {}/{}", port, protocol));
        test.set_check(TestCheck::NoneExist);
        test.add_object_ref(object_id);
        result.tests.push(test);
        Some(test_id)
    } else {
        None
    };

    // main object
    let object_id = oval_id(id, OvalKind::Object);
    let mut object = OvalObject::new(object_id.clone(), "inetlisteningservers_object", Ns::OvalLinux);
    object.add_entity(Entity::new("protocol").with_text(protocol.clone()));
    let address_entity = match (&variable, address.as_str()) {
        (Some(variable), _) => Entity::new("local_address")
            .with_attr("var_ref", oval_id(variable, OvalKind::Variable)),
        (None, "any") | (None, "*") => Entity::new("local_address")
            .with_text(ANY_ADDRESS_PATTERN)
            .with_attr("operation", "pattern match"),
        (None, "all") | (None, "0.0.0.0") => {
            Entity::new("local_address").with_text("0.0.0.0")
        }
        (None, concrete) => Entity::new("local_address").with_text(concrete),
    };
    object.add_entity(address_entity);
    object.add_entity(
        Entity::new("local_port")
            .with_text(port.clone())
            .with_attr("datatype", "int"),
    );
    result.objects.push(object);

    // state: the listener looks like the expected program
    let state_id = oval_id(id, OvalKind::State);
    let mut state = OvalState::new(state_id.clone(), "inetlisteningservers_state", Ns::OvalLinux);
    if let Some(program) = program {
        state.add_entity(Entity::new("program_name").with_text(program));
    }
    state.add_entity(
        Entity::new("pid")
            .with_text("0")
            .with_attr("operation", "greater than")
            .with_attr("datatype", "int"),
    );
    if let Some(uid) = uid {
        state.add_entity(
            Entity::new("user_id")
                .with_text(uid)
                .with_attr("operation", "equals")
                .with_attr("datatype", "int"),
        );
    }
    result.states.push(state);

    let test_id = oval_id(id, OvalKind::Test);
    let mut test = Test::new(test_id.clone(), "inetlisteningservers_test", Ns::OvalLinux);
    test.set_comment(format!("Service listens on {}:{}/{}", address, port, protocol));
    test.set_check(TestCheck::AtLeastOne);
    test.add_object_ref(object_id);
    test.add_state_ref(state_id);
    result.tests.push(test);

    if let Some(ref variable) = variable {
        let datatype = ctx
            .value_types
            .get(variable)
            .cloned()
            .unwrap_or_else(|| "string".to_string());
        result.variable = Some(ExternalVariable::new(
            oval_id(variable, OvalKind::Variable),
            datatype,
        ));
    }

    let mut definition = Definition::new(oval_id(id, OvalKind::Definition));
    definition.set_metadata(definition_metadata(
        id,
        str_field(spec, "title").as_deref(),
        &ctx.affected,
    ));
    let operator = if companion_test_id.is_some() {
        Operator::Or
    } else {
        Operator::And
    };
    let mut criteria = Criteria::new(operator);
    if let Some(companion) = companion_test_id {
        criteria.add_criterion(companion);
    }
    criteria.add_criterion(test_id);
    definition.add_criteria(criteria);
    result.definition = Some(definition);

    Ok(result)
}

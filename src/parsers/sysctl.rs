//! Sysctl kernel parameter check
//!
//! Verifies a kernel parameter carries an expected value: one sysctl
//! object for the key, one integer-equals state, one test, criteria
//! requiring the test to hold.

use serde_yaml::Mapping;

use crate::error::Result;
use crate::oval::{
    oval_id, Criteria, Definition, Entity, Operator, OvalKind, OvalObject, OvalState, Test,
};
use crate::xml::Ns;

use super::common::{base_rule, definition_metadata, require_str, str_field};
use super::{ParsedRule, ParserContext};

pub(super) fn parse(ctx: &mut ParserContext<'_>, id: &str, spec: &Mapping) -> Result<ParsedRule> {
    let context = format!("rule '{}'", id);
    let mut result = ParsedRule::new(base_rule(ctx.benchmark.generator(), id, spec)?);

    let key = require_str(spec, "key", &context)?;
    let value = require_str(spec, "value", &context)?;

    let object_id = oval_id(id, OvalKind::Object);
    let state_id = oval_id(id, OvalKind::State);
    let test_id = oval_id(id, OvalKind::Test);

    let mut object = OvalObject::new(object_id.clone(), "sysctl_object", Ns::OvalUnix);
    object.add_entity(Entity::new("name").with_text(key.clone()));
    result.objects.push(object);

    let mut state = OvalState::new(state_id.clone(), "sysctl_state", Ns::OvalUnix);
    state.add_entity(
        Entity::new("value")
            .with_text(value)
            .with_attr("datatype", "int")
            .with_attr("operation", "equals"),
    );
    result.states.push(state);

    let mut test = Test::new(test_id.clone(), "sysctl_test", Ns::OvalUnix);
    test.set_comment(format!("Kernel parameter {}", key));
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
    criteria.add_criterion(test_id);
    definition.add_criteria(criteria);
    result.definition = Some(definition);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
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
        parse(&mut ctx, "ip_forward", &spec)
    }

    #[test]
    fn test_key_value_check() {
        let result = parse_spec("key: net.ipv4.ip_forward\nvalue: 0").unwrap();
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.states.len(), 1);
        assert_eq!(result.tests.len(), 1);
        assert_eq!(result.tests[0].state_ref_count(), 1);
    }

    #[test]
    fn test_missing_key_fails() {
        let err = parse_spec("value: 0").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_missing_value_fails() {
        let err = parse_spec("key: net.ipv4.ip_forward").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}

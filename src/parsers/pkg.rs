//! Package-version check
//!
//! Verifies a package is installed, optionally at a version constraint.
//! Produces one dpkginfo object for the package name, an optional evr
//! state for the version comparison, one test, and a definition whose
//! criteria require every test to hold.

use serde_yaml::Mapping;

use crate::error::{Error, Result};
use crate::oval::{
    oval_id, Criteria, Definition, Entity, Operator, OvalKind, OvalObject, OvalState, Test,
};
use crate::xml::Ns;

use super::common::{base_rule, definition_metadata, require_str, str_field};
use super::{ParsedRule, ParserContext};

pub(super) fn parse(ctx: &mut ParserContext<'_>, id: &str, spec: &Mapping) -> Result<ParsedRule> {
    let context = format!("rule '{}'", id);
    let mut result = ParsedRule::new(base_rule(ctx.benchmark.generator(), id, spec)?);

    let object_id = oval_id(id, OvalKind::Object);
    let state_id = oval_id(id, OvalKind::State);
    let test_id = oval_id(id, OvalKind::Test);

    let name = require_str(spec, "name", &context)?;
    let mut object = OvalObject::new(object_id.clone(), "dpkginfo_object", Ns::OvalLinux);
    object.add_entity(Entity::new("name").with_text(name.clone()));
    result.objects.push(object);

    let mut test = Test::new(test_id.clone(), "dpkginfo_test", Ns::OvalLinux);
    test.set_comment(format!("Package {} is installed", name));
    test.add_object_ref(object_id);

    if let Some(version) = str_field(spec, "version") {
        // evr comparisons need an epoch; default it when absent
        let evr = if version.contains(':') {
            version
        } else {
            format!("0:{}", version)
        };
        let operation = match str_field(spec, "match").as_deref() {
            Some("eq") | None => "equals",
            Some("ge") => "greater than or equal",
            Some("gt") => "greater than",
            Some(other) => {
                return Err(Error::validation(format!(
                    "unsupported package version match '{}' in {}, expected eq/ge/gt",
                    other, context
                )))
            }
        };
        let mut state = OvalState::new(state_id.clone(), "dpkginfo_state", Ns::OvalLinux);
        state.add_entity(
            Entity::new("evr")
                .with_text(evr)
                .with_attr("datatype", "evr_string")
                .with_attr("operation", operation),
        );
        result.states.push(state);
        test.add_state_ref(state_id);
    }

    result.tests.push(test);

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

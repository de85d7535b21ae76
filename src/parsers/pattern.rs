//! Text-pattern check
//!
//! Verifies a pattern appears in one or more files. Each filename gets
//! its own textfilecontent object and test; criteria pass when any file
//! matches.

use serde_yaml::Mapping;

use crate::error::{Error, Result};
use crate::oval::{oval_id, Criteria, Definition, Entity, Operator, OvalKind, OvalObject, Test};
use crate::xml::Ns;

use super::common::{base_rule, definition_metadata, get, require_str, str_field, string_list};
use super::{ParsedRule, ParserContext};

pub(super) fn parse(ctx: &mut ParserContext<'_>, id: &str, spec: &Mapping) -> Result<ParsedRule> {
    let context = format!("rule '{}'", id);
    let mut result = ParsedRule::new(base_rule(ctx.benchmark.generator(), id, spec)?);

    let pattern = require_str(spec, "pattern", &context)?;
    let filenames = get(spec, "filename")
        .map(string_list)
        .unwrap_or_default();
    if filenames.is_empty() {
        return Err(Error::config("filename", context));
    }

    for (index, filename) in filenames.iter().enumerate() {
        let local = format!("{}_{}", id, index);
        let object_id = oval_id(&local, OvalKind::Object);
        let test_id = oval_id(&local, OvalKind::Test);

        let (path, name) = match filename.rsplit_once('/') {
            Some((path, name)) if !path.is_empty() => (path.to_string(), name.to_string()),
            _ => (String::from("/"), filename.clone()),
        };

        let mut object = OvalObject::new(object_id.clone(), "textfilecontent54_object", Ns::OvalIndep);
        object.add_entity(Entity::new("path").with_text(path));
        object.add_entity(
            Entity::new("filename")
                .with_text(name)
                .with_attr("operation", "pattern match"),
        );
        object.add_entity(
            Entity::new("pattern")
                .with_text(pattern.clone())
                .with_attr("operation", "pattern match"),
        );
        object.add_entity(
            Entity::new("instance")
                .with_text("1")
                .with_attr("datatype", "int"),
        );
        result.objects.push(object);

        let mut test = Test::new(test_id, "textfilecontent54_test", Ns::OvalIndep);
        test.set_comment(format!("Pattern match in {}", filename));
        test.add_object_ref(object_id);
        result.tests.push(test);
    }

    let mut definition = Definition::new(oval_id(id, OvalKind::Definition));
    definition.set_metadata(definition_metadata(
        id,
        str_field(spec, "title").as_deref(),
        &ctx.affected,
    ));
    let mut criteria = Criteria::new(Operator::Or);
    for test in &result.tests {
        criteria.add_criterion(test.id());
    }
    definition.add_criteria(criteria);
    result.definition = Some(definition);

    Ok(result)
}

//! OVAL test-definition object model
//!
//! Typed entities for the generated test-definition document:
//! [`OvalDocument`] with its five deduplicating registries, [`Definition`]
//! metadata and criteria trees, kind-tagged [`Test`]/[`OvalObject`]/
//! [`OvalState`] elements, and [`ExternalVariable`] declarations.
//!
//! Identifiers follow the document-scoped scheme
//! `oval:<local>:{def|obj|ste|tst|var}:<version>`; the format is bit-exact
//! for downstream scanner interoperability.

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::xml::{Element, Ns};

const DOCUMENT_ORDER: &[&str] = &[
    "generator",
    "definitions",
    "tests",
    "objects",
    "states",
    "variables",
];

const GENERATOR_ORDER: &[&str] = &[
    "product_name",
    "product_version",
    "schema_version",
    "timestamp",
];

const DEFINITION_ORDER: &[&str] = &["metadata", "criteria"];

const METADATA_ORDER: &[&str] = &["title", "affected", "description"];

/// OVAL schema version stamped into the generator block
const SCHEMA_VERSION: &str = "5.11";

/// Closed set of OVAL entity kinds that carry generated identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OvalKind {
    /// Definition
    Definition,
    /// Collected object
    Object,
    /// Expected state
    State,
    /// Test joining objects and states
    Test,
    /// External variable
    Variable,
}

impl OvalKind {
    /// Identifier segment for this kind
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Definition => "def",
            Self::Object => "obj",
            Self::State => "ste",
            Self::Test => "tst",
            Self::Variable => "var",
        }
    }

    /// Parse an identifier segment; unknown segments are a validation
    /// error naming the rejected input
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "def" => Ok(Self::Definition),
            "obj" => Ok(Self::Object),
            "ste" => Ok(Self::State),
            "tst" => Ok(Self::Test),
            "var" => Ok(Self::Variable),
            other => Err(Error::validation(format!(
                "unknown OVAL id segment '{}', expected def/obj/ste/tst/var",
                other
            ))),
        }
    }
}

/// Build an OVAL identifier at version 1
///
/// Pure: the same (local, kind) pair always yields the identical string,
/// which is what lets independently-invoked parsers recompute shared ids.
pub fn oval_id(local: &str, kind: OvalKind) -> String {
    oval_id_with_version(local, kind, 1)
}

/// Build an OVAL identifier with an explicit version
pub fn oval_id_with_version(local: &str, kind: OvalKind, version: u32) -> String {
    format!("oval:{}:{}:{}", local, kind.segment(), version)
}

/// Boolean operator for criteria nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Every child must hold
    And,
    /// At least one child must hold
    Or,
}

impl Operator {
    /// Attribute text for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// A criteria leaf referencing exactly one test by id
#[derive(Debug, Clone)]
pub struct Criterion {
    test_ref: String,
    comment: Option<String>,
}

impl Criterion {
    /// Create a criterion for a test id
    pub fn new(test_ref: impl Into<String>) -> Self {
        Self {
            test_ref: test_ref.into(),
            comment: None,
        }
    }

    /// Attach a comment attribute
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The referenced test id
    pub fn test_ref(&self) -> &str {
        &self.test_ref
    }

    fn to_element(&self) -> Element {
        let mut e = Element::new("criterion", Ns::Oval);
        e.set_attr("test_ref", self.test_ref.clone());
        if let Some(ref comment) = self.comment {
            e.set_attr("comment", comment.clone());
        }
        e
    }
}

/// An internal AND/OR node of a criteria tree
///
/// Children are owned by value, so cycles and self-references are
/// unrepresentable and the tree is finite by construction.
#[derive(Debug, Clone)]
pub struct Criteria {
    operator: Operator,
    criterions: Vec<Criterion>,
    nested: Vec<Criteria>,
}

impl Criteria {
    /// Create a criteria node with an operator
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            criterions: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// Append a leaf criterion referencing a test id
    pub fn add_criterion(&mut self, test_ref: impl Into<String>) -> &mut Self {
        self.criterions.push(Criterion::new(test_ref));
        self
    }

    /// Append a prepared criterion
    pub fn append_criterion(&mut self, criterion: Criterion) -> &mut Self {
        self.criterions.push(criterion);
        self
    }

    /// Nest a child criteria node
    pub fn add_criteria(&mut self, child: Criteria) -> &mut Self {
        self.nested.push(child);
        self
    }

    /// Test ids referenced anywhere in this tree
    pub fn referenced_tests(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self.criterions.iter().map(|c| c.test_ref()).collect();
        for child in &self.nested {
            refs.extend(child.referenced_tests());
        }
        refs
    }

    fn to_element(&self) -> Element {
        let mut e = Element::new("criteria", Ns::Oval);
        e.set_attr("operator", self.operator.as_str());
        for criterion in &self.criterions {
            // infallible: criteria children never carry text content
            let _ = e.append(criterion.to_element());
        }
        for child in &self.nested {
            let _ = e.append(child.to_element());
        }
        e
    }
}

/// Metadata block of a definition
#[derive(Debug, Clone, Default)]
pub struct DefinitionMetadata {
    title: Option<String>,
    description: Option<String>,
    affected: Vec<(String, Vec<String>)>,
}

impl DefinitionMetadata {
    /// Create an empty metadata block
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title
    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Record an affected platform under a family, suppressing duplicates
    pub fn set_affected(&mut self, family: &str, platform: impl Into<String>) -> &mut Self {
        let platform = platform.into();
        match self.affected.iter_mut().find(|(f, _)| f == family) {
            Some((_, platforms)) => {
                if !platforms.contains(&platform) {
                    platforms.push(platform);
                }
            }
            None => self.affected.push((family.to_string(), vec![platform])),
        }
        self
    }

    fn to_element(&self) -> Result<Element> {
        let mut e = Element::new("metadata", Ns::Oval).with_child_order(METADATA_ORDER);
        if let Some(ref title) = self.title {
            e.sub_element("title")?.set_text(title.clone())?;
        }
        for (family, platforms) in &self.affected {
            let affected = e.sub_element("affected")?;
            affected.set_attr("family", family.clone());
            for platform in platforms {
                affected.sub_element("platform")?.set_text(platform.clone())?;
            }
        }
        if let Some(ref description) = self.description {
            e.sub_element("description")?.set_text(description.clone())?;
        }
        Ok(e)
    }
}

/// An OVAL definition: metadata plus one-or-more criteria trees
#[derive(Debug, Clone)]
pub struct Definition {
    id: String,
    version: String,
    class: String,
    metadata: Option<DefinitionMetadata>,
    criteria: Vec<Criteria>,
}

impl Definition {
    /// Create a compliance-class definition
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: "1".to_string(),
            class: "compliance".to_string(),
            metadata: None,
            criteria: Vec::new(),
        }
    }

    /// Generated identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Set the metadata block
    pub fn set_metadata(&mut self, metadata: DefinitionMetadata) -> &mut Self {
        self.metadata = Some(metadata);
        self
    }

    /// Append a criteria tree
    pub fn add_criteria(&mut self, criteria: Criteria) -> &mut Self {
        self.criteria.push(criteria);
        self
    }

    /// Test ids referenced by every criteria tree, used to validate that
    /// leaves point at tests that actually exist
    pub fn referenced_tests(&self) -> Vec<&str> {
        self.criteria
            .iter()
            .flat_map(|c| c.referenced_tests())
            .collect()
    }

    fn to_element(&self) -> Result<Element> {
        let mut e = Element::new("definition", Ns::Oval).with_child_order(DEFINITION_ORDER);
        e.set_attr("id", self.id.clone())
            .set_attr("version", self.version.clone())
            .set_attr("class", self.class.clone());
        if let Some(ref metadata) = self.metadata {
            e.append(metadata.to_element()?)?;
        }
        for criteria in &self.criteria {
            e.append(criteria.to_element())?;
        }
        Ok(e)
    }
}

/// Check attribute vocabulary of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestCheck {
    /// Every collected item must match
    #[default]
    All,
    /// At least one collected item must match
    AtLeastOne,
    /// No collected item may match
    NoneSatisfy,
    /// No item may exist
    NoneExist,
    /// Exactly one item must match
    OnlyOne,
}

impl TestCheck {
    /// Attribute text for this check
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::AtLeastOne => "at least one",
            Self::NoneSatisfy => "none satisfy",
            Self::NoneExist => "none exist",
            Self::OnlyOne => "only one",
        }
    }
}

/// Existence attribute vocabulary of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestExistence {
    /// Every referenced object must exist
    #[default]
    AllExist,
    /// Items may or may not exist
    AnyExist,
    /// At least one item must exist
    AtLeastOneExists,
    /// No item may exist
    NoneExist,
    /// Exactly one item must exist
    OnlyOneExists,
}

impl TestExistence {
    /// Attribute text for this existence check
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllExist => "all_exist",
            Self::AnyExist => "any_exist",
            Self::AtLeastOneExists => "at_least_one_exists",
            Self::NoneExist => "none_exist",
            Self::OnlyOneExists => "only_one_exists",
        }
    }
}

/// A named child entity of an object or state, such as `<name>`, `<evr>`,
/// or `<local_port>`, with optional text and attributes
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    text: Option<String>,
    attrs: Vec<(&'static str, String)>,
}

impl Entity {
    /// Create a named entity
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: None,
            attrs: Vec::new(),
        }
    }

    /// Set the entity text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add an attribute such as `datatype` or `operation`
    pub fn with_attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    fn to_element(&self, ns: Ns) -> Result<Element> {
        let mut e = Element::new(self.name.clone(), ns);
        for (name, value) in &self.attrs {
            e.set_attr(*name, value.clone());
        }
        if let Some(ref text) = self.text {
            e.set_text(text.clone())?;
        }
        Ok(e)
    }
}

/// A kind-tagged OVAL object
#[derive(Debug, Clone)]
pub struct OvalObject {
    id: String,
    element: String,
    ns: Ns,
    version: String,
    entities: Vec<Entity>,
}

impl OvalObject {
    /// Create an object with its kind-specific element name
    pub fn new(id: impl Into<String>, element: impl Into<String>, ns: Ns) -> Self {
        Self {
            id: id.into(),
            element: element.into(),
            ns,
            version: "1".to_string(),
            entities: Vec::new(),
        }
    }

    /// Generated identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a child entity
    pub fn add_entity(&mut self, entity: Entity) -> &mut Self {
        self.entities.push(entity);
        self
    }

    fn to_element(&self) -> Result<Element> {
        let mut e = Element::new(self.element.clone(), self.ns);
        e.set_attr("id", self.id.clone())
            .set_attr("version", self.version.clone());
        for entity in &self.entities {
            e.append(entity.to_element(self.ns)?)?;
        }
        Ok(e)
    }
}

/// A kind-tagged OVAL state
#[derive(Debug, Clone)]
pub struct OvalState {
    id: String,
    element: String,
    ns: Ns,
    version: String,
    entities: Vec<Entity>,
}

impl OvalState {
    /// Create a state with its kind-specific element name
    pub fn new(id: impl Into<String>, element: impl Into<String>, ns: Ns) -> Self {
        Self {
            id: id.into(),
            element: element.into(),
            ns,
            version: "1".to_string(),
            entities: Vec::new(),
        }
    }

    /// Generated identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a child entity
    pub fn add_entity(&mut self, entity: Entity) -> &mut Self {
        self.entities.push(entity);
        self
    }

    fn to_element(&self) -> Result<Element> {
        let mut e = Element::new(self.element.clone(), self.ns);
        e.set_attr("id", self.id.clone())
            .set_attr("version", self.version.clone());
        for entity in &self.entities {
            e.append(entity.to_element(self.ns)?)?;
        }
        Ok(e)
    }
}

/// A kind-tagged OVAL test holding deduplicated object and state
/// references
#[derive(Debug, Clone)]
pub struct Test {
    id: String,
    element: String,
    ns: Ns,
    check: TestCheck,
    existence: TestExistence,
    version: String,
    comment: Option<String>,
    object_refs: Vec<String>,
    state_refs: Vec<String>,
}

impl Test {
    /// Create a test with its kind-specific element name
    pub fn new(id: impl Into<String>, element: impl Into<String>, ns: Ns) -> Self {
        Self {
            id: id.into(),
            element: element.into(),
            ns,
            check: TestCheck::default(),
            existence: TestExistence::default(),
            version: "1".to_string(),
            comment: None,
            object_refs: Vec::new(),
            state_refs: Vec::new(),
        }
    }

    /// Generated identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Set the check attribute
    pub fn set_check(&mut self, check: TestCheck) -> &mut Self {
        self.check = check;
        self
    }

    /// Set the check_existence attribute
    pub fn set_existence(&mut self, existence: TestExistence) -> &mut Self {
        self.existence = existence;
        self
    }

    /// Set the comment attribute; defaults to `Test <id>` when unset
    pub fn set_comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = Some(comment.into());
        self
    }

    /// Reference an object by id; references are deduplicated by id, so
    /// two structurally identical objects built independently merge
    pub fn add_object_ref(&mut self, object_id: impl Into<String>) -> &mut Self {
        let object_id = object_id.into();
        if !self.object_refs.contains(&object_id) {
            self.object_refs.push(object_id);
        }
        self
    }

    /// Reference a state by id; deduplicated by id
    pub fn add_state_ref(&mut self, state_id: impl Into<String>) -> &mut Self {
        let state_id = state_id.into();
        if !self.state_refs.contains(&state_id) {
            self.state_refs.push(state_id);
        }
        self
    }

    /// Number of object references
    pub fn object_ref_count(&self) -> usize {
        self.object_refs.len()
    }

    /// Number of state references
    pub fn state_ref_count(&self) -> usize {
        self.state_refs.len()
    }

    fn to_element(&self) -> Result<Element> {
        let mut e = Element::new(self.element.clone(), self.ns);
        let comment = self
            .comment
            .clone()
            .unwrap_or_else(|| format!("Test {}", self.id));
        e.set_attr("id", self.id.clone())
            .set_attr("check", self.check.as_str())
            .set_attr("check_existence", self.existence.as_str())
            .set_attr("version", self.version.clone())
            .set_attr("comment", comment);
        for object_ref in &self.object_refs {
            e.sub_element("object")?
                .set_attr("object_ref", object_ref.clone());
        }
        for state_ref in &self.state_refs {
            e.sub_element("state")?
                .set_attr("state_ref", state_ref.clone());
        }
        Ok(e)
    }
}

/// A declared external variable bound to an exported benchmark value
#[derive(Debug, Clone)]
pub struct ExternalVariable {
    id: String,
    datatype: String,
    version: String,
    comment: String,
}

impl ExternalVariable {
    /// Create an external variable declaration
    pub fn new(id: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            datatype: datatype.into(),
            version: "1".to_string(),
            comment: "External variable".to_string(),
        }
    }

    /// Generated identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the default comment
    pub fn set_comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = comment.into();
        self
    }

    fn to_element(&self) -> Element {
        let mut e = Element::new("external_variable", Ns::Oval);
        e.set_attr("comment", self.comment.clone())
            .set_attr("datatype", self.datatype.clone())
            .set_attr("id", self.id.clone())
            .set_attr("version", self.version.clone());
        e
    }
}

/// The test-definition document with its deduplicating registries
///
/// All `append_*`/`extend_*` operations are first-writer-wins keyed by the
/// item's generated id. At render, each non-empty registry materializes
/// into its wrapper element in fixed relative order; empty registries
/// produce no wrapper at all.
#[derive(Debug, Clone)]
pub struct OvalDocument {
    product_version: String,
    timestamp: NaiveDateTime,
    definitions: Registry<Definition>,
    tests: Registry<Test>,
    objects: Registry<OvalObject>,
    states: Registry<OvalState>,
    variables: Registry<ExternalVariable>,
}

impl OvalDocument {
    /// Create an empty document stamped with a generation timestamp
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            product_version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            definitions: Registry::new(),
            tests: Registry::new(),
            objects: Registry::new(),
            states: Registry::new(),
            variables: Registry::new(),
        }
    }

    /// Whether no definition-side content was produced; an empty document
    /// is not written at all
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
            && self.tests.is_empty()
            && self.objects.is_empty()
            && self.states.is_empty()
    }

    /// Append a definition; first writer wins per id
    pub fn append_definition(&mut self, definition: Definition) -> &mut Self {
        self.definitions
            .append(definition.id().to_string(), definition);
        self
    }

    /// Append a test; first writer wins per id
    pub fn append_test(&mut self, test: Test) -> &mut Self {
        self.tests.append(test.id().to_string(), test);
        self
    }

    /// Append an object; first writer wins per id
    pub fn append_object(&mut self, object: OvalObject) -> &mut Self {
        self.objects.append(object.id().to_string(), object);
        self
    }

    /// Append a state; first writer wins per id
    pub fn append_state(&mut self, state: OvalState) -> &mut Self {
        self.states.append(state.id().to_string(), state);
        self
    }

    /// Append an external variable; first writer wins per id
    pub fn append_variable(&mut self, variable: ExternalVariable) -> &mut Self {
        self.variables.append(variable.id().to_string(), variable);
        self
    }

    /// Append several tests
    pub fn extend_tests(&mut self, tests: impl IntoIterator<Item = Test>) -> &mut Self {
        for test in tests {
            self.append_test(test);
        }
        self
    }

    /// Append several objects
    pub fn extend_objects(&mut self, objects: impl IntoIterator<Item = OvalObject>) -> &mut Self {
        for object in objects {
            self.append_object(object);
        }
        self
    }

    /// Append several states
    pub fn extend_states(&mut self, states: impl IntoIterator<Item = OvalState>) -> &mut Self {
        for state in states {
            self.append_state(state);
        }
        self
    }

    /// Number of registered definitions
    pub fn definition_count(&self) -> usize {
        self.definitions.len()
    }

    /// Number of registered tests
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Number of registered objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of registered states
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Validate that every criterion references a registered test
    pub fn validate_references(&self) -> Result<()> {
        for definition in self.definitions.iter() {
            for test_ref in definition.referenced_tests() {
                if !self.tests.contains(test_ref) {
                    return Err(Error::validation(format!(
                        "definition '{}' references missing test '{}'",
                        definition.id(),
                        test_ref
                    )));
                }
            }
        }
        Ok(())
    }

    fn generator_element(&self) -> Result<Element> {
        let mut e = Element::new("generator", Ns::Oval).with_child_order(GENERATOR_ORDER);
        e.sub_element_ns("product_name", Ns::OvalCommon)?
            .set_text("rampart benchmark compiler")?;
        e.sub_element_ns("product_version", Ns::OvalCommon)?
            .set_text(self.product_version.clone())?;
        e.sub_element_ns("schema_version", Ns::OvalCommon)?
            .set_text(SCHEMA_VERSION)?;
        e.sub_element_ns("timestamp", Ns::OvalCommon)?
            .set_text(self.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string())?;
        Ok(e)
    }

    /// Render the document tree
    pub fn to_element(&self) -> Result<Element> {
        let mut e = Element::new("oval_definitions", Ns::Oval).with_child_order(DOCUMENT_ORDER);
        e.append(self.generator_element()?)?;

        if !self.definitions.is_empty() {
            let wrapper = e.sub_element("definitions")?;
            for definition in self.definitions.iter() {
                wrapper.append(definition.to_element()?)?;
            }
        }
        if !self.tests.is_empty() {
            let wrapper = e.sub_element("tests")?;
            for test in self.tests.iter() {
                wrapper.append(test.to_element()?)?;
            }
        }
        if !self.objects.is_empty() {
            let wrapper = e.sub_element("objects")?;
            for object in self.objects.iter() {
                wrapper.append(object.to_element()?)?;
            }
        }
        if !self.states.is_empty() {
            let wrapper = e.sub_element("states")?;
            for state in self.states.iter() {
                wrapper.append(state.to_element()?)?;
            }
        }
        if !self.variables.is_empty() {
            let wrapper = e.sub_element("variables")?;
            for variable in self.variables.iter() {
                wrapper.append(variable.to_element())?;
            }
        }
        Ok(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{serialize, OVAL_NSMAP};

    fn timestamp() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2018, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_oval_id_format() {
        assert_eq!(oval_id("pkg_test", OvalKind::Definition), "oval:pkg_test:def:1");
        assert_eq!(oval_id("pkg_test", OvalKind::Object), "oval:pkg_test:obj:1");
        assert_eq!(oval_id("pkg_test", OvalKind::State), "oval:pkg_test:ste:1");
        assert_eq!(oval_id("pkg_test", OvalKind::Test), "oval:pkg_test:tst:1");
        assert_eq!(
            oval_id_with_version("addr", OvalKind::Variable, 2),
            "oval:addr:var:2"
        );
    }

    #[test]
    fn test_oval_id_is_idempotent() {
        let a = oval_id("x", OvalKind::Test);
        let b = oval_id("x", OvalKind::Test);
        assert_eq!(a, b);
    }

    #[test]
    fn test_registry_first_writer_wins_for_tests() {
        let mut doc = OvalDocument::new(timestamp());
        let id = oval_id("t", OvalKind::Test);
        let mut first = Test::new(id.clone(), "dpkginfo_test", Ns::OvalLinux);
        first.set_comment("kept");
        let mut second = Test::new(id, "dpkginfo_test", Ns::OvalLinux);
        second.set_comment("dropped");

        doc.append_test(first);
        doc.append_test(second);
        assert_eq!(doc.test_count(), 1);

        let xml = serialize(&doc.to_element().unwrap(), OVAL_NSMAP);
        assert!(xml.contains("comment=\"kept\""));
        assert!(!xml.contains("comment=\"dropped\""));
    }

    #[test]
    fn test_empty_registries_emit_no_wrappers() {
        let doc = OvalDocument::new(timestamp());
        let xml = serialize(&doc.to_element().unwrap(), OVAL_NSMAP);
        assert!(xml.contains("<generator>"));
        assert!(!xml.contains("<definitions>"));
        assert!(!xml.contains("<tests>"));
        assert!(!xml.contains("<objects>"));
        assert!(!xml.contains("<states>"));
        assert!(!xml.contains("<variables>"));
        assert!(doc.is_empty());
    }

    #[test]
    fn test_wrapper_relative_order() {
        let mut doc = OvalDocument::new(timestamp());
        doc.append_state(OvalState::new(
            oval_id("s", OvalKind::State),
            "dpkginfo_state",
            Ns::OvalLinux,
        ));
        doc.append_definition(Definition::new(oval_id("d", OvalKind::Definition)));
        let xml = serialize(&doc.to_element().unwrap(), OVAL_NSMAP);
        assert!(xml.find("<definitions>").unwrap() < xml.find("<states>").unwrap());
    }

    #[test]
    fn test_criteria_nesting_serializes_parent_then_nested() {
        let mut root = Criteria::new(Operator::And);
        root.add_criterion("oval:a:tst:1");
        let mut alternatives = Criteria::new(Operator::Or);
        alternatives.add_criterion("oval:b:tst:1");
        alternatives.add_criterion("oval:c:tst:1");
        root.add_criteria(alternatives);

        let mut definition = Definition::new("oval:d:def:1");
        definition.add_criteria(root);
        let xml = serialize(&definition.to_element().unwrap(), &[]);

        let and_pos = xml.find("operator=\"AND\"").unwrap();
        let or_pos = xml.find("operator=\"OR\"").unwrap();
        assert!(and_pos < or_pos);
        assert!(xml.contains("test_ref=\"oval:a:tst:1\""));
        assert!(xml.contains("test_ref=\"oval:b:tst:1\""));
        assert!(xml.contains("test_ref=\"oval:c:tst:1\""));

        assert_eq!(
            definition.referenced_tests(),
            vec!["oval:a:tst:1", "oval:b:tst:1", "oval:c:tst:1"]
        );
    }

    #[test]
    fn test_test_object_refs_dedup_by_id() {
        let mut test = Test::new(oval_id("t", OvalKind::Test), "dpkginfo_test", Ns::OvalLinux);
        test.add_object_ref("oval:o:obj:1");
        test.add_object_ref("oval:o:obj:1");
        test.add_state_ref("oval:s:ste:1");
        test.add_state_ref("oval:s:ste:1");
        assert_eq!(test.object_ref_count(), 1);
        assert_eq!(test.state_ref_count(), 1);
    }

    #[test]
    fn test_metadata_affected_duplicate_suppression() {
        let mut metadata = DefinitionMetadata::new();
        metadata
            .set_affected("unix", "Ubuntu 1604")
            .set_affected("unix", "Ubuntu 1604")
            .set_affected("unix", "Debian 9");
        let xml = serialize(&metadata.to_element().unwrap(), &[]);
        assert_eq!(xml.matches("Ubuntu 1604").count(), 1);
        assert_eq!(xml.matches("<affected").count(), 1);
    }

    #[test]
    fn test_validate_references_catches_missing_test() {
        let mut doc = OvalDocument::new(timestamp());
        let mut definition = Definition::new(oval_id("d", OvalKind::Definition));
        let mut criteria = Criteria::new(Operator::And);
        criteria.add_criterion(oval_id("ghost", OvalKind::Test));
        definition.add_criteria(criteria);
        doc.append_definition(definition);

        let err = doc.validate_references().unwrap_err();
        assert!(err.to_string().contains("oval:ghost:tst:1"));

        let mut doc = OvalDocument::new(timestamp());
        let mut definition = Definition::new(oval_id("d", OvalKind::Definition));
        let mut criteria = Criteria::new(Operator::And);
        criteria.add_criterion(oval_id("real", OvalKind::Test));
        definition.add_criteria(criteria);
        doc.append_definition(definition);
        doc.append_test(Test::new(
            oval_id("real", OvalKind::Test),
            "dpkginfo_test",
            Ns::OvalLinux,
        ));
        assert!(doc.validate_references().is_ok());
    }

    #[test]
    fn test_external_variable_attrs() {
        let variable = ExternalVariable::new(oval_id("addr", OvalKind::Variable), "string");
        let xml = serialize(&variable.to_element(), &[]);
        assert!(xml.contains("id=\"oval:addr:var:1\""));
        assert!(xml.contains("datatype=\"string\""));
        assert!(xml.contains("comment=\"External variable\""));
    }
}

//! XCCDF benchmark object model
//!
//! Typed entities for the benchmark document: [`Benchmark`], [`Profile`],
//! [`Group`], [`Rule`], [`Value`], [`Check`], plus status/version history
//! and Dublin Core metadata blocks. Each entity exposes semantic setters
//! while open and one pure `to_element()` tree producer used exactly once
//! at render time — there are no hidden serialize-time mutations.
//!
//! Rules and groups record their own profile memberships as
//! back-references; the benchmark resolves these into forward `<select>`
//! selectors on the owning profile when it renders. This deferred binding
//! is what allows a rule to be parsed before its profile exists.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::xml::{Element, Ns};

use super::generator::{XccdfGenerator, XccdfKind};

const BENCHMARK_ORDER: &[&str] = &[
    "status",
    "title",
    "description",
    "platform",
    "version",
    "metadata",
    "Profile",
    "Value",
    "Group",
    "Rule",
];

const TAILORING_ORDER: &[&str] = &["status", "version", "Profile"];

const PROFILE_ORDER: &[&str] = &[
    "title",
    "description",
    "platform",
    "status",
    "select",
    "set-value",
    "set-complex-value",
    "refine-value",
    "refine-rule",
];

const GROUP_ORDER: &[&str] = &["title", "description", "Rule"];

const RULE_ORDER: &[&str] = &[
    "title",
    "description",
    "reference",
    "rationale",
    "ident",
    "check",
];

const VALUE_ORDER: &[&str] = &[
    "title",
    "description",
    "value",
    "default",
    "match",
    "lower-bound",
    "upper-bound",
];

const CHECK_ORDER: &[&str] = &[
    "check-import",
    "check-export",
    "check-content",
    "check-content-ref",
];

/// The fixed Dublin Core element vocabulary allowed inside metadata and
/// reference blocks
const DC_ELEMENTS: &[&str] = &[
    "title",
    "creator",
    "subject",
    "description",
    "publisher",
    "contributor",
    "date",
    "type",
    "format",
    "identifier",
    "source",
    "language",
    "relation",
    "coverage",
    "rights",
];

/// Rule severity vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    /// Severity cannot be determined
    Unknown,
    /// Informational only
    Info,
    /// Low impact
    Low,
    /// Medium impact
    #[default]
    Medium,
    /// High impact
    High,
}

impl Severity {
    /// Attribute text for this severity
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse from authoring text
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "info" => Ok(Self::Info),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::validation(format!(
                "severity '{}' is not valid, expected one of unknown/info/low/medium/high",
                other
            ))),
        }
    }
}

/// Benchmark status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Not yet complete
    Incomplete,
    /// Draft quality
    Draft,
    /// Between draft and accepted
    Interim,
    /// Officially accepted
    Accepted,
    /// No longer maintained
    Deprecated,
}

impl StatusKind {
    /// Element text for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incomplete => "incomplete",
            Self::Draft => "draft",
            Self::Interim => "interim",
            Self::Accepted => "accepted",
            Self::Deprecated => "deprecated",
        }
    }

    /// Parse from authoring text
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "incomplete" => Ok(Self::Incomplete),
            "draft" => Ok(Self::Draft),
            "interim" => Ok(Self::Interim),
            "accepted" => Ok(Self::Accepted),
            "deprecated" => Ok(Self::Deprecated),
            other => Err(Error::validation(format!(
                "status '{}' is not valid, valid statuses are \
                 incomplete/draft/interim/accepted/deprecated",
                other
            ))),
        }
    }
}

/// One entry of the status history
#[derive(Debug, Clone)]
pub struct Status {
    /// Status value
    pub kind: StatusKind,
    /// Date the status was assigned
    pub date: NaiveDate,
}

impl Status {
    fn to_element(&self) -> Result<Element> {
        let mut e = Element::new("status", Ns::Xccdf);
        e.set_attr("date", self.date.format("%Y-%m-%d").to_string());
        e.set_text(self.kind.as_str())?;
        Ok(e)
    }
}

/// Dublin Core metadata or reference block with a restricted child
/// vocabulary
#[derive(Debug, Clone)]
pub struct DcBlock {
    tag: &'static str,
    href: Option<String>,
    entries: Vec<(String, String)>,
}

impl DcBlock {
    /// A `<metadata>` block
    pub fn metadata() -> Self {
        Self {
            tag: "metadata",
            href: None,
            entries: Vec::new(),
        }
    }

    /// A `<reference>` block
    pub fn reference() -> Self {
        Self {
            tag: "reference",
            href: None,
            entries: Vec::new(),
        }
    }

    /// Set the href attribute (references only carry one in practice)
    pub fn set_href(&mut self, href: impl Into<String>) -> &mut Self {
        self.href = Some(href.into());
        self
    }

    /// Append a Dublin Core entry; repeated names are allowed, names
    /// outside the DC vocabulary are rejected at append time
    pub fn add_entry(&mut self, name: &str, value: impl Into<String>) -> Result<&mut Self> {
        if !DC_ELEMENTS.contains(&name) {
            return Err(Error::SchemaOrdering {
                element: self.tag.to_string(),
                child: name.to_string(),
            });
        }
        self.entries.push((name.to_string(), value.into()));
        Ok(self)
    }

    fn to_element(&self) -> Result<Element> {
        let mut e = Element::new(self.tag, Ns::Xccdf);
        if let Some(ref href) = self.href {
            e.set_attr("href", href.clone());
        }
        for (name, value) in &self.entries {
            let mut child = Element::new(name.clone(), Ns::Dc);
            child.set_text(value.clone())?;
            e.append(child)?;
        }
        Ok(e)
    }
}

/// Checking system referenced by a rule check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSystem {
    /// OVAL definitions document
    OvalDefinitions,
    /// Script Check Engine
    ScriptEngine,
}

impl CheckSystem {
    /// The system attribute URI
    pub fn uri(self) -> &'static str {
        match self {
            Self::OvalDefinitions => Ns::OvalDef.uri(),
            Self::ScriptEngine => Ns::Sce.uri(),
        }
    }
}

/// A `<check>` element: system namespace plus imports, exports, and
/// content references
#[derive(Debug, Clone)]
pub struct Check {
    system: CheckSystem,
    negate: Option<bool>,
    multi_check: Option<bool>,
    imports: Vec<(String, Option<String>)>,
    exports: Vec<(String, String)>,
    content_refs: Vec<(String, Option<String>)>,
}

impl Check {
    /// Create a check for a checking system
    pub fn new(system: CheckSystem) -> Self {
        Self {
            system,
            negate: None,
            multi_check: None,
            imports: Vec::new(),
            exports: Vec::new(),
            content_refs: Vec::new(),
        }
    }

    /// Negate the check result
    pub fn set_negate(&mut self, negate: bool) -> &mut Self {
        self.negate = Some(negate);
        self
    }

    /// Evaluate every named check separately
    pub fn set_multi_check(&mut self, multi_check: bool) -> &mut Self {
        self.multi_check = Some(multi_check);
        self
    }

    /// Import a named result stream from the checking engine
    pub fn check_import(&mut self, import_name: impl Into<String>) -> &mut Self {
        self.imports.push((import_name.into(), None));
        self
    }

    /// Import with an xpath selector into the engine result
    pub fn check_import_xpath(
        &mut self,
        import_name: impl Into<String>,
        xpath: impl Into<String>,
    ) -> &mut Self {
        self.imports.push((import_name.into(), Some(xpath.into())));
        self
    }

    /// Export a benchmark value into the checking engine
    pub fn check_export(
        &mut self,
        value_id: impl Into<String>,
        export_name: impl Into<String>,
    ) -> &mut Self {
        self.exports.push((value_id.into(), export_name.into()));
        self
    }

    /// Reference checking content by href and optional entry name
    pub fn check_content_ref(
        &mut self,
        href: impl Into<String>,
        name: Option<String>,
    ) -> &mut Self {
        self.content_refs.push((href.into(), name));
        self
    }

    fn to_element(&self) -> Result<Element> {
        let mut e = Element::new("check", Ns::Xccdf).with_child_order(CHECK_ORDER);
        e.set_attr("system", self.system.uri());
        if let Some(negate) = self.negate {
            e.set_attr("negate", bool_str(negate));
        }
        if let Some(multi) = self.multi_check {
            e.set_attr("multi-check", bool_str(multi));
        }
        for (name, xpath) in &self.imports {
            let import = e.sub_element("check-import")?;
            import.set_attr("import-name", name.clone());
            if let Some(xpath) = xpath {
                import.set_attr("import-xpath", xpath.clone());
            }
        }
        for (value_id, export_name) in &self.exports {
            e.sub_element("check-export")?
                .set_attr("value-id", value_id.clone())
                .set_attr("export-name", export_name.clone());
        }
        for (href, name) in &self.content_refs {
            let r = e.sub_element("check-content-ref")?;
            r.set_attr("href", href.clone());
            if let Some(name) = name {
                r.set_attr("name", name.clone());
            }
        }
        Ok(e)
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Value operator vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOperator {
    /// Exact equality
    Equals,
    /// Inequality
    NotEqual,
    /// Numeric less-than
    LessThan,
    /// Numeric greater-than
    GreaterThan,
    /// Numeric less-than-or-equal
    LessThanOrEqual,
    /// Numeric greater-than-or-equal
    GreaterThanOrEqual,
    /// Regular expression match
    PatternMatch,
}

impl ValueOperator {
    /// Attribute text for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEqual => "not equal",
            Self::LessThan => "less than",
            Self::GreaterThan => "greater than",
            Self::LessThanOrEqual => "less than or equal",
            Self::GreaterThanOrEqual => "greater than or equal",
            Self::PatternMatch => "pattern match",
        }
    }

    /// Parse from authoring text
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "equals" => Ok(Self::Equals),
            "not equal" => Ok(Self::NotEqual),
            "less than" => Ok(Self::LessThan),
            "greater than" => Ok(Self::GreaterThan),
            "less than or equal" => Ok(Self::LessThanOrEqual),
            "greater than or equal" => Ok(Self::GreaterThanOrEqual),
            "pattern match" | "match" => Ok(Self::PatternMatch),
            other => Err(Error::validation(format!(
                "bad value operator '{}', expected one of equals/not equal/less than/\
                 greater than/less than or equal/greater than or equal/pattern match",
                other
            ))),
        }
    }
}

/// Facets a value can carry, each keyed by an optional selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFacet {
    /// Current value
    Value,
    /// Default value
    Default,
    /// Validation pattern
    Match,
    /// Inclusive lower bound
    LowerBound,
    /// Inclusive upper bound
    UpperBound,
}

impl ValueFacet {
    fn tag(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Default => "default",
            Self::Match => "match",
            Self::LowerBound => "lower-bound",
            Self::UpperBound => "upper-bound",
        }
    }
}

/// A tailorable benchmark parameter
#[derive(Debug, Clone)]
pub struct Value {
    local_id: String,
    xccdf_id: String,
    value_type: Option<String>,
    operator: Option<ValueOperator>,
    title: Option<String>,
    description: Option<String>,
    facets: Vec<(ValueFacet, Option<String>, String)>,
}

impl Value {
    /// Create a value; the identifier is minted from the generator
    pub fn new(generator: &XccdfGenerator, local_id: impl Into<String>) -> Self {
        let local_id = local_id.into();
        let xccdf_id = generator.id(XccdfKind::Value, &local_id);
        Self {
            local_id,
            xccdf_id,
            value_type: None,
            operator: None,
            title: None,
            description: None,
            facets: Vec::new(),
        }
    }

    /// Local identifier from the authoring document
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Generated document identifier
    pub fn xccdf_id(&self) -> &str {
        &self.xccdf_id
    }

    /// Set the datatype attribute
    pub fn set_type(&mut self, value_type: impl Into<String>) -> &mut Self {
        self.value_type = Some(value_type.into().to_lowercase());
        self
    }

    /// Set the comparison operator
    pub fn set_operator(&mut self, operator: ValueOperator) -> &mut Self {
        self.operator = Some(operator);
        self
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

    /// Set a facet for an optional selector
    ///
    /// Setting the same (facet, selector) pair twice is a collision;
    /// differing selectors coexist.
    pub fn set_facet(
        &mut self,
        facet: ValueFacet,
        selector: Option<&str>,
        value: impl Into<String>,
    ) -> Result<&mut Self> {
        if self
            .facets
            .iter()
            .any(|(f, s, _)| *f == facet && s.as_deref() == selector)
        {
            return Err(Error::collision(format!(
                "facet '{}' with selector {:?} already set on value '{}'",
                facet.tag(),
                selector,
                self.local_id
            )));
        }
        self.facets
            .push((facet, selector.map(str::to_string), value.into()));
        Ok(self)
    }

    /// Set the current value facet
    pub fn set_value(&mut self, value: impl Into<String>, selector: Option<&str>) -> Result<&mut Self> {
        self.set_facet(ValueFacet::Value, selector, value)
    }

    /// Set the default facet
    pub fn set_default(&mut self, value: impl Into<String>, selector: Option<&str>) -> Result<&mut Self> {
        self.set_facet(ValueFacet::Default, selector, value)
    }

    fn to_element(&self) -> Result<Element> {
        let mut e = Element::new("Value", Ns::Xccdf).with_child_order(VALUE_ORDER);
        e.set_attr("id", self.xccdf_id.clone());
        if let Some(ref t) = self.value_type {
            e.set_attr("type", t.clone());
        }
        if let Some(op) = self.operator {
            e.set_attr("operator", op.as_str());
        }
        if let Some(ref title) = self.title {
            e.sub_element("title")?.set_text(title.trim_end())?;
        }
        if let Some(ref description) = self.description {
            e.sub_element("description")?.set_text(description.clone())?;
        }
        for facet in [
            ValueFacet::Value,
            ValueFacet::Default,
            ValueFacet::Match,
            ValueFacet::LowerBound,
            ValueFacet::UpperBound,
        ] {
            for (_, selector, value) in self.facets.iter().filter(|(f, _, _)| *f == facet) {
                let mut child = Element::new(facet.tag(), Ns::Xccdf);
                child.set_text(value.clone())?;
                if let Some(selector) = selector {
                    child.set_attr("selector", selector.clone());
                }
                e.append(child)?;
            }
        }
        Ok(e)
    }
}

/// A plain rule reference with optional href
#[derive(Debug, Clone)]
pub struct RuleReference {
    /// Reference text
    pub text: String,
    /// Optional URL
    pub href: Option<String>,
}

/// A checkable benchmark rule
#[derive(Debug, Clone)]
pub struct Rule {
    local_id: String,
    xccdf_id: String,
    severity: Severity,
    selected: bool,
    title: Option<String>,
    description: Option<String>,
    rationale: Option<String>,
    idents: Vec<(String, String)>,
    references: Vec<RuleReference>,
    dc_references: Vec<DcBlock>,
    checks: Vec<Check>,
    memberships: Vec<(String, bool)>,
}

impl Rule {
    /// Create a rule; the identifier is minted from the generator
    pub fn new(generator: &XccdfGenerator, local_id: impl Into<String>) -> Self {
        let local_id = local_id.into();
        let xccdf_id = generator.id(XccdfKind::Rule, &local_id);
        Self {
            local_id,
            xccdf_id,
            severity: Severity::default(),
            selected: false,
            title: None,
            description: None,
            rationale: None,
            idents: Vec::new(),
            references: Vec::new(),
            dc_references: Vec::new(),
            checks: Vec::new(),
            memberships: Vec::new(),
        }
    }

    /// Local identifier from the authoring document
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Generated document identifier
    pub fn xccdf_id(&self) -> &str {
        &self.xccdf_id
    }

    /// Set the severity attribute
    pub fn set_severity(&mut self, severity: Severity) -> &mut Self {
        self.severity = severity;
        self
    }

    /// Set the default selection state
    pub fn set_selected(&mut self, selected: bool) -> &mut Self {
        self.selected = selected;
        self
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

    /// Set the rationale
    pub fn set_rationale(&mut self, rationale: impl Into<String>) -> &mut Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Add an ident entry (name within an identification system)
    pub fn add_ident(&mut self, name: impl Into<String>, system: impl Into<String>) -> &mut Self {
        self.idents.push((name.into(), system.into()));
        self
    }

    /// Add a plain reference
    pub fn add_reference(&mut self, text: impl Into<String>, href: Option<String>) -> &mut Self {
        self.references.push(RuleReference {
            text: text.into(),
            href,
        });
        self
    }

    /// Add a Dublin Core reference block
    pub fn add_dc_reference(&mut self, reference: DcBlock) -> &mut Self {
        self.dc_references.push(reference);
        self
    }

    /// Append a check; a rule may carry several
    pub fn add_check(&mut self, check: Check) -> &mut Check {
        self.checks.push(check);
        let last = self.checks.len() - 1;
        &mut self.checks[last]
    }

    /// Record membership in a profile by local profile id
    ///
    /// The benchmark resolves memberships into `<select>` selectors on the
    /// owning profile at render time.
    pub fn add_to_profile(&mut self, profile: impl Into<String>, selected: bool) -> &mut Self {
        self.memberships.push((profile.into(), selected));
        self
    }

    /// Recorded profile memberships
    pub fn memberships(&self) -> &[(String, bool)] {
        &self.memberships
    }

    pub(crate) fn to_element(&self) -> Result<Element> {
        let mut e = Element::new("Rule", Ns::Xccdf).with_child_order(RULE_ORDER);
        e.set_attr("id", self.xccdf_id.clone());
        e.set_attr("severity", self.severity.as_str());
        e.set_attr("selected", bool_str(self.selected));
        if let Some(ref title) = self.title {
            e.sub_element("title")?.set_text(title.trim_end())?;
        }
        if let Some(ref description) = self.description {
            e.sub_element("description")?.set_text(description.clone())?;
        }
        for reference in &self.references {
            let r = e.sub_element("reference")?;
            r.set_text(reference.text.clone())?;
            if let Some(ref href) = reference.href {
                r.set_attr("href", href.clone());
            }
        }
        for dc in &self.dc_references {
            e.append(dc.to_element()?)?;
        }
        if let Some(ref rationale) = self.rationale {
            e.sub_element("rationale")?.set_text(rationale.clone())?;
        }
        for (name, system) in &self.idents {
            e.sub_element("ident")?
                .set_attr("system", system.clone())
                .set_text(name.clone())?;
        }
        for check in &self.checks {
            e.append(check.to_element()?)?;
        }
        Ok(e)
    }
}

/// A group of rules
#[derive(Debug, Clone)]
pub struct Group {
    local_id: String,
    xccdf_id: String,
    title: Option<String>,
    description: Option<String>,
    selected: bool,
    rules: Registry<Rule>,
    memberships: Vec<(String, bool)>,
}

impl Group {
    /// Create a group; the identifier is minted from the generator
    pub fn new(generator: &XccdfGenerator, local_id: impl Into<String>) -> Self {
        let local_id = local_id.into();
        let xccdf_id = generator.id(XccdfKind::Group, &local_id);
        Self {
            local_id,
            xccdf_id,
            title: None,
            description: None,
            selected: false,
            rules: Registry::new(),
            memberships: Vec::new(),
        }
    }

    /// Local identifier from the authoring document
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Generated document identifier
    pub fn xccdf_id(&self) -> &str {
        &self.xccdf_id
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

    /// Set the default selection state
    pub fn set_selected(&mut self, selected: bool) -> &mut Self {
        self.selected = selected;
        self
    }

    /// Append a rule; a second rule under the same id is discarded
    pub fn append_rule(&mut self, rule: Rule) -> &mut Self {
        self.rules.append(rule.xccdf_id.clone(), rule);
        self
    }

    /// Rules in insertion order
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Record membership in a profile by local profile id
    pub fn add_to_profile(&mut self, profile: impl Into<String>, selected: bool) -> &mut Self {
        self.memberships.push((profile.into(), selected));
        self
    }

    /// Recorded profile memberships
    pub fn memberships(&self) -> &[(String, bool)] {
        &self.memberships
    }

    fn to_element(&self) -> Result<Element> {
        let mut e = Element::new("Group", Ns::Xccdf).with_child_order(GROUP_ORDER);
        e.set_attr("id", self.xccdf_id.clone());
        e.set_attr("selected", bool_str(self.selected));
        if let Some(ref title) = self.title {
            e.sub_element("title")?.set_text(title.trim_end())?;
        }
        if let Some(ref description) = self.description {
            e.sub_element("description")?.set_text(description.clone())?;
        }
        for rule in self.rules.iter() {
            e.append(rule.to_element()?)?;
        }
        Ok(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SelectorKey {
    Select(String),
    SetValue(String),
}

#[derive(Debug, Clone)]
enum SelectorAction {
    Select { selected: bool },
    SetValue { value: String },
}

/// A selection profile
#[derive(Debug, Clone)]
pub struct Profile {
    local_id: String,
    xccdf_id: String,
    title: Option<String>,
    description: Option<String>,
    extends: Option<String>,
    is_abstract: Option<bool>,
    version: Option<String>,
    statuses: Vec<Status>,
    platforms: Vec<String>,
    selectors: Vec<(SelectorKey, SelectorAction)>,
}

impl Profile {
    /// Create a profile; the identifier is minted from the generator
    pub fn new(generator: &XccdfGenerator, local_id: impl Into<String>) -> Self {
        let local_id = local_id.into();
        let xccdf_id = generator.id(XccdfKind::Profile, &local_id);
        Self {
            local_id,
            xccdf_id,
            title: None,
            description: None,
            extends: None,
            is_abstract: None,
            version: None,
            statuses: Vec::new(),
            platforms: Vec::new(),
            selectors: Vec::new(),
        }
    }

    /// Local identifier from the authoring document
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Generated document identifier
    pub fn xccdf_id(&self) -> &str {
        &self.xccdf_id
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

    /// Set the extended base profile id
    pub fn set_extends(&mut self, extends: impl Into<String>) -> &mut Self {
        self.extends = Some(extends.into());
        self
    }

    /// Mark the profile abstract
    pub fn set_abstract(&mut self, is_abstract: bool) -> &mut Self {
        self.is_abstract = Some(is_abstract);
        self
    }

    /// Set the version text
    pub fn set_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.version = Some(version.into());
        self
    }

    /// Append a status entry
    pub fn add_status(&mut self, kind: StatusKind, date: NaiveDate) -> &mut Self {
        self.statuses.push(Status { kind, date });
        self
    }

    /// Add a platform identifier
    pub fn add_platform(&mut self, idref: impl Into<String>) -> &mut Self {
        let idref = idref.into();
        if !self.platforms.contains(&idref) {
            self.platforms.push(idref);
        }
        self
    }

    /// Record a select action; repeated selects on the same idref keep
    /// their position and take the latest selected flag
    pub fn select(&mut self, idref: impl Into<String>, selected: bool) -> &mut Self {
        let key = SelectorKey::Select(idref.into());
        let action = SelectorAction::Select { selected };
        self.upsert(key, action);
        self
    }

    /// Record a set-value override
    pub fn set_value(&mut self, idref: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = SelectorKey::SetValue(idref.into());
        let action = SelectorAction::SetValue {
            value: value.into(),
        };
        self.upsert(key, action);
        self
    }

    fn upsert(&mut self, key: SelectorKey, action: SelectorAction) {
        match self.selectors.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = action,
            None => self.selectors.push((key, action)),
        }
    }

    /// Whether a select action already exists for an idref
    pub fn has_select(&self, idref: &str) -> bool {
        self.selectors
            .iter()
            .any(|(k, _)| matches!(k, SelectorKey::Select(id) if id == idref))
    }

    /// Render the profile, appending resolved membership selects for
    /// idrefs without an explicit selector
    pub(crate) fn to_element(&self, resolved: &[(String, bool)]) -> Result<Element> {
        let mut e = Element::new("Profile", Ns::Xccdf).with_child_order(PROFILE_ORDER);
        e.set_attr("id", self.xccdf_id.clone());
        if let Some(abstract_) = self.is_abstract {
            e.set_attr("abstract", bool_str(abstract_));
        }
        if let Some(ref extends) = self.extends {
            e.set_attr("extends", extends.clone());
        }
        if let Some(ref title) = self.title {
            e.sub_element("title")?.set_text(title.trim_end())?;
        }
        if let Some(ref description) = self.description {
            e.sub_element("description")?.set_text(description.clone())?;
        }
        for platform in &self.platforms {
            e.sub_element("platform")?.set_attr("idref", platform.clone());
        }
        for status in &self.statuses {
            e.append(status.to_element()?)?;
        }
        if let Some(ref version) = self.version {
            e.sub_element("version")?.set_text(version.clone())?;
        }
        for (key, action) in &self.selectors {
            match (key, action) {
                (SelectorKey::Select(idref), SelectorAction::Select { selected }) => {
                    e.sub_element("select")?
                        .set_attr("idref", idref.clone())
                        .set_attr("selected", bool_str(*selected));
                }
                (SelectorKey::SetValue(idref), SelectorAction::SetValue { value }) => {
                    e.sub_element("set-value")?
                        .set_attr("idref", idref.clone())
                        .set_text(value.clone())?;
                }
                _ => {}
            }
        }
        for (idref, selected) in resolved {
            if self.has_select(idref) {
                continue;
            }
            e.sub_element("select")?
                .set_attr("idref", idref.clone())
                .set_attr("selected", bool_str(*selected));
        }
        Ok(e)
    }
}

/// The top-level benchmark document
///
/// Owns the profile/value/group/rule registries. The `new_*` accessors are
/// idempotent by id: a second call with an already-used id returns the
/// existing entity for continued mutation, which lets one rule discover
/// and extend an entity created by an earlier- or later-visited parser.
#[derive(Debug, Clone)]
pub struct Benchmark {
    generator: XccdfGenerator,
    local_id: String,
    xccdf_id: String,
    title: Option<String>,
    description: Option<String>,
    version: String,
    version_time: Option<NaiveDateTime>,
    statuses: Vec<Status>,
    platforms: Vec<String>,
    dc_metadata: Option<DcBlock>,
    profiles: Registry<Profile>,
    values: Registry<Value>,
    groups: Registry<Group>,
    rules: Registry<Rule>,
}

impl Benchmark {
    /// Create a benchmark document
    pub fn new(generator: XccdfGenerator, local_id: impl Into<String>) -> Self {
        let local_id = local_id.into();
        let xccdf_id = generator.id(XccdfKind::Benchmark, &local_id);
        Self {
            generator,
            local_id,
            xccdf_id,
            title: None,
            description: None,
            version: "0.1".to_string(),
            version_time: None,
            statuses: Vec::new(),
            platforms: Vec::new(),
            dc_metadata: None,
            profiles: Registry::new(),
            values: Registry::new(),
            groups: Registry::new(),
            rules: Registry::new(),
        }
    }

    /// The identifier generator for this run
    pub fn generator(&self) -> &XccdfGenerator {
        &self.generator
    }

    /// Local identifier from the authoring document
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Generated document identifier
    pub fn xccdf_id(&self) -> &str {
        &self.xccdf_id
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

    /// Set version text and timestamp
    pub fn set_version(
        &mut self,
        version: impl Into<String>,
        time: Option<NaiveDateTime>,
    ) -> &mut Self {
        self.version = version.into();
        self.version_time = time;
        self
    }

    /// Append a status entry
    pub fn add_status(&mut self, kind: StatusKind, date: NaiveDate) -> &mut Self {
        self.statuses.push(Status { kind, date });
        self
    }

    /// Add a platform identifier, preserving first-seen order
    pub fn add_platform(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.platforms.contains(&name) {
            self.platforms.push(name);
        }
        self
    }

    /// Platform identifiers in insertion order
    pub fn platforms(&self) -> &[String] {
        &self.platforms
    }

    /// Set the Dublin Core metadata block
    pub fn set_dc_metadata(&mut self, metadata: DcBlock) -> &mut Self {
        self.dc_metadata = Some(metadata);
        self
    }

    /// Get or create a profile by local id
    pub fn new_profile(&mut self, local_id: &str) -> &mut Profile {
        let id = self.generator.id(XccdfKind::Profile, local_id);
        let generator = self.generator.clone();
        self.profiles
            .get_or_insert_with(id, || Profile::new(&generator, local_id))
    }

    /// Append a profile; first writer wins per id
    pub fn append_profile(&mut self, profile: Profile) -> &mut Self {
        self.profiles.append(profile.xccdf_id.clone(), profile);
        self
    }

    /// Look up a profile by local id
    pub fn get_profile(&self, local_id: &str) -> Option<&Profile> {
        self.profiles
            .get(&self.generator.id(XccdfKind::Profile, local_id))
    }

    /// The first-registered profile's local id, used as the implicit
    /// default membership target
    pub fn default_profile_id(&self) -> Option<String> {
        self.profiles.first().map(|p| p.local_id().to_string())
    }

    /// Get or create a group by local id
    pub fn new_group(&mut self, local_id: &str) -> &mut Group {
        let id = self.generator.id(XccdfKind::Group, local_id);
        let generator = self.generator.clone();
        self.groups
            .get_or_insert_with(id, || Group::new(&generator, local_id))
    }

    /// Look up a group by local id
    pub fn get_group(&self, local_id: &str) -> Option<&Group> {
        self.groups
            .get(&self.generator.id(XccdfKind::Group, local_id))
    }

    /// Get or create a value by local id
    pub fn new_value(&mut self, local_id: &str) -> &mut Value {
        let id = self.generator.id(XccdfKind::Value, local_id);
        let generator = self.generator.clone();
        self.values
            .get_or_insert_with(id, || Value::new(&generator, local_id))
    }

    /// Append a value; first writer wins per id
    pub fn append_value(&mut self, value: Value) -> &mut Self {
        self.values.append(value.xccdf_id.clone(), value);
        self
    }

    /// Look up a value by local id
    pub fn get_value(&self, local_id: &str) -> Option<&Value> {
        self.values
            .get(&self.generator.id(XccdfKind::Value, local_id))
    }

    /// Append a top-level rule; first writer wins per id
    pub fn append_rule(&mut self, rule: Rule) -> &mut Self {
        self.rules.append(rule.xccdf_id().to_string(), rule);
        self
    }

    /// Resolve rule and group memberships into per-profile select lists
    ///
    /// Rules and groups with no membership default to the first profile
    /// with selected=true.
    fn resolve_memberships(&self) -> Result<Vec<(String, Vec<(String, bool)>)>> {
        let mut per_profile: Vec<(String, Vec<(String, bool)>)> = self
            .profiles
            .iter()
            .map(|p| (p.local_id().to_string(), Vec::new()))
            .collect();

        let default_profile = self.default_profile_id();

        for group in self.groups.iter() {
            for (profile, selected) in group.memberships() {
                push_membership(&mut per_profile, profile, group.xccdf_id(), *selected)?;
            }
            for rule in group.rules() {
                resolve_rule_memberships(
                    &mut per_profile,
                    default_profile.as_deref(),
                    rule.memberships(),
                    rule.xccdf_id(),
                )?;
            }
        }
        for rule in self.rules.iter() {
            resolve_rule_memberships(
                &mut per_profile,
                default_profile.as_deref(),
                rule.memberships(),
                rule.xccdf_id(),
            )?;
        }

        Ok(per_profile)
    }

    /// Render the benchmark tree
    pub fn to_element(&self) -> Result<Element> {
        let resolved = self.resolve_memberships()?;

        let mut e = Element::new("Benchmark", Ns::Xccdf).with_child_order(BENCHMARK_ORDER);
        e.set_attr("id", self.xccdf_id.clone());

        for status in &self.statuses {
            e.append(status.to_element()?)?;
        }
        if let Some(ref title) = self.title {
            e.sub_element("title")?.set_text(title.trim_end())?;
        }
        if let Some(ref description) = self.description {
            e.sub_element("description")?.set_text(description.clone())?;
        }
        for platform in &self.platforms {
            e.sub_element("platform")?.set_attr("idref", platform.clone());
        }
        let version = e.sub_element("version")?;
        if let Some(time) = self.version_time {
            version.set_attr("time", time.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
        version.set_text(self.version.clone())?;
        if let Some(ref dc) = self.dc_metadata {
            e.append(dc.to_element()?)?;
        }
        for profile in self.profiles.iter() {
            let selects = resolved
                .iter()
                .find(|(name, _)| name == profile.local_id())
                .map(|(_, s)| s.as_slice())
                .unwrap_or(&[]);
            e.append(profile.to_element(selects)?)?;
        }
        for value in self.values.iter() {
            e.append(value.to_element()?)?;
        }
        for group in self.groups.iter() {
            e.append(group.to_element()?)?;
        }
        for rule in self.rules.iter() {
            e.append(rule.to_element()?)?;
        }
        Ok(e)
    }
}

fn push_membership(
    per_profile: &mut [(String, Vec<(String, bool)>)],
    profile: &str,
    idref: &str,
    selected: bool,
) -> Result<()> {
    match per_profile.iter_mut().find(|(name, _)| name == profile) {
        Some((_, selects)) => {
            selects.push((idref.to_string(), selected));
            Ok(())
        }
        None => Err(Error::validation(format!(
            "profile '{}' referenced by '{}' does not exist",
            profile, idref
        ))),
    }
}

/// A rule with no membership defaults into the first profile as selected
fn resolve_rule_memberships(
    per_profile: &mut [(String, Vec<(String, bool)>)],
    default_profile: Option<&str>,
    memberships: &[(String, bool)],
    idref: &str,
) -> Result<()> {
    if memberships.is_empty() {
        if let Some(default) = default_profile {
            push_membership(per_profile, default, idref, true)?;
        }
        return Ok(());
    }
    for (profile, selected) in memberships {
        push_membership(per_profile, profile, idref, *selected)?;
    }
    Ok(())
}

/// A tailoring document: profiles layered over an existing benchmark
#[derive(Debug, Clone)]
pub struct Tailoring {
    generator: XccdfGenerator,
    local_id: String,
    xccdf_id: String,
    version: String,
    version_time: Option<NaiveDateTime>,
    statuses: Vec<Status>,
    profiles: Registry<Profile>,
}

impl Tailoring {
    /// Create a tailoring document
    pub fn new(generator: XccdfGenerator, local_id: impl Into<String>) -> Self {
        let local_id = local_id.into();
        let xccdf_id = generator.id(XccdfKind::Tailoring, &local_id);
        Self {
            generator,
            local_id,
            xccdf_id,
            version: "0.1".to_string(),
            version_time: None,
            statuses: Vec::new(),
            profiles: Registry::new(),
        }
    }

    /// The identifier generator for this run
    pub fn generator(&self) -> &XccdfGenerator {
        &self.generator
    }

    /// Local identifier from the authoring document
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Generated document identifier
    pub fn xccdf_id(&self) -> &str {
        &self.xccdf_id
    }

    /// Set version text and timestamp
    pub fn set_version(
        &mut self,
        version: impl Into<String>,
        time: Option<NaiveDateTime>,
    ) -> &mut Self {
        self.version = version.into();
        self.version_time = time;
        self
    }

    /// Append a status entry
    pub fn add_status(&mut self, kind: StatusKind, date: NaiveDate) -> &mut Self {
        self.statuses.push(Status { kind, date });
        self
    }

    /// Get or create a profile by local id
    pub fn new_profile(&mut self, local_id: &str) -> &mut Profile {
        let id = self.generator.id(XccdfKind::Profile, local_id);
        let generator = self.generator.clone();
        self.profiles
            .get_or_insert_with(id, || Profile::new(&generator, local_id))
    }

    /// Render the tailoring tree
    pub fn to_element(&self) -> Result<Element> {
        let mut e = Element::new("Tailoring", Ns::Xccdf).with_child_order(TAILORING_ORDER);
        e.set_attr("id", self.xccdf_id.clone());
        for status in &self.statuses {
            e.append(status.to_element()?)?;
        }
        let version = e.sub_element("version")?;
        if let Some(time) = self.version_time {
            version.set_attr("time", time.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
        version.set_text(self.version.clone())?;
        for profile in self.profiles.iter() {
            e.append(profile.to_element(&[])?)?;
        }
        Ok(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{serialize, XCCDF_NSMAP};

    fn generator() -> XccdfGenerator {
        XccdfGenerator::new("mirantis.com")
    }

    #[test]
    fn test_value_facet_collision() {
        let mut value = Value::new(&generator(), "timeout");
        value.set_value("600", None).unwrap();
        let err = value.set_value("900", None).unwrap_err();
        assert!(matches!(err, Error::Collision { .. }));

        // a differing selector coexists
        value.set_value("900", Some("strict")).unwrap();
        let e = value.to_element().unwrap();
        assert_eq!(e.children("value").count(), 2);
    }

    #[test]
    fn test_value_renders_facets_in_declared_order() {
        let mut value = Value::new(&generator(), "limit");
        value.set_type("number");
        value.set_facet(ValueFacet::UpperBound, None, "10").unwrap();
        value.set_facet(ValueFacet::LowerBound, None, "1").unwrap();
        value.set_value("5", None).unwrap();

        let xml = serialize(&value.to_element().unwrap(), &[]);
        let value_pos = xml.find("<value>").unwrap();
        let lower_pos = xml.find("<lower-bound>").unwrap();
        let upper_pos = xml.find("<upper-bound>").unwrap();
        assert!(value_pos < lower_pos && lower_pos < upper_pos);
    }

    #[test]
    fn test_bad_operator_is_validation_error() {
        let err = ValueOperator::parse("sorta equals").unwrap_err();
        assert!(err.to_string().contains("sorta equals"));
    }

    #[test]
    fn test_new_profile_is_idempotent_by_id() {
        let mut benchmark = Benchmark::new(generator(), "test");
        benchmark.new_profile("default").set_title("First");
        benchmark.new_profile("default").set_description("Second");

        let profile = benchmark.get_profile("default").unwrap();
        assert_eq!(profile.title.as_deref(), Some("First"));
        assert_eq!(profile.description.as_deref(), Some("Second"));
    }

    #[test]
    fn test_append_rule_first_writer_wins() {
        let mut benchmark = Benchmark::new(generator(), "test");
        let mut first = Rule::new(benchmark.generator(), "r1");
        first.set_title("kept");
        let mut second = Rule::new(benchmark.generator(), "r1");
        second.set_title("dropped");
        benchmark.append_rule(first);
        benchmark.append_rule(second);
        assert_eq!(benchmark.rules.len(), 1);
        assert_eq!(
            benchmark.rules.iter().next().unwrap().title.as_deref(),
            Some("kept")
        );
    }

    #[test]
    fn test_unassigned_rule_defaults_to_first_profile_selected() {
        let mut benchmark = Benchmark::new(generator(), "test");
        benchmark.new_profile("default").set_title("Default Profile");
        let rule = Rule::new(benchmark.generator(), "lonely");
        benchmark.append_rule(rule);

        let xml = serialize(&benchmark.to_element().unwrap(), XCCDF_NSMAP);
        assert!(xml.contains(
            "<select idref=\"xccdf_com.mirantis_rule_lonely\" selected=\"true\"/>"
        ));
    }

    #[test]
    fn test_membership_resolution_out_of_order() {
        // the rule declares its membership before the profile exists
        let mut benchmark = Benchmark::new(generator(), "test");
        let mut rule = Rule::new(benchmark.generator(), "early");
        rule.add_to_profile("hardened", false);
        benchmark.new_group("default").append_rule(rule);
        benchmark.new_profile("default");
        benchmark.new_profile("hardened");

        let xml = serialize(&benchmark.to_element().unwrap(), XCCDF_NSMAP);
        assert!(xml.contains(
            "<select idref=\"xccdf_com.mirantis_rule_early\" selected=\"false\"/>"
        ));
    }

    #[test]
    fn test_membership_in_missing_profile_fails() {
        let mut benchmark = Benchmark::new(generator(), "test");
        benchmark.new_profile("default");
        let mut rule = Rule::new(benchmark.generator(), "r");
        rule.add_to_profile("ghost", true);
        benchmark.append_rule(rule);

        let err = benchmark.to_element().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_explicit_profile_selector_wins_over_membership() {
        let mut benchmark = Benchmark::new(generator(), "test");
        let rule_id = benchmark.generator().id(XccdfKind::Rule, "r");
        benchmark.new_profile("default").select(rule_id.clone(), false);
        let mut rule = Rule::new(benchmark.generator(), "r");
        rule.add_to_profile("default", true);
        benchmark.append_rule(rule);

        let xml = serialize(&benchmark.to_element().unwrap(), XCCDF_NSMAP);
        let select = format!("<select idref=\"{}\" selected=\"false\"/>", rule_id);
        assert!(xml.contains(&select));
        assert!(!xml.contains(&format!("<select idref=\"{}\" selected=\"true\"/>", rule_id)));
    }

    #[test]
    fn test_benchmark_child_order() {
        let mut benchmark = Benchmark::new(generator(), "order");
        benchmark.new_profile("default");
        benchmark
            .set_title("Title")
            .set_description("Description")
            .add_platform("cpe:/o:canonical:ubuntu_linux:16.04")
            .add_status(
                StatusKind::Draft,
                NaiveDate::from_ymd_opt(2018, 3, 1).unwrap(),
            );

        let xml = serialize(&benchmark.to_element().unwrap(), XCCDF_NSMAP);
        let status = xml.find("<status").unwrap();
        let title = xml.find("<title>").unwrap();
        let platform = xml.find("<platform").unwrap();
        let version = xml.find("<version").unwrap();
        let profile = xml.find("<Profile").unwrap();
        assert!(status < title && title < platform && platform < version && version < profile);
    }

    #[test]
    fn test_check_element() {
        let mut check = Check::new(CheckSystem::ScriptEngine);
        check
            .check_import("stdout")
            .check_import("stderr")
            .check_export("xccdf_com.mirantis_value_v1", "CODEBLOCK")
            .check_content_ref("entrypoint.sh", None);

        let xml = serialize(&check.to_element().unwrap(), &[]);
        assert!(xml.contains("system=\"http://open-scap.org/page/SCE\""));
        let import = xml.find("check-import").unwrap();
        let export = xml.find("check-export").unwrap();
        let content = xml.find("check-content-ref").unwrap();
        assert!(import < export && export < content);
    }

    #[test]
    fn test_dc_block_restricts_vocabulary() {
        let mut dc = DcBlock::metadata();
        dc.add_entry("creator", "Security Team").unwrap();
        let err = dc.add_entry("banana", "no").unwrap_err();
        assert!(matches!(err, Error::SchemaOrdering { .. }));
    }

    #[test]
    fn test_status_vocabulary() {
        assert!(StatusKind::parse("draft").is_ok());
        assert!(StatusKind::parse("shiny").is_err());
    }

    #[test]
    fn test_tailoring_renders_profiles() {
        let g = generator();
        let mut tailoring = Tailoring::new(g.clone(), "site");
        let base = g.id(XccdfKind::Profile, "default");
        tailoring
            .new_profile("extends_default")
            .set_extends(base.clone())
            .set_title("Site overrides")
            .set_value(g.id(XccdfKind::Value, "timeout"), "300");

        let xml = serialize(&tailoring.to_element().unwrap(), XCCDF_NSMAP);
        assert!(xml.contains("xccdf_com.mirantis_tailoring_site"));
        assert!(xml.contains(&format!("extends=\"{}\"", base)));
        assert!(xml.contains(">300</set-value>"));
    }
}

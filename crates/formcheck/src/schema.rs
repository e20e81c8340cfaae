//! JSON schema documents that build [`Validation`] trees.
//!
//! Rules are data here, so only predicates with data-only arguments are
//! available; custom closures need the builder API.

use crate::error::Result;
use crate::rule::KeyGetter;
use crate::validation::Validation;
use crate::validators::{self, Predicate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn enabled_default() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

/// One node of a schema document.
///
/// ```
/// use formcheck::{Schema, ValidationTree};
/// use serde_json::json;
///
/// let schema = Schema::from_json(r#"{
///     "fields": {
///         "name": { "rules": [{ "rule": "required" }, { "rule": "maxLength", "value": 5 }] }
///     }
/// }"#).unwrap();
///
/// let mut tree = ValidationTree::new(schema.build().unwrap());
/// assert!(tree.test_root(&json!({ "name": "Ada" })));
/// assert!(!tree.test_root(&json!({ "name": "Augusta" })));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default = "enabled_default", skip_serializing_if = "is_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<Box<Aggregation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub some: Option<Box<Aggregation>>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: Vec::new(),
            fields: BTreeMap::new(),
            children: BTreeMap::new(),
            every: None,
            some: None,
        }
    }
}

/// Template for every/some instances, with an optional key property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub schema: Schema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A rule entry: which predicate, plus an optional message and gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default = "enabled_default", skip_serializing_if = "is_true")]
    pub enabled: bool,
}

impl From<RuleKind> for RuleSpec {
    fn from(kind: RuleKind) -> Self {
        Self { kind, message: None, enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum RuleKind {
    Empty,
    Required,
    Number,
    Integer,
    #[serde(rename = "string")]
    Str,
    ObjectLike,
    Object,
    Array,
    DateTime,
    Email,
    Url,
    Length { value: usize },
    MinLength { value: usize },
    MaxLength { value: usize },
    Equals { value: Value },
    NotEquals { value: Value },
    Min { value: Value },
    Max { value: Value },
    Pattern { value: String },
    InList { value: Vec<Value> },
    NotInList { value: Vec<Value> },
    MaxTimesInList { value: Vec<Value>, times: usize },
    MinDateTime { value: Value },
    MaxDateTime { value: Value },
    And { rules: Vec<RuleSpec> },
    Or { rules: Vec<RuleSpec> },
}

impl RuleKind {
    /// Rule name as registered on the node.
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Empty => "empty",
            RuleKind::Required => "required",
            RuleKind::Number => "number",
            RuleKind::Integer => "integer",
            RuleKind::Str => "string",
            RuleKind::ObjectLike => "objectLike",
            RuleKind::Object => "object",
            RuleKind::Array => "array",
            RuleKind::DateTime => "dateTime",
            RuleKind::Email => "email",
            RuleKind::Url => "url",
            RuleKind::Length { .. } => "length",
            RuleKind::MinLength { .. } => "minLength",
            RuleKind::MaxLength { .. } => "maxLength",
            RuleKind::Equals { .. } => "equals",
            RuleKind::NotEquals { .. } => "notEquals",
            RuleKind::Min { .. } => "min",
            RuleKind::Max { .. } => "max",
            RuleKind::Pattern { .. } => "pattern",
            RuleKind::InList { .. } => "inList",
            RuleKind::NotInList { .. } => "notInList",
            RuleKind::MaxTimesInList { .. } => "maxTimesInList",
            RuleKind::MinDateTime { .. } => "minDateTime",
            RuleKind::MaxDateTime { .. } => "maxDateTime",
            RuleKind::And { .. } => "and",
            RuleKind::Or { .. } => "or",
        }
    }

    pub fn predicate(&self) -> Result<Predicate> {
        let predicate = match self {
            RuleKind::Empty => validators::boxed(validators::empty),
            RuleKind::Required => validators::boxed(validators::required),
            RuleKind::Number => validators::boxed(validators::number),
            RuleKind::Integer => validators::boxed(validators::integer),
            RuleKind::Str => validators::boxed(validators::string),
            RuleKind::ObjectLike => validators::boxed(validators::object_like),
            RuleKind::Object => validators::boxed(validators::object),
            RuleKind::Array => validators::boxed(validators::array),
            RuleKind::DateTime => validators::boxed(validators::date_time),
            RuleKind::Email => validators::boxed(validators::email),
            RuleKind::Url => validators::boxed(validators::url),
            RuleKind::Length { value } => validators::length(*value),
            RuleKind::MinLength { value } => validators::min_length(*value),
            RuleKind::MaxLength { value } => validators::max_length(*value),
            RuleKind::Equals { value } => validators::equals(value.clone()),
            RuleKind::NotEquals { value } => validators::not_equals(value.clone()),
            RuleKind::Min { value } => validators::min(value.clone()),
            RuleKind::Max { value } => validators::max(value.clone()),
            RuleKind::Pattern { value } => validators::try_pattern(value.as_str())?,
            RuleKind::InList { value } => validators::in_list(value.clone()),
            RuleKind::NotInList { value } => validators::not_in_list(value.clone()),
            RuleKind::MaxTimesInList { value, times } => {
                validators::max_times_in_list(value.clone(), *times)
            }
            RuleKind::MinDateTime { value } => validators::min_date_time(value.clone()),
            RuleKind::MaxDateTime { value } => validators::max_date_time(value.clone()),
            RuleKind::And { rules } => validators::and(nested(rules)?),
            RuleKind::Or { rules } => validators::or(nested(rules)?),
        };
        Ok(predicate)
    }
}

// Disabled entries drop out of and/or; their messages are not used.
fn nested(rules: &[RuleSpec]) -> Result<Vec<Predicate>> {
    rules
        .iter()
        .filter(|spec| spec.enabled)
        .map(|spec| spec.kind.predicate())
        .collect()
}

impl RuleSpec {
    fn apply(&self, v: Validation) -> Result<Validation> {
        let mut v = v.rule(self.kind.name(), self.kind.predicate()?);
        if let Some(message) = &self.message {
            v = v.try_msg(message.as_str())?;
        }
        if !self.enabled {
            v = v.try_rule_enabled(false)?;
        }
        Ok(v)
    }
}

impl Schema {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Build the described node. Fails on an invalid `pattern` anywhere in
    /// the document.
    pub fn build(&self) -> Result<Validation> {
        let mut v = Validation::new().enabled(self.enabled);
        for spec in &self.rules {
            v = spec.apply(v)?;
        }
        for (name, field) in &self.fields {
            v = v.add_field(name.as_str(), field.build()?);
        }
        for (name, child) in &self.children {
            v = v.add_child(name.as_str(), child.build()?);
        }
        if let Some(every) = &self.every {
            v = v.add_every_template(every.schema.build()?, every.key.clone().map(KeyGetter::from));
        }
        if let Some(some) = &self.some {
            v = v.add_some_template(some.schema.build()?, some.key.clone().map(KeyGetter::from));
        }
        Ok(v)
    }
}

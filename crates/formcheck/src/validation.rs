//! The [`Validation`] builder.
//!
//! A `Validation` is a detached description of one node: its named rules,
//! its fields, children, and every/some templates. Nothing is tested until it
//! is mounted into a [`ValidationTree`](crate::ValidationTree).

use crate::error::{Result, ValidationError};
use crate::path::Key;
use crate::rule::{Enabled, KeyGetter, Message, Rule};
use crate::validators::{self, ListSource, PatternSource, Predicate};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Produces a fresh node description for each every/some instance.
pub type Factory = Rc<dyn Fn() -> Validation>;

#[derive(Clone)]
pub(crate) struct Template {
    pub(crate) factory: Factory,
    pub(crate) key_getter: Option<KeyGetter>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("key_getter", &self.key_getter)
            .finish_non_exhaustive()
    }
}

/// Plain constructor input for [`Validation::from_options`].
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    pub rules: Vec<(String, Rule)>,
    pub fields: Vec<(String, ValidationOptions)>,
    pub children: Vec<(String, ValidationOptions)>,
}

impl From<ValidationOptions> for Validation {
    fn from(options: ValidationOptions) -> Self {
        Validation::from_options(options)
    }
}

/// Builder for one validation node.
///
/// Every method consumes and returns the builder, so a whole form reads as
/// one expression:
///
/// ```
/// use formcheck::{Validation, ValidationTree};
/// use serde_json::json;
///
/// let form = Validation::new()
///     .add_field("name", Validation::new().required().max_length(10))
///     .add_field("age", Validation::new().integer().min(0));
///
/// let mut tree = ValidationTree::new(form);
/// assert!(tree.test_root(&json!({ "name": "Ada", "age": 36 })));
/// assert!(!tree.test_root(&json!({ "name": "", "age": -1 })));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub(crate) rules: Vec<(String, Rule)>,
    pub(crate) last_rule: Option<usize>,
    pub(crate) enabled: Enabled,
    pub(crate) fields: Vec<(String, Validation)>,
    pub(crate) children: Vec<(String, Validation)>,
    pub(crate) every: Option<Template>,
    pub(crate) some: Option<Template>,
}

fn upsert<T>(entries: &mut Vec<(String, T)>, name: String, item: T) -> usize {
    match entries.iter().position(|(existing, _)| *existing == name) {
        Some(index) => {
            entries[index].1 = item;
            index
        }
        None => {
            entries.push((name, item));
            entries.len() - 1
        }
    }
}

impl Validation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: ValidationOptions) -> Self {
        let ValidationOptions { rules, fields, children } = options;
        let mut v = Self::new();
        for (name, rule) in rules {
            upsert(&mut v.rules, name, rule);
        }
        v.fields = fields.into_iter().map(|(name, o)| (name, o.into())).collect();
        v.children = children.into_iter().map(|(name, o)| (name, o.into())).collect();
        v
    }

    /// Register `rule` under `name`, replacing a rule of the same name in
    /// place. The rule becomes the target of [`msg`](Self::msg) and
    /// [`rule_enabled`](Self::rule_enabled).
    pub fn add_rule(mut self, name: impl Into<String>, rule: Rule) -> Self {
        self.last_rule = Some(upsert(&mut self.rules, name.into(), rule));
        self
    }

    /// Register a predicate whose error message is its name.
    pub fn rule(self, name: impl Into<String>, predicate: impl Fn(&Value) -> bool + 'static) -> Self {
        let name = name.into();
        let rule = Rule::new(predicate, name.as_str());
        self.add_rule(name, rule)
    }

    /// Register a check that also receives the full path of the tested value.
    pub fn rule_with_path(
        self,
        name: impl Into<String>,
        validator: impl Fn(&Value, &[Key]) -> bool + 'static,
    ) -> Self {
        let name = name.into();
        let rule = Rule::with_path(validator, name.as_str());
        self.add_rule(name, rule)
    }

    pub fn rule_with_message(
        self,
        name: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + 'static,
        message: impl Into<Message>,
    ) -> Self {
        self.add_rule(name, Rule::new(predicate, message))
    }

    fn last_rule_mut(&mut self) -> Result<&mut Rule> {
        let index = self.last_rule.ok_or(ValidationError::NoRule)?;
        self.rules
            .get_mut(index)
            .map(|(_, rule)| rule)
            .ok_or(ValidationError::NoRule)
    }

    /// Set the message of the most recently added rule.
    pub fn try_msg(mut self, message: impl Into<Message>) -> Result<Self> {
        self.last_rule_mut()?.message = message.into();
        Ok(self)
    }

    /// Set the message of the most recently added rule.
    ///
    /// # Panics
    ///
    /// Panics with "last rule is not set" when no rule has been added yet.
    /// Use [`try_msg`](Self::try_msg) to get the error instead.
    pub fn msg(self, message: impl Into<Message>) -> Self {
        match self.try_msg(message) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    /// Gate the most recently added rule.
    pub fn try_rule_enabled(mut self, enabled: impl Into<Enabled>) -> Result<Self> {
        self.last_rule_mut()?.enabled = enabled.into();
        Ok(self)
    }

    /// Gate the most recently added rule.
    ///
    /// # Panics
    ///
    /// Panics with "last rule is not set" when no rule has been added yet.
    pub fn rule_enabled(self, enabled: impl Into<Enabled>) -> Self {
        match self.try_rule_enabled(enabled) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    /// Gate the whole node. A disabled node records no errors and skips its
    /// fields, children, and every/some instances.
    pub fn enabled(mut self, enabled: impl Into<Enabled>) -> Self {
        self.enabled = enabled.into();
        self
    }

    /// Attach a field tested against `value[name]`.
    pub fn add_field(mut self, name: impl Into<String>, field: Validation) -> Self {
        upsert(&mut self.fields, name.into(), field);
        self
    }

    pub fn add_fields<N: Into<String>>(self, fields: impl IntoIterator<Item = (N, Validation)>) -> Self {
        fields
            .into_iter()
            .fold(self, |v, (name, field)| v.add_field(name, field))
    }

    /// Attach a child tested against the same value as this node.
    pub fn add_child(mut self, name: impl Into<String>, child: Validation) -> Self {
        upsert(&mut self.children, name.into(), child);
        self
    }

    pub fn add_children<N: Into<String>>(
        self,
        children: impl IntoIterator<Item = (N, Validation)>,
    ) -> Self {
        children
            .into_iter()
            .fold(self, |v, (name, child)| v.add_child(name, child))
    }

    /// Test every element of an array or object value against a node built
    /// by `factory`. Elements are keyed by position.
    pub fn add_every(mut self, factory: impl Fn() -> Validation + 'static) -> Self {
        self.every = Some(Template { factory: Rc::new(factory), key_getter: None });
        self
    }

    /// Like [`add_every`](Self::add_every), keyed by `key`.
    pub fn add_every_by(
        mut self,
        factory: impl Fn() -> Validation + 'static,
        key: impl Into<KeyGetter>,
    ) -> Self {
        self.every = Some(Template { factory: Rc::new(factory), key_getter: Some(key.into()) });
        self
    }

    /// Like [`add_every`](Self::add_every), cloning `template` per element.
    pub fn add_every_template(mut self, template: Validation, key: Option<KeyGetter>) -> Self {
        self.every = Some(Template {
            factory: Rc::new(move || template.clone()),
            key_getter: key,
        });
        self
    }

    /// Require at least one element of an array or object value to pass a
    /// node built by `factory`. An empty collection does not pass.
    pub fn add_some(mut self, factory: impl Fn() -> Validation + 'static) -> Self {
        self.some = Some(Template { factory: Rc::new(factory), key_getter: None });
        self
    }

    pub fn add_some_by(
        mut self,
        factory: impl Fn() -> Validation + 'static,
        key: impl Into<KeyGetter>,
    ) -> Self {
        self.some = Some(Template { factory: Rc::new(factory), key_getter: Some(key.into()) });
        self
    }

    pub fn add_some_template(mut self, template: Validation, key: Option<KeyGetter>) -> Self {
        self.some = Some(Template {
            factory: Rc::new(move || template.clone()),
            key_getter: key,
        });
        self
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(name, _)| name.as_str())
    }

    // Shortcuts: each registers the predicate of the same name from
    // `validators`, named in camelCase.

    pub fn empty(self) -> Self {
        self.rule("empty", validators::empty)
    }

    pub fn required(self) -> Self {
        self.rule("required", validators::required)
    }

    pub fn number(self) -> Self {
        self.rule("number", validators::number)
    }

    pub fn integer(self) -> Self {
        self.rule("integer", validators::integer)
    }

    pub fn string(self) -> Self {
        self.rule("string", validators::string)
    }

    pub fn object_like(self) -> Self {
        self.rule("objectLike", validators::object_like)
    }

    pub fn object(self) -> Self {
        self.rule("object", validators::object)
    }

    pub fn array(self) -> Self {
        self.rule("array", validators::array)
    }

    pub fn date_time(self) -> Self {
        self.rule("dateTime", validators::date_time)
    }

    pub fn email(self) -> Self {
        self.rule("email", validators::email)
    }

    pub fn url(self) -> Self {
        self.rule("url", validators::url)
    }

    pub fn length(self, len: usize) -> Self {
        self.rule("length", validators::length(len))
    }

    pub fn min_length(self, len: usize) -> Self {
        self.rule("minLength", validators::min_length(len))
    }

    pub fn max_length(self, len: usize) -> Self {
        self.rule("maxLength", validators::max_length(len))
    }

    pub fn equals(self, expected: impl Into<Value>) -> Self {
        self.rule("equals", validators::equals(expected))
    }

    pub fn not_equals(self, expected: impl Into<Value>) -> Self {
        self.rule("notEquals", validators::not_equals(expected))
    }

    pub fn min(self, bound: impl Into<Value>) -> Self {
        self.rule("min", validators::min(bound))
    }

    pub fn max(self, bound: impl Into<Value>) -> Self {
        self.rule("max", validators::max(bound))
    }

    pub fn pattern(self, re: Regex) -> Self {
        self.rule("pattern", validators::pattern(re))
    }

    pub fn try_pattern(self, source: impl Into<PatternSource>) -> Result<Self> {
        Ok(self.rule("pattern", validators::try_pattern(source)?))
    }

    pub fn in_list(self, list: impl Into<ListSource>) -> Self {
        self.rule("inList", validators::in_list(list))
    }

    pub fn not_in_list(self, list: impl Into<ListSource>) -> Self {
        self.rule("notInList", validators::not_in_list(list))
    }

    pub fn max_times_in_list(self, list: impl Into<ListSource>, max_times: usize) -> Self {
        self.rule("maxTimesInList", validators::max_times_in_list(list, max_times))
    }

    pub fn min_date_time(self, bound: impl Into<Value>) -> Self {
        self.rule("minDateTime", validators::min_date_time(bound))
    }

    pub fn max_date_time(self, bound: impl Into<Value>) -> Self {
        self.rule("maxDateTime", validators::max_date_time(bound))
    }

    pub fn and(self, predicates: Vec<Predicate>) -> Self {
        self.rule("and", validators::and(predicates))
    }

    pub fn or(self, predicates: Vec<Predicate>) -> Self {
        self.rule("or", validators::or(predicates))
    }
}

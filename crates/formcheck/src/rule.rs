use crate::path::{Key, Path};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// A rule check that can also see where in the tested value it runs.
pub type Validator = Rc<dyn Fn(&Value, &[Key]) -> bool>;

/// Error text for a failed rule: fixed, or computed from the failing value.
#[derive(Clone)]
pub enum Message {
    Literal(String),
    Computed(Rc<dyn Fn(&Value) -> String>),
}

impl Message {
    pub fn computed(f: impl Fn(&Value) -> String + 'static) -> Self {
        Message::Computed(Rc::new(f))
    }

    pub fn resolve(&self, value: &Value) -> String {
        match self {
            Message::Literal(text) => text.clone(),
            Message::Computed(f) => f(value),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Message::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Literal(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Literal(text)
    }
}

/// Whether a rule or a whole node takes part in a test.
#[derive(Clone)]
pub enum Enabled {
    Always(bool),
    When(Validator),
}

impl Enabled {
    /// Enabled when `f(value, full_path)` holds.
    pub fn when(f: impl Fn(&Value, &[Key]) -> bool + 'static) -> Self {
        Enabled::When(Rc::new(f))
    }

    pub fn check(&self, value: &Value, path: &[Key]) -> bool {
        match self {
            Enabled::Always(on) => *on,
            Enabled::When(f) => f(value, path),
        }
    }
}

impl Default for Enabled {
    fn default() -> Self {
        Enabled::Always(true)
    }
}

impl From<bool> for Enabled {
    fn from(on: bool) -> Self {
        Enabled::Always(on)
    }
}

impl fmt::Debug for Enabled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Enabled::Always(on) => f.debug_tuple("Always").field(on).finish(),
            Enabled::When(_) => f.write_str("When(..)"),
        }
    }
}

/// Identity of a collection element for every/some instances.
///
/// Without a key getter an element is keyed by its position, so validation
/// state follows the index. Supply a key getter when state must follow the
/// element across reordering and removal.
#[derive(Clone)]
pub enum KeyGetter {
    /// Read the named property of the element.
    Field(String),
    Func(Rc<dyn Fn(&Value) -> Key>),
}

impl KeyGetter {
    pub fn func(f: impl Fn(&Value) -> Key + 'static) -> Self {
        KeyGetter::Func(Rc::new(f))
    }

    pub fn key_of(&self, item: &Value) -> Key {
        match self {
            KeyGetter::Field(name) => Key::from_value(item.get(name.as_str()).unwrap_or(&Value::Null)),
            KeyGetter::Func(f) => f(item),
        }
    }
}

impl From<&str> for KeyGetter {
    fn from(name: &str) -> Self {
        KeyGetter::Field(name.to_string())
    }
}

impl From<String> for KeyGetter {
    fn from(name: String) -> Self {
        KeyGetter::Field(name)
    }
}

impl fmt::Debug for KeyGetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyGetter::Field(name) => f.debug_tuple("Field").field(name).finish(),
            KeyGetter::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// A named check registered on a node.
#[derive(Clone)]
pub struct Rule {
    pub(crate) validator: Validator,
    pub(crate) message: Message,
    pub(crate) enabled: Enabled,
}

impl Rule {
    /// A rule over the value alone.
    pub fn new(predicate: impl Fn(&Value) -> bool + 'static, message: impl Into<Message>) -> Self {
        Self::with_path(move |value, _| predicate(value), message)
    }

    /// A rule that also receives the full path of the tested value.
    pub fn with_path(
        validator: impl Fn(&Value, &[Key]) -> bool + 'static,
        message: impl Into<Message>,
    ) -> Self {
        Self {
            validator: Rc::new(validator),
            message: message.into(),
            enabled: Enabled::default(),
        }
    }

    pub fn when(mut self, enabled: impl Into<Enabled>) -> Self {
        self.enabled = enabled.into();
        self
    }

    pub(crate) fn failure(&self, value: &Value, path: &[Key]) -> Option<String> {
        if !self.enabled.check(value, path) || (self.validator)(value, path) {
            return None;
        }
        Some(self.message.resolve(value))
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("message", &self.message)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// One failed rule, as seen from the node holding it.
///
/// `path` leads from that node down to the node whose rule failed, and
/// `from_key` is the key of the child it arrived through (or the failing
/// node's own key when it failed locally).
///
/// # JSON shape
///
/// ```json
/// { "rule": "maxLength", "path": ["field2"], "message": "maxLength", "fromKey": "field2" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub rule: String,
    pub path: Path,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_key: Option<Key>,
}

impl FieldError {
    /// The same error seen one level up, through the child keyed `key`.
    pub(crate) fn through(&self, key: Option<&Key>) -> Self {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend(key.cloned());
        path.extend(self.path.iter().cloned());
        Self {
            rule: self.rule.clone(),
            path,
            message: self.message.clone(),
            from_key: key.cloned(),
        }
    }
}

//! The predicate library.
//!
//! Every predicate answers one question about a single value. Values that are
//! not present (`null` or the empty string) pass every check except
//! [`required`], so "is it there at all" stays the concern of a separate rule.

use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::LazyLock;

/// A boxed single-value predicate.
pub type Predicate = Box<dyn Fn(&Value) -> bool>;

/// Equality used by the comparison and membership predicates.
pub type EqualFn = Rc<dyn Fn(&Value, &Value) -> bool>;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
    )
    .unwrap()
});

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(https?://)?(www\.)?[-a-zA-Z0-9@:%._+~#=]{2,256}\.[a-z]{2,4}\b([-a-zA-Z0-9@:%_+.~#?&/=]*)",
    )
    .unwrap()
});

/// Box a predicate so it can sit in a list next to other predicates.
pub fn boxed(predicate: impl Fn(&Value) -> bool + 'static) -> Predicate {
    Box::new(predicate)
}

fn default_equal() -> EqualFn {
    Rc::new(|a: &Value, b: &Value| a == b)
}

fn is_not_present(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn sized_len(v: &Value) -> Option<usize> {
    match v {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

// ── Presence and type ────────────────────────────────────────────────

/// Not present, whitespace only, or an empty array/object.
pub fn empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

pub fn required(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

pub fn number(v: &Value) -> bool {
    is_not_present(v) || v.as_f64().is_some_and(f64::is_finite)
}

/// An integral number inside the signed 32-bit range.
pub fn integer(v: &Value) -> bool {
    if is_not_present(v) {
        return true;
    }
    let Some(n) = v.as_f64() else {
        return false;
    };
    n.floor() == n && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX)
}

pub fn string(v: &Value) -> bool {
    is_not_present(v) || v.is_string()
}

/// An object or an array.
pub fn object_like(v: &Value) -> bool {
    is_not_present(v) || v.is_object() || v.is_array()
}

pub fn object(v: &Value) -> bool {
    is_not_present(v) || v.is_object()
}

pub fn array(v: &Value) -> bool {
    is_not_present(v) || v.is_array()
}

/// A string or epoch-millisecond number that names a real instant.
pub fn date_time(v: &Value) -> bool {
    is_not_present(v) || parse_timestamp(v).is_some()
}

pub fn email(v: &Value) -> bool {
    is_not_present(v) || matches_static(&EMAIL, v)
}

pub fn url(v: &Value) -> bool {
    is_not_present(v) || matches_static(&URL, v)
}

fn matches_static(re: &Regex, v: &Value) -> bool {
    v.as_str().is_some_and(|s| re.is_match(s))
}

// ── Size ─────────────────────────────────────────────────────────────

/// Exact length of a string (in characters) or an array.
pub fn length(len: usize) -> Predicate {
    Box::new(move |v| is_not_present(v) || sized_len(v) == Some(len))
}

pub fn min_length(len: usize) -> Predicate {
    Box::new(move |v| is_not_present(v) || sized_len(v).is_some_and(|n| n >= len))
}

pub fn max_length(len: usize) -> Predicate {
    Box::new(move |v| is_not_present(v) || sized_len(v).is_some_and(|n| n <= len))
}

// ── Comparison ───────────────────────────────────────────────────────

/// Deep equality against `expected`.
///
/// A `null` reference turns this into a strict identity check, so
/// `equals(Value::Null)` rejects every non-null value.
pub fn equals(expected: impl Into<Value>) -> Predicate {
    equals_with(expected, default_equal())
}

pub fn equals_with(expected: impl Into<Value>, equal: EqualFn) -> Predicate {
    let expected = expected.into();
    Box::new(move |v| {
        if expected.is_null() {
            v.is_null()
        } else {
            is_not_present(v) || equal(v, &expected)
        }
    })
}

pub fn not_equals(expected: impl Into<Value>) -> Predicate {
    not_equals_with(expected, default_equal())
}

pub fn not_equals_with(expected: impl Into<Value>, equal: EqualFn) -> Predicate {
    let expected = expected.into();
    Box::new(move |v| {
        if expected.is_null() {
            !v.is_null()
        } else {
            is_not_present(v) || !equal(v, &expected)
        }
    })
}

fn compare(v: &Value, bound: &Value) -> Option<Ordering> {
    match (v, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Lower bound for numbers, or for strings compared lexically.
pub fn min(bound: impl Into<Value>) -> Predicate {
    let bound = bound.into();
    Box::new(move |v| {
        is_not_present(v)
            || is_not_present(&bound)
            || compare(v, &bound).is_some_and(Ordering::is_ge)
    })
}

pub fn max(bound: impl Into<Value>) -> Predicate {
    let bound = bound.into();
    Box::new(move |v| {
        is_not_present(v)
            || is_not_present(&bound)
            || compare(v, &bound).is_some_and(Ordering::is_le)
    })
}

// ── Pattern ──────────────────────────────────────────────────────────

/// A pattern given either as source text or already compiled.
#[derive(Debug, Clone)]
pub enum PatternSource {
    Text(String),
    Compiled(Regex),
}

impl PatternSource {
    pub fn compile(self) -> Result<Regex> {
        match self {
            PatternSource::Text(text) => Ok(Regex::new(&text)?),
            PatternSource::Compiled(re) => Ok(re),
        }
    }
}

impl From<&str> for PatternSource {
    fn from(s: &str) -> Self {
        PatternSource::Text(s.to_string())
    }
}

impl From<String> for PatternSource {
    fn from(s: String) -> Self {
        PatternSource::Text(s)
    }
}

impl From<Regex> for PatternSource {
    fn from(re: Regex) -> Self {
        PatternSource::Compiled(re)
    }
}

/// Strings containing a match of `re` (search, not full match).
pub fn pattern(re: Regex) -> Predicate {
    Box::new(move |v| is_not_present(v) || v.as_str().is_some_and(|s| re.is_match(s)))
}

/// [`pattern`] from source text or a compiled expression.
pub fn try_pattern(source: impl Into<PatternSource>) -> Result<Predicate> {
    Ok(pattern(source.into().compile()?))
}

// ── Membership ───────────────────────────────────────────────────────

/// The list a membership predicate checks against.
///
/// A live source is called on every check, which lets a rule look at data
/// that changes between tests (for example every sibling in a larger form).
#[derive(Clone)]
pub enum ListSource {
    Static(Vec<Value>),
    Live(Rc<dyn Fn() -> Vec<Value>>),
}

impl ListSource {
    pub fn live(getter: impl Fn() -> Vec<Value> + 'static) -> Self {
        ListSource::Live(Rc::new(getter))
    }

    fn items(&self) -> Cow<'_, [Value]> {
        match self {
            ListSource::Static(items) => Cow::Borrowed(items),
            ListSource::Live(getter) => Cow::Owned(getter()),
        }
    }
}

impl std::fmt::Debug for ListSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListSource::Static(items) => f.debug_tuple("Static").field(items).finish(),
            ListSource::Live(_) => f.write_str("Live(..)"),
        }
    }
}

impl From<Vec<Value>> for ListSource {
    fn from(items: Vec<Value>) -> Self {
        ListSource::Static(items)
    }
}

impl<const N: usize> From<[Value; N]> for ListSource {
    fn from(items: [Value; N]) -> Self {
        ListSource::Static(items.to_vec())
    }
}

pub fn in_list(list: impl Into<ListSource>) -> Predicate {
    in_list_with(list, default_equal())
}

pub fn in_list_with(list: impl Into<ListSource>, equal: EqualFn) -> Predicate {
    let list = list.into();
    Box::new(move |v| is_not_present(v) || list.items().iter().any(|item| equal(item, v)))
}

pub fn not_in_list(list: impl Into<ListSource>) -> Predicate {
    not_in_list_with(list, default_equal())
}

pub fn not_in_list_with(list: impl Into<ListSource>, equal: EqualFn) -> Predicate {
    let list = list.into();
    Box::new(move |v| is_not_present(v) || !list.items().iter().any(|item| equal(item, v)))
}

/// The value occurs at most `max_times` times in the list.
pub fn max_times_in_list(list: impl Into<ListSource>, max_times: usize) -> Predicate {
    max_times_in_list_with(list, max_times, default_equal())
}

pub fn max_times_in_list_with(
    list: impl Into<ListSource>,
    max_times: usize,
    equal: EqualFn,
) -> Predicate {
    let list = list.into();
    Box::new(move |v| {
        if is_not_present(v) {
            return true;
        }
        let mut times = 0;
        list.items().iter().all(|item| {
            if equal(item, v) {
                times += 1;
            }
            times <= max_times
        })
    })
}

// ── Dates ────────────────────────────────────────────────────────────

/// Epoch milliseconds for a date-like value.
///
/// Numbers are taken as epoch milliseconds. Strings are tried as RFC 3339,
/// RFC 2822, a naive date-time (read as UTC), a bare date, and finally the
/// `Sun Jul 19 1987 12:30:50 GMT+1000 (...)` shape browsers print.
pub fn parse_timestamp(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp_millis());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%MZ",
        "%Y-%m-%d %H:%M:%S%.f",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
    }
    let head = s.split(" (").next().unwrap_or(s);
    DateTime::parse_from_str(head, "%a %b %d %Y %H:%M:%S GMT%z")
        .ok()
        .map(|dt| dt.timestamp_millis())
}

fn is_date_like(v: &Value) -> bool {
    v.is_string() || v.is_number()
}

/// Date-like values at or after `bound`. Values that are not date-like pass;
/// use [`date_time`] to reject them.
pub fn min_date_time(bound: impl Into<Value>) -> Predicate {
    let bound = parse_timestamp(&bound.into());
    Box::new(move |v| {
        if is_not_present(v) || !is_date_like(v) {
            return true;
        }
        matches!((parse_timestamp(v), bound), (Some(t), Some(b)) if t >= b)
    })
}

pub fn max_date_time(bound: impl Into<Value>) -> Predicate {
    let bound = parse_timestamp(&bound.into());
    Box::new(move |v| {
        if is_not_present(v) || !is_date_like(v) {
            return true;
        }
        matches!((parse_timestamp(v), bound), (Some(t), Some(b)) if t <= b)
    })
}

// ── Combinators ──────────────────────────────────────────────────────

/// All predicates pass.
pub fn and(predicates: Vec<Predicate>) -> Predicate {
    Box::new(move |v| predicates.iter().all(|p| p(v)))
}

/// At least one predicate passes.
pub fn or(predicates: Vec<Predicate>) -> Predicate {
    Box::new(move |v| predicates.iter().any(|p| p(v)))
}

/// Variadic form of [`and`]: `and![required, max_length(5)]`.
#[macro_export]
macro_rules! and {
    ($($predicate:expr),* $(,)?) => {
        $crate::validators::and(vec![$($crate::validators::boxed($predicate)),*])
    };
}

/// Variadic form of [`or`].
#[macro_export]
macro_rules! or {
    ($($predicate:expr),* $(,)?) => {
        $crate::validators::or(vec![$($crate::validators::boxed($predicate)),*])
    };
}

/// Lift a predicate over every array element or object value.
/// Anything that is not a collection passes.
pub fn every(predicate: impl Fn(&Value) -> bool + 'static) -> Predicate {
    Box::new(move |v| match v {
        Value::Array(items) => items.iter().all(&predicate),
        Value::Object(map) => map.values().all(&predicate),
        _ => true,
    })
}

/// Lift a predicate so that at least one element or object value passes.
/// Anything that is not a collection passes.
pub fn some(predicate: impl Fn(&Value) -> bool + 'static) -> Predicate {
    Box::new(move |v| match v {
        Value::Array(items) => items.iter().any(&predicate),
        Value::Object(map) => map.values().any(&predicate),
        _ => true,
    })
}

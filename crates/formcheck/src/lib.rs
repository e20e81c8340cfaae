#![doc = include_str!("../README.md")]

mod error;
mod rule;
mod schema;
mod tree;
mod validation;

pub mod path;
pub mod validators;

pub use crate::error::{Result, ValidationError};
pub use crate::path::{Key, Path, compile_path};
pub use crate::rule::{Enabled, FieldError, KeyGetter, Message, Rule, Validator};
pub use crate::schema::{Aggregation, RuleKind, RuleSpec, Schema};
pub use crate::tree::{NodeId, NodeRef, ValidationTree};
pub use crate::validation::{Factory, Validation, ValidationOptions};
pub use crate::validators::{EqualFn, ListSource, PatternSource, Predicate};

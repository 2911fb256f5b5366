//! Message filters used to narrow the candidate list before a message
//! reference is applied.
//!
//! A filter is evaluated once per message against a fresh copy of its base
//! scope with that message's fields bound on top, so nothing one evaluation
//! binds can leak into the next.

pub mod expr;

use futures::future::{self, BoxFuture};
use serde_json::{Map, Value};

use crate::error::Result;

pub use expr::ExpressionFilter;

/// Bindings visible to one filter evaluation
pub type FilterScope = Map<String, Value>;

/// Result of running a filter against one message
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub pipe: Value,
}

impl FilterOutcome {
    pub fn new(pipe: Value) -> Self {
        Self { pipe }
    }

    /// Whether the message is kept
    pub fn is_truthy(&self) -> bool {
        is_truthy(&self.pipe)
    }
}

/// Truthiness of a filter result.
///
/// Script hosts usually hand results back as text, so the strings
/// `"false"` and `"0"` count as false alongside the empty string.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Predicate over message bindings. Evaluation may suspend.
pub trait MessageFilter: Send + Sync {
    /// Scope every evaluation starts from, before message fields are bound
    fn base_scope(&self) -> FilterScope {
        Map::new()
    }

    fn evaluate<'a>(&'a self, scope: FilterScope) -> BoxFuture<'a, Result<FilterOutcome>>;
}

/// Filter backed by a plain closure
pub struct FnFilter<F> {
    base: FilterScope,
    predicate: F,
}

impl<F> FnFilter<F>
where
    F: Fn(&FilterScope) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self {
            base: Map::new(),
            predicate,
        }
    }

    pub fn with_base(mut self, base: FilterScope) -> Self {
        self.base = base;
        self
    }
}

impl<F> MessageFilter for FnFilter<F>
where
    F: Fn(&FilterScope) -> bool + Send + Sync,
{
    fn base_scope(&self) -> FilterScope {
        self.base.clone()
    }

    fn evaluate<'a>(&'a self, scope: FilterScope) -> BoxFuture<'a, Result<FilterOutcome>> {
        let keep = (self.predicate)(&scope);
        Box::pin(future::ready(Ok(FilterOutcome::new(Value::Bool(keep)))))
    }
}

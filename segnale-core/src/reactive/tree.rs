//! Signal Trees
//!
//! A signal tree decomposes a structured value into independent cells, one
//! per field, so that writing one field only invalidates the computations
//! that read that field.
//!
//! # Decomposition
//!
//! The value is first converted to JSON with `serde`. Then:
//!
//! - a JSON object becomes an [`SignalTree::Object`] node whose fields are
//!   decomposed recursively by the same rule;
//! - everything else (arrays, strings, numbers, booleans, null) becomes a
//!   single [`SignalTree::Cell`].
//!
//! Arrays are deliberately not split: replacing an element means writing
//! the whole array cell.
//!
//! Fields keep their declaration order.
//!
//! The shape is fixed at creation. Writes go to leaf cells; a leaf may hold
//! any JSON value afterwards, including an object, but that object is then
//! one cell.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::runtime::Runtime;
use super::signal::Signal;
use crate::error::{ReactiveError, Result};

/// A structured value decomposed into per-field signals.
///
/// # Example
///
/// ```
/// use segnale_core::Runtime;
/// use serde_json::json;
///
/// let runtime = Runtime::new();
/// let state = runtime
///     .create_signal_tree(&json!({ "user": { "name": "Ada", "age": 36 } }))
///     .unwrap();
///
/// let name = state.cell("user.name").unwrap();
/// assert_eq!(name.get(), json!("Ada"));
///
/// state.set("user.age", &37).unwrap();
/// assert_eq!(state.read_as::<u32>("user.age").unwrap(), 37);
/// ```
#[derive(Debug, Clone)]
pub enum SignalTree {
    /// A single reactive value.
    Cell(Signal<Value>),
    /// A set of named subtrees.
    Object(IndexMap<String, SignalTree>),
}

impl SignalTree {
    /// Decompose an already converted JSON value.
    pub fn from_value(runtime: &Runtime, value: Value) -> Self {
        match value {
            Value::Object(fields) => SignalTree::Object(
                fields
                    .into_iter()
                    .map(|(key, field)| (key, SignalTree::from_value(runtime, field)))
                    .collect(),
            ),
            other => SignalTree::Cell(Signal::new(runtime, other)),
        }
    }

    /// The child at `key`, if this is an object with such a field.
    pub fn get(&self, key: &str) -> Option<&SignalTree> {
        match self {
            SignalTree::Object(fields) => fields.get(key),
            SignalTree::Cell(_) => None,
        }
    }

    /// The subtree at a dotted `path` (`"user.address.city"`). The empty
    /// path is the tree itself.
    pub fn at(&self, path: &str) -> Result<&SignalTree> {
        if path.is_empty() {
            return Ok(self);
        }
        path.split('.').try_fold(self, |node, key| {
            node.get(key)
                .ok_or_else(|| ReactiveError::MissingPath(path.to_owned()))
        })
    }

    /// The leaf cell at a dotted `path`.
    pub fn cell(&self, path: &str) -> Result<&Signal<Value>> {
        let node = self.at(path)?;
        node.as_cell().ok_or_else(|| ReactiveError::ShapeMismatch {
            path: path.to_owned(),
            expected: "a cell",
            found: node.kind(),
        })
    }

    pub fn as_cell(&self) -> Option<&Signal<Value>> {
        match self {
            SignalTree::Cell(signal) => Some(signal),
            SignalTree::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, SignalTree>> {
        match self {
            SignalTree::Object(fields) => Some(fields),
            SignalTree::Cell(_) => None,
        }
    }

    pub fn is_cell(&self) -> bool {
        matches!(self, SignalTree::Cell(_))
    }

    /// Field names of an object node; empty for a cell.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.as_object()
            .into_iter()
            .flat_map(|fields| fields.keys().map(String::as_str))
    }

    fn kind(&self) -> &'static str {
        match self {
            SignalTree::Cell(_) => "a cell",
            SignalTree::Object(_) => "an object",
        }
    }

    /// Reassemble the current value. Inside a computation every leaf read
    /// is tracked.
    pub fn snapshot_value(&self) -> Value {
        match self {
            SignalTree::Cell(signal) => signal.get(),
            SignalTree::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, field)| (key.clone(), field.snapshot_value()))
                    .collect(),
            ),
        }
    }

    /// Reassemble the current value as a `T`.
    pub fn snapshot<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.snapshot_value())?)
    }

    /// Read the leaf at `path` as a `T`. Tracked like [`Signal::get`].
    pub fn read_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.cell(path)?.with(Value::clone);
        Ok(serde_json::from_value(value)?)
    }

    /// Write `value` to the leaf at `path`. Equal values are a no-op, as
    /// with [`Signal::set`]; numbers compare by value, so `1.0` over `1`
    /// changes nothing.
    pub fn set<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<()> {
        let cell = self.cell(path)?;
        let next = serde_json::to_value(value)?;
        if cell.with_untracked(|current| same_value(current, &next)) {
            return Ok(());
        }
        cell.set(next);
        Ok(())
    }
}

/// `Value` equality, except that an integer and a float holding the same
/// number are equal.
fn same_value(current: &Value, next: &Value) -> bool {
    match (current, next) {
        (Value::Number(a), Value::Number(b)) if a.is_f64() || b.is_f64() => {
            a.as_f64() == b.as_f64()
        }
        _ => current == next,
    }
}

impl Runtime {
    /// Decompose `value` into a tree of per-field signals.
    pub fn create_signal_tree<T: Serialize + ?Sized>(&self, value: &T) -> Result<SignalTree> {
        let value = serde_json::to_value(value)?;
        Ok(SignalTree::from_value(self, value))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! FILENAME: formula-engine/src/value.rs
//! PURPOSE: The single dynamically tagged result category produced by
//! evaluating a formula.
//! CONTEXT: Every input, config value, row field, variable value, and
//! evaluation result is a `Value`. There is no implicit cross-variant
//! coercion except where the evaluator's `require_number`/`require_boolean`
//! helpers and the comparison operators define it.
//!
//! `Value` is `#[serde(untagged)]` so it (de)serializes as plain JSON —
//! a number, string, bool, array, object, or null — matching the shape a
//! CRUD/transport collaborator hands in (inputs, config, lookup rows) and
//! reads back (`test_formula`'s `value` field). `Boolean` is listed before
//! `Number` so untagged deserialization tries it first; a JSON `true`/
//! `false` only matches the `Boolean` arm, keeping Boolean and Number
//! distinct (a Boolean is never a Number here).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A record is ordered by key so that XLOOKUP's whole-row (`*`/`ALL`)
/// return is reproducible across repeated evaluations.
pub type Record = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Record(Record),
    Null,
}

impl Value {
    /// Classifies this value the way the `test` surface's `value_type`
    /// field does: `"boolean" | "number" | "text" | "object" | "array"`.
    /// `"error"` is not produced here — it is the caller's classification
    /// of a failed `evaluate` call, which never yields a `Value`.
    pub fn value_type(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Record(_) => "object",
            Value::List(_) => "array",
            Value::Null => "text",
        }
    }
}

/// Stringifies a value for structural/lexicographic comparison. Numbers
/// without a fractional part print without a trailing `.0`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Text(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Record(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Null => write!(f, ""),
        }
    }
}

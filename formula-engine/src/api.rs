//! FILENAME: formula-engine/src/api.rs
//! PURPOSE: Thin `validate`/`test` helpers over the core `parse`/`evaluate`
//! operations, matching the wire shape a transport collaborator exposes.
//! CONTEXT: `validate`/`test` are each a two-line fold over `parse()` /
//! `evaluate_formula(...)` that catches `FormulaError` and shapes the
//! response. That fold isn't transport logic, so it lives here as ordinary
//! library functions rather than being left for every collaborator to
//! reimplement. No HTTP framework or request struct is added.

use crate::context::{Context, EvaluationMeta};
use crate::evaluator::evaluate;
use crate::value::Value;
use formula_parser::error::FormulaError;
use formula_parser::parser::parse;

/// `value_type` classification for the `test` surface: `boolean`, `number`,
/// `text`, `object`, `array`, or `error` (on failure, with `value = null`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Boolean,
    Number,
    Text,
    Object,
    Array,
    Error,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::Text => "text",
            ValueType::Object => "object",
            ValueType::Array => "array",
            ValueType::Error => "error",
        }
    }

    fn of(value: &Value) -> ValueType {
        match value {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Number(_) => ValueType::Number,
            Value::Text(_) | Value::Null => ValueType::Text,
            Value::Record(_) => ValueType::Object,
            Value::List(_) => ValueType::Array,
        }
    }
}

/// `{ valid, errors[] }` — a pure syntactic check. `errors` holds at most
/// one element (a single error describing the first problem found).
#[derive(Debug, Clone)]
pub struct ValidateResult {
    pub valid: bool,
    pub errors: Vec<FormulaError>,
}

/// Parses `formula` only; never evaluates it. Mirrors the `validate`
/// operation.
pub fn validate(formula: &str) -> ValidateResult {
    match parse(formula) {
        Ok(_) => ValidateResult {
            valid: true,
            errors: Vec::new(),
        },
        Err(mut err) => {
            if err.formula.is_empty() {
                err.formula = formula.to_string();
            }
            ValidateResult {
                valid: false,
                errors: vec![err],
            }
        }
    }
}

/// `{ value, value_type, errors[] }` — parse + evaluate, classified for a
/// transport response. On error, `value` is `None` and `value_type` is
/// `Error`.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub value: Option<Value>,
    pub value_type: ValueType,
    pub errors: Vec<FormulaError>,
}

/// Parses and evaluates `formula` against `context`, tagging any failure
/// with `meta`. Mirrors the `test` operation's wire shape.
pub fn test_formula(formula: &str, context: &Context, meta: &EvaluationMeta) -> TestResult {
    match evaluate(formula, context, meta) {
        Ok(value) => {
            let value_type = ValueType::of(&value);
            TestResult {
                value: Some(value),
                value_type,
                errors: Vec::new(),
            }
        }
        Err(err) => TestResult {
            value: None,
            value_type: ValueType::Error,
            errors: vec![err],
        },
    }
}

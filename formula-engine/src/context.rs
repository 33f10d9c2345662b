//! FILENAME: formula-engine/src/context.rs
//! PURPOSE: The evaluator's input context, and the context-builder step that
//! normalizes a caller-supplied `Context` into the evaluator's internal view.
//! CONTEXT: Callers (the CRUD collaborator, or a test harness) build a
//! `Context` from whatever shape their store hands back — inputs, per-
//! model-code config values, variables with their formulas, previously
//! computed row results, and lookup tables. `Context::resolve` sorts lookup
//! rows ascending by key and indexes variables by name exactly once per
//! top-level `evaluate` call.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A variable's declared type. Advisory only — evaluation follows the
/// formula's (or direct value's) actual `Value`; callers may enforce type
/// agreement externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Boolean,
    Number,
    Text,
}

/// A named, typed formula (or direct value) addressed as `VAR.name`.
/// Exactly one of `formula` / `value` is present; the other is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    pub declared_type: VariableType,
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

/// One row of a lookup table: a numeric key and a mapping from column name
/// to value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRow {
    pub key: f64,
    pub values: HashMap<String, Value>,
}

/// The context an `evaluate` call runs against: inputs, config, variables,
/// previously computed row results, and lookup tables. Rows within a
/// lookup table need not be pre-sorted — `Context::resolve` sorts them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    #[serde(default)]
    pub config: HashMap<String, Value>,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub rows: HashMap<String, HashMap<String, Value>>,
    #[serde(default)]
    pub lookup_tables: HashMap<String, Vec<LookupRow>>,
}

/// Locator fields attached to any error raised while evaluating a formula.
/// Non-semantic: they exist purely so the caller can tell which build
/// family/row/field/variable a failure came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMeta {
    #[serde(default)]
    pub build_family_id: Option<String>,
    #[serde(default)]
    pub row_id: Option<String>,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub variable_name: Option<String>,
}

impl EvaluationMeta {
    pub fn with_variable_name(&self, variable_name: impl Into<String>) -> Self {
        EvaluationMeta {
            build_family_id: self.build_family_id.clone(),
            row_id: self.row_id.clone(),
            field_name: self.field_name.clone(),
            variable_name: Some(variable_name.into()),
        }
    }
}

/// The evaluator's internal view of a `Context`: variables indexed by name
/// for O(1) lookup, lookup table rows sorted ascending by key. Built once
/// per top-level `evaluate` call and discarded afterward — it never
/// survives across calls.
pub struct ResolvedContext<'a> {
    pub inputs: &'a HashMap<String, Value>,
    pub config: &'a HashMap<String, Value>,
    pub variables: HashMap<&'a str, &'a VariableDefinition>,
    pub rows: &'a HashMap<String, HashMap<String, Value>>,
    pub lookup_tables: HashMap<&'a str, Vec<&'a LookupRow>>,
}

impl Context {
    /// Normalizes this context into the evaluator's internal view: indexes
    /// variables by name and sorts each lookup table's rows ascending by
    /// key. Collaborators are responsible for variable-name and lookup-row
    /// key uniqueness; this just orders what it's
    /// given.
    pub fn resolve(&self) -> ResolvedContext<'_> {
        let variables = self
            .variables
            .iter()
            .map(|v| (v.name.as_str(), v))
            .collect();

        let lookup_tables = self
            .lookup_tables
            .iter()
            .map(|(name, rows)| {
                let mut refs: Vec<&LookupRow> = rows.iter().collect();
                refs.sort_by(|a, b| a.key.partial_cmp(&b.key).unwrap_or(std::cmp::Ordering::Equal));
                (name.as_str(), refs)
            })
            .collect();

        ResolvedContext {
            inputs: &self.inputs,
            config: &self.config,
            variables,
            rows: &self.rows,
            lookup_tables,
        }
    }
}

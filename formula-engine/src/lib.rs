//! FILENAME: formula-engine/src/lib.rs
//! PURPOSE: Main library entry point for the BOM formula engine.
//! CONTEXT: Re-exports public types and modules for use by other crates.
//! Builds on `formula-parser`'s lexer/AST/parser and adds `Value`,
//! `Context`, `EvaluationMeta`, the evaluator, and the `validate`/`test`
//! API surface.

pub mod api;
pub mod context;
pub mod evaluator;
pub mod value;

pub use api::{test_formula, validate, TestResult, ValidateResult, ValueType};
pub use context::{Context, EvaluationMeta, LookupRow, ResolvedContext, VariableDefinition, VariableType};
pub use evaluator::{evaluate, Evaluator};
pub use formula_parser::error::{FormulaError, FormulaResult};
pub use value::{Record, Value};

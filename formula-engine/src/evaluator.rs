//! FILENAME: formula-engine/src/evaluator.rs
//! PURPOSE: Walks a parsed expression tree and computes a `Value` under a
//! `Context`.
//! CONTEXT: This is the last stage of the pipeline: Lexer -> Parser -> AST
//! -> Context builder -> Evaluator. It resolves inputs, config fields,
//! variables (lazily, with memoization and cycle detection), and previously
//! computed row results, applies the arithmetic/comparison/logical
//! operators, and dispatches the built-in functions (`IF`, `AND`, `OR`,
//! `NOT`, `XLOOKUP`).
//!
//! SUPPORTED FEATURES:
//! - Literal, list literal, input/config/variable/row reference evaluation
//! - Unary `+ - NOT`, binary arithmetic `+ - * / ^`, comparison
//!   `= <> < > <= >=`, logical `AND`/`OR` with short-circuiting
//! - Variable resolution with a memo cache and an active-resolution set
//!   for circular-reference detection
//! - `XLOOKUP` with its `eval_identifier_like` unquoted-identifier rule

use crate::context::{Context, EvaluationMeta, ResolvedContext};
use crate::value::Value;
use formula_parser::ast::{BinaryOperator, Literal, UnaryOperator};
use formula_parser::error::{FormulaError, FormulaResult};
use formula_parser::parser::parse;
use formula_parser::Expr;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

/// Owns the per-`evaluate`-call state: the resolved context view, the
/// active evaluation's locator `meta`, a variable memo cache, and the
/// active-resolution set used for cycle detection. None of this survives
/// past one top-level `evaluate` call.
pub struct Evaluator<'a> {
    ctx: ResolvedContext<'a>,
    pub(crate) cache: RefCell<std::collections::HashMap<String, Value>>,
    active: RefCell<HashSet<String>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: ResolvedContext<'a>) -> Self {
        Evaluator {
            ctx,
            cache: RefCell::new(std::collections::HashMap::new()),
            active: RefCell::new(HashSet::new()),
        }
    }

    /// Parses and evaluates `formula`, enriching any error with `formula`
    /// text and this evaluator's locator meta. Used both for the top-level
    /// `evaluate` entry point and for a variable's own formula.
    pub fn evaluate_formula(&self, formula: &str, meta: &EvaluationMeta) -> FormulaResult<Value> {
        let expr = parse(formula).map_err(|e| enrich(e, formula, meta))?;
        self.evaluate(&expr, meta).map_err(|e| enrich(e, formula, meta))
    }

    /// Evaluates a single AST node to a `Value`, or fails with a
    /// position-tagged, as-yet-unenriched error.
    pub fn evaluate(&self, expr: &Expr, meta: &EvaluationMeta) -> FormulaResult<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(literal_value(value)),
            Expr::InputRef { name, position } => self.eval_input_ref(name, *position, meta),
            Expr::ConfigRef { field_name, position } => {
                self.eval_config_ref(field_name, *position, meta)
            }
            Expr::VariableRef { name, .. } => self.resolve_variable(name, meta),
            Expr::RowRef {
                row_id,
                field_name,
                position,
            } => self.eval_row_ref(row_id, field_name, *position, meta),
            Expr::ListLiteral { items, .. } => {
                let values = items
                    .iter()
                    .map(|item| self.evaluate(item, meta))
                    .collect::<FormulaResult<Vec<_>>>()?;
                Ok(Value::List(values))
            }
            Expr::UnaryOp { op, operand, position } => self.eval_unary(*op, operand, *position, meta),
            Expr::BinaryOp {
                op,
                left,
                right,
                position,
            } => self.eval_binary(*op, left, right, *position, meta),
            Expr::FunctionCall { name, args, position } => {
                self.eval_function(name, args, *position, meta)
            }
        }
    }

    fn eval_input_ref(&self, name: &str, position: usize, meta: &EvaluationMeta) -> FormulaResult<Value> {
        match self.ctx.inputs.get(name) {
            Some(v) => Ok(v.clone()),
            None => Err(tag(
                FormulaError::at(format!("Unknown input '{}'", name), position),
                meta,
            )),
        }
    }

    fn eval_config_ref(
        &self,
        field_name: &str,
        position: usize,
        meta: &EvaluationMeta,
    ) -> FormulaResult<Value> {
        match self.ctx.config.get(field_name) {
            Some(v) => Ok(v.clone()),
            None => Err(tag(
                FormulaError::at(format!("Missing config field '{}'", field_name), position)
                    .with_field_name(field_name),
                meta,
            )),
        }
    }

    fn eval_row_ref(
        &self,
        row_id: &str,
        field_name: &str,
        position: usize,
        meta: &EvaluationMeta,
    ) -> FormulaResult<Value> {
        let row = self.ctx.rows.get(row_id).ok_or_else(|| {
            tag(
                FormulaError::at(format!("Unknown row '{}'", row_id), position)
                    .with_row_id(row_id),
                meta,
            )
        })?;
        row.get(field_name).cloned().ok_or_else(|| {
            tag(
                FormulaError::at(
                    format!("Missing field '{}' in row '{}'", field_name, row_id),
                    position,
                )
                .with_row_id(row_id)
                .with_field_name(field_name),
                meta,
            )
        })
    }

    /// Resolves `VAR.name` through the memo cache / active-set algorithm.
    /// Cached names return immediately, names already being resolved raise a
    /// circular-reference error, a direct `value` is used as-is, and a
    /// `formula` is evaluated with `variable_name` tagged onto the meta
    /// passed down to it.
    fn resolve_variable(&self, name: &str, meta: &EvaluationMeta) -> FormulaResult<Value> {
        if let Some(v) = self.cache.borrow().get(name) {
            return Ok(v.clone());
        }
        if self.active.borrow().contains(name) {
            return Err(tag(
                FormulaError::new(format!("Circular variable reference: {}", name))
                    .with_variable_name(name),
                meta,
            ));
        }
        let var = self.ctx.variables.get(name).copied().ok_or_else(|| {
            tag(
                FormulaError::new(format!("Unknown variable '{}'", name)).with_variable_name(name),
                meta,
            )
        })?;

        let value = if let Some(formula) = &var.formula {
            self.active.borrow_mut().insert(name.to_string());
            let var_meta = meta.with_variable_name(name);
            let result = self.evaluate_formula(formula, &var_meta);
            self.active.borrow_mut().remove(name);
            result?
        } else {
            var.value.clone().unwrap_or(Value::Null)
        };

        self.cache
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn eval_unary(
        &self,
        op: UnaryOperator,
        operand: &Expr,
        position: usize,
        meta: &EvaluationMeta,
    ) -> FormulaResult<Value> {
        let value = self.evaluate(operand, meta)?;
        match op {
            UnaryOperator::Plus => Ok(Value::Number(require_number(&value, position)?)),
            UnaryOperator::Minus => Ok(Value::Number(-require_number(&value, position)?)),
            UnaryOperator::Not => Ok(Value::Boolean(!require_boolean(&value, position)?)),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOperator,
        left: &Expr,
        right: &Expr,
        position: usize,
        meta: &EvaluationMeta,
    ) -> FormulaResult<Value> {
        match op {
            // Logical operators short-circuit: the right operand is only
            // evaluated when the left doesn't already determine the
            // result.
            BinaryOperator::And => {
                let l = require_boolean(&self.evaluate(left, meta)?, position)?;
                if !l {
                    return Ok(Value::Boolean(false));
                }
                let r = require_boolean(&self.evaluate(right, meta)?, position)?;
                Ok(Value::Boolean(r))
            }
            BinaryOperator::Or => {
                let l = require_boolean(&self.evaluate(left, meta)?, position)?;
                if l {
                    return Ok(Value::Boolean(true));
                }
                let r = require_boolean(&self.evaluate(right, meta)?, position)?;
                Ok(Value::Boolean(r))
            }
            BinaryOperator::Add
            | BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Power => {
                let l = require_number(&self.evaluate(left, meta)?, position)?;
                let r = require_number(&self.evaluate(right, meta)?, position)?;
                match op {
                    BinaryOperator::Add => Ok(Value::Number(l + r)),
                    BinaryOperator::Subtract => Ok(Value::Number(l - r)),
                    BinaryOperator::Multiply => Ok(Value::Number(l * r)),
                    BinaryOperator::Divide => {
                        if r == 0.0 {
                            Err(tag(FormulaError::at("Division by zero", position), meta))
                        } else {
                            Ok(Value::Number(l / r))
                        }
                    }
                    BinaryOperator::Power => Ok(Value::Number(l.powf(r))),
                    _ => unreachable!(),
                }
            }
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::GreaterThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterEqual => {
                let l = self.evaluate(left, meta)?;
                let r = self.evaluate(right, meta)?;
                Ok(Value::Boolean(compare(op, &l, &r)))
            }
        }
    }

    fn eval_function(
        &self,
        name: &str,
        args: &[Expr],
        position: usize,
        meta: &EvaluationMeta,
    ) -> FormulaResult<Value> {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "IF" => self.fn_if(args, position, meta),
            "AND" => self.fn_and(args, position, meta),
            "OR" => self.fn_or(args, position, meta),
            "NOT" => self.fn_not(args, position, meta),
            "XLOOKUP" => self.fn_xlookup(args, position, meta),
            _ => Err(tag(
                FormulaError::at(format!("Unknown function '{}'", name), position),
                meta,
            )),
        }
    }

    fn fn_if(&self, args: &[Expr], position: usize, meta: &EvaluationMeta) -> FormulaResult<Value> {
        if args.len() != 3 {
            return Err(tag(
                FormulaError::at("IF requires 3 arguments", position),
                meta,
            ));
        }
        let cond = require_boolean(&self.evaluate(&args[0], meta)?, position)?;
        if cond {
            self.evaluate(&args[1], meta)
        } else {
            self.evaluate(&args[2], meta)
        }
    }

    fn fn_and(&self, args: &[Expr], position: usize, meta: &EvaluationMeta) -> FormulaResult<Value> {
        for arg in args {
            if !require_boolean(&self.evaluate(arg, meta)?, position)? {
                return Ok(Value::Boolean(false));
            }
        }
        Ok(Value::Boolean(true))
    }

    fn fn_or(&self, args: &[Expr], position: usize, meta: &EvaluationMeta) -> FormulaResult<Value> {
        for arg in args {
            if require_boolean(&self.evaluate(arg, meta)?, position)? {
                return Ok(Value::Boolean(true));
            }
        }
        Ok(Value::Boolean(false))
    }

    fn fn_not(&self, args: &[Expr], position: usize, meta: &EvaluationMeta) -> FormulaResult<Value> {
        if args.len() != 1 {
            return Err(tag(
                FormulaError::at("NOT requires 1 argument", position),
                meta,
            ));
        }
        let v = require_boolean(&self.evaluate(&args[0], meta)?, position)?;
        Ok(Value::Boolean(!v))
    }

    /// `XLOOKUP(value, table, fields, mode)`. Arguments 2-4 go through
    /// `eval_identifier_like`, which lets callers write bare names (`Sizes`,
    /// `cost`, `EXACT`) instead of quoting them. `table`/`fields`/`mode` are
    /// evaluated and the table is looked up *before* `value` is coerced to a
    /// number, so a bad table name is reported ahead of a bad `value`.
    fn fn_xlookup(&self, args: &[Expr], position: usize, meta: &EvaluationMeta) -> FormulaResult<Value> {
        if args.len() != 4 {
            return Err(tag(
                FormulaError::at("XLOOKUP requires 4 arguments", position),
                meta,
            ));
        }
        let raw_value = self.evaluate(&args[0], meta)?;
        let table_name = self.eval_identifier_like(&args[1], meta)?;
        let fields = self.eval_identifier_like(&args[2], meta)?;
        let mode = self.eval_identifier_like(&args[3], meta)?;

        let table_name = match table_name {
            Value::Text(s) => s,
            _ => {
                return Err(tag(
                    FormulaError::at("XLOOKUP table name must be text", position),
                    meta,
                ))
            }
        };
        let rows = self.ctx.lookup_tables.get(table_name.as_str()).ok_or_else(|| {
            tag(
                FormulaError::at(format!("Lookup table '{}' not found", table_name), position),
                meta,
            )
        })?;

        let value = require_number(&raw_value, position)?;

        let mode_str = mode.to_string().to_ascii_uppercase();
        if mode_str != "EXACT" && mode_str != "NEAREST" {
            return Err(tag(
                FormulaError::at("XLOOKUP match mode must be EXACT or NEAREST", position),
                meta,
            ));
        }
        if rows.is_empty() {
            return Err(tag(
                FormulaError::at(format!("Lookup table '{}' has no rows", table_name), position),
                meta,
            ));
        }

        let row = if mode_str == "EXACT" {
            rows.iter()
                .copied()
                .find(|r| r.key == value)
                .ok_or_else(|| tag(FormulaError::at("XLOOKUP exact match not found", position), meta))?
        } else {
            // Rows are sorted ascending by key (Context::resolve); the
            // first minimal-distance row wins ties, matching the stored
            // ascending order.
            rows.iter()
                .copied()
                .min_by(|a, b| {
                    (a.key - value)
                        .abs()
                        .partial_cmp(&(b.key - value).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .expect("non-empty table")
        };

        self.extract_lookup_return(row, &fields, position, meta)
    }

    fn extract_lookup_return(
        &self,
        row: &crate::context::LookupRow,
        fields: &Value,
        position: usize,
        meta: &EvaluationMeta,
    ) -> FormulaResult<Value> {
        match fields {
            Value::Text(s) if s == "*" || s == "ALL" => {
                let record: BTreeMap<String, Value> = row
                    .values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Ok(Value::Record(record))
            }
            Value::Text(s) => row.values.get(s).cloned().ok_or_else(|| {
                tag(
                    FormulaError::at(format!("XLOOKUP field '{}' not found", s), position),
                    meta,
                )
            }),
            Value::List(items) => {
                let mut record = BTreeMap::new();
                for item in items {
                    let col = match item {
                        Value::Text(s) => s,
                        _ => {
                            return Err(tag(
                                FormulaError::at("XLOOKUP return fields must be text", position),
                                meta,
                            ))
                        }
                    };
                    let value = row.values.get(col).cloned().ok_or_else(|| {
                        tag(
                            FormulaError::at(format!("XLOOKUP field '{}' not found", col), position),
                            meta,
                        )
                    })?;
                    record.insert(col.clone(), value);
                }
                Ok(Value::Record(record))
            }
            _ => Err(tag(
                FormulaError::at("XLOOKUP return field must be text or list", position),
                meta,
            )),
        }
    }

    /// The unquoted-identifier evaluation mode used only for `XLOOKUP`'s
    /// table/fields/mode arguments — this rule must not leak into ordinary
    /// expression evaluation. An `InputRef` not bound in `inputs` yields its
    /// own name as text instead of erroring; everything else evaluates
    /// normally.
    fn eval_identifier_like(&self, expr: &Expr, meta: &EvaluationMeta) -> FormulaResult<Value> {
        match expr {
            Expr::InputRef { name, .. } => match self.ctx.inputs.get(name) {
                Some(v) => Ok(v.clone()),
                None => Ok(Value::Text(name.clone())),
            },
            Expr::ListLiteral { items, .. } => {
                let values = items
                    .iter()
                    .map(|item| self.eval_identifier_like(item, meta))
                    .collect::<FormulaResult<Vec<_>>>()?;
                Ok(Value::List(values))
            }
            other => self.evaluate(other, meta),
        }
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Number(n) => Value::Number(*n),
        Literal::Text(s) => Value::Text(s.clone()),
        Literal::Boolean(b) => Value::Boolean(*b),
    }
}

/// `require_number`: Number passes through; Boolean/Null error; Text is
/// parsed permissively as a decimal float; List/Record error.
fn require_number(value: &Value, position: usize) -> FormulaResult<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FormulaError::at("Expected number", position)),
        Value::Boolean(_) | Value::Null | Value::List(_) | Value::Record(_) => {
            Err(FormulaError::at("Expected number", position))
        }
    }
}

/// `require_boolean`: only `Value::Boolean` passes; everything else errors.
fn require_boolean(value: &Value, position: usize) -> FormulaResult<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        _ => Err(FormulaError::at("Expected boolean", position)),
    }
}

/// Numeric (Number-only) operands compare
/// numerically; otherwise `=`/`<>` compare structurally and the ordered
/// operators fall back to stringified lexicographic comparison.
fn compare(op: BinaryOperator, left: &Value, right: &Value) -> bool {
    if let (Value::Number(l), Value::Number(r)) = (left, right) {
        return match op {
            BinaryOperator::Equal => l == r,
            BinaryOperator::NotEqual => l != r,
            BinaryOperator::LessThan => l < r,
            BinaryOperator::GreaterThan => l > r,
            BinaryOperator::LessEqual => l <= r,
            BinaryOperator::GreaterEqual => l >= r,
            _ => unreachable!(),
        };
    }
    match op {
        BinaryOperator::Equal => left == right,
        BinaryOperator::NotEqual => left != right,
        BinaryOperator::LessThan => left.to_string() < right.to_string(),
        BinaryOperator::GreaterThan => left.to_string() > right.to_string(),
        BinaryOperator::LessEqual => left.to_string() <= right.to_string(),
        BinaryOperator::GreaterEqual => left.to_string() >= right.to_string(),
        _ => unreachable!(),
    }
}

/// Fills in the locator fields from `meta` that the error doesn't already
/// carry, without touching `formula` (that's `enrich`'s job, at formula
/// entry points). Tighter, more specific tags set closer to the raise site
/// always win over these outer defaults.
fn tag(error: FormulaError, meta: &EvaluationMeta) -> FormulaError {
    error.enrich(
        "",
        meta.build_family_id.as_deref(),
        meta.row_id.as_deref(),
        meta.field_name.as_deref(),
        meta.variable_name.as_deref(),
    )
}

fn enrich(error: FormulaError, formula: &str, meta: &EvaluationMeta) -> FormulaError {
    error.enrich(
        formula,
        meta.build_family_id.as_deref(),
        meta.row_id.as_deref(),
        meta.field_name.as_deref(),
        meta.variable_name.as_deref(),
    )
}

/// Parses and evaluates `formula` against `context`, tagging any error with
/// `meta`'s locator fields. This is the core `evaluate` operation: parse
/// then evaluate.
pub fn evaluate(formula: &str, context: &Context, meta: &EvaluationMeta) -> FormulaResult<Value> {
    let resolved = context.resolve();
    let evaluator = Evaluator::new(resolved);
    evaluator.evaluate_formula(formula, meta)
}

//! FILENAME: formula-parser/src/error.rs
//! PURPOSE: The single structured error type produced anywhere in the
//! formula pipeline (lexer, parser, evaluator).
//! CONTEXT: Inner components raise with `formula` left empty and only the
//! fields they actually know (usually just `position`). Outer layers fill
//! in `formula` and any locator tags that are still unset once the error
//! reaches them — tighter, more specific information always wins over an
//! outer default.

use std::fmt;

/// A single structured failure carrying a message, a source position, the
/// originating formula text, and caller-provided locator tags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormulaError {
    pub message: String,
    pub formula: String,
    pub position: Option<usize>,
    pub build_family_id: Option<String>,
    pub row_id: Option<String>,
    pub field_name: Option<String>,
    pub variable_name: Option<String>,
}

impl FormulaError {
    /// Raises a bare error at a source position. Called from the lexer and
    /// parser, which know a byte offset but nothing about the surrounding
    /// formula or the caller's locator tags.
    pub fn at(message: impl Into<String>, position: usize) -> Self {
        FormulaError {
            message: message.into(),
            formula: String::new(),
            position: Some(position),
            build_family_id: None,
            row_id: None,
            field_name: None,
            variable_name: None,
        }
    }

    /// Raises a bare error with no source position (used for evaluation
    /// failures that span more than one token, e.g. a missing variable).
    pub fn new(message: impl Into<String>) -> Self {
        FormulaError {
            message: message.into(),
            formula: String::new(),
            position: None,
            build_family_id: None,
            row_id: None,
            field_name: None,
            variable_name: None,
        }
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_row_id(mut self, row_id: impl Into<String>) -> Self {
        self.row_id = Some(row_id.into());
        self
    }

    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    pub fn with_variable_name(mut self, variable_name: impl Into<String>) -> Self {
        self.variable_name = Some(variable_name.into());
        self
    }

    /// Fills in `formula` and any locator fields that are not already set.
    /// Called at formula entry points (top-level `evaluate`, variable
    /// resolution, `XLOOKUP` argument evaluation) so that the first, most
    /// specific tag an error picks up is never overwritten by an outer one.
    pub fn enrich(
        mut self,
        formula: &str,
        build_family_id: Option<&str>,
        row_id: Option<&str>,
        field_name: Option<&str>,
        variable_name: Option<&str>,
    ) -> Self {
        if self.formula.is_empty() {
            self.formula = formula.to_string();
        }
        if self.build_family_id.is_none() {
            self.build_family_id = build_family_id.map(str::to_string);
        }
        if self.row_id.is_none() {
            self.row_id = row_id.map(str::to_string);
        }
        if self.field_name.is_none() {
            self.field_name = field_name.map(str::to_string);
        }
        if self.variable_name.is_none() {
            self.variable_name = variable_name.map(str::to_string);
        }
        self
    }
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(pos) = self.position {
            write!(f, " (at position {})", pos)?;
        }
        Ok(())
    }
}

impl std::error::Error for FormulaError {}

pub type FormulaResult<T> = Result<T, FormulaError>;

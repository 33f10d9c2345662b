//! FILENAME: formula-parser/src/parser.rs
//! PURPOSE: Operator-precedence descent parser that converts a stream of
//! Tokens into a single expression tree.
//! CONTEXT: This is the second stage of the parsing pipeline. It takes
//! tokens from the Lexer and builds an `Expr` tree that the evaluator (in
//! formula-engine) can walk. The whole input must be consumed before EOF.
//!
//! GRAMMAR (lowest to highest precedence; all left-associative except `^`
//! and prefix `NOT`):
//!   expression     --> or_expr
//!   or_expr        --> and_expr ( "OR" and_expr )*
//!   and_expr       --> not_expr ( "AND" not_expr )*
//!   not_expr       --> "NOT" not_expr | comparison
//!   comparison     --> additive ( ("=" | "<>" | "<" | ">" | "<=" | ">=") additive )*
//!   additive       --> multiplicative ( ("+" | "-") multiplicative )*
//!   multiplicative --> power ( ("*" | "/") power )*
//!   power          --> unary ( "^" power )?
//!   unary          --> ("+" | "-") unary | primary
//!   primary        --> NUMBER | STRING | TRUE | FALSE
//!                     | "[" ( expression ("," expression)* )? "]"
//!                     | "ROW" "(" (IDENT | STRING) ")" "." IDENT
//!                     | "CFG" "." IDENT
//!                     | "VAR" "." IDENT
//!                     | IDENT "." IDENT
//!                     | IDENT "(" ( expression ("," expression)* )? ")"
//!                     | IDENT
//!                     | "(" expression ")"

use crate::ast::{BinaryOperator, Expr, Literal, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::lexer::Lexer;
use crate::token::{Op, Token, TokenKind};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser over `input` and advances to the first token.
    pub fn new(input: &'a str) -> FormulaResult<Self> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Parser { lexer, current })
    }

    /// Parses the entire input and returns the expression tree. Errors if
    /// any tokens remain after the expression is fully parsed.
    pub fn parse(&mut self) -> FormulaResult<Expr> {
        let expr = self.parse_or()?;
        if !matches!(self.current.kind, TokenKind::Eof) {
            return Err(FormulaError::at(
                format!("Unexpected trailing token '{}'", self.current.kind),
                self.current.position,
            ));
        }
        Ok(expr)
    }

    fn advance(&mut self) -> FormulaResult<Token> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn is_ident(&self, word: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Ident(s) if s.eq_ignore_ascii_case(word))
    }

    fn expect_kind(&mut self, kind: TokenKind) -> FormulaResult<Token> {
        if self.current.kind == kind {
            self.advance()
        } else {
            Err(FormulaError::at(
                format!("Expected '{}', found '{}'", kind, self.current.kind),
                self.current.position,
            ))
        }
    }

    fn parse_or(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_and()?;
        while self.is_ident("OR") {
            let token = self.advance()?;
            let right = self.parse_and()?;
            left = Expr::BinaryOp {
                op: BinaryOperator::Or,
                left: Box::new(left),
                right: Box::new(right),
                position: token.position,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_not()?;
        while self.is_ident("AND") {
            let token = self.advance()?;
            let right = self.parse_not()?;
            left = Expr::BinaryOp {
                op: BinaryOperator::And,
                left: Box::new(left),
                right: Box::new(right),
                position: token.position,
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> FormulaResult<Expr> {
        if self.is_ident("NOT") {
            let token = self.advance()?;
            let operand = self.parse_not()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
                position: token.position,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Op(Op::Eq) => BinaryOperator::Equal,
                TokenKind::Op(Op::NotEq) => BinaryOperator::NotEqual,
                TokenKind::Op(Op::Lt) => BinaryOperator::LessThan,
                TokenKind::Op(Op::Gt) => BinaryOperator::GreaterThan,
                TokenKind::Op(Op::Le) => BinaryOperator::LessEqual,
                TokenKind::Op(Op::Ge) => BinaryOperator::GreaterEqual,
                _ => break,
            };
            let token = self.advance()?;
            let right = self.parse_additive()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position: token.position,
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Op(Op::Add) => BinaryOperator::Add,
                TokenKind::Op(Op::Sub) => BinaryOperator::Subtract,
                _ => break,
            };
            let token = self.advance()?;
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position: token.position,
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Op(Op::Mul) => BinaryOperator::Multiply,
                TokenKind::Op(Op::Div) => BinaryOperator::Divide,
                _ => break,
            };
            let token = self.advance()?;
            let right = self.parse_power()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position: token.position,
            };
        }
        Ok(left)
    }

    /// `^` is right-associative: `a ^ b ^ c` parses as `a ^ (b ^ c)`.
    fn parse_power(&mut self) -> FormulaResult<Expr> {
        let left = self.parse_unary()?;
        if matches!(self.current.kind, TokenKind::Op(Op::Pow)) {
            let token = self.advance()?;
            let right = self.parse_power()?;
            return Ok(Expr::BinaryOp {
                op: BinaryOperator::Power,
                left: Box::new(left),
                right: Box::new(right),
                position: token.position,
            });
        }
        Ok(left)
    }

    /// Prefix `+`/`-`; binds tighter than `^` so `-2^2` parses as `(-2)^2`.
    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        let op = match self.current.kind {
            TokenKind::Op(Op::Add) => Some(UnaryOperator::Plus),
            TokenKind::Op(Op::Sub) => Some(UnaryOperator::Minus),
            _ => None,
        };
        if let Some(op) = op {
            let token = self.advance()?;
            let operand = self.parse_unary()?;
            return Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand),
                position: token.position,
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> FormulaResult<Expr> {
        match self.current.kind.clone() {
            TokenKind::Number(n) => {
                let token = self.advance()?;
                Ok(Expr::Literal {
                    value: Literal::Number(n),
                    position: token.position,
                })
            }
            TokenKind::String(s) => {
                let token = self.advance()?;
                Ok(Expr::Literal {
                    value: Literal::Text(s),
                    position: token.position,
                })
            }
            TokenKind::LBracket => self.parse_list_literal(),
            TokenKind::LParen => {
                self.advance()?;
                let expr = self.parse_or()?;
                self.expect_kind(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Ident(name) => self.parse_identifier(name),
            TokenKind::Eof => Err(FormulaError::at(
                "Unexpected end of formula",
                self.current.position,
            )),
            other => Err(FormulaError::at(
                format!("Unexpected token '{}'", other),
                self.current.position,
            )),
        }
    }

    fn parse_list_literal(&mut self) -> FormulaResult<Expr> {
        let open = self.expect_kind(TokenKind::LBracket)?;
        let mut items = Vec::new();
        if !matches!(self.current.kind, TokenKind::RBracket) {
            loop {
                items.push(self.parse_or()?);
                if matches!(self.current.kind, TokenKind::Comma) {
                    self.advance()?;
                    continue;
                }
                break;
            }
        }
        self.expect_kind(TokenKind::RBracket)?;
        Ok(Expr::ListLiteral {
            items,
            position: open.position,
        })
    }

    /// Dispatches an identifier to the right primary form by look-ahead:
    /// `TRUE`/`FALSE` literals, `ROW(id).field`, `CFG.field`, `VAR.name`,
    /// `name.subname` input paths, `name(args)` function calls, or a bare
    /// `name` input reference.
    fn parse_identifier(&mut self, name: String) -> FormulaResult<Expr> {
        let token = self.advance()?;

        if name.eq_ignore_ascii_case("TRUE") {
            return Ok(Expr::Literal {
                value: Literal::Boolean(true),
                position: token.position,
            });
        }
        if name.eq_ignore_ascii_case("FALSE") {
            return Ok(Expr::Literal {
                value: Literal::Boolean(false),
                position: token.position,
            });
        }

        if name.eq_ignore_ascii_case("ROW") && matches!(self.current.kind, TokenKind::LParen) {
            return self.parse_row_ref(token.position);
        }

        if matches!(self.current.kind, TokenKind::Dot) {
            self.advance()?;
            let field_token = self.expect_ident()?;
            if name.eq_ignore_ascii_case("CFG") {
                return Ok(Expr::ConfigRef {
                    field_name: field_token,
                    position: token.position,
                });
            }
            if name.eq_ignore_ascii_case("VAR") {
                return Ok(Expr::VariableRef {
                    name: field_token,
                    position: token.position,
                });
            }
            return Ok(Expr::InputRef {
                name: format!("{}.{}", name, field_token),
                position: token.position,
            });
        }

        if matches!(self.current.kind, TokenKind::LParen) {
            return self.parse_function_call(name, token.position);
        }

        Ok(Expr::InputRef {
            name,
            position: token.position,
        })
    }

    fn parse_row_ref(&mut self, position: usize) -> FormulaResult<Expr> {
        self.advance()?; // consume '('
        let row_id = match self.current.kind.clone() {
            TokenKind::Ident(s) => {
                self.advance()?;
                s
            }
            TokenKind::String(s) => {
                self.advance()?;
                s
            }
            _ => {
                return Err(FormulaError::at(
                    "Expected row id inside ROW(...)",
                    self.current.position,
                ))
            }
        };
        self.expect_kind(TokenKind::RParen)?;
        self.expect_kind(TokenKind::Dot)?;
        let field_name = self.expect_ident()?;
        Ok(Expr::RowRef {
            row_id,
            field_name,
            position,
        })
    }

    fn parse_function_call(&mut self, name: String, position: usize) -> FormulaResult<Expr> {
        self.advance()?; // consume '('
        let mut args = Vec::new();
        if !matches!(self.current.kind, TokenKind::RParen) {
            loop {
                args.push(self.parse_or()?);
                if matches!(self.current.kind, TokenKind::Comma) {
                    self.advance()?;
                    continue;
                }
                break;
            }
        }
        self.expect_kind(TokenKind::RParen)?;
        Ok(Expr::FunctionCall {
            name,
            args,
            position,
        })
    }

    fn expect_ident(&mut self) -> FormulaResult<String> {
        match self.current.kind.clone() {
            TokenKind::Ident(s) => {
                self.advance()?;
                Ok(s)
            }
            other => Err(FormulaError::at(
                format!("Expected identifier, found '{}'", other),
                self.current.position,
            )),
        }
    }
}

/// Parses `input` into a single expression tree, consuming the whole
/// string. This is the core `parse` operation: a pure syntactic check with
/// no context or evaluation involved.
pub fn parse(input: &str) -> FormulaResult<Expr> {
    let mut parser = Parser::new(input)?;
    parser.parse()
}

//! FILENAME: formula-parser/src/tests.rs
//! PURPOSE: Consolidated unit tests for the parser crate.

use crate::ast::{BinaryOperator, Expr, Literal, UnaryOperator};
use crate::lexer::Lexer;
use crate::parser::parse;
use crate::token::{Op, TokenKind};

// ========================================
// LEXER TESTS
// ========================================

#[test]
fn lexer_tokenizes_simple_math() {
    let mut lexer = Lexer::new("1 + 2");
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Number(1.0));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Op(Op::Add));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Number(2.0));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
}

#[test]
fn lexer_preserves_identifier_casing() {
    let mut lexer = Lexer::new("LS_L and_thing");
    assert_eq!(
        lexer.next_token().unwrap().kind,
        TokenKind::Ident("LS_L".to_string())
    );
    assert_eq!(
        lexer.next_token().unwrap().kind,
        TokenKind::Ident("and_thing".to_string())
    );
}

#[test]
fn lexer_tokenizes_comparison_operators() {
    let mut lexer = Lexer::new("< > <= >= <> =");
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Op(Op::Lt));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Op(Op::Gt));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Op(Op::Le));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Op(Op::Ge));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Op(Op::NotEq));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Op(Op::Eq));
}

#[test]
fn lexer_handles_leading_dot_numbers() {
    let mut lexer = Lexer::new(".5 + 5.25");
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Number(0.5));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Op(Op::Add));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Number(5.25));
}

#[test]
fn lexer_dot_not_followed_by_digit_is_its_own_token() {
    // `CFG.name` — the '.' is a DOT token, not the start of a number.
    let mut lexer = Lexer::new("CFG.name");
    assert_eq!(
        lexer.next_token().unwrap().kind,
        TokenKind::Ident("CFG".to_string())
    );
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Dot);
    assert_eq!(
        lexer.next_token().unwrap().kind,
        TokenKind::Ident("name".to_string())
    );
}

#[test]
fn lexer_reads_escaped_strings() {
    let mut lexer = Lexer::new(r#""a\"b\\c""#);
    assert_eq!(
        lexer.next_token().unwrap().kind,
        TokenKind::String("a\"b\\c".to_string())
    );
}

#[test]
fn lexer_single_quoted_strings_also_work() {
    let mut lexer = Lexer::new("'hello'");
    assert_eq!(
        lexer.next_token().unwrap().kind,
        TokenKind::String("hello".to_string())
    );
}

#[test]
fn lexer_unterminated_string_errors_at_opening_quote() {
    let mut lexer = Lexer::new("   \"abc");
    let err = lexer.next_token().unwrap_err();
    assert_eq!(err.position, Some(3));
}

#[test]
fn lexer_rejects_unexpected_character() {
    let mut lexer = Lexer::new("1 @ 2");
    lexer.next_token().unwrap(); // "1"
    let err = lexer.next_token().unwrap_err();
    assert_eq!(err.position, Some(2));
}

#[test]
fn lexer_identifiers_are_ascii_only() {
    // Identifiers/keywords are ASCII-letters/digits/underscore; a non-ASCII
    // letter ends the identifier rather than extending it.
    let mut lexer = Lexer::new("caf\u{e9}");
    assert_eq!(
        lexer.next_token().unwrap().kind,
        TokenKind::Ident("caf".to_string())
    );
    assert!(lexer.next_token().is_err());
}

// ========================================
// PARSER TESTS
// ========================================

#[test]
fn parses_arithmetic_precedence() {
    // a + b * c parses as a + (b * c)
    let expr = parse("a + b * c").unwrap();
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Add,
            right,
            ..
        } => {
            assert!(matches!(
                *right,
                Expr::BinaryOp {
                    op: BinaryOperator::Multiply,
                    ..
                }
            ));
        }
        other => panic!("expected Add at top, got {:?}", other),
    }
}

#[test]
fn power_is_right_associative() {
    // a ^ b ^ c parses as a ^ (b ^ c)
    let expr = parse("a ^ b ^ c").unwrap();
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Power,
            left,
            right,
            ..
        } => {
            assert!(matches!(*left, Expr::InputRef { .. }));
            assert!(matches!(
                *right,
                Expr::BinaryOp {
                    op: BinaryOperator::Power,
                    ..
                }
            ));
        }
        other => panic!("expected Power at top, got {:?}", other),
    }
}

#[test]
fn not_binds_tighter_than_and() {
    // NOT a AND b parses as (NOT a) AND b
    let expr = parse("NOT a AND b").unwrap();
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::And,
            left,
            ..
        } => {
            assert!(matches!(
                *left,
                Expr::UnaryOp {
                    op: UnaryOperator::Not,
                    ..
                }
            ));
        }
        other => panic!("expected And at top, got {:?}", other),
    }
}

#[test]
fn and_binds_tighter_than_or() {
    // a OR b AND c parses as a OR (b AND c)
    let expr = parse("a OR b AND c").unwrap();
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Or,
            right,
            ..
        } => {
            assert!(matches!(
                *right,
                Expr::BinaryOp {
                    op: BinaryOperator::And,
                    ..
                }
            ));
        }
        other => panic!("expected Or at top, got {:?}", other),
    }
}

#[test]
fn comparison_binds_looser_than_arithmetic() {
    let expr = parse("a + 1 > b * 2").unwrap();
    assert!(matches!(
        expr,
        Expr::BinaryOp {
            op: BinaryOperator::GreaterThan,
            ..
        }
    ));
}

#[test]
fn unary_minus_binds_tighter_than_power() {
    // -2 ^ 2 parses as (-2) ^ 2
    let expr = parse("-2 ^ 2").unwrap();
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Power,
            left,
            ..
        } => {
            assert!(matches!(
                *left,
                Expr::UnaryOp {
                    op: UnaryOperator::Minus,
                    ..
                }
            ));
        }
        other => panic!("expected Power at top, got {:?}", other),
    }
}

#[test]
fn parses_true_false_case_insensitively() {
    assert_eq!(
        parse("true").unwrap(),
        Expr::Literal {
            value: Literal::Boolean(true),
            position: 0
        }
    );
    assert_eq!(
        parse("False").unwrap(),
        Expr::Literal {
            value: Literal::Boolean(false),
            position: 0
        }
    );
}

#[test]
fn parses_cfg_and_var_refs() {
    assert_eq!(
        parse("CFG.Width").unwrap(),
        Expr::ConfigRef {
            field_name: "Width".to_string(),
            position: 0
        }
    );
    assert_eq!(
        parse("VAR.A").unwrap(),
        Expr::VariableRef {
            name: "A".to_string(),
            position: 0
        }
    );
}

#[test]
fn parses_row_ref_with_ident_row_id() {
    let expr = parse("ROW(r1).cost").unwrap();
    assert_eq!(
        expr,
        Expr::RowRef {
            row_id: "r1".to_string(),
            field_name: "cost".to_string(),
            position: 0
        }
    );
}

#[test]
fn parses_row_ref_with_string_row_id() {
    let expr = parse("ROW(\"row one\").cost").unwrap();
    assert_eq!(
        expr,
        Expr::RowRef {
            row_id: "row one".to_string(),
            field_name: "cost".to_string(),
            position: 0
        }
    );
}

#[test]
fn parses_dotted_input_path() {
    assert_eq!(
        parse("Mount.Type").unwrap(),
        Expr::InputRef {
            name: "Mount.Type".to_string(),
            position: 0
        }
    );
}

#[test]
fn parses_function_call_with_args() {
    let expr = parse("IF(a > 0, 1, 0)").unwrap();
    match expr {
        Expr::FunctionCall { name, args, .. } => {
            assert_eq!(name, "IF");
            assert_eq!(args.len(), 3);
        }
        other => panic!("expected FunctionCall, got {:?}", other),
    }
}

#[test]
fn parses_empty_and_nonempty_list_literals() {
    assert_eq!(
        parse("[]").unwrap(),
        Expr::ListLiteral {
            items: vec![],
            position: 0
        }
    );
    let expr = parse("[cost, weight]").unwrap();
    match expr {
        Expr::ListLiteral { items, .. } => assert_eq!(items.len(), 2),
        other => panic!("expected ListLiteral, got {:?}", other),
    }
}

#[test]
fn parenthesized_expression_overrides_precedence() {
    let expr = parse("(a + b) * c").unwrap();
    assert!(matches!(
        expr,
        Expr::BinaryOp {
            op: BinaryOperator::Multiply,
            ..
        }
    ));
}

#[test]
fn position_points_at_operand_start() {
    let expr = parse("  LS_L").unwrap();
    assert_eq!(expr.position(), 2);
}

#[test]
fn division_position_points_at_operator() {
    let expr = parse("1/0").unwrap();
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Divide,
            position,
            ..
        } => assert_eq!(position, 1),
        other => panic!("expected Divide, got {:?}", other),
    }
}

#[test]
fn rejects_trailing_tokens() {
    let err = parse("1 2").unwrap_err();
    assert_eq!(err.position, Some(2));
}

#[test]
fn rejects_unterminated_parenthesis() {
    assert!(parse("(1 + 2").is_err());
}

#[test]
fn user_defined_names_are_case_sensitive() {
    // `var` lowercase is an ordinary input reference, not VAR.x dispatch,
    // because dispatch only triggers on `VAR.` (case-insensitively) plus a
    // following dot — a bare `var` is just an identifier.
    assert_eq!(
        parse("var").unwrap(),
        Expr::InputRef {
            name: "var".to_string(),
            position: 0
        }
    );
}

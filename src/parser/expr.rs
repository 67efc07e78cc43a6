// spcc - a C11 preprocessor and translation front end.
// Copyright (C) 2026 Alex Bock
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! The expression rule set: [parse_expr.cc]'s precedence ladder, extended
//! with the ternary and assignment tiers that file declared constants for
//! (`ep_conditonal`, `ep_assignment`) but never wired into a rule, plus an
//! array-subscript rule the original table never had either.

use std::sync::LazyLock;

use crate::token::{Keyword, Punctuator, TokenKind};

use super::{call_rule, paren_rule, token_rule, unary_postfix_rule, unary_prefix_rule, InfixRule, Node, ParseError, Parser, PrefixRule, Ruleset};

/// Named precedence tiers, mirroring [parse_expr.hh]'s `expr_precedence`
/// enum (same numeric values, so a reader who knows the original recognizes
/// them immediately).
#[repr(i32)]
#[derive(Debug, Clone, Copy)]
pub enum Prec {
    Comma = 1,
    Assignment = 300,
    Conditional = 400,
    LogicalOr = 475,
    LogicalAnd = 500,
    BitOr = 525,
    BitXor = 550,
    BitAnd = 575,
    Equality = 600,
    Relational = 650,
    Shift = 700,
    Additive = 750,
    Multiplicative = 800,
    Prefix = 900,
    Postfix = 1000,
}

fn is_punct(p: Punctuator) -> impl Fn(&crate::token::Token, &Parser) -> bool {
    move |t, _| t.is_punctuator(p)
}

fn is_one_of(ps: &'static [Punctuator]) -> impl Fn(&crate::token::Token, &Parser) -> bool {
    move |t, _| ps.iter().any(|&p| t.is_punctuator(p))
}

/// `?:` is the one rule in this table that can't be expressed as a plain
/// `binary_rule`: the "then" branch is a full expression bounded by a `:`,
/// not a second operand at some fixed precedence.
fn ternary_rule(p: &mut Parser, cond: Node, question: crate::token::Token, prec: i32, _ra: bool) -> Result<Node, ParseError> {
    let then_branch = p.parse(0)?;
    let colon = p.expect_punctuator(Punctuator::Colon, ":")?;
    // Right-associative: the else-branch is itself a conditional-expression,
    // so it may not swallow a lower-precedence assignment or comma unless
    // parenthesized.
    let else_branch = p.parse(prec - 1)?;
    Ok(Node::Ternary {
        question,
        colon,
        cond: Box::new(cond),
        then_branch: Box::new(then_branch),
        else_branch: Box::new(else_branch),
    })
}

fn index_rule(p: &mut Parser, base: Node, lbracket: crate::token::Token, _prec: i32, _ra: bool) -> Result<Node, ParseError> {
    let index = p.parse(0)?;
    let rbracket = p.expect_punctuator(Punctuator::SquareRight, "]")?;
    Ok(Node::Index {
        base: Box::new(base),
        lbracket,
        index: Box::new(index),
        rbracket,
    })
}

const UNARY_PREFIX_PUNCTUATORS: &[Punctuator] = &[
    Punctuator::PlusPlus,
    Punctuator::MinusMinus,
    Punctuator::Plus,
    Punctuator::Minus,
    Punctuator::Bang,
    Punctuator::Tilde,
    Punctuator::Star,
    Punctuator::Ampersand,
];

const POSTFIX_PUNCTUATORS: &[Punctuator] = &[Punctuator::PlusPlus, Punctuator::MinusMinus];

const ASSIGNMENT_PUNCTUATORS: &[Punctuator] = &[
    Punctuator::Equal,
    Punctuator::PlusEqual,
    Punctuator::MinusEqual,
    Punctuator::StarEqual,
    Punctuator::SlashEqual,
    Punctuator::PercentEqual,
    Punctuator::LessLessEqual,
    Punctuator::GreaterGreaterEqual,
    Punctuator::AmpersandEqual,
    Punctuator::CaretEqual,
    Punctuator::PipeEqual,
];

pub static EXPR_RULESET: LazyLock<Ruleset> = LazyLock::new(|| {
    let prefix = vec![
        PrefixRule {
            predicate: |t, _| {
                matches!(
                    t.kind,
                    TokenKind::Identifier
                        | TokenKind::IntegerConstant
                        | TokenKind::FloatingConstant
                        | TokenKind::StringLiteral
                        | TokenKind::CharacterConstant
                )
            },
            parse: token_rule,
            arg: 0,
        },
        PrefixRule {
            predicate: |t, _| t.is_punctuator(Punctuator::ParenLeft),
            parse: paren_rule,
            arg: 0,
        },
        PrefixRule {
            predicate: |t, _| matches!(t.punctuator, Some(p) if UNARY_PREFIX_PUNCTUATORS.contains(&p)),
            parse: unary_prefix_rule,
            arg: Prec::Prefix as i32,
        },
        PrefixRule {
            predicate: |t, _| t.is_keyword(Keyword::Sizeof) || t.is_keyword(Keyword::Alignof),
            parse: unary_prefix_rule,
            arg: Prec::Prefix as i32,
        },
    ];

    let infix = vec![
        InfixRule {
            predicate: is_one_of(POSTFIX_PUNCTUATORS),
            parse: unary_postfix_rule,
            precedence: Prec::Postfix as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: |t, _| t.is_punctuator(Punctuator::ParenLeft),
            parse: call_rule,
            precedence: i32::MAX,
            right_assoc: false,
        },
        InfixRule {
            predicate: |t, _| t.is_punctuator(Punctuator::SquareLeft),
            parse: index_rule,
            precedence: Prec::Postfix as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_one_of(&[Punctuator::Dot, Punctuator::Arrow]),
            parse: super::binary_rule,
            precedence: Prec::Postfix as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_one_of(&[Punctuator::Star, Punctuator::Slash, Punctuator::Percent]),
            parse: super::binary_rule,
            precedence: Prec::Multiplicative as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_one_of(&[Punctuator::Plus, Punctuator::Minus]),
            parse: super::binary_rule,
            precedence: Prec::Additive as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_one_of(&[Punctuator::LessLess, Punctuator::GreaterGreater]),
            parse: super::binary_rule,
            precedence: Prec::Shift as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_one_of(&[Punctuator::Less, Punctuator::Greater, Punctuator::LessEqual, Punctuator::GreaterEqual]),
            parse: super::binary_rule,
            precedence: Prec::Relational as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_one_of(&[Punctuator::EqualEqual, Punctuator::BangEqual]),
            parse: super::binary_rule,
            precedence: Prec::Equality as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_punct(Punctuator::Ampersand),
            parse: super::binary_rule,
            precedence: Prec::BitAnd as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_punct(Punctuator::Caret),
            parse: super::binary_rule,
            precedence: Prec::BitXor as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_punct(Punctuator::Pipe),
            parse: super::binary_rule,
            precedence: Prec::BitOr as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_punct(Punctuator::AmpersandAmpersand),
            parse: super::binary_rule,
            precedence: Prec::LogicalAnd as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_punct(Punctuator::PipePipe),
            parse: super::binary_rule,
            precedence: Prec::LogicalOr as i32,
            right_assoc: false,
        },
        InfixRule {
            predicate: is_punct(Punctuator::Question),
            parse: ternary_rule,
            precedence: Prec::Conditional as i32,
            right_assoc: true,
        },
        InfixRule {
            predicate: is_one_of(ASSIGNMENT_PUNCTUATORS),
            parse: super::binary_rule,
            precedence: Prec::Assignment as i32,
            right_assoc: true,
        },
        InfixRule {
            predicate: is_punct(Punctuator::Comma),
            parse: super::binary_rule,
            precedence: Prec::Comma as i32,
            right_assoc: false,
        },
    ];

    Ruleset { prefix, infix }
});

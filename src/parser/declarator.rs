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

//! The declarator rule set, grounded on [declarator.cc]/[declarator.hh]:
//! qualifiers and pointers as prefix unaries, `(...)` shared with the
//! expression ruleset for grouping/cast disambiguation, `[...]` array-of
//! suffixes, `(...)` function-of suffixes (via the shared `call_rule`), and
//! the abstract-placeholder rule that lets a declarator omit its identifier.

use std::sync::LazyLock;

use crate::token::{is_type_qualifier, is_type_specifier, Keyword, Punctuator, TokenKind};

use super::{call_rule, paren_rule, token_rule, unary_prefix_rule, InfixRule, Node, ParseError, Parser, PrefixRule, Ruleset};

/// [declarator.hh]'s `declarator_precedence`: pointers and qualifiers share
/// one precedence tier, matching the original exactly.
const DP_POINTER: i32 = 1000;

/// [declarator.hh]'s `abstract_placeholder_rule`: fires on a token that
/// can't start a declarator (`)`, `,`, `]`), meaning the declarator being
/// parsed has no identifier. Crucially this does not consume the token.
fn abstract_placeholder_rule(p: &mut Parser, tok: crate::token::Token, _arg: i32) -> Result<Node, ParseError> {
    p.rewind();
    Ok(Node::AbstractPlaceholder { at: tok })
}

fn tag_rule(p: &mut Parser, keyword: crate::token::Token, _arg: i32) -> Result<Node, ParseError> {
    let name = if matches!(p.peek(), Some(t) if t.kind == TokenKind::Identifier) {
        Some(p.next()?)
    } else {
        None
    };
    Ok(Node::Tag { keyword, name })
}

/// [declarator.cc]'s `declarator_array_rule::parse`: a run of leading
/// type-qualifier/`static` keyword modifiers, an optional trailing `*`
/// VLA-of-unspecified-size modifier (backed out if it isn't immediately
/// followed by `]`, since the grammar requires the star modifier to be
/// last and a bare `*` otherwise starts a size expression), an optional
/// size expression (parsed against the expression ruleset, at precedence 0
/// so a comma operator would require parentheses, matching a C array-size
/// constant expression), then the closing `]`.
fn declarator_array_rule(p: &mut Parser, base: Node, lbracket: crate::token::Token, _prec: i32, _ra: bool) -> Result<Node, ParseError> {
    let mut mods = Vec::new();
    loop {
        match p.peek() {
            Some(t) if t.kind == TokenKind::Keyword => {
                let is_mod = t.is_keyword(Keyword::Static) || matches!(t.keyword, Some(kw) if is_type_qualifier(kw));
                if !is_mod {
                    break;
                }
                mods.push(p.next()?);
            }
            _ => break,
        }
    }
    if matches!(p.peek(), Some(t) if t.is_punctuator(Punctuator::Star)) {
        mods.push(p.next()?);
        if !matches!(p.peek(), Some(t) if t.is_punctuator(Punctuator::SquareRight)) {
            mods.pop();
            p.rewind();
        }
    }
    let size = if matches!(p.peek(), Some(t) if t.is_punctuator(Punctuator::SquareRight)) {
        None
    } else {
        p.push_ruleset(&super::expr::EXPR_RULESET);
        let size = p.parse(0);
        p.pop_ruleset();
        Some(Box::new(size?))
    };
    let rbracket = p.expect_punctuator(Punctuator::SquareRight, "]")?;
    Ok(Node::DeclaratorArray {
        base: Box::new(base),
        mods,
        size,
        lbracket,
        rbracket,
    })
}

pub static DECLARATOR_RULESET: LazyLock<Ruleset> = LazyLock::new(|| {
    let prefix = vec![
        PrefixRule {
            predicate: |t, _| {
                matches!(t.keyword, Some(kw) if (is_type_qualifier(kw) || is_type_specifier(kw))
                    && !matches!(kw, Keyword::Struct | Keyword::Union | Keyword::Enum))
            },
            parse: unary_prefix_rule,
            arg: DP_POINTER,
        },
        PrefixRule {
            predicate: |t, _| matches!(t.keyword, Some(kw) if matches!(kw, Keyword::Struct | Keyword::Union | Keyword::Enum)),
            parse: tag_rule,
            arg: 0,
        },
        PrefixRule {
            predicate: |t, _| t.kind == TokenKind::Identifier,
            parse: token_rule,
            arg: 0,
        },
        PrefixRule {
            predicate: |t, _| t.is_punctuator(Punctuator::Star),
            parse: unary_prefix_rule,
            arg: DP_POINTER,
        },
        PrefixRule {
            predicate: |t, _| t.is_punctuator(Punctuator::ParenLeft),
            parse: paren_rule,
            arg: 0,
        },
        PrefixRule {
            predicate: |t, _| {
                t.is_punctuator(Punctuator::ParenRight) || t.is_punctuator(Punctuator::Comma) || t.is_punctuator(Punctuator::SquareRight)
            },
            parse: abstract_placeholder_rule,
            arg: 0,
        },
    ];

    let infix = vec![
        InfixRule {
            predicate: |t, _| t.is_punctuator(Punctuator::ParenLeft),
            parse: call_rule,
            precedence: i32::MAX,
            right_assoc: false,
        },
        InfixRule {
            predicate: |t, _| t.is_punctuator(Punctuator::SquareLeft),
            parse: declarator_array_rule,
            precedence: DP_POINTER,
            right_assoc: false,
        },
    ];

    Ruleset { prefix, infix }
});

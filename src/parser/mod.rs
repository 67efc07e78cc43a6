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

//! A Pratt (operator-precedence) parser shared by two rule sets: C
//! expressions and C declarators. Both sets plug into the same `parse(min_prec)`
//! loop; what differs is which table of `(predicate, rule)` pairs is active
//! and what `could_be_expr_ahead` decides about a leading `(`.

pub mod declarator;
pub mod expr;
pub mod node;

use std::collections::HashSet;

use thiserror::Error as ThisError;

use crate::location::Location;
use crate::token::{Punctuator, Token, TokenKind};

pub use node::Node;

#[derive(ThisError, Debug, Clone)]
pub enum ParseError {
    #[error("no rule matched token '{spelling}'")]
    NoPrefixRule { spelling: String, at: Location },
    #[error("multiple prefix rules matched token '{spelling}' (internal error)")]
    AmbiguousPrefixRule { spelling: String, at: Location },
    #[error("multiple infix rules matched token '{spelling}' (internal error)")]
    AmbiguousInfixRule { spelling: String, at: Location },
    #[error("expected '{expected}', found '{found}'")]
    ExpectedToken {
        expected: &'static str,
        found: String,
        at: Location,
    },
    #[error("unexpected end of input while parsing")]
    UnexpectedEof,
}

/// A prefix rule's extra argument is the precedence a unary-prefix rule
/// should recurse at; rules that don't need it (token leaves, the shared
/// paren rule) ignore it.
pub type PrefixFn = fn(&mut Parser, Token, i32) -> Result<Node, ParseError>;
/// An infix rule's extra arguments are its own precedence and, for binary
/// operators, whether it's right-associative.
pub type InfixFn = fn(&mut Parser, Node, Token, i32, bool) -> Result<Node, ParseError>;

pub struct PrefixRule {
    pub predicate: fn(&Token, &Parser) -> bool,
    pub parse: PrefixFn,
    pub arg: i32,
}

pub struct InfixRule {
    pub predicate: fn(&Token, &Parser) -> bool,
    pub parse: InfixFn,
    pub precedence: i32,
    pub right_assoc: bool,
}

/// An ordered table of prefix and infix rules. Matching a token runs every
/// predicate in order; more than one match is a bug in the rule table, not
/// something a caller can provoke, so it surfaces as a `ParseError` rather
/// than a panic.
pub struct Ruleset {
    pub prefix: Vec<PrefixRule>,
    pub infix: Vec<InfixRule>,
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    cursor: usize,
    ruleset_stack: Vec<&'static Ruleset>,
    pub typedef_names: HashSet<String>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], initial: &'static Ruleset, typedef_names: HashSet<String>) -> Self {
        Self {
            tokens,
            cursor: 0,
            ruleset_stack: vec![initial],
            typedef_names,
        }
    }

    pub fn push_ruleset(&mut self, rs: &'static Ruleset) {
        self.ruleset_stack.push(rs);
    }

    pub fn pop_ruleset(&mut self) {
        assert!(self.ruleset_stack.len() > 1, "pop_ruleset on the outermost ruleset");
        self.ruleset_stack.pop();
    }

    fn current_ruleset(&self) -> &'static Ruleset {
        self.ruleset_stack.last().copied().expect("ruleset stack is never empty")
    }

    pub fn is_parsing_declarator(&self) -> bool {
        std::ptr::eq(self.current_ruleset(), &*declarator::DECLARATOR_RULESET)
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    pub fn has_next_token(&self) -> bool {
        self.cursor < self.tokens.len()
    }

    pub fn next(&mut self) -> Result<Token, ParseError> {
        let tok = self.tokens.get(self.cursor).cloned().ok_or(ParseError::UnexpectedEof)?;
        self.cursor += 1;
        Ok(tok)
    }

    /// Un-consumes the last token returned by [`Parser::next`]. Used by the
    /// abstract-placeholder rule, which must look at a token without eating
    /// it.
    pub fn rewind(&mut self) {
        assert!(self.cursor > 0, "rewind past the start of the token stream");
        self.cursor -= 1;
    }

    pub fn expect_punctuator(&mut self, p: Punctuator, name: &'static str) -> Result<Token, ParseError> {
        let tok = self.next()?;
        if tok.is_punctuator(p) {
            Ok(tok)
        } else {
            Err(ParseError::ExpectedToken {
                expected: name,
                found: tok.spelling.clone(),
                at: tok.start,
            })
        }
    }

    fn find_prefix(&self, tok: &Token) -> Result<(PrefixFn, i32), ParseError> {
        let mut found = None;
        for rule in &self.current_ruleset().prefix {
            if (rule.predicate)(tok, self) {
                if found.is_some() {
                    return Err(ParseError::AmbiguousPrefixRule {
                        spelling: tok.spelling.clone(),
                        at: tok.start,
                    });
                }
                found = Some((rule.parse, rule.arg));
            }
        }
        found.ok_or_else(|| ParseError::NoPrefixRule {
            spelling: tok.spelling.clone(),
            at: tok.start,
        })
    }

    fn find_infix(&self, tok: &Token) -> Result<Option<(InfixFn, i32, bool)>, ParseError> {
        let mut found = None;
        for rule in &self.current_ruleset().infix {
            if (rule.predicate)(tok, self) {
                if found.is_some() {
                    return Err(ParseError::AmbiguousInfixRule {
                        spelling: tok.spelling.clone(),
                        at: tok.start,
                    });
                }
                found = Some((rule.parse, rule.precedence, rule.right_assoc));
            }
        }
        Ok(found)
    }

    fn precedence_peek(&self) -> Result<i32, ParseError> {
        match self.peek() {
            None => Ok(0),
            Some(tok) => {
                let tok = tok.clone();
                Ok(self.find_infix(&tok)?.map(|(_, prec, _)| prec).unwrap_or(0))
            }
        }
    }

    /// The core Pratt loop: a prefix rule produces a seed node, then infix
    /// rules fold it leftward as long as the next token's precedence beats
    /// `min_prec`.
    pub fn parse(&mut self, min_prec: i32) -> Result<Node, ParseError> {
        let tok = self.next()?;
        let (prefix, arg) = self.find_prefix(&tok)?;
        let mut node = prefix(self, tok, arg)?;
        while min_prec < self.precedence_peek()? {
            let tok = self.next()?;
            let (infix, prec, right_assoc) = self
                .find_infix(&tok)?
                .expect("precedence_peek already confirmed a match");
            node = infix(self, node, tok, prec, right_assoc)?;
        }
        Ok(node)
    }

    /// [parser.cc]'s `could_be_expr_ahead`: decides, for a `paren_rule`
    /// invocation, whether what follows a `(` could start an expression
    /// (in which case it's a grouped expression) or must be a type name (in
    /// which case it's a cast). An identifier bound to a known typedef name
    /// can only be a type; `sizeof` keyword can only start an expression
    /// that happens to also accept a type (`sizeof(int)` is handled by the
    /// caller trying the cast branch first).
    pub fn could_be_expr_ahead(&self) -> bool {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier => !self.typedef_names.contains(&t.spelling),
            Some(t) if t.kind == TokenKind::Keyword => t.is_keyword(crate::token::Keyword::Sizeof),
            _ => true,
        }
    }
}

// --- Rules shared between the expression and declarator rule sets. ---

pub fn token_rule(_p: &mut Parser, tok: Token, _arg: i32) -> Result<Node, ParseError> {
    Ok(Node::TokenLeaf(tok))
}

pub fn unary_prefix_rule(p: &mut Parser, tok: Token, prec: i32) -> Result<Node, ParseError> {
    let operand = p.parse(prec)?;
    Ok(Node::Unary {
        op: tok,
        operand: Box::new(operand),
        prefix: true,
    })
}

/// A left-associative binary rule recurses at `prec`; a right-associative
/// one (assignment, `?:`'s implicit else-chain) recurses at `prec - 1` so an
/// equal-precedence operator to the right binds to it instead of to us.
pub fn binary_rule(p: &mut Parser, left: Node, tok: Token, prec: i32, right_assoc: bool) -> Result<Node, ParseError> {
    let rhs_prec = if right_assoc { prec - 1 } else { prec };
    let rhs = p.parse(rhs_prec)?;
    Ok(Node::Binary {
        op: tok,
        lhs: Box::new(left),
        rhs: Box::new(rhs),
    })
}

pub fn unary_postfix_rule(_p: &mut Parser, left: Node, tok: Token, _prec: i32, _ra: bool) -> Result<Node, ParseError> {
    Ok(Node::Unary {
        op: tok,
        operand: Box::new(left),
        prefix: false,
    })
}

/// [parser.cc]'s `paren_rule::parse`. Deciding cast-vs-group happens only
/// while parsing an expression (a declarator never re-enters this question:
/// `(*x)` inside a declarator is always a grouped sub-declarator) and only
/// when what follows couldn't itself start an ordinary expression.
pub fn paren_rule(p: &mut Parser, tok: Token, _arg: i32) -> Result<Node, ParseError> {
    if !p.is_parsing_declarator() && !p.could_be_expr_ahead() {
        p.push_ruleset(&declarator::DECLARATOR_RULESET);
        let type_decl = p.parse(0);
        p.pop_ruleset();
        let type_decl = type_decl?;
        let rparen = p.expect_punctuator(Punctuator::ParenRight, ")")?;
        let operand = p.parse(expr::Prec::Prefix as i32)?;
        return Ok(Node::Cast {
            lparen: tok,
            rparen,
            type_decl: Box::new(type_decl),
            operand: Box::new(operand),
        });
    }
    let body = p.parse(0)?;
    let rparen = p.expect_punctuator(Punctuator::ParenRight, ")")?;
    Ok(Node::Paren {
        left: tok,
        operand: Box::new(body),
        right: rparen,
    })
}

/// `callee(args...)` as an expression, or `ty-ident(params...)` as a
/// function-returning declarator: the only difference is what the argument
/// sub-parses parse at (an expression, or a nested declarator).
pub fn call_rule(p: &mut Parser, callee: Node, lparen: Token, _prec: i32, _ra: bool) -> Result<Node, ParseError> {
    let mut args = Vec::new();
    if !matches!(p.peek(), Some(t) if t.is_punctuator(Punctuator::ParenRight)) {
        loop {
            if p.is_parsing_declarator() {
                p.push_ruleset(&declarator::DECLARATOR_RULESET);
                let arg = p.parse(0);
                p.pop_ruleset();
                args.push(arg?);
            } else {
                // ep_assignment: a comma inside an argument list belongs to
                // the list, not to the argument itself.
                args.push(p.parse(expr::Prec::Assignment as i32)?);
            }
            match p.peek() {
                Some(t) if t.is_punctuator(Punctuator::Comma) => {
                    p.next()?;
                }
                _ => break,
            }
        }
    }
    let rparen = p.expect_punctuator(Punctuator::ParenRight, ")")?;
    Ok(Node::Call {
        callee: Box::new(callee),
        lparen,
        rparen,
        args,
    })
}

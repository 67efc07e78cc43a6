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

//! The parse tree. The original's `node` class hierarchy (one concrete
//! subclass per shape, dispatched through a virtual `range()`/`dump()` pair)
//! becomes a single tagged enum: Rust has no cheap virtual dispatch for an
//! owned tree, and a closed set of shapes is exactly what an enum is for.

use crate::location::Location;
use crate::token::Token;

#[derive(Debug, Clone)]
pub enum Node {
    /// A single token standing for itself: an identifier, a constant, a
    /// string literal.
    TokenLeaf(Token),
    Unary {
        op: Token,
        operand: Box<Node>,
        prefix: bool,
    },
    Paren {
        left: Token,
        operand: Box<Node>,
        right: Token,
    },
    Binary {
        op: Token,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Ternary {
        question: Token,
        colon: Token,
        cond: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Box<Node>,
    },
    Call {
        callee: Box<Node>,
        lparen: Token,
        rparen: Token,
        args: Vec<Node>,
    },
    Index {
        base: Box<Node>,
        lbracket: Token,
        index: Box<Node>,
        rbracket: Token,
    },
    /// An absent identifier in an abstract declarator, or the empty slot a
    /// cast's type-name leaves where a concrete declarator would otherwise
    /// have one. Produced without consuming a token.
    AbstractPlaceholder {
        at: Token,
    },
    /// `struct`/`union`/`enum` optionally followed by a tag name.
    Tag {
        keyword: Token,
        name: Option<Token>,
    },
    /// `lhs[mods... size]`, the array-of declarator suffix.
    DeclaratorArray {
        base: Box<Node>,
        mods: Vec<Token>,
        size: Option<Box<Node>>,
        lbracket: Token,
        rbracket: Token,
    },
    /// `(type-decl) operand`, the one place the parser has to decide between
    /// a grouped expression and a cast.
    Cast {
        lparen: Token,
        rparen: Token,
        type_decl: Box<Node>,
        operand: Box<Node>,
    },
}

impl Node {
    /// The source range this subtree spans, used for diagnostics.
    pub fn range(&self) -> (Location, Location) {
        match self {
            Node::TokenLeaf(t) => (t.start, t.end),
            Node::Unary { op, operand, prefix } => {
                if *prefix {
                    (op.start, operand.range().1)
                } else {
                    (operand.range().0, op.end)
                }
            }
            Node::Paren { left, right, .. } => (left.start, right.end),
            Node::Binary { lhs, rhs, .. } => (lhs.range().0, rhs.range().1),
            Node::Ternary { cond, else_branch, .. } => (cond.range().0, else_branch.range().1),
            Node::Call { callee, rparen, .. } => (callee.range().0, rparen.end),
            Node::Index { base, rbracket, .. } => (base.range().0, rbracket.end),
            Node::AbstractPlaceholder { at } => (at.start, at.end),
            Node::Tag { keyword, name } => (keyword.start, name.as_ref().map_or(keyword.end, |n| n.end)),
            Node::DeclaratorArray { base, rbracket, .. } => (base.range().0, rbracket.end),
            Node::Cast { lparen, operand, .. } => (lparen.start, operand.range().1),
        }
    }
}

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

//! The macro table: a `#define`d name's body, parameter list, and the flags
//! phase 4 needs to decide how to expand it. [`pp_phase4.cc`]'s `struct macro`
//! tracks name/body/parameters/function-like/variadic for redefinition
//! identity only; this adds `predefined` (so `__FILE__`-family names can't be
//! `#undef`'d or redefined). Hygiene during expansion is tracked entirely on
//! the token stream (each token's hideset), not here.

use indexmap::IndexMap;
use thiserror::Error as ThisError;

use crate::location::Location;
use crate::token::Token;

#[derive(Debug, Clone)]
pub struct Macro {
    pub name: String,
    pub definition_loc: Location,
    pub body: Vec<Token>,
    pub params: Vec<String>,
    pub function_like: bool,
    pub variadic: bool,
    pub predefined: bool,
}

#[derive(ThisError, Debug, Clone)]
pub enum PreprocessError {
    #[error("cannot open header file {0:?}")]
    CannotOpenFile(std::path::PathBuf),
    #[error("maximum include depth exceeded")]
    IncludeDepthExceeded,
}

/// Names [6.10.8] reserves for predefined macros: `#define`ing, `#undef`ing,
/// or redefining any of them incompatibly is a diagnosed (but non-fatal)
/// violation.
pub const PREDEFINED_NAMES: &[&str] = &[
    "__DATE__",
    "__TIME__",
    "__FILE__",
    "__LINE__",
    "__STDC__",
    "__STDC_HOSTED__",
    "__STDC_VERSION__",
];

/// The ordered table of macros currently in scope. Ordered so a `--dump-config`-
/// style introspection (or a test asserting the final macro set) sees
/// definitions in a stable, `#define`-order sequence.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: IndexMap<String, Macro>,
}

/// Outcome of attempting to install a `#define`. A redefinition identical to
/// the existing one is silent, per [6.10.3]/2; anything else that isn't a
/// brand-new name is a diagnosable mismatch the caller renders.
pub enum DefineOutcome {
    Installed,
    IdenticalRedefinition,
    Mismatch { previous_loc: Location },
    PredefinedName,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Macro> {
        self.macros.get_mut(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn insert_predefined(&mut self, m: Macro) {
        self.macros.insert(m.name.clone(), m);
    }

    /// [6.10.3]/2's redefinition-identity check: same function-like-ness,
    /// same variadic flag, same parameter names in order, and the same
    /// sequence of body token spellings (whitespace included, since
    /// `a+b` and `a + b` are different replacement lists).
    fn identical_to(existing: &Macro, function_like: bool, variadic: bool, params: &[String], body: &[Token]) -> bool {
        if existing.function_like != function_like || existing.variadic != variadic || existing.params != params {
            return false;
        }
        if existing.body.len() != body.len() {
            return false;
        }
        existing.body.iter().zip(body.iter()).all(|(a, b)| a.kind == b.kind && a.spelling == b.spelling)
    }

    pub fn define(&mut self, name: String, definition_loc: Location, body: Vec<Token>, params: Vec<String>, function_like: bool, variadic: bool) -> DefineOutcome {
        if PREDEFINED_NAMES.contains(&name.as_str()) {
            return DefineOutcome::PredefinedName;
        }
        if let Some(existing) = self.macros.get(&name) {
            if existing.predefined {
                return DefineOutcome::PredefinedName;
            }
            if Self::identical_to(existing, function_like, variadic, &params, &body) {
                return DefineOutcome::IdenticalRedefinition;
            }
            let previous_loc = existing.definition_loc;
            self.macros.insert(
                name.clone(),
                Macro {
                    name,
                    definition_loc,
                    body,
                    params,
                    function_like,
                    variadic,
                    predefined: false,
                },
            );
            return DefineOutcome::Mismatch { previous_loc };
        }
        self.macros.insert(
            name.clone(),
            Macro {
                name,
                definition_loc,
                body,
                params,
                function_like,
                variadic,
                predefined: false,
            },
        );
        DefineOutcome::Installed
    }

    /// `Ok(true)` if a macro was removed, `Ok(false)` if `name` wasn't
    /// defined, `Err` if `name` is a predefined macro (still not removed).
    pub fn undef(&mut self, name: &str) -> Result<bool, ()> {
        if PREDEFINED_NAMES.contains(&name) {
            return Err(());
        }
        Ok(self.macros.shift_remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Buffer, BufferArena, RawBuffer};
    use crate::token::TokenKind;

    fn loc(arena: &mut BufferArena) -> Location {
        let id = arena.push(Buffer::Raw(RawBuffer::new("f.c", "")));
        Location::new(id, 0)
    }

    fn tok(kind: TokenKind, spelling: &str, loc: Location) -> Token {
        Token::new(kind, spelling, loc, loc)
    }

    #[test]
    fn first_definition_installs() {
        let mut arena = BufferArena::new();
        let l = loc(&mut arena);
        let mut table = MacroTable::new();
        let outcome = table.define("FOO".to_string(), l, vec![tok(TokenKind::PpNumber, "1", l)], vec![], false, false);
        assert!(matches!(outcome, DefineOutcome::Installed));
        assert!(table.is_defined("FOO"));
    }

    #[test]
    fn identical_redefinition_is_silent() {
        let mut arena = BufferArena::new();
        let l = loc(&mut arena);
        let mut table = MacroTable::new();
        table.define("FOO".to_string(), l, vec![tok(TokenKind::PpNumber, "1", l)], vec![], false, false);
        let outcome = table.define("FOO".to_string(), l, vec![tok(TokenKind::PpNumber, "1", l)], vec![], false, false);
        assert!(matches!(outcome, DefineOutcome::IdenticalRedefinition));
    }

    #[test]
    fn differing_body_is_a_mismatch() {
        let mut arena = BufferArena::new();
        let l = loc(&mut arena);
        let mut table = MacroTable::new();
        table.define("FOO".to_string(), l, vec![tok(TokenKind::PpNumber, "1", l)], vec![], false, false);
        let outcome = table.define("FOO".to_string(), l, vec![tok(TokenKind::PpNumber, "2", l)], vec![], false, false);
        assert!(matches!(outcome, DefineOutcome::Mismatch { .. }));
    }

    #[test]
    fn predefined_name_cannot_be_defined_or_undefed() {
        let mut arena = BufferArena::new();
        let l = loc(&mut arena);
        let mut table = MacroTable::new();
        table.insert_predefined(Macro {
            name: "__LINE__".to_string(),
            definition_loc: l,
            body: vec![],
            params: vec![],
            function_like: false,
            variadic: false,
            predefined: true,
        });
        let outcome = table.define("__LINE__".to_string(), l, vec![], vec![], false, false);
        assert!(matches!(outcome, DefineOutcome::PredefinedName));
        assert!(table.undef("__LINE__").is_err());
    }

    #[test]
    fn undef_removes_a_user_macro() {
        let mut arena = BufferArena::new();
        let l = loc(&mut arena);
        let mut table = MacroTable::new();
        table.define("FOO".to_string(), l, vec![], vec![], false, false);
        assert_eq!(table.undef("FOO"), Ok(true));
        assert!(!table.is_defined("FOO"));
    }
}

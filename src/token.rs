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

//! The token representation shared by every phase, and the closed
//! punctuator/keyword spelling tables built once as immutable statics.

use std::collections::HashSet;
use std::rc::Rc;
use std::sync::LazyLock;

use indexmap::IndexMap;

use crate::location::{ExpandedFrom, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    HeaderName,
    Identifier,
    PpNumber,
    CharacterConstant,
    StringLiteral,
    Punctuator,
    Other,
    Space,
    Newline,
    Placemarker,
    Keyword,
    IntegerConstant,
    FloatingConstant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderNameKind {
    Quote,
    Angle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterConstantPrefix {
    None,
    /// `L'...'` - wchar_t
    Wide,
    /// `u'...'` - char16_t
    Char16,
    /// `U'...'` - char32_t
    Char32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StringLiteralPrefix {
    None,
    U8,
    Char16,
    Char32,
    Wide,
}

/// A preprocessing token or, after phase 7, a finalized token. The two
/// stages share this representation; `kind` distinguishes the pp-token-only
/// variants (`Space`, `Newline`, `Placemarker`, `HeaderName`) from the
/// terminal ones phase 7 produces (`Keyword`, `IntegerConstant`,
/// `FloatingConstant`).
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub spelling: String,
    pub start: Location,
    pub end: Location,
    pub punctuator: Option<Punctuator>,
    pub keyword: Option<Keyword>,
    /// A token whose identity is already settled (e.g. because its name
    /// failed macro lookup, or because it was produced by `##` during
    /// argument pre-scan) is "blue-painted": ineligible for further macro
    /// replacement.
    pub blue_flag: bool,
    pub expanded_from: Option<Rc<ExpandedFrom>>,
    pub header_name_kind: Option<HeaderNameKind>,
    pub string_prefix: Option<StringLiteralPrefix>,
    pub char_prefix: Option<CharacterConstantPrefix>,
    /// [6.10.3.4]'s hide set: names of the function-like/object-like macros
    /// already expanded along the chain that produced this token, so a
    /// self- or mutually-recursive reference inside a macro's own expansion
    /// stops instead of looping. Shared via `Rc` so extending it when a
    /// macro's body is substituted is a cheap clone-and-insert.
    pub hideset: Rc<HashSet<String>>,
}

impl Token {
    pub fn new(kind: TokenKind, spelling: impl Into<String>, start: Location, end: Location) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            start,
            end,
            punctuator: None,
            keyword: None,
            blue_flag: false,
            expanded_from: None,
            header_name_kind: None,
            string_prefix: None,
            char_prefix: None,
            hideset: Rc::new(HashSet::new()),
        }
    }

    pub fn is_punctuator(&self, p: Punctuator) -> bool {
        self.punctuator == Some(p)
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.keyword == Some(kw)
    }

    pub fn is_space_or_newline(&self) -> bool {
        matches!(self.kind, TokenKind::Space | TokenKind::Newline)
    }
}

/// [6.4.6]/1. Digraphs (`<:` `:>` `<%` `%>` `%:` `%:%:`) behave identically
/// to their primary spelling and so map to the same variant, per [6.4.6]/3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punctuator {
    SquareLeft,
    SquareRight,
    ParenLeft,
    ParenRight,
    CurlyLeft,
    CurlyRight,
    Dot,
    Arrow,
    PlusPlus,
    MinusMinus,
    Ampersand,
    Star,
    Plus,
    Minus,
    Tilde,
    Bang,
    Slash,
    Percent,
    LessLess,
    GreaterGreater,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    BangEqual,
    Caret,
    Pipe,
    AmpersandAmpersand,
    PipePipe,
    Question,
    Colon,
    Semicolon,
    Ellipsis,
    Equal,
    StarEqual,
    SlashEqual,
    PercentEqual,
    PlusEqual,
    MinusEqual,
    LessLessEqual,
    GreaterGreaterEqual,
    AmpersandEqual,
    CaretEqual,
    PipeEqual,
    Comma,
    Hash,
    HashHash,
}

pub const PUNCTUATOR_MAX_LEN: usize = 4;

pub static PUNCTUATOR_TABLE: LazyLock<IndexMap<&'static str, Punctuator>> = LazyLock::new(|| {
    use Punctuator::*;
    IndexMap::from([
        ("[", SquareLeft),
        ("]", SquareRight),
        ("(", ParenLeft),
        (")", ParenRight),
        ("{", CurlyLeft),
        ("}", CurlyRight),
        (".", Dot),
        ("->", Arrow),
        ("++", PlusPlus),
        ("--", MinusMinus),
        ("&", Ampersand),
        ("*", Star),
        ("+", Plus),
        ("-", Minus),
        ("~", Tilde),
        ("!", Bang),
        ("/", Slash),
        ("%", Percent),
        ("<<", LessLess),
        (">>", GreaterGreater),
        ("<", Less),
        (">", Greater),
        ("<=", LessEqual),
        (">=", GreaterEqual),
        ("==", EqualEqual),
        ("!=", BangEqual),
        ("^", Caret),
        ("|", Pipe),
        ("&&", AmpersandAmpersand),
        ("||", PipePipe),
        ("?", Question),
        (":", Colon),
        (";", Semicolon),
        ("...", Ellipsis),
        ("=", Equal),
        ("*=", StarEqual),
        ("/=", SlashEqual),
        ("%=", PercentEqual),
        ("+=", PlusEqual),
        ("-=", MinusEqual),
        ("<<=", LessLessEqual),
        (">>=", GreaterGreaterEqual),
        ("&=", AmpersandEqual),
        ("^=", CaretEqual),
        ("|=", PipeEqual),
        (",", Comma),
        ("#", Hash),
        ("##", HashHash),
        ("<:", SquareLeft),
        (":>", SquareRight),
        ("<%", CurlyLeft),
        ("%>", CurlyRight),
        ("%:", Hash),
        ("%:%:", HashHash),
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Auto,
    Break,
    Case,
    Char,
    Const,
    Continue,
    Default,
    Do,
    Double,
    Else,
    Enum,
    Extern,
    Float,
    For,
    Goto,
    If,
    Inline,
    Int,
    Long,
    Register,
    Restrict,
    Return,
    Short,
    Signed,
    Sizeof,
    Static,
    Struct,
    Switch,
    Typedef,
    Union,
    Unsigned,
    Void,
    Volatile,
    While,
    Alignas,
    Alignof,
    Atomic,
    Bool,
    Complex,
    Generic,
    Imaginary,
    Noreturn,
    StaticAssert,
    ThreadLocal,
}

pub static KEYWORD_TABLE: LazyLock<IndexMap<&'static str, Keyword>> = LazyLock::new(|| {
    use Keyword::*;
    IndexMap::from([
        ("auto", Auto),
        ("break", Break),
        ("case", Case),
        ("char", Char),
        ("const", Const),
        ("continue", Continue),
        ("default", Default),
        ("do", Do),
        ("double", Double),
        ("else", Else),
        ("enum", Enum),
        ("extern", Extern),
        ("float", Float),
        ("for", For),
        ("goto", Goto),
        ("if", If),
        ("inline", Inline),
        ("int", Int),
        ("long", Long),
        ("register", Register),
        ("restrict", Restrict),
        ("return", Return),
        ("short", Short),
        ("signed", Signed),
        ("sizeof", Sizeof),
        ("static", Static),
        ("struct", Struct),
        ("switch", Switch),
        ("typedef", Typedef),
        ("union", Union),
        ("unsigned", Unsigned),
        ("void", Void),
        ("volatile", Volatile),
        ("while", While),
        ("_Alignas", Alignas),
        ("_Alignof", Alignof),
        ("_Atomic", Atomic),
        ("_Bool", Bool),
        ("_Complex", Complex),
        ("_Generic", Generic),
        ("_Imaginary", Imaginary),
        ("_Noreturn", Noreturn),
        ("_Static_assert", StaticAssert),
        ("_Thread_local", ThreadLocal),
    ])
});

/// The triple-mode primitive §4.6 describes: SKIP makes a space/newline
/// transparent, STOP makes it act as end-of-input, TAKE yields it like any
/// other token. Shared by phase 3's header-name lookback and phase 4's
/// cursor over `input_tokens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Skip,
    Stop,
    Take,
}

/// Scans forward from `start`, skipping SKIP-mode spaces/newlines and
/// returning `None` the moment a STOP-mode one is reached, until the
/// `offset`-th surviving token is found.
pub fn scan_forward(
    tokens: &[Token],
    start: usize,
    offset: usize,
    space_mode: Mode,
    newline_mode: Mode,
) -> Option<usize> {
    let mut taken = 0;
    let mut i = start;
    while i < tokens.len() {
        let tok = &tokens[i];
        let is_space = tok.kind == TokenKind::Space;
        let is_newline = tok.kind == TokenKind::Newline;
        if (space_mode == Mode::Stop && is_space) || (newline_mode == Mode::Stop && is_newline) {
            return None;
        }
        let ignore = (space_mode == Mode::Skip && is_space) || (newline_mode == Mode::Skip && is_newline);
        if !ignore {
            if taken == offset {
                return Some(i);
            }
            taken += 1;
        }
        i += 1;
    }
    None
}

/// Scans backward from `end` (exclusive), the mirror of [`scan_forward`],
/// used to look at what was already lexed rather than what comes next.
pub fn scan_backward(
    tokens: &[Token],
    end: usize,
    offset: usize,
    space_mode: Mode,
    newline_mode: Mode,
) -> Option<usize> {
    let mut taken = 0;
    let mut i = end;
    while i > 0 {
        i -= 1;
        let tok = &tokens[i];
        let is_space = tok.kind == TokenKind::Space;
        let is_newline = tok.kind == TokenKind::Newline;
        if (space_mode == Mode::Stop && is_space) || (newline_mode == Mode::Stop && is_newline) {
            return None;
        }
        let ignore = (space_mode == Mode::Skip && is_space) || (newline_mode == Mode::Skip && is_newline);
        if !ignore {
            if taken == offset {
                return Some(i);
            }
            taken += 1;
        }
    }
    None
}

/// Is the type qualifier family of keywords (used by the declarator
/// ruleset's prefix dispatch).
pub fn is_type_qualifier(kw: Keyword) -> bool {
    matches!(
        kw,
        Keyword::Atomic | Keyword::Const | Keyword::Volatile | Keyword::Restrict
    )
}

pub fn is_type_specifier(kw: Keyword) -> bool {
    matches!(
        kw,
        Keyword::Void
            | Keyword::Char
            | Keyword::Short
            | Keyword::Int
            | Keyword::Long
            | Keyword::Float
            | Keyword::Double
            | Keyword::Signed
            | Keyword::Unsigned
            | Keyword::Bool
            | Keyword::Complex
            | Keyword::Struct
            | Keyword::Union
            | Keyword::Enum
    )
}

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

//! Phases 5 through 7: escape-sequence semantics are carried by the token's
//! `spelling` already, so what's left here is string-literal concatenation
//! (phase 6) and the pp-token -> token finalization (phase 7): keyword
//! lookup, integer/floating classification, and dropping whitespace.

use crate::message::{Diagnostic, Diagnostics};
use crate::token::{StringLiteralPrefix, Token, TokenKind, KEYWORD_TABLE};

pub fn finalize(diags: &mut Diagnostics, tokens: Vec<Token>) -> Vec<Token> {
    let concatenated = concat_adjacent_strings(diags, tokens);
    convert_to_tokens(diags, concatenated)
}

/// [6.4.5]/5: adjacent string-literal tokens (separated only by whitespace)
/// concatenate into one. Differing "wide" prefixes (`L`/`u`/`U`) is a
/// diagnosed clash; so is mixing `u8` with any of them.
fn concat_adjacent_strings(diags: &mut Diagnostics, tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].kind != TokenKind::StringLiteral {
            out.push(tokens[i].clone());
            i += 1;
            continue;
        }
        let mut group = vec![i];
        let mut j = i + 1;
        loop {
            let mut k = j;
            while matches!(tokens.get(k).map(|t| t.kind), Some(TokenKind::Space) | Some(TokenKind::Newline)) {
                k += 1;
            }
            if matches!(tokens.get(k).map(|t| t.kind), Some(TokenKind::StringLiteral)) {
                group.push(k);
                j = k + 1;
            } else {
                break;
            }
        }
        if group.len() == 1 {
            out.push(tokens[i].clone());
        } else {
            out.push(merge_string_group(diags, &tokens, &group));
        }
        i = *group.last().unwrap() + 1;
    }
    out
}

fn prefix_len(p: StringLiteralPrefix) -> usize {
    match p {
        StringLiteralPrefix::None => 0,
        StringLiteralPrefix::U8 => 2,
        StringLiteralPrefix::Char16 | StringLiteralPrefix::Char32 | StringLiteralPrefix::Wide => 1,
    }
}

fn string_body(tok: &Token) -> &str {
    let plen = prefix_len(tok.string_prefix.unwrap_or(StringLiteralPrefix::None));
    &tok.spelling[plen + 1..tok.spelling.len() - 1]
}

fn merge_string_group(diags: &mut Diagnostics, tokens: &[Token], idxs: &[usize]) -> Token {
    let mut has_u8 = false;
    let mut wide: Option<StringLiteralPrefix> = None;
    let mut wide_clash = false;
    let mut body = String::new();
    for &idx in idxs {
        let t = &tokens[idx];
        match t.string_prefix.unwrap_or(StringLiteralPrefix::None) {
            StringLiteralPrefix::U8 => has_u8 = true,
            StringLiteralPrefix::None => {}
            other => match wide {
                Some(w) if w != other => wide_clash = true,
                Some(_) => {}
                None => wide = Some(other),
            },
        }
        body.push_str(string_body(t));
    }
    let start = tokens[idxs[0]].start;
    let end = tokens[*idxs.last().unwrap()].end;
    if has_u8 && wide.is_some() {
        diags.push(
            Diagnostic::error(Some(start), "concatenating a UTF-8 string literal with a wide string literal is undefined")
                .with_citation("[6.4.5]/5"),
        );
    }
    if wide_clash {
        diags.push(
            Diagnostic::error(Some(start), "concatenating string literals with different wide-character prefixes is undefined")
                .with_citation("[6.4.5]/5"),
        );
    }
    let final_prefix = wide.unwrap_or(if has_u8 { StringLiteralPrefix::U8 } else { StringLiteralPrefix::None });
    let prefix_str = match final_prefix {
        StringLiteralPrefix::None => "",
        StringLiteralPrefix::U8 => "u8",
        StringLiteralPrefix::Char16 => "u",
        StringLiteralPrefix::Char32 => "U",
        StringLiteralPrefix::Wide => "L",
    };
    let spelling = format!("{prefix_str}\"{body}\"");
    let mut tok = Token::new(TokenKind::StringLiteral, spelling, start, end);
    tok.string_prefix = Some(final_prefix);
    tok
}

/// Phase 7: whitespace tokens are dropped, identifiers that spell a keyword
/// become `Keyword` tokens, and `pp-number`s resolve to an integer or
/// floating constant (or are diagnosed if neither suffix grammar fits).
fn convert_to_tokens(diags: &mut Diagnostics, tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    for mut t in tokens {
        match t.kind {
            TokenKind::Space | TokenKind::Newline | TokenKind::Placemarker => continue,
            TokenKind::Identifier => {
                if let Some(&kw) = KEYWORD_TABLE.get(t.spelling.as_str()) {
                    t.kind = TokenKind::Keyword;
                    t.keyword = Some(kw);
                }
                out.push(t);
            }
            TokenKind::PpNumber => match classify_pp_number(&t.spelling) {
                Some(kind) => {
                    t.kind = kind;
                    out.push(t);
                }
                None => {
                    diags.push(
                        Diagnostic::error(Some(t.start), format!("'{}' is not a valid integer or floating constant", t.spelling))
                            .with_citation("[6.4.4.1]/[6.4.4.2]"),
                    );
                    out.push(t);
                }
            },
            _ => out.push(t),
        }
    }
    out
}

fn classify_pp_number(s: &str) -> Option<crate::token::TokenKind> {
    let lower = s.to_ascii_lowercase();
    let is_hex = lower.starts_with("0x");
    let is_float_core = s.contains('.') || if is_hex { lower.contains('p') } else { lower.contains('e') };
    if is_float_core {
        let suffix_len = s.chars().rev().take_while(|c| matches!(c, 'f' | 'F' | 'l' | 'L')).count();
        let core_end = s.len() - suffix_len;
        if core_end == 0 {
            return None;
        }
        let suffix = s[core_end..].to_ascii_lowercase();
        if matches!(suffix.as_str(), "" | "f" | "l") {
            Some(TokenKind::FloatingConstant)
        } else {
            None
        }
    } else {
        let suffix_len = s.chars().rev().take_while(|c| matches!(c, 'u' | 'U' | 'l' | 'L')).count();
        let core_end = s.len() - suffix_len;
        if core_end == 0 {
            return None;
        }
        let suffix = s[core_end..].to_ascii_lowercase();
        if matches!(suffix.as_str(), "" | "u" | "l" | "ul" | "lu" | "ll" | "ull" | "llu") {
            Some(TokenKind::IntegerConstant)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Buffer, BufferArena, RawBuffer};
    use crate::location::Location;
    use crate::token::CharacterConstantPrefix;

    fn tok(arena: &mut BufferArena, kind: TokenKind, spelling: &str) -> Token {
        let id = arena.push(Buffer::Raw(RawBuffer::new("t", spelling)));
        Token::new(kind, spelling, Location::new(id, 0), Location::new(id, spelling.len()))
    }

    #[test]
    fn adjacent_string_literals_concatenate() {
        let mut arena = BufferArena::new();
        let mut diags = Diagnostics::new();
        let a = tok(&mut arena, TokenKind::StringLiteral, "\"foo\"");
        let sp = tok(&mut arena, TokenKind::Space, " ");
        let b = tok(&mut arena, TokenKind::StringLiteral, "\"bar\"");
        let out = finalize(&mut diags, vec![a, sp, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].spelling, "\"foobar\"");
    }

    #[test]
    fn u8_and_wide_concatenation_is_diagnosed() {
        let mut arena = BufferArena::new();
        let mut diags = Diagnostics::new();
        let mut a = tok(&mut arena, TokenKind::StringLiteral, "u8\"a\"");
        a.string_prefix = Some(StringLiteralPrefix::U8);
        let mut b = tok(&mut arena, TokenKind::StringLiteral, "L\"b\"");
        b.string_prefix = Some(StringLiteralPrefix::Wide);
        finalize(&mut diags, vec![a, b]);
        assert!(diags.has_errors());
    }

    #[test]
    fn keyword_identifier_becomes_keyword_token() {
        let mut arena = BufferArena::new();
        let mut diags = Diagnostics::new();
        let t = tok(&mut arena, TokenKind::Identifier, "return");
        let out = finalize(&mut diags, vec![t]);
        assert_eq!(out[0].kind, TokenKind::Keyword);
    }

    #[test]
    fn pp_number_classifies_integer_and_float() {
        let mut arena = BufferArena::new();
        let mut diags = Diagnostics::new();
        let a = tok(&mut arena, TokenKind::PpNumber, "123ull");
        let b = tok(&mut arena, TokenKind::PpNumber, "3.14f");
        let c = tok(&mut arena, TokenKind::PpNumber, "0xFF");
        let out = finalize(&mut diags, vec![a, b, c]);
        assert_eq!(out[0].kind, TokenKind::IntegerConstant);
        assert_eq!(out[1].kind, TokenKind::FloatingConstant);
        assert_eq!(out[2].kind, TokenKind::IntegerConstant);
        assert!(!diags.has_errors());
    }

    #[test]
    fn malformed_pp_number_is_diagnosed() {
        let mut arena = BufferArena::new();
        let mut diags = Diagnostics::new();
        let t = tok(&mut arena, TokenKind::PpNumber, "123qq");
        finalize(&mut diags, vec![t]);
        assert!(diags.has_errors());
    }

    #[test]
    fn whitespace_tokens_are_dropped() {
        let mut arena = BufferArena::new();
        let mut diags = Diagnostics::new();
        let a = tok(&mut arena, TokenKind::Identifier, "x");
        let sp = tok(&mut arena, TokenKind::Space, " ");
        let out = finalize(&mut diags, vec![a, sp]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn character_constant_is_untouched_by_finalize() {
        let mut arena = BufferArena::new();
        let mut diags = Diagnostics::new();
        let mut t = tok(&mut arena, TokenKind::CharacterConstant, "'a'");
        t.char_prefix = Some(CharacterConstantPrefix::None);
        let out = finalize(&mut diags, vec![t]);
        assert_eq!(out[0].kind, TokenKind::CharacterConstant);
    }
}

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

//! Translation phase 3 [5.1.1.2]/1.3: the longest-match preprocessing-token
//! lexer. At every position every candidate kind is attempted; the longest
//! spelling wins, with header-name beating string-literal on a tie and any
//! other tie diagnosed as ambiguous.

use crate::buffer::{BufferArena, BufferId};
use crate::location::Location;
use crate::message::{Diagnostic, Diagnostics};
use crate::token::{
    CharacterConstantPrefix, HeaderNameKind, Mode, StringLiteralPrefix, Token, TokenKind,
    PUNCTUATOR_MAX_LEN, PUNCTUATOR_TABLE, scan_backward,
};

/// Runs phase 3 over `buf`'s data (already through phases 1 and 2),
/// producing the full pp-token stream including `Space`/`Newline` tokens.
pub fn run(arena: &BufferArena, diags: &mut Diagnostics, buf: BufferId) -> Vec<Token> {
    let data = arena.data(buf);
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < data.len() {
        if let Some((len, is_newline)) = lex_whitespace(data, index, diags, buf) {
            let spelling = if is_newline { "\n" } else { " " };
            let kind = if is_newline { TokenKind::Newline } else { TokenKind::Space };
            let tok = make_token(kind, spelling, buf, index, index + len);
            tokens.push(tok);
            index += len;
            continue;
        }

        let candidates = lex_candidates(data, index, &tokens);
        let Some(best) = pick_longest(&candidates, diags, buf, index) else {
            let ch = &data[index..index + 1];
            if ch == "'" || ch == "\"" {
                let name = if ch == "'" { "single" } else { "double" };
                diags.push(Diagnostic::undefined_behavior(
                    Some(Location::new(buf, index)),
                    format!("stray unmatched {name} quote"),
                ));
            }
            tokens.push(make_token(TokenKind::Other, ch, buf, index, index + 1));
            index += 1;
            continue;
        };

        let mut tok = make_token(best.kind, &data[index..index + best.len], buf, index, index + best.len);
        match best.kind {
            TokenKind::Punctuator => tok.punctuator = best.punctuator,
            TokenKind::HeaderName => tok.header_name_kind = best.header_kind,
            TokenKind::StringLiteral => tok.string_prefix = best.string_prefix,
            TokenKind::CharacterConstant => tok.char_prefix = best.char_prefix,
            _ => {}
        }
        if best.kind == TokenKind::HeaderName {
            check_header_name_body(&tok.spelling, buf, index, diags);
        }
        index += best.len;
        tokens.push(tok);
    }

    tokens
}

fn make_token(kind: TokenKind, spelling: &str, buf: BufferId, start: usize, end: usize) -> Token {
    Token::new(kind, spelling, Location::new(buf, start), Location::new(buf, end))
}

struct Candidate {
    kind: TokenKind,
    len: usize,
    punctuator: Option<crate::token::Punctuator>,
    header_kind: Option<HeaderNameKind>,
    string_prefix: Option<StringLiteralPrefix>,
    char_prefix: Option<CharacterConstantPrefix>,
}

impl Candidate {
    fn simple(kind: TokenKind, len: usize) -> Self {
        Self { kind, len, punctuator: None, header_kind: None, string_prefix: None, char_prefix: None }
    }
}

fn lex_candidates(data: &str, index: usize, tokens: &[Token]) -> Vec<Candidate> {
    let mut out = Vec::new();
    if allow_header_name(tokens) {
        if let Some((len, kind)) = lex_header_name(data, index) {
            out.push(Candidate { header_kind: Some(kind), ..Candidate::simple(TokenKind::HeaderName, len) });
        }
    }
    if let Some(len) = lex_identifier(data, index) {
        out.push(Candidate::simple(TokenKind::Identifier, len));
    }
    if let Some(len) = lex_pp_number(data, index) {
        out.push(Candidate::simple(TokenKind::PpNumber, len));
    }
    if let Some((len, punc)) = lex_punctuator(data, index) {
        out.push(Candidate { punctuator: Some(punc), ..Candidate::simple(TokenKind::Punctuator, len) });
    }
    if let Some((len, prefix)) = lex_character_constant(data, index) {
        out.push(Candidate { char_prefix: Some(prefix), ..Candidate::simple(TokenKind::CharacterConstant, len) });
    }
    if let Some((len, prefix)) = lex_string_literal(data, index) {
        out.push(Candidate { string_prefix: Some(prefix), ..Candidate::simple(TokenKind::StringLiteral, len) });
    }
    out
}

/// Picks the longest candidate, diagnosing a tie unless it's the
/// header-name/string-literal exemption from [6.4]/4.
fn pick_longest<'a>(
    candidates: &'a [Candidate],
    diags: &mut Diagnostics,
    buf: BufferId,
    index: usize,
) -> Option<&'a Candidate> {
    let best = candidates.iter().max_by_key(|c| c.len)?;
    let tied: Vec<&Candidate> = candidates.iter().filter(|c| c.len == best.len).collect();
    if tied.len() > 1 {
        let header_vs_string = tied.len() == 2
            && tied.iter().any(|c| c.kind == TokenKind::HeaderName)
            && tied.iter().any(|c| c.kind == TokenKind::StringLiteral);
        if !header_vs_string {
            diags.push(Diagnostic::error(
                Some(Location::new(buf, index)),
                "ambiguous preprocessing token lex",
            ));
        }
    }
    // Header-name wins any tie it's part of.
    tied.into_iter().find(|c| c.kind == TokenKind::HeaderName).or(Some(best))
}

fn allow_header_name(tokens: &[Token]) -> bool {
    let end = tokens.len();
    let Some(i) = scan_backward(tokens, end, 0, Mode::Skip, Mode::Stop) else { return false };
    if tokens[i].kind != TokenKind::Identifier || tokens[i].spelling != "include" {
        return false;
    }
    let Some(j) = scan_backward(tokens, end, 1, Mode::Skip, Mode::Stop) else { return false };
    if !tokens[j].is_punctuator(crate::token::Punctuator::Hash) {
        return false;
    }
    match scan_backward(tokens, end, 2, Mode::Skip, Mode::Take) {
        None => true,
        Some(k) => tokens[k].kind == TokenKind::Newline,
    }
}

fn check_header_name_body(spelling: &str, buf: BufferId, index: usize, diags: &mut Diagnostics) {
    let body = &spelling[1..spelling.len() - 1];
    let is_angle = spelling.starts_with('<');
    for seq in ["'", "\\", "//", "/*"] {
        if let Some(pos) = body.find(seq) {
            let quote = if seq == "'" { '"' } else { '\'' };
            diags.push(Diagnostic::undefined_behavior(
                Some(Location::new(buf, index + 1 + pos)),
                format!("{quote}{seq}{quote} in header-name body is undefined behavior"),
            ));
        }
    }
    if !is_angle {
        // `"` inside `<...>` is fine but not inside `"..."`; already excluded
        // from `body` by construction since the closing quote terminates it.
    }
}

fn byte_at(data: &str, index: usize) -> Option<u8> {
    data.as_bytes().get(index).copied()
}

fn starts_with_at(data: &str, index: usize, pat: &str) -> bool {
    data.as_bytes()[index..].starts_with(pat.as_bytes())
}

fn lex_ucn(data: &str, index: usize) -> Option<usize> {
    let digits = if starts_with_at(data, index, "\\u") {
        4
    } else if starts_with_at(data, index, "\\U") {
        8
    } else {
        return None;
    };
    let hex = data.as_bytes().get(index + 2..index + 2 + digits)?;
    if hex.iter().all(|b| b.is_ascii_hexdigit()) {
        Some(2 + digits)
    } else {
        None
    }
}

fn lex_identifier_nondigit(data: &str, index: usize) -> Option<usize> {
    if let Some(len) = lex_ucn(data, index) {
        return Some(len);
    }
    match byte_at(data, index)? {
        b if b.is_ascii_alphabetic() || b == b'_' => Some(1),
        _ => None,
    }
}

fn lex_digit(data: &str, index: usize) -> Option<usize> {
    match byte_at(data, index)? {
        b if b.is_ascii_digit() => Some(1),
        _ => None,
    }
}

fn lex_identifier(data: &str, index: usize) -> Option<usize> {
    let mut size = lex_identifier_nondigit(data, index)?;
    loop {
        if let Some(d) = lex_digit(data, index + size) {
            size += d;
        } else if let Some(nd) = lex_identifier_nondigit(data, index + size) {
            size += nd;
        } else {
            break;
        }
    }
    Some(size)
}

fn lex_pp_number_exp(data: &str, index: usize) -> Option<usize> {
    let bytes = data.as_bytes();
    let a = *bytes.get(index)?;
    let b = *bytes.get(index + 1)?;
    let exp_letter = matches!(a, b'e' | b'E' | b'p' | b'P');
    let sign = matches!(b, b'+' | b'-');
    (exp_letter && sign).then_some(2)
}

fn lex_pp_number(data: &str, index: usize) -> Option<usize> {
    let mut size = 0;
    if byte_at(data, index) == Some(b'.') {
        size += 1;
    }
    size += lex_digit(data, index + size)?;
    loop {
        if let Some(e) = lex_pp_number_exp(data, index + size) {
            size += e;
        } else if let Some(nd) = lex_identifier_nondigit(data, index + size) {
            size += nd;
        } else if byte_at(data, index + size) == Some(b'.') {
            size += 1;
        } else if let Some(d) = lex_digit(data, index + size) {
            size += d;
        } else {
            break;
        }
    }
    Some(size)
}

fn lex_punctuator(data: &str, index: usize) -> Option<(usize, crate::token::Punctuator)> {
    let remaining = data.len() - index;
    for len in (1..=PUNCTUATOR_MAX_LEN.min(remaining)).rev() {
        if let Some(&punc) = PUNCTUATOR_TABLE.get(&data[index..index + len]) {
            return Some((len, punc));
        }
    }
    None
}

fn lex_simple_escape(data: &str, index: usize) -> Option<usize> {
    const SIMPLE: &[u8] = b"'\"?\\abfnrtv";
    let bytes = data.as_bytes();
    if *bytes.get(index)? != b'\\' {
        return None;
    }
    let c = *bytes.get(index + 1)?;
    SIMPLE.contains(&c).then_some(2)
}

fn lex_octal_escape(data: &str, index: usize) -> Option<usize> {
    let bytes = data.as_bytes();
    if *bytes.get(index)? != b'\\' {
        return None;
    }
    let is_octal = |b: u8| (b'0'..=b'7').contains(&b);
    if !is_octal(*bytes.get(index + 1)?) {
        return None;
    }
    let mut size = 2;
    for _ in 0..2 {
        match bytes.get(index + size) {
            Some(&b) if is_octal(b) => size += 1,
            _ => break,
        }
    }
    Some(size)
}

fn lex_hex_escape(data: &str, index: usize) -> Option<usize> {
    if !starts_with_at(data, index, "\\x") {
        return None;
    }
    let bytes = data.as_bytes();
    let mut size = 2;
    while matches!(bytes.get(index + size), Some(b) if b.is_ascii_hexdigit()) {
        size += 1;
    }
    (size > 2).then_some(size)
}

fn lex_escape(data: &str, index: usize) -> Option<usize> {
    lex_simple_escape(data, index)
        .or_else(|| lex_octal_escape(data, index))
        .or_else(|| lex_hex_escape(data, index))
        .or_else(|| lex_ucn(data, index))
}

fn lex_character_constant(data: &str, index: usize) -> Option<(usize, CharacterConstantPrefix)> {
    let (prefix, prefix_size) = match byte_at(data, index) {
        Some(b'L') => (CharacterConstantPrefix::Wide, 1),
        Some(b'u') => (CharacterConstantPrefix::Char16, 1),
        Some(b'U') => (CharacterConstantPrefix::Char32, 1),
        _ => (CharacterConstantPrefix::None, 0),
    };
    if byte_at(data, index + prefix_size) != Some(b'\'') {
        return None;
    }
    let body_start = index + prefix_size + 1;
    let mut i = 0;
    loop {
        if let Some(e) = lex_escape(data, body_start + i) {
            i += e;
            continue;
        }
        match byte_at(data, body_start + i) {
            Some(b'\'') | Some(b'\\') | Some(b'\n') | None => break,
            Some(_) => i += 1,
        }
    }
    if byte_at(data, body_start + i) != Some(b'\'') {
        return None;
    }
    Some((body_start + i + 1 - index, prefix))
}

fn lex_string_literal(data: &str, index: usize) -> Option<(usize, StringLiteralPrefix)> {
    let (prefix, prefix_size) = if starts_with_at(data, index, "u8") {
        (StringLiteralPrefix::U8, 2)
    } else {
        match byte_at(data, index) {
            Some(b'u') => (StringLiteralPrefix::Char16, 1),
            Some(b'U') => (StringLiteralPrefix::Char32, 1),
            Some(b'L') => (StringLiteralPrefix::Wide, 1),
            _ => (StringLiteralPrefix::None, 0),
        }
    };
    if byte_at(data, index + prefix_size) != Some(b'"') {
        return None;
    }
    let body_start = index + prefix_size + 1;
    let mut i = 0;
    loop {
        if let Some(e) = lex_escape(data, body_start + i) {
            i += e;
            continue;
        }
        match byte_at(data, body_start + i) {
            Some(b'"') | Some(b'\\') | Some(b'\n') | None => break,
            Some(_) => i += 1,
        }
    }
    if byte_at(data, body_start + i) != Some(b'"') {
        return None;
    }
    Some((body_start + i + 1 - index, prefix))
}

fn lex_header_name(data: &str, index: usize) -> Option<(usize, HeaderNameKind)> {
    let (kind, close) = match byte_at(data, index)? {
        b'<' => (HeaderNameKind::Angle, b'>'),
        b'"' => (HeaderNameKind::Quote, b'"'),
        _ => return None,
    };
    let bytes = data.as_bytes();
    let mut i = index + 1;
    while i < bytes.len() && bytes[i] != close {
        if bytes[i] == b'\n' {
            return None;
        }
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }
    Some((i + 1 - index, kind))
}

fn measure_comment(data: &str, index: usize, diags: &mut Diagnostics, buf: BufferId) -> (usize, bool) {
    if starts_with_at(data, index, "//") {
        let rest = &data[index..];
        let len = rest.find('\n').unwrap_or(rest.len());
        (len, false)
    } else if starts_with_at(data, index, "/*") {
        let rest = &data[index..];
        match rest.find("*/") {
            Some(pos) => (pos + 2, false),
            None => {
                diags.push(Diagnostic::error(
                    Some(Location::new(buf, index)),
                    "unterminated block comment",
                ));
                (rest.len(), true)
            }
        }
    } else {
        (0, false)
    }
}

fn measure_non_newline_whitespace(data: &str, index: usize) -> usize {
    let bytes = data.as_bytes();
    let mut size = 0;
    while let Some(&b) = bytes.get(index + size) {
        if b == b'\n' || !(b as char).is_ascii_whitespace() {
            break;
        }
        size += 1;
    }
    size
}

/// Returns `(length, as_newline)`: a literal `\n` or a comment that ran to
/// end-of-file both report `as_newline = true` ([6.4.9]'s "downgrade to
/// newline" rule for an unterminated comment).
fn lex_whitespace(data: &str, index: usize, diags: &mut Diagnostics, buf: BufferId) -> Option<(usize, bool)> {
    if byte_at(data, index) == Some(b'\n') {
        return Some((1, true));
    }
    let mut size = 0;
    let mut hit_unterminated_comment = false;
    loop {
        let ws = measure_non_newline_whitespace(data, index + size);
        if ws > 0 {
            size += ws;
            continue;
        }
        let (comment, unterminated) = measure_comment(data, index + size, diags, buf);
        if comment > 0 {
            size += comment;
            hit_unterminated_comment |= unterminated;
            continue;
        }
        break;
    }
    if size == 0 {
        None
    } else {
        Some((size, hit_unterminated_comment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Buffer, RawBuffer};

    fn lex(text: &str) -> (Vec<Token>, Diagnostics) {
        let mut arena = BufferArena::new();
        let id = arena.push(Buffer::Raw(RawBuffer::new("f.c", text)));
        let mut diags = Diagnostics::new();
        let toks = run(&arena, &mut diags, id);
        (toks, diags)
    }

    fn kinds(toks: &[Token]) -> Vec<TokenKind> {
        toks.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn simple_define_line() {
        let (toks, diags) = lex("#define X 1\n");
        assert!(diags.0.is_empty());
        let spellings: Vec<&str> = toks.iter().map(|t| t.spelling.as_str()).collect();
        assert_eq!(spellings, vec!["#", "define", " ", "X", " ", "1", "\n"]);
    }

    #[test]
    fn longest_match_absorbs_sign_after_exponent() {
        let (toks, _) = lex("0xE+1\n");
        assert_eq!(toks[0].spelling, "0xE+1");
        assert_eq!(toks[0].kind, TokenKind::PpNumber);
    }

    #[test]
    fn space_breaks_the_longest_match() {
        let (toks, _) = lex("0xE +1\n");
        let spellings: Vec<&str> = toks.iter().map(|t| t.spelling.as_str()).collect();
        assert_eq!(spellings, vec!["0xE", " ", "+1", "\n"]);
    }

    #[test]
    fn header_name_beats_string_literal_after_include() {
        let (toks, diags) = lex("#include \"a.h\"\n");
        assert!(diags.0.is_empty());
        assert_eq!(toks[3].kind, TokenKind::HeaderName);
        assert_eq!(toks[3].spelling, "\"a.h\"");
    }

    #[test]
    fn string_literal_without_include_context() {
        let (toks, _) = lex("\"a.h\"\n");
        assert_eq!(toks[0].kind, TokenKind::StringLiteral);
    }

    #[test]
    fn comment_collapses_to_a_single_space() {
        let (toks, diags) = lex("a/* multi\nline */b\n");
        assert!(diags.0.is_empty());
        let spellings: Vec<&str> = toks.iter().map(|t| t.spelling.as_str()).collect();
        assert_eq!(spellings, vec!["a", " ", "b", "\n"]);
    }

    #[test]
    fn unterminated_block_comment_is_diagnosed_and_downgraded() {
        let (toks, diags) = lex("a /* never closed\n");
        assert_eq!(diags.0.len(), 1);
        assert_eq!(kinds(&toks).last(), Some(&TokenKind::Newline));
    }

    #[test]
    fn stray_quote_is_an_other_token_with_diagnostic() {
        let (toks, diags) = lex("'\n");
        assert_eq!(toks[0].kind, TokenKind::Other);
        assert_eq!(diags.0.len(), 1);
    }

    #[test]
    fn token_ranges_tile_the_buffer_without_gaps() {
        let (toks, _) = lex("#define X(a,b) a##b\nX(foo, 42)\n");
        let mut expected_start = 0usize;
        for tok in &toks {
            assert_eq!(tok.start.offset, expected_start);
            expected_start = tok.end.offset;
        }
    }
}

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

//! The diagnostic engine: categorized, cited, located messages with notes,
//! rendered the way §6 of the design specifies:
//! `<file>:<line>:<col>: <category>: <message> [citation]`, followed by the
//! offending source line and a caret.

use std::rc::Rc;

use crate::buffer::{Buffer, BufferArena};
use crate::location::{ExpandedFrom, Location};
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    UndefinedBehavior,
    Auxiliary,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::UndefinedBehavior => "undefined-behavior",
            Severity::Auxiliary => "auxiliary",
        }
    }

    /// Only `Error` sets the process exit code, per §6.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

/// An auxiliary note chained onto a primary diagnostic: "previous definition
/// is here", "expanded from here", "included here".
#[derive(Debug, Clone)]
pub struct Note {
    pub location: Option<Location>,
    pub message: String,
}

impl Note {
    pub fn new(location: Option<Location>, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Option<Location>,
    pub message: String,
    pub citation: Option<&'static str>,
    pub notes: Vec<Note>,
    /// The macro-expansion provenance of `location`, if it was produced by a
    /// token carrying one. Rendered as a chain of "expanded from here" notes
    /// ahead of any explicit ones.
    pub expansion_chain: Option<Rc<ExpandedFrom>>,
}

impl Diagnostic {
    pub fn new(severity: Severity, location: Option<Location>, message: impl Into<String>) -> Self {
        Self {
            severity,
            location,
            message: message.into(),
            citation: None,
            notes: Vec::new(),
            expansion_chain: None,
        }
    }

    pub fn error(location: Option<Location>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, location, message)
    }

    pub fn warning(location: Option<Location>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, location, message)
    }

    pub fn undefined_behavior(location: Option<Location>, message: impl Into<String>) -> Self {
        Self::new(Severity::UndefinedBehavior, location, message)
    }

    /// Like [`Diagnostic::error`], but pulls the token's `expanded_from`
    /// chain along so the rendered diagnostic traces back through every
    /// macro invocation that produced it.
    pub fn error_at_token(tok: &Token, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, Some(tok.start), message).with_expansion(tok.expanded_from.clone())
    }

    pub fn with_citation(mut self, citation: &'static str) -> Self {
        self.citation = Some(citation);
        self
    }

    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_expansion(mut self, chain: Option<Rc<ExpandedFrom>>) -> Self {
        self.expansion_chain = chain;
        self
    }

    /// Renders this diagnostic and its notes against `arena`, resolving every
    /// location to its spelling location first. Per §6/§7, an "expanded from
    /// here" note follows for every link in the macro-expansion chain, then
    /// an "in file included from here" note for every enclosing `#include`,
    /// then any explicit notes (e.g. "previous definition is here").
    pub fn render(&self, arena: &BufferArena) -> String {
        let mut out = String::new();
        render_one(&mut out, self.severity, &self.location, &self.message, self.citation, arena);
        let mut link = self.expansion_chain.clone();
        while let Some(l) = link {
            out.push('\n');
            render_one(&mut out, Severity::Auxiliary, &Some(l.at), "expanded from here", None, arena);
            link = l.prior.clone();
        }
        if let Some(loc) = self.location {
            for at in included_chain(loc, arena) {
                out.push('\n');
                render_one(&mut out, Severity::Auxiliary, &Some(at), "in file included from here", None, arena);
            }
        }
        for note in &self.notes {
            out.push('\n');
            render_one(&mut out, Severity::Auxiliary, &note.location, &note.message, None, arena);
        }
        out
    }
}

/// Walks the chain of `#include`s that brought `loc`'s raw buffer in,
/// innermost first, returning the directive location in each enclosing file.
fn included_chain(loc: Location, arena: &BufferArena) -> Vec<Location> {
    let mut out = Vec::new();
    let mut buf = loc.find_spelling_loc(arena).buffer;
    loop {
        let Buffer::Raw(raw) = arena.get(buf) else { break };
        let Some(at) = raw.included_at else { break };
        out.push(at);
        buf = at.find_spelling_loc(arena).buffer;
    }
    out
}

fn render_one(
    out: &mut String,
    severity: Severity,
    location: &Option<Location>,
    message: &str,
    citation: Option<&'static str>,
    arena: &BufferArena,
) {
    use std::fmt::Write;

    let spelling = location.map(|loc| loc.find_spelling_loc(arena));
    let reported = spelling.map(|loc| loc.reported_position(arena));
    if let Some((file_name, line, col)) = &reported {
        let _ = write!(out, "{file_name}:{line}:{}: ", col + 1);
    }
    let _ = write!(out, "{}: {message}", severity.as_str());
    if let Some(citation) = citation {
        let _ = write!(out, " {citation}");
    }
    if let (Some(loc), Some((_, line, col))) = (spelling, reported) {
        if let Buffer::Raw(raw) = arena.get(loc.buffer) {
            let source_line = raw.get_line((line - 1) as usize);
            let _ = write!(out, "\n{source_line}\n{}", caret_indent(source_line, col));
            out.push('^');
        }
    }
}

/// A run of spaces reproducing `line[..col]`'s visual width: tabs are
/// preserved verbatim, UTF-8 continuation bytes contribute nothing, every
/// other byte contributes one space.
fn caret_indent(line: &str, col: usize) -> String {
    let mut indent = String::new();
    for &b in line.as_bytes().iter().take(col) {
        if b == b'\t' {
            indent.push('\t');
        } else if !crate::utf8::is_continuation(b) {
            indent.push(' ');
        }
    }
    indent
}

/// The ordered collection of every diagnostic raised while translating one
/// file. Diagnostics are pushed in discovery order and never reordered.
#[derive(Debug, Default)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity.is_error())
    }

    /// The process exit code policy from §6: 0 unless an error fired.
    pub fn exit_code(&self) -> i32 {
        if self.has_errors() { 1 } else { 0 }
    }

    pub fn render_all(&self, arena: &BufferArena) -> String {
        self.0
            .iter()
            .map(|d| d.render(arena))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RawBuffer;

    #[test]
    fn render_includes_file_line_col_and_caret() {
        let mut arena = BufferArena::new();
        let id = arena.push(Buffer::Raw(RawBuffer::new("f.c", "int x;\nfoo\n")));
        let loc = Location::new(id, 7);
        let diag = Diagnostic::error(Some(loc), "something broke");
        let rendered = diag.render(&arena);
        assert!(rendered.starts_with("f.c:2:1: error: something broke"));
        assert!(rendered.contains("foo"));
        assert!(rendered.ends_with('^'));
    }

    #[test]
    fn exit_code_is_zero_without_errors() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning(None, "just a warning"));
        assert_eq!(diags.exit_code(), 0);
    }

    #[test]
    fn exit_code_is_one_with_an_error() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning(None, "a warning"));
        diags.push(Diagnostic::error(None, "an error"));
        assert_eq!(diags.exit_code(), 1);
    }

    #[test]
    fn caret_indent_preserves_tabs_and_skips_continuation_bytes() {
        // "é" is two bytes: a leader and one continuation byte, which
        // together should advance the caret by one column, not two.
        let line = "\té foo";
        let indent = caret_indent(line, 3);
        assert_eq!(indent, "\t ");
    }
}

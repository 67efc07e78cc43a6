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

//! A [`Location`] pairs a buffer with a byte offset into it. Resolving a
//! location into the raw source it was ultimately spelled from means walking
//! the fragment tables of every derived buffer in between.

use std::rc::Rc;

use crate::buffer::{Buffer, BufferArena, BufferId};

/// Caps how many links an `expanded_from` chain may carry. Deeply nested
/// variadic macro expansion can otherwise build unbounded chains that would
/// dominate memory without helping a diagnostic reader.
pub const MAX_EXPANSION_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub buffer: BufferId,
    pub offset: usize,
}

/// One link in a macro-expansion provenance chain: `at` is the invocation
/// site, `prior` is the rest of the chain (or `None` at the root).
#[derive(Debug, Clone)]
pub struct ExpandedFrom {
    pub at: Location,
    pub prior: Option<Rc<ExpandedFrom>>,
    pub depth: usize,
}

impl ExpandedFrom {
    /// Appends a new link unless doing so would exceed [`MAX_EXPANSION_DEPTH`],
    /// in which case the existing chain is kept as-is.
    pub fn push(prior: Option<Rc<ExpandedFrom>>, at: Location) -> Option<Rc<ExpandedFrom>> {
        let depth = prior.as_ref().map_or(0, |p| p.depth + 1);
        if depth >= MAX_EXPANSION_DEPTH {
            return prior;
        }
        Some(Rc::new(ExpandedFrom { at, prior, depth }))
    }
}

impl Location {
    pub fn new(buffer: BufferId, offset: usize) -> Self {
        Self { buffer, offset }
    }

    /// Walks derived -> parent via fragment lookup until landing in a raw
    /// buffer; that is the location diagnostics should cite.
    pub fn find_spelling_loc(&self, arena: &BufferArena) -> Location {
        match arena.get(self.buffer) {
            Buffer::Raw(_) => *self,
            Buffer::Derived(d) => {
                let parent_offset = d.offset_in_original(self.offset);
                Location::new(BufferId(d.parent), parent_offset).find_spelling_loc(arena)
            }
        }
    }

    /// 0-based line and column, counted in bytes, matching how the raw
    /// buffer's `#line` overrides (if any) are applied on top.
    pub fn line_col(&self, arena: &BufferArena) -> (usize, usize) {
        let data = arena.data(self.buffer).as_bytes();
        let mut line = 0;
        let mut col = 0;
        for &b in &data[..self.offset.min(data.len())] {
            col += 1;
            if b == b'\n' {
                col = 0;
                line += 1;
            }
        }
        (line, col)
    }

    /// Reported file name and 1-based line number, honoring any `#line`
    /// override recorded on the (necessarily raw) buffer this location is
    /// already in.
    pub fn reported_position(&self, arena: &BufferArena) -> (String, u32, usize) {
        let (line, col) = self.line_col(arena);
        let mut file_name = arena.name(self.buffer).to_string();
        let mut reported_line = line as u32 + 1;
        if let Buffer::Raw(raw) = arena.get(self.buffer) {
            if let Some(over) = &raw.line_override {
                if self.offset >= over.at_offset {
                    let (override_line, _) =
                        Location::new(self.buffer, over.at_offset).line_col(arena);
                    reported_line = over.line + (line as u32 - override_line as u32);
                    if let Some(name) = &over.file_name {
                        file_name = name.clone();
                    }
                }
            }
        }
        (file_name, reported_line, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{DerivedBuffer, RawBuffer};

    #[test]
    fn find_spelling_loc_terminates_in_a_raw_buffer() {
        let mut arena = BufferArena::new();
        let raw = arena.push(Buffer::Raw(RawBuffer::new("f.c", "abc")));
        let mut derived = DerivedBuffer::new("f.c#1", raw.0);
        derived.propagate("abc", 3);
        let derived_id = arena.push(Buffer::Derived(derived));
        let loc = Location::new(derived_id, 2);
        let spelling = loc.find_spelling_loc(&arena);
        assert_eq!(spelling.buffer, raw);
        assert_eq!(spelling.offset, 2);
    }

    #[test]
    fn expanded_from_chain_caps_depth() {
        let mut arena = BufferArena::new();
        let raw = arena.push(Buffer::Raw(RawBuffer::new("f.c", "x")));
        let loc = Location::new(raw, 0);
        let mut chain = None;
        for _ in 0..(MAX_EXPANSION_DEPTH + 20) {
            chain = ExpandedFrom::push(chain, loc);
        }
        assert_eq!(chain.unwrap().depth, MAX_EXPANSION_DEPTH - 1);
    }
}

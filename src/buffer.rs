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

//! Source buffers and the fragment-table rewriter that lets every derived
//! buffer trace each of its bytes back to where they came from.

use std::ops::Range;

use crate::location::Location;

/// Identifies a buffer within a [`BufferArena`]. Cheap to copy, stored in
/// every [`Location`](crate::location::Location).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

/// Owns every buffer created while translating one file: the raw input, the
/// phase-1/phase-2 derived buffers, and every synthetic raw buffer created
/// for stringize, paste, predefined macros, and placemarkers. Buffers are
/// naturally tree-shaped (derived buffers own a reference to their parent by
/// index) but since phase 4 keeps splicing in new synthetic buffers for the
/// life of one translation unit, a flat arena indexed by `BufferId` is a
/// better fit than literal tree ownership.
#[derive(Debug, Default)]
pub struct BufferArena {
    buffers: Vec<Buffer>,
}

impl BufferArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, buffer: Buffer) -> BufferId {
        self.buffers.push(buffer);
        BufferId(self.buffers.len() - 1)
    }

    pub fn get(&self, id: BufferId) -> &Buffer {
        &self.buffers[id.0]
    }

    pub fn get_mut(&mut self, id: BufferId) -> &mut Buffer {
        &mut self.buffers[id.0]
    }

    pub fn data(&self, id: BufferId) -> &str {
        match self.get(id) {
            Buffer::Raw(r) => &r.data,
            Buffer::Derived(d) => &d.data,
        }
    }

    pub fn name(&self, id: BufferId) -> &str {
        match self.get(id) {
            Buffer::Raw(r) => &r.name,
            Buffer::Derived(d) => &d.name,
        }
    }

    /// Walks derived -> parent until it reaches the raw buffer that owns
    /// this chain, returning that buffer's id.
    pub fn original(&self, id: BufferId) -> BufferId {
        match self.get(id) {
            Buffer::Raw(_) => id,
            Buffer::Derived(d) => self.original(BufferId(d.parent)),
        }
    }
}

/// A raw or derived chunk of source text. Every token's spelling is a view
/// into the `data` of some buffer; buffers form a tree via `Derived::parent`.
#[derive(Debug)]
pub enum Buffer {
    Raw(RawBuffer),
    Derived(DerivedBuffer),
}

#[derive(Debug)]
pub struct RawBuffer {
    pub name: String,
    pub data: String,
    /// Where an `#include` directive pulled this file in from, if any.
    pub included_at: Option<Location>,
    /// Set by a `#line` directive: overrides the reported line number (and
    /// optionally file name) for locations from `override_from` onward,
    /// without touching `data` or any fragment table.
    pub line_override: Option<LineOverride>,
}

#[derive(Debug, Clone)]
pub struct LineOverride {
    pub at_offset: usize,
    pub line: u32,
    pub file_name: Option<String>,
}

#[derive(Debug)]
pub struct DerivedBuffer {
    pub name: String,
    pub data: String,
    pub parent: usize,
    pub fragments: Vec<Fragment>,
    /// Write cursor into the parent; operations consume parent bytes from
    /// here forward.
    pub parent_index: usize,
}

/// `(local_range, parent_range, propagate)`. `propagate` fragments map
/// offsets linearly; any other fragment collapses every local offset within
/// it to `parent_range.start`.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub local_range: Range<usize>,
    pub parent_range: Range<usize>,
    pub propagate: bool,
}

impl RawBuffer {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            included_at: None,
            line_override: None,
        }
    }

    /// Builds a raw buffer from arbitrary file bytes. Rust's `String`
    /// enforces UTF-8 validity at the type level, so unlike a byte-buffer
    /// representation, invalid sequences must be repaired before the data
    /// can be stored at all: each invalid byte is replaced with U+001A
    /// SUBSTITUTE, matching phase 1's [5.1.1.2]/1.1 substitution, and its
    /// offset in the repaired string is returned so the caller can raise
    /// the "invalid UTF-8" diagnostic once the buffer has a `BufferId` to
    /// locate it with.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> (Self, Vec<usize>) {
        let mut data = String::with_capacity(bytes.len());
        let mut bad_offsets = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            match std::str::from_utf8(&bytes[i..]) {
                Ok(valid) => {
                    data.push_str(valid);
                    break;
                }
                Err(e) => {
                    let good = e.valid_up_to();
                    data.push_str(std::str::from_utf8(&bytes[i..i + good]).unwrap());
                    i += good;
                    bad_offsets.push(data.len());
                    data.push('\u{1A}');
                    i += e.error_len().unwrap_or(1);
                }
            }
        }
        (Self::new(name, data), bad_offsets)
    }

    pub fn get_line(&self, lno: usize) -> &str {
        let mut offset = 0;
        let mut line = 0;
        let bytes = self.data.as_bytes();
        while line < lno {
            assert!(offset < bytes.len(), "line {lno} out of range");
            if bytes[offset] == b'\n' {
                line += 1;
            }
            offset += 1;
        }
        let begin = offset;
        while offset < bytes.len() && bytes[offset] != b'\n' {
            offset += 1;
        }
        &self.data[begin..offset]
    }
}

impl DerivedBuffer {
    pub fn new(name: impl Into<String>, parent: usize) -> Self {
        Self {
            name: name.into(),
            data: String::new(),
            parent,
            fragments: Vec::new(),
            parent_index: 0,
        }
    }

    pub fn done(&self, parent_data: &str) -> bool {
        self.parent_index == parent_data.len()
    }

    pub fn peek<'a>(&self, parent_data: &'a str, len: usize) -> &'a str {
        let end = (self.parent_index + len).min(parent_data.len());
        &parent_data[self.parent_index..end]
    }

    pub fn peek_byte(&self, parent_data: &str) -> u8 {
        parent_data.as_bytes()[self.parent_index]
    }

    /// Copies `len` parent bytes through unchanged. Coalesces into the
    /// previous fragment when it was also a propagate fragment, so a run of
    /// untouched source collapses into a single fragment.
    pub fn propagate(&mut self, parent_data: &str, len: usize) {
        if let Some(last) = self.fragments.last_mut() {
            if last.propagate {
                last.local_range.end += len;
                last.parent_range.end += len;
                self.data
                    .push_str(&parent_data[self.parent_index..self.parent_index + len]);
                self.parent_index += len;
                return;
            }
        }
        let local_start = self.data.len();
        self.fragments.push(Fragment {
            local_range: local_start..local_start + len,
            parent_range: self.parent_index..self.parent_index + len,
            propagate: true,
        });
        self.data
            .push_str(&parent_data[self.parent_index..self.parent_index + len]);
        self.parent_index += len;
    }

    /// Consumes `len` parent bytes and appends `text` in their place.
    pub fn replace(&mut self, len: usize, text: &str) {
        let local_start = self.data.len();
        self.fragments.push(Fragment {
            local_range: local_start..local_start + text.len(),
            parent_range: self.parent_index..self.parent_index + len,
            propagate: false,
        });
        self.parent_index += len;
        self.data.push_str(text);
    }

    pub fn insert(&mut self, text: &str) {
        self.replace(0, text);
    }

    pub fn erase(&mut self, len: usize) {
        self.replace(len, "");
    }

    /// Maps a local offset back into the parent buffer by binary-searching
    /// the fragment whose `local_range` contains it.
    pub fn offset_in_original(&self, local_offset: usize) -> usize {
        if self.fragments.is_empty() {
            return 0;
        }
        if local_offset >= self.data.len() {
            return self.fragments.last().unwrap().parent_range.end;
        }
        let idx = self
            .fragments
            .partition_point(|f| f.local_range.end <= local_offset);
        let frag = &self.fragments[idx];
        if frag.propagate {
            frag.parent_range.start + (local_offset - frag.local_range.start)
        } else {
            frag.parent_range.start
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_propagate_maps_identity() {
        let mut d = DerivedBuffer::new("d", 0);
        let parent = "hello world";
        while !d.done(parent) {
            d.propagate(parent, 1);
        }
        assert_eq!(d.data, parent);
        for i in 0..parent.len() {
            assert_eq!(d.offset_in_original(i), i);
        }
    }

    #[test]
    fn replace_collapses_to_fragment_start() {
        let mut d = DerivedBuffer::new("d", 0);
        let parent = "a\\\nb";
        d.propagate(parent, 1); // "a"
        d.replace(2, ""); // erase "\\\n"
        d.propagate(parent, 1); // "b"
        assert_eq!(d.data, "ab");
        assert_eq!(d.offset_in_original(0), 0);
        // offset 1 ('b' in local) falls in the trailing propagate fragment,
        // which started at parent offset 3.
        assert_eq!(d.offset_in_original(1), 3);
    }

    #[test]
    fn offset_in_original_is_monotone() {
        let mut d = DerivedBuffer::new("d", 0);
        let parent = "??=define X 1";
        d.replace(3, "#"); // trigraph
        while !d.done(parent) {
            d.propagate(parent, 1);
        }
        let mut prev = 0;
        for i in 0..=d.data.len() {
            let cur = d.offset_in_original(i);
            assert!(cur >= prev);
            prev = cur;
        }
    }
}

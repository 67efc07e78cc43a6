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

//! Translation phase 1 [5.1.1.2]/1.1: map physical multibyte source
//! characters to universal-character-names, normalize end-of-line
//! indicators, and replace trigraph sequences.
//!
//! The "invalid UTF-8" half of this phase is handled earlier, when the raw
//! buffer is built from file bytes (see [`crate::buffer::RawBuffer::from_bytes`]):
//! a `String`'s validity is a Rust-level invariant, so by the time this phase
//! runs every remaining multibyte sequence is guaranteed well-formed.

use crate::buffer::{Buffer, BufferArena, BufferId, DerivedBuffer};
use crate::utf8;

const TRIGRAPHS: &[(&str, &str)] = &[
    ("??=", "#"),
    ("??(", "["),
    ("??/", "\\"),
    ("??)", "]"),
    ("??'", "^"),
    ("??<", "{"),
    ("??!", "|"),
    ("??>", "}"),
    ("??-", "~"),
];

/// Runs phase 1 over `parent`, pushing the derived buffer into `arena` and
/// returning its id.
pub fn run(arena: &mut BufferArena, parent: BufferId) -> BufferId {
    let parent_data = arena.data(parent).to_string();
    let name = format!("{}#p1", arena.name(parent));
    let mut out = DerivedBuffer::new(name, parent.0);

    while !out.done(&parent_data) {
        let head = out.peek_byte(&parent_data);
        if !utf8::is_ascii(head) {
            let ch = parent_data[out.parent_index..]
                .chars()
                .next()
                .expect("parent_data is valid UTF-8 and not yet exhausted");
            out.replace(ch.len_utf8(), &utf8::to_ucn(ch as u32));
            continue;
        }
        if out.peek(&parent_data, 2) == "\r\n" {
            out.replace(2, "\n");
            continue;
        }
        let candidate = out.peek(&parent_data, 3);
        if let Some((_, replacement)) = TRIGRAPHS.iter().find(|(tri, _)| *tri == candidate) {
            out.replace(3, replacement);
            continue;
        }
        out.propagate(&parent_data, 1);
    }

    arena.push(Buffer::Derived(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RawBuffer;

    fn run_on(text: &str) -> String {
        let mut arena = BufferArena::new();
        let raw = arena.push(Buffer::Raw(RawBuffer::new("f.c", text)));
        let out = run(&mut arena, raw);
        arena.data(out).to_string()
    }

    #[test]
    fn trigraphs_are_replaced() {
        assert_eq!(run_on("??=define X 1\n"), "#define X 1\n");
    }

    #[test]
    fn crlf_becomes_lf() {
        assert_eq!(run_on("int x;\r\n"), "int x;\n");
    }

    #[test]
    fn multibyte_utf8_becomes_ucn() {
        assert!(run_on("// café\n").contains("\\u00E9"));
    }

    #[test]
    fn ascii_passes_through_unchanged() {
        let text = "int main(void) { return 0; }\n";
        assert_eq!(run_on(text), text);
    }

    #[test]
    fn invalid_bytes_are_repaired_before_phase_one_sees_them() {
        let (raw, bad) = RawBuffer::from_bytes("f.c", &[b'a', 0xFF, b'\n']);
        assert_eq!(raw.data, "a\u{1A}\n");
        assert_eq!(bad, vec![1]);
    }
}

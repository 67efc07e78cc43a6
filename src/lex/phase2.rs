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

//! Translation phase 2 [5.1.1.2]/1.2: splice backslash-newline pairs to form
//! logical source lines, and enforce the trailing-newline rule.

use crate::buffer::{Buffer, BufferArena, BufferId, DerivedBuffer};
use crate::location::Location;
use crate::message::{Diagnostic, Diagnostics};

/// Runs phase 2 over `parent`, pushing the derived buffer into `arena` and
/// returning its id. Diagnostics (missing final newline) are appended to
/// `diags`.
pub fn run(arena: &mut BufferArena, diags: &mut Diagnostics, parent: BufferId) -> BufferId {
    let parent_data = arena.data(parent).to_string();
    let name = format!("{}#p2", arena.name(parent));
    let mut out = DerivedBuffer::new(name, parent.0);

    while !out.done(&parent_data) {
        if out.peek(&parent_data, 2) == "\\\n" {
            out.erase(2);
        } else {
            out.propagate(&parent_data, 1);
        }
    }

    let needs_newline = !parent_data.is_empty() && !out.data.ends_with('\n');
    let id = arena.push(Buffer::Derived(out));

    if needs_newline {
        let loc = if parent_data.ends_with("\\\n") {
            Location::new(BufferId(parent.0), parent_data.len() - 2)
        } else {
            let len = arena.data(id).len();
            Location::new(id, len)
        };
        diags.push(Diagnostic::error(Some(loc), "source file does not end in a newline"));
        if let Buffer::Derived(d) = arena.get_mut(id) {
            d.insert("\n");
        }
    }

    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RawBuffer;

    fn run_on(text: &str) -> (String, Diagnostics) {
        let mut arena = BufferArena::new();
        let raw = arena.push(Buffer::Raw(RawBuffer::new("f.c", text)));
        let mut diags = Diagnostics::new();
        let out = run(&mut arena, &mut diags, raw);
        (arena.data(out).to_string(), diags)
    }

    #[test]
    fn splice_removes_backslash_newline() {
        let (data, diags) = run_on("#define X 1\\\n\n");
        assert_eq!(data, "#define X 1\n");
        assert!(diags.0.is_empty());
    }

    #[test]
    fn missing_trailing_newline_is_inserted_and_diagnosed() {
        let (data, diags) = run_on("int x;");
        assert_eq!(data, "int x;\n");
        assert_eq!(diags.0.len(), 1);
    }

    #[test]
    fn empty_file_needs_no_newline() {
        let (data, diags) = run_on("");
        assert_eq!(data, "");
        assert!(diags.0.is_empty());
    }

    #[test]
    fn splice_at_eof_points_diagnostic_at_the_backslash() {
        let (data, diags) = run_on("int x;\\\n");
        assert_eq!(data, "int x;\n");
        assert_eq!(diags.0.len(), 1);
    }
}

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

//! `--test`'s in-binary smoke fixtures: a self-check reachable without the
//! Rust toolchain's own `cargo test` harness, distinct from the `#[cfg(test)]`
//! suites colocated with each module.

use spcc::buffer::{Buffer, BufferArena, RawBuffer};
use spcc::config::Config;
use spcc::message::Diagnostics;
use spcc::pp::{self, finalize};

struct Fixture {
    name: &'static str,
    source: &'static str,
    expect_error: bool,
    expected_spellings: &'static [&'static str],
}

const FIXTURES: &[Fixture] = &[
    Fixture {
        name: "object_like_macro",
        source: "#define ANSWER 42\nANSWER\n",
        expect_error: false,
        expected_spellings: &["42"],
    },
    Fixture {
        name: "function_like_macro",
        source: "#define ADD(a, b) ((a) + (b))\nADD(1, 2)\n",
        expect_error: false,
        expected_spellings: &["(", "(", "1", ")", "+", "(", "2", ")", ")"],
    },
    Fixture {
        name: "stringize_and_paste",
        source: "#define STR(x) #x\n#define CAT(a, b) a ## b\nSTR(hi) CAT(fo, o)\n",
        expect_error: false,
        expected_spellings: &["\"hi\"", "foo"],
    },
    Fixture {
        name: "conditional_inclusion",
        source: "#define FEATURE\n#ifdef FEATURE\nint yes;\n#else\nint no;\n#endif\n",
        expect_error: false,
        expected_spellings: &["int", "yes", ";"],
    },
    Fixture {
        name: "undefined_macro_is_left_alone",
        source: "#define X 1\n#undef X\nX\n",
        expect_error: false,
        expected_spellings: &["X"],
    },
    Fixture {
        name: "error_directive_sets_exit_code",
        source: "#error this is broken\n",
        expect_error: true,
        expected_spellings: &[],
    },
];

fn run_one(f: &Fixture) -> bool {
    let mut arena = BufferArena::new();
    let mut diags = Diagnostics::new();
    let (raw, _) = RawBuffer::from_bytes(f.name, f.source.as_bytes());
    let raw_id = arena.push(Buffer::Raw(raw));
    let config = Config::default();
    let tokens = pp::preprocess(&mut arena, &mut diags, &config, raw_id, 0);
    let tokens = finalize::finalize(&mut diags, tokens);
    let spellings: Vec<&str> = tokens.iter().map(|t| t.spelling.as_str()).collect();
    let errored = diags.has_errors();
    if errored != f.expect_error {
        return false;
    }
    if f.expect_error {
        return true;
    }
    spellings == f.expected_spellings
}

pub fn run_all() -> (usize, usize) {
    let mut passed = 0;
    for f in FIXTURES {
        let ok = run_one(f);
        println!("{} ... {}", f.name, if ok { "ok" } else { "FAILED" });
        if ok {
            passed += 1;
        }
    }
    (passed, FIXTURES.len())
}

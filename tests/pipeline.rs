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

//! End-to-end fixture tests: a whole C fragment goes in, a token-spelling
//! stream (or a diagnostic) comes out.

use spcc::buffer::{Buffer, BufferArena, RawBuffer};
use spcc::config::Config;
use spcc::message::Diagnostics;
use spcc::pp::{self, finalize};

fn run(source: &str) -> (Vec<String>, Diagnostics, BufferArena) {
    let mut arena = BufferArena::new();
    let mut diags = Diagnostics::new();
    let (raw, _) = RawBuffer::from_bytes("fixture.c", source.as_bytes());
    let raw_id = arena.push(Buffer::Raw(raw));
    let config = Config::default();
    let tokens = pp::preprocess(&mut arena, &mut diags, &config, raw_id, 0);
    let tokens = finalize::finalize(&mut diags, tokens);
    let spellings = tokens.iter().map(|t| t.spelling.clone()).collect();
    (spellings, diags, arena)
}

#[track_caller]
fn check(source: &str, expected: &[&str]) {
    let (actual, diags, arena) = run(source);
    let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eprintln!("diagnostics:\n{}", diags.render_all(&arena));
        eprintln!("token streams differ:");
        for d in diff::slice(&expected, &actual) {
            match d {
                diff::Result::Left(l) => eprintln!("-{l:?}"),
                diff::Result::Both(l, _) => eprintln!(" {l:?}"),
                diff::Result::Right(r) => eprintln!("+{r:?}"),
            }
        }
        panic!("token stream mismatch for {source:?}");
    }
    assert!(!diags.has_errors(), "unexpected diagnostics:\n{}", diags.render_all(&arena));
}

#[test]
fn simple_declaration_round_trips_unexpanded() {
    check("int x = 1;\n", &["int", "x", "=", "1", ";"]);
}

#[test]
fn object_like_macro_is_expanded_in_a_full_declaration() {
    check(
        "#define SIZE 10\nint arr[SIZE];\n",
        &["int", "arr", "[", "10", "]", ";"],
    );
}

#[test]
fn nested_includes_and_function_like_macros_interact() {
    check(
        "#define MAX(a, b) ((a) > (b) ? (a) : (b))\nint m = MAX(1, 2);\n",
        &["int", "m", "=", "(", "(", "1", ")", ">", "(", "2", ")", "?", "(", "1", ")", ":", "(", "2", ")", ")", ";"],
    );
}

#[test]
fn conditional_compilation_keeps_only_taken_branch() {
    check(
        "#undef DEBUG\n#ifdef DEBUG\nint d = 1;\n#else\nint d = 0;\n#endif\n",
        &["int", "d", "=", "0", ";"],
    );
}

#[test]
fn string_literals_concatenate_across_macro_expansion() {
    check(
        "#define GREETING \"hello, \"\nchar *s = GREETING \"world\";\n",
        &["char", "*", "s", "=", "\"hello, world\"", ";"],
    );
}

#[test]
fn line_and_file_predefined_macros_reflect_position() {
    let (tokens, diags, _arena) = run("int l = __LINE__;\n");
    assert!(!diags.has_errors());
    let spellings: Vec<&str> = tokens.iter().map(|t| t.spelling.as_str()).collect();
    assert_eq!(spellings, ["int", "l", "=", "1", ";"]);
}

#[test]
fn error_directive_is_reported_as_an_error() {
    let (_tokens, diags, _arena) = run("#error this configuration is unsupported\n");
    assert!(diags.has_errors());
}

#[test]
fn redefinition_with_a_different_body_is_diagnosed_but_recovers() {
    let (tokens, diags, _arena) = run("#define N 1\n#define N 2\nint x = N;\n");
    assert!(diags.has_errors());
    let spellings: Vec<&str> = tokens.iter().map(|t| t.spelling.as_str()).collect();
    assert_eq!(spellings, ["int", "x", "=", "2", ";"]);
}

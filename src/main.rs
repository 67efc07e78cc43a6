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

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser as _;

use spcc::buffer::{Buffer, BufferArena, BufferId, RawBuffer};
use spcc::cli::Cli;
use spcc::config::{Config, ColorMode};
use spcc::message::Diagnostics;
use spcc::parser::{self, Node};
use spcc::pp::{self, finalize};
use spcc::token::Token;

mod fixtures;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    if cli.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if cli.test {
        let (passed, total) = fixtures::run_all();
        println!("{passed}/{total} fixtures passed");
        std::process::exit(if passed == total { 0 } else { 1 });
    }

    if let Some(src) = &cli.parse_expr {
        return dump_parse(src, &config, &parser::expr::EXPR_RULESET);
    }

    if let Some(src) = &cli.parse_declarator {
        return dump_parse(src, &config, &parser::declarator::DECLARATOR_RULESET);
    }

    if let Some(src) = &cli.debug_scratch {
        let text = if src.is_empty() { "#define TWICE(x) ((x) + (x))\nTWICE(1 + 2)\n" } else { src.as_str() };
        let mut arena = BufferArena::new();
        let mut diags = Diagnostics::new();
        let raw_id = push_raw(&mut arena, "<debug-scratch>", text.as_bytes());
        let tokens = pp::preprocess(&mut arena, &mut diags, &config, raw_id, cli.verbose);
        print_tokens(&tokens);
        eprint!("{}", diags.render_all(&arena));
        std::process::exit(diags.exit_code());
    }

    if cli.inputs.is_empty() {
        anyhow::bail!("no input files given (pass --help to see available modes)");
    }

    let mut worst_exit = 0;
    for path in &cli.inputs {
        worst_exit = worst_exit.max(translate_file(path, &config, cli.verbose)?);
    }
    std::process::exit(worst_exit);
}

fn build_config(cli: &Cli) -> Result<Config> {
    let config = Config {
        bits_per_byte: cli.bits_per_byte,
        short_bytes: cli.short_bytes,
        int_bytes: cli.int_bytes,
        long_bytes: cli.long_bytes,
        long_long_bytes: cli.long_long_bytes,
        char_signed: cli.char.into(),
        color: if cli.disable_color { ColorMode::Disabled } else { ColorMode::Auto },
        include_dirs: cli.include.clone(),
    };
    config.build().context("invalid target configuration")
}

fn push_raw(arena: &mut BufferArena, name: &str, bytes: &[u8]) -> BufferId {
    let (raw, _line_offsets) = RawBuffer::from_bytes(name, bytes);
    arena.push(Buffer::Raw(raw))
}

fn translate_file(path: &Path, config: &Config, verbose: u8) -> Result<i32> {
    if path.extension().and_then(|e| e.to_str()) != Some("c") {
        eprintln!("{}: warning: input file does not have a '.c' extension", path.display());
    }
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let mut arena = BufferArena::new();
    let mut diags = Diagnostics::new();
    let raw_id = push_raw(&mut arena, &path.display().to_string(), &bytes);
    let tokens = pp::preprocess(&mut arena, &mut diags, config, raw_id, verbose);
    let tokens = finalize::finalize(&mut diags, tokens);
    print_tokens(&tokens);
    eprint!("{}", diags.render_all(&arena));
    Ok(diags.exit_code())
}

fn dump_parse(src: &str, config: &Config, ruleset: &'static parser::Ruleset) -> Result<()> {
    let mut arena = BufferArena::new();
    let mut diags = Diagnostics::new();
    let raw_id = push_raw(&mut arena, "<command-line>", src.as_bytes());
    let tokens = pp::preprocess(&mut arena, &mut diags, config, raw_id, 0);
    let tokens = finalize::finalize(&mut diags, tokens);
    eprint!("{}", diags.render_all(&arena));
    let mut p = parser::Parser::new(&tokens, ruleset, HashSet::new());
    match p.parse(0) {
        Ok(node) => print_node(&node, 0),
        Err(e) => eprintln!("parse error: {e}"),
    }
    Ok(())
}

fn print_node(node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        Node::TokenLeaf(t) => println!("{indent}{:?} {:?}", t.kind, t.spelling),
        Node::Unary { op, operand, prefix } => {
            println!("{indent}Unary {:?} prefix={prefix}", op.spelling);
            print_node(operand, depth + 1);
        }
        Node::Paren { operand, .. } => {
            println!("{indent}Paren");
            print_node(operand, depth + 1);
        }
        Node::Binary { op, lhs, rhs } => {
            println!("{indent}Binary {:?}", op.spelling);
            print_node(lhs, depth + 1);
            print_node(rhs, depth + 1);
        }
        Node::Ternary { cond, then_branch, else_branch, .. } => {
            println!("{indent}Ternary");
            print_node(cond, depth + 1);
            print_node(then_branch, depth + 1);
            print_node(else_branch, depth + 1);
        }
        Node::Call { callee, args, .. } => {
            println!("{indent}Call");
            print_node(callee, depth + 1);
            for a in args {
                print_node(a, depth + 1);
            }
        }
        Node::Index { base, index, .. } => {
            println!("{indent}Index");
            print_node(base, depth + 1);
            print_node(index, depth + 1);
        }
        Node::AbstractPlaceholder { .. } => println!("{indent}AbstractPlaceholder"),
        Node::Tag { keyword, name } => {
            println!("{indent}Tag {:?} {:?}", keyword.spelling, name.as_ref().map(|n| &n.spelling));
        }
        Node::DeclaratorArray { base, size, .. } => {
            println!("{indent}DeclaratorArray");
            print_node(base, depth + 1);
            if let Some(size) = size {
                print_node(size, depth + 1);
            }
        }
        Node::Cast { type_decl, operand, .. } => {
            println!("{indent}Cast");
            print_node(type_decl, depth + 1);
            print_node(operand, depth + 1);
        }
    }
}

fn print_tokens(tokens: &[Token]) {
    for t in tokens {
        println!("{:?} {:?}", t.kind, t.spelling);
    }
}

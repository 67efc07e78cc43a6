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

//! Command-line surface. One flat `Cli` struct rather than `clap`'s
//! `Subcommand` machinery: the debug sub-modes here are mutually exclusive
//! flags on the same invocation, not separate verbs with their own argument
//! sets.

use std::path::PathBuf;

use clap::Parser;

use crate::config::CharSignedness;

/// spcc, a C11 preprocessor and translation front end.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input files to translate. Ignored by the debug sub-modes.
    pub inputs: Vec<PathBuf>,

    /// Run the crate's own fixture tests and report pass/fail counts.
    #[arg(long)]
    pub test: bool,

    /// Print the constructed configuration as JSON and exit.
    #[arg(long)]
    pub dump_config: bool,

    /// Lex and parse STR as a standalone declarator, then print the node tree.
    #[arg(long, value_name = "STR")]
    pub parse_declarator: Option<String>,

    /// Lex and parse STR as a standalone expression, then print the node tree.
    #[arg(long, value_name = "STR")]
    pub parse_expr: Option<String>,

    /// Run phases 1-4 on STR (or a fixed internal fragment if omitted) and
    /// dump the macro-expanded token stream.
    #[arg(long, value_name = "STR", num_args = 0..=1, default_missing_value = "")]
    pub debug_scratch: Option<String>,

    /// Number of bits in a byte of the target.
    #[arg(long, default_value_t = 8)]
    pub bits_per_byte: u32,

    /// Size in bytes of `short` on the target.
    #[arg(long, default_value_t = 2)]
    pub short_bytes: u32,

    /// Size in bytes of `int` on the target.
    #[arg(long, default_value_t = 4)]
    pub int_bytes: u32,

    /// Size in bytes of `long` on the target.
    #[arg(long, default_value_t = 8)]
    pub long_bytes: u32,

    /// Size in bytes of `long long` on the target.
    #[arg(long, default_value_t = 8)]
    pub long_long_bytes: u32,

    /// Signedness of plain `char` on the target.
    #[arg(long, value_enum, default_value_t = CharArg::Signed)]
    pub char: CharArg,

    /// Directory to search for `#include`d headers. Repeatable.
    #[arg(short = 'I', long = "include")]
    pub include: Vec<PathBuf>,

    /// Disable colorized diagnostic output.
    #[arg(long)]
    pub disable_color: bool,

    /// Raise logging verbosity. Repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharArg {
    Signed,
    Unsigned,
}

impl From<CharArg> for CharSignedness {
    fn from(c: CharArg) -> Self {
        match c {
            CharArg::Signed => CharSignedness::Signed,
            CharArg::Unsigned => CharSignedness::Unsigned,
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CLI argument parsing for cmac.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cmac - compile and run programs for the C-like stack machine
#[derive(Parser, Debug)]
#[command(name = "cmac")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Load settings from a TOML file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of memory slots for the machine
    #[arg(long, global = true, value_name = "SLOTS")]
    pub memory: Option<usize>,

    /// Log every executed instruction
    #[arg(long, global = true)]
    pub trace: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a JSON AST and report diagnostics
    Check {
        /// AST file (JSON)
        file: PathBuf,
    },

    /// Analyze and compile a JSON AST to bytecode
    Compile {
        /// AST file (JSON)
        file: PathBuf,

        /// Write bytecode here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Function called by the program prologue
        #[arg(long, value_name = "NAME")]
        entry: Option<String>,

        /// Omit `//` annotations from the output
        #[arg(long)]
        no_comments: bool,
    },

    /// Run bytecode (.cma) or JSON ASTs (.json); files run in parallel
    Run {
        /// Input files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! cmac - compiler and stack machine for a small C-like language
//!
//! This is the main entry point for the cmac CLI.
//!
//! ## Features
//!
//! - Semantic checking of JSON ASTs
//! - Compilation to labeled stack-machine bytecode
//! - Parallel execution of bytecode and AST files

mod cli;
mod commands;

use clap::Parser;
use owo_colors::OwoColorize;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match dispatch(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so bytecode on stdout stays clean.
fn init_tracing(cli: &Cli) {
    let filter = if cli.trace {
        EnvFilter::new("cmac_core=trace")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn dispatch(cli: &Cli) -> anyhow::Result<ExitCode> {
    let mut config = commands::load_config(cli.config.as_deref(), cli.memory, cli.trace)?;

    match &cli.command {
        Commands::Check { file } => {
            let diagnostics = commands::check(file, &config)?;
            if diagnostics.is_empty() {
                println!("{} {}", "OK".green().bold(), file.display());
                return Ok(ExitCode::SUCCESS);
            }
            for diagnostic in &diagnostics {
                eprintln!("{}: {}", "error".red().bold(), diagnostic);
            }
            eprintln!(
                "{} {} error(s) in {}",
                "Failed:".red().bold(),
                diagnostics.len(),
                file.display()
            );
            Ok(ExitCode::FAILURE)
        }
        Commands::Compile {
            file,
            output,
            entry,
            no_comments,
        } => {
            if let Some(entry) = entry {
                config.codegen.entry = entry.clone();
            }
            if *no_comments {
                config.codegen.comments = false;
            }
            let bytecode = commands::compile(file, output.as_deref(), &config)?;
            if output.is_none() {
                print!("{}", bytecode);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { files } => {
            let mut code = ExitCode::SUCCESS;
            for (path, result) in files.iter().zip(commands::run_all(files, &config)) {
                match result {
                    Ok(value) if files.len() == 1 => println!("{}", value),
                    Ok(value) => println!("{}: {}", path.display().cyan(), value),
                    Err(e) => {
                        eprintln!("{}: {:#}", "Error".red().bold(), e);
                        code = ExitCode::FAILURE;
                    }
                }
            }
            Ok(code)
        }
    }
}

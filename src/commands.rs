// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Command implementations.

use anyhow::{Context, Result, bail};
use cmac_core::ast::Program;
use cmac_core::{Bytecode, Config, Diagnostic, Pipeline, Value};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reads the config file, if any, and applies command-line overrides.
pub fn load_config(path: Option<&Path>, memory: Option<usize>, trace: bool) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str::<Config>(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(memory) = memory {
        config.machine.memory_size = memory;
    }
    if trace {
        config.machine.trace = true;
    }
    debug!(?config, "configuration");
    Ok(config)
}

fn read_ast(path: &Path) -> Result<Program> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str::<Program>(&text)
        .with_context(|| format!("invalid AST in {}", path.display()))
}

fn read_bytecode(path: &Path) -> Result<Bytecode> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    text.parse::<Bytecode>()
        .with_context(|| format!("invalid bytecode in {}", path.display()))
}

/// `cmac check`: analyze an AST file.
pub fn check(path: &Path, config: &Config) -> Result<Vec<Diagnostic>> {
    let program = read_ast(path)?;
    Ok(Pipeline::new(config.clone()).check(&program))
}

/// `cmac compile`: analyze and generate, writing to `output` when given.
pub fn compile(path: &Path, output: Option<&Path>, config: &Config) -> Result<Bytecode> {
    let program = read_ast(path)?;
    let bytecode = Pipeline::new(config.clone())
        .compile(&program)
        .with_context(|| format!("failed to compile {}", path.display()))?;
    if let Some(output) = output {
        fs::write(output, bytecode.to_string())
            .with_context(|| format!("failed to write {}", output.display()))?;
        info!(output = %output.display(), "wrote bytecode");
    }
    Ok(bytecode)
}

/// Runs one input file: `.cma` is executed directly, `.json` goes through
/// the whole pipeline.
pub fn run_file(path: &Path, config: &Config) -> Result<Value> {
    let pipeline = Pipeline::new(config.clone());
    let value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("cma") => pipeline.execute(&read_bytecode(path)?),
        Some("json") => pipeline.run(&read_ast(path)?),
        _ => bail!("unsupported input {} (expected .cma or .json)", path.display()),
    };
    value.with_context(|| format!("failed to run {}", path.display()))
}

/// Runs every file as an independent job. Results keep input order.
pub fn run_all(paths: &[PathBuf], config: &Config) -> Vec<Result<Value>> {
    paths
        .par_iter()
        .map(|path| run_file(path, config))
        .collect()
}

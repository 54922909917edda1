// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Pipeline configuration.

use serde::{Deserialize, Serialize};

/// Default number of memory slots, all zero-initialised.
pub const DEFAULT_MEMORY_SIZE: usize = 1000;

/// Default ceiling on memory growth through `ENTER` and `ALLOC`.
pub const DEFAULT_MAX_MEMORY: usize = 1 << 20;

/// Default entry function.
pub const DEFAULT_ENTRY: &str = "main";

/// Top-level configuration, as loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Virtual machine settings
    pub machine: MachineConfig,
    /// Code generator settings
    pub codegen: CodegenConfig,
}

/// Virtual machine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Number of memory slots
    pub memory_size: usize,

    /// Most slots memory may ever hold; the initial size is capped to it
    pub max_memory: usize,

    /// Log every executed instruction at `trace` level
    pub trace: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            max_memory: DEFAULT_MAX_MEMORY,
            trace: false,
        }
    }
}

/// Code generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Function called by the program prologue
    pub entry: String,

    /// Annotate the output with `//` comments
    pub comments: bool,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            entry: DEFAULT_ENTRY.to_string(),
            comments: true,
        }
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Host configuration loaded from an optional JSON file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Filesystem name shown in the mount table
    pub fs_name: String,
    /// Mount subtype (`fuse.<subtype>`)
    pub subtype: String,
    pub allow_other: bool,
    pub auto_unmount: bool,
    /// Stay attached to the terminal instead of detaching after mount
    pub foreground: bool,
    /// Serve requests on the calling thread
    pub single_thread: bool,
    /// Additional `-o` style mount options
    pub options: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            fs_name: "hello".to_string(),
            subtype: "hello".to_string(),
            allow_other: false,
            auto_unmount: false,
            foreground: false,
            single_thread: false,
            options: Vec::new(),
        }
    }
}

pub fn load_config(config_path: Option<&Path>) -> Result<HostConfig> {
    match config_path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            let config: HostConfig = serde_json::from_str(&content)
                .with_context(|| format!("parse config {}", path.display()))?;
            Ok(config)
        }
        None => Ok(HostConfig::default()),
    }
}

// Copyright (c) 2026 KFS Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Attach an editor's debugger to the kernel running under QEMU's gdb stub.
//!
//! The debug configuration travels inside a CodeLLDB launch URL; the editor is
//! only asked to open that URL.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::Args;
use log::info;
use serde::Serialize;

use crate::utils::canonicalize_path;

pub const LAUNCH_URL_BASE: &str = "vscode://vadimcn.vscode-lldb/launch/config";

#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// Kernel image with debug info
    #[arg(short = 'k', long = "kernel", default_value = "build/kernel.bin")]
    pub kernel: PathBuf,

    /// gdb stub address (QEMU -s listens on 1234)
    #[arg(long = "remote", default_value = "localhost:1234")]
    pub remote: String,

    /// Name of the debug session
    #[arg(long = "name", default_value = "kfs")]
    pub name: String,

    /// Editor executable that receives the URL
    #[arg(long = "editor", default_value = "code")]
    pub editor: String,

    /// Print the URL instead of opening it
    #[arg(long = "print", default_value_t = false)]
    pub print: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub request: String,
    pub target_create_commands: Vec<String>,
    pub process_create_commands: Vec<String>,
}

impl LaunchConfig {
    pub fn new(name: &str, program: &str, remote: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: "lldb".to_string(),
            request: "custom".to_string(),
            target_create_commands: vec![format!("target create {}", program)],
            process_create_commands: vec![format!("gdb-remote {}", remote)],
        }
    }

    pub fn from_args(args: &LaunchArgs) -> Self {
        let program = canonicalize_path(&args.kernel.to_string_lossy());
        Self::new(&args.name, &program, &args.remote)
    }

    pub fn launch_url(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}?{}", LAUNCH_URL_BASE, urlencoding::encode(&json)))
    }
}

pub fn open_in_editor(editor: &str, url: &str) -> Result<()> {
    info!("Opening {} in {}", url, editor);
    let status = Command::new(editor)
        .args(["--open-url", url])
        .status()
        .with_context(|| format!("Failed to spawn {}", editor))?;
    if !status.success() {
        bail!("{} exited with {}", editor, status);
    }
    Ok(())
}

pub fn run(args: LaunchArgs) -> Result<()> {
    let config = LaunchConfig::from_args(&args);
    let url = config.launch_url()?;

    if args.print {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", url)?;
        out.flush()?;
        return Ok(());
    }
    open_in_editor(&args.editor, &url)
}

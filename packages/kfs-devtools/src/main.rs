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

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::debug;

use kfs_devtools::checkstack::{self, CheckstackArgs};
use kfs_devtools::debug::{self as logging, DEFAULT_LOG_LEVEL};
use kfs_devtools::launch::{self, LaunchArgs};
use kfs_devtools::trace_feature::{self, TraceFeatureArgs};

#[derive(Parser, Debug)]
#[command(name = "kfs-devtools", version, about = "Developer tools for the kfs kernel")]
struct Cli {
    /// Enable debug output on stderr
    #[arg(short = 'd', long = "debug", global = true, default_value_t = false)]
    debug: bool,

    /// Log level spec (RUST_LOG takes precedence)
    #[arg(long = "log-level", global = true, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report per-function stack usage from objdump disassembly
    Checkstack(CheckstackArgs),
    /// List the labels used with trace_feature!
    TraceFeatures(TraceFeatureArgs),
    /// Open the editor's debugger on the kernel's gdb stub
    DebugLaunch(LaunchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::set_debug(cli.debug);
    let _logger = logging::init_logging(&cli.log_level)?;
    debug!("{:?}", cli.command);

    match cli.command {
        Command::Checkstack(args) => checkstack::run(args),
        Command::TraceFeatures(args) => trace_feature::run(args),
        Command::DebugLaunch(args) => launch::run(args),
    }
}

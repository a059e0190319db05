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

//! Global debug flag and logger setup.
//!
//! Every tool writes its report on stdout, so all diagnostics go through `log`
//! and end up on stderr.
use std::sync::OnceLock;

use anyhow::{Context, Result};
use flexi_logger::{Logger, LoggerHandle};

static DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// Level used when neither `--log-level` nor `RUST_LOG` says otherwise.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Initialize the debug flag. Must be called once at startup.
pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.set(enabled).ok();
}

/// Check if debug mode is enabled
pub fn is_debug() -> bool {
    *DEBUG_ENABLED.get().unwrap_or(&false)
}

/// Pick the log spec handed to the logger. `--debug` wins over `--log-level`.
pub fn effective_log_spec(level: &str) -> &str {
    if is_debug() {
        "debug"
    } else {
        level
    }
}

/// Start the stderr logger. `--debug` pins the level to `debug`; otherwise
/// `RUST_LOG` overrides `level` when it is set.
///
/// The returned handle must stay alive for as long as the program logs.
pub fn init_logging(level: &str) -> Result<LoggerHandle> {
    let spec = effective_log_spec(level);
    let logger = if is_debug() {
        Logger::try_with_str(spec)
    } else {
        Logger::try_with_env_or_str(spec)
    };
    logger
        .with_context(|| format!("Invalid log specification '{}'", spec))?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
        .context("Failed to start logger")
}

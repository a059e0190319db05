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

use std::env;
use std::path::Path;

use clap::ValueEnum;
use urlencoding::decode;

/// Report rendering shared by the tools that print lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain lines, one entry per line
    #[default]
    Text,
    /// A single JSON array
    Json,
}

/// Turn a user supplied path (or `file://` URI) into an absolute path with
/// forward slashes. Paths that do not exist yet are made absolute but left
/// otherwise untouched.
pub fn canonicalize_path(source_path: &str) -> String {
    let mut path_str = source_path.to_string();

    if let Some(rest) = path_str.strip_prefix("file://") {
        let decoded = decode(rest).map(|d| d.into_owned()).unwrap_or_else(|_| rest.to_string());
        path_str = decoded;

        // file:///C:/... leaves a leading slash in front of the drive letter
        if cfg!(windows) && path_str.starts_with('/') && path_str.chars().nth(2) == Some(':') {
            path_str.remove(0);
        }
    }

    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().unwrap_or_default().join(path)
    };

    // dunce strips the \\?\ prefix std::fs::canonicalize adds on Windows
    let canonical = dunce::canonicalize(&absolute).unwrap_or(absolute);
    let mut final_path = canonical.to_string_lossy().replace('\\', "/");

    // C:/ not c:/
    if cfg!(windows) && final_path.chars().nth(1) == Some(':') {
        final_path = final_path[..1].to_uppercase() + &final_path[1..];
    }

    final_path
}

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

//! Lists the feature labels used with the kernel's `trace_feature!` macro, so
//! they can be enabled one by one at build time.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use clap::Args;
use log::{debug, warn};
use regex::Regex;

use crate::utils::OutputFormat;

// Only the first string literal is a label; `"a" | "b"` yields "a".
static TRACE_FEATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"trace_feature!\s*\(\s*("[^"]+").*\)"#).expect("trace_feature regex")
});

#[derive(Args, Debug)]
pub struct TraceFeatureArgs {
    /// Directory searched recursively for .rs files
    #[arg(short = 'r', long = "root", default_value = "./")]
    pub root: PathBuf,

    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Labels found in one file, quotes stripped, in source order.
pub fn extract_feature_names(content: &str) -> Vec<String> {
    TRACE_FEATURE
        .captures_iter(content)
        .map(|caps| caps[1].trim_matches('"').to_string())
        .collect()
}

fn is_rust_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "rs")
}

/// Every `.rs` file below `root`. Symlinked directories are not followed.
pub fn collect_rust_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(path);
            } else if is_rust_source(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

pub fn search_for_trace_feature(root: &Path) -> Result<BTreeSet<String>> {
    let mut features = BTreeSet::new();
    for path in collect_rust_files(root)? {
        let bytes =
            fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let Ok(content) = String::from_utf8(bytes) else {
            warn!("Skipping {}: not UTF-8", path.display());
            continue;
        };
        let found = extract_feature_names(&content);
        if !found.is_empty() {
            debug!("{}: {:?}", path.display(), found);
        }
        features.extend(found);
    }
    Ok(features)
}

pub fn write_feature_list<W: Write>(
    out: &mut W,
    features: &BTreeSet<String>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(out, "[Trace Feature List]:")?;
            for name in features {
                writeln!(out, "{}", name)?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, features)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn run(args: TraceFeatureArgs) -> Result<()> {
    let features = search_for_trace_feature(&args.root)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_feature_list(&mut out, &features, args.format)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_invocations() {
        let src = r#"
            trace_feature!("oom", "oom_handler wake up!");
            trace_feature!("size_cache", "size_cache<{}> generated", N);
        "#;
        assert_eq!(extract_feature_names(src), ["oom", "size_cache"]);
    }

    #[test]
    fn label_on_next_line() {
        let src = "trace_feature!(\n\t\"time-wait\", \"{}\", pid);\n";
        assert_eq!(extract_feature_names(src), ["time-wait"]);
    }

    #[test]
    fn alternatives_take_first_label() {
        let src = r#"trace_feature!("partition-load" | "partition-load_async", "{:?}", bid);"#;
        assert_eq!(extract_feature_names(src), ["partition-load"]);
    }

    #[test]
    fn imports_and_definitions_do_not_match() {
        let src = "use crate::trace_feature;\nmacro_rules! trace_feature { ($f:literal) => {} }\n";
        assert!(extract_feature_names(src).is_empty());
    }

    #[test]
    fn text_listing() {
        let features: BTreeSet<String> = ["b", "a"].iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        write_feature_list(&mut out, &features, OutputFormat::Text).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[Trace Feature List]:\na\nb\n");
    }
}

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

//! Stack usage report over `objdump -d -M intel` output.
//!
//! objdump prints one block per function, blocks separated by a blank line:
//!
//! ```text
//! 08048000 <main>:
//!  8048000:	55                   	push   ebp
//!  8048001:	89 e5                	mov    ebp,esp
//!  8048003:	83 ec 18             	sub    esp,0x18
//! ```
//!
//! A block whose first line is a `<address> <name>:` header is a function. Its
//! stack usage is the largest immediate subtracted from the stack pointer in
//! the block. Every other instruction form (`push`, `and esp`, ...) is ignored.

use std::borrow::Cow;
use std::cmp::Reverse;
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use clap::Args;
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;

use crate::utils::OutputFormat;

pub const DEFAULT_SP_REGISTER: &str = "esp";

// The capture lives in the same expression that recognizes the header, so a
// matching header always has a name.
static BLOCK_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]+\s+<(.*)>:").expect("block header regex"));

#[derive(Args, Debug)]
pub struct CheckstackArgs {
    /// Disassembly to read ('-' or absent = stdin)
    pub input: Option<PathBuf>,

    /// Disassemble this ELF with objdump instead of reading text input
    #[arg(long = "elf", conflicts_with = "input")]
    pub elf: Option<PathBuf>,

    /// objdump executable used with --elf
    #[arg(long = "objdump", default_value = "objdump")]
    pub objdump: String,

    /// Stack pointer register whose `sub` immediates are counted
    #[arg(long = "sp-register", default_value = DEFAULT_SP_REGISTER)]
    pub sp_register: String,

    /// Demangle Rust symbol names
    #[arg(long = "demangle", default_value_t = false)]
    pub demangle: bool,

    /// Only print the N largest frames
    #[arg(long = "top")]
    pub top: Option<usize>,

    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

// Same values clap fills in when no flag is given.
impl Default for CheckstackArgs {
    fn default() -> Self {
        Self {
            input: None,
            elf: None,
            objdump: "objdump".to_string(),
            sp_register: DEFAULT_SP_REGISTER.to_string(),
            demangle: false,
            top: None,
            format: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionRecord {
    pub name: String,
    pub stack_bytes: u64,
}

impl FunctionRecord {
    pub fn new(name: impl Into<String>, stack_bytes: u64) -> Self {
        Self {
            name: name.into(),
            stack_bytes,
        }
    }
}

impl fmt::Display for FunctionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} bytes.", self.name, self.stack_bytes)
    }
}

/// Finds function blocks and their largest stack pointer subtraction.
pub struct StackScanner {
    sub_sp: Regex,
}

impl StackScanner {
    pub fn new(sp_register: &str) -> Result<Self> {
        let pattern = format!(r"sub\s+{},0x([a-f0-9]+)", regex::escape(sp_register));
        let sub_sp = Regex::new(&pattern)
            .with_context(|| format!("Bad stack pointer register '{}'", sp_register))?;
        Ok(Self { sub_sp })
    }

    /// Scan one blank-line delimited block. Returns `None` when the block is not
    /// a function (file headers, section banners, ...).
    pub fn scan_block(&self, block: &str) -> Option<FunctionRecord> {
        let mut lines = block.lines();
        let header = lines.next()?;
        let name = BLOCK_HEADER.captures(header)?.get(1)?.as_str();

        let mut stack_bytes = 0u64;
        for line in lines {
            let Some(caps) = self.sub_sp.captures(line) else {
                continue;
            };
            let digits = &caps[1];
            // Only hex digits reach here, so the one failure is overflow.
            let value = u64::from_str_radix(digits, 16).unwrap_or_else(|e| {
                warn!("{}: immediate 0x{} saturated to u64::MAX: {}", name, digits, e);
                u64::MAX
            });
            stack_bytes = stack_bytes.max(value);
        }

        Some(FunctionRecord::new(name, stack_bytes))
    }

    /// Scan a whole disassembly listing, keeping blocks in input order.
    pub fn scan(&self, disasm: &str) -> Vec<FunctionRecord> {
        let disasm: Cow<str> = if disasm.contains('\r') {
            Cow::Owned(disasm.replace("\r\n", "\n"))
        } else {
            Cow::Borrowed(disasm)
        };

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for block in disasm.split("\n\n") {
            match self.scan_block(block) {
                Some(record) => {
                    debug!("{}", record);
                    records.push(record);
                }
                None => skipped += 1,
            }
        }
        debug!("{} function blocks, {} other blocks", records.len(), skipped);
        records
    }
}

/// Function records ordered by descending stack usage.
#[derive(Debug, Clone, Default)]
pub struct StackReport {
    records: Vec<FunctionRecord>,
}

impl StackReport {
    /// Sort once, stable, so equal frames keep the order their blocks came in.
    pub fn from_records(mut records: Vec<FunctionRecord>) -> Self {
        records.sort_by_key(|r| Reverse(r.stack_bytes));
        Self { records }
    }

    pub fn records(&self) -> &[FunctionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn truncate(&mut self, top: usize) {
        self.records.truncate(top);
    }

    /// Replace mangled Rust names with their readable form (hash suffix dropped).
    pub fn demangle_names(&mut self) {
        for record in &mut self.records {
            if let Ok(demangled) = rustc_demangle::try_demangle(&record.name) {
                record.name = format!("{:#}", demangled);
            }
        }
    }

    pub fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for record in &self.records {
            writeln!(out, "{}", record)?;
        }
        Ok(())
    }

    pub fn write_json<W: Write>(&self, out: &mut W) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, &self.records)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn write<W: Write>(&self, out: &mut W, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Text => self.write_text(out)?,
            OutputFormat::Json => self.write_json(out)?,
        }
        Ok(())
    }
}

/// Scan `disasm` and build the sorted report, honoring the report options.
pub fn build_report(args: &CheckstackArgs, disasm: &str) -> Result<StackReport> {
    let scanner = StackScanner::new(&args.sp_register)?;
    let mut report = StackReport::from_records(scanner.scan(disasm));
    if args.demangle {
        report.demangle_names();
    }
    if let Some(top) = args.top {
        report.truncate(top);
    }
    Ok(report)
}

/// Read the whole input up front; no maximum is known before the last block.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => fs::read_to_string(p)
            .with_context(|| format!("Failed to read disassembly from {}", p.display())),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read disassembly from stdin")?;
            Ok(text)
        }
    }
}

/// Disassemble `elf` with Intel syntax, which is what the `sub esp,0x..` pattern expects.
pub fn read_objdump(objdump: &str, elf: &Path) -> Result<String> {
    info!("Running {} -d -M intel {}", objdump, elf.display());
    let mut child = Command::new(objdump)
        .args(["-d", "-M", "intel"])
        .arg(elf)
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn {}", objdump))?;

    let mut stdout = child
        .stdout
        .take()
        .context("Failed to capture objdump stdout")?;
    let mut text = String::new();
    let read = stdout.read_to_string(&mut text);

    // reap the child even if the read failed
    let status = child.wait()?;
    read.with_context(|| format!("{} produced non UTF-8 output", objdump))?;
    if !status.success() {
        bail!("{} exited with {} for {}", objdump, status, elf.display());
    }
    Ok(text)
}

pub fn run(args: CheckstackArgs) -> Result<()> {
    let disasm = match &args.elf {
        Some(elf) => read_objdump(&args.objdump, elf)?,
        None => read_input(args.input.as_deref())?,
    };

    let report = build_report(&args, &disasm)?;
    info!("{} functions in report", report.len());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report.write(&mut out, args.format)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn esp() -> StackScanner {
        StackScanner::new(DEFAULT_SP_REGISTER).unwrap()
    }

    fn report_text(disasm: &str) -> String {
        let report = StackReport::from_records(esp().scan(disasm));
        let mut out = Vec::new();
        report.write_text(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn single_function() {
        let disasm = "08048000 <main>:\n 8048000:\t83 ec 18\tsub    esp,0x18\n";
        assert_eq!(report_text(disasm), "main: 24 bytes.\n");
    }

    #[test]
    fn sorted_by_stack_usage() {
        let disasm = "f1 <a>:\n sub esp,0x10\n\nf2 <b>:\n sub esp,0x30\n";
        assert_eq!(report_text(disasm), "b: 48 bytes.\na: 16 bytes.\n");
    }

    #[test]
    fn function_without_sub_is_zero() {
        let disasm = "c0100000 <name>:\n c0100000:\t55\tpush   ebp\n c0100001:\tc3\tret\n";
        assert_eq!(report_text(disasm), "name: 0 bytes.\n");
    }

    #[test]
    fn empty_input() {
        assert_eq!(report_text(""), "");
    }

    #[test]
    fn largest_sub_in_block_wins() {
        let block = "c0100000 <f>:\n sub    esp,0x8\n sub    esp,0x2c\n sub    esp,0x4\n";
        assert_eq!(esp().scan_block(block), Some(FunctionRecord::new("f", 0x2c)));
    }

    #[test]
    fn ties_keep_input_order() {
        let disasm = "1 <first>:\n sub esp,0x20\n\n2 <big>:\n sub esp,0x40\n\n3 <second>:\n sub esp,0x20\n";
        let report = StackReport::from_records(esp().scan(disasm));
        let names: Vec<&str> = report.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["big", "first", "second"]);
    }

    #[test]
    fn duplicate_names_are_kept() {
        let disasm = "1 <dup>:\n sub esp,0x8\n\n2 <dup>:\n sub esp,0xc\n";
        assert_eq!(report_text(disasm), "dup: 12 bytes.\ndup: 8 bytes.\n");
    }

    #[test]
    fn non_function_blocks_are_ignored() {
        let disasm = "\nkernel.bin:     file format elf32-i386\n\n\nDisassembly of section .text:\n\nc0100000 <_start>:\nc0100000:\t83 ec 10\tsub    esp,0x10\n";
        assert_eq!(report_text(disasm), "_start: 16 bytes.\n");
    }

    #[test]
    fn header_line_is_not_scanned() {
        let block = "c0100000 <sub esp,0x99>:\n ret\n";
        assert_eq!(esp().scan_block(block).unwrap().stack_bytes, 0);
    }

    #[test]
    fn other_registers_and_forms_do_not_count() {
        let block = "1 <f>:\n and    esp,0xfffffff0\n sub    eax,0x100\n add    esp,0x40\n";
        assert_eq!(esp().scan_block(block).unwrap().stack_bytes, 0);
    }

    #[test]
    fn own_output_is_not_disassembly() {
        let once = report_text("f1 <a>:\n sub esp,0x10\n\nf2 <b>:\n sub esp,0x30\n");
        assert_eq!(report_text(&once), "");
    }

    #[test]
    fn crlf_input() {
        let disasm = "1 <a>:\r\n sub esp,0x10\r\n\r\n2 <b>:\r\n sub esp,0x20\r\n";
        assert_eq!(report_text(disasm), "b: 32 bytes.\na: 16 bytes.\n");
    }

    #[test]
    fn oversized_immediate_saturates() {
        let block = "1 <f>:\n sub esp,0x8\n sub esp,0x10000000000000000\n";
        assert_eq!(esp().scan_block(block).unwrap().stack_bytes, u64::MAX);
    }

    #[test]
    fn only_lower_case_hex_is_read() {
        // objdump never prints upper case; "0x1A" reads as 0x1
        let block = "c0100000 <f>:\n sub esp,0x1A\n";
        assert_eq!(esp().scan_block(block).unwrap().stack_bytes, 1);
        assert_eq!(esp().scan_block("C0100000 <f>:\n sub esp,0x10\n"), None);
    }

    #[test]
    fn default_args_match_command_line_defaults() {
        let args = CheckstackArgs::default();
        assert_eq!(args.sp_register, "esp");
        assert_eq!(args.objdump, "objdump");

        let report = build_report(&args, "08048000 <main>:\n sub    esp,0x18\n sub ,0x99\n").unwrap();
        assert_eq!(report.records(), &[FunctionRecord::new("main", 24)]);
    }

    #[test]
    fn custom_register() {
        let scanner = StackScanner::new("rsp").unwrap();
        let block = "1 <f>:\n sub    rsp,0x28\n sub    esp,0x100\n";
        assert_eq!(scanner.scan_block(block).unwrap().stack_bytes, 0x28);
    }

    #[test]
    fn garbled_names_pass_through() {
        assert_eq!(report_text("abc <>:\n sub esp,0x4\n"), ": 4 bytes.\n");
    }

    #[test]
    fn report_options() {
        let args = CheckstackArgs {
            demangle: true,
            top: Some(1),
            ..Default::default()
        };
        let disasm = "1 <_ZN3kfs4main17h0123456789abcdefE>:\n sub esp,0x40\n\n2 <other>:\n sub esp,0x4\n";
        let report = build_report(&args, disasm).unwrap();
        assert_eq!(report.records(), &[FunctionRecord::new("kfs::main", 0x40)]);
    }

    #[test]
    fn json_format() {
        let report = StackReport::from_records(vec![FunctionRecord::new("main", 24)]);
        let mut out = Vec::new();
        report.write(&mut out, OutputFormat::Json).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v[0]["name"], "main");
        assert_eq!(v[0]["stack_bytes"], 24);
    }
}

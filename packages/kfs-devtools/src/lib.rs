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

// Crate root: one module per tool, plus shared helpers
pub mod checkstack;
pub mod debug;
pub mod launch;
pub mod trace_feature;
pub mod utils;

// Re-export commonly used API from the library for binaries/tests
pub use checkstack::{FunctionRecord, StackReport, StackScanner};
pub use utils::{canonicalize_path, OutputFormat};

//! EDL compiler - Exchange Definition Language to typed client source
//!
//! An EDL document is a YAML description of an exchange: endpoints, params,
//! fragments, rate limits, has-flags, transaction mappings and (v2) interface
//! methods. The compiler turns it into one generated exchange class.
//!
//! ## Pipeline
//! Source -> Parser -> Document model -> Analyzer (+ Linter) -> Generator -> Emitter
//!
//! ## Quick Start
//!
//! ```rust
//! use edl_compiler::{compile_content, CompileOptions};
//!
//! let source = "id: ex1\nendpoints:\n  - name: fetchTicker\n    params: []\n";
//! let (code, result) = compile_content(source, &CompileOptions::default());
//! assert!(result.success);
//! assert!(code.unwrap().contains("async fetchTicker()"));
//! ```

// Errors and diagnostics
pub mod diagnostics;
pub mod error;

// Configuration
pub mod config;

// Safe expression sub-language
pub mod expr;

// Identifier rules shared by the analyzer and the generator
pub mod names;

// Front end
pub mod parser;

// Semantic checks
pub mod analyzer;
pub mod lint;

// Back end
pub mod codegen;

// Driver
pub mod compiler;

pub use analyzer::{analyze_edl, ValidationResult};
pub use codegen::{emit, generate_exchange, GeneratorOptions, TsFile};
pub use compiler::{compile_batch, compile_content, compile_file, CompileResult};
pub use config::{CompileOptions, ConfigLoader, LintPolicy};
pub use diagnostics::{Diagnostic, DiagnosticCode};
pub use error::{CompileError, GenerationError};
pub use lint::{get_all_rules, get_critical_rules, lint, lint_with_rules, LintError, LintResult};
pub use parser::{detect_version, parse, ParseOutcome};

pub use edl_types;

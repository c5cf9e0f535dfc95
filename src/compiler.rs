//! Compile driver.
//!
//! parse -> analyze -> lint -> generate -> emit. Parse and analyzer findings are
//! accumulated; generation is fail-fast. Output is written only when the
//! compilation succeeds.

use std::path::{Path, PathBuf};

use edl_types::{DocumentVersion, ParsedDocument};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::analyzer::analyze_edl;
use crate::codegen::{emit, generate_exchange, GeneratorOptions};
use crate::config::{CompileOptions, LintPolicy};
use crate::error::CompileError;
use crate::lint::{get_rule, lint, LintError};
use crate::parser::parse;

/// Per-stage summary at `info` when verbose, `debug` otherwise
macro_rules! stage {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Outcome of one compilation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub success: bool,
    pub exchange_id: Option<String>,
    pub output_path: Option<PathBuf>,
    pub code: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub version: Option<DocumentVersion>,
    /// sha256 of `code`, hex encoded
    pub content_hash: Option<String>,
}

impl CompileResult {
    fn failed(error: impl ToString) -> Self {
        Self {
            errors: vec![error.to_string()],
            ..Default::default()
        }
    }
}

/// Where a lint finding lands under `policy`
fn lint_is_fatal(finding: &LintError, policy: LintPolicy) -> bool {
    if !finding.is_error() {
        return false;
    }
    match policy {
        LintPolicy::Advisory => false,
        LintPolicy::CriticalFatal => get_rule(&finding.rule_id).is_some_and(|r| r.is_critical()),
        LintPolicy::AllFatal => true,
    }
}

pub fn content_hash(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compile source text; returns the generated code alongside the result
pub fn compile_content(content: &str, options: &CompileOptions) -> (Option<String>, CompileResult) {
    compile_named(content, None, options)
}

fn compile_named(
    content: &str,
    source_name: Option<&str>,
    options: &CompileOptions,
) -> (Option<String>, CompileResult) {
    let mut result = CompileResult::default();

    // ===== PARSE =====
    let outcome = parse(content, source_name);
    for diag in &outcome.diagnostics {
        if diag.is_error() {
            result.errors.push(diag.to_string());
        } else {
            result.warnings.push(diag.to_string());
        }
    }
    let Some(parsed) = outcome.document else {
        stage!(options.verbose, "Compilation aborted: {}", result.errors.join("; "));
        return (None, result);
    };
    result.exchange_id = Some(parsed.document().exchange.id.clone()).filter(|id| !id.is_empty());
    result.version = Some(parsed.version());

    // ===== ANALYZE =====
    let validation = analyze_edl(&parsed);
    stage!(
        options.verbose,
        "Analyzed '{}': {} error(s), {} warning(s)",
        parsed.document().exchange.id,
        validation.errors.len(),
        validation.warnings.len()
    );
    result.errors.extend(validation.errors.iter().map(ToString::to_string));
    result.warnings.extend(validation.warnings.iter().map(ToString::to_string));

    // ===== LINT =====
    if options.lint {
        let findings = lint(&parsed);
        stage!(
            options.verbose,
            "Linted '{}': {} finding(s)",
            parsed.document().exchange.id,
            findings.errors.len()
        );
        for finding in &findings.errors {
            if lint_is_fatal(finding, options.lint_policy) {
                result.errors.push(finding.to_string());
            } else {
                result.warnings.push(finding.to_string());
            }
        }
    }

    if !result.errors.is_empty() {
        stage!(
            options.verbose,
            "Compilation of '{}' failed with {} error(s)",
            parsed.document().exchange.id,
            result.errors.len()
        );
        return (None, result);
    }
    if options.validate_only {
        result.success = true;
        return (None, result);
    }

    // ===== GENERATE =====
    match generate(&parsed, options) {
        Ok(code) => {
            result.content_hash = Some(content_hash(&code));
            result.code = Some(code.clone());
            result.success = true;
            (Some(code), result)
        }
        Err(e) => {
            warn!("Generation failed after a clean analysis: {}", e);
            result.errors.push(e.to_string());
            (None, result)
        }
    }
}

fn generate(parsed: &ParsedDocument, options: &CompileOptions) -> Result<String, CompileError> {
    let file = generate_exchange(parsed, &GeneratorOptions::from(options))?;
    let code = emit(&file);
    stage!(
        options.verbose,
        "Generated {} with {} method(s), {} bytes",
        file.class.name,
        file.class.methods.len(),
        code.len()
    );
    Ok(code)
}

/// Compile one file; writes `<output_dir>/<id>.ts` when successful
pub fn compile_file(path: impl AsRef<Path>, options: &CompileOptions) -> CompileResult {
    let path = path.as_ref();
    match try_compile_file(path, options) {
        Ok(result) => result,
        Err(e) => {
            warn!("{}", e);
            CompileResult::failed(e)
        }
    }
}

fn try_compile_file(path: &Path, options: &CompileOptions) -> Result<CompileResult, CompileError> {
    let content = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    stage!(options.verbose, "Read {} ({} bytes)", path.display(), content.len());

    let source_name = path.file_name().and_then(|n| n.to_str());
    let (code, mut result) = compile_named(&content, source_name, options);

    if let (Some(code), Some(dir), Some(id)) = (&code, &options.output_dir, &result.exchange_id) {
        let output = dir.join(format!("{}.ts", id));
        std::fs::create_dir_all(dir)
            .and_then(|_| std::fs::write(&output, code))
            .map_err(|source| CompileError::OutputWrite {
                path: output.clone(),
                source,
            })?;
        info!("Wrote {}", output.display());
        result.output_path = Some(output);
    }
    Ok(result)
}

/// Compile documents in parallel; results are in input order
pub fn compile_batch<P>(paths: &[P], options: &CompileOptions) -> Vec<CompileResult>
where
    P: AsRef<Path> + Sync,
{
    info!("Compiling {} document(s)", paths.len());
    paths
        .par_iter()
        .map(|path| compile_file(path, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = "id: ex1\nendpoints:\n  - name: fetchTicker\n    params: []\n";

    #[test]
    fn test_minimal_document_compiles() {
        let (code, result) = compile_content(MINIMAL, &CompileOptions::default());
        assert!(result.success, "{:?}", result.errors);
        let code = code.unwrap();
        assert!(code.contains("async fetchTicker(): Promise<any> {"));
        assert_eq!(result.exchange_id.as_deref(), Some("ex1"));
        assert_eq!(result.version, Some(DocumentVersion::V0));
        assert_eq!(result.content_hash, Some(content_hash(&code)));
        assert_eq!(result.code.as_deref(), Some(code.as_str()));
    }

    #[test]
    fn test_fatal_parse_error() {
        let (code, result) = compile_content("id: [unclosed\n", &CompileOptions::default());
        assert!(code.is_none());
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("yaml-syntax"));
        assert!(result.exchange_id.is_none());
    }

    #[test]
    fn test_analyzer_error_blocks_generation() {
        let src = "id: ex1\nendpoints:\n  - name: a\n  - name: a\n";
        let (code, result) = compile_content(src, &CompileOptions::default());
        assert!(code.is_none());
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.contains("duplicate-endpoint")));
        assert!(result.code.is_none());
    }

    #[test]
    fn test_validate_only_returns_no_code() {
        let (code, result) = compile_content(MINIMAL, &CompileOptions::validate_only());
        assert!(result.success);
        assert!(code.is_none());
        assert!(result.content_hash.is_none());
    }

    #[test]
    fn test_lint_policy() {
        let src = "id: ex1\nendpoints:\n  - name: fetchOrder\n    path: orders/{id\n";
        let (_, advisory) = compile_content(src, &CompileOptions::default());
        assert!(advisory.success);
        assert!(advisory.warnings.iter().any(|w| w.contains("unterminated-placeholder")));

        let (_, strict) = compile_content(src, &CompileOptions::strict());
        assert!(!strict.success);
        assert!(strict.errors.iter().any(|e| e.contains("unterminated-placeholder")));
    }

    #[test]
    fn test_lint_disabled() {
        let src = "id: ex1\nendpoints:\n  - name: fetchOrder\n    path: orders/{id\n";
        let options = CompileOptions {
            lint: false,
            lint_policy: LintPolicy::AllFatal,
            ..Default::default()
        };
        let (_, result) = compile_content(src, &options);
        assert!(result.success);
        assert!(result.warnings.iter().all(|w| !w.contains("unterminated")));
    }
}

//! End-to-end compilation of the fixture documents.
//!
//! Runs without any external services: each test reads YAML from
//! tests/fixtures/ and drives the public compile API.

use std::path::PathBuf;

use edl_compiler::edl_types::DocumentVersion;
use edl_compiler::{compile_batch, compile_content, compile_file, CompileOptions, LintPolicy};
use pretty_assertions::assert_eq;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture(name)).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// SINGLE DOCUMENTS
// =============================================================================

#[test]
fn test_minimal_document() {
    init_tracing();
    let (code, result) = compile_content(&read_fixture("minimal.yaml"), &CompileOptions::default());
    assert!(result.success, "{:?}", result.errors);
    assert!(result.errors.is_empty());
    let code = code.unwrap();
    assert!(code.contains("export default class Ex1 extends Exchange {"));
    assert!(code.contains("    async fetchTicker(): Promise<any> {\n"));
}

#[test]
fn test_full_document() {
    init_tracing();
    let options = CompileOptions {
        verbose: true,
        ..Default::default()
    };
    let (code, result) = compile_content(&read_fixture("full_v0.yaml"), &options);
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.exchange_id.as_deref(), Some("sample"));
    let code = code.unwrap();

    // identity and tables
    assert!(code.contains("export default class Sample extends Exchange {"));
    assert!(code.contains("'name': 'Sample Exchange',"));
    assert!(code.contains("'countries': ['US', 'GB'],"));
    assert!(code.contains("'rateLimits': {"));
    assert!(code.contains("'fetchOHLCV': 'emulated',"));
    assert!(code.contains("'createOrder': { 'spot': true, 'swap': false },"));

    // inherited params: own first, then fragment params depth first
    assert!(code.contains(
        "async fetchTrades(since: Int = undefined, limit: Int = 100, symbol: string): Promise<any> {"
    ));
    assert!(code.contains("async fetchOrderBook(limit: Int = 100, symbol: string): Promise<any> {"));

    // costs: group override, inline cost, default
    assert!(code.contains("this.request('depth', 'public', 'GET', request, { 'cost': 2 })"));
    assert!(code.contains("this.request('trades', 'public', 'GET', request, { 'cost': 5 })"));
    assert!(code.contains("this.request('ticker/price', 'public', 'GET', request);"));

    // validation
    assert!(code.contains("this.checkRequiredArgument('createOrder', side, 'side', ['buy', 'sell']);"));
    assert!(code.contains(
        "if (type == 'limit') {\n            this.checkRequiredArgument('createOrder', price, 'price');\n        }"
    ));

    // array operations
    assert!(code.contains(
        "result['bids'] = data.bids.map((level) => [Number(level[0]), Number(level[1])]);"
    ));
    assert!(code.contains(
        "result['total'] = data.bids.reduce((acc, level) => acc + Number(level[1]), 0);"
    ));

    // transactions and wallet
    assert!(code.contains("parseTransaction(data: Dict): Dict {"));
    assert!(code.contains("parseTransactionStatus(status: Str): Str {"));
    assert!(code.contains("parseTransactionType(type: Str): Str {"));
    assert!(code.contains("async fetchDepositAddress(code: string): Promise<any> {"));
    assert!(code.contains(
        "this.request('withdraw/apply', 'private', 'POST', request, { 'cost': 10 })"
    ));
    assert!(code.contains("return this.parseTransaction(response);"));

    // comments carried over as annotations
    assert!(code.contains("    // Latest price for one symbol\n    async fetchTicker("));
}

#[test]
fn test_v1_api_tree() {
    let (code, result) = compile_content(&read_fixture("v1_api.yaml"), &CompileOptions::default());
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.version, Some(DocumentVersion::V1));
    let code = code.unwrap();
    assert!(code.contains("async publicGetTicker(): Promise<any> {"));
    assert!(code.contains("async privatePostOrder(): Promise<any> {"));
    assert!(code.contains("'post': { 'order': 1 },"));
}

#[test]
fn test_v2_interface() {
    let (code, result) = compile_content(&read_fixture("v2_interface.yaml"), &CompileOptions::default());
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.version, Some(DocumentVersion::V2));
    let code = code.unwrap();
    assert!(code.contains("import { NotSupported } from './base/errors.js';"));
    assert!(code.contains("const selected = type !== undefined ? type : 'spot';"));
    assert!(code.contains("const response = await this.privateGetFuturesAccount();"));
    assert!(code.contains("result['total'] = this.safeNumber(data, 'equity');"));
    assert!(code.contains(" * @returns {Promise<Ticker>}"));
}

#[test]
fn test_compilation_is_idempotent() {
    for name in ["minimal.yaml", "full_v0.yaml", "v1_api.yaml", "v2_interface.yaml"] {
        let content = read_fixture(name);
        let (first, a) = compile_content(&content, &CompileOptions::default());
        let (second, b) = compile_content(&content, &CompileOptions::default());
        assert_eq!(first, second, "{}", name);
        assert_eq!(a.content_hash, b.content_hash);
    }
}

#[test]
fn test_without_comments() {
    let options = CompileOptions {
        include_comments: false,
        ..Default::default()
    };
    let (code, _) = compile_content(&read_fixture("full_v0.yaml"), &options);
    let code = code.unwrap();
    assert!(!code.contains("/**"));
    assert!(!code.contains("// Latest price"));
}

// =============================================================================
// LINT POLICY
// =============================================================================

#[test]
fn test_lint_findings_are_advisory_by_default() {
    let (code, result) = compile_content(&read_fixture("bad_lint.yaml"), &CompileOptions::default());
    assert!(result.success, "{:?}", result.errors);
    assert!(code.is_some());
    for rule in [
        "unterminated-placeholder",
        "malformed-transform-chain",
        "malformed-mapping-path",
        "unknown-path-placeholder",
        "inconsistent-endpoint-case",
    ] {
        assert!(
            result.warnings.iter().any(|w| w.contains(rule)),
            "missing {} in {:?}",
            rule,
            result.warnings
        );
    }
}

#[test]
fn test_lint_policies_escalate() {
    let content = read_fixture("bad_lint.yaml");

    let (_, critical) = compile_content(&content, &CompileOptions::strict());
    assert!(!critical.success);
    assert!(critical.errors.iter().any(|e| e.contains("unterminated-placeholder")));
    // not a critical rule
    assert!(critical.warnings.iter().any(|w| w.contains("malformed-mapping-path")));

    let all = CompileOptions {
        lint_policy: LintPolicy::AllFatal,
        ..Default::default()
    };
    let (code, result) = compile_content(&content, &all);
    assert!(code.is_none());
    assert!(result.errors.iter().any(|e| e.contains("malformed-mapping-path")));
    // warnings stay warnings under every policy
    assert!(result.warnings.iter().any(|w| w.contains("inconsistent-endpoint-case")));
}

// =============================================================================
// FILES
// =============================================================================

#[test]
fn test_compile_file_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let options = CompileOptions::default().with_output_dir(dir.path().join("out"));

    let result = compile_file(fixture("full_v0.yaml"), &options);
    assert!(result.success, "{:?}", result.errors);
    let output = result.output_path.clone().unwrap();
    assert_eq!(output, dir.path().join("out").join("sample.ts"));
    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(Some(written.clone()), result.code);
    assert!(written.starts_with("// Generated by edl-compiler from full_v0.yaml.\n"));
}

#[test]
fn test_failed_compilation_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.yaml");
    std::fs::write(&source, "id: broken\nendpoints:\n  - name: a\n  - name: a\n").unwrap();
    let out = dir.path().join("out");

    let result = compile_file(&source, &CompileOptions::default().with_output_dir(&out));
    assert!(!result.success);
    assert!(result.output_path.is_none());
    assert!(!out.join("broken.ts").exists());
}

#[test]
fn test_validate_only_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let options = CompileOptions::validate_only().with_output_dir(dir.path());
    let result = compile_file(fixture("minimal.yaml"), &options);
    assert!(result.success);
    assert!(result.code.is_none());
    assert!(!dir.path().join("ex1.ts").exists());
}

#[test]
fn test_missing_file() {
    let result = compile_file(fixture("does_not_exist.yaml"), &CompileOptions::default());
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("failed to read"));
}

#[test]
fn test_batch_preserves_order() {
    let paths = vec![
        fixture("v2_interface.yaml"),
        fixture("does_not_exist.yaml"),
        fixture("minimal.yaml"),
        fixture("v1_api.yaml"),
    ];
    let results = compile_batch(&paths, &CompileOptions::default());
    let ids: Vec<Option<&str>> = results.iter().map(|r| r.exchange_id.as_deref()).collect();
    assert_eq!(ids, vec![Some("modern"), None, Some("ex1"), Some("legacy")]);
    let success: Vec<bool> = results.iter().map(|r| r.success).collect();
    assert_eq!(success, vec![true, false, true, true]);
}

#[test]
fn test_names_that_are_not_identifiers_fail() {
    let source = "id: ex1\nendpoints:\n  - name: fetch-ticker\n    params:\n      - name: end-time\n        type: integer\n";
    let (code, result) = compile_content(source, &CompileOptions::default());
    assert!(!result.success);
    assert!(code.is_none());
    assert!(result.errors.iter().any(|e| e.contains("invalid-identifier")), "{:?}", result.errors);

    let source = "id: ex1\nendpoints:\n  - name: fetchTicker\n    params: [class]\n";
    let (code, result) = compile_content(source, &CompileOptions::default());
    assert!(!result.success);
    assert!(code.is_none());
}

#[test]
fn test_deep_prefix_chain_is_rejected_not_fatal() {
    let compute = format!("{}data", "!".repeat(50_000));
    let source = format!(
        "id: ex1\nendpoints:\n  - name: fetchTicker\n    response:\n      mapping:\n        x: {{ compute: \"{}\" }}\n",
        compute
    );
    let (code, result) = compile_content(&source, &CompileOptions::default());
    assert!(!result.success);
    assert!(code.is_none());
    assert!(
        result.errors.iter().any(|e| e.contains("nesting depth")),
        "{:?}",
        result.errors
    );
}

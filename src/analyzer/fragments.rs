//! Fragment graph checks and fragment inheritance.
//!
//! The graph has an edge `a -> b` for every `uses: [b]` inside fragment `a`.
//! Cycles are found with a three-colour depth-first walk; every back edge is
//! one cycle and is reported once, naming the full path.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use edl_types::{EdlDocument, EndpointDefinition, FragmentReference, ParamDefinition, RawCostConfig};

use crate::diagnostics::{Diagnostic, DiagnosticCode};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Unresolved references, cycles and unused fragments
pub fn check_fragments(doc: &EdlDocument, diags: &mut Vec<Diagnostic>) {
    // F1: every reference resolves
    for endpoint in &doc.endpoints {
        for reference in &endpoint.uses {
            check_reference(doc, reference, &format!("endpoint '{}'", endpoint.name), diags);
        }
    }
    for fragment in doc.fragments.iter() {
        for reference in &fragment.uses {
            check_reference(doc, reference, &format!("fragment '{}'", fragment.name), diags);
        }
    }

    // F2: the fragment graph is acyclic
    for cycle in find_cycles(doc) {
        let Some(first) = cycle.first() else { continue };
        let location = doc
            .fragments
            .get(first)
            .map(|f| f.location.clone())
            .unwrap_or_default();
        let mut diag = Diagnostic::error(
            DiagnosticCode::FragmentCycle,
            location,
            format!("fragment cycle detected: {}", cycle.join(" -> ")),
        );
        for name in cycle.iter().skip(1).take(cycle.len().saturating_sub(2)) {
            if let Some(fragment) = doc.fragments.get(name) {
                diag = diag.with_related(format!("'{}' is part of the cycle", name), fragment.location.clone());
            }
        }
        diags.push(diag);
    }

    // F3: fragments no endpoint reaches are unused
    let used = reachable_fragments(doc);
    for fragment in doc.fragments.iter() {
        if !used.contains(fragment.name.as_str()) {
            diags.push(
                Diagnostic::warning(
                    DiagnosticCode::UnusedFragment,
                    fragment.location.clone(),
                    format!("fragment '{}' is never used by an endpoint", fragment.name),
                )
                .with_hint("reference it from an endpoint's 'uses' or remove it"),
            );
        }
    }
}

fn check_reference(
    doc: &EdlDocument,
    reference: &FragmentReference,
    owner: &str,
    diags: &mut Vec<Diagnostic>,
) {
    if doc.fragments.resolve(reference).is_none() {
        let known: Vec<&str> = doc.fragments.names().collect();
        let mut diag = Diagnostic::error(
            DiagnosticCode::UnresolvedFragment,
            reference.location.clone(),
            format!("{} uses unknown fragment '{}'", owner, reference.name),
        );
        if !known.is_empty() {
            diag = diag.with_hint(format!("declared fragments: {}", known.join(", ")));
        }
        diags.push(diag);
    }
}

/// Each cycle as a closed path `[a, b, a]`, in discovery order
pub fn find_cycles(doc: &EdlDocument) -> Vec<Vec<String>> {
    let mut colors: BTreeMap<&str, Color> = doc.fragments.names().map(|n| (n, Color::White)).collect();
    let mut cycles = Vec::new();
    let mut stack = Vec::new();

    for name in doc.fragments.names() {
        if colors.get(name) == Some(&Color::White) {
            visit(doc, name, &mut colors, &mut stack, &mut cycles);
        }
    }
    cycles
}

fn visit<'a>(
    doc: &'a EdlDocument,
    name: &'a str,
    colors: &mut BTreeMap<&'a str, Color>,
    stack: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    colors.insert(name, Color::Gray);
    stack.push(name);

    if let Some(fragment) = doc.fragments.get(name) {
        let mut followed: HashSet<&str> = HashSet::new();
        for reference in &fragment.uses {
            let next = reference.name.as_str();
            // a repeated edge would report its cycle twice
            if !followed.insert(next) {
                continue;
            }
            match colors.get(next) {
                Some(Color::White) => visit(doc, next, colors, stack, cycles),
                Some(Color::Gray) => {
                    // Back edge: the cycle is the stack suffix starting at `next`
                    if let Some(start) = stack.iter().position(|n| *n == next) {
                        let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                        cycle.push(next.to_string());
                        cycles.push(cycle);
                    }
                }
                // Finished, or unresolved (reported separately)
                Some(Color::Black) | None => {}
            }
        }
    }

    stack.pop();
    colors.insert(name, Color::Black);
}

fn reachable_fragments(doc: &EdlDocument) -> HashSet<&str> {
    let mut seen = HashSet::new();
    let mut pending: Vec<&str> = doc
        .endpoints
        .iter()
        .flat_map(|e| e.uses.iter().map(|r| r.name.as_str()))
        .collect();
    while let Some(name) = pending.pop() {
        if !seen.insert(name) {
            continue;
        }
        if let Some(fragment) = doc.fragments.get(name) {
            pending.extend(fragment.uses.iter().map(|r| r.name.as_str()));
        }
    }
    seen
}

// =============================================================================
// INHERITANCE
// =============================================================================

/// Fragments an endpoint inherits from, depth first in reference order, each once
pub fn inherited_fragments<'a>(
    doc: &'a EdlDocument,
    endpoint: &'a EndpointDefinition,
) -> Vec<&'a edl_types::FragmentDefinition> {
    fn walk<'a>(
        doc: &'a EdlDocument,
        refs: &'a [FragmentReference],
        seen: &mut BTreeSet<&'a str>,
        out: &mut Vec<&'a edl_types::FragmentDefinition>,
    ) {
        for reference in refs {
            if !seen.insert(reference.name.as_str()) {
                continue;
            }
            if let Some(fragment) = doc.fragments.resolve(reference) {
                out.push(fragment);
                walk(doc, &fragment.uses, seen, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(doc, &endpoint.uses, &mut BTreeSet::new(), &mut out);
    out
}

/// Own params in declaration order, then inherited params not already declared
pub fn effective_params(doc: &EdlDocument, endpoint: &EndpointDefinition) -> Vec<ParamDefinition> {
    let mut params = endpoint.params.clone();
    for fragment in inherited_fragments(doc, endpoint) {
        for param in &fragment.params {
            if !params.iter().any(|p| p.name == param.name) {
                params.push(param.clone());
            }
        }
    }
    params
}

/// Endpoint cost, else the first inherited fragment cost
pub fn effective_cost_config<'a>(
    doc: &'a EdlDocument,
    endpoint: &'a EndpointDefinition,
) -> Option<&'a RawCostConfig> {
    endpoint.cost.as_ref().or_else(|| {
        inherited_fragments(doc, endpoint)
            .into_iter()
            .find_map(|f| f.cost.as_ref())
    })
}

/// An endpoint needs auth when it says so or any inherited fragment does
pub fn effective_requires_auth(doc: &EdlDocument, endpoint: &EndpointDefinition) -> bool {
    endpoint.requires_auth
        || inherited_fragments(doc, endpoint)
            .iter()
            .any(|f| f.requires_auth == Some(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use edl_types::{DocumentVersion, FragmentDefinition, ParamType, SourceLocation};

    fn fragment(name: &str, uses: &[&str], params: &[&str]) -> FragmentDefinition {
        let mut f = FragmentDefinition::new(name);
        f.uses = uses
            .iter()
            .map(|u| FragmentReference::new(*u, SourceLocation::unknown()))
            .collect();
        f.params = params
            .iter()
            .map(|p| ParamDefinition::new(*p, ParamType::String))
            .collect();
        f
    }

    fn doc_with(fragments: Vec<FragmentDefinition>, endpoint_uses: &[&str]) -> EdlDocument {
        let mut doc = EdlDocument::new(DocumentVersion::V0);
        doc.exchange.id = "ex".into();
        for f in fragments {
            doc.fragments.insert(f).unwrap();
        }
        let mut endpoint = EndpointDefinition::new("fetchTrades");
        endpoint.params.push(ParamDefinition::new("symbol", ParamType::String));
        endpoint.uses = endpoint_uses
            .iter()
            .map(|u| FragmentReference::new(*u, SourceLocation::unknown()))
            .collect();
        doc.endpoints.push(endpoint);
        doc
    }

    #[test]
    fn test_two_node_cycle_reported_once() {
        let doc = doc_with(vec![fragment("a", &["b"], &[]), fragment("b", &["a"], &[])], &["a"]);
        let mut diags = Vec::new();
        check_fragments(&doc, &mut diags);
        let cycles: Vec<_> = diags
            .iter()
            .filter(|d| d.code == DiagnosticCode::FragmentCycle)
            .collect();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].message.contains("a -> b -> a"));
    }

    #[test]
    fn test_repeated_edge_reports_cycle_once() {
        let doc = doc_with(
            vec![fragment("A", &["B"], &[]), fragment("B", &["A", "A"], &[])],
            &["A"],
        );
        assert_eq!(
            find_cycles(&doc),
            vec![vec!["A".to_string(), "B".to_string(), "A".to_string()]]
        );
        let mut diags = Vec::new();
        check_fragments(&doc, &mut diags);
        let cycles = diags
            .iter()
            .filter(|d| d.code == DiagnosticCode::FragmentCycle)
            .count();
        assert_eq!(cycles, 1);
    }

    #[test]
    fn test_self_cycle() {
        let doc = doc_with(vec![fragment("a", &["a"], &[])], &["a"]);
        assert_eq!(find_cycles(&doc), vec![vec!["a".to_string(), "a".to_string()]]);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let doc = doc_with(
            vec![
                fragment("top", &["left", "right"], &[]),
                fragment("left", &["base"], &[]),
                fragment("right", &["base"], &[]),
                fragment("base", &[], &[]),
            ],
            &["top"],
        );
        assert!(find_cycles(&doc).is_empty());
    }

    #[test]
    fn test_unresolved_and_unused() {
        let doc = doc_with(vec![fragment("orphan", &[], &[])], &["missing"]);
        let mut diags = Vec::new();
        check_fragments(&doc, &mut diags);
        let codes: Vec<_> = diags.iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![DiagnosticCode::UnresolvedFragment, DiagnosticCode::UnusedFragment]);
    }

    #[test]
    fn test_effective_params_order_and_dedup() {
        let doc = doc_with(
            vec![
                fragment("paging", &["time"], &["limit", "symbol"]),
                fragment("time", &[], &["since"]),
            ],
            &["paging"],
        );
        let names: Vec<_> = effective_params(&doc, &doc.endpoints[0])
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["symbol", "limit", "since"]);
    }

    #[test]
    fn test_inheritance_survives_cycles() {
        let doc = doc_with(vec![fragment("a", &["b"], &["x"]), fragment("b", &["a"], &["y"])], &["a"]);
        assert_eq!(effective_params(&doc, &doc.endpoints[0]).len(), 3);
    }
}

//! Line index from YAML node paths to source positions.
//!
//! `serde_yaml` drops positions once a document is deserialized into a
//! `Value`, so the parser keeps a side table built by a single line scan.
//! Paths use the same spelling the sub-parsers build: `endpoints[0].params[1]`,
//! `fragments.paging`, `rateLimits.groups.orders`.
//!
//! The scan understands block mappings, block sequences (including the
//! `key:` / `- item` same-indent form) and skips block scalars. Flow
//! collections are treated as opaque values; lookups for paths inside them fall
//! back to the nearest recorded ancestor.

use std::collections::HashMap;

use edl_types::SourceLocation;
use once_cell::sync::Lazy;
use regex::Regex;

static KEY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:"([^"]*)"|'([^']*)'|([^\s#'"\[\]{}&*!|>%@`][^#]*?))\s*:(?:\s+(.*))?$"#)
        .expect("key line regex is valid")
});

static BLOCK_SCALAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[|>][+-]?[0-9]*\s*(#.*)?$").expect("block scalar regex is valid"));

#[derive(Debug)]
struct Frame {
    indent: usize,
    path: String,
    is_item: bool,
    next_index: usize,
}

/// Path -> position index plus the comment block found above each node
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    positions: HashMap<String, (usize, usize)>,
    comments: HashMap<String, Vec<String>>,
    source_name: Option<String>,
}

impl SourceMap {
    pub fn build(source: &str, source_name: Option<&str>) -> Self {
        let mut map = Self {
            source_name: source_name.map(String::from),
            ..Default::default()
        };
        let mut scan = Scan::default();

        for (idx, raw) in source.lines().enumerate() {
            let line_no = idx + 1;
            let indent = raw.len() - raw.trim_start_matches(' ').len();
            let content = raw[indent..].trim_end();

            if let Some(block_indent) = scan.block_indent {
                if content.is_empty() || indent > block_indent {
                    continue;
                }
                scan.block_indent = None;
            }

            if content.is_empty() {
                scan.pending.clear();
                continue;
            }
            if let Some(comment) = content.strip_prefix('#') {
                scan.pending.push(comment.trim().to_string());
                continue;
            }
            if content == "---" || content == "..." || content.starts_with('%') {
                continue;
            }

            map.scan_node(&mut scan, indent, content, line_no);
        }

        map
    }

    fn scan_node(&mut self, scan: &mut Scan, mut indent: usize, mut content: &str, line_no: usize) {
        loop {
            if content == "-" || content.starts_with("- ") {
                while scan.stack.last().map_or(false, |f| {
                    f.indent > indent || (f.indent == indent && f.is_item)
                }) {
                    scan.stack.pop();
                }
                let (parent, index) = match scan.stack.last_mut() {
                    Some(frame) => {
                        frame.next_index += 1;
                        (frame.path.clone(), frame.next_index - 1)
                    }
                    None => {
                        scan.root_index += 1;
                        (String::new(), scan.root_index - 1)
                    }
                };
                let path = format!("{}[{}]", parent, index);
                self.record(&path, line_no, indent + 1, &mut scan.pending);
                scan.stack.push(Frame {
                    indent,
                    path,
                    is_item: true,
                    next_index: 0,
                });

                let rest = content[1..].trim_start();
                if rest.is_empty() || rest.starts_with('#') {
                    return;
                }
                indent += content.len() - rest.len();
                content = rest;
                continue;
            }

            if let Some(caps) = KEY_LINE.captures(content) {
                let key = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str().trim())
                    .unwrap_or_default();
                while scan.stack.last().map_or(false, |f| f.indent >= indent) {
                    scan.stack.pop();
                }
                let path = match scan.stack.last() {
                    Some(parent) => child_path(&parent.path, key),
                    None => key.to_string(),
                };
                self.record(&path, line_no, indent + 1, &mut scan.pending);

                let value = caps.get(4).map(|m| m.as_str().trim()).unwrap_or_default();
                if BLOCK_SCALAR.is_match(value) {
                    scan.block_indent = Some(indent);
                }
                scan.stack.push(Frame {
                    indent,
                    path,
                    is_item: false,
                    next_index: 0,
                });
                return;
            }

            // Plain scalar or flow continuation line
            scan.pending.clear();
            return;
        }
    }

    fn record(&mut self, path: &str, line: usize, column: usize, pending: &mut Vec<String>) {
        self.positions
            .entry(path.to_string())
            .or_insert((line, column));
        if !pending.is_empty() {
            self.comments
                .insert(path.to_string(), std::mem::take(pending));
        }
    }

    /// Location of `path`, or of its nearest recorded ancestor
    pub fn location(&self, path: &str) -> SourceLocation {
        let mut current = path;
        loop {
            if let Some(&(line, column)) = self.positions.get(current) {
                return self.make_location(line, column);
            }
            match parent_path(current) {
                Some(parent) => current = parent,
                None => return self.make_location(1, 1),
            }
        }
    }

    /// Comment lines directly above the node at `path`
    pub fn comments(&self, path: &str) -> &[String] {
        self.comments.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.positions.contains_key(path)
    }

    fn make_location(&self, line: usize, column: usize) -> SourceLocation {
        SourceLocation {
            line,
            column,
            source_name: self.source_name.clone(),
        }
    }
}

#[derive(Default)]
struct Scan {
    stack: Vec<Frame>,
    pending: Vec<String>,
    block_indent: Option<usize>,
    root_index: usize,
}

/// `parent.key`, or `key` at the root. Keys containing `.`, `[` or `]`
/// (api-tree paths such as `ticker.price`) are written `parent["key"]`.
pub fn child_path(parent: &str, key: &str) -> String {
    if key.contains(['.', '[', ']']) {
        format!("{}[\"{}\"]", parent, key)
    } else if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// `parent[index]`
pub fn index_path(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

fn parent_path(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    let cut = if path.ends_with("\"]") {
        path.rfind("[\"")
    } else if path.ends_with(']') {
        path.rfind('[')
    } else {
        path.rfind('.')
    };
    Some(cut.map(|pos| &path[..pos]).unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"# Example exchange
exchange:
  id: example
  name: Example

endpoints:
  # Latest price
  # for one symbol
  - name: fetchTicker
    path: /ticker/{symbol}
    params:
      - name: symbol
        type: string
      - limit
  - name: fetchTrades
    description: |
      multi-line
      name: not-a-key
    cost: 2
fragments:
  paging:
    params: [limit, since]
"#;

    #[test]
    fn test_key_and_item_positions() {
        let map = SourceMap::build(DOC, Some("example.yaml"));
        let loc = map.location("endpoints[0]");
        assert_eq!((loc.line, loc.column), (9, 3));
        assert_eq!(loc.source_name.as_deref(), Some("example.yaml"));

        let loc = map.location("endpoints[0].path");
        assert_eq!((loc.line, loc.column), (10, 5));

        let loc = map.location("endpoints[0].params[1]");
        assert_eq!((loc.line, loc.column), (14, 7));

        let loc = map.location("endpoints[1].cost");
        assert_eq!(loc.line, 19);

        let loc = map.location("fragments.paging");
        assert_eq!((loc.line, loc.column), (21, 3));
    }

    #[test]
    fn test_block_scalar_contents_are_skipped() {
        let map = SourceMap::build(DOC, None);
        assert!(!map.contains("endpoints[1].description.name"));
        assert!(map.contains("endpoints[1].description"));
    }

    #[test]
    fn test_same_indent_sequence() {
        let src = "endpoints:\n- name: a\n- name: b\n  path: /b\nid: x\n";
        let map = SourceMap::build(src, None);
        assert_eq!(map.location("endpoints[1].path").line, 4);
        assert_eq!(map.location("id").line, 5);
    }

    #[test]
    fn test_comments_attach_to_next_node() {
        let map = SourceMap::build(DOC, None);
        assert_eq!(
            map.comments("endpoints[0]"),
            &["Latest price".to_string(), "for one symbol".to_string()]
        );
        assert!(map.comments("endpoints[1]").is_empty());
        assert_eq!(map.comments("exchange"), &["Example exchange".to_string()]);
    }

    #[test]
    fn test_flow_collections_fall_back_to_parent() {
        let map = SourceMap::build(DOC, None);
        let loc = map.location("fragments.paging.params[1]");
        assert_eq!(loc.line, 22);
    }

    #[test]
    fn test_dotted_keys_keep_their_own_position() {
        let src = "api:\n  public:\n    get:\n      ticker.price:\n        cost: 2\n      ticker:\n        cost: 1\n";
        let map = SourceMap::build(src, None);
        let dotted = child_path("api.public.get", "ticker.price");
        assert_eq!(dotted, "api.public.get[\"ticker.price\"]");
        assert_eq!(map.location(&dotted).line, 4);
        assert_eq!(map.location(&child_path(&dotted, "cost")).line, 5);
        assert_eq!(map.location("api.public.get.ticker").line, 6);
        // unrecorded child of a dotted key falls back to the dotted key
        assert_eq!(map.location(&child_path(&dotted, "missing")).line, 4);
        assert_eq!(parent_path(&dotted), Some("api.public.get"));
    }

    #[test]
    fn test_unknown_path_falls_back_to_document_start() {
        let map = SourceMap::build(DOC, None);
        let loc = map.location("interface.fetchTicker");
        assert_eq!((loc.line, loc.column), (1, 1));
    }
}

//! Path template matching.
//!
//! # Responsibilities
//! - Compile path templates into a trie keyed by path segment
//! - Match concrete request paths, extracting placeholder values
//! - Rank matches by specificity (fewest placeholder segments)
//!
//! # Design Decisions
//! - Literal segments and `{named}` placeholders only; no regex
//! - Lookup cost is bounded by path depth, not table size
//! - Ties in specificity are broken by declaration order

use std::collections::HashMap;

/// A successful template match for one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatch {
    /// Index of the route in declaration order.
    pub route_index: usize,
    /// Resolved placeholder values in template order.
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct Node {
    literals: HashMap<String, Node>,
    /// Placeholder children keyed by placeholder name. Distinct templates
    /// may bind different names at the same position.
    placeholders: Vec<(String, Node)>,
    /// Routes whose template ends at this node: (placeholder count, index).
    terminals: Vec<(usize, usize)>,
}

/// Trie over path templates.
#[derive(Debug, Default)]
pub struct TemplateTrie {
    root: Node,
}

/// Split a path into non-empty segments. Collapses duplicate and trailing
/// slashes, so "/a//b/" matches the template "/a/b".
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn placeholder_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

impl TemplateTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a template under the given route index.
    pub fn insert(&mut self, template: &str, route_index: usize) {
        let mut node = &mut self.root;
        let mut placeholder_count = 0;

        for segment in segments(template) {
            if let Some(name) = placeholder_name(segment) {
                placeholder_count += 1;
                let pos = node.placeholders.iter().position(|(n, _)| n == name);
                let pos = match pos {
                    Some(p) => p,
                    None => {
                        node.placeholders.push((name.to_string(), Node::default()));
                        node.placeholders.len() - 1
                    }
                };
                node = &mut node.placeholders[pos].1;
            } else {
                node = node.literals.entry(segment.to_string()).or_default();
            }
        }

        node.terminals.push((placeholder_count, route_index));
    }

    /// All templates matching the path, most specific first.
    pub fn matches(&self, path: &str) -> Vec<TemplateMatch> {
        let segs = segments(path);
        let mut params = Vec::new();
        let mut found = Vec::new();
        collect(&self.root, &segs, 0, &mut params, &mut found);

        // Fewest placeholders wins; declaration order breaks ties.
        found.sort_by_key(|(count, index, _)| (*count, *index));
        found
            .into_iter()
            .map(|(_, route_index, params)| TemplateMatch { route_index, params })
            .collect()
    }
}

fn collect(
    node: &Node,
    segs: &[&str],
    depth: usize,
    params: &mut Vec<(String, String)>,
    found: &mut Vec<(usize, usize, Vec<(String, String)>)>,
) {
    if depth == segs.len() {
        for (count, index) in &node.terminals {
            found.push((*count, *index, params.clone()));
        }
        return;
    }

    let segment = segs[depth];
    if let Some(child) = node.literals.get(segment) {
        collect(child, segs, depth + 1, params, found);
    }
    for (name, child) in &node.placeholders {
        params.push((name.clone(), segment.to_string()));
        collect(child, segs, depth + 1, params, found);
        params.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_match() {
        let mut trie = TemplateTrie::new();
        trie.insert("/api/users", 0);

        let matches = trie.matches("/api/users");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].route_index, 0);
        assert!(matches[0].params.is_empty());

        assert!(trie.matches("/api/orders").is_empty());
        assert!(trie.matches("/api/users/extra").is_empty());
    }

    #[test]
    fn placeholder_extraction() {
        let mut trie = TemplateTrie::new();
        trie.insert("/api/users/{id}/posts/{post}", 0);

        let matches = trie.matches("/api/users/42/posts/7");
        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].params,
            vec![("id".to_string(), "42".to_string()), ("post".to_string(), "7".to_string())]
        );
    }

    #[test]
    fn literal_beats_placeholder() {
        let mut trie = TemplateTrie::new();
        trie.insert("/api/users/{id}", 0);
        trie.insert("/api/users/me", 1);

        let matches = trie.matches("/api/users/me");
        assert_eq!(matches[0].route_index, 1);
        // The placeholder template still matches, just ranked lower.
        assert_eq!(matches[1].route_index, 0);
    }

    #[test]
    fn fewest_placeholders_wins_across_branches() {
        let mut trie = TemplateTrie::new();
        trie.insert("/{a}/{b}/c", 0);
        trie.insert("/x/{b}/c", 1);

        let matches = trie.matches("/x/y/c");
        assert_eq!(matches[0].route_index, 1);
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let mut trie = TemplateTrie::new();
        trie.insert("/a/{x}/c", 0);
        trie.insert("/{y}/b/c", 1);

        let matches = trie.matches("/a/b/c");
        assert_eq!(matches[0].route_index, 0);
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let mut trie = TemplateTrie::new();
        trie.insert("/api/users", 0);
        assert_eq!(trie.matches("/api/users/").len(), 1);
    }

    #[test]
    fn root_template() {
        let mut trie = TemplateTrie::new();
        trie.insert("/", 0);
        assert_eq!(trie.matches("/").len(), 1);
        assert!(trie.matches("/anything").is_empty());
    }
}

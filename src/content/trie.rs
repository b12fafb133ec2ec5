//! Segment trie over content rule paths.
//!
//! Nodes live in one `Vec` and refer to their children by index. A node is
//! terminal when a rule was inserted ending exactly at it.
//!
//! ```text
//! insert("/c/blog", 0)          search("/c/blog/post.md")
//! insert("/c/blog/a.md", 1)
//!
//! root ─ "c" ─ "blog"(0) ─ "a.md"(1)      walks root → c → blog(0) → stop
//!                                          deepest terminal seen: 0
//! ```
//!
//! A rule on a directory therefore covers every descendant, while a rule on
//! a more specific path always wins over its ancestors.

use rustc_hash::FxHashMap;
use std::{
    ffi::OsString,
    path::{Component, Path},
};

#[derive(Debug, Clone, Default)]
struct Node {
    children: FxHashMap<OsString, usize>,
    /// Rule registered at exactly this path
    rule: Option<usize>,
}

/// Path-segment trie mapping paths to rule indices.
#[derive(Debug, Clone)]
pub struct PathTrie {
    nodes: Vec<Node>,
}

impl Default for PathTrie {
    fn default() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }
}

impl PathTrie {
    const ROOT: usize = 0;

    /// Register `rule` at `path`. A later insert at the same path replaces
    /// the earlier one.
    pub fn insert(&mut self, path: &Path, rule: usize) {
        let mut node = Self::ROOT;
        for segment in segments(path) {
            node = match self.nodes[node].children.get(segment) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].children.insert(segment.to_owned(), child);
                    child
                }
            };
        }
        self.nodes[node].rule = Some(rule);
    }

    /// Most specific rule whose path equals `path` or is one of its
    /// ancestors.
    pub fn search(&self, path: &Path) -> Option<usize> {
        let mut node = Self::ROOT;
        let mut found = self.nodes[node].rule;

        for segment in segments(path) {
            let Some(&child) = self.nodes[node].children.get(segment) else {
                break;
            };
            node = child;
            if let Some(rule) = self.nodes[node].rule {
                found = Some(rule);
            }
        }

        found
    }

    /// Number of registered rules.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.rule.is_some()).count()
    }
}

/// Path segments, ignoring the root, `.` and trailing separators.
fn segments(path: &Path) -> impl Iterator<Item = &std::ffi::OsStr> {
    path.components().filter_map(|c| match c {
        Component::Normal(s) => Some(s),
        Component::ParentDir => Some(std::ffi::OsStr::new("..")),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(entries: &[(&str, usize)]) -> PathTrie {
        let mut trie = PathTrie::default();
        for (path, rule) in entries {
            trie.insert(Path::new(path), *rule);
        }
        trie
    }

    #[test]
    fn test_exact_file_match() {
        let trie = trie(&[("/c/index.md", 0)]);
        assert_eq!(trie.search(Path::new("/c/index.md")), Some(0));
        assert_eq!(trie.search(Path::new("/c/about.md")), None);
    }

    #[test]
    fn test_directory_rule_matches_descendants() {
        let trie = trie(&[("/c/blog/", 0)]);
        assert_eq!(trie.search(Path::new("/c/blog/post.md")), Some(0));
        assert_eq!(trie.search(Path::new("/c/blog/2024/deep/post.md")), Some(0));
        assert_eq!(trie.search(Path::new("/c/blog")), Some(0));
        assert_eq!(trie.search(Path::new("/c/blogroll.md")), None);
    }

    #[test]
    fn test_file_rule_beats_directory_rule() {
        let trie = trie(&[("/a", 0), ("/a/b.md", 1)]);
        assert_eq!(trie.search(Path::new("/a/b.md")), Some(1));
        assert_eq!(trie.search(Path::new("/a/c.md")), Some(0));
    }

    #[test]
    fn test_insert_order_does_not_matter() {
        let trie = trie(&[("/a/b.md", 1), ("/a", 0)]);
        assert_eq!(trie.search(Path::new("/a/b.md")), Some(1));
        assert_eq!(trie.search(Path::new("/a/c.md")), Some(0));
    }

    #[test]
    fn test_nested_directory_rules() {
        let trie = trie(&[("/c", 0), ("/c/docs", 1), ("/c/docs/api", 2)]);
        assert_eq!(trie.search(Path::new("/c/x.md")), Some(0));
        assert_eq!(trie.search(Path::new("/c/docs/x.md")), Some(1));
        assert_eq!(trie.search(Path::new("/c/docs/api/x.md")), Some(2));
    }

    #[test]
    fn test_partial_segment_is_not_a_match() {
        // "/c/doc" must not match "/c/docs/x.md" just because it is a string prefix
        let trie = trie(&[("/c/doc", 0)]);
        assert_eq!(trie.search(Path::new("/c/docs/x.md")), None);
    }

    #[test]
    fn test_reinsert_replaces() {
        let trie = trie(&[("/c/a.md", 0), ("/c/a.md", 3)]);
        assert_eq!(trie.search(Path::new("/c/a.md")), Some(3));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_empty_trie() {
        let trie = PathTrie::default();
        assert_eq!(trie.search(Path::new("/anything")), None);
        assert_eq!(trie.len(), 0);
    }
}

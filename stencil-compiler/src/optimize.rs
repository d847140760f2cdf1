//! Tree rewrites applied while nodes are added and popped.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::ast::Node;

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--[\s\S]*?-->").expect("comment pattern"));
static LEADING_BREAKLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\n\r]\s*").expect("breakline pattern"));
static TRAILING_BREAKLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[\n\r]\s*$").expect("breakline pattern"));
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&[#\w\d]{2,6};").expect("entity pattern"));

const OPEN: &str = "<!--";
const CLOSE: &str = "-->";

/// Maps offsets in comment-stripped source back to the original.
#[derive(Debug, Default)]
pub struct OffsetMap {
    // (offset in stripped text, bytes removed there)
    removed: Vec<(usize, usize)>,
}

impl OffsetMap {
    pub fn original(&self, offset: usize) -> usize {
        offset
            + self
                .removed
                .iter()
                .take_while(|(at, _)| *at <= offset)
                .map(|(_, len)| len)
                .sum::<usize>()
    }
}

/// Removes HTML comments that contain no interpolation. Comments wrapping
/// `{{ }}` survive and are spliced out of the tree by [`remove_comment_nodes`].
pub fn strip_comments(source: &str) -> (Cow<'_, str>, OffsetMap) {
    let mut map = OffsetMap::default();
    if !source.contains(OPEN) {
        return (Cow::Borrowed(source), map);
    }
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for m in COMMENT.find_iter(source) {
        if m.as_str().contains("{{") {
            continue;
        }
        out.push_str(&source[last..m.start()]);
        map.removed.push((out.len(), m.len()));
        last = m.end();
    }
    out.push_str(&source[last..]);
    (Cow::Owned(out), map)
}

/// Drops line breaks (and the indentation around them) at either end of a
/// text run. Returns `None` when nothing is left.
pub fn trim_breaklines(text: &str) -> Option<Cow<'_, str>> {
    let text = match LEADING_BREAKLINE.replace(text, "") {
        Cow::Borrowed(t) => TRAILING_BREAKLINE.replace(t, ""),
        Cow::Owned(t) => Cow::Owned(TRAILING_BREAKLINE.replace(&t, "").into_owned()),
    };
    (!text.is_empty()).then_some(text)
}

/// Text containing an entity must go through `html` or it gets escaped twice.
pub fn has_entity(text: &str) -> bool {
    ENTITY.is_match(text)
}

/// Appends `node`, concatenating it onto a preceding text sibling.
pub fn push_child(list: &mut Vec<Node>, node: Node) {
    if let (Node::Text(next), Some(Node::Text(prev))) = (&node, list.last_mut()) {
        prev.text.push_str(&next.text);
        return;
    }
    list.push(node);
}

/// Splices out HTML comments that were split across several siblings by
/// interpolation, then merges the leftover text.
pub fn remove_comment_nodes(nodes: &mut Vec<Node>) {
    if !nodes
        .iter()
        .any(|n| matches!(n, Node::Text(t) if t.text.contains(OPEN) || t.text.contains(CLOSE)))
    {
        return;
    }

    // Whole comments inside one text, e.g. after literal merging.
    for node in nodes.iter_mut() {
        if let Node::Text(t) = node {
            if let Cow::Owned(s) = COMMENT.replace_all(&t.text, "") {
                t.text = s;
            }
        }
    }

    let mut i = nodes.len();
    while i > 0 {
        i -= 1;
        let Some(close) = text(&nodes[i]).and_then(unmatched_close) else {
            continue;
        };
        let Some((j, open)) = (0..i)
            .rev()
            .find_map(|j| text(&nodes[j]).and_then(unmatched_open).map(|o| (j, o)))
        else {
            continue;
        };
        let suffix = text(&nodes[i]).map(|t| t[close + CLOSE.len()..].to_string());
        let prefix = text(&nodes[j]).map(|t| t[..open].to_string());

        let mut kept = Vec::new();
        for piece in [prefix, suffix].into_iter().flatten() {
            if !piece.is_empty() {
                push_child(&mut kept, Node::text(piece));
            }
        }
        nodes.splice(j..=i, kept);
        // The merged text at `j` may close an earlier comment.
        i = (j + 1).min(nodes.len());
    }

    nodes.retain(|n| !matches!(n, Node::Text(t) if t.text.is_empty()));
    let merged = std::mem::take(nodes);
    for node in merged {
        push_child(nodes, node);
    }
}

fn text(node: &Node) -> Option<&str> {
    match node {
        Node::Text(t) => Some(&t.text),
        _ => None,
    }
}

// `-->` with no `<!--` before it in the same text.
fn unmatched_close(text: &str) -> Option<usize> {
    let close = text.rfind(CLOSE)?;
    match text[..close].rfind(OPEN) {
        Some(_) => None,
        None => Some(close),
    }
}

// `<!--` with no `-->` after it in the same text.
fn unmatched_open(text: &str) -> Option<usize> {
    let open = text.rfind(OPEN)?;
    (!text[open..].contains(CLOSE)).then_some(open)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaklines() {
        assert_eq!(trim_breaklines("\n   ").as_deref(), None);
        assert_eq!(trim_breaklines("\n  a b \n ").as_deref(), Some("a b"));
        assert_eq!(trim_breaklines(" a ").as_deref(), Some(" a "));
    }

    #[test]
    fn comment_offsets() {
        let (s, map) = strip_comments("a<!-- x -->b<!-- {{c}} -->");
        assert_eq!(s, "ab<!-- {{c}} -->");
        assert_eq!(map.original(0), 0);
        assert_eq!(map.original(1), 11);
    }
}

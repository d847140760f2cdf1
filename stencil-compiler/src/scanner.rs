//! Cursor over the template source.
//!
//! The cursor only moves forward. Everything is byte-offset based so error
//! positions can be reported against the original text.

use regex::Regex;

/// One `{{ }}` or `{{{ }}}` region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    /// Text between the delimiters, untrimmed. For comments the leading `!`
    /// is dropped.
    pub content: &'a str,
    pub safe: bool,
    pub comment: bool,
    /// Offset of the opening delimiter.
    pub start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub offset: usize,
    pub message: String,
}

pub struct Scanner<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    pub fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    pub fn advance(&mut self, len: usize) {
        self.pos = (self.pos + len).min(self.source.len());
    }

    pub fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.advance(rest.len() - rest.trim_start().len());
    }

    /// Consumes and returns everything before the next match of `pattern`,
    /// or the rest of the input when there is none.
    pub fn next_before(&mut self, pattern: &Regex) -> &'a str {
        let rest = self.rest();
        let end = pattern.find(rest).map_or(rest.len(), |m| m.start());
        self.advance(end);
        &rest[..end]
    }

    /// Consumes and returns a match of `pattern` starting exactly at the cursor.
    pub fn next_after(&mut self, pattern: &Regex) -> Option<&'a str> {
        let rest = self.rest();
        let m = pattern.find(rest).filter(|m| m.start() == 0)?;
        self.advance(m.end());
        Some(m.as_str())
    }

    /// Reads the block opening at the cursor, which must be at `{{`.
    pub fn block(&mut self) -> Result<Block<'a>, ScanError> {
        let start = self.pos;
        let raw = self.source[start + 2..].starts_with('{');
        let body_start = start + if raw { 3 } else { 2 };
        let body = &self.source[body_start..];

        let comment = !raw
            && body.starts_with('!')
            && body[1..].starts_with(|c: char| c.is_whitespace());
        if comment {
            let end = comment_end(body).ok_or_else(|| ScanError {
                offset: start,
                message: "unterminated comment block".into(),
            })?;
            self.pos = body_start + end + 2;
            return Ok(Block {
                content: &body[1..end],
                safe: true,
                comment: true,
                start,
            });
        }

        let end = body.find("}}").ok_or_else(|| ScanError {
            offset: start,
            message: format!("`{}` has no closing delimiter", if raw { "{{{" } else { "{{" }),
        })?;
        let closes_raw = body[end + 2..].starts_with('}');
        if raw != closes_raw {
            return Err(ScanError {
                offset: body_start + end,
                message: if raw {
                    "`{{{` must be closed by `}}}`".into()
                } else {
                    "`{{` can't be closed by `}}}`".into()
                },
            });
        }
        self.pos = body_start + end + if raw { 3 } else { 2 };
        Ok(Block {
            content: &body[..end],
            safe: !raw,
            comment: false,
            start,
        })
    }
}

// Comments may contain whole blocks, only the depth-zero `}}` ends them.
fn comment_end(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut depth = 1usize;
    let mut i = 0;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                depth += 1;
                i += 2;
            }
            (b'}', b'}') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_and_cursor() {
        let mut s = Scanner::new("a{{ b }}c{{{ d }}}");
        let re = Regex::new(r"\{\{").unwrap();
        assert_eq!(s.next_before(&re), "a");
        let b = s.block().unwrap();
        assert_eq!((b.content, b.safe), (" b ", true));
        assert_eq!(s.next_before(&re), "c");
        let b = s.block().unwrap();
        assert_eq!((b.content, b.safe), (" d ", false));
        assert!(s.is_end());
    }

    #[test]
    fn unbalanced_delimiters() {
        assert!(Scanner::new("{{{ x }}").block().is_err());
        assert!(Scanner::new("{{ x }}}").block().is_err());
        assert!(Scanner::new("{{ x ").block().is_err());
    }

    #[test]
    fn nested_comment() {
        let mut s = Scanner::new("{{! a {{b}} c }}d");
        let b = s.block().unwrap();
        assert!(b.comment);
        assert_eq!(b.content, " a {{b}} c ");
        assert_eq!(s.rest(), "d");
    }

    #[test]
    fn next_after_is_anchored() {
        let mut s = Scanner::new("  <div>");
        let re = Regex::new(r"<\w+").unwrap();
        assert_eq!(s.next_after(&re), None);
        s.skip_whitespace();
        assert_eq!(s.next_after(&re), Some("<div"));
        assert_eq!(s.rest(), ">");
    }
}

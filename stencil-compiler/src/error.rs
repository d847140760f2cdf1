use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Delimiters, quotes, tags or block arguments that don't pair up.
    Syntax,
    /// Well-formed input used where it isn't allowed. Skipped in production mode.
    Semantic,
    /// The expression compiler rejected a block body or directive value.
    Expression,
}

/// Fatal compile failure. Compilation never returns a partial tree.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}, at line {}: `{}`", self.line(), self.line_text())]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    /// Full template source.
    pub template: String,
    /// Byte offset into `template` where the problem was detected.
    pub offset: usize,
}

impl CompileError {
    /// 1-based line number of `offset`.
    pub fn line(&self) -> usize {
        let end = self.boundary();
        self.template.as_bytes()[..end]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1
    }

    /// The template line containing `offset`, trimmed.
    pub fn line_text(&self) -> &str {
        let end = self.boundary();
        let start = self.template[..end].rfind('\n').map_or(0, |i| i + 1);
        let stop = self.template[end..]
            .find('\n')
            .map_or(self.template.len(), |i| end + i);
        self.template[start..stop].trim()
    }

    fn boundary(&self) -> usize {
        let mut end = self.offset.min(self.template.len());
        while !self.template.is_char_boundary(end) {
            end -= 1;
        }
        end
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("invalid expression `{text}`: {message}")]
    Syntax { text: String, message: String },

    #[error("expression `{text}` calls `{callee}`, only named functions can be called")]
    InvalidCallee { text: String, callee: String },

    #[error("expression is empty")]
    Empty,
}

pub type Result<T> = std::result::Result<T, ExprError>;

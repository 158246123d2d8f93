use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid number literal: {0}")]
    InvalidNumber(String),

    #[error("invalid date literal: {0}")]
    InvalidDate(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("unsupported query: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Storage(#[from] storage::StorageError),
}

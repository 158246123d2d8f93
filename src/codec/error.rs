use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown leading byte {0:#04x}")]
    UnknownLeadingByte(u8),

    #[error("empty input")]
    EmptyInput,

    #[error("missing CRLF terminator")]
    MissingCrlf,

    #[error("length field is not valid ASCII decimal: {0}")]
    InvalidLength(String),

    #[error("declared length {declared} exceeds available bytes {available}")]
    Truncated { declared: usize, available: usize },

    #[error("non-utf8 query bytes")]
    Utf8(#[from] std::str::Utf8Error),
}

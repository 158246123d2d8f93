use std::io;

#[derive(Debug, thiserror::Error)]
pub enum RaftError {
    #[error("persistence read/write failed")]
    Persistence(#[source] io::Error),

    #[error("malformed message: {0}")]
    Codec(String),

    #[error("unknown peer {0}")]
    UnknownPeer(u32),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, RaftError>;

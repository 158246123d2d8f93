use thiserror::Error;

use crate::codec::CodecError;
use crate::cluster::RoutingError;
use crate::config::ConfigError;
use crate::query::QueryError;

/// Top-level error type the server and CLI binaries surface. Wraps every
/// layer's own `thiserror` enum one level up.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Storage(#[from] storage::StorageError),

    #[error(transparent)]
    Raft(#[from] raft::RaftError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl AppError {
    /// Renders as the short, human-readable body of a codec `'!'` response.
    pub fn client_message(&self) -> String {
        self.to_string()
    }
}

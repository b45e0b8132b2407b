use thiserror::Error;

/// Failure to parse a map description. Always recoverable: the caller falls
/// back to the built-in map and keeps the service running.
#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("map file {path} could not be read: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("map file {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("map dimensions declared {declared_w}x{declared_h} but {actual} rows were given")]
    DimensionMismatch {
        declared_w: usize,
        declared_h: usize,
        actual: usize,
    },
    #[error("row {row} has width {actual}, expected {expected}")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("row {row} contains unknown tile character '{ch}'")]
    UnknownTile { row: usize, ch: char },
}

/// Errors surfaced to a client as an `{type:"error", message:...}` frame.
/// None of these terminate a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("character not found")]
    CharacterNotFound,
    #[error("invalid character_id")]
    InvalidCharacterId,
    #[error("target_id is required")]
    TargetIdRequired,
    #[error("target out of range")]
    TargetOutOfRange,
    #[error("no character joined")]
    NoCharacter,
    #[error("target not found")]
    TargetNotFound,
    #[error("unknown message type")]
    UnknownMessageType,
}

impl CommandError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Failures from the external collaborators. Always logged and discarded;
/// never surfaced to a client and never rolled back in-memory state.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("character not owned by account")]
    Forbidden,
    #[error("character not found")]
    NotFound,
    #[error("collaborator call failed: {0}")]
    Transport(String),
    #[error("collaborator call timed out")]
    Timeout,
}

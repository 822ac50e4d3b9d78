use std::path::PathBuf;

/// Errors surfaced by the step/reset bridge.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error("simulation scheduler is no longer accepting work")]
    Closed,

    #[error("simulation faulted during {operation}: {message}")]
    SimulationFault {
        operation: &'static str,
        message: String,
    },
}

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint directory not found: {0}")]
    DirNotFound(PathBuf),

    #[error("no 'latest' symlink found in {0}")]
    NoLatestSymlink(PathBuf),

    #[error("failed to read metadata from {path}: {source}")]
    MetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse metadata from {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to save model: {0}")]
    ModelSave(String),

    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort a training run.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("simulation bridge closed at epoch {epoch}, episode {episode}")]
    BridgeClosed { epoch: usize, episode: usize },

    #[error("{count} consecutive episode faults at epoch {epoch}, episode {episode}: {last}")]
    RepeatedEpisodeFaults {
        epoch: usize,
        episode: usize,
        count: usize,
        last: BridgeError,
    },

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

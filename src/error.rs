use crate::settings::ServerId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading, writing or creating something on disk failed
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not determine the per-user configuration directory")]
    NoConfigDir,

    /// The properties file is not well formed
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("required key `{0}` is missing")]
    MissingKey(String),

    #[error("value `{value}` of key `{key}` is not a valid {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// A project points at a server index that was never loaded
    #[error("project {project} refers to unknown server index {server}")]
    DanglingServerIndex { project: usize, server: usize },

    #[error("no server with id {0}")]
    UnknownServer(ServerId),

    /// Another server already has exactly these details
    #[error("server {0} already has the same url, name, certificate policy and credentials")]
    DuplicateServer(ServerId),

    #[error("unknown sound status `{0}`")]
    UnknownSoundStatus(String),
}

impl SettingsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

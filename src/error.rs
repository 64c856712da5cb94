//! Error types shared across the pipeline.
//!
//! Two tiers:
//! - [`TransformError`]: one step failed on one file. Recovered by the
//!   stage runner, reported, and collected into a `StageResult::Failure`.
//! - [`PipelineError`]: the task itself cannot proceed (clean failed,
//!   source root missing, output not writable, watcher or port unusable).

use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;

use crate::{asset::GlobError, config::ConfigError, graph::GraphError};

/// Failure of a single transform step on a single asset.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{0}")]
    Template(String),

    #[error("{0}")]
    Style(String),

    #[error("{0}")]
    Script(String),

    #[error("{0}")]
    Image(String),

    #[error("include `{path}` not found")]
    IncludeNotFound { path: PathBuf },

    #[error("include cycle through `{path}`")]
    IncludeCycle { path: PathBuf },

    #[error("includes nested too deeply at `{path}`")]
    IncludeTooDeep { path: PathBuf },

    #[error("file is not valid UTF-8")]
    NotUtf8,
}

impl TransformError {
    pub fn template(e: impl std::fmt::Display) -> Self {
        Self::Template(e.to_string())
    }

    pub fn style(e: impl std::fmt::Display) -> Self {
        Self::Style(e.to_string())
    }

    pub fn script(e: impl std::fmt::Display) -> Self {
        Self::Script(e.to_string())
    }

    pub fn image(e: impl std::fmt::Display) -> Self {
        Self::Image(e.to_string())
    }
}

/// Fatal error for the running task. Exits the process non-zero.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to clean `{path}`")]
    Clean {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source root `{0}` does not exist")]
    SourceRootMissing(PathBuf),

    #[error("IO error at `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("output directory `{0}` is outside the clean root")]
    OutsideCleanRoot(PathBuf),

    #[error("invalid glob")]
    Glob(#[from] GlobError),

    #[error("file watcher failed")]
    Watch(#[from] notify::Error),

    #[error("failed to bind {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },

    #[error("failed to start the async runtime")]
    Runtime(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_error_message_is_step_message() {
        let err = TransformError::style("expected \";\".");
        assert_eq!(err.to_string(), "expected \";\".");
    }

    #[test]
    fn test_pipeline_error_keeps_path() {
        let err = PipelineError::Clean {
            path: PathBuf::from("dist"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("dist"));
        assert!(std::error::Error::source(&err).is_some());
    }
}

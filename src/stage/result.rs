//! Stage outcomes.

use std::{fmt, path::PathBuf};

use crate::asset::AssetKind;

/// One file that failed one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    /// Name of the failing transform.
    pub step: &'static str,
    /// Source file, relative to the source root.
    pub file: PathBuf,
    /// The transform's own message.
    pub message: String,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}\n  --> {} ({})", self.message, self.file.display(), self.step)
    }
}

/// Outcome of one stage run. Per-file failures never abort a stage, so a
/// failure still lists everything that was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    Success {
        kind: AssetKind,
        outputs: Vec<PathBuf>,
    },
    Failure {
        kind: AssetKind,
        outputs: Vec<PathBuf>,
        errors: Vec<StageError>,
    },
}

impl StageResult {
    pub(crate) fn new(kind: AssetKind, outputs: Vec<PathBuf>, errors: Vec<StageError>) -> Self {
        if errors.is_empty() {
            Self::Success { kind, outputs }
        } else {
            Self::Failure {
                kind,
                outputs,
                errors,
            }
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Success { kind, .. } | Self::Failure { kind, .. } => *kind,
        }
    }

    /// Files written, in source order (full artifact before `.min`).
    pub fn outputs(&self) -> &[PathBuf] {
        match self {
            Self::Success { outputs, .. } | Self::Failure { outputs, .. } => outputs,
        }
    }

    pub fn errors(&self) -> &[StageError] {
        match self {
            Self::Success { .. } => &[],
            Self::Failure { errors, .. } => errors,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// One-line summary for the terminal.
    pub fn summary(&self) -> String {
        let files = match self.outputs().len() {
            0 => "no files".to_string(),
            1 => "1 file".to_string(),
            n => format!("{n} files"),
        };
        match self {
            Self::Success { .. } => format!("{} ({files})", self.kind()),
            Self::Failure { errors, .. } => format!(
                "{} failed ({} error{}, {files})",
                self.kind(),
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error() -> StageError {
        StageError {
            step: "compile-styles",
            file: PathBuf::from("assets/scss/main.scss"),
            message: "expected \";\".".into(),
        }
    }

    #[test]
    fn test_new_picks_variant() {
        assert!(StageResult::new(AssetKind::Js, vec![], vec![]).is_success());
        let failed = StageResult::new(AssetKind::Css, vec![], vec![error()]);
        assert!(!failed.is_success());
        assert_eq!(failed.errors().len(), 1);
        assert_eq!(failed.kind(), AssetKind::Css);
    }

    #[test]
    fn test_error_display_names_file() {
        let text = error().to_string();
        assert!(text.starts_with("Error: expected"));
        assert!(text.contains("main.scss"));
    }

    #[test]
    fn test_summary() {
        let ok = StageResult::new(AssetKind::Js, vec![PathBuf::from("a.js"), PathBuf::from("a.min.js")], vec![]);
        assert_eq!(ok.summary(), "js (2 files)");
        let failed = StageResult::new(AssetKind::Css, vec![], vec![error()]);
        assert_eq!(failed.summary(), "css failed (1 error, no files)");
    }
}

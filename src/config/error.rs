//! Configuration errors and validation diagnostics.
//!
//! Validation does not stop at the first problem: every bad field is
//! collected into [`ConfigDiagnostics`] and reported grouped by TOML section,
//! mirroring the layout of `sitepipe.toml`.

use std::{fmt, io, path::PathBuf};

use owo_colors::OwoColorize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("invalid TOML")]
    Toml(#[from] toml::de::Error),

    #[error("config file `{0}` not found")]
    NotFound(PathBuf),

    // no #[from]: source() would print the diagnostics twice
    #[error("{0}")]
    Diagnostics(ConfigDiagnostics),
}

/// `section.key` of a config field, e.g. `images.jpeg_quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FieldPath(&'static str);

impl FieldPath {
    pub const fn new(path: &'static str) -> Self {
        Self(path)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Table the field lives in; empty for top-level keys.
    pub fn section(&self) -> &'static str {
        self.0.rsplit_once('.').map_or("", |(section, _)| section)
    }

    pub fn key(&self) -> &'static str {
        self.0.rsplit_once('.').map_or(self.0, |(_, key)| key)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigDiagnostic {
    pub field: FieldPath,
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field.key().cyan(), self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n      {} {}", "hint:".yellow(), hint)?;
        }
        Ok(())
    }
}

/// Every problem found by one validation pass.
#[derive(Debug, Default)]
pub struct ConfigDiagnostics {
    errors: Vec<ConfigDiagnostic>,
}

impl ConfigDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: FieldPath, message: impl Into<String>) {
        self.push(field, message.into(), None);
    }

    pub fn error_with_hint(
        &mut self,
        field: FieldPath,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.push(field, message.into(), Some(hint.into()));
    }

    fn push(&mut self, field: FieldPath, message: String, hint: Option<String>) {
        self.errors.push(ConfigDiagnostic {
            field,
            message,
            hint,
        });
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Diagnostics in the order they were found.
    pub fn errors(&self) -> &[ConfigDiagnostic] {
        &self.errors
    }

    pub fn into_result(self) -> Result<(), ConfigError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Diagnostics(self))
        }
    }
}

impl fmt::Display for ConfigDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors.len();
        let noun = if count == 1 { "problem" } else { "problems" };
        write!(f, "{} ({count} {noun})", "invalid configuration".red().bold())?;

        // stable sort: fields of one section stay in validation order
        let mut sorted: Vec<_> = self.errors.iter().collect();
        sorted.sort_by_key(|d| d.field.section());

        let mut section = None;
        for diag in sorted {
            if section != Some(diag.field.section()) {
                section = Some(diag.field.section());
                write!(f, "\n  {}", format!("[{}]", diag.field.section()).dimmed())?;
            }
            write!(f, "\n    {diag}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigDiagnostics {}

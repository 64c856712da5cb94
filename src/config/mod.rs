//! Pipeline configuration management for `sitepipe.toml`.
//!
//! # Sections
//!
//! | Section    | Purpose                                       |
//! |------------|-----------------------------------------------|
//! | `[paths]`  | Source tree, output tree, template dirs       |
//! | `[serve]`  | Development server (interface, ports)         |
//! | `[css]`    | Stylesheet options                            |
//! | `[images]` | Image re-encoding options                     |
//! | `[watch]`  | File watcher timing                           |
//!
//! The file is optional: without it every section uses its defaults, which
//! reproduce the classic `src/` → `dist/` layout.

mod error;
mod section;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, FieldPath};
pub use section::{CssConfig, ImagesConfig, PathsConfig, ServeConfig, WatchConfig};

use crate::{
    asset::normalize_path,
    cli::{Cli, Commands},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "sitepipe.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing sitepipe.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    pub paths: PathsConfig,
    pub serve: ServeConfig,
    pub css: CssConfig,
    pub images: ImagesConfig,
    pub watch: WatchConfig,
}

impl PipelineConfig {
    /// Load configuration from CLI arguments.
    ///
    /// The config file is looked up relative to the current directory. A
    /// missing default file falls back to defaults; a missing file that was
    /// named explicitly is an error.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|e| ConfigError::Io(PathBuf::from("."), e))?;
        let config_path = cwd.join(&cli.config);

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else if cli.config != Path::new(DEFAULT_CONFIG_FILE) {
            return Err(ConfigError::NotFound(config_path));
        } else {
            debug!("config"; "no {} found, using defaults", DEFAULT_CONFIG_FILE);
            Self::default()
        };

        config.root = normalize_path(config_path.parent().unwrap_or(cwd.as_path()));
        config.config_path = config_path;
        config.apply_cli(cli);
        config.validate()?;

        Ok(config)
    }

    /// Defaults rooted at `root`. Used by tests and embedders.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = normalize_path(&root.into());
        Self {
            config_path: root.join(DEFAULT_CONFIG_FILE),
            root,
            ..Self::default()
        }
    }

    /// Read and parse a config file, warning about unknown fields.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Apply command-line overrides.
    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(src) = &cli.src {
            self.paths.src.clone_from(src);
        }
        if let Some(dist) = &cli.dist {
            self.paths.dist.clone_from(dist);
        }
        let Commands::Run {
            interface, port, ..
        } = &cli.command;
        if let Some(interface) = interface {
            self.serve.interface = *interface;
        }
        if let Some(port) = port {
            self.serve.port = *port;
        }
    }

    /// Validate values that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        let src = self.src_dir();
        let dist = self.dist_dir();

        if dist == self.root || self.root.starts_with(&dist) {
            diag.error_with_hint(
                PathsConfig::DIST,
                format!("`{}` would remove the project root on clean", self.paths.dist.display()),
                "point it at a dedicated output directory such as \"dist\"",
            );
        } else if src.starts_with(&dist) {
            diag.error(PathsConfig::DIST, "output tree must not contain the source tree");
        }
        if dist.starts_with(&src) && dist != self.root {
            diag.error_with_hint(
                PathsConfig::SRC,
                "source tree must not contain the output tree",
                "the watcher would rebuild on its own output",
            );
        }

        if !(1..=100).contains(&self.images.jpeg_quality) {
            diag.error(ImagesConfig::JPEG_QUALITY, "must be between 1 and 100");
        }
        if self.images.png_level > 9 {
            diag.error(ImagesConfig::PNG_LEVEL, "must be between 0 and 9");
        }

        if self.serve.port == 0 {
            diag.error(ServeConfig::PORT, "must not be 0");
        }
        if self.serve.port == self.serve.reload_port {
            diag.error(ServeConfig::RELOAD_PORT, "must differ from serve.port");
        }

        diag.into_result()
    }

    // ------------------------------------------------------------------------
    // Resolved paths
    // ------------------------------------------------------------------------

    /// Absolute source tree root.
    pub fn src_dir(&self) -> PathBuf {
        self.root.join(&self.paths.src)
    }

    /// Absolute output tree root (the clean root).
    pub fn dist_dir(&self) -> PathBuf {
        self.root.join(&self.paths.dist)
    }

    pub fn layouts_dir(&self) -> PathBuf {
        self.src_dir().join(&self.paths.layouts)
    }

    pub fn partials_dir(&self) -> PathBuf {
        self.src_dir().join(&self.paths.partials)
    }
}

#[cfg(test)]
pub fn test_parse_config(content: &str) -> PipelineConfig {
    let (parsed, ignored) = PipelineConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

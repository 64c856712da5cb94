//! Configuration section definitions.
//!
//! ```toml
//! [paths]
//! src = "src"                       # Source tree
//! dist = "dist"                     # Output tree, removed by `clean`
//! layouts = "template/layouts"      # Page layouts (relative to src)
//! partials = "template/partials"    # Template partials (relative to src)
//!
//! [serve]
//! interface = "127.0.0.1"
//! port = 3000
//! reload_port = 35729
//!
//! [css]
//! prefix = true                     # Add vendor prefixes
//!
//! [images]
//! jpeg_quality = 75
//! png_level = 5
//!
//! [watch]
//! debounce_ms = 300
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::FieldPath;

// ============================================================================
// [paths]
// ============================================================================

/// Source and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Source tree root.
    pub src: PathBuf,
    /// Output tree root. Everything below it is owned by the pipeline.
    pub dist: PathBuf,
    /// Layout templates, relative to `src`.
    pub layouts: PathBuf,
    /// Partial templates, relative to `src`.
    pub partials: PathBuf,
}

impl PathsConfig {
    pub const SRC: FieldPath = FieldPath::new("paths.src");
    pub const DIST: FieldPath = FieldPath::new("paths.dist");
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            src: PathBuf::from("src"),
            dist: PathBuf::from("dist"),
            layouts: PathBuf::from("template/layouts"),
            partials: PathBuf::from("template/partials"),
        }
    }
}

// ============================================================================
// [serve]
// ============================================================================

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// WebSocket port for live reload.
    pub reload_port: u16,
}

impl ServeConfig {
    pub const PORT: FieldPath = FieldPath::new("serve.port");
    pub const RELOAD_PORT: FieldPath = FieldPath::new("serve.reload_port");
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 3000,
            reload_port: 35729,
        }
    }
}

// ============================================================================
// [css]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CssConfig {
    /// Add vendor prefixes for the default browser targets.
    pub prefix: bool,
}

impl Default for CssConfig {
    fn default() -> Self {
        Self { prefix: true }
    }
}

// ============================================================================
// [images]
// ============================================================================

/// Image re-encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// PNG optimization level (0 = fastest, 9 = smallest).
    pub png_level: u8,
}

impl ImagesConfig {
    pub const JPEG_QUALITY: FieldPath = FieldPath::new("images.jpeg_quality");
    pub const PNG_LEVEL: FieldPath = FieldPath::new("images.png_level");
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 75,
            png_level: 5,
        }
    }
}

// ============================================================================
// [watch]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period before a burst of file events triggers a rebuild.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

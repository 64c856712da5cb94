//! Asset kinds handled by the pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of static asset. Each kind owns exactly one build stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Html,
    Css,
    Js,
    Fonts,
    Images,
}

impl AssetKind {
    /// All kinds, in stage declaration order.
    pub const ALL: [Self; 5] = [Self::Html, Self::Css, Self::Js, Self::Fonts, Self::Images];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::Js => "js",
            Self::Fonts => "fonts",
            Self::Images => "images",
        }
    }

    /// Title used for failure notifications.
    pub const fn error_title(self) -> &'static str {
        match self {
            Self::Html => "HTML Error",
            Self::Css => "SCSS Error",
            Self::Js => "JS Error",
            Self::Fonts => "Fonts Error",
            Self::Images => "Images Error",
        }
    }

    /// Dense index, for per-kind tables.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

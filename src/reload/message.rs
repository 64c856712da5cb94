//! Live reload message protocol.
//!
//! JSON over WebSocket, tagged by `type`:
//!
//! - `connected`: sent once after the handshake
//! - `reload`: a stage wrote new output (`kind: "css"` restyles in place)
//! - `error`: show the overlay for a failed stage
//! - `clear_error`: remove the overlay

use serde::{Deserialize, Serialize};

use crate::asset::AssetKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    Connected {
        version: String,
    },

    Reload {
        kind: AssetKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    Error {
        /// Source file that failed
        path: String,
        error: String,
    },

    ClearError,
}

impl ReloadMessage {
    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn reload(kind: AssetKind, reason: impl Into<String>) -> Self {
        Self::Reload {
            kind,
            reason: Some(reason.into()),
        }
    }

    pub fn error(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Error {
            path: path.into(),
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload","kind":"html"}"#.to_string())
    }

    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_json() {
        let json = ReloadMessage::reload(AssetKind::Css, "2 files").to_json();
        assert!(json.contains(r#""type":"reload""#));
        assert!(json.contains(r#""kind":"css""#));
        assert!(json.contains(r#""reason":"2 files""#));
    }

    #[test]
    fn test_clear_error_tag() {
        assert_eq!(ReloadMessage::ClearError.to_json(), r#"{"type":"clear_error"}"#);
    }

    #[test]
    fn test_error_roundtrip() {
        let msg = ReloadMessage::error("assets/scss/main.scss", "expected \";\".");
        assert_eq!(ReloadMessage::from_json(&msg.to_json()), Some(msg));
    }
}

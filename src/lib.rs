//! sitepipe - an asset pipeline for static sites.
//!
//! Templates, SCSS, JavaScript, images and fonts are compiled from `src/`
//! into `dist/` by five independent stages. `watch` keeps them fresh and
//! serves the result with live reload.
//!
//! ```text
//! PathRegistry ─► StageCatalog ─► StageRunner ─► dist/
//!                      ▲               │
//!     ChangeResolver ──┘               └─► ReloadSink ─► browsers
//! ```

#[macro_use]
pub mod logger;

pub mod asset;
pub mod build;
pub mod cli;
pub mod config;
pub mod embed;
pub mod error;
pub mod graph;
pub mod reload;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod stage;
pub mod transform;
pub mod watch;

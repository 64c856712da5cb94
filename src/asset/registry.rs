//! Path registry: which files each asset kind reads, watches and writes.

use std::path::{Path, PathBuf};

use super::{AssetKind, Glob};
use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result},
};

/// Glob table, relative to the source root.
///
/// `(kind, source glob, watch glob, base, output dir relative to dist)`
const TABLE: [(AssetKind, &str, &str, &str, &str); 5] = [
    (AssetKind::Html, "*.html", "**/*.html", "", ""),
    (
        AssetKind::Css,
        "assets/scss/[!_]*.scss",
        "assets/scss/**/*.scss",
        "assets/scss",
        "assets/css",
    ),
    (
        AssetKind::Js,
        "assets/js/*.js",
        "assets/js/**/*.js",
        "assets/js",
        "assets/js",
    ),
    (
        AssetKind::Fonts,
        "assets/fonts/**/*.{eot,woff,woff2,ttf,svg}",
        "assets/fonts/**/*.{eot,woff,woff2,ttf,svg}",
        "assets/fonts",
        "assets/fonts",
    ),
    (
        AssetKind::Images,
        "assets/images/**/*.{jpg,jpeg,png,svg,gif,ico,webp,webmanifest,xml,json}",
        "assets/images/**/*.{jpg,jpeg,png,svg,gif,ico,webp,webmanifest,xml,json}",
        "assets/images",
        "assets/images",
    ),
];

/// Where one asset kind comes from and goes to.
#[derive(Debug, Clone)]
pub struct PathSpec {
    pub kind: AssetKind,
    /// Files compiled by the stage.
    pub source: Glob,
    /// Files whose change reruns the stage. A superset of `source`.
    pub watch: Glob,
    /// Output paths mirror source paths relative to this directory.
    pub base: PathBuf,
    pub output_dir: PathBuf,
}

impl PathSpec {
    /// Output location for a source file, before any renaming.
    pub fn output_path(&self, source: &Path) -> PathBuf {
        let rel = source.strip_prefix(&self.base).unwrap_or(source);
        self.output_dir.join(rel)
    }
}

/// Immutable lookup table from [`AssetKind`] to [`PathSpec`].
#[derive(Debug, Clone)]
pub struct PathRegistry {
    src_root: PathBuf,
    clean_root: PathBuf,
    specs: [PathSpec; 5],
}

impl PathRegistry {
    /// Build the table from resolved config paths.
    ///
    /// Rejects any layout where an output directory would escape the clean
    /// root, since `clean` is the only thing that removes stale output.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.src_dir(), config.dist_dir())
    }

    pub fn new(src_root: PathBuf, clean_root: PathBuf) -> Result<Self> {
        let build = |(kind, source, watch, base, output): (AssetKind, &str, &str, &str, &str)|
         -> Result<PathSpec> {
            let spec = PathSpec {
                kind,
                source: Glob::new(&src_root, source)?,
                watch: Glob::new(&src_root, watch)?,
                base: join_rel(&src_root, base),
                output_dir: join_rel(&clean_root, output),
            };
            if !spec.output_dir.starts_with(&clean_root) {
                return Err(PipelineError::OutsideCleanRoot(spec.output_dir));
            }
            Ok(spec)
        };

        let [html, css, js, fonts, images] = TABLE;
        let specs = [
            build(html)?,
            build(css)?,
            build(js)?,
            build(fonts)?,
            build(images)?,
        ];

        Ok(Self {
            src_root,
            clean_root,
            specs,
        })
    }

    #[inline]
    pub fn resolve(&self, kind: AssetKind) -> &PathSpec {
        &self.specs[kind.index()]
    }

    pub fn src_root(&self) -> &Path {
        &self.src_root
    }

    /// The single directory every stage writes under.
    pub fn clean_root(&self) -> &Path {
        &self.clean_root
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathSpec> {
        self.specs.iter()
    }
}

fn join_rel(root: &Path, rel: &str) -> PathBuf {
    if rel.is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}

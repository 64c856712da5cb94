//! Stylesheet steps.
//!
//! SCSS is compiled by grass; everything after that (prefixing, printing,
//! minifying) goes through one lightningcss parse per step.

use lightningcss::{
    stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet},
    targets::{Browsers, Targets},
};

use super::Transform;
use crate::{asset::Asset, error::TransformError};

// ============================================================================
// SCSS
// ============================================================================

/// SCSS → CSS. `@use`/`@import` resolve relative to the source file.
pub struct CompileStyles;

impl Transform for CompileStyles {
    fn name(&self) -> &'static str {
        "compile-styles"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        let css = {
            let mut options = grass::Options::default();
            if let Some(dir) = asset.source.parent() {
                options = options.load_path(dir);
            }
            grass::from_string(asset.text()?, &options).map_err(TransformError::style)?
        };

        let mut asset = asset.with_text(css);
        asset.path.set_extension("css");
        Ok(asset)
    }
}

// ============================================================================
// lightningcss steps
// ============================================================================

/// Version number in lightningcss' `major << 16 | minor << 8` encoding.
const fn version(major: u32, minor: u32) -> Option<u32> {
    Some((major << 16) | (minor << 8))
}

/// Browsers still in common use; roughly "last 2 versions, not dead".
fn default_targets() -> Targets {
    Targets::from(Browsers {
        android: version(100, 0),
        chrome: version(100, 0),
        edge: version(100, 0),
        firefox: version(91, 0),
        ie: None,
        ios_saf: version(14, 0),
        opera: version(86, 0),
        safari: version(14, 0),
        samsung: version(17, 0),
    })
}

fn print(css: &str, filename: &str, targets: Targets, minify: bool) -> Result<String, TransformError> {
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(TransformError::style)?;

    if minify || targets.browsers.is_some() {
        sheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(TransformError::style)?;
    }

    let result = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(TransformError::style)?;
    Ok(result.code)
}

fn reprint(asset: Asset, targets: Targets, minify: bool) -> Result<Asset, TransformError> {
    let css = {
        let filename = asset.path.to_string_lossy();
        print(asset.text()?, &filename, targets, minify)?
    };
    Ok(asset.with_text(css))
}

/// Add vendor prefixes for the default browser targets.
pub struct PrefixVendor {
    targets: Targets,
}

impl PrefixVendor {
    pub fn new() -> Self {
        Self {
            targets: default_targets(),
        }
    }
}

impl Default for PrefixVendor {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for PrefixVendor {
    fn name(&self) -> &'static str {
        "prefix-vendor"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        reprint(asset, self.targets, false)
    }
}

/// Normalize formatting to one declaration per line.
pub struct PrettyPrint;

impl Transform for PrettyPrint {
    fn name(&self) -> &'static str {
        "pretty-print"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        reprint(asset, Targets::default(), false)
    }
}

/// Minify. Browser targets are left empty, so prefixes already present are
/// kept and no new ones are added.
pub struct MinifyCss;

impl Transform for MinifyCss {
    fn name(&self) -> &'static str {
        "minify-css"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        reprint(asset, Targets::default(), true)
    }
}

// ============================================================================
// Comment stripping
// ============================================================================

/// Remove every `/* ... */` comment, including `/*! ... */`, outside strings.
pub struct StripComments;

impl Transform for StripComments {
    fn name(&self) -> &'static str {
        "strip-comments"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        let css = strip_comments(asset.text()?);
        Ok(asset.with_text(css))
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut chars = css.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '/' && chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            None => out.push(c),
        }
    }

    out
}

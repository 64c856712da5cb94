//! JavaScript steps: include directives and minification.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use oxc::{
    allocator::Allocator,
    codegen::{Codegen, CodegenOptions, CommentOptions},
    mangler::MangleOptions,
    minifier::{CompressOptions, Minifier, MinifierOptions},
    parser::Parser,
    span::SourceType,
};
use regex::Regex;

use super::Transform;
use crate::{asset::Asset, error::TransformError};

// ============================================================================
// Includes
// ============================================================================

/// Expand `//= path/to/file.js` lines with the named file's contents.
///
/// Paths are relative to the file containing the directive. Included files
/// may include others; the directive's indentation is applied to every
/// included line.
pub struct ResolveIncludes;

/// Nesting limit for include directives.
const MAX_INCLUDE_DEPTH: usize = 32;

fn directive() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<indent>[ \t]*)//=[ \t]*(?P<path>\S+)[ \t]*\r?$").unwrap())
}

impl ResolveIncludes {
    fn expand(source: &str, file: &Path, stack: &mut Vec<PathBuf>) -> Result<String, TransformError> {
        let dir = file.parent().unwrap_or(Path::new("."));
        let mut out = String::with_capacity(source.len());

        for line in source.split_inclusive('\n') {
            let Some(caps) = directive().captures(line.trim_end_matches('\n')) else {
                out.push_str(line);
                continue;
            };

            let indent = &caps["indent"];
            let path = dir.join(&caps["path"]);
            // `a/../b.js` and `b.js` are the same file
            let path = fs::canonicalize(&path)
                .map_err(|_| TransformError::IncludeNotFound { path: path.clone() })?;
            if stack.contains(&path) {
                return Err(TransformError::IncludeCycle { path });
            }
            if stack.len() > MAX_INCLUDE_DEPTH {
                return Err(TransformError::IncludeTooDeep { path });
            }
            let included = fs::read_to_string(&path)
                .map_err(|_| TransformError::IncludeNotFound { path: path.clone() })?;

            stack.push(path.clone());
            let expanded = Self::expand(&included, &path, stack)?;
            stack.pop();

            for inner in expanded.split_inclusive('\n') {
                if !inner.trim().is_empty() {
                    out.push_str(indent);
                }
                out.push_str(inner);
            }
            if !expanded.ends_with('\n') && line.ends_with('\n') {
                out.push('\n');
            }
        }

        Ok(out)
    }
}

impl Transform for ResolveIncludes {
    fn name(&self) -> &'static str {
        "resolve-includes"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        let js = {
            let root = fs::canonicalize(&asset.source).unwrap_or_else(|_| asset.source.clone());
            let mut stack = vec![root];
            Self::expand(asset.text()?, &asset.source, &mut stack)?
        };
        Ok(asset.with_text(js))
    }
}

// ============================================================================
// Minification
// ============================================================================

/// Compress and mangle as a classic script; top-level names are kept since
/// other scripts on the page may reference them.
pub struct MinifyJs;

fn minify_js(source: &str) -> Result<String, TransformError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::script()).parse();
    if !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        return Err(TransformError::Script(message));
    }

    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);

    Ok(Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code)
}

impl Transform for MinifyJs {
    fn name(&self) -> &'static str {
        "minify-js"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        let js = minify_js(asset.text()?)?;
        Ok(asset.with_text(js))
    }
}

//! Glob patterns for source and watch sets.
//!
//! Supported syntax, relative to a literal base directory:
//!
//! | Token      | Matches                                   |
//! |------------|-------------------------------------------|
//! | `*`        | any run of characters except `/`          |
//! | `?`        | one character except `/`                  |
//! | `**/`      | zero or more whole directories            |
//! | `[abc]`    | one character from the set                |
//! | `[!abc]`   | one character not in the set              |
//! | `{a,b}`    | either alternative                        |
//!
//! Hidden entries (any component starting with `.`) never match.

use std::{
    io,
    path::{Path, PathBuf},
};

use jwalk::{Parallelism, WalkDir};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GlobError {
    #[error("unclosed `{0}` in glob `{1}`")]
    Unclosed(char, String),

    #[error("invalid glob `{0}`")]
    Regex(String, #[source] regex::Error),
}

/// A compiled glob anchored at a base directory.
#[derive(Debug, Clone)]
pub struct Glob {
    base: PathBuf,
    pattern: String,
    /// Deepest literal directory, where walking starts.
    walk_root: PathBuf,
    regex: Regex,
}

impl Glob {
    /// Compile `pattern` (always `/`-separated) relative to `base`.
    pub fn new(base: impl Into<PathBuf>, pattern: &str) -> Result<Self, GlobError> {
        let base = base.into();
        let regex = translate(pattern)?;
        let regex = Regex::new(&regex).map_err(|e| GlobError::Regex(pattern.to_string(), e))?;

        let walk_root = pattern
            .split('/')
            .take_while(|segment| !segment.contains(['*', '?', '[', '{']))
            .fold(base.clone(), |dir, segment| dir.join(segment));
        // The last literal segment may be a file name rather than a directory.
        let walk_root = if pattern.contains(['*', '?', '[', '{']) {
            walk_root
        } else {
            walk_root.parent().map_or_else(|| base.clone(), Path::to_path_buf)
        };

        Ok(Self {
            base,
            pattern: pattern.to_string(),
            walk_root,
            regex,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Directory that contains every possible match.
    pub fn walk_root(&self) -> &Path {
        &self.walk_root
    }

    /// Check whether an absolute path matches.
    pub fn is_match(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.base) else {
            return false;
        };
        let rel = to_slash(rel);
        !rel.split('/').any(|c| c.starts_with('.')) && self.regex.is_match(&rel)
    }

    /// Enumerate matching files, sorted. A missing walk root yields nothing.
    ///
    /// The walk is serial: stages already run on the rayon pool, and a
    /// nested parallel walk would starve it.
    pub fn walk(&self) -> io::Result<Vec<PathBuf>> {
        if !self.walk_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.walk_root)
            .skip_hidden(true)
            .sort(true)
            .parallelism(Parallelism::Serial);
        for entry in walker {
            let entry = entry.map_err(|e| io::Error::other(e.to_string()))?;
            if entry.file_type().is_file() {
                let path = entry.path();
                if self.is_match(&path) {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Absolute, symlink-free form of `path`.
///
/// A path that no longer exists (a removed file) is resolved through its
/// parent, so it still lines up with a canonical root.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(path) = path.canonicalize() {
        return path;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name())
        && let Ok(parent) = parent.canonicalize()
    {
        return parent.join(name);
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    }
}

/// Render a relative path with `/` separators on every platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Translate glob syntax to an anchored regex.
fn translate(pattern: &str) -> Result<String, GlobError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut brace_depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_segment_start = i == 0 || chars[i - 1] == '/';
                match chars.get(i + 2) {
                    Some('/') if at_segment_start => {
                        out.push_str("(?:[^/]*/)*");
                        i += 3;
                    }
                    None if at_segment_start => {
                        out.push_str(".*");
                        i += 2;
                    }
                    _ => {
                        // `**` inside a segment behaves like `*`
                        out.push_str("[^/]*");
                        i += 2;
                    }
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&c| c == ']')
                    .ok_or_else(|| GlobError::Unclosed('[', pattern.to_string()))?;
                let body: String = chars[i + 1..i + 1 + close].iter().collect();
                out.push('[');
                let body = match body.strip_prefix('!') {
                    Some(rest) => {
                        out.push('^');
                        rest.to_string()
                    }
                    None => body,
                };
                for ch in body.chars() {
                    if matches!(ch, '\\' | '[' | ']' | '^' | '&' | '~') {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push(']');
                i += close + 2;
                continue;
            }
            '{' => {
                brace_depth += 1;
                out.push_str("(?:");
            }
            '}' if brace_depth > 0 => {
                brace_depth -= 1;
                out.push(')');
            }
            ',' if brace_depth > 0 => out.push('|'),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    if brace_depth > 0 {
        return Err(GlobError::Unclosed('{', pattern.to_string()));
    }

    out.push('$');
    Ok(out)
}

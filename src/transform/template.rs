//! Page composition: front matter, partials and layouts.
//!
//! A page is a minijinja template with an optional front matter block:
//!
//! ```text
//! ---
//! title: Home
//! layout: default
//! ---
//! {% include "header.html" %}
//! <h1>{{ title }}</h1>
//! ```
//!
//! The rendered page becomes `body` in `layouts/<layout>.html`. Without a
//! `layout` key the `default` layout is used when it exists; a layout that
//! was asked for by name must exist.

use std::{
    collections::BTreeMap,
    fs,
    path::{Component, Path, PathBuf},
};

use minijinja::{Environment, Error, ErrorKind, Value};

use super::Transform;
use crate::{asset::Asset, error::TransformError};

const LAYOUT_PREFIX: &str = "layouts/";
const DEFAULT_LAYOUT: &str = "default";

pub struct ComposeTemplates {
    root: PathBuf,
    layouts_dir: PathBuf,
    partials_dir: PathBuf,
}

impl ComposeTemplates {
    pub fn new(root: PathBuf, layouts_dir: PathBuf, partials_dir: PathBuf) -> Self {
        Self {
            root,
            layouts_dir,
            partials_dir,
        }
    }

    /// Fresh environment per page, so edits to layouts and partials are
    /// picked up on the next run without any cache invalidation.
    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        let root = self.root.clone();
        let layouts = self.layouts_dir.clone();
        let partials = self.partials_dir.clone();

        env.set_loader(move |name| {
            if !is_safe_name(name) {
                return Ok(None);
            }
            let candidates = match name.strip_prefix(LAYOUT_PREFIX) {
                Some(layout) => vec![layouts.join(layout)],
                None => vec![partials.join(name), root.join(name)],
            };
            load_first(name, &candidates)
        });
        env
    }

    fn layout_path(&self, layout: &str) -> PathBuf {
        self.layouts_dir.join(format!("{layout}.html"))
    }
}

impl Transform for ComposeTemplates {
    fn name(&self) -> &'static str {
        "compose-templates"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        let html = {
            let text = asset.text()?;
            let (front, body) = split_front_matter(text);
            let env = self.environment();

            let mut vars: BTreeMap<String, Value> = front
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect();
            let page = asset
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            vars.insert("page".into(), Value::from(page));
            vars.insert("root".into(), Value::from(root_prefix(&asset.path)));

            let name = asset.path.to_string_lossy();
            let rendered = env
                .render_named_str(&name, body, Value::from_serialize(&vars))
                .map_err(render_error)?;

            let layout = front.get("layout").map(String::as_str);
            let layout_name = layout.unwrap_or(DEFAULT_LAYOUT);
            if self.layout_path(layout_name).is_file() {
                vars.insert("body".into(), Value::from_safe_string(rendered));
                env.get_template(&format!("{LAYOUT_PREFIX}{layout_name}.html"))
                    .and_then(|t| t.render(Value::from_serialize(&vars)))
                    .map_err(render_error)?
            } else if layout.is_some() {
                return Err(TransformError::Template(format!(
                    "layout `{layout_name}` not found in {}",
                    self.layouts_dir.display()
                )));
            } else {
                rendered
            }
        };

        Ok(asset.with_text(html))
    }
}

/// Split a leading `---` block of `key: value` lines from the body.
fn split_front_matter(text: &str) -> (BTreeMap<String, String>, &str) {
    let mut front = BTreeMap::new();
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (front, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let line = line.trim_end();
        if line == "---" {
            return (front, &rest[offset..]);
        }
        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim().trim_matches(['"', '\'']);
            front.insert(key.trim().to_string(), value.to_string());
        }
    }

    // unterminated block: treat the whole file as body
    (BTreeMap::new(), text)
}

/// Relative prefix from a page back to the output root: `a/b.html` → `../`.
fn root_prefix(path: &Path) -> String {
    let depth = path.components().count().saturating_sub(1);
    "../".repeat(depth)
}

fn is_safe_name(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

fn load_first(name: &str, candidates: &[PathBuf]) -> Result<Option<String>, Error> {
    for path in candidates {
        // `{% include "header" %}` finds `header.html`
        let path = if path.extension().is_none() {
            path.with_extension("html")
        } else {
            path.clone()
        };
        if path.is_file() {
            return fs::read_to_string(&path).map(Some).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("could not read template `{name}`"),
                )
                .with_source(e)
            });
        }
    }
    Ok(None)
}

fn render_error(e: Error) -> TransformError {
    TransformError::template(e)
}

//! Embedded static resources.
//!
//! `reload.js` is minified by `build.rs` and compiled into the binary; the
//! dev server fills in the reload port per request.

use std::marker::PhantomData;

/// Trait for template variable sets
pub trait TemplateVars {
    fn apply(&self, content: &str) -> String;
}

/// Template with typed variable injection
#[derive(Debug, Clone, Copy)]
pub struct Template<V> {
    content: &'static str,
    _marker: PhantomData<V>,
}

impl<V> Template<V> {
    pub const fn new(content: &'static str) -> Self {
        Self {
            content,
            _marker: PhantomData,
        }
    }
}

impl<V: TemplateVars> Template<V> {
    pub fn render(&self, vars: &V) -> String {
        vars.apply(self.content)
    }
}

/// Variables for the reload client.
pub struct ReloadVars {
    pub reload_port: u16,
}

impl TemplateVars for ReloadVars {
    fn apply(&self, content: &str) -> String {
        content.replace("__SITEPIPE_RELOAD_PORT__", &self.reload_port.to_string())
    }
}

/// URL the reload client is served under.
pub const RELOAD_JS_PATH: &str = "/__sitepipe/reload.js";

/// Live reload client, injected into every served HTML page.
pub const RELOAD_JS: Template<ReloadVars> =
    Template::new(include_str!(concat!(env!("OUT_DIR"), "/reload.min.js")));

/// The `<script>` tag pointing at [`RELOAD_JS_PATH`].
pub fn reload_script_tag() -> String {
    format!(r#"<script src="{RELOAD_JS_PATH}"></script>"#)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_port_filled_in() {
        let js = RELOAD_JS.render(&ReloadVars { reload_port: 35730 });
        assert!(js.contains("35730"));
        assert!(!js.contains("__SITEPIPE_RELOAD_PORT__"));
    }
}

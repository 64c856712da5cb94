//! Per-file transforms applied by build stages.
//!
//! Each transform takes one [`Asset`] and returns the next one. A stage owns
//! an ordered list of them and applies them one after another; there is no
//! other composition mechanism.
//!
//! # Modules
//!
//! - `template`: page composition with layouts and partials (minijinja)
//! - `style`: SCSS compile (grass), prefix, pretty print, minify (lightningcss)
//! - `script`: `//=` include expansion and minification (oxc)
//! - `media`: raster re-encoding (image) and SVG cleanup (quick-xml)

mod media;
mod script;
mod style;
mod template;

pub use media::OptimizeImage;
pub use script::{MinifyJs, ResolveIncludes};
pub use style::{CompileStyles, MinifyCss, PrefixVendor, PrettyPrint, StripComments};
pub use template::ComposeTemplates;

use crate::{asset::Asset, error::TransformError};

/// A single named processing step.
pub trait Transform: Send + Sync {
    /// Short step name, used in error reports.
    fn name(&self) -> &'static str;

    fn apply(&self, asset: Asset) -> Result<Asset, TransformError>;
}

/// Owned, shareable step in a stage's transform list.
pub type Step = Box<dyn Transform>;

/// Apply `steps` in order, stopping at the first failure.
///
/// On failure the name of the failing step is returned with the error.
pub fn apply_all(
    steps: &[Step],
    asset: Asset,
) -> Result<Asset, (&'static str, TransformError)> {
    steps
        .iter()
        .try_fold(asset, |asset, step| step.apply(asset).map_err(|e| (step.name(), e)))
}

/// Insert a suffix before the extension: `main.css` → `main.min.css`.
#[derive(Debug, Clone)]
pub struct Rename {
    suffix: &'static str,
}

impl Rename {
    pub const fn suffix(suffix: &'static str) -> Self {
        Self { suffix }
    }
}

impl Transform for Rename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn apply(&self, mut asset: Asset) -> Result<Asset, TransformError> {
        let stem = asset
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match asset.path.extension() {
            Some(ext) => format!("{stem}{}.{}", self.suffix, ext.to_string_lossy()),
            None => format!("{stem}{}", self.suffix),
        };
        asset.path.set_file_name(name);
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Upper;

    impl Transform for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
            let text = asset.text()?.to_uppercase();
            Ok(asset.with_text(text))
        }
    }

    struct Fail;

    impl Transform for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn apply(&self, _: Asset) -> Result<Asset, TransformError> {
            Err(TransformError::Script("boom".into()))
        }
    }

    fn asset(path: &str, text: &str) -> Asset {
        Asset::new(path, PathBuf::from("/src").join(path), text.as_bytes().to_vec())
    }

    #[test]
    fn test_rename_keeps_extension_and_dir() {
        let out = Rename::suffix(".min")
            .apply(asset("vendor/app.js", ""))
            .unwrap();
        assert_eq!(out.path, PathBuf::from("vendor/app.min.js"));
    }

    #[test]
    fn test_apply_all_in_order() {
        let steps: Vec<Step> = vec![Box::new(Upper), Box::new(Rename::suffix(".min"))];
        let out = apply_all(&steps, asset("a.css", "body{}")).unwrap();
        assert_eq!(out.contents, b"BODY{}");
        assert_eq!(out.path, PathBuf::from("a.min.css"));
    }

    #[test]
    fn test_apply_all_reports_failing_step() {
        let steps: Vec<Step> = vec![Box::new(Upper), Box::new(Fail), Box::new(Upper)];
        let (step, err) = apply_all(&steps, asset("a.js", "x")).unwrap_err();
        assert_eq!(step, "fail");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_empty_steps_pass_through() {
        let input = asset("fonts/a.woff2", "raw");
        assert_eq!(apply_all(&[], input.clone()).unwrap(), input);
    }
}

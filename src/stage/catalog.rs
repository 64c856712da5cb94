//! The fixed stage definitions.
//!
//! | Stage  | Primary steps                                 | `.min` variant             |
//! |--------|-----------------------------------------------|----------------------------|
//! | html   | compose-templates                             |                            |
//! | css    | compile-styles, prefix-vendor, pretty-print   | minify-css, strip-comments |
//! | js     | resolve-includes                              | minify-js                  |
//! | fonts  |                                               |                            |
//! | images | optimize-image                                |                            |

use super::{Stage, Variant};
use crate::{
    asset::{AssetKind, PathRegistry},
    config::PipelineConfig,
    transform::{
        CompileStyles, ComposeTemplates, MinifyCss, MinifyJs, OptimizeImage, PrefixVendor,
        PrettyPrint, ResolveIncludes, Step, StripComments,
    },
};

/// All five content stages, indexed by kind.
pub struct StageCatalog {
    stages: [Stage; 5],
}

impl StageCatalog {
    pub fn new(config: &PipelineConfig, registry: &PathRegistry) -> Self {
        let stage = |kind: AssetKind, steps: Vec<Step>, variant: Option<Variant>| Stage {
            kind,
            spec: registry.resolve(kind).clone(),
            steps,
            variant,
        };

        let mut css: Vec<Step> = vec![Box::new(CompileStyles)];
        if config.css.prefix {
            css.push(Box::new(PrefixVendor::new()));
        }
        css.push(Box::new(PrettyPrint));

        let stages = [
            stage(
                AssetKind::Html,
                vec![Box::new(ComposeTemplates::new(
                    config.src_dir(),
                    config.layouts_dir(),
                    config.partials_dir(),
                ))],
                None,
            ),
            stage(
                AssetKind::Css,
                css,
                Some(Variant::minified(vec![Box::new(MinifyCss), Box::new(StripComments)])),
            ),
            stage(
                AssetKind::Js,
                vec![Box::new(ResolveIncludes)],
                Some(Variant::minified(vec![Box::new(MinifyJs)])),
            ),
            stage(AssetKind::Fonts, Vec::new(), None),
            stage(
                AssetKind::Images,
                vec![Box::new(OptimizeImage::new(&config.images))],
                None,
            ),
        ];

        Self { stages }
    }

    #[inline]
    pub fn get(&self, kind: AssetKind) -> &Stage {
        &self.stages[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }
}

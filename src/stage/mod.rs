//! Build stages: definitions, execution and outcomes.

mod catalog;
mod result;
mod runner;

pub use catalog::StageCatalog;
pub use result::{StageError, StageResult};
pub use runner::StageRunner;

use crate::{
    asset::{AssetKind, PathSpec},
    transform::{Rename, Step},
};

/// Suffix inserted before the extension of minified artifacts.
pub const MIN_SUFFIX: &str = ".min";

/// One build stage, bound to one asset kind.
pub struct Stage {
    pub kind: AssetKind,
    pub spec: PathSpec,
    /// Steps producing the full artifact.
    pub steps: Vec<Step>,
    /// Second artifact derived from the full one.
    pub variant: Option<Variant>,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Extra steps applied to a stage's full artifact to produce another file.
pub struct Variant {
    pub steps: Vec<Step>,
}

impl Variant {
    /// `steps` followed by renaming to `<basename>.min.<ext>`.
    pub fn minified(mut steps: Vec<Step>) -> Self {
        steps.push(Box::new(Rename::suffix(MIN_SUFFIX)));
        Self { steps }
    }
}

//! Change-to-stage resolution.
//!
//! Every kind owns one watch glob; a change reruns the whole stage of each
//! kind whose glob matches. There is no per-file dependency tracking, so an
//! edited SCSS partial rebuilds every stylesheet.

use std::{path::Path, sync::Arc};

use super::{ChangeEvent, debouncer::is_temp_file};
use crate::{
    asset::AssetKind,
    stage::{Stage, StageCatalog},
};

pub struct ChangeResolver {
    catalog: Arc<StageCatalog>,
}

impl ChangeResolver {
    pub fn new(catalog: Arc<StageCatalog>) -> Self {
        Self { catalog }
    }

    /// The stage to rerun for `event`. Always exactly the event's kind.
    #[inline]
    pub fn resolve(&self, event: &ChangeEvent) -> &Stage {
        self.catalog.get(event.kind)
    }

    /// Kinds whose watch glob matches `path`, in declaration order.
    pub fn classify(&self, path: &Path) -> Vec<AssetKind> {
        if is_temp_file(path) {
            return Vec::new();
        }
        self.catalog
            .iter()
            .filter(|stage| stage.spec.watch.is_match(path))
            .map(|stage| stage.kind)
            .collect()
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }
}

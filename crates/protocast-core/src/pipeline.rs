//! Parse, rewrite and emit for one package's generated files.

use crate::config::OverlayConfig;
use crate::emit::emit;
use crate::error::{OverlayError, OverlayResult};
use crate::overlay::{Import, ImportList, OverlayMap, build_overlay};
use crate::rewrite::{RewriteOptions, RewriteReport, rewrite};
use crate::schema::{ExtensionOption, SchemaMessage, SchemaModel, SchemaPackage};
use std::path::Path;
use tracing::{debug, info};

/// Result of rewriting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    /// Rewritten source; identical to the input when `changed` is false.
    pub text: String,

    pub changed: bool,

    pub report: RewriteReport,
}

/// A frozen overlay for one package.
///
/// Building it runs phase one; [`Overlay::rewrite_source`] runs phase two
/// and can be called for any number of files, from any thread.
#[derive(Debug, Clone)]
pub struct Overlay {
    map: OverlayMap,
    imports: ImportList,
    options: RewriteOptions,
}

impl Overlay {
    pub fn new(
        messages: &[SchemaMessage],
        extensions: &[ExtensionOption],
        config: &OverlayConfig,
    ) -> Self {
        let (map, imports) = build_overlay(messages, extensions, config);
        Self {
            map,
            imports,
            options: RewriteOptions::from_config(config),
        }
    }

    /// Overlay for one package of a loaded model.
    pub fn for_package(model: &SchemaModel, package: &SchemaPackage, config: &OverlayConfig) -> Self {
        Self::new(&package.messages, &model.extensions, config)
    }

    pub fn map(&self) -> &OverlayMap {
        &self.map
    }

    /// Imports in field order, before deduplication.
    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    /// Rewrite generated source text. `name` is only used in errors and logs.
    pub fn rewrite_source(&self, name: &str, text: &str) -> OverlayResult<Rewritten> {
        let mut file = syn::parse_file(text).map_err(|e| OverlayError::parse(name, e))?;
        let report = rewrite(&mut file, &self.map, &self.options);
        let output = emit(file, &self.imports, &report, text);
        let changed = output != text;

        if changed {
            info!(file = name, rewritten = report.total(), "rewrote generated source");
        } else {
            debug!(file = name, "nothing to rewrite");
        }
        Ok(Rewritten {
            text: output,
            changed,
            report,
        })
    }

    /// Read and rewrite a generated file without writing it back.
    pub fn rewrite_file(&self, path: impl AsRef<Path>) -> OverlayResult<Rewritten> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| OverlayError::io(path, e))?;
        self.rewrite_source(&path.display().to_string(), &text)
    }
}

//! Inspect command implementation

use crate::overlay::load_config;
use anyhow::{Context, Result};
use protocast_core::{Import, Overlay, OverrideSpec, load_descriptor_set_file};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Overlay summary for one package
#[derive(Debug, Serialize)]
pub struct PackageReport {
    pub package: String,
    pub file: String,
    pub entries: Vec<OverrideSpec>,
    /// Deduplicated and sorted
    pub imports: Vec<Import>,
}

/// Build the per-package reports for a descriptor set
pub fn reports(descriptor_set: &Path, config: Option<&Path>) -> Result<Vec<PackageReport>> {
    let config = load_config(config, None)?;
    let model = load_descriptor_set_file(descriptor_set)
        .with_context(|| format!("Failed to load descriptor set {}", descriptor_set.display()))?;

    Ok(model
        .packages
        .iter()
        .map(|package| {
            let overlay = Overlay::for_package(&model, package, &config);
            let imports: BTreeSet<Import> = overlay.imports().iter().cloned().collect();
            PackageReport {
                package: package.name.clone(),
                file: package.generated_file_name(),
                entries: overlay.map().entries().to_vec(),
                imports: imports.into_iter().collect(),
            }
        })
        .collect())
}

/// Run the inspect command
pub fn run(descriptor_set: &Path, config: Option<&Path>) -> Result<()> {
    let reports = reports(descriptor_set, config)?;
    let json = serde_json::to_string_pretty(&reports).context("Failed to serialize overlay")?;
    println!("{json}");
    Ok(())
}

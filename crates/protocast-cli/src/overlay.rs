//! Overlay command implementation
//!
//! Rewrites every generated `<package>.rs` in the output directory. All
//! files are rewritten in memory and staged as `<package>.rs.protocast`
//! siblings before any target is replaced, so a parse or write failure
//! leaves the directory untouched. Only a failing rename in the final step
//! can leave earlier files replaced.

use anyhow::{Context, Result};
use protocast_core::{Overlay, OverlayConfig, load_descriptor_set_file};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const STAGED_SUFFIX: &str = ".protocast";

/// What an overlay run did
#[derive(Debug, Default)]
pub struct Outcome {
    /// Files whose content changed (or would change under `--check`)
    pub changed: Vec<PathBuf>,

    /// Files that were already up to date
    pub unchanged: Vec<PathBuf>,

    /// Packages with no generated file in the output directory
    pub missing: Vec<String>,
}

/// Load the configuration from `explicit`, or discover it in `dir`
pub fn load_config(explicit: Option<&Path>, dir: Option<&Path>) -> Result<OverlayConfig> {
    match (explicit, dir) {
        (Some(path), _) => OverlayConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        (None, Some(dir)) => OverlayConfig::discover(dir)
            .with_context(|| format!("Failed to load config from {}", dir.display())),
        (None, None) => Ok(OverlayConfig::default()),
    }
}

/// Run the overlay command
pub fn run(descriptor_set: &Path, out_dir: &Path, config: Option<&Path>, check: bool) -> Result<Outcome> {
    let config = load_config(config, Some(out_dir))?;
    let model = load_descriptor_set_file(descriptor_set)
        .with_context(|| format!("Failed to load descriptor set {}", descriptor_set.display()))?;

    let mut outcome = Outcome::default();
    let mut pending = Vec::new();

    for package in &model.packages {
        let path = out_dir.join(package.generated_file_name());
        if !path.is_file() {
            debug!(package = %package.name, path = %path.display(), "no generated file");
            outcome.missing.push(package.name.clone());
            continue;
        }

        let overlay = Overlay::for_package(&model, package, &config);
        let rewritten = overlay
            .rewrite_file(&path)
            .with_context(|| format!("Failed to rewrite {}", path.display()))?;

        if rewritten.changed {
            pending.push((path, rewritten.text));
        } else {
            outcome.unchanged.push(path);
        }
    }

    if check {
        for (path, _) in pending {
            println!("would rewrite {}", path.display());
            outcome.changed.push(path);
        }
    } else {
        let staged = stage(&pending)?;
        for (path, staged) in pending.into_iter().map(|(path, _)| path).zip(staged) {
            std::fs::rename(&staged, &path).with_context(|| {
                format!("Failed to replace {} with {}", path.display(), staged.display())
            })?;
            println!("✓ Rewrote {}", path.display());
            outcome.changed.push(path);
        }
    }

    info!(
        changed = outcome.changed.len(),
        unchanged = outcome.unchanged.len(),
        missing = outcome.missing.len(),
        check,
        "overlay finished"
    );
    Ok(outcome)
}

/// Path a rewritten file is staged at before replacing `path`
pub fn staged_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(STAGED_SUFFIX);
    path.with_file_name(name)
}

/// Write every rewritten text next to its target. On failure the files
/// staged so far are removed.
fn stage(pending: &[(PathBuf, String)]) -> Result<Vec<PathBuf>> {
    let mut staged = Vec::with_capacity(pending.len());
    for (path, text) in pending {
        let target = staged_path(path);
        if let Err(err) = std::fs::write(&target, text) {
            for written in &staged {
                let _ = std::fs::remove_file(written);
            }
            return Err(err).with_context(|| format!("Failed to write {}", target.display()));
        }
        staged.push(target);
    }
    Ok(staged)
}

//! protocast-core - Option-driven type overlay for prost-generated code
//!
//! This crate rewrites Rust source produced by `prost-build` so that fields
//! annotated with custom `FieldOptions` extensions use an override type, a
//! matching zero value and merged tag attributes:
//! - [`load_descriptor_set`] reads the schema model from a `FileDescriptorSet`
//! - [`OverlayMapBuilder`] turns annotations into an [`OverlayMap`]
//! - [`rewrite`] replaces matching declarations and accessors in a `syn` tree
//! - [`emit`] adds imports and serializes the result
//! - [`Overlay`] runs the whole pipeline for one package

pub mod config;
pub mod descriptor;
pub mod emit;
mod error;
pub mod keys;
pub mod naming;
pub mod options;
pub mod overlay;
mod pipeline;
pub mod rewrite;
pub mod schema;

pub use config::{OverlayConfig, TagCase};
pub use descriptor::{load_descriptor_set, load_descriptor_set_file};
pub use emit::emit;
pub use error::{OverlayError, OverlayResult};
pub use keys::{FieldKey, FieldKeys, KeyDeriver};
pub use options::ExtensionTable;
pub use overlay::{
    CastType, Import, ImportList, OverlayMap, OverlayMapBuilder, OverrideSpec, TagFragment,
    build_overlay,
};
pub use pipeline::{Overlay, Rewritten};
pub use rewrite::{RewriteOptions, RewriteReport, rewrite};
pub use schema::{
    ExtensionOption, OptionsPayload, SchemaField, SchemaMessage, SchemaModel, SchemaOneof,
    SchemaPackage, WireKind,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Overlay, OverlayConfig, OverlayError, OverlayMap, OverlayResult, Rewritten, SchemaModel,
        load_descriptor_set,
    };
}

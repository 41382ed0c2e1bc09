//! Overlay map construction (phase one).
//!
//! Walks the schema model and turns every annotated field into an
//! [`OverrideSpec`], registered under all keys produced by
//! [`KeyDeriver`]. The resulting [`OverlayMap`] is the only thing the
//! rewriter sees; it never looks at the schema model itself.

use crate::config::OverlayConfig;
use crate::error::{OverlayError, OverlayResult};
use crate::keys::{FieldKey, KeyDeriver};
use crate::naming;
use crate::options::ExtensionTable;
use crate::schema::{ExtensionOption, SchemaField, SchemaMessage, WireKind};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

const VEC_PATH: &str = "::prost::alloc::vec::Vec";
const OPTION_PATH: &str = "::core::option::Option";

/// The override type declared on a field: an optional origin module and a
/// type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CastType {
    /// Origin as written in the annotation, e.g. `eth2_types::primitives`.
    pub origin: Option<String>,

    /// Import alias derived from the origin.
    pub alias: Option<String>,

    /// Type name, e.g. `Domain`. Without an origin this may be a full path.
    pub name: String,
}

impl CastType {
    /// Parse an annotation value such as `pkgX.Domain` or `u64`.
    ///
    /// The value is split at its last `.`; everything before it is the origin.
    pub fn parse(value: &str) -> OverlayResult<Self> {
        let value = value.trim();
        let invalid = |reason: &str| OverlayError::InvalidOverride {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (origin, name) = match value.rfind('.') {
            Some(idx) => (Some(&value[..idx]), &value[idx + 1..]),
            None => (None, value),
        };

        if syn::parse_str::<syn::Path>(name).is_err() {
            return Err(invalid("type name is not a Rust path"));
        }

        let Some(origin) = origin else {
            return Ok(CastType {
                origin: None,
                alias: None,
                name: name.to_string(),
            });
        };

        if syn::parse_str::<syn::Ident>(name).is_err() {
            return Err(invalid("qualified type name must be a single identifier"));
        }
        let alias = naming::origin_alias(origin);
        if syn::parse_str::<syn::Ident>(&alias).is_err() {
            return Err(invalid("origin does not yield a valid import alias"));
        }
        if syn::parse_str::<syn::Path>(&naming::origin_path(origin)).is_err() {
            return Err(invalid("origin is not a module path"));
        }

        Ok(CastType {
            origin: Some(origin.to_string()),
            alias: Some(alias),
            name: name.to_string(),
        })
    }

    /// Type as referenced from generated code (`alias::Name` or the bare name).
    pub fn qualified(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{alias}::{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Last path segment of the type name, used for the zero array table.
    pub fn bare_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name).trim()
    }
}

/// One `name = "value"` tag fragment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct TagFragment {
    pub name: String,
    pub value: String,
}

impl TagFragment {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Render as the body of a tag attribute entry, e.g. `ssz_size = "32"`.
    pub fn render(&self) -> String {
        format!("{} = {:?}", self.name, self.value)
    }
}

/// Override metadata for one schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideSpec {
    /// Schema location, `<message scope>.<field>`; informational only.
    pub field: String,

    /// Keys this spec is registered under.
    pub keys: Vec<FieldKey>,

    /// `None` means tags only: the declared type is left alone.
    pub cast_type: Option<CastType>,

    /// Declared type of the field or variant payload.
    pub field_type: Option<String>,

    /// Return type of the zero-argument accessor.
    pub accessor_type: Option<String>,

    /// Zero literal for the field's kind or override type.
    pub zero_value: Option<String>,

    pub repeated: bool,

    /// Sorted by name, then value.
    pub tags: Vec<TagFragment>,
}

impl OverrideSpec {
    /// Expression returned by a rewritten accessor.
    ///
    /// Repeated fields return the empty sequence; everything else wraps the
    /// zero literal in the override type's constructor with any leading
    /// reference or pointer sigils removed.
    pub fn zero_expr(&self) -> Option<String> {
        let cast = self.cast_type.as_ref()?;
        let zero = self.zero_value.as_deref()?;
        if self.repeated {
            return Some(zero.to_string());
        }
        let qualified = cast.qualified();
        let constructor = qualified.trim_start_matches(['&', '*', ' ']);
        Some(format!("{constructor}({zero})"))
    }

    pub fn has_cast(&self) -> bool {
        self.cast_type.is_some()
    }
}

/// An import required by an override type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Import {
    /// Rust module path, e.g. `eth2_types::primitives`.
    pub path: String,

    /// Alias the path is imported as.
    pub alias: String,
}

impl Import {
    fn for_cast(cast: &CastType) -> Option<Self> {
        let origin = cast.origin.as_deref()?;
        Some(Import {
            path: naming::origin_path(origin),
            alias: cast.alias.clone()?,
        })
    }
}

/// Imports collected during phase one, in field order, possibly repeated.
pub type ImportList = Vec<Import>;

/// Frozen field-key to [`OverrideSpec`] mapping.
///
/// Each field has one entry; every alias key points at that entry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverlayMap {
    entries: Vec<OverrideSpec>,
    #[serde(skip)]
    index: BTreeMap<FieldKey, usize>,
}

impl OverlayMap {
    pub fn get(&self, key: &FieldKey) -> Option<&OverrideSpec> {
        self.index.get(key).map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, key: &FieldKey) -> bool {
        self.index.contains_key(key)
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[OverrideSpec] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, mut spec: OverrideSpec, keys: impl IntoIterator<Item = FieldKey>) {
        let idx = self.entries.len();
        for key in keys {
            if let Some(&existing) = self.index.get(&key) {
                warn!(
                    key = %key,
                    kept = %self.entries[existing].field,
                    dropped = %spec.field,
                    "overlay key already registered"
                );
                continue;
            }
            trace!(key = %key, field = %spec.field, "registered overlay key");
            self.index.insert(key.clone(), idx);
            spec.keys.push(key);
        }
        if !spec.keys.is_empty() {
            self.entries.push(spec);
        }
    }
}

/// Builds the [`OverlayMap`] for a set of messages.
pub struct OverlayMapBuilder<'a> {
    config: &'a OverlayConfig,
    extensions: ExtensionTable,
    deriver: KeyDeriver,
}

impl<'a> OverlayMapBuilder<'a> {
    pub fn new(config: &'a OverlayConfig, extensions: &[ExtensionOption]) -> Self {
        Self {
            config,
            extensions: ExtensionTable::new(extensions),
            deriver: KeyDeriver::new(config.accessor_prefix.clone()),
        }
    }

    /// Walk every message, its oneofs and its nested messages.
    pub fn build(&self, messages: &[SchemaMessage]) -> (OverlayMap, ImportList) {
        let mut map = OverlayMap::default();
        let mut imports = ImportList::new();

        for message in messages {
            self.visit_message(message, &mut map, &mut imports);
        }

        debug!(
            entries = map.len(),
            imports = imports.len(),
            "overlay map built"
        );
        (map, imports)
    }

    fn visit_message(&self, message: &SchemaMessage, map: &mut OverlayMap, imports: &mut ImportList) {
        for field in message.own_fields() {
            let Some(spec) = self.spec_for(field) else {
                continue;
            };
            if let Some(import) = spec.cast_type.as_ref().and_then(Import::for_cast) {
                imports.push(import);
            }
            let keys = self.deriver.derive_keys(field);
            debug!(
                field = %spec.field,
                cast = ?spec.field_type,
                tags = spec.tags.len(),
                "annotated field"
            );
            map.insert(spec, keys.all().cloned().collect::<Vec<_>>());
        }

        for nested in &message.nested {
            self.visit_message(nested, map, imports);
        }
    }

    /// Compute the override spec for one field, `None` when it carries no
    /// recognized annotation.
    pub fn spec_for(&self, field: &SchemaField) -> Option<OverrideSpec> {
        let location = format!("{}.{}", field.parent_scope, field.name);
        let cast_type = self.cast_type_for(field, &location);
        let tags = self.tags_for(field);

        if cast_type.is_none() && tags.is_empty() {
            return None;
        }

        let mut spec = OverrideSpec {
            field: location,
            keys: Vec::new(),
            cast_type: None,
            field_type: None,
            accessor_type: None,
            zero_value: None,
            repeated: field.is_repeated,
            tags,
        };

        if let Some(cast) = cast_type {
            let qualified = cast.qualified();
            let (field_type, accessor_type, zero) = if field.is_repeated {
                let seq = format!("{VEC_PATH}<{qualified}>");
                (seq.clone(), seq, format!("{VEC_PATH}::new()"))
            } else {
                let zero = match self.config.zero_array_len(cast.bare_name()) {
                    Some(len) => format!("[0u8; {len}]"),
                    None => zero_literal(field.kind).to_string(),
                };
                let declared = if field.is_optional {
                    format!("{OPTION_PATH}<{qualified}>")
                } else {
                    qualified.clone()
                };
                (declared, qualified, zero)
            };
            spec.field_type = Some(field_type);
            spec.accessor_type = Some(accessor_type);
            spec.zero_value = Some(zero);
            spec.cast_type = Some(cast);
        }

        Some(spec)
    }

    fn cast_type_for(&self, field: &SchemaField, location: &str) -> Option<CastType> {
        let ext = self.extensions.by_name(&self.config.cast_extension)?;
        let value = self.extensions.resolve(field, ext)?;
        if value.trim().is_empty() {
            return None;
        }
        match CastType::parse(&value) {
            Ok(cast) => Some(cast),
            Err(err) => {
                warn!(field = %location, %err, "ignoring override type");
                None
            }
        }
    }

    fn tags_for(&self, field: &SchemaField) -> Vec<TagFragment> {
        let mut tags: Vec<TagFragment> = self
            .extensions
            .iter()
            .filter(|ext| ext.name != self.config.cast_extension)
            .filter_map(|ext| {
                let value = self.extensions.resolve(field, ext)?;
                if value.is_empty() {
                    return None;
                }
                Some(TagFragment::new(
                    naming::tag_fragment_name(&ext.name, self.config.tag_case),
                    value,
                ))
            })
            .collect();
        tags.sort();
        tags
    }
}

/// Zero literal prost uses for a field of `kind`.
pub fn zero_literal(kind: WireKind) -> &'static str {
    match kind {
        WireKind::Double | WireKind::Float => "0.0",
        WireKind::Bool => "false",
        WireKind::String => "::prost::alloc::string::String::new()",
        WireKind::Bytes => "::prost::alloc::vec::Vec::new()",
        WireKind::Message | WireKind::Group => "::core::default::Default::default()",
        WireKind::Int64
        | WireKind::Uint64
        | WireKind::Int32
        | WireKind::Fixed64
        | WireKind::Fixed32
        | WireKind::Uint32
        | WireKind::Enum
        | WireKind::Sfixed32
        | WireKind::Sfixed64
        | WireKind::Sint32
        | WireKind::Sint64 => "0",
    }
}

/// Build the overlay map for `messages` in one call.
pub fn build_overlay(
    messages: &[SchemaMessage],
    extensions: &[ExtensionOption],
    config: &OverlayConfig,
) -> (OverlayMap, ImportList) {
    OverlayMapBuilder::new(config, extensions).build(messages)
}

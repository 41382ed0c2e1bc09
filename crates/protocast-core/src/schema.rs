//! Schema model consumed by the overlay builder.
//!
//! These types are a small, owned view of what the protobuf compiler resolved:
//! messages, their fields, oneof groups, nested messages and the `FieldOptions`
//! extensions visible to the run. They are produced by
//! [`crate::descriptor::load_descriptor_set`] (or built directly in tests) and
//! dropped once the [`crate::OverlayMap`] has been built.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A custom per-field annotation type declared as a `FieldOptions` extension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExtensionOption {
    /// Extension field number.
    pub id: u32,

    /// Declared extension name (without package), e.g. `cast_type`.
    pub name: String,
}

impl ExtensionOption {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Protobuf wire kind of a field, as declared in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireKind {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Group,
    Message,
    Bytes,
    Uint32,
    Enum,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

impl From<prost_types::field_descriptor_proto::Type> for WireKind {
    fn from(ty: prost_types::field_descriptor_proto::Type) -> Self {
        use prost_types::field_descriptor_proto::Type;
        match ty {
            Type::Double => WireKind::Double,
            Type::Float => WireKind::Float,
            Type::Int64 => WireKind::Int64,
            Type::Uint64 => WireKind::Uint64,
            Type::Int32 => WireKind::Int32,
            Type::Fixed64 => WireKind::Fixed64,
            Type::Fixed32 => WireKind::Fixed32,
            Type::Bool => WireKind::Bool,
            Type::String => WireKind::String,
            Type::Group => WireKind::Group,
            Type::Message => WireKind::Message,
            Type::Bytes => WireKind::Bytes,
            Type::Uint32 => WireKind::Uint32,
            Type::Enum => WireKind::Enum,
            Type::Sfixed32 => WireKind::Sfixed32,
            Type::Sfixed64 => WireKind::Sfixed64,
            Type::Sint32 => WireKind::Sint32,
            Type::Sint64 => WireKind::Sint64,
        }
    }
}

/// Raw option data attached to one field.
///
/// Any combination of the three sources may be present; the resolver tries
/// them in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsPayload {
    /// Values already resolved by a typed extension API, keyed by extension name.
    #[serde(default)]
    pub resolved: BTreeMap<String, String>,

    /// The field's `FieldOptions` message in protobuf wire format.
    #[serde(default)]
    pub encoded: Option<Vec<u8>>,

    /// A textual rendering of the options, e.g. `1001:"pkg.Type" 1002:"32"`.
    #[serde(default)]
    pub text: Option<String>,
}

impl OptionsPayload {
    pub fn resolved<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            resolved: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn encoded(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            encoded: Some(bytes.into()),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
            && self.encoded.as_ref().is_none_or(|b| b.is_empty())
            && self.text.as_ref().is_none_or(|t| t.is_empty())
    }
}

/// One declared field of a message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Dotted path of the declaring message inside its package, e.g.
    /// `BeaconBlock` or `BeaconBlock.Body`.
    pub parent_scope: String,

    /// Oneof group the field belongs to, if any.
    #[serde(default)]
    pub oneof: Option<String>,

    /// Field name as written in the schema.
    pub name: String,

    /// Name of the zero-argument accessor method generated for this field.
    #[serde(default)]
    pub accessor_name: String,

    pub is_repeated: bool,

    /// Field has explicit presence and is generated as `Option<T>`.
    pub is_optional: bool,

    pub kind: WireKind,

    #[serde(default)]
    pub options: OptionsPayload,
}

impl SchemaField {
    /// Create a singular, non-optional field with no options.
    ///
    /// `parent_scope` is filled in when the field is attached to a
    /// [`SchemaMessage`]. `accessor_name` is left empty and derived from the
    /// configured accessor prefix.
    pub fn new(name: impl Into<String>, kind: WireKind) -> Self {
        Self {
            parent_scope: String::new(),
            oneof: None,
            name: name.into(),
            accessor_name: String::new(),
            is_repeated: false,
            is_optional: false,
            kind,
            options: OptionsPayload::default(),
        }
    }

    pub fn repeated(mut self) -> Self {
        self.is_repeated = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn with_options(mut self, options: OptionsPayload) -> Self {
        self.options = options;
        self
    }

    pub fn with_accessor(mut self, accessor_name: impl Into<String>) -> Self {
        self.accessor_name = accessor_name.into();
        self
    }
}

/// A oneof group; exactly one of its fields is set at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaOneof {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

/// A message type with its fields, oneofs and nested messages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaMessage {
    pub name: String,

    /// Fields that are not part of a oneof.
    #[serde(default)]
    pub fields: Vec<SchemaField>,

    #[serde(default)]
    pub oneofs: Vec<SchemaOneof>,

    #[serde(default)]
    pub nested: Vec<SchemaMessage>,
}

impl SchemaMessage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attach a field, scoping it to this message when it has no scope yet.
    pub fn field(mut self, mut field: SchemaField) -> Self {
        if field.parent_scope.is_empty() {
            field.parent_scope = self.name.clone();
        }
        self.fields.push(field);
        self
    }

    /// Attach a oneof group and scope its fields to this message.
    pub fn oneof(mut self, name: impl Into<String>, fields: Vec<SchemaField>) -> Self {
        let name = name.into();
        let fields = fields
            .into_iter()
            .map(|mut field| {
                if field.parent_scope.is_empty() {
                    field.parent_scope = self.name.clone();
                }
                field.oneof = Some(name.clone());
                field
            })
            .collect();
        self.oneofs.push(SchemaOneof { name, fields });
        self
    }

    /// Attach a nested message, prefixing every field scope below it with
    /// this message's name.
    pub fn nested(mut self, mut message: SchemaMessage) -> Self {
        message.prefix_scopes(&self.name);
        self.nested.push(message);
        self
    }

    fn prefix_scopes(&mut self, prefix: &str) {
        let rescope = |field: &mut SchemaField| {
            field.parent_scope = format!("{prefix}.{}", field.parent_scope);
        };
        self.fields.iter_mut().for_each(rescope);
        self.oneofs
            .iter_mut()
            .flat_map(|o| o.fields.iter_mut())
            .for_each(rescope);
        for nested in &mut self.nested {
            nested.prefix_scopes(prefix);
        }
    }

    /// Every field of this message and its oneofs, excluding nested messages.
    pub fn own_fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields
            .iter()
            .chain(self.oneofs.iter().flat_map(|o| o.fields.iter()))
    }
}

/// All messages of one protobuf package; prost emits one source file per package.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaPackage {
    /// Dotted package name; empty for files without a `package` statement.
    pub name: String,

    pub messages: Vec<SchemaMessage>,
}

impl SchemaPackage {
    /// File name prost-build uses for this package (`_.rs` when unnamed).
    pub fn generated_file_name(&self) -> String {
        if self.name.is_empty() {
            "_.rs".to_string()
        } else {
            format!("{}.rs", self.name)
        }
    }
}

/// Everything one overlay run knows about the schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaModel {
    /// `FieldOptions` extensions visible to the run, sorted by id.
    pub extensions: Vec<ExtensionOption>,

    /// Packages in first-seen order.
    pub packages: Vec<SchemaPackage>,
}

impl SchemaModel {
    pub fn package(&self, name: &str) -> Option<&SchemaPackage> {
        self.packages.iter().find(|p| p.name == name)
    }
}

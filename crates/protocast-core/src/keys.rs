//! Composite lookup keys for schema fields.
//!
//! Generated source refers to one schema field under several spellings: the
//! struct field (`domain`), the oneof variant (`Domain`) and the accessor
//! (`get_domain`). [`KeyDeriver`] produces all of them, each qualified by
//! the generated type path that encloses it, so that same-named fields in
//! different messages never share a key.

use crate::naming;
use crate::schema::SchemaField;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// A scope-qualified lookup key.
///
/// Member keys render as `<scope>.<name>`, accessor keys as
/// `<scope>-<method>`; the separator keeps the two namespaces apart.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldKey(String);

impl FieldKey {
    /// Key for a struct field or oneof variant declared in `scope`.
    pub fn member(scope: &str, name: &str) -> Self {
        FieldKey(format!("{scope}.{name}"))
    }

    /// Key for a zero-argument method implemented on `scope`.
    pub fn accessor(scope: &str, method: &str) -> Self {
        FieldKey(format!("{scope}-{method}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every key under which one field can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKeys {
    /// Generated type path holding the declaration (struct or oneof enum).
    pub declaration_scope: String,

    /// Generated type path holding the accessor (always the message struct).
    pub accessor_scope: String,

    /// Declaration aliases: raw name, snake_case name, UpperCamelCase name.
    pub members: BTreeSet<FieldKey>,

    pub accessor: FieldKey,
}

impl FieldKeys {
    /// All aliases, member keys first.
    pub fn all(&self) -> impl Iterator<Item = &FieldKey> {
        self.members.iter().chain(std::iter::once(&self.accessor))
    }
}

/// Derives [`FieldKeys`] following the prost naming contract.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    accessor_prefix: String,
}

impl KeyDeriver {
    pub fn new(accessor_prefix: impl Into<String>) -> Self {
        Self {
            accessor_prefix: accessor_prefix.into(),
        }
    }

    pub fn derive_keys(&self, field: &SchemaField) -> FieldKeys {
        let accessor_scope = naming::message_path(&field.parent_scope);
        let declaration_scope = match &field.oneof {
            Some(oneof) => naming::oneof_path(&field.parent_scope, oneof),
            None => accessor_scope.clone(),
        };

        let members = [
            field.name.clone(),
            naming::to_snake_case(&field.name),
            naming::to_upper_camel_case(&field.name),
        ]
        .iter()
        .map(|name| FieldKey::member(&declaration_scope, name))
        .collect();

        let method = if field.accessor_name.is_empty() {
            naming::accessor_name(&self.accessor_prefix, &field.name)
        } else {
            field.accessor_name.clone()
        };
        let accessor = FieldKey::accessor(&accessor_scope, &method);

        FieldKeys {
            declaration_scope,
            accessor_scope,
            members,
            accessor,
        }
    }
}

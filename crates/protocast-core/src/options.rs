//! Extension option resolution.
//!
//! Reads the string value of a `FieldOptions` extension from a field's
//! [`OptionsPayload`]. Three sources are consulted in order:
//!
//! 1. values resolved by a typed extension API, looked up by extension name;
//! 2. the encoded `FieldOptions` bytes, walked as protobuf wire format;
//! 3. a textual rendering of the options, scanned with a pattern built from
//!    the extension's field number.
//!
//! The third source only exists to bridge toolchains that neither resolve
//! extensions nor keep the encoded options. It takes the first match, which
//! can misattribute a value if the same number appears inside a nested
//! option message.
//!
//! Resolution never fails: a payload that cannot be read means "not
//! annotated".

use crate::schema::{ExtensionOption, OptionsPayload, SchemaField};
use prost::encoding::{WireType, decode_key, decode_varint};
use regex::Regex;
use std::collections::BTreeMap;

/// Read-only table of the extensions declared for one run, keyed by id.
#[derive(Debug)]
pub struct ExtensionTable {
    extensions: BTreeMap<u32, ExtensionOption>,
    patterns: BTreeMap<u32, Regex>,
}

impl ExtensionTable {
    /// Build the table once at the start of a run.
    ///
    /// When two declarations share an id, the first one wins.
    pub fn new<'a>(extensions: impl IntoIterator<Item = &'a ExtensionOption>) -> Self {
        let mut table = BTreeMap::new();
        let mut patterns = BTreeMap::new();

        for ext in extensions {
            if table.contains_key(&ext.id) {
                tracing::warn!(id = ext.id, name = %ext.name, "duplicate extension id ignored");
                continue;
            }
            match Regex::new(&format!(r#"(?:^|[^0-9]){}:"([^"]*)""#, ext.id)) {
                Ok(pattern) => {
                    patterns.insert(ext.id, pattern);
                }
                Err(err) => {
                    tracing::warn!(id = ext.id, %err, "text fallback disabled for extension");
                }
            }
            table.insert(ext.id, ext.clone());
        }

        Self {
            extensions: table,
            patterns,
        }
    }

    /// Look up an extension by its declared name.
    pub fn by_name(&self, name: &str) -> Option<&ExtensionOption> {
        self.extensions.values().find(|ext| ext.name == name)
    }

    pub fn by_id(&self, id: u32) -> Option<&ExtensionOption> {
        self.extensions.get(&id)
    }

    /// Extensions in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtensionOption> {
        self.extensions.values()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Resolve `option` on `field`.
    pub fn resolve(&self, field: &SchemaField, option: &ExtensionOption) -> Option<String> {
        self.resolve_payload(&field.options, option)
    }

    /// Resolve `option` from a bare payload.
    pub fn resolve_payload(
        &self,
        payload: &OptionsPayload,
        option: &ExtensionOption,
    ) -> Option<String> {
        if let Some(value) = payload.resolved.get(&option.name) {
            return Some(value.clone());
        }

        if let Some(bytes) = payload.encoded.as_deref()
            && let Some(value) = first_string_field(bytes, option.id)
        {
            return Some(value);
        }

        let text = payload.text.as_deref()?;
        let pattern = self.patterns.get(&option.id)?;
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// First length-delimited field numbered `number` whose payload is UTF-8.
///
/// Stops at the first malformed key or truncated value; anything found
/// before that point still counts.
pub fn first_string_field(mut buf: &[u8], number: u32) -> Option<String> {
    while !buf.is_empty() {
        let (tag, wire_type) = decode_key(&mut buf).ok()?;
        match wire_type {
            WireType::Varint => {
                decode_varint(&mut buf).ok()?;
            }
            WireType::SixtyFourBit => buf = buf.get(8..)?,
            WireType::ThirtyTwoBit => buf = buf.get(4..)?,
            WireType::LengthDelimited => {
                let len = usize::try_from(decode_varint(&mut buf).ok()?).ok()?;
                if buf.len() < len {
                    return None;
                }
                let (value, rest) = buf.split_at(len);
                if tag == number
                    && let Ok(text) = std::str::from_utf8(value)
                {
                    return Some(text.to_string());
                }
                buf = rest;
            }
            // Group markers carry no payload of their own.
            WireType::StartGroup | WireType::EndGroup => {}
        }
    }
    None
}

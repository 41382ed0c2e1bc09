//! Loading the schema model from a serialized `FileDescriptorSet`.
//!
//! `prost_types` decodes the descriptor structure but discards unknown
//! fields, which is where custom `FieldOptions` extensions live. The same
//! bytes are therefore walked a second time at the wire level to keep each
//! field's encoded options, matched to the decoded descriptors by position.

use crate::error::{OverlayError, OverlayResult};
use crate::schema::{
    ExtensionOption, OptionsPayload, SchemaField, SchemaMessage, SchemaModel, SchemaPackage,
    WireKind,
};
use prost::Message;
use prost::encoding::{WireType, decode_key, decode_varint};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Extendee of per-field option extensions.
pub const FIELD_OPTIONS: &str = ".google.protobuf.FieldOptions";

// Field numbers in descriptor.proto.
const SET_FILE: u32 = 1;
const FILE_MESSAGE_TYPE: u32 = 4;
const MESSAGE_FIELD: u32 = 2;
const MESSAGE_NESTED_TYPE: u32 = 3;
const FIELD_OPTIONS_NUMBER: u32 = 8;

/// Decode a `FileDescriptorSet` into a [`SchemaModel`].
///
/// Extensions of `google.protobuf.FieldOptions` are collected from every
/// file (top level and nested in messages); messages are grouped by proto
/// package, in first-seen order.
pub fn load_descriptor_set(bytes: &[u8]) -> OverlayResult<SchemaModel> {
    let set = FileDescriptorSet::decode(bytes)?;
    let raw_files = nested_messages(bytes, SET_FILE)?
        .into_iter()
        .map(RawMessages::file)
        .collect::<OverlayResult<Vec<_>>>()?;

    let mut extensions = BTreeMap::new();
    let mut packages: Vec<SchemaPackage> = Vec::new();

    for (file, raw) in set.file.iter().zip(raw_files.iter()) {
        collect_extensions(file, &mut extensions);

        let proto2 = matches!(file.syntax(), "" | "proto2");
        let messages: Vec<SchemaMessage> = file
            .message_type
            .iter()
            .zip(raw.messages.iter())
            .map(|(message, raw)| convert_message(message, raw, proto2))
            .collect();
        debug!(file = file.name(), messages = messages.len(), "loaded descriptor file");

        match packages.iter_mut().find(|p| p.name == file.package()) {
            Some(package) => package.messages.extend(messages),
            None => packages.push(SchemaPackage {
                name: file.package().to_string(),
                messages,
            }),
        }
    }

    let model = SchemaModel {
        extensions: extensions.into_values().collect(),
        packages,
    };
    info!(
        files = set.file.len(),
        packages = model.packages.len(),
        extensions = model.extensions.len(),
        "descriptor set loaded"
    );
    Ok(model)
}

/// Read and decode a descriptor set file.
pub fn load_descriptor_set_file(path: impl AsRef<Path>) -> OverlayResult<SchemaModel> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| OverlayError::io(path, e))?;
    load_descriptor_set(&bytes)
}

fn collect_extensions(file: &FileDescriptorProto, out: &mut BTreeMap<u32, ExtensionOption>) {
    fn visit(message: &DescriptorProto, out: &mut BTreeMap<u32, ExtensionOption>) {
        add(&message.extension, out);
        for nested in &message.nested_type {
            visit(nested, out);
        }
    }

    fn add(extensions: &[FieldDescriptorProto], out: &mut BTreeMap<u32, ExtensionOption>) {
        for ext in extensions.iter().filter(|ext| ext.extendee() == FIELD_OPTIONS) {
            let Ok(id) = u32::try_from(ext.number()) else {
                continue;
            };
            out.entry(id)
                .or_insert_with(|| ExtensionOption::new(id, ext.name()));
        }
    }

    add(&file.extension, out);
    for message in &file.message_type {
        visit(message, out);
    }
}

fn convert_message(message: &DescriptorProto, raw: &RawMessage, proto2: bool) -> SchemaMessage {
    let mut converted = SchemaMessage::new(message.name());
    let mut oneofs: BTreeMap<i32, Vec<SchemaField>> = BTreeMap::new();

    for (idx, field) in message.field.iter().enumerate() {
        let options = raw
            .fields
            .get(idx)
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| OptionsPayload::encoded(bytes.clone()))
            .unwrap_or_default();
        let schema_field = convert_field(field, options, proto2);

        match field.oneof_index {
            Some(index) if !field.proto3_optional() => {
                oneofs.entry(index).or_default().push(schema_field);
            }
            _ => converted = converted.field(schema_field),
        }
    }

    for (index, fields) in oneofs {
        let name = usize::try_from(index)
            .ok()
            .and_then(|i| message.oneof_decl.get(i))
            .map(|decl| decl.name().to_string())
            .unwrap_or_default();
        converted = converted.oneof(name, fields);
    }

    for (nested, raw_nested) in message.nested_type.iter().zip(raw.nested.iter()) {
        // prost turns map entries into HashMap fields, not structs
        if nested.options.as_ref().is_some_and(|o| o.map_entry()) {
            continue;
        }
        converted = converted.nested(convert_message(nested, raw_nested, proto2));
    }

    converted
}

fn convert_field(field: &FieldDescriptorProto, options: OptionsPayload, proto2: bool) -> SchemaField {
    let kind = WireKind::from(field.r#type());
    let repeated = field.label() == Label::Repeated;
    let in_oneof = field.oneof_index.is_some() && !field.proto3_optional();
    let is_message = matches!(field.r#type(), Type::Message | Type::Group);

    let optional = !repeated
        && !in_oneof
        && (field.proto3_optional()
            || is_message
            || (proto2 && field.label() == Label::Optional));

    let mut converted = SchemaField::new(field.name(), kind).with_options(options);
    converted.is_repeated = repeated;
    converted.is_optional = optional;
    converted
}

/// Encoded options of one message's fields plus its nested messages,
/// in declaration order.
#[derive(Debug, Default)]
struct RawMessage {
    fields: Vec<Vec<u8>>,
    nested: Vec<RawMessage>,
}

#[derive(Debug, Default)]
struct RawMessages {
    messages: Vec<RawMessage>,
}

impl RawMessages {
    fn file(bytes: &[u8]) -> OverlayResult<Self> {
        let messages = nested_messages(bytes, FILE_MESSAGE_TYPE)?
            .into_iter()
            .map(RawMessage::parse)
            .collect::<OverlayResult<_>>()?;
        Ok(Self { messages })
    }
}

impl RawMessage {
    fn parse(bytes: &[u8]) -> OverlayResult<Self> {
        let mut message = RawMessage::default();
        for (number, payload) in length_delimited(bytes)? {
            match number {
                MESSAGE_FIELD => {
                    // repeated occurrences of an embedded message merge by concatenation
                    message
                        .fields
                        .push(nested_messages(payload, FIELD_OPTIONS_NUMBER)?.concat());
                }
                MESSAGE_NESTED_TYPE => message.nested.push(RawMessage::parse(payload)?),
                _ => {}
            }
        }
        Ok(message)
    }
}

fn nested_messages(bytes: &[u8], number: u32) -> OverlayResult<Vec<&[u8]>> {
    Ok(length_delimited(bytes)?
        .into_iter()
        .filter(|(n, _)| *n == number)
        .map(|(_, payload)| payload)
        .collect())
}

/// Every length-delimited field of one message, in wire order.
///
/// Unlike option resolution this walk is strict: the bytes already decoded
/// as a descriptor set, so anything malformed here is an error.
fn length_delimited(mut buf: &[u8]) -> OverlayResult<Vec<(u32, &[u8])>> {
    let truncated = || OverlayError::Descriptor("truncated field".to_string());
    let mut out = Vec::new();

    while !buf.is_empty() {
        let (number, wire_type) = decode_key(&mut buf)?;
        match wire_type {
            WireType::Varint => {
                decode_varint(&mut buf)?;
            }
            WireType::SixtyFourBit => buf = buf.get(8..).ok_or_else(truncated)?,
            WireType::ThirtyTwoBit => buf = buf.get(4..).ok_or_else(truncated)?,
            WireType::LengthDelimited => {
                let len = usize::try_from(decode_varint(&mut buf)?).map_err(|_| truncated())?;
                if buf.len() < len {
                    return Err(truncated());
                }
                let (payload, rest) = buf.split_at(len);
                out.push((number, payload));
                buf = rest;
            }
            WireType::StartGroup | WireType::EndGroup => {
                return Err(OverlayError::Descriptor(format!(
                    "unexpected group in field {number}"
                )));
            }
        }
    }
    Ok(out)
}

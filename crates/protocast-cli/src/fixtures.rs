//! Descriptor sets and generated sources shared by the command tests

use prost::Message;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use std::path::Path;

pub const CAST: u32 = 50_000;
pub const SSZ_SIZE: u32 = 50_001;

pub const CHECKPOINT_RS: &str = r#"// This file is @generated by prost-build.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Checkpoint {
    #[prost(uint64, tag = "1")]
    pub epoch: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub root: ::prost::alloc::vec::Vec<u8>,
}
"#;

fn append(buf: &mut Vec<u8>, number: u32, payload: &[u8]) {
    prost::encoding::bytes::encode(number, &payload.to_vec(), buf);
}

fn field(name: &str, number: i32, ty: Type, options: &[(u32, &str)]) -> Vec<u8> {
    let mut buf = FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        r#type: Some(ty as i32),
        label: Some(Label::Optional as i32),
        ..Default::default()
    }
    .encode_to_vec();
    if !options.is_empty() {
        let mut encoded = Vec::new();
        for (id, value) in options {
            prost::encoding::string::encode(*id, &value.to_string(), &mut encoded);
        }
        append(&mut buf, 8, &encoded);
    }
    buf
}

fn file(base: FileDescriptorProto, messages: Vec<Vec<u8>>) -> Vec<u8> {
    let mut buf = base.encode_to_vec();
    for message in messages {
        append(&mut buf, 4, &message);
    }
    buf
}

fn options_file() -> Vec<u8> {
    let extension = |name: &str, number: u32| FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number as i32),
        extendee: Some(".google.protobuf.FieldOptions".to_string()),
        r#type: Some(Type::String as i32),
        label: Some(Label::Optional as i32),
        ..Default::default()
    };
    file(
        FileDescriptorProto {
            name: Some("ext/options.proto".to_string()),
            package: Some("ethereum.ext".to_string()),
            syntax: Some("proto3".to_string()),
            extension: vec![extension("cast_type", CAST), extension("ssz_size", SSZ_SIZE)],
            ..Default::default()
        },
        Vec::new(),
    )
}

fn checkpoint_file() -> Vec<u8> {
    let mut checkpoint = DescriptorProto {
        name: Some("Checkpoint".to_string()),
        ..Default::default()
    }
    .encode_to_vec();
    append(
        &mut checkpoint,
        2,
        &field("epoch", 1, Type::Uint64, &[(CAST, "eth2/types.Epoch")]),
    );
    append(
        &mut checkpoint,
        2,
        &field("root", 2, Type::Bytes, &[(SSZ_SIZE, "32")]),
    );
    file(
        FileDescriptorProto {
            name: Some("eth/checkpoint.proto".to_string()),
            package: Some("ethereum.eth".to_string()),
            syntax: Some("proto3".to_string()),
            dependency: vec!["ext/options.proto".to_string()],
            ..Default::default()
        },
        vec![checkpoint],
    )
}

/// Options file plus `ethereum.eth.Checkpoint`
pub fn descriptor_set() -> Vec<u8> {
    let mut buf = Vec::new();
    for file in [options_file(), checkpoint_file()] {
        append(&mut buf, 1, &file);
    }
    buf
}

/// Write the descriptor set into `dir` and return its path
pub fn write_descriptor_set(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("descriptor.pb");
    std::fs::write(&path, descriptor_set()).unwrap();
    path
}

//! End-to-end tests: descriptor set bytes in, rewritten prost source out.
//!
//! Descriptor sets are built with `prost_types` and encoded with
//! `prost::Message::encode_to_vec`. Extension values, which `prost_types`
//! cannot represent, are appended to each field's encoding as an extra
//! `options` entry.

#![allow(non_snake_case)]

use prost::Message;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, OneofDescriptorProto,
};
use protocast_core::{Overlay, OverlayConfig, OverlayError, load_descriptor_set};

const CAST: u32 = 50_000;
const SSZ_SIZE: u32 = 50_001;
const SSZ_MAX: u32 = 50_002;

fn append(buf: &mut Vec<u8>, number: u32, payload: &[u8]) {
    prost::encoding::bytes::encode(number, &payload.to_vec(), buf);
}

fn field(name: &str, number: i32, ty: Type, label: Label, options: &[(u32, &str)]) -> Vec<u8> {
    field_in(name, number, ty, label, None, options)
}

fn field_in(
    name: &str,
    number: i32,
    ty: Type,
    label: Label,
    oneof_index: Option<i32>,
    options: &[(u32, &str)],
) -> Vec<u8> {
    let mut buf = FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        r#type: Some(ty as i32),
        label: Some(label as i32),
        oneof_index,
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

fn message(name: &str, oneofs: &[&str], fields: Vec<Vec<u8>>, nested: Vec<Vec<u8>>) -> Vec<u8> {
    let mut buf = DescriptorProto {
        name: Some(name.to_string()),
        oneof_decl: oneofs
            .iter()
            .map(|name| OneofDescriptorProto {
                name: Some(name.to_string()),
                options: None,
            })
            .collect(),
        ..Default::default()
    }
    .encode_to_vec();
    for field in fields {
        append(&mut buf, 2, &field);
    }
    for message in nested {
        append(&mut buf, 3, &message);
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

fn descriptor_set(files: Vec<Vec<u8>>) -> Vec<u8> {
    let mut buf = Vec::new();
    for file in files {
        append(&mut buf, 1, &file);
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
            extension: vec![
                extension("cast_type", CAST),
                extension("ssz_size", SSZ_SIZE),
                extension("ssz_max", SSZ_MAX),
            ],
            ..Default::default()
        },
        Vec::new(),
    )
}

fn beacon_block_file() -> Vec<u8> {
    let body = message(
        "Body",
        &[],
        vec![field("graffiti", 1, Type::Bytes, Label::Optional, &[(SSZ_SIZE, "32")])],
        vec![],
    );
    let block = message(
        "BeaconBlock",
        &["payload"],
        vec![
            field("slot", 1, Type::Uint64, Label::Optional, &[(CAST, "eth2/types.Slot")]),
            field(
                "parent_root",
                2,
                Type::Bytes,
                Label::Optional,
                &[(CAST, "eth2/primitives.Root"), (SSZ_SIZE, "32")],
            ),
            field(
                "randao",
                3,
                Type::Bytes,
                Label::Repeated,
                &[(CAST, "eth2/primitives.Root"), (SSZ_SIZE, "?,32"), (SSZ_MAX, "16")],
            ),
            field("body", 4, Type::Message, Label::Optional, &[]),
            field_in(
                "signature",
                5,
                Type::Bytes,
                Label::Optional,
                Some(0),
                &[(CAST, "eth2/primitives.Signature")],
            ),
            field_in("epoch", 6, Type::Uint64, Label::Optional, Some(0), &[]),
        ],
        vec![body],
    );
    file(
        FileDescriptorProto {
            name: Some("eth/block.proto".to_string()),
            package: Some("ethereum.eth".to_string()),
            syntax: Some("proto3".to_string()),
            dependency: vec!["ext/options.proto".to_string()],
            ..Default::default()
        },
        vec![block],
    )
}

const BEACON_BLOCK_RS: &str = r#"// This file is @generated by prost-build.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeaconBlock {
    #[prost(uint64, tag = "1")]
    pub slot: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub parent_root: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub randao: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    #[prost(message, optional, tag = "4")]
    pub body: ::core::option::Option<beacon_block::Body>,
    #[prost(oneof = "beacon_block::Payload", tags = "5, 6")]
    pub payload: ::core::option::Option<beacon_block::Payload>,
}
/// Nested message and enum types in `BeaconBlock`.
pub mod beacon_block {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Body {
        #[prost(bytes = "vec", tag = "1")]
        pub graffiti: ::prost::alloc::vec::Vec<u8>,
    }
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(bytes, tag = "5")]
        Signature(::prost::alloc::vec::Vec<u8>),
        #[prost(uint64, tag = "6")]
        Epoch(u64),
    }
}
impl BeaconBlock {
    pub fn get_slot(&self) -> u64 {
        self.slot
    }
    pub fn get_parent_root(&self) -> &[u8] {
        &self.parent_root
    }
    pub fn get_randao(&self) -> &[::prost::alloc::vec::Vec<u8>] {
        &self.randao
    }
    pub fn get_signature(&self) -> &[u8] {
        if let ::core::option::Option::Some(beacon_block::Payload::Signature(v)) = &self.payload {
            return v;
        }
        return &[];
    }
}
"#;

fn beacon_overlay() -> Overlay {
    let bytes = descriptor_set(vec![options_file(), beacon_block_file()]);
    let model = load_descriptor_set(&bytes).unwrap();
    let package = model.package("ethereum.eth").unwrap();
    Overlay::for_package(&model, package, &OverlayConfig::default())
}

// =============================================================================
// End-to-end rewriting
// =============================================================================

mod end_to_end {
    use super::*;

    #[test]
    fn rewrite_source___beacon_block___retypes_annotated_fields() {
        let result = beacon_overlay()
            .rewrite_source("ethereum.eth.rs", BEACON_BLOCK_RS)
            .unwrap();
        let text = &result.text;

        assert!(result.changed);
        assert!(text.contains("pub slot: eth2_types::Slot,"));
        assert!(text.contains("pub parent_root: eth2_primitives::Root,"));
        assert!(text.contains("pub randao: ::prost::alloc::vec::Vec<eth2_primitives::Root>,"));
        assert!(text.contains("Signature(eth2_primitives::Signature),"));
        assert!(text.contains("Epoch(u64),"));
        assert!(text.contains("pub body: ::core::option::Option<beacon_block::Body>,"));
    }

    #[test]
    fn rewrite_source___beacon_block___rewrites_accessors_and_zero_values() {
        let text = beacon_overlay()
            .rewrite_source("ethereum.eth.rs", BEACON_BLOCK_RS)
            .unwrap()
            .text;

        assert!(text.contains("pub fn get_slot(&self) -> eth2_types::Slot {"));
        assert!(text.contains("eth2_types::Slot(0)"));
        assert!(text.contains("eth2_primitives::Root([0u8; 32])"));
        assert!(text.contains(
            "pub fn get_randao(&self) -> ::prost::alloc::vec::Vec<eth2_primitives::Root> {"
        ));
        assert!(text.contains("return eth2_primitives::Signature([0u8; 96]);"));
        assert!(text.contains("return v;"));
    }

    #[test]
    fn rewrite_source___beacon_block___merges_tags() {
        let text = beacon_overlay()
            .rewrite_source("ethereum.eth.rs", BEACON_BLOCK_RS)
            .unwrap()
            .text;

        assert!(text.contains(r#"#[cast(ssz_size = "32")]"#));
        assert!(text.contains(r#"#[cast(ssz_max = "16", ssz_size = "?,32")]"#));
        assert_eq!(text.matches("#[cast(").count(), 3);
    }

    #[test]
    fn rewrite_source___beacon_block___imports_once_at_root_and_in_module() {
        let text = beacon_overlay()
            .rewrite_source("ethereum.eth.rs", BEACON_BLOCK_RS)
            .unwrap()
            .text;

        assert_eq!(text.matches("use eth2::primitives as eth2_primitives;").count(), 2);
        assert_eq!(text.matches("use eth2::types as eth2_types;").count(), 1);
        let primitives = text.find("use eth2::primitives").unwrap();
        let types = text.find("use eth2::types").unwrap();
        assert!(primitives < types);
        assert!(text.starts_with("// This file is @generated by prost-build.\n"));
    }

    #[test]
    fn rewrite_source___output___parses_and_is_a_fixed_point() {
        let overlay = beacon_overlay();
        let first = overlay
            .rewrite_source("ethereum.eth.rs", BEACON_BLOCK_RS)
            .unwrap();

        assert!(syn::parse_file(&first.text).is_ok());
        let second = overlay.rewrite_source("ethereum.eth.rs", &first.text).unwrap();
        assert!(!second.changed);
        assert_eq!(second.text, first.text);
    }
}

// =============================================================================
// Inputs the overlay must leave alone
// =============================================================================

mod untouched {
    use super::*;

    #[test]
    fn rewrite_source___unrelated_source___is_byte_identical() {
        let source = "// header\npub struct   Unrelated {  pub slot: u64 }\n";

        let result = beacon_overlay().rewrite_source("x.rs", source).unwrap();

        assert!(!result.changed);
        assert_eq!(result.text, source);
    }

    #[test]
    fn rewrite_source___package_without_annotations___is_byte_identical() {
        let plain = file(
            FileDescriptorProto {
                name: Some("plain.proto".to_string()),
                package: Some("plain".to_string()),
                syntax: Some("proto3".to_string()),
                ..Default::default()
            },
            vec![message(
                "BeaconBlock",
                &[],
                vec![field("slot", 1, Type::Uint64, Label::Optional, &[])],
                vec![],
            )],
        );
        let model = load_descriptor_set(&descriptor_set(vec![options_file(), plain])).unwrap();
        let overlay = Overlay::for_package(
            &model,
            model.package("plain").unwrap(),
            &OverlayConfig::default(),
        );

        let result = overlay.rewrite_source("plain.rs", BEACON_BLOCK_RS).unwrap();

        assert!(!result.changed);
        assert_eq!(result.text, BEACON_BLOCK_RS);
    }

    #[test]
    fn rewrite_source___malformed_source___fails_without_output() {
        let err = beacon_overlay()
            .rewrite_source("bad.rs", "pub struct BeaconBlock {")
            .unwrap_err();

        assert!(matches!(err, OverlayError::Parse { .. }));
    }
}

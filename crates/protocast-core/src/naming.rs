//! Naming conventions shared with the prost source generator.
//!
//! The overlay only finds a field in generated source if it spells the field,
//! its enclosing type and its accessor exactly the way `prost-build` does.
//! Every function here is part of that contract and is tested directly.
//!
//! | Schema | Function | Generated |
//! |--------|----------|-----------|
//! | `parentRoot` | [`to_snake_case`] | `parent_root` |
//! | `payload_kind` | [`to_upper_camel_case`] | `PayloadKind` |
//! | `BeaconBlock.Body` | [`message_path`] | `beacon_block::Body` |
//! | `BeaconBlock` + `payload` | [`oneof_path`] | `beacon_block::Payload` |
//! | `eth2/types-v1` | [`origin_alias`] | `eth2_types_v1` |

use crate::config::TagCase;
use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};

/// Convert a schema identifier to the snake_case form prost uses for fields
/// and modules.
///
/// # Examples
///
/// ```
/// use protocast_core::naming::to_snake_case;
///
/// assert_eq!(to_snake_case("parentRoot"), "parent_root");
/// assert_eq!(to_snake_case("BeaconBlock"), "beacon_block");
/// ```
pub fn to_snake_case(s: &str) -> String {
    s.to_snake_case()
}

/// Convert a schema identifier to the UpperCamelCase form prost uses for
/// message structs, oneof enums and oneof variants.
///
/// `Self` is not a legal type name, so prost appends an underscore.
///
/// # Examples
///
/// ```
/// use protocast_core::naming::to_upper_camel_case;
///
/// assert_eq!(to_upper_camel_case("payload_kind"), "PayloadKind");
/// assert_eq!(to_upper_camel_case("self"), "Self_");
/// ```
pub fn to_upper_camel_case(s: &str) -> String {
    let ident = s.to_upper_camel_case();
    if ident == "Self" {
        ident + "_"
    } else {
        ident
    }
}

/// Generated type path of a message given its dotted scope inside the package.
///
/// Enclosing messages become snake_case modules, the message itself keeps its
/// UpperCamelCase struct name.
///
/// # Examples
///
/// ```
/// use protocast_core::naming::message_path;
///
/// assert_eq!(message_path("BeaconBlock"), "BeaconBlock");
/// assert_eq!(message_path("BeaconBlock.Body"), "beacon_block::Body");
/// ```
pub fn message_path(scope: &str) -> String {
    let mut segments: Vec<&str> = scope.split('.').filter(|s| !s.is_empty()).collect();
    let Some(last) = segments.pop() else {
        return String::new();
    };
    let mut path: Vec<String> = segments.into_iter().map(to_snake_case).collect();
    path.push(to_upper_camel_case(last));
    path.join("::")
}

/// Generated type path of the enum prost emits for a oneof group.
///
/// The enum lives in the module named after the owning message.
pub fn oneof_path(message_scope: &str, oneof: &str) -> String {
    let mut path: Vec<String> = message_scope
        .split('.')
        .filter(|s| !s.is_empty())
        .map(to_snake_case)
        .collect();
    path.push(to_upper_camel_case(oneof));
    path.join("::")
}

/// Name of the zero-argument accessor for a field: prefix + snake_case name.
pub fn accessor_name(prefix: &str, field: &str) -> String {
    format!("{prefix}{}", to_snake_case(field))
}

/// Render an extension name as a tag fragment name.
pub fn tag_fragment_name(extension: &str, case: TagCase) -> String {
    match case {
        TagCase::Snake => extension.to_snake_case(),
        TagCase::Kebab => extension.to_kebab_case(),
        TagCase::Camel => extension.to_lower_camel_case(),
    }
}

/// Deterministic import alias for an override-type origin.
///
/// Path separators and punctuation become underscores so the same origin is
/// always imported under the same name.
///
/// # Examples
///
/// ```
/// use protocast_core::naming::origin_alias;
///
/// assert_eq!(origin_alias("eth2_types::primitives"), "eth2_types_primitives");
/// assert_eq!(origin_alias("github.com/acme/go-bits"), "github_com_acme_go_bits");
/// ```
pub fn origin_alias(origin: &str) -> String {
    origin.replace("::", "_").replace(['/', '-', '.'], "_")
}

/// Rust module path for an override-type origin.
///
/// Accepts `::`, `/` and `.` as separators; dashes are not legal in Rust
/// paths and become underscores, the way Cargo names crates.
///
/// # Examples
///
/// ```
/// use protocast_core::naming::origin_path;
///
/// assert_eq!(origin_path("eth2-types/primitives"), "eth2_types::primitives");
/// assert_eq!(origin_path("crate::types"), "crate::types");
/// ```
pub fn origin_path(origin: &str) -> String {
    origin
        .replace("::", "/")
        .split(['/', '.'])
        .filter(|s| !s.is_empty())
        .map(|s| s.replace('-', "_"))
        .collect::<Vec<_>>()
        .join("::")
}

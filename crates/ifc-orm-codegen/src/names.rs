// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rust identifiers for schema names

use heck::{ToSnakeCase, ToUpperCamelCase};
use proc_macro2::{Ident, Span};

/// Keywords that need a raw identifier (`r#type`)
const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use",
    "virtual", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers
const RESERVED: &[&str] = &["crate", "self", "super", "Self"];

/// Identifier for `name`, raw or suffixed when it collides with a keyword
pub fn ident(name: &str) -> Ident {
    if RESERVED.contains(&name) {
        Ident::new(&format!("{}_", name), Span::call_site())
    } else if KEYWORDS.contains(&name) {
        Ident::new_raw(name, Span::call_site())
    } else {
        Ident::new(name, Span::call_site())
    }
}

/// Type identifier: declarations keep their schema casing
pub fn type_ident(declaration: &str) -> Ident {
    ident(declaration)
}

/// Getter name: `GlobalId` -> `global_id`
pub fn getter(attribute: &str) -> Ident {
    ident(&attribute.to_snake_case())
}

/// Setter name: `GlobalId` -> `set_global_id`
pub fn setter(attribute: &str) -> Ident {
    ident(&format!("set_{}", attribute.to_snake_case()))
}

/// Enumeration variant: `NOTDEFINED` -> `Notdefined`, `2D` -> `N2d`
pub fn variant(item: &str) -> Ident {
    let camel = item.to_upper_camel_case();
    if camel.is_empty() || camel.starts_with(|c: char| c.is_ascii_digit()) {
        ident(&format!("N{}", camel))
    } else {
        ident(&camel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accessor_names() {
        assert_eq!(getter("GlobalId").to_string(), "global_id");
        assert_eq!(getter("RefLatitude").to_string(), "ref_latitude");
        assert_eq!(setter("OwnerHistory").to_string(), "set_owner_history");
        assert_eq!(getter("XDim").to_string(), "x_dim");
    }

    #[test]
    fn test_keywords_become_raw() {
        assert_eq!(getter("Type").to_string(), "r#type");
        assert_eq!(ident("self").to_string(), "self_");
        assert_eq!(getter("Name").to_string(), "name");
    }

    #[test]
    fn test_variants() {
        assert_eq!(variant("NOTDEFINED").to_string(), "Notdefined");
        assert_eq!(variant("USERDEFINED").to_string(), "Userdefined");
        assert_eq!(variant("2D").to_string(), "N2d");
        assert_eq!(variant("SELF").to_string(), "Self_");
    }
}

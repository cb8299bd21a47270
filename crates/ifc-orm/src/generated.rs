// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity classes generated at build time, one module per schema version

use crate::class::ClassRegistry;

/// IFC4 classes
#[allow(clippy::all, unused_imports, non_camel_case_types, missing_docs)]
pub mod ifc4 {
    include!(concat!(env!("OUT_DIR"), "/ifc4.rs"));
}

/// IFC2X3 classes
#[allow(clippy::all, unused_imports, non_camel_case_types, missing_docs)]
pub mod ifc2x3 {
    include!(concat!(env!("OUT_DIR"), "/ifc2x3.rs"));
}

/// Class registry of a schema version, matched case-insensitively
pub fn registry_for(schema_name: &str) -> Option<&'static ClassRegistry> {
    [&ifc4::REGISTRY, &ifc2x3::REGISTRY]
        .into_iter()
        .find(|registry| registry.schema().eq_ignore_ascii_case(schema_name))
}

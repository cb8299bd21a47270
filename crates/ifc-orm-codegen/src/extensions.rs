// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hand-written behavior spliced into generated classes
//!
//! An extension is a trait path registered under a declaration name. The
//! generator implements it, with an empty body, for that declaration and
//! every subtype. The traits carry default methods only.

use indexmap::IndexMap;

/// Extension traits keyed by declaration name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    traits: IndexMap<String, Vec<String>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Traits shipped with the `ifc-orm` runtime, relative to `runtime`
    pub fn runtime_defaults(runtime: &str) -> Self {
        let path = |name: &str| format!("{}::extensions::{}", runtime, name);
        Self::new()
            .with("IfcObjectDefinition", path("ObjectDefinitionExt"))
            .with("IfcObject", path("ObjectExt"))
            .with("IfcProduct", path("ProductExt"))
            .with("IfcProject", path("ProjectExt"))
            .with("IfcSite", path("SiteExt"))
            .with("IfcBuilding", path("BuildingExt"))
    }

    /// Register `trait_path` for `declaration` and its subtypes
    pub fn with(mut self, declaration: impl Into<String>, trait_path: impl Into<String>) -> Self {
        self.register(declaration, trait_path);
        self
    }

    pub fn register(&mut self, declaration: impl Into<String>, trait_path: impl Into<String>) {
        let paths = self.traits.entry(declaration.into()).or_default();
        let trait_path = trait_path.into();
        if !paths.contains(&trait_path) {
            paths.push(trait_path);
        }
    }

    /// Traits registered directly on `declaration`
    pub fn for_declaration(&self, declaration: &str) -> &[String] {
        self.traits.get(declaration).map_or(&[], Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.traits.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_defaults() {
        let extensions = Extensions::runtime_defaults("crate");
        assert_eq!(
            extensions.for_declaration("IfcProduct"),
            &["crate::extensions::ProductExt".to_string()]
        );
        assert!(extensions.for_declaration("IfcWall").is_empty());
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut extensions = Extensions::new();
        extensions.register("IfcWall", "my::WallExt");
        extensions.register("IfcWall", "my::WallExt");
        assert_eq!(extensions.for_declaration("IfcWall").len(), 1);
    }
}

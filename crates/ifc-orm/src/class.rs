// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static class tables emitted by the generator

/// Attribute slot of a class, inherited attributes first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: &'static str,
    pub optional: bool,
    pub derived: bool,
}

/// Inverse attribute declared directly on a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InverseInfo {
    pub name: &'static str,
    /// Entity holding the forward attribute
    pub entity: &'static str,
    /// Forward attribute on `entity`
    pub attribute: &'static str,
}

/// One generated entity class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityClass {
    pub name: &'static str,
    pub supertype: Option<&'static str>,
    pub is_abstract: bool,
    pub attributes: &'static [AttributeInfo],
    pub inverses: &'static [InverseInfo],
}

impl EntityClass {
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Names of all attributes in positional order
    pub fn attribute_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attributes.iter().map(|a| a.name)
    }
}

/// Classes of one schema version, sorted by name
#[derive(Debug)]
pub struct ClassRegistry {
    schema: &'static str,
    classes: &'static [EntityClass],
}

impl ClassRegistry {
    pub const fn new(schema: &'static str, classes: &'static [EntityClass]) -> Self {
        Self { schema, classes }
    }

    pub fn schema(&self) -> &'static str {
        self.schema
    }

    pub fn classes(&self) -> &'static [EntityClass] {
        self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class by exact name, falling back to a case-insensitive scan
    pub fn class(&self, name: &str) -> Option<&'static EntityClass> {
        let classes = self.classes;
        match classes.binary_search_by(|c| c.name.cmp(name)) {
            Ok(index) => Some(&classes[index]),
            Err(_) => classes.iter().find(|c| c.name.eq_ignore_ascii_case(name)),
        }
    }

    /// `name` followed by its supertypes up to the root
    pub fn inheritance(&self, name: &str) -> Vec<&'static str> {
        let mut chain = Vec::new();
        let mut current = self.class(name);
        while let Some(class) = current {
            chain.push(class.name);
            current = class.supertype.and_then(|s| self.class(s));
        }
        chain
    }

    pub fn is_subclass(&self, name: &str, ancestor: &str) -> bool {
        self.inheritance(name)
            .iter()
            .any(|c| c.eq_ignore_ascii_case(ancestor))
    }
}

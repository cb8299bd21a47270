// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Schema declarations and type descriptors

use std::fmt;

/// EXPRESS simple (primitive) types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimpleType {
    String,
    Real,
    Number,
    Integer,
    Boolean,
    Logical,
    Binary,
}

impl SimpleType {
    /// Parse an upper-case EXPRESS keyword
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word.to_ascii_uppercase().as_str() {
            "STRING" => SimpleType::String,
            "REAL" => SimpleType::Real,
            "NUMBER" => SimpleType::Number,
            "INTEGER" => SimpleType::Integer,
            "BOOLEAN" => SimpleType::Boolean,
            "LOGICAL" => SimpleType::Logical,
            "BINARY" => SimpleType::Binary,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SimpleType::String => "STRING",
            SimpleType::Real => "REAL",
            SimpleType::Number => "NUMBER",
            SimpleType::Integer => "INTEGER",
            SimpleType::Boolean => "BOOLEAN",
            SimpleType::Logical => "LOGICAL",
            SimpleType::Binary => "BINARY",
        }
    }
}

/// Aggregation flavours; all of them are ordered sequences at runtime
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregationKind {
    List,
    Set,
    Array,
    Bag,
}

impl AggregationKind {
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word.to_ascii_uppercase().as_str() {
            "LIST" => AggregationKind::List,
            "SET" => AggregationKind::Set,
            "ARRAY" => AggregationKind::Array,
            "BAG" => AggregationKind::Bag,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            AggregationKind::List => "LIST",
            AggregationKind::Set => "SET",
            AggregationKind::Array => "ARRAY",
            AggregationKind::Bag => "BAG",
        }
    }
}

/// Element-count bounds of an aggregation, `[lower:upper]` with `?` as `None`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub lower: u32,
    pub upper: Option<u32>,
}

impl Bounds {
    /// Whether `len` elements satisfy these bounds
    pub fn contains(&self, len: usize) -> bool {
        len >= self.lower as usize && self.upper.map_or(true, |upper| len <= upper as usize)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper {
            Some(upper) => write!(f, "[{}:{}]", self.lower, upper),
            None => write!(f, "[{}:?]", self.lower),
        }
    }
}

/// Type of an attribute or of a type declaration
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// Built-in primitive
    Simple(SimpleType),
    /// Aggregation of a nested descriptor (nested aggregations model matrices)
    Aggregation {
        kind: AggregationKind,
        bounds: Option<Bounds>,
        unique: bool,
        element: Box<TypeDescriptor>,
    },
    /// Reference to another declaration by name
    Named(String),
}

impl TypeDescriptor {
    /// `as_aggregation_type`: element descriptor and bounds when this is an aggregation
    pub fn as_aggregation(&self) -> Option<(&TypeDescriptor, Option<Bounds>)> {
        match self {
            TypeDescriptor::Aggregation {
                element, bounds, ..
            } => Some((element, *bounds)),
            _ => None,
        }
    }

    /// `as_simple_type`
    pub fn as_simple(&self) -> Option<SimpleType> {
        match self {
            TypeDescriptor::Simple(simple) => Some(*simple),
            _ => None,
        }
    }

    /// `declared_type`: name of the referenced declaration
    pub fn declared_type(&self) -> Option<&str> {
        match self {
            TypeDescriptor::Named(name) => Some(name),
            _ => None,
        }
    }

    /// Nesting depth of aggregations, 0 for non-aggregates
    pub fn depth(&self) -> usize {
        match self {
            TypeDescriptor::Aggregation { element, .. } => 1 + element.depth(),
            _ => 0,
        }
    }
}

/// Renders EXPRESS syntax, e.g. `LIST [2:?] OF IfcCartesianPoint`
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Simple(simple) => f.write_str(simple.keyword()),
            TypeDescriptor::Aggregation {
                kind,
                bounds,
                unique,
                element,
            } => {
                f.write_str(kind.keyword())?;
                if let Some(bounds) = bounds {
                    write!(f, " {}", bounds)?;
                }
                f.write_str(" OF ")?;
                if *unique {
                    f.write_str("UNIQUE ")?;
                }
                write!(f, "{}", element)
            }
            TypeDescriptor::Named(name) => f.write_str(name),
        }
    }
}

/// Explicit attribute of an entity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub ty: TypeDescriptor,
    pub optional: bool,
    /// Computed by the engine, written as `*` in files
    pub derived: bool,
}

/// Inverse attribute: all records of `entity` whose `attribute` points back here
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InverseAttribute {
    pub name: String,
    pub entity: String,
    pub attribute: String,
    /// `SET`/`BAG` bounds, `None` for a single-valued inverse
    pub bounds: Option<Bounds>,
}

/// An entity declaration
///
/// `attributes` and `inverse` are the direct declarations. The `all_*`
/// views are filled in when the schema is linked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityDeclaration {
    pub name: String,
    pub supertype: Option<String>,
    pub is_abstract: bool,
    pub attributes: Vec<Attribute>,
    pub inverse: Vec<InverseAttribute>,
    /// Inherited attributes redeclared in a `DERIVE` clause (`SELF\Super.Name`)
    pub derived_overrides: Vec<String>,
    pub(crate) all_attributes: Vec<Attribute>,
    pub(crate) all_inverse: Vec<InverseAttribute>,
}

impl EntityDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertype: None,
            is_abstract: false,
            attributes: Vec::new(),
            inverse: Vec::new(),
            derived_overrides: Vec::new(),
            all_attributes: Vec::new(),
            all_inverse: Vec::new(),
        }
    }

    /// Attributes in positional order, inherited first
    pub fn all_attributes(&self) -> &[Attribute] {
        &self.all_attributes
    }

    /// Parallel to [`all_attributes`](Self::all_attributes): which positions are derived
    pub fn derived(&self) -> Vec<bool> {
        self.all_attributes.iter().map(|a| a.derived).collect()
    }

    /// Inverse attributes including inherited ones, each listed once
    pub fn all_inverse_attributes(&self) -> &[InverseAttribute] {
        &self.all_inverse
    }

    /// Inverse attributes first declared on this entity
    pub fn own_inverse_attributes(&self) -> &[InverseAttribute] {
        &self.inverse
    }

    /// Positional index of an attribute by exact name
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.all_attributes.iter().position(|a| a.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.all_attributes.iter().find(|a| a.name == name)
    }

    pub fn inverse_attribute(&self, name: &str) -> Option<&InverseAttribute> {
        self.all_inverse.iter().find(|a| a.name == name)
    }
}

/// `TYPE X = <descriptor>;`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDeclaration {
    pub name: String,
    pub underlying: TypeDescriptor,
}

/// `TYPE X = ENUMERATION OF (...);`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumerationType {
    pub name: String,
    /// Items in upper case, as written in files
    pub items: Vec<String>,
}

impl EnumerationType {
    pub fn contains(&self, item: &str) -> bool {
        self.items.iter().any(|i| i.eq_ignore_ascii_case(item))
    }
}

/// `TYPE X = SELECT (...);`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectType {
    pub name: String,
    /// Direct members, possibly other selects
    pub members: Vec<String>,
}

/// What kind of declaration a name refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Entity,
    Type,
    Enumeration,
    Select,
}

/// Any named declaration of a schema
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Declaration {
    Entity(EntityDeclaration),
    Type(TypeDeclaration),
    Enumeration(EnumerationType),
    Select(SelectType),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Entity(d) => &d.name,
            Declaration::Type(d) => &d.name,
            Declaration::Enumeration(d) => &d.name,
            Declaration::Select(d) => &d.name,
        }
    }

    pub fn kind(&self) -> DeclarationKind {
        match self {
            Declaration::Entity(_) => DeclarationKind::Entity,
            Declaration::Type(_) => DeclarationKind::Type,
            Declaration::Enumeration(_) => DeclarationKind::Enumeration,
            Declaration::Select(_) => DeclarationKind::Select,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityDeclaration> {
        match self {
            Declaration::Entity(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeDeclaration> {
        match self {
            Declaration::Type(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_enumeration(&self) -> Option<&EnumerationType> {
        match self {
            Declaration::Enumeration(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<&SelectType> {
        match self {
            Declaration::Select(d) => Some(d),
            _ => None,
        }
    }

    /// Supertype name for entities
    pub fn supertype(&self) -> Option<&str> {
        self.as_entity().and_then(|e| e.supertype.as_deref())
    }

    /// All attributes for entities, empty otherwise
    pub fn all_attributes(&self) -> &[Attribute] {
        self.as_entity().map(|e| e.all_attributes()).unwrap_or(&[])
    }

    /// All inverse attributes for entities, empty otherwise
    pub fn all_inverse_attributes(&self) -> &[InverseAttribute] {
        self.as_entity()
            .map(|e| e.all_inverse_attributes())
            .unwrap_or(&[])
    }
}

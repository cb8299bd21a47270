// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for raw record representation
//!
//! Raw records are what the engine hands out before any wrapping happens: an
//! id, the concrete type name in schema casing, and positional attribute values.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

/// Type-safe entity identifier
///
/// Wraps the raw STEP instance name (e.g., #123 becomes EntityId(123)).
/// `EntityId(0)` marks a transient record that has not been written yet.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Default)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Id carried by records that are not yet part of a file
    pub const TRANSIENT: EntityId = EntityId(0);

    /// Whether this id denotes a transient record
    pub fn is_transient(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        EntityId(id)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Decoded attribute value
///
/// Represents any value that can appear in an entity's attribute list.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum AttributeValue {
    /// Null value ($)
    #[default]
    Null,
    /// Derived value (*)
    Derived,
    /// Entity reference (#123)
    EntityRef(EntityId),
    /// Boolean value (.T. / .F.)
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value, already unescaped
    String(String),
    /// Enumeration value (.VALUE.)
    Enum(String),
    /// Binary value as hex digits ("0FF")
    Binary(String),
    /// List of values
    List(Vec<AttributeValue>),
    /// Typed value like IFCLABEL('text'), type name in upper case
    TypedValue(String, Vec<AttributeValue>),
}

impl AttributeValue {
    /// Try to get as entity reference
    pub fn as_entity_ref(&self) -> Option<EntityId> {
        match self {
            AttributeValue::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            AttributeValue::TypedValue(_, args) if !args.is_empty() => args[0].as_string(),
            _ => None,
        }
    }

    /// Try to get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(f) => Some(*f),
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::TypedValue(_, args) if !args.is_empty() => args[0].as_float(),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            AttributeValue::TypedValue(_, args) if !args.is_empty() => args[0].as_integer(),
            _ => None,
        }
    }

    /// Try to get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            AttributeValue::Enum(s) => match s.as_str() {
                "T" | "TRUE" => Some(true),
                "F" | "FALSE" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Try to get as enum string
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            AttributeValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as list
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            AttributeValue::List(list) => Some(list),
            _ => None,
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Check if this is a derived value
    pub fn is_derived(&self) -> bool {
        matches!(self, AttributeValue::Derived)
    }

    /// Short name of the value kind, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Derived => "derived",
            AttributeValue::EntityRef(_) => "reference",
            AttributeValue::Bool(_) => "boolean",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Float(_) => "real",
            AttributeValue::String(_) => "string",
            AttributeValue::Enum(_) => "enumeration",
            AttributeValue::Binary(_) => "binary",
            AttributeValue::List(_) => "aggregate",
            AttributeValue::TypedValue(_, _) => "typed value",
        }
    }

    /// Collect every entity reference contained in this value, depth-first
    pub fn collect_refs(&self, out: &mut Vec<EntityId>) {
        match self {
            AttributeValue::EntityRef(id) => out.push(*id),
            AttributeValue::List(items) | AttributeValue::TypedValue(_, items) => {
                for item in items {
                    item.collect_refs(out);
                }
            }
            _ => {}
        }
    }
}

/// Renders the value in STEP physical file syntax
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => f.write_char('$'),
            AttributeValue::Derived => f.write_char('*'),
            AttributeValue::EntityRef(id) => write!(f, "{}", id),
            AttributeValue::Bool(true) => f.write_str(".T."),
            AttributeValue::Bool(false) => f.write_str(".F."),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Float(v) => f.write_str(&format_real(*v)),
            AttributeValue::String(s) => {
                f.write_char('\'')?;
                f.write_str(&escape_step_string(s))?;
                f.write_char('\'')
            }
            AttributeValue::Enum(s) => write!(f, ".{}.", s),
            AttributeValue::Binary(hex) => write!(f, "\"{}\"", hex),
            AttributeValue::List(items) => {
                f.write_char('(')?;
                write_joined(f, items)?;
                f.write_char(')')
            }
            AttributeValue::TypedValue(name, args) => {
                f.write_str(name)?;
                f.write_char('(')?;
                write_joined(f, args)?;
                f.write_char(')')
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[AttributeValue]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_char(',')?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Format a REAL so that it always carries a decimal point
///
/// `3.0` becomes `3.`, `1e300` becomes `1.E300`.
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0.".to_string();
    }
    let text = format!("{:?}", value);
    let (mantissa, exponent) = match text.split_once('e') {
        Some((m, e)) => (m.to_string(), Some(e.to_string())),
        None => (text, None),
    };
    let mut mantissa = match mantissa.strip_suffix(".0") {
        Some(stripped) => format!("{}.", stripped),
        None => mantissa,
    };
    if !mantissa.contains('.') {
        mantissa.push('.');
    }
    match exponent {
        Some(e) => format!("{}E{}", mantissa, e),
        None => mantissa,
    }
}

/// Escape a string for a STEP file
///
/// Quotes and backslashes are doubled, non-ASCII characters go through the
/// `\X2\` (BMP) or `\X4\` (supplementary planes) encodings.
pub fn escape_step_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            ' '..='~' => out.push(c),
            _ => {
                let wide = (c as u32) > 0xFFFF;
                out.push_str(if wide { "\\X4\\" } else { "\\X2\\" });
                push_hex(&mut out, c, wide);
                while let Some(&next) = chars.peek() {
                    if (' '..='~').contains(&next) || ((next as u32) > 0xFFFF) != wide {
                        break;
                    }
                    push_hex(&mut out, next, wide);
                    chars.next();
                }
                out.push_str("\\X0\\");
            }
        }
    }
    out
}

fn push_hex(out: &mut String, c: char, wide: bool) {
    if wide {
        let _ = write!(out, "{:08X}", c as u32);
    } else {
        let _ = write!(out, "{:04X}", c as u32);
    }
}

/// Decoded raw record
///
/// Represents a fully decoded STEP instance with its id, concrete type name
/// (in schema casing once linked to a schema) and attribute values.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedEntity {
    /// Entity ID
    pub id: EntityId,
    /// Concrete type name
    pub type_name: String,
    /// Attribute values in order
    pub attributes: Vec<AttributeValue>,
}

impl DecodedEntity {
    /// Create a record
    pub fn new(id: EntityId, type_name: impl Into<String>, attributes: Vec<AttributeValue>) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            attributes,
        }
    }

    /// Whether the concrete type matches, ignoring ASCII case
    pub fn is_type(&self, type_name: &str) -> bool {
        self.type_name.eq_ignore_ascii_case(type_name)
    }

    /// Get attribute at index
    pub fn get(&self, index: usize) -> Option<&AttributeValue> {
        self.attributes.get(index)
    }

    /// Get entity reference at index
    pub fn get_ref(&self, index: usize) -> Option<EntityId> {
        self.get(index).and_then(|v| v.as_entity_ref())
    }

    /// Get string at index
    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_string())
    }

    /// Get float at index
    pub fn get_float(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|v| v.as_float())
    }

    /// Get integer at index
    pub fn get_integer(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(|v| v.as_integer())
    }

    /// Get list at index
    pub fn get_list(&self, index: usize) -> Option<&[AttributeValue]> {
        self.get(index).and_then(|v| v.as_list())
    }

    /// Get enum string at index
    pub fn get_enum(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_enum())
    }

    /// Get list of entity references at index
    pub fn get_refs(&self, index: usize) -> Option<Vec<EntityId>> {
        self.get_list(index)
            .map(|list| list.iter().filter_map(|v| v.as_entity_ref()).collect())
    }

    /// Render as a DATA section line, `#12=IFCWALL(...);`
    pub fn to_step_line(&self) -> String {
        let mut line = format!("{}={}(", self.id, self.type_name.to_uppercase());
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            let _ = write!(line, "{}", attr);
        }
        line.push_str(");");
        line
    }
}

/// GPU-ready mesh data
///
/// Contains flattened vertex data suitable for rendering or export.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    /// Vertex positions as flattened [x, y, z, x, y, z, ...]
    pub positions: Vec<f32>,
    /// Vertex normals as flattened [nx, ny, nz, nx, ny, nz, ...]
    pub normals: Vec<f32>,
    /// Triangle indices
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if mesh is empty
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Get vertex count
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Get triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex at index as [x, y, z]
    pub fn vertex(&self, index: usize) -> Option<[f32; 3]> {
        let base = index * 3;
        self.positions
            .get(base..base + 3)
            .map(|p| [p[0], p[1], p[2]])
    }

    /// Merge another mesh into this one
    pub fn merge(&mut self, other: &MeshData) {
        let vertex_offset = self.vertex_count() as u32;

        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices
            .extend(other.indices.iter().map(|i| i + vertex_offset));
    }
}

/// Model metadata extracted from the STEP header
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Schema version as written in FILE_SCHEMA (e.g., "IFC2X3", "IFC4")
    pub schema_version: String,
    /// File description entries
    pub description: Vec<String>,
    /// Implementation level from FILE_DESCRIPTION
    pub implementation_level: Option<String>,
    /// File name from header
    pub file_name: Option<String>,
    /// Timestamp
    pub timestamp: Option<String>,
    /// Author
    pub author: Option<String>,
    /// Organization
    pub organization: Option<String>,
    /// Preprocessor version
    pub preprocessor_version: Option<String>,
    /// Originating system (CAD application)
    pub originating_system: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(3.0), "3.");
        assert_eq!(format_real(-0.5), "-0.5");
        assert_eq!(format_real(1e300), "1.E300");
        assert_eq!(format_real(1.5e-7), "1.5E-7");
    }

    #[test]
    fn test_escape_step_string() {
        assert_eq!(escape_step_string("it's"), "it''s");
        assert_eq!(escape_step_string("a\\b"), "a\\\\b");
        assert_eq!(escape_step_string("Wand ü"), "Wand \\X2\\00FC\\X0\\");
    }

    #[test]
    fn test_display_nested_values() {
        let value = AttributeValue::List(vec![
            AttributeValue::EntityRef(EntityId(7)),
            AttributeValue::TypedValue(
                "IFCLABEL".to_string(),
                vec![AttributeValue::String("x".to_string())],
            ),
            AttributeValue::Null,
            AttributeValue::Bool(true),
        ]);
        assert_eq!(value.to_string(), "(#7,IFCLABEL('x'),$,.T.)");
    }

    #[test]
    fn test_to_step_line() {
        let record = DecodedEntity::new(
            EntityId(3),
            "IfcSIUnit",
            vec![
                AttributeValue::Derived,
                AttributeValue::Enum("LENGTHUNIT".to_string()),
                AttributeValue::Enum("MILLI".to_string()),
                AttributeValue::Enum("METRE".to_string()),
            ],
        );
        assert_eq!(
            record.to_step_line(),
            "#3=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);"
        );
    }

    #[test]
    fn test_collect_refs() {
        let value = AttributeValue::List(vec![
            AttributeValue::EntityRef(EntityId(1)),
            AttributeValue::List(vec![AttributeValue::EntityRef(EntityId(2))]),
        ]);
        let mut refs = Vec::new();
        value.collect_refs(&mut refs);
        assert_eq!(refs, vec![EntityId(1), EntityId(2)]);
    }

    #[test]
    fn test_mesh_merge() {
        let mut a = MeshData {
            positions: vec![0.0; 9],
            normals: vec![],
            indices: vec![0, 1, 2],
        };
        let b = a.clone();
        a.merge(&b);
        assert_eq!(a.vertex_count(), 6);
        assert_eq!(a.indices, vec![0, 1, 2, 3, 4, 5]);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Type resolution and the skip-list
//!
//! Every attribute type descriptor resolves to a [`RustType`] or to the
//! name that could not be resolved. Declarations with an unresolvable
//! reference are skipped, and so is everything that depends on a skipped
//! declaration, until nothing changes.

use crate::names::type_ident;
use ifc_orm_model::Error;
use ifc_orm_schema::{Declaration, Schema, SimpleType, TypeDescriptor};
use proc_macro2::TokenStream;
use quote::quote;
use std::collections::{BTreeMap, BTreeSet};

/// Rust-side shape of an attribute type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RustType {
    String,
    Real,
    Integer,
    Boolean,
    Logical,
    Binary,
    /// Generated wrapper for a declaration
    Named(String),
    /// Aggregation of any kind, nested for matrices
    List(Box<RustType>),
}

impl RustType {
    /// Resolve a descriptor; `Err` carries the unresolvable name
    pub fn resolve(schema: &Schema, ty: &TypeDescriptor) -> Result<Self, String> {
        Ok(match ty {
            TypeDescriptor::Simple(simple) => match simple {
                SimpleType::String => Self::String,
                SimpleType::Real | SimpleType::Number => Self::Real,
                SimpleType::Integer => Self::Integer,
                SimpleType::Boolean => Self::Boolean,
                SimpleType::Logical => Self::Logical,
                SimpleType::Binary => Self::Binary,
            },
            TypeDescriptor::Aggregation { element, .. } => {
                Self::List(Box::new(Self::resolve(schema, element)?))
            }
            TypeDescriptor::Named(name) => match schema.get(name) {
                Some(declaration) => Self::Named(declaration.name().to_string()),
                None => return Err(name.clone()),
            },
        })
    }

    /// Type tokens; `runtime` is the path of the `ifc-orm` runtime crate
    pub fn tokens(&self, runtime: &TokenStream) -> TokenStream {
        match self {
            Self::String => quote!(String),
            Self::Real => quote!(f64),
            Self::Integer => quote!(i64),
            Self::Boolean => quote!(bool),
            Self::Logical => quote!(#runtime::value::Logical),
            Self::Binary => quote!(#runtime::value::Binary),
            Self::Named(name) => {
                let ident = type_ident(name);
                quote!(#ident)
            }
            Self::List(element) => {
                let element = element.tokens(runtime);
                quote!(Vec<#element>)
            }
        }
    }

    /// Declaration referenced at the innermost level
    pub fn named(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::List(element) => element.named(),
            _ => None,
        }
    }
}

/// Names a declaration depends on, paired with the attribute that needs them
fn dependencies<'s>(
    schema: &'s Schema,
    declaration: &'s Declaration,
) -> Result<Vec<(&'s str, Option<&'s str>)>, Error> {
    let name = declaration.name();
    let resolve = |ty: &TypeDescriptor, attribute: Option<&str>| {
        RustType::resolve(schema, ty).map_err(|missing| {
            Error::generation(name, attribute, format!("unresolvable type '{}'", missing))
        })
    };

    let mut out: Vec<(&str, Option<&str>)> = Vec::new();
    match declaration {
        Declaration::Entity(entity) => {
            if let Some(supertype) = &entity.supertype {
                out.push((supertype.as_str(), None));
            }
            for attribute in &entity.attributes {
                let resolved = resolve(&attribute.ty, Some(&attribute.name))?;
                if resolved.named().is_some() {
                    if let Some(target) = attribute.ty.declared_type() {
                        out.push((target, Some(attribute.name.as_str())));
                    }
                }
            }
            for inverse in &entity.inverse {
                match schema.get(&inverse.entity) {
                    Some(Declaration::Entity(_)) => {
                        out.push((inverse.entity.as_str(), Some(inverse.name.as_str())))
                    }
                    _ => {
                        return Err(Error::generation(
                            name,
                            Some(&inverse.name),
                            format!("inverse of unknown entity '{}'", inverse.entity),
                        ))
                    }
                }
            }
        }
        Declaration::Type(alias) => {
            let resolved = resolve(&alias.underlying, None)?;
            if resolved.named().is_some() {
                if let Some(target) = alias.underlying.declared_type() {
                    out.push((target, None));
                }
            }
        }
        Declaration::Select(_) => {
            let members = schema
                .flatten_select(name)
                .map_err(|e| Error::generation(name, None, e.to_string()))?;
            out.extend(members.into_iter().map(|m| (m, None)));
        }
        Declaration::Enumeration(_) => {}
    }
    Ok(out)
}

/// Declarations that cannot be generated, with the reason, sorted by name
pub fn skip_list(schema: &Schema) -> BTreeMap<String, Error> {
    let mut skipped: BTreeMap<String, Error> = BTreeMap::new();
    let mut edges: BTreeMap<&str, Vec<(&str, Option<&str>)>> = BTreeMap::new();

    for declaration in schema.declarations() {
        match dependencies(schema, declaration) {
            Ok(deps) => {
                edges.insert(declaration.name(), deps);
            }
            Err(e) => {
                skipped.insert(declaration.name().to_string(), e);
            }
        }
    }

    loop {
        let newly: BTreeSet<(&str, &str, Option<&str>)> = edges
            .iter()
            .filter(|(name, _)| !skipped.contains_key(**name))
            .filter_map(|(name, deps)| {
                deps.iter()
                    .find(|(dep, _)| skipped.contains_key(*dep))
                    .map(|(dep, attribute)| (*name, *dep, *attribute))
            })
            .collect();
        if newly.is_empty() {
            break;
        }
        for (name, dep, attribute) in newly {
            skipped.insert(
                name.to_string(),
                Error::generation(
                    name,
                    attribute,
                    format!("depends on skipped declaration '{}'", dep),
                ),
            );
        }
    }
    skipped
}

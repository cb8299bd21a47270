// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Token emission for one schema version

use crate::extensions::Extensions;
use crate::names::{getter, setter, type_ident, variant};
use crate::resolve::{skip_list, RustType};
use ifc_orm_model::{Error, Result};
use ifc_orm_schema::{
    Attribute, Declaration, EntityDeclaration, EnumerationType, Schema, TypeDeclaration,
};
use proc_macro2::TokenStream;
use quote::quote;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Runtime path used when generating outside the runtime crate
pub const DEFAULT_RUNTIME: &str = "::ifc_orm";

/// Output of one generation run
#[derive(Debug)]
pub struct GeneratedSchema {
    /// Schema version name
    pub schema: String,
    /// Rust source text, suitable for `include!`
    pub source: String,
    /// Declarations left out, with the reason
    pub skipped: Vec<(String, Error)>,
    /// Number of entity classes emitted
    pub entity_count: usize,
}

impl GeneratedSchema {
    /// Write the source to `path` unless it already holds the same text
    ///
    /// Returns whether the file was written.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if let Ok(existing) = fs::read_to_string(path) {
            if existing == self.source {
                log::debug!("{} is up to date", path.display());
                return Ok(false);
            }
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &self.source)?;
        Ok(true)
    }
}

/// Generates Rust classes for a linked schema
pub struct Generator<'s> {
    schema: &'s Schema,
    extensions: Extensions,
    runtime: String,
}

impl<'s> Generator<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            extensions: Extensions::runtime_defaults(DEFAULT_RUNTIME),
            runtime: DEFAULT_RUNTIME.to_string(),
        }
    }

    /// Path of the runtime crate in generated code, `crate` inside it
    pub fn with_runtime_path(mut self, path: impl Into<String>) -> Self {
        self.runtime = path.into();
        self
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// Generate source for every declaration that resolves
    pub fn generate(&self) -> Result<GeneratedSchema> {
        let runtime: TokenStream = self
            .runtime
            .parse()
            .map_err(|_| Error::other(format!("invalid runtime path '{}'", self.runtime)))?;

        let skipped = skip_list(self.schema);
        for error in skipped.values() {
            log::warn!("{}", error);
        }

        let mut names: Vec<&str> = self
            .schema
            .declarations()
            .map(Declaration::name)
            .filter(|name| !skipped.contains_key(*name))
            .collect();
        names.sort_unstable();

        let mut entities: Vec<&EntityDeclaration> = Vec::new();
        let mut items = TokenStream::new();
        for name in &names {
            match self.schema.declaration(name)? {
                Declaration::Entity(entity) => {
                    items.extend(self.entity(entity, &runtime)?);
                    entities.push(entity);
                }
                Declaration::Type(alias) => items.extend(self.alias(alias, &runtime)?),
                Declaration::Enumeration(enumeration) => {
                    items.extend(self.enumeration(enumeration, &runtime))
                }
                Declaration::Select(_) => items.extend(self.select(name, &runtime)?),
            }
        }
        items.extend(self.classes(&entities, &runtime)?);
        items.extend(self.dispatch(&entities, &runtime));
        items.extend(self.extension_impls(&names)?);

        let schema_name = self.schema.name();
        let tokens = quote! {
            use #runtime::entity::{AsEntity, Entity, EntityType};
            use #runtime::value::{FromValue, IntoValue, Value};
            use #runtime::{Error, Result};

            /// Schema version these classes were generated from
            pub const SCHEMA: &str = #schema_name;

            #items
        };

        log::info!(
            "generated {} declarations for {} ({} skipped)",
            names.len(),
            schema_name,
            skipped.len()
        );
        Ok(GeneratedSchema {
            schema: schema_name.to_string(),
            source: format!(
                "// Generated by ifc-orm-codegen from schema {}. Do not edit.\n{}\n",
                schema_name, tokens
            ),
            skipped: skipped.into_iter().collect(),
            entity_count: entities.len(),
        })
    }

    fn rust_type(&self, declaration: &str, attribute: &Attribute) -> Result<RustType> {
        RustType::resolve(self.schema, &attribute.ty).map_err(|missing| {
            Error::generation(
                declaration,
                Some(&attribute.name),
                format!("unresolvable type '{}'", missing),
            )
        })
    }

    fn entity(&self, entity: &EntityDeclaration, runtime: &TokenStream) -> Result<TokenStream> {
        let ident = type_ident(&entity.name);
        let type_name = entity.name.as_str();

        let (inner, as_entity, from_entity) = match &entity.supertype {
            Some(supertype) => {
                let parent = type_ident(supertype);
                (
                    quote!(#parent),
                    quote!(AsEntity::as_entity(&self.0)),
                    quote!(Self(<#parent as EntityType>::from_entity_unchecked(entity))),
                )
            }
            None => (quote!(Entity), quote!(&self.0), quote!(Self(entity))),
        };

        let doc = match &entity.supertype {
            Some(supertype) => format!(
                "`{}`{}, subtype of [`{}`]",
                type_name,
                if entity.is_abstract { " (abstract)" } else { "" },
                supertype
            ),
            None => format!("`{}`, a root entity", type_name),
        };

        let mut methods = TokenStream::new();
        for attribute in &entity.attributes {
            methods.extend(self.accessors(type_name, attribute, runtime)?);
        }
        for redeclared in &entity.derived_overrides {
            let Some(attribute) = entity.attribute(redeclared) else {
                continue;
            };
            methods.extend(self.derived_accessors(type_name, attribute, runtime)?);
        }
        for inverse in entity.own_inverse_attributes() {
            let method = getter(&inverse.name);
            let target = type_ident(&inverse.entity);
            let name = inverse.name.as_str();
            let doc = format!(
                "`{}`: every `{}` whose `{}` refers to this entity",
                name, inverse.entity, inverse.attribute
            );
            methods.extend(quote! {
                #[doc = #doc]
                pub fn #method(&self) -> Result<Vec<#target>> {
                    AsEntity::as_entity(self).inverse_typed::<#target>(#name)
                }
            });
        }

        Ok(quote! {
            #[doc = #doc]
            #[derive(Clone, PartialEq, Eq, Hash)]
            pub struct #ident(#inner);

            impl std::ops::Deref for #ident {
                type Target = #inner;

                fn deref(&self) -> &#inner {
                    &self.0
                }
            }

            impl std::fmt::Debug for #ident {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    std::fmt::Debug::fmt(AsEntity::as_entity(self), f)
                }
            }

            impl AsEntity for #ident {
                fn as_entity(&self) -> &Entity {
                    #as_entity
                }
            }

            impl EntityType for #ident {
                const TYPE_NAME: &'static str = #type_name;

                fn from_entity_unchecked(entity: Entity) -> Self {
                    #from_entity
                }
            }

            impl FromValue for #ident {
                fn from_value(value: Value) -> Result<Self> {
                    #runtime::value::entity_from_value(value)
                }
            }

            impl IntoValue for #ident {
                fn into_value(self) -> Value {
                    Value::Entity(AsEntity::as_entity(&self).clone())
                }
            }

            impl From<#ident> for Entity {
                fn from(value: #ident) -> Entity {
                    AsEntity::as_entity(&value).clone()
                }
            }

            impl #ident {
                #methods
            }
        })
    }

    fn accessors(
        &self,
        declaration: &str,
        attribute: &Attribute,
        runtime: &TokenStream,
    ) -> Result<TokenStream> {
        let ty = self.rust_type(declaration, attribute)?.tokens(runtime);
        let ty = if attribute.optional {
            quote!(Option<#ty>)
        } else {
            ty
        };
        let get = getter(&attribute.name);
        let set = setter(&attribute.name);
        let name = attribute.name.as_str();
        let doc = format!(
            "`{}`: {}{}",
            name,
            attribute.ty,
            if attribute.optional { ", optional" } else { "" }
        );
        Ok(quote! {
            #[doc = #doc]
            pub fn #get(&self) -> Result<#ty> {
                AsEntity::as_entity(self).get_typed(#name)
            }

            #[doc = #doc]
            pub fn #set(&self, value: #ty) -> Result<()> {
                AsEntity::as_entity(self).set_typed(#name, value)
            }
        })
    }

    /// Accessors for an inherited attribute this entity derives
    fn derived_accessors(
        &self,
        declaration: &str,
        attribute: &Attribute,
        runtime: &TokenStream,
    ) -> Result<TokenStream> {
        let ty = self.rust_type(declaration, attribute)?.tokens(runtime);
        let get = getter(&attribute.name);
        let set = setter(&attribute.name);
        let name = attribute.name.as_str();
        let get_doc = format!("`{}`: derived here, reads as `None` when not stored", name);
        let set_doc = format!(
            "`{}` is derived on `{}`; the write is accepted and ignored",
            name, declaration
        );
        Ok(quote! {
            #[doc = #get_doc]
            pub fn #get(&self) -> Result<Option<#ty>> {
                AsEntity::as_entity(self).get_typed(#name)
            }

            #[doc = #set_doc]
            pub fn #set(&self, _value: Option<#ty>) -> Result<()> {
                Ok(())
            }
        })
    }

    fn alias(&self, alias: &TypeDeclaration, runtime: &TokenStream) -> Result<TokenStream> {
        let ident = type_ident(&alias.name);
        let ty = RustType::resolve(self.schema, &alias.underlying)
            .map_err(|missing| {
                Error::generation(&alias.name, None, format!("unresolvable type '{}'", missing))
            })?
            .tokens(runtime);
        let doc = format!("`{}` = {}", alias.name, alias.underlying);
        Ok(quote! {
            #[doc = #doc]
            pub type #ident = #ty;
        })
    }

    fn enumeration(&self, enumeration: &EnumerationType, runtime: &TokenStream) -> TokenStream {
        let ident = type_ident(&enumeration.name);
        let name = enumeration.name.as_str();

        let mut used = BTreeSet::new();
        let variants: Vec<_> = enumeration
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let mut v = variant(item);
                if !used.insert(v.to_string()) {
                    v = variant(&format!("{}_{}", item, i));
                }
                v
            })
            .collect();
        let items: Vec<&str> = enumeration.items.iter().map(String::as_str).collect();

        quote! {
            #[doc = concat!("Enumeration `", #name, "`")]
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            pub enum #ident {
                #( #[doc = #items] #variants, )*
            }

            impl #ident {
                /// Items in schema order, as written in files
                pub const ITEMS: &'static [&'static str] = &[#(#items),*];

                pub fn as_str(&self) -> &'static str {
                    match self {
                        #( Self::#variants => #items, )*
                    }
                }
            }

            impl std::str::FromStr for #ident {
                type Err = Error;

                fn from_str(s: &str) -> Result<Self> {
                    match s.trim_matches('.').to_ascii_uppercase().as_str() {
                        #( #items => Ok(Self::#variants), )*
                        _ => Err(Error::invalid_value(#name, s, "not an item of the enumeration")),
                    }
                }
            }

            impl std::fmt::Display for #ident {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromValue for #ident {
                fn from_value(value: Value) -> Result<Self> {
                    match value.untyped() {
                        Value::Enum(item) => item.parse(),
                        other => Err(#runtime::value::mismatch(#name, &other)),
                    }
                }
            }

            impl IntoValue for #ident {
                fn into_value(self) -> Value {
                    Value::Enum(self.as_str().to_string())
                }
            }
        }
    }

    fn select(&self, name: &str, runtime: &TokenStream) -> Result<TokenStream> {
        let ident = type_ident(name);
        let members = self
            .schema
            .flatten_select(name)
            .map_err(|e| Error::generation(name, None, e.to_string()))?;

        let mut variants = Vec::new();
        let mut typed = (Vec::new(), Vec::new(), Vec::new());
        let mut entities = (Vec::new(), Vec::new(), Vec::new());
        let mut enums = (Vec::new(), Vec::new());
        let mut into = Vec::new();
        let mut from_impls = TokenStream::new();

        for member in &members {
            let member_ident = type_ident(member);
            let member_name = *member;
            variants.push(quote!(#member_ident(#member_ident)));
            match self.schema.declaration(member)? {
                Declaration::Type(_) => {
                    typed.0.push(member_name);
                    typed.1.push(member_ident.clone());
                    typed.2.push(member_ident.clone());
                    into.push(quote! {
                        Self::#member_ident(v) => Value::Typed(
                            #member_name.to_string(),
                            Box::new(v.into_value()),
                        )
                    });
                }
                Declaration::Entity(_) => {
                    entities.0.push(member_name);
                    entities.1.push(member_ident.clone());
                    entities.2.push(member_ident.clone());
                    into.push(quote!(Self::#member_ident(v) => v.into_value()));
                    from_impls.extend(quote! {
                        impl From<#member_ident> for #ident {
                            fn from(value: #member_ident) -> Self {
                                Self::#member_ident(value)
                            }
                        }
                    });
                }
                Declaration::Enumeration(_) => {
                    enums.0.push(member_ident.clone());
                    enums.1.push(member_ident.clone());
                    into.push(quote!(Self::#member_ident(v) => v.into_value()));
                    from_impls.extend(quote! {
                        impl From<#member_ident> for #ident {
                            fn from(value: #member_ident) -> Self {
                                Self::#member_ident(value)
                            }
                        }
                    });
                }
                Declaration::Select(_) => {
                    return Err(Error::generation(
                        name,
                        None,
                        format!("select member '{}' was not flattened", member),
                    ))
                }
            }
        }

        let (typed_names, typed_variants, typed_types) = typed;
        let typed_arm = (!typed_names.is_empty()).then(|| {
            quote! {
                Value::Typed(tag, inner) => match tag.as_str() {
                    #( #typed_names => Ok(Self::#typed_variants(<#typed_types as FromValue>::from_value(*inner)?)), )*
                    unknown => Err(Error::invalid_value(#name, unknown, "type is not a member of the select")),
                },
            }
        });

        let (entity_names, entity_variants, entity_types) = entities;
        let entity_arm = (!entity_names.is_empty()).then(|| {
            quote! {
                Value::Entity(entity) => {
                    let type_name = entity.type_name().to_owned();
                    #(
                        if type_name == #entity_names {
                            return Ok(Self::#entity_variants(<#entity_types as EntityType>::from_entity_unchecked(entity)));
                        }
                    )*
                    #(
                        if entity.is_a_type(#entity_names) {
                            return Ok(Self::#entity_variants(<#entity_types as EntityType>::from_entity_unchecked(entity)));
                        }
                    )*
                    Err(#runtime::value::mismatch(#name, &Value::Entity(entity)))
                }
            }
        });

        let (enum_variants, enum_types) = enums;
        let enum_arm = (!enum_variants.is_empty()).then(|| {
            quote! {
                Value::Enum(item) => {
                    #(
                        if let Ok(v) = item.parse::<#enum_types>() {
                            return Ok(Self::#enum_variants(v));
                        }
                    )*
                    Err(#runtime::value::mismatch(#name, &Value::Enum(item)))
                }
            }
        });

        let doc = format!("Select `{}` over {}", name, members.join(", "));
        Ok(quote! {
            #[doc = #doc]
            #[derive(Clone, Debug, PartialEq)]
            pub enum #ident {
                #( #variants, )*
            }

            impl FromValue for #ident {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        #typed_arm
                        #entity_arm
                        #enum_arm
                        other => Err(#runtime::value::mismatch(#name, &other)),
                    }
                }
            }

            impl IntoValue for #ident {
                fn into_value(self) -> Value {
                    match self {
                        #( #into, )*
                    }
                }
            }

            #from_impls
        })
    }

    fn classes(&self, entities: &[&EntityDeclaration], runtime: &TokenStream) -> Result<TokenStream> {
        let mut classes = Vec::with_capacity(entities.len());
        for entity in entities {
            let name = entity.name.as_str();
            let supertype = match &entity.supertype {
                Some(supertype) => quote!(Some(#supertype)),
                None => quote!(None),
            };
            let is_abstract = entity.is_abstract;
            let attributes = entity.all_attributes().iter().map(|a| {
                let (attr, optional, derived) = (a.name.as_str(), a.optional, a.derived);
                quote! {
                    #runtime::class::AttributeInfo { name: #attr, optional: #optional, derived: #derived }
                }
            });
            let inverses = entity.own_inverse_attributes().iter().map(|i| {
                let (inv, target, attr) = (i.name.as_str(), i.entity.as_str(), i.attribute.as_str());
                quote! {
                    #runtime::class::InverseInfo { name: #inv, entity: #target, attribute: #attr }
                }
            });
            classes.push(quote! {
                #runtime::class::EntityClass {
                    name: #name,
                    supertype: #supertype,
                    is_abstract: #is_abstract,
                    attributes: &[#(#attributes),*],
                    inverses: &[#(#inverses),*],
                }
            });
        }

        Ok(quote! {
            /// Entity classes sorted by name
            pub const CLASSES: &[#runtime::class::EntityClass] = &[#(#classes),*];

            /// Class lookup for this schema version
            pub static REGISTRY: #runtime::class::ClassRegistry =
                #runtime::class::ClassRegistry::new(SCHEMA, CLASSES);
        })
    }

    /// `AnyEntity`: one variant per concrete entity type
    fn dispatch(&self, entities: &[&EntityDeclaration], runtime: &TokenStream) -> TokenStream {
        let concrete: Vec<_> = entities.iter().filter(|e| !e.is_abstract).collect();
        let names: Vec<&str> = concrete.iter().map(|e| e.name.as_str()).collect();
        let idents: Vec<_> = concrete.iter().map(|e| type_ident(&e.name)).collect();

        quote! {
            /// Any entity of this schema, typed by its concrete class
            #[derive(Clone, Debug, PartialEq, Eq, Hash)]
            pub enum AnyEntity {
                #( #idents(#idents), )*
                /// Entity whose type has no generated class
                Other(Entity),
            }

            impl From<Entity> for AnyEntity {
                fn from(entity: Entity) -> Self {
                    let type_name = entity.type_name().to_owned();
                    match type_name.as_str() {
                        #( #names => Self::#idents(<#idents as EntityType>::from_entity_unchecked(entity)), )*
                        _ => Self::Other(entity),
                    }
                }
            }

            impl AsEntity for AnyEntity {
                fn as_entity(&self) -> &Entity {
                    match self {
                        #( Self::#idents(e) => AsEntity::as_entity(e), )*
                        Self::Other(e) => e,
                    }
                }
            }

            impl FromValue for AnyEntity {
                fn from_value(value: Value) -> Result<Self> {
                    match value.untyped() {
                        Value::Entity(entity) => Ok(Self::from(entity)),
                        other => Err(#runtime::value::mismatch("entity", &other)),
                    }
                }
            }

            impl IntoValue for AnyEntity {
                fn into_value(self) -> Value {
                    Value::Entity(AsEntity::as_entity(&self).clone())
                }
            }
        }
    }

    /// Empty impls of extension traits for each declaration and its subtypes
    fn extension_impls(&self, generated: &[&str]) -> Result<TokenStream> {
        let mut tokens = TokenStream::new();
        for (declaration, traits) in self.extensions.iter() {
            if self.schema.get(declaration).and_then(Declaration::as_entity).is_none() {
                log::debug!("no entity {} for extension traits", declaration);
                continue;
            }
            let mut targets: Vec<&str> = self.schema.subtypes(declaration);
            targets.push(declaration);
            targets.retain(|t| generated.binary_search(t).is_ok());
            targets.sort_unstable();
            targets.dedup();

            for path in traits {
                let path: TokenStream = path
                    .parse()
                    .map_err(|_| Error::other(format!("invalid trait path '{}'", path)))?;
                for target in &targets {
                    let ident = type_ident(target);
                    tokens.extend(quote!(impl #path for #ident {}));
                }
            }
        }
        Ok(tokens)
    }
}

/// Generate classes for an embedded schema version with the default runtime path
pub fn generate(schema_name: &str) -> Result<GeneratedSchema> {
    let schema = ifc_orm_schema::load(schema_name)?;
    Generator::new(&schema).generate()
}

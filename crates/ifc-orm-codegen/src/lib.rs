// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-ORM Codegen
//!
//! Emits Rust source for one schema version: a newtype struct per entity
//! chained over its supertype, enums for enumerations and selects, aliases
//! for defined types, a class registry and the `AnyEntity` dispatch enum.
//!
//! Declarations whose types cannot be resolved are skipped, together with
//! everything that depends on them, and reported in
//! [`GeneratedSchema::skipped`]. Output is sorted by declaration name, so
//! the same schema always yields the same text.
//!
//! ## Build script use
//!
//! ```rust,ignore
//! let schema = ifc_orm_schema::load("IFC4")?;
//! let generated = Generator::new(&schema)
//!     .with_runtime_path("crate")
//!     .with_extensions(Extensions::runtime_defaults("crate"))
//!     .generate()?;
//! generated.write_to(out_dir.join("ifc4.rs"))?;
//! ```

pub mod extensions;
mod generator;
pub mod names;
pub mod resolve;

pub use extensions::Extensions;
pub use generator::{generate, GeneratedSchema, Generator, DEFAULT_RUNTIME};
pub use resolve::{skip_list, RustType};

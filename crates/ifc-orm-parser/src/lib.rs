// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-ORM Parser - the STEP engine under the entity mapping layer
//!
//! Opens STEP physical files, hands out raw records and writes them back.
//!
//! # Features
//!
//! - **Fast tokenization** using `nom` combinators
//! - **SIMD-accelerated scanning** using `memchr`
//! - **Lazy record decoding** - records are parsed on first access
//! - **Checked writes** - values are validated against the schema
//! - **Verbatim output** - untouched records are copied byte for byte
//!
//! # Example
//!
//! ```ignore
//! use ifc_orm_parser::{Session, WriterOptions};
//!
//! let mut session = ifc_orm_parser::open("model.ifc")?;
//! for wall in session.by_type("IfcWall", true)? {
//!     println!("{} {:?}", wall.id, wall.get_string(2));
//! }
//! session.write("copy.ifc", &WriterOptions::new())?;
//! ```

pub mod guid;
pub mod header;
mod index;
pub mod scanner;
mod session;
mod snapshot;
pub mod tokenizer;
pub mod units;
pub mod validate;
mod writer;

pub use guid::new_global_id;
pub use header::parse_header;
pub use scanner::EntityScanner;
pub use session::Session;
pub use snapshot::Snapshot;
pub use tokenizer::{parse_entity, parse_value, Token};
pub use units::{compound_plane_angle_to_degrees, extract_unit_scale};
pub use writer::{WriterOptions, PREPROCESSOR};

use ifc_orm_model::Result;
use std::path::Path;

/// Open a file from disk
pub fn open(path: impl AsRef<Path>) -> Result<Session> {
    Session::open(path)
}

/// Start an empty file for a schema version
pub fn create(schema_name: &str) -> Result<Session> {
    Session::create(schema_name)
}

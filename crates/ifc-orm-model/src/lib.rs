// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-ORM Model - shared types for the IFC entity mapping layer
//!
//! This crate holds the vocabulary every other crate in the workspace
//! speaks: raw records and their attribute values, the error taxonomy, the
//! read-only [`EntityResolver`] seam used by geometry processing, property
//! value trees and the detached spatial hierarchy snapshot.
//!
//! # Example
//!
//! ```
//! use ifc_orm_model::{AttributeValue, DecodedEntity, EntityId};
//!
//! let record = DecodedEntity::new(
//!     EntityId(12),
//!     "IfcWall",
//!     vec![AttributeValue::String("2O2Fr$t4X7Zf8NOew3FLOH".into()), AttributeValue::Null],
//! );
//! assert_eq!(record.to_step_line(), "#12=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$);");
//! ```

pub mod error;
pub mod geometry;
pub mod properties;
pub mod resolver;
pub mod spatial;
pub mod types;

// Re-export all public types
pub use error::*;
pub use geometry::*;
pub use properties::*;
pub use resolver::*;
pub use spatial::*;
pub use types::*;

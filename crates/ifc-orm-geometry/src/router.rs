// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry Router - Dynamic dispatch to geometry processors
//!
//! Routes representation items to the processor registered for their
//! concrete type and walks a product's representation chain.

use crate::{Error, Mesh, Result};
use ifc_orm_model::{DecodedEntity, EntityId, EntityResolver};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Representation identifiers treated as the product body
pub const BODY_IDENTIFIERS: &[&str] = &["Body", "Facetation"];

/// Geometry processor trait
///
/// Each processor handles one or more representation item types. Lookups
/// go through the `EntityResolver` trait, so processors work on live
/// sessions and snapshots alike.
pub trait GeometryProcessor: Send + Sync {
    /// Mesh of one representation item, in the item's coordinates
    fn process(&self, entity: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Mesh>;

    /// Concrete type names handled, in schema casing
    fn supported_types(&self) -> &'static [&'static str];
}

/// Routes representation items to processors by concrete type name
pub struct GeometryRouter {
    processors: FxHashMap<&'static str, Arc<dyn GeometryProcessor>>,
}

impl GeometryRouter {
    /// Create new router without any processors registered
    pub fn new() -> Self {
        Self {
            processors: FxHashMap::default(),
        }
    }

    /// Router for extruded area solids, triangulated face sets and faceted breps
    pub fn with_default_processors() -> Self {
        use crate::processors::{
            ExtrudedAreaSolidProcessor, FacetedBrepProcessor, TriangulatedFaceSetProcessor,
        };

        let mut router = Self::new();
        router.register(Arc::new(ExtrudedAreaSolidProcessor::new()));
        router.register(Arc::new(TriangulatedFaceSetProcessor::new()));
        router.register(Arc::new(FacetedBrepProcessor::new()));
        router
    }

    /// Register a processor for all of its types, replacing earlier ones
    pub fn register(&mut self, processor: Arc<dyn GeometryProcessor>) {
        for &type_name in processor.supported_types() {
            self.processors.insert(type_name, Arc::clone(&processor));
        }
    }

    pub fn has_processor(&self, type_name: &str) -> bool {
        self.processors.contains_key(type_name)
    }

    /// Process a single representation item
    pub fn process_item(&self, item: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Mesh> {
        let processor = self
            .processors
            .get(item.type_name.as_str())
            .ok_or_else(|| Error::unsupported_type(item.type_name.clone()))?;
        processor.process(item, resolver)
    }

    /// Items of a product's body representations
    ///
    /// Follows `Representation` → `IfcProductDefinitionShape.Representations`
    /// → `IfcShapeRepresentation.Items`, keeping representations identified as
    /// `Body` or `Facetation`.
    pub fn body_items(&self, product: &DecodedEntity, resolver: &dyn EntityResolver) -> Vec<EntityId> {
        // IFCPRODUCT(.., ObjectPlacement, Representation)
        let Some(shape) = product.get_ref(6).and_then(|id| resolver.get(id)) else {
            return Vec::new();
        };

        // IFCPRODUCTDEFINITIONSHAPE(Name, Description, Representations)
        shape
            .get_refs(2)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| resolver.get(id))
            .filter(|rep| {
                // IFCSHAPEREPRESENTATION(ContextOfItems, RepresentationIdentifier, RepresentationType, Items)
                rep.get_string(1)
                    .map_or(true, |identifier| BODY_IDENTIFIERS.contains(&identifier))
            })
            .flat_map(|rep| rep.get_refs(3).unwrap_or_default())
            .collect()
    }

    /// Merged mesh of a product's body items, in product coordinates
    ///
    /// Items that fail are skipped with a warning. Returns the mesh and the
    /// items that contributed to it.
    pub fn process_product(
        &self,
        product: &DecodedEntity,
        resolver: &dyn EntityResolver,
    ) -> (Mesh, Vec<EntityId>) {
        let mut mesh = Mesh::new();
        let mut used = Vec::new();

        for item_id in self.body_items(product, resolver) {
            let Some(item) = resolver.get(item_id) else {
                log::warn!("{}: representation item {} is missing", product.id, item_id);
                continue;
            };
            match self.process_item(&item, resolver) {
                Ok(item_mesh) => {
                    mesh.merge(&item_mesh);
                    used.push(item_id);
                }
                Err(e) => log::warn!("{}: skipping item {}: {}", product.id, item_id, e),
            }
        }
        (mesh, used)
    }
}

impl Default for GeometryRouter {
    fn default() -> Self {
        Self::with_default_processors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_orm_parser::Session;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCCARTESIANPOINT((0.,0.,0.));
#2=IFCDIRECTION((0.,0.,1.));
#3=IFCAXIS2PLACEMENT3D(#1,$,$);
#4=IFCGEOMETRICREPRESENTATIONCONTEXT($,'Model',3,1.E-05,#3,$);
#5=IFCRECTANGLEPROFILEDEF(.AREA.,$,$,1.,1.);
#6=IFCEXTRUDEDAREASOLID(#5,$,#2,1.);
#7=IFCCARTESIANPOINT((0.,0.));
#8=IFCSHAPEREPRESENTATION(#4,'Body','SweptSolid',(#6,#7));
#9=IFCSHAPEREPRESENTATION(#4,'Axis','Curve2D',(#7));
#10=IFCPRODUCTDEFINITIONSHAPE($,$,(#9,#8));
#11=IFCLOCALPLACEMENT($,#3);
#12=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall',$,$,#11,#10,$,$);
#13=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOI',$,'Bare',$,$,#11,$,$,$);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_empty_router() {
        let router = GeometryRouter::new();
        assert!(!router.has_processor("IfcExtrudedAreaSolid"));
        assert!(GeometryRouter::default().has_processor("IfcFacetedBrep"));
    }

    #[test]
    fn test_body_items_skip_other_representations() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let router = GeometryRouter::with_default_processors();
        let wall = session.by_id(EntityId(12)).unwrap();
        assert_eq!(router.body_items(&wall, &session), vec![EntityId(6), EntityId(7)]);

        let bare = session.by_id(EntityId(13)).unwrap();
        assert!(router.body_items(&bare, &session).is_empty());
    }

    #[test]
    fn test_unsupported_items_are_skipped() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let router = GeometryRouter::with_default_processors();
        let wall = session.by_id(EntityId(12)).unwrap();

        let (mesh, used) = router.process_product(&wall, &session);
        assert_eq!(used, vec![EntityId(6)]);
        assert_eq!(mesh.triangle_count(), 12);

        let point = session.by_id(EntityId(7)).unwrap();
        assert!(matches!(
            router.process_item(&point, &session),
            Err(Error::UnsupportedType(name)) if name == "IfcCartesianPoint"
        ));
    }
}

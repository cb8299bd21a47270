// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bulk geometry loading at file-open time
//!
//! Products are processed on a dedicated rayon pool against an immutable
//! [`Snapshot`]. The returned map is complete when `preload` returns; the
//! caller merges it into its cache in one step.

use crate::backend::GeometryBackend;
use crate::style::StyleIndex;
use ifc_orm_model::{get_default_color, EntityGeometry, EntityId, EntityResolver};
use ifc_orm_parser::Snapshot;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Geometry of many products, keyed by product id
///
/// Products without a body are absent from the result. Failures are logged
/// and leave the entry absent as well; callers fall back to computing on
/// demand.
pub fn preload(
    snapshot: &Snapshot,
    backend: &dyn GeometryBackend,
    ids: &[EntityId],
    workers: usize,
) -> FxHashMap<EntityId, EntityGeometry> {
    let styles = StyleIndex::build(snapshot);
    let scale = snapshot.unit_scale();

    let load = |id: &EntityId| -> Option<(EntityId, EntityGeometry)> {
        let element = snapshot.get(*id)?;
        match backend.from_shape(&element, snapshot) {
            Ok(Some(body)) => {
                let color = styles
                    .style_for(&body.items)
                    .map(|style| style.color)
                    .unwrap_or_else(|| get_default_color(&element.type_name));
                Some((*id, body.into_entity_geometry(color, scale, backend.name())))
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("no geometry for {} {}: {}", element.type_name, id, e);
                None
            }
        }
    };

    let loaded: Vec<(EntityId, EntityGeometry)> =
        match rayon::ThreadPoolBuilder::new().num_threads(workers.max(1)).build() {
            Ok(pool) => pool.install(|| ids.par_iter().filter_map(load).collect()),
            Err(e) => {
                log::warn!("geometry pool unavailable ({}), loading sequentially", e);
                ids.iter().filter_map(load).collect()
            }
        };

    log::info!(
        "preloaded geometry for {} of {} products ({} backend, {} workers)",
        loaded.len(),
        ids.len(),
        backend.name(),
        workers.max(1)
    );
    loaded.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TessellationBackend;
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
#7=IFCSHAPEREPRESENTATION(#4,'Body','SweptSolid',(#6));
#8=IFCPRODUCTDEFINITIONSHAPE($,$,(#7));
#9=IFCLOCALPLACEMENT($,#3);
#10=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall',$,$,#9,#8,$,$);
#11=IFCSLAB('2O2Fr$t4X7Zf8NOew3FLOI',$,'Slab',$,$,#9,#8,$,$);
#12=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOJ',$,'Bare',$,$,#9,$,$,$);
#13=IFCCOLOURRGB($,0.,1.,0.);
#14=IFCSURFACESTYLESHADING(#13,$);
#15=IFCSURFACESTYLE('Green',.BOTH.,(#14));
#16=IFCSTYLEDITEM(#20,(#15),$);
#17=IFCRECTANGLEPROFILEDEF(.AREA.,$,$,1.,1.);
#20=IFCEXTRUDEDAREASOLID(#17,$,#2,2.);
#21=IFCSHAPEREPRESENTATION(#4,'Body','SweptSolid',(#20));
#22=IFCPRODUCTDEFINITIONSHAPE($,$,(#21));
#23=IFCCOLUMN('2O2Fr$t4X7Zf8NOew3FLOK',$,'Column',$,$,#9,#22,$,$);
ENDSEC;
END-ISO-10303-21;
"#;

    fn products(session: &Session) -> Vec<EntityId> {
        session.ids_of_type("IfcProduct", true).unwrap()
    }

    #[test]
    fn test_preload_skips_products_without_body() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let snapshot = session.snapshot();
        let ids = products(&session);
        let loaded = preload(&snapshot, &TessellationBackend::new(), &ids, 1);

        assert_eq!(loaded.len(), 3);
        assert!(!loaded.contains_key(&EntityId(12)));
        assert_eq!(loaded[&EntityId(10)].color, get_default_color("IfcWall"));
        assert_eq!(loaded[&EntityId(11)].color, get_default_color("IfcSlab"));
    }

    #[test]
    fn test_styled_items_color_products() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let snapshot = session.snapshot();
        let loaded = preload(&snapshot, &TessellationBackend::new(), &[EntityId(23)], 2);
        assert_eq!(loaded[&EntityId(23)].color, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_worker_count_does_not_change_result() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let snapshot = session.snapshot();
        let ids = products(&session);
        let backend = TessellationBackend::new();

        let single = preload(&snapshot, &backend, &ids, 1);
        let many = preload(&snapshot, &backend, &ids, 4);
        assert_eq!(single.len(), many.len());
        for (id, geometry) in &single {
            assert_eq!(&many[id], geometry);
        }

        // Zero workers still loads
        assert_eq!(preload(&snapshot, &backend, &ids, 0).len(), single.len());
    }
}

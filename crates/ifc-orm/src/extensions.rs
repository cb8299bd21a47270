// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hand-written behaviour spliced into the generated classes
//!
//! The generator implements each trait for the declaration it is
//! registered on and every subtype, so `IfcWall` gets [`ObjectDefinitionExt`],
//! [`ObjectExt`] and [`ProductExt`]. All methods have default bodies
//! written against [`AsEntity`].

use crate::entity::{AsEntity, Entity};
use crate::file::IfcFile;
use crate::psets;
use crate::relations;
use crate::value::Value;
use ifc_orm_geometry::placement::{axis2_placement_frame, direction, object_transform, relative_frame};
use ifc_orm_geometry::{BodyGeometry, Frame, Matrix4, Vector3};
use ifc_orm_model::{
    get_default_color, DecodedEntity, EntityGeometry, EntityId, Error, MeshData, PropertySets, Result,
    Style,
};
use ifc_orm_parser::units::{compound_plane_angle_to_degrees, degrees_to_compound_plane_angle, unit_scale};
use std::sync::Arc;

/// Record of an entity, the pending one for transient entities
fn record_of(entity: &Entity, file: &IfcFile) -> Result<Arc<DecodedEntity>> {
    if let Some(record) = entity.pending().as_ref() {
        return Ok(Arc::new(record.clone()));
    }
    file.session().record(entity.id())
}

/// Terrain and other geographic features; IFC2X3 has no such class
const GEOGRAPHIC_ELEMENT: &str = "IfcGeographicElement";

fn label(entity: &Entity, attribute: &str) -> Result<Option<String>> {
    Ok(entity.get(attribute)?.as_str().map(str::to_string))
}

/// Spatial tree and material of an `IfcObjectDefinition`
pub trait ObjectDefinitionExt: AsEntity {
    /// Parent through aggregation or containment, cached until the entity changes
    fn parent(&self) -> Result<Option<Entity>> {
        let entity = self.as_entity();
        let cached = entity.cache().borrow().parent;
        if let Some(parent) = cached {
            return match parent {
                Some(id) => Ok(Some(entity.file()?.entity(id)?)),
                None => Ok(None),
            };
        }
        let parent = relations::parent_of(entity)?;
        if !entity.is_transient() {
            entity.cache().borrow_mut().parent = Some(parent.as_ref().map(Entity::id));
        }
        Ok(parent)
    }

    /// Children, queried on every call
    fn children(&self) -> Result<Vec<Entity>> {
        relations::children_of(self.as_entity())
    }

    fn descendants(&self) -> Result<Vec<Entity>> {
        relations::descendants(self.as_entity())
    }

    /// Children, or all descendants when `recursive`, of `type_name` or a subtype
    fn children_by_type(&self, type_name: &str, recursive: bool) -> Result<Vec<Entity>> {
        relations::children_by_type(self.as_entity(), type_name, recursive)
    }

    /// Material of the first `IfcRelAssociatesMaterial` listing this object
    fn material(&self) -> Result<Option<Entity>> {
        relations::material_of(self.as_entity())
    }
}

/// Property sets of an `IfcObject`
pub trait ObjectExt: AsEntity {
    fn property_sets(&self) -> Result<PropertySets> {
        psets::property_sets(self.as_entity())
    }

    /// Attach property sets, keeping the ones already there
    fn set_property_sets(&self, sets: &PropertySets) -> Result<()> {
        psets::set_property_sets(self.as_entity(), sets).map(|_| ())
    }
}

/// Geometry and placement of an `IfcProduct`
pub trait ProductExt: AsEntity {
    /// Mesh, colour and world transform of the body
    ///
    /// Preloaded geometry is returned as is. Otherwise the body is computed
    /// with openings subtracted, stored in the file's geometry cache and
    /// kept until the product is written to.
    fn geometry(&self) -> Result<Option<EntityGeometry>> {
        let entity = self.as_entity();
        let file = entity.file()?;
        if !entity.is_transient() {
            if let Some(geometry) = file.geometry_of(entity.id()) {
                return Ok(Some(geometry));
            }
        }
        let Some(body) = self.body_with_openings()? else {
            return Ok(None);
        };
        let color = file
            .styles()
            .style_for(&body.items)
            .map(|style| style.color)
            .unwrap_or_else(|| get_default_color(entity.type_name()));
        let geometry = body.into_entity_geometry(color, file.unit_scale(), file.backend().name());
        if !entity.is_transient() {
            file.store_geometry(entity.id(), geometry.clone());
        }
        Ok(Some(geometry))
    }

    /// Body from the geometry backend, without openings
    fn body(&self) -> Result<Option<BodyGeometry>> {
        let entity = self.as_entity();
        let file = entity.file()?;
        let record = record_of(entity, &file)?;
        let session = file.session();
        file.backend()
            .from_shape(&record, &*session)
            .map_err(|e| e.for_entity(entity.id()))
    }

    /// Body with every opening subtracted
    ///
    /// Openings the backend cannot subtract are skipped with a warning and
    /// the body is returned without them.
    fn body_with_openings(&self) -> Result<Option<BodyGeometry>> {
        let entity = self.as_entity();
        let Some(mut body) = self.body()? else {
            return Ok(None);
        };
        let file = entity.file()?;
        let backend = file.backend();
        for opening in self.openings()? {
            let shape = {
                let session = file.session();
                let record = session.record(opening.id())?;
                backend.from_shape(&record, &*session)
            };
            let subtracted = match shape {
                Ok(Some(void)) => backend.subtract(&body, &void),
                Ok(None) => continue,
                Err(e) => Err(e),
            };
            match subtracted {
                Ok(result) => body = result,
                Err(e) => log::warn!("{:?}: opening {:?} not subtracted: {}", entity, opening, e),
            }
        }
        Ok(Some(body))
    }

    /// Opening elements voiding this product
    fn openings(&self) -> Result<Vec<Entity>> {
        let entity = self.as_entity();
        if entity.is_transient() {
            return Ok(Vec::new());
        }
        let file = entity.file()?;
        let ids: Vec<EntityId> = {
            let session = file.session();
            let mut ids = Vec::new();
            for rel in session.referencing(entity.id(), "IfcRelVoidsElement", "RelatingBuildingElement")? {
                if let Some(id) = session.get(rel, "RelatedOpeningElement")?.as_entity_ref() {
                    ids.push(id);
                }
            }
            ids
        };
        ids.into_iter().map(|id| file.entity(id)).collect()
    }

    /// Replace the body with a triangle mesh in file length units
    ///
    /// IFC4 files get an `IfcTriangulatedFaceSet`, older schemas a faceted
    /// brep. The representation goes into the `Body` sub-context when there
    /// is one, else the 3D model context.
    fn set_geometry(&self, mesh: &MeshData) -> Result<Entity> {
        let entity = self.as_entity();
        let file = entity.file()?;
        if mesh.indices.len() < 3 {
            return Err(Error::invalid_value("Representation", "mesh", "mesh has no triangles"));
        }
        let context = body_context(&file)?;
        let (item, representation_type) = if file.schema().canonical_name("IfcTriangulatedFaceSet").is_some() {
            (triangulated_face_set(&file, mesh)?, "Tessellation")
        } else {
            (faceted_brep(&file, mesh)?, "Brep")
        };
        let representation = file.create_entity(
            "IfcShapeRepresentation",
            [
                ("ContextOfItems", Value::from(context)),
                ("RepresentationIdentifier", Value::from("Body")),
                ("RepresentationType", Value::from(representation_type)),
                ("Items", Value::List(vec![Value::from(item)])),
            ],
        )?;
        let shape = file.create_entity(
            "IfcProductDefinitionShape",
            [("Representations", Value::List(vec![Value::from(representation)]))],
        )?;
        entity.set("Representation", &shape)?;
        Ok(shape)
    }

    /// Local frame of the object placement relative to its parent placement
    fn frame(&self) -> Result<Option<Frame>> {
        let entity = self.as_entity();
        if let Some(frame) = entity.cache().borrow().frame {
            return Ok(Some(frame));
        }
        let Some(placement) = entity.get("ObjectPlacement")?.as_entity().cloned() else {
            return Ok(None);
        };
        let file = entity.file()?;
        let frame = relative_frame(&*file.session(), placement.id())
            .map_err(|e| e.for_entity(entity.id()))?;
        entity.cache().borrow_mut().frame = Some(frame);
        Ok(Some(frame))
    }

    /// Give the product a new local placement
    ///
    /// The new placement stays relative to the parent placement of the old
    /// one, if any.
    fn set_frame(&self, frame: &Frame) -> Result<Entity> {
        let entity = self.as_entity();
        let file = entity.file()?;
        let relative_to = match entity.get("ObjectPlacement")?.as_entity() {
            Some(old) => old.get("PlacementRelTo")?,
            None => Value::Null,
        };
        let axes = axis2_placement(&file, frame)?;
        let mut attributes = vec![("RelativePlacement", Value::from(axes))];
        if !relative_to.is_null() {
            attributes.push(("PlacementRelTo", relative_to));
        }
        let placement = file.create_entity("IfcLocalPlacement", attributes)?;
        entity.set("ObjectPlacement", &placement)?;
        Ok(placement)
    }

    /// Product to world matrix in metres
    fn transformation(&self) -> Result<Matrix4<f64>> {
        let entity = self.as_entity();
        if let Some(matrix) = entity.cache().borrow().transformation {
            return Ok(matrix);
        }
        let file = entity.file()?;
        let record = record_of(entity, &file)?;
        let matrix = object_transform(&*file.session(), &record, file.unit_scale())
            .map_err(|e| e.for_entity(entity.id()))?;
        entity.cache().borrow_mut().transformation = Some(matrix);
        Ok(matrix)
    }

    /// Surface style of the first styled body item
    fn style(&self) -> Result<Option<Style>> {
        let entity = self.as_entity();
        if let Some(style) = entity.cache().borrow().style.clone() {
            return Ok(Some(style));
        }
        let file = entity.file()?;
        let items = body_items(entity)?;
        let style = file.styles().style_for(&items).cloned();
        if let Some(style) = &style {
            entity.cache().borrow_mut().style = Some(style.clone());
        }
        Ok(style)
    }
}

/// Items of the `Body` shape representations of a product
fn body_items(product: &Entity) -> Result<Vec<EntityId>> {
    let Some(shape) = product.get("Representation")?.as_entity().cloned() else {
        return Ok(Vec::new());
    };
    let mut items = Vec::new();
    for representation in shape.get("Representations")?.entities() {
        let identifier = label(&representation, "RepresentationIdentifier")?;
        if identifier.as_deref().map_or(true, |id| id == "Body" || id == "Facetation") {
            items.extend(representation.get("Items")?.entities().iter().map(Entity::id));
        }
    }
    Ok(items)
}

/// `Body` sub-context of the 3D model context, else the model context itself
fn body_context(file: &IfcFile) -> Result<Entity> {
    let contexts = file.by_type("IfcGeometricRepresentationContext", true)?;
    let mut model = None;
    for context in contexts {
        let is_model = label(&context, "ContextType")?.as_deref() == Some("Model");
        if context.is_a_type("IfcGeometricRepresentationSubContext") {
            if label(&context, "ContextIdentifier")?.as_deref() == Some("Body") {
                return Ok(context);
            }
        } else if is_model && model.is_none() {
            model = Some(context);
        }
    }
    model.ok_or_else(|| Error::other("file has no 3D model representation context"))
}

fn triangulated_face_set(file: &IfcFile, mesh: &MeshData) -> Result<Entity> {
    let coordinates: Vec<Value> = mesh
        .positions
        .chunks_exact(3)
        .map(|p| Value::List(p.iter().map(|c| Value::Real(f64::from(*c))).collect()))
        .collect();
    let points = file.create_entity("IfcCartesianPointList3D", [("CoordList", Value::List(coordinates))])?;
    let triangles: Vec<Value> = mesh
        .indices
        .chunks_exact(3)
        .map(|t| Value::List(t.iter().map(|i| Value::Integer(i64::from(*i) + 1)).collect()))
        .collect();
    file.create_entity(
        "IfcTriangulatedFaceSet",
        [
            ("Coordinates", Value::from(points)),
            ("CoordIndex", Value::List(triangles)),
        ],
    )
}

fn faceted_brep(file: &IfcFile, mesh: &MeshData) -> Result<Entity> {
    let mut points = Vec::with_capacity(mesh.positions.len() / 3);
    for p in mesh.positions.chunks_exact(3) {
        let coordinates: Vec<f64> = p.iter().map(|c| f64::from(*c)).collect();
        points.push(file.create_entity("IfcCartesianPoint", [("Coordinates", Value::from(coordinates))])?);
    }
    let mut faces = Vec::with_capacity(mesh.indices.len() / 3);
    for t in mesh.indices.chunks_exact(3) {
        if t[0] == t[1] || t[1] == t[2] || t[0] == t[2] {
            continue;
        }
        let corners = t
            .iter()
            .map(|i| {
                points
                    .get(*i as usize)
                    .map(Value::from)
                    .ok_or_else(|| Error::invalid_value("Representation", i.to_string(), "vertex index out of range"))
            })
            .collect::<Result<Vec<_>>>()?;
        let lp = file.create_entity("IfcPolyLoop", [("Polygon", Value::List(corners))])?;
        let bound = file.create_entity(
            "IfcFaceOuterBound",
            [("Bound", Value::from(lp)), ("Orientation", Value::Bool(true))],
        )?;
        faces.push(Value::from(file.create_entity("IfcFace", [("Bounds", Value::List(vec![Value::from(bound)]))])?));
    }
    let shell = file.create_entity("IfcClosedShell", [("CfsFaces", Value::List(faces))])?;
    file.create_entity("IfcFacetedBrep", [("Outer", Value::from(shell))])
}

fn axis2_placement(file: &IfcFile, frame: &Frame) -> Result<Entity> {
    let point = |v: [f64; 3]| file.create_entity("IfcCartesianPoint", [("Coordinates", Value::from(v.to_vec()))]);
    let dir = |v: Vector3<f64>| {
        file.create_entity("IfcDirection", [("DirectionRatios", Value::from(vec![v.x, v.y, v.z]))])
    };
    let origin = frame.origin;
    file.create_entity(
        "IfcAxis2Placement3D",
        [
            ("Location", Value::from(point([origin.x, origin.y, origin.z])?)),
            ("Axis", Value::from(dir(frame.zaxis())?)),
            ("RefDirection", Value::from(dir(frame.xaxis)?)),
        ],
    )
}

/// A named unit of the project
#[derive(Debug, Clone, PartialEq)]
pub struct UnitInfo {
    pub entity: Entity,
    /// `IfcUnitEnum` item, e.g. `LENGTHUNIT`
    pub unit_type: String,
    pub name: String,
    /// SI prefix, e.g. `MILLI`
    pub prefix: Option<String>,
    /// Factor to the SI base unit
    pub scale: f64,
}

/// A geometric representation context of the project
#[derive(Debug, Clone, PartialEq)]
pub struct ContextInfo {
    pub entity: Entity,
    pub identifier: Option<String>,
    pub context_type: Option<String>,
    pub precision: Option<f64>,
    pub dimension: Option<i64>,
    pub true_north: Option<Vector3<f64>>,
    pub world_frame: Option<Frame>,
}

/// Units, contexts and spatial shortcuts of an `IfcProject`
pub trait ProjectExt: AsEntity {
    fn sites(&self) -> Result<Vec<Entity>> {
        relations::children_by_type(self.as_entity(), "IfcSite", true)
    }

    fn buildings(&self) -> Result<Vec<Entity>> {
        relations::children_by_type(self.as_entity(), "IfcBuilding", true)
    }

    fn building_elements(&self) -> Result<Vec<Entity>> {
        relations::children_by_type(self.as_entity(), "IfcBuildingElement", true)
    }

    fn geographic_elements(&self) -> Result<Vec<Entity>> {
        relations::children_by_type(self.as_entity(), GEOGRAPHIC_ELEMENT, true)
    }

    /// SI and conversion based units in `UnitsInContext`
    ///
    /// Falls back to the first `IfcUnitAssignment` of the file.
    fn units(&self) -> Result<Vec<UnitInfo>> {
        let entity = self.as_entity();
        let file = entity.file()?;
        let assignment = match entity.get("UnitsInContext")?.as_entity().cloned() {
            Some(assignment) => Some(assignment),
            None => file.by_type("IfcUnitAssignment", false)?.into_iter().next(),
        };
        let Some(assignment) = assignment else {
            return Ok(Vec::new());
        };

        let mut units = Vec::new();
        for unit in assignment.get("Units")?.entities() {
            if !(unit.is_a_type("IfcSIUnit") || unit.is_a_type("IfcConversionBasedUnit")) {
                continue;
            }
            let unit_type = label(&unit, "UnitType")?.unwrap_or_default();
            let prefix = if unit.is_a_type("IfcSIUnit") {
                label(&unit, "Prefix")?
            } else {
                None
            };
            let scale = unit_scale(&*file.session(), &unit_type).unwrap_or(1.0);
            units.push(UnitInfo {
                name: label(&unit, "Name")?.unwrap_or_default(),
                unit_type,
                prefix,
                scale,
                entity: unit,
            });
        }
        Ok(units)
    }

    fn length_unit(&self) -> Result<Option<UnitInfo>> {
        Ok(self.units()?.into_iter().find(|u| u.unit_type == "LENGTHUNIT"))
    }

    /// Length unit in metres, 1.0 when the project has none
    fn length_scale(&self) -> Result<f64> {
        Ok(self.length_unit()?.map_or(1.0, |u| u.scale))
    }

    fn contexts(&self) -> Result<Vec<ContextInfo>> {
        let entity = self.as_entity();
        let file = entity.file()?;
        let mut out = Vec::new();
        for context in entity.get("RepresentationContexts")?.entities() {
            if !context.is_a_type("IfcGeometricRepresentationContext") {
                continue;
            }
            let world_frame = match context.get("WorldCoordinateSystem")?.as_entity() {
                Some(wcs) => Some(
                    axis2_placement_frame(&*file.session(), wcs.id())
                        .map_err(|e| e.for_entity(context.id()))?,
                ),
                None => None,
            };
            let true_north = match context.get("TrueNorth")?.as_entity() {
                Some(north) => Some(
                    direction(&*file.session(), north.id()).map_err(|e| e.for_entity(context.id()))?,
                ),
                None => None,
            };
            out.push(ContextInfo {
                identifier: label(&context, "ContextIdentifier")?,
                context_type: label(&context, "ContextType")?,
                precision: context.get("Precision")?.as_real(),
                dimension: context.get_typed::<Option<i64>>("CoordinateSpaceDimension")?,
                true_north,
                world_frame,
                entity: context,
            });
        }
        Ok(out)
    }

    /// World coordinate system of the 3D model context
    fn world_frame(&self) -> Result<Option<Frame>> {
        Ok(self
            .contexts()?
            .into_iter()
            .find(|c| c.context_type.as_deref() == Some("Model"))
            .and_then(|c| c.world_frame))
    }

    /// True north of the 3D model context
    fn true_north(&self) -> Result<Option<Vector3<f64>>> {
        Ok(self
            .contexts()?
            .into_iter()
            .find(|c| c.context_type.as_deref() == Some("Model"))
            .and_then(|c| c.true_north))
    }
}

pub trait SiteExt: AsEntity {
    fn buildings(&self) -> Result<Vec<Entity>> {
        relations::children_by_type(self.as_entity(), "IfcBuilding", true)
    }

    fn building_elements(&self) -> Result<Vec<Entity>> {
        relations::children_by_type(self.as_entity(), "IfcBuildingElement", true)
    }

    fn geographic_elements(&self) -> Result<Vec<Entity>> {
        relations::children_by_type(self.as_entity(), GEOGRAPHIC_ELEMENT, true)
    }

    /// Latitude and longitude in degrees
    fn location(&self) -> Result<Option<(f64, f64)>> {
        let entity = self.as_entity();
        let latitude = entity.get_typed::<Option<Vec<i64>>>("RefLatitude")?;
        let longitude = entity.get_typed::<Option<Vec<i64>>>("RefLongitude")?;
        Ok(match (latitude, longitude) {
            (Some(lat), Some(lon)) => Some((
                compound_plane_angle_to_degrees(&lat),
                compound_plane_angle_to_degrees(&lon),
            )),
            _ => None,
        })
    }

    fn set_location(&self, latitude: f64, longitude: f64) -> Result<()> {
        let entity = self.as_entity();
        entity.set("RefLatitude", degrees_to_compound_plane_angle(latitude).to_vec())?;
        entity.set("RefLongitude", degrees_to_compound_plane_angle(longitude).to_vec())
    }
}

pub trait BuildingExt: AsEntity {
    fn storeys(&self) -> Result<Vec<Entity>> {
        relations::children_by_type(self.as_entity(), "IfcBuildingStorey", true)
    }

    fn building_elements(&self) -> Result<Vec<Entity>> {
        relations::children_by_type(self.as_entity(), "IfcBuildingElement", true)
    }

    fn geographic_elements(&self) -> Result<Vec<Entity>> {
        relations::children_by_type(self.as_entity(), GEOGRAPHIC_ELEMENT, true)
    }
}

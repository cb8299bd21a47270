// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model facade
//!
//! [`Model`] ties a file to the workflows around it: opening, starting
//! from a template, creating and placing new entities, saving the whole
//! file or exporting a branch of it.
//!
//! ```no_run
//! use ifc_orm::{ifc4::IfcWall, Model, ObjectDefinitionExt};
//!
//! let model = Model::template("IFC4", 2)?;
//! let storey = &model.building_storeys()?[0];
//! let wall = model.create_entity("IfcWall", [("Name", "North wall")])?;
//! model.attach(storey, &wall)?;
//! assert_eq!(wall.cast::<IfcWall>()?.parent()?.as_ref(), Some(storey));
//! model.save("out.ifc")?;
//! # Ok::<(), ifc_orm::Error>(())
//! ```

use crate::entity::Entity;
use crate::file::{FileOptions, IfcFile};
use crate::psets::DEFINES_BY_PROPERTIES;
use crate::relations::{self, RelationKind};
use crate::value::Value;
use ifc_orm_model::{AttributeValue, DecodedEntity, EntityId, Result, SpatialNode};
use ifc_orm_parser::{new_global_id, Session, WriterOptions};
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Options for opening a model
pub type ModelOptions = FileOptions;

const VOIDS_ELEMENT: &str = "IfcRelVoidsElement";
const STYLED_ITEM: &str = "IfcStyledItem";

/// An IFC model
pub struct Model {
    file: IfcFile,
    path: Option<PathBuf>,
    /// Entities made through the facade, placed on save if still unparented
    created: RefCell<Vec<Entity>>,
}

impl Model {
    /// Open a file with default options
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ModelOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: ModelOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = IfcFile::open_with(path, options)?;
        log::info!("opened {} ({}, {} records)", path.display(), file.schema().name(), file.len());
        Ok(Self::with_path(file, Some(path.to_path_buf())))
    }

    /// Empty model for a schema version
    pub fn create(schema_name: &str) -> Result<Self> {
        Ok(Self::from_file(IfcFile::create(schema_name)?))
    }

    pub fn from_file(file: IfcFile) -> Self {
        Self::with_path(file, None)
    }

    fn with_path(file: IfcFile, path: Option<PathBuf>) -> Self {
        Self {
            file,
            path,
            created: RefCell::new(Vec::new()),
        }
    }

    /// New model with a project, a site, a building and `storey_count` storeys
    ///
    /// Lengths are in millimetres. The project carries a 3D model context
    /// with a `Body` sub-context, and everything is owned by one owner
    /// history naming this library as the application.
    pub fn template(schema_name: &str, storey_count: usize) -> Result<Self> {
        let model = Self::create(schema_name)?;
        let file = &model.file;

        let owner = owner_history(file)?;
        let origin = file.create_entity("IfcCartesianPoint", [("Coordinates", Value::from(vec![0.0, 0.0, 0.0]))])?;
        let world = file.create_entity("IfcAxis2Placement3D", [("Location", Value::from(&origin))])?;
        let context = file.create_entity(
            "IfcGeometricRepresentationContext",
            [
                ("ContextType", Value::from("Model")),
                ("CoordinateSpaceDimension", Value::from(3_i64)),
                ("Precision", Value::from(1e-5)),
                ("WorldCoordinateSystem", Value::from(&world)),
            ],
        )?;
        file.create_entity(
            "IfcGeometricRepresentationSubContext",
            [
                ("ContextIdentifier", Value::from("Body")),
                ("ContextType", Value::from("Model")),
                ("ParentContext", Value::from(&context)),
                ("TargetView", Value::Enum("MODEL_VIEW".into())),
            ],
        )?;

        let units = [
            ("LENGTHUNIT", Some("MILLI"), "METRE"),
            ("AREAUNIT", None, "SQUARE_METRE"),
            ("VOLUMEUNIT", None, "CUBIC_METRE"),
            ("PLANEANGLEUNIT", None, "RADIAN"),
        ]
        .into_iter()
        .map(|(unit_type, prefix, name)| {
            file.create_entity(
                "IfcSIUnit",
                [
                    ("UnitType", Value::Enum(unit_type.into())),
                    ("Prefix", prefix.map_or(Value::Null, |p| Value::Enum(p.into()))),
                    ("Name", Value::Enum(name.into())),
                ],
            )
            .map(Value::from)
        })
        .collect::<Result<Vec<_>>>()?;
        let assignment = file.create_entity("IfcUnitAssignment", [("Units", Value::List(units))])?;

        let project = file.create_entity(
            "IfcProject",
            [
                ("GlobalId", Value::from(new_global_id())),
                ("OwnerHistory", Value::from(&owner)),
                ("Name", Value::from("Default Project")),
                ("RepresentationContexts", Value::List(vec![Value::from(&context)])),
                ("UnitsInContext", Value::from(&assignment)),
            ],
        )?;

        let site_placement = local_placement(file, None, 0.0)?;
        let site = spatial_element(file, "IfcSite", "Default Site", &owner, &site_placement, &[])?;
        relations::attach(&project, &site)?;

        let building_placement = local_placement(file, Some(&site_placement), 0.0)?;
        let building = spatial_element(file, "IfcBuilding", "Default Building", &owner, &building_placement, &[])?;
        relations::attach(&site, &building)?;

        for level in 0..storey_count {
            let elevation = level as f64 * STOREY_HEIGHT;
            let placement = local_placement(file, Some(&building_placement), elevation)?;
            let storey = spatial_element(
                file,
                "IfcBuildingStorey",
                &format!("Level {}", level),
                &owner,
                &placement,
                &[("Elevation", Value::from(elevation))],
            )?;
            relations::attach(&building, &storey)?;
        }

        log::debug!("template {} with {} storeys, {} records", schema_name, storey_count, file.len());
        Ok(model)
    }

    pub fn file(&self) -> &IfcFile {
        &self.file
    }

    /// Path the model was opened from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_name(&self) -> &str {
        self.file.schema().name()
    }

    /// New entity, not yet part of the file
    ///
    /// Rooted types get a fresh `GlobalId` unless one is given. The entity
    /// joins the file when it is attached, referenced or saved; object
    /// definitions that still have no parent at save time are placed in the
    /// first building storey.
    pub fn create_entity<'a, V: Into<Value>>(
        &self,
        type_name: &str,
        attributes: impl IntoIterator<Item = (&'a str, V)>,
    ) -> Result<Entity> {
        let mut attributes: Vec<(&str, Value)> =
            attributes.into_iter().map(|(name, value)| (name, value.into())).collect();
        let rooted = self
            .file
            .schema()
            .canonical_name(type_name)
            .is_some_and(|name| self.file.schema().is_subtype_of(name, "IfcRoot"));
        if rooted && !attributes.iter().any(|(name, _)| *name == "GlobalId") {
            attributes.push(("GlobalId", Value::from(new_global_id())));
        }
        let entity = self.file.new_entity(type_name, attributes)?;
        self.created.borrow_mut().push(entity.clone());
        Ok(entity)
    }

    /// Make `child` a child of `parent`; see [`relations::attach`]
    pub fn attach(&self, parent: &Entity, child: &Entity) -> Result<Entity> {
        relations::attach(parent, child)
    }

    pub fn by_id(&self, id: EntityId) -> Option<Entity> {
        self.file.by_id(id)
    }

    pub fn by_type(&self, type_name: &str, include_subtypes: bool) -> Result<Vec<Entity>> {
        let mut entities = self.file.by_type(type_name, include_subtypes)?;
        entities.extend(
            self.created
                .borrow()
                .iter()
                .filter(|e| e.is_transient())
                .filter(|e| {
                    if include_subtypes {
                        e.is_a_type(type_name)
                    } else {
                        e.type_name().eq_ignore_ascii_case(type_name)
                    }
                })
                .cloned(),
        );
        Ok(entities)
    }

    pub fn by_global_id(&self, global_id: &str) -> Option<Entity> {
        self.file.by_global_id(global_id)
    }

    pub fn by_name(&self, name: &str) -> Result<Vec<Entity>> {
        self.file.by_name(name)
    }

    pub fn projects(&self) -> Result<Vec<Entity>> {
        self.by_type("IfcProject", true)
    }

    /// The first project, typically the only one
    pub fn project(&self) -> Result<Option<Entity>> {
        Ok(self.projects()?.into_iter().next())
    }

    pub fn sites(&self) -> Result<Vec<Entity>> {
        self.by_type("IfcSite", true)
    }

    pub fn buildings(&self) -> Result<Vec<Entity>> {
        self.by_type("IfcBuilding", true)
    }

    pub fn building_storeys(&self) -> Result<Vec<Entity>> {
        self.by_type("IfcBuildingStorey", true)
    }

    /// All physical elements, placed or not
    pub fn elements(&self) -> Result<Vec<Entity>> {
        self.by_type("IfcElement", true)
    }

    /// One tree per project, following aggregation and containment
    pub fn spatial_tree(&self) -> Result<Vec<SpatialNode>> {
        let mut seen = FxHashSet::default();
        self.file
            .by_type("IfcProject", true)?
            .iter()
            .map(|project| spatial_node(project, &mut seen))
            .collect()
    }

    /// Outline of the spatial tree down to `max_level` (0 is the project)
    pub fn spatial_hierarchy(&self, max_level: usize) -> Result<String> {
        let mut out = String::new();
        for tree in self.spatial_tree()? {
            for (depth, node) in tree.iter().filter(|(depth, _)| *depth <= max_level) {
                let _ = writeln!(
                    out,
                    "{:indent$}{} {} {:?}",
                    "",
                    node.entity_type,
                    node.id,
                    node.name,
                    indent = depth * 2
                );
            }
        }
        Ok(out)
    }

    pub fn print_spatial_hierarchy(&self, max_level: usize) -> Result<()> {
        print!("{}", self.spatial_hierarchy(max_level)?);
        Ok(())
    }

    /// Write the whole model
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with(path, &WriterOptions::new())
    }

    pub fn save_with(&self, path: impl AsRef<Path>, options: &WriterOptions) -> Result<()> {
        self.place_created()?;
        self.file.save_with(path, options)
    }

    /// Write `entities` with their ancestors and descendants
    ///
    /// Aggregation, containment and property relations come along, trimmed
    /// to the entities that are written. Instance names are kept.
    pub fn export(&self, entities: &[Entity], path: impl AsRef<Path>) -> Result<()> {
        self.export_with(entities, path, &WriterOptions::new())
    }

    pub fn export_with(
        &self,
        entities: &[Entity],
        path: impl AsRef<Path>,
        options: &WriterOptions,
    ) -> Result<()> {
        let branch = self.extract(entities)?;
        branch.write(path, options)
    }

    /// The branch of `entities` as a separate session
    pub fn extract(&self, entities: &[Entity]) -> Result<Session> {
        self.place_created()?;

        let mut included: FxHashSet<EntityId> = FxHashSet::default();
        for entity in entities {
            self.file.commit(entity)?;
            included.insert(entity.id());
            included.extend(relations::ancestors(entity)?.iter().map(Entity::id));
            included.extend(relations::descendants(entity)?.iter().map(Entity::id));
        }

        let session = self.file.session();
        let mut roots: Vec<EntityId> = included.iter().copied().collect();
        roots.sort();
        let mut replacements = Vec::new();

        for kind in [RelationKind::Aggregation, RelationKind::Containment] {
            for record in session.by_type(kind.entity(), true)? {
                let relating = session.attribute_index(&record.type_name, kind.relating())?;
                let related = session.attribute_index(&record.type_name, kind.related())?;
                if !record.get_ref(relating).is_some_and(|id| included.contains(&id)) {
                    continue;
                }
                if let Some(trimmed) = trim_related(&record, related, &included) {
                    roots.push(record.id);
                    replacements.extend(trimmed);
                }
            }
        }
        for record in session.by_type(DEFINES_BY_PROPERTIES, true)? {
            let related = session.attribute_index(&record.type_name, "RelatedObjects")?;
            if let Some(trimmed) = trim_related(&record, related, &included) {
                roots.push(record.id);
                replacements.extend(trimmed);
            }
        }
        for record in session.by_type(VOIDS_ELEMENT, true)? {
            let relating = session.attribute_index(&record.type_name, "RelatingBuildingElement")?;
            if record.get_ref(relating).is_some_and(|id| included.contains(&id)) {
                roots.push(record.id);
            }
        }

        let branch = session.extract(&roots, &replacements)?;

        // Styles point at their items, so they are not reached from the branch
        let written: FxHashSet<EntityId> = branch.ids().into_iter().collect();
        let mut styled = Vec::new();
        for record in session.by_type(STYLED_ITEM, true)? {
            let item = session.attribute_index(&record.type_name, "Item")?;
            if record.get_ref(item).is_some_and(|id| written.contains(&id)) {
                styled.push(record.id);
            }
        }
        if styled.is_empty() {
            return Ok(branch);
        }
        roots.extend(styled);
        session.extract(&roots, &replacements)
    }

    /// Commit entities made through the facade and place orphans
    fn place_created(&self) -> Result<()> {
        let created = std::mem::take(&mut *self.created.borrow_mut());
        if created.is_empty() {
            return Ok(());
        }
        let storey = self.file.by_type("IfcBuildingStorey", true)?.into_iter().next();
        for entity in &created {
            self.file.commit(entity)?;
            let placeable = entity.is_a_type("IfcObjectDefinition") && !entity.is_a_type("IfcProject");
            if !placeable || relations::parent_of(entity)?.is_some() {
                continue;
            }
            match &storey {
                Some(storey) => {
                    relations::attach(storey, entity)?;
                    log::debug!("placed {:?} in {:?}", entity, storey);
                }
                None => log::warn!("{:?} has no parent and there is no storey to place it in", entity),
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("file", &self.file)
            .field("path", &self.path)
            .finish()
    }
}

/// Storey-to-storey height of template models, in millimetres
const STOREY_HEIGHT: f64 = 3000.0;

/// Copy of `record` whose related list at `index` only keeps `included` ids
///
/// `None` when nothing related is included. `Some(None)` when the list is
/// already fully included and the record can be copied as is.
fn trim_related(
    record: &DecodedEntity,
    index: usize,
    included: &FxHashSet<EntityId>,
) -> Option<Option<DecodedEntity>> {
    let related = record.get_refs(index)?;
    let kept: Vec<EntityId> = related.iter().copied().filter(|id| included.contains(id)).collect();
    if kept.is_empty() {
        return None;
    }
    if kept.len() == related.len() {
        return Some(None);
    }
    let mut trimmed = record.clone();
    trimmed.attributes[index] =
        AttributeValue::List(kept.into_iter().map(AttributeValue::EntityRef).collect());
    Some(Some(trimmed))
}

fn spatial_node(entity: &Entity, seen: &mut FxHashSet<EntityId>) -> Result<SpatialNode> {
    seen.insert(entity.id());
    let name = entity
        .get("Name")
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let mut node = SpatialNode::new(entity.id(), name, entity.type_name());
    for child in relations::children_of(entity)? {
        if seen.contains(&child.id()) {
            continue;
        }
        node.add_child(spatial_node(&child, seen)?);
    }
    Ok(node)
}

fn owner_history(file: &IfcFile) -> Result<Entity> {
    let person = file.create_entity("IfcPerson", [("FamilyName", "Unknown")])?;
    let organization = file.create_entity("IfcOrganization", [("Name", "Unknown")])?;
    let user = file.create_entity(
        "IfcPersonAndOrganization",
        [("ThePerson", &person), ("TheOrganization", &organization)],
    )?;
    let application = file.create_entity(
        "IfcApplication",
        [
            ("ApplicationDeveloper", Value::from(&organization)),
            ("Version", Value::from(env!("CARGO_PKG_VERSION"))),
            ("ApplicationFullName", Value::from("ifc-orm")),
            ("ApplicationIdentifier", Value::from("ifc-orm")),
        ],
    )?;
    file.create_entity(
        "IfcOwnerHistory",
        [
            ("OwningUser", Value::from(&user)),
            ("OwningApplication", Value::from(&application)),
            ("ChangeAction", Value::Enum("ADDED".into())),
            ("CreationDate", Value::from(chrono::Utc::now().timestamp())),
        ],
    )
}

/// Local placement `elevation` above `relative_to`
fn local_placement(file: &IfcFile, relative_to: Option<&Entity>, elevation: f64) -> Result<Entity> {
    let location = file.create_entity(
        "IfcCartesianPoint",
        [("Coordinates", Value::from(vec![0.0, 0.0, elevation]))],
    )?;
    let axes = file.create_entity("IfcAxis2Placement3D", [("Location", Value::from(&location))])?;
    file.create_entity(
        "IfcLocalPlacement",
        [
            ("PlacementRelTo", Value::from(relative_to)),
            ("RelativePlacement", Value::from(&axes)),
        ],
    )
}

fn spatial_element(
    file: &IfcFile,
    type_name: &str,
    name: &str,
    owner: &Entity,
    placement: &Entity,
    extra: &[(&str, Value)],
) -> Result<Entity> {
    let mut attributes = vec![
        ("GlobalId", Value::from(new_global_id())),
        ("OwnerHistory", Value::from(owner)),
        ("Name", Value::from(name)),
        ("ObjectPlacement", Value::from(placement)),
        ("CompositionType", Value::Enum("ELEMENT".into())),
    ];
    attributes.extend(extra.iter().cloned());
    file.create_entity(type_name, attributes)
}

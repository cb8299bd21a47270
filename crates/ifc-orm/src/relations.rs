// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parent and child links between object definitions
//!
//! Two relation kinds carry the tree:
//!
//! - **aggregation** (`IfcRelAggregates`): whole to part, used for spatial
//!   nesting (project → site → building → storey) and assemblies
//! - **containment** (`IfcRelContainedInSpatialStructure`): a physical
//!   element housed in a spatial structure
//!
//! When an object is the related side of several relations, the first one
//! found wins (aggregations before containments, each in file order) and a
//! warning is logged.

use crate::entity::Entity;
use crate::value::Value;
use ifc_orm_model::{AttributeValue, EntityId, Result};
use ifc_orm_parser::new_global_id;
use rustc_hash::FxHashSet;

pub const AGGREGATES: &str = "IfcRelAggregates";
pub const CONTAINED_IN_SPATIAL_STRUCTURE: &str = "IfcRelContainedInSpatialStructure";
pub const ASSOCIATES_MATERIAL: &str = "IfcRelAssociatesMaterial";

/// Relation kind linking a parent to a child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Aggregation,
    Containment,
}

impl RelationKind {
    pub fn entity(self) -> &'static str {
        match self {
            RelationKind::Aggregation => AGGREGATES,
            RelationKind::Containment => CONTAINED_IN_SPATIAL_STRUCTURE,
        }
    }

    /// Attribute holding the parent
    pub fn relating(self) -> &'static str {
        match self {
            RelationKind::Aggregation => "RelatingObject",
            RelationKind::Containment => "RelatingStructure",
        }
    }

    /// Attribute holding the children
    pub fn related(self) -> &'static str {
        match self {
            RelationKind::Aggregation => "RelatedObjects",
            RelationKind::Containment => "RelatedElements",
        }
    }
}

/// Whether an entity can contain elements
///
/// `IfcSpatialElement` in IFC4, `IfcSpatialStructureElement` in IFC2X3.
pub fn is_spatial(entity: &Entity) -> bool {
    entity.is_a_type("IfcSpatialElement") || entity.is_a_type("IfcSpatialStructureElement")
}

/// Relation kind `attach` uses for this pair
///
/// Spatial children and children of non-spatial parents are aggregated,
/// everything else is contained.
pub fn kind_for(parent: &Entity, child: &Entity) -> RelationKind {
    if is_spatial(child) || !is_spatial(parent) {
        RelationKind::Aggregation
    } else {
        RelationKind::Containment
    }
}

/// Relating objects of every relation listing `id` as related, in scan order
fn parent_candidates(entity: &Entity) -> Result<Vec<EntityId>> {
    let file = entity.file()?;
    let session = file.session();
    let mut out = Vec::new();
    for kind in [RelationKind::Aggregation, RelationKind::Containment] {
        for relation in session.referencing(entity.id(), kind.entity(), kind.related())? {
            if let Some(parent) = session.get(relation, kind.relating())?.as_entity_ref() {
                if !out.contains(&parent) {
                    out.push(parent);
                }
            }
        }
    }
    Ok(out)
}

/// Tie-break between parent candidates: the first one found
pub fn first_found(entity: &Entity, candidates: &[EntityId]) -> Option<EntityId> {
    if candidates.len() > 1 {
        let listed: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        log::warn!(
            "{:?} has {} parent relations ({}), using {}",
            entity,
            candidates.len(),
            listed.join(", "),
            candidates[0]
        );
    }
    candidates.first().copied()
}

/// Parent through aggregation, else through containment; `None` for roots
pub fn parent_of(entity: &Entity) -> Result<Option<Entity>> {
    if entity.is_transient() {
        return Ok(None);
    }
    let candidates = parent_candidates(entity)?;
    match first_found(entity, &candidates) {
        Some(id) => Ok(Some(entity.file()?.entity(id)?)),
        None => Ok(None),
    }
}

/// Material of the first `IfcRelAssociatesMaterial` listing `entity`
///
/// Relations whose material is missing from the file are passed over.
pub fn material_of(entity: &Entity) -> Result<Option<Entity>> {
    if entity.is_transient() {
        return Ok(None);
    }
    let file = entity.file()?;
    let relations = file
        .session()
        .referencing(entity.id(), ASSOCIATES_MATERIAL, "RelatedObjects")?;
    for relation in relations {
        if let Some(material) = file.entity(relation)?.get("RelatingMaterial")?.as_entity() {
            return Ok(Some(material.clone()));
        }
    }
    Ok(None)
}

/// Aggregated parts, then contained elements for spatial entities
///
/// Order is stable for an unchanged file; an id reached both ways is
/// listed once.
pub fn children_of(entity: &Entity) -> Result<Vec<Entity>> {
    if entity.is_transient() {
        return Ok(Vec::new());
    }
    let file = entity.file()?;
    let mut kinds = vec![RelationKind::Aggregation];
    if is_spatial(entity) {
        kinds.push(RelationKind::Containment);
    }

    let ids: Vec<EntityId> = {
        let session = file.session();
        let mut seen = FxHashSet::default();
        let mut ids = Vec::new();
        let mut refs = Vec::new();
        for kind in kinds {
            for relation in session.referencing(entity.id(), kind.entity(), kind.relating())? {
                refs.clear();
                session.get(relation, kind.related())?.collect_refs(&mut refs);
                ids.extend(refs.iter().filter(|id| seen.insert(**id)));
            }
        }
        ids
    };
    ids.into_iter().map(|id| file.entity(id)).collect()
}

/// Every entity below `entity`, depth first, each once
pub fn descendants(entity: &Entity) -> Result<Vec<Entity>> {
    let mut seen = FxHashSet::default();
    seen.insert(entity.clone());
    let mut out = Vec::new();
    let mut stack = children_of(entity)?;
    stack.reverse();
    while let Some(next) = stack.pop() {
        if !seen.insert(next.clone()) {
            continue;
        }
        let mut children = children_of(&next)?;
        children.reverse();
        stack.extend(children);
        out.push(next);
    }
    Ok(out)
}

/// Parent, grandparent and so on up to the root
pub fn ancestors(entity: &Entity) -> Result<Vec<Entity>> {
    let mut out: Vec<Entity> = Vec::new();
    let mut current = parent_of(entity)?;
    while let Some(parent) = current {
        if &parent == entity || out.contains(&parent) {
            log::warn!("{:?} is its own ancestor", parent);
            break;
        }
        current = parent_of(&parent)?;
        out.push(parent);
    }
    Ok(out)
}

/// Children, or all descendants, of type `type_name` or its subtypes
pub fn children_by_type(entity: &Entity, type_name: &str, recursive: bool) -> Result<Vec<Entity>> {
    let candidates = if recursive {
        descendants(entity)?
    } else {
        children_of(entity)?
    };
    Ok(candidates
        .into_iter()
        .filter(|e| e.is_a_type(type_name))
        .collect())
}

/// Make `child` a child of `parent` and return the relation
///
/// An existing relation of the right kind relating `parent` is extended;
/// otherwise a new one is created, owned like `parent`. Transient entities
/// are committed. Relations `child` already has elsewhere are left alone.
pub fn attach(parent: &Entity, child: &Entity) -> Result<Entity> {
    let file = parent.file()?;
    file.commit(parent)?;
    file.commit(child)?;
    let kind = kind_for(parent, child);

    let existing = file
        .session()
        .referencing(parent.id(), kind.entity(), kind.relating())?
        .first()
        .copied();

    let relation = match existing {
        Some(id) => {
            let relation = file.entity(id)?;
            let mut related = match relation.get(kind.related())? {
                Value::List(items) => items,
                Value::Null => Vec::new(),
                other => vec![other],
            };
            if !related.iter().any(|v| v.as_entity() == Some(child)) {
                related.push(Value::from(child));
                relation.set(kind.related(), Value::List(related))?;
                log::debug!("extended {:?} with {:?}", relation, child);
            }
            relation
        }
        None => {
            let mut attributes = vec![
                ("GlobalId", Value::from(new_global_id())),
                (kind.relating(), Value::from(parent)),
                (kind.related(), Value::List(vec![Value::from(child)])),
            ];
            let owner = file.session().get(parent.id(), "OwnerHistory")?;
            if let AttributeValue::EntityRef(owner) = owner {
                attributes.push(("OwnerHistory", Value::from(file.entity(owner)?)));
            }
            let relation = file.create_entity(kind.entity(), attributes)?;
            log::debug!("created {:?} for {:?} -> {:?}", relation, parent, child);
            relation
        }
    };

    child.invalidate();
    Ok(relation)
}

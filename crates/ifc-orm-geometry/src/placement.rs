// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placement records to frames and matrices
//!
//! `IfcLocalPlacement` chains through `PlacementRelTo` up to a root placement;
//! the product-to-world matrix is the product of the chain, outermost first.

use crate::error::{Error, Result};
use crate::frame::Frame;
use ifc_orm_model::{DecodedEntity, EntityId, EntityResolver};
use nalgebra::{Matrix3, Matrix4, Point2, Point3, Vector2, Vector3};
use std::sync::Arc;

/// Longest `PlacementRelTo` chain followed before assuming a cycle
const MAX_PLACEMENT_DEPTH: usize = 256;

fn fetch(resolver: &dyn EntityResolver, id: EntityId) -> Result<Arc<DecodedEntity>> {
    resolver.get(id).ok_or(Error::EntityNotFound(id))
}

fn coordinates(entity: &DecodedEntity) -> Result<Vec<f64>> {
    let list = entity
        .get_list(0)
        .ok_or_else(|| Error::invalid_attribute(entity.id, 0, "expected a coordinate list"))?;
    list.iter()
        .map(|v| {
            v.as_float()
                .ok_or_else(|| Error::invalid_attribute(entity.id, 0, "non-numeric coordinate"))
        })
        .collect()
}

/// `IfcCartesianPoint`, 2D points lie at z = 0
pub fn cartesian_point(resolver: &dyn EntityResolver, id: EntityId) -> Result<Point3<f64>> {
    let c = coordinates(&*fetch(resolver, id)?)?;
    Ok(Point3::new(
        c.first().copied().unwrap_or(0.0),
        c.get(1).copied().unwrap_or(0.0),
        c.get(2).copied().unwrap_or(0.0),
    ))
}

/// `IfcDirection` ratios, not normalized
pub fn direction(resolver: &dyn EntityResolver, id: EntityId) -> Result<Vector3<f64>> {
    let c = coordinates(&*fetch(resolver, id)?)?;
    Ok(Vector3::new(
        c.first().copied().unwrap_or(0.0),
        c.get(1).copied().unwrap_or(0.0),
        c.get(2).copied().unwrap_or(0.0),
    ))
}

/// Frame of an `IfcAxis2Placement3D` or `IfcAxis2Placement2D`
///
/// Missing axes default to world Z and X; Y is `Z x X` and X is
/// re-derived as `Y x Z`.
pub fn axis2_placement_frame(resolver: &dyn EntityResolver, id: EntityId) -> Result<Frame> {
    let placement = fetch(resolver, id)?;
    let origin = match placement.get_ref(0) {
        Some(location) => cartesian_point(resolver, location)?,
        None => Point3::origin(),
    };

    let (axis, ref_direction) = if resolver.is_subtype_of(&placement.type_name, "IfcAxis2Placement3D") {
        (placement.get_ref(1), placement.get_ref(2))
    } else if resolver.is_subtype_of(&placement.type_name, "IfcAxis2Placement2D") {
        (None, placement.get_ref(1))
    } else {
        return Err(Error::unsupported_type(placement.type_name.clone()));
    };

    let z = match axis {
        Some(d) => direction(resolver, d)?,
        None => Vector3::z(),
    };
    let x = match ref_direction {
        Some(d) => direction(resolver, d)?,
        None => Vector3::x(),
    };
    let y = z.cross(&x);
    let x = y.cross(&z);
    Ok(Frame::new(origin, x, y))
}

/// Frame of a local placement relative to its `PlacementRelTo`
pub fn relative_frame(resolver: &dyn EntityResolver, placement: EntityId) -> Result<Frame> {
    let local = fetch(resolver, placement)?;
    if !resolver.is_subtype_of(&local.type_name, "IfcLocalPlacement") {
        return Err(Error::unsupported_type(local.type_name.clone()));
    }
    let relative = local
        .get_ref(1)
        .ok_or_else(|| Error::invalid_attribute(local.id, 1, "missing RelativePlacement"))?;
    axis2_placement_frame(resolver, relative)
}

/// Placement-to-world matrix of an `IfcLocalPlacement` chain
///
/// Translations are multiplied by `scale`, converting file length units.
pub fn placement_transform(
    resolver: &dyn EntityResolver,
    placement: EntityId,
    scale: f64,
) -> Result<Matrix4<f64>> {
    let mut matrix = Matrix4::identity();
    let mut current = Some(placement);
    let mut depth = 0;

    while let Some(id) = current {
        depth += 1;
        if depth > MAX_PLACEMENT_DEPTH {
            return Err(Error::geometry(format!("placement chain through {} does not terminate", id)));
        }
        let mut step = relative_frame(resolver, id)?;
        step.origin *= scale;
        matrix = step.to_matrix() * matrix;
        current = fetch(resolver, id)?.get_ref(0);
    }
    Ok(matrix)
}

/// World matrix of a product's `ObjectPlacement`, identity when it has none
pub fn object_transform(
    resolver: &dyn EntityResolver,
    product: &DecodedEntity,
    scale: f64,
) -> Result<Matrix4<f64>> {
    match product.get_ref(5) {
        Some(placement) => placement_transform(resolver, placement, scale),
        None => Ok(Matrix4::identity()),
    }
}

/// 2D homogeneous matrix of an `IfcAxis2Placement2D`, used for profile positions
pub fn placement_2d(resolver: &dyn EntityResolver, id: EntityId) -> Result<Matrix3<f64>> {
    let frame = axis2_placement_frame(resolver, id)?;
    let x = Vector2::new(frame.xaxis.x, frame.xaxis.y);
    let y = Vector2::new(frame.yaxis.x, frame.yaxis.y);
    let o = Point2::new(frame.origin.x, frame.origin.y);
    Ok(Matrix3::new(x.x, y.x, o.x, x.y, y.y, o.y, 0.0, 0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ifc_orm_parser::Session;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCCARTESIANPOINT((0.,0.,0.));
#2=IFCAXIS2PLACEMENT3D(#1,$,$);
#3=IFCLOCALPLACEMENT($,#2);
#4=IFCCARTESIANPOINT((1000.,0.,500.));
#5=IFCDIRECTION((0.,0.,1.));
#6=IFCDIRECTION((0.,1.,0.));
#7=IFCAXIS2PLACEMENT3D(#4,#5,#6);
#8=IFCLOCALPLACEMENT(#3,#7);
#9=IFCCARTESIANPOINT((0.,2000.,0.));
#10=IFCAXIS2PLACEMENT3D(#9,$,$);
#11=IFCLOCALPLACEMENT(#8,#10);
#12=IFCLOCALPLACEMENT(#13,#2);
#13=IFCLOCALPLACEMENT(#12,#2);
#14=IFCCARTESIANPOINT((1.,2.));
#15=IFCDIRECTION((0.,1.));
#16=IFCAXIS2PLACEMENT2D(#14,#15);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_relative_frame_rotates() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let frame = relative_frame(&session, EntityId(8)).unwrap();
        assert_eq!(frame.origin, Point3::new(1000.0, 0.0, 500.0));
        assert_relative_eq!(frame.xaxis, Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(frame.yaxis, -Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn test_chain_is_composed_and_scaled() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let matrix = placement_transform(&session, EntityId(11), 0.001).unwrap();
        let origin = matrix.transform_point(&Point3::origin());
        // (0, 2) in the rotated parent lands at (-2, 0) from its origin (1, 0, 0.5)
        assert_relative_eq!(origin, Point3::new(-1.0, 0.0, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_cycles_are_reported() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let err = placement_transform(&session, EntityId(12), 1.0).unwrap_err();
        assert!(err.to_string().contains("does not terminate"));
    }

    #[test]
    fn test_profile_placement_2d() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let matrix = placement_2d(&session, EntityId(16)).unwrap();
        let p = matrix.transform_point(&Point2::new(1.0, 0.0));
        assert_relative_eq!(p, Point2::new(1.0, 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_missing_references() {
        let session = Session::from_content(TEST_IFC).unwrap();
        assert!(matches!(
            cartesian_point(&session, EntityId(99)),
            Err(Error::EntityNotFound(EntityId(99)))
        ));
        assert!(matches!(
            relative_frame(&session, EntityId(2)),
            Err(Error::UnsupportedType(_))
        ));
    }
}

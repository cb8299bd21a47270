// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unit scale extraction and angle conversions

use ifc_orm_model::{AttributeValue, DecodedEntity, EntityResolver};

/// Project length unit as a factor to metres
///
/// Returns 1.0 if no unit information is found.
pub fn extract_unit_scale(resolver: &dyn EntityResolver) -> f64 {
    unit_scale(resolver, "LENGTHUNIT").unwrap_or(1.0)
}

/// Factor from the project's unit of `unit_type` to the SI base unit
///
/// `unit_type` is an `IfcUnitEnum` item such as `LENGTHUNIT` or
/// `PLANEANGLEUNIT`. Area and volume prefixes are squared and cubed.
pub fn unit_scale(resolver: &dyn EntityResolver, unit_type: &str) -> Option<f64> {
    let projects = resolver.by_type("IfcProject", true);
    let project = projects.first()?;

    // UnitsInContext follows GlobalId .. RepresentationContexts in both schema versions
    let assignment = resolver.resolve_ref(project.get(8)?)?;
    let units = assignment.get_list(0)?;

    units
        .iter()
        .filter_map(|unit| resolver.resolve_ref(unit))
        .find_map(|unit| named_unit_scale(&unit, unit_type, resolver))
}

fn named_unit_scale(
    unit: &DecodedEntity,
    unit_type: &str,
    resolver: &dyn EntityResolver,
) -> Option<f64> {
    if unit.get_enum(1)? != unit_type {
        return None;
    }
    if resolver.is_subtype_of(&unit.type_name, "IfcSIUnit") {
        si_unit_scale(unit)
    } else if resolver.is_subtype_of(&unit.type_name, "IfcConversionBasedUnit") {
        conversion_unit_scale(unit, resolver)
    } else {
        None
    }
}

/// IFCSIUNIT(*, UnitType, Prefix, Name)
fn si_unit_scale(unit: &DecodedEntity) -> Option<f64> {
    let prefix = match unit.get(2) {
        Some(AttributeValue::Enum(p)) => si_prefix_scale(p),
        _ => 1.0,
    };
    let power = match unit.get_enum(3)? {
        "SQUARE_METRE" => 2,
        "CUBIC_METRE" => 3,
        _ => 1,
    };
    Some(prefix.powi(power))
}

/// Factor of an `IfcSIPrefix` item, 1.0 for unknown items
pub fn si_prefix_scale(prefix: &str) -> f64 {
    match prefix {
        "EXA" => 1e18,
        "PETA" => 1e15,
        "TERA" => 1e12,
        "GIGA" => 1e9,
        "MEGA" => 1e6,
        "KILO" => 1e3,
        "HECTO" => 1e2,
        "DECA" => 1e1,
        "DECI" => 1e-1,
        "CENTI" => 1e-2,
        "MILLI" => 1e-3,
        "MICRO" => 1e-6,
        "NANO" => 1e-9,
        "PICO" => 1e-12,
        "FEMTO" => 1e-15,
        "ATTO" => 1e-18,
        _ => 1.0,
    }
}

/// IFCCONVERSIONBASEDUNIT(Dimensions, UnitType, Name, ConversionFactor)
fn conversion_unit_scale(unit: &DecodedEntity, resolver: &dyn EntityResolver) -> Option<f64> {
    let factor = resolver.get(unit.get_ref(3)?)?;
    if !resolver.is_subtype_of(&factor.type_name, "IfcMeasureWithUnit") {
        return None;
    }

    // IFCMEASUREWITHUNIT(ValueComponent, UnitComponent)
    let value = factor.get_float(0)?;
    let base = factor
        .get_ref(1)
        .and_then(|id| resolver.get(id))
        .and_then(|base| {
            let unit_type = base.get_enum(1)?.to_string();
            named_unit_scale(&base, &unit_type, resolver)
        })
        .unwrap_or(1.0);

    Some(value * base)
}

/// Degrees from an `IfcCompoundPlaneAngleMeasure`
///
/// Components are degrees, minutes, seconds and optionally millionths of a
/// second. All components share the sign of the angle.
pub fn compound_plane_angle_to_degrees(components: &[i64]) -> f64 {
    let divisors = [1.0, 60.0, 3600.0, 3_600_000_000.0];
    components
        .iter()
        .zip(divisors)
        .map(|(&c, d)| c as f64 / d)
        .sum()
}

/// Inverse of [`compound_plane_angle_to_degrees`], with millionths of a second
pub fn degrees_to_compound_plane_angle(degrees: f64) -> [i64; 4] {
    let sign = if degrees < 0.0 { -1 } else { 1 };
    let total = (degrees.abs() * 3_600_000_000.0).round() as i64;
    let d = total / 3_600_000_000;
    let m = (total / 60_000_000) % 60;
    let s = (total / 1_000_000) % 60;
    let u = total % 1_000_000;
    [sign * d, sign * m, sign * s, sign * u]
}

/// Common unit scales for reference
pub mod scales {
    /// Meters to meters (identity)
    pub const METRE: f64 = 1.0;
    /// Millimeters to meters
    pub const MILLIMETRE: f64 = 0.001;
    /// Centimeters to meters
    pub const CENTIMETRE: f64 = 0.01;
    /// Inches to meters
    pub const INCH: f64 = 0.0254;
    /// Feet to meters
    pub const FOOT: f64 = 0.3048;
    /// Degrees to radians
    pub const DEGREE: f64 = std::f64::consts::PI / 180.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;
    use approx::assert_relative_eq;

    const FEET_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Project',$,$,$,$,$,#2);
#2=IFCUNITASSIGNMENT((#3,#6,#7,#8));
#3=IFCCONVERSIONBASEDUNIT(#4,.LENGTHUNIT.,'FOOT',#5);
#4=IFCDIMENSIONALEXPONENTS(1,0,0,0,0,0,0);
#5=IFCMEASUREWITHUNIT(IFCLENGTHMEASURE(0.3048),#6);
#6=IFCSIUNIT(*,.LENGTHUNIT.,$,.METRE.);
#7=IFCSIUNIT(*,.AREAUNIT.,.CENTI.,.SQUARE_METRE.);
#8=IFCSIUNIT(*,.PLANEANGLEUNIT.,$,.RADIAN.);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_conversion_based_length_unit() {
        let session = Session::from_content(FEET_IFC).unwrap();
        assert_relative_eq!(extract_unit_scale(&session), scales::FOOT);
    }

    #[test]
    fn test_area_prefix_is_squared() {
        let session = Session::from_content(FEET_IFC).unwrap();
        assert_relative_eq!(unit_scale(&session, "AREAUNIT").unwrap(), 1e-4);
        assert_relative_eq!(unit_scale(&session, "PLANEANGLEUNIT").unwrap(), 1.0);
        assert!(unit_scale(&session, "VOLUMEUNIT").is_none());
    }

    #[test]
    fn test_compound_plane_angle() {
        assert_relative_eq!(compound_plane_angle_to_degrees(&[51, 30, 0]), 51.5);
        assert_relative_eq!(compound_plane_angle_to_degrees(&[-0, -7, -30, 0]), -0.125);
        assert_eq!(degrees_to_compound_plane_angle(51.5), [51, 30, 0, 0]);
        assert_eq!(degrees_to_compound_plane_angle(-0.125), [0, -7, -30, 0]);
    }
}

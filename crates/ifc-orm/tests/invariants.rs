// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use ifc_orm::ifc4::{IfcDimensionalExponents, IfcSIUnit};
use ifc_orm::psets::{from_records, to_records};
use ifc_orm::relations::{children_of, parent_of};
use ifc_orm::{
    property_map, AsEntity, EntityId, FileOptions, IfcFile, PropertyMap, PropertyValue, Value,
};
use ifc_orm_model::DecodedEntity;
use pretty_assertions::assert_eq;

const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('tree.ifc','2024-01-01T00:00:00',(''),(''),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Project',$,$,$,$,$,$);
#2=IFCSITE('1bL1Oqlj5Chxbh2KR2Gd1a',$,'Site',$,$,$,$,$,.ELEMENT.,$,$,$,$,$);
#3=IFCBUILDING('2ldMIM1ALB7wF5yGjTCYtj',$,'Building',$,$,$,$,$,.ELEMENT.,$,$,$);
#4=IFCBUILDINGSTOREY('0B_jCDv8D4j9n0K_nU0hZz',$,'Ground',$,$,$,$,$,.ELEMENT.,0.);
#5=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall',$,$,$,$,$,$);
#6=IFCSLAB('2O2Fr$t4X7Zf8NOew3FLOI',$,'Slab',$,$,$,$,$,$);
#7=IFCBUILDINGSTOREY('0B_jCDv8D4j9n0K_nU0hZ0',$,'First',$,$,$,$,$,.ELEMENT.,3.);
#8=IFCSPACE('0B_jCDv8D4j9n0K_nU0hZ1',$,'Room',$,$,$,$,$,.ELEMENT.,$,$);
#9=IFCBUILDINGELEMENTPROXY('2O2Fr$t4X7Zf8NOew3FLOJ',$,'Desk',$,$,$,$,$,$);
#10=IFCRELAGGREGATES('3kN2pA0Mj4OBYUGHx1qJxT',$,$,$,#1,(#2));
#11=IFCRELAGGREGATES('3kN2pA0Mj4OBYUGHx1qJxU',$,$,$,#2,(#3));
#12=IFCRELAGGREGATES('3kN2pA0Mj4OBYUGHx1qJxV',$,$,$,#3,(#4,#7));
#13=IFCRELCONTAINEDINSPATIALSTRUCTURE('3kN2pA0Mj4OBYUGHx1qJxW',$,$,$,(#5,#6),#4);
#14=IFCRELAGGREGATES('3kN2pA0Mj4OBYUGHx1qJxX',$,$,$,#7,(#8));
#15=IFCRELCONTAINEDINSPATIALSTRUCTURE('3kN2pA0Mj4OBYUGHx1qJxY',$,$,$,(#9),#8);
#20=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
ENDSEC;
END-ISO-10303-21;
"#;

fn file() -> IfcFile {
    IfcFile::from_content(TEST_IFC, FileOptions::new()).unwrap()
}

#[test]
fn test_one_handle_per_instance_name() {
    let file = file();
    for id in file.session().ids() {
        let first = file.entity(id).unwrap();
        let record = file.session().record(id).unwrap();
        assert_eq!(file.entity(id).unwrap(), first);
        assert_eq!(file.wrap(&record), first);
    }
    let walls = file.by_type("IfcWall", false).unwrap();
    assert_eq!(walls[0], file.entity(EntityId(5)).unwrap());
}

#[test]
fn test_transient_records_are_never_shared() {
    let file = file();
    let record = DecodedEntity::new(EntityId::TRANSIENT, "IFCWALL", Vec::new());
    let a = file.wrap(&record);
    let b = file.wrap(&record);
    assert!(a.is_transient());
    assert_eq!(a.type_name(), "IfcWall");
    assert_ne!(a, b);
}

#[test]
fn test_children_point_back_to_their_parent() {
    let file = file();
    for id in file.session().ids_of_type("IfcObjectDefinition", true).unwrap() {
        let parent = file.entity(id).unwrap();
        for child in children_of(&parent).unwrap() {
            assert_eq!(
                parent_of(&child).unwrap().as_ref(),
                Some(&parent),
                "{:?} under {:?}",
                child,
                parent
            );
        }
    }
    // Spaces aggregate under storeys and contain their own elements
    let space = file.entity(EntityId(8)).unwrap();
    assert_eq!(parent_of(&space).unwrap().map(|p| p.id()), Some(EntityId(7)));
    assert_eq!(
        children_of(&space).unwrap().iter().map(|c| c.id()).collect::<Vec<_>>(),
        vec![EntityId(9)]
    );
}

#[test]
fn test_property_maps_survive_encoding() {
    let file = file();
    let maps: Vec<PropertyMap> = vec![
        property_map! { "Flag" => false },
        property_map! { "Ratio" => 0.25, "Count" => -4, "Label" => "", "Note" => "it's" },
        property_map! {
            "Nested" => property_map! {
                "Deeper" => property_map! {
                    "Deepest" => property_map! { "Leaf" => vec![1, 2, 3] },
                },
                "Tags" => vec!["a", "b"],
            },
            "Mixed" => PropertyValue::List(vec![
                PropertyValue::Bool(true),
                PropertyValue::Map(property_map! { "k" => "v" }),
                PropertyValue::List(vec![PropertyValue::Real(1.5)]),
            ]),
        },
    ];
    for map in maps {
        let set = to_records(&file, "Pset_Test", &map).unwrap();
        assert_eq!(from_records(&set).unwrap(), map);
    }
}

#[test]
fn test_writing_a_derived_attribute_changes_nothing() {
    let file = file();
    let unit = file.entity(EntityId(20)).unwrap().cast::<IfcSIUnit>().unwrap();
    let exponents = file
        .create_entity(
            "IfcDimensionalExponents",
            [
                ("LengthExponent", 1_i64),
                ("MassExponent", 0),
                ("TimeExponent", 0),
                ("ElectricCurrentExponent", 0),
                ("ThermodynamicTemperatureExponent", 0),
                ("AmountOfSubstanceExponent", 0),
                ("LuminousIntensityExponent", 0),
            ],
        )
        .unwrap()
        .cast::<IfcDimensionalExponents>()
        .unwrap();

    assert_eq!(unit.dimensions().unwrap(), None);
    unit.set_dimensions(Some(exponents.clone())).unwrap();
    assert_eq!(unit.dimensions().unwrap(), None);

    let entity = unit.as_entity();
    entity.set("Dimensions", Value::from(exponents.as_entity())).unwrap();
    assert_eq!(entity.get("Dimensions").unwrap(), Value::Derived);
    assert!(!file.to_step(&Default::default()).unwrap().contains("#20=IFCSIUNIT(#"));
}

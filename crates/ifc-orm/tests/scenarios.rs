// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end workflows: read, edit, save, read back

use ifc_orm::ifc4::{IfcBuildingStorey, IfcProject, IfcWall};
use ifc_orm::{
    property_map, AsEntity, EntityId, Error, FileOptions, IfcFile, Model, ObjectDefinitionExt,
    ObjectExt, PropertySets, Value,
};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('minimal.ifc','2024-01-01T00:00:00',(''),(''),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Project',$,$,$,$,$,$);
#2=IFCSITE('1bL1Oqlj5Chxbh2KR2Gd1a',$,'Site',$,$,$,$,$,.ELEMENT.,$,$,$,$,$);
#3=IFCBUILDING('2ldMIM1ALB7wF5yGjTCYtj',$,'Building',$,$,$,$,$,.ELEMENT.,$,$,$);
#4=IFCBUILDINGSTOREY('0B_jCDv8D4j9n0K_nU0hZz',$,'Ground',$,$,$,$,$,.ELEMENT.,0.);
#5=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall',$,$,$,$,$,$);
#10=IFCRELAGGREGATES('3kN2pA0Mj4OBYUGHx1qJxT',$,$,$,#1,(#2));
#11=IFCRELAGGREGATES('3kN2pA0Mj4OBYUGHx1qJxU',$,$,$,#2,(#3));
#12=IFCRELAGGREGATES('3kN2pA0Mj4OBYUGHx1qJxV',$,$,$,#3,(#4));
#13=IFCRELCONTAINEDINSPATIALSTRUCTURE('3kN2pA0Mj4OBYUGHx1qJxW',$,$,$,(#5),#4);
ENDSEC;
END-ISO-10303-21;
"#;

fn file() -> IfcFile {
    IfcFile::from_content(TEST_IFC, FileOptions::new()).unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ifc-orm-{}-{}.ifc", name, std::process::id()))
}

#[test]
fn test_wall_parent_is_its_storey() {
    let file = file();
    let wall = file.entity(EntityId(5)).unwrap().cast::<IfcWall>().unwrap();
    let storey = file.entity(EntityId(4)).unwrap().cast::<IfcBuildingStorey>().unwrap();

    assert_eq!(wall.parent().unwrap().as_ref(), Some(storey.as_entity()));
    assert_eq!(storey.children().unwrap(), vec![wall.as_entity().clone()]);
}

#[test]
fn test_attached_element_survives_save() {
    let file = file();
    let storey = file.entity(EntityId(4)).unwrap().cast::<IfcBuildingStorey>().unwrap();
    let column = file
        .new_entity(
            "IfcColumn",
            [
                ("GlobalId", Value::from("1hqIFTRjfV6AWq_bMtnZwI")),
                ("Name", Value::from("C1")),
            ],
        )
        .unwrap();
    assert!(column.is_transient());

    ifc_orm::relations::attach(storey.as_entity(), &column).unwrap();
    assert!(!column.is_transient());

    let path = temp_path("attach");
    file.save(&path).unwrap();

    let back = IfcFile::open(&path).unwrap();
    let storey = back.entity(EntityId(4)).unwrap().cast::<IfcBuildingStorey>().unwrap();
    let names: Vec<Value> = storey
        .children()
        .unwrap()
        .iter()
        .map(|c| c.get("Name").unwrap())
        .collect();
    assert_eq!(names, vec![Value::from("Wall"), Value::from("C1")]);
    let column = back.by_global_id("1hqIFTRjfV6AWq_bMtnZwI").unwrap();
    assert_eq!(column.is_a(), "IfcColumn");
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_attribute_lookup_by_name() {
    let file = file();
    let wall = file.entity(EntityId(5)).unwrap();
    assert_eq!(wall.get("Name").unwrap(), Value::from("Wall"));
    assert_eq!(
        wall.cast::<IfcWall>().unwrap().name().unwrap().as_deref(),
        Some("Wall")
    );
    assert!(matches!(
        wall.get("NoSuchAttribute"),
        Err(Error::UnknownAttribute { .. })
    ));
}

#[test]
fn test_property_sets_read_back_equal() {
    let file = file();
    let wall = file.entity(EntityId(5)).unwrap().cast::<IfcWall>().unwrap();
    let mut sets = PropertySets::new();
    sets.insert(
        "Pset_Custom".to_string(),
        property_map! { "Flag" => true, "Count" => 3, "Label" => "x" },
    );
    wall.set_property_sets(&sets).unwrap();

    let text = file.to_step(&ifc_orm::WriterOptions::new()).unwrap();
    let back = IfcFile::from_content(text, FileOptions::new()).unwrap();
    let wall = back.entity(EntityId(5)).unwrap().cast::<IfcWall>().unwrap();
    let read = wall.property_sets().unwrap();
    assert_eq!(read, sets);
    assert!(!read["Pset_Custom"].contains_key("id"));
}

#[test]
fn test_generation_is_deterministic() {
    let compiled = [
        ("IFC4", include_str!(concat!(env!("OUT_DIR"), "/ifc4.rs"))),
        ("IFC2X3", include_str!(concat!(env!("OUT_DIR"), "/ifc2x3.rs"))),
    ];
    for (name, compiled) in compiled {
        let schema = ifc_orm_schema::load(name).unwrap();
        let generate = || {
            ifc_orm_codegen::Generator::new(&schema)
                .with_runtime_path("crate")
                .with_extensions(ifc_orm_codegen::Extensions::runtime_defaults("crate"))
                .generate()
                .unwrap()
                .source
        };
        let first = generate();
        assert!(first == generate(), "{} output differs between runs", name);
        assert!(first == compiled, "{} output differs from the compiled classes", name);
    }
}

#[test]
fn test_template_round_trip() {
    let model = Model::template("IFC4", 2).unwrap();
    let storey = model.building_storeys().unwrap()[1].clone();
    let slab = model.create_entity("IfcSlab", [("Name", "Roof")]).unwrap();
    model.attach(&storey, &slab).unwrap();
    let orphan = model.create_entity("IfcWall", [("Name", "Loose")]).unwrap();

    let path = temp_path("template");
    model.save(&path).unwrap();
    assert!(!orphan.is_transient());

    let back = Model::open(&path).unwrap();
    let project = back.project().unwrap().unwrap().cast::<IfcProject>().unwrap();
    assert_eq!(project.name().unwrap().as_deref(), Some("Default Project"));

    let storeys = back.building_storeys().unwrap();
    let children = |storey: &ifc_orm::Entity| -> Vec<Value> {
        storey
            .cast::<IfcBuildingStorey>()
            .unwrap()
            .children()
            .unwrap()
            .iter()
            .map(|c| c.get("Name").unwrap())
            .collect()
    };
    assert_eq!(children(&storeys[0]), vec![Value::from("Loose")]);
    assert_eq!(children(&storeys[1]), vec![Value::from("Roof")]);
    std::fs::remove_file(&path).unwrap();
}

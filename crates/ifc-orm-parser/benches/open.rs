// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ifc_orm_model::EntityId;
use ifc_orm_parser::{Session, WriterOptions};
use std::fmt::Write;
use std::hint::black_box;

/// A storey holding `walls` walls, each with its own placement
fn synthetic_file(walls: usize) -> String {
    let mut out = String::from(
        "ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION((''),'2;1');\n\
         FILE_NAME('bench.ifc','',(''),(''),'','','');\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n\
         #1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Bench',$,$,$,$,$,#2);\n\
         #2=IFCUNITASSIGNMENT((#3));\n\
         #3=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);\n\
         #4=IFCBUILDINGSTOREY('2Sd5o$Tsn8Pf3CR9qqlW3F',$,'Level',$,$,$,$,$,.ELEMENT.,0.);\n",
    );
    let mut related = Vec::with_capacity(walls);
    for i in 0..walls {
        let base = 10 + i * 4;
        let _ = writeln!(out, "#{}=IFCCARTESIANPOINT(({}.,0.,0.));", base, i);
        let _ = writeln!(out, "#{}=IFCAXIS2PLACEMENT3D(#{},$,$);", base + 1, base);
        let _ = writeln!(out, "#{}=IFCLOCALPLACEMENT($,#{});", base + 2, base + 1);
        let _ = writeln!(
            out,
            "#{}=IFCWALL('{}',$,'Wall {}',$,$,#{},$,$,.SOLIDWALL.);",
            base + 3,
            ifc_orm_parser::new_global_id(),
            i,
            base + 2
        );
        related.push(format!("#{}", base + 3));
    }
    let _ = writeln!(
        out,
        "#{}=IFCRELCONTAINEDINSPATIALSTRUCTURE('0Lp7$xMfz6Tf4ALLm2JkT1',$,$,$,({}),#4);",
        10 + walls * 4,
        related.join(",")
    );
    out.push_str("ENDSEC;\nEND-ISO-10303-21;\n");
    out
}

fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("open");
    for walls in [1_000, 10_000] {
        let content = synthetic_file(walls);
        group.bench_with_input(BenchmarkId::from_parameter(walls), &content, |b, content| {
            b.iter(|| Session::from_content(black_box(content.as_str())).unwrap())
        });
    }
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let content = synthetic_file(10_000);
    let session = Session::from_content(content).unwrap();

    c.bench_function("by_type IfcWall", |b| {
        b.iter(|| session.by_type(black_box("IfcWall"), true).unwrap().len())
    });
    c.bench_function("referencing contained wall", |b| {
        b.iter(|| {
            session
                .referencing(
                    black_box(EntityId(13)),
                    "IfcRelContainedInSpatialStructure",
                    "RelatedElements",
                )
                .unwrap()
        })
    });
    c.bench_function("to_step", |b| {
        let options = WriterOptions::new().with_timestamp("2024-01-01T00:00:00");
        b.iter(|| session.to_step(&options).unwrap().len())
    });
}

criterion_group!(benches, bench_open, bench_queries);
criterion_main!(benches);

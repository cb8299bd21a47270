// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generates the typed entity classes for every embedded schema version

use ifc_orm_codegen::{Extensions, Generator};
use std::env::var;
use std::error::Error;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(var("OUT_DIR")?);

    for name in ifc_orm_schema::available() {
        let schema = ifc_orm_schema::load(name)?;
        let generated = Generator::new(&schema)
            .with_runtime_path("crate")
            .with_extensions(Extensions::runtime_defaults("crate"))
            .generate()?;

        for (declaration, reason) in &generated.skipped {
            println!("cargo:warning=skipped {}: {}", declaration, reason);
        }

        let path = out_dir.join(format!("{}.rs", name.to_ascii_lowercase()));
        generated.write_to(&path)?;
    }
    Ok(())
}

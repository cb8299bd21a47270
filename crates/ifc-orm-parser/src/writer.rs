// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP physical file writer

use crate::header::write_header;
use crate::session::Session;
use ifc_orm_model::{Error, Result};

/// Value written as FILE_NAME's preprocessor version
pub const PREPROCESSOR: &str = concat!("ifc-orm ", env!("CARGO_PKG_VERSION"));

/// Header fields filled in on write
///
/// Fields left unset keep the value read from the source file.
///
/// # Example
///
/// ```
/// use ifc_orm_parser::WriterOptions;
///
/// let options = WriterOptions::new()
///     .with_author("J. Doe")
///     .with_timestamp("2024-05-01T12:00:00");
/// assert_eq!(options.author.as_deref(), Some("J. Doe"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct WriterOptions {
    pub author: Option<String>,
    pub organization: Option<String>,
    pub originating_system: Option<String>,
    pub file_name: Option<String>,
    /// Fixed timestamp instead of the current local time
    pub timestamp: Option<String>,
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_originating_system(mut self, system: impl Into<String>) -> Self {
        self.originating_system = Some(system.into());
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// Render header and DATA section, records ordered by id
pub(crate) fn write_step(session: &Session, options: &WriterOptions) -> Result<String> {
    let mut metadata = session.metadata().clone();
    metadata.schema_version = session.schema().name().to_string();
    metadata.timestamp = Some(
        options
            .timestamp
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()),
    );
    metadata.preprocessor_version = Some(PREPROCESSOR.to_string());
    if options.file_name.is_some() {
        metadata.file_name = options.file_name.clone();
    }
    if options.author.is_some() {
        metadata.author = options.author.clone();
    }
    if options.organization.is_some() {
        metadata.organization = options.organization.clone();
    }
    if options.originating_system.is_some() {
        metadata.originating_system = options.originating_system.clone();
    }

    let ids = session.ids();
    let mut out = String::with_capacity(256 + ids.len() * 96);
    out.push_str("ISO-10303-21;\n");
    out.push_str(&write_header(&metadata));
    out.push_str("DATA;\n");

    let mut verbatim = 0usize;
    for id in ids {
        if let Some(text) = session.verbatim(id) {
            out.push_str(text);
            verbatim += 1;
        } else {
            let record = session.by_id(id).ok_or(Error::EntityNotFound(id))?;
            out.push_str(&record.to_step_line());
        }
        out.push('\n');
    }
    out.push_str("ENDSEC;\nEND-ISO-10303-21;\n");

    log::debug!(
        "serialized {} records, {} copied verbatim",
        session.len(),
        verbatim
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_orm_model::{AttributeValue, EntityId};
    use pretty_assertions::assert_eq;

    const TEST_IFC: &str = "ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('in.ifc','2020-01-01T00:00:00',('Someone'),('Org'),'x','App','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#2=IFCUNITASSIGNMENT((#3));
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Project',$,$,$,$,$,#2);
#3=IFCSIUNIT( *, .LENGTHUNIT., .MILLI., .METRE.);
ENDSEC;
END-ISO-10303-21;
";

    fn options() -> WriterOptions {
        WriterOptions::new()
            .with_timestamp("2024-05-01T12:00:00")
            .with_file_name("out.ifc")
    }

    #[test]
    fn test_untouched_records_are_verbatim_and_sorted() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let text = session.to_step(&options()).unwrap();
        let data: Vec<&str> = text
            .lines()
            .skip_while(|l| *l != "DATA;")
            .skip(1)
            .take_while(|l| *l != "ENDSEC;")
            .collect();
        assert_eq!(
            data,
            vec![
                "#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Project',$,$,$,$,$,#2);",
                "#2=IFCUNITASSIGNMENT((#3));",
                "#3=IFCSIUNIT( *, .LENGTHUNIT., .MILLI., .METRE.);",
            ]
        );
        assert!(text.contains("FILE_NAME('out.ifc','2024-05-01T12:00:00',('Someone'),('Org')"));
    }

    #[test]
    fn test_edited_records_are_reserialized() {
        let mut session = Session::from_content(TEST_IFC).unwrap();
        session
            .set(EntityId(1), "Name", AttributeValue::String("Haus 'Süd'".into()))
            .unwrap();
        let text = session.to_step(&options().with_author("Me")).unwrap();
        assert!(text.contains("#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Haus ''S\\X2\\00FC\\X0\\d''',$,$,$,$,$,#2);"));
        assert!(text.contains("('Me')"));

        let reread = Session::from_content(text).unwrap();
        assert_eq!(
            reread.get(EntityId(1), "Name").unwrap(),
            AttributeValue::String("Haus 'Süd'".into())
        );
        assert_eq!(reread.metadata().preprocessor_version.as_deref(), Some(PREPROCESSOR));
    }

    #[test]
    fn test_created_file_round_trips() {
        let mut session = Session::create("IFC2X3").unwrap();
        let unit = session
            .create_record(
                "IfcSIUnit",
                [
                    ("UnitType", AttributeValue::Enum("LENGTHUNIT".into())),
                    ("Name", AttributeValue::Enum("METRE".into())),
                ],
            )
            .unwrap();
        let id = session.add(unit).unwrap();
        assert_eq!(id, EntityId(1));

        let text = session.to_step(&options()).unwrap();
        assert!(text.contains("FILE_SCHEMA(('IFC2X3'));"));
        assert!(text.contains("#1=IFCSIUNIT(*,.LENGTHUNIT.,$,.METRE.);"));
        assert_eq!(Session::from_content(text).unwrap().len(), 1);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HEADER section: FILE_DESCRIPTION, FILE_NAME and FILE_SCHEMA

use crate::scanner::header_section;
use crate::tokenizer::parse_header_records;
use ifc_orm_model::{escape_step_string, AttributeValue, Error, ModelMetadata, Result};

/// Parse the header section into metadata
///
/// A missing `FILE_SCHEMA` record is an error, other records are optional.
pub fn parse_header(content: &str) -> Result<ModelMetadata> {
    let section = header_section(content)
        .ok_or_else(|| Error::InvalidHeader("missing HEADER section".into()))?;

    let mut info = ModelMetadata::default();
    let mut has_schema = false;

    for (name, args) in parse_header_records(section)? {
        match name.to_ascii_uppercase().as_str() {
            "FILE_DESCRIPTION" => {
                info.description = strings(args.first());
                info.implementation_level = string(args.get(1));
            }
            "FILE_NAME" => {
                info.file_name = string(args.first());
                info.timestamp = string(args.get(1));
                info.author = strings(args.get(2)).into_iter().next();
                info.organization = strings(args.get(3)).into_iter().next();
                info.preprocessor_version = string(args.get(4));
                info.originating_system = string(args.get(5));
            }
            "FILE_SCHEMA" => {
                let schemas = strings(args.first());
                if let Some(first) = schemas.into_iter().next() {
                    info.schema_version = first;
                    has_schema = true;
                }
            }
            other => log::debug!("ignoring header record {}", other),
        }
    }

    if !has_schema {
        return Err(Error::InvalidHeader("missing FILE_SCHEMA".into()));
    }
    Ok(info)
}

fn string(value: Option<&AttributeValue>) -> Option<String> {
    value
        .and_then(|v| v.as_string())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn strings(value: Option<&AttributeValue>) -> Vec<String> {
    match value {
        Some(AttributeValue::List(items)) => items
            .iter()
            .filter_map(|v| v.as_string())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        other => string(other).into_iter().collect(),
    }
}

/// Render the HEADER section for `metadata`, including the section keywords
pub fn write_header(metadata: &ModelMetadata) -> String {
    let quote = |s: &Option<String>| format!("'{}'", escape_step_string(s.as_deref().unwrap_or("")));
    let list = |items: &[String]| {
        let quoted: Vec<String> = items
            .iter()
            .map(|s| format!("'{}'", escape_step_string(s)))
            .collect();
        format!("({})", quoted.join(","))
    };

    let description = if metadata.description.is_empty() {
        vec!["ViewDefinition [CoordinationView]".to_string()]
    } else {
        metadata.description.clone()
    };
    let level = metadata
        .implementation_level
        .clone()
        .or_else(|| Some("2;1".to_string()));

    let mut out = String::from("HEADER;\n");
    out.push_str(&format!(
        "FILE_DESCRIPTION({},{});\n",
        list(&description),
        quote(&level)
    ));
    out.push_str(&format!(
        "FILE_NAME({},{},{},{},{},{},'');\n",
        quote(&metadata.file_name),
        quote(&metadata.timestamp),
        list(metadata.author.as_slice()),
        list(metadata.organization.as_slice()),
        quote(&metadata.preprocessor_version),
        quote(&metadata.originating_system),
    ));
    out.push_str(&format!(
        "FILE_SCHEMA(('{}'));\n",
        escape_step_string(&metadata.schema_version)
    ));
    out.push_str("ENDSEC;\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('test.ifc','2024-01-01T00:00:00',('Author'),('Org'),'Preprocessor','App','');
FILE_SCHEMA(('IFC2X3'));
ENDSEC;
DATA;
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_parse_header() {
        let info = parse_header(HEADER).unwrap();
        assert_eq!(info.schema_version, "IFC2X3");
        assert_eq!(info.file_name.as_deref(), Some("test.ifc"));
        assert_eq!(info.author.as_deref(), Some("Author"));
        assert_eq!(info.organization.as_deref(), Some("Org"));
        assert_eq!(info.originating_system.as_deref(), Some("App"));
        assert_eq!(info.implementation_level.as_deref(), Some("2;1"));
        assert_eq!(info.description, vec!["ViewDefinition [CoordinationView]"]);
    }

    #[test]
    fn test_missing_schema_is_rejected() {
        let content = "HEADER;\nFILE_NAME('a','',(''),(''),'','','');\nENDSEC;";
        assert!(matches!(parse_header(content), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_written_header_parses_back() {
        let info = parse_header(HEADER).unwrap();
        let text = write_header(&info);
        assert!(text.starts_with("HEADER;\nFILE_DESCRIPTION"));
        let again = parse_header(&text).unwrap();
        assert_eq!(again, info);
    }
}

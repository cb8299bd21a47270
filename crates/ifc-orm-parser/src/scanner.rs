// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fast instance scanner using SIMD-accelerated byte searching
//!
//! Finds instance boundaries in the DATA section without decoding
//! attributes; decoding happens lazily in the session.

use memchr::{memchr, memmem};
use rustc_hash::FxHashMap;

/// Entity index mapping ID to byte offsets
pub type EntityIndex = FxHashMap<u32, (usize, usize)>;

/// Location of one instance in the source text
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScannedEntity<'a> {
    pub id: u32,
    /// Type name as written, usually upper case
    pub type_name: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Instance scanner over STEP content
pub struct EntityScanner<'a> {
    content: &'a str,
    pos: usize,
}

impl<'a> EntityScanner<'a> {
    /// Create a scanner positioned at the DATA section
    pub fn new(content: &'a str) -> Self {
        Self {
            content,
            pos: data_section_start(content).unwrap_or(0),
        }
    }

    /// Scan to the next instance definition
    pub fn next_entity(&mut self) -> Option<ScannedEntity<'a>> {
        let bytes = self.content.as_bytes();

        while self.pos < bytes.len() {
            let hash_pos = memchr(b'#', &bytes[self.pos..])?;
            self.pos += hash_pos;

            // Definitions start a statement; references sit inside parentheses
            if !self.at_statement_start() {
                self.pos += 1;
                continue;
            }

            let start = self.pos;
            self.pos += 1;
            let id_start = self.pos;
            self.skip_while(|b| b.is_ascii_digit());
            if self.pos == id_start {
                continue;
            }
            let Ok(id) = self.content[id_start..self.pos].parse::<u32>() else {
                continue;
            };

            self.skip_while(|b| b == b' ' || b == b'\t');
            if self.pos >= bytes.len() || bytes[self.pos] != b'=' {
                continue;
            }
            self.pos += 1;
            self.skip_while(|b| b.is_ascii_whitespace());

            let type_start = self.pos;
            self.skip_while(|b| b.is_ascii_alphanumeric() || b == b'_');
            if self.pos == type_start {
                continue;
            }
            let type_name = &self.content[type_start..self.pos];

            let end = self.find_entity_end()?;
            return Some(ScannedEntity {
                id,
                type_name,
                start,
                end,
            });
        }

        None
    }

    fn skip_while(&mut self, pred: impl Fn(u8) -> bool) {
        let bytes = self.content.as_bytes();
        while self.pos < bytes.len() && pred(bytes[self.pos]) {
            self.pos += 1;
        }
    }

    /// Whether only whitespace separates `pos` from the previous `;`, `/` or line start
    fn at_statement_start(&self) -> bool {
        let bytes = self.content.as_bytes();
        for &b in bytes[..self.pos].iter().rev() {
            match b {
                b' ' | b'\t' => continue,
                b'\n' | b'\r' | b';' | b'/' => return true,
                _ => return false,
            }
        }
        true
    }

    /// Find the end of an instance (semicolon), skipping quoted strings
    fn find_entity_end(&mut self) -> Option<usize> {
        let bytes = self.content.as_bytes();
        let mut in_string = false;

        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'\'' => {
                    if in_string && self.pos + 1 < bytes.len() && bytes[self.pos + 1] == b'\'' {
                        self.pos += 2;
                        continue;
                    }
                    in_string = !in_string;
                }
                b';' if !in_string => {
                    self.pos += 1;
                    return Some(self.pos);
                }
                _ => {}
            }
            self.pos += 1;
        }

        None
    }

    /// Build an index of all instances (ID -> byte offsets)
    pub fn build_index(content: &'a str) -> EntityIndex {
        let mut scanner = Self::new(content);
        let mut index = FxHashMap::default();

        while let Some(entity) = scanner.next_entity() {
            index.insert(entity.id, (entity.start, entity.end));
        }

        index
    }

    /// Count instances by upper-case type name
    pub fn count_by_type(content: &'a str) -> FxHashMap<String, usize> {
        let mut scanner = Self::new(content);
        let mut counts: FxHashMap<String, usize> = FxHashMap::default();

        while let Some(entity) = scanner.next_entity() {
            *counts.entry(entity.type_name.to_ascii_uppercase()).or_insert(0) += 1;
        }

        counts
    }
}

impl<'a> Iterator for EntityScanner<'a> {
    type Item = ScannedEntity<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entity()
    }
}

/// Byte offset just past the `DATA;` keyword
pub fn data_section_start(content: &str) -> Option<usize> {
    memmem::find(content.as_bytes(), b"DATA;").map(|p| p + 5)
}

/// The HEADER section text, between `HEADER;` and the first `ENDSEC;`
pub fn header_section(content: &str) -> Option<&str> {
    let start = memmem::find(content.as_bytes(), b"HEADER;")? + 7;
    let end = memmem::find(&content.as_bytes()[start..], b"ENDSEC;")? + start;
    Some(&content[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('test.ifc','2024-01-01T00:00:00',('Author'),('Org'),'Preprocessor','App','');
FILE_SCHEMA(('IFC2X3'));
ENDSEC;
DATA;
#1=IFCPROJECT('guid',$,'Project',$,$,$,$,$,#2);
#2=IFCUNITASSIGNMENT((#3));
  #3 = IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
#4=IFCWALL('guid',$,'Wall; #9=X',$,$,#5,#6,$); #5=IFCLOCALPLACEMENT($,#6);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_scanner_finds_entities() {
        let entities: Vec<_> = EntityScanner::new(TEST_IFC)
            .map(|e| (e.id, e.type_name))
            .collect();

        assert_eq!(
            entities,
            vec![
                (1, "IFCPROJECT"),
                (2, "IFCUNITASSIGNMENT"),
                (3, "IFCSIUNIT"),
                (4, "IFCWALL"),
                (5, "IFCLOCALPLACEMENT"),
            ]
        );
    }

    #[test]
    fn test_spans_cover_whole_statement() {
        let index = EntityScanner::build_index(TEST_IFC);
        let (start, end) = index[&4];
        assert!(TEST_IFC[start..end].starts_with("#4=IFCWALL("));
        assert!(TEST_IFC[start..end].ends_with("$);"));
    }

    #[test]
    fn test_count_by_type() {
        let counts = EntityScanner::count_by_type(TEST_IFC);
        assert_eq!(counts.get("IFCPROJECT"), Some(&1));
        assert_eq!(counts.get("IFCWALL"), Some(&1));
    }

    #[test]
    fn test_header_section() {
        let header = header_section(TEST_IFC).unwrap();
        assert!(header.contains("FILE_SCHEMA"));
        assert!(!header.contains("DATA;"));
    }
}

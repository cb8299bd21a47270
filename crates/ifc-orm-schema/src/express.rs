// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! EXPRESS subset parser using nom combinators
//!
//! Understands what the catalog needs from IFC schemas: type declarations,
//! enumerations, selects, entities with explicit, derived and inverse
//! attributes. Rules, functions, `WHERE` and `UNIQUE` clauses are skipped.

use crate::declaration::{
    AggregationKind, Attribute, Bounds, Declaration, EntityDeclaration, EnumerationType,
    InverseAttribute, SelectType, SimpleType, TypeDeclaration, TypeDescriptor,
};
use ifc_orm_model::{Error, Result};
use nom::{
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{opt, recognize},
    error::ErrorKind,
    multi::separated_list1,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

/// Parsed schema text before linking
#[derive(Debug)]
pub struct SchemaSource {
    pub name: String,
    pub declarations: Vec<Declaration>,
}

// ============================================================================
// Lexical helpers
// ============================================================================

/// Remove `(* ... *)` comments, keeping line structure for error offsets
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("(*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*)") {
            Some(end) => {
                let comment = &rest[start..start + 2 + end + 2];
                out.extend(comment.chars().filter(|c| *c == '\n'));
                rest = &rest[start + 2 + end + 2..];
            }
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn fail<T>(input: &str, kind: ErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// Identifier, leading whitespace skipped
fn ident(input: &str) -> IResult<&str, &str> {
    preceded(
        multispace0,
        recognize(pair(
            satisfy(|c: char| c.is_ascii_alphabetic()),
            take_while(is_ident_char),
        )),
    )
    .parse(input)
}

/// Case-insensitive keyword that must not continue as an identifier
fn kw<'a>(word: &'static str) -> impl Fn(&'a str) -> IResult<&'a str, ()> {
    move |input: &'a str| {
        let (input, _) = multispace0(input)?;
        let (rest, _) = tag_no_case(word)(input)?;
        if rest.starts_with(is_ident_char) {
            return fail(input, ErrorKind::Tag);
        }
        Ok((rest, ()))
    }
}

/// Punctuation, leading whitespace skipped
fn sym<'a>(s: &'static str) -> impl Fn(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| preceded(multispace0, tag(s)).parse(input)
}

fn integer(input: &str) -> IResult<&str, u32> {
    let (rest, digits) = preceded(multispace0, digit1).parse(input)?;
    match digits.parse::<u32>() {
        Ok(value) => Ok((rest, value)),
        Err(_) => fail(input, ErrorKind::Digit),
    }
}

fn ident_list(input: &str) -> IResult<&str, Vec<&str>> {
    delimited(sym("("), separated_list1(sym(","), ident), sym(")")).parse(input)
}

/// Skip a balanced parenthesized group, e.g. `(ONEOF (A, B))`
fn balanced_parens(input: &str) -> IResult<&str, &str> {
    let (start, _) = multispace0(input)?;
    if !start.starts_with('(') {
        return fail(start, ErrorKind::Char);
    }
    let mut depth = 0usize;
    for (i, c) in start.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&start[i + 1..], &start[..i + 1]));
                }
            }
            _ => {}
        }
    }
    fail(start, ErrorKind::Eof)
}

/// Advance to the first of `words` standing alone as a keyword
fn skip_to_keyword<'a>(input: &'a str, words: &[&str]) -> IResult<&'a str, ()> {
    let upper = input.to_ascii_uppercase();
    let mut best: Option<usize> = None;
    for word in words {
        let mut from = 0;
        while let Some(pos) = upper[from..].find(word) {
            let at = from + pos;
            let before = upper[..at].chars().next_back();
            let after = upper[at + word.len()..].chars().next();
            if !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char) {
                best = Some(best.map_or(at, |b| b.min(at)));
                break;
            }
            from = at + word.len();
        }
    }
    match best {
        Some(at) => Ok((&input[at..], ())),
        None => fail(input, ErrorKind::TakeUntil),
    }
}

/// Advance past the next `;`
fn skip_statement(input: &str) -> IResult<&str, ()> {
    match input.find(';') {
        Some(at) => Ok((&input[at + 1..], ())),
        None => fail(input, ErrorKind::TakeUntil),
    }
}

// ============================================================================
// Type descriptors
// ============================================================================

fn bound(input: &str) -> IResult<&str, Option<u32>> {
    if let Ok((rest, _)) = sym("?")(input) {
        return Ok((rest, None));
    }
    let (rest, value) = integer(input)?;
    Ok((rest, Some(value)))
}

fn bounds(input: &str) -> IResult<&str, Bounds> {
    let (input, _) = sym("[")(input)?;
    let (input, lower) = bound(input)?;
    let (input, _) = sym(":")(input)?;
    let (input, upper) = bound(input)?;
    let (input, _) = sym("]")(input)?;
    Ok((
        input,
        Bounds {
            lower: lower.unwrap_or(0),
            upper,
        },
    ))
}

fn aggregation(input: &str) -> IResult<&str, TypeDescriptor> {
    let (rest, word) = ident(input)?;
    let Some(kind) = AggregationKind::from_keyword(word) else {
        return fail(input, ErrorKind::Tag);
    };
    let (rest, bounds) = opt(bounds).parse(rest)?;
    let (rest, _) = kw("OF")(rest)?;
    let (rest, unique) = opt(kw("UNIQUE")).parse(rest)?;
    let (rest, _) = opt(kw("OPTIONAL")).parse(rest)?;
    let (rest, element) = descriptor(rest)?;
    Ok((
        rest,
        TypeDescriptor::Aggregation {
            kind,
            bounds,
            unique: unique.is_some(),
            element: Box::new(element),
        },
    ))
}

/// `STRING(255) FIXED`, `REAL(15)`, ... width specifications are dropped
fn simple(input: &str) -> IResult<&str, TypeDescriptor> {
    let (rest, word) = ident(input)?;
    let Some(simple) = SimpleType::from_keyword(word) else {
        return fail(input, ErrorKind::Tag);
    };
    let (rest, _) = opt(delimited(sym("("), integer, sym(")"))).parse(rest)?;
    let (rest, _) = opt(kw("FIXED")).parse(rest)?;
    Ok((rest, TypeDescriptor::Simple(simple)))
}

fn named(input: &str) -> IResult<&str, TypeDescriptor> {
    let (rest, name) = ident(input)?;
    Ok((rest, TypeDescriptor::Named(name.to_string())))
}

fn descriptor(input: &str) -> IResult<&str, TypeDescriptor> {
    if let Ok(result) = aggregation(input) {
        return Ok(result);
    }
    if let Ok(result) = simple(input) {
        return Ok(result);
    }
    named(input)
}

// ============================================================================
// TYPE declarations
// ============================================================================

fn type_decl(input: &str) -> IResult<&str, Declaration> {
    let (input, _) = kw("TYPE")(input)?;
    let (input, name) = ident(input)?;
    let (input, _) = sym("=")(input)?;

    let (input, declaration) = if let Ok((rest, _)) = kw("ENUMERATION")(input) {
        let (rest, _) = kw("OF")(rest)?;
        let (rest, items) = ident_list(rest)?;
        (
            rest,
            Declaration::Enumeration(EnumerationType {
                name: name.to_string(),
                items: items.iter().map(|i| i.to_ascii_uppercase()).collect(),
            }),
        )
    } else if let Ok((rest, _)) = preceded(opt(kw("EXTENSIBLE")), kw("SELECT")).parse(input) {
        let (rest, members) = ident_list(rest)?;
        (
            rest,
            Declaration::Select(SelectType {
                name: name.to_string(),
                members: members.iter().map(|m| m.to_string()).collect(),
            }),
        )
    } else {
        let (rest, underlying) = descriptor(input)?;
        (
            rest,
            Declaration::Type(TypeDeclaration {
                name: name.to_string(),
                underlying,
            }),
        )
    };

    let (input, _) = sym(";")(input)?;
    let (input, _) = skip_to_keyword(input, &["END_TYPE"])?;
    let (input, _) = kw("END_TYPE")(input)?;
    let (input, _) = sym(";")(input)?;
    Ok((input, declaration))
}

// ============================================================================
// ENTITY declarations
// ============================================================================

/// `[ABSTRACT] [SUPERTYPE OF (...)] [SUBTYPE OF (X)]`
fn entity_header(input: &str) -> IResult<&str, (bool, Option<String>)> {
    let (input, is_abstract) = opt(kw("ABSTRACT")).parse(input)?;
    let (input, _) = opt(preceded(pair(kw("SUPERTYPE"), kw("OF")), balanced_parens)).parse(input)?;
    // `ABSTRACT` may also follow the supertype constraint
    let (input, late_abstract) = opt(kw("ABSTRACT")).parse(input)?;
    let (input, supertype) = opt(preceded(
        pair(kw("SUBTYPE"), kw("OF")),
        delimited(sym("("), ident, sym(")")),
    ))
    .parse(input)?;
    Ok((
        input,
        (
            is_abstract.is_some() || late_abstract.is_some(),
            supertype.map(str::to_string),
        ),
    ))
}

/// `SELF\IfcNamedUnit.Dimensions`, yields the attribute name
fn redeclared(input: &str) -> IResult<&str, &str> {
    let (input, _) = kw("SELF")(input)?;
    let (input, _) = char('\\')(input)?;
    let (input, _) = take_while1(is_ident_char)(input)?;
    let (input, _) = char('.')(input)?;
    take_while1(is_ident_char)(input)
}

enum Explicit<'a> {
    Attributes(Vec<&'a str>, bool, TypeDescriptor),
    Refinement,
}

/// `A, B : OPTIONAL T;` or a type refinement `SELF\X.A : T;`
fn explicit_attribute(input: &str) -> IResult<&str, Explicit<'_>> {
    if let Ok((rest, _)) = redeclared(input) {
        let (rest, _) = sym(":")(rest)?;
        let (rest, _) = skip_statement(rest)?;
        return Ok((rest, Explicit::Refinement));
    }
    let (input, names) = separated_list1(sym(","), ident).parse(input)?;
    let (input, _) = sym(":")(input)?;
    // `:=` belongs to DERIVE, never to explicit attributes
    if input.starts_with('=') {
        return fail(input, ErrorKind::Tag);
    }
    let (input, optional) = opt(kw("OPTIONAL")).parse(input)?;
    let (input, ty) = descriptor(input)?;
    let (input, _) = sym(";")(input)?;
    Ok((input, Explicit::Attributes(names, optional.is_some(), ty)))
}

/// `Name : T := expression;`, yields the name of a redeclared inherited attribute
///
/// Attributes first introduced by `DERIVE` have no position in instance
/// data and are dropped.
fn derive_attribute(input: &str) -> IResult<&str, Option<&str>> {
    if let Ok((rest, name)) = redeclared(input) {
        let (rest, _) = sym(":")(rest)?;
        let (rest, _) = skip_statement(rest)?;
        return Ok((rest, Some(name)));
    }
    let (input, _) = ident(input)?;
    let (input, _) = sym(":")(input)?;
    let (input, _) = descriptor(input)?;
    let (input, _) = sym(":=")(input)?;
    let (input, _) = skip_statement(input)?;
    Ok((input, None))
}

/// `SET [lo:hi] OF` prefix of an aggregate inverse
fn inverse_aggregate(input: &str) -> IResult<&str, Bounds> {
    let (rest, word) = ident(input)?;
    match word.to_ascii_uppercase().as_str() {
        "SET" | "BAG" | "LIST" => {}
        _ => return fail(input, ErrorKind::Tag),
    }
    let (rest, bounds) = opt(bounds).parse(rest)?;
    let (rest, _) = kw("OF")(rest)?;
    Ok((
        rest,
        bounds.unwrap_or(Bounds {
            lower: 0,
            upper: None,
        }),
    ))
}

/// `Name : [SET|BAG [lo:hi] OF] Entity FOR Attribute;`
fn inverse_attribute(input: &str) -> IResult<&str, InverseAttribute> {
    let (input, name) = ident(input)?;
    let (input, _) = sym(":")(input)?;
    let (input, aggregate) = opt(inverse_aggregate).parse(input)?;
    let (input, entity) = ident(input)?;
    let (input, _) = kw("FOR")(input)?;
    let (input, attribute) = ident(input)?;
    let (input, _) = sym(";")(input)?;
    Ok((
        input,
        InverseAttribute {
            name: name.to_string(),
            entity: entity.to_string(),
            attribute: attribute.to_string(),
            bounds: aggregate,
        },
    ))
}

fn entity_decl(input: &str) -> IResult<&str, Declaration> {
    let (input, _) = kw("ENTITY")(input)?;
    let (input, name) = ident(input)?;
    let (input, (is_abstract, supertype)) = entity_header(input)?;
    let (mut input, _) = sym(";")(input)?;

    let mut entity = EntityDeclaration::new(name);
    entity.is_abstract = is_abstract;
    entity.supertype = supertype;

    while let Ok((rest, explicit)) = explicit_attribute(input) {
        if let Explicit::Attributes(names, optional, ty) = explicit {
            for attr in names {
                entity.attributes.push(Attribute {
                    name: attr.to_string(),
                    ty: ty.clone(),
                    optional,
                    derived: false,
                });
            }
        }
        input = rest;
    }

    if let Ok((rest, _)) = kw("DERIVE")(input) {
        input = rest;
        while let Ok((rest, redeclared)) = derive_attribute(input) {
            if let Some(attr) = redeclared {
                entity.derived_overrides.push(attr.to_string());
            }
            input = rest;
        }
    }

    if let Ok((rest, _)) = kw("INVERSE")(input) {
        input = rest;
        loop {
            if let Ok((rest, inverse)) = inverse_attribute(input) {
                entity.inverse.push(inverse);
                input = rest;
            } else if let Ok((rest, _)) = redeclared(input) {
                // Inverse refinement of an inherited inverse
                let (rest, _) = skip_statement(rest)?;
                input = rest;
            } else {
                break;
            }
        }
    }

    let (input, _) = skip_to_keyword(input, &["END_ENTITY"])?;
    let (input, _) = kw("END_ENTITY")(input)?;
    let (input, _) = sym(";")(input)?;
    Ok((input, Declaration::Entity(entity)))
}

// ============================================================================
// Skipped blocks
// ============================================================================

fn skipped_block(input: &str) -> IResult<&str, ()> {
    const BLOCKS: &[(&str, &str)] = &[
        ("FUNCTION", "END_FUNCTION"),
        ("RULE", "END_RULE"),
        ("PROCEDURE", "END_PROCEDURE"),
        ("CONSTANT", "END_CONSTANT"),
    ];
    for &(open, close) in BLOCKS {
        if let Ok((rest, _)) = kw(open)(input) {
            let (rest, _) = skip_to_keyword(rest, &[close])?;
            let (rest, _) = kw(close)(rest)?;
            let (rest, _) = sym(";")(rest)?;
            return Ok((rest, ()));
        }
    }
    if let Ok((rest, _)) = kw("REFERENCE")(input).or_else(|_| kw("USE")(input)) {
        return skip_statement(rest);
    }
    fail(input, ErrorKind::Alt)
}

// ============================================================================
// Schema
// ============================================================================

/// Parse schema source text
///
/// Format: `SCHEMA IFC4; TYPE ...; ENTITY ...; END_SCHEMA;`
pub fn parse_schema(source: &str) -> Result<SchemaSource> {
    let text = strip_comments(source);

    let (mut input, name) = preceded(kw("SCHEMA"), ident)
        .parse(text.as_str())
        .map_err(|_| Error::schema("expected SCHEMA <name>"))?;
    input = sym(";")(input)
        .map_err(|_| Error::schema("expected ';' after schema name"))?
        .0;

    let mut declarations = Vec::new();
    loop {
        if let Ok((rest, _)) = kw("END_SCHEMA")(input) {
            input = rest;
            break;
        }
        if let Ok((rest, declaration)) = type_decl(input) {
            declarations.push(declaration);
            input = rest;
        } else if let Ok((rest, declaration)) = entity_decl(input) {
            declarations.push(declaration);
            input = rest;
        } else if let Ok((rest, _)) = skipped_block(input) {
            input = rest;
        } else {
            let offset = text.len() - input.trim_start().len();
            let line = text[..offset].matches('\n').count() + 1;
            let snippet: String = input.trim_start().chars().take(40).collect();
            return Err(Error::schema(format!(
                "unexpected input in schema {} at line {}: '{}'",
                name, line, snippet
            )));
        }
    }
    let _ = sym(";")(input);

    Ok(SchemaSource {
        name: name.to_string(),
        declarations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_comments_keeps_lines() {
        let text = strip_comments("A (* one\ntwo *) B");
        assert_eq!(text, "A \n B");
    }

    #[test]
    fn test_keyword_boundary() {
        assert!(kw("TYPE")("TYPE X").is_ok());
        assert!(kw("TYPE")("TYPES").is_err());
        assert!(kw("type")(" TYPE ").is_ok());
    }

    #[test]
    fn test_nested_aggregation() {
        let (_, ty) = descriptor("LIST [2:?] OF LIST [2:?] OF IfcCartesianPoint;").unwrap();
        assert_eq!(ty.to_string(), "LIST [2:?] OF LIST [2:?] OF IfcCartesianPoint");
    }

    #[test]
    fn test_simple_with_width() {
        let (rest, ty) = descriptor("STRING(22) FIXED;").unwrap();
        assert_eq!(rest, ";");
        assert_eq!(ty, TypeDescriptor::Simple(SimpleType::String));
    }

    #[test]
    fn test_type_declarations() {
        let (_, decl) =
            type_decl("TYPE IfcLabel = STRING(255);\nEND_TYPE;").unwrap();
        assert_eq!(decl.as_type().unwrap().underlying.to_string(), "STRING");

        let (_, decl) = type_decl(
            "TYPE IfcWallTypeEnum = ENUMERATION OF\n (MOVABLE\n ,USERDEFINED);\nEND_TYPE;",
        )
        .unwrap();
        assert_eq!(
            decl.as_enumeration().unwrap().items,
            vec!["MOVABLE".to_string(), "USERDEFINED".to_string()]
        );

        let (_, decl) = type_decl(
            "TYPE IfcValue = SELECT (IfcMeasureValue, IfcSimpleValue);\n WHERE\n  WR1 : SIZEOF([]) = 0;\nEND_TYPE;",
        )
        .unwrap();
        assert_eq!(decl.as_select().unwrap().members.len(), 2);
    }

    #[test]
    fn test_entity_declaration() {
        let source = r#"ENTITY IfcSIUnit
 SUBTYPE OF (IfcNamedUnit);
	Prefix : OPTIONAL IfcSIPrefix;
	Name : IfcSIUnitName;
 DERIVE
	SELF\IfcNamedUnit.Dimensions : IfcDimensionalExponents := IfcDimensionsForSiUnit (SELF.Name);
 WHERE
	WR1 : TRUE;
END_ENTITY;"#;
        let (rest, decl) = entity_decl(source).unwrap();
        assert_eq!(rest, "");
        let entity = decl.as_entity().unwrap();
        assert_eq!(entity.supertype.as_deref(), Some("IfcNamedUnit"));
        assert_eq!(entity.attributes.len(), 2);
        assert!(entity.attributes[0].optional);
        assert_eq!(entity.derived_overrides, vec!["Dimensions".to_string()]);
    }

    #[test]
    fn test_entity_with_inverse_and_supertype_constraint() {
        let source = r#"ENTITY IfcObjectDefinition
 ABSTRACT SUPERTYPE OF (ONEOF
	(IfcContext
	,IfcObject))
 SUBTYPE OF (IfcRoot);
 INVERSE
	IsDecomposedBy : SET [0:?] OF IfcRelAggregates FOR RelatingObject;
	Decomposes : SET [0:1] OF IfcRelAggregates FOR RelatedObjects;
END_ENTITY;"#;
        let (_, decl) = entity_decl(source).unwrap();
        let entity = decl.as_entity().unwrap();
        assert!(entity.is_abstract);
        assert_eq!(entity.inverse.len(), 2);
        assert_eq!(entity.inverse[1].attribute, "RelatedObjects");
        assert_eq!(entity.inverse[1].bounds.and_then(|b| b.upper), Some(1));
    }

    #[test]
    fn test_parse_schema_reports_line() {
        let err = parse_schema("SCHEMA X;\nTYPE A = REAL;\nEND_TYPE;\nGARBAGE;\nEND_SCHEMA;")
            .unwrap_err();
        assert!(err.to_string().contains("line 4"), "{}", err);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP file tokenizer using nom combinators
//!
//! Parses STEP/IFC instance definitions and header records into tokens.

use ifc_orm_model::{AttributeValue, DecodedEntity, EntityId, Error, Result};
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{opt, recognize},
    error::ErrorKind,
    multi::separated_list0,
    sequence::{delimited, pair},
    IResult, Parser,
};

/// Raw token from STEP file (before conversion to AttributeValue)
#[derive(Clone, Debug, PartialEq)]
pub enum Token<'a> {
    /// Entity reference (#123)
    EntityRef(u32),
    /// String value, still escaped ('it''s')
    String(&'a str),
    /// Binary value ("0FF")
    Binary(&'a str),
    /// Integer value
    Integer(i64),
    /// Float value
    Float(f64),
    /// Enumeration (.VALUE.)
    Enum(&'a str),
    /// List of tokens
    List(Vec<Token<'a>>),
    /// Typed value like IFCLABEL('text')
    TypedValue(&'a str, Vec<Token<'a>>),
    /// Null value ($)
    Null,
    /// Derived value (*)
    Derived,
}

impl<'a> Token<'a> {
    /// Convert token to owned AttributeValue
    ///
    /// Strings are unescaped and `.T.`/`.F.` become booleans.
    pub fn to_attribute_value(&self) -> AttributeValue {
        match self {
            Token::EntityRef(id) => AttributeValue::EntityRef(EntityId(*id)),
            Token::String(s) => AttributeValue::String(decode_step_string(s)),
            Token::Binary(s) => AttributeValue::Binary((*s).to_string()),
            Token::Integer(i) => AttributeValue::Integer(*i),
            Token::Float(f) => AttributeValue::Float(*f),
            Token::Enum("T") => AttributeValue::Bool(true),
            Token::Enum("F") => AttributeValue::Bool(false),
            Token::Enum(s) => AttributeValue::Enum((*s).to_string()),
            Token::List(items) => {
                AttributeValue::List(items.iter().map(|t| t.to_attribute_value()).collect())
            }
            Token::TypedValue(name, args) => AttributeValue::TypedValue(
                (*name).to_string(),
                args.iter().map(|t| t.to_attribute_value()).collect(),
            ),
            Token::Null => AttributeValue::Null,
            Token::Derived => AttributeValue::Derived,
        }
    }
}

// ============================================================================
// Parsing Primitives
// ============================================================================

fn ws(input: &str) -> IResult<&str, ()> {
    let (input, _) = multispace0(input)?;
    Ok((input, ()))
}

fn fail<T>(input: &str, kind: ErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// Parse an entity reference (#123)
fn entity_ref(input: &str) -> IResult<&str, Token<'_>> {
    let (rest, _) = char('#')(input)?;
    let (rest, digits) = take_while1(|c: char| c.is_ascii_digit())(rest)?;
    match digits.parse::<u32>() {
        Ok(id) => Ok((rest, Token::EntityRef(id))),
        Err(_) => fail(input, ErrorKind::Digit),
    }
}

/// Parse a STEP string ('text' with '' for escaped quotes)
fn step_string(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('\'')(input)?;

    let bytes = input.as_bytes();
    let mut end = 0;
    while end < bytes.len() {
        if bytes[end] == b'\'' {
            if end + 1 < bytes.len() && bytes[end + 1] == b'\'' {
                end += 2;
                continue;
            }
            return Ok((&input[end + 1..], Token::String(&input[..end])));
        }
        end += 1;
    }
    fail(input, ErrorKind::Char)
}

/// Parse a binary literal ("0FF")
fn binary(input: &str) -> IResult<&str, Token<'_>> {
    let (input, hex) = delimited(
        char('"'),
        take_while(|c: char| c.is_ascii_hexdigit()),
        char('"'),
    )
    .parse(input)?;
    Ok((input, Token::Binary(hex)))
}

/// Parse a number (integer or float)
fn number(input: &str) -> IResult<&str, Token<'_>> {
    let (rest, num_str) = recognize((
        opt(alt((char('-'), char('+')))),
        take_while1(|c: char| c.is_ascii_digit()),
        opt(pair(char('.'), take_while(|c: char| c.is_ascii_digit()))),
        opt((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            take_while1(|c: char| c.is_ascii_digit()),
        )),
    ))
    .parse(input)?;

    // Use lexical-core for fast parsing
    let digits = num_str.trim_start_matches('+');
    if num_str.contains(['.', 'e', 'E']) {
        match lexical_core::parse::<f64>(digits.as_bytes()) {
            Ok(f) => Ok((rest, Token::Float(f))),
            Err(_) => fail(input, ErrorKind::Float),
        }
    } else {
        match lexical_core::parse::<i64>(digits.as_bytes()) {
            Ok(i) => Ok((rest, Token::Integer(i))),
            Err(_) => fail(input, ErrorKind::Digit),
        }
    }
}

/// Parse an enumeration (.VALUE.)
fn enumeration(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('.')(input)?;
    let (input, name) = take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)?;
    let (input, _) = char('.')(input)?;
    Ok((input, Token::Enum(name)))
}

fn null_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('$')(input)?;
    Ok((input, Token::Null))
}

fn derived_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('*')(input)?;
    Ok((input, Token::Derived))
}

/// Parenthesized, comma separated tokens
fn token_list(input: &str) -> IResult<&str, Vec<Token<'_>>> {
    delimited(
        pair(char('('), ws),
        separated_list0((ws, char(','), ws), token),
        pair(ws, char(')')),
    )
    .parse(input)
}

fn list(input: &str) -> IResult<&str, Token<'_>> {
    let (input, items) = token_list(input)?;
    Ok((input, Token::List(items)))
}

fn keyword(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
    ))
    .parse(input)
}

/// Parse a typed value like IFCLABEL('text')
fn typed_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, type_name) = keyword(input)?;
    let (input, _) = ws(input)?;
    let (input, args) = token_list(input)?;
    Ok((input, Token::TypedValue(type_name, args)))
}

/// Parse any token
fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        entity_ref,
        step_string,
        null_value,
        derived_value,
        enumeration,
        number,
        binary,
        list,
        typed_value,
    ))
    .parse(input)
}

// ============================================================================
// Record Parsing
// ============================================================================

/// Parse a complete instance definition
///
/// Format: `#123=IFCWALL(attr1,attr2,...);`. The type name is returned as
/// written in the file.
pub fn parse_entity(input: &str) -> Result<DecodedEntity> {
    let input = input.trim_start();
    let (rest, id) = entity_ref(input)
        .map_err(|_| Error::format(format!("expected '#<id>=' at '{}'", snippet(input))))?;
    let Token::EntityRef(id) = id else {
        return Err(Error::format("expected entity id"));
    };
    let id = EntityId(id);

    let (rest, (_, _, _, type_name, _, tokens)) = (ws, char('='), ws, keyword, ws, token_list)
        .parse(rest)
        .map_err(|e| Error::entity_parse(id, format!("{:?}", e)))?;

    let attributes = tokens.iter().map(|t| t.to_attribute_value()).collect();

    let rest = rest.trim_start();
    if !rest.is_empty() && !rest.starts_with(';') {
        return Err(Error::entity_parse(
            id,
            format!("unexpected trailing input '{}'", snippet(rest)),
        ));
    }

    Ok(DecodedEntity::new(id, type_name, attributes))
}

/// Parse entity from the content slice at the given byte offsets
pub fn parse_entity_at(content: &str, start: usize, end: usize) -> Result<DecodedEntity> {
    let slice = content
        .get(start..end)
        .ok_or_else(|| Error::format(format!("entity span {}..{} out of range", start, end)))?;
    parse_entity(slice)
}

/// Parse the `;`-terminated records of a HEADER section
///
/// `FILE_DESCRIPTION(('x'),'2;1'); FILE_NAME(...);` yields one
/// `(name, arguments)` pair per record.
pub fn parse_header_records(section: &str) -> Result<Vec<(&str, Vec<AttributeValue>)>> {
    let mut records = Vec::new();
    let mut input = section.trim_start();
    while !input.is_empty() {
        let (rest, token) = typed_value(input).map_err(|_| {
            Error::InvalidHeader(format!("malformed record at '{}'", snippet(input)))
        })?;
        let (rest, _) = (ws, char(';'), ws)
            .parse(rest)
            .map_err(|_: nom::Err<nom::error::Error<&str>>| {
                Error::InvalidHeader(format!("expected ';' at '{}'", snippet(rest)))
            })?;
        if let Token::TypedValue(name, args) = token {
            records.push((name, args.iter().map(|t| t.to_attribute_value()).collect()));
        }
        input = rest;
    }
    Ok(records)
}

/// Parse a single attribute value written in STEP syntax, e.g. `(#1,#2)`
pub fn parse_value(input: &str) -> Result<AttributeValue> {
    let (rest, token) = token(input.trim_start())
        .map_err(|_| Error::format(format!("invalid value '{}'", snippet(input))))?;
    if !rest.trim().is_empty() {
        return Err(Error::format(format!(
            "unexpected trailing input '{}'",
            snippet(rest)
        )));
    }
    Ok(token.to_attribute_value())
}

fn snippet(input: &str) -> String {
    input.chars().take(32).collect()
}

// ============================================================================
// String decoding
// ============================================================================

/// Unescape the body of a STEP string
///
/// Handles doubled quotes and backslashes, `\X2\…\X0\` (UTF-16),
/// `\X4\…\X0\` (UTF-32), `\X\hh` (ISO 8859-1) and `\S\c`. Code page
/// switches (`\P?\`) are dropped.
pub fn decode_step_string(raw: &str) -> String {
    if !raw.contains(['\'', '\\']) {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(c) = rest.chars().next() {
        if c == '\'' && rest.starts_with("''") {
            out.push('\'');
            rest = &rest[2..];
        } else if c == '\\' {
            rest = decode_directive(rest, &mut out);
        } else {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// Decode one backslash directive, returns the remaining input
fn decode_directive<'a>(rest: &'a str, out: &mut String) -> &'a str {
    if let Some(after) = rest.strip_prefix("\\\\") {
        out.push('\\');
        return after;
    }
    if let Some(body) = rest.strip_prefix("\\X2\\") {
        return decode_wide(body, 4, out);
    }
    if let Some(body) = rest.strip_prefix("\\X4\\") {
        return decode_wide(body, 8, out);
    }
    if let Some(hex) = rest.strip_prefix("\\X\\") {
        if let Some(byte) = hex.get(..2).and_then(|h| u8::from_str_radix(h, 16).ok()) {
            out.push(char::from(byte));
            return &hex[2..];
        }
    }
    if let Some(tail) = rest.strip_prefix("\\S\\") {
        if let Some(c) = tail.chars().next() {
            if c.is_ascii() {
                out.push(char::from(c as u8 + 128));
                return &tail[1..];
            }
        }
    }
    let bytes = rest.as_bytes();
    if bytes.len() >= 4 && bytes[1] == b'P' && bytes[3] == b'\\' {
        return &rest[4..];
    }
    out.push('\\');
    &rest[1..]
}

/// Decode hex code units up to the `\X0\` terminator
fn decode_wide<'a>(body: &'a str, width: usize, out: &mut String) -> &'a str {
    let (hex, rest) = match body.find("\\X0\\") {
        Some(end) => (&body[..end], &body[end + 4..]),
        None => (body, ""),
    };
    let units: Vec<u32> = hex
        .as_bytes()
        .chunks(width)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .filter_map(|chunk| u32::from_str_radix(chunk, 16).ok())
        .collect();
    if width == 4 {
        let utf16 = units.iter().map(|u| *u as u16);
        out.extend(char::decode_utf16(utf16).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)));
    } else {
        out.extend(
            units
                .iter()
                .map(|u| char::from_u32(*u).unwrap_or(char::REPLACEMENT_CHARACTER)),
        );
    }
    rest
}

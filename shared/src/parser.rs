/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::terms::Term;
use crate::triple::{GraphPattern, TriplePattern};
use nom::{
    branch::alt,
    bytes::complete::{escaped, tag, take_until, take_while1},
    character::complete::{char, multispace0, none_of, one_of, space0, space1},
    combinator::{all_consuming, map, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

/// Parse failure with a 1-based position in the original input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn at(input: &str, remaining: &str, message: &str) -> Self {
        let offset = input.len().saturating_sub(remaining.len());
        let mut line = 1;
        let mut column = 1;
        for (i, c) in input.char_indices() {
            if i >= offset {
                break;
            }
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        ParseError {
            message: message.to_string(),
            line,
            column,
        }
    }

    fn from_nom(input: &str, err: nom::Err<nom::error::Error<&str>>) -> Self {
        match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                let description = match e.code {
                    nom::error::ErrorKind::Tag | nom::error::ErrorKind::Char => {
                        "Expected a specific token"
                    }
                    nom::error::ErrorKind::Alt => "Expected a variable, IRI, literal or name",
                    nom::error::ErrorKind::Eof => "Unexpected trailing input",
                    _ => "Malformed triple pattern",
                };
                ParseError::at(input, e.input, description)
            }
            nom::Err::Incomplete(_) => ParseError::at(input, "", "Incomplete input"),
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn is_bare_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '#' | '/' | '+')
}

/// `?name`
fn parse_variable(input: &str) -> IResult<&str, Term> {
    map(preceded(char('?'), take_while1(is_name_char)), |name: &str| {
        Term::Variable(name.to_string())
    })(input)
}

fn recognize_iri(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('<'), take_until(">"), char('>')))(input)
}

/// `<http://example.org/a>`
fn parse_iri(input: &str) -> IResult<&str, Term> {
    map(recognize_iri, |iri: &str| Term::Constant(iri.to_string()))(input)
}

/// `"text"`, `"text"@en` or `"5"^^<xsd:int>`
fn parse_literal(input: &str) -> IResult<&str, Term> {
    let quoted = delimited(
        char('"'),
        opt(escaped(none_of("\\\""), '\\', one_of("\"\\nrt"))),
        char('"'),
    );
    let suffix = alt((
        recognize(pair(char('@'), take_while1(is_name_char))),
        recognize(pair(tag("^^"), alt((recognize_iri, take_while1(is_bare_char))))),
    ));
    map(recognize(pair(quoted, opt(suffix))), |lit: &str| {
        Term::Constant(lit.to_string())
    })(input)
}

/// Prefixed names (`ex:a`), bare names and numbers.
fn parse_bare(input: &str) -> IResult<&str, Term> {
    map(take_while1(is_bare_char), |name: &str| {
        Term::Constant(name.to_string())
    })(input)
}

pub fn parse_term(input: &str) -> IResult<&str, Term> {
    alt((parse_variable, parse_iri, parse_literal, parse_bare))(input)
}

pub fn parse_triple_pattern(input: &str) -> IResult<&str, TriplePattern> {
    map(
        tuple((
            parse_term,
            preceded(space1, parse_term),
            preceded(space1, parse_term),
        )),
        |(subject, predicate, object)| TriplePattern::new(subject, predicate, object),
    )(input)
}

/// Triple patterns separated by ` . `, with an optional trailing dot.
pub fn parse_graph_pattern(input: &str) -> IResult<&str, GraphPattern> {
    let separator = tuple((multispace0, char('.'), multispace0));
    map(
        terminated(
            separated_list0(separator, parse_triple_pattern),
            opt(pair(space0, char('.'))),
        ),
        |patterns| patterns.into_iter().collect(),
    )(input)
}

pub fn parse_triple_pattern_str(input: &str) -> Result<TriplePattern, ParseError> {
    let parser = delimited(
        multispace0,
        terminated(parse_triple_pattern, opt(pair(space0, char('.')))),
        multispace0,
    );
    all_consuming(parser)(input)
        .map(|(_, tp)| tp)
        .map_err(|e| ParseError::from_nom(input, e))
}

pub fn parse_graph_pattern_str(input: &str) -> Result<GraphPattern, ParseError> {
    all_consuming(delimited(multispace0, parse_graph_pattern, multispace0))(input)
        .map(|(_, gp)| gp)
        .map_err(|e| ParseError::from_nom(input, e))
}

/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single position of a triple pattern.
///
/// Constants keep their full lexical form (`<http://ex.org/a>`, `"Eek"`,
/// `"5"^^<xsd:int>`, `ex:a`) so two constants are equal only when they are
/// written the same. Variables are stored without the leading `?`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    Variable(String),
    Constant(String),
}

impl Term {
    pub fn var(name: &str) -> Self {
        Term::Variable(name.trim_start_matches('?').to_string())
    }

    /// Wraps `iri` in angle brackets unless it already is.
    pub fn iri(iri: &str) -> Self {
        if iri.starts_with('<') && iri.ends_with('>') {
            Term::Constant(iri.to_string())
        } else {
            Term::Constant(format!("<{}>", iri))
        }
    }

    pub fn literal(value: &str) -> Self {
        Term::Constant(format!("\"{}\"", value.replace('"', "\\\"")))
    }

    pub fn constant(lexical: &str) -> Self {
        Term::Constant(lexical.to_string())
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Term::Constant(_))
    }

    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Term::Variable(name) => Some(name),
            Term::Constant(_) => None,
        }
    }

    pub fn lexical(&self) -> Option<&str> {
        match self {
            Term::Constant(lexical) => Some(lexical),
            Term::Variable(_) => None,
        }
    }

    /// Short human readable label, used for diagrams.
    ///
    /// IRIs are cut down to their fragment or last path segment and literals
    /// lose their quotes and datatype.
    pub fn short_label(&self) -> String {
        match self {
            Term::Variable(name) => format!("?{}", name),
            Term::Constant(lexical) => {
                if let Some(iri) = lexical.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                    if let Some((_, fragment)) = iri.rsplit_once('#') {
                        if !fragment.is_empty() {
                            return fragment.to_string();
                        }
                    }
                    match iri.rsplit_once('/') {
                        Some((_, last)) if !last.is_empty() => last.to_string(),
                        _ => iri.to_string(),
                    }
                } else if let Some(rest) = lexical.strip_prefix('"') {
                    match rest.rfind('"') {
                        Some(end) => rest[..end].to_string(),
                        None => rest.to_string(),
                    }
                } else {
                    lexical.clone()
                }
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) => write!(f, "?{}", name),
            Term::Constant(lexical) => write!(f, "{}", lexical),
        }
    }
}

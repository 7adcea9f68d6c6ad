/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use shared::parser::ParseError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReasonerError {
    #[error("a rule needs a non-empty antecedent or consequent")]
    EmptyRule,

    #[error("a rule with only a consequent needs a binding set handler")]
    MissingHandler,

    #[error("consequent variable ?{0} does not occur in the antecedent")]
    UnprojectableConsequent(String),

    #[error("an objective needs a non-empty antecedent")]
    InvalidObjective,

    #[error("variable ?{variable} is bound to both {first} and {second}")]
    ConflictingBinding {
        variable: String,
        first: String,
        second: String,
    },

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("could not read rules: {0}")]
    Io(#[from] std::io::Error),

    #[error("handler of the objective failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("reasoning did not finish within {0:?}")]
    Timeout(Duration),
}

/// Failure reported by a [`crate::rule::BindingSetHandler`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error("binding has no value for ?{0}")]
    MissingVariable(String),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Message(message.into())
    }
}

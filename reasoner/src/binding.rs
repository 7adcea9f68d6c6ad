/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */
pub mod triple_var;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub use triple_var::{TripleVarBinding, TripleVarBindingSet};

// Single solution mapping: variable name -> lexical RDF term
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Binding(BTreeMap<String, String>);

impl Binding {
    pub fn new() -> Self {
        Binding(BTreeMap::new())
    }

    /// Accepts the variable with or without its leading `?`.
    pub fn put(&mut self, variable: &str, value: &str) {
        self.0.insert(
            variable.trim_start_matches('?').to_string(),
            value.to_string(),
        );
    }

    pub fn with(mut self, variable: &str, value: &str) -> Self {
        self.put(variable, value);
        self
    }

    pub fn get(&self, variable: &str) -> Option<&str> {
        self.0
            .get(variable.trim_start_matches('?'))
            .map(String::as_str)
    }

    pub fn contains_var(&self, variable: &str) -> bool {
        self.0.contains_key(variable.trim_start_matches('?'))
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Binding {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut binding = Binding::new();
        for (variable, value) in iter {
            binding.put(variable, value);
        }
        binding
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self.0.iter().map(|(k, v)| format!("?{}={}", k, v)).collect();
        write!(f, "{{{}}}", entries.join(","))
    }
}

/// Flat representation exchanged with handlers and callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingSet(BTreeSet<Binding>);

impl BindingSet {
    pub fn new() -> Self {
        BindingSet(BTreeSet::new())
    }

    pub fn add(&mut self, binding: Binding) {
        self.0.insert(binding);
    }

    pub fn contains(&self, binding: &Binding) -> bool {
        self.0.contains(binding)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Binding> for BindingSet {
    fn from_iter<I: IntoIterator<Item = Binding>>(iter: I) -> Self {
        BindingSet(iter.into_iter().collect())
    }
}

impl IntoIterator for BindingSet {
    type Item = Binding;
    type IntoIter = std::collections::btree_set::IntoIter<Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a BindingSet {
    type Item = &'a Binding;
    type IntoIter = std::collections::btree_set::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self.0.iter().map(|b| b.to_string()).collect();
        write!(f, "[{}]", entries.join(", "))
    }
}

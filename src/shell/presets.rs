// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Saved filter presets (C11, §4.10).
//!
//! A pure in-memory name-to-expression map; no persistence. Names are
//! validated so they're safe to use as CLI tokens and file-system-free
//! identifiers (`^[A-Za-z][A-Za-z0-9_-]*$`).

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::shell::filter::FilterExpression;

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// An in-memory collection of saved filter presets.
#[derive(Debug, Default)]
pub struct Presets {
    saved: HashMap<String, FilterExpression>,
}

impl Presets {
    /// Builds an empty preset collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves `expression` under `name`, overwriting any existing preset
    /// with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidShell`] if `name` doesn't match
    /// `^[A-Za-z][A-Za-z0-9_-]*$`.
    pub fn save(&mut self, name: &str, expression: FilterExpression) -> Result<(), ConfigError> {
        if !is_valid_name(name) {
            return Err(ConfigError::InvalidShell(format!(
                "invalid preset name '{name}': must start with a letter and contain only letters, digits, '_' or '-'"
            )));
        }
        self.saved.insert(name.to_string(), expression);
        Ok(())
    }

    /// Returns a clone of the preset saved under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<FilterExpression> {
        self.saved.get(name).cloned()
    }

    /// Removes the preset saved under `name`, returning whether one existed.
    pub fn delete(&mut self, name: &str) -> bool {
        self.saved.remove(name).is_some()
    }

    /// Lists every saved preset name, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.saved.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a preset exists under `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.saved.contains_key(name)
    }

    /// Removes every saved preset.
    pub fn clear(&mut self) {
        self.saved.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_get_round_trips() {
        let mut presets = Presets::new();
        presets
            .save("errors", FilterExpression::parse("qos = 2").unwrap())
            .unwrap();
        assert!(presets.has("errors"));
        assert_eq!(presets.get("errors").unwrap().to_sql(), "qos = 2");
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut presets = Presets::new();
        assert!(presets
            .save("1bad", FilterExpression::parse("qos = 1").unwrap())
            .is_err());
        assert!(presets
            .save("has space", FilterExpression::parse("qos = 1").unwrap())
            .is_err());
    }

    #[test]
    fn delete_and_list_and_clear() {
        let mut presets = Presets::new();
        presets.save("a", FilterExpression::new()).unwrap();
        presets.save("b", FilterExpression::new()).unwrap();
        assert_eq!(presets.list(), vec!["a".to_string(), "b".to_string()]);
        assert!(presets.delete("a"));
        assert!(!presets.delete("a"));
        assert_eq!(presets.list(), vec!["b".to_string()]);
        presets.clear();
        assert!(presets.list().is_empty());
    }
}

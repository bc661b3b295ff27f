//! Per-package lookup policy for loading units.
//!
//! A policy maps package-name prefixes to a [`LookupOrder`]. It is never mutated
//! once attached to a unit; new policies are derived with [`LookupPolicy::extend`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which side of the hierarchy a unit consults first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupOrder {
    /// The unit's own sources shadow the parent.
    #[default]
    SelfFirst,
    /// The parent is asked before the unit's own sources.
    ParentFirst,
}

/// Package prefix to lookup order mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LookupPolicy {
    #[serde(default)]
    overrides: BTreeMap<String, LookupOrder>,
}

impl LookupPolicy {
    /// Policy with no overrides; every package resolves self-first.
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy marking every given package with `order`.
    pub fn with_packages<I, S>(packages: I, order: LookupOrder) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().extend_packages(packages, order)
    }

    /// Resolve the lookup order for a package.
    ///
    /// The longest prefix that equals the package, or is followed in it by a
    /// `.`, wins. Packages with no matching prefix resolve self-first.
    pub fn resolve(&self, package: &str) -> LookupOrder {
        self.overrides
            .iter()
            .filter(|(prefix, _)| prefix_matches(prefix, package))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, order)| *order)
            .unwrap_or_default()
    }

    /// Derive a new policy where `overrides` take precedence.
    pub fn extend(&self, overrides: &LookupPolicy) -> LookupPolicy {
        let mut merged = self.overrides.clone();
        for (prefix, order) in &overrides.overrides {
            merged.insert(prefix.clone(), *order);
        }
        LookupPolicy { overrides: merged }
    }

    /// Derive a new policy with every given package set to `order`.
    pub fn extend_packages<I, S>(&self, packages: I, order: LookupOrder) -> LookupPolicy
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut merged = self.overrides.clone();
        for package in packages {
            let package = package.into();
            if !package.is_empty() {
                merged.insert(package, order);
            }
        }
        LookupPolicy { overrides: merged }
    }

    /// Explicit overrides, ordered by prefix.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, LookupOrder)> {
        self.overrides.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

fn prefix_matches(prefix: &str, package: &str) -> bool {
    match package.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;

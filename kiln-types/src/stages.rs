//! Ordered lists of pluggable stages.
//!
//! Feature writers and glyph filters are configured the same way: the user supplies a
//! list of names that may contain `...`, standing in for the default sequence, or the
//! single entry `None`, disabling the stage kind entirely. Implementations come from a
//! compiled-in [Registry] so nothing is looked up by class name at runtime.

use std::fmt::Debug;

use log::debug;

use crate::error::StageError;

/// Stands in for the default stages.
pub const ELLIPSIS: &str = "...";

/// Disables all stages.
pub const NONE: &str = "None";

/// One entry in a user-provided stage list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSpec {
    Defaults,
    Disabled,
    Named(String),
}

impl From<&str> for StageSpec {
    fn from(value: &str) -> Self {
        match value {
            ELLIPSIS => StageSpec::Defaults,
            NONE => StageSpec::Disabled,
            other => StageSpec::Named(other.to_string()),
        }
    }
}

/// Builds stages of type T by name.
pub struct Registry<T> {
    kind: &'static str,
    factories: Vec<(&'static str, fn() -> T)>,
    defaults: Vec<&'static str>,
}

impl<T> Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &self.names())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl<T> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Registry {
            kind,
            factories: Vec::new(),
            defaults: Vec::new(),
        }
    }

    /// Register a stage; if `default` it joins the default sequence in registration order.
    pub fn register(mut self, name: &'static str, factory: fn() -> T, default: bool) -> Self {
        self.factories.push((name, factory));
        if default {
            self.defaults.push(name);
        }
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|(name, _)| *name).collect()
    }

    pub fn defaults(&self) -> &[&'static str] {
        &self.defaults
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|(n, _)| *n == name)
    }

    fn create(&self, name: &str) -> Result<T, StageError> {
        self.factories
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, factory)| factory())
            .ok_or_else(|| StageError::Unavailable {
                kind: self.kind,
                name: name.to_string(),
                available: self.names().into_iter().map(String::from).collect(),
            })
    }

    /// Expand a user stage list into the names to run, in order.
    ///
    /// An empty list means the defaults.
    pub fn resolve_names(&self, specs: &[StageSpec]) -> Result<Vec<String>, StageError> {
        if specs.is_empty() {
            return Ok(self.defaults.iter().map(|n| n.to_string()).collect());
        }
        if specs.contains(&StageSpec::Disabled) {
            if specs.len() > 1 {
                return Err(StageError::NoneWithOthers(self.kind));
            }
            return Ok(Vec::new());
        }
        if specs.iter().filter(|s| **s == StageSpec::Defaults).count() > 1 {
            return Err(StageError::RepeatedEllipsis(self.kind));
        }

        let mut names = Vec::new();
        for spec in specs {
            match spec {
                StageSpec::Defaults => names.extend(self.defaults.iter().map(|n| n.to_string())),
                StageSpec::Named(name) => {
                    if !self.contains(name) {
                        // Fail eagerly, before anything runs
                        self.create(name)?;
                    }
                    names.push(name.clone());
                }
                StageSpec::Disabled => unreachable!("handled above"),
            }
        }
        debug!("Resolved {}s {specs:?} to {names:?}", self.kind);
        Ok(names)
    }

    /// Expand a user stage list and instantiate each stage.
    pub fn resolve(&self, specs: &[StageSpec]) -> Result<Vec<T>, StageError> {
        self.resolve_names(specs)?
            .iter()
            .map(|name| self.create(name))
            .collect()
    }
}

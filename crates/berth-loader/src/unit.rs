//! Isolated loading unit.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use berth_protocols::{LoadError, LoadingUnit, LookupOrder, LookupPolicy, Resource, package_of};

use crate::source::{ByteSource, open_source};

/// A scoped loader over ordered byte sources with an optional parent.
pub struct IsolatedUnit {
    name: String,
    sources: Vec<Box<dyn ByteSource>>,
    parent: Option<Arc<dyn LoadingUnit>>,
    policy: LookupPolicy,
    disposed: AtomicBool,
}

impl IsolatedUnit {
    pub fn new(
        name: impl Into<String>,
        sources: Vec<Box<dyn ByteSource>>,
        parent: Option<Arc<dyn LoadingUnit>>,
        policy: LookupPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            sources,
            parent,
            policy,
            disposed: AtomicBool::new(false),
        }
    }

    /// Open every path as a byte source, in order.
    ///
    /// Sources opened before a failure are closed again.
    pub fn open(
        name: impl Into<String>,
        paths: &[PathBuf],
        parent: Option<Arc<dyn LoadingUnit>>,
        policy: LookupPolicy,
    ) -> Result<Self, LoadError> {
        let mut sources: Vec<Box<dyn ByteSource>> = Vec::with_capacity(paths.len());
        for path in paths {
            match open_source(path) {
                Ok(source) => sources.push(source),
                Err(e) => {
                    for source in &sources {
                        source.close();
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self::new(name, sources, parent, policy))
    }

    /// Locations of the byte sources, in lookup order.
    pub fn source_locations(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.location()).collect()
    }

    /// Union of the packages held by every source.
    pub fn packages(&self) -> Result<BTreeSet<String>, LoadError> {
        let mut packages = BTreeSet::new();
        for source in &self.sources {
            packages.extend(source.packages()?);
        }
        Ok(packages)
    }

    fn find_local(&self, path: &str) -> Result<Option<Resource>, LoadError> {
        for source in &self.sources {
            if let Some(bytes) = source.read(path)? {
                return Ok(Some(Resource::new(path, &self.name, source.location(), bytes)));
            }
        }
        Ok(None)
    }

    fn find_in_parent(&self, path: &str) -> Result<Option<Resource>, LoadError> {
        match &self.parent {
            Some(parent) => match parent.load_resource(path) {
                Ok(resource) => Ok(Some(resource)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }
}

impl LoadingUnit for IsolatedUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> &LookupPolicy {
        &self.policy
    }

    fn parent(&self) -> Option<&Arc<dyn LoadingUnit>> {
        self.parent.as_ref()
    }

    fn load_resource(&self, path: &str) -> Result<Resource, LoadError> {
        if self.is_disposed() {
            return Err(LoadError::Disposed(self.name.clone()));
        }

        let found = match self.policy.resolve(&package_of(path)) {
            LookupOrder::ParentFirst => match self.find_in_parent(path)? {
                Some(resource) => Some(resource),
                None => self.find_local(path)?,
            },
            LookupOrder::SelfFirst => match self.find_local(path)? {
                Some(resource) => Some(resource),
                None => self.find_in_parent(path)?,
            },
        };

        trace!(unit = %self.name, path, hit = found.is_some(), "Resource lookup");
        found.ok_or_else(|| LoadError::NotFound(path.to_string()))
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for source in &self.sources {
            source.close();
        }
        debug!("Disposed loading unit {}", self.name);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "unit_tests.rs"]
mod tests;

//! Loading unit protocol.
//!
//! A loading unit is a scoped code and resource resolution context. Units form a
//! parent-pointer chain through explicit `Arc` references and are composed by a
//! builder rather than through inheritance.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::LoadError;
use crate::policy::LookupPolicy;

/// Suffix of compiled class resources.
pub const CLASS_SUFFIX: &str = ".class";

/// A scoped, hierarchical code and resource resolver.
pub trait LoadingUnit: Send + Sync {
    /// Unit name, unique within one artifact hierarchy.
    fn name(&self) -> &str;

    /// Policy deciding parent-first or self-first per package.
    fn policy(&self) -> &LookupPolicy;

    /// Parent unit, if any.
    fn parent(&self) -> Option<&Arc<dyn LoadingUnit>> {
        None
    }

    /// Resolve a resource by its `/`-separated path.
    fn load_resource(&self, path: &str) -> Result<Resource, LoadError>;

    /// Resolve a class by its dotted name.
    fn load_class(&self, name: &str) -> Result<Resource, LoadError> {
        let path = class_resource_path(name)?;
        self.load_resource(&path)
    }

    /// Release every opened byte source. Calling this twice is a no-op.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

impl fmt::Debug for dyn LoadingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingUnit")
            .field("name", &self.name())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A resolved resource and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Requested path.
    pub name: String,
    /// Name of the unit whose source served the bytes.
    pub unit: String,
    /// Location of the byte source.
    pub source: String,
    pub bytes: Bytes,
}

impl Resource {
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        source: impl Into<String>,
        bytes: Bytes,
    ) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            source: source.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Contents as UTF-8 text, if valid.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Map a dotted class name to its resource path, `a.b.C` to `a/b/C.class`.
pub fn class_resource_path(name: &str) -> Result<String, LoadError> {
    if name.is_empty() || name.split('.').any(|segment| segment.is_empty()) {
        return Err(LoadError::InvalidName(name.to_string()));
    }
    Ok(format!("{}{}", name.replace('.', "/"), CLASS_SUFFIX))
}

/// Package of a resource path: its directory with `/` replaced by `.`.
///
/// Resources at the root belong to the empty package.
pub fn package_of(path: &str) -> String {
    let path = path.trim_start_matches('/');
    match path.rfind('/') {
        Some(idx) => path[..idx].replace('/', "."),
        None => String::new(),
    }
}

/// Package of a dotted class name.
pub fn package_of_class(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) => name[..idx].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_resource_path() {
        assert_eq!(
            class_resource_path("com.acme.shared.Foo").unwrap(),
            "com/acme/shared/Foo.class"
        );
        assert_eq!(class_resource_path("Main").unwrap(), "Main.class");
    }

    #[test]
    fn test_class_resource_path_rejects_empty_segments() {
        assert!(matches!(class_resource_path(""), Err(LoadError::InvalidName(_))));
        assert!(matches!(class_resource_path("com..Foo"), Err(LoadError::InvalidName(_))));
        assert!(matches!(class_resource_path("com.acme."), Err(LoadError::InvalidName(_))));
    }

    #[test]
    fn test_package_of() {
        assert_eq!(package_of("com/acme/shared/Foo.class"), "com.acme.shared");
        assert_eq!(package_of("/META-INF/app.xml"), "META-INF");
        assert_eq!(package_of("app.properties"), "");
    }

    #[test]
    fn test_package_of_class() {
        assert_eq!(package_of_class("com.acme.Foo"), "com.acme");
        assert_eq!(package_of_class("Foo"), "");
    }

    #[test]
    fn test_resource_text() {
        let resource = Resource::new("a.txt", "unit", "/src", Bytes::from_static(b"hello"));
        assert_eq!(resource.as_text(), Some("hello"));
        assert_eq!(resource.len(), 5);
        assert!(!resource.is_empty());
    }
}

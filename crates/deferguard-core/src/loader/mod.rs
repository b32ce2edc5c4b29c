//! Package loader and type-check cache.
//!
//! One [`Loader`] lives for one invocation. Packages are parsed once per
//! import path and kept in an arena addressed by [`PackageId`]; nothing is
//! evicted. Target packages are checked eagerly through
//! [`Loader::load_checked`], dependencies are loaded the first time a
//! resolution needs them.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::source::{PackageSource, PackageUnit};
use crate::syntax::{DeclId, GoParser, SyntaxError};
use crate::types::{Signature, Type};

pub mod package;

pub use package::{Package, PackageId, PackageKind, ScopeEntry};

/// Package loading and type resolution failures. Always fatal.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Package listing failed: {0}")]
    Source(#[from] anyhow::Error),

    #[error("Cannot find package {path}")]
    PackageNotFound { path: String },

    #[error("Package {path} has no Go files")]
    EmptyPackage { path: String },

    #[error("{}: found package {found}, expected {expected}", .file.display())]
    PackageNameMismatch {
        file: PathBuf,
        expected: String,
        found: String,
    },

    #[error("{}: no import provides package name {name}", .file.display())]
    UnresolvedImport { file: PathBuf, name: String },

    #[error("{package}: undefined: {name}")]
    UnresolvedName { package: String, name: String },

    #[error("{package}: {name} is not a type")]
    NotAType { package: String, name: String },

    #[error("{package}: invalid recursive type {name}")]
    Cycle { package: String, name: String },
}

/// Caching package loader; the per-invocation type-check context.
pub struct Loader {
    source: Box<dyn PackageSource>,
    parser: GoParser,
    packages: Vec<Package>,
    by_path: HashMap<String, PackageId>,
    /// Resolved alias targets by (package, alias name).
    pub(crate) aliases: HashMap<(PackageId, String), Type>,
    /// Underlying types of named types by (package, type name).
    pub(crate) underlying: HashMap<(PackageId, String), Type>,
    pub(crate) signatures: HashMap<(PackageId, DeclId), Signature>,
    /// Names whose resolution is in progress, for cycle detection.
    pub(crate) resolving: HashSet<(PackageId, String)>,
}

impl Loader {
    pub fn new(source: Box<dyn PackageSource>) -> Result<Self, LoadError> {
        Ok(Self {
            source,
            parser: GoParser::new()?,
            packages: Vec::new(),
            by_path: HashMap::new(),
            aliases: HashMap::new(),
            underlying: HashMap::new(),
            signatures: HashMap::new(),
            resolving: HashSet::new(),
        })
    }

    pub fn source(&self) -> &dyn PackageSource {
        self.source.as_ref()
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0]
    }

    pub fn lookup(&self, path: &str) -> Option<PackageId> {
        self.by_path.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Load a listed package and check every declaration in it.
    pub fn load_checked(&mut self, unit: &PackageUnit) -> Result<PackageId, LoadError> {
        let id = self.load_unit(unit)?;
        if !self.package(id).is_checked() {
            self.check(id)?;
            self.packages[id.0].checked = true;
        }
        Ok(id)
    }

    /// Load a package by import path, asking the source collaborator for
    /// its files on first use.
    pub fn load_path(&mut self, path: &str) -> Result<PackageId, LoadError> {
        if let Some(id) = self.lookup(path) {
            return Ok(id);
        }
        match path {
            "unsafe" => return Ok(self.insert_sentinel(path, PackageKind::Unsafe)),
            "C" => return Ok(self.insert_sentinel(path, PackageKind::Cgo)),
            _ => {}
        }
        let unit = self
            .source
            .find(path)?
            .ok_or_else(|| LoadError::PackageNotFound {
                path: path.to_string(),
            })?;
        self.load_unit(&unit)
    }

    /// Parse a listed package. Idempotent per import path.
    pub fn load_unit(&mut self, unit: &PackageUnit) -> Result<PackageId, LoadError> {
        if let Some(id) = self.lookup(&unit.import_path) {
            return Ok(id);
        }
        if unit.files.is_empty() {
            return Err(LoadError::EmptyPackage {
                path: unit.import_path.clone(),
            });
        }

        let mut files = Vec::with_capacity(unit.files.len());
        for path in &unit.files {
            let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
            files.push(self.parser.parse_file(path, source)?);
        }

        let name = files[0].package.clone();
        if let Some(other) = files.iter().find(|f| f.package != name) {
            return Err(LoadError::PackageNameMismatch {
                file: other.path.clone(),
                expected: name,
                found: other.package.clone(),
            });
        }

        let id = PackageId(self.packages.len());
        let package = Package::new(id, unit.import_path.clone(), name, unit.dir.clone(), files);
        info!(
            "Loaded package {} ({} files, {} functions)",
            package.path,
            package.files.len(),
            package.decl_count()
        );
        Ok(self.insert(package))
    }

    fn insert_sentinel(&mut self, path: &str, kind: PackageKind) -> PackageId {
        let id = PackageId(self.packages.len());
        debug!("Using sentinel package for {}", path);
        self.insert(Package::sentinel(id, path, kind))
    }

    fn insert(&mut self, package: Package) -> PackageId {
        if let Some(existing) = self.lookup(&package.path) {
            warn!("Package {} is already cached, ignoring re-insert", package.path);
            return existing;
        }
        let id = package.id;
        self.by_path.insert(package.path.clone(), id);
        self.packages.push(package);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ModuleSource;
    use std::fs;
    use tempfile::TempDir;

    fn module(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/m\n\ngo 1.21\n").unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        dir
    }

    fn loader(dir: &TempDir) -> Loader {
        let source = ModuleSource::new(dir.path()).unwrap().with_goroot(None);
        Loader::new(Box::new(source)).unwrap()
    }

    #[test]
    fn test_load_is_idempotent_per_path() {
        let dir = module(&[("a/a.go", "package a\n\ntype T struct{}\n")]);
        let mut loader = loader(&dir);

        let first = loader.load_path("example.com/m/a").unwrap();
        let second = loader.load_path("example.com/m/a").unwrap();
        assert_eq!(first, second);
        assert_eq!(loader.len(), 1);
        assert_eq!(loader.package(first).name, "a");
    }

    #[test]
    fn test_reinsert_is_ignored() {
        let dir = module(&[("a/a.go", "package a\n")]);
        let mut loader = loader(&dir);
        let id = loader.load_path("example.com/m/a").unwrap();

        let duplicate = Package::sentinel(PackageId(7), "example.com/m/a", PackageKind::Cgo);
        assert_eq!(loader.insert(duplicate), id);
        assert_eq!(loader.len(), 1);
        assert_eq!(loader.package(id).kind, PackageKind::Source);
    }

    #[test]
    fn test_pseudo_packages() {
        let dir = module(&[]);
        let mut loader = loader(&dir);
        let unsafe_pkg = loader.load_path("unsafe").unwrap();
        let cgo = loader.load_path("C").unwrap();
        assert_eq!(loader.package(unsafe_pkg).kind, PackageKind::Unsafe);
        assert_eq!(loader.package(cgo).kind, PackageKind::Cgo);
        assert!(loader.package(cgo).files.is_empty());
    }

    #[test]
    fn test_missing_package_is_fatal() {
        let dir = module(&[]);
        let mut loader = loader(&dir);
        let err = loader.load_path("example.com/m/nope").unwrap_err();
        assert!(matches!(err, LoadError::PackageNotFound { .. }), "{err}");
    }

    #[test]
    fn test_package_clause_mismatch() {
        let dir = module(&[
            ("a/a.go", "package a\n"),
            ("a/b.go", "package b\n"),
        ]);
        let mut loader = loader(&dir);
        let err = loader.load_path("example.com/m/a").unwrap_err();
        assert!(matches!(err, LoadError::PackageNameMismatch { .. }), "{err}");
    }
}

//! Loaded package representation

use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::debug;

use crate::syntax::{DeclId, FuncDecl, SourceFile, TypeSpec};

/// Index of a package in the loader arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Source,
    /// The `unsafe` pseudo-package.
    Unsafe,
    /// The cgo `C` pseudo-package.
    Cgo,
}

/// Package-scope declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEntry {
    /// Type spec by file index and position in that file's type list.
    Type { file: usize, index: usize },
    Func(DeclId),
}

#[derive(Debug)]
pub struct Package {
    pub id: PackageId,
    pub path: String,
    pub name: String,
    pub dir: PathBuf,
    pub kind: PackageKind,
    pub files: Vec<SourceFile>,
    pub scope: IndexMap<String, ScopeEntry>,
    /// Method declarations by receiver base type name.
    methods: HashMap<String, Vec<DeclId>>,
    /// `DeclId` to (file index, position in that file's func list).
    decls: Vec<(usize, usize)>,
    pub(crate) checked: bool,
}

impl Package {
    /// Assemble a package from parsed files.
    ///
    /// Declaration ids are assigned here in file order, then source order.
    pub fn new(
        id: PackageId,
        path: String,
        name: String,
        dir: PathBuf,
        mut files: Vec<SourceFile>,
    ) -> Self {
        let mut scope = IndexMap::new();
        let mut methods: HashMap<String, Vec<DeclId>> = HashMap::new();
        let mut decls = Vec::new();

        for (file_index, file) in files.iter_mut().enumerate() {
            for (index, spec) in file.types.iter().enumerate() {
                declare(&mut scope, &spec.name, ScopeEntry::Type { file: file_index, index });
            }
            for (index, func) in file.funcs.iter_mut().enumerate() {
                let decl = DeclId(decls.len());
                func.id = decl;
                decls.push((file_index, index));
                match &func.receiver {
                    Some(recv) => methods.entry(recv.base.clone()).or_default().push(decl),
                    None if func.name != "init" && func.name != "_" => {
                        declare(&mut scope, &func.name, ScopeEntry::Func(decl));
                    }
                    None => {}
                }
            }
        }

        Self {
            id,
            path,
            name,
            dir,
            kind: PackageKind::Source,
            files,
            scope,
            methods,
            decls,
            checked: false,
        }
    }

    pub fn sentinel(id: PackageId, path: &str, kind: PackageKind) -> Self {
        Self {
            id,
            path: path.to_string(),
            name: path.to_string(),
            dir: PathBuf::new(),
            kind,
            files: Vec::new(),
            scope: IndexMap::new(),
            methods: HashMap::new(),
            decls: Vec::new(),
            checked: true,
        }
    }

    pub fn decl(&self, id: DeclId) -> &FuncDecl {
        let (file, index) = self.decls[id.0];
        &self.files[file].funcs[index]
    }

    pub fn file_of(&self, id: DeclId) -> usize {
        self.decls[id.0].0
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    /// Method declarations whose receiver base is `type_name`.
    pub fn methods_of(&self, type_name: &str) -> &[DeclId] {
        self.methods.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The spec declaring `name`, with the index of its file.
    pub fn type_spec(&self, name: &str) -> Option<(usize, &TypeSpec)> {
        match self.scope.get(name)? {
            ScopeEntry::Type { file, index } => Some((*file, &self.files[*file].types[*index])),
            ScopeEntry::Func(_) => None,
        }
    }

    /// Names of every package-scope type, in declaration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.scope.iter().filter_map(|(name, entry)| match entry {
            ScopeEntry::Type { .. } => Some(name.as_str()),
            ScopeEntry::Func(_) => None,
        })
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }
}

fn declare(scope: &mut IndexMap<String, ScopeEntry>, name: &str, entry: ScopeEntry) {
    if scope.contains_key(name) {
        debug!("Duplicate package-scope name {}, keeping the first declaration", name);
        return;
    }
    scope.insert(name.to_string(), entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::GoParser;
    use std::path::Path;

    fn package(sources: &[&str]) -> Package {
        let mut parser = GoParser::new().unwrap();
        let files = sources
            .iter()
            .enumerate()
            .map(|(i, src)| {
                parser
                    .parse_file(Path::new(&format!("f{i}.go")), src.to_string())
                    .unwrap()
            })
            .collect();
        Package::new(
            PackageId(0),
            "example.com/p".to_string(),
            "p".to_string(),
            PathBuf::from("p"),
            files,
        )
    }

    #[test]
    fn test_decl_ids_follow_file_then_source_order() {
        let pkg = package(&[
            "package p\n\ntype T struct{}\n\nfunc (T) A() {}\nfunc (*T) B() {}\n",
            "package p\n\nfunc init() {}\nfunc New() T { return T{} }\nfunc (T) C() {}\n",
        ]);
        assert_eq!(pkg.decl_count(), 5);
        let names: Vec<&str> = (0..5).map(|i| pkg.decl(DeclId(i)).name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "init", "New", "C"]);
        assert_eq!(pkg.methods_of("T"), &[DeclId(0), DeclId(1), DeclId(4)]);
        assert_eq!(pkg.file_of(DeclId(4)), 1);

        assert!(pkg.type_spec("T").is_some());
        assert!(pkg.type_spec("New").is_none());
        assert!(!pkg.scope.contains_key("init"));
        assert_eq!(pkg.type_names().collect::<Vec<_>>(), vec!["T"]);
    }
}

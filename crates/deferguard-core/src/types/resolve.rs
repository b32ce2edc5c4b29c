//! Resolution of syntax-level type expressions into [`Type`]s.

use tracing::debug;

use crate::loader::{LoadError, Loader, PackageId, PackageKind};
use crate::syntax::{DeclId, FieldExpr, InterfaceElem, ParamGroup, TypeExpr};
use crate::types::{
    universe_type, universe_underlying, Field, InterfaceMethod, InterfaceType, MethodKey,
    NamedType, ResolvedParam, Signature, Type, UNIVERSE,
};

/// Where a type expression appears: its package, its file (for imports)
/// and the type parameters in scope.
#[derive(Debug, Clone)]
struct Site {
    package: PackageId,
    file: usize,
    /// Type parameter names as spelled here, with the name they stand for
    /// on the type declaration.
    type_params: Vec<(String, String)>,
}

impl Site {
    fn new(package: PackageId, file: usize) -> Self {
        Self {
            package,
            file,
            type_params: Vec::new(),
        }
    }

    fn with_params(mut self, names: &[String]) -> Self {
        self.type_params
            .extend(names.iter().map(|n| (n.clone(), n.clone())));
        self
    }

    fn type_param(&self, name: &str) -> Option<&str> {
        self.type_params
            .iter()
            .find(|(local, _)| local == name)
            .map(|(_, canonical)| canonical.as_str())
    }
}

impl Loader {
    /// Resolve every type declaration and function signature of a package.
    pub(crate) fn check(&mut self, id: PackageId) -> Result<(), LoadError> {
        let pkg = self.package(id);
        let specs: Vec<(usize, String, bool, Vec<String>, TypeExpr)> = pkg
            .files
            .iter()
            .enumerate()
            .flat_map(|(file, f)| {
                f.types.iter().map(move |s| {
                    (file, s.name.clone(), s.alias, s.type_params.clone(), s.ty.clone())
                })
            })
            .collect();
        let decl_count = pkg.decl_count();

        for (file, name, alias, params, ty) in specs {
            if alias {
                self.resolve_declared(id, &name, Vec::new())?;
            } else {
                let site = Site::new(id, file).with_params(&params);
                self.resolve_expr(&site, &ty)?;
            }
        }

        for decl in (0..decl_count).map(DeclId) {
            let pkg = self.package(id);
            if let Some(recv) = &pkg.decl(decl).receiver {
                if pkg.type_spec(&recv.base).is_none() {
                    return Err(LoadError::UnresolvedName {
                        package: pkg.path.clone(),
                        name: recv.base.clone(),
                    });
                }
            }
            self.signature_of(id, decl)?;
        }

        debug!("Checked package {}", self.package(id).path);
        Ok(())
    }

    /// The type denoted by package-scope name `name` in `package`.
    ///
    /// Defined types come back as [`Type::Named`]; aliases are followed to
    /// their target.
    pub fn resolve_declared(
        &mut self,
        package: PackageId,
        name: &str,
        args: Vec<Type>,
    ) -> Result<Type, LoadError> {
        let pkg = self.package(package);
        match pkg.kind {
            PackageKind::Unsafe if name == "Pointer" => return Ok(Type::basic("unsafe.Pointer")),
            PackageKind::Unsafe => {
                return Err(LoadError::UnresolvedName {
                    package: pkg.path.clone(),
                    name: name.to_string(),
                })
            }
            PackageKind::Cgo => return Ok(Type::Invalid(format!("C.{name}"))),
            PackageKind::Source => {}
        }

        let Some((file, spec)) = pkg.type_spec(name) else {
            let path = pkg.path.clone();
            return Err(if pkg.scope.contains_key(name) {
                LoadError::NotAType {
                    package: path,
                    name: name.to_string(),
                }
            } else {
                LoadError::UnresolvedName {
                    package: path,
                    name: name.to_string(),
                }
            });
        };
        if !spec.alias {
            return Ok(Type::Named(NamedType {
                package: pkg.path.clone(),
                name: name.to_string(),
                args,
            }));
        }

        let key = (package, name.to_string());
        if let Some(target) = self.aliases.get(&key) {
            return Ok(target.clone());
        }
        let site = Site::new(package, file).with_params(&spec.type_params);
        let target_expr = spec.ty.clone();
        let target = self.guarded(key.clone(), |loader| loader.resolve_expr(&site, &target_expr))?;
        self.aliases.insert(key, target.clone());
        Ok(target)
    }

    /// Underlying type: named types are unwrapped to their definition.
    pub fn underlying(&mut self, ty: &Type) -> Result<Type, LoadError> {
        let Type::Named(named) = ty else {
            return Ok(ty.clone());
        };
        if named.package == UNIVERSE {
            return universe_underlying(&named.name).ok_or_else(|| LoadError::UnresolvedName {
                package: "universe".to_string(),
                name: named.name.clone(),
            });
        }
        let package = self.load_path(&named.package)?;
        self.underlying_of(package, &named.name)
    }

    fn underlying_of(&mut self, package: PackageId, name: &str) -> Result<Type, LoadError> {
        let pkg = self.package(package);
        match pkg.kind {
            PackageKind::Unsafe => return Ok(Type::basic("unsafe.Pointer")),
            PackageKind::Cgo => return Ok(Type::Invalid(format!("C.{name}"))),
            PackageKind::Source => {}
        }
        let key = (package, name.to_string());
        if let Some(ty) = self.underlying.get(&key) {
            return Ok(ty.clone());
        }

        let (file, spec) = pkg.type_spec(name).ok_or_else(|| LoadError::UnresolvedName {
            package: pkg.path.clone(),
            name: name.to_string(),
        })?;
        let site = Site::new(package, file).with_params(&spec.type_params);
        let definition = spec.ty.clone();
        let ty = self.guarded(key.clone(), |loader| {
            match loader.resolve_expr(&site, &definition)? {
                named @ Type::Named(_) => loader.underlying(&named),
                other => Ok(other),
            }
        })?;
        self.underlying.insert(key, ty.clone());
        Ok(ty)
    }

    /// Signature of a function or method declaration, receiver excluded.
    pub fn signature_of(&mut self, package: PackageId, decl: DeclId) -> Result<Signature, LoadError> {
        if let Some(sig) = self.signatures.get(&(package, decl)) {
            return Ok(sig.clone());
        }
        let (params, results) = self.resolved_params(package, decl)?;
        let sig = Signature {
            variadic: params.last().is_some_and(|p| p.variadic),
            params: params.into_iter().map(|p| p.ty).collect(),
            results: results.into_iter().map(|p| p.ty).collect(),
        };
        self.signatures.insert((package, decl), sig.clone());
        Ok(sig)
    }

    /// Parameters and results of a declaration, one entry per name.
    pub fn resolved_params(
        &mut self,
        package: PackageId,
        decl: DeclId,
    ) -> Result<(Vec<ResolvedParam>, Vec<ResolvedParam>), LoadError> {
        let site = self.decl_site(package, decl);
        let func = self.package(package).decl(decl);
        let (params, results) = (func.params.clone(), func.results.clone());
        Ok((
            self.resolve_groups(&site, &params)?,
            self.resolve_groups(&site, &results)?,
        ))
    }

    /// Receiver type arguments map positionally onto the parameters of the
    /// receiver's type declaration.
    fn decl_site(&self, package: PackageId, decl: DeclId) -> Site {
        let pkg = self.package(package);
        let func = pkg.decl(decl);
        let mut site = Site::new(package, pkg.file_of(decl));
        if let Some(recv) = &func.receiver {
            let declared = pkg
                .type_spec(&recv.base)
                .map(|(_, spec)| spec.type_params.as_slice())
                .unwrap_or(&[]);
            for (i, local) in recv.type_args.iter().enumerate() {
                let canonical = declared.get(i).unwrap_or(local);
                site.type_params.push((local.clone(), canonical.clone()));
            }
        }
        site.with_params(&func.type_params)
    }

    fn guarded<T>(
        &mut self,
        key: (PackageId, String),
        resolve: impl FnOnce(&mut Self) -> Result<T, LoadError>,
    ) -> Result<T, LoadError> {
        if !self.resolving.insert(key.clone()) {
            return Err(LoadError::Cycle {
                package: self.package(key.0).path.clone(),
                name: key.1,
            });
        }
        let result = resolve(self);
        self.resolving.remove(&key);
        result
    }

    fn resolve_expr(&mut self, site: &Site, expr: &TypeExpr) -> Result<Type, LoadError> {
        let ty = match expr {
            TypeExpr::Name { name, args } => {
                if args.is_empty() {
                    if let Some(param) = site.type_param(name) {
                        return Ok(Type::TypeParam(param.to_string()));
                    }
                }
                let args = self.resolve_all(site, args)?;
                self.resolve_unqualified(site, name, args)?
            }
            TypeExpr::Qualified {
                package,
                name,
                args,
            } => {
                let args = self.resolve_all(site, args)?;
                let path = self.import_path_for(site, package)?;
                let target = self.load_path(&path)?;
                self.resolve_declared(target, name, args)?
            }
            TypeExpr::Pointer(inner) => self.resolve_expr(site, inner)?.pointer_to(),
            TypeExpr::Slice(elem) => Type::Slice(Box::new(self.resolve_expr(site, elem)?)),
            TypeExpr::Array { len, elem } => {
                Type::Array(len.clone(), Box::new(self.resolve_expr(site, elem)?))
            }
            TypeExpr::Map { key, value } => Type::Map(
                Box::new(self.resolve_expr(site, key)?),
                Box::new(self.resolve_expr(site, value)?),
            ),
            TypeExpr::Chan { dir, elem } => Type::Chan(*dir, Box::new(self.resolve_expr(site, elem)?)),
            TypeExpr::Func { params, results } => Type::Func(self.signature(site, params, results)?),
            TypeExpr::Struct(fields) => Type::Struct(self.resolve_fields(site, fields)?),
            TypeExpr::Interface(elems) => Type::Interface(self.resolve_interface(site, elems)?),
            TypeExpr::Unsupported(text) => Type::Invalid(text.clone()),
        };
        Ok(ty)
    }

    fn resolve_all(&mut self, site: &Site, exprs: &[TypeExpr]) -> Result<Vec<Type>, LoadError> {
        exprs.iter().map(|e| self.resolve_expr(site, e)).collect()
    }

    fn resolve_unqualified(
        &mut self,
        site: &Site,
        name: &str,
        args: Vec<Type>,
    ) -> Result<Type, LoadError> {
        if self.package(site.package).scope.contains_key(name) {
            return self.resolve_declared(site.package, name, args);
        }

        let dot_imports: Vec<String> = self.package(site.package).files[site.file]
            .import_specs()
            .filter(|spec| spec.name.as_deref() == Some("."))
            .map(|spec| spec.path.clone())
            .collect();
        for path in dot_imports {
            let imported = self.load_path(&path)?;
            if self.package(imported).type_spec(name).is_some() {
                return self.resolve_declared(imported, name, args);
            }
        }

        universe_type(name).ok_or_else(|| LoadError::UnresolvedName {
            package: self.package(site.package).path.clone(),
            name: name.to_string(),
        })
    }

    /// Import path bound to `local` in the site's file.
    ///
    /// Explicit names win. Otherwise imports are loaded until one declares
    /// package name `local`, starting with those whose path suggests it.
    fn import_path_for(&mut self, site: &Site, local: &str) -> Result<String, LoadError> {
        let file = &self.package(site.package).files[site.file];
        let file_path = file.path.clone();
        let specs: Vec<(Option<String>, String)> = file
            .import_specs()
            .map(|spec| (spec.name.clone(), spec.path.clone()))
            .collect();

        if let Some((_, path)) = specs.iter().find(|(name, _)| name.as_deref() == Some(local)) {
            return Ok(path.clone());
        }

        let mut unnamed: Vec<&String> = specs
            .iter()
            .filter(|(name, _)| name.is_none())
            .map(|(_, path)| path)
            .collect();
        unnamed.sort_by_key(|path| guess_package_name(path) != local);
        for path in unnamed {
            let imported = self.load_path(path)?;
            if self.package(imported).name == local {
                return Ok(path.clone());
            }
        }

        Err(LoadError::UnresolvedImport {
            file: file_path,
            name: local.to_string(),
        })
    }

    fn resolve_groups(
        &mut self,
        site: &Site,
        groups: &[ParamGroup],
    ) -> Result<Vec<ResolvedParam>, LoadError> {
        let mut resolved = Vec::new();
        for group in groups {
            let elem = self.resolve_expr(site, &group.ty)?;
            let ty = if group.variadic {
                Type::Slice(Box::new(elem))
            } else {
                elem
            };
            if group.names.is_empty() {
                resolved.push(ResolvedParam {
                    name: None,
                    ty,
                    variadic: group.variadic,
                });
                continue;
            }
            for name in &group.names {
                resolved.push(ResolvedParam {
                    name: Some(name.clone()),
                    ty: ty.clone(),
                    variadic: group.variadic,
                });
            }
        }
        Ok(resolved)
    }

    fn signature(
        &mut self,
        site: &Site,
        params: &[ParamGroup],
        results: &[ParamGroup],
    ) -> Result<Signature, LoadError> {
        let params = self.resolve_groups(site, params)?;
        let results = self.resolve_groups(site, results)?;
        Ok(Signature {
            variadic: params.last().is_some_and(|p| p.variadic),
            params: params.into_iter().map(|p| p.ty).collect(),
            results: results.into_iter().map(|p| p.ty).collect(),
        })
    }

    fn resolve_fields(&mut self, site: &Site, fields: &[FieldExpr]) -> Result<Vec<Field>, LoadError> {
        let mut resolved = Vec::new();
        for field in fields {
            let ty = self.resolve_expr(site, &field.ty)?;
            if field.is_embedded() {
                let ty = if field.embedded_pointer { ty.pointer_to() } else { ty };
                resolved.push(Field { name: None, ty });
                continue;
            }
            for name in &field.names {
                resolved.push(Field {
                    name: Some(name.clone()),
                    ty: ty.clone(),
                });
            }
        }
        Ok(resolved)
    }

    fn resolve_interface(
        &mut self,
        site: &Site,
        elems: &[InterfaceElem],
    ) -> Result<InterfaceType, LoadError> {
        let package_path = self.package(site.package).path.clone();
        let mut iface = InterfaceType::default();
        for elem in elems {
            match elem {
                InterfaceElem::Method {
                    name,
                    params,
                    results,
                } => iface.methods.push(InterfaceMethod {
                    key: MethodKey::new(name, &package_path),
                    signature: self.signature(site, params, results)?,
                }),
                InterfaceElem::Embed(embedded) => iface.embeds.push(self.resolve_expr(site, embedded)?),
                InterfaceElem::Constraint(_) => {}
            }
        }
        // Sorted so structural identity ignores element order.
        iface.methods.sort_by(|a, b| a.key.cmp(&b.key));
        iface.embeds.sort_by_cached_key(Type::to_string);
        Ok(iface)
    }
}

/// Likely package name for an import path: its last element, skipping a
/// `/vN` major version suffix and a `go-` prefix, cut at the first
/// character that cannot appear in an identifier (`yaml.v3`, `trace-go`).
pub(crate) fn guess_package_name(path: &str) -> String {
    let mut segments = path.rsplit('/');
    let mut last = segments.next().unwrap_or(path);
    let is_version = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    if is_version {
        if let Some(previous) = segments.next() {
            last = previous;
        }
    }
    let last = last.strip_prefix("go-").unwrap_or(last);
    let end = last
        .find(|c: char| c != '_' && !c.is_alphanumeric())
        .unwrap_or(last.len());
    last[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ModuleSource;
    use crate::types::MethodKey;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn module(files: &[(&str, &str)]) -> (TempDir, Loader) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/m\n").unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let source = ModuleSource::new(dir.path()).unwrap();
        let loader = Loader::new(Box::new(source)).unwrap();
        (dir, loader)
    }

    fn checked(loader: &mut Loader, path: &str) -> PackageId {
        let unit = loader.source().find(path).unwrap().unwrap();
        loader.load_checked(&unit).unwrap()
    }

    #[test]
    fn test_guess_package_name() {
        assert_eq!(guess_package_name("context"), "context");
        assert_eq!(guess_package_name("github.com/x/go-yaml"), "yaml");
        assert_eq!(guess_package_name("example.com/lib/v2"), "lib");
        assert_eq!(guess_package_name("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(guess_package_name("github.com/x/trace-go"), "trace");
    }

    #[test]
    fn test_cross_package_alias_and_renamed_import() {
        let (_dir, mut loader) = module(&[
            (
                "lib/lib.go",
                "package lib\n\ntype Item struct{}\n\ntype Ref = *Item\n",
            ),
            (
                "svc/svc.go",
                "package svc\n\nimport l \"example.com/m/lib\"\n\nfunc Take(r l.Ref, n int) {}\n",
            ),
        ]);
        let svc = checked(&mut loader, "example.com/m/svc");
        let sig = loader.signature_of(svc, DeclId(0)).unwrap();
        assert_eq!(
            sig.params,
            vec![
                Type::named("example.com/m/lib", "Item").pointer_to(),
                Type::basic("int")
            ]
        );
    }

    #[test]
    fn test_package_name_differs_from_path() {
        let (_dir, mut loader) = module(&[
            ("go-thing/thing.go", "package thing\n\ntype Box struct{}\n"),
            (
                "use/use.go",
                "package use\n\nimport \"example.com/m/go-thing\"\n\nvar _ thing.Box\n\nfunc F() thing.Box { return thing.Box{} }\n",
            ),
        ]);
        let id = checked(&mut loader, "example.com/m/use");
        let sig = loader.signature_of(id, DeclId(0)).unwrap();
        assert_eq!(sig.results, vec![Type::named("example.com/m/go-thing", "Box")]);
    }

    #[test]
    fn test_undefined_name_is_fatal() {
        let (_dir, mut loader) = module(&[(
            "a/a.go",
            "package a\n\ntype T struct{ missing Widget }\n",
        )]);
        let unit = loader.source().find("example.com/m/a").unwrap().unwrap();
        let err = loader.load_checked(&unit).unwrap_err();
        assert!(
            matches!(&err, LoadError::UnresolvedName { name, .. } if name == "Widget"),
            "{err}"
        );
    }

    #[test]
    fn test_alias_cycle_is_reported() {
        let (_dir, mut loader) = module(&[("a/a.go", "package a\n\ntype A = B\ntype B = A\n")]);
        let unit = loader.source().find("example.com/m/a").unwrap().unwrap();
        let err = loader.load_checked(&unit).unwrap_err();
        assert!(matches!(err, LoadError::Cycle { .. }), "{err}");
    }

    #[test]
    fn test_underlying_and_universe() {
        let (_dir, mut loader) = module(&[(
            "a/a.go",
            "package a\n\ntype Inner interface{ Close() error }\ntype Outer Inner\n",
        )]);
        checked(&mut loader, "example.com/m/a");
        let outer = loader
            .underlying(&Type::named("example.com/m/a", "Outer"))
            .unwrap();
        let Type::Interface(iface) = outer else {
            panic!("expected interface, got {outer}");
        };
        assert_eq!(iface.methods[0].key, MethodKey::new("Close", "example.com/m/a"));
        assert_eq!(
            iface.methods[0].signature.results,
            vec![Type::named(UNIVERSE, "error")]
        );

        let error = loader.underlying(&Type::named(UNIVERSE, "error")).unwrap();
        assert!(matches!(error, Type::Interface(i) if i.methods.len() == 1));
    }

    #[test]
    fn test_interface_literal_identity_ignores_method_order() {
        let (_dir, mut loader) = module(&[(
            "a/a.go",
            r#"package a

type Api interface {
	Use(v interface {
		Open() error
		Close() error
	})
}

type Impl struct{}

func (Impl) Use(v interface {
	Close() error
	Open() error
}) {
}
"#,
        )]);
        checked(&mut loader, "example.com/m/a");
        let api = loader
            .method_set(&Type::named("example.com/m/a", "Api"))
            .unwrap();
        let implementation = loader
            .method_set(&Type::named("example.com/m/a", "Impl"))
            .unwrap();
        assert!(crate::types::method_set::satisfies(&implementation, &api));

        let use_key = MethodKey::new("Use", "example.com/m/a");
        let Type::Interface(param) = &api.get(&use_key).unwrap().signature.params[0] else {
            panic!("expected an interface parameter");
        };
        let names: Vec<&str> = param.methods.iter().map(|m| m.key.name.as_str()).collect();
        assert_eq!(names, vec!["Close", "Open"]);
    }

    #[test]
    fn test_generic_receiver_maps_type_parameters() {
        let (_dir, mut loader) = module(&[(
            "a/a.go",
            "package a\n\ntype List[T any] struct{ items []T }\n\nfunc (l *List[E]) Push(v E) {}\n",
        )]);
        let id = checked(&mut loader, "example.com/m/a");
        let sig = loader.signature_of(id, DeclId(0)).unwrap();
        assert_eq!(sig.params, vec![Type::TypeParam("T".to_string())]);
    }

    #[test]
    fn test_dot_import_and_cgo() {
        let (_dir, mut loader) = module(&[
            ("base/base.go", "package base\n\ntype ID string\n"),
            (
                "a/a.go",
                "package a\n\nimport \"C\"\nimport . \"example.com/m/base\"\n\nfunc F(id ID, n C.int) {}\n",
            ),
        ]);
        let id = checked(&mut loader, "example.com/m/a");
        let sig = loader.signature_of(id, DeclId(0)).unwrap();
        assert_eq!(
            sig.params,
            vec![
                Type::named("example.com/m/base", "ID"),
                Type::Invalid("C.int".to_string())
            ]
        );
    }
}

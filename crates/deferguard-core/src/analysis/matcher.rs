//! Structural matching of concrete types against collected interfaces.

use std::collections::BTreeSet;

use tracing::debug;

use crate::analysis::Interface;
use crate::loader::{LoadError, Loader, PackageId};
use crate::syntax::DeclId;
use crate::types::{satisfies, MethodOrigin, Type};

/// A package-scope concrete type satisfying at least one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateType {
    pub name: String,
    /// Qualified names of the satisfied interfaces.
    pub interfaces: Vec<String>,
    /// Union of the satisfied interfaces' exported method names.
    pub candidates: BTreeSet<String>,
    pub methods: Vec<MatchedMethod>,
}

/// A method declared in the implementation package that implements an
/// interface method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedMethod {
    pub name: String,
    pub decl: DeclId,
}

/// Match the concrete types of `package` against `interfaces`.
///
/// The value type's method set decides which methods are reported; the
/// pointer type's set is used only when the value set is empty. Promoted
/// methods are never reported since they have no declaration here.
pub fn match_implementations(
    loader: &mut Loader,
    package: PackageId,
    interfaces: &[Interface],
) -> Result<Vec<CandidateType>, LoadError> {
    let pkg = loader.package(package);
    let type_names: Vec<String> = pkg
        .type_names()
        .filter(|name| pkg.type_spec(name).is_some_and(|(_, spec)| !spec.alias))
        .map(str::to_string)
        .collect();

    let mut matched = Vec::new();
    for name in type_names {
        let ty = loader.resolve_declared(package, &name, Vec::new())?;
        if matches!(loader.underlying(&ty)?, Type::Interface(_)) {
            continue;
        }
        let value_set = loader.method_set(&ty)?;
        let pointer_set = loader.method_set(&ty.clone().pointer_to())?;

        let mut candidate = CandidateType {
            name,
            interfaces: Vec::new(),
            candidates: BTreeSet::new(),
            methods: Vec::new(),
        };
        for iface in interfaces {
            if satisfies(&value_set, &iface.methods) || satisfies(&pointer_set, &iface.methods) {
                candidate.interfaces.push(iface.qualified_name());
                candidate
                    .candidates
                    .extend(iface.exported_methods().map(str::to_string));
            }
        }
        if candidate.candidates.is_empty() {
            continue;
        }

        let actual = if value_set.is_empty() {
            &pointer_set
        } else {
            &value_set
        };
        for (_, entry) in actual.iter() {
            if !candidate.candidates.contains(&entry.name) {
                continue;
            }
            match entry.origin {
                MethodOrigin::Declared { package: owner, decl } if owner == package => {
                    candidate.methods.push(MatchedMethod {
                        name: entry.name.clone(),
                        decl,
                    });
                }
                _ => debug!("Skipping promoted method {}.{}", candidate.name, entry.name),
            }
        }

        debug!(
            "Type {} matches {:?} with {} methods",
            candidate.name,
            candidate.interfaces,
            candidate.methods.len()
        );
        matched.push(candidate);
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::collect_interfaces;
    use crate::source::ModuleSource;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        loader: Loader,
        iface: PackageId,
        implementation: PackageId,
    }

    fn fixture(iface_src: &str, impl_src: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/m\n").unwrap();
        for (pkg, src) in [("api", iface_src), ("impl", impl_src)] {
            fs::create_dir_all(dir.path().join(pkg)).unwrap();
            fs::write(dir.path().join(pkg).join(format!("{pkg}.go")), src).unwrap();
        }
        let source = ModuleSource::new(dir.path()).unwrap();
        let mut loader = Loader::new(Box::new(source)).unwrap();
        let mut load = |path: &str| {
            let unit = loader.source().find(path).unwrap().unwrap();
            loader.load_checked(&unit).unwrap()
        };
        let iface = load("example.com/m/api");
        let implementation = load("example.com/m/impl");
        Fixture {
            _dir: dir,
            loader,
            iface,
            implementation,
        }
    }

    fn run(f: &mut Fixture) -> Vec<CandidateType> {
        let interfaces = collect_interfaces(&mut f.loader, &[f.iface]).unwrap();
        match_implementations(&mut f.loader, f.implementation, &interfaces).unwrap()
    }

    fn summary(types: &[CandidateType]) -> Vec<(String, Vec<String>)> {
        types
            .iter()
            .map(|t| {
                (
                    t.name.clone(),
                    t.methods.iter().map(|m| m.name.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_candidate_set_is_interface_methods_only() {
        let mut f = fixture(
            "package api\n\ntype Doer interface {\n\tA()\n}\n",
            "package impl\n\ntype T struct{}\n\nfunc (T) A() {}\nfunc (T) C() {}\n",
        );
        let types = run(&mut f);
        assert_eq!(summary(&types), vec![("T".to_string(), vec!["A".to_string()])]);
        assert_eq!(types[0].interfaces, vec!["example.com/m/api.Doer"]);
    }

    #[test]
    fn test_partial_method_set_does_not_match() {
        let mut f = fixture(
            "package api\n\ntype Both interface {\n\tA()\n\tB()\n}\n",
            "package impl\n\ntype T struct{}\n\nfunc (T) A() {}\nfunc (T) C() {}\n",
        );
        assert!(run(&mut f).is_empty());
    }

    #[test]
    fn test_pointer_receivers_fall_back_to_pointer_set() {
        let mut f = fixture(
            "package api\n\ntype Store interface {\n\tGet(key string) string\n\tPut(key, value string)\n}\n",
            r#"package impl

type Mem struct{}

func (*Mem) Get(key string) string { return "" }
func (*Mem) Put(key, value string) {}
func (*Mem) Reset()                {}
"#,
        );
        let types = run(&mut f);
        assert_eq!(
            summary(&types),
            vec![("Mem".to_string(), vec!["Get".to_string(), "Put".to_string()])]
        );
    }

    #[test]
    fn test_value_set_hides_pointer_methods() {
        let mut f = fixture(
            "package api\n\ntype Store interface {\n\tGet() string\n\tPut(v string)\n}\n",
            r#"package impl

type Mixed struct{}

func (Mixed) Get() string { return "" }
func (*Mixed) Put(v string) {}
"#,
        );
        let types = run(&mut f);
        assert_eq!(summary(&types), vec![("Mixed".to_string(), vec!["Get".to_string()])]);
    }

    #[test]
    fn test_promoted_methods_are_dropped() {
        let mut f = fixture(
            "package api\n\ntype Closer interface {\n\tClose() error\n}\n",
            r#"package impl

type base struct{}

func (base) Close() error { return nil }

type Wrapped struct {
	base
}

type Local interface {
	Close() error
}
"#,
        );
        let types = run(&mut f);
        assert_eq!(
            summary(&types),
            vec![
                ("base".to_string(), vec!["Close".to_string()]),
                ("Wrapped".to_string(), vec![]),
            ]
        );
    }
}

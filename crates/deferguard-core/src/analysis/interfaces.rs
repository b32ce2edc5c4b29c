//! Interface collection from interface packages.

use tracing::{debug, info};

use crate::loader::{LoadError, Loader, PackageId};
use crate::types::{MethodSet, Type};

/// An exported, non-empty interface type declared at package scope.
#[derive(Debug, Clone)]
pub struct Interface {
    pub package: String,
    pub name: String,
    pub methods: MethodSet,
}

impl Interface {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.package, self.name)
    }

    pub fn exported_methods(&self) -> impl Iterator<Item = &str> {
        self.methods.exported_names()
    }
}

/// Collect every exported interface with at least one method.
///
/// Interfaces with the same name in different packages are kept apart.
pub fn collect_interfaces(
    loader: &mut Loader,
    packages: &[PackageId],
) -> Result<Vec<Interface>, LoadError> {
    let mut interfaces = Vec::new();
    for &id in packages {
        let pkg = loader.package(id);
        let path = pkg.path.clone();
        let names: Vec<String> = pkg
            .type_names()
            .filter(|name| crate::syntax::is_exported(name))
            .map(str::to_string)
            .collect();

        for name in names {
            let ty = loader.resolve_declared(id, &name, Vec::new())?;
            let Type::Interface(iface) = loader.underlying(&ty)? else {
                continue;
            };
            let methods = loader.interface_method_set(&iface)?;
            if methods.is_empty() {
                debug!("Skipping empty interface {}.{}", path, name);
                continue;
            }
            interfaces.push(Interface {
                package: path.clone(),
                name,
                methods,
            });
        }
    }
    info!("Collected {} interfaces", interfaces.len());
    Ok(interfaces)
}

//! Method sets and structural interface satisfaction.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::loader::{LoadError, Loader, PackageId};
use crate::syntax::DeclId;
use crate::types::{InterfaceType, MethodKey, NamedType, Signature, Type, UNIVERSE};

/// Maximum interface embedding depth before giving up.
const MAX_EMBED_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodOrigin {
    /// Declared with this receiver in the given package.
    Declared { package: PackageId, decl: DeclId },
    /// Promoted through an embedded field; no declaration on the outer type.
    Promoted,
    /// An interface method.
    Abstract,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodEntry {
    pub name: String,
    pub signature: Signature,
    pub origin: MethodOrigin,
}

/// Methods by key, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSet {
    entries: IndexMap<MethodKey, MethodEntry>,
}

impl MethodSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key is already present.
    pub fn insert(&mut self, key: MethodKey, entry: MethodEntry) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, entry);
        true
    }

    pub fn get(&self, key: &MethodKey) -> Option<&MethodEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &MethodKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MethodKey, &MethodEntry)> {
        self.entries.iter()
    }

    pub fn exported_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(key, _)| key.is_exported())
            .map(|(key, _)| key.name.as_str())
    }
}

/// True when `set` has every method of `iface` with an identical signature.
pub fn satisfies(set: &MethodSet, iface: &MethodSet) -> bool {
    iface.iter().all(|(key, wanted)| {
        set.get(key)
            .is_some_and(|have| have.signature == wanted.signature)
    })
}

/// An embedded field reached during promotion.
struct Embedded {
    ty: NamedType,
    /// Reached through a pointer, so pointer-receiver methods promote.
    addressable: bool,
}

impl Loader {
    /// Method set of `ty`: value receivers for `T`, value and pointer
    /// receivers for `*T`, plus promoted methods, or the interface's own
    /// methods for interface types.
    pub fn method_set(&mut self, ty: &Type) -> Result<MethodSet, LoadError> {
        let (base, pointer) = match ty {
            Type::Pointer(inner) => (inner.as_ref(), true),
            other => (other, false),
        };
        let underlying = self.underlying(base)?;
        if let Type::Interface(iface) = &underlying {
            return if pointer {
                Ok(MethodSet::new())
            } else {
                self.interface_method_set(iface)
            };
        }
        let mut set = MethodSet::new();
        let mut visited = HashSet::new();
        if let Type::Named(named) = base {
            visited.insert((named.package.clone(), named.name.clone()));
            for (key, entry, pointer_receiver) in self.declared_methods(named)? {
                if pointer || !pointer_receiver {
                    set.insert(key, entry);
                }
            }
        }
        self.promote(&mut set, &underlying, pointer, visited)?;
        Ok(set)
    }

    /// Methods of an interface, including those of embedded interfaces.
    pub fn interface_method_set(&mut self, iface: &InterfaceType) -> Result<MethodSet, LoadError> {
        let mut set = MethodSet::new();
        self.collect_interface_methods(iface, &mut set, 0)?;
        Ok(set)
    }

    fn collect_interface_methods(
        &mut self,
        iface: &InterfaceType,
        set: &mut MethodSet,
        depth: usize,
    ) -> Result<(), LoadError> {
        for method in &iface.methods {
            set.insert(
                method.key.clone(),
                MethodEntry {
                    name: method.key.name.clone(),
                    signature: method.signature.clone(),
                    origin: MethodOrigin::Abstract,
                },
            );
        }
        for embedded in &iface.embeds {
            if depth >= MAX_EMBED_DEPTH {
                let named = embedded.as_named();
                return Err(LoadError::Cycle {
                    package: named.map(|n| n.package.clone()).unwrap_or_default(),
                    name: named.map(|n| n.name.clone()).unwrap_or_else(|| embedded.to_string()),
                });
            }
            if let Type::Interface(inner) = self.underlying(embedded)? {
                self.collect_interface_methods(&inner, set, depth + 1)?;
            }
        }
        Ok(())
    }

    /// Declared methods of a named type with their receiver kind.
    fn declared_methods(
        &mut self,
        named: &NamedType,
    ) -> Result<Vec<(MethodKey, MethodEntry, bool)>, LoadError> {
        if named.package == UNIVERSE {
            return Ok(Vec::new());
        }
        let package = self.load_path(&named.package)?;
        let decls = self.package(package).methods_of(&named.name).to_vec();
        let mut methods = Vec::with_capacity(decls.len());
        for decl in decls {
            let signature = self.signature_of(package, decl)?;
            let func = self.package(package).decl(decl);
            let pointer_receiver = func.receiver.as_ref().is_some_and(|r| r.pointer);
            methods.push((
                MethodKey::new(&func.name, &named.package),
                MethodEntry {
                    name: func.name.clone(),
                    signature,
                    origin: MethodOrigin::Declared { package, decl },
                },
                pointer_receiver,
            ));
        }
        Ok(methods)
    }

    /// Add methods promoted through embedded fields, breadth-first.
    ///
    /// A name found twice at the same depth is ambiguous and blocks that
    /// name at every deeper level too. That includes one type embedded
    /// twice at the same depth. Names already present (declared on the
    /// outer type or found shallower) shadow deeper ones, and so do field
    /// names.
    fn promote(
        &mut self,
        set: &mut MethodSet,
        underlying: &Type,
        pointer: bool,
        mut visited: HashSet<(String, String)>,
    ) -> Result<(), LoadError> {
        let mut blocked: HashSet<MethodKey> = HashSet::new();
        let mut field_names: HashSet<String> = HashSet::new();
        let mut level = Vec::new();
        collect_embedded(underlying, pointer, &mut level, &mut field_names);

        while !level.is_empty() {
            let mut found: IndexMap<MethodKey, (MethodEntry, usize)> = IndexMap::new();
            let mut next = Vec::new();
            let mut next_fields = HashSet::new();

            // Copies of a type at this depth are expanded once and counted per copy.
            let mut copies: IndexMap<(String, String), (Embedded, usize)> = IndexMap::new();
            for embedded in level {
                let id = (embedded.ty.package.clone(), embedded.ty.name.clone());
                if visited.contains(&id) {
                    continue;
                }
                copies
                    .entry(id)
                    .and_modify(|(_, count)| *count += 1)
                    .or_insert((embedded, 1));
            }
            visited.extend(copies.keys().cloned());

            for (embedded, times) in copies.into_values() {
                let named = Type::Named(embedded.ty.clone());
                let inner = self.underlying(&named)?;
                let candidates: Vec<(MethodKey, MethodEntry)> = match &inner {
                    Type::Interface(iface) => {
                        self.interface_method_set(iface)?.entries.into_iter().collect()
                    }
                    _ => {
                        collect_embedded(&inner, embedded.addressable, &mut next, &mut next_fields);
                        self.declared_methods(&embedded.ty)?
                            .into_iter()
                            .filter(|(_, _, pointer_receiver)| {
                                embedded.addressable || !pointer_receiver
                            })
                            .map(|(key, entry, _)| (key, entry))
                            .collect()
                    }
                };
                for (key, entry) in candidates {
                    found
                        .entry(key)
                        .and_modify(|(_, count)| *count += times)
                        .or_insert((entry, times));
                }
            }

            for (key, (entry, count)) in found {
                if set.contains_key(&key)
                    || blocked.contains(&key)
                    || field_names.contains(&key.name)
                {
                    continue;
                }
                if count > 1 {
                    blocked.insert(key);
                    continue;
                }
                set.insert(
                    key,
                    MethodEntry {
                        origin: MethodOrigin::Promoted,
                        ..entry
                    },
                );
            }
            field_names.extend(next_fields);
            level = next;
        }
        Ok(())
    }
}

/// Embedded fields of a struct type, and the names of its other fields.
fn collect_embedded(
    underlying: &Type,
    addressable: bool,
    embedded: &mut Vec<Embedded>,
    fields: &mut HashSet<String>,
) {
    let Type::Struct(struct_fields) = underlying else {
        return;
    };
    for field in struct_fields {
        match (&field.name, &field.ty) {
            (Some(name), _) => {
                fields.insert(name.clone());
            }
            (None, Type::Pointer(inner)) => {
                if let Type::Named(named) = inner.as_ref() {
                    embedded.push(Embedded {
                        ty: named.clone(),
                        addressable: true,
                    });
                }
            }
            (None, Type::Named(named)) => embedded.push(Embedded {
                ty: named.clone(),
                addressable,
            }),
            (None, _) => {}
        }
    }
}

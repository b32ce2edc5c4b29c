//! Mapping matched methods back to their declarations.

use std::collections::BTreeSet;

use crate::loader::Package;
use crate::syntax::{DeclId, Position};

/// A matched method's declaration within its package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationRef {
    pub decl: DeclId,
    /// Index into the package's files.
    pub file: usize,
    /// `Type.Method`.
    pub name: String,
    /// Position of the method name.
    pub position: Position,
}

/// Single pass over every function declaration of the package, keeping
/// those whose id is in `targets`. Output is in file then source order.
pub fn locate(package: &Package, targets: &BTreeSet<DeclId>) -> Vec<DeclarationRef> {
    let mut refs = Vec::with_capacity(targets.len());
    for (file_index, file) in package.files.iter().enumerate() {
        for func in &file.funcs {
            if targets.contains(&func.id) {
                refs.push(DeclarationRef {
                    decl: func.id,
                    file: file_index,
                    name: func.display_name(),
                    position: func.position,
                });
            }
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::PackageId;
    use crate::syntax::GoParser;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_locate_uses_name_positions() {
        let mut parser = GoParser::new().unwrap();
        let files = vec![
            parser
                .parse_file(
                    Path::new("a.go"),
                    "package p\n\ntype T struct{}\n\n// Do does.\nfunc (t *T) Do() {}\n".to_string(),
                )
                .unwrap(),
            parser
                .parse_file(
                    Path::new("b.go"),
                    "package p\n\nfunc helper() {}\n\nfunc (T) Undo() {}\n".to_string(),
                )
                .unwrap(),
        ];
        let pkg = Package::new(
            PackageId(0),
            "example.com/p".to_string(),
            "p".to_string(),
            PathBuf::from("p"),
            files,
        );

        let targets: BTreeSet<DeclId> = [DeclId(2), DeclId(0)].into_iter().collect();
        let refs = locate(&pkg, &targets);
        let found: Vec<(&str, usize, usize, usize)> = refs
            .iter()
            .map(|r| (r.name.as_str(), r.file, r.position.line, r.position.column))
            .collect();
        assert_eq!(found, vec![("T.Do", 0, 6, 13), ("T.Undo", 1, 5, 10)]);
    }
}

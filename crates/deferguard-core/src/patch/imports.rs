//! Import-ensure for insert mode.

use crate::config::CallSpec;
use crate::syntax::{ImportDecl, ImportSpec, SourceFile};

use super::Patch;

/// Patch adding the call's import to `file`, or `None` when an import
/// already provides the path or the alias.
///
/// Inside a parenthesized block the entry goes after the existing entry
/// sharing the longest prefix with the new path. Without such a block a
/// single-line declaration is inserted before the first declaration.
pub fn ensure_import(file: &SourceFile, call: &CallSpec) -> Option<Patch> {
    let present = file.import_specs().any(|spec| {
        spec.path == call.import_path
            || (call.alias.is_some() && spec.name.as_deref() == call.alias.as_deref())
    });
    if present {
        return None;
    }

    let entry = match &call.alias {
        Some(alias) => format!("{} \"{}\"", alias, call.import_path),
        None => format!("\"{}\"", call.import_path),
    };

    if let Some((decl, anchor)) = anchor_spec(file, &call.import_path) {
        return Some(insert_after(file, decl, anchor, &entry));
    }
    Some(insert_declaration(file, &entry))
}

fn anchor_spec<'a>(
    file: &'a SourceFile,
    path: &str,
) -> Option<(&'a ImportDecl, &'a ImportSpec)> {
    let mut best: Option<(usize, &ImportDecl, &ImportSpec)> = None;
    for decl in file.imports.iter().filter(|decl| decl.is_parenthesized()) {
        for spec in &decl.specs {
            let shared = common_prefix_len(&spec.path, path);
            if best.map_or(true, |(len, _, _)| shared >= len) {
                best = Some((shared, decl, spec));
            }
        }
    }
    best.map(|(_, decl, spec)| (decl, spec))
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

fn insert_after(
    file: &SourceFile,
    decl: &ImportDecl,
    anchor: &ImportSpec,
    entry: &str,
) -> Patch {
    let source = &file.source;
    let line_start = source[..anchor.span.start]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let lead = &source[line_start..anchor.span.start];
    let indent = if lead.chars().all(char::is_whitespace) {
        lead
    } else {
        "\t"
    };
    let line_end = source[anchor.span.end..]
        .find('\n')
        .map(|newline| anchor.span.end + newline);
    match (line_end, decl.close_paren) {
        (Some(end), Some(close)) if end < close => {
            Patch::insert(end + 1, format!("{indent}{entry}\n"))
        }
        // `)` on the anchor's line: the entry gets a line of its own before it.
        (_, Some(close)) => Patch::insert(close, format!("\n{indent}{entry}\n")),
        (Some(end), None) => Patch::insert(end + 1, format!("{indent}{entry}\n")),
        (None, None) => Patch::insert(source.len(), format!("\n{indent}{entry}")),
    }
}

fn insert_declaration(file: &SourceFile, entry: &str) -> Patch {
    let Some(&first) = file.decl_starts.first() else {
        return Patch::insert(file.package_span.end, format!("\n\nimport {entry}"));
    };
    let before_import = file.imports.iter().any(|decl| decl.span.start == first);
    let separator = if before_import { "\n" } else { "\n\n" };
    Patch::insert(
        doc_comment_start(file, first),
        format!("import {entry}{separator}"),
    )
}

/// Start of the doc comments directly above the declaration at `start`.
fn doc_comment_start(file: &SourceFile, start: usize) -> usize {
    let mut offset = start;
    for comment in file.comments.iter().rev() {
        if comment.end > offset {
            continue;
        }
        let gap = &file.source[comment.end..offset];
        if !gap.chars().all(char::is_whitespace) || gap.matches('\n').count() > 1 {
            break;
        }
        offset = comment.start;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::apply;
    use crate::syntax::GoParser;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn ensure(source: &str, spec: &str) -> String {
        let mut parser = GoParser::new().unwrap();
        let file = parser
            .parse_file(Path::new("f.go"), source.to_string())
            .unwrap();
        let call = CallSpec::parse(spec, "Enter").unwrap();
        match ensure_import(&file, &call) {
            Some(patch) => apply(source, &[patch]).unwrap(),
            None => source.to_string(),
        }
    }

    #[test]
    fn test_existing_import_is_kept() {
        let source = "package p\n\nimport \"example.com/trace\"\n\nfunc f() {}\n";
        assert_eq!(ensure(source, "example.com/trace"), source);

        let aliased = "package p\n\nimport (\n\ttr \"example.com/other/trace\"\n)\n";
        assert_eq!(ensure(aliased, "tr=example.com/trace"), aliased);
    }

    #[test]
    fn test_longest_prefix_anchor() {
        let source = "package p\n\nimport (\n\t\"context\"\n\t\"example.com/api\"\n\t\"fmt\"\n)\n";
        assert_eq!(
            ensure(source, "example.com/trace"),
            "package p\n\nimport (\n\t\"context\"\n\t\"example.com/api\"\n\t\"example.com/trace\"\n\t\"fmt\"\n)\n"
        );
    }

    #[test]
    fn test_ties_pick_the_later_entry() {
        let source = "package p\n\nimport (\n    \"fmt\"\n    \"os\"\n)\n";
        assert_eq!(
            ensure(source, "tr=example.com/trace"),
            "package p\n\nimport (\n    \"fmt\"\n    \"os\"\n    tr \"example.com/trace\"\n)\n"
        );
    }

    #[test]
    fn test_closing_paren_on_the_anchor_line() {
        let one_line = "package p\n\nimport (\"fmt\")\n\nvar _ = fmt.Sprint\n";
        assert_eq!(
            ensure(one_line, "example.com/trace"),
            "package p\n\nimport (\"fmt\"\n\t\"example.com/trace\"\n)\n\nvar _ = fmt.Sprint\n"
        );

        let trailing = "package p\n\nimport (\n\t\"context\"\n\t\"fmt\")\n";
        assert_eq!(
            ensure(trailing, "example.com/trace"),
            "package p\n\nimport (\n\t\"context\"\n\t\"fmt\"\n\t\"example.com/trace\"\n)\n"
        );
    }

    #[test]
    fn test_new_declaration_before_first_decl() {
        let source = "package p\n\n// T is a type.\ntype T struct{}\n";
        assert_eq!(
            ensure(source, "example.com/trace"),
            "package p\n\nimport \"example.com/trace\"\n\n// T is a type.\ntype T struct{}\n"
        );

        let single = "package p\n\nimport \"fmt\"\n\nvar _ = fmt.Sprint\n";
        assert_eq!(
            ensure(single, "example.com/trace"),
            "package p\n\nimport \"example.com/trace\"\nimport \"fmt\"\n\nvar _ = fmt.Sprint\n"
        );
    }

    #[test]
    fn test_file_without_declarations() {
        assert_eq!(
            ensure("package p\n", "example.com/trace"),
            "package p\n\nimport \"example.com/trace\"\n"
        );
    }
}

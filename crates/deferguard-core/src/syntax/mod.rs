//! Go source parsing on top of tree-sitter-go.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tree_sitter::Node;

pub mod ast;
mod convert;

pub use ast::{
    is_blank, is_exported, Block, BlockItem, ChanDir, DeclId, Expr, FieldExpr, FuncDecl,
    ImportDecl, ImportSpec, InterfaceElem, ParamGroup, Position, Receiver, SourceFile, Span,
    Stmt, StmtKind, TypeExpr, TypeSpec,
};

use convert::Converter;

/// Parse failures. Always fatal for the package being loaded.
#[derive(Error, Debug)]
pub enum SyntaxError {
    #[error("Failed to initialize Go grammar: {0}")]
    Language(String),

    #[error("{}: parser produced no tree", .path.display())]
    NoTree { path: PathBuf },

    #[error("{}:{line}:{column}: syntax error: {message}", .path.display())]
    Invalid {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{}: missing package clause", .path.display())]
    MissingPackageClause { path: PathBuf },
}

/// Go parser using tree-sitter-go
pub struct GoParser {
    parser: tree_sitter::Parser,
}

impl GoParser {
    pub fn new() -> Result<Self, SyntaxError> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| SyntaxError::Language(e.to_string()))?;
        Ok(Self { parser })
    }

    /// Parse one file into the owned syntax model.
    pub fn parse_file(&mut self, path: &Path, source: String) -> Result<SourceFile, SyntaxError> {
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| SyntaxError::NoTree {
                path: path.to_path_buf(),
            })?;
        let root = tree.root_node();
        if root.has_error() {
            let (line, column, message) = first_error(root)
                .map(|node| {
                    let point = node.start_position();
                    let message = if node.is_missing() {
                        format!("missing {}", node.kind())
                    } else {
                        "unexpected input".to_string()
                    };
                    (point.row + 1, point.column + 1, message)
                })
                .unwrap_or((1, 1, "unexpected input".to_string()));
            return Err(SyntaxError::Invalid {
                path: path.to_path_buf(),
                line,
                column,
                message,
            });
        }
        Converter::new(&source, path).convert_file(root)
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error() || child.is_missing())
        .find_map(first_error)
}

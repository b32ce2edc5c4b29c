//! Conversion from the tree-sitter-go CST into the owned syntax model.

use std::path::Path;

use tree_sitter::Node;

use super::ast::{
    Block, BlockItem, ChanDir, DeclId, Expr, FieldExpr, FuncDecl, ImportDecl, ImportSpec,
    InterfaceElem, ParamGroup, Position, Receiver, SourceFile, Span, Stmt, StmtKind, TypeExpr,
    TypeSpec,
};
use super::SyntaxError;

pub(super) struct Converter<'a> {
    source: &'a str,
    path: &'a Path,
}

impl<'a> Converter<'a> {
    pub(super) fn new(source: &'a str, path: &'a Path) -> Self {
        Self { source, path }
    }

    fn get_node_text(&self, node: Node) -> &'a str {
        &self.source[node.start_byte()..node.end_byte()]
    }

    fn span(node: Node) -> Span {
        Span::new(node.start_byte(), node.end_byte())
    }

    fn position(node: Node) -> Position {
        let point = node.start_position();
        Position {
            line: point.row + 1,
            column: point.column + 1,
        }
    }

    pub(super) fn convert_file(&self, root: Node) -> Result<SourceFile, SyntaxError> {
        let mut file = SourceFile {
            path: self.path.to_path_buf(),
            source: self.source.to_string(),
            package: String::new(),
            package_span: Span::default(),
            imports: Vec::new(),
            decl_starts: Vec::new(),
            comments: Vec::new(),
            types: Vec::new(),
            funcs: Vec::new(),
        };

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_clause" => {
                    let name = named_children(child)
                        .into_iter()
                        .find(|n| matches!(n.kind(), "package_identifier" | "identifier"))
                        .ok_or_else(|| self.error_at(child, "package clause without a name"))?;
                    file.package = self.get_node_text(name).to_string();
                    file.package_span = Self::span(child);
                }
                "comment" => file.comments.push(Self::span(child)),
                "import_declaration" => {
                    file.decl_starts.push(child.start_byte());
                    file.imports.push(self.convert_import_declaration(child));
                }
                "type_declaration" => {
                    file.decl_starts.push(child.start_byte());
                    for spec in named_children(child) {
                        if matches!(spec.kind(), "type_spec" | "type_alias") {
                            file.types.push(self.convert_type_spec(spec)?);
                        }
                    }
                }
                "function_declaration" | "method_declaration" => {
                    file.decl_starts.push(child.start_byte());
                    file.funcs.push(self.convert_func(child)?);
                }
                _ => file.decl_starts.push(child.start_byte()),
            }
        }

        if file.package.is_empty() {
            return Err(SyntaxError::MissingPackageClause {
                path: self.path.to_path_buf(),
            });
        }
        Ok(file)
    }

    fn error_at(&self, node: Node, message: &str) -> SyntaxError {
        let position = Self::position(node);
        SyntaxError::Invalid {
            path: self.path.to_path_buf(),
            line: position.line,
            column: position.column,
            message: message.to_string(),
        }
    }

    fn convert_import_declaration(&self, node: Node) -> ImportDecl {
        let mut decl = ImportDecl {
            span: Self::span(node),
            open_paren: None,
            close_paren: None,
            specs: Vec::new(),
        };
        for child in named_children(node) {
            match child.kind() {
                "import_spec" => decl.specs.extend(self.convert_import_spec(child)),
                "import_spec_list" => {
                    let mut cursor = child.walk();
                    for paren in child.children(&mut cursor) {
                        match paren.kind() {
                            "(" => decl.open_paren = Some(paren.end_byte()),
                            ")" => decl.close_paren = Some(paren.start_byte()),
                            _ => {}
                        }
                    }
                    for spec in named_children(child) {
                        if spec.kind() == "import_spec" {
                            decl.specs.extend(self.convert_import_spec(spec));
                        }
                    }
                }
                _ => {}
            }
        }
        decl
    }

    fn convert_import_spec(&self, node: Node) -> Option<ImportSpec> {
        let path = node.child_by_field_name("path")?;
        let name = node
            .child_by_field_name("name")
            .map(|n| self.get_node_text(n).to_string());
        Some(ImportSpec {
            name,
            path: unquote(self.get_node_text(path)).to_string(),
            span: Self::span(node),
        })
    }

    fn convert_type_spec(&self, node: Node) -> Result<TypeSpec, SyntaxError> {
        let name = node
            .child_by_field_name("name")
            .ok_or_else(|| self.error_at(node, "type declaration without a name"))?;
        let ty = node
            .child_by_field_name("type")
            .ok_or_else(|| self.error_at(node, "type declaration without a type"))?;
        Ok(TypeSpec {
            name: self.get_node_text(name).to_string(),
            name_span: Self::span(name),
            alias: node.kind() == "type_alias",
            type_params: self.convert_type_params(node.child_by_field_name("type_parameters")),
            ty: self.convert_type(ty),
        })
    }

    fn convert_type_params(&self, node: Option<Node>) -> Vec<String> {
        let Some(node) = node else {
            return Vec::new();
        };
        let mut names = Vec::new();
        for decl in named_children(node) {
            if decl.kind() != "type_parameter_declaration" {
                continue;
            }
            let mut cursor = decl.walk();
            names.extend(
                decl.children_by_field_name("name", &mut cursor)
                    .map(|n| self.get_node_text(n).to_string()),
            );
        }
        names
    }

    fn convert_func(&self, node: Node) -> Result<FuncDecl, SyntaxError> {
        let name = node
            .child_by_field_name("name")
            .ok_or_else(|| self.error_at(node, "function declaration without a name"))?;
        let receiver = match node.child_by_field_name("receiver") {
            Some(list) => Some(self.convert_receiver(list)?),
            None => None,
        };
        let params = match node.child_by_field_name("parameters") {
            Some(list) => self.convert_params(list),
            None => Vec::new(),
        };
        Ok(FuncDecl {
            // Renumbered when the package is assembled.
            id: DeclId(0),
            name: self.get_node_text(name).to_string(),
            name_span: Self::span(name),
            position: Self::position(name),
            receiver,
            type_params: self.convert_type_params(node.child_by_field_name("type_parameters")),
            params,
            results: self.convert_result(node.child_by_field_name("result")),
            body: node
                .child_by_field_name("body")
                .map(|body| self.convert_block(body)),
        })
    }

    fn convert_receiver(&self, list: Node) -> Result<Receiver, SyntaxError> {
        let decl = named_children(list)
            .into_iter()
            .find(|n| n.kind() == "parameter_declaration")
            .ok_or_else(|| self.error_at(list, "method without a receiver"))?;
        let name = decl
            .child_by_field_name("name")
            .map(|n| self.get_node_text(n).to_string());
        let mut ty = decl
            .child_by_field_name("type")
            .ok_or_else(|| self.error_at(decl, "receiver without a type"))?;

        let mut pointer = false;
        loop {
            match ty.kind() {
                "parenthesized_type" => {
                    ty = first_named(ty).ok_or_else(|| self.error_at(ty, "empty receiver type"))?;
                }
                "pointer_type" => {
                    pointer = true;
                    ty = first_named(ty).ok_or_else(|| self.error_at(ty, "empty receiver type"))?;
                }
                _ => break,
            }
        }

        let (base, type_args) = match ty.kind() {
            "generic_type" => {
                let base = ty
                    .child_by_field_name("type")
                    .ok_or_else(|| self.error_at(ty, "generic receiver without a base type"))?;
                let args = ty
                    .child_by_field_name("type_arguments")
                    .map(|args| {
                        named_children(args)
                            .into_iter()
                            .map(|arg| self.get_node_text(arg).trim().to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                (self.get_node_text(base).to_string(), args)
            }
            _ => (self.get_node_text(ty).to_string(), Vec::new()),
        };

        Ok(Receiver {
            name,
            base,
            pointer,
            type_args,
        })
    }

    fn convert_params(&self, list: Node) -> Vec<ParamGroup> {
        let mut groups = Vec::new();
        for decl in named_children(list) {
            let variadic = match decl.kind() {
                "parameter_declaration" => false,
                "variadic_parameter_declaration" => true,
                _ => continue,
            };
            let mut cursor = decl.walk();
            let names = decl
                .children_by_field_name("name", &mut cursor)
                .map(|n| self.get_node_text(n).to_string())
                .collect();
            let ty = match decl.child_by_field_name("type") {
                Some(ty) => self.convert_type(ty),
                None => TypeExpr::Unsupported(self.get_node_text(decl).to_string()),
            };
            groups.push(ParamGroup {
                names,
                ty,
                variadic,
            });
        }
        groups
    }

    fn convert_result(&self, node: Option<Node>) -> Vec<ParamGroup> {
        match node {
            None => Vec::new(),
            Some(list) if list.kind() == "parameter_list" => self.convert_params(list),
            Some(ty) => vec![ParamGroup {
                names: Vec::new(),
                ty: self.convert_type(ty),
                variadic: false,
            }],
        }
    }

    pub(super) fn convert_type(&self, node: Node) -> TypeExpr {
        match node.kind() {
            "type_identifier" | "identifier" => TypeExpr::Name {
                name: self.get_node_text(node).to_string(),
                args: Vec::new(),
            },
            "qualified_type" => {
                match (
                    node.child_by_field_name("package"),
                    node.child_by_field_name("name"),
                ) {
                    (Some(package), Some(name)) => TypeExpr::Qualified {
                        package: self.get_node_text(package).to_string(),
                        name: self.get_node_text(name).to_string(),
                        args: Vec::new(),
                    },
                    _ => self.unsupported(node),
                }
            }
            "generic_type" => {
                let Some(base) = node.child_by_field_name("type") else {
                    return self.unsupported(node);
                };
                let args: Vec<TypeExpr> = node
                    .child_by_field_name("type_arguments")
                    .map(|list| {
                        named_children(list)
                            .into_iter()
                            .map(|arg| self.convert_type(arg))
                            .collect()
                    })
                    .unwrap_or_default();
                match self.convert_type(base) {
                    TypeExpr::Name { name, .. } => TypeExpr::Name { name, args },
                    TypeExpr::Qualified { package, name, .. } => TypeExpr::Qualified {
                        package,
                        name,
                        args,
                    },
                    _ => self.unsupported(node),
                }
            }
            "pointer_type" => match first_named(node) {
                Some(inner) => TypeExpr::Pointer(Box::new(self.convert_type(inner))),
                None => self.unsupported(node),
            },
            "slice_type" => match node.child_by_field_name("element") {
                Some(elem) => TypeExpr::Slice(Box::new(self.convert_type(elem))),
                None => self.unsupported(node),
            },
            "array_type" | "implicit_length_array_type" => {
                let Some(elem) = node.child_by_field_name("element") else {
                    return self.unsupported(node);
                };
                let len = node
                    .child_by_field_name("length")
                    .map(|len| self.get_node_text(len).to_string())
                    .unwrap_or_else(|| "...".to_string());
                TypeExpr::Array {
                    len,
                    elem: Box::new(self.convert_type(elem)),
                }
            }
            "map_type" => match (
                node.child_by_field_name("key"),
                node.child_by_field_name("value"),
            ) {
                (Some(key), Some(value)) => TypeExpr::Map {
                    key: Box::new(self.convert_type(key)),
                    value: Box::new(self.convert_type(value)),
                },
                _ => self.unsupported(node),
            },
            "channel_type" => {
                let Some(value) = node.child_by_field_name("value") else {
                    return self.unsupported(node);
                };
                let mut cursor = node.walk();
                let tokens: Vec<&str> = node
                    .children(&mut cursor)
                    .filter(|c| !c.is_named())
                    .map(|c| c.kind())
                    .collect();
                let dir = match tokens.as_slice() {
                    ["<-", ..] => ChanDir::Recv,
                    ["chan", "<-", ..] => ChanDir::Send,
                    _ => ChanDir::Both,
                };
                TypeExpr::Chan {
                    dir,
                    elem: Box::new(self.convert_type(value)),
                }
            }
            "function_type" => TypeExpr::Func {
                params: node
                    .child_by_field_name("parameters")
                    .map(|list| self.convert_params(list))
                    .unwrap_or_default(),
                results: self.convert_result(node.child_by_field_name("result")),
            },
            "struct_type" => {
                let mut fields = Vec::new();
                for list in named_children(node) {
                    if list.kind() != "field_declaration_list" {
                        continue;
                    }
                    for field in named_children(list) {
                        if field.kind() == "field_declaration" {
                            fields.extend(self.convert_field(field));
                        }
                    }
                }
                TypeExpr::Struct(fields)
            }
            "interface_type" => {
                let elems = named_children(node)
                    .into_iter()
                    .filter(|n| n.kind() != "comment")
                    .map(|elem| self.convert_interface_elem(elem))
                    .collect();
                TypeExpr::Interface(elems)
            }
            "parenthesized_type" | "type_elem" => {
                let inner = named_children(node);
                match inner.as_slice() {
                    [single] => self.convert_type(*single),
                    _ => self.unsupported(node),
                }
            }
            _ => self.unsupported(node),
        }
    }

    fn unsupported(&self, node: Node) -> TypeExpr {
        TypeExpr::Unsupported(self.get_node_text(node).to_string())
    }

    fn convert_field(&self, node: Node) -> Option<FieldExpr> {
        let ty = node.child_by_field_name("type")?;
        let mut cursor = node.walk();
        let names: Vec<String> = node
            .children_by_field_name("name", &mut cursor)
            .map(|n| self.get_node_text(n).to_string())
            .collect();
        let mut cursor = node.walk();
        let embedded_pointer =
            names.is_empty() && node.children(&mut cursor).any(|c| c.kind() == "*");
        Some(FieldExpr {
            names,
            ty: self.convert_type(ty),
            embedded_pointer,
        })
    }

    fn convert_interface_elem(&self, node: Node) -> InterfaceElem {
        match node.kind() {
            "method_elem" | "method_spec" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.get_node_text(n).to_string())
                    .unwrap_or_default();
                InterfaceElem::Method {
                    name,
                    params: node
                        .child_by_field_name("parameters")
                        .map(|list| self.convert_params(list))
                        .unwrap_or_default(),
                    results: self.convert_result(node.child_by_field_name("result")),
                }
            }
            _ => {
                let inner = named_children(node);
                let target = match (node.kind(), inner.as_slice()) {
                    ("type_identifier" | "qualified_type" | "generic_type", _) => Some(node),
                    (_, [single])
                        if matches!(
                            single.kind(),
                            "type_identifier" | "qualified_type" | "generic_type"
                        ) =>
                    {
                        Some(*single)
                    }
                    _ => None,
                };
                match target {
                    Some(ty) => InterfaceElem::Embed(self.convert_type(ty)),
                    None => InterfaceElem::Constraint(self.get_node_text(node).to_string()),
                }
            }
        }
    }

    fn convert_block(&self, node: Node) -> Block {
        let mut items = Vec::new();
        for child in named_children_with_comments(node) {
            if child.kind() == "statement_list" {
                for stmt in named_children_with_comments(child) {
                    items.push(self.convert_block_item(stmt));
                }
            } else {
                items.push(self.convert_block_item(child));
            }
        }
        items.sort_by_key(|item| match item {
            BlockItem::Comment { span, .. } => span.start,
            BlockItem::Stmt(stmt) => stmt.span.start,
        });
        Block {
            open: node.start_byte(),
            close: node.end_byte().saturating_sub(1),
            items,
        }
    }

    fn convert_block_item(&self, node: Node) -> BlockItem {
        if node.kind() == "comment" {
            return BlockItem::Comment {
                span: Self::span(node),
                text: self.get_node_text(node).to_string(),
            };
        }
        let kind = match node.kind() {
            "defer_statement" => match first_named(node) {
                Some(expr) => StmtKind::Defer(self.convert_expr(expr)),
                None => StmtKind::Other,
            },
            _ => StmtKind::Other,
        };
        BlockItem::Stmt(Stmt {
            span: Self::span(node),
            kind,
        })
    }

    pub(super) fn convert_expr(&self, node: Node) -> Expr {
        match node.kind() {
            "identifier" => Expr::Ident(self.get_node_text(node).to_string()),
            "selector_expression" => match (
                node.child_by_field_name("operand"),
                node.child_by_field_name("field"),
            ) {
                (Some(operand), Some(field)) => Expr::Selector {
                    operand: Box::new(self.convert_expr(operand)),
                    field: self.get_node_text(field).to_string(),
                },
                _ => Expr::Other(self.get_node_text(node).to_string()),
            },
            "call_expression" => {
                let Some(func) = node.child_by_field_name("function") else {
                    return Expr::Other(self.get_node_text(node).to_string());
                };
                let args = node
                    .child_by_field_name("arguments")
                    .map(|list| {
                        named_children(list)
                            .into_iter()
                            .map(|arg| self.convert_expr(arg))
                            .collect()
                    })
                    .unwrap_or_default();
                Expr::Call {
                    func: Box::new(self.convert_expr(func)),
                    args,
                }
            }
            "unary_expression" => match (
                node.child_by_field_name("operator"),
                node.child_by_field_name("operand"),
            ) {
                (Some(op), Some(operand)) => Expr::Unary {
                    op: self.get_node_text(op).to_string(),
                    operand: Box::new(self.convert_expr(operand)),
                },
                _ => Expr::Other(self.get_node_text(node).to_string()),
            },
            "interpreted_string_literal" | "raw_string_literal" => {
                Expr::StringLit(self.get_node_text(node).to_string())
            }
            "parenthesized_expression" => match first_named(node) {
                Some(inner) => self.convert_expr(inner),
                None => Expr::Other(self.get_node_text(node).to_string()),
            },
            _ => Expr::Other(self.get_node_text(node).to_string()),
        }
    }
}

/// Named children, comments excluded.
fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

fn named_children_with_comments(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn first_named(node: Node) -> Option<Node> {
    named_children(node).into_iter().next()
}

fn unquote(literal: &str) -> &str {
    let trimmed = literal.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('`').and_then(|s| s.strip_suffix('`')))
        .unwrap_or(trimmed)
}

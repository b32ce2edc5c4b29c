use tracing::debug;

use super::{
    deferred_call, is_skip_marker, CallForm, CallLevel, Conformance, DeferredCall, Malformation,
    Outcome,
};
use crate::config::{GuardConfig, RemoveTarget};
use crate::syntax::{Block, Expr, FuncDecl, Stmt};

/// The call shape to look for: package identifier, call name and the
/// name of its formatted variant.
#[derive(Debug, Clone)]
pub struct Grammar {
    package: String,
    name: String,
    formatted: String,
    skip_marker: Option<String>,
}

impl Grammar {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            package: config.call.package_ident(),
            name: config.call.name.clone(),
            formatted: format!("{}{}", config.call.name, config.format_suffix),
            skip_marker: Some(config.skip_marker.clone()).filter(|m| !m.is_empty()),
        }
    }

    /// Grammar for the call that remove mode strips.
    pub fn for_target(target: &RemoveTarget, format_suffix: &str) -> Self {
        Self {
            package: target.package.clone(),
            name: target.name.clone(),
            formatted: format!("{}{}", target.name, format_suffix),
            skip_marker: None,
        }
    }

    fn form(&self, name: &str) -> Option<CallForm> {
        if name == self.name {
            Some(CallForm::Plain)
        } else if name == self.formatted {
            Some(CallForm::Formatted)
        } else {
            None
        }
    }

    fn expected(&self) -> String {
        format!("{0}.{1} or {0}.{2}", self.package, self.name, self.formatted)
    }

    /// Classify a declaration's first statement.
    ///
    /// `context` is the name of the function's context parameter, which may
    /// lead the argument list of either call level.
    pub fn validate(&self, decl: &FuncDecl, context: Option<&str>) -> Outcome {
        let Some(body) = &decl.body else {
            return Outcome::Conforms(Conformance::Bodiless);
        };
        let Some(call) = body.statements().next().and_then(deferred_call) else {
            return self.absent(decl, body);
        };

        let found = format!("{}.{}", call.package, call.name);
        let form = match self.form(call.name) {
            Some(form) if call.package == self.package => form,
            _ => {
                return Outcome::Malformed(Malformation::WrongCallee {
                    expected: self.expected(),
                    found,
                })
            }
        };
        if let Err(why) = check_args(&call, form, context) {
            return Outcome::Malformed(why);
        }
        Outcome::Conforms(Conformance::Call(form))
    }

    fn absent(&self, decl: &FuncDecl, body: &Block) -> Outcome {
        let skipped = self.skip_marker.as_deref().is_some_and(|marker| {
            body.leading_comments()
                .any(|comment| is_skip_marker(comment, marker))
        });
        if skipped {
            debug!("{} exempted by skip marker", decl.display_name());
            return Outcome::Conforms(Conformance::Skipped);
        }
        Outcome::Absent
    }

    /// The first statement, when it is a deferred call of this grammar's
    /// package and name, in either variant.
    pub fn find<'a>(&self, decl: &'a FuncDecl) -> Option<&'a Stmt> {
        let first = decl.body.as_ref()?.statements().next()?;
        let call = deferred_call(first)?;
        (call.package == self.package && self.form(call.name).is_some()).then_some(first)
    }
}

fn check_args(
    call: &DeferredCall<'_>,
    form: CallForm,
    context: Option<&str>,
) -> Result<(), Malformation> {
    for (level, args) in [(CallLevel::Inner, call.inner), (CallLevel::Outer, call.outer)] {
        let mut rest = args;
        if let (Some(ctx), [Expr::Ident(first), tail @ ..]) = (context, rest) {
            if first == ctx {
                rest = tail;
            }
        }
        if form == CallForm::Formatted {
            match rest {
                [Expr::StringLit(_), tail @ ..] => rest = tail,
                _ => return Err(Malformation::MissingFormat { level }),
            }
        }
        if level == CallLevel::Outer {
            let skipped = args.len() - rest.len();
            for (i, arg) in rest.iter().enumerate() {
                if !matches!(arg, Expr::Unary { op, .. } if op == "&") {
                    return Err(Malformation::NotAddressOf {
                        position: skipped + i + 1,
                        found: render(arg),
                    });
                }
            }
        }
    }
    Ok(())
}

fn render(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Selector { operand, field } => format!("{}.{}", render(operand), field),
        Expr::Call { func, .. } => format!("{}(...)", render(func)),
        Expr::Unary { op, operand } => format!("{}{}", op, render(operand)),
        Expr::StringLit(text) | Expr::Other(text) => text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::GoParser;
    use std::path::Path;

    fn first_func(body: &str) -> FuncDecl {
        let source = format!("package p\n\nfunc (T) Do(ctx context.Context) (err error) {body}\n");
        let mut parser = GoParser::new().unwrap();
        let file = parser.parse_file(Path::new("p.go"), source).unwrap();
        file.funcs.into_iter().next().unwrap()
    }

    fn grammar() -> Grammar {
        let mut config = GuardConfig::default();
        config.call = crate::config::CallSpec::parse("example.com/trace", "Enter").unwrap();
        Grammar::new(&config)
    }

    fn outcome(body: &str) -> Outcome {
        grammar().validate(&first_func(body), Some("ctx"))
    }

    #[test]
    fn test_conforming_forms() {
        assert_eq!(
            outcome("{\n\tdefer trace.Enter(ctx)(ctx)\n\twork()\n}"),
            Outcome::Conforms(Conformance::Call(CallForm::Plain))
        );
        assert_eq!(
            outcome("{\n\tdefer trace.Enter()()\n}"),
            Outcome::Conforms(Conformance::Call(CallForm::Plain))
        );
        assert_eq!(
            outcome("{\n\tdefer trace.Enterf(ctx, \"n=%v\", n)(ctx, \"err=%v\", &err)\n}"),
            Outcome::Conforms(Conformance::Call(CallForm::Formatted))
        );
    }

    #[test]
    fn test_absent_and_skip_marker() {
        assert_eq!(outcome("{\n\twork()\n}"), Outcome::Absent);
        assert_eq!(outcome("{}"), Outcome::Absent);
        assert_eq!(outcome("{\n\tdefer mu.Unlock()\n}"), Outcome::Absent);
        assert_eq!(
            outcome("{\n\t// deferguard:skip\n\twork()\n}"),
            Outcome::Conforms(Conformance::Skipped)
        );
        assert_eq!(
            outcome("{\n\twork()\n\t// deferguard:skip\n}"),
            Outcome::Absent
        );
    }

    #[test]
    fn test_skip_marker_never_hides_malformed() {
        let result = outcome("{\n\t// deferguard:skip\n\tdefer trace.Enter(ctx)(ctx, err)\n}");
        assert_eq!(
            result,
            Outcome::Malformed(Malformation::NotAddressOf {
                position: 2,
                found: "err".to_string()
            })
        );
    }

    #[test]
    fn test_malformed_calls() {
        assert!(matches!(
            outcome("{\n\tdefer other.Enter(ctx)(ctx)\n}"),
            Outcome::Malformed(Malformation::WrongCallee { found, .. }) if found == "other.Enter"
        ));
        assert!(matches!(
            outcome("{\n\tdefer trace.Exit(ctx)(ctx)\n}"),
            Outcome::Malformed(Malformation::WrongCallee { .. })
        ));
        assert_eq!(
            outcome("{\n\tdefer trace.Enterf(ctx, n)(ctx, \"\")\n}"),
            Outcome::Malformed(Malformation::MissingFormat {
                level: CallLevel::Inner
            })
        );
        assert_eq!(
            outcome("{\n\tdefer trace.Enterf(ctx, \"n=%v\", n)(ctx, &err)\n}"),
            Outcome::Malformed(Malformation::MissingFormat {
                level: CallLevel::Outer
            })
        );
    }

    #[test]
    fn test_bodiless_conforms() {
        let mut parser = GoParser::new().unwrap();
        let file = parser
            .parse_file(Path::new("p.go"), "package p\n\nfunc fast(n int) int\n".to_string())
            .unwrap();
        assert_eq!(
            grammar().validate(&file.funcs[0], None),
            Outcome::Conforms(Conformance::Bodiless)
        );
    }

    #[test]
    fn test_find_for_removal() {
        let target = RemoveTarget::parse("trace.Enter").unwrap();
        let grammar = Grammar::for_target(&target, "f");
        let decl = first_func("{\n\tdefer trace.Enterf(ctx, \"\")(ctx, \"\")\n\twork()\n}");
        assert!(grammar.find(&decl).is_some());

        let decl = first_func("{\n\twork()\n\tdefer trace.Enter()()\n}");
        assert!(grammar.find(&decl).is_none());
    }
}

//! The instrumentation call site: a two-level deferred call as the first
//! statement of a function body.
//!
//! ```text
//! stmt  := "defer" outer
//! outer := inner "(" [ctx ","] [fmt ","] addr* ")"
//! inner := P "." (N | N f) "(" [ctx ","] [fmt ","] arg* ")"
//! ```

use std::fmt;

use crate::syntax::{Expr, Stmt, StmtKind};

mod generate;
mod validate;

pub use generate::{context_param, render_call};
pub use validate::Grammar;

/// Result of validating one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Conforms(Conformance),
    /// No qualifying first statement.
    Absent,
    /// A call is present but does not follow the grammar.
    Malformed(Malformation),
}

impl Outcome {
    pub fn is_conforming(&self) -> bool {
        matches!(self, Outcome::Conforms(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conformance {
    Call(CallForm),
    /// Exempted by the skip marker.
    Skipped,
    /// Declaration without a body.
    Bodiless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallForm {
    Plain,
    Formatted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallLevel {
    Inner,
    Outer,
}

impl fmt::Display for CallLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallLevel::Inner => write!(f, "inner"),
            CallLevel::Outer => write!(f, "outer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Malformation {
    WrongCallee { expected: String, found: String },
    MissingFormat { level: CallLevel },
    NotAddressOf { position: usize, found: String },
}

impl fmt::Display for Malformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Malformation::WrongCallee { expected, found } => {
                write!(f, "deferred call to {found}, expected {expected}")
            }
            Malformation::MissingFormat { level } => {
                write!(f, "formatted call is missing the format string in the {level} call")
            }
            Malformation::NotAddressOf { position, found } => {
                write!(f, "argument {position} of the outer call is not address-of: {found}")
            }
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Conforms(Conformance::Call(CallForm::Plain)) => write!(f, "ok"),
            Outcome::Conforms(Conformance::Call(CallForm::Formatted)) => write!(f, "ok (formatted)"),
            Outcome::Conforms(Conformance::Skipped) => write!(f, "skipped"),
            Outcome::Conforms(Conformance::Bodiless) => write!(f, "no body"),
            Outcome::Absent => write!(f, "missing deferred instrumentation call"),
            Outcome::Malformed(why) => write!(f, "malformed instrumentation call: {why}"),
        }
    }
}

/// `defer P.N(inner...)(outer...)` as found in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredCall<'a> {
    pub package: &'a str,
    pub name: &'a str,
    pub inner: &'a [Expr],
    pub outer: &'a [Expr],
}

/// Match a statement against the two-level deferred selector call shape.
pub fn deferred_call(stmt: &Stmt) -> Option<DeferredCall<'_>> {
    let StmtKind::Defer(Expr::Call { func, args: outer }) = &stmt.kind else {
        return None;
    };
    let Expr::Call { func, args: inner } = func.as_ref() else {
        return None;
    };
    let Expr::Selector { operand, field } = func.as_ref() else {
        return None;
    };
    Some(DeferredCall {
        package: operand.as_ident()?,
        name: field,
        inner,
        outer,
    })
}

/// True when a comment, delimiters stripped and trimmed, is exactly `marker`.
pub fn is_skip_marker(comment: &str, marker: &str) -> bool {
    let text = comment.trim();
    let body = if let Some(line) = text.strip_prefix("//") {
        line
    } else if let Some(block) = text.strip_prefix("/*") {
        block.strip_suffix("*/").unwrap_or(block)
    } else {
        text
    };
    body.trim() == marker
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_marker_forms() {
        assert!(is_skip_marker("// deferguard:skip", "deferguard:skip"));
        assert!(is_skip_marker("//deferguard:skip  ", "deferguard:skip"));
        assert!(is_skip_marker("/* deferguard:skip */", "deferguard:skip"));
        assert!(!is_skip_marker("// deferguard:skip because", "deferguard:skip"));
        assert!(!is_skip_marker("// see deferguard:skip", "deferguard:skip"));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Absent.to_string(), "missing deferred instrumentation call");
        let outcome = Outcome::Malformed(Malformation::NotAddressOf {
            position: 2,
            found: "err".to_string(),
        });
        assert_eq!(
            outcome.to_string(),
            "malformed instrumentation call: argument 2 of the outer call is not address-of: err"
        );
    }
}

use crate::syntax::{Block, Stmt};

/// Byte range to delete when removing `first`, the first statement of
/// `body`.
///
/// The range runs from the statement to the next statement, or to the
/// closing brace when there is none, and stops early at the first comment
/// in between so that comments survive.
pub fn removal_range(body: &Block, first: &Stmt) -> (usize, usize) {
    let bound = body
        .statements()
        .find(|stmt| stmt.span.start >= first.span.end)
        .map(|stmt| stmt.span.start)
        .unwrap_or(body.close);
    let end = body
        .comment_spans()
        .filter(|span| span.start >= first.span.end && span.start < bound)
        .map(|span| span.start)
        .min()
        .unwrap_or(bound);
    (first.span.start, end)
}

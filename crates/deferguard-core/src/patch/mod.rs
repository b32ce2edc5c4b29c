//! Byte-offset text patching.
//!
//! A [`Patch`] replaces `[offset, next_offset)` of the original text with
//! `text`. Every patch for a file is collected into a [`FileEditSet`] and
//! applied in one pass over the original content.

use thiserror::Error;

mod imports;
mod removal;

pub use imports::ensure_import;
pub use removal::removal_range;

/// Errors raised when a patch list cannot be applied. Always fatal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PatchError {
    #[error("Patch {index} starts at {offset}, before the end {previous_end} of the previous patch")]
    Overlap {
        index: usize,
        offset: usize,
        previous_end: usize,
    },

    #[error("Patch {index} has an inverted range {offset}..{next_offset}")]
    Inverted {
        index: usize,
        offset: usize,
        next_offset: usize,
    },

    #[error("Patch {index} ends at {next_offset}, past the end of the {len}-byte file")]
    OutOfBounds {
        index: usize,
        next_offset: usize,
        len: usize,
    },

    #[error("Patch {index} at {offset} does not fall on a character boundary")]
    NotCharBoundary { index: usize, offset: usize },
}

/// A positioned edit against a file's original content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub offset: usize,
    pub text: String,
    pub next_offset: usize,
}

impl Patch {
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self {
            offset,
            text: text.into(),
            next_offset: offset,
        }
    }

    pub fn delete(start: usize, end: usize) -> Self {
        Self {
            offset: start,
            text: String::new(),
            next_offset: end,
        }
    }

    pub fn is_insertion(&self) -> bool {
        self.offset == self.next_offset && !self.text.is_empty()
    }
}

/// The patches for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEditSet {
    patches: Vec<Patch>,
}

impl FileEditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, patch: Patch) {
        self.patches.push(patch);
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Order patches by offset, keeping insertion order among equal offsets.
    pub fn sort(&mut self) {
        self.patches.sort_by_key(|p| p.offset);
    }
}

/// Apply sorted, non-overlapping patches in a single pass.
pub fn apply(content: &str, patches: &[Patch]) -> Result<String, PatchError> {
    let mut previous_end = 0;
    for (index, patch) in patches.iter().enumerate() {
        if patch.next_offset < patch.offset {
            return Err(PatchError::Inverted {
                index,
                offset: patch.offset,
                next_offset: patch.next_offset,
            });
        }
        if index > 0 && patch.offset < previous_end {
            return Err(PatchError::Overlap {
                index,
                offset: patch.offset,
                previous_end,
            });
        }
        if patch.next_offset > content.len() {
            return Err(PatchError::OutOfBounds {
                index,
                next_offset: patch.next_offset,
                len: content.len(),
            });
        }
        for offset in [patch.offset, patch.next_offset] {
            if !content.is_char_boundary(offset) {
                return Err(PatchError::NotCharBoundary { index, offset });
            }
        }
        previous_end = patch.next_offset;
    }

    let added: usize = patches.iter().map(|p| p.text.len()).sum();
    let mut output = String::with_capacity(content.len() + added);
    let mut cursor = 0;
    for patch in patches {
        output.push_str(&content[cursor..patch.offset]);
        output.push_str(&patch.text);
        cursor = patch.next_offset;
    }
    output.push_str(&content[cursor..]);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apply_inserts_and_deletes() {
        let content = "func f() {\n\twork()\n}\n";
        let patches = vec![
            Patch::insert(10, "\n\tdefer t.Enter()()"),
            Patch::delete(11, 19),
        ];
        assert_eq!(
            apply(content, &patches).unwrap(),
            "func f() {\n\tdefer t.Enter()()\n}\n"
        );
    }

    #[test]
    fn test_apply_without_patches_is_identity() {
        assert_eq!(apply("package p\n", &[]).unwrap(), "package p\n");
    }

    #[test]
    fn test_unsorted_patches_fail() {
        let patches = vec![Patch::insert(8, "b"), Patch::insert(2, "a")];
        assert_eq!(
            apply("0123456789", &patches),
            Err(PatchError::Overlap {
                index: 1,
                offset: 2,
                previous_end: 8
            })
        );
    }

    #[test]
    fn test_overlapping_deletions_fail() {
        let patches = vec![Patch::delete(0, 5), Patch::delete(3, 7)];
        assert!(matches!(
            apply("0123456789", &patches),
            Err(PatchError::Overlap { index: 1, .. })
        ));
    }

    #[test]
    fn test_adjacent_and_same_offset_patches_apply() {
        let patches = vec![
            Patch::delete(0, 2),
            Patch::insert(2, "x"),
            Patch::insert(2, "y"),
        ];
        assert_eq!(apply("0123", &patches).unwrap(), "xy23");
    }

    #[test]
    fn test_out_of_bounds_fails() {
        assert!(matches!(
            apply("abc", &[Patch::delete(1, 9)]),
            Err(PatchError::OutOfBounds { .. })
        ));
        assert!(matches!(
            apply("abc", &[Patch {
                offset: 2,
                text: String::new(),
                next_offset: 1
            }]),
            Err(PatchError::Inverted { .. })
        ));
    }

    #[test]
    fn test_edit_set_sorts_stably() {
        let mut set = FileEditSet::new();
        set.push(Patch::insert(4, "late"));
        set.push(Patch::insert(0, "a"));
        set.push(Patch::insert(0, "b"));
        set.sort();
        assert_eq!(apply("body", set.patches()).unwrap(), "abbodylate");
        assert!(set.patches().iter().all(Patch::is_insertion));
    }
}

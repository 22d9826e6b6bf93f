//! Error types shared across the engine.

use thiserror::Error;

/// An offset or range fell outside the document.
///
/// Piece table operations report this when a caller passes coordinates beyond the current
/// document length. The [`Editor`](crate::Editor) clamps before it calls into storage, so this
/// surfacing from the editor indicates a bug rather than a user-facing condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoundsError {
    #[error("offset {offset} is outside the document (length {len})")]
    /// A single offset was past the end of the document.
    Offset {
        /// Requested character offset.
        offset: usize,
        /// Document length in characters.
        len: usize,
    },

    #[error("range {start}..{end} exceeds the document (length {len})")]
    /// A range extended past the end of the document.
    Range {
        /// Inclusive start character offset.
        start: usize,
        /// Exclusive end character offset.
        end: usize,
        /// Document length in characters.
        len: usize,
    },
}

/// Errors produced by [`Editor`](crate::Editor) mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error(transparent)]
    /// Storage rejected an edit.
    Bounds(#[from] BoundsError),

    #[error("paragraph {0} does not exist")]
    /// A paragraph index did not match the current layout.
    UnknownParagraph(usize),
}

/// Errors produced while loading an [`EditorConfig`](crate::EditorConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON parse error: {0}")]
    /// The configuration document was not valid JSON for the schema.
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    /// The document parsed but described an unusable page geometry.
    Invalid(String),
}

/// A broken red-black or augmentation invariant found by
/// [`StyleIntervalTree::check_invariants`](crate::StyleIntervalTree::check_invariants).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("root node is red")]
    /// The root must be black.
    RedRoot,

    #[error("red node {0} has a red child")]
    /// Two consecutive red nodes on a path.
    RedRed(usize),

    #[error("black height differs below node {0}")]
    /// Root-to-leaf paths disagree on black count.
    BlackHeight(usize),

    #[error("node {node} stores max_end {stored}, subtree max is {actual}")]
    /// The augmented value is stale.
    MaxEnd {
        /// Arena index of the node.
        node: usize,
        /// Value cached on the node.
        stored: usize,
        /// Value recomputed from the subtree.
        actual: usize,
    },

    #[error("in-order traversal is not sorted by start at node {0}")]
    /// Search-tree ordering is broken.
    Unordered(usize),

    #[error("parent link of node {0} is inconsistent")]
    /// A child does not point back at its parent.
    ParentLink(usize),

    #[error("tree reports {reported} intervals but holds {actual}")]
    /// The cached size is stale.
    Size {
        /// Cached size.
        reported: usize,
        /// Nodes reachable from the root.
        actual: usize,
    },
}

/// Errors produced while serializing an export representation.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("markup write error: {0}")]
    /// The XML writer rejected an event.
    Markup(#[from] quick_xml::Error),

    #[error("markup is not valid UTF-8: {0}")]
    /// The writer produced invalid UTF-8.
    Utf8(#[from] std::string::FromUtf8Error),
}

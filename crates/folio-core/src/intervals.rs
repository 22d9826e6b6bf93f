//! Character formatting stored as `[start, end)` intervals.
//!
//! [`StyleIntervalTree`] is an augmented red-black tree keyed by interval start. Every node
//! caches the largest `end` in its subtree, which lets overlap queries skip whole subtrees.
//! Nodes live in an arena and refer to each other by index, so the tree owns everything it
//! points at and rotations never juggle shared ownership.

use crate::error::InvariantViolation;
use serde::{Deserialize, Serialize};

/// An sRGB text color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Create a color from channel values.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Black, the implicit color of unstyled text.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// `#rrggbb` form used by the export formats.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A single formatting attribute that can be applied to a range of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleTag {
    /// Bold weight.
    Bold,
    /// Italic slant.
    Italic,
    /// Underline decoration.
    Underline,
    /// Strikethrough decoration.
    Strikethrough,
    /// Foreground color.
    Color(Rgb),
}

impl StyleTag {
    /// Whether two tags describe the same attribute, ignoring a color's value.
    pub fn same_kind(&self, other: &StyleTag) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Whether the tag changes glyph advance widths (and so forces a re-wrap).
    pub fn affects_metrics(&self) -> bool {
        matches!(self, StyleTag::Bold | StyleTag::Italic)
    }
}

/// The composite set of attributes active on a character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleSet {
    /// Bold weight.
    pub bold: bool,
    /// Italic slant.
    pub italic: bool,
    /// Underline decoration.
    pub underline: bool,
    /// Strikethrough decoration.
    pub strikethrough: bool,
    /// Foreground color, `None` for the default.
    pub color: Option<Rgb>,
}

impl StyleSet {
    /// Whether `tag` is present. A color tag matches only its exact value.
    pub fn contains(&self, tag: StyleTag) -> bool {
        match tag {
            StyleTag::Bold => self.bold,
            StyleTag::Italic => self.italic,
            StyleTag::Underline => self.underline,
            StyleTag::Strikethrough => self.strikethrough,
            StyleTag::Color(c) => self.color == Some(c),
        }
    }

    /// Add `tag` to the set.
    pub fn insert(&mut self, tag: StyleTag) {
        match tag {
            StyleTag::Bold => self.bold = true,
            StyleTag::Italic => self.italic = true,
            StyleTag::Underline => self.underline = true,
            StyleTag::Strikethrough => self.strikethrough = true,
            StyleTag::Color(c) => self.color = Some(c),
        }
    }

    /// Remove the attribute of `tag`'s kind.
    pub fn remove(&mut self, tag: StyleTag) {
        match tag {
            StyleTag::Bold => self.bold = false,
            StyleTag::Italic => self.italic = false,
            StyleTag::Underline => self.underline = false,
            StyleTag::Strikethrough => self.strikethrough = false,
            StyleTag::Color(_) => self.color = None,
        }
    }

    /// Flip `tag`.
    pub fn toggle(&mut self, tag: StyleTag) {
        if self.contains(tag) {
            self.remove(tag);
        } else {
            self.insert(tag);
        }
    }

    /// The set as individual tags.
    pub fn tags(&self) -> Vec<StyleTag> {
        let mut tags = Vec::new();
        if self.bold {
            tags.push(StyleTag::Bold);
        }
        if self.italic {
            tags.push(StyleTag::Italic);
        }
        if self.underline {
            tags.push(StyleTag::Underline);
        }
        if self.strikethrough {
            tags.push(StyleTag::Strikethrough);
        }
        if let Some(c) = self.color {
            tags.push(StyleTag::Color(c));
        }
        tags
    }

    /// Whether no attribute is set.
    pub fn is_plain(&self) -> bool {
        *self == StyleSet::default()
    }
}

/// A styled half-open range of document offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleInterval {
    /// Start offset (inclusive)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
    /// Attribute applied over the range
    pub tag: StyleTag,
}

impl StyleInterval {
    /// Create a new interval with `[start, end)` offsets.
    pub fn new(start: usize, end: usize, tag: StyleTag) -> Self {
        Self { start, end, tag }
    }

    /// Check if interval contains a specific position
    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }

    /// Check if two intervals overlap
    pub fn overlaps(&self, other: &StyleInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Length of the range.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the range is empty.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Node color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeColor {
    /// Red node.
    Red,
    /// Black node.
    Black,
}

/// Arena index of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    interval: StyleInterval,
    max_end: usize,
    color: NodeColor,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parent: Option<NodeId>,
}

/// Read-only view of one tree node, for walking the structure.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a StyleIntervalTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    fn node(&self) -> &'a Node {
        self.tree.node(self.id)
    }

    /// Arena id of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Interval stored here.
    pub fn interval(&self) -> StyleInterval {
        self.node().interval
    }

    /// Largest `end` in this subtree.
    pub fn max_end(&self) -> usize {
        self.node().max_end
    }

    /// Node color.
    pub fn color(&self) -> NodeColor {
        self.node().color
    }

    /// Left child.
    pub fn left(&self) -> Option<NodeRef<'a>> {
        self.node().left.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    /// Right child.
    pub fn right(&self) -> Option<NodeRef<'a>> {
        self.node().right.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }
}

/// Augmented red-black interval tree over style ranges.
///
/// Query complexity: O(log n + k) for k results. Insert/delete: O(log n).
#[derive(Debug, Clone, Default)]
pub struct StyleIntervalTree {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: usize,
}

impl StyleIntervalTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from an initial style set. Empty intervals are skipped.
    pub fn from_intervals(intervals: impl IntoIterator<Item = StyleInterval>) -> Self {
        let mut tree = Self::new();
        for interval in intervals {
            if !interval.is_empty() {
                tree.insert(interval);
            }
        }
        tree
    }

    /// Root node, if any.
    pub fn root(&self) -> Option<NodeRef<'_>> {
        self.root.map(|id| NodeRef { tree: self, id })
    }

    /// Number of stored intervals.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every interval.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.len = 0;
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn color_of(&self, id: Option<NodeId>) -> NodeColor {
        id.map_or(NodeColor::Black, |id| self.node(id).color)
    }

    fn max_end_of(&self, id: Option<NodeId>) -> usize {
        id.map_or(0, |id| self.node(id).max_end)
    }

    fn set_color(&mut self, id: Option<NodeId>, color: NodeColor) {
        if let Some(id) = id {
            self.node_mut(id).color = color;
        }
    }

    fn alloc(&mut self, interval: StyleInterval) -> NodeId {
        let node = Node {
            interval,
            max_end: interval.end,
            color: NodeColor::Red,
            left: None,
            right: None,
            parent: None,
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Recompute one node's `max_end` from its children.
    fn update_max(&mut self, id: NodeId) {
        let node = self.node(id);
        let max_end = node
            .interval
            .end
            .max(self.max_end_of(node.left))
            .max(self.max_end_of(node.right));
        self.node_mut(id).max_end = max_end;
    }

    fn propagate_max_from(&mut self, id: Option<NodeId>) {
        let mut current = id;
        while let Some(id) = current {
            self.update_max(id);
            current = self.node(id).parent;
        }
    }

    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                if self.node(p).left == Some(old) {
                    self.node_mut(p).left = new;
                } else {
                    self.node_mut(p).right = new;
                }
            }
        }
    }

    fn rotate_left(&mut self, x: NodeId) {
        let Some(y) = self.node(x).right else {
            return;
        };
        let y_left = self.node(y).left;
        self.node_mut(x).right = y_left;
        if let Some(b) = y_left {
            self.node_mut(b).parent = Some(x);
        }
        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        self.replace_child(x_parent, x, Some(y));
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);

        self.update_max(x);
        self.update_max(y);
    }

    fn rotate_right(&mut self, x: NodeId) {
        let Some(y) = self.node(x).left else {
            return;
        };
        let y_right = self.node(y).right;
        self.node_mut(x).left = y_right;
        if let Some(b) = y_right {
            self.node_mut(b).parent = Some(x);
        }
        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        self.replace_child(x_parent, x, Some(y));
        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);

        self.update_max(x);
        self.update_max(y);
    }

    /// Insert an interval. Duplicates are allowed.
    pub fn insert(&mut self, interval: StyleInterval) {
        let id = self.alloc(interval);

        let mut parent = None;
        let mut current = self.root;
        while let Some(c) = current {
            parent = Some(c);
            current = if interval.start < self.node(c).interval.start {
                self.node(c).left
            } else {
                self.node(c).right
            };
        }

        self.node_mut(id).parent = parent;
        match parent {
            None => self.root = Some(id),
            Some(p) => {
                if interval.start < self.node(p).interval.start {
                    self.node_mut(p).left = Some(id);
                } else {
                    self.node_mut(p).right = Some(id);
                }
            }
        }
        self.len += 1;

        self.propagate_max_from(parent);
        self.insert_fixup(id);
    }

    fn insert_fixup(&mut self, mut z: NodeId) {
        loop {
            let Some(p) = self.node(z).parent else {
                break;
            };
            if self.node(p).color == NodeColor::Black {
                break;
            }
            // A red parent is never the root, so the grandparent exists.
            let Some(g) = self.node(p).parent else {
                break;
            };

            if self.node(g).left == Some(p) {
                let uncle = self.node(g).right;
                if self.color_of(uncle) == NodeColor::Red {
                    self.set_color(Some(p), NodeColor::Black);
                    self.set_color(uncle, NodeColor::Black);
                    self.set_color(Some(g), NodeColor::Red);
                    z = g;
                    continue;
                }
                if self.node(p).right == Some(z) {
                    z = p;
                    self.rotate_left(z);
                }
                let Some(p) = self.node(z).parent else {
                    break;
                };
                self.set_color(Some(p), NodeColor::Black);
                self.set_color(Some(g), NodeColor::Red);
                self.rotate_right(g);
            } else {
                let uncle = self.node(g).left;
                if self.color_of(uncle) == NodeColor::Red {
                    self.set_color(Some(p), NodeColor::Black);
                    self.set_color(uncle, NodeColor::Black);
                    self.set_color(Some(g), NodeColor::Red);
                    z = g;
                    continue;
                }
                if self.node(p).left == Some(z) {
                    z = p;
                    self.rotate_right(z);
                }
                let Some(p) = self.node(z).parent else {
                    break;
                };
                self.set_color(Some(p), NodeColor::Black);
                self.set_color(Some(g), NodeColor::Red);
                self.rotate_left(g);
            }
        }
        self.set_color(self.root, NodeColor::Black);
    }

    /// Remove one interval equal to `interval`. Returns whether it was found.
    pub fn delete(&mut self, interval: &StyleInterval) -> bool {
        match self.find_node(interval) {
            Some(id) => {
                self.remove_node(id);
                true
            }
            None => false,
        }
    }

    /// Locate a node holding exactly `interval`.
    ///
    /// Rotations may leave equal starts on either side of a node, so both subtrees are searched
    /// when the key matches.
    fn find_node(&self, interval: &StyleInterval) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if interval.start < node.interval.start {
                stack.extend(node.left);
            } else if interval.start > node.interval.start {
                stack.extend(node.right);
            } else {
                if node.interval == *interval {
                    return Some(id);
                }
                stack.extend(node.left);
                stack.extend(node.right);
            }
        }
        None
    }

    fn minimum(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.node(id).left {
            id = left;
        }
        id
    }

    fn transplant(&mut self, u: NodeId, v: Option<NodeId>) {
        let u_parent = self.node(u).parent;
        self.replace_child(u_parent, u, v);
        if let Some(v) = v {
            self.node_mut(v).parent = u_parent;
        }
    }

    fn remove_node(&mut self, z: NodeId) {
        let z_left = self.node(z).left;
        let z_right = self.node(z).right;
        let mut removed_color = self.node(z).color;
        let x;
        let x_parent;

        match (z_left, z_right) {
            (None, _) => {
                x = z_right;
                x_parent = self.node(z).parent;
                self.transplant(z, z_right);
            }
            (Some(_), None) => {
                x = z_left;
                x_parent = self.node(z).parent;
                self.transplant(z, z_left);
            }
            (Some(left), Some(right)) => {
                // Splice in the in-order successor.
                let y = self.minimum(right);
                removed_color = self.node(y).color;
                x = self.node(y).right;
                if self.node(y).parent == Some(z) {
                    x_parent = Some(y);
                } else {
                    x_parent = self.node(y).parent;
                    self.transplant(y, x);
                    self.node_mut(y).right = Some(right);
                    self.node_mut(right).parent = Some(y);
                }
                self.transplant(z, Some(y));
                self.node_mut(y).left = Some(left);
                self.node_mut(left).parent = Some(y);
                let z_color = self.node(z).color;
                self.node_mut(y).color = z_color;
            }
        }

        self.propagate_max_from(x_parent);
        if removed_color == NodeColor::Black {
            self.delete_fixup(x, x_parent);
        }

        self.free.push(z);
        self.len -= 1;
        if self.len == 0 {
            self.clear();
        }
    }

    fn delete_fixup(&mut self, mut x: Option<NodeId>, mut x_parent: Option<NodeId>) {
        while x != self.root && self.color_of(x) == NodeColor::Black {
            let Some(p) = x_parent else {
                break;
            };

            if self.node(p).left == x {
                let mut w = self.node(p).right;
                if self.color_of(w) == NodeColor::Red {
                    self.set_color(w, NodeColor::Black);
                    self.set_color(Some(p), NodeColor::Red);
                    self.rotate_left(p);
                    w = self.node(p).right;
                }
                let Some(s) = w else {
                    x = Some(p);
                    x_parent = self.node(p).parent;
                    continue;
                };
                if self.color_of(self.node(s).left) == NodeColor::Black
                    && self.color_of(self.node(s).right) == NodeColor::Black
                {
                    self.set_color(Some(s), NodeColor::Red);
                    x = Some(p);
                    x_parent = self.node(p).parent;
                } else {
                    let mut s = s;
                    if self.color_of(self.node(s).right) == NodeColor::Black {
                        self.set_color(self.node(s).left, NodeColor::Black);
                        self.set_color(Some(s), NodeColor::Red);
                        self.rotate_right(s);
                        let Some(new_s) = self.node(p).right else {
                            break;
                        };
                        s = new_s;
                    }
                    let p_color = self.node(p).color;
                    self.set_color(Some(s), p_color);
                    self.set_color(Some(p), NodeColor::Black);
                    self.set_color(self.node(s).right, NodeColor::Black);
                    self.rotate_left(p);
                    x = self.root;
                    x_parent = None;
                }
            } else {
                let mut w = self.node(p).left;
                if self.color_of(w) == NodeColor::Red {
                    self.set_color(w, NodeColor::Black);
                    self.set_color(Some(p), NodeColor::Red);
                    self.rotate_right(p);
                    w = self.node(p).left;
                }
                let Some(s) = w else {
                    x = Some(p);
                    x_parent = self.node(p).parent;
                    continue;
                };
                if self.color_of(self.node(s).left) == NodeColor::Black
                    && self.color_of(self.node(s).right) == NodeColor::Black
                {
                    self.set_color(Some(s), NodeColor::Red);
                    x = Some(p);
                    x_parent = self.node(p).parent;
                } else {
                    let mut s = s;
                    if self.color_of(self.node(s).left) == NodeColor::Black {
                        self.set_color(self.node(s).right, NodeColor::Black);
                        self.set_color(Some(s), NodeColor::Red);
                        self.rotate_left(s);
                        let Some(new_s) = self.node(p).left else {
                            break;
                        };
                        s = new_s;
                    }
                    let p_color = self.node(p).color;
                    self.set_color(Some(s), p_color);
                    self.set_color(Some(p), NodeColor::Black);
                    self.set_color(self.node(s).left, NodeColor::Black);
                    self.rotate_right(p);
                    x = self.root;
                    x_parent = None;
                }
            }
        }
        self.set_color(x, NodeColor::Black);
    }

    /// All intervals `I` with `I.start < query_end && I.end > query_start`, ordered by start.
    pub fn find_overlapping(&self, query_start: usize, query_end: usize) -> Vec<StyleInterval> {
        let mut result = Vec::new();
        self.collect_overlapping(self.root, query_start, query_end, &mut result);
        result
    }

    fn collect_overlapping(
        &self,
        id: Option<NodeId>,
        query_start: usize,
        query_end: usize,
        out: &mut Vec<StyleInterval>,
    ) {
        let Some(id) = id else {
            return;
        };
        let node = self.node(id);
        if self.max_end_of(node.left) > query_start {
            self.collect_overlapping(node.left, query_start, query_end, out);
        }
        if node.interval.start < query_end && node.interval.end > query_start {
            out.push(node.interval);
        }
        if node.interval.start < query_end {
            self.collect_overlapping(node.right, query_start, query_end, out);
        }
    }

    /// Every interval, in start order.
    pub fn intervals(&self) -> Vec<StyleInterval> {
        let mut out = Vec::with_capacity(self.len);
        self.collect_in_order(self.root, &mut out);
        out
    }

    fn collect_in_order(&self, id: Option<NodeId>, out: &mut Vec<StyleInterval>) {
        if let Some(id) = id {
            let node = self.node(id);
            self.collect_in_order(node.left, out);
            out.push(node.interval);
            self.collect_in_order(node.right, out);
        }
    }

    /// Styles active on the character at `offset`.
    pub fn styles_at(&self, offset: usize) -> StyleSet {
        let mut set = StyleSet::default();
        for interval in self.find_overlapping(offset, offset + 1) {
            set.insert(interval.tag);
        }
        set
    }

    /// Whether intervals carrying exactly `tag` cover all of `[start, end)`.
    pub fn covers(&self, start: usize, end: usize, tag: StyleTag) -> bool {
        if start >= end {
            return false;
        }
        let mut reached = start;
        for interval in self
            .find_overlapping(start, end)
            .into_iter()
            .filter(|i| i.tag == tag)
        {
            if interval.start > reached {
                return false;
            }
            reached = reached.max(interval.end);
            if reached >= end {
                return true;
            }
        }
        reached >= end
    }

    /// Apply `tag` over `[start, end)`, merging with overlapping or touching ranges of the same
    /// tag so repeated formatting does not fragment the tree.
    pub fn add_style(&mut self, start: usize, end: usize, tag: StyleTag) {
        if start >= end {
            return;
        }
        let mut merged = StyleInterval::new(start, end, tag);
        let neighbours: Vec<StyleInterval> = self
            .find_overlapping(start.saturating_sub(1), end + 1)
            .into_iter()
            .filter(|i| i.tag == tag && i.end >= start && i.start <= end)
            .collect();
        for interval in &neighbours {
            merged.start = merged.start.min(interval.start);
            merged.end = merged.end.max(interval.end);
            self.delete(interval);
        }
        self.insert(merged);
    }

    /// Clear `tag`'s kind from `[start, end)`, trimming or splitting intervals that straddle
    /// the boundaries. Any color is removed when `tag` is a color.
    pub fn remove_style(&mut self, start: usize, end: usize, tag: StyleTag) {
        if start >= end {
            return;
        }
        let affected: Vec<StyleInterval> = self
            .find_overlapping(start, end)
            .into_iter()
            .filter(|i| i.tag.same_kind(&tag))
            .collect();
        for interval in affected {
            self.delete(&interval);
            if interval.start < start {
                self.insert(StyleInterval::new(interval.start, start, interval.tag));
            }
            if interval.end > end {
                self.insert(StyleInterval::new(end, interval.end, interval.tag));
            }
        }
    }

    /// Move boundaries after inserting `delta` characters at `pos`.
    ///
    /// Intervals starting at or after `pos` shift; intervals spanning `pos` grow.
    pub fn shift_for_insertion(&mut self, pos: usize, delta: usize) {
        if delta == 0 || self.root.is_none() {
            return;
        }
        for id in self.live_ids() {
            let interval = &mut self.node_mut(id).interval;
            if interval.start >= pos {
                interval.start += delta;
                interval.end += delta;
            } else if interval.end > pos {
                interval.end += delta;
            }
        }
        self.recompute_all_max();
    }

    /// Move boundaries after deleting `[start, end)`. Intervals that end up empty are removed.
    pub fn shift_for_deletion(&mut self, start: usize, end: usize) {
        if start >= end || self.root.is_none() {
            return;
        }
        let delta = end - start;
        let map = |x: usize| {
            if x <= start {
                x
            } else if x < end {
                start
            } else {
                x - delta
            }
        };

        let mut emptied = Vec::new();
        for id in self.live_ids() {
            let interval = &mut self.node_mut(id).interval;
            interval.start = map(interval.start);
            interval.end = map(interval.end);
            if interval.is_empty() {
                emptied.push(id);
            }
        }
        self.recompute_all_max();
        for id in emptied {
            self.remove_node(id);
        }
    }

    fn live_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.len);
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            ids.push(id);
            stack.extend(self.node(id).left);
            stack.extend(self.node(id).right);
        }
        ids
    }

    fn recompute_all_max(&mut self) {
        fn visit(tree: &mut StyleIntervalTree, id: Option<NodeId>) {
            if let Some(id) = id {
                let (left, right) = (tree.node(id).left, tree.node(id).right);
                visit(tree, left);
                visit(tree, right);
                tree.update_max(id);
            }
        }
        visit(self, self.root);
    }

    /// Verify every structural invariant. Intended for tests.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let Some(root) = self.root else {
            return if self.len == 0 {
                Ok(())
            } else {
                Err(InvariantViolation::Size {
                    reported: self.len,
                    actual: 0,
                })
            };
        };
        if self.node(root).color == NodeColor::Red {
            return Err(InvariantViolation::RedRoot);
        }
        if self.node(root).parent.is_some() {
            return Err(InvariantViolation::ParentLink(root.0));
        }

        let mut count = 0;
        self.check_subtree(root, &mut count)?;
        if count != self.len {
            return Err(InvariantViolation::Size {
                reported: self.len,
                actual: count,
            });
        }

        let mut previous: Option<usize> = None;
        let mut stack = Vec::new();
        let mut current = Some(root);
        while current.is_some() || !stack.is_empty() {
            while let Some(id) = current {
                stack.push(id);
                current = self.node(id).left;
            }
            let Some(id) = stack.pop() else {
                break;
            };
            let start = self.node(id).interval.start;
            if previous.is_some_and(|p| p > start) {
                return Err(InvariantViolation::Unordered(id.0));
            }
            previous = Some(start);
            current = self.node(id).right;
        }
        Ok(())
    }

    /// Returns the black height of the subtree.
    fn check_subtree(&self, id: NodeId, count: &mut usize) -> Result<usize, InvariantViolation> {
        *count += 1;
        let node = self.node(id);
        let mut heights = [1usize; 2];
        for (slot, child) in [node.left, node.right].into_iter().enumerate() {
            if let Some(child) = child {
                if self.node(child).parent != Some(id) {
                    return Err(InvariantViolation::ParentLink(child.0));
                }
                if node.color == NodeColor::Red && self.node(child).color == NodeColor::Red {
                    return Err(InvariantViolation::RedRed(id.0));
                }
                heights[slot] = self.check_subtree(child, count)?;
            }
        }
        if heights[0] != heights[1] {
            return Err(InvariantViolation::BlackHeight(id.0));
        }

        let actual = node
            .interval
            .end
            .max(self.max_end_of(node.left))
            .max(self.max_end_of(node.right));
        if actual != node.max_end {
            return Err(InvariantViolation::MaxEnd {
                node: id.0,
                stored: node.max_end,
                actual,
            });
        }

        Ok(heights[0] + usize::from(node.color == NodeColor::Black))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold(start: usize, end: usize) -> StyleInterval {
        StyleInterval::new(start, end, StyleTag::Bold)
    }

    #[test]
    fn test_interval_contains() {
        let interval = bold(10, 20);
        assert!(interval.contains(10));
        assert!(interval.contains(19));
        assert!(!interval.contains(20));
        assert!(!interval.contains(9));
    }

    #[test]
    fn test_interval_overlaps() {
        let i1 = bold(10, 20);
        let i2 = bold(15, 25);
        let i3 = bold(20, 30);

        assert!(i1.overlaps(&i2));
        assert!(i2.overlaps(&i1));
        assert!(!i1.overlaps(&i3));
    }

    #[test]
    fn test_ascending_inserts_rotate() {
        let mut tree = StyleIntervalTree::new();
        tree.insert(bold(1, 2));
        tree.insert(bold(2, 3));
        tree.insert(bold(3, 40));

        let root = tree.root().unwrap();
        assert_eq!(root.interval().start, 2);
        assert_eq!(root.color(), NodeColor::Black);
        assert_eq!(root.max_end(), 40);
        assert_eq!(root.left().unwrap().color(), NodeColor::Red);
        assert_eq!(root.right().unwrap().color(), NodeColor::Red);
        assert_eq!(root.left().unwrap().max_end(), 2);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_descending_inserts_rotate() {
        let mut tree = StyleIntervalTree::new();
        for start in (0..3).rev() {
            tree.insert(bold(start * 10, start * 10 + 50));
        }
        assert_eq!(tree.root().unwrap().interval().start, 10);
        assert_eq!(tree.root().unwrap().max_end(), 70);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_query_overlapping() {
        let mut tree = StyleIntervalTree::new();
        tree.insert(bold(10, 20));
        tree.insert(bold(25, 35));
        tree.insert(bold(40, 50));

        assert_eq!(tree.find_overlapping(15, 30).len(), 2);
        assert_eq!(tree.find_overlapping(0, 60).len(), 3);
        assert!(tree.find_overlapping(20, 25).is_empty());
    }

    #[test]
    fn test_multiple_overlapping_styles() {
        let mut tree = StyleIntervalTree::new();
        tree.insert(bold(0, 100));
        tree.insert(StyleInterval::new(20, 30, StyleTag::Italic));
        tree.insert(StyleInterval::new(25, 35, StyleTag::Underline));

        let styles = tree.styles_at(27);
        assert!(styles.bold && styles.italic && styles.underline);
        assert!(!styles.strikethrough);
    }

    #[test]
    fn test_delete_keeps_invariants() {
        let mut tree = StyleIntervalTree::new();
        for i in 0..32 {
            tree.insert(bold(i, i + 5));
        }
        for i in (0..32).step_by(3) {
            assert!(tree.delete(&bold(i, i + 5)));
            tree.check_invariants().unwrap();
        }
        assert!(!tree.delete(&bold(0, 5)));
        assert_eq!(tree.len(), 32 - 11);
    }

    #[test]
    fn test_delete_duplicate_starts() {
        let mut tree = StyleIntervalTree::new();
        for end in 1..10 {
            tree.insert(bold(5, 5 + end));
        }
        assert!(tree.delete(&bold(5, 9)));
        assert!(tree.delete(&bold(5, 6)));
        tree.check_invariants().unwrap();
        assert_eq!(tree.root().unwrap().max_end(), 14);
    }

    #[test]
    fn test_add_style_merges_touching() {
        let mut tree = StyleIntervalTree::new();
        tree.add_style(0, 5, StyleTag::Bold);
        tree.add_style(5, 10, StyleTag::Bold);
        tree.add_style(3, 7, StyleTag::Italic);
        assert_eq!(
            tree.intervals(),
            vec![
                StyleInterval::new(0, 10, StyleTag::Bold),
                StyleInterval::new(3, 7, StyleTag::Italic)
            ]
        );
    }

    #[test]
    fn test_remove_style_splits() {
        let mut tree = StyleIntervalTree::new();
        tree.add_style(0, 10, StyleTag::Bold);
        tree.remove_style(3, 6, StyleTag::Bold);
        assert_eq!(tree.intervals(), vec![bold(0, 3), bold(6, 10)]);
        assert!(!tree.covers(0, 10, StyleTag::Bold));
        assert!(tree.covers(6, 10, StyleTag::Bold));
    }

    #[test]
    fn test_covers_uses_union() {
        let mut tree = StyleIntervalTree::new();
        tree.insert(bold(0, 4));
        tree.insert(bold(3, 8));
        assert!(tree.covers(1, 8, StyleTag::Bold));
        assert!(!tree.covers(1, 9, StyleTag::Bold));
        assert!(!tree.covers(1, 4, StyleTag::Italic));
    }

    #[test]
    fn test_remove_any_color() {
        let red = StyleTag::Color(Rgb::new(255, 0, 0));
        let mut tree = StyleIntervalTree::new();
        tree.add_style(0, 10, red);
        tree.remove_style(0, 4, StyleTag::Color(Rgb::BLACK));
        assert_eq!(tree.intervals(), vec![StyleInterval::new(4, 10, red)]);
    }

    #[test]
    fn test_shift_for_insertion() {
        let mut tree = StyleIntervalTree::new();
        tree.insert(bold(10, 20));
        tree.insert(bold(30, 40));

        tree.shift_for_insertion(15, 5);

        assert_eq!(tree.intervals(), vec![bold(10, 25), bold(35, 45)]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_shift_for_deletion() {
        let mut tree = StyleIntervalTree::new();
        tree.insert(bold(10, 20));
        tree.insert(bold(30, 40));
        tree.insert(bold(50, 60));
        tree.insert(bold(26, 34));

        tree.shift_for_deletion(25, 35);

        assert_eq!(tree.intervals(), vec![bold(10, 20), bold(25, 30), bold(40, 50)]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_style_set_toggle() {
        let mut set = StyleSet::default();
        set.toggle(StyleTag::Bold);
        assert!(set.contains(StyleTag::Bold));
        set.toggle(StyleTag::Bold);
        assert!(set.is_plain());
    }
}

//! Change notifications.
//!
//! Listeners subscribe to one [`EditorEventKind`] and receive a [`ListenerId`] that removes
//! them again. Removal is idempotent: removing an unknown or already-removed id (including
//! after the registry was cleared on dispose) returns `false`.

use crate::cursor::StructurePosition;
use crate::selection::Selection;
use std::fmt;

/// Event kind a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorEventKind {
    /// Layout was recomputed
    LayoutChanged,
    /// Caret moved
    CursorChanged,
    /// Selection changed
    SelectionChanged,
    /// Page count differs from the last emitted value
    PageCountChanged,
}

/// Change event record
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// Layout was recomputed.
    LayoutChanged {
        /// Paragraph count
        paragraphs: usize,
        /// Line count
        lines: usize,
        /// Page count
        pages: usize,
    },
    /// Caret moved.
    CursorChanged {
        /// New linear offset
        offset: usize,
        /// New structural address
        structure: Option<StructurePosition>,
    },
    /// Selection changed (`None` when cleared).
    SelectionChanged {
        /// New selection
        selection: Option<Selection>,
    },
    /// Page count changed.
    PageCountChanged {
        /// Previously emitted count
        old: usize,
        /// New count
        new: usize,
    },
}

impl EditorEvent {
    /// Kind of this event.
    pub fn kind(&self) -> EditorEventKind {
        match self {
            EditorEvent::LayoutChanged { .. } => EditorEventKind::LayoutChanged,
            EditorEvent::CursorChanged { .. } => EditorEventKind::CursorChanged,
            EditorEvent::SelectionChanged { .. } => EditorEventKind::SelectionChanged,
            EditorEvent::PageCountChanged { .. } => EditorEventKind::PageCountChanged,
        }
    }
}

/// Token returned by [`ListenerRegistry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Event callback function type
pub type EventCallback = Box<dyn FnMut(&EditorEvent) + Send>;

struct Listener {
    id: ListenerId,
    kind: EditorEventKind,
    callback: EventCallback,
}

/// Listener registry keyed by event kind.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<Listener>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `callback` to events of `kind`.
    pub fn add<F>(&mut self, kind: EditorEventKind, callback: F) -> ListenerId
    where
        F: FnMut(&EditorEvent) + Send + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push(Listener {
            id,
            kind,
            callback: Box::new(callback),
        });
        id
    }

    /// Unsubscribe. Returns whether a listener was removed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Deliver `event` to every listener of its kind, in subscription order.
    pub fn notify(&mut self, event: &EditorEvent) {
        let kind = event.kind();
        for listener in self.listeners.iter_mut().filter(|l| l.kind == kind) {
            (listener.callback)(event);
        }
    }

    /// Drop every listener. Ids are never reused, so old tokens stay inert.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Number of listeners for `kind`.
    pub fn count(&self, kind: EditorEventKind) -> usize {
        self.listeners.iter().filter(|l| l.kind == kind).count()
    }

    /// Total number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("next_id", &self.next_id)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

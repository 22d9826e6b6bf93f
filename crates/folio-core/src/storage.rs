//! Piece table text storage.
//!
//! The document is an ordered list of pieces, each referencing a span of either the read-only
//! original buffer or the append-only add buffer. Edits append to the add buffer and re-slice
//! the piece list; buffer contents are never rewritten.
//!
//! Every offset and length in the public API counts `char`s. Pieces remember both their byte
//! span (to slice the buffer) and their char count (to walk the document without decoding).

use crate::error::BoundsError;

/// Which buffer a [`Piece`] reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The text the table was opened with.
    Original,
    /// Text typed or pasted since.
    Added,
}

/// A run of document text stored contiguously in one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    /// Buffer holding the text.
    pub source: Source,
    /// First byte of the run inside its buffer.
    pub byte_start: usize,
    /// Run length in bytes.
    pub byte_len: usize,
    /// Run length in chars.
    pub chars: usize,
}

impl Piece {
    fn spanning(source: Source, byte_start: usize, text: &str) -> Self {
        Self {
            source,
            byte_start,
            byte_len: text.len(),
            chars: text.chars().count(),
        }
    }

    fn byte_end(&self) -> usize {
        self.byte_start + self.byte_len
    }
}

/// Document text as a piece table.
///
/// Out-of-range offsets are rejected with a [`BoundsError`] and leave the table untouched.
#[derive(Debug, Clone)]
pub struct PieceTable {
    original: String,
    added: String,
    pieces: Vec<Piece>,
    // Sum of `Piece::chars`, maintained by every edit.
    len: usize,
}

impl PieceTable {
    /// Open a table over `text`. The text becomes the original buffer as a single piece.
    pub fn new(text: &str) -> Self {
        let pieces = if text.is_empty() {
            Vec::new()
        } else {
            vec![Piece::spanning(Source::Original, 0, text)]
        };
        let len = pieces.first().map_or(0, |p| p.chars);

        Self {
            original: text.to_string(),
            added: String::new(),
            pieces,
            len,
        }
    }

    /// A table with no text.
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Document length in characters.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the document holds no text.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Document length in UTF-8 bytes.
    pub fn byte_len(&self) -> usize {
        self.pieces.iter().map(|p| p.byte_len).sum()
    }

    /// Number of pieces currently describing the document.
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Size of the add buffer in bytes. Only ever grows.
    pub fn add_buffer_len(&self) -> usize {
        self.added.len()
    }

    /// Ordered pieces, for inspection.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Insert `text` so that its first char lands at `offset` (`0..=len`).
    pub fn insert(&mut self, offset: usize, text: &str) -> Result<(), BoundsError> {
        if offset > self.len {
            return Err(BoundsError::Offset {
                offset,
                len: self.len,
            });
        }
        if text.is_empty() {
            return Ok(());
        }

        let piece = Piece::spanning(Source::Added, self.added.len(), text);
        self.added.push_str(text);
        let inserted_chars = piece.chars;

        let at = match self.locate_boundary(offset) {
            None => {
                self.pieces.push(piece);
                self.pieces.len() - 1
            }
            Some((index, 0)) => {
                self.pieces.insert(index, piece);
                index
            }
            Some((index, within)) if within == self.pieces[index].chars => {
                self.pieces.insert(index + 1, piece);
                index + 1
            }
            Some((index, within)) => {
                let (head, tail) = self.split_at_char(&self.pieces[index], within);
                self.pieces.splice(index..=index, [head, piece, tail]);
                index + 1
            }
        };

        self.len += inserted_chars;
        self.coalesce_at(at);
        Ok(())
    }

    /// Remove the `length` chars starting at `offset`.
    pub fn delete(&mut self, offset: usize, length: usize) -> Result<(), BoundsError> {
        let end = self.checked_end(offset, length)?;
        if length == 0 {
            return Ok(());
        }

        // offset < len, so some piece holds it.
        let (first, within_first) = self.locate_char(offset);
        let mut piece_start = offset - within_first;
        let mut last = first;
        let mut survivors = Vec::with_capacity(2);

        for (index, piece) in self.pieces.iter().enumerate().skip(first) {
            let piece_end = piece_start + piece.chars;
            if piece_start < offset {
                survivors.push(self.split_at_char(piece, offset - piece_start).0);
            }
            if piece_end >= end {
                if piece_end > end {
                    survivors.push(self.split_at_char(piece, end - piece_start).1);
                }
                last = index;
                break;
            }
            piece_start = piece_end;
        }

        self.pieces.splice(first..=last, survivors);
        self.len -= length;
        Ok(())
    }

    /// The whole document.
    pub fn get_text(&self) -> String {
        let mut text = String::with_capacity(self.byte_len());
        text.extend(self.pieces.iter().map(|p| self.slice_of(p)));
        text
    }

    /// The `length` chars starting at `offset`.
    pub fn get_range_text(&self, offset: usize, length: usize) -> Result<String, BoundsError> {
        let end = self.checked_end(offset, length)?;

        let mut text = String::new();
        let mut piece_start = 0;
        for piece in &self.pieces {
            if piece_start >= end {
                break;
            }
            let piece_end = piece_start + piece.chars;
            if piece_end > offset {
                let from = offset.max(piece_start);
                let to = end.min(piece_end);
                text.extend(
                    self.slice_of(piece)
                        .chars()
                        .skip(from - piece_start)
                        .take(to - from),
                );
            }
            piece_start = piece_end;
        }

        Ok(text)
    }

    /// Character at `offset`, if any.
    pub fn char_at(&self, offset: usize) -> Option<char> {
        if offset >= self.len {
            return None;
        }
        let (index, within) = self.locate_char(offset);
        self.slice_of(&self.pieces[index]).chars().nth(within)
    }

    fn checked_end(&self, offset: usize, length: usize) -> Result<usize, BoundsError> {
        offset
            .checked_add(length)
            .filter(|end| *end <= self.len)
            .ok_or(BoundsError::Range {
                start: offset,
                end: offset.saturating_add(length),
                len: self.len,
            })
    }

    fn slice_of(&self, piece: &Piece) -> &str {
        let buffer = match piece.source {
            Source::Original => &self.original,
            Source::Added => &self.added,
        };
        &buffer[piece.byte_start..piece.byte_end()]
    }

    /// Piece index and char position within it for a boundary `offset` (`0..=len`).
    ///
    /// A boundary between two pieces resolves to the end of the earlier one. `None` means the
    /// table has no pieces.
    fn locate_boundary(&self, offset: usize) -> Option<(usize, usize)> {
        let mut piece_start = 0;
        for (index, piece) in self.pieces.iter().enumerate() {
            let piece_end = piece_start + piece.chars;
            if offset <= piece_end {
                return Some((index, offset - piece_start));
            }
            piece_start = piece_end;
        }

        let last = self.pieces.len().checked_sub(1)?;
        Some((last, self.pieces[last].chars))
    }

    /// Piece index and char position within it for the char at `offset` (`0..len`).
    fn locate_char(&self, offset: usize) -> (usize, usize) {
        let mut piece_start = 0;
        for (index, piece) in self.pieces.iter().enumerate() {
            let piece_end = piece_start + piece.chars;
            if offset < piece_end {
                return (index, offset - piece_start);
            }
            piece_start = piece_end;
        }
        (self.pieces.len(), 0)
    }

    /// Cut `piece` before its `at`-th char.
    fn split_at_char(&self, piece: &Piece, at: usize) -> (Piece, Piece) {
        let cut = self
            .slice_of(piece)
            .char_indices()
            .nth(at)
            .map_or(piece.byte_len, |(byte, _)| byte);

        let head = Piece {
            byte_len: cut,
            chars: at,
            ..piece.clone()
        };
        let tail = Piece {
            byte_start: piece.byte_start + cut,
            byte_len: piece.byte_len - cut,
            chars: piece.chars - at,
            ..piece.clone()
        };
        (head, tail)
    }

    /// Whether `second` continues `first` in the add buffer.
    fn adjoins(first: &Piece, second: &Piece) -> bool {
        first.source == Source::Added
            && second.source == Source::Added
            && first.byte_end() == second.byte_start
    }

    /// Fold the piece at `index` into adjoining neighbours. Typing appends to the add buffer
    /// right after the previous keystroke, so a run of keystrokes stays one piece.
    fn coalesce_at(&mut self, index: usize) {
        let mut index = index;
        if index > 0 && Self::adjoins(&self.pieces[index - 1], &self.pieces[index]) {
            let absorbed = self.pieces.remove(index);
            let kept = &mut self.pieces[index - 1];
            kept.byte_len += absorbed.byte_len;
            kept.chars += absorbed.chars;
            index -= 1;
        }
        if index + 1 < self.pieces.len()
            && Self::adjoins(&self.pieces[index], &self.pieces[index + 1])
        {
            let absorbed = self.pieces.remove(index + 1);
            let kept = &mut self.pieces[index];
            kept.byte_len += absorbed.byte_len;
            kept.chars += absorbed.chars;
        }
    }
}

impl Default for PieceTable {
    fn default() -> Self {
        Self::empty()
    }
}

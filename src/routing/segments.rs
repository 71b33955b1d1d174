//! Segment queue for a single dispatch pass.
//!
//! The queue only ever moves forward: `shift` removes segments from the front
//! and nothing puts them back. Segments a pattern looked at but chose not to
//! shift (greedy captures, the `//` tail) are counted in `unshifted_parsed`
//! so `all_parsed` can report a fully handled URL while they are still queued.

use crate::routing::path::Path;

#[derive(Debug, Clone, Default)]
pub struct SegmentQueue {
    segments: Vec<String>,
    cursor: usize,
    unshifted_parsed: usize,
    extension: Option<String>,
}

impl SegmentQueue {
    pub fn new(path: Path) -> Self {
        let (segments, extension) = path.into_parts();
        Self {
            segments,
            cursor: 0,
            unshifted_parsed: 0,
            extension,
        }
    }

    /// The i-th queued segment, or `""` when out of range.
    pub fn segment_at(&self, index: usize) -> &str {
        self.queued().get(index).map(String::as_str).unwrap_or("")
    }

    /// Slice of the queued segments. `length: None` means "to the end".
    /// Out-of-range bounds are clamped.
    pub fn segments(&self, offset: usize, length: Option<usize>) -> &[String] {
        let queued = self.queued();
        let start = offset.min(queued.len());
        let end = match length {
            Some(len) => start.saturating_add(len).min(queued.len()),
            None => queued.len(),
        };
        &queued[start..end]
    }

    /// All queued segments joined by `/`.
    pub fn remaining(&self) -> String {
        self.queued().join("/")
    }

    /// Remove up to `count` segments from the front. Asking for more than is
    /// queued is not an error.
    pub fn shift(&mut self, count: usize) -> Vec<String> {
        let end = self.cursor.saturating_add(count).min(self.segments.len());
        let shifted = self.segments[self.cursor..end].to_vec();
        self.cursor = end;
        shifted
    }

    pub fn all_parsed(&self) -> bool {
        self.len() <= self.unshifted_parsed
    }

    pub fn len(&self) -> usize {
        self.segments.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segments shifted off so far in this pass.
    pub fn consumed(&self) -> &[String] {
        &self.segments[..self.cursor]
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub(crate) fn set_unshifted_parsed(&mut self, count: usize) {
        self.unshifted_parsed = count;
    }

    fn queued(&self) -> &[String] {
        &self.segments[self.cursor..]
    }
}

impl From<&str> for SegmentQueue {
    fn from(raw: &str) -> Self {
        Self::new(Path::parse(raw))
    }
}

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{CourseElement, ElementId};

/// Rendering identity of one transcript entry.
///
/// Changing `instance` between revision passes forces a view to drop any local
/// state (partially typed input, highlighted choice) it kept for the element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RenderKey {
    pub element_id: ElementId,
    pub instance: u32,
    pub position: usize,
}

impl fmt::Display for RenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.element_id, self.instance, self.position)
    }
}

/// One element as it was shown in the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    /// Index in the transcript.
    pub position: usize,
    /// How many times this element id appeared before this entry.
    pub occurrence: u32,
    /// Instance counter value for the id when the entry was appended.
    pub instance: u32,
    pub element: CourseElement,
    pub shown_at: DateTime<Utc>,
}

impl TranscriptEntry {
    #[must_use]
    pub fn element_id(&self) -> &ElementId {
        self.element.element_id()
    }

    #[must_use]
    pub fn render_key(&self) -> RenderKey {
        RenderKey {
            element_id: self.element_id().clone(),
            instance: self.instance,
            position: self.position,
        }
    }
}

/// Append-only history of the elements shown so far.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    occurrences: HashMap<ElementId, u32>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(
        &mut self,
        element: CourseElement,
        instance: u32,
        shown_at: DateTime<Utc>,
    ) -> &TranscriptEntry {
        let seen = self
            .occurrences
            .entry(element.element_id().clone())
            .or_insert(0);
        let occurrence = *seen;
        *seen += 1;

        let position = self.entries.len();
        self.entries.push(TranscriptEntry {
            position,
            occurrence,
            instance,
            element,
            shown_at,
        });
        &self.entries[position]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&TranscriptEntry> {
        self.entries.get(position)
    }

    /// The element currently on screen.
    #[must_use]
    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }

    /// Number of times `id` has been shown.
    #[must_use]
    pub fn occurrences_of(&self, id: &ElementId) -> u32 {
        self.occurrences.get(id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::EndElement;
    use crate::time::lesson_start;

    fn end(id: &str) -> CourseElement {
        CourseElement::End(EndElement {
            element_id: ElementId::new(id),
            text: None,
        })
    }

    #[test]
    fn append_tracks_positions_and_occurrences() {
        let mut transcript = Transcript::new();
        transcript.append(end("a"), 0, lesson_start());
        transcript.append(end("b"), 0, lesson_start());
        let repeat = transcript.append(end("a"), 1, lesson_start()).clone();

        assert_eq!(transcript.len(), 3);
        assert_eq!(repeat.position, 2);
        assert_eq!(repeat.occurrence, 1);
        assert_eq!(transcript.occurrences_of(&ElementId::new("a")), 2);
        assert_eq!(transcript.last().map(TranscriptEntry::element_id), Some(&ElementId::new("a")));
    }

    #[test]
    fn render_key_includes_instance() {
        let mut transcript = Transcript::new();
        let entry = transcript.append(end("q1"), 2, lesson_start());
        assert_eq!(entry.render_key().to_string(), "q1-2-0");
    }
}

//! Revision chain membership.
//!
//! Two resolvers live here. `scan_membership` walks the transcript backward to
//! the nearest `Revision` element on every query. `ChainSpans` records the
//! transcript range each replay actually covered, so membership becomes a
//! binary search. The session uses spans; the scan is kept for callers that
//! only hold a transcript and the cached results.

use std::collections::HashMap;

use crate::model::{CourseElement, ElementId, RevisionResult};
use crate::transcript::Transcript;

/// True iff the nearest `Revision` element before `position` has mistakes and
/// its chain names `id`.
///
/// A missing result counts as "no mistakes".
#[must_use]
pub fn scan_membership(
    transcript: &Transcript,
    results: &HashMap<ElementId, RevisionResult>,
    id: &ElementId,
    position: usize,
) -> bool {
    let upper = position.min(transcript.len());
    let nearest_revision = transcript.entries()[..upper]
        .iter()
        .rev()
        .find(|entry| matches!(entry.element, CourseElement::Revision(_)));

    let Some(revision) = nearest_revision else {
        return false;
    };
    results
        .get(revision.element_id())
        .is_some_and(|result| result.has_mistakes && result.chain_contains(id))
}

/// Transcript range covered by one revision replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSpan {
    pub revision_id: ElementId,
    pub chain: Vec<ElementId>,
    /// First position of the replay.
    pub start: usize,
    /// One past the last position, `None` while the replay is running.
    pub end: Option<usize>,
    cursor: usize,
}

impl ChainSpan {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    #[must_use]
    pub fn covers(&self, position: usize) -> bool {
        position >= self.start && self.end.is_none_or(|end| position < end)
    }

    /// Chain ids not shown yet.
    #[must_use]
    pub fn remaining(&self) -> &[ElementId] {
        &self.chain[self.cursor.min(self.chain.len())..]
    }
}

/// Ordered, non-overlapping replay spans.
#[derive(Debug, Clone, Default)]
pub struct ChainSpans {
    spans: Vec<ChainSpan>,
}

impl ChainSpans {
    /// Open a span whose first entry will land at `start`.
    ///
    /// Any span still open is closed at `start`.
    pub fn open(&mut self, revision_id: ElementId, chain: Vec<ElementId>, start: usize) {
        self.close_open(start);
        self.spans.push(ChainSpan {
            revision_id,
            chain,
            start,
            end: None,
            cursor: 0,
        });
    }

    /// Feed an appended entry to the open span.
    ///
    /// The entry extends the span when it is one of the chain ids not shown
    /// yet; anything else closes the span before it.
    pub fn observe(&mut self, position: usize, id: &ElementId) {
        let Some(span) = self.spans.last_mut().filter(|span| span.is_open()) else {
            return;
        };
        let next = span.remaining().iter().position(|chained| chained == id);
        match next {
            Some(offset) => span.cursor += offset + 1,
            None => span.end = Some(position),
        }
    }

    pub fn close_open(&mut self, position: usize) {
        if let Some(span) = self.spans.last_mut().filter(|span| span.is_open()) {
            span.end = Some(position.max(span.start));
        }
    }

    /// True iff `position` falls inside a replay whose chain names `id`.
    #[must_use]
    pub fn contains(&self, position: usize, id: &ElementId) -> bool {
        let idx = self.spans.partition_point(|span| span.start <= position);
        idx.checked_sub(1)
            .and_then(|i| self.spans.get(i))
            .is_some_and(|span| span.covers(position) && span.chain.contains(id))
    }

    #[must_use]
    pub fn active(&self) -> Option<&ChainSpan> {
        self.spans.last().filter(|span| span.is_open())
    }

    #[must_use]
    pub fn spans(&self) -> &[ChainSpan] {
        &self.spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::{
        ChoiceAnswer, MessageElement, QuizElement, RevisionElement,
    };
    use crate::time::lesson_start;

    fn quiz(id: &str) -> CourseElement {
        CourseElement::Quiz(QuizElement {
            element_id: ElementId::new(id),
            text: id.into(),
            answers: vec![ChoiceAnswer {
                text: "a".into(),
                correct: Some(true),
                feedback: None,
            }],
            media: Vec::new(),
        })
    }

    fn message(id: &str) -> CourseElement {
        CourseElement::Message(MessageElement {
            element_id: ElementId::new(id),
            text: id.into(),
            button: None,
            options: Vec::new(),
            parse_mode: "MARKDOWN".into(),
            media: Vec::new(),
            link_preview: None,
        })
    }

    fn revision(id: &str) -> CourseElement {
        CourseElement::Revision(RevisionElement {
            element_id: ElementId::new(id),
            text: "Revise".into(),
            prefix: "q".into(),
            no_mistakes_text: "Clean".into(),
            button: None,
        })
    }

    fn result(chain: &[&str], has_mistakes: bool) -> RevisionResult {
        RevisionResult {
            has_mistakes,
            message: String::new(),
            mistakes_count: chain.len(),
            chain_element_ids: chain.iter().map(|id| ElementId::new(*id)).collect(),
        }
    }

    fn transcript(elements: Vec<CourseElement>) -> Transcript {
        let mut transcript = Transcript::new();
        for element in elements {
            transcript.append(element, 0, lesson_start());
        }
        transcript
    }

    #[test]
    fn scan_finds_chain_members_after_revision() {
        let transcript = transcript(vec![revision("R"), quiz("q1"), quiz("q2"), message("M")]);
        let mut results = HashMap::new();
        results.insert(ElementId::new("R"), result(&["q1", "q2"], true));

        assert!(scan_membership(&transcript, &results, &ElementId::new("q1"), 1));
        assert!(scan_membership(&transcript, &results, &ElementId::new("q2"), 2));
        assert!(!scan_membership(&transcript, &results, &ElementId::new("M"), 3));
    }

    #[test]
    fn scan_without_revision_or_mistakes_is_false() {
        let plain = transcript(vec![quiz("q1")]);
        assert!(!scan_membership(&plain, &HashMap::new(), &ElementId::new("q1"), 0));

        let clean = transcript(vec![revision("R"), quiz("q1")]);
        let mut results = HashMap::new();
        results.insert(ElementId::new("R"), result(&["q1"], false));
        assert!(!scan_membership(&clean, &results, &ElementId::new("q1"), 1));
    }

    #[test]
    fn scan_only_consults_nearest_revision() {
        let transcript = transcript(vec![
            revision("R1"),
            quiz("q1"),
            revision("R2"),
            quiz("q1"),
        ]);
        let mut results = HashMap::new();
        results.insert(ElementId::new("R1"), result(&["q1"], true));
        results.insert(ElementId::new("R2"), result(&["q9"], true));

        assert!(scan_membership(&transcript, &results, &ElementId::new("q1"), 1));
        assert!(!scan_membership(&transcript, &results, &ElementId::new("q1"), 3));
    }

    #[test]
    fn span_covers_replayed_chain_and_closes_on_foreign_element() {
        let mut spans = ChainSpans::default();
        spans.open(
            ElementId::new("R"),
            vec![ElementId::new("q1"), ElementId::new("q2")],
            1,
        );
        spans.observe(1, &ElementId::new("q1"));
        spans.observe(2, &ElementId::new("q2"));
        assert!(spans.active().is_some());
        spans.observe(3, &ElementId::new("M"));
        assert!(spans.active().is_none());

        assert!(spans.contains(1, &ElementId::new("q1")));
        assert!(spans.contains(2, &ElementId::new("q2")));
        assert!(!spans.contains(3, &ElementId::new("M")));
        assert!(!spans.contains(0, &ElementId::new("q1")));
    }

    #[test]
    fn span_skips_ahead_when_chain_items_are_missing() {
        let mut spans = ChainSpans::default();
        let chain = vec![ElementId::new("q1"), ElementId::new("q2"), ElementId::new("q3")];
        spans.open(ElementId::new("R"), chain, 5);
        spans.observe(5, &ElementId::new("q2"));
        assert_eq!(spans.active().unwrap().remaining(), &[ElementId::new("q3")]);
        spans.observe(6, &ElementId::new("q1"));
        assert_eq!(spans.spans()[0].end, Some(6));
    }

    #[test]
    fn opening_a_new_span_closes_the_previous_one() {
        let mut spans = ChainSpans::default();
        spans.open(ElementId::new("R1"), vec![ElementId::new("q1")], 1);
        spans.observe(1, &ElementId::new("q1"));
        spans.open(ElementId::new("R2"), vec![ElementId::new("q1")], 4);
        spans.observe(4, &ElementId::new("q1"));

        assert_eq!(spans.spans()[0].end, Some(4));
        assert!(spans.contains(1, &ElementId::new("q1")));
        assert!(spans.contains(4, &ElementId::new("q1")));
        assert!(!spans.contains(3, &ElementId::new("q1")));
    }
}

use std::collections::HashSet;

use playback_core::model::{CourseElement, CourseId, ElementId};
use serde_json::Value;

use crate::BackendError;

/// Ordered course definition served by `InMemoryRuntime`.
#[derive(Debug, Clone)]
pub struct CourseScript {
    course_id: CourseId,
    elements: Vec<CourseElement>,
}

impl CourseScript {
    /// # Errors
    ///
    /// Returns `BackendError::InvalidConfig` for an empty script or duplicate
    /// element ids.
    pub fn new(course_id: CourseId, elements: Vec<CourseElement>) -> Result<Self, BackendError> {
        if elements.is_empty() {
            return Err(BackendError::InvalidConfig(format!(
                "course {course_id} has no elements"
            )));
        }
        let mut seen = HashSet::with_capacity(elements.len());
        for element in &elements {
            if !seen.insert(element.element_id()) {
                return Err(BackendError::InvalidConfig(format!(
                    "course {course_id} repeats element id {}",
                    element.element_id()
                )));
            }
        }
        Ok(Self {
            course_id,
            elements,
        })
    }

    /// Parse a JSON array of elements in wire format.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Decode` for malformed JSON or elements, and the
    /// errors of [`CourseScript::new`].
    pub fn from_json(course_id: CourseId, json: &str) -> Result<Self, BackendError> {
        let values: Vec<Value> = serde_json::from_str(json)?;
        let elements = values
            .into_iter()
            .map(CourseElement::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Self::new(course_id, elements)
    }

    #[must_use]
    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    #[must_use]
    pub fn elements(&self) -> &[CourseElement] {
        &self.elements
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CourseElement> {
        self.elements.get(index)
    }

    #[must_use]
    pub fn position_of(&self, id: &ElementId) -> Option<usize> {
        self.elements.iter().position(|e| e.element_id() == id)
    }

    #[must_use]
    pub fn find(&self, id: &ElementId) -> Option<&CourseElement> {
        self.position_of(id).and_then(|index| self.elements.get(index))
    }
}

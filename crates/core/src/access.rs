use thiserror::Error;

use crate::model::{Course, CourseProgress, Lecture, LectureId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessError {
    #[error("course has no lectures")]
    EmptyCurriculum,

    #[error("lecture {id} is not part of the curriculum")]
    UnknownLecture { id: LectureId },

    #[error("course has no free-preview lectures")]
    NoPreviewAvailable,
}

//
// ─── ACCESS POLICY ─────────────────────────────────────────────────────────────
//

/// Decides which lecture a learner should be directed to and which lectures
/// are clickable in the curriculum sidebar.
///
/// An enrolled policy applies the course's unlock rules; a preview policy is
/// for learners who have not purchased the course yet and only exposes
/// free-preview lectures.
///
/// Accessibility is recomputed from the progress store on every call, never
/// cached: `viewed` flags move non-monotonically only through a reset, and
/// the sidebar must follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    enrolled: bool,
}

impl AccessPolicy {
    /// Policy for a learner who owns the course.
    #[must_use]
    pub fn for_enrolled() -> Self {
        Self { enrolled: true }
    }

    /// Policy for a learner browsing before purchase.
    #[must_use]
    pub fn for_preview() -> Self {
        Self { enrolled: false }
    }

    #[must_use]
    pub fn is_enrolled(&self) -> bool {
        self.enrolled
    }

    /// The lecture the learner should currently be directed to.
    ///
    /// Sequential courses resume at the first incomplete lecture; fully
    /// completed courses re-enter at the first lecture. Courses with
    /// sequential access off resume after the last viewed position, falling
    /// back to the first lecture when that position runs off the end.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::EmptyCurriculum` for a course without lectures,
    /// or `AccessError::NoPreviewAvailable` when previewing a course with no
    /// free-preview lectures.
    pub fn target_lecture<'a>(
        &self,
        progress: &'a CourseProgress,
    ) -> Result<&'a Lecture, AccessError> {
        let course = progress.course();
        let first = course
            .curriculum()
            .first()
            .ok_or(AccessError::EmptyCurriculum)?;

        if !self.enrolled {
            return course
                .curriculum()
                .iter()
                .find(|lecture| lecture.free_preview())
                .ok_or(AccessError::NoPreviewAvailable);
        }

        if course.sequential_access() {
            // First incomplete lecture in curriculum order; completed courses
            // fall back to the first lecture on re-entry.
            return Ok(course
                .curriculum()
                .iter()
                .find(|lecture| !progress.viewed(lecture.id()))
                .unwrap_or(first));
        }

        match last_viewed_index(course, progress) {
            Some(index) => Ok(course.lecture_at(index + 1).unwrap_or(first)),
            None => Ok(first),
        }
    }

    /// Whether a lecture is clickable for this learner right now.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::EmptyCurriculum` for a course without lectures,
    /// or `AccessError::UnknownLecture` when the id is not in the curriculum.
    pub fn is_accessible(
        &self,
        progress: &CourseProgress,
        lecture_id: LectureId,
    ) -> Result<bool, AccessError> {
        let course = progress.course();
        if course.curriculum().is_empty() {
            return Err(AccessError::EmptyCurriculum);
        }
        let position = course
            .position_of(lecture_id)
            .ok_or(AccessError::UnknownLecture { id: lecture_id })?;

        if !self.enrolled {
            return Ok(course.curriculum()[position].free_preview());
        }

        if !course.sequential_access() {
            return Ok(true);
        }

        Ok(position == 0
            || course.curriculum()[..position]
                .iter()
                .all(|lecture| progress.viewed(lecture.id())))
    }

    /// Ids of all lectures currently accessible, in curriculum order.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::EmptyCurriculum` for a course without lectures.
    pub fn accessible_lectures(
        &self,
        progress: &CourseProgress,
    ) -> Result<Vec<LectureId>, AccessError> {
        let course = progress.course();
        if course.curriculum().is_empty() {
            return Err(AccessError::EmptyCurriculum);
        }

        let mut out = Vec::with_capacity(course.lecture_count());
        for lecture in course.curriculum() {
            if self.is_accessible(progress, lecture.id())? {
                out.push(lecture.id());
            }
        }
        Ok(out)
    }
}

/// Last-viewed position used by the non-sequential resume rule: scan
/// curriculum indices right to left and stop at the first viewed lecture.
/// This reproduces the hosted player's historical fold exactly; do not
/// replace it with a semantic "highest viewed index" without a product
/// decision.
fn last_viewed_index(course: &Course, progress: &CourseProgress) -> Option<usize> {
    course
        .curriculum()
        .iter()
        .enumerate()
        .rev()
        .find(|(_, lecture)| progress.viewed(lecture.id()))
        .map(|(index, _)| index)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

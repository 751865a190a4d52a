use chrono::{DateTime, Utc};
use std::fmt;

use course_core::access::{AccessError, AccessPolicy};
use course_core::model::{
    Course, CourseProgress, CourseProgressSnapshot, CourseStatus, Lecture, LectureId,
    PlayerSettings, ProgressError, StudentId,
};

use super::view::ProgressView;

/// In-memory session for one (student, course) pair.
///
/// Owns the progress store, the access policy, and the playback settings for
/// the duration of a learner's visit; construct on demand and discard when
/// the visit ends. Persistence happens through
/// [`LectureFlowService`](super::LectureFlowService), which mutates the
/// session and mirrors the changes to storage.
pub struct CourseSession {
    student_id: StudentId,
    progress: CourseProgress,
    policy: AccessPolicy,
    settings: PlayerSettings,
}

impl CourseSession {
    /// Fresh session for an enrolled learner with no recorded progress.
    #[must_use]
    pub fn new(student_id: StudentId, course: Course, settings: PlayerSettings) -> Self {
        Self {
            student_id,
            progress: CourseProgress::new(course),
            policy: AccessPolicy::for_enrolled(),
            settings,
        }
    }

    /// Session for a learner browsing the course before purchase; only
    /// free-preview lectures are accessible.
    #[must_use]
    pub fn preview(student_id: StudentId, course: Course, settings: PlayerSettings) -> Self {
        Self {
            student_id,
            progress: CourseProgress::new(course),
            policy: AccessPolicy::for_preview(),
            settings,
        }
    }

    pub(crate) fn from_parts(
        student_id: StudentId,
        progress: CourseProgress,
        policy: AccessPolicy,
        settings: PlayerSettings,
    ) -> Self {
        Self {
            student_id,
            progress,
            policy,
            settings,
        }
    }

    // Accessors
    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn course(&self) -> &Course {
        self.progress.course()
    }

    #[must_use]
    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    #[must_use]
    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    #[must_use]
    pub fn status(&self) -> CourseStatus {
        self.progress.status()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.progress.completed()
    }

    #[must_use]
    pub fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.progress.completion_date()
    }

    /// Pure read of the current aggregate state.
    #[must_use]
    pub fn snapshot(&self) -> CourseProgressSnapshot {
        self.progress.snapshot()
    }

    /// The lecture the learner should currently be directed to.
    ///
    /// # Errors
    ///
    /// Propagates `AccessError` from the policy (empty curriculum, no
    /// preview lectures).
    pub fn current_lecture(&self) -> Result<&Lecture, AccessError> {
        self.policy.target_lecture(&self.progress)
    }

    /// Whether a lecture is clickable for this learner right now.
    ///
    /// # Errors
    ///
    /// Propagates `AccessError` from the policy.
    pub fn is_accessible(&self, lecture_id: LectureId) -> Result<bool, AccessError> {
        self.policy.is_accessible(&self.progress, lecture_id)
    }

    /// Ids of all currently accessible lectures, in curriculum order.
    ///
    /// # Errors
    ///
    /// Propagates `AccessError` from the policy.
    pub fn accessible_lectures(&self) -> Result<Vec<LectureId>, AccessError> {
        self.policy.accessible_lectures(&self.progress)
    }

    pub(crate) fn mark_viewed(
        &mut self,
        lecture_id: LectureId,
        now: DateTime<Utc>,
    ) -> Result<CourseProgressSnapshot, ProgressError> {
        self.progress.mark_viewed(lecture_id, now)
    }

    pub(crate) fn reset(&mut self) {
        self.progress.reset();
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress_view(&self) -> ProgressView {
        let total = self.course().lecture_count();
        let viewed = self.progress.viewed_count();
        ProgressView {
            total_lectures: total,
            viewed,
            remaining: total.saturating_sub(viewed),
            status: self.status(),
        }
    }
}

impl fmt::Debug for CourseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CourseSession")
            .field("student_id", &self.student_id)
            .field("course_id", &self.course().id())
            .field("status", &self.status())
            .field("viewed", &self.progress.viewed_count())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::CourseId;
    use course_core::time::fixed_now;

    fn build_course() -> Course {
        let curriculum = vec![
            Lecture::new(LectureId::new(1), "Intro", None, true).unwrap(),
            Lecture::new(LectureId::new(2), "Ownership", None, false).unwrap(),
            Lecture::new(LectureId::new(3), "Lifetimes", None, false).unwrap(),
        ];
        Course::new(
            CourseId::new(1),
            "Rust Basics",
            curriculum,
            true,
            true,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn fresh_session_targets_first_lecture() {
        let session = CourseSession::new(
            StudentId::generate(),
            build_course(),
            PlayerSettings::default_flow(),
        );

        assert_eq!(session.status(), CourseStatus::NotStarted);
        assert_eq!(
            session.current_lecture().unwrap().id(),
            LectureId::new(1)
        );
        assert_eq!(
            session.accessible_lectures().unwrap(),
            vec![LectureId::new(1)]
        );
    }

    #[test]
    fn marking_advances_view_counts() {
        let mut session = CourseSession::new(
            StudentId::generate(),
            build_course(),
            PlayerSettings::default_flow(),
        );
        session.mark_viewed(LectureId::new(1), fixed_now()).unwrap();

        let view = session.progress_view();
        assert_eq!(view.total_lectures, 3);
        assert_eq!(view.viewed, 1);
        assert_eq!(view.remaining, 2);
        assert_eq!(view.status, CourseStatus::InProgress);
        assert!(!view.is_complete());
    }

    #[test]
    fn preview_session_only_exposes_free_lectures() {
        let session = CourseSession::preview(
            StudentId::generate(),
            build_course(),
            PlayerSettings::default_flow(),
        );

        assert!(!session.policy().is_enrolled());
        assert_eq!(
            session.accessible_lectures().unwrap(),
            vec![LectureId::new(1)]
        );
        assert!(!session.is_accessible(LectureId::new(2)).unwrap());
    }

    #[test]
    fn reset_returns_session_to_not_started() {
        let mut session = CourseSession::new(
            StudentId::generate(),
            build_course(),
            PlayerSettings::default_flow(),
        );
        for id in 1..=3 {
            session.mark_viewed(LectureId::new(id), fixed_now()).unwrap();
        }
        assert!(session.is_completed());

        session.reset();
        assert_eq!(session.status(), CourseStatus::NotStarted);
        assert_eq!(session.completion_date(), None);
        assert_eq!(
            session.current_lecture().unwrap().id(),
            LectureId::new(1)
        );
    }
}

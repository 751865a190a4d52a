use std::future::Future;
use std::sync::Arc;

use chrono::Duration;

use course_core::Clock;
use course_core::access::AccessPolicy;
use course_core::model::{
    CourseId, CourseProgressSnapshot, Lecture, LectureId, PlayerSettings, ProgressError,
    ProgressRecord, StudentId,
};
use storage::repository::{CompletionRow, CourseRepository, ProgressRepository, StorageError};

use super::queries::SessionQueries;
use super::session::CourseSession;
use crate::error::FlowError;

/// What the player should do after a lecture finishes.
#[derive(Debug, Clone, PartialEq)]
pub enum LectureSignal {
    /// Move on to the next lecture in the curriculum.
    Advance { next: Lecture },
    /// The curriculum's last lecture just finished. `completed` reports
    /// whether every lecture is viewed (they can differ on courses with
    /// sequential access off); the certificate flag is only raised for a
    /// fully completed course that has certificates enabled.
    CourseCompleted {
        completed: bool,
        certificate_available: bool,
    },
}

/// Result of handling a lecture-ended event.
#[derive(Debug, Clone, PartialEq)]
pub struct LectureOutcome {
    pub signal: LectureSignal,
    pub snapshot: CourseProgressSnapshot,
    /// How long the player should show the completion toast before acting on
    /// the signal. Pacing only; nothing in the engine sleeps.
    pub advance_delay: Duration,
    /// False when the write never reached storage; the local session state
    /// has still advanced.
    pub persisted: bool,
}

/// Orchestrates session hydration and persisted lecture-ended handling.
///
/// Writes go through a bounded, fixed-count retry with no backoff; when the
/// budget is exhausted the failure is logged and the in-memory session keeps
/// its advanced state, favoring forward progress over strict consistency.
#[derive(Clone)]
pub struct LectureFlowService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    progress: Arc<dyn ProgressRepository>,
    settings: PlayerSettings,
}

impl LectureFlowService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            progress,
            settings: PlayerSettings::default_flow(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: PlayerSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Start a session for an enrolled learner, hydrated from storage.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Storage` with `StorageError::NotFound` when the
    /// course does not exist, or other storage errors on repository failures.
    pub async fn start_session(
        &self,
        student: StudentId,
        course_id: CourseId,
    ) -> Result<CourseSession, FlowError> {
        SessionQueries::hydrate(
            student,
            course_id,
            self.courses.as_ref(),
            self.progress.as_ref(),
            AccessPolicy::for_enrolled(),
            self.settings.clone(),
        )
        .await
    }

    /// Start a preview session for a learner who has not purchased the
    /// course; no stored progress is loaded.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Storage` with `StorageError::NotFound` when the
    /// course does not exist.
    pub async fn start_preview(
        &self,
        student: StudentId,
        course_id: CourseId,
    ) -> Result<CourseSession, FlowError> {
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        Ok(CourseSession::preview(
            student,
            course,
            self.settings.clone(),
        ))
    }

    /// Handle a lecture's video finishing.
    ///
    /// Marks the lecture viewed in the session, mirrors the record (and the
    /// completion row, on a completion transition) to storage with bounded
    /// retries, and reports what the player should do next.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Progress` when the lecture id is not part of the
    /// curriculum; nothing is persisted and the session does not advance.
    pub async fn on_lecture_ended(
        &self,
        session: &mut CourseSession,
        lecture_id: LectureId,
    ) -> Result<LectureOutcome, FlowError> {
        let now = self.clock.now();
        let snapshot = session.mark_viewed(lecture_id, now)?;

        let student = session.student_id();
        let course_id = session.course().id();
        let retries = session.settings().mark_viewed_retries();

        let record = ProgressRecord::viewed_at(lecture_id, now);
        let mut persisted = self
            .retry_write(retries, "lecture progress", || {
                self.progress.upsert_record(student, course_id, &record)
            })
            .await;

        if snapshot.completed {
            let row = CompletionRow {
                completed: true,
                completion_date: snapshot.completion_date,
            };
            persisted &= self
                .retry_write(retries, "course completion", || {
                    self.progress.set_completion(student, course_id, &row)
                })
                .await;
        }

        let position = session
            .course()
            .position_of(lecture_id)
            .ok_or(ProgressError::UnknownLecture { id: lecture_id })?;

        let signal = match session.course().lecture_at(position + 1) {
            Some(next) => LectureSignal::Advance { next: next.clone() },
            None => LectureSignal::CourseCompleted {
                completed: snapshot.completed,
                certificate_available: snapshot.completed
                    && session.course().certificate_enabled(),
            },
        };

        Ok(LectureOutcome {
            signal,
            advance_delay: session.settings().advance_delay(),
            snapshot,
            persisted,
        })
    }

    /// Clear stored progress for the session's pair, then reset the
    /// in-memory store. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Storage` when the clear does not reach storage;
    /// the in-memory store is left untouched in that case so stored progress
    /// cannot resurrect a locally reset course.
    pub async fn reset_progress(
        &self,
        session: &mut CourseSession,
    ) -> Result<CourseProgressSnapshot, FlowError> {
        self.progress
            .clear(session.student_id(), session.course().id())
            .await?;
        session.reset();
        Ok(session.snapshot())
    }

    /// Run a storage write with the session's fixed retry budget. Returns
    /// whether the write eventually succeeded.
    async fn retry_write<F, Fut>(&self, retries: u32, label: &'static str, op: F) -> bool
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), StorageError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(()) => return true,
                Err(error) => {
                    if attempt >= retries {
                        tracing::warn!(
                            %error,
                            attempts = attempt + 1,
                            "giving up on {label} write; continuing with local state"
                        );
                        return false;
                    }
                    attempt += 1;
                    tracing::warn!(%error, attempt, "{label} write failed; retrying");
                }
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

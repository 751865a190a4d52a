use course_core::access::AccessPolicy;
use course_core::model::{CourseId, CourseProgress, PlayerSettings, StudentId};
use storage::repository::{CourseRepository, ProgressRepository, StorageError};

use super::session::CourseSession;
use crate::error::FlowError;

/// Storage-backed session hydration.
pub(crate) struct SessionQueries;

impl SessionQueries {
    /// Build a session from repository data.
    ///
    /// Rehydrates the progress store from persisted records; the persisted
    /// completion date is authoritative so the first-completion timestamp
    /// stays stable across sessions.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Storage` with `StorageError::NotFound` when the
    /// course does not exist, or other storage errors on repository failures.
    pub async fn hydrate(
        student: StudentId,
        course_id: CourseId,
        courses: &dyn CourseRepository,
        progress: &dyn ProgressRepository,
        policy: AccessPolicy,
        settings: PlayerSettings,
    ) -> Result<CourseSession, FlowError> {
        let course = courses
            .get_course(course_id)
            .await?
            .ok_or(StorageError::NotFound)?;

        let records = progress.list_records(student, course_id).await?;
        let completion_date = progress
            .completion(student, course_id)
            .await?
            .and_then(|row| row.completion_date);

        let store = CourseProgress::from_persisted(course, records, completion_date);
        Ok(CourseSession::from_parts(student, store, policy, settings))
    }
}

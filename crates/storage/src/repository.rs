use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{Course, CourseId, LectureId, ProgressRecord, StudentId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted completion flags for one (student, course) pair.
///
/// The completion date is written once, on the first transition to
/// completed, and only a progress clear removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRow {
    pub completed: bool,
    pub completion_date: Option<DateTime<Utc>>,
}

/// Repository contract for the course catalog.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Persist or update a course and its curriculum.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// Fetch a course by ID, `None` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// List courses in id order, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError>;
}

/// Repository contract for per-learner lecture progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Persist a per-lecture record, replacing any existing record for the
    /// same lecture.
    ///
    /// The upsert is idempotent and commutative on the `viewed` flag;
    /// concurrent writes for the same lecture resolve last-writer-wins on
    /// `date_viewed`, which is therefore not deterministic under races.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_record(
        &self,
        student: StudentId,
        course: CourseId,
        record: &ProgressRecord,
    ) -> Result<(), StorageError>;

    /// All records for one (student, course) pair; order is not significant.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_records(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Persisted completion flags, `None` when never written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn completion(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> Result<Option<CompletionRow>, StorageError>;

    /// Persist or update the completion flags.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn set_completion(
        &self,
        student: StudentId,
        course: CourseId,
        row: &CompletionRow,
    ) -> Result<(), StorageError>;

    /// Remove all records and completion flags for the pair. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn clear(&self, student: StudentId, course: CourseId) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    records: Arc<Mutex<HashMap<(StudentId, CourseId), HashMap<LectureId, ProgressRecord>>>>,
    completions: Arc<Mutex<HashMap<(StudentId, CourseId), CompletionRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(course.id(), course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut courses: Vec<Course> = guard.values().cloned().collect();
        courses.sort_by_key(Course::id);
        courses.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(courses)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn upsert_record(
        &self,
        student: StudentId,
        course: CourseId,
        record: &ProgressRecord,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .entry((student, course))
            .or_default()
            .insert(record.lecture_id, record.clone());
        Ok(())
    }

    async fn list_records(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .get(&(student, course))
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn completion(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> Result<Option<CompletionRow>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(student, course)).copied())
    }

    async fn set_completion(
        &self,
        student: StudentId,
        course: CourseId,
        row: &CompletionRow,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((student, course), *row);
        Ok(())
    }

    async fn clear(&self, student: StudentId, course: CourseId) -> Result<(), StorageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        records.remove(&(student, course));
        drop(records);

        let mut completions = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        completions.remove(&(student, course));
        Ok(())
    }
}

/// Aggregates the catalog and progress repositories behind trait objects for
/// easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let courses: Arc<dyn CourseRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self { courses, progress }
    }
}

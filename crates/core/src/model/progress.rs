use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::course::Course;
use crate::model::ids::{CourseId, LectureId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("lecture {id} is not part of the curriculum")]
    UnknownLecture { id: LectureId },
}

//
// ─── PROGRESS RECORD ───────────────────────────────────────────────────────────
//

/// Per-lecture view state for one (student, course) pair.
///
/// At most one record exists per lecture id; marking a lecture viewed again
/// replaces the record rather than appending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub lecture_id: LectureId,
    pub viewed: bool,
    pub date_viewed: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// Record for a lecture whose video finished playing at `at`.
    #[must_use]
    pub fn viewed_at(lecture_id: LectureId, at: DateTime<Utc>) -> Self {
        Self {
            lecture_id,
            viewed: true,
            date_viewed: Some(at),
        }
    }
}

//
// ─── COURSE STATUS ─────────────────────────────────────────────────────────────
//

/// Lifecycle of a learner's run through a course.
///
/// `Completed` can only return to `NotStarted` via [`CourseProgress::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseStatus {
    NotStarted,
    InProgress,
    Completed,
}

//
// ─── COURSE PROGRESS ───────────────────────────────────────────────────────────
//

/// Snapshot of progress state as read by callers and the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgressSnapshot {
    pub course_id: CourseId,
    pub records: Vec<ProgressRecord>,
    pub completed: bool,
    pub completion_date: Option<DateTime<Utc>>,
    pub status: CourseStatus,
}

/// Progress store for one (student, course) pair.
///
/// Holds the course's ordered curriculum and the per-lecture view records,
/// and derives completion state. Records are upserted idempotently: marking
/// the same lecture twice leaves a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseProgress {
    course: Course,
    records: BTreeMap<LectureId, ProgressRecord>,
    completion_date: Option<DateTime<Utc>>,
}

impl CourseProgress {
    /// Empty store for a learner who has just gained access to the course.
    #[must_use]
    pub fn new(course: Course) -> Self {
        Self {
            course,
            records: BTreeMap::new(),
            completion_date: None,
        }
    }

    /// Rehydrate from persisted records.
    ///
    /// Records referencing lecture ids absent from the curriculum are ignored
    /// rather than rejected; duplicate records collapse to the last one seen.
    /// The persisted completion date is kept as-is so the first-completion
    /// timestamp stays stable across sessions.
    #[must_use]
    pub fn from_persisted(
        course: Course,
        records: Vec<ProgressRecord>,
        completion_date: Option<DateTime<Utc>>,
    ) -> Self {
        let mut map = BTreeMap::new();
        for record in records {
            if course.position_of(record.lecture_id).is_some() {
                map.insert(record.lecture_id, record);
            }
        }
        Self {
            course,
            records: map,
            completion_date,
        }
    }

    #[must_use]
    pub fn course(&self) -> &Course {
        &self.course
    }

    /// Marks a lecture's video as finished at `now` and returns the updated
    /// snapshot.
    ///
    /// Upserts the lecture's record with `viewed = true`, recomputes
    /// completion, and on the first transition to completed stamps the
    /// completion date with `now`. Later calls never move that timestamp.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownLecture` when the id is not in the
    /// curriculum; the store is left unchanged.
    pub fn mark_viewed(
        &mut self,
        lecture_id: LectureId,
        now: DateTime<Utc>,
    ) -> Result<CourseProgressSnapshot, ProgressError> {
        if self.course.position_of(lecture_id).is_none() {
            return Err(ProgressError::UnknownLecture { id: lecture_id });
        }

        self.records
            .insert(lecture_id, ProgressRecord::viewed_at(lecture_id, now));

        if self.completion_date.is_none() && self.completed() {
            self.completion_date = Some(now);
        }

        Ok(self.snapshot())
    }

    /// Clears all records and the completion date. Idempotent.
    pub fn reset(&mut self) {
        self.records.clear();
        self.completion_date = None;
    }

    /// True iff the curriculum is non-empty and every lecture has a
    /// `viewed = true` record. Recomputed on each call.
    #[must_use]
    pub fn completed(&self) -> bool {
        !self.course.curriculum().is_empty()
            && self
                .course
                .curriculum()
                .iter()
                .all(|lecture| self.viewed(lecture.id()))
    }

    #[must_use]
    pub fn status(&self) -> CourseStatus {
        if self.completed() {
            CourseStatus::Completed
        } else if self.records.is_empty() {
            CourseStatus::NotStarted
        } else {
            CourseStatus::InProgress
        }
    }

    #[must_use]
    pub fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.completion_date
    }

    #[must_use]
    pub fn record(&self, lecture_id: LectureId) -> Option<&ProgressRecord> {
        self.records.get(&lecture_id)
    }

    /// True iff the lecture has a record with `viewed = true`.
    #[must_use]
    pub fn viewed(&self, lecture_id: LectureId) -> bool {
        self.records
            .get(&lecture_id)
            .is_some_and(|record| record.viewed)
    }

    #[must_use]
    pub fn viewed_count(&self) -> usize {
        self.records.values().filter(|record| record.viewed).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pure read of the current aggregate state.
    ///
    /// Records come out in curriculum order; insertion order is not
    /// significant.
    #[must_use]
    pub fn snapshot(&self) -> CourseProgressSnapshot {
        let records = self
            .course
            .curriculum()
            .iter()
            .filter_map(|lecture| self.records.get(&lecture.id()).cloned())
            .collect();

        CourseProgressSnapshot {
            course_id: self.course.id(),
            records,
            completed: self.completed(),
            completion_date: self.completion_date,
            status: self.status(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::course::Lecture;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn three_lecture_course() -> Course {
        let curriculum = vec![
            Lecture::new(LectureId::new(1), "A", None, true).unwrap(),
            Lecture::new(LectureId::new(2), "B", None, false).unwrap(),
            Lecture::new(LectureId::new(3), "C", None, false).unwrap(),
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
    fn new_store_is_not_started() {
        let progress = CourseProgress::new(three_lecture_course());
        assert!(progress.is_empty());
        assert!(!progress.completed());
        assert_eq!(progress.status(), CourseStatus::NotStarted);
        assert_eq!(progress.completion_date(), None);
    }

    #[test]
    fn mark_viewed_upserts_and_reports_in_progress() {
        let mut progress = CourseProgress::new(three_lecture_course());
        let snapshot = progress.mark_viewed(LectureId::new(1), fixed_now()).unwrap();

        assert_eq!(snapshot.records.len(), 1);
        assert!(snapshot.records[0].viewed);
        assert!(!snapshot.completed);
        assert_eq!(snapshot.status, CourseStatus::InProgress);
        assert!(progress.viewed(LectureId::new(1)));
        assert!(!progress.viewed(LectureId::new(2)));
    }

    #[test]
    fn mark_viewed_unknown_lecture_leaves_store_unchanged() {
        let mut progress = CourseProgress::new(three_lecture_course());
        progress.mark_viewed(LectureId::new(1), fixed_now()).unwrap();
        let before = progress.snapshot();

        let err = progress
            .mark_viewed(LectureId::new(99), fixed_now())
            .unwrap_err();
        assert_eq!(
            err,
            ProgressError::UnknownLecture {
                id: LectureId::new(99)
            }
        );
        assert_eq!(progress.snapshot(), before);
    }

    #[test]
    fn mark_viewed_is_idempotent() {
        let mut progress = CourseProgress::new(three_lecture_course());
        let now = fixed_now();

        let first = progress.mark_viewed(LectureId::new(1), now).unwrap();
        let second = progress.mark_viewed(LectureId::new(1), now).unwrap();

        assert_eq!(first, second);
        assert_eq!(progress.viewed_count(), 1);
    }

    #[test]
    fn completing_all_lectures_sets_completion_date_once() {
        let mut progress = CourseProgress::new(three_lecture_course());
        let now = fixed_now();

        progress.mark_viewed(LectureId::new(1), now).unwrap();
        progress.mark_viewed(LectureId::new(2), now).unwrap();
        let snapshot = progress
            .mark_viewed(LectureId::new(3), now + Duration::minutes(5))
            .unwrap();

        assert!(snapshot.completed);
        assert_eq!(snapshot.status, CourseStatus::Completed);
        assert_eq!(
            snapshot.completion_date,
            Some(now + Duration::minutes(5))
        );

        // Rewatching a lecture must not move the first-completion timestamp.
        let later = progress
            .mark_viewed(LectureId::new(1), now + Duration::hours(2))
            .unwrap();
        assert!(later.completed);
        assert_eq!(later.completion_date, Some(now + Duration::minutes(5)));
    }

    #[test]
    fn completion_is_monotone_without_reset() {
        let mut progress = CourseProgress::new(three_lecture_course());
        let now = fixed_now();
        for id in 1..=3 {
            progress.mark_viewed(LectureId::new(id), now).unwrap();
        }
        assert!(progress.completed());

        for id in [2, 3, 1, 2] {
            let snapshot = progress
                .mark_viewed(LectureId::new(id), now + Duration::days(1))
                .unwrap();
            assert!(snapshot.completed);
        }
    }

    #[test]
    fn reset_clears_all_state() {
        let mut progress = CourseProgress::new(three_lecture_course());
        let now = fixed_now();
        for id in 1..=3 {
            progress.mark_viewed(LectureId::new(id), now).unwrap();
        }
        assert!(progress.completed());

        progress.reset();
        assert!(progress.is_empty());
        assert!(!progress.completed());
        assert_eq!(progress.completion_date(), None);
        assert_eq!(progress.status(), CourseStatus::NotStarted);

        // Idempotent.
        progress.reset();
        assert!(progress.is_empty());

        // Completing again after reset stamps a fresh date.
        let later = now + Duration::days(3);
        for id in 1..=3 {
            progress.mark_viewed(LectureId::new(id), later).unwrap();
        }
        assert_eq!(progress.completion_date(), Some(later));
    }

    #[test]
    fn single_lecture_course_completes_on_first_mark() {
        let course = Course::new(
            CourseId::new(2),
            "One Shot",
            vec![Lecture::new(LectureId::new(1), "Only", None, false).unwrap()],
            true,
            false,
            fixed_now(),
        )
        .unwrap();
        let mut progress = CourseProgress::new(course);
        assert_eq!(progress.status(), CourseStatus::NotStarted);

        let snapshot = progress.mark_viewed(LectureId::new(1), fixed_now()).unwrap();
        assert_eq!(snapshot.status, CourseStatus::Completed);
        assert_eq!(snapshot.completion_date, Some(fixed_now()));
    }

    #[test]
    fn empty_curriculum_never_completes() {
        let course = Course::new(
            CourseId::new(3),
            "Draft",
            Vec::new(),
            true,
            true,
            fixed_now(),
        )
        .unwrap();
        let progress = CourseProgress::new(course);
        assert!(!progress.completed());
        assert_eq!(progress.status(), CourseStatus::NotStarted);
    }

    #[test]
    fn from_persisted_ignores_records_for_unknown_lectures() {
        let records = vec![
            ProgressRecord::viewed_at(LectureId::new(1), fixed_now()),
            ProgressRecord::viewed_at(LectureId::new(42), fixed_now()),
        ];
        let progress =
            CourseProgress::from_persisted(three_lecture_course(), records, None);

        assert_eq!(progress.viewed_count(), 1);
        assert!(progress.viewed(LectureId::new(1)));
        assert!(progress.record(LectureId::new(42)).is_none());
    }

    #[test]
    fn from_persisted_collapses_duplicates_to_last() {
        let early = fixed_now();
        let late = fixed_now() + Duration::hours(1);
        let records = vec![
            ProgressRecord::viewed_at(LectureId::new(1), early),
            ProgressRecord::viewed_at(LectureId::new(1), late),
        ];
        let progress =
            CourseProgress::from_persisted(three_lecture_course(), records, None);

        assert_eq!(progress.viewed_count(), 1);
        assert_eq!(
            progress.record(LectureId::new(1)).unwrap().date_viewed,
            Some(late)
        );
    }

    #[test]
    fn from_persisted_keeps_server_completion_date() {
        let completed_at = fixed_now() - Duration::days(7);
        let records = (1..=3)
            .map(|id| ProgressRecord::viewed_at(LectureId::new(id), fixed_now()))
            .collect();
        let mut progress = CourseProgress::from_persisted(
            three_lecture_course(),
            records,
            Some(completed_at),
        );

        assert!(progress.completed());
        assert_eq!(progress.completion_date(), Some(completed_at));

        // A later rewatch still keeps the original date.
        progress.mark_viewed(LectureId::new(2), fixed_now()).unwrap();
        assert_eq!(progress.completion_date(), Some(completed_at));
    }

    #[test]
    fn snapshot_orders_records_by_curriculum() {
        let mut progress = CourseProgress::new(three_lecture_course());
        progress.mark_viewed(LectureId::new(3), fixed_now()).unwrap();
        progress.mark_viewed(LectureId::new(1), fixed_now()).unwrap();

        let snapshot = progress.snapshot();
        let order: Vec<u64> = snapshot
            .records
            .iter()
            .map(|record| record.lecture_id.value())
            .collect();
        assert_eq!(order, vec![1, 3]);
    }
}

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::model::ids::{CourseId, LectureId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("lecture title cannot be empty")]
    EmptyLectureTitle,

    #[error("invalid lecture video URL: {raw}")]
    InvalidVideoUrl { raw: String },

    #[error("duplicate lecture id in curriculum: {id}")]
    DuplicateLecture { id: LectureId },
}

//
// ─── LECTURE ───────────────────────────────────────────────────────────────────
//

/// A single curriculum entry.
///
/// The video URL and title are display attributes; `free_preview` marks a
/// lecture watchable before purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lecture {
    id: LectureId,
    title: String,
    video_url: Option<Url>,
    free_preview: bool,
}

impl Lecture {
    /// Creates a new lecture.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyLectureTitle` if the title is empty or
    /// whitespace-only, or `CourseError::InvalidVideoUrl` if a video URL is
    /// present but does not parse.
    pub fn new(
        id: LectureId,
        title: impl Into<String>,
        video_url: Option<&str>,
        free_preview: bool,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyLectureTitle);
        }

        let video_url = video_url
            .map(|raw| {
                Url::parse(raw).map_err(|_| CourseError::InvalidVideoUrl {
                    raw: raw.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            id,
            title: title.trim().to_owned(),
            video_url,
            free_preview,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> LectureId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn video_url(&self) -> Option<&Url> {
        self.video_url.as_ref()
    }

    #[must_use]
    pub fn free_preview(&self) -> bool {
        self.free_preview
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// A course with an ordered curriculum.
///
/// Curriculum order is significant: it defines the unlock sequence when
/// `sequential_access` is on. `certificate_enabled` gates whether a completed
/// learner may fetch a certificate artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    id: CourseId,
    title: String,
    curriculum: Vec<Lecture>,
    sequential_access: bool,
    certificate_enabled: bool,
    created_at: DateTime<Utc>,
}

impl Course {
    /// Creates a new course.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyTitle` if the title is empty or
    /// whitespace-only, or `CourseError::DuplicateLecture` if two curriculum
    /// entries share a lecture id.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        curriculum: Vec<Lecture>,
        sequential_access: bool,
        certificate_enabled: bool,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }

        let mut seen = HashSet::with_capacity(curriculum.len());
        for lecture in &curriculum {
            if !seen.insert(lecture.id()) {
                return Err(CourseError::DuplicateLecture { id: lecture.id() });
            }
        }

        Ok(Self {
            id,
            title: title.trim().to_owned(),
            curriculum,
            sequential_access,
            certificate_enabled,
            created_at,
        })
    }

    /// Rehydrate a course from persisted storage.
    ///
    /// # Errors
    ///
    /// Applies the same validation as [`Course::new`].
    pub fn from_persisted(
        id: CourseId,
        title: String,
        curriculum: Vec<Lecture>,
        sequential_access: bool,
        certificate_enabled: bool,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        Self::new(
            id,
            title,
            curriculum,
            sequential_access,
            certificate_enabled,
            created_at,
        )
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn curriculum(&self) -> &[Lecture] {
        &self.curriculum
    }

    #[must_use]
    pub fn sequential_access(&self) -> bool {
        self.sequential_access
    }

    #[must_use]
    pub fn certificate_enabled(&self) -> bool {
        self.certificate_enabled
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn lecture_count(&self) -> usize {
        self.curriculum.len()
    }

    /// Position of a lecture in the curriculum, if it belongs to this course.
    #[must_use]
    pub fn position_of(&self, lecture_id: LectureId) -> Option<usize> {
        self.curriculum.iter().position(|l| l.id() == lecture_id)
    }

    #[must_use]
    pub fn lecture_at(&self, position: usize) -> Option<&Lecture> {
        self.curriculum.get(position)
    }

    #[must_use]
    pub fn find_lecture(&self, lecture_id: LectureId) -> Option<&Lecture> {
        self.curriculum.iter().find(|l| l.id() == lecture_id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn lecture(id: u64, title: &str) -> Lecture {
        Lecture::new(LectureId::new(id), title, None, false).unwrap()
    }

    #[test]
    fn lecture_rejects_empty_title() {
        let err = Lecture::new(LectureId::new(1), "   ", None, false).unwrap_err();
        assert_eq!(err, CourseError::EmptyLectureTitle);
    }

    #[test]
    fn lecture_rejects_invalid_video_url() {
        let err = Lecture::new(LectureId::new(1), "Intro", Some("not a url"), false).unwrap_err();
        assert_eq!(
            err,
            CourseError::InvalidVideoUrl {
                raw: "not a url".into()
            }
        );
    }

    #[test]
    fn lecture_accepts_valid_video_url() {
        let lecture = Lecture::new(
            LectureId::new(1),
            "Intro",
            Some("https://cdn.example.com/videos/intro.mp4"),
            true,
        )
        .unwrap();

        assert_eq!(lecture.title(), "Intro");
        assert!(lecture.free_preview());
        assert_eq!(
            lecture.video_url().map(Url::as_str),
            Some("https://cdn.example.com/videos/intro.mp4")
        );
    }

    #[test]
    fn course_rejects_empty_title() {
        let err = Course::new(CourseId::new(1), "  ", Vec::new(), true, true, fixed_now())
            .unwrap_err();
        assert_eq!(err, CourseError::EmptyTitle);
    }

    #[test]
    fn course_rejects_duplicate_lecture_ids() {
        let err = Course::new(
            CourseId::new(1),
            "Rust Basics",
            vec![lecture(1, "A"), lecture(2, "B"), lecture(1, "C")],
            true,
            true,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CourseError::DuplicateLecture {
                id: LectureId::new(1)
            }
        );
    }

    #[test]
    fn course_trims_title_and_preserves_order() {
        let course = Course::new(
            CourseId::new(7),
            "  Rust Basics  ",
            vec![lecture(10, "A"), lecture(20, "B")],
            true,
            false,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(course.title(), "Rust Basics");
        assert_eq!(course.lecture_count(), 2);
        assert_eq!(course.position_of(LectureId::new(20)), Some(1));
        assert_eq!(course.lecture_at(0).map(Lecture::title), Some("A"));
        assert!(course.find_lecture(LectureId::new(99)).is_none());
        assert!(!course.certificate_enabled());
    }

    #[test]
    fn empty_curriculum_is_allowed_at_construction() {
        let course = Course::new(
            CourseId::new(1),
            "Draft Course",
            Vec::new(),
            true,
            true,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(course.lecture_count(), 0);
    }
}

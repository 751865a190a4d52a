mod course;
mod ids;
mod progress;
mod settings;

pub use course::{Course, CourseError, Lecture};
pub use ids::{CourseId, LectureId, ParseIdError, StudentId};
pub use progress::{
    CourseProgress, CourseProgressSnapshot, CourseStatus, ProgressError, ProgressRecord,
};
pub use settings::{PlayerSettings, SettingsError};

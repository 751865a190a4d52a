use course_core::model::{
    Course, CourseId, Lecture, LectureId, ProgressRecord, StudentId,
};
use sqlx::Row;

use crate::repository::{CompletionRow, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn lecture_id_from_i64(v: i64) -> Result<LectureId, StorageError> {
    Ok(LectureId::new(i64_to_u64("lecture_id", v)?))
}

pub(crate) fn course_id_to_i64(id: CourseId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("course_id overflow".into()))
}

pub(crate) fn lecture_id_to_i64(id: LectureId) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization("lecture_id overflow".into()))
}

/// Student ids are stored as canonical hyphenated UUID text.
pub(crate) fn student_id_to_string(id: StudentId) -> String {
    id.value().to_string()
}

pub(crate) fn bool_from_i64(field: &'static str, v: i64) -> Result<bool, StorageError> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::Serialization(format!(
            "invalid {field}: {other}"
        ))),
    }
}

pub(crate) fn map_lecture_row(row: &sqlx::sqlite::SqliteRow) -> Result<Lecture, StorageError> {
    let id = lecture_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let title: String = row.try_get("title").map_err(ser)?;
    let video_url: Option<String> = row.try_get("video_url").map_err(ser)?;
    let free_preview = bool_from_i64(
        "free_preview",
        row.try_get::<i64, _>("free_preview").map_err(ser)?,
    )?;

    Lecture::new(id, title, video_url.as_deref(), free_preview).map_err(ser)
}

pub(crate) fn map_course_row(
    row: &sqlx::sqlite::SqliteRow,
    curriculum: Vec<Lecture>,
) -> Result<Course, StorageError> {
    let id = course_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let title: String = row.try_get("title").map_err(ser)?;
    let sequential_access = bool_from_i64(
        "sequential_access",
        row.try_get::<i64, _>("sequential_access").map_err(ser)?,
    )?;
    let certificate_enabled = bool_from_i64(
        "certificate_enabled",
        row.try_get::<i64, _>("certificate_enabled").map_err(ser)?,
    )?;
    let created_at = row.try_get("created_at").map_err(ser)?;

    Course::from_persisted(
        id,
        title,
        curriculum,
        sequential_access,
        certificate_enabled,
        created_at,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ProgressRecord, StorageError> {
    Ok(ProgressRecord {
        lecture_id: lecture_id_from_i64(row.try_get::<i64, _>("lecture_id").map_err(ser)?)?,
        viewed: bool_from_i64("viewed", row.try_get::<i64, _>("viewed").map_err(ser)?)?,
        date_viewed: row.try_get("date_viewed").map_err(ser)?,
    })
}

pub(crate) fn map_completion_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CompletionRow, StorageError> {
    Ok(CompletionRow {
        completed: bool_from_i64("completed", row.try_get::<i64, _>("completed").map_err(ser)?)?,
        completion_date: row.try_get("completion_date").map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_mapping_rejects_out_of_range() {
        assert!(bool_from_i64("viewed", 0).is_ok());
        assert!(bool_from_i64("viewed", 1).is_ok());
        assert!(bool_from_i64("viewed", 2).is_err());
    }

    #[test]
    fn ids_reject_negative_values() {
        assert!(course_id_from_i64(-1).is_err());
        assert!(lecture_id_from_i64(i64::MIN).is_err());
        assert_eq!(course_id_from_i64(7).unwrap(), CourseId::new(7));
    }

    #[test]
    fn student_id_text_round_trips() {
        let student = StudentId::generate();
        let text = student_id_to_string(student);
        assert_eq!(text.parse::<StudentId>().unwrap(), student);
    }
}

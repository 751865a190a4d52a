use course_core::model::{CourseId, ProgressRecord, StudentId};

use super::mapping::{
    course_id_to_i64, lecture_id_to_i64, map_completion_row, map_progress_row,
    student_id_to_string,
};
use super::SqliteRepository;
use crate::repository::{CompletionRow, ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_record(
        &self,
        student: StudentId,
        course: CourseId,
        record: &ProgressRecord,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lecture_progress (student_id, course_id, lecture_id, viewed, date_viewed)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(student_id, course_id, lecture_id) DO UPDATE SET
                viewed = excluded.viewed,
                date_viewed = excluded.date_viewed
            ",
        )
        .bind(student_id_to_string(student))
        .bind(course_id_to_i64(course)?)
        .bind(lecture_id_to_i64(record.lecture_id)?)
        .bind(i64::from(record.viewed))
        .bind(record.date_viewed)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn list_records(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT lecture_id, viewed, date_viewed
            FROM lecture_progress
            WHERE student_id = ?1 AND course_id = ?2
            ORDER BY lecture_id ASC
            ",
        )
        .bind(student_id_to_string(student))
        .bind(course_id_to_i64(course)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(map_progress_row(&row)?);
        }
        Ok(records)
    }

    async fn completion(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> Result<Option<CompletionRow>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT completed, completion_date
            FROM course_completion
            WHERE student_id = ?1 AND course_id = ?2
            ",
        )
        .bind(student_id_to_string(student))
        .bind(course_id_to_i64(course)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|row| map_completion_row(&row)).transpose()
    }

    async fn set_completion(
        &self,
        student: StudentId,
        course: CourseId,
        completion: &CompletionRow,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO course_completion (student_id, course_id, completed, completion_date)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(student_id, course_id) DO UPDATE SET
                completed = excluded.completed,
                completion_date = excluded.completion_date
            ",
        )
        .bind(student_id_to_string(student))
        .bind(course_id_to_i64(course)?)
        .bind(i64::from(completion.completed))
        .bind(completion.completion_date)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn clear(&self, student: StudentId, course: CourseId) -> Result<(), StorageError> {
        let student_text = student_id_to_string(student);
        let course_id = course_id_to_i64(course)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query("DELETE FROM lecture_progress WHERE student_id = ?1 AND course_id = ?2")
            .bind(&student_text)
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query("DELETE FROM course_completion WHERE student_id = ?1 AND course_id = ?2")
            .bind(&student_text)
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}

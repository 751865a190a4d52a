use course_core::model::{Course, CourseId, Lecture};

use super::mapping::{course_id_to_i64, lecture_id_to_i64, map_course_row, map_lecture_row};
use super::SqliteRepository;
use crate::repository::{CourseRepository, StorageError};

impl SqliteRepository {
    async fn lectures_for(
        &self,
        course_id: i64,
    ) -> Result<Vec<Lecture>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, position, title, video_url, free_preview
            FROM lectures
            WHERE course_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut lectures = Vec::with_capacity(rows.len());
        for row in rows {
            lectures.push(map_lecture_row(&row)?);
        }
        Ok(lectures)
    }
}

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let course_id = course_id_to_i64(course.id())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO courses (id, title, sequential_access, certificate_enabled, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                -- keep created_at from the original insert; only update mutable fields
                title = excluded.title,
                sequential_access = excluded.sequential_access,
                certificate_enabled = excluded.certificate_enabled
            ",
        )
        .bind(course_id)
        .bind(course.title().to_owned())
        .bind(i64::from(course.sequential_access()))
        .bind(i64::from(course.certificate_enabled()))
        .bind(course.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        // Replace the curriculum wholesale so positions stay dense and
        // removed lectures disappear.
        sqlx::query("DELETE FROM lectures WHERE course_id = ?1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for (position, lecture) in course.curriculum().iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            sqlx::query(
                r"
                INSERT INTO lectures (id, course_id, position, title, video_url, free_preview)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(lecture_id_to_i64(lecture.id())?)
            .bind(course_id)
            .bind(position)
            .bind(lecture.title().to_owned())
            .bind(lecture.video_url().map(|url| url.as_str().to_owned()))
            .bind(i64::from(lecture.free_preview()))
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let course_id = course_id_to_i64(id)?;

        let row = sqlx::query(
            r"
            SELECT id, title, sequential_access, certificate_enabled, created_at
            FROM courses
            WHERE id = ?1
            ",
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let curriculum = self.lectures_for(course_id).await?;
        Ok(Some(map_course_row(&row, curriculum)?))
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, sequential_access, certificate_enabled, created_at
            FROM courses
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut courses = Vec::with_capacity(rows.len());
        for row in rows {
            let course_id: i64 = sqlx::Row::try_get(&row, "id")
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            let curriculum = self.lectures_for(course_id).await?;
            courses.push(map_course_row(&row, curriculum)?);
        }
        Ok(courses)
    }
}

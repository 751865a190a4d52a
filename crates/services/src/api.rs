use std::env;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use course_core::model::{
    Course, CourseError, CourseId, Lecture, LectureId, ProgressRecord, StudentId,
};

use crate::error::ApiError;

/// Connection settings for the upstream LMS REST API.
#[derive(Clone, Debug)]
pub struct LmsApiConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl LmsApiConfig {
    /// Reads `LMS_API_BASE_URL` and `LMS_API_TOKEN`; returns `None` when no
    /// base URL is configured, which leaves the client disabled.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("LMS_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let token = env::var("LMS_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Some(Self { base_url, token })
    }
}

/// Client for the LMS course-progress collaborators.
///
/// The engine only consumes these contracts; their failure and retry
/// semantics live upstream. An unconfigured client reports
/// `ApiError::Disabled` instead of attempting requests.
#[derive(Clone)]
pub struct LmsApiClient {
    client: Client,
    config: Option<LmsApiConfig>,
}

impl LmsApiClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(LmsApiConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<LmsApiConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Result<&LmsApiConfig, ApiError> {
        self.config.as_ref().ok_or(ApiError::Disabled)
    }

    fn url(&self, path: &str) -> Result<String, ApiError> {
        let config = self.config()?;
        Ok(format!("{}/{path}", config.base_url.trim_end_matches('/')))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.as_ref().and_then(|c| c.token.as_deref()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetch the stored progress aggregate for one (student, course) pair.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the client is disabled, the request fails, or
    /// the server answers with a non-success status.
    pub async fn fetch_progress(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> Result<FetchProgressResponse, ApiError> {
        let url = self.url(&format!("progress/{student}/{course}"))?;
        let response = self.authorize(self.client.get(url)).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Persist a lecture view upstream.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the client is disabled, the request fails, or
    /// the server answers with a non-success status.
    pub async fn mark_lecture_viewed(
        &self,
        student: StudentId,
        course: CourseId,
        lecture: LectureId,
    ) -> Result<MarkViewedResponse, ApiError> {
        let url = self.url("progress/mark-lecture-viewed")?;
        let payload = MarkViewedRequest {
            user_id: student,
            course_id: course,
            lecture_id: lecture,
        };
        let response = self
            .authorize(self.client.post(url))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Clear all stored progress for the pair (the "rewatch course" action).
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the client is disabled, the request fails, or
    /// the server answers with a non-success status.
    pub async fn reset_progress(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("progress/reset/{student}/{course}"))?;
        let response = self.authorize(self.client.post(url)).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }
        Ok(())
    }

    /// Fetch the certificate PDF for a completed course.
    ///
    /// Ineligibility (incomplete course, certificates disabled) comes back
    /// as a non-success status and surfaces as `ApiError::HttpStatus`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the client is disabled, the request fails, or
    /// the server answers with a non-success status.
    pub async fn fetch_certificate(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> Result<Vec<u8>, ApiError> {
        let url = self.url(&format!("certificate/{student}/{course}"))?;
        let response = self.authorize(self.client.get(url)).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

/// Progress aggregate as served by the upstream API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchProgressResponse {
    pub is_purchased: bool,
    pub course_details: CourseDetailsDto,
    pub completed: bool,
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub progress: Vec<ProgressRecordDto>,
}

/// Course shape on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetailsDto {
    pub id: CourseId,
    pub title: String,
    #[serde(default)]
    pub curriculum: Vec<LectureDto>,
    #[serde(default = "default_true")]
    pub sequential_access: bool,
    #[serde(default)]
    pub certificate_enabled: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureDto {
    pub id: LectureId,
    pub title: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub free_preview: bool,
}

fn default_true() -> bool {
    true
}

impl CourseDetailsDto {
    /// Convert the wire shape into a validated domain course. `fetched_at`
    /// stands in for the creation timestamp when the API omits one.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` when the payload fails domain validation.
    pub fn into_course(self, fetched_at: DateTime<Utc>) -> Result<Course, CourseError> {
        let mut curriculum = Vec::with_capacity(self.curriculum.len());
        for lecture in self.curriculum {
            curriculum.push(Lecture::new(
                lecture.id,
                lecture.title,
                lecture.video_url.as_deref(),
                lecture.free_preview,
            )?);
        }

        Course::from_persisted(
            self.id,
            self.title,
            curriculum,
            self.sequential_access,
            self.certificate_enabled,
            self.created_at.unwrap_or(fetched_at),
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkViewedRequest {
    user_id: StudentId,
    course_id: CourseId,
    lecture_id: LectureId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkViewedResponse {
    pub completed: bool,
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lectures_progress: Vec<ProgressRecordDto>,
}

/// Per-lecture view state on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecordDto {
    pub lecture_id: LectureId,
    pub viewed: bool,
    pub date_viewed: Option<DateTime<Utc>>,
}

impl From<ProgressRecordDto> for ProgressRecord {
    fn from(dto: ProgressRecordDto) -> Self {
        Self {
            lecture_id: dto.lecture_id,
            viewed: dto.viewed,
            date_viewed: dto.date_viewed,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_client_is_disabled() {
        let client = LmsApiClient::new(None);
        assert!(!client.enabled());
        assert!(matches!(client.config(), Err(ApiError::Disabled)));
    }

    #[test]
    fn url_joins_without_double_slashes() {
        let client = LmsApiClient::new(Some(LmsApiConfig {
            base_url: "https://lms.example.com/api/".into(),
            token: None,
        }));
        assert_eq!(
            client.url("progress/reset/a/1").unwrap(),
            "https://lms.example.com/api/progress/reset/a/1"
        );
    }

    #[test]
    fn progress_response_deserializes_from_camel_case() {
        let body = serde_json::json!({
            "isPurchased": true,
            "courseDetails": {
                "id": 7,
                "title": "Rust Basics",
                "certificateEnabled": true,
                "curriculum": [
                    { "id": 1, "title": "Intro", "freePreview": true },
                    { "id": 2, "title": "Ownership" }
                ]
            },
            "completed": false,
            "completionDate": null,
            "progress": [
                { "lectureId": 1, "viewed": true, "dateViewed": "2025-03-14T08:26:40Z" },
                { "lectureId": 2, "viewed": false, "dateViewed": null }
            ]
        });

        let parsed: FetchProgressResponse = serde_json::from_value(body).unwrap();
        assert!(parsed.is_purchased);
        assert!(!parsed.completed);
        assert_eq!(parsed.progress.len(), 2);

        let record: ProgressRecord = parsed.progress[0].clone().into();
        assert_eq!(record.lecture_id, LectureId::new(1));
        assert!(record.viewed);

        // Sequential access defaults on when the API omits it.
        let course = parsed
            .course_details
            .into_course(course_core::time::fixed_now())
            .unwrap();
        assert_eq!(course.id(), CourseId::new(7));
        assert!(course.sequential_access());
        assert!(course.certificate_enabled());
        assert_eq!(course.lecture_count(), 2);
        assert!(course.lecture_at(0).unwrap().free_preview());
    }

    #[test]
    fn mark_viewed_request_serializes_to_camel_case() {
        let student = StudentId::generate();
        let payload = MarkViewedRequest {
            user_id: student,
            course_id: CourseId::new(7),
            lecture_id: LectureId::new(3),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["userId"], serde_json::json!(student.value()));
        assert_eq!(value["courseId"], serde_json::json!(7));
        assert_eq!(value["lectureId"], serde_json::json!(3));
    }
}

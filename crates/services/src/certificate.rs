use crate::api::LmsApiClient;
use crate::error::CertificateError;
use crate::progress::CourseSession;

/// A fetched certificate artifact, ready to hand to the caller for saving or
/// display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDownload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Eligibility checks and certificate retrieval.
///
/// Eligibility is decided locally from the session state before any request
/// goes out; the actual PDF rendering lives upstream.
#[derive(Clone)]
pub struct CertificateService {
    api: LmsApiClient,
}

impl CertificateService {
    #[must_use]
    pub fn new(api: LmsApiClient) -> Self {
        Self { api }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(LmsApiClient::from_env())
    }

    /// Whether the session's learner may fetch a certificate right now.
    ///
    /// # Errors
    ///
    /// Returns `CertificateError::Disabled` when the course has certificates
    /// switched off, or `CertificateError::NotCompleted` while any lecture is
    /// still unviewed.
    pub fn check_eligibility(session: &CourseSession) -> Result<(), CertificateError> {
        if !session.course().certificate_enabled() {
            return Err(CertificateError::Disabled);
        }
        if !session.is_completed() {
            return Err(CertificateError::NotCompleted);
        }
        Ok(())
    }

    /// Fetch the certificate PDF for a completed course.
    ///
    /// # Errors
    ///
    /// Returns the eligibility errors of [`Self::check_eligibility`], or
    /// `CertificateError::Api` when the upstream fetch fails.
    pub async fn download(
        &self,
        session: &CourseSession,
    ) -> Result<CertificateDownload, CertificateError> {
        Self::check_eligibility(session)?;

        let bytes = self
            .api
            .fetch_certificate(session.student_id(), session.course().id())
            .await?;

        Ok(CertificateDownload {
            file_name: format!("certificate-course-{}.pdf", session.course().id()),
            bytes,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use course_core::model::{
        Course, CourseId, Lecture, LectureId, PlayerSettings, StudentId,
    };
    use course_core::time::fixed_now;

    fn build_course(certificate_enabled: bool) -> Course {
        Course::new(
            CourseId::new(1),
            "Rust Basics",
            vec![Lecture::new(LectureId::new(1), "Only", None, false).unwrap()],
            true,
            certificate_enabled,
            fixed_now(),
        )
        .unwrap()
    }

    fn session(certificate_enabled: bool, completed: bool) -> CourseSession {
        let mut session = CourseSession::new(
            StudentId::generate(),
            build_course(certificate_enabled),
            PlayerSettings::default_flow(),
        );
        if completed {
            session.mark_viewed(LectureId::new(1), fixed_now()).unwrap();
        }
        session
    }

    #[test]
    fn disabled_course_is_ineligible() {
        let session = session(false, true);
        assert!(matches!(
            CertificateService::check_eligibility(&session),
            Err(CertificateError::Disabled)
        ));
    }

    #[test]
    fn incomplete_course_is_ineligible() {
        let session = session(true, false);
        assert!(matches!(
            CertificateService::check_eligibility(&session),
            Err(CertificateError::NotCompleted)
        ));
    }

    #[test]
    fn completed_course_with_certificates_is_eligible() {
        let session = session(true, true);
        assert!(CertificateService::check_eligibility(&session).is_ok());
    }

    #[tokio::test]
    async fn download_without_configured_api_reports_disabled_client() {
        let service = CertificateService::new(LmsApiClient::new(None));
        let session = session(true, true);

        let err = service.download(&session).await.unwrap_err();
        assert!(matches!(err, CertificateError::Api(ApiError::Disabled)));
    }
}

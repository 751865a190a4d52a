#![forbid(unsafe_code)]

pub mod analytics;
pub mod api;
pub mod app_services;
pub mod certificate;
pub mod error;
pub mod progress;

pub use course_core::Clock;

pub use api::{LmsApiClient, LmsApiConfig};
pub use app_services::AppServices;
pub use certificate::{CertificateDownload, CertificateService};
pub use error::{ApiError, AppServicesError, CertificateError, FlowError};
pub use progress::{
    CourseSession, LectureFlowService, LectureOutcome, LectureSignal, ProgressView,
};

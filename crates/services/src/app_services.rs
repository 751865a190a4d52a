use std::sync::Arc;

use course_core::Clock;
use course_core::model::PlayerSettings;
use storage::repository::Storage;

use crate::certificate::CertificateService;
use crate::error::AppServicesError;
use crate::progress::LectureFlowService;

/// Bundled services for a running application instance.
#[derive(Clone)]
pub struct AppServices {
    pub storage: Storage,
    pub flow: LectureFlowService,
    pub certificates: CertificateService,
}

impl AppServices {
    /// Wire services on top of a `SQLite` database.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or
    /// migrated.
    pub async fn sqlite(
        database_url: &str,
        settings: PlayerSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(database_url).await?;
        Ok(Self::from_storage(storage, Clock::system(), settings))
    }

    /// Wire services on top of in-memory storage; useful for tests and
    /// prototyping.
    #[must_use]
    pub fn in_memory(settings: PlayerSettings) -> Self {
        Self::from_storage(Storage::in_memory(), Clock::system(), settings)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, settings: PlayerSettings) -> Self {
        let flow = LectureFlowService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.progress),
        )
        .with_settings(settings);

        Self {
            storage,
            flow,
            certificates: CertificateService::from_env(),
        }
    }
}

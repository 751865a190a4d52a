use chrono::Duration;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("advance delay must be between 0 and 60 seconds")]
    InvalidAdvanceDelay,

    #[error("mark-viewed retry budget must be between 0 and 10")]
    InvalidRetryBudget,
}

//
// ─── PLAYER SETTINGS ───────────────────────────────────────────────────────────
//

/// Configuration for the lecture playback flow.
///
/// The advance delay paces the "lecture complete" toast before the player
/// moves on; it is a UX knob, not a correctness constraint. The retry budget
/// bounds how many times a failed progress write is retried before the flow
/// gives up and continues optimistically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSettings {
    advance_delay_secs: u32,
    mark_viewed_retries: u32,
    autoplay_next: bool,
}

impl PlayerSettings {
    /// Defaults matching the hosted player: a 2 second completion toast,
    /// 3 persistence retries, autoplay on.
    #[must_use]
    pub fn default_flow() -> Self {
        Self {
            advance_delay_secs: 2,
            mark_viewed_retries: 3,
            autoplay_next: true,
        }
    }

    /// Creates custom playback settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if a value is out of bounds.
    pub fn new(
        advance_delay_secs: u32,
        mark_viewed_retries: u32,
        autoplay_next: bool,
    ) -> Result<Self, SettingsError> {
        if advance_delay_secs > 60 {
            return Err(SettingsError::InvalidAdvanceDelay);
        }
        if mark_viewed_retries > 10 {
            return Err(SettingsError::InvalidRetryBudget);
        }

        Ok(Self {
            advance_delay_secs,
            mark_viewed_retries,
            autoplay_next,
        })
    }

    // Accessors
    #[must_use]
    pub fn advance_delay_secs(&self) -> u32 {
        self.advance_delay_secs
    }

    #[must_use]
    pub fn advance_delay(&self) -> Duration {
        Duration::seconds(i64::from(self.advance_delay_secs))
    }

    /// Number of retries after the initial attempt; 0 means one attempt only.
    #[must_use]
    pub fn mark_viewed_retries(&self) -> u32 {
        self.mark_viewed_retries
    }

    #[must_use]
    pub fn autoplay_next(&self) -> bool {
        self.autoplay_next
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

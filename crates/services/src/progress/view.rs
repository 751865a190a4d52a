use course_core::model::CourseStatus;

/// Aggregated view of course progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub total_lectures: usize,
    pub viewed: usize,
    pub remaining: usize,
    pub status: CourseStatus,
}

impl ProgressView {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == CourseStatus::Completed
    }
}
